// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Alignment keys.

A key is `<ISO-8601 timestamp>_<author>`, for example
`2020-09-28T15:57:25_mayo`. The author is everything after the first
underscore, so author names may themselves contain underscores. Keys
order by parsed timestamp, then by the full string, which is how the store
finds the most recent alignments. For keys written at the same precision
this is plain string order; it also holds when whole-second and
fractional-second keys are mixed.
*/

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{QcError, QcResult};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const TIMESTAMP_FORMAT_FRACTIONAL: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Identifier of one stored alignment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AlignmentKey(String);

impl AlignmentKey {
    /// Parse and validate a key
    ///
    /// # Errors
    ///
    /// Returns `QcError::InvalidKey` if there is no underscore, the author is
    /// empty, or the timestamp does not parse.
    pub fn parse(raw: &str) -> QcResult<Self> {
        let invalid = |reason: &str| QcError::InvalidKey {
            key: raw.to_string(),
            reason: reason.to_string(),
        };

        let (timestamp, author) = raw
            .split_once('_')
            .ok_or_else(|| invalid("expected <timestamp>_<author>"))?;
        if author.is_empty() {
            return Err(invalid("author is empty"));
        }
        parse_timestamp(timestamp).ok_or_else(|| invalid("timestamp is not ISO-8601"))?;

        Ok(Self(raw.to_string()))
    }

    /// Build a key from its parts, at whole-second resolution
    pub fn from_parts(timestamp: NaiveDateTime, author: &str) -> QcResult<Self> {
        Self::parse(&format!("{}_{}", timestamp.format(TIMESTAMP_FORMAT), author))
    }

    /// Key stamped with the current UTC time
    pub fn now(author: &str) -> QcResult<Self> {
        Self::from_parts(Utc::now().naive_utc(), author)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Timestamp part as written
    pub fn timestamp_str(&self) -> &str {
        self.split().0
    }

    pub fn author(&self) -> &str {
        self.split().1
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        // validated in parse()
        parse_timestamp(self.timestamp_str()).unwrap_or(NaiveDateTime::MIN)
    }

    fn split(&self) -> (&str, &str) {
        self.0.split_once('_').unwrap_or((self.0.as_str(), ""))
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT_FRACTIONAL))
        .ok()
}

impl Ord for AlignmentKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp()
            .cmp(&other.timestamp())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for AlignmentKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AlignmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AlignmentKey {
    type Err = QcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AlignmentKey {
    type Error = QcError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AlignmentKey> for String {
    fn from(key: AlignmentKey) -> Self {
        key.0
    }
}

impl AsRef<str> for AlignmentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_splits_on_first_underscore() {
        let key = AlignmentKey::parse("2020-06-26T16:40:14_Karolina_Socha").unwrap();
        assert_eq!(key.timestamp_str(), "2020-06-26T16:40:14");
        assert_eq!(key.author(), "Karolina_Socha");
        assert_eq!(key.timestamp().hour(), 16);
    }

    #[test]
    fn test_fractional_seconds_accepted() {
        let key = AlignmentKey::parse("2020-09-14T15:42:09.123456_nate").unwrap();
        assert_eq!(key.timestamp().year(), 2020);
        assert_eq!(key.author(), "nate");
    }

    #[test]
    fn test_malformed_keys_rejected() {
        for raw in ["no-underscore", "2020-09-28T15:57:25_", "yesterday_mayo", "_mayo"] {
            assert!(
                matches!(AlignmentKey::parse(raw), Err(QcError::InvalidKey { .. })),
                "{} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_ordering_is_chronological() {
        let older: AlignmentKey = "2020-09-14T15:44:56_nate".parse().unwrap();
        let newer: AlignmentKey = "2020-09-28T10:03:06_guido".parse().unwrap();
        assert!(older < newer);
    }

    #[test]
    fn test_ordering_mixes_precisions() {
        let whole: AlignmentKey = "2020-09-14T15:42:09_a".parse().unwrap();
        let later: AlignmentKey = "2020-09-14T15:42:09.5_b".parse().unwrap();
        let earlier: AlignmentKey = "2020-09-14T15:42:08.9_c".parse().unwrap();
        assert!(whole < later);
        assert!(earlier < whole);

        // Same instant written two ways: distinct keys, string order breaks the tie
        let padded: AlignmentKey = "2020-09-14T15:42:09.0_a".parse().unwrap();
        assert_ne!(whole, padded);
        assert_eq!(whole.timestamp(), padded.timestamp());
        assert!(padded < whole);
    }

    #[test]
    fn test_now_round_trips_author() {
        let key = AlignmentKey::now("olivier").unwrap();
        assert_eq!(key.author(), "olivier");
        assert_eq!(key.timestamp_str().len(), 19);
    }

    #[test]
    fn test_serde_validates() {
        let key: AlignmentKey = serde_json::from_str("\"2020-09-28T15:57:25_mayo\"").unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2020-09-28T15:57:25_mayo\"");
        assert!(serde_json::from_str::<AlignmentKey>("\"bogus\"").is_err());
    }
}
