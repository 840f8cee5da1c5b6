// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Per-insertion alignment store.

Alignments are kept in a `BTreeMap` keyed by [`AlignmentKey`], so iteration
is already in chronological order and the latest alignments are at the
back. Keys are unique; adding an existing key is an error, never an
overwrite.
*/

use std::collections::BTreeMap;

use ephys_align_geometry::DepthWarp;
use tracing::debug;

use crate::key::AlignmentKey;
use crate::types::{QcError, QcResult, TrajectoryRecord};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentStore {
    alignments: BTreeMap<AlignmentKey, DepthWarp>,
}

impl AlignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store one alignment
    ///
    /// # Errors
    ///
    /// Returns `QcError::DuplicateKey` if the key is taken and
    /// `QcError::InvalidAlignment` if the arrays do not form a valid warp.
    pub fn add(&mut self, key: AlignmentKey, feature: Vec<f64>, track: Vec<f64>) -> QcResult<()> {
        let warp = DepthWarp::new(feature, track).map_err(|e| QcError::alignment(&key, e))?;
        self.insert(key, warp)
    }

    /// Store an already validated warp
    pub fn insert(&mut self, key: AlignmentKey, warp: DepthWarp) -> QcResult<()> {
        if self.alignments.contains_key(&key) {
            return Err(QcError::DuplicateKey {
                key: key.to_string(),
            });
        }
        debug!(target: "ephys-align-qc", "Stored alignment {}", key);
        self.alignments.insert(key, warp);
        Ok(())
    }

    pub fn get(&self, key: &AlignmentKey) -> Option<&DepthWarp> {
        self.alignments.get(key)
    }

    pub fn contains(&self, key: &AlignmentKey) -> bool {
        self.alignments.contains_key(key)
    }

    pub fn remove(&mut self, key: &AlignmentKey) -> Option<DepthWarp> {
        self.alignments.remove(key)
    }

    pub fn len(&self) -> usize {
        self.alignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alignments.is_empty()
    }

    /// All keys, most recent first
    pub fn keys_newest_first(&self) -> Vec<&AlignmentKey> {
        self.alignments.keys().rev().collect()
    }

    /// Most recent alignment, if any
    pub fn latest(&self) -> Option<(&AlignmentKey, &DepthWarp)> {
        self.alignments.iter().next_back()
    }

    /// Up to two most recent alignments, newest first
    pub fn latest_two(&self) -> Vec<(&AlignmentKey, &DepthWarp)> {
        self.alignments.iter().rev().take(2).collect()
    }

    /// Keys contributed by `author`, oldest first
    pub fn keys_by_author(&self, author: &str) -> Vec<AlignmentKey> {
        self.alignments
            .keys()
            .filter(|k| k.author() == author)
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AlignmentKey, &DepthWarp)> {
        self.alignments.iter()
    }

    /// Load a persisted trajectory map
    ///
    /// # Errors
    ///
    /// Fails on the first malformed key or invalid alignment.
    pub fn from_trajectory(record: &TrajectoryRecord) -> QcResult<Self> {
        let mut store = Self::new();
        for (raw, [feature, track]) in &record.alignments {
            let key = AlignmentKey::parse(raw)?;
            store.add(key, feature.clone(), track.clone())?;
        }
        Ok(store)
    }

    /// Persisted form of the whole store
    pub fn to_trajectory(&self) -> TrajectoryRecord {
        TrajectoryRecord {
            alignments: self
                .alignments
                .iter()
                .map(|(k, w)| (k.to_string(), [w.feature().to_vec(), w.track().to_vec()]))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> AlignmentKey {
        raw.parse().unwrap()
    }

    fn identity() -> (Vec<f64>, Vec<f64>) {
        (vec![-1e-3, 3e-3], vec![-1e-3, 3e-3])
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut store = AlignmentStore::new();
        let (f, t) = identity();
        store
            .add(key("2020-09-14T15:44:56_nate"), f.clone(), t.clone())
            .unwrap();
        let err = store
            .add(key("2020-09-14T15:44:56_nate"), f, t)
            .unwrap_err();
        assert!(matches!(err, QcError::DuplicateKey { .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_invalid_warp_names_key() {
        let mut store = AlignmentStore::new();
        let err = store
            .add(key("2020-09-14T15:44:56_nate"), vec![0.0, 1.0], vec![0.0])
            .unwrap_err();
        match err {
            QcError::InvalidAlignment { key, .. } => assert_eq!(key, "2020-09-14T15:44:56_nate"),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_latest_two_with_fractional_seconds() {
        let mut store = AlignmentStore::new();
        for raw in [
            "2020-09-14T15:42:09_a",
            "2020-09-14T15:42:09.5_b",
            "2020-09-14T15:42:08_c",
        ] {
            let (f, t) = identity();
            store.add(key(raw), f, t).unwrap();
        }
        let latest: Vec<&str> = store.latest_two().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(latest, ["2020-09-14T15:42:09.5_b", "2020-09-14T15:42:09_a"]);
    }

    #[test]
    fn test_latest_two_newest_first() {
        let mut store = AlignmentStore::new();
        for raw in [
            "2020-09-28T10:03:06_guido",
            "2020-06-26T16:40:14_Karolina_Socha",
            "2020-09-14T15:44:56_nate",
        ] {
            let (f, t) = identity();
            store.add(key(raw), f, t).unwrap();
        }
        let latest: Vec<_> = store.latest_two().into_iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(latest, vec!["2020-09-28T10:03:06_guido", "2020-09-14T15:44:56_nate"]);
        assert_eq!(store.latest().unwrap().0.author(), "guido");
        assert_eq!(store.keys_newest_first().len(), 3);
    }

    #[test]
    fn test_keys_by_author() {
        let mut store = AlignmentStore::new();
        for raw in ["2020-09-14T15:44:56_nate", "2020-09-28T10:03:06_guido", "2020-09-29T09:00:00_nate"] {
            let (f, t) = identity();
            store.add(key(raw), f, t).unwrap();
        }
        assert_eq!(store.keys_by_author("nate").len(), 2);
        assert!(store.keys_by_author("mayo").is_empty());
    }

    #[test]
    fn test_trajectory_round_trip() {
        let mut store = AlignmentStore::new();
        store
            .add(
                key("2020-09-14T15:44:56_nate"),
                vec![-1e-3, 1e-3, 3e-3],
                vec![-1e-3, 1.1e-3, 3e-3],
            )
            .unwrap();
        let restored = AlignmentStore::from_trajectory(&store.to_trajectory()).unwrap();
        assert_eq!(restored, store);
    }

    #[test]
    fn test_trajectory_with_bad_key_fails() {
        let mut record = TrajectoryRecord::default();
        record
            .alignments
            .insert("not-a-key".to_string(), [vec![0.0, 1.0], vec![0.0, 1.0]]);
        assert!(matches!(
            AlignmentStore::from_trajectory(&record),
            Err(QcError::InvalidKey { .. })
        ));
    }
}
