// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Persisted record shapes.

These mirror what the lab data store keeps per insertion:

```json
{
  "qc": "PASS",
  "extended_qc": {
    "_tracing_exists": 1,
    "_alignment_number": 3,
    "_alignment_stored": "2020-09-28T15:57:25_mayo",
    "_alignment_resolved": 1,
    "_alignment_qc": 0.93,
    "alignment": "PASS",
    "alignment_user": "PASS"
  }
}
```

and, for the alignments themselves, a map from key to the
`[feature, track]` knot arrays.
*/

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::key::AlignmentKey;
use crate::verdict::{QcState, Resolution, Verdict};

/// Insertion QC as persisted
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QcRecord {
    pub qc: QcState,
    #[serde(default)]
    pub extended_qc: ExtendedQc,
}

/// Extended QC fields, flags stored as 0/1
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtendedQc {
    #[serde(rename = "_tracing_exists", default, skip_serializing_if = "Option::is_none")]
    pub tracing_exists: Option<u8>,
    #[serde(rename = "_alignment_number", default, skip_serializing_if = "Option::is_none")]
    pub alignment_number: Option<usize>,
    #[serde(rename = "_alignment_stored", default, skip_serializing_if = "Option::is_none")]
    pub alignment_stored: Option<AlignmentKey>,
    #[serde(rename = "_alignment_resolved", default, skip_serializing_if = "Option::is_none")]
    pub alignment_resolved: Option<u8>,
    #[serde(rename = "_alignment_qc", default, skip_serializing_if = "Option::is_none")]
    pub alignment_qc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<QcState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment_user: Option<QcState>,
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

impl QcRecord {
    /// Record for an insertion whose picks are missing or unusable
    pub fn critical_no_tracing() -> Self {
        Self::default().without_tracing()
    }

    /// Mark the tracing as missing
    ///
    /// The insertion becomes CRITICAL unless a WARNING or PASS alignment
    /// verdict is already on record; those are never downgraded.
    pub fn without_tracing(mut self) -> Self {
        self.extended_qc.tracing_exists = Some(0);
        if !self.has_alignment_verdict() {
            self.qc = QcState::Critical;
        }
        self
    }

    /// Whether consensus has produced a WARNING or PASS for this insertion
    pub fn has_alignment_verdict(&self) -> bool {
        [
            Some(self.qc),
            self.extended_qc.alignment,
            self.extended_qc.alignment_user,
        ]
        .into_iter()
        .flatten()
        .any(|state| matches!(state, QcState::Warning | QcState::Pass))
    }

    pub fn tracing_exists(&self) -> bool {
        self.extended_qc.tracing_exists == Some(1)
    }

    /// Mark the tracing as present and lift a stale CRITICAL
    pub fn with_tracing(mut self) -> Self {
        self.extended_qc.tracing_exists = Some(1);
        if self.qc == QcState::Critical {
            self.qc = self
                .extended_qc
                .alignment_user
                .or(self.extended_qc.alignment)
                .unwrap_or_default();
        }
        self
    }

    /// Fold a resolution into this record, keeping unrelated fields
    pub fn with_resolution(mut self, resolution: &Resolution) -> Self {
        let effective = resolution.effective();
        self.qc = effective.qc;

        let ext = &mut self.extended_qc;
        ext.alignment_number = Some(effective.alignment_count);
        ext.alignment_stored = effective.stored_key.clone();
        ext.alignment_resolved = Some(flag(effective.resolved));
        ext.alignment_qc = resolution
            .automatic
            .agreement_score
            .or(effective.agreement_score);
        ext.alignment = Some(resolution.automatic.qc);
        ext.alignment_user = resolution.user.as_ref().map(|u| u.qc);
        self
    }

    /// Rebuild the last resolution from the persisted fields
    ///
    /// Returns `None` when no alignment has been counted yet. The persisted
    /// shape only keeps the effective stored key, so an automatic verdict
    /// rebuilt underneath a user verdict has no stored key.
    pub fn prior_resolution(&self) -> Option<Resolution> {
        let ext = &self.extended_qc;
        let count = ext.alignment_number?;
        let resolved = ext.alignment_resolved == Some(1);

        let resolution = match ext.alignment_user {
            Some(user_qc) => Resolution {
                automatic: Verdict {
                    qc: ext.alignment.unwrap_or_default(),
                    alignment_count: count,
                    stored_key: None,
                    resolved: ext.alignment == Some(QcState::Pass),
                    agreement_score: ext.alignment_qc,
                    manual_override_key: None,
                },
                user: Some(Verdict {
                    qc: user_qc,
                    alignment_count: count,
                    stored_key: ext.alignment_stored.clone(),
                    resolved,
                    agreement_score: ext.alignment_qc,
                    manual_override_key: ext.alignment_stored.clone(),
                }),
            },
            None => Resolution::automatic(Verdict {
                qc: ext.alignment.unwrap_or(self.qc),
                alignment_count: count,
                stored_key: ext.alignment_stored.clone(),
                resolved,
                agreement_score: ext.alignment_qc,
                manual_override_key: None,
            }),
        };
        Some(resolution)
    }
}

/// Stored alignments for one insertion: key → `[feature, track]`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrajectoryRecord {
    pub alignments: BTreeMap<String, [Vec<f64>; 2]>,
}

impl TrajectoryRecord {
    pub fn len(&self) -> usize {
        self.alignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alignments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> AlignmentKey {
        raw.parse().unwrap()
    }

    #[test]
    fn test_critical_record_shape() {
        let json = serde_json::to_value(QcRecord::critical_no_tracing()).unwrap();
        assert_eq!(json["qc"], "CRITICAL");
        assert_eq!(json["extended_qc"]["_tracing_exists"], 0);
        assert!(json["extended_qc"].get("_alignment_number").is_none());
    }

    #[test]
    fn test_lost_tracing_keeps_alignment_verdict() {
        let resolution = Resolution::automatic(Verdict {
            qc: QcState::Pass,
            alignment_count: 2,
            stored_key: Some(key("2020-09-14T15:44:56_nate")),
            resolved: true,
            agreement_score: Some(1.0),
            manual_override_key: None,
        });
        let record = QcRecord::default()
            .with_tracing()
            .with_resolution(&resolution)
            .without_tracing();

        assert_eq!(record.qc, QcState::Pass);
        assert!(!record.tracing_exists());
        assert_eq!(record.extended_qc.alignment_resolved, Some(1));

        let unaligned = QcRecord::default().with_tracing().without_tracing();
        assert_eq!(unaligned.qc, QcState::Critical);
    }

    #[test]
    fn test_resolution_written_with_wire_names() {
        let resolution = Resolution::automatic(Verdict {
            qc: QcState::Pass,
            alignment_count: 2,
            stored_key: Some(key("2020-09-14T15:44:56_nate")),
            resolved: true,
            agreement_score: Some(0.9),
            manual_override_key: None,
        });
        let record = QcRecord::default().with_tracing().with_resolution(&resolution);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["qc"], "PASS");
        let ext = &json["extended_qc"];
        assert_eq!(ext["_tracing_exists"], 1);
        assert_eq!(ext["_alignment_number"], 2);
        assert_eq!(ext["_alignment_stored"], "2020-09-14T15:44:56_nate");
        assert_eq!(ext["_alignment_resolved"], 1);
        assert_eq!(ext["_alignment_qc"], 0.9);
        assert_eq!(ext["alignment"], "PASS");
        assert!(ext.get("alignment_user").is_none());
    }

    #[test]
    fn test_prior_resolution_round_trip() {
        let resolution = Resolution::automatic(Verdict {
            qc: QcState::Warning,
            alignment_count: 2,
            stored_key: Some(key("2020-09-28T10:03:06_guido")),
            resolved: false,
            agreement_score: Some(0.4),
            manual_override_key: None,
        });
        let record = QcRecord::default().with_resolution(&resolution);
        assert_eq!(record.prior_resolution(), Some(resolution));
        assert_eq!(QcRecord::default().prior_resolution(), None);
    }

    #[test]
    fn test_prior_resolution_keeps_user_verdict() {
        let chosen = key("2020-09-14T15:44:56_nate");
        let resolution = Resolution {
            automatic: Verdict {
                qc: QcState::Warning,
                agreement_score: Some(0.4),
                ..Verdict::not_set(3, Some(key("2020-09-28T15:57:25_mayo")))
            },
            user: Some(Verdict {
                qc: QcState::Pass,
                alignment_count: 3,
                stored_key: Some(chosen.clone()),
                resolved: true,
                agreement_score: Some(0.4),
                manual_override_key: Some(chosen.clone()),
            }),
        };
        let restored = QcRecord::default()
            .with_resolution(&resolution)
            .prior_resolution()
            .unwrap();

        assert_eq!(restored.user, resolution.user);
        assert_eq!(restored.automatic.qc, QcState::Warning);
        assert!(restored.is_resolved());
    }

    #[test]
    fn test_trajectory_is_plain_map() {
        let raw = r#"{"2020-09-28T15:57:25_mayo": [[-0.001, 0.002], [-0.0012, 0.0021]]}"#;
        let record: TrajectoryRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.alignments["2020-09-28T15:57:25_mayo"][1], vec![-0.0012, 0.0021]);
    }
}
