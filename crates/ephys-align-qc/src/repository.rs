// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Persistence collaborator.

The lab data store is reached through [`InsertionRepository`]. Calls are
blocking; callers that need concurrency run them on their own threads.
[`InMemoryRepository`] backs tests and offline runs.
*/

use std::collections::HashMap;

use ephys_align_geometry::Xyz;
use parking_lot::RwLock;
use tracing::debug;

use crate::key::AlignmentKey;
use crate::types::{QcRecord, QcResult, TrajectoryRecord};

/// Per-insertion reads and writes against the data store
pub trait InsertionRepository: Send + Sync {
    /// Histology picks in meters, `None` when the insertion was never traced
    fn load_picks(&self, insertion_id: &str) -> QcResult<Option<Vec<Xyz>>>;

    /// Stored alignments, empty when there are none
    fn load_trajectory(&self, insertion_id: &str) -> QcResult<TrajectoryRecord>;

    fn load_qc(&self, insertion_id: &str) -> QcResult<Option<QcRecord>>;

    fn persist_alignment(
        &self,
        insertion_id: &str,
        key: &AlignmentKey,
        feature: &[f64],
        track: &[f64],
    ) -> QcResult<()>;

    /// Drop a stored alignment, no-op when absent
    fn retract_alignment(&self, insertion_id: &str, key: &AlignmentKey) -> QcResult<()>;

    fn persist_qc(&self, insertion_id: &str, record: &QcRecord) -> QcResult<()>;
}

/// Thread-safe in-memory repository
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    picks: RwLock<HashMap<String, Vec<Xyz>>>,
    trajectories: RwLock<HashMap<String, TrajectoryRecord>>,
    qc: RwLock<HashMap<String, QcRecord>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_picks(&self, insertion_id: &str, picks: Vec<Xyz>) {
        self.picks.write().insert(insertion_id.to_string(), picks);
    }

    pub fn set_trajectory(&self, insertion_id: &str, record: TrajectoryRecord) {
        self.trajectories
            .write()
            .insert(insertion_id.to_string(), record);
    }

    pub fn set_qc(&self, insertion_id: &str, record: QcRecord) {
        self.qc.write().insert(insertion_id.to_string(), record);
    }

    /// Snapshot of the stored alignments
    pub fn trajectory(&self, insertion_id: &str) -> TrajectoryRecord {
        self.trajectories
            .read()
            .get(insertion_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of the stored QC record
    pub fn qc_record(&self, insertion_id: &str) -> Option<QcRecord> {
        self.qc.read().get(insertion_id).cloned()
    }
}

impl InsertionRepository for InMemoryRepository {
    fn load_picks(&self, insertion_id: &str) -> QcResult<Option<Vec<Xyz>>> {
        Ok(self.picks.read().get(insertion_id).cloned())
    }

    fn load_trajectory(&self, insertion_id: &str) -> QcResult<TrajectoryRecord> {
        Ok(self.trajectory(insertion_id))
    }

    fn load_qc(&self, insertion_id: &str) -> QcResult<Option<QcRecord>> {
        Ok(self.qc_record(insertion_id))
    }

    fn persist_alignment(
        &self,
        insertion_id: &str,
        key: &AlignmentKey,
        feature: &[f64],
        track: &[f64],
    ) -> QcResult<()> {
        debug!(target: "ephys-align-qc", "[{}] persisting alignment {}", insertion_id, key);
        self.trajectories
            .write()
            .entry(insertion_id.to_string())
            .or_default()
            .alignments
            .insert(key.to_string(), [feature.to_vec(), track.to_vec()]);
        Ok(())
    }

    fn retract_alignment(&self, insertion_id: &str, key: &AlignmentKey) -> QcResult<()> {
        if let Some(record) = self.trajectories.write().get_mut(insertion_id) {
            record.alignments.remove(key.as_str());
        }
        Ok(())
    }

    fn persist_qc(&self, insertion_id: &str, record: &QcRecord) -> QcResult<()> {
        debug!(target: "ephys-align-qc", "[{}] persisting QC {}", insertion_id, record.qc);
        self.qc
            .write()
            .insert(insertion_id.to_string(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_persist_and_retract() {
        let repo = InMemoryRepository::new();
        let key: AlignmentKey = "2020-09-14T15:44:56_nate".parse().unwrap();
        repo.persist_alignment("probe00", &key, &[0.0, 1.0], &[0.0, 1.1])
            .unwrap();
        assert_eq!(repo.load_trajectory("probe00").unwrap().len(), 1);

        repo.retract_alignment("probe00", &key).unwrap();
        assert!(repo.load_trajectory("probe00").unwrap().is_empty());
        // unknown insertion is not an error
        repo.retract_alignment("probe01", &key).unwrap();
    }

    #[test]
    fn test_missing_insertion_loads_empty() {
        let repo = InMemoryRepository::new();
        assert!(repo.load_picks("probe00").unwrap().is_none());
        assert!(repo.load_qc("probe00").unwrap().is_none());
        assert!(repo.load_trajectory("probe00").unwrap().is_empty());
    }
}
