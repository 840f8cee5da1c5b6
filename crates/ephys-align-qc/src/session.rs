// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Per-insertion alignment session.

An [`InsertionSession`] owns the track for one insertion and keeps the
alignment store and the last resolution behind a single mutex, so adding
alignments and resolving are serialised for that insertion. Every write
works on a copy of the store: the new state is committed only after the
resolution and all repository writes succeed, so a failed call leaves the
in-memory session where it was. Repository writes that succeeded before
the failure are not rolled back; the alignment is written before the QC
record, so a reopened session sees the alignment and re-resolves.
*/

use ephys_align_geometry::{
    AtlasLookup, BrainSurface, CancelToken, DepthWarp, RegionSegment, RegionSegmenter, Track,
    TrackBuilder, Xyz,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::key::AlignmentKey;
use crate::repository::InsertionRepository;
use crate::resolver::ConsensusResolver;
use crate::store::AlignmentStore;
use crate::types::{QcError, QcRecord, QcResult};
use crate::verdict::{Resolution, Verdict};

/// Runtime parameters shared by every session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub builder: TrackBuilder,
    pub resolver: ConsensusResolver,
    /// Replace an author's earlier alignment until the insertion is resolved
    pub supersede_same_author: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            builder: TrackBuilder::default(),
            resolver: ConsensusResolver::default(),
            supersede_same_author: true,
        }
    }
}

/// Build the track for an insertion and record whether tracing exists
///
/// Missing or rejected picks record `_tracing_exists = 0` before the error
/// is returned. The insertion becomes CRITICAL only if consensus has not
/// already reached WARNING or PASS.
///
/// # Errors
///
/// Returns `QcError::NoUsableTrack` when there are no picks and
/// `QcError::Geometry` when the builder rejects them.
pub fn register_track(
    repo: &dyn InsertionRepository,
    builder: &TrackBuilder,
    surface: &dyn BrainSurface,
    insertion_id: &str,
    picks: Option<&[Xyz]>,
) -> QcResult<Track> {
    let base = repo.load_qc(insertion_id)?.unwrap_or_default();

    let picks = match picks {
        Some(p) if !p.is_empty() => p,
        _ => {
            warn!(target: "ephys-align-qc", "[{}] No histology picks, tracing marked missing", insertion_id);
            repo.persist_qc(insertion_id, &base.without_tracing())?;
            return Err(QcError::NoUsableTrack {
                insertion_id: insertion_id.to_string(),
            });
        }
    };

    match builder.build(picks, surface) {
        Ok(track) => {
            repo.persist_qc(insertion_id, &base.with_tracing())?;
            debug!(
                target: "ephys-align-qc",
                "[{}] Track built from {} picks, length {:.6} m",
                insertion_id,
                picks.len(),
                track.length()
            );
            Ok(track)
        }
        Err(e) => {
            warn!(target: "ephys-align-qc", "[{}] Picks rejected ({}), tracing marked missing", insertion_id, e);
            repo.persist_qc(insertion_id, &base.without_tracing())?;
            Err(QcError::geometry(insertion_id, e))
        }
    }
}

#[derive(Debug)]
struct SessionState {
    store: AlignmentStore,
    resolution: Option<Resolution>,
    record: QcRecord,
}

#[derive(Debug)]
pub struct InsertionSession {
    insertion_id: String,
    track: Track,
    tip_clearance: f64,
    resolver: ConsensusResolver,
    supersede_same_author: bool,
    state: Mutex<SessionState>,
}

impl InsertionSession {
    /// Session over data that is already loaded
    pub fn new(
        insertion_id: impl Into<String>,
        track: Track,
        store: AlignmentStore,
        prior: Option<Resolution>,
        config: SessionConfig,
    ) -> Self {
        let mut record = QcRecord::default().with_tracing();
        if let Some(resolution) = &prior {
            record = record.with_resolution(resolution);
        }
        Self::from_parts(insertion_id.into(), track, store, prior, record, config)
    }

    /// Load picks, alignments and QC for `insertion_id` and open a session
    ///
    /// # Errors
    ///
    /// Fails like [`register_track`] when no track can be built, and on
    /// malformed persisted alignments.
    pub fn open(
        repo: &dyn InsertionRepository,
        surface: &dyn BrainSurface,
        insertion_id: &str,
        config: SessionConfig,
    ) -> QcResult<Self> {
        let picks = repo.load_picks(insertion_id)?;
        let track = register_track(repo, &config.builder, surface, insertion_id, picks.as_deref())?;

        let store = AlignmentStore::from_trajectory(&repo.load_trajectory(insertion_id)?)?;
        let record = repo.load_qc(insertion_id)?.unwrap_or_default();
        let prior = record.prior_resolution();

        info!(
            target: "ephys-align-qc",
            "[{}] Session opened with {} alignments, qc {}",
            insertion_id,
            store.len(),
            record.qc
        );
        Ok(Self::from_parts(
            insertion_id.to_string(),
            track,
            store,
            prior,
            record,
            config,
        ))
    }

    fn from_parts(
        insertion_id: String,
        track: Track,
        store: AlignmentStore,
        resolution: Option<Resolution>,
        record: QcRecord,
        config: SessionConfig,
    ) -> Self {
        Self {
            insertion_id,
            track,
            tip_clearance: config.builder.tip_clearance(),
            resolver: config.resolver,
            supersede_same_author: config.supersede_same_author,
            state: Mutex::new(SessionState {
                store,
                resolution,
                record,
            }),
        }
    }

    pub fn insertion_id(&self) -> &str {
        &self.insertion_id
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn alignment_count(&self) -> usize {
        self.state.lock().store.len()
    }

    /// Copy of the current store
    pub fn store(&self) -> AlignmentStore {
        self.state.lock().store.clone()
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.state.lock().resolution.clone()
    }

    /// Effective verdict, `None` before the first resolution
    pub fn verdict(&self) -> Option<Verdict> {
        self.state
            .lock()
            .resolution
            .as_ref()
            .map(|r| r.effective().clone())
    }

    /// QC record as last persisted by this session
    pub fn record(&self) -> QcRecord {
        self.state.lock().record.clone()
    }

    pub fn initial_alignment(&self) -> QcResult<DepthWarp> {
        self.track
            .initial_alignment(self.tip_clearance)
            .map_err(|e| QcError::geometry(&self.insertion_id, e))
    }

    /// Stored alignment for `key`
    pub fn alignment(&self, key: &AlignmentKey) -> QcResult<DepthWarp> {
        self.state
            .lock()
            .store
            .get(key)
            .cloned()
            .ok_or_else(|| QcError::UnknownKey {
                key: key.to_string(),
            })
    }

    /// Alignment a reader should start from
    ///
    /// The stored key of the current verdict, else the latest alignment,
    /// else the initial alignment (with no key).
    pub fn current_alignment(&self) -> QcResult<(Option<AlignmentKey>, DepthWarp)> {
        let state = self.state.lock();
        let stored = state
            .resolution
            .as_ref()
            .and_then(|r| r.effective().stored_key.as_ref())
            .and_then(|k| state.store.get(k).map(|w| (k, w)));
        match stored.or_else(|| state.store.latest()) {
            Some((key, warp)) => Ok((Some(key.clone()), warp.clone())),
            None => Ok((None, self.initial_alignment()?)),
        }
    }

    fn warp_for(&self, key: Option<&AlignmentKey>) -> QcResult<DepthWarp> {
        match key {
            Some(k) => self.alignment(k),
            None => Ok(self.current_alignment()?.1),
        }
    }

    /// Channel positions for one alignment, defaulting to the current one
    pub fn project_channels(
        &self,
        key: Option<&AlignmentKey>,
        channel_depths: Option<&[f64]>,
    ) -> QcResult<Vec<Xyz>> {
        let warp = self.warp_for(key)?;
        self.resolver
            .projector()
            .project(&self.track, &warp, channel_depths)
            .map_err(|e| QcError::geometry(&self.insertion_id, e))
    }

    /// Region segments for one alignment, defaulting to the current one
    pub fn segment_regions(
        &self,
        key: Option<&AlignmentKey>,
        atlas: &dyn AtlasLookup,
        segmenter: &RegionSegmenter,
        cancel: &CancelToken,
    ) -> QcResult<Vec<RegionSegment>> {
        let warp = self.warp_for(key)?;
        segmenter
            .segment_cancellable(&self.track, &warp, atlas, cancel)
            .map_err(|e| QcError::geometry(&self.insertion_id, e))
    }

    /// Store a new alignment, resolve, and persist both
    ///
    /// # Errors
    ///
    /// Returns `QcError::DuplicateKey`, `QcError::InvalidAlignment` or a
    /// repository error. On error nothing is committed to the session, but
    /// repository writes made before the failing one stay in place.
    pub fn add_alignment(
        &self,
        repo: &dyn InsertionRepository,
        key: AlignmentKey,
        feature: Vec<f64>,
        track: Vec<f64>,
    ) -> QcResult<Resolution> {
        let mut state = self.state.lock();

        let mut store = state.store.clone();
        store.add(key.clone(), feature, track)?;

        let resolved = state
            .resolution
            .as_ref()
            .map_or(false, |r| r.is_resolved());
        let superseded: Vec<AlignmentKey> = if self.supersede_same_author && !resolved {
            store
                .keys_by_author(key.author())
                .into_iter()
                .filter(|k| k != &key)
                .collect()
        } else {
            Vec::new()
        };
        for old in &superseded {
            store.remove(old);
        }

        let resolution = self
            .resolver
            .resolve(&self.track, &store, state.resolution.as_ref())?;
        let record = state.record.clone().with_resolution(&resolution);

        if let Some(warp) = store.get(&key) {
            repo.persist_alignment(&self.insertion_id, &key, warp.feature(), warp.track())?;
        }
        for old in &superseded {
            debug!(target: "ephys-align-qc", "[{}] {} superseded by {}", self.insertion_id, old, key);
            repo.retract_alignment(&self.insertion_id, old)?;
        }
        repo.persist_qc(&self.insertion_id, &record)?;

        info!(
            target: "ephys-align-qc",
            "[{}] Added alignment {}: {} alignments, qc {}",
            self.insertion_id,
            key,
            store.len(),
            resolution.effective().qc
        );
        state.store = store;
        state.resolution = Some(resolution.clone());
        state.record = record;
        Ok(resolution)
    }

    /// Recompute and persist the verdict without adding anything
    pub fn resolve(&self, repo: &dyn InsertionRepository) -> QcResult<Resolution> {
        let mut state = self.state.lock();
        let resolution = self
            .resolver
            .resolve(&self.track, &state.store, state.resolution.as_ref())?;
        let record = state.record.clone().with_resolution(&resolution);
        repo.persist_qc(&self.insertion_id, &record)?;

        state.resolution = Some(resolution.clone());
        state.record = record;
        Ok(resolution)
    }

    /// Resolve the insertion by hand on `key`
    ///
    /// # Errors
    ///
    /// Returns `QcError::UnknownKey` if `key` is not stored; the previous
    /// verdict is left untouched.
    pub fn resolve_manual(
        &self,
        repo: &dyn InsertionRepository,
        key: &AlignmentKey,
    ) -> QcResult<Resolution> {
        let mut state = self.state.lock();
        let resolution = self.resolver.resolve_manual(
            &self.track,
            &state.store,
            state.resolution.as_ref(),
            key,
        )?;
        let record = state.record.clone().with_resolution(&resolution);
        repo.persist_qc(&self.insertion_id, &record)?;

        state.resolution = Some(resolution.clone());
        state.record = record;
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use crate::verdict::QcState;
    use ephys_align_geometry::SlabSurface;

    fn picks() -> Vec<Xyz> {
        (0..8)
            .map(|i| Xyz::new(0.0, 0.0, -4e-3 + i as f64 * 0.5e-3))
            .collect()
    }

    fn surface() -> SlabSurface {
        SlabSurface::new(0.0, -5e-3).unwrap()
    }

    fn key(raw: &str) -> AlignmentKey {
        raw.parse().unwrap()
    }

    fn open_session(repo: &InMemoryRepository) -> InsertionSession {
        repo.set_picks("probe00", picks());
        InsertionSession::open(repo, &surface(), "probe00", SessionConfig::default()).unwrap()
    }

    fn knots(session: &InsertionSession, stretch: f64) -> (Vec<f64>, Vec<f64>) {
        let initial = session.initial_alignment().unwrap();
        let feature = initial.feature().to_vec();
        let mut track = initial.track().to_vec();
        if let Some(last) = track.last_mut() {
            *last += stretch;
        }
        (feature, track)
    }

    #[test]
    fn test_register_without_picks_is_critical() {
        let repo = InMemoryRepository::new();
        let err = register_track(&repo, &TrackBuilder::default(), &surface(), "probe00", None)
            .unwrap_err();
        assert!(matches!(err, QcError::NoUsableTrack { .. }));

        let record = repo.qc_record("probe00").unwrap();
        assert_eq!(record.qc, QcState::Critical);
        assert!(!record.tracing_exists());
    }

    #[test]
    fn test_register_with_too_few_picks_is_critical() {
        let repo = InMemoryRepository::new();
        let err = register_track(
            &repo,
            &TrackBuilder::default(),
            &surface(),
            "probe00",
            Some(&picks()[..2]),
        )
        .unwrap_err();
        assert!(matches!(err, QcError::Geometry { .. }));
        assert_eq!(repo.qc_record("probe00").unwrap().qc, QcState::Critical);
    }

    #[test]
    fn test_lost_picks_do_not_downgrade_pass() {
        let repo = InMemoryRepository::new();
        let session = open_session(&repo);
        let (feature, track) = knots(&session, 0.0);
        session
            .add_alignment(&repo, key("2021-01-01T10:00:00_alice"), feature.clone(), track.clone())
            .unwrap();
        session
            .add_alignment(&repo, key("2021-01-02T10:00:00_bob"), feature, track)
            .unwrap();
        assert_eq!(repo.qc_record("probe00").unwrap().qc, QcState::Pass);

        let err = register_track(&repo, &TrackBuilder::default(), &surface(), "probe00", None)
            .unwrap_err();
        assert!(matches!(err, QcError::NoUsableTrack { .. }));

        let record = repo.qc_record("probe00").unwrap();
        assert_eq!(record.qc, QcState::Pass);
        assert_eq!(record.extended_qc.alignment_resolved, Some(1));
        assert!(!record.tracing_exists());
    }

    #[test]
    fn test_open_records_tracing() {
        let repo = InMemoryRepository::new();
        let session = open_session(&repo);
        assert!(session.verdict().is_none());
        let record = repo.qc_record("probe00").unwrap();
        assert_eq!(record.qc, QcState::NotSet);
        assert!(record.tracing_exists());
    }

    /// Delegates to an in-memory store but refuses QC writes
    struct QcWriteFails(InMemoryRepository);

    impl InsertionRepository for QcWriteFails {
        fn load_picks(&self, id: &str) -> QcResult<Option<Vec<Xyz>>> {
            self.0.load_picks(id)
        }

        fn load_trajectory(&self, id: &str) -> QcResult<crate::types::TrajectoryRecord> {
            self.0.load_trajectory(id)
        }

        fn load_qc(&self, id: &str) -> QcResult<Option<QcRecord>> {
            self.0.load_qc(id)
        }

        fn persist_alignment(
            &self,
            id: &str,
            key: &AlignmentKey,
            feature: &[f64],
            track: &[f64],
        ) -> QcResult<()> {
            self.0.persist_alignment(id, key, feature, track)
        }

        fn retract_alignment(&self, id: &str, key: &AlignmentKey) -> QcResult<()> {
            self.0.retract_alignment(id, key)
        }

        fn persist_qc(&self, _id: &str, _record: &QcRecord) -> QcResult<()> {
            Err(QcError::Repository("qc store offline".to_string()))
        }
    }

    #[test]
    fn test_failed_qc_write_leaves_session_unchanged() {
        let repo = InMemoryRepository::new();
        let session = open_session(&repo);
        let failing = QcWriteFails(repo);

        let (f, t) = knots(&session, 0.0);
        let err = session
            .add_alignment(&failing, key("2021-01-01T10:00:00_alice"), f, t)
            .unwrap_err();
        assert!(matches!(err, QcError::Repository(_)));

        assert_eq!(session.alignment_count(), 0);
        assert!(session.verdict().is_none());
        // The alignment write went through before the QC write failed
        assert_eq!(failing.0.trajectory("probe00").len(), 1);
        assert_eq!(failing.0.qc_record("probe00").unwrap().qc, QcState::NotSet);
    }

    #[test]
    fn test_resolve_without_alignments_is_not_set() {
        let repo = InMemoryRepository::new();
        let session = open_session(&repo);

        let v = session.resolve(&repo).unwrap().effective().clone();
        assert_eq!(v.qc, QcState::NotSet);
        assert_eq!(v.alignment_count, 0);
        assert_eq!(v.stored_key, None);
        assert!(!v.resolved);

        let record = repo.qc_record("probe00").unwrap();
        assert_eq!(record.qc, QcState::NotSet);
        assert_eq!(record.extended_qc.alignment_number, Some(0));
        assert_eq!(record.extended_qc.alignment_resolved, Some(0));
    }

    #[test]
    fn test_same_author_supersedes_until_resolved() {
        let repo = InMemoryRepository::new();
        let session = open_session(&repo);

        let (f, t) = knots(&session, 0.0);
        session
            .add_alignment(&repo, key("2020-09-14T15:42:09_nate"), f.clone(), t.clone())
            .unwrap();
        let resolution = session
            .add_alignment(&repo, key("2020-09-14T15:44:56_nate"), f, t)
            .unwrap();

        let v = resolution.effective();
        assert_eq!(v.qc, QcState::NotSet);
        assert_eq!(v.alignment_count, 1);
        assert_eq!(v.stored_key, Some(key("2020-09-14T15:44:56_nate")));
        assert_eq!(repo.trajectory("probe00").len(), 1);
    }

    #[test]
    fn test_failed_add_commits_nothing() {
        let repo = InMemoryRepository::new();
        let session = open_session(&repo);
        let (f, t) = knots(&session, 0.0);
        session
            .add_alignment(&repo, key("2020-09-14T15:44:56_nate"), f.clone(), t.clone())
            .unwrap();
        let before = session.resolution();

        let err = session
            .add_alignment(&repo, key("2020-09-14T15:44:56_nate"), f, t)
            .unwrap_err();
        assert!(matches!(err, QcError::DuplicateKey { .. }));
        assert_eq!(session.resolution(), before);
        assert_eq!(session.alignment_count(), 1);
    }

    #[test]
    fn test_current_alignment_follows_verdict() {
        let repo = InMemoryRepository::new();
        let session = open_session(&repo);
        let (key0, warp0) = session.current_alignment().unwrap();
        assert!(key0.is_none());
        assert_eq!(warp0, session.initial_alignment().unwrap());

        let (f, t) = knots(&session, 50e-6);
        session
            .add_alignment(&repo, key("2020-09-14T15:44:56_nate"), f, t)
            .unwrap();
        let (key1, _) = session.current_alignment().unwrap();
        assert_eq!(key1, Some(key("2020-09-14T15:44:56_nate")));
        assert_eq!(session.project_channels(None, None).unwrap().len(), 384);
    }
}
