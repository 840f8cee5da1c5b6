// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios: configuration file to persisted QC.
//!
//! These tests go through the umbrella crate only, the way an application
//! would use it.

use std::collections::BTreeSet;
use std::path::Path;

use ephys_align::config::load_config;
use ephys_align::prelude::*;
use ephys_align::SettingsError;
use tempfile::tempdir;

const INSERTION: &str = "probe00";

const CONFIG_TOML: &str = r#"
[geometry]
tip_clearance_um = 200.0
region_sample_step_um = 20.0

[consensus]
agreement_threshold = 0.8
rms_length_scale_um = 100.0

[probe]
model = "custom"
contact_depths_um = [0.0, 1000.0, 2000.0, 3000.0]
"#;

fn write_config(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("ephys_align.toml");
    std::fs::write(&path, content).unwrap();
    path
}

fn runtime() -> AlignRuntime {
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), CONFIG_TOML);
    let config = load_config(Some(&path), None).unwrap();
    AlignRuntime::from_config(&config).unwrap()
}

/// Vertical picks from 4 mm to 0.5 mm deep
fn picks() -> Vec<Xyz> {
    (0..8)
        .map(|i| Xyz::new(0.0, 0.0, -4e-3 + i as f64 * 0.5e-3))
        .collect()
}

fn repo() -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    repo.set_picks(INSERTION, picks());
    repo
}

fn open(repo: &InMemoryRepository, runtime: &AlignRuntime) -> InsertionSession {
    let surface = SlabSurface::new(0.0, -5e-3).unwrap();
    InsertionSession::open(repo, &surface, INSERTION, runtime.session.clone()).unwrap()
}

fn atlas() -> LayeredAtlas {
    LayeredAtlas::new(RegionInfo::new(0, "void", [0, 0, 0]))
        .with_layer(-6e-3, -2e-3, RegionInfo::new(382, "CA1", [126, 208, 75]))
        .unwrap()
        .with_layer(-2e-3, 1e-3, RegionInfo::new(688, "CTX", [176, 255, 184]))
        .unwrap()
}

#[test]
fn test_custom_probe_channels_follow_the_track() {
    let runtime = runtime();
    let repo = repo();
    let session = open(&repo, &runtime);

    let channels = session.project_channels(None, None).unwrap();
    assert_eq!(channels.len(), 4);

    // Contact zero sits 200 um above the deepest pick
    for (i, xyz) in channels.iter().enumerate() {
        let expected_z = -3.8e-3 + i as f64 * 1e-3;
        assert!((xyz.z - expected_z).abs() < 1e-6, "channel {} at {}", i, xyz.z);
        assert!(xyz.x.abs() < 1e-6);
    }
}

#[test]
fn test_regions_along_initial_alignment() {
    let runtime = runtime();
    let repo = repo();
    let session = open(&repo, &runtime);

    let segments = session
        .segment_regions(None, &atlas(), &runtime.segmenter, &CancelToken::new())
        .unwrap();
    let acronyms: BTreeSet<&str> = segments.iter().map(|s| s.acronym.as_str()).collect();
    assert_eq!(segments.len(), 2);
    assert_eq!(acronyms, BTreeSet::from(["CA1", "CTX"]));

    for segment in &segments {
        assert!(segment.feature_interval_um[0] <= segment.feature_interval_um[1]);
    }
}

#[test]
fn test_cancelled_segmentation() {
    let runtime = runtime();
    let repo = repo();
    let session = open(&repo, &runtime);

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = session
        .segment_regions(None, &atlas(), &runtime.segmenter, &cancel)
        .unwrap_err();
    assert!(matches!(
        err,
        QcError::Geometry {
            source: GeometryError::Cancelled,
            ..
        }
    ));
}

#[test]
fn test_two_raters_agree_and_record_is_persisted() {
    let runtime = runtime();
    let repo = repo();
    let session = open(&repo, &runtime);

    let start = session.initial_alignment().unwrap();
    for raw in ["2021-03-01T10:00:00_alice", "2021-03-02T11:30:00_bob"] {
        session
            .add_alignment(
                &repo,
                raw.parse().unwrap(),
                start.feature().to_vec(),
                start.track().to_vec(),
            )
            .unwrap();
    }

    let verdict = session.verdict().unwrap();
    assert_eq!(verdict.qc, QcState::Pass);
    assert!(verdict.resolved);
    assert_eq!(verdict.agreement_score, Some(1.0));

    let record = repo.qc_record(INSERTION).unwrap();
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["qc"], "PASS");
    assert_eq!(json["extended_qc"]["_alignment_number"], 2);
    assert_eq!(json["extended_qc"]["_alignment_resolved"], 1);
    assert_eq!(
        json["extended_qc"]["_alignment_stored"],
        "2021-03-02T11:30:00_bob"
    );

    let trajectory = repo.trajectory(INSERTION);
    assert_eq!(trajectory.len(), 2);
}

#[test]
fn test_invalid_probe_layout_is_reported() {
    let dir = tempdir().unwrap();
    let path = write_config(
        dir.path(),
        "[probe]\nmodel = \"custom\"\ncontact_depths_um = [100.0, 50.0]\n",
    );
    let config = load_config(Some(&path), None).unwrap();
    assert!(matches!(
        AlignRuntime::from_config(&config),
        Err(SettingsError::Config(_))
    ));
}
