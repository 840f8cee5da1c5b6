// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # ephys-align
//!
//! Maps electrophysiology recording channels on a linear neural probe to
//! 3-D brain coordinates and anatomical regions, and reconciles the
//! alignments contributed by several people into one trusted alignment with
//! a QC verdict.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! ephys-align = "0.1"
//! ```
//!
//! ```rust,no_run
//! use ephys_align::prelude::*;
//!
//! let config = ephys_align::config::load_config_or_default(None)?;
//! let runtime = AlignRuntime::from_config(&config)?;
//!
//! let repo = InMemoryRepository::new();
//! let surface = SlabSurface::new(0.0, -6e-3)?;
//! let session = InsertionSession::open(&repo, &surface, "probe00", runtime.session.clone())?;
//!
//! let key = AlignmentKey::now("olivier")?;
//! let start = session.initial_alignment()?;
//! session.add_alignment(&repo, key, start.feature().to_vec(), start.track().to_vec())?;
//! println!("{:?}", session.verdict());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Feature Flags
//!
//! - **`file-logging`** (default): rolling JSON log files via `tracing-appender`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: ephys-align-config, -observability         │
//! │  (TOML + overrides, tracing setup)                      │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Algorithms: ephys-align-geometry                       │
//! │  (Track, DepthWarp, channel projection, regions)        │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  QC: ephys-align-qc                                     │
//! │  (Alignment store, consensus, persisted verdicts)       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Units
//!
//! Configuration is written in micrometers; everything past [`settings`] is
//! in meters.
//!
//! ## License
//!
//! Apache-2.0

pub use ephys_align_config as config;
pub use ephys_align_geometry as geometry;
pub use ephys_align_observability as observability;
pub use ephys_align_qc as qc;

pub mod settings;

pub use settings::{AlignRuntime, SettingsError, SettingsResult};

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::AlignConfig;
    pub use crate::geometry::{
        AtlasLookup, BrainSurface, CancelToken, ChannelProjector, DepthWarp, GeometryError,
        LayeredAtlas, ProbeGeometry, RegionInfo, RegionSegment, RegionSegmenter, SlabSurface,
        Track, TrackBuilder, Xyz,
    };
    pub use crate::qc::{
        AlignmentKey, AlignmentStore, ConsensusResolver, InMemoryRepository, InsertionRepository,
        InsertionSession, QcError, QcRecord, QcState, Resolution, SessionConfig, Verdict,
    };
    pub use crate::settings::AlignRuntime;
}
