// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration to runtime parameters
//!
//! The configuration file speaks micrometers; the member crates work in
//! meters. Every conversion happens here.

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::config::{validate_config, AlignConfig, ConfigError};
use crate::geometry::{
    ChannelProjector, GeometryError, ProbeGeometry, RegionSegmenter, TrackBuilder,
};
use crate::observability::CrateDebugFlags;
use crate::qc::{AgreementScorer, ConsensusResolver, QcError, SessionConfig};

const UM_TO_M: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Qc(#[from] QcError),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

pub fn track_builder(config: &AlignConfig) -> SettingsResult<TrackBuilder> {
    Ok(TrackBuilder::new(
        config.geometry.tip_clearance_um * UM_TO_M,
        config.geometry.min_picks,
    )?)
}

pub fn region_segmenter(config: &AlignConfig) -> SettingsResult<RegionSegmenter> {
    Ok(RegionSegmenter::new(
        config.geometry.region_sample_step_um * UM_TO_M,
    )?)
}

pub fn probe_geometry(config: &AlignConfig) -> SettingsResult<ProbeGeometry> {
    if config.probe.is_custom() {
        let depths = config
            .probe
            .contact_depths_um
            .iter()
            .map(|d| d * UM_TO_M)
            .collect();
        Ok(ProbeGeometry::custom(depths)?)
    } else {
        Ok(ProbeGeometry::neuropixels_1())
    }
}

pub fn consensus_resolver(config: &AlignConfig) -> SettingsResult<ConsensusResolver> {
    let scorer = AgreementScorer::new(config.consensus.rms_length_scale_um * UM_TO_M)?;
    Ok(ConsensusResolver::new(
        ChannelProjector::new(probe_geometry(config)?),
        scorer,
        config.consensus.agreement_threshold,
    )?)
}

pub fn session_config(config: &AlignConfig) -> SettingsResult<SessionConfig> {
    Ok(SessionConfig {
        builder: track_builder(config)?,
        resolver: consensus_resolver(config)?,
        supersede_same_author: config.consensus.supersede_same_author,
    })
}

/// Debug flags from the process plus the configured base level
pub fn debug_flags(config: &AlignConfig) -> CrateDebugFlags {
    crate::observability::parse_debug_flags().with_base_level(config.logging.level.clone())
}

/// Everything a caller needs to run sessions, built from one configuration
#[derive(Debug, Clone)]
pub struct AlignRuntime {
    pub session: SessionConfig,
    pub segmenter: RegionSegmenter,
    pub log_dir: PathBuf,
}

impl AlignRuntime {
    /// Validate `config` and convert it
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Config` with every validation problem, or the
    /// first parameter a member crate rejects.
    pub fn from_config(config: &AlignConfig) -> SettingsResult<Self> {
        validate_config(config)?;
        let runtime = Self {
            session: session_config(config)?,
            segmenter: region_segmenter(config)?,
            log_dir: config.logging.log_dir.clone(),
        };
        info!(
            target: "ephys-align",
            "Runtime ready: probe {}, threshold {}, tip clearance {} um",
            config.probe.model,
            config.consensus.agreement_threshold,
            config.geometry.tip_clearance_um
        );
        Ok(runtime)
    }
}

/// Start console and file logging as configured
#[cfg(feature = "file-logging")]
pub fn init_logging(
    config: &AlignConfig,
) -> anyhow::Result<crate::observability::LoggingGuard> {
    crate::observability::init_logging(
        &debug_flags(config),
        Some(config.logging.log_dir.clone()),
        Some(config.logging.retention_days),
        Some(config.logging.retention_runs),
    )
}
