// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `ephys_align.toml`. Lengths are written in micrometers, the unit people
//! read off histology and probe sheets; conversion to meters happens where
//! the values are handed to the geometry code.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Probe model with a built-in contact layout
pub const PROBE_MODEL_NEUROPIXELS_1: &str = "neuropixels-1.0";

/// Probe model whose contact depths come from `contact_depths_um`
pub const PROBE_MODEL_CUSTOM: &str = "custom";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AlignConfig {
    pub geometry: GeometryConfig,
    pub consensus: ConsensusConfig,
    pub probe: ProbeConfig,
    pub logging: LoggingConfig,
}

/// Track building and region sampling
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Margin added beyond the extrapolated entry and exit points
    pub tip_clearance_um: f64,
    /// Arc-length step between atlas samples along the track
    pub region_sample_step_um: f64,
    pub min_picks: usize,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            tip_clearance_um: 200.0,
            region_sample_step_um: 10.0,
            min_picks: 4,
        }
    }
}

/// Multi-rater agreement
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub agreement_threshold: f64,
    /// RMS channel displacement at which agreement reaches zero
    pub rms_length_scale_um: f64,
    pub supersede_same_author: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            agreement_threshold: 0.8,
            rms_length_scale_um: 100.0,
            supersede_same_author: true,
        }
    }
}

/// Probe contact layout
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub model: String,
    /// Only read when `model = "custom"`
    pub contact_depths_um: Vec<f64>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            model: PROBE_MODEL_NEUROPIXELS_1.to_string(),
            contact_depths_um: Vec::new(),
        }
    }
}

impl ProbeConfig {
    pub fn is_custom(&self) -> bool {
        self.model == PROBE_MODEL_CUSTOM
    }
}

/// Log output
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: PathBuf,
    pub retention_days: u64,
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("./logs"),
            retention_days: 30,
            retention_runs: 10,
        }
    }
}
