// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! This module checks that configuration values are within valid ranges and
//! consistent with each other. Every problem is collected before failing, so
//! one run reports the whole list.

use crate::types::{PROBE_MODEL_CUSTOM, PROBE_MODEL_NEUROPIXELS_1};
use crate::{AlignConfig, ConfigError, ConfigResult};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    NotPositive { field: String, value: f64 },
    OutOfRange { field: String, reason: String },
    UnknownProbeModel { model: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPositive { field, value } => {
                write!(f, "{} = {} must be a positive finite number", field, value)
            }
            Self::OutOfRange { field, reason } => write!(f, "{} {}", field, reason),
            Self::UnknownProbeModel { model } => write!(
                f,
                "probe.model = '{}' is unknown (expected '{}' or '{}')",
                model, PROBE_MODEL_NEUROPIXELS_1, PROBE_MODEL_CUSTOM
            ),
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Positive lengths (tip clearance, sample step, RMS scale)
/// - Agreement threshold in (0, 1]
/// - At least 4 picks per line fit
/// - Known probe model, and usable custom contact depths
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` with details if validation fails
pub fn validate_config(config: &AlignConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_geometry(config, &mut errors);
    validate_consensus(config, &mut errors);
    validate_probe(config, &mut errors);
    validate_logging(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn require_positive(field: &str, value: f64, errors: &mut Vec<ConfigValidationError>) {
    if !value.is_finite() || value <= 0.0 {
        errors.push(ConfigValidationError::NotPositive {
            field: field.to_string(),
            value,
        });
    }
}

fn validate_geometry(config: &AlignConfig, errors: &mut Vec<ConfigValidationError>) {
    let geometry = &config.geometry;
    // zero clearance is allowed, negative is not
    if !geometry.tip_clearance_um.is_finite() || geometry.tip_clearance_um < 0.0 {
        errors.push(ConfigValidationError::OutOfRange {
            field: "geometry.tip_clearance_um".to_string(),
            reason: format!("= {} must be >= 0", geometry.tip_clearance_um),
        });
    }
    require_positive(
        "geometry.region_sample_step_um",
        geometry.region_sample_step_um,
        errors,
    );
    if geometry.min_picks < 4 {
        errors.push(ConfigValidationError::OutOfRange {
            field: "geometry.min_picks".to_string(),
            reason: format!("= {} must be at least 4", geometry.min_picks),
        });
    }
}

fn validate_consensus(config: &AlignConfig, errors: &mut Vec<ConfigValidationError>) {
    let consensus = &config.consensus;
    let threshold = consensus.agreement_threshold;
    if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
        errors.push(ConfigValidationError::OutOfRange {
            field: "consensus.agreement_threshold".to_string(),
            reason: format!("= {} must be in (0, 1]", threshold),
        });
    }
    require_positive(
        "consensus.rms_length_scale_um",
        consensus.rms_length_scale_um,
        errors,
    );
}

fn validate_probe(config: &AlignConfig, errors: &mut Vec<ConfigValidationError>) {
    let probe = &config.probe;
    match probe.model.as_str() {
        PROBE_MODEL_NEUROPIXELS_1 => {}
        PROBE_MODEL_CUSTOM => {
            let depths = &probe.contact_depths_um;
            if depths.is_empty() {
                errors.push(ConfigValidationError::InvalidValue {
                    field: "probe.contact_depths_um".to_string(),
                    reason: "custom probe needs at least one contact depth".to_string(),
                });
            } else if depths.iter().any(|d| !d.is_finite())
                || depths.windows(2).any(|w| w[1] <= w[0])
            {
                errors.push(ConfigValidationError::InvalidValue {
                    field: "probe.contact_depths_um".to_string(),
                    reason: "contact depths must be finite and strictly increasing".to_string(),
                });
            }
        }
        other => errors.push(ConfigValidationError::UnknownProbeModel {
            model: other.to_string(),
        }),
    }
}

fn validate_logging(config: &AlignConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.logging.level.to_lowercase();
    if !matches!(
        level.as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!(
                "'{}' must be one of trace, debug, info, warn, error",
                config.logging.level
            ),
        });
    }
}
