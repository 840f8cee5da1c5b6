// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Agreement between two alignments.

Both alignments project the same reference channels onto the track; the
score is `clamp(1 - rms / L, 0, 1)` where `rms` is the root-mean-square
distance between matching channel positions and `L` a length scale
(100 µm by default). Identical projections score exactly 1 and the score
only drops as the channels move apart.
*/

use ephys_align_geometry::Xyz;

use crate::types::{QcError, QcResult};

/// Score at or above which two alignments count as agreeing
pub const DEFAULT_AGREEMENT_THRESHOLD: f64 = 0.8;

/// RMS displacement that drives the score to zero
pub const DEFAULT_RMS_LENGTH_SCALE_M: f64 = 100e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgreementScorer {
    length_scale: f64,
}

impl Default for AgreementScorer {
    fn default() -> Self {
        Self {
            length_scale: DEFAULT_RMS_LENGTH_SCALE_M,
        }
    }
}

impl AgreementScorer {
    pub fn new(length_scale: f64) -> QcResult<Self> {
        if !length_scale.is_finite() || length_scale <= 0.0 {
            return Err(QcError::InvalidParameter(format!(
                "RMS length scale must be positive, got {}",
                length_scale
            )));
        }
        Ok(Self { length_scale })
    }

    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    /// Root-mean-square distance between matching points
    pub fn rms_displacement(&self, a: &[Xyz], b: &[Xyz]) -> QcResult<f64> {
        if a.len() != b.len() {
            return Err(QcError::InvalidParameter(format!(
                "cannot compare {} channel positions with {}",
                a.len(),
                b.len()
            )));
        }
        if a.is_empty() {
            return Err(QcError::InvalidParameter(
                "no channel positions to compare".to_string(),
            ));
        }
        let sum: f64 = a.iter().zip(b).map(|(p, q)| (p - q).norm_squared()).sum();
        Ok((sum / a.len() as f64).sqrt())
    }

    /// Agreement in `[0, 1]`, symmetric in its arguments
    pub fn score(&self, a: &[Xyz], b: &[Xyz]) -> QcResult<f64> {
        let rms = self.rms_displacement(a, b)?;
        Ok((1.0 - rms / self.length_scale).clamp(0.0, 1.0))
    }
}
