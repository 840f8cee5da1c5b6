// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Probe hardware geometry: contact depths measured up from the tip.

use crate::types::{GeometryError, GeometryResult};

const NP1_CHANNELS: usize = 384;
const NP1_ROW_PITCH_M: f64 = 20e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeGeometry {
    model: String,
    contact_depths: Vec<f64>,
}

impl ProbeGeometry {
    /// Neuropixels 1.0 layout: 384 contacts, two per row, 20 um row pitch
    pub fn neuropixels_1() -> Self {
        let contact_depths = (0..NP1_CHANNELS)
            .map(|ch| (ch / 2 + 1) as f64 * NP1_ROW_PITCH_M)
            .collect();
        Self {
            model: "neuropixels-1.0".to_string(),
            contact_depths,
        }
    }

    /// Probe with caller-supplied contact depths in meters
    ///
    /// # Errors
    ///
    /// Returns error if the list is empty, has non-finite values or
    /// decreases anywhere.
    pub fn custom(contact_depths: Vec<f64>) -> GeometryResult<Self> {
        if contact_depths.is_empty() {
            return Err(GeometryError::InvalidParameter(
                "probe needs at least one contact".to_string(),
            ));
        }
        if contact_depths.iter().any(|d| !d.is_finite()) {
            return Err(GeometryError::InvalidParameter(
                "contact depth is not finite".to_string(),
            ));
        }
        if let Some(i) = contact_depths.windows(2).position(|w| w[1] < w[0]) {
            return Err(GeometryError::InvalidParameter(format!(
                "contact depths decrease at channel {}",
                i + 1
            )));
        }
        Ok(Self {
            model: "custom".to_string(),
            contact_depths,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn channel_count(&self) -> usize {
        self.contact_depths.len()
    }

    pub fn contact_depths(&self) -> &[f64] {
        &self.contact_depths
    }
}

impl Default for ProbeGeometry {
    fn default() -> Self {
        Self::neuropixels_1()
    }
}
