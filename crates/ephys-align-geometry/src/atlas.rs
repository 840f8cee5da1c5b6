// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Atlas lookup collaborator.

The real atlas (label volume plus region ontology) lives outside this
crate. [`LayeredAtlas`] is a small stand-in made of horizontal bands, good
enough for tests and offline checks.
*/

use serde::{Deserialize, Serialize};

use crate::types::{GeometryError, GeometryResult, Xyz};

/// Anatomical region record returned by an atlas
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionInfo {
    pub id: i64,
    pub acronym: String,
    pub rgb: [u8; 3],
}

impl RegionInfo {
    pub fn new(id: i64, acronym: impl Into<String>, rgb: [u8; 3]) -> Self {
        Self {
            id,
            acronym: acronym.into(),
            rgb,
        }
    }
}

/// Vectorised point-to-region classification
///
/// Implementations must return exactly one record per input point, in
/// input order.
pub trait AtlasLookup: Send + Sync {
    fn classify_region(&self, xyz: &[Xyz]) -> GeometryResult<Vec<RegionInfo>>;
}

#[derive(Debug, Clone)]
struct AtlasLayer {
    bottom_z: f64,
    top_z: f64,
    region: RegionInfo,
}

/// Atlas made of horizontal bands `[bottom_z, top_z)`
#[derive(Debug, Clone)]
pub struct LayeredAtlas {
    layers: Vec<AtlasLayer>,
    void: RegionInfo,
}

impl LayeredAtlas {
    /// Empty atlas where every point falls in `void`
    pub fn new(void: RegionInfo) -> Self {
        Self {
            layers: Vec::new(),
            void,
        }
    }

    /// Add a band
    ///
    /// # Errors
    ///
    /// Returns error if the band is empty or overlaps an existing one.
    pub fn with_layer(
        mut self,
        bottom_z: f64,
        top_z: f64,
        region: RegionInfo,
    ) -> GeometryResult<Self> {
        if !bottom_z.is_finite() || !top_z.is_finite() || bottom_z >= top_z {
            return Err(GeometryError::InvalidParameter(format!(
                "atlas layer {} has bottom {} not below top {}",
                region.acronym, bottom_z, top_z
            )));
        }
        if let Some(existing) = self
            .layers
            .iter()
            .find(|l| bottom_z < l.top_z && l.bottom_z < top_z)
        {
            return Err(GeometryError::InvalidParameter(format!(
                "atlas layer {} overlaps {}",
                region.acronym, existing.region.acronym
            )));
        }
        self.layers.push(AtlasLayer {
            bottom_z,
            top_z,
            region,
        });
        Ok(self)
    }

    fn region_at(&self, point: &Xyz) -> &RegionInfo {
        self.layers
            .iter()
            .find(|l| l.bottom_z <= point.z && point.z < l.top_z)
            .map(|l| &l.region)
            .unwrap_or(&self.void)
    }
}

impl AtlasLookup for LayeredAtlas {
    fn classify_region(&self, xyz: &[Xyz]) -> GeometryResult<Vec<RegionInfo>> {
        Ok(xyz.iter().map(|p| self.region_at(p).clone()).collect())
    }
}
