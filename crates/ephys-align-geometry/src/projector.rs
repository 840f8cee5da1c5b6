// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Channel projection onto the track.

Two steps per channel:
1. warp its feature depth to track depth and subtract the alignment origin,
   giving an arc length measured from the deepest track point
2. walk the track polyline to that arc length
*/

use crate::probe::ProbeGeometry;
use crate::track::Track;
use crate::types::{GeometryResult, Xyz};
use crate::warp::DepthWarp;

/// Projects channel depths through one alignment onto a track
#[derive(Debug, Clone, Default)]
pub struct ChannelProjector {
    probe: ProbeGeometry,
}

impl ChannelProjector {
    pub fn new(probe: ProbeGeometry) -> Self {
        Self { probe }
    }

    pub fn probe(&self) -> &ProbeGeometry {
        &self.probe
    }

    /// 3-D coordinates (meters) for each channel, in input order
    ///
    /// `channel_depths` defaults to the probe's contact depths.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::OutOfRange` for depths outside the warp and
    /// `GeometryError::TrackBounds` for arc lengths beyond the track.
    pub fn project(
        &self,
        track: &Track,
        warp: &DepthWarp,
        channel_depths: Option<&[f64]>,
    ) -> GeometryResult<Vec<Xyz>> {
        let depths = channel_depths.unwrap_or_else(|| self.probe.contact_depths());
        project_depths(track, warp, depths)
    }
}

/// Project arbitrary feature depths through `warp` onto `track`
pub fn project_depths(
    track: &Track,
    warp: &DepthWarp,
    feature_depths: &[f64],
) -> GeometryResult<Vec<Xyz>> {
    let origin = warp.origin();
    feature_depths
        .iter()
        .map(|&depth| track.point_at(warp.to_track(depth)? - origin))
        .collect()
}
