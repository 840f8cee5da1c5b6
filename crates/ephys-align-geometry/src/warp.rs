// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Piecewise-linear depth warp between feature depth and track depth.

One warp belongs to one alignment. Knots are `(feature[i], track[i])`
pairs, strictly increasing on both axes, so the mapping is a bijection on
the knot range. Queries outside that range are caller bugs and fail with
`GeometryError::OutOfRange` instead of being clamped.
*/

use crate::types::{GeometryError, GeometryResult};

/// Depths this close outside the knot range are treated as on the boundary
const RANGE_TOLERANCE_M: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct DepthWarp {
    feature: Vec<f64>,
    track: Vec<f64>,
}

impl DepthWarp {
    /// Create a warp from knot sequences
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::InvalidAlignment` for mismatched lengths,
    /// fewer than two knots or non-finite values, and
    /// `GeometryError::NonMonotonicAlignment` when either sequence fails
    /// to increase strictly.
    pub fn new(feature: Vec<f64>, track: Vec<f64>) -> GeometryResult<Self> {
        if feature.len() != track.len() {
            return Err(GeometryError::InvalidAlignment(format!(
                "feature has {} knots but track has {}",
                feature.len(),
                track.len()
            )));
        }
        if feature.len() < 2 {
            return Err(GeometryError::InvalidAlignment(format!(
                "need at least 2 knots, got {}",
                feature.len()
            )));
        }
        if feature.iter().chain(track.iter()).any(|v| !v.is_finite()) {
            return Err(GeometryError::InvalidAlignment(
                "knot with non-finite depth".to_string(),
            ));
        }

        check_increasing(&feature, "feature")?;
        check_increasing(&track, "track")?;

        Ok(Self { feature, track })
    }

    pub fn feature(&self) -> &[f64] {
        &self.feature
    }

    pub fn track(&self) -> &[f64] {
        &self.track
    }

    pub fn knot_count(&self) -> usize {
        self.feature.len()
    }

    /// Track depth of the first knot, the reference origin of the alignment
    pub fn origin(&self) -> f64 {
        self.track[0]
    }

    pub fn feature_range(&self) -> (f64, f64) {
        (self.feature[0], self.feature[self.feature.len() - 1])
    }

    pub fn track_range(&self) -> (f64, f64) {
        (self.track[0], self.track[self.track.len() - 1])
    }

    pub fn to_track(&self, feature_depth: f64) -> GeometryResult<f64> {
        interpolate(&self.feature, &self.track, feature_depth)
    }

    pub fn to_feature(&self, track_depth: f64) -> GeometryResult<f64> {
        interpolate(&self.track, &self.feature, track_depth)
    }

    pub fn to_track_all(&self, feature_depths: &[f64]) -> GeometryResult<Vec<f64>> {
        feature_depths.iter().map(|&d| self.to_track(d)).collect()
    }

    pub fn to_feature_all(&self, track_depths: &[f64]) -> GeometryResult<Vec<f64>> {
        track_depths.iter().map(|&d| self.to_feature(d)).collect()
    }
}

fn check_increasing(values: &[f64], axis: &'static str) -> GeometryResult<()> {
    match values.windows(2).position(|w| w[1] <= w[0]) {
        Some(i) => Err(GeometryError::NonMonotonicAlignment {
            axis,
            index: i + 1,
        }),
        None => Ok(()),
    }
}

fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> GeometryResult<f64> {
    let (min, max) = (xs[0], xs[xs.len() - 1]);
    if !x.is_finite() || x < min - RANGE_TOLERANCE_M || x > max + RANGE_TOLERANCE_M {
        return Err(GeometryError::OutOfRange { value: x, min, max });
    }
    let x = x.clamp(min, max);

    let idx = xs.partition_point(|&v| v < x);
    if idx == 0 {
        return Ok(ys[0]);
    }
    if xs[idx] == x {
        return Ok(ys[idx]);
    }
    let t = (x - xs[idx - 1]) / (xs[idx] - xs[idx - 1]);
    Ok(ys[idx - 1] + t * (ys[idx] - ys[idx - 1]))
}
