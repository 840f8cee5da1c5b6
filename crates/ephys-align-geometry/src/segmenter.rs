// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Region segmentation along a track.

The track is sampled at a fixed arc-length step across the alignment's
track range, every sample is labelled by the atlas, and runs of equal
region id become segments. Segment boundaries are the last sample before
each id change, so neighbouring segments share an endpoint and the
segments tile the sampled range without gaps.

Each segment takes its label and colour from the sample at its upper end.
This is a fixed tie-break, not a majority vote, and keeps the output
reproducible for a given track, alignment and atlas.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::atlas::AtlasLookup;
use crate::track::Track;
use crate::types::{GeometryError, GeometryResult, REGION_SAMPLE_STEP_M};
use crate::warp::DepthWarp;

const M_TO_UM: f64 = 1e6;

/// One contiguous anatomical region along the track, in feature space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSegment {
    pub region_id: i64,
    pub acronym: String,
    pub rgb: [u8; 3],
    /// Lower and upper feature depth in micrometers
    pub feature_interval_um: [f64; 2],
    pub mean_feature_depth_um: f64,
}

/// Cooperative cancellation flag, cheap to clone and share
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionSegmenter {
    step: f64,
}

impl Default for RegionSegmenter {
    fn default() -> Self {
        Self {
            step: REGION_SAMPLE_STEP_M,
        }
    }
}

impl RegionSegmenter {
    pub fn new(step: f64) -> GeometryResult<Self> {
        if !step.is_finite() || step <= 0.0 {
            return Err(GeometryError::InvalidParameter(format!(
                "sample step must be positive, got {}",
                step
            )));
        }
        Ok(Self { step })
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Segment the track into regions for one alignment
    pub fn segment(
        &self,
        track: &Track,
        warp: &DepthWarp,
        atlas: &dyn AtlasLookup,
    ) -> GeometryResult<Vec<RegionSegment>> {
        self.segment_cancellable(track, warp, atlas, &CancelToken::new())
    }

    /// Same as [`segment`](Self::segment), checking `cancel` between samples
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::Cancelled` if the token fires before the
    /// result is assembled, plus any projection or atlas error.
    pub fn segment_cancellable(
        &self,
        track: &Track,
        warp: &DepthWarp,
        atlas: &dyn AtlasLookup,
        cancel: &CancelToken,
    ) -> GeometryResult<Vec<RegionSegment>> {
        let (start, end) = warp.track_range();
        let stop = end - self.step;

        let mut sample_depths = Vec::new();
        let mut sample_xyz = Vec::new();
        let mut i = 0usize;
        loop {
            let depth = start + i as f64 * self.step;
            if depth >= stop {
                break;
            }
            if cancel.is_cancelled() {
                return Err(GeometryError::Cancelled);
            }
            sample_xyz.push(track.point_at(depth - start)?);
            sample_depths.push(depth);
            i += 1;
        }

        if sample_depths.is_empty() {
            return Err(GeometryError::InvalidParameter(format!(
                "alignment spans {:.1} um, too short for a {:.1} um sample step",
                (end - start) * M_TO_UM,
                self.step * M_TO_UM
            )));
        }

        let regions = atlas.classify_region(&sample_xyz)?;
        if regions.len() != sample_xyz.len() {
            return Err(GeometryError::Atlas(format!(
                "atlas returned {} regions for {} samples",
                regions.len(),
                sample_xyz.len()
            )));
        }
        if cancel.is_cancelled() {
            return Err(GeometryError::Cancelled);
        }

        let boundaries: Vec<usize> = regions
            .windows(2)
            .enumerate()
            .filter(|(_, w)| w[0].id != w[1].id)
            .map(|(i, _)| i)
            .collect();

        let last = regions.len() - 1;
        let mut segments = Vec::with_capacity(boundaries.len() + 1);
        for b in 0..=boundaries.len() {
            let lo = if b == 0 { 0 } else { boundaries[b - 1] };
            let hi = if b == boundaries.len() { last } else { boundaries[b] };

            let region = &regions[hi];
            let (d_lo, d_hi) = (sample_depths[lo], sample_depths[hi]);
            let mean = (d_lo + d_hi) / 2.0;

            segments.push(RegionSegment {
                region_id: region.id,
                acronym: region.acronym.clone(),
                rgb: region.rgb,
                feature_interval_um: [
                    warp.to_feature(d_lo)? * M_TO_UM,
                    warp.to_feature(d_hi)? * M_TO_UM,
                ],
                mean_feature_depth_um: warp.to_feature(mean)? * M_TO_UM,
            });
        }

        debug!(
            target: "ephys-align-geometry",
            "Segmented {} samples into {} regions",
            regions.len(),
            segments.len()
        );
        Ok(segments)
    }
}
