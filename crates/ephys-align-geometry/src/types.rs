// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Core types for track geometry.
*/

/// 3-D coordinate in meters (x, y, z), z pointing up out of the brain
pub type Xyz = nalgebra::Vector3<f64>;

/// Probe tip clearance applied at the extrapolated entry and exit points
pub const TIP_CLEARANCE_M: f64 = 200e-6;

/// Arc-length step used when sampling a track for region labels
pub const REGION_SAMPLE_STEP_M: f64 = 10e-6;

/// Fewest picks that still leave a line fit at each end of the track
pub const MIN_PICKS: usize = 4;

/// Result type for geometry operations
pub type GeometryResult<T> = Result<T, GeometryError>;

/// Errors that can occur while building or querying a track
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("Insufficient picks: found {found}, need at least {required}")]
    InsufficientPicks { found: usize, required: usize },

    #[error("Degenerate line fit: picks do not span a direction")]
    DegenerateFit,

    #[error("Alignment is not strictly increasing on the {axis} axis at knot {index}")]
    NonMonotonicAlignment { axis: &'static str, index: usize },

    #[error("Invalid alignment: {0}")]
    InvalidAlignment(String),

    #[error("Depth {value} outside alignment range [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("Arc length {arc_length} outside track of length {track_length}")]
    TrackBounds { arc_length: f64, track_length: f64 },

    #[error("Atlas lookup failed: {0}")]
    Atlas(String),

    #[error("Brain surface extrapolation failed: {0}")]
    Surface(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Operation cancelled")]
    Cancelled,
}
