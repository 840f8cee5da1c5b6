// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# Probe Track Geometry

This crate turns sparse histology picks into an insertion track and answers
every geometric question asked against one alignment of that track:
- Track building (line fits through the picks, brain entry/exit extrapolation)
- Depth warps between electrophysiology feature depth and physical track depth
- Channel projection onto 3-D coordinates
- Segmentation of the track into anatomical regions

## Units

Every function works in meters. Micrometers only appear in
[`RegionSegment`] fields, which are meant for display and QC reports.

## Data Flow

```text
picks ──► TrackBuilder ──► Track
                             │
   alignment ──► DepthWarp ──┤
                             ├──► ChannelProjector ──► channel xyz
                             └──► RegionSegmenter  ──► region segments
                                        ▲
                                  AtlasLookup
```
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod atlas;
pub mod probe;
pub mod projector;
pub mod segmenter;
pub mod track;
pub mod types;
pub mod warp;

pub use atlas::{AtlasLookup, LayeredAtlas, RegionInfo};
pub use probe::ProbeGeometry;
pub use projector::ChannelProjector;
pub use segmenter::{CancelToken, RegionSegment, RegionSegmenter};
pub use track::{BrainSurface, LineFit, SlabSurface, Track, TrackBuilder};
pub use types::{GeometryError, GeometryResult, Xyz, TIP_CLEARANCE_M};
pub use warp::DepthWarp;
