// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Insertion track construction.

A [`Track`] is the polyline the probe followed through the brain. It is
built once from the histology picks plus two extrapolated points (where the
fitted trajectory leaves the brain at the bottom and enters it at the top)
and is never modified afterwards. If the picks change, build a new track.

By convention the deepest point is index 0, so the track runs upward.
*/

use nalgebra::Matrix3;
use tracing::debug;

use crate::types::{GeometryError, GeometryResult, Xyz, MIN_PICKS, TIP_CLEARANCE_M};
use crate::warp::DepthWarp;

/// Arc lengths this close outside the track still count as on the track
const ARC_TOLERANCE_M: f64 = 1e-12;

/// Straight line fitted through a set of 3-D points
///
/// The direction is the principal axis of the point scatter, oriented so
/// it points upward (non-negative z).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub centroid: Xyz,
    pub direction: Xyz,
}

impl LineFit {
    /// Total-least-squares fit through `points`
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::DegenerateFit` for fewer than two points or
    /// when all points coincide.
    pub fn fit(points: &[Xyz]) -> GeometryResult<Self> {
        if points.len() < 2 {
            return Err(GeometryError::DegenerateFit);
        }

        let n = points.len() as f64;
        let centroid = points.iter().fold(Xyz::zeros(), |acc, p| acc + p) / n;

        let scatter = points.iter().fold(Matrix3::<f64>::zeros(), |acc, p| {
            let d = p - centroid;
            acc + d * d.transpose()
        });

        let eigen = scatter.symmetric_eigen();
        let (axis, largest) = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, v)| (i, *v))
            .ok_or(GeometryError::DegenerateFit)?;

        if !largest.is_finite() || largest <= 0.0 {
            return Err(GeometryError::DegenerateFit);
        }

        let mut direction: Xyz = eigen.eigenvectors.column(axis).into_owned().normalize();
        if direction.z < 0.0 {
            direction = -direction;
        }

        Ok(Self {
            centroid,
            direction,
        })
    }

    /// Point where the line crosses the horizontal plane at height `z`
    ///
    /// Returns `None` when the line runs parallel to the plane.
    pub fn point_at_z(&self, z: f64) -> Option<Xyz> {
        if self.direction.z.abs() < f64::EPSILON {
            return None;
        }
        let t = (z - self.centroid.z) / self.direction.z;
        Some(self.centroid + self.direction * t)
    }
}

/// Brain surface collaborator used to extrapolate a fitted line
///
/// Implementations intersect a line with an atlas boundary surface. The
/// entry point is where the upper fit meets the top of the brain, the
/// exit point is where the lower fit leaves it.
pub trait BrainSurface: Send + Sync {
    fn brain_entry(&self, line: &LineFit) -> GeometryResult<Xyz>;
    fn brain_exit(&self, line: &LineFit) -> GeometryResult<Xyz>;
}

/// Brain modelled as the slab between two horizontal planes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlabSurface {
    top_z: f64,
    bottom_z: f64,
}

impl SlabSurface {
    pub fn new(top_z: f64, bottom_z: f64) -> GeometryResult<Self> {
        if !top_z.is_finite() || !bottom_z.is_finite() || top_z <= bottom_z {
            return Err(GeometryError::InvalidParameter(format!(
                "slab top {} must lie above bottom {}",
                top_z, bottom_z
            )));
        }
        Ok(Self { top_z, bottom_z })
    }

    pub fn top_z(&self) -> f64 {
        self.top_z
    }

    pub fn bottom_z(&self) -> f64 {
        self.bottom_z
    }
}

impl BrainSurface for SlabSurface {
    fn brain_entry(&self, line: &LineFit) -> GeometryResult<Xyz> {
        line.point_at_z(self.top_z).ok_or_else(|| {
            GeometryError::Surface("trajectory runs parallel to the brain surface".to_string())
        })
    }

    fn brain_exit(&self, line: &LineFit) -> GeometryResult<Xyz> {
        line.point_at_z(self.bottom_z).ok_or_else(|| {
            GeometryError::Surface("trajectory runs parallel to the brain floor".to_string())
        })
    }
}

/// Immutable insertion track, deepest point first
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    points: Vec<Xyz>,
    cumulative: Vec<f64>,
}

impl Track {
    /// Create a track from raw points, sorting them deepest first
    ///
    /// # Errors
    ///
    /// Returns error if fewer than two points are given or any coordinate
    /// is not finite.
    pub fn from_points(mut points: Vec<Xyz>) -> GeometryResult<Self> {
        if points.len() < 2 {
            return Err(GeometryError::InsufficientPicks {
                found: points.len(),
                required: 2,
            });
        }
        if points.iter().any(|p| !p.iter().all(|c| c.is_finite())) {
            return Err(GeometryError::InvalidParameter(
                "track point with non-finite coordinate".to_string(),
            ));
        }

        points.sort_by(|a, b| a.z.total_cmp(&b.z));

        let mut cumulative = Vec::with_capacity(points.len());
        cumulative.push(0.0);
        for pair in points.windows(2) {
            let last = cumulative[cumulative.len() - 1];
            cumulative.push(last + (pair[1] - pair[0]).norm());
        }

        Ok(Self { points, cumulative })
    }

    pub fn points(&self) -> &[Xyz] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Deepest point (extrapolated brain exit for built tracks)
    pub fn exit(&self) -> Xyz {
        self.points[0]
    }

    /// Shallowest point (extrapolated brain entry for built tracks)
    pub fn entry(&self) -> Xyz {
        self.points[self.points.len() - 1]
    }

    /// Cumulative Euclidean distance from the first point, one per point
    pub fn cumulative_distance(&self) -> &[f64] {
        &self.cumulative
    }

    /// Total arc length of the polyline
    pub fn length(&self) -> f64 {
        self.cumulative[self.cumulative.len() - 1]
    }

    /// Position at `arc_length` meters along the track from its deepest point
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::TrackBounds` if the arc length is negative or
    /// longer than the track.
    pub fn point_at(&self, arc_length: f64) -> GeometryResult<Xyz> {
        let track_length = self.length();
        if !arc_length.is_finite()
            || arc_length < -ARC_TOLERANCE_M
            || arc_length > track_length + ARC_TOLERANCE_M
        {
            return Err(GeometryError::TrackBounds {
                arc_length,
                track_length,
            });
        }
        let arc = arc_length.clamp(0.0, track_length);

        let idx = self.cumulative.partition_point(|&c| c < arc);
        if idx == 0 {
            return Ok(self.points[0]);
        }

        let (c0, c1) = (self.cumulative[idx - 1], self.cumulative[idx]);
        let span = c1 - c0;
        if span <= 0.0 {
            return Ok(self.points[idx]);
        }
        let t = (arc - c0) / span;
        Ok(self.points[idx - 1].lerp(&self.points[idx], t))
    }

    /// Positions at each of `arc_lengths`, in order
    pub fn interpolate_along(&self, arc_lengths: &[f64]) -> GeometryResult<Vec<Xyz>> {
        arc_lengths.iter().map(|&a| self.point_at(a)).collect()
    }

    /// Starting alignment used before anyone has aligned this insertion
    ///
    /// Feature and track depths coincide and are offset so that zero sits
    /// `tip_clearance` above the deepest pick.
    pub fn initial_alignment(&self, tip_clearance: f64) -> GeometryResult<DepthWarp> {
        let tip_distance = self.cumulative[1] + tip_clearance;
        let knots = vec![-tip_distance, self.length() - tip_distance];
        DepthWarp::new(knots.clone(), knots)
    }
}

/// Picks used for each end fit: `n / 4` rounded half to even, at least 2
fn end_fit_len(n: usize) -> usize {
    let (quarter, rem) = (n / 4, n % 4);
    let rounded = match rem {
        0 | 1 => quarter,
        2 if quarter % 2 == 0 => quarter,
        _ => quarter + 1,
    };
    rounded.max(2)
}

/// Builds tracks from picks with a fixed tip clearance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackBuilder {
    tip_clearance: f64,
    min_picks: usize,
}

impl Default for TrackBuilder {
    fn default() -> Self {
        Self {
            tip_clearance: TIP_CLEARANCE_M,
            min_picks: MIN_PICKS,
        }
    }
}

impl TrackBuilder {
    pub fn new(tip_clearance: f64, min_picks: usize) -> GeometryResult<Self> {
        if !tip_clearance.is_finite() || tip_clearance < 0.0 {
            return Err(GeometryError::InvalidParameter(format!(
                "tip clearance must be non-negative, got {}",
                tip_clearance
            )));
        }
        if min_picks < MIN_PICKS {
            return Err(GeometryError::InvalidParameter(format!(
                "min_picks must be at least {}, got {}",
                MIN_PICKS, min_picks
            )));
        }
        Ok(Self {
            tip_clearance,
            min_picks,
        })
    }

    pub fn tip_clearance(&self) -> f64 {
        self.tip_clearance
    }

    pub fn min_picks(&self) -> usize {
        self.min_picks
    }

    /// Build a track from histology picks
    ///
    /// Lines are fitted through the shallowest and deepest quarter of the
    /// picks, extrapolated to the brain surface, and pushed outward by the
    /// tip clearance. The result is `[exit, picks.., entry]` sorted deepest
    /// first.
    ///
    /// # Errors
    ///
    /// Returns error if there are too few picks, a quarter is degenerate,
    /// or the surface collaborator cannot extrapolate.
    pub fn build(&self, picks: &[Xyz], surface: &dyn BrainSurface) -> GeometryResult<Track> {
        if picks.len() < self.min_picks {
            return Err(GeometryError::InsufficientPicks {
                found: picks.len(),
                required: self.min_picks,
            });
        }
        if picks.iter().any(|p| !p.iter().all(|c| c.is_finite())) {
            return Err(GeometryError::InvalidParameter(
                "pick with non-finite coordinate".to_string(),
            ));
        }

        // Shallowest first
        let mut ordered = picks.to_vec();
        ordered.sort_by(|a, b| b.z.total_cmp(&a.z));

        let n = ordered.len();
        let n_fit = end_fit_len(n);

        let mut entry = surface.brain_entry(&LineFit::fit(&ordered[..n_fit])?)?;
        entry.z += self.tip_clearance;

        let mut exit = surface.brain_exit(&LineFit::fit(&ordered[n - n_fit..])?)?;
        exit.z -= self.tip_clearance;

        let mut points = Vec::with_capacity(n + 2);
        points.push(exit);
        points.extend(ordered);
        points.push(entry);

        let track = Track::from_points(points)?;
        debug!(
            target: "ephys-align-geometry",
            "Built track from {} picks ({} per end fit), length {:.1} um",
            n,
            n_fit,
            track.length() * 1e6
        );
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertical_picks() -> Vec<Xyz> {
        (0..8)
            .map(|i| Xyz::new(1e-3, -2e-3, -4e-3 + i as f64 * 0.5e-3))
            .collect()
    }

    #[test]
    fn test_line_fit_recovers_direction() {
        let points: Vec<Xyz> = (0..5)
            .map(|i| Xyz::new(i as f64 * 1e-4, 0.0, i as f64 * 1e-3))
            .collect();
        let fit = LineFit::fit(&points).unwrap();
        let expected = Xyz::new(1e-4, 0.0, 1e-3).normalize();
        assert!((fit.direction - expected).norm() < 1e-9);
        assert!(fit.direction.z > 0.0);
    }

    #[test]
    fn test_line_fit_rejects_coincident_points() {
        let points = vec![Xyz::new(1.0, 1.0, 1.0); 3];
        assert_eq!(LineFit::fit(&points), Err(GeometryError::DegenerateFit));
    }

    #[test]
    fn test_slab_rejects_inverted_planes() {
        assert!(SlabSurface::new(-1.0, 0.0).is_err());
        assert!(SlabSurface::new(0.0, -1.0).is_ok());
    }

    #[test]
    fn test_build_adds_clearance_at_both_ends() {
        let surface = SlabSurface::new(0.0, -6e-3).unwrap();
        let track = TrackBuilder::default()
            .build(&vertical_picks(), &surface)
            .unwrap();

        assert_eq!(track.len(), 10);
        assert!((track.exit().z - (-6e-3 - TIP_CLEARANCE_M)).abs() < 1e-12);
        assert!((track.entry().z - TIP_CLEARANCE_M).abs() < 1e-12);
        assert!((track.length() - (6e-3 + 2.0 * TIP_CLEARANCE_M)).abs() < 1e-9);
    }

    #[test]
    fn test_end_fit_len_rounds_half_to_even() {
        assert_eq!(end_fit_len(4), 2);
        assert_eq!(end_fit_len(6), 2);
        assert_eq!(end_fit_len(8), 2);
        assert_eq!(end_fit_len(10), 2);
        assert_eq!(end_fit_len(11), 3);
        assert_eq!(end_fit_len(14), 4);
        assert_eq!(end_fit_len(18), 4);
        assert_eq!(end_fit_len(22), 6);
    }

    #[test]
    fn test_ten_picks_fit_two_per_end() {
        // Third-shallowest pick bent sideways; a two-point fit ignores it
        let mut picks: Vec<Xyz> = (0..10)
            .map(|i| Xyz::new(0.0, 0.0, -5e-3 + i as f64 * 0.5e-3))
            .collect();
        picks[7].x = 3e-4;

        let surface = SlabSurface::new(0.0, -6e-3).unwrap();
        let track = TrackBuilder::default().build(&picks, &surface).unwrap();

        let top_two = LineFit::fit(&[picks[9], picks[8]]).unwrap();
        let expected = surface.brain_entry(&top_two).unwrap();
        assert!((track.entry().x - expected.x).abs() < 1e-12);
        assert!(track.entry().x.abs() < 1e-12);
        assert!((track.entry().z - TIP_CLEARANCE_M).abs() < 1e-12);
    }

    #[test]
    fn test_build_requires_min_picks() {
        let surface = SlabSurface::new(0.0, -6e-3).unwrap();
        let picks = &vertical_picks()[..3];
        let err = TrackBuilder::default().build(picks, &surface).unwrap_err();
        assert_eq!(
            err,
            GeometryError::InsufficientPicks {
                found: 3,
                required: 4
            }
        );
    }

    #[test]
    fn test_point_at_interpolates_between_points() {
        let track = Track::from_points(vec![
            Xyz::new(0.0, 0.0, 1.0),
            Xyz::new(0.0, 0.0, 0.0),
            Xyz::new(0.0, 0.0, 3.0),
        ])
        .unwrap();
        assert_eq!(track.points()[0].z, 0.0);

        let p = track.point_at(2.5).unwrap();
        assert!((p.z - 2.5).abs() < 1e-12);
        assert_eq!(track.point_at(0.0).unwrap(), Xyz::new(0.0, 0.0, 0.0));
        assert_eq!(track.point_at(3.0).unwrap(), Xyz::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn test_point_at_out_of_bounds() {
        let track =
            Track::from_points(vec![Xyz::new(0.0, 0.0, 0.0), Xyz::new(0.0, 0.0, 1.0)]).unwrap();
        assert!(matches!(
            track.point_at(1.5),
            Err(GeometryError::TrackBounds { .. })
        ));
        assert!(matches!(
            track.point_at(-0.1),
            Err(GeometryError::TrackBounds { .. })
        ));
    }

    #[test]
    fn test_initial_alignment_offsets_by_tip_distance() {
        let surface = SlabSurface::new(0.0, -6e-3).unwrap();
        let track = TrackBuilder::default()
            .build(&vertical_picks(), &surface)
            .unwrap();
        let warp = track.initial_alignment(TIP_CLEARANCE_M).unwrap();

        // exit at -6.2 mm, deepest pick at -4 mm
        let tip_distance = 2.2e-3 + TIP_CLEARANCE_M;
        assert!((warp.origin() + tip_distance).abs() < 1e-12);
        assert_eq!(warp.feature(), warp.track());
        assert!((warp.track()[1] - (track.length() - tip_distance)).abs() < 1e-12);
    }
}
