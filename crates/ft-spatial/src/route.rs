//! Route polyline with cumulative distances, and progress interpolation.
//!
//! # Invariants
//!
//! A [`Route`] always has at least two points.  `cumulative_km[0] == 0`,
//! the sequence is non-decreasing, and `total_km()` is its last element.
//! Routes are immutable once built; a reroute builds a new one.

use ft_core::Waypoint;

use crate::{SpatialError, SpatialResult};

// ── Free functions ────────────────────────────────────────────────────────────

/// Prefix sums of consecutive-point haversine distances.
///
/// Returns a vector of the same length as `points`; empty input gives an
/// empty vector.
pub fn cumulative_distances(points: &[Waypoint]) -> Vec<f64> {
    let mut out = Vec::with_capacity(points.len());
    let mut acc = 0.0;
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            acc += points[i - 1].distance_km(*p);
        }
        out.push(acc);
    }
    out
}

/// Position at fraction `t` of the total length of `points`.
///
/// Errors with [`SpatialError::TooFewPoints`] for empty or single-point
/// input.  See [`Route::position_at_progress`] for the semantics.
pub fn position_at_progress(points: &[Waypoint], t: f64) -> SpatialResult<RoutePosition> {
    if points.len() < 2 {
        return Err(SpatialError::TooFewPoints(points.len()));
    }
    let cumulative = cumulative_distances(points);
    Ok(locate(points, &cumulative, t))
}

// ── RoutePosition ─────────────────────────────────────────────────────────────

/// Where a vehicle is at some progress fraction along a route.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RoutePosition {
    pub position:     Waypoint,
    /// Heading of the segment being travelled, degrees in `[0, 360)`.
    pub bearing:      f64,
    pub covered_km:   f64,
    pub remaining_km: f64,
}

// ── Route ─────────────────────────────────────────────────────────────────────

/// An ordered polyline of at least two waypoints.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    waypoints:     Vec<Waypoint>,
    cumulative_km: Vec<f64>,
}

impl Route {
    /// Build a route, rejecting fewer than two points or out-of-range
    /// coordinates.
    pub fn new(waypoints: Vec<Waypoint>) -> SpatialResult<Route> {
        if waypoints.len() < 2 {
            return Err(SpatialError::TooFewPoints(waypoints.len()));
        }
        if let Some(bad) = waypoints.iter().find(|p| !p.is_valid()) {
            return Err(SpatialError::InvalidPoint(*bad));
        }
        let cumulative_km = cumulative_distances(&waypoints);
        Ok(Route { waypoints, cumulative_km })
    }

    #[inline]
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    #[inline]
    pub fn cumulative_km(&self) -> &[f64] {
        &self.cumulative_km
    }

    /// Number of points (always >= 2).
    #[inline]
    pub fn point_count(&self) -> usize {
        self.waypoints.len()
    }

    /// Number of segments (`point_count() - 1`).
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.waypoints.len() - 1
    }

    #[inline]
    pub fn total_km(&self) -> f64 {
        self.cumulative_km[self.cumulative_km.len() - 1]
    }

    #[inline]
    pub fn origin(&self) -> Waypoint {
        self.waypoints[0]
    }

    #[inline]
    pub fn destination(&self) -> Waypoint {
        self.waypoints[self.waypoints.len() - 1]
    }

    /// Interpolated point `fraction` of the way along segment `segment`.
    ///
    /// `segment` is clamped to the last segment.
    pub fn point_in_segment(&self, segment: usize, fraction: f64) -> Waypoint {
        let seg = segment.min(self.segment_count() - 1);
        self.waypoints[seg].lerp(self.waypoints[seg + 1], fraction)
    }

    /// Heading of segment `segment` (clamped to the last segment).
    pub fn segment_bearing(&self, segment: usize) -> f64 {
        let seg = segment.min(self.segment_count() - 1);
        self.waypoints[seg].bearing_to(self.waypoints[seg + 1])
    }

    /// Distance still to travel from `point`, assumed to lie on segment
    /// `segment`: the hop to that segment's end plus every later segment.
    pub fn remaining_km_from(&self, segment: usize, point: Waypoint) -> f64 {
        let seg = segment.min(self.segment_count() - 1);
        let end = seg + 1;
        let tail = self.total_km() - self.cumulative_km[end];
        point.distance_km(self.waypoints[end]) + tail.max(0.0)
    }

    /// Position at fraction `t` of the total length.
    ///
    /// - `t <= 0` → first point, bearing of the first segment.
    /// - `t >= 1` → last point, bearing of the last segment.
    /// - otherwise the point `t * total_km()` along the polyline.
    pub fn position_at_progress(&self, t: f64) -> RoutePosition {
        locate(&self.waypoints, &self.cumulative_km, t)
    }
}

// ── Internals ─────────────────────────────────────────────────────────────────

/// Shared implementation; `points.len() >= 2` and `cumulative` matches it.
fn locate(points: &[Waypoint], cumulative: &[f64], t: f64) -> RoutePosition {
    let n = points.len();
    let total = cumulative[n - 1];

    if t.is_nan() || t <= 0.0 {
        return RoutePosition {
            position:     points[0],
            bearing:      points[0].bearing_to(points[1]),
            covered_km:   0.0,
            remaining_km: total,
        };
    }
    if t >= 1.0 {
        return RoutePosition {
            position:     points[n - 1],
            bearing:      points[n - 2].bearing_to(points[n - 1]),
            covered_km:   total,
            remaining_km: 0.0,
        };
    }

    let target = t * total;
    // First index whose cumulative distance exceeds the target, minus one,
    // is the segment containing it.
    let seg = cumulative
        .partition_point(|&c| c <= target)
        .saturating_sub(1)
        .min(n - 2);

    let seg_len = cumulative[seg + 1] - cumulative[seg];
    let fraction = if seg_len > 0.0 { (target - cumulative[seg]) / seg_len } else { 0.0 };

    RoutePosition {
        position:     points[seg].lerp(points[seg + 1], fraction),
        bearing:      points[seg].bearing_to(points[seg + 1]),
        covered_km:   target,
        remaining_km: (total - target).max(0.0),
    }
}
