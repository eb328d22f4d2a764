//! Route construction from an origin, a destination, and optional stops.
//!
//! # Geometry sources
//!
//! 1. **Road geometry.**  When a [`RoadRouter`][crate::RoadRouter] returned a
//!    polyline of two or more valid points it is used verbatim.
//! 2. **Synthetic.**  Otherwise each hop between consecutive anchors is
//!    generated here.  Hops shorter than `curve_threshold_km` stay straight.
//!    Longer hops get a half-sine bulge perpendicular to the hop, whose peak
//!    grows from zero at the threshold to `max_bulge_ratio * hop_length` at
//!    twice the threshold.  Bulge side and size come from a [`RouteRng`]
//!    seeded by the shipment id, so a shipment's route is reproducible.

use std::f64::consts::PI;

use tracing::{debug, warn};

use ft_core::{RouteRng, RoutingConfig, ShipmentId, Waypoint};

use crate::{Route, SpatialError, SpatialResult};

/// Kilometres per degree of latitude on the mean-radius sphere.
const KM_PER_DEGREE: f64 = 111.195;

// ── Stops ─────────────────────────────────────────────────────────────────────

/// Role of an intermediate stop.  Determines its order in the route.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StopKind {
    Pickup,
    Waypoint,
    /// Where an interception froze the shipment.
    Interception,
    /// Where a held shipment was released.
    Clearance,
    Delivery,
}

impl StopKind {
    /// Sort rank.  Interception and clearance share a rank so they keep the
    /// order in which they were encountered.
    fn rank(self) -> u8 {
        match self {
            StopKind::Pickup       => 0,
            StopKind::Waypoint     => 1,
            StopKind::Interception => 2,
            StopKind::Clearance    => 2,
            StopKind::Delivery     => 3,
        }
    }
}

/// An intermediate point the route must pass through.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Stop {
    pub kind:  StopKind,
    pub point: Waypoint,
}

impl Stop {
    pub fn new(kind: StopKind, point: Waypoint) -> Self {
        Self { kind, point }
    }
}

// ── RouteBuilder ──────────────────────────────────────────────────────────────

/// Builds [`Route`]s.  Cheap to clone; holds only configuration.
#[derive(Clone, Debug, Default)]
pub struct RouteBuilder {
    config: RoutingConfig,
}

impl RouteBuilder {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Build a route for `shipment`.
    ///
    /// `road_geometry` wins when it has at least two points.  Otherwise the
    /// anchors `origin`, `stops` (stably sorted by [`StopKind`]), and
    /// `destination` are joined with synthetic hops.  Consecutive duplicate
    /// anchors are dropped; fewer than two distinct anchors is an error.
    pub fn build(
        &self,
        shipment:      &ShipmentId,
        origin:        Waypoint,
        destination:   Waypoint,
        stops:         &[Stop],
        road_geometry: Option<Vec<Waypoint>>,
    ) -> SpatialResult<Route> {
        if let Some(points) = road_geometry {
            if points.len() >= 2 {
                debug!(shipment = %shipment, points = points.len(), "using road geometry");
                return Route::new(points);
            }
            warn!(
                shipment = %shipment,
                points = points.len(),
                "road geometry too short, synthesizing route",
            );
        }

        let anchors = ordered_anchors(origin, destination, stops);
        if anchors.len() < 2 {
            return Err(SpatialError::TooFewPoints(anchors.len()));
        }
        if let Some(bad) = anchors.iter().find(|p| !p.is_valid()) {
            return Err(SpatialError::InvalidPoint(*bad));
        }

        let mut rng = RouteRng::new(self.config.seed, shipment);
        let mut points: Vec<Waypoint> = vec![anchors[0]];
        for pair in anchors.windows(2) {
            let leg = self.synthesize_leg(pair[0], pair[1], &mut rng);
            // Every leg starts with the previous leg's last point.
            points.extend_from_slice(&leg[1..]);
        }

        debug!(
            shipment = %shipment,
            anchors = anchors.len(),
            points = points.len(),
            "synthesized route",
        );
        Route::new(points)
    }

    /// Points for one hop, including both endpoints.
    pub fn synthesize_leg(&self, from: Waypoint, to: Waypoint, rng: &mut RouteRng) -> Vec<Waypoint> {
        let hop_km = from.distance_km(to);
        let threshold = self.config.curve_threshold_km;
        let n = self.config.points_per_leg;

        if hop_km < threshold || n <= 2 || self.config.max_bulge_ratio <= 0.0 {
            return vec![from, to];
        }

        // 0 at the threshold, 1 from twice the threshold upwards.
        let scale = if threshold > 0.0 { ((hop_km - threshold) / threshold).clamp(0.0, 1.0) } else { 1.0 };
        let jitter: f64 = rng.gen_range(0.6..=1.0);
        let side = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let peak_deg = hop_km * self.config.max_bulge_ratio * scale * jitter / KM_PER_DEGREE;

        // Unit perpendicular in the lat/lng plane.
        let d_lat = to.lat - from.lat;
        let d_lng = to.lng - from.lng;
        let norm = (d_lat * d_lat + d_lng * d_lng).sqrt();
        if norm == 0.0 {
            return vec![from, to];
        }
        let (perp_lat, perp_lng) = (-d_lng / norm, d_lat / norm);

        let mut points = Vec::with_capacity(n);
        points.push(from);
        for i in 1..n - 1 {
            let f = i as f64 / (n - 1) as f64;
            let base = from.lerp(to, f);
            let offset = side * peak_deg * (PI * f).sin();
            points.push(Waypoint::new(base.lat + perp_lat * offset, base.lng + perp_lng * offset));
        }
        points.push(to);
        points
    }
}

/// `origin`, sorted stops, `destination`, without consecutive duplicates.
fn ordered_anchors(origin: Waypoint, destination: Waypoint, stops: &[Stop]) -> Vec<Waypoint> {
    let mut sorted: Vec<Stop> = stops.to_vec();
    sorted.sort_by_key(|s| s.kind.rank());

    let mut anchors = Vec::with_capacity(sorted.len() + 2);
    for p in std::iter::once(origin)
        .chain(sorted.into_iter().map(|s| s.point))
        .chain(std::iter::once(destination))
    {
        if anchors.last() != Some(&p) {
            anchors.push(p);
        }
    }
    anchors
}
