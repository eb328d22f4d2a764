//! Collaborator traits for external geocoding and road routing.
//!
//! The engine only consumes these narrow interfaces.  Callers in
//! `ft-movement` wrap every call in a timeout and fall back to a
//! deterministic answer (synthetic route, coordinate label) on failure, so
//! implementations are free to be slow or flaky.

use async_trait::async_trait;

use ft_core::Waypoint;

use crate::{SpatialError, SpatialResult};

/// Place name ↔ coordinate resolution.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a free-text place name to a coordinate.
    async fn resolve(&self, place: &str) -> SpatialResult<Waypoint>;

    /// Describe a coordinate as a human-readable address.
    async fn reverse(&self, point: Waypoint) -> SpatialResult<String>;
}

/// Origin/destination → realistic road polyline.
#[async_trait]
pub trait RoadRouter: Send + Sync {
    async fn road_route(&self, origin: Waypoint, destination: Waypoint) -> SpatialResult<Vec<Waypoint>>;
}

/// A [`RoadRouter`] for deployments without a routing service.  Always
/// reports itself unavailable, so routes are synthesized.
pub struct NoRoadRouter;

#[async_trait]
impl RoadRouter for NoRoadRouter {
    async fn road_route(&self, _origin: Waypoint, _destination: Waypoint) -> SpatialResult<Vec<Waypoint>> {
        Err(SpatialError::Unavailable("no road router configured".into()))
    }
}
