//! Bounded calls to the geocoding and road-routing collaborators.
//!
//! Every call carries `external_timeout_ms`.  Failures fall back
//! deterministically:
//!
//! | Call            | Fallback                                     |
//! |-----------------|----------------------------------------------|
//! | `locate`        | stored coordinate, then `"lat,lng"` parsing; a name nothing can resolve is a validation error |
//! | `describe`      | coordinate-only label                        |
//! | `road_geometry` | `None`, so the route is synthesized          |

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use ft_core::Waypoint;
use ft_spatial::{Geocoder, NoRoadRouter, RoadRouter, SpatialError, SpatialResult};

use crate::{MovementError, MovementResult};

pub struct Resolver {
    geocoder: Arc<dyn Geocoder>,
    roads:    Arc<dyn RoadRouter>,
    timeout:  Duration,
}

impl Resolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, roads: Arc<dyn RoadRouter>, timeout: Duration) -> Self {
        Self { geocoder, roads, timeout }
    }

    /// Geocoding only; every route is synthesized.
    pub fn without_roads(geocoder: Arc<dyn Geocoder>, timeout: Duration) -> Self {
        Self::new(geocoder, Arc::new(NoRoadRouter), timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Coordinate for `place`.  A `known` coordinate wins without a lookup.
    pub async fn locate(&self, place: &str, known: Option<Waypoint>) -> MovementResult<Waypoint> {
        if let Some(point) = known {
            return Ok(point);
        }
        if let Ok(point) = Waypoint::parse(place) {
            return Ok(point);
        }
        if place.trim().is_empty() {
            return Err(MovementError::Validation("place name is empty".into()));
        }
        self.bounded(self.geocoder.resolve(place)).await.map_err(|e| {
            warn!(place, error = %e, "place could not be resolved");
            MovementError::Validation(format!("cannot resolve {place:?}: {e}"))
        })
    }

    /// Human-readable address for `point`, or its coordinate label.
    pub async fn describe(&self, point: Waypoint) -> String {
        match self.bounded(self.geocoder.reverse(point)).await {
            Ok(address) => address,
            Err(e) => {
                warn!(point = %point, error = %e, "reverse geocoding failed, using coordinates");
                point.label()
            }
        }
    }

    /// Road polyline from `origin` to `destination`, if the router has one.
    pub async fn road_geometry(&self, origin: Waypoint, destination: Waypoint) -> Option<Vec<Waypoint>> {
        match self.bounded(self.roads.road_route(origin, destination)).await {
            Ok(points) => Some(points),
            Err(SpatialError::Unavailable(why)) => {
                debug!(why, "no road geometry");
                None
            }
            Err(e) => {
                warn!(error = %e, "road routing failed, synthesizing route");
                None
            }
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = SpatialResult<T>>) -> SpatialResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SpatialError::Timeout(self.timeout)),
        }
    }
}
