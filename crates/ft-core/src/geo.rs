//! Geographic coordinate type and point-to-point geo math.
//!
//! `Waypoint` uses `f64` latitude/longitude.  Shipment routes span hundreds
//! of kilometres and are interpolated in tiny fractions, so the extra
//! precision over `f32` keeps consecutive positions strictly ordered.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Mean Earth radius used by every distance calculation, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// A WGS-84 coordinate in degrees.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lng: f64,
}

impl Waypoint {
    #[inline]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Haversine great-circle distance in kilometres.
    ///
    /// Symmetric, and exactly `0.0` for identical points.
    pub fn distance_km(self, other: Waypoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat * 0.5).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lng * 0.5).sin().powi(2);

        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }

    /// Heading from `self` towards `to` in `[0, 360)` degrees.
    ///
    /// Computed in the lat/lng plane (`atan2(Δlng, Δlat)`), which is what map
    /// markers rotate by.  Returns `0.0` when the points coincide.
    pub fn bearing_to(self, to: Waypoint) -> f64 {
        let d_lat = to.lat - self.lat;
        let d_lng = to.lng - self.lng;
        if d_lat == 0.0 && d_lng == 0.0 {
            return 0.0;
        }
        let deg = d_lng.atan2(d_lat).to_degrees();
        (deg + 360.0) % 360.0
    }

    /// Componentwise linear interpolation; `t` is clamped to `[0, 1]`.
    #[inline]
    pub fn lerp(self, to: Waypoint, t: f64) -> Waypoint {
        let t = t.clamp(0.0, 1.0);
        Waypoint {
            lat: self.lat + (to.lat - self.lat) * t,
            lng: self.lng + (to.lng - self.lng) * t,
        }
    }

    /// `true` if both components are finite and within WGS-84 bounds.
    pub fn is_valid(self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Coordinate-only label, used wherever a human address is unavailable.
    pub fn label(self) -> String {
        format!("{:.6}, {:.6}", self.lat, self.lng)
    }

    /// Parse a `"lat,lng"` string (whitespace tolerated).
    pub fn parse(s: &str) -> Result<Waypoint, CoreError> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| CoreError::Parse(format!("{s:?} is not a \"lat,lng\" pair")))?;
        let lat: f64 = lat
            .trim()
            .parse()
            .map_err(|_| CoreError::Parse(format!("invalid latitude in {s:?}")))?;
        let lng: f64 = lng
            .trim()
            .parse()
            .map_err(|_| CoreError::Parse(format!("invalid longitude in {s:?}")))?;
        let point = Waypoint::new(lat, lng);
        if !point.is_valid() {
            return Err(CoreError::Parse(format!("{s:?} is outside WGS-84 bounds")));
        }
        Ok(point)
    }
}

impl FromStr for Waypoint {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Waypoint::parse(s)
    }
}

impl fmt::Display for Waypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}
