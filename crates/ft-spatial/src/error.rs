//! Spatial-subsystem error type.

use std::time::Duration;

use thiserror::Error;

use ft_core::Waypoint;

/// Errors produced by `ft-spatial` and by the geocoding / road-routing
/// collaborators it defines.
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("a route needs at least 2 distinct points, got {0}")]
    TooFewPoints(usize),

    #[error("coordinate {0} is outside WGS-84 bounds")]
    InvalidPoint(Waypoint),

    #[error("unknown place {0:?}")]
    UnknownPlace(String),

    #[error("external service unavailable: {0}")]
    Unavailable(String),

    #[error("external service timed out after {0:?}")]
    Timeout(Duration),

    #[error("gazetteer parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SpatialResult<T> = Result<T, SpatialError>;
