use ft_spatial::SpatialError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("scheduler configuration error: {0}")]
    Config(String),

    #[error("planned trip duration must be positive and representable, got {0} ms")]
    InvalidDuration(i64),

    #[error("invalid route: {0}")]
    Route(#[from] SpatialError),
}

pub type SimResult<T> = Result<T, SimError>;
