use ft_core::ShipmentId;
use ft_pricing::PricingError;
use ft_sim::SimError;
use ft_spatial::SpatialError;
use ft_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MovementError {
    #[error("shipment {0} not found")]
    NotFound(ShipmentId),

    #[error("shipment {id}: {reason}")]
    InvalidState { id: ShipmentId, reason: String },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("simulation error: {0}")]
    Sim(#[from] SimError),

    #[error("spatial error: {0}")]
    Spatial(#[from] SpatialError),

    #[error("pricing error: {0}")]
    Pricing(#[from] PricingError),
}

impl MovementError {
    pub(crate) fn invalid_state(id: &ShipmentId, reason: impl Into<String>) -> Self {
        MovementError::InvalidState { id: id.clone(), reason: reason.into() }
    }

    /// Route construction failures caused by the caller's input surface as
    /// validation errors; anything else stays a spatial error.
    pub(crate) fn from_route(err: SpatialError) -> Self {
        match err {
            SpatialError::TooFewPoints(_) | SpatialError::InvalidPoint(_) => {
                MovementError::Validation(err.to_string())
            }
            other => MovementError::Spatial(other),
        }
    }
}

pub type MovementResult<T> = Result<T, MovementError>;
