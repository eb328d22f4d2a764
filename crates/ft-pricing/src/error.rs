//! Error types for ft-pricing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PricingError {
    /// A distance, rate, or speed was NaN or infinite.
    #[error("{field} is not a finite number ({value})")]
    NonFinite { field: &'static str, value: f64 },

    #[error("average speed must be positive, got {0} km/h")]
    NonPositiveSpeed(f64),

    #[error("arrival {hours} hours out is past the representable date range")]
    EtaOutOfRange { hours: f64 },
}

pub type PricingResult<T> = Result<T, PricingError>;
