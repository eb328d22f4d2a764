//! Fee and ETA quote for a proposed destination change.
//!
//! Money is computed in [`Decimal`] so the cent rounding is exact; distances
//! and durations stay `f64`.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, RoundingStrategy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ft_core::PricingConfig;
use ft_core::time::add_hours;

use crate::{PricingError, PricingResult};

pub const KM_TO_MILES: f64 = 0.621371;

/// Result of [`quote_address_change`].  Not persisted until confirmed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeQuote {
    pub base_fee:           Decimal,
    /// Rate per extra mile, echoed from configuration.
    pub per_mile_fee:       Decimal,
    pub extra_miles_fee:    Decimal,
    pub total_fee:          Decimal,
    /// `new - previous` remaining distance; negative when the route shrinks.
    pub distance_delta_km:  f64,
    pub time_delta_minutes: f64,
    pub new_remaining_km:   f64,
    pub new_eta:            DateTime<Utc>,
}

impl FeeQuote {
    /// True if the change costs more than the flat base fee.
    pub fn charges_distance(&self) -> bool {
        self.extra_miles_fee > Decimal::ZERO
    }
}

/// Quote a destination change.
///
/// - `previous_remaining_km`: distance from the current position to the old
///   destination.
/// - `new_km`: distance from the current position to the new destination.
/// - `current_remaining_km`: the shipment's tracked remaining distance, which
///   the delta is applied to.
///
/// Only lengthening is charged.  Totals round half away from zero at the cent.
pub fn quote_address_change(
    previous_remaining_km: f64,
    new_km:                f64,
    current_remaining_km:  f64,
    now:                   DateTime<Utc>,
    config:                &PricingConfig,
) -> PricingResult<FeeQuote> {
    finite("previous_remaining_km", previous_remaining_km)?;
    finite("new_km", new_km)?;
    finite("current_remaining_km", current_remaining_km)?;
    if config.average_speed_kmh.is_nan() || config.average_speed_kmh <= 0.0 {
        return Err(PricingError::NonPositiveSpeed(config.average_speed_kmh));
    }

    let base_fee = decimal("base_fee", config.base_fee)?;
    let per_mile_fee = decimal("per_mile_fee", config.per_mile_fee)?;

    let distance_delta_km = new_km - previous_remaining_km;
    let extra_miles = decimal("extra_miles", (distance_delta_km * KM_TO_MILES).max(0.0))?;
    let extra_miles_fee = extra_miles * per_mile_fee;

    let total_fee = cents(base_fee + extra_miles_fee);
    let time_delta_minutes = distance_delta_km / config.average_speed_kmh * 60.0;
    let new_remaining_km = (current_remaining_km + distance_delta_km).max(0.0);
    let hours = new_remaining_km / config.average_speed_kmh;
    let new_eta = add_hours(now, hours).ok_or(PricingError::EtaOutOfRange { hours })?;

    Ok(FeeQuote {
        base_fee,
        per_mile_fee,
        extra_miles_fee: cents(extra_miles_fee),
        total_fee,
        distance_delta_km,
        time_delta_minutes,
        new_remaining_km,
        new_eta,
    })
}

fn cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn finite(field: &'static str, value: f64) -> PricingResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PricingError::NonFinite { field, value })
    }
}

fn decimal(field: &'static str, value: f64) -> PricingResult<Decimal> {
    Decimal::from_f64(value).ok_or(PricingError::NonFinite { field, value })
}
