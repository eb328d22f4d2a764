//! Shipment lifecycle status shared by the store, scheduler, and controller.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Durable `currentStatus` of a shipment.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    /// Created but never started.
    #[default]
    Pending,
    /// Moving (or about to move) along its route.
    InTransit,
    /// Held by an operator; position frozen.
    Intercepted,
    /// Reached the destination.  Terminal.
    Delivered,
    /// Cancelled by an operator.  Terminal.
    Cancelled,
}

impl ShipmentStatus {
    /// `true` for statuses no operation may leave.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, ShipmentStatus::Delivered | ShipmentStatus::Cancelled)
    }

    /// Column value used by storage backends.
    pub fn as_str(self) -> &'static str {
        match self {
            ShipmentStatus::Pending     => "PENDING",
            ShipmentStatus::InTransit   => "IN_TRANSIT",
            ShipmentStatus::Intercepted => "INTERCEPTED",
            ShipmentStatus::Delivered   => "DELIVERED",
            ShipmentStatus::Cancelled   => "CANCELLED",
        }
    }
}

impl FromStr for ShipmentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING"     => Ok(ShipmentStatus::Pending),
            "IN_TRANSIT"  => Ok(ShipmentStatus::InTransit),
            "INTERCEPTED" => Ok(ShipmentStatus::Intercepted),
            "DELIVERED"   => Ok(ShipmentStatus::Delivered),
            "CANCELLED"   => Ok(ShipmentStatus::Cancelled),
            other => Err(CoreError::Parse(format!("unknown shipment status {other:?}"))),
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
