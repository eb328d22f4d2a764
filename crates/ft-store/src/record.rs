//! Plain data records held by storage backends.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ft_core::{ActorId, ShipmentId, ShipmentStatus, Waypoint};
use ft_pricing::FeeQuote;

use crate::StoreError;

// ── Shipment ──────────────────────────────────────────────────────────────────

/// The slice of a shipment record the movement engine reads and writes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id:                    ShipmentId,
    /// Free-text origin as entered (place name or `"lat,lng"`).
    pub origin:                String,
    pub destination:           String,
    /// Resolved coordinates, when known.  Saves a geocoder round trip.
    pub origin_point:          Option<Waypoint>,
    pub destination_point:     Option<Waypoint>,
    pub status:                ShipmentStatus,
    pub total_distance_km:     f64,
    pub remaining_distance_km: f64,
    pub estimated_arrival:     Option<DateTime<Utc>>,
    pub trip_started_at:       Option<DateTime<Utc>>,
    /// Last snapshot position, as a label and as a coordinate.
    pub current_location:      Option<String>,
    pub current_point:         Option<Waypoint>,
}

impl Shipment {
    /// A pending shipment that has never moved.
    pub fn new(id: impl Into<ShipmentId>, origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            id:                    id.into(),
            origin:                origin.into(),
            destination:           destination.into(),
            origin_point:          None,
            destination_point:     None,
            status:                ShipmentStatus::Pending,
            total_distance_km:     0.0,
            remaining_distance_km: 0.0,
            estimated_arrival:     None,
            trip_started_at:       None,
            current_location:      None,
            current_point:         None,
        }
    }

    pub fn with_points(mut self, origin: Waypoint, destination: Waypoint) -> Self {
        self.origin_point = Some(origin);
        self.destination_point = Some(destination);
        self
    }
}

// ── Movement ──────────────────────────────────────────────────────────────────

/// Authoritative on/off switch for a shipment's movement.
///
/// Survives restarts.  The scheduler re-reads `is_moving` every tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub shipment_id:         ShipmentId,
    pub is_moving:           bool,
    pub paused_by:           Option<ActorId>,
    pub paused_at:           Option<DateTime<Utc>>,
    pub intercept_reason:    Option<String>,
    pub resumed_at:          Option<DateTime<Utc>>,
    pub clear_reason:        Option<String>,
    /// Position frozen at interception, for public display.
    pub intercepted_point:   Option<Waypoint>,
    pub intercepted_address: Option<String>,
}

impl MovementRecord {
    pub fn moving(shipment_id: ShipmentId) -> Self {
        Self {
            shipment_id,
            is_moving:           true,
            paused_by:           None,
            paused_at:           None,
            intercept_reason:    None,
            resumed_at:          None,
            clear_reason:        None,
            intercepted_point:   None,
            intercepted_address: None,
        }
    }
}

/// Reduced-cadence position write made by the scheduler.
///
/// Status is deliberately absent: only the controller and
/// [`MovementStore::mark_delivered`][crate::MovementStore::mark_delivered]
/// change it, so a late snapshot cannot undo an interception.
#[derive(Clone, Debug, PartialEq)]
pub struct ShipmentSnapshot {
    pub current_location:      String,
    pub current_point:         Waypoint,
    pub remaining_distance_km: f64,
    pub estimated_arrival:     DateTime<Utc>,
}

// ── History rows ──────────────────────────────────────────────────────────────

/// One raw position sample.  Append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub shipment_id: ShipmentId,
    pub recorded_at: DateTime<Utc>,
    pub point:       Waypoint,
    pub speed_kmh:   f64,
    pub heading:     f64,
}

/// Kind of a public tracking event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingEventKind {
    InTransit,
    Intercepted,
    Cleared,
    Cancelled,
    Delivered,
    AddressChanged,
}

impl TrackingEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackingEventKind::InTransit      => "IN_TRANSIT",
            TrackingEventKind::Intercepted    => "INTERCEPTED",
            TrackingEventKind::Cleared        => "CLEARED",
            TrackingEventKind::Cancelled      => "CANCELLED",
            TrackingEventKind::Delivered      => "DELIVERED",
            TrackingEventKind::AddressChanged => "ADDRESS_CHANGED",
        }
    }
}

impl FromStr for TrackingEventKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "IN_TRANSIT"      => TrackingEventKind::InTransit,
            "INTERCEPTED"     => TrackingEventKind::Intercepted,
            "CLEARED"         => TrackingEventKind::Cleared,
            "CANCELLED"       => TrackingEventKind::Cancelled,
            "DELIVERED"       => TrackingEventKind::Delivered,
            "ADDRESS_CHANGED" => TrackingEventKind::AddressChanged,
            other => return Err(StoreError::Corrupt(format!("unknown tracking event kind {other:?}"))),
        })
    }
}

impl fmt::Display for TrackingEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A public tracking-history row.  Descriptions never name the operator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub shipment_id: ShipmentId,
    pub kind:        TrackingEventKind,
    pub description: String,
    pub location:    Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl TrackingEvent {
    pub fn new(
        shipment_id: ShipmentId,
        kind:        TrackingEventKind,
        description: impl Into<String>,
        location:    Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self { shipment_id, kind, description: description.into(), location, recorded_at }
    }
}

/// One applied address change and what it cost.  Append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeeLedgerEntry {
    pub shipment_id:     ShipmentId,
    pub actor:           ActorId,
    pub old_destination: String,
    pub new_destination: String,
    pub quote:           FeeQuote,
    pub recorded_at:     DateTime<Utc>,
}
