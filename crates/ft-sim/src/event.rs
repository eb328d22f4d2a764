//! Typed payloads pushed to a shipment's broadcast room.
//!
//! Serialized as `{"event": "<name>", "data": {...}}` with camelCase fields:
//!
//! | Variant          | `event`               |
//! |------------------|-----------------------|
//! | `LocationUpdate` | `locationUpdate`      |
//! | `Intercepted`    | `shipmentIntercepted` |
//! | `Cleared`        | `shipmentCleared`     |
//! | `Cancelled`      | `shipmentCancelled`   |
//! | `Delivered`      | `shipmentDelivered`   |
//! | `AddressChanged` | `addressChanged`      |

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ft_core::ShipmentId;
use ft_store::TrackingEventKind;

use crate::Frame;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ShipmentEvent {
    #[serde(rename = "locationUpdate")]
    LocationUpdate(LocationUpdate),
    #[serde(rename = "shipmentIntercepted")]
    Intercepted(HoldChange),
    #[serde(rename = "shipmentCleared")]
    Cleared(HoldChange),
    #[serde(rename = "shipmentCancelled")]
    Cancelled(Lifecycle),
    #[serde(rename = "shipmentDelivered")]
    Delivered(Lifecycle),
    #[serde(rename = "addressChanged")]
    AddressChanged(AddressChanged),
}

impl ShipmentEvent {
    pub fn shipment_id(&self) -> &ShipmentId {
        match self {
            ShipmentEvent::LocationUpdate(e) => &e.shipment_id,
            ShipmentEvent::Intercepted(e) | ShipmentEvent::Cleared(e) => &e.shipment_id,
            ShipmentEvent::Cancelled(e) | ShipmentEvent::Delivered(e) => &e.shipment_id,
            ShipmentEvent::AddressChanged(e) => &e.shipment_id,
        }
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ShipmentEvent::LocationUpdate(_) => "locationUpdate",
            ShipmentEvent::Intercepted(_)    => "shipmentIntercepted",
            ShipmentEvent::Cleared(_)        => "shipmentCleared",
            ShipmentEvent::Cancelled(_)      => "shipmentCancelled",
            ShipmentEvent::Delivered(_)      => "shipmentDelivered",
            ShipmentEvent::AddressChanged(_) => "addressChanged",
        }
    }

    pub fn location(shipment_id: ShipmentId, frame: &Frame, timestamp: DateTime<Utc>) -> Self {
        ShipmentEvent::LocationUpdate(LocationUpdate {
            shipment_id,
            latitude: frame.position.lat,
            longitude: frame.position.lng,
            speed: frame.speed_kmh,
            heading: frame.bearing,
            timestamp,
            progress: Progress {
                current_index:    frame.segment_index,
                total_points:     frame.total_points,
                percent_complete: frame.percent_complete,
            },
            distance: DistanceInfo {
                total:     frame.total_km,
                remaining: frame.remaining_km,
                covered:   frame.covered_km,
            },
            eta: EtaInfo {
                arrival:           frame.eta,
                minutes_remaining: frame.minutes_remaining,
            },
        })
    }

    pub fn intercepted(shipment_id: ShipmentId, reason: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        ShipmentEvent::Intercepted(HoldChange {
            shipment_id,
            status: TrackingEventKind::Intercepted,
            reason: reason.into(),
            timestamp,
        })
    }

    pub fn cleared(shipment_id: ShipmentId, reason: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        ShipmentEvent::Cleared(HoldChange {
            shipment_id,
            status: TrackingEventKind::Cleared,
            reason: reason.into(),
            timestamp,
        })
    }

    pub fn cancelled(shipment_id: ShipmentId, timestamp: DateTime<Utc>) -> Self {
        ShipmentEvent::Cancelled(Lifecycle { shipment_id, timestamp })
    }

    pub fn delivered(shipment_id: ShipmentId, timestamp: DateTime<Utc>) -> Self {
        ShipmentEvent::Delivered(Lifecycle { shipment_id, timestamp })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub shipment_id: ShipmentId,
    pub latitude:    f64,
    pub longitude:   f64,
    /// km/h
    pub speed:       f64,
    /// Degrees clockwise from north.
    pub heading:     f64,
    pub timestamp:   DateTime<Utc>,
    pub progress:    Progress,
    pub distance:    DistanceInfo,
    pub eta:         EtaInfo,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current_index:    usize,
    pub total_points:     usize,
    pub percent_complete: f64,
}

/// Kilometres.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistanceInfo {
    pub total:     f64,
    pub remaining: f64,
    pub covered:   f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaInfo {
    pub arrival:           DateTime<Utc>,
    pub minutes_remaining: f64,
}

/// Interception or clearance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldChange {
    pub shipment_id: ShipmentId,
    pub status:      TrackingEventKind,
    pub reason:      String,
    pub timestamp:   DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lifecycle {
    pub shipment_id: ShipmentId,
    pub timestamp:   DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressChanged {
    pub shipment_id:            ShipmentId,
    pub new_destination:        String,
    pub fee:                    Decimal,
    pub new_eta:                DateTime<Utc>,
    /// Kilometres.
    pub new_remaining_distance: f64,
    pub timestamp:              DateTime<Utc>,
}
