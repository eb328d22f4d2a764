//! The `MovementStore` trait implemented by all storage backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ft_core::{ShipmentId, ShipmentStatus, Waypoint};

use crate::{
    FeeLedgerEntry, LocationSample, MovementRecord, Shipment, ShipmentSnapshot, StoreResult,
    TrackingEvent,
};

/// Durable state consumed by the movement engine.
///
/// Reads return `Ok(None)` (or an empty `Vec`) for unknown shipments; only
/// writes that update an existing shipment row fail with
/// [`StoreError::MissingShipment`][crate::StoreError::MissingShipment].
/// History getters return rows in append order.
#[async_trait]
pub trait MovementStore: Send + Sync + 'static {
    // ── Shipments ────────────────────────────────────────────────────────────

    async fn shipment(&self, id: &ShipmentId) -> StoreResult<Option<Shipment>>;

    /// Insert or replace the whole shipment row.
    async fn save_shipment(&self, shipment: &Shipment) -> StoreResult<()>;

    async fn shipments_in_status(&self, status: ShipmentStatus) -> StoreResult<Vec<Shipment>>;

    /// Update position, remaining distance, and ETA.  Status is untouched.
    async fn write_snapshot(&self, id: &ShipmentId, snapshot: &ShipmentSnapshot) -> StoreResult<()>;

    /// Atomically finish a trip: status `DELIVERED`, remaining distance 0,
    /// position `point`, `is_moving = false`, and one `DELIVERED` event.
    ///
    /// Returns `Ok(false)` without writing anything if the shipment is
    /// already terminal, so delivery is recorded exactly once.
    async fn mark_delivered(&self, id: &ShipmentId, point: Waypoint, at: DateTime<Utc>) -> StoreResult<bool>;

    // ── Movement ─────────────────────────────────────────────────────────────

    async fn movement(&self, id: &ShipmentId) -> StoreResult<Option<MovementRecord>>;

    /// Insert or replace.
    async fn save_movement(&self, record: &MovementRecord) -> StoreResult<()>;

    // ── History ──────────────────────────────────────────────────────────────

    async fn append_location(&self, sample: &LocationSample) -> StoreResult<()>;

    /// Most recently appended sample.
    async fn latest_location(&self, id: &ShipmentId) -> StoreResult<Option<LocationSample>>;

    async fn locations(&self, id: &ShipmentId) -> StoreResult<Vec<LocationSample>>;

    async fn append_event(&self, event: &TrackingEvent) -> StoreResult<()>;

    async fn events(&self, id: &ShipmentId) -> StoreResult<Vec<TrackingEvent>>;

    async fn append_fee(&self, entry: &FeeLedgerEntry) -> StoreResult<()>;

    async fn fees(&self, id: &ShipmentId) -> StoreResult<Vec<FeeLedgerEntry>>;
}

/// Text of the `DELIVERED` tracking event.
pub(crate) fn delivered_description(destination: &str) -> String {
    format!("Delivered to {destination}")
}
