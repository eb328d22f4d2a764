//! In-process backend.  Nothing survives the process.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use ft_core::{ShipmentId, ShipmentStatus, Waypoint};

use crate::store::delivered_description;
use crate::{
    FeeLedgerEntry, LocationSample, MovementRecord, MovementStore, Shipment, ShipmentSnapshot,
    StoreError, StoreResult, TrackingEvent, TrackingEventKind,
};

#[derive(Default)]
struct Tables {
    shipments: HashMap<ShipmentId, Shipment>,
    movements: HashMap<ShipmentId, MovementRecord>,
    locations: HashMap<ShipmentId, Vec<LocationSample>>,
    events:    HashMap<ShipmentId, Vec<TrackingEvent>>,
    fees:      HashMap<ShipmentId, Vec<FeeLedgerEntry>>,
}

/// A [`MovementStore`] backed by hash maps behind one mutex.
///
/// Every method completes without awaiting, so it never yields to the
/// runtime.  That keeps virtual-time tests deterministic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of shipment rows.
    pub fn shipment_count(&self) -> usize {
        self.tables.lock().shipments.len()
    }
}

#[async_trait]
impl MovementStore for MemoryStore {
    async fn shipment(&self, id: &ShipmentId) -> StoreResult<Option<Shipment>> {
        Ok(self.tables.lock().shipments.get(id).cloned())
    }

    async fn save_shipment(&self, shipment: &Shipment) -> StoreResult<()> {
        self.tables.lock().shipments.insert(shipment.id.clone(), shipment.clone());
        Ok(())
    }

    async fn shipments_in_status(&self, status: ShipmentStatus) -> StoreResult<Vec<Shipment>> {
        let tables = self.tables.lock();
        let mut out: Vec<Shipment> =
            tables.shipments.values().filter(|s| s.status == status).cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn write_snapshot(&self, id: &ShipmentId, snapshot: &ShipmentSnapshot) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        let shipment = tables
            .shipments
            .get_mut(id)
            .ok_or_else(|| StoreError::MissingShipment(id.clone()))?;
        shipment.current_location = Some(snapshot.current_location.clone());
        shipment.current_point = Some(snapshot.current_point);
        shipment.remaining_distance_km = snapshot.remaining_distance_km;
        shipment.estimated_arrival = Some(snapshot.estimated_arrival);
        Ok(())
    }

    async fn mark_delivered(&self, id: &ShipmentId, point: Waypoint, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut guard = self.tables.lock();
        let tables = &mut *guard;
        let shipment = tables
            .shipments
            .get_mut(id)
            .ok_or_else(|| StoreError::MissingShipment(id.clone()))?;
        if shipment.status.is_terminal() {
            return Ok(false);
        }
        shipment.status = ShipmentStatus::Delivered;
        shipment.remaining_distance_km = 0.0;
        shipment.estimated_arrival = Some(at);
        shipment.current_point = Some(point);
        shipment.current_location = Some(shipment.destination.clone());
        let destination = shipment.destination.clone();

        if let Some(movement) = tables.movements.get_mut(id) {
            movement.is_moving = false;
        }
        tables.events.entry(id.clone()).or_default().push(TrackingEvent::new(
            id.clone(),
            TrackingEventKind::Delivered,
            delivered_description(&destination),
            Some(destination),
            at,
        ));
        Ok(true)
    }

    async fn movement(&self, id: &ShipmentId) -> StoreResult<Option<MovementRecord>> {
        Ok(self.tables.lock().movements.get(id).cloned())
    }

    async fn save_movement(&self, record: &MovementRecord) -> StoreResult<()> {
        self.tables.lock().movements.insert(record.shipment_id.clone(), record.clone());
        Ok(())
    }

    async fn append_location(&self, sample: &LocationSample) -> StoreResult<()> {
        self.tables
            .lock()
            .locations
            .entry(sample.shipment_id.clone())
            .or_default()
            .push(sample.clone());
        Ok(())
    }

    async fn latest_location(&self, id: &ShipmentId) -> StoreResult<Option<LocationSample>> {
        Ok(self.tables.lock().locations.get(id).and_then(|v| v.last().cloned()))
    }

    async fn locations(&self, id: &ShipmentId) -> StoreResult<Vec<LocationSample>> {
        Ok(self.tables.lock().locations.get(id).cloned().unwrap_or_default())
    }

    async fn append_event(&self, event: &TrackingEvent) -> StoreResult<()> {
        self.tables
            .lock()
            .events
            .entry(event.shipment_id.clone())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn events(&self, id: &ShipmentId) -> StoreResult<Vec<TrackingEvent>> {
        Ok(self.tables.lock().events.get(id).cloned().unwrap_or_default())
    }

    async fn append_fee(&self, entry: &FeeLedgerEntry) -> StoreResult<()> {
        self.tables
            .lock()
            .fees
            .entry(entry.shipment_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn fees(&self, id: &ShipmentId) -> StoreResult<Vec<FeeLedgerEntry>> {
        Ok(self.tables.lock().fees.get(id).cloned().unwrap_or_default())
    }
}
