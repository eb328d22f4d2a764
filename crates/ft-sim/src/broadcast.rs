//! Publish-subscribe fan-out, one room per shipment.

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;

use ft_core::ShipmentId;

use crate::ShipmentEvent;

/// Where the scheduler and controller push [`ShipmentEvent`]s.
///
/// `publish` must not block: it is called from inside a shipment's tick.
/// Delivery is best-effort.
pub trait Broadcaster: Send + Sync + 'static {
    fn publish(&self, event: ShipmentEvent);
}

/// A [`Broadcaster`] that drops everything.
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn publish(&self, _event: ShipmentEvent) {}
}

// ── ChannelBroadcaster ────────────────────────────────────────────────────────

pub const DEFAULT_ROOM_CAPACITY: usize = 256;

/// In-process rooms backed by `tokio::sync::broadcast` channels.
///
/// A room is created by its first subscriber.  Slow subscribers lag and
/// skip events rather than holding up the publisher.
pub struct ChannelBroadcaster {
    rooms:    DashMap<ShipmentId, broadcast::Sender<ShipmentEvent>>,
    capacity: usize,
}

impl ChannelBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ROOM_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { rooms: DashMap::new(), capacity: capacity.max(1) }
    }

    /// Join `shipment`'s room.
    pub fn subscribe(&self, shipment: &ShipmentId) -> broadcast::Receiver<ShipmentEvent> {
        self.rooms
            .entry(shipment.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, shipment: &ShipmentId) -> usize {
        self.rooms.get(shipment).map_or(0, |tx| tx.receiver_count())
    }

    /// Drop rooms nobody is listening to any more.
    pub fn prune(&self) {
        self.rooms.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish(&self, event: ShipmentEvent) {
        let Some(tx) = self.rooms.get(event.shipment_id()) else {
            trace!(shipment = %event.shipment_id(), event = event.name(), "no room, dropped");
            return;
        };
        // Err only means every receiver has gone away.
        if tx.send(event).is_err() {
            trace!("room has no receivers");
        }
    }
}
