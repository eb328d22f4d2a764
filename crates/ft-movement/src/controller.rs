//! `MovementController` — shipment operations over the scheduler and the
//! durable store.
//!
//! # Operations
//!
//! | Operation                | Requires                  | Result status  |
//! |--------------------------|---------------------------|----------------|
//! | `start`                  | not terminal              | `IN_TRANSIT`   |
//! | `intercept`              | `is_moving`               | `INTERCEPTED`  |
//! | `clear`                  | `!is_moving`              | `IN_TRANSIT`   |
//! | `cancel`                 | not terminal              | `CANCELLED`    |
//! | `preview_address_change` | `IN_TRANSIT`              | unchanged      |
//! | `apply_address_change`   | `IN_TRANSIT`              | `IN_TRANSIT`   |
//!
//! Operations on the same shipment are serialized by a per-shipment async
//! mutex.  Each one re-reads the shipment after quiescing its simulation
//! (pause or stop), so a delivery recorded by a final tick is never
//! overwritten.

use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use ft_core::time::{MS_PER_SECOND, days_to_ms, ms_between};
use ft_core::{ActorId, Clock, EngineConfig, PricingConfig, ShipmentId, ShipmentStatus, Waypoint};
use ft_pricing::{FeeQuote, quote_address_change};
use ft_sim::{AddressChanged, Broadcaster, ShipmentEvent, SimStatus, SimulationScheduler};
use ft_spatial::{Route, RouteBuilder};
use ft_store::{
    FeeLedgerEntry, LocationSample, MovementRecord, MovementStore, Shipment, TrackingEvent,
    TrackingEventKind,
};

use crate::{MovementError, MovementResult, Resolver};

/// Shortest planned duration given to a re-planned leg.
pub const MIN_LEG_MS: i64 = 60 * MS_PER_SECOND;

/// Where a shipment is now.  Heading and remaining distance are only known
/// from a live simulation.
struct Fix {
    point:        Waypoint,
    heading:      Option<f64>,
    remaining_km: Option<f64>,
}

struct ReroutePlan {
    quote: FeeQuote,
    from:  Waypoint,
    to:    Waypoint,
}

pub struct MovementController<S, B> {
    scheduler: SimulationScheduler<S, B>,
    routes:    RouteBuilder,
    pricing:   PricingConfig,
    resolver:  Resolver,
    locks:     DashMap<ShipmentId, Arc<Mutex<()>>>,
}

impl<S: MovementStore, B: Broadcaster> MovementController<S, B> {
    pub fn new(scheduler: SimulationScheduler<S, B>, resolver: Resolver, config: &EngineConfig) -> Self {
        Self {
            scheduler,
            routes: RouteBuilder::new(config.routing.clone()),
            pricing: config.pricing.clone(),
            resolver,
            locks: DashMap::new(),
        }
    }

    pub fn scheduler(&self) -> &SimulationScheduler<S, B> {
        &self.scheduler
    }

    /// Live simulation status, if one is registered.
    pub async fn status(&self, id: &ShipmentId) -> Option<SimStatus> {
        self.scheduler.status_of(id).await
    }

    // ── Start ─────────────────────────────────────────────────────────────

    /// Put a shipment on the road with `delivery_days` of planned travel.
    pub async fn start(&self, id: &ShipmentId, delivery_days: f64) -> MovementResult<Shipment> {
        if !delivery_days.is_finite() || delivery_days <= 0.0 {
            return Err(MovementError::Validation(format!(
                "delivery window must be positive, got {delivery_days} days"
            )));
        }
        let out_of_range =
            || MovementError::Validation(format!("delivery window of {delivery_days} days is out of range"));
        let planned_ms = days_to_ms(delivery_days).ok_or_else(out_of_range)?;
        let _guard = self.lock(id).await;
        let mut shipment = self.load(id).await?;
        if shipment.status.is_terminal() {
            return Err(MovementError::invalid_state(
                id,
                format!("cannot start a {} shipment", shipment.status),
            ));
        }

        let origin = self.resolver.locate(&shipment.origin, shipment.origin_point).await?;
        let destination = self.resolver.locate(&shipment.destination, shipment.destination_point).await?;
        let route = self.build_route(id, origin, destination).await?;
        let now = self.clock().now();
        let eta = now
            .checked_add_signed(Duration::milliseconds(planned_ms))
            .ok_or_else(out_of_range)?;
        let total_km = route.total_km();

        shipment.status = ShipmentStatus::InTransit;
        shipment.origin_point = Some(origin);
        shipment.destination_point = Some(destination);
        shipment.total_distance_km = total_km;
        shipment.remaining_distance_km = total_km;
        shipment.estimated_arrival = Some(eta);
        shipment.trip_started_at = Some(now);
        shipment.current_point = Some(origin);
        shipment.current_location = Some(shipment.origin.clone());

        let store = self.store();
        store.save_shipment(&shipment).await?;
        store.save_movement(&MovementRecord::moving(id.clone())).await?;
        store
            .append_location(&LocationSample {
                shipment_id: id.clone(),
                recorded_at: now,
                point:       origin,
                speed_kmh:   0.0,
                heading:     route.segment_bearing(0),
            })
            .await?;
        store
            .append_event(&TrackingEvent::new(
                id.clone(),
                TrackingEventKind::InTransit,
                format!("Departed {}", shipment.origin),
                Some(shipment.origin.clone()),
                now,
            ))
            .await?;

        self.scheduler.start(id.clone(), route, planned_ms).await?;
        info!(shipment = %id, total_km, delivery_days, "shipment started");
        Ok(shipment)
    }

    // ── Intercept / clear ─────────────────────────────────────────────────

    /// Hold a moving shipment where it is.
    ///
    /// The frozen position comes from the live simulation when one is
    /// running, else from the latest location sample.
    pub async fn intercept(&self, id: &ShipmentId, reason: &str, actor: &ActorId) -> MovementResult<MovementRecord> {
        let reason = required(reason, "intercept reason")?;
        let _guard = self.lock(id).await;
        let shipment = self.load(id).await?;
        if shipment.status.is_terminal() {
            return Err(MovementError::invalid_state(
                id,
                format!("cannot intercept a {} shipment", shipment.status),
            ));
        }
        let movement = self.movement_of(id).await?;
        if !movement.is_moving {
            return Err(MovementError::invalid_state(id, "already intercepted"));
        }

        let paused = self.scheduler.pause(id).await;
        let outcome = self.freeze(id, movement, reason, actor).await;
        if outcome.is_err() && paused {
            self.scheduler.resume(id).await;
        }
        outcome
    }

    async fn freeze(
        &self,
        id:           &ShipmentId,
        mut movement: MovementRecord,
        reason:       &str,
        actor:        &ActorId,
    ) -> MovementResult<MovementRecord> {
        let mut shipment = self.load(id).await?;
        if shipment.status.is_terminal() {
            return Err(MovementError::invalid_state(id, format!("shipment is {}", shipment.status)));
        }
        let fix = self.locate_now(&shipment).await?;
        let address = self.resolver.describe(fix.point).await;
        let now = self.clock().now();

        movement.is_moving = false;
        movement.paused_by = Some(actor.clone());
        movement.paused_at = Some(now);
        movement.intercept_reason = Some(reason.to_owned());
        movement.resumed_at = None;
        movement.clear_reason = None;
        movement.intercepted_point = Some(fix.point);
        movement.intercepted_address = Some(address.clone());

        shipment.status = ShipmentStatus::Intercepted;
        shipment.current_point = Some(fix.point);
        shipment.current_location = Some(address.clone());
        if let Some(km) = fix.remaining_km {
            shipment.remaining_distance_km = km;
        }

        let store = self.store();
        store.save_movement(&movement).await?;
        store.save_shipment(&shipment).await?;
        store
            .append_location(&LocationSample {
                shipment_id: id.clone(),
                recorded_at: now,
                point:       fix.point,
                speed_kmh:   0.0,
                heading:     fix.heading.unwrap_or(0.0),
            })
            .await?;
        store
            .append_event(&TrackingEvent::new(
                id.clone(),
                TrackingEventKind::Intercepted,
                format!("Shipment intercepted: {reason}"),
                Some(address),
                now,
            ))
            .await?;

        self.broadcaster().publish(ShipmentEvent::intercepted(id.clone(), reason, now));
        info!(shipment = %id, actor = %actor, reason, point = %fix.point, "shipment intercepted");
        Ok(movement)
    }

    /// Release an intercepted shipment.
    ///
    /// If its simulation is no longer registered (the process restarted
    /// while it was held), a new leg is planned from its last known point.
    pub async fn clear(&self, id: &ShipmentId, reason: &str, actor: &ActorId) -> MovementResult<MovementRecord> {
        let reason = required(reason, "clear reason")?;
        let _guard = self.lock(id).await;
        let mut shipment = self.load(id).await?;
        if shipment.status.is_terminal() {
            return Err(MovementError::invalid_state(
                id,
                format!("cannot clear a {} shipment", shipment.status),
            ));
        }
        let mut movement = self.movement_of(id).await?;
        if movement.is_moving {
            return Err(MovementError::invalid_state(id, "already moving"));
        }
        let now = self.clock().now();

        movement.is_moving = true;
        movement.resumed_at = Some(now);
        movement.clear_reason = Some(reason.to_owned());
        movement.intercepted_point = None;
        movement.intercepted_address = None;
        shipment.status = ShipmentStatus::InTransit;

        let store = self.store();
        store.save_movement(&movement).await?;
        store.save_shipment(&shipment).await?;
        store
            .append_event(&TrackingEvent::new(
                id.clone(),
                TrackingEventKind::Cleared,
                format!("Shipment cleared: {reason}"),
                shipment.current_location.clone(),
                now,
            ))
            .await?;

        if !self.scheduler.resume(id).await && !self.scheduler.is_registered(id) {
            if let Err(e) = self.relaunch(&shipment).await {
                warn!(shipment = %id, error = %e, "cleared but simulation could not be relaunched");
            }
        }

        self.broadcaster().publish(ShipmentEvent::cleared(id.clone(), reason, now));
        info!(shipment = %id, actor = %actor, reason, "shipment cleared");
        Ok(movement)
    }

    // ── Cancel ────────────────────────────────────────────────────────────

    pub async fn cancel(&self, id: &ShipmentId) -> MovementResult<Shipment> {
        let _guard = self.lock(id).await;
        let shipment = self.load(id).await?;
        if shipment.status.is_terminal() {
            return Err(MovementError::invalid_state(id, format!("already {}", shipment.status)));
        }

        self.scheduler.stop(id).await;

        // The last tick may have delivered it.
        let mut shipment = self.load(id).await?;
        if shipment.status.is_terminal() {
            return Err(MovementError::invalid_state(id, format!("already {}", shipment.status)));
        }
        let now = self.clock().now();
        shipment.status = ShipmentStatus::Cancelled;

        let store = self.store();
        store.save_shipment(&shipment).await?;
        if let Some(mut movement) = store.movement(id).await? {
            movement.is_moving = false;
            store.save_movement(&movement).await?;
        }
        store
            .append_event(&TrackingEvent::new(
                id.clone(),
                TrackingEventKind::Cancelled,
                "Shipment cancelled",
                shipment.current_location.clone(),
                now,
            ))
            .await?;

        self.broadcaster().publish(ShipmentEvent::cancelled(id.clone(), now));
        info!(shipment = %id, "shipment cancelled");
        Ok(shipment)
    }

    // ── Address change ────────────────────────────────────────────────────

    /// Price a destination change without changing anything.
    pub async fn preview_address_change(&self, id: &ShipmentId, new_destination: &str) -> MovementResult<FeeQuote> {
        let shipment = self.load(id).await?;
        require_in_transit(&shipment)?;
        Ok(self.plan_reroute(&shipment, new_destination).await?.quote)
    }

    /// Re-quote, record the fee, and restart the simulation on a new leg
    /// from the current position to `new_destination`.
    ///
    /// The new leg gets a fresh trip clock.  The old leg's history stays in
    /// the event and location logs.
    pub async fn apply_address_change(
        &self,
        id:              &ShipmentId,
        new_destination: &str,
        actor:           &ActorId,
    ) -> MovementResult<FeeQuote> {
        let _guard = self.lock(id).await;
        let paused = self.scheduler.pause(id).await;
        let outcome = self.reroute(id, new_destination, actor).await;
        if outcome.is_err() && paused {
            self.scheduler.resume(id).await;
        }
        outcome
    }

    async fn reroute(&self, id: &ShipmentId, new_destination: &str, actor: &ActorId) -> MovementResult<FeeQuote> {
        let mut shipment = self.load(id).await?;
        require_in_transit(&shipment)?;
        let plan = self.plan_reroute(&shipment, new_destination).await?;
        let route = self.build_route(id, plan.from, plan.to).await?;
        let now = self.clock().now();
        let planned_ms = ms_between(now, plan.quote.new_eta).max(MIN_LEG_MS);

        let old_destination = std::mem::replace(&mut shipment.destination, new_destination.trim().to_owned());
        shipment.destination_point = Some(plan.to);
        shipment.remaining_distance_km = plan.quote.new_remaining_km;
        shipment.estimated_arrival = Some(plan.quote.new_eta);
        shipment.trip_started_at = Some(now);
        shipment.current_point = Some(plan.from);

        let store = self.store();
        store
            .append_fee(&FeeLedgerEntry {
                shipment_id:     id.clone(),
                actor:           actor.clone(),
                old_destination: old_destination.clone(),
                new_destination: shipment.destination.clone(),
                quote:           plan.quote.clone(),
                recorded_at:     now,
            })
            .await?;
        store.save_shipment(&shipment).await?;
        store
            .append_event(&TrackingEvent::new(
                id.clone(),
                TrackingEventKind::AddressChanged,
                format!("Destination changed from {old_destination} to {}", shipment.destination),
                shipment.current_location.clone(),
                now,
            ))
            .await?;

        // The paused old leg stays registered until every write has landed,
        // so a failure above leaves it resumable.  `start` replaces it.
        self.scheduler.start(id.clone(), route, planned_ms).await?;

        self.broadcaster().publish(ShipmentEvent::AddressChanged(AddressChanged {
            shipment_id:            id.clone(),
            new_destination:        shipment.destination.clone(),
            fee:                    plan.quote.total_fee,
            new_eta:                plan.quote.new_eta,
            new_remaining_distance: plan.quote.new_remaining_km,
            timestamp:              now,
        }));
        info!(
            shipment = %id,
            actor = %actor,
            from = %old_destination,
            to = %shipment.destination,
            fee = %plan.quote.total_fee,
            "destination changed",
        );
        Ok(plan.quote)
    }

    /// Straight-line distances from the current position to the old and new
    /// destinations feed the quote.
    async fn plan_reroute(&self, shipment: &Shipment, new_destination: &str) -> MovementResult<ReroutePlan> {
        let new_destination = required(new_destination, "new destination")?;
        let fix = self.locate_now(shipment).await?;
        let old_to = self.resolver.locate(&shipment.destination, shipment.destination_point).await?;
        let to = self.resolver.locate(new_destination, None).await?;
        let current_remaining = fix.remaining_km.unwrap_or(shipment.remaining_distance_km);

        let quote = quote_address_change(
            fix.point.distance_km(old_to),
            fix.point.distance_km(to),
            current_remaining,
            self.clock().now(),
            &self.pricing,
        )?;
        Ok(ReroutePlan { quote, from: fix.point, to })
    }

    // ── Recovery ──────────────────────────────────────────────────────────

    /// Restart simulations for shipments the store says are moving but that
    /// have no registered simulation, e.g. after a process restart.
    ///
    /// Returns how many were restarted.  Individual failures are logged and
    /// skipped.
    pub async fn recover_active(&self) -> MovementResult<usize> {
        let candidates = self.store().shipments_in_status(ShipmentStatus::InTransit).await?;
        let mut restarted = 0;
        for shipment in candidates {
            let id = shipment.id.clone();
            if self.scheduler.is_registered(&id) {
                continue;
            }
            let _guard = self.lock(&id).await;
            match self.store().movement(&id).await? {
                Some(movement) if movement.is_moving => {}
                _ => continue,
            }
            match self.relaunch(&shipment).await {
                Ok(()) => restarted += 1,
                Err(e) => warn!(shipment = %id, error = %e, "simulation not recovered"),
            }
        }
        info!(restarted, "active simulations recovered");
        Ok(restarted)
    }

    /// New leg from the last known point to the destination, planned to
    /// finish at the stored ETA.
    async fn relaunch(&self, shipment: &Shipment) -> MovementResult<()> {
        let id = &shipment.id;
        let from = self.last_known_point(shipment).await?;
        let to = self.resolver.locate(&shipment.destination, shipment.destination_point).await?;
        let now = self.clock().now();
        let planned_ms = shipment
            .estimated_arrival
            .map_or(MIN_LEG_MS, |eta| ms_between(now, eta))
            .max(MIN_LEG_MS);

        let route = self.build_route(id, from, to).await?;
        self.scheduler.start(id.clone(), route, planned_ms).await?;
        info!(shipment = %id, planned_ms, "simulation relaunched");
        Ok(())
    }

    // ── Helpers ───────────────────────────────────────────────────────────

    fn store(&self) -> &Arc<S> {
        self.scheduler.store()
    }

    fn broadcaster(&self) -> &Arc<B> {
        self.scheduler.broadcaster()
    }

    fn clock(&self) -> &Arc<dyn Clock> {
        self.scheduler.clock()
    }

    async fn lock(&self, id: &ShipmentId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(id.clone()).or_default().value());
        lock.lock_owned().await
    }

    async fn load(&self, id: &ShipmentId) -> MovementResult<Shipment> {
        self.store()
            .shipment(id)
            .await?
            .ok_or_else(|| MovementError::NotFound(id.clone()))
    }

    async fn movement_of(&self, id: &ShipmentId) -> MovementResult<MovementRecord> {
        self.store()
            .movement(id)
            .await?
            .ok_or_else(|| MovementError::invalid_state(id, "movement has not started"))
    }

    async fn build_route(&self, id: &ShipmentId, from: Waypoint, to: Waypoint) -> MovementResult<Route> {
        let road = self.resolver.road_geometry(from, to).await;
        self.routes.build(id, from, to, &[], road).map_err(MovementError::from_route)
    }

    /// Live simulation position, else the last known point.
    async fn locate_now(&self, shipment: &Shipment) -> MovementResult<Fix> {
        if let Some(status) = self.scheduler.status_of(&shipment.id).await {
            return Ok(Fix {
                point:        status.position,
                heading:      Some(status.bearing),
                remaining_km: Some(status.remaining_km),
            });
        }
        let point = self.last_known_point(shipment).await?;
        Ok(Fix { point, heading: None, remaining_km: None })
    }

    /// Latest location sample, then the snapshot coordinate, then the origin.
    async fn last_known_point(&self, shipment: &Shipment) -> MovementResult<Waypoint> {
        match self.store().latest_location(&shipment.id).await {
            Ok(Some(sample)) => return Ok(sample.point),
            Ok(None) => {}
            Err(e) => warn!(shipment = %shipment.id, error = %e, "location history unreadable"),
        }
        if let Some(point) = shipment.current_point {
            return Ok(point);
        }
        self.resolver.locate(&shipment.origin, shipment.origin_point).await
    }
}

fn required<'a>(text: &'a str, what: &str) -> MovementResult<&'a str> {
    let text = text.trim();
    if text.is_empty() {
        return Err(MovementError::Validation(format!("{what} must not be empty")));
    }
    Ok(text)
}

fn require_in_transit(shipment: &Shipment) -> MovementResult<()> {
    if shipment.status != ShipmentStatus::InTransit {
        return Err(MovementError::invalid_state(
            &shipment.id,
            format!("destination can only change in transit, shipment is {}", shipment.status),
        ));
    }
    Ok(())
}
