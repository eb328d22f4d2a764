//! `SimulationScheduler` — the registry of running shipment simulations.
//!
//! # One actor per shipment
//!
//! ```text
//! start(id) ──► spawn task ──► loop {
//!                               cancelled           → exit
//!                               command (pause, …)  → mutate own state, reply
//!                               interval tick       → tick()
//!                             }
//! ```
//!
//! Each task owns its [`SimulationState`] outright; nothing else can touch
//! it, so ticks and commands for one shipment are strictly serialized while
//! different shipments run concurrently.  The registry only holds a command
//! sender, a cancellation token, and the join handle.
//!
//! # Tick
//!
//! 1. Skip if paused in memory.
//! 2. Re-read `MovementRecord.is_moving`; skip if the durable flag says the
//!    shipment is stopped (or the read fails).
//! 3. Compute the frame for the current sub-step.
//! 4. Every `snapshot_interval_ticks` ticks, write a snapshot and a location
//!    sample.  Write failures are logged and the tick carries on.
//! 5. Broadcast a `locationUpdate`.
//! 6. Advance one sub-step; past the last segment, record delivery,
//!    broadcast the 100 % frame and `shipmentDelivered`, and deregister.
//!    If the delivery write fails the simulation stays registered and every
//!    later tick retries it.
//!
//! A tick lost to a failed movement read is made up on the next successful
//! one: the sub-steps it would have taken are applied before the frame is
//! computed.  A tick skipped because `is_moving` is false is a pause and is
//! not made up.
//!
//! `stop` cancels the token and waits for the task to exit, so once it
//! returns no further side effects for that simulation can happen.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use ft_core::{Clock, ShipmentId, SimSettings, Waypoint};
use ft_spatial::Route;
use ft_store::{LocationSample, MovementStore, ShipmentSnapshot};

use crate::{Broadcaster, Frame, ShipmentEvent, SimError, SimResult, SimStatus, SimulationState};

const COMMAND_BUFFER: usize = 16;

// ── Registry internals ────────────────────────────────────────────────────────

enum Command {
    Pause(oneshot::Sender<bool>),
    Resume(oneshot::Sender<bool>),
    Status(oneshot::Sender<SimStatus>),
}

struct Handle {
    /// Distinguishes this registration from a later restart under the same id.
    generation: u64,
    commands:   mpsc::Sender<Command>,
    cancel:     CancellationToken,
    task:       JoinHandle<()>,
}

struct Shared<S, B> {
    store:       Arc<S>,
    broadcaster: Arc<B>,
    clock:       Arc<dyn Clock>,
    settings:    SimSettings,
    registry:    DashMap<ShipmentId, Handle>,
    generations: AtomicU64,
}

// ── SimulationScheduler ───────────────────────────────────────────────────────

/// Runs one independent periodic simulation per shipment.
///
/// Cheap to clone; clones share the registry.
pub struct SimulationScheduler<S, B> {
    shared: Arc<Shared<S, B>>,
}

impl<S, B> Clone for SimulationScheduler<S, B> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<S: MovementStore, B: Broadcaster> SimulationScheduler<S, B> {
    pub fn new(
        store:       Arc<S>,
        broadcaster: Arc<B>,
        clock:       Arc<dyn Clock>,
        settings:    SimSettings,
    ) -> SimResult<Self> {
        if settings.steps_per_segment == 0 {
            return Err(SimError::Config("steps_per_segment must be at least 1".into()));
        }
        if settings.snapshot_interval_ticks == 0 {
            return Err(SimError::Config("snapshot_interval_ticks must be at least 1".into()));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                store,
                broadcaster,
                clock,
                settings,
                registry: DashMap::new(),
                generations: AtomicU64::new(0),
            }),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.shared.store
    }

    pub fn broadcaster(&self) -> &Arc<B> {
        &self.shared.broadcaster
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.shared.clock
    }

    pub fn settings(&self) -> &SimSettings {
        &self.shared.settings
    }

    /// Tick period for `route`: the planned duration spread over every
    /// sub-step, but never shorter than `min_tick_interval_ms`.
    pub fn tick_period(&self, route: &Route, planned_duration_ms: i64) -> Duration {
        let settings = &self.shared.settings;
        let steps = route.segment_count() as u64 * settings.steps_per_segment as u64;
        let per_step = planned_duration_ms.max(0) as u64 / steps.max(1);
        Duration::from_millis(per_step.max(settings.min_tick_interval_ms).max(1))
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Begin simulating `id` along `route`, replacing any running
    /// simulation for the same id.  The trip clock starts now.
    ///
    /// An invalid duration is rejected before anything running is touched.
    pub async fn start(&self, id: ShipmentId, route: Route, planned_duration_ms: i64) -> SimResult<()> {
        let now = self.shared.clock.now();
        let state = SimulationState::new(
            route,
            planned_duration_ms,
            self.shared.settings.steps_per_segment,
            now,
        )?;

        self.stop(&id).await;

        let period = self.tick_period(state.route(), planned_duration_ms);
        let generation = self.shared.generations.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);

        info!(
            shipment = %id,
            points = state.route().point_count(),
            total_km = state.route().total_km(),
            planned_ms = planned_duration_ms,
            period_ms = period.as_millis() as u64,
            "simulation started",
        );

        let span = info_span!("shipment", id = %id);
        let actor = Actor {
            id: id.clone(),
            generation,
            state,
            shared: Arc::clone(&self.shared),
            commands: commands_rx,
            cancel: cancel.clone(),
            period,
            ticks: 0,
            missed: 0,
        };
        let task = tokio::spawn(actor.run().instrument(span));

        let handle = Handle { generation, commands: commands_tx, cancel, task };
        if let Some(raced) = self.shared.registry.insert(id, handle) {
            // A concurrent start for the same id got in between.
            raced.cancel.cancel();
            let _ = raced.task.await;
        }
        Ok(())
    }

    /// Like [`start`](Self::start) but from raw points.  Fewer than two
    /// points is rejected with a warning and no timer is started.
    pub async fn start_points(&self, id: ShipmentId, points: Vec<Waypoint>, planned_duration_ms: i64) -> SimResult<()> {
        let route = Route::new(points).map_err(|e| {
            warn!(shipment = %id, error = %e, "route rejected, simulation not started");
            e
        })?;
        self.start(id, route, planned_duration_ms).await
    }

    /// Cancel and deregister.  Returns `false` if nothing was registered.
    ///
    /// Waits for the shipment's task to exit, including any tick in flight.
    pub async fn stop(&self, id: &ShipmentId) -> bool {
        let Some((_, handle)) = self.shared.registry.remove(id) else {
            return false;
        };
        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            warn!(shipment = %id, error = %e, "simulation task ended abnormally");
        }
        info!(shipment = %id, "simulation stopped");
        true
    }

    /// Stop every registered simulation.
    pub async fn shutdown(&self) {
        let ids: Vec<ShipmentId> = self.shared.registry.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.stop(&id).await;
        }
    }

    // ── Commands ──────────────────────────────────────────────────────────

    /// Open a pause.  `false` if not registered or already paused.
    pub async fn pause(&self, id: &ShipmentId) -> bool {
        self.request(id, Command::Pause).await.unwrap_or(false)
    }

    /// Close the open pause.  `false` if not registered or not paused.
    pub async fn resume(&self, id: &ShipmentId) -> bool {
        self.request(id, Command::Resume).await.unwrap_or(false)
    }

    pub async fn status_of(&self, id: &ShipmentId) -> Option<SimStatus> {
        self.request(id, Command::Status).await
    }

    pub fn is_registered(&self, id: &ShipmentId) -> bool {
        self.shared.registry.contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        self.shared.registry.len()
    }

    async fn request<T>(&self, id: &ShipmentId, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let commands = self.shared.registry.get(id).map(|h| h.commands.clone())?;
        let (reply_tx, reply_rx) = oneshot::channel();
        commands.send(make(reply_tx)).await.ok()?;
        reply_rx.await.ok()
    }
}

// ── Actor ─────────────────────────────────────────────────────────────────────

enum Flow {
    Continue,
    Finished,
}

struct Actor<S, B> {
    id:         ShipmentId,
    generation: u64,
    state:      SimulationState,
    shared:     Arc<Shared<S, B>>,
    commands:   mpsc::Receiver<Command>,
    cancel:     CancellationToken,
    period:     Duration,
    ticks:      u64,
    /// Ticks lost to failed movement reads since the last good one.
    missed:     u64,
}

impl<S: MovementStore, B: Broadcaster> Actor<S, B> {
    async fn run(mut self) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cancel = self.cancel.clone();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(ticks = self.ticks, "cancelled");
                    break;
                }
                Some(cmd) = self.commands.recv() => self.handle(cmd),
                _ = ticker.tick() => {
                    if let Flow::Finished = self.tick().await {
                        break;
                    }
                }
            }
        }
    }

    fn handle(&mut self, cmd: Command) {
        let now = self.shared.clock.now();
        match cmd {
            Command::Pause(reply) => {
                let changed = self.state.pause(now);
                if changed {
                    info!(percent = self.state.percent_complete(), "paused");
                }
                let _ = reply.send(changed);
            }
            Command::Resume(reply) => {
                let changed = self.state.resume(now);
                if changed {
                    info!(total_paused_ms = self.state.total_paused_ms(), "resumed");
                }
                let _ = reply.send(changed);
            }
            Command::Status(reply) => {
                let _ = reply.send(self.state.status(now));
            }
        }
    }

    async fn tick(&mut self) -> Flow {
        if self.state.is_paused() {
            trace!("paused, tick skipped");
            return Flow::Continue;
        }

        let shared = Arc::clone(&self.shared);
        match shared.store.movement(&self.id).await {
            Ok(Some(record)) if !record.is_moving => {
                debug!("movement record says stopped, tick skipped");
                return Flow::Continue;
            }
            Ok(_) => {}
            Err(e) => {
                self.missed += 1;
                error!(error = %e, missed = self.missed, "movement read failed, tick skipped");
                return Flow::Continue;
            }
        }
        if self.cancel.is_cancelled() {
            return Flow::Finished;
        }
        if self.state.is_arrived() {
            // Delivery was not recorded on an earlier tick.
            return self.arrive().await;
        }
        if self.missed > 0 {
            let caught_up = self.state.skip_steps(self.missed);
            debug!(missed = self.missed, caught_up, "catching up lost ticks");
            self.missed = 0;
        }

        let now = shared.clock.now();
        self.ticks += 1;
        let frame = self.state.frame(now, shared.settings.max_display_speed_kmh);

        if self.ticks % shared.settings.snapshot_interval_ticks == 0 {
            self.persist(&frame, now).await;
            if self.cancel.is_cancelled() {
                return Flow::Finished;
            }
        }

        shared.broadcaster.publish(ShipmentEvent::location(self.id.clone(), &frame, now));
        trace!(tick = self.ticks, percent = frame.percent_complete, remaining_km = frame.remaining_km, "tick");

        if self.state.advance() {
            return self.arrive().await;
        }
        Flow::Continue
    }

    async fn persist(&self, frame: &Frame, now: DateTime<Utc>) {
        let store = &self.shared.store;
        let snapshot = ShipmentSnapshot {
            current_location:      frame.position.label(),
            current_point:         frame.position,
            remaining_distance_km: frame.remaining_km,
            estimated_arrival:     frame.eta,
        };
        if let Err(e) = store.write_snapshot(&self.id, &snapshot).await {
            error!(error = %e, "snapshot write failed");
        }
        if let Err(e) = store.append_location(&self.sample(frame, now)).await {
            error!(error = %e, "location append failed");
        }
    }

    fn sample(&self, frame: &Frame, now: DateTime<Utc>) -> LocationSample {
        LocationSample {
            shipment_id: self.id.clone(),
            recorded_at: now,
            point:       frame.position,
            speed_kmh:   frame.speed_kmh,
            heading:     frame.bearing,
        }
    }

    /// Record delivery.  On a failed write nothing is published and the
    /// simulation stays registered so the next tick can retry.
    async fn arrive(&mut self) -> Flow {
        let shared = Arc::clone(&self.shared);
        let now = shared.clock.now();
        let frame = self.state.arrival_frame(now, shared.settings.max_display_speed_kmh);

        match shared.store.mark_delivered(&self.id, frame.position, now).await {
            Ok(true) => {
                info!(ticks = self.ticks, total_km = frame.total_km, "arrived, shipment delivered");
                if !self.cancel.is_cancelled() {
                    if let Err(e) = shared.store.append_location(&self.sample(&frame, now)).await {
                        warn!(error = %e, "final location append failed");
                    }
                    shared.broadcaster.publish(ShipmentEvent::location(self.id.clone(), &frame, now));
                    shared.broadcaster.publish(ShipmentEvent::delivered(self.id.clone(), now));
                }
            }
            Ok(false) => {
                warn!("arrived but shipment is already closed, delivery not recorded");
            }
            Err(e) => {
                error!(error = %e, "failed to record delivery, retrying next tick");
                return Flow::Continue;
            }
        }

        let generation = self.generation;
        shared.registry.remove_if(&self.id, |_, h| h.generation == generation);
        Flow::Finished
    }
}
