//! Tests for ft-sim.
//!
//! Scheduler tests run on tokio's paused clock: `sleep` auto-advances
//! virtual time, so a 10-tick trip finishes instantly and deterministically.

use chrono::{DateTime, TimeZone, Utc};

use ft_core::{SimSettings, Waypoint};
use ft_spatial::Route;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap()
}

/// ~11 km due north, one segment.
fn two_point() -> Route {
    Route::new(vec![Waypoint::new(0.0, 0.0), Waypoint::new(0.1, 0.0)]).unwrap()
}

/// 10 steps per segment, snapshot every 5th tick, 1 s floor.
fn settings() -> SimSettings {
    SimSettings {
        steps_per_segment:       10,
        snapshot_interval_ticks: 5,
        min_tick_interval_ms:    1_000,
        max_display_speed_kmh:   120.0,
    }
}

// ── SimulationState ───────────────────────────────────────────────────────────

#[cfg(test)]
mod state {
    use chrono::Duration;

    use ft_core::time::MS_PER_HOUR;
    use ft_core::{Clock, ManualClock};

    use super::*;
    use crate::{SimError, SimulationState};

    const MIN: i64 = 60_000;

    fn hour_trip(clock: &ManualClock) -> SimulationState {
        SimulationState::new(two_point(), MS_PER_HOUR, 10, clock.now()).unwrap()
    }

    #[test]
    fn fresh_state_is_at_origin() {
        let clock = ManualClock::new(t0());
        let state = hour_trip(&clock);
        assert!(!state.is_paused());
        assert_eq!(state.percent_complete(), 0.0);
        assert_eq!(state.position(), Waypoint::new(0.0, 0.0));
        assert_eq!(state.eta(clock.now()), t0() + Duration::hours(1));
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(matches!(
            SimulationState::new(two_point(), 0, 10, t0()),
            Err(SimError::InvalidDuration(0))
        ));
        assert!(matches!(
            SimulationState::new(two_point(), MS_PER_HOUR, 0, t0()),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn rejects_unrepresentable_durations() {
        assert!(matches!(
            SimulationState::new(two_point(), i64::MAX, 10, t0()),
            Err(SimError::InvalidDuration(i64::MAX))
        ));
    }

    #[test]
    fn skip_steps_stops_short_of_arrival() {
        let clock = ManualClock::new(t0());
        let mut state = hour_trip(&clock);
        assert_eq!(state.skip_steps(3), 3);
        assert!((state.percent_complete() - 30.0).abs() < 1e-9);

        assert_eq!(state.skip_steps(50), 6);
        assert!((state.percent_complete() - 90.0).abs() < 1e-9);
        assert!(!state.is_arrived());
        assert_eq!(state.skip_steps(1), 0);
        assert!(state.advance());
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let clock = ManualClock::new(t0());
        let mut state = hour_trip(&clock);

        assert!(!state.resume(clock.now()));
        assert!(state.pause(clock.now()));
        clock.advance_mins(3);
        assert!(!state.pause(clock.now()));
        assert_eq!(state.paused_at(), Some(t0()));
        assert!(state.resume(clock.now()));
        assert!(!state.resume(clock.now()));
        assert_eq!(state.total_paused_ms(), 3 * MIN);
    }

    #[test]
    fn paused_time_is_not_travel_time() {
        let clock = ManualClock::new(t0());
        let mut state = hour_trip(&clock);

        clock.advance_mins(10);
        state.pause(clock.now());
        clock.advance_mins(5);
        state.resume(clock.now());
        clock.advance_mins(5);

        // 20 min of wall clock, 5 of them paused.
        assert_eq!(state.elapsed_ms(clock.now()), 15 * MIN);
        assert!((state.elapsed_fraction(clock.now()) - 0.25).abs() < 1e-12);
        assert_eq!(state.eta(clock.now()), clock.now() + Duration::minutes(45));
    }

    #[test]
    fn open_pause_pushes_eta_out() {
        let clock = ManualClock::new(t0());
        let mut state = hour_trip(&clock);

        clock.advance_mins(10);
        state.pause(clock.now());
        let eta_at_pause = state.eta(clock.now());
        clock.advance_mins(7);

        assert_eq!(state.elapsed_ms(clock.now()), 10 * MIN);
        assert_eq!(state.eta(clock.now()), eta_at_pause + Duration::minutes(7));
    }

    #[test]
    fn elapsed_never_decreases_across_pauses() {
        let clock = ManualClock::new(t0());
        let mut state = hour_trip(&clock);
        let mut last = state.elapsed_ms(clock.now());

        for round in 0..6 {
            clock.advance_mins(2);
            if round % 2 == 0 {
                state.pause(clock.now());
            } else {
                state.resume(clock.now());
            }
            let now = state.elapsed_ms(clock.now());
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn eta_bottoms_out_at_now() {
        let clock = ManualClock::new(t0());
        let state = hour_trip(&clock);
        clock.advance_mins(90);
        assert_eq!(state.remaining_hours(clock.now()), 0.0);
        assert_eq!(state.eta(clock.now()), clock.now());
    }

    #[test]
    fn two_point_route_arrives_on_tenth_step() {
        let clock = ManualClock::new(t0());
        let mut state = hour_trip(&clock);
        for _ in 0..9 {
            assert!(!state.advance());
        }
        assert!((state.percent_complete() - 90.0).abs() < 1e-9);
        assert!(state.advance());
        assert!(state.is_arrived());
        assert_eq!(state.percent_complete(), 100.0);
        assert_eq!(state.position(), Waypoint::new(0.1, 0.0));
    }

    #[test]
    fn frame_walks_the_segment() {
        let clock = ManualClock::new(t0());
        let mut state = hour_trip(&clock);
        for _ in 0..5 {
            state.advance();
        }
        let frame = state.frame(clock.now(), 120.0);

        assert!((frame.position.lat - 0.05).abs() < 1e-9);
        assert_eq!(frame.segment_index, 0);
        assert_eq!(frame.total_points, 2);
        assert!((frame.percent_complete - 50.0).abs() < 1e-9);
        assert!((frame.remaining_km - frame.total_km / 2.0).abs() < 1e-6);
        assert!((frame.covered_km + frame.remaining_km - frame.total_km).abs() < 1e-9);
        assert!(frame.bearing.abs() < 1e-6);
        // 11 km in an hour is well under the display cap.
        assert!(frame.speed_kmh > 10.0 && frame.speed_kmh < 12.0);
        assert_eq!(state.remaining_km(), frame.remaining_km);
    }

    #[test]
    fn speed_is_capped_for_display() {
        let state = SimulationState::new(two_point(), 60_000, 10, t0()).unwrap();
        assert_eq!(state.speed_kmh(120.0), 120.0);
    }

    #[test]
    fn arrival_frame_is_complete() {
        let clock = ManualClock::new(t0());
        let mut state = hour_trip(&clock);
        let frame = state.arrival_frame(clock.now(), 120.0);
        assert_eq!(frame.percent_complete, 100.0);
        assert_eq!(frame.remaining_km, 0.0);
        assert_eq!(frame.segment_index, 1);
        assert_eq!(frame.position, Waypoint::new(0.1, 0.0));
        assert_eq!(frame.eta, clock.now());
        assert_eq!(frame.minutes_remaining, 0.0);
    }

    #[test]
    fn status_reports_pause() {
        let clock = ManualClock::new(t0());
        let mut state = hour_trip(&clock);
        state.advance();
        state.pause(clock.now());
        let status = state.status(clock.now());
        assert!(status.is_paused);
        assert!((status.percent_complete - 10.0).abs() < 1e-9);
        assert!((status.position.lat - 0.01).abs() < 1e-9);
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod events {
    use rust_decimal::Decimal;
    use serde_json::json;

    use ft_core::ShipmentId;
    use ft_core::time::MS_PER_HOUR;

    use super::*;
    use crate::{AddressChanged, ShipmentEvent, SimulationState};

    #[test]
    fn lifecycle_wire_format() {
        let event = ShipmentEvent::cancelled(ShipmentId::new("S1"), t0());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "shipmentCancelled");
        assert_eq!(value["data"]["shipmentId"], "S1");
        assert!(value["data"]["timestamp"].as_str().unwrap().starts_with("2026-05-04T08:00:00"));
    }

    #[test]
    fn hold_change_carries_status() {
        let value = serde_json::to_value(ShipmentEvent::intercepted(ShipmentId::new("S1"), "customs", t0())).unwrap();
        assert_eq!(value["event"], "shipmentIntercepted");
        assert_eq!(value["data"]["status"], "INTERCEPTED");
        assert_eq!(value["data"]["reason"], "customs");

        let value = serde_json::to_value(ShipmentEvent::cleared(ShipmentId::new("S1"), "released", t0())).unwrap();
        assert_eq!(value["event"], "shipmentCleared");
        assert_eq!(value["data"]["status"], "CLEARED");
    }

    #[test]
    fn location_update_shape() {
        let mut state = SimulationState::new(two_point(), MS_PER_HOUR, 10, t0()).unwrap();
        let frame = state.frame(t0(), 120.0);
        let event = ShipmentEvent::location(ShipmentId::new("S1"), &frame, t0());
        assert_eq!(event.name(), "locationUpdate");

        let value = serde_json::to_value(&event).unwrap();
        let data = &value["data"];
        assert_eq!(data["latitude"], 0.0);
        assert_eq!(data["progress"], json!({ "currentIndex": 0, "totalPoints": 2, "percentComplete": 0.0 }));
        assert_eq!(data["distance"]["covered"], 0.0);
        assert!(data["eta"]["minutesRemaining"].as_f64().unwrap() > 59.0);
    }

    #[test]
    fn address_changed_round_trips() {
        let event = ShipmentEvent::AddressChanged(AddressChanged {
            shipment_id:            ShipmentId::new("S1"),
            new_destination:        "Boston".into(),
            fee:                    Decimal::new(3432, 2),
            new_eta:                t0(),
            new_remaining_distance: 310.5,
            timestamp:              t0(),
        });
        let text = serde_json::to_string(&event).unwrap();
        assert!(text.contains("\"addressChanged\""));
        assert!(text.contains("\"newRemainingDistance\""));
        let back: ShipmentEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back, event);
    }
}

// ── ChannelBroadcaster ────────────────────────────────────────────────────────

#[cfg(test)]
mod broadcast {
    use ft_core::ShipmentId;

    use super::*;
    use crate::{Broadcaster, ChannelBroadcaster, ShipmentEvent};

    #[test]
    fn rooms_are_per_shipment() {
        let rooms = ChannelBroadcaster::new();
        let a = ShipmentId::new("A");
        let b = ShipmentId::new("B");
        let mut rx_a = rooms.subscribe(&a);

        rooms.publish(ShipmentEvent::delivered(b.clone(), t0()));
        rooms.publish(ShipmentEvent::delivered(a.clone(), t0()));

        assert_eq!(rx_a.try_recv().unwrap().shipment_id(), &a);
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn publish_without_room_is_dropped() {
        let rooms = ChannelBroadcaster::new();
        rooms.publish(ShipmentEvent::delivered(ShipmentId::new("A"), t0()));
        assert_eq!(rooms.subscriber_count(&ShipmentId::new("A")), 0);
    }

    #[test]
    fn prune_drops_abandoned_rooms() {
        let rooms = ChannelBroadcaster::new();
        let a = ShipmentId::new("A");
        let rx = rooms.subscribe(&a);
        let _rx2 = rooms.subscribe(&a);
        assert_eq!(rooms.subscriber_count(&a), 2);
        drop(rx);
        rooms.prune();
        assert_eq!(rooms.subscriber_count(&a), 1);
    }
}

// ── SimulationScheduler ───────────────────────────────────────────────────────

#[cfg(test)]
mod scheduler {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::broadcast::Receiver;
    use tokio::time::sleep;

    use ft_core::{Clock, ShipmentId, ShipmentStatus, TokioClock};
    use ft_store::{
        FeeLedgerEntry, LocationSample, MemoryStore, MovementRecord, MovementStore, Shipment,
        ShipmentSnapshot, StoreError, StoreResult, TrackingEvent, TrackingEventKind,
    };

    use super::*;
    use crate::{
        Broadcaster, ChannelBroadcaster, SchedulerBuilder, ShipmentEvent, SimError,
        SimulationScheduler,
    };

    /// 10 s over 10 sub-steps: one tick per second.
    const TRIP_MS: i64 = 10_000;

    async fn seed<S: MovementStore>(store: &S, id: &ShipmentId) {
        let mut shipment = Shipment::new(id.clone(), "A", "B")
            .with_points(Waypoint::new(0.0, 0.0), Waypoint::new(0.1, 0.0));
        shipment.status = ShipmentStatus::InTransit;
        store.save_shipment(&shipment).await.unwrap();
        store.save_movement(&MovementRecord::moving(id.clone())).await.unwrap();
    }

    fn scheduler<S: MovementStore>(
        store: &Arc<S>,
        rooms: &Arc<ChannelBroadcaster>,
    ) -> SimulationScheduler<S, ChannelBroadcaster> {
        SchedulerBuilder::new(Arc::clone(store), Arc::clone(rooms))
            .clock(Arc::new(TokioClock::anchored_at(t0())))
            .settings(settings())
            .build()
            .unwrap()
    }

    fn drain(rx: &mut Receiver<ShipmentEvent>) -> Vec<ShipmentEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn locations(events: &[ShipmentEvent]) -> Vec<f64> {
        events
            .iter()
            .filter_map(|e| match e {
                ShipmentEvent::LocationUpdate(u) => Some(u.progress.percent_complete),
                _ => None,
            })
            .collect()
    }

    fn delivered(events: &[ShipmentEvent]) -> usize {
        events.iter().filter(|e| matches!(e, ShipmentEvent::Delivered(_))).count()
    }

    // ── Configuration ─────────────────────────────────────────────────────

    #[test]
    fn builder_rejects_zero_steps() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(ChannelBroadcaster::new());
        let result = SchedulerBuilder::new(store, rooms)
            .settings(SimSettings { steps_per_segment: 0, ..settings() })
            .build();
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[tokio::test]
    async fn tick_period_spreads_plan_with_floor() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(ChannelBroadcaster::new());
        let sched = scheduler(&store, &rooms);
        let route = Route::new(vec![
            Waypoint::new(0.0, 0.0),
            Waypoint::new(0.1, 0.0),
            Waypoint::new(0.2, 0.0),
            Waypoint::new(0.3, 0.0),
            Waypoint::new(0.4, 0.0),
        ])
        .unwrap();

        // 4 segments × 10 steps over an hour.
        assert_eq!(sched.tick_period(&route, 3_600_000), Duration::from_millis(90_000));
        assert_eq!(sched.tick_period(&route, 1_000), Duration::from_millis(1_000));
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn trip_runs_to_delivery() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(ChannelBroadcaster::new());
        let sched = scheduler(&store, &rooms);
        let id = ShipmentId::new("S1");
        seed(&*store, &id).await;
        let mut rx = rooms.subscribe(&id);

        sched.start(id.clone(), two_point(), TRIP_MS).await.unwrap();
        assert!(sched.is_registered(&id));

        sleep(Duration::from_millis(10_500)).await;

        let events = drain(&mut rx);
        let percents = locations(&events);
        assert_eq!(percents.len(), 11, "10 ticks plus the arrival frame");
        assert_eq!(percents[0], 0.0);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*percents.last().unwrap(), 100.0);
        assert!(matches!(events.last(), Some(ShipmentEvent::Delivered(_))));
        assert!(!sched.is_registered(&id));
        assert_eq!(sched.active_count(), 0);

        let shipment = store.shipment(&id).await.unwrap().unwrap();
        assert_eq!(shipment.status, ShipmentStatus::Delivered);
        assert_eq!(shipment.remaining_distance_km, 0.0);
        assert_eq!(shipment.current_point, Some(Waypoint::new(0.1, 0.0)));

        let kinds: Vec<_> = store.events(&id).await.unwrap().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![TrackingEventKind::Delivered]);
        assert!(!store.movement(&id).await.unwrap().unwrap().is_moving);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshots_follow_the_interval() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(ChannelBroadcaster::new());
        let sched = scheduler(&store, &rooms);
        let id = ShipmentId::new("S1");
        seed(&*store, &id).await;

        sched.start(id.clone(), two_point(), TRIP_MS).await.unwrap();

        sleep(Duration::from_millis(4_500)).await;
        assert!(store.locations(&id).await.unwrap().is_empty());
        assert!(store.shipment(&id).await.unwrap().unwrap().current_point.is_none());

        sleep(Duration::from_millis(1_000)).await;
        let samples = store.locations(&id).await.unwrap();
        assert_eq!(samples.len(), 1);
        let shipment = store.shipment(&id).await.unwrap().unwrap();
        assert_eq!(shipment.status, ShipmentStatus::InTransit);
        // Fifth tick reports the fourth sub-step.
        assert!((shipment.current_point.unwrap().lat - 0.04).abs() < 1e-9);
        assert_eq!(shipment.current_location.as_deref(), Some(samples[0].point.label().as_str()));

        sleep(Duration::from_millis(5_000)).await;
        // Tick 10 plus the final arrival sample.
        assert_eq!(store.locations(&id).await.unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_running_simulation() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(ChannelBroadcaster::new());
        let sched = scheduler(&store, &rooms);
        let id = ShipmentId::new("S1");
        seed(&*store, &id).await;
        let mut rx = rooms.subscribe(&id);

        sched.start(id.clone(), two_point(), TRIP_MS).await.unwrap();
        sleep(Duration::from_millis(3_500)).await;
        sched.start(id.clone(), two_point(), TRIP_MS).await.unwrap();
        assert_eq!(sched.active_count(), 1);
        drain(&mut rx);

        sleep(Duration::from_millis(20_000)).await;
        let events = drain(&mut rx);
        assert_eq!(locations(&events).len(), 11);
        assert_eq!(delivered(&events), 1);
        assert_eq!(store.events(&id).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_silences_the_shipment() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(ChannelBroadcaster::new());
        let sched = scheduler(&store, &rooms);
        let id = ShipmentId::new("S1");
        seed(&*store, &id).await;
        let mut rx = rooms.subscribe(&id);

        sched.start(id.clone(), two_point(), TRIP_MS).await.unwrap();
        sleep(Duration::from_millis(2_500)).await;
        assert!(sched.stop(&id).await);
        assert!(!sched.stop(&id).await);
        assert_eq!(locations(&drain(&mut rx)).len(), 2);

        sleep(Duration::from_millis(20_000)).await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(store.shipment(&id).await.unwrap().unwrap().status, ShipmentStatus::InTransit);
    }

    #[tokio::test]
    async fn unknown_ids_are_no_ops() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(ChannelBroadcaster::new());
        let sched = scheduler(&store, &rooms);
        let id = ShipmentId::new("ghost");

        assert!(!sched.stop(&id).await);
        assert!(!sched.pause(&id).await);
        assert!(!sched.resume(&id).await);
        assert!(sched.status_of(&id).await.is_none());
    }

    #[tokio::test]
    async fn rejects_short_routes_and_bad_durations() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(ChannelBroadcaster::new());
        let sched = scheduler(&store, &rooms);
        let id = ShipmentId::new("S1");

        let err = sched.start_points(id.clone(), vec![Waypoint::new(0.0, 0.0)], TRIP_MS).await;
        assert!(matches!(err, Err(SimError::Route(_))));
        let err = sched.start(id.clone(), two_point(), 0).await;
        assert!(matches!(err, Err(SimError::InvalidDuration(0))));
        assert!(!sched.is_registered(&id));
    }

    // ── Pausing ───────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_progress() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(ChannelBroadcaster::new());
        let sched = scheduler(&store, &rooms);
        let id = ShipmentId::new("S1");
        seed(&*store, &id).await;
        let mut rx = rooms.subscribe(&id);

        sched.start(id.clone(), two_point(), TRIP_MS).await.unwrap();
        sleep(Duration::from_millis(2_500)).await;

        assert!(sched.pause(&id).await);
        assert!(!sched.pause(&id).await);
        drain(&mut rx);

        sleep(Duration::from_millis(5_000)).await;
        assert!(drain(&mut rx).is_empty());
        let status = sched.status_of(&id).await.unwrap();
        assert!(status.is_paused);
        assert!((status.percent_complete - 20.0).abs() < 1e-9);

        assert!(sched.resume(&id).await);
        assert!(!sched.resume(&id).await);
        sleep(Duration::from_millis(3_000)).await;
        let percents = locations(&drain(&mut rx));
        assert_eq!(percents.len(), 3);
        assert!((percents[0] - 20.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn durable_stop_flag_skips_ticks() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(ChannelBroadcaster::new());
        let sched = scheduler(&store, &rooms);
        let id = ShipmentId::new("S1");
        seed(&*store, &id).await;
        let mut stopped = MovementRecord::moving(id.clone());
        stopped.is_moving = false;
        store.save_movement(&stopped).await.unwrap();
        let mut rx = rooms.subscribe(&id);

        sched.start(id.clone(), two_point(), TRIP_MS).await.unwrap();
        sleep(Duration::from_millis(5_500)).await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(sched.status_of(&id).await.unwrap().percent_complete, 0.0);
        assert!(sched.is_registered(&id));

        store.save_movement(&MovementRecord::moving(id.clone())).await.unwrap();
        sleep(Duration::from_millis(2_000)).await;
        assert_eq!(locations(&drain(&mut rx)), vec![0.0, 10.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_shipment_is_not_redelivered() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(ChannelBroadcaster::new());
        let sched = scheduler(&store, &rooms);
        let id = ShipmentId::new("S1");
        seed(&*store, &id).await;
        let mut rx = rooms.subscribe(&id);

        sched.start(id.clone(), two_point(), TRIP_MS).await.unwrap();
        sleep(Duration::from_millis(5_500)).await;

        let mut shipment = store.shipment(&id).await.unwrap().unwrap();
        shipment.status = ShipmentStatus::Cancelled;
        store.save_shipment(&shipment).await.unwrap();

        sleep(Duration::from_millis(10_000)).await;
        assert_eq!(delivered(&drain(&mut rx)), 0);
        assert!(store.events(&id).await.unwrap().is_empty());
        assert_eq!(store.shipment(&id).await.unwrap().unwrap().status, ShipmentStatus::Cancelled);
        assert!(!sched.is_registered(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn independent_shipments_run_concurrently() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(ChannelBroadcaster::new());
        let sched = scheduler(&store, &rooms);
        let a = ShipmentId::new("A");
        let b = ShipmentId::new("B");
        seed(&*store, &a).await;
        seed(&*store, &b).await;

        sched.start(a.clone(), two_point(), TRIP_MS).await.unwrap();
        sched.start(b.clone(), two_point(), TRIP_MS * 2).await.unwrap();
        assert_eq!(sched.active_count(), 2);

        sleep(Duration::from_millis(10_500)).await;
        assert!(!sched.is_registered(&a));
        assert!(sched.is_registered(&b));

        sched.shutdown().await;
        assert_eq!(sched.active_count(), 0);
        assert_eq!(store.shipment(&b).await.unwrap().unwrap().status, ShipmentStatus::InTransit);
    }

    // ── Store failures ────────────────────────────────────────────────────

    /// Delegates to a [`MemoryStore`] but fails every snapshot and sample
    /// write.  Movement reads fail while `movement_down` is set and delivery
    /// writes while `delivery_down` is set.
    struct FlakyStore {
        inner:         MemoryStore,
        movement_down: AtomicBool,
        delivery_down: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner:         MemoryStore::new(),
                movement_down: AtomicBool::new(false),
                delivery_down: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl MovementStore for FlakyStore {
        async fn shipment(&self, id: &ShipmentId) -> StoreResult<Option<Shipment>> {
            self.inner.shipment(id).await
        }

        async fn save_shipment(&self, shipment: &Shipment) -> StoreResult<()> {
            self.inner.save_shipment(shipment).await
        }

        async fn shipments_in_status(&self, status: ShipmentStatus) -> StoreResult<Vec<Shipment>> {
            self.inner.shipments_in_status(status).await
        }

        async fn write_snapshot(&self, _id: &ShipmentId, _snapshot: &ShipmentSnapshot) -> StoreResult<()> {
            Err(StoreError::Corrupt("disk full".into()))
        }

        async fn mark_delivered(&self, id: &ShipmentId, point: Waypoint, at: DateTime<Utc>) -> StoreResult<bool> {
            if self.delivery_down.load(Ordering::SeqCst) {
                return Err(StoreError::Corrupt("database is locked".into()));
            }
            self.inner.mark_delivered(id, point, at).await
        }

        async fn movement(&self, id: &ShipmentId) -> StoreResult<Option<MovementRecord>> {
            if self.movement_down.load(Ordering::SeqCst) {
                return Err(StoreError::Corrupt("connection reset".into()));
            }
            self.inner.movement(id).await
        }

        async fn save_movement(&self, record: &MovementRecord) -> StoreResult<()> {
            self.inner.save_movement(record).await
        }

        async fn append_location(&self, _sample: &LocationSample) -> StoreResult<()> {
            Err(StoreError::Corrupt("disk full".into()))
        }

        async fn latest_location(&self, id: &ShipmentId) -> StoreResult<Option<LocationSample>> {
            self.inner.latest_location(id).await
        }

        async fn locations(&self, id: &ShipmentId) -> StoreResult<Vec<LocationSample>> {
            self.inner.locations(id).await
        }

        async fn append_event(&self, event: &TrackingEvent) -> StoreResult<()> {
            self.inner.append_event(event).await
        }

        async fn events(&self, id: &ShipmentId) -> StoreResult<Vec<TrackingEvent>> {
            self.inner.events(id).await
        }

        async fn append_fee(&self, entry: &FeeLedgerEntry) -> StoreResult<()> {
            self.inner.append_fee(entry).await
        }

        async fn fees(&self, id: &ShipmentId) -> StoreResult<Vec<FeeLedgerEntry>> {
            self.inner.fees(id).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn write_failures_do_not_stop_the_trip() {
        let store = Arc::new(FlakyStore::new());
        let rooms = Arc::new(ChannelBroadcaster::new());
        let sched = scheduler(&store, &rooms);
        let id = ShipmentId::new("S1");
        seed(&*store, &id).await;
        let mut rx = rooms.subscribe(&id);

        sched.start(id.clone(), two_point(), TRIP_MS).await.unwrap();
        sleep(Duration::from_millis(10_500)).await;

        let events = drain(&mut rx);
        assert_eq!(locations(&events).len(), 11);
        assert_eq!(delivered(&events), 1);
        assert_eq!(store.shipment(&id).await.unwrap().unwrap().status, ShipmentStatus::Delivered);
    }

    #[tokio::test(start_paused = true)]
    async fn movement_read_failure_catches_up() {
        let store = Arc::new(FlakyStore::new());
        store.movement_down.store(true, Ordering::SeqCst);
        let rooms = Arc::new(ChannelBroadcaster::new());
        let sched = scheduler(&store, &rooms);
        let id = ShipmentId::new("S1");
        seed(&*store, &id).await;
        let mut rx = rooms.subscribe(&id);

        sched.start(id.clone(), two_point(), TRIP_MS).await.unwrap();
        sleep(Duration::from_millis(3_500)).await;
        assert!(drain(&mut rx).is_empty());

        // Three lost ticks are made up on the next good one.
        store.movement_down.store(false, Ordering::SeqCst);
        sleep(Duration::from_millis(1_000)).await;
        assert_eq!(locations(&drain(&mut rx)), vec![30.0]);

        // Still arrives on the planned schedule.
        sleep(Duration::from_millis(6_000)).await;
        let events = drain(&mut rx);
        assert_eq!(locations(&events), vec![40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]);
        assert_eq!(delivered(&events), 1);
        assert!(!sched.is_registered(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_delivery_write_is_retried() {
        let store = Arc::new(FlakyStore::new());
        store.delivery_down.store(true, Ordering::SeqCst);
        let rooms = Arc::new(ChannelBroadcaster::new());
        let sched = scheduler(&store, &rooms);
        let id = ShipmentId::new("S1");
        seed(&*store, &id).await;
        let mut rx = rooms.subscribe(&id);

        sched.start(id.clone(), two_point(), TRIP_MS).await.unwrap();
        sleep(Duration::from_millis(15_000)).await;

        let events = drain(&mut rx);
        assert_eq!(locations(&events).len(), 10, "no arrival frame without a recorded delivery");
        assert_eq!(delivered(&events), 0);
        assert!(sched.is_registered(&id));
        assert_eq!(store.shipment(&id).await.unwrap().unwrap().status, ShipmentStatus::InTransit);
        assert!(store.movement(&id).await.unwrap().unwrap().is_moving);

        store.delivery_down.store(false, Ordering::SeqCst);
        sleep(Duration::from_millis(1_500)).await;

        let events = drain(&mut rx);
        assert_eq!(locations(&events), vec![100.0]);
        assert_eq!(delivered(&events), 1);
        assert!(!sched.is_registered(&id));
        assert_eq!(store.shipment(&id).await.unwrap().unwrap().status, ShipmentStatus::Delivered);

        sleep(Duration::from_millis(3_000)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn status_timestamps_follow_virtual_time() {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(NoopRooms);
        let sched = SchedulerBuilder::new(Arc::clone(&store), rooms)
            .clock(Arc::new(TokioClock::anchored_at(t0())))
            .settings(settings())
            .build()
            .unwrap();
        let id = ShipmentId::new("S1");
        seed(&*store, &id).await;

        sched.start(id.clone(), two_point(), TRIP_MS).await.unwrap();
        sleep(Duration::from_millis(4_000)).await;
        let status = sched.status_of(&id).await.unwrap();
        assert_eq!(status.eta, t0() + chrono::Duration::seconds(10));
        assert_eq!(sched.clock().now(), t0() + chrono::Duration::seconds(4));
    }

    struct NoopRooms;

    impl Broadcaster for NoopRooms {
        fn publish(&self, _event: ShipmentEvent) {}
    }
}
