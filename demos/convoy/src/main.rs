//! convoy — end-to-end walk through the freight-twin movement engine.
//!
//! Three shipments leave New Jersey on compressed delivery windows so the
//! whole run finishes in well under a minute.  Along the way one is
//! intercepted and cleared, one has its destination changed, and one is
//! cancelled.  Every room is watched and location history is exported as CSV.
//!
//! ```text
//! cargo run -p convoy                       # in-memory store
//! CONVOY_DB=/tmp/convoy.db cargo run -p convoy
//! cargo run -p convoy -- engine.json        # override the engine config
//! RUST_LOG=debug CONVOY_LOG_JSON=1 cargo run -p convoy
//! ```

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use ft_core::{ActorId, EngineConfig, ShipmentId};
use ft_movement::{MovementController, Resolver};
use ft_sim::{ChannelBroadcaster, SchedulerBuilder, ShipmentEvent};
use ft_spatial::Gazetteer;
use ft_store::{MemoryStore, MovementStore, Shipment, SqliteStore, write_locations_csv};

// ── Constants ─────────────────────────────────────────────────────────────────

/// 0.0001 days = 8.64 s of wall time.
const QUICK_TRIP_DAYS: f64      = 0.000_1;
const LONG_TRIP_DAYS:  f64      = 0.000_2;
const RUN_DEADLINE:    Duration = Duration::from_secs(90);
const POLL_INTERVAL:   Duration = Duration::from_millis(250);

// ── Gazetteer CSV ─────────────────────────────────────────────────────────────

const PLACES_CSV: &str = "\
name,lat,lng\n\
Newark,40.7357,-74.1724\n\
Trenton,40.2171,-74.7429\n\
Princeton,40.3573,-74.6672\n\
Philadelphia,39.9526,-75.1652\n\
Baltimore,39.2904,-76.6122\n\
Washington,38.9072,-77.0369\n\
New York,40.7128,-74.0060\n\
New Haven,41.3083,-72.9279\n\
Hartford,41.7658,-72.6734\n\
";

// ── Shipments ─────────────────────────────────────────────────────────────────

struct Plan {
    id:          &'static str,
    origin:      &'static str,
    destination: &'static str,
    days:        f64,
}

const PLANS: [Plan; 3] = [
    Plan { id: "SHP-1001", origin: "Newark",   destination: "Philadelphia", days: QUICK_TRIP_DAYS },
    Plan { id: "SHP-1002", origin: "Trenton",  destination: "Baltimore",    days: LONG_TRIP_DAYS },
    Plan { id: "SHP-1003", origin: "New York", destination: "Hartford",     days: LONG_TRIP_DAYS },
];

/// Engine settings sized for a short interactive run.
fn demo_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.sim.steps_per_segment = 4;
    config.sim.snapshot_interval_ticks = 2;
    config.sim.min_tick_interval_ms = 100;
    // Rerouted legs are planned from this speed; keep them on the same
    // compressed scale as the trip windows.
    config.pricing.average_speed_kmh = 90_000.0;
    config.external_timeout_ms = 500;
    config
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if std::env::var_os("CONVOY_LOG_JSON").is_some() {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    println!("=== convoy: freight-twin movement demo ===");
    println!();

    // ── 1. Config ─────────────────────────────────────────────────────────
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load_json(Path::new(&path))
            .with_context(|| format!("loading engine config {path}"))?,
        None => demo_config(),
    };
    config.validate()?;
    println!(
        "[1/7] Config: {} steps/segment, snapshot every {} ticks, tick floor {} ms",
        config.sim.steps_per_segment, config.sim.snapshot_interval_ticks, config.sim.min_tick_interval_ms,
    );

    // ── 2. Store ──────────────────────────────────────────────────────────
    match std::env::var_os("CONVOY_DB") {
        Some(path) => {
            let store = SqliteStore::open(Path::new(&path))
                .with_context(|| format!("opening {}", Path::new(&path).display()))?;
            println!("[2/7] Store: SQLite at {}", Path::new(&path).display());
            run(Arc::new(store), config).await
        }
        None => {
            println!("[2/7] Store: in-memory");
            run(Arc::new(MemoryStore::new()), config).await
        }
    }
}

async fn run<S: MovementStore>(store: Arc<S>, config: EngineConfig) -> Result<()> {
    let t0 = Instant::now();

    // ── 3. Engine ─────────────────────────────────────────────────────────
    let gazetteer = Gazetteer::from_reader(Cursor::new(PLACES_CSV))?;
    println!("[3/7] Gazetteer: {} places", gazetteer.len());

    let broadcaster = Arc::new(ChannelBroadcaster::new());
    let scheduler = SchedulerBuilder::new(Arc::clone(&store), Arc::clone(&broadcaster))
        .settings(config.sim.clone())
        .build()?;
    let resolver = Resolver::without_roads(Arc::new(gazetteer), config.external_timeout());
    let controller = MovementController::new(scheduler, resolver, &config);

    let resumed = controller.recover_active().await?;
    if resumed > 0 {
        println!("      Resumed {resumed} in-transit shipments from a previous run");
    }

    // ── 4. Seed and start ─────────────────────────────────────────────────
    let mut watchers = Vec::new();
    for plan in &PLANS {
        let id = ShipmentId::new(plan.id);
        store.save_shipment(&Shipment::new(id.clone(), plan.origin, plan.destination)).await?;
        watchers.push(watch(&broadcaster, &id));

        let shipment = controller.start(&id, plan.days).await?;
        println!(
            "[4/7] {id}: {} -> {}  {:.1} km, ETA {}",
            shipment.origin,
            shipment.destination,
            shipment.total_distance_km,
            shipment.estimated_arrival.map_or_else(|| "-".into(), |t| t.format("%H:%M:%S").to_string()),
        );
    }

    // ── 5. Operations ─────────────────────────────────────────────────────
    let dispatch = ActorId::new("dispatch");
    let [hold, reroute, cancel] = PLANS.map(|p| ShipmentId::new(p.id));

    tokio::time::sleep(Duration::from_secs(2)).await;
    let record = controller.intercept(&hold, "customs inspection", &dispatch).await?;
    println!(
        "[5/7] {hold}: intercepted at {}",
        record.intercepted_address.as_deref().unwrap_or("unknown position"),
    );
    tokio::time::sleep(Duration::from_secs(1)).await;
    controller.clear(&hold, "paperwork verified", &dispatch).await?;
    println!("      {hold}: cleared, moving again");

    let quote = controller.preview_address_change(&reroute, "Washington").await?;
    println!(
        "      {reroute}: rerouting to Washington costs {} ({:+.1} km, {:+.0} min)",
        quote.total_fee, quote.distance_delta_km, quote.time_delta_minutes,
    );
    let applied = controller.apply_address_change(&reroute, "Washington", &dispatch).await?;
    println!("      {reroute}: applied, new ETA {}", applied.new_eta.format("%H:%M:%S"));

    tokio::time::sleep(Duration::from_secs(1)).await;
    controller.cancel(&cancel).await?;
    println!("      {cancel}: cancelled");

    // ── 6. Wait ───────────────────────────────────────────────────────────
    let deadline = Instant::now() + RUN_DEADLINE;
    while controller.scheduler().active_count() > 0 {
        if Instant::now() >= deadline {
            controller.scheduler().shutdown().await;
            bail!("simulations still running after {RUN_DEADLINE:?}");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    println!("[6/7] All simulations finished in {:.1}s", t0.elapsed().as_secs_f64());

    let mut updates = Vec::new();
    for watcher in watchers {
        updates.push(watcher.await?);
    }

    // ── 7. Summary ────────────────────────────────────────────────────────
    println!("[7/7] Summary");
    let out_dir = std::env::temp_dir().join("convoy");
    std::fs::create_dir_all(&out_dir)?;
    for (plan, update_count) in PLANS.iter().zip(updates) {
        let id = ShipmentId::new(plan.id);
        let shipment = store
            .shipment(&id)
            .await?
            .with_context(|| format!("{id} vanished from the store"))?;
        let samples = store.locations(&id).await?;
        let events = store.events(&id).await?;
        let fees = store.fees(&id).await?;

        let csv_path = out_dir.join(format!("{id}.csv"));
        write_locations_csv(&csv_path, &samples)?;

        println!(
            "      {id}: {:<11} to {:<12} remaining {:>6.1} km | {update_count} live updates, {} samples, {} events, {} fees",
            shipment.status.to_string(),
            shipment.destination,
            shipment.remaining_distance_km,
            samples.len(),
            events.len(),
            fees.len(),
        );
        for event in &events {
            println!("        {}  {:<12} {}", event.recorded_at.format("%H:%M:%S"), event.kind.as_str(), event.description);
        }
        println!("        history -> {}", csv_path.display());
    }

    controller.scheduler().shutdown().await;
    println!();
    println!("Done.");
    Ok(())
}

/// Follow one shipment's room until it is delivered or cancelled, echoing
/// lifecycle events.  Returns the number of location updates seen.
fn watch(broadcaster: &ChannelBroadcaster, id: &ShipmentId) -> JoinHandle<usize> {
    let mut rx = broadcaster.subscribe(id);
    tokio::spawn(async move {
        let mut updates = 0usize;
        loop {
            match rx.recv().await {
                Ok(ShipmentEvent::LocationUpdate(update)) => {
                    if updates == 0 {
                        if let Ok(json) = serde_json::to_string(&ShipmentEvent::LocationUpdate(update)) {
                            println!("      first update on the wire: {json}");
                        }
                    }
                    updates += 1;
                }
                Ok(event) => {
                    println!("      <- {} {}", event.name(), event.shipment_id());
                    if matches!(event, ShipmentEvent::Delivered(_) | ShipmentEvent::Cancelled(_)) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => updates += skipped as usize,
                Err(RecvError::Closed) => break,
            }
        }
        updates
    })
}
