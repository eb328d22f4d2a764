//! SQLite backend (feature `sqlite`).
//!
//! One database file with five tables: `shipments`, `movements`,
//! `locations`, `events`, and `fees`.  Timestamps are stored as Unix
//! milliseconds, money as decimal text.
//!
//! `rusqlite` is blocking, so every call runs on tokio's blocking pool
//! against a connection shared behind a mutex.  A slow disk therefore never
//! stalls another shipment's tick.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};

use ft_core::{ActorId, ShipmentId, ShipmentStatus, Waypoint};

use crate::store::delivered_description;
use crate::{
    FeeLedgerEntry, LocationSample, MovementRecord, MovementStore, Shipment, ShipmentSnapshot,
    StoreError, StoreResult, TrackingEvent, TrackingEventKind,
};

const SCHEMA: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous  = NORMAL;
    CREATE TABLE IF NOT EXISTS shipments (
        id                    TEXT PRIMARY KEY,
        origin                TEXT NOT NULL,
        destination           TEXT NOT NULL,
        origin_lat            REAL,
        origin_lng            REAL,
        destination_lat       REAL,
        destination_lng       REAL,
        status                TEXT NOT NULL,
        total_distance_km     REAL NOT NULL,
        remaining_distance_km REAL NOT NULL,
        estimated_arrival_ms  INTEGER,
        trip_started_at_ms    INTEGER,
        current_location      TEXT,
        current_lat           REAL,
        current_lng           REAL
    );
    CREATE TABLE IF NOT EXISTS movements (
        shipment_id         TEXT PRIMARY KEY,
        is_moving           INTEGER NOT NULL,
        paused_by           TEXT,
        paused_at_ms        INTEGER,
        intercept_reason    TEXT,
        resumed_at_ms       INTEGER,
        clear_reason        TEXT,
        intercepted_lat     REAL,
        intercepted_lng     REAL,
        intercepted_address TEXT
    );
    CREATE TABLE IF NOT EXISTS locations (
        seq            INTEGER PRIMARY KEY AUTOINCREMENT,
        shipment_id    TEXT NOT NULL,
        recorded_at_ms INTEGER NOT NULL,
        lat            REAL NOT NULL,
        lng            REAL NOT NULL,
        speed_kmh      REAL NOT NULL,
        heading        REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS locations_by_shipment ON locations (shipment_id, seq);
    CREATE TABLE IF NOT EXISTS events (
        seq            INTEGER PRIMARY KEY AUTOINCREMENT,
        shipment_id    TEXT NOT NULL,
        kind           TEXT NOT NULL,
        description    TEXT NOT NULL,
        location       TEXT,
        recorded_at_ms INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS fees (
        seq             INTEGER PRIMARY KEY AUTOINCREMENT,
        shipment_id     TEXT NOT NULL,
        actor           TEXT NOT NULL,
        old_destination TEXT NOT NULL,
        new_destination TEXT NOT NULL,
        total_fee       TEXT NOT NULL,
        quote           TEXT NOT NULL,
        recorded_at_ms  INTEGER NOT NULL
    );";

const SHIPMENT_COLUMNS: &str = "id, origin, destination, origin_lat, origin_lng, destination_lat, \
     destination_lng, status, total_distance_km, remaining_distance_km, estimated_arrival_ms, \
     trip_started_at_ms, current_location, current_lat, current_lng";

/// A [`MovementStore`] persisted to an SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and initialise the schema.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// A private in-memory database, mainly for tests.
    pub fn in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

// ── Column helpers ────────────────────────────────────────────────────────────

fn to_ms(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_ms(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp {ms} out of range")))
}

fn opt_from_ms(ms: Option<i64>) -> StoreResult<Option<DateTime<Utc>>> {
    ms.map(from_ms).transpose()
}

fn point(lat: Option<f64>, lng: Option<f64>) -> Option<Waypoint> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(Waypoint::new(lat, lng)),
        _ => None,
    }
}

fn status(raw: &str) -> StoreResult<ShipmentStatus> {
    raw.parse().map_err(|e: ft_core::CoreError| StoreError::Corrupt(e.to_string()))
}

// ── Raw rows ──────────────────────────────────────────────────────────────────

/// Column values exactly as stored; decoded after the statement finishes.
struct ShipmentRow {
    id:           String,
    origin:       String,
    destination:  String,
    origin_pt:    (Option<f64>, Option<f64>),
    dest_pt:      (Option<f64>, Option<f64>),
    status:       String,
    total_km:     f64,
    remaining_km: f64,
    eta_ms:       Option<i64>,
    started_ms:   Option<i64>,
    location:     Option<String>,
    current_pt:   (Option<f64>, Option<f64>),
}

impl ShipmentRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id:           row.get(0)?,
            origin:       row.get(1)?,
            destination:  row.get(2)?,
            origin_pt:    (row.get(3)?, row.get(4)?),
            dest_pt:      (row.get(5)?, row.get(6)?),
            status:       row.get(7)?,
            total_km:     row.get(8)?,
            remaining_km: row.get(9)?,
            eta_ms:       row.get(10)?,
            started_ms:   row.get(11)?,
            location:     row.get(12)?,
            current_pt:   (row.get(13)?, row.get(14)?),
        })
    }

    fn decode(self) -> StoreResult<Shipment> {
        Ok(Shipment {
            id:                    ShipmentId::from(self.id),
            origin:                self.origin,
            destination:           self.destination,
            origin_point:          point(self.origin_pt.0, self.origin_pt.1),
            destination_point:     point(self.dest_pt.0, self.dest_pt.1),
            status:                status(&self.status)?,
            total_distance_km:     self.total_km,
            remaining_distance_km: self.remaining_km,
            estimated_arrival:     opt_from_ms(self.eta_ms)?,
            trip_started_at:       opt_from_ms(self.started_ms)?,
            current_location:      self.location,
            current_point:         point(self.current_pt.0, self.current_pt.1),
        })
    }
}

struct MovementRow {
    shipment_id: String,
    is_moving:   bool,
    paused_by:   Option<String>,
    paused_ms:   Option<i64>,
    reason:      Option<String>,
    resumed_ms:  Option<i64>,
    clear:       Option<String>,
    held_pt:     (Option<f64>, Option<f64>),
    address:     Option<String>,
}

impl MovementRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            shipment_id: row.get(0)?,
            is_moving:   row.get(1)?,
            paused_by:   row.get(2)?,
            paused_ms:   row.get(3)?,
            reason:      row.get(4)?,
            resumed_ms:  row.get(5)?,
            clear:       row.get(6)?,
            held_pt:     (row.get(7)?, row.get(8)?),
            address:     row.get(9)?,
        })
    }

    fn decode(self) -> StoreResult<MovementRecord> {
        Ok(MovementRecord {
            shipment_id:         ShipmentId::from(self.shipment_id),
            is_moving:           self.is_moving,
            paused_by:           self.paused_by.map(ActorId::from),
            paused_at:           opt_from_ms(self.paused_ms)?,
            intercept_reason:    self.reason,
            resumed_at:          opt_from_ms(self.resumed_ms)?,
            clear_reason:        self.clear,
            intercepted_point:   point(self.held_pt.0, self.held_pt.1),
            intercepted_address: self.address,
        })
    }
}

struct LocationRow {
    ms:        i64,
    lat:       f64,
    lng:       f64,
    speed_kmh: f64,
    heading:   f64,
}

impl LocationRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            ms:        row.get(0)?,
            lat:       row.get(1)?,
            lng:       row.get(2)?,
            speed_kmh: row.get(3)?,
            heading:   row.get(4)?,
        })
    }

    fn decode(self, id: &ShipmentId) -> StoreResult<LocationSample> {
        Ok(LocationSample {
            shipment_id: id.clone(),
            recorded_at: from_ms(self.ms)?,
            point:       Waypoint::new(self.lat, self.lng),
            speed_kmh:   self.speed_kmh,
            heading:     self.heading,
        })
    }
}

fn insert_event(conn: &Connection, event: &TrackingEvent) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO events (shipment_id, kind, description, location, recorded_at_ms) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.shipment_id.as_str(),
            event.kind.as_str(),
            event.description,
            event.location,
            to_ms(event.recorded_at),
        ],
    )?;
    Ok(())
}

// ── MovementStore ─────────────────────────────────────────────────────────────

#[async_trait]
impl MovementStore for SqliteStore {
    async fn shipment(&self, id: &ShipmentId) -> StoreResult<Option<Shipment>> {
        let id = id.clone();
        self.blocking(move |conn| {
            let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = ?1");
            let row = conn.query_row(&sql, params![id.as_str()], ShipmentRow::read).optional()?;
            row.map(ShipmentRow::decode).transpose()
        })
        .await
    }

    async fn save_shipment(&self, shipment: &Shipment) -> StoreResult<()> {
        let s = shipment.clone();
        self.blocking(move |conn| {
            let sql = format!(
                "INSERT OR REPLACE INTO shipments ({SHIPMENT_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            );
            conn.execute(&sql, params![
                s.id.as_str(),
                s.origin,
                s.destination,
                s.origin_point.map(|p| p.lat),
                s.origin_point.map(|p| p.lng),
                s.destination_point.map(|p| p.lat),
                s.destination_point.map(|p| p.lng),
                s.status.as_str(),
                s.total_distance_km,
                s.remaining_distance_km,
                s.estimated_arrival.map(to_ms),
                s.trip_started_at.map(to_ms),
                s.current_location,
                s.current_point.map(|p| p.lat),
                s.current_point.map(|p| p.lng),
            ])?;
            Ok(())
        })
        .await
    }

    async fn shipments_in_status(&self, wanted: ShipmentStatus) -> StoreResult<Vec<Shipment>> {
        self.blocking(move |conn| {
            let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE status = ?1 ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![wanted.as_str()], ShipmentRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(ShipmentRow::decode).collect()
        })
        .await
    }

    async fn write_snapshot(&self, id: &ShipmentId, snapshot: &ShipmentSnapshot) -> StoreResult<()> {
        let id = id.clone();
        let snap = snapshot.clone();
        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE shipments SET current_location = ?2, current_lat = ?3, current_lng = ?4, \
                 remaining_distance_km = ?5, estimated_arrival_ms = ?6 WHERE id = ?1",
                params![
                    id.as_str(),
                    snap.current_location,
                    snap.current_point.lat,
                    snap.current_point.lng,
                    snap.remaining_distance_km,
                    to_ms(snap.estimated_arrival),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::MissingShipment(id));
            }
            Ok(())
        })
        .await
    }

    async fn mark_delivered(&self, id: &ShipmentId, at_point: Waypoint, at: DateTime<Utc>) -> StoreResult<bool> {
        let id = id.clone();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let current: Option<(String, String)> = tx
                .query_row(
                    "SELECT status, destination FROM shipments WHERE id = ?1",
                    params![id.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((raw_status, destination)) = current else {
                return Err(StoreError::MissingShipment(id));
            };
            if status(&raw_status)?.is_terminal() {
                return Ok(false);
            }

            tx.execute(
                "UPDATE shipments SET status = ?2, remaining_distance_km = 0, estimated_arrival_ms = ?3, \
                 current_location = ?4, current_lat = ?5, current_lng = ?6 WHERE id = ?1",
                params![
                    id.as_str(),
                    ShipmentStatus::Delivered.as_str(),
                    to_ms(at),
                    destination,
                    at_point.lat,
                    at_point.lng,
                ],
            )?;
            tx.execute("UPDATE movements SET is_moving = 0 WHERE shipment_id = ?1", params![id.as_str()])?;
            insert_event(&tx, &TrackingEvent::new(
                id.clone(),
                TrackingEventKind::Delivered,
                delivered_description(&destination),
                Some(destination.clone()),
                at,
            ))?;
            tx.commit()?;
            Ok(true)
        })
        .await
    }

    async fn movement(&self, id: &ShipmentId) -> StoreResult<Option<MovementRecord>> {
        let id = id.clone();
        self.blocking(move |conn| {
            let row = conn
                .query_row(
                    "SELECT shipment_id, is_moving, paused_by, paused_at_ms, intercept_reason, \
                     resumed_at_ms, clear_reason, intercepted_lat, intercepted_lng, intercepted_address \
                     FROM movements WHERE shipment_id = ?1",
                    params![id.as_str()],
                    MovementRow::read,
                )
                .optional()?;
            row.map(MovementRow::decode).transpose()
        })
        .await
    }

    async fn save_movement(&self, record: &MovementRecord) -> StoreResult<()> {
        let r = record.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO movements (shipment_id, is_moving, paused_by, paused_at_ms, \
                 intercept_reason, resumed_at_ms, clear_reason, intercepted_lat, intercepted_lng, \
                 intercepted_address) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    r.shipment_id.as_str(),
                    r.is_moving,
                    r.paused_by.as_ref().map(|a| a.as_str().to_owned()),
                    r.paused_at.map(to_ms),
                    r.intercept_reason,
                    r.resumed_at.map(to_ms),
                    r.clear_reason,
                    r.intercepted_point.map(|p| p.lat),
                    r.intercepted_point.map(|p| p.lng),
                    r.intercepted_address,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn append_location(&self, sample: &LocationSample) -> StoreResult<()> {
        let s = sample.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO locations (shipment_id, recorded_at_ms, lat, lng, speed_kmh, heading) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    s.shipment_id.as_str(),
                    to_ms(s.recorded_at),
                    s.point.lat,
                    s.point.lng,
                    s.speed_kmh,
                    s.heading,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn latest_location(&self, id: &ShipmentId) -> StoreResult<Option<LocationSample>> {
        let id = id.clone();
        self.blocking(move |conn| {
            let row = conn
                .query_row(
                    "SELECT recorded_at_ms, lat, lng, speed_kmh, heading FROM locations \
                     WHERE shipment_id = ?1 ORDER BY seq DESC LIMIT 1",
                    params![id.as_str()],
                    LocationRow::read,
                )
                .optional()?;
            row.map(|r| r.decode(&id)).transpose()
        })
        .await
    }

    async fn locations(&self, id: &ShipmentId) -> StoreResult<Vec<LocationSample>> {
        let id = id.clone();
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT recorded_at_ms, lat, lng, speed_kmh, heading FROM locations \
                 WHERE shipment_id = ?1 ORDER BY seq",
            )?;
            let rows = stmt
                .query_map(params![id.as_str()], LocationRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(|r| r.decode(&id)).collect()
        })
        .await
    }

    async fn append_event(&self, event: &TrackingEvent) -> StoreResult<()> {
        let e = event.clone();
        self.blocking(move |conn| insert_event(conn, &e)).await
    }

    async fn events(&self, id: &ShipmentId) -> StoreResult<Vec<TrackingEvent>> {
        let id = id.clone();
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT kind, description, location, recorded_at_ms FROM events \
                 WHERE shipment_id = ?1 ORDER BY seq",
            )?;
            let rows = stmt
                .query_map(params![id.as_str()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter()
                .map(|(kind, description, location, ms)| -> StoreResult<TrackingEvent> {
                    Ok(TrackingEvent {
                        shipment_id: id.clone(),
                        kind: kind.parse()?,
                        description,
                        location,
                        recorded_at: from_ms(ms)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn append_fee(&self, entry: &FeeLedgerEntry) -> StoreResult<()> {
        let e = entry.clone();
        self.blocking(move |conn| {
            let quote = serde_json::to_string(&e.quote)?;
            conn.execute(
                "INSERT INTO fees (shipment_id, actor, old_destination, new_destination, total_fee, \
                 quote, recorded_at_ms) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    e.shipment_id.as_str(),
                    e.actor.as_str(),
                    e.old_destination,
                    e.new_destination,
                    e.quote.total_fee.to_string(),
                    quote,
                    to_ms(e.recorded_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn fees(&self, id: &ShipmentId) -> StoreResult<Vec<FeeLedgerEntry>> {
        let id = id.clone();
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT actor, old_destination, new_destination, quote, recorded_at_ms FROM fees \
                 WHERE shipment_id = ?1 ORDER BY seq",
            )?;
            let rows = stmt
                .query_map(params![id.as_str()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter()
                .map(|(actor, old_destination, new_destination, quote, ms)| -> StoreResult<FeeLedgerEntry> {
                    Ok(FeeLedgerEntry {
                        shipment_id: id.clone(),
                        actor: ActorId::from(actor),
                        old_destination,
                        new_destination,
                        quote: serde_json::from_str(&quote)?,
                        recorded_at: from_ms(ms)?,
                    })
                })
                .collect()
        })
        .await
    }
}
