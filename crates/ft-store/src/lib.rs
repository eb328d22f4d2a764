//! `ft-store` — durable state for the freight-twin movement engine.
//!
//! The engine talks to storage only through [`MovementStore`].  Two backends
//! are provided, the second behind a Cargo feature:
//!
//! | Feature   | Backend         | Durability                         |
//! |-----------|-----------------|------------------------------------|
//! | *(none)*  | [`MemoryStore`] | process lifetime                   |
//! | `sqlite`  | `SqliteStore`   | one SQLite file, WAL journal       |
//!
//! Location history can be exported with [`write_locations_csv`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use ft_store::{MemoryStore, MovementStore, Shipment};
//!
//! let store = MemoryStore::new();
//! store.save_shipment(&Shipment::new("SHP-1", "New York", "Chicago")).await?;
//! ```

pub mod csv;
pub mod error;
pub mod memory;
pub mod record;
pub mod store;

#[cfg(feature = "sqlite")]
pub mod sqlite;


pub use csv::{write_locations, write_locations_csv};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use record::{
    FeeLedgerEntry, LocationSample, MovementRecord, Shipment, ShipmentSnapshot, TrackingEvent,
    TrackingEventKind,
};
pub use store::MovementStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
