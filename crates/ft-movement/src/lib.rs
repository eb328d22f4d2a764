//! `ft-movement` — shipment movement operations.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                     |
//! |----------------|--------------------------------------------------------------|
//! | [`controller`] | `MovementController` — start, intercept, clear, cancel, reroute, recovery |
//! | [`resolve`]    | `Resolver` — geocoding and road routing with timeouts and fallbacks |
//! | [`error`]      | `MovementError`, `MovementResult<T>`                         |
//!
//! # Movement model
//!
//! The durable `MovementRecord.is_moving` flag is the on/off switch; the
//! scheduler's in-memory pause mirrors it.  Every controller operation:
//!
//! 1. takes the shipment's operation lock,
//! 2. checks preconditions against the store (`NotFound`, `InvalidState`),
//! 3. quiesces the simulation (pause or stop) before writing,
//! 4. writes the store, appends a tracking event, and broadcasts.
//!
//! External lookups (geocoding, road routing) are bounded by
//! `external_timeout_ms` and fall back deterministically, so an outage
//! never blocks movement.

pub mod controller;
pub mod error;
pub mod resolve;


pub use controller::{MIN_LEG_MS, MovementController};
pub use error::{MovementError, MovementResult};
pub use resolve::Resolver;
