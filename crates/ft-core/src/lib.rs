//! `ft-core` — foundational types for the freight-twin movement engine.
//!
//! This crate is a dependency of every other `ft-*` crate.  It has no
//! `ft-*` dependencies.
//!
//! # What lives here
//!
//! | Module      | Contents                                                  |
//! |-------------|-----------------------------------------------------------|
//! | [`ids`]     | `ShipmentId`, `ActorId`                                   |
//! | [`geo`]     | `Waypoint`, haversine distance, bearing, lerp             |
//! | [`status`]  | `ShipmentStatus` enum                                     |
//! | [`time`]    | `Clock`, `TokioClock`, `ManualClock`, ms helpers          |
//! | [`config`]  | `EngineConfig`, `SimSettings`, `PricingConfig`, `RoutingConfig` |
//! | [`rng`]     | `RouteRng` (per-shipment, deterministic)                  |
//! | [`error`]   | `CoreError`, `CoreResult`                                 |

pub mod config;
pub mod error;
pub mod geo;
pub mod ids;
pub mod rng;
pub mod status;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{EngineConfig, PricingConfig, RoutingConfig, SimSettings};
pub use error::{CoreError, CoreResult};
pub use geo::{EARTH_RADIUS_KM, Waypoint};
pub use ids::{ActorId, ShipmentId};
pub use rng::RouteRng;
pub use status::ShipmentStatus;
pub use time::{Clock, ManualClock, TokioClock};
