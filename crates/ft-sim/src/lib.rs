//! `ft-sim` — per-shipment movement simulation.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                 |
//! |---------------|----------------------------------------------------------|
//! | [`state`]     | `SimulationState`: step position, pause-aware ETA        |
//! | [`scheduler`] | `SimulationScheduler`: one actor task per shipment       |
//! | [`builder`]   | `SchedulerBuilder`: defaults for clock and settings      |
//! | [`event`]     | `ShipmentEvent` tagged payloads                          |
//! | [`broadcast`] | `Broadcaster` trait, `ChannelBroadcaster`, `NoopBroadcaster` |
//! | [`error`]     | `SimError`, `SimResult<T>`                               |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use ft_sim::{ChannelBroadcaster, SchedulerBuilder};
//! use ft_store::MemoryStore;
//!
//! let scheduler = SchedulerBuilder::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(ChannelBroadcaster::new()),
//! )
//! .settings(config.sim)
//! .build()?;
//! scheduler.start(id, route, planned_ms).await?;
//! ```

pub mod broadcast;
pub mod builder;
pub mod error;
pub mod event;
pub mod scheduler;
pub mod state;

#[cfg(test)]
mod tests;

pub use broadcast::{Broadcaster, ChannelBroadcaster, NoopBroadcaster};
pub use builder::SchedulerBuilder;
pub use error::{SimError, SimResult};
pub use event::{
    AddressChanged, DistanceInfo, EtaInfo, HoldChange, Lifecycle, LocationUpdate, Progress,
    ShipmentEvent,
};
pub use scheduler::SimulationScheduler;
pub use state::{Frame, SimStatus, SimulationState};
