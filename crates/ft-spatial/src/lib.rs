//! `ft-spatial` — route geometry, route building, and place resolution.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                   |
//! |---------------|------------------------------------------------------------|
//! | [`route`]     | `Route`, `RoutePosition`, `cumulative_distances`, `position_at_progress` |
//! | [`builder`]   | `RouteBuilder`, `Stop`, `StopKind`                         |
//! | [`provider`]  | `Geocoder` and `RoadRouter` collaborator traits, `NoRoadRouter` |
//! | [`gazetteer`] | `Gazetteer` — CSV place table + R-tree reverse lookup      |
//! | [`error`]     | `SpatialError`, `SpatialResult<T>`                         |

pub mod builder;
pub mod error;
pub mod gazetteer;
pub mod provider;
pub mod route;

#[cfg(test)]
mod tests;

pub use builder::{RouteBuilder, Stop, StopKind};
pub use error::{SpatialError, SpatialResult};
pub use gazetteer::Gazetteer;
pub use provider::{Geocoder, NoRoadRouter, RoadRouter};
pub use route::{Route, RoutePosition, cumulative_distances, position_at_progress};
