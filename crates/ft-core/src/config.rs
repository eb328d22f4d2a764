//! Engine configuration.
//!
//! Typically loaded from a JSON file by the application crate and passed to
//! the scheduler, route builder, pricing engine, and controller by value.
//! Every field has a default, so a config file only lists what it overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

// ── SimSettings ───────────────────────────────────────────────────────────────

/// Per-shipment tick loop tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// Sub-steps each route segment is divided into.
    pub steps_per_segment: u32,

    /// Persist a snapshot and a location sample every N ticks.  1 = every tick.
    pub snapshot_interval_ticks: u64,

    /// Floor on the tick period, in milliseconds.  Bounds update volume for
    /// short trips with many segments.
    pub min_tick_interval_ms: u64,

    /// Cap on the speed shown to subscribers.
    pub max_display_speed_kmh: f64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            steps_per_segment:       10,
            snapshot_interval_ticks: 5,
            min_tick_interval_ms:    1_000,
            max_display_speed_kmh:   120.0,
        }
    }
}

// ── PricingConfig ─────────────────────────────────────────────────────────────

/// Address-change fee schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Flat fee charged for every applied address change.
    pub base_fee: f64,

    /// Charge per additional mile when the new route is longer.
    pub per_mile_fee: f64,

    /// Speed assumed when converting distance deltas into time deltas.
    pub average_speed_kmh: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_fee:          25.0,
            per_mile_fee:      1.5,
            average_speed_kmh: 60.0,
        }
    }
}

// ── RoutingConfig ─────────────────────────────────────────────────────────────

/// Synthetic route generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Hops shorter than this are emitted as a straight two-point line.
    pub curve_threshold_km: f64,

    /// Peak lateral offset of the bulge as a fraction of hop length.
    pub max_bulge_ratio: f64,

    /// Number of points a curved hop is sampled into (including endpoints).
    pub points_per_leg: usize,

    /// Mixed with the shipment id to pick each route's bulge.
    pub seed: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            curve_threshold_km: 100.0,
            max_bulge_ratio:    0.08,
            points_per_leg:     12,
            seed:               42,
        }
    }
}

// ── EngineConfig ──────────────────────────────────────────────────────────────

/// Top-level engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sim:     SimSettings,
    pub pricing: PricingConfig,
    pub routing: RoutingConfig,

    /// Timeout applied to every geocoding and road-routing call.
    pub external_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sim:                 SimSettings::default(),
            pricing:             PricingConfig::default(),
            routing:             RoutingConfig::default(),
            external_timeout_ms: 3_000,
        }
    }
}

impl EngineConfig {
    /// Read and validate a JSON config file.
    pub fn load_json(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(raw: &str) -> CoreResult<Self> {
        let config: EngineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn external_timeout(&self) -> Duration {
        Duration::from_millis(self.external_timeout_ms)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        let sim = &self.sim;
        if sim.steps_per_segment == 0 {
            return Err(CoreError::Config("sim.steps_per_segment must be > 0".into()));
        }
        if sim.snapshot_interval_ticks == 0 {
            return Err(CoreError::Config("sim.snapshot_interval_ticks must be > 0".into()));
        }
        if sim.min_tick_interval_ms == 0 {
            return Err(CoreError::Config("sim.min_tick_interval_ms must be > 0".into()));
        }
        if !(sim.max_display_speed_kmh > 0.0) {
            return Err(CoreError::Config("sim.max_display_speed_kmh must be > 0".into()));
        }

        let pricing = &self.pricing;
        if !(pricing.base_fee >= 0.0) || !(pricing.per_mile_fee >= 0.0) {
            return Err(CoreError::Config("pricing fees must be non-negative".into()));
        }
        if !(pricing.average_speed_kmh > 0.0) {
            return Err(CoreError::Config("pricing.average_speed_kmh must be > 0".into()));
        }

        let routing = &self.routing;
        if routing.points_per_leg < 2 {
            return Err(CoreError::Config("routing.points_per_leg must be >= 2".into()));
        }
        if !(0.0..=0.5).contains(&routing.max_bulge_ratio) {
            return Err(CoreError::Config("routing.max_bulge_ratio must be within [0, 0.5]".into()));
        }
        if self.external_timeout_ms == 0 {
            return Err(CoreError::Config("external_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}
