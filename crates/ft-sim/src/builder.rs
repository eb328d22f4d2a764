//! Fluent builder for constructing a [`SimulationScheduler`].

use std::sync::Arc;

use ft_core::{Clock, SimSettings, TokioClock};
use ft_store::MovementStore;

use crate::{Broadcaster, SimResult, SimulationScheduler};

/// Fluent builder for [`SimulationScheduler<S, B>`].
///
/// # Required inputs
///
/// - `S: MovementStore` — where snapshots, samples, and delivery land
/// - `B: Broadcaster` — where tick and lifecycle events are published
///
/// # Optional inputs (have defaults)
///
/// | Method          | Default                |
/// |-----------------|------------------------|
/// | `.clock(c)`     | `TokioClock::new()`    |
/// | `.settings(s)`  | `SimSettings::default()` |
///
/// # Example
///
/// ```rust,ignore
/// let scheduler = SchedulerBuilder::new(store, broadcaster)
///     .settings(config.sim)
///     .build()?;
/// ```
pub struct SchedulerBuilder<S, B> {
    store:       Arc<S>,
    broadcaster: Arc<B>,
    clock:       Option<Arc<dyn Clock>>,
    settings:    SimSettings,
}

impl<S: MovementStore, B: Broadcaster> SchedulerBuilder<S, B> {
    pub fn new(store: Arc<S>, broadcaster: Arc<B>) -> Self {
        Self {
            store,
            broadcaster,
            clock:    None,
            settings: SimSettings::default(),
        }
    }

    /// Override the time source.  Tests pass a clock anchored to a fixed
    /// instant so that timestamps are reproducible.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn settings(mut self, settings: SimSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Validate settings and construct the scheduler.
    ///
    /// # Errors
    ///
    /// - [`SimError::Config`][crate::SimError::Config] if `steps_per_segment`
    ///   or `snapshot_interval_ticks` is zero.
    pub fn build(self) -> SimResult<SimulationScheduler<S, B>> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock::new()));
        SimulationScheduler::new(self.store, self.broadcaster, clock, self.settings)
    }
}
