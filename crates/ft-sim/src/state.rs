//! `SimulationState` — one shipment's in-memory trip bookkeeping.
//!
//! # Two notions of progress
//!
//! - **Position** is step-driven.  The route is walked in
//!   `steps_per_segment` equal sub-steps per segment, one per tick, so the
//!   broadcast position moves smoothly regardless of segment length.
//!   Ticks the scheduler could not run are made up with
//!   [`SimulationState::skip_steps`].
//! - **ETA** is clock-driven:
//!
//!   ```text
//!   elapsed   = now - trip_started_at - total_paused - (now - paused_at if paused)
//!   remaining = max(0, planned - elapsed)
//!   eta       = now + remaining
//!   ```
//!
//!   Paused intervals never count as travel, and an open pause pushes the
//!   ETA out live, before `resume` folds it into `total_paused_ms`.
//!
//! `is_paused()` is defined as `paused_at.is_some()`, so the two can never
//! disagree.

use chrono::{DateTime, Duration, Utc};

use ft_core::time::{MS_PER_HOUR, ms_between};
use ft_core::Waypoint;
use ft_spatial::Route;

use crate::{SimError, SimResult};

// ── Frame / status ────────────────────────────────────────────────────────────

/// Everything a single tick broadcasts.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub position:          Waypoint,
    pub bearing:           f64,
    pub speed_kmh:         f64,
    /// Index of the route point the shipment last passed.
    pub segment_index:     usize,
    pub total_points:      usize,
    pub percent_complete:  f64,
    pub total_km:          f64,
    pub remaining_km:      f64,
    pub covered_km:        f64,
    pub eta:               DateTime<Utc>,
    pub minutes_remaining: f64,
}

/// Answer to a status probe on a registered simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct SimStatus {
    pub segment_index:    usize,
    pub total_points:     usize,
    pub is_paused:        bool,
    pub percent_complete: f64,
    /// Live interpolated position.
    pub position:         Waypoint,
    pub bearing:          f64,
    pub remaining_km:     f64,
    pub eta:              DateTime<Utc>,
}

// ── SimulationState ───────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct SimulationState {
    route:               Route,
    steps_per_segment:   u32,
    segment:             usize,
    sub_step:            u32,
    trip_started_at:     DateTime<Utc>,
    paused_at:           Option<DateTime<Utc>>,
    total_paused_ms:     i64,
    planned_duration_ms: i64,
    remaining_km:        f64,
}

impl SimulationState {
    /// A fresh, running trip at the start of `route`.
    pub fn new(
        route:               Route,
        planned_duration_ms: i64,
        steps_per_segment:   u32,
        started_at:          DateTime<Utc>,
    ) -> SimResult<Self> {
        if planned_duration_ms <= 0
            || started_at.checked_add_signed(Duration::milliseconds(planned_duration_ms)).is_none()
        {
            return Err(SimError::InvalidDuration(planned_duration_ms));
        }
        if steps_per_segment == 0 {
            return Err(SimError::Config("steps_per_segment must be at least 1".into()));
        }
        let remaining_km = route.total_km();
        Ok(Self {
            route,
            steps_per_segment,
            segment: 0,
            sub_step: 0,
            trip_started_at: started_at,
            paused_at: None,
            total_paused_ms: 0,
            planned_duration_ms,
            remaining_km,
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn route(&self) -> &Route {
        &self.route
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn paused_at(&self) -> Option<DateTime<Utc>> {
        self.paused_at
    }

    pub fn trip_started_at(&self) -> DateTime<Utc> {
        self.trip_started_at
    }

    pub fn total_paused_ms(&self) -> i64 {
        self.total_paused_ms
    }

    pub fn planned_duration_ms(&self) -> i64 {
        self.planned_duration_ms
    }

    pub fn segment_index(&self) -> usize {
        self.segment
    }

    pub fn sub_step(&self) -> u32 {
        self.sub_step
    }

    /// Remaining distance as of the last computed frame.
    pub fn remaining_km(&self) -> f64 {
        self.remaining_km
    }

    /// Ticks needed to walk the whole route.
    pub fn total_steps(&self) -> u64 {
        self.route.segment_count() as u64 * self.steps_per_segment as u64
    }

    /// Sub-steps already taken.
    pub fn steps_taken(&self) -> u64 {
        self.segment as u64 * self.steps_per_segment as u64 + self.sub_step as u64
    }

    pub fn percent_complete(&self) -> f64 {
        let total = self.total_steps();
        if total == 0 {
            return 100.0;
        }
        (self.steps_taken() as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }

    pub fn is_arrived(&self) -> bool {
        self.segment >= self.route.segment_count()
    }

    // ── Pause bookkeeping ─────────────────────────────────────────────────

    /// Open a pause at `now`.  Returns `false` (and changes nothing) if
    /// already paused.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        if self.paused_at.is_some() {
            return false;
        }
        self.paused_at = Some(now);
        true
    }

    /// Close the open pause, adding its length to the paused total.
    /// Returns `false` if not paused.
    pub fn resume(&mut self, now: DateTime<Utc>) -> bool {
        match self.paused_at.take() {
            Some(at) => {
                self.total_paused_ms += ms_between(at, now).max(0);
                true
            }
            None => false,
        }
    }

    // ── Clock-driven progress ─────────────────────────────────────────────

    /// Travel time so far, excluding every paused interval (open or closed).
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        let open_pause = self.paused_at.map_or(0, |at| ms_between(at, now).max(0));
        ms_between(self.trip_started_at, now) - self.total_paused_ms - open_pause
    }

    /// Fraction of the planned duration already travelled, in `[0, 1]`.
    pub fn elapsed_fraction(&self, now: DateTime<Utc>) -> f64 {
        (self.elapsed_ms(now) as f64 / self.planned_duration_ms as f64).clamp(0.0, 1.0)
    }

    pub fn remaining_hours(&self, now: DateTime<Utc>) -> f64 {
        let planned_h = self.planned_duration_ms as f64 / MS_PER_HOUR as f64;
        (planned_h - self.elapsed_ms(now) as f64 / MS_PER_HOUR as f64).max(0.0)
    }

    pub fn eta(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let remaining_ms = (self.remaining_hours(now) * MS_PER_HOUR as f64).round() as i64;
        now.checked_add_signed(Duration::milliseconds(remaining_ms))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Route length over planned duration, capped for display.
    pub fn speed_kmh(&self, max_display_kmh: f64) -> f64 {
        let planned_h = self.planned_duration_ms as f64 / MS_PER_HOUR as f64;
        (self.route.total_km() / planned_h).min(max_display_kmh)
    }

    // ── Step-driven position ──────────────────────────────────────────────

    fn step_fraction(&self) -> f64 {
        self.sub_step as f64 / self.steps_per_segment as f64
    }

    /// Interpolated position for the current step.
    pub fn position(&self) -> Waypoint {
        if self.is_arrived() {
            return self.route.destination();
        }
        self.route.point_in_segment(self.segment, self.step_fraction())
    }

    /// Compute the current frame and refresh the remaining-distance cache.
    pub fn frame(&mut self, now: DateTime<Utc>, max_display_kmh: f64) -> Frame {
        if self.is_arrived() {
            return self.arrival_frame(now, max_display_kmh);
        }
        let position = self.position();
        let remaining_km = self.route.remaining_km_from(self.segment, position);
        self.remaining_km = remaining_km;

        let total_km = self.route.total_km();
        let remaining_hours = self.remaining_hours(now);
        Frame {
            position,
            bearing: self.route.segment_bearing(self.segment),
            speed_kmh: self.speed_kmh(max_display_kmh),
            segment_index: self.segment,
            total_points: self.route.point_count(),
            percent_complete: self.percent_complete(),
            total_km,
            remaining_km,
            covered_km: (total_km - remaining_km).max(0.0),
            eta: self.eta(now),
            minutes_remaining: remaining_hours * 60.0,
        }
    }

    /// The frame broadcast on arrival: destination, 100 %, nothing left.
    pub fn arrival_frame(&mut self, now: DateTime<Utc>, max_display_kmh: f64) -> Frame {
        self.remaining_km = 0.0;
        let last = self.route.segment_count() - 1;
        Frame {
            position:          self.route.destination(),
            bearing:           self.route.segment_bearing(last),
            speed_kmh:         self.speed_kmh(max_display_kmh),
            segment_index:     self.route.point_count() - 1,
            total_points:      self.route.point_count(),
            percent_complete:  100.0,
            total_km:          self.route.total_km(),
            remaining_km:      0.0,
            covered_km:        self.route.total_km(),
            eta:               now,
            minutes_remaining: 0.0,
        }
    }

    /// Move forward up to `steps` sub-steps without arriving: at most to the
    /// last sub-step of the last segment.  Returns the steps taken.
    pub fn skip_steps(&mut self, steps: u64) -> u64 {
        let last = self.total_steps().saturating_sub(1);
        let target = (self.steps_taken() + steps).min(last).max(self.steps_taken());
        let taken = target - self.steps_taken();
        let per_segment = self.steps_per_segment as u64;
        self.segment = (target / per_segment) as usize;
        self.sub_step = (target % per_segment) as u32;
        taken
    }

    /// Take one sub-step.  Returns `true` once the last segment is done.
    pub fn advance(&mut self) -> bool {
        if self.is_arrived() {
            return true;
        }
        self.sub_step += 1;
        if self.sub_step >= self.steps_per_segment {
            self.sub_step = 0;
            self.segment += 1;
        }
        self.is_arrived()
    }

    pub fn status(&self, now: DateTime<Utc>) -> SimStatus {
        let position = self.position();
        let remaining_km = if self.is_arrived() {
            0.0
        } else {
            self.route.remaining_km_from(self.segment, position)
        };
        SimStatus {
            segment_index: self.segment.min(self.route.point_count() - 1),
            total_points: self.route.point_count(),
            is_paused: self.is_paused(),
            percent_complete: self.percent_complete(),
            position,
            bearing: self.route.segment_bearing(self.segment),
            remaining_km,
            eta: self.eta(now),
        }
    }
}
