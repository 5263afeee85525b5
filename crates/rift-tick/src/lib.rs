//! Fixed-rate simulation clock for Rift.
//!
//! [`TickScheduler::next_tick`] resolves once per period with a fixed `dt`
//! and the accumulated simulation time, which the core hands to every
//! module as "now". Wall-clock lateness never leaks into `dt`: a late
//! tick is either caught up (bounded) or dropped, so simulation time only
//! ever advances in whole periods.
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         tick = scheduler.next_tick() => {
//!             core.tick(tick.dt);
//!             scheduler.finish_tick();
//!         }
//!         Some(event) = events.recv() => { core.handle_event(event); }
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How the scheduler reacts when it wakes up more than one period late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrunPolicy {
    /// Run up to `max_catchup` missed ticks back to back, drop the rest.
    #[default]
    CatchUp,
    /// Drop every missed tick and stay aligned to the original phase.
    Skip,
}

/// Tick rate and overrun handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Ticks per second. 0 disables the clock entirely.
    pub tick_rate_hz: u32,

    pub overrun: OverrunPolicy,

    /// Backlog cap for [`OverrunPolicy::CatchUp`].
    pub max_catchup: u32,

    /// Fraction of the period a tick may use before a warning is logged.
    pub budget_warn_threshold: f64,

    /// Random delay (0..n µs) before the first tick.
    pub start_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60,
            overrun: OverrunPolicy::CatchUp,
            max_catchup: 3,
            budget_warn_threshold: 0.8,
            start_jitter_us: 0,
        }
    }
}

impl TickConfig {
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Self::default()
        }
    }

    /// Clamps the rate to [`Self::MAX_TICK_RATE_HZ`] and the warn
    /// threshold to `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick rate above maximum, clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Length of one tick, or `None` when the clock is disabled.
    pub fn period(&self) -> Option<Duration> {
        (self.tick_rate_hz > 0)
            .then(|| Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz)))
    }
}

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// One fired tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Starts at 1.
    pub number: u64,
    /// Always one period.
    pub dt: Duration,
    /// Simulation time after this tick: `number * dt`.
    pub sim_time: Duration,
    /// How far past its deadline the tick fired.
    pub late_by: Duration,
    /// Ticks abandoned when this one fired.
    pub dropped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-rate tick clock for the authority loop.
pub struct TickScheduler {
    config: TickConfig,
    period: Option<Duration>,
    deadline: Instant,
    count: u64,
    sim_time: Duration,
    dropped_total: u64,
    work_started: Option<Instant>,
    paused: bool,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let period = config.period();

        let jitter = if config.start_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..config.start_jitter_us))
        } else {
            Duration::ZERO
        };
        let deadline = Instant::now() + period.unwrap_or_default() + jitter;

        match period {
            Some(p) => debug!(
                rate_hz = config.tick_rate_hz,
                period_ms = p.as_secs_f64() * 1000.0,
                overrun = ?config.overrun,
                "tick scheduler created"
            ),
            None => debug!("tick scheduler created with clock disabled"),
        }

        Self {
            config,
            period,
            deadline,
            count: 0,
            sim_time: Duration::ZERO,
            dropped_total: 0,
            work_started: None,
            paused: false,
        }
    }

    /// Waits for the next deadline.
    ///
    /// Pends forever while paused or when the clock is disabled, so it is
    /// safe to use as a `select!` branch in either state.
    pub async fn next_tick(&mut self) -> Tick {
        let period = match self.period {
            Some(p) if !self.paused => p,
            _ => std::future::pending().await,
        };

        time::sleep_until(self.deadline).await;
        let now = Instant::now();
        let late_by = now.saturating_duration_since(self.deadline);
        let missed = u64::try_from(late_by.as_nanos() / period.as_nanos()).unwrap_or(u64::MAX);

        let dropped = match self.config.overrun {
            OverrunPolicy::CatchUp => missed.saturating_sub(u64::from(self.config.max_catchup)),
            OverrunPolicy::Skip => missed,
        };
        let step = deadline_step(period, dropped);
        self.deadline = self.deadline.checked_add(step).unwrap_or(now + period);

        if dropped > 0 {
            warn!(
                tick = self.count + 1,
                dropped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick overrun, dropping missed ticks"
            );
        }

        self.count += 1;
        self.sim_time += period;
        self.dropped_total += dropped;
        self.work_started = Some(now);
        trace!(tick = self.count, "tick fired");

        Tick {
            number: self.count,
            dt: period,
            sim_time: self.sim_time,
            late_by,
            dropped,
        }
    }

    /// Marks the end of the current tick's work and returns the share of
    /// the period it used. Logs a warning past the budget threshold.
    pub fn finish_tick(&mut self) -> f64 {
        let (Some(start), Some(period)) = (self.work_started.take(), self.period) else {
            return 0.0;
        };
        let used = start.elapsed().as_secs_f64() / period.as_secs_f64();
        if used >= self.config.budget_warn_threshold {
            warn!(
                tick = self.count,
                used_pct = format!("{:.1}", used * 100.0),
                "tick work near or over budget"
            );
        }
        used
    }

    /// Stops firing ticks until [`resume`](Self::resume). The tick count
    /// and simulated time are kept.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.count, "tick scheduler paused");
        }
    }

    /// Resumes from now; time spent paused is not caught up.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.deadline = Instant::now() + self.period.unwrap_or_default();
            debug!(tick = self.count, "tick scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Ticks fired since creation. Dropped ticks are not counted.
    pub fn tick_count(&self) -> u64 {
        self.count
    }

    /// Fired ticks times the period.
    pub fn sim_time(&self) -> Duration {
        self.sim_time
    }

    /// Missed deadlines skipped rather than fired, over the whole run.
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }
}

/// How far the deadline moves after a tick that dropped `dropped` missed
/// ticks. Saturates instead of wrapping after an extreme stall.
fn deadline_step(period: Duration, dropped: u64) -> Duration {
    let ticks = u32::try_from(dropped).unwrap_or(u32::MAX).saturating_add(1);
    period.saturating_mul(ticks)
}
