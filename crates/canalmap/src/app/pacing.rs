use std::env;
use std::time::{Duration, Instant};

use tracing::warn;

use super::loop_runner::LoopConfig;

pub const SLOW_FRAME_ENV_VAR: &str = "CANALMAP_SLOW_FRAME_MS";

const FALLBACK_MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// Simulation work granted to one redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameBudget {
    pub(crate) ticks: u32,
    pub(crate) raw_frame_dt: Duration,
    /// Time discarded because the tick cap was reached.
    pub(crate) dropped_backlog: Duration,
}

/// Fixed-step clock for the frame loop: turns wall-clock frame time into a
/// bounded number of simulation ticks and paces presentation to the render cap.
#[derive(Debug)]
pub(crate) struct FramePacer {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    render_cap: Option<u32>,
    backlog: Duration,
    last_frame: Instant,
    last_present: Instant,
}

impl FramePacer {
    pub(crate) fn new(config: &LoopConfig, now: Instant) -> Self {
        let target_tps = config.target_tps.max(1);
        let max_frame_delta = if config.max_frame_delta.is_zero() {
            FALLBACK_MAX_FRAME_DELTA
        } else {
            config.max_frame_delta
        };
        Self {
            fixed_dt: Duration::from_secs_f64(1.0 / f64::from(target_tps)),
            max_frame_delta,
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            render_cap: config.max_render_fps.filter(|fps| *fps > 0),
            backlog: Duration::ZERO,
            last_frame: now,
            last_present: now,
        }
    }

    pub(crate) fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub(crate) fn max_frame_delta(&self) -> Duration {
        self.max_frame_delta
    }

    pub(crate) fn max_ticks_per_frame(&self) -> u32 {
        self.max_ticks_per_frame
    }

    pub(crate) fn render_cap_label(&self) -> String {
        self.render_cap
            .map_or_else(|| "off".to_string(), |fps| fps.to_string())
    }

    /// Adds the (clamped) time since the previous frame to the backlog and
    /// spends as many whole ticks as the cap allows. A backlog still holding a
    /// whole tick after that is dropped.
    pub(crate) fn begin_frame(&mut self, now: Instant) -> FrameBudget {
        let raw_frame_dt = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        self.backlog = self
            .backlog
            .saturating_add(raw_frame_dt.min(self.max_frame_delta));

        let mut ticks = 0u32;
        while self.backlog >= self.fixed_dt && ticks < self.max_ticks_per_frame {
            self.backlog -= self.fixed_dt;
            ticks += 1;
        }
        let dropped_backlog = if self.backlog >= self.fixed_dt {
            std::mem::take(&mut self.backlog)
        } else {
            Duration::ZERO
        };

        FrameBudget {
            ticks,
            raw_frame_dt,
            dropped_backlog,
        }
    }

    /// How long to wait before presenting so frames stay under the cap.
    pub(crate) fn present_delay(&self, now: Instant) -> Duration {
        let Some(fps) = self.render_cap else {
            return Duration::ZERO;
        };
        let target = Duration::from_secs_f64(1.0 / f64::from(fps));
        target.saturating_sub(now.saturating_duration_since(self.last_present))
    }

    pub(crate) fn mark_presented(&mut self, now: Instant) {
        self.last_present = now;
    }
}

/// Debug delay injected before each redraw; the env var wins over config.
pub(crate) fn slow_frame_delay(config_ms: u64) -> Duration {
    let fallback = Duration::from_millis(config_ms);
    match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(value) => value.trim().parse::<u64>().map_or_else(
            |_| {
                warn!(
                    env_var = SLOW_FRAME_ENV_VAR,
                    value = value.as_str(),
                    "invalid_slow_frame_value_using_config"
                );
                fallback
            },
            Duration::from_millis,
        ),
        Err(env::VarError::NotPresent) => fallback,
        Err(error) => {
            warn!(env_var = SLOW_FRAME_ENV_VAR, error = %error, "slow_frame_env_unreadable");
            fallback
        }
    }
}
