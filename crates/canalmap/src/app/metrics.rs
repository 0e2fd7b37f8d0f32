use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn note_poisoned(operation: &'static str) {
    if !POISON_WARNED.swap(true, Ordering::Relaxed) {
        warn!(operation, "metrics_lock_poisoned_recovered");
    }
}

/// One interval of frame loop activity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    pub worst_frame_time_ms: f32,
    /// Animated entities alive at the last tick of the interval.
    pub animated_entities: usize,
    pub routes_delivered: u32,
    pub routes_failed: u32,
}

/// Cloneable read side of the loop metrics, safe to poll from other threads.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        *self.latest.read().unwrap_or_else(|poisoned| {
            note_poisoned("read");
            poisoned.into_inner()
        })
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        let mut guard = self.latest.write().unwrap_or_else(|poisoned| {
            note_poisoned("write");
            poisoned.into_inner()
        });
        *guard = snapshot;
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct RouteTally {
    delivered: u32,
    failed: u32,
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    frames: u32,
    ticks: u32,
    frame_time_total: Duration,
    worst_frame: Duration,
    animated_entities: usize,
    routes: RouteTally,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval_start: Instant::now(),
            interval,
            frames: 0,
            ticks: 0,
            frame_time_total: Duration::ZERO,
            worst_frame: Duration::ZERO,
            animated_entities: 0,
            routes: RouteTally::default(),
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration) {
        self.frames = self.frames.saturating_add(1);
        self.frame_time_total = self.frame_time_total.saturating_add(frame_dt);
        self.worst_frame = self.worst_frame.max(frame_dt);
    }

    pub(crate) fn record_tick(&mut self, animated_entities: usize) {
        self.ticks = self.ticks.saturating_add(1);
        self.animated_entities = animated_entities;
    }

    pub(crate) fn record_route(&mut self, succeeded: bool) {
        let counter = if succeeded {
            &mut self.routes.delivered
        } else {
            &mut self.routes.failed
        };
        *counter = counter.saturating_add(1);
    }

    /// Closes the interval once it has elapsed. The entity gauge carries over;
    /// every counter restarts.
    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let mean_frame_ms = match self.frames {
            0 => 0.0,
            frames => self.frame_time_total.as_secs_f32() * 1000.0 / frames as f32,
        };
        let routes = std::mem::take(&mut self.routes);
        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / seconds,
            tps: self.ticks as f32 / seconds,
            frame_time_ms: mean_frame_ms,
            worst_frame_time_ms: self.worst_frame.as_secs_f32() * 1000.0,
            animated_entities: self.animated_entities,
            routes_delivered: routes.delivered,
            routes_failed: routes.failed,
        };

        self.interval_start = now;
        self.frames = 0;
        self.ticks = 0;
        self.frame_time_total = Duration::ZERO;
        self.worst_frame = Duration::ZERO;
        Some(snapshot)
    }
}
