use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static POISON_WARNED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    pub window_rebuilds: u32,
    pub drawables: u32,
}

#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        *self
            .latest
            .read()
            .unwrap_or_else(|poisoned| recover("read", poisoned))
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        *self
            .latest
            .write()
            .unwrap_or_else(|poisoned| recover("write", poisoned)) = snapshot;
    }
}

fn recover<G>(operation: &'static str, poisoned: PoisonError<G>) -> G {
    if !POISON_WARNED.swap(true, Ordering::Relaxed) {
        warn!(operation, "metrics_lock_poisoned_recovered");
    }
    poisoned.into_inner()
}

#[derive(Debug, Default)]
struct IntervalCounters {
    frames: u32,
    ticks: u32,
    rebuilds: u32,
    frame_time: Duration,
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval: Duration,
    started: Instant,
    counters: IntervalCounters,
    last_drawables: u32,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            started: Instant::now(),
            counters: IntervalCounters::default(),
            last_drawables: 0,
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration, drawables: usize) {
        self.counters.frames += 1;
        self.counters.frame_time += frame_dt;
        self.last_drawables = u32::try_from(drawables).unwrap_or(u32::MAX);
    }

    pub(crate) fn record_tick(&mut self) {
        self.counters.ticks += 1;
    }

    pub(crate) fn record_rebuild(&mut self) {
        self.counters.rebuilds += 1;
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < self.interval {
            return None;
        }
        self.started = now;
        let counters = std::mem::take(&mut self.counters);

        let seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = match counters.frames {
            0 => 0.0,
            frames => counters.frame_time.as_secs_f32() * 1000.0 / frames as f32,
        };
        Some(LoopMetricsSnapshot {
            fps: counters.frames as f32 / seconds,
            tps: counters.ticks as f32 / seconds,
            frame_time_ms,
            window_rebuilds: counters.rebuilds,
            drawables: self.last_drawables,
        })
    }
}
