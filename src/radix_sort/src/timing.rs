//! Per-pass timing instrumentation.
//!
//! With the `profiling` feature, [`Timer`] measures wall-clock time.
//! Without it the timer compiles to a no-op and every duration reads zero.
//! [`SortTimingCollector`] assembles one [`PassTiming`] per pass either way,
//! so the digit windows of a sort are reported even when durations are not.

use serde::{Deserialize, Serialize};
use std::time::Duration;
#[cfg(feature = "profiling")]
use std::time::Instant;

use crate::digit::DigitWindow;

/// Timing breakdown of one sort call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SortTiming {
    /// Whole call, including the staging copy
    pub total_ms: f64,
    /// Per-pass breakdown
    pub passes: Vec<PassTiming>,
}

/// Timing of a single histogram, offset, scatter cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassTiming {
    pub pass: usize,
    pub start_bit: u32,
    pub bits: u32,
    pub histogram_ms: f64,
    pub offsets_ms: f64,
    pub scatter_ms: f64,
}

impl PassTiming {
    pub fn total_ms(&self) -> f64 {
        self.histogram_ms + self.offsets_ms + self.scatter_ms
    }
}

/// Timer that can be enabled/disabled at compile time.
#[cfg(feature = "profiling")]
#[derive(Debug)]
pub struct Timer {
    start: Instant,
}

#[cfg(feature = "profiling")]
impl Timer {
    #[inline]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed milliseconds, restarting the timer.
    #[inline]
    pub fn lap_ms(&mut self) -> f64 {
        let ms = self.elapsed_ms();
        self.start = Instant::now();
        ms
    }
}

/// No-op timer when profiling is disabled.
#[cfg(not(feature = "profiling"))]
#[derive(Debug)]
pub struct Timer;

#[cfg(not(feature = "profiling"))]
impl Timer {
    #[inline(always)]
    pub fn new() -> Self {
        Self
    }

    #[inline(always)]
    pub fn elapsed_ms(&self) -> f64 {
        0.0
    }

    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        Duration::ZERO
    }

    #[inline(always)]
    pub fn lap_ms(&mut self) -> f64 {
        0.0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Phase of a pass a duration is recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPhase {
    Histogram,
    Offsets,
    Scatter,
}

/// Collector for timing data during one sort call.
#[derive(Debug, Default)]
pub struct SortTimingCollector {
    sort: Timer,
    phase: Timer,
    current: Option<PassTiming>,
    timing: SortTiming,
}

impl SortTimingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart the whole-call clock and drop any collected passes.
    pub fn start_sort(&mut self) {
        self.sort = Timer::new();
        self.current = None;
        self.timing = SortTiming::default();
    }

    pub fn start_pass(&mut self, pass: usize, window: DigitWindow) {
        self.phase = Timer::new();
        self.current = Some(PassTiming {
            pass,
            start_bit: window.start_bit,
            bits: window.bits,
            ..PassTiming::default()
        });
    }

    /// Charge the time since the previous phase (or pass start) to `phase`.
    pub fn record_phase(&mut self, phase: PassPhase) {
        let ms = self.phase.lap_ms();
        let Some(current) = self.current.as_mut() else {
            return;
        };
        match phase {
            PassPhase::Histogram => current.histogram_ms += ms,
            PassPhase::Offsets => current.offsets_ms += ms,
            PassPhase::Scatter => current.scatter_ms += ms,
        }
    }

    pub fn end_pass(&mut self) {
        if let Some(pass) = self.current.take() {
            self.timing.passes.push(pass);
        }
    }

    pub fn finish(&mut self) -> SortTiming {
        self.end_pass();
        self.timing.total_ms = self.sort.elapsed_ms();
        std::mem::take(&mut self.timing)
    }
}
