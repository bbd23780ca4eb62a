//! Frame clock driving the root timeline
//!
//! The ticker measures time through a [`Clock`] and decides when a frame is
//! due. Long stalls are smoothed: a gap above the lag threshold only advances
//! time by the adjusted lag, so animations resume where they were instead of
//! jumping ahead. Frame pacing for [`Scheduler::run_until`] comes from a
//! [`FrameSource`]; when the preferred source cannot be acquired the ticker
//! falls back to an [`IntervalTimer`].
//!
//! [`Scheduler::run_until`]: crate::Scheduler::run_until

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::error::{AnimationError, Result};

/// Source of time in seconds
pub trait Clock {
    fn now(&self) -> f64;

    /// Whether the clock moves with real time on its own
    fn is_wall_clock(&self) -> bool {
        true
    }
}

/// Wall clock time since construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// A clock that only moves when told to
///
/// Clones share the same time, so a test can keep one and hand another to
/// the scheduler.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }

    pub fn set(&self, seconds: f64) {
        self.now.set(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

/// Paces frames for a running ticker
pub trait FrameSource {
    fn name(&self) -> &str;

    /// Claim whatever the source needs to deliver frames
    fn acquire(&mut self) -> Result<()>;

    /// Block until `seconds` have passed
    fn wait(&mut self, seconds: f64);

    fn release(&mut self);
}

/// Sleeps the current thread between frames
#[derive(Debug, Default, Clone, Copy)]
pub struct IntervalTimer;

impl IntervalTimer {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSource for IntervalTimer {
    fn name(&self) -> &str {
        "interval"
    }

    fn acquire(&mut self) -> Result<()> {
        Ok(())
    }

    fn wait(&mut self, seconds: f64) {
        if seconds > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(seconds));
        }
    }

    fn release(&mut self) {}
}

/// Advances a [`ManualClock`] instead of waiting, for simulated runs
#[derive(Debug, Clone)]
pub struct SimulatedFrames {
    clock: ManualClock,
}

impl SimulatedFrames {
    pub fn new(clock: ManualClock) -> Self {
        Self { clock }
    }
}

impl FrameSource for SimulatedFrames {
    fn name(&self) -> &str {
        "simulated"
    }

    fn acquire(&mut self) -> Result<()> {
        Ok(())
    }

    fn wait(&mut self, seconds: f64) {
        self.clock.advance(seconds.max(0.0));
    }

    fn release(&mut self) {}
}

/// One dispatched frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Ticker time in seconds, lag-smoothed
    pub time: f64,
    /// Time since the previous frame
    pub delta: f64,
    pub frame: u64,
}

/// Spacing between frames for a frame rate
fn frame_gap(fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        1.0 / fps
    } else {
        warn!("invalid fps {}, using 240", fps);
        1.0 / 240.0
    }
}

/// Extra time added when the schedule has fallen a whole frame behind
const CATCH_UP: f64 = 0.004;
/// A frame waited for exactly is due despite rounding
const DUE_TOLERANCE: f64 = 1e-9;

pub struct Ticker {
    clock: Box<dyn Clock>,
    source: Box<dyn FrameSource>,
    running: bool,
    start_time: f64,
    last_update: f64,
    next_time: f64,
    gap: f64,
    lag_threshold: f64,
    adjusted_lag: f64,
    time: f64,
    frame: u64,
}

impl Ticker {
    pub fn new(clock: impl Clock + 'static, config: &EngineConfig) -> Self {
        let now = clock.now();
        let gap = frame_gap(config.fps);
        let mut ticker = Self {
            clock: Box::new(clock),
            source: Box::new(IntervalTimer),
            running: false,
            start_time: now,
            last_update: now,
            next_time: gap,
            gap,
            lag_threshold: f64::INFINITY,
            adjusted_lag: 0.0,
            time: 0.0,
            frame: 0,
        };
        ticker.lag_smoothing(config.lag_threshold, config.adjusted_lag);
        ticker
    }

    /// Seconds since the ticker started, minus smoothed-away lag
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn fps(&self) -> f64 {
        1.0 / self.gap
    }

    /// Change the frame rate; elapsed time is unaffected
    pub fn set_fps(&mut self, fps: f64) {
        self.gap = frame_gap(fps);
        self.next_time = self.time + self.gap;
    }

    /// Configure stall handling
    ///
    /// A threshold of 0 disables smoothing. The adjusted lag never exceeds
    /// the threshold.
    pub fn lag_smoothing(&mut self, threshold: f64, adjusted_lag: f64) {
        self.lag_threshold = if threshold > 0.0 {
            threshold
        } else {
            f64::INFINITY
        };
        let adjusted = if adjusted_lag > 0.0 { adjusted_lag } else { 0.033 };
        self.adjusted_lag = adjusted.min(self.lag_threshold);
    }

    /// Measure elapsed time and report a frame when one is due
    ///
    /// Manual ticks always produce a frame.
    pub fn tick(&mut self, manual: bool) -> Option<FrameInfo> {
        let now = self.clock.now();
        let elapsed = now - self.last_update;
        if elapsed > self.lag_threshold || elapsed < 0.0 {
            debug!("smoothing {:.3}s of lag", elapsed);
            self.start_time += elapsed - self.adjusted_lag;
        }
        self.last_update += elapsed;
        let time = self.last_update - self.start_time;
        let overlap = time - self.next_time;
        if overlap < -DUE_TOLERANCE && !manual {
            return None;
        }

        self.frame += 1;
        let delta = time - self.time;
        self.time = time;
        self.next_time += overlap
            + if overlap >= self.gap {
                CATCH_UP
            } else {
                self.gap - overlap
            };
        trace!("frame {} at {:.4}s (+{:.4}s)", self.frame, time, delta);
        Some(FrameInfo {
            time,
            delta,
            frame: self.frame,
        })
    }

    /// Seconds until the next frame is due
    pub fn time_to_next_frame(&self) -> f64 {
        let time = self.clock.now() - self.start_time;
        (self.next_time - time).max(0.0)
    }

    pub fn set_frame_source(&mut self, source: impl FrameSource + 'static) {
        let was_running = self.running;
        self.stop();
        self.source = Box::new(source);
        if was_running {
            self.start();
        }
    }

    pub fn frame_source(&self) -> &str {
        self.source.name()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether frame times follow real time
    pub fn follows_wall_clock(&self) -> bool {
        self.clock.is_wall_clock()
    }

    /// Acquire the frame source, falling back to an interval timer when it
    /// is unavailable
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        if let Err(err) = self.source.acquire() {
            warn!(
                "frame source '{}' unavailable ({}), falling back to an interval timer",
                self.source.name(),
                err
            );
            self.source = Box::new(IntervalTimer);
            if !self.clock.is_wall_clock() {
                warn!(
                    "the interval timer waits in real time but the clock only moves when \
                     advanced; frames stay due only as long as the caller advances it"
                );
            }
        }
        self.running = true;
        debug!("ticker started on '{}'", self.source.name());
    }

    pub fn stop(&mut self) {
        if self.running {
            self.source.release();
            self.running = false;
            debug!("ticker stopped");
        }
    }

    /// Block on the frame source until the next frame is due
    pub fn wait_for_frame(&mut self) -> Result<()> {
        if !self.running {
            return Err(AnimationError::FrameSourceUnavailable(
                "ticker is not running".to_string(),
            ));
        }
        let remaining = self.time_to_next_frame();
        self.source.wait(remaining);
        Ok(())
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
