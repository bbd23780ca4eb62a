//! Integration tests for the frame loop
//!
//! These tests verify that:
//! - `run_until` paces frames through the frame source and releases it
//! - An unavailable frame source falls back to the interval timer
//! - Stalls are smoothed before they reach the animations
//! - Shared handles drive a scheduler owned elsewhere

use std::cell::Cell;
use std::rc::Rc;

use tempo_animation::{
    shared, AnimationError, EngineConfig, FrameSource, ManualClock, Result, Scheduler,
    SchedulerHandle, SimulatedFrames, TweenVars,
};
use tempo_core::{PropertyBag, Target};

fn point() -> Target {
    Target::new(PropertyBag::new().with("x", 0.0))
}

#[test]
fn test_run_until_completes_a_tween() {
    let clock = ManualClock::new();
    let config = EngineConfig {
        fps: 60.0,
        ..EngineConfig::default()
    };
    let mut s = Scheduler::with_clock(config, clock.clone());
    s.set_frame_source(SimulatedFrames::new(clock.clone()));

    let obj = point();
    let tween = s.to(&obj, TweenVars::new().prop("x", 1.0).duration(1.0).ease("linear"));

    // the tick that finishes the tween also releases it
    let frames = s.run_until(|s| !s.contains(tween));

    assert!((59..=61).contains(&frames), "rendered {} frames", frames);
    assert_eq!(obj.get_number("x"), Some(1.0));
    assert!((clock_time(&clock) - 1.0).abs() < 0.05);
    assert!(!s.ticker().is_running());
    assert_eq!(s.ticker().frame_source(), "simulated");
}

fn clock_time(clock: &ManualClock) -> f64 {
    use tempo_animation::Clock;
    clock.now()
}

struct Headless;

impl FrameSource for Headless {
    fn name(&self) -> &str {
        "display"
    }

    fn acquire(&mut self) -> Result<()> {
        Err(AnimationError::FrameSourceUnavailable("no display attached".into()))
    }

    fn wait(&mut self, _seconds: f64) {}

    fn release(&mut self) {}
}

#[test]
fn test_unavailable_frame_source_falls_back() {
    let clock = ManualClock::new();
    let config = EngineConfig {
        fps: 100.0,
        ..EngineConfig::default()
    };
    let mut s = Scheduler::with_clock(config, clock.clone());
    s.set_frame_source(Headless);
    assert_eq!(s.ticker().frame_source(), "display");

    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    let frames = s.run_until(move |_| {
        // the interval timer sleeps for real, so move the clock ourselves
        clock.advance(0.01);
        seen.set(seen.get() + 1);
        seen.get() > 5
    });

    assert_eq!(s.ticker().frame_source(), "interval");
    assert!(frames >= 4, "rendered {} frames", frames);
    assert_eq!(calls.get(), 6);
}

#[test]
fn test_stalls_are_smoothed() {
    let clock = ManualClock::new();
    let config = EngineConfig {
        lag_threshold: 0.5,
        adjusted_lag: 0.1,
        ..EngineConfig::default()
    };
    let mut s = Scheduler::with_clock(config, clock.clone());
    let obj = point();
    s.to(&obj, TweenVars::new().prop("x", 10.0).duration(1.0).ease("linear"));

    clock.advance(0.2);
    s.tick(true);
    assert_eq!(obj.get_number("x"), Some(2.0));

    // a five second stall only moves the animation by the adjusted lag
    clock.advance(5.0);
    let frame = s.tick(true).unwrap();
    assert!((frame.delta - 0.1).abs() < 1e-9);
    let x = obj.get_number("x").unwrap();
    assert!((x - 3.0).abs() < 1e-9, "x = {}", x);
}

#[test]
fn test_tick_listeners_see_every_frame() {
    let clock = ManualClock::new();
    let mut s = Scheduler::with_clock(
        EngineConfig {
            lag_threshold: 0.0,
            ..EngineConfig::default()
        },
        clock.clone(),
    );
    let obj = point();
    let tween = s.to(&obj, TweenVars::new().prop("x", 1.0).duration(1.0).ease("linear"));

    let observed = Rc::new(Cell::new(f64::NAN));
    let out = observed.clone();
    let target = obj.clone();
    s.add_tick_listener(move |s, _frame| {
        // listeners run after the root rendered
        out.set(target.get_number("x").unwrap_or(f64::NAN));
        if s.progress(tween) >= 0.5 {
            s.pause(tween);
        }
    });

    for _ in 0..4 {
        clock.advance(0.25);
        s.tick(true);
    }
    assert_eq!(observed.get(), 0.5);
    assert!(s.is_paused(tween));
    assert_eq!(obj.get_number("x"), Some(0.5));
}

#[test]
fn test_shared_scheduler_handles() {
    let clock = ManualClock::new();
    let scheduler = shared(Scheduler::with_clock(
        EngineConfig {
            lag_threshold: 0.0,
            ..EngineConfig::default()
        },
        clock.clone(),
    ));
    let handle = SchedulerHandle::new(&scheduler);
    let obj = point();

    let id = handle
        .with(|s| s.to(&obj, TweenVars::new().prop("x", 4.0).duration(2.0).ease("linear")))
        .unwrap();
    let tween = handle.animation(id);
    assert!(tween.is_alive());

    clock.advance(1.0);
    scheduler.borrow_mut().tick(true);
    assert_eq!(obj.get_number("x"), Some(2.0));
    assert_eq!(tween.progress(), Some(0.5));

    assert!(tween.set_time_scale(2.0));
    assert_eq!(tween.time_scale(), Some(2.0));
    clock.advance(0.25);
    scheduler.borrow_mut().tick(true);
    assert_eq!(obj.get_number("x"), Some(3.0));

    assert!(tween.kill());
    assert!(!tween.is_alive());
}
