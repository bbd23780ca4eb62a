//! Integration tests for overwriting, re-entrant callbacks and plugins
//!
//! These tests verify that:
//! - Competing tweens on the same target are resolved per overwrite mode
//! - Callbacks may kill, pause or seek the animations that called them
//! - Plugins and registered accessors decompose logical properties

use std::cell::Cell;
use std::rc::Rc;

use tempo_animation::{
    AliasPlugin, CallbackKind, EngineConfig, ManualClock, Overwrite, Scheduler, TimelineVars,
    TweenVars,
};
use tempo_core::{MethodAccessor, PropertyBag, PropertyValue, Target};

fn manual() -> (Scheduler, ManualClock) {
    let clock = ManualClock::new();
    let config = EngineConfig {
        lag_threshold: 0.0,
        ..EngineConfig::default()
    };
    (Scheduler::with_clock(config, clock.clone()), clock)
}

fn number(target: &Target, name: &str) -> f64 {
    target.get_number(name).unwrap_or(f64::NAN)
}

fn point() -> Target {
    Target::new(PropertyBag::new().with("x", 0.0).with("y", 0.0))
}

#[test]
fn test_auto_overwrite_takes_only_shared_properties() {
    let (mut s, clock) = manual();
    let obj = point();
    let a = s.to(
        &obj,
        TweenVars::new()
            .prop("x", 100.0)
            .prop("y", 100.0)
            .duration(2.0)
            .ease("linear"),
    );
    let b = s.to(&obj, TweenVars::new().prop("x", -100.0).duration(1.0).ease("linear"));

    // nothing is taken before the tweens start
    assert_eq!(s.animated_properties(a, &obj), vec!["x".to_string(), "y".to_string()]);

    clock.advance(0.5);
    s.tick(true);
    assert_eq!(s.animated_properties(a, &obj), vec!["y".to_string()]);
    assert_eq!(s.animated_properties(b, &obj), vec!["x".to_string()]);
    assert_eq!(number(&obj, "y"), 25.0);
    assert_eq!(number(&obj, "x"), -50.0);
    assert!(s.contains(a));
}

#[test]
fn test_auto_overwrite_kills_a_tween_with_nothing_left() {
    let (mut s, clock) = manual();
    let obj = point();
    let interrupted = Rc::new(Cell::new(0));
    let count = interrupted.clone();
    let a = s.to(
        &obj,
        TweenVars::new()
            .prop("x", 100.0)
            .duration(2.0)
            .on_interrupt(move |_, _| count.set(count.get() + 1)),
    );
    s.to(&obj, TweenVars::new().prop("x", -100.0).duration(1.0));
    assert!(s.contains(a));

    clock.advance(0.1);
    s.tick(true);
    assert!(!s.contains(a));
    assert_eq!(interrupted.get(), 1);
}

#[test]
fn test_auto_overwrite_ignores_tweens_that_have_not_started() {
    let (mut s, clock) = manual();
    let obj = point();
    let later = s.to(&obj, TweenVars::new().prop("x", 100.0).duration(1.0).delay(2.0));
    let now = s.to(&obj, TweenVars::new().prop("x", -100.0).duration(1.0));

    clock.advance(0.5);
    s.tick(true);
    assert!(s.contains(later));
    assert_eq!(s.animated_properties(later, &obj), vec!["x".to_string()]);
    assert_eq!(s.animated_properties(now, &obj), vec!["x".to_string()]);
}

#[test]
fn test_overwrite_none_lets_tweens_fight() {
    let (mut s, clock) = manual();
    let obj = point();
    let a = s.to(&obj, TweenVars::new().prop("x", 100.0).duration(2.0).ease("linear"));
    let b = s.to(
        &obj,
        TweenVars::new()
            .prop("x", -100.0)
            .duration(1.0)
            .ease("linear")
            .overwrite(Overwrite::None),
    );

    clock.advance(0.5);
    s.tick(true);
    // the later tween renders last
    assert_eq!(number(&obj, "x"), -50.0);
    assert_eq!(s.tweens_of(&obj, true), vec![a, b]);
}

/// A tween placed later in a timeline only takes over once it starts
#[test]
fn test_auto_overwrite_waits_for_the_later_tween_to_start() {
    let (mut s, clock) = manual();
    let obj = point();
    let interrupted = Rc::new(Cell::new(0));
    let count = interrupted.clone();
    let tl = s.timeline(TimelineVars::new().default_ease("linear"));
    let a = s
        .timeline_to(
            tl,
            &obj,
            TweenVars::new()
                .prop("x", 100.0)
                .duration(2.0)
                .on_interrupt(move |_, _| count.set(count.get() + 1)),
        )
        .unwrap();
    s.timeline_to(tl, &obj, TweenVars::new().prop("x", 0.0).duration(1.0).at(1.0))
        .unwrap();

    clock.advance(0.5);
    s.tick(true);
    assert_eq!(number(&obj, "x"), 25.0);
    assert!(s.contains(a));

    clock.advance(0.5);
    s.tick(true);
    assert_eq!(number(&obj, "x"), 50.0);
    assert!(!s.contains(a));
    assert_eq!(interrupted.get(), 1);

    clock.advance(0.5);
    s.tick(true);
    assert_eq!(number(&obj, "x"), 25.0);

    clock.advance(0.5);
    s.tick(true);
    assert_eq!(number(&obj, "x"), 0.0);
}

/// Tweens starting in the same frame read the values from before the frame,
/// while a tween that ended earlier in the frame hands over its end value
#[test]
fn test_tweens_starting_together_read_values_before_the_frame() {
    let (mut s, clock) = manual();
    let obj = point();
    let tl = s.timeline(TimelineVars::new().default_ease("linear"));
    s.timeline_to(tl, &obj, TweenVars::new().prop("x", 10.0).duration(1.0))
        .unwrap();
    s.timeline_to(tl, &obj, TweenVars::new().prop("x", 20.0).duration(1.0))
        .unwrap();
    let y_a = s.to(&obj, TweenVars::new().prop("y", 8.0).duration(2.0).ease("linear"));
    s.to(
        &obj,
        TweenVars::new()
            .prop("y", -8.0)
            .duration(2.0)
            .ease("linear")
            .overwrite(Overwrite::None),
    );

    // one frame jumps into the second timeline step
    clock.advance(1.5);
    s.tick(true);
    assert_eq!(number(&obj, "x"), 15.0);
    // both y tweens start from 0 and the later one renders last
    assert_eq!(number(&obj, "y"), -6.0);
    assert!(s.contains(y_a));
}

/// Fire-and-forget tweens are released once a tick finishes them
#[test]
fn test_finished_tweens_are_released() {
    let (mut s, clock) = manual();
    let obj = point();
    for i in 0..1000 {
        s.to(
            &obj,
            TweenVars::new()
                .prop("x", i as f64)
                .duration(0.01)
                .delay(i as f64 * 0.01),
        );
    }
    assert_eq!(s.animation_count(), 1001);
    assert_eq!(s.tweens_of(&obj, false).len(), 1000);

    for _ in 0..1001 {
        clock.advance(0.01);
        s.tick(true);
    }
    assert_eq!(s.animation_count(), 1);
    assert!(s.tweens_of(&obj, false).is_empty());
    assert_eq!(number(&obj, "x"), 999.0);
}

#[test]
fn test_overwrite_all_kills_every_other_tween() {
    let (mut s, _clock) = manual();
    let obj = point();
    let interrupted = Rc::new(Cell::new(0));
    let count = interrupted.clone();
    let a = s.to(
        &obj,
        TweenVars::new()
            .prop("y", 100.0)
            .duration(2.0)
            .on_interrupt(move |_, _| count.set(count.get() + 1)),
    );
    let b = s.to(&obj, TweenVars::new().prop("x", 5.0).overwrite(true));

    assert!(!s.contains(a));
    assert!(s.contains(b));
    assert_eq!(interrupted.get(), 1);
    assert_eq!(s.tweens_of(&obj, false), vec![b]);
}

#[test]
fn test_kill_tweens_of() {
    let (mut s, _clock) = manual();
    let obj = point();
    let other = point();
    let a = s.to(
        &obj,
        TweenVars::new()
            .prop("x", 1.0)
            .prop("y", 1.0)
            .overwrite(Overwrite::None),
    );
    let b = s.to(&obj, TweenVars::new().prop("x", 2.0).overwrite(Overwrite::None));
    let c = s.to(&other, TweenVars::new().prop("x", 3.0));

    assert_eq!(s.kill_tweens_of(&obj, Some(&["x"])), 2);
    assert_eq!(s.animated_properties(a, &obj), vec!["y".to_string()]);
    assert!(!s.contains(b));
    assert!(s.contains(c));

    assert_eq!(s.kill_tweens_of(&obj, None), 1);
    assert!(!s.contains(a));
    assert!(!s.is_tweening(&obj));
    assert_eq!(s.kill_tweens_of(&obj, None), 0);
}

#[test]
fn test_is_tweening_follows_the_playhead() {
    let (mut s, clock) = manual();
    let obj = point();
    s.to(&obj, TweenVars::new().prop("x", 1.0).duration(1.0).delay(0.5));
    assert!(!s.is_tweening(&obj));

    clock.advance(0.75);
    s.tick(true);
    assert!(s.is_tweening(&obj));

    clock.advance(1.0);
    s.tick(true);
    assert!(!s.is_tweening(&obj));
}

#[test]
fn test_callback_may_kill_its_parent() {
    let (mut s, _clock) = manual();
    let a = point();
    let b = point();
    let tl = s.timeline(TimelineVars::new().default_duration(1.0));
    let first = s.timeline_to(tl, &a, TweenVars::new().prop("x", 1.0)).unwrap();
    let second = s.timeline_to(tl, &b, TweenVars::new().prop("x", 1.0)).unwrap();
    s.set_callback(first, CallbackKind::Complete, move |s, _| s.kill(tl));

    s.seek(tl, 1.5);

    assert!(!s.contains(tl));
    assert!(!s.contains(first));
    assert!(!s.contains(second));
    assert_eq!(number(&a, "x"), 1.0);
    assert_eq!(number(&b, "x"), 0.0);
}

#[test]
fn test_pausing_from_a_callback_stops_the_sweep() {
    let (mut s, _clock) = manual();
    let a = point();
    let b = point();
    let tl = s.timeline(TimelineVars::new().default_duration(1.0).default_ease("linear"));
    let first = s.timeline_to(tl, &a, TweenVars::new().prop("x", 1.0)).unwrap();
    s.timeline_to(tl, &b, TweenVars::new().prop("x", 1.0)).unwrap();
    s.set_callback(first, CallbackKind::Complete, move |s, _| s.pause(tl));

    s.seek(tl, 1.5);

    assert!(s.is_paused(tl));
    assert_eq!(number(&a, "x"), 1.0);
    assert_eq!(number(&b, "x"), 0.0);
}

#[test]
fn test_callback_may_create_animations() {
    let (mut s, clock) = manual();
    let obj = point();
    let follow_up = obj.clone();
    s.to(
        &obj,
        TweenVars::new()
            .prop("x", 1.0)
            .duration(0.5)
            .on_complete(move |s, _| {
                s.to(&follow_up, TweenVars::new().prop("y", 1.0).duration(0.5).ease("linear"));
            }),
    );

    clock.advance(0.5);
    s.tick(true);
    clock.advance(0.25);
    s.tick(true);
    assert_eq!(number(&obj, "x"), 1.0);
    assert_eq!(number(&obj, "y"), 0.5);
}

#[test]
fn test_alias_plugin_fans_out() {
    let (mut s, _clock) = manual();
    s.register_plugin(AliasPlugin::new("scale", ["scaleX", "scaleY"]));
    let obj = Target::new(PropertyBag::new().with("scaleX", 1.0).with("scaleY", 1.0));

    let tween = s.to(&obj, TweenVars::new().prop("scale", 2.0).duration(1.0).ease("linear"));
    s.seek(tween, 0.5);

    assert_eq!(number(&obj, "scaleX"), 1.5);
    assert_eq!(number(&obj, "scaleY"), 1.5);
    assert_eq!(s.animated_properties(tween, &obj), vec!["scale".to_string()]);

    assert!(s.unregister_plugin("scale"));
    assert!(!s.unregister_plugin("scale"));
}

#[test]
fn test_registered_accessor_reaches_derived_property() {
    let (mut s, _clock) = manual();
    let obj = Target::new(
        PropertyBag::new()
            .with_kind("rect")
            .with("width", 10.0)
            .with("height", 10.0),
    );
    s.accessors_mut().register_method(
        "rect",
        "size",
        MethodAccessor::new(
            |t| t.get_number("width").map(PropertyValue::from),
            |t, value| {
                let n = value.as_number().unwrap_or(0.0);
                t.set("width", n)?;
                t.set("height", n)
            },
        ),
    );

    let tween = s.to(&obj, TweenVars::new().prop("size", 30.0).duration(1.0).ease("linear"));
    s.seek(tween, 0.5);
    assert_eq!(number(&obj, "width"), 20.0);
    assert_eq!(number(&obj, "height"), 20.0);
}

#[test]
fn test_unreachable_properties_are_skipped() {
    let (mut s, _clock) = manual();
    let obj = point();
    let tween = s.to(
        &obj,
        TweenVars::new()
            .prop("missing", 1.0)
            .prop("x", 10.0)
            .duration(1.0)
            .ease("linear"),
    );
    s.seek(tween, 0.5);
    assert_eq!(number(&obj, "x"), 5.0);
    assert_eq!(obj.get("missing"), None);
}
