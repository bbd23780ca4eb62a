//! Building and playing scenarios

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{Context, Result};
use serde::Serialize;
use tempo_animation::{
    AnimationId, Clock, EngineConfig, IntervalTimer, ManualClock, MonotonicClock, Position,
    Scheduler, SimulatedFrames, TimelineVars, TweenVars,
};
use tempo_core::{PropertyBag, PropertyValue, Target};
use tracing::{debug, info};

use crate::config::{Scenario, TweenKindSpec, TweenSpec};

/// Property values of every target at one moment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub time: f64,
    pub frame: u64,
    pub values: BTreeMap<String, BTreeMap<String, PropertyValue>>,
}

/// A lifecycle callback of a named animation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub time: f64,
    pub animation: String,
    pub kind: &'static str,
}

#[derive(Debug, Default, Serialize)]
pub struct Report {
    pub duration: f64,
    pub frames: u64,
    pub samples: Vec<Sample>,
    pub events: Vec<Event>,
}

/// A target and the properties reported for it
#[derive(Clone)]
struct Watched {
    name: String,
    target: Target,
    props: Vec<String>,
}

/// A scenario loaded into a scheduler
pub struct Player {
    scheduler: Scheduler,
    targets: BTreeMap<String, Target>,
    watched: Vec<Watched>,
    top_level: Vec<AnimationId>,
    events: Rc<RefCell<Vec<Event>>>,
}

impl Player {
    /// Build every target and animation on the given clock
    pub fn new(
        scenario: &Scenario,
        config: EngineConfig,
        clock: impl Clock + 'static,
    ) -> Result<Self> {
        let scheduler = Scheduler::with_clock(config, clock);
        let targets: BTreeMap<String, Target> = scenario
            .targets
            .iter()
            .map(|(name, props)| {
                let bag = props
                    .iter()
                    .fold(PropertyBag::new(), |bag, (prop, value)| {
                        bag.with(prop.as_str(), value.to_property())
                    });
                (name.clone(), Target::new(bag))
            })
            .collect();

        let watched = scenario
            .targets
            .iter()
            .filter_map(|(name, props)| {
                let target: &Target = targets.get(name)?;
                Some(Watched {
                    name: name.clone(),
                    target: target.clone(),
                    props: props.keys().cloned().collect(),
                })
            })
            .collect();

        let mut player = Self {
            scheduler,
            targets,
            watched,
            top_level: Vec::new(),
            events: Rc::default(),
        };
        for tween in &scenario.tweens {
            let id = player.add_tween(None, tween)?;
            player.top_level.push(id);
        }
        for timeline in &scenario.timelines {
            let mut vars = TimelineVars::new()
                .delay(timeline.delay)
                .repeat(timeline.repeat)
                .repeat_delay(timeline.repeat_delay)
                .yoyo(timeline.yoyo);
            if let Some(duration) = timeline.default_duration {
                vars = vars.default_duration(duration);
            }
            if let Some(ease) = &timeline.default_ease {
                vars = vars.default_ease(ease.as_str());
            }
            if let Some(name) = &timeline.name {
                vars = player.watch_timeline(vars, name);
            }
            let tl = player.scheduler.timeline(vars);
            for (label, position) in &timeline.labels {
                let position = position
                    .parse()
                    .with_context(|| format!("Invalid position for label '{}'", label))?;
                player.scheduler.add_label(tl, label.as_str(), position)?;
            }
            for step in &timeline.steps {
                player.add_tween(Some(tl), step)?;
            }
            debug!(
                "timeline {:?} built with {} steps",
                timeline.name,
                timeline.steps.len()
            );
            player.top_level.push(tl);
        }
        Ok(player)
    }

    fn targets_of(&self, spec: &TweenSpec) -> Result<Vec<Target>> {
        spec.targets
            .iter()
            .map(|name| {
                self.targets
                    .get(name)
                    .cloned()
                    .with_context(|| format!("Unknown target '{}'", name))
            })
            .collect()
    }

    fn add_tween(
        &mut self,
        timeline: Option<AnimationId>,
        spec: &TweenSpec,
    ) -> Result<AnimationId> {
        let targets = self.targets_of(spec)?;
        let mut vars = TweenVars::new()
            .delay(spec.delay)
            .repeat(spec.repeat)
            .repeat_delay(spec.repeat_delay)
            .yoyo(spec.yoyo);
        for (prop, value) in &spec.props {
            vars = vars.prop(prop.as_str(), value.to_tween_value());
        }
        if let Some(duration) = spec.duration {
            vars = vars.duration(duration);
        }
        if let Some(ease) = &spec.ease {
            vars = vars.ease(ease.as_str());
        }
        if let Some(each) = spec.stagger {
            vars = vars.stagger(each);
        }
        if let Some(position) = &spec.position {
            let position: Position = position
                .parse()
                .context("Invalid step position")?;
            vars = vars.at(position);
        }
        if let Some(name) = &spec.name {
            vars = self.watch_tween(vars, name);
        }

        let from = || {
            spec.from.iter().fold(TweenVars::new(), |v, (prop, value)| {
                v.prop(prop.as_str(), value.to_tween_value())
            })
        };
        let s = &mut self.scheduler;
        let id = match (timeline, spec.kind) {
            (None, TweenKindSpec::To) => s.to(targets, vars),
            (None, TweenKindSpec::From) => s.from(targets, vars),
            (None, TweenKindSpec::FromTo) => s.from_to(targets, from(), vars),
            (None, TweenKindSpec::Set) => s.set(targets, vars),
            (Some(tl), TweenKindSpec::To) => s.timeline_to(tl, targets, vars)?,
            (Some(tl), TweenKindSpec::From) => s.timeline_from(tl, targets, vars)?,
            (Some(tl), TweenKindSpec::FromTo) => s.timeline_from_to(tl, targets, from(), vars)?,
            (Some(tl), TweenKindSpec::Set) => s.timeline_set(tl, targets, vars)?,
        };
        Ok(id)
    }

    fn watch_tween(&self, vars: TweenVars, name: &str) -> TweenVars {
        let (start, complete, reverse) = (
            self.recorder(name, "start"),
            self.recorder(name, "complete"),
            self.recorder(name, "reverse_complete"),
        );
        vars.on_start(start)
            .on_complete(complete)
            .on_reverse_complete(reverse)
    }

    fn watch_timeline(&self, vars: TimelineVars, name: &str) -> TimelineVars {
        let (start, complete, reverse) = (
            self.recorder(name, "start"),
            self.recorder(name, "complete"),
            self.recorder(name, "reverse_complete"),
        );
        vars.on_start(start)
            .on_complete(complete)
            .on_reverse_complete(reverse)
    }

    fn recorder(
        &self,
        name: &str,
        kind: &'static str) -> impl FnMut(&mut Scheduler, AnimationId,
    ) + 'static {
        let events = self.events.clone();
        let animation = name.to_string();
        move |s: &mut Scheduler, _id| {
            let time = s.ticker().time();
            events.borrow_mut().push(Event {
                time,
                animation: animation.clone(),
                kind,
            });
        }
    }

    /// Time at which every finite top-level animation has ended
    pub fn duration(&mut self) -> f64 {
        let mut end = 0.0_f64;
        for &id in &self.top_level {
            if self.scheduler.repeat(id) < 0 {
                continue;
            }
            let id_end = self.scheduler.end_time(id, true);
            if id_end.is_finite() {
                end = end.max(id_end);
            }
        }
        end
    }

    fn snapshot(watched: &[Watched], time: f64, frame: u64) -> Sample {
        let values = watched
            .iter()
            .map(|w| {
                let props = w
                    .props
                    .iter()
                    .filter_map(|prop| w.target.get(prop).map(|v| (prop.clone(), v)))
                    .collect();
                (w.name.clone(), props)
            })
            .collect();
        Sample { time, frame, values }
    }

    fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

/// Render a scenario at fixed times without a frame loop
pub fn sample(scenario: &Scenario, times: &[f64]) -> Result<Report> {
    let clock = ManualClock::new();
    let config = EngineConfig {
        // sampling jumps arbitrarily far, so never treat a jump as a stall
        lag_threshold: 0.0,
        ..scenario.engine.clone()
    };
    let mut player = Player::new(scenario, config, clock.clone())?;
    let duration = player.duration();

    let mut times = times.to_vec();
    times.retain(|t| t.is_finite() && *t >= 0.0);
    times.sort_by(f64::total_cmp);

    let mut samples = Vec::with_capacity(times.len());
    for time in times {
        clock.set(time);
        let frame = player
            .scheduler
            .tick(true)
            .map_or(0, |frame| frame.frame);
        samples.push(Player::snapshot(&player.watched, time, frame));
    }
    Ok(Report {
        duration,
        frames: player.scheduler.ticker().frame(),
        samples,
        events: player.take_events(),
    })
}

/// Options of [`play`]
#[derive(Debug, Clone)]
pub struct PlayOptions {
    /// Wait for the wall clock instead of simulating frames
    pub realtime: bool,
    /// Keep one sample every this many frames
    pub every: u64,
    /// Upper bound on played time, for infinitely repeating scenarios
    pub max_seconds: f64,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            realtime: false,
            every: 1,
            max_seconds: 10.0,
        }
    }
}

/// Play a scenario through the ticker
pub fn play(scenario: &Scenario, options: &PlayOptions) -> Result<Report> {
    let mut player = if options.realtime {
        let mut player = Player::new(scenario, scenario.engine.clone(), MonotonicClock::new())?;
        player.scheduler.set_frame_source(IntervalTimer::new());
        player
    } else {
        let clock = ManualClock::new();
        let mut player = Player::new(scenario, scenario.engine.clone(), clock.clone())?;
        player.scheduler.set_frame_source(SimulatedFrames::new(clock));
        player
    };

    let duration = player.duration().min(options.max_seconds.max(0.0));
    info!(
        "playing {:.3}s at {} fps on '{}'",
        duration,
        player.scheduler.ticker().fps(),
        player.scheduler.ticker().frame_source()
    );

    let samples = Rc::new(RefCell::new(Vec::new()));
    let every = options.every.max(1);
    let recorded = samples.clone();
    let watched = player.watched.clone();
    let listener = player.scheduler.add_tick_listener(move |_, frame| {
        if frame.frame % every == 0 {
            recorded
                .borrow_mut()
                .push(Player::snapshot(&watched, frame.time, frame.frame));
        }
    });

    let frames = player
        .scheduler
        .run_until(|s| s.ticker().time() >= duration);
    player.scheduler.remove_tick_listener(listener);

    let samples = std::mem::take(&mut *samples.borrow_mut());
    Ok(Report {
        duration,
        frames,
        samples,
        events: player.take_events(),
    })
}

/// Human-readable report
pub fn format_text(report: &Report) -> String {
    let mut out = format!(
        "duration {:.3}s, {} frames\n",
        report.duration, report.frames
    );
    for sample in &report.samples {
        out.push_str(&format!("t={:.3} (frame {})\n", sample.time, sample.frame));
        for (target, props) in &sample.values {
            let props: Vec<String> = props
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect();
            out.push_str(&format!("  {}: {}\n", target, props.join(" ")));
        }
    }
    for event in &report.events {
        out.push_str(&format!(
            "event t={:.3} {} {}\n",
            event.time, event.animation, event.kind
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
[targets.box]
x = 0

[targets.dot]
x = 0

[[tweens]]
name = "slide"
targets = ["box"]
duration = 2
ease = "linear"
props = { x = 100 }

[[timelines]]
name = "intro"
default_ease = "linear"
default_duration = 1

[[timelines.steps]]
targets = ["dot"]
props = { x = 1 }

[[timelines.steps]]
targets = ["dot"]
props = { x = 2 }
"#;

    fn x_of(sample: &Sample, target: &str) -> f64 {
        sample.values[target]["x"].as_number().unwrap()
    }

    #[test]
    fn test_sample_at_fixed_times() {
        let scenario = Scenario::parse(SCENARIO).unwrap();
        let report = sample(&scenario, &[1.5, 0.5, 2.0]).unwrap();

        assert_eq!(report.duration, 2.0);
        let times: Vec<f64> = report.samples.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![0.5, 1.5, 2.0]);

        assert_eq!(x_of(&report.samples[0], "box"), 25.0);
        assert_eq!(x_of(&report.samples[0], "dot"), 0.5);
        assert_eq!(x_of(&report.samples[1], "box"), 75.0);
        assert_eq!(x_of(&report.samples[1], "dot"), 1.5);
        assert_eq!(x_of(&report.samples[2], "box"), 100.0);
        assert_eq!(x_of(&report.samples[2], "dot"), 2.0);

        let completed: Vec<&str> = report
            .events
            .iter()
            .filter(|e| e.kind == "complete")
            .map(|e| e.animation.as_str())
            .collect();
        assert_eq!(completed.len(), 2);
        assert!(completed.contains(&"slide"));
        assert!(completed.contains(&"intro"));
    }

    #[test]
    fn test_simulated_play_reaches_the_end() {
        let scenario = Scenario::parse(&format!("[engine]\nfps = 20\n{}", SCENARIO)).unwrap();
        let options = PlayOptions {
            every: 10,
            ..PlayOptions::default()
        };
        let report = play(&scenario, &options).unwrap();

        assert!((39..=41).contains(&report.frames), "{} frames", report.frames);
        assert_eq!(report.samples.len(), 4);
        let last = report.samples.last().unwrap();
        assert!((x_of(last, "box") - 100.0).abs() < 1e-6);
        assert!((x_of(last, "dot") - 2.0).abs() < 1e-6);
        assert!(report.events.iter().any(|e| e.animation == "slide" && e.kind == "start"));
    }

    #[test]
    fn test_duration_skips_endless_animations() {
        let spinner = "[targets.spin]\nangle = 0\n\n[[tweens]]\ntargets = [\"spin\"]\n\
                       repeat = -1\nduration = 1\nprops = { angle = 360 }\n";
        let scenario = Scenario::parse(&format!("{}{}", spinner, SCENARIO)).unwrap();
        let mut player =
            Player::new(&scenario, EngineConfig::default(), ManualClock::new()).unwrap();
        assert_eq!(player.duration(), 2.0);

        // both timeline steps start in the first frame; the second one picks
        // up where the first ended
        let report = sample(&scenario, &[1.5]).unwrap();
        assert_eq!(report.duration, 2.0);
        assert_eq!(x_of(&report.samples[0], "dot"), 1.5);
    }

    #[test]
    fn test_text_report() {
        let report = Report {
            duration: 1.0,
            frames: 2,
            samples: vec![Sample {
                time: 0.5,
                frame: 1,
                values: BTreeMap::from([(
                    "box".to_string(),
                    BTreeMap::from([("x".to_string(), PropertyValue::Number(50.0))]),
                )]),
            }],
            events: vec![Event {
                time: 1.0,
                animation: "slide".to_string(),
                kind: "complete",
            }],
        };
        assert_eq!(
            format_text(&report),
            "duration 1.000s, 2 frames\nt=0.500 (frame 1)\n  box: x=50\nevent t=1.000 slide complete\n"
        );
    }
}
