//! Builder-style configuration for tweens and timelines

use serde::{Deserialize, Serialize};

use crate::animation::AnimationId;
use crate::callback::{CallbackKind, Callbacks};
use crate::easing::EaseSpec;
use crate::interpolate::TweenValue;
use crate::position::Position;
use crate::scheduler::Scheduler;

/// What a new tween does to other tweens already animating its targets
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overwrite {
    /// Leave them alone; every tween keeps writing
    None,
    /// Kill every other tween of the same targets, whatever it animates
    All,
    /// Kill only the overlapping properties of tweens running when the new
    /// tween starts
    #[default]
    Auto,
}

impl From<bool> for Overwrite {
    fn from(value: bool) -> Self {
        if value {
            Overwrite::All
        } else {
            Overwrite::None
        }
    }
}

/// Number of extra iterations
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Repeat {
    Count(u32),
    #[default]
    Never,
    Infinite,
}

impl Repeat {
    /// Signed form used by the timing model: -1 for infinite
    pub(crate) fn as_i64(self) -> i64 {
        match self {
            Repeat::Never => 0,
            Repeat::Count(n) => n as i64,
            Repeat::Infinite => -1,
        }
    }
}

impl From<u32> for Repeat {
    fn from(count: u32) -> Self {
        if count == 0 {
            Repeat::Never
        } else {
            Repeat::Count(count)
        }
    }
}

impl From<i32> for Repeat {
    fn from(count: i32) -> Self {
        Repeat::from(count as i64)
    }
}

impl From<i64> for Repeat {
    /// Negative counts mean "forever"
    fn from(count: i64) -> Self {
        match count {
            c if c < 0 => Repeat::Infinite,
            0 => Repeat::Never,
            c => Repeat::Count(c.min(u32::MAX as i64) as u32),
        }
    }
}

/// Where the spread of a stagger starts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaggerFrom {
    #[default]
    Start,
    End,
    Center,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Spacing {
    Each(f64),
    Amount(f64),
}

/// Offsets successive targets of one tween in time
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stagger {
    spacing: Spacing,
    from: StaggerFrom,
}

impl Stagger {
    /// Fixed gap between successive targets
    pub fn each(seconds: f64) -> Self {
        Self {
            spacing: Spacing::Each(seconds),
            from: StaggerFrom::Start,
        }
    }

    /// Total spread divided across all targets
    pub fn amount(seconds: f64) -> Self {
        Self {
            spacing: Spacing::Amount(seconds),
            from: StaggerFrom::Start,
        }
    }

    pub fn origin(mut self, from: StaggerFrom) -> Self {
        self.from = from;
        self
    }

    /// Start offsets for `count` targets, the earliest at 0
    pub fn offsets(&self, count: usize) -> Vec<f64> {
        if count == 0 {
            return Vec::new();
        }
        let last = (count - 1) as f64;
        let distances: Vec<f64> = (0..count)
            .map(|i| {
                let i = i as f64;
                match self.from {
                    StaggerFrom::Start => i,
                    StaggerFrom::End => last - i,
                    StaggerFrom::Center => (i - last / 2.0).abs(),
                }
            })
            .collect();
        let min = distances.iter().copied().fold(f64::INFINITY, f64::min);
        let max = distances.iter().copied().fold(0.0, f64::max) - min;
        let each = match self.spacing {
            Spacing::Each(each) => each,
            Spacing::Amount(amount) if max > 0.0 => amount / max,
            Spacing::Amount(_) => 0.0,
        };
        distances.into_iter().map(|d| (d - min) * each).collect()
    }
}

impl From<f64> for Stagger {
    fn from(each: f64) -> Self {
        Stagger::each(each)
    }
}

/// Ease used on the backward half of yoyo cycles
#[derive(Clone, Debug)]
pub enum YoyoEase {
    Ease(EaseSpec),
    /// Mirror of the forward ease
    Inverted,
}

macro_rules! callback_setters {
    ($($name:ident => $kind:expr),* $(,)?) => {
        $(
            pub fn $name(mut self, callback: impl FnMut(&mut Scheduler, AnimationId) + 'static) -> Self {
                self.callbacks.set($kind, Box::new(callback));
                self
            }
        )*
    };
}

/// Configuration of a tween
///
/// ```rust
/// use tempo_animation::TweenVars;
///
/// let vars = TweenVars::new()
///     .prop("x", 100.0)
///     .prop("opacity", "+=0.5")
///     .duration(2.0)
///     .ease("power2.inOut")
///     .repeat(1)
///     .yoyo(true);
/// ```
#[derive(Default)]
pub struct TweenVars {
    pub(crate) props: Vec<(String, TweenValue)>,
    pub(crate) duration: Option<f64>,
    pub(crate) delay: f64,
    pub(crate) ease: Option<EaseSpec>,
    pub(crate) repeat: Repeat,
    pub(crate) repeat_delay: f64,
    pub(crate) yoyo: bool,
    pub(crate) yoyo_ease: Option<YoyoEase>,
    pub(crate) paused: bool,
    pub(crate) reversed: bool,
    pub(crate) overwrite: Option<Overwrite>,
    pub(crate) immediate_render: Option<bool>,
    pub(crate) stagger: Option<Stagger>,
    pub(crate) position: Option<Position>,
    pub(crate) name: Option<String>,
    pub(crate) callbacks: Callbacks,
}

impl TweenVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Animate `name` to (or, for `from` tweens, from) `value`
    ///
    /// Setting the same property twice keeps the last value.
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<TweenValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.props.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.props.push((name, value)),
        }
        self
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn delay(mut self, seconds: f64) -> Self {
        self.delay = seconds;
        self
    }

    pub fn ease(mut self, ease: impl Into<EaseSpec>) -> Self {
        self.ease = Some(ease.into());
        self
    }

    pub fn repeat(mut self, repeat: impl Into<Repeat>) -> Self {
        self.repeat = repeat.into();
        self
    }

    pub fn repeat_delay(mut self, seconds: f64) -> Self {
        self.repeat_delay = seconds;
        self
    }

    pub fn yoyo(mut self, yoyo: bool) -> Self {
        self.yoyo = yoyo;
        self
    }

    /// Use a different ease on backward yoyo cycles (implies yoyo)
    pub fn yoyo_ease(mut self, ease: impl Into<EaseSpec>) -> Self {
        self.yoyo = true;
        self.yoyo_ease = Some(YoyoEase::Ease(ease.into()));
        self
    }

    /// Play backward yoyo cycles with the mirrored forward ease (implies yoyo)
    pub fn yoyo_ease_inverted(mut self) -> Self {
        self.yoyo = true;
        self.yoyo_ease = Some(YoyoEase::Inverted);
        self
    }

    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    /// Start with the playhead moving backward
    pub fn reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }

    pub fn overwrite(mut self, overwrite: impl Into<Overwrite>) -> Self {
        self.overwrite = Some(overwrite.into());
        self
    }

    /// Force (or prevent) rendering the start state at construction
    pub fn immediate_render(mut self, immediate: bool) -> Self {
        self.immediate_render = Some(immediate);
        self
    }

    pub fn stagger(mut self, stagger: impl Into<Stagger>) -> Self {
        self.stagger = Some(stagger.into());
        self
    }

    /// Insertion point when added to a timeline
    pub fn at(mut self, position: impl Into<Position>) -> Self {
        self.position = Some(position.into());
        self
    }

    /// Name used by [`Scheduler::find_by_name`]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    callback_setters! {
        on_start => CallbackKind::Start,
        on_update => CallbackKind::Update,
        on_complete => CallbackKind::Complete,
        on_reverse_complete => CallbackKind::ReverseComplete,
        on_repeat => CallbackKind::Repeat,
        on_interrupt => CallbackKind::Interrupt,
    }

    /// Per-target copy used for staggered children
    ///
    /// Timing that belongs to the whole group (delay, repeat, yoyo, pause
    /// state, callbacks, name) stays with the group.
    pub(crate) fn stagger_child(&self) -> TweenVars {
        TweenVars {
            props: self.props.clone(),
            duration: self.duration,
            ease: self.ease.clone(),
            overwrite: self.overwrite,
            immediate_render: self.immediate_render,
            ..TweenVars::default()
        }
    }

    /// Group settings for the timeline that holds staggered children
    pub(crate) fn stagger_group(&mut self) -> TimelineVars {
        TimelineVars {
            delay: self.delay,
            repeat: self.repeat,
            repeat_delay: self.repeat_delay,
            yoyo: self.yoyo,
            paused: self.paused,
            reversed: self.reversed,
            name: self.name.take(),
            callbacks: std::mem::take(&mut self.callbacks),
            ..TimelineVars::default()
        }
    }
}

/// Defaults a timeline hands to the tweens created through it
#[derive(Clone, Debug, Default)]
pub struct ChildDefaults {
    pub duration: Option<f64>,
    pub ease: Option<EaseSpec>,
    pub overwrite: Option<Overwrite>,
}

/// Configuration of a timeline
#[derive(Default)]
pub struct TimelineVars {
    pub(crate) delay: f64,
    pub(crate) repeat: Repeat,
    pub(crate) repeat_delay: f64,
    pub(crate) yoyo: bool,
    pub(crate) paused: bool,
    pub(crate) reversed: bool,
    pub(crate) smooth_child_timing: bool,
    pub(crate) auto_remove_children: bool,
    pub(crate) defaults: ChildDefaults,
    pub(crate) position: Option<Position>,
    pub(crate) name: Option<String>,
    pub(crate) callbacks: Callbacks,
}

impl TimelineVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(mut self, seconds: f64) -> Self {
        self.delay = seconds;
        self
    }

    pub fn repeat(mut self, repeat: impl Into<Repeat>) -> Self {
        self.repeat = repeat.into();
        self
    }

    pub fn repeat_delay(mut self, seconds: f64) -> Self {
        self.repeat_delay = seconds;
        self
    }

    pub fn yoyo(mut self, yoyo: bool) -> Self {
        self.yoyo = yoyo;
        self
    }

    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    pub fn reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }

    /// Move children's start times when their playheads are moved directly,
    /// so they continue from where they were put instead of jumping
    pub fn smooth_child_timing(mut self, smooth: bool) -> Self {
        self.smooth_child_timing = smooth;
        self
    }

    /// Detach children as soon as they complete
    pub fn auto_remove_children(mut self, auto_remove: bool) -> Self {
        self.auto_remove_children = auto_remove;
        self
    }

    pub fn defaults(mut self, defaults: ChildDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn default_duration(mut self, seconds: f64) -> Self {
        self.defaults.duration = Some(seconds);
        self
    }

    pub fn default_ease(mut self, ease: impl Into<EaseSpec>) -> Self {
        self.defaults.ease = Some(ease.into());
        self
    }

    /// Insertion point when nested in another timeline
    pub fn at(mut self, position: impl Into<Position>) -> Self {
        self.position = Some(position.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    callback_setters! {
        on_start => CallbackKind::Start,
        on_update => CallbackKind::Update,
        on_complete => CallbackKind::Complete,
        on_reverse_complete => CallbackKind::ReverseComplete,
        on_repeat => CallbackKind::Repeat,
        on_interrupt => CallbackKind::Interrupt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_conversions() {
        assert_eq!(Repeat::from(-1), Repeat::Infinite);
        assert_eq!(Repeat::from(0), Repeat::Never);
        assert_eq!(Repeat::from(3u32).as_i64(), 3);
        assert_eq!(Repeat::Infinite.as_i64(), -1);
    }

    #[test]
    fn test_stagger_offsets() {
        assert_eq!(Stagger::each(0.1).offsets(3), vec![0.0, 0.1, 0.2]);
        assert_eq!(
            Stagger::each(1.0).origin(StaggerFrom::End).offsets(3),
            vec![2.0, 1.0, 0.0]
        );
        assert_eq!(
            Stagger::each(1.0).origin(StaggerFrom::Center).offsets(5),
            vec![2.0, 1.0, 0.0, 1.0, 2.0]
        );
        assert_eq!(Stagger::amount(1.0).offsets(3), vec![0.0, 0.5, 1.0]);
        assert_eq!(
            Stagger::each(1.0).origin(StaggerFrom::Center).offsets(4),
            vec![1.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_prop_replaces_existing() {
        let vars = TweenVars::new().prop("x", 1.0).prop("y", 2.0).prop("x", 3.0);
        assert_eq!(
            vars.props,
            vec![
                ("x".to_string(), TweenValue::Number(3.0)),
                ("y".to_string(), TweenValue::Number(2.0)),
            ]
        );
    }

    #[test]
    fn test_overwrite_from_bool_and_serde() {
        assert_eq!(Overwrite::from(true), Overwrite::All);
        assert_eq!(Overwrite::from(false), Overwrite::None);
        let parsed: Overwrite = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(parsed, Overwrite::Auto);
    }
}
