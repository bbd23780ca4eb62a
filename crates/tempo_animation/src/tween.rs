//! Tweens: leaf animations that write interpolated values into targets
//!
//! A tween records what to animate at construction and builds its prop
//! tweens lazily, the first time it renders, so start values are read from
//! the targets when the tween actually begins. The values of that first
//! render are held back until the end of the render pass, so every tween
//! starting in the same frame reads the values from before the frame.

use smallvec::SmallVec;
use tempo_core::{Target, TargetKey};
use tracing::{debug, warn};

use crate::animation::{
    animation_cycle, round_precise, sanitize_duration, AnimationId, Node, NodeKind, Timing, TINY,
};
use crate::callback::CallbackKind;
use crate::easing::{Ease, EaseSpec};
use crate::interpolate::TweenValue;
use crate::plugin::PluginContext;
use crate::position::Position;
use crate::prop_tween::{Endpoints, PropTween};
use crate::scheduler::Scheduler;
use crate::vars::{Overwrite, Stagger, TweenVars, YoyoEase};

/// Anything that can be turned into a list of tween targets
pub trait IntoTargets {
    fn into_targets(self) -> Vec<Target>;
}

impl IntoTargets for Target {
    fn into_targets(self) -> Vec<Target> {
        vec![self]
    }
}

impl IntoTargets for &Target {
    fn into_targets(self) -> Vec<Target> {
        vec![self.clone()]
    }
}

impl IntoTargets for Vec<Target> {
    fn into_targets(self) -> Vec<Target> {
        self
    }
}

impl IntoTargets for &[Target] {
    fn into_targets(self) -> Vec<Target> {
        self.to_vec()
    }
}

impl<const N: usize> IntoTargets for [Target; N] {
    fn into_targets(self) -> Vec<Target> {
        self.into_iter().collect()
    }
}

/// How the values given to a tween are used
#[derive(Clone, Debug)]
pub(crate) enum TweenKind {
    /// Animate from the current values to the given ones
    To,
    /// Animate from the given values to the current ones
    From,
    /// Animate between explicit start values and the given ones
    FromTo(Vec<(String, TweenValue)>),
    /// Jump to the given values
    Set,
}

pub(crate) struct TweenState {
    targets: SmallVec<[Target; 1]>,
    props: Vec<(String, TweenValue)>,
    start_props: Option<Vec<(String, TweenValue)>>,
    run_backwards: bool,
    ease: Ease,
    yoyo_ease: Option<Ease>,
    prop_tweens: Vec<PropTween>,
    /// Eased ratio of the last render
    ratio: Option<f64>,
    /// Properties taken away by overwriting before the tween was initialized;
    /// `None` means every property of that target
    killed: Vec<(TargetKey, Option<String>)>,
    overwrite: Overwrite,
    /// Initialized in the current pass with its values not yet written
    lazy: bool,
}

impl TweenState {
    pub(crate) fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub(crate) fn logical_props(&self) -> impl Iterator<Item = &str> {
        self.props.iter().map(|(name, _)| name.as_str())
    }

    pub(crate) fn prop_tweens(&self) -> &[PropTween] {
        &self.prop_tweens
    }

    /// Write the held-back values of the first render
    pub(crate) fn flush(&mut self) {
        if !std::mem::take(&mut self.lazy) {
            return;
        }
        if let Some(ratio) = self.ratio {
            for pt in &self.prop_tweens {
                pt.render(ratio);
            }
        }
    }

    fn is_killed(&self, key: TargetKey, property: &str) -> bool {
        self.killed
            .iter()
            .any(|(k, p)| *k == key && p.as_deref().map_or(true, |p| p == property))
    }

    /// Stop animating `props` (all of them with `None`) on one target
    ///
    /// Returns whether the tween has anything left to animate.
    pub(crate) fn kill_props(
        &mut self,
        key: TargetKey,
        props: Option<&[String]>,
        initted: bool,
    ) -> bool {
        let matches = |name: &str| props.map_or(true, |props| props.iter().any(|p| p == name));
        if initted {
            self.prop_tweens
                .retain(|pt| !(pt.target().key() == key && matches(pt.logical())));
            !self.prop_tweens.is_empty()
        } else {
            match props {
                Some(props) => self
                    .killed
                    .extend(props.iter().map(|p| (key, Some(p.clone())))),
                None => self.killed.push((key, None)),
            }
            self.targets.iter().any(|target| {
                self.props
                    .iter()
                    .any(|(name, _)| !self.is_killed(target.key(), name))
            })
        }
    }
}

impl Scheduler {
    /// Build a tween (or a staggered group of tweens) inside `parent`
    pub(crate) fn create_tween(
        &mut self,
        parent: AnimationId,
        targets: Vec<Target>,
        mut vars: TweenVars,
        kind: TweenKind,
        nested: bool,
    ) -> AnimationId {
        if targets.is_empty() && !vars.props.is_empty() {
            warn!("tween created without targets");
        }
        if let Some(stagger) = vars.stagger.take() {
            if targets.len() > 1 {
                return self.create_stagger(parent, targets, vars, kind, stagger);
            }
        }

        let defaults = self.inherited_defaults(parent);
        let duration = match kind {
            TweenKind::Set => 0.0,
            _ => sanitize_duration(vars.duration.or(defaults.duration).unwrap_or(0.0)),
        };
        let ease_spec = vars
            .ease
            .take()
            .or(defaults.ease)
            .unwrap_or_else(|| EaseSpec::from("linear"));
        let ease = self.eases.resolve(&ease_spec);
        let yoyo_ease = match vars.yoyo_ease.take() {
            Some(YoyoEase::Inverted) => Some(ease.derive_yoyo_inverse()),
            Some(YoyoEase::Ease(spec)) => Some(self.eases.resolve(&spec)),
            None => None,
        };
        let overwrite = vars.overwrite.or(defaults.overwrite).unwrap_or_default();
        let delay = if vars.delay.is_nan() { 0.0 } else { vars.delay };

        let (start_props, run_backwards) = match &kind {
            TweenKind::From => (None, true),
            TweenKind::FromTo(start) => (Some(start.clone()), false),
            TweenKind::To | TweenKind::Set => (None, false),
        };
        let state = TweenState {
            targets: targets.iter().cloned().collect(),
            props: std::mem::take(&mut vars.props),
            start_props,
            run_backwards,
            ease,
            yoyo_ease,
            prop_tweens: Vec::new(),
            ratio: None,
            killed: Vec::new(),
            overwrite,
            lazy: false,
        };
        let timing = Timing::new(
            delay,
            duration,
            vars.repeat.as_i64(),
            vars.repeat_delay,
            vars.yoyo,
        );
        let mut node = Node::new(timing, NodeKind::Tween(state));
        node.callbacks = std::mem::take(&mut vars.callbacks);
        node.name = vars.name.take();
        let id = self.nodes.insert(node);
        self.overwrite.register(id, &targets);

        if overwrite == Overwrite::All {
            for target in &targets {
                self.kill_target_in_others(target, None, id);
            }
        }

        let position = self.resolve_position(parent, vars.position.as_ref(), Some(id));
        self.add_to_timeline(parent, id, position, false);

        if vars.reversed {
            self.set_reversed(id, true);
        }
        if vars.paused {
            self.set_paused(id, true);
        }

        let Some(tm) = self.timing(id) else {
            return id;
        };
        let from_kind = matches!(kind, TweenKind::From | TweenKind::FromTo(_));
        let parent_time = self.timing(parent).map_or(0.0, |p| p.time);
        let immediate = vars.immediate_render.unwrap_or(from_kind)
            || (duration == 0.0
                && vars.immediate_render != Some(false)
                && tm.start == round_precise(parent_time)
                && !self.has_paused_ancestor(id)
                && !nested);
        if immediate {
            self.update_timing(id, |tm| tm.t_time = -TINY);
            self.render(id, (-delay).max(0.0), false, false);
        }
        id
    }

    /// One tween per target inside a timeline, offset by the stagger
    fn create_stagger(
        &mut self,
        parent: AnimationId,
        targets: Vec<Target>,
        mut vars: TweenVars,
        kind: TweenKind,
        stagger: Stagger,
    ) -> AnimationId {
        let offsets = stagger.offsets(targets.len());
        let mut group_vars = vars.stagger_group();
        group_vars.position = vars.position.take();
        let group = self.create_timeline(parent, group_vars);

        for (target, offset) in targets.into_iter().zip(offsets) {
            let mut child = vars.stagger_child();
            child.position = Some(Position::Absolute(offset));
            self.create_tween(group, vec![target], child, kind.clone(), true);
        }
        debug!("staggered group {:?}", group);
        group
    }

    /// Build the prop tweens of `id`
    ///
    /// Runs at the first render: `Auto` overwriting happens here, against the
    /// tweens running at that moment.
    fn init_tween(&mut self, id: AnimationId) {
        let Some(tween) = self.nodes.get(id).and_then(Node::tween) else {
            return;
        };
        let targets: SmallVec<[Target; 1]> = tween.targets.clone();
        if tween.overwrite == Overwrite::Auto {
            self.auto_overwrite(id);
        }
        self.flush_finished_on(&targets, id);

        let Some(tween) = self.nodes.get(id).and_then(Node::tween) else {
            return;
        };
        let cx = PluginContext {
            accessors: &self.accessors,
        };
        let mut prop_tweens = Vec::new();
        for target in &tween.targets {
            for (name, value) in &tween.props {
                if tween.is_killed(target.key(), name) {
                    continue;
                }
                let start = tween
                    .start_props
                    .as_ref()
                    .and_then(|props| props.iter().find(|(n, _)| n == name))
                    .map(|(_, v)| v);
                let ends = Endpoints {
                    start,
                    end: value,
                    backwards: tween.run_backwards,
                };
                if let Some(plugin) = self.plugins.find(target, name) {
                    let built = plugin.init(&cx, target, name, ends);
                    if built.is_empty() {
                        warn!("plugin '{}' skipped '{}' on {:?}", plugin.name(), name, target);
                    }
                    prop_tweens.extend(built);
                    continue;
                }
                match PropTween::build(&self.accessors, target, name, name, ends) {
                    Some(pt) => prop_tweens.push(pt),
                    None => warn!("cannot animate '{}' on {:?}, skipping it", name, target),
                }
            }
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.timing.initted = true;
            if let Some(tween) = node.tween_mut() {
                tween.prop_tweens = prop_tweens;
                tween.lazy = true;
                self.lazy.push(id);
            }
        }
    }

    /// Write the held-back values of tweens on `targets` that are no longer
    /// running, so `id` starts from where they ended
    fn flush_finished_on(&mut self, targets: &[Target], id: AnimationId) {
        for target in targets {
            for other in self.overwrite.tweens(target.key()) {
                let pending = self
                    .nodes
                    .get(other)
                    .and_then(Node::tween)
                    .is_some_and(|tween| tween.lazy);
                if other == id || !pending || self.is_active(other) {
                    continue;
                }
                if let Some(tween) = self.nodes.get_mut(other).and_then(Node::tween_mut) {
                    tween.flush();
                }
            }
        }
    }

    /// Write every prop tween of `id` at `ratio`
    fn render_prop_tweens(&self, id: AnimationId, ratio: f64) {
        let Some(tween) = self.nodes.get(id).and_then(Node::tween) else {
            return;
        };
        if tween.lazy {
            return;
        }
        for pt in &tween.prop_tweens {
            pt.render(ratio);
        }
    }

    fn set_ratio(&mut self, id: AnimationId, ratio: f64) {
        if let Some(tween) = self.nodes.get_mut(id).and_then(Node::tween_mut) {
            tween.ratio = Some(ratio);
        }
    }

    fn ratio_of(&self, id: AnimationId) -> Option<f64> {
        self.nodes
            .get(id)
            .and_then(Node::tween)
            .and_then(|tween| tween.ratio)
    }

    /// Eased ratio of `id` at `time` within its iteration
    fn eased(&self, id: AnimationId, progress: f64, yoyo: bool) -> f64 {
        self.nodes
            .get(id)
            .and_then(Node::tween)
            .map_or(progress, |tween| match (&tween.yoyo_ease, yoyo) {
                (Some(ease), true) => ease.apply(progress),
                _ => tween.ease.apply(progress),
            })
    }

    pub(crate) fn render_tween(
        &mut self,
        id: AnimationId,
        total_time: f64,
        suppress: bool,
        force: bool,
    ) {
        let Some(tm) = self.timing(id) else {
            return;
        };
        let prev_time = tm.time;
        let dur = tm.dur;
        if dur == 0.0 {
            self.render_zero_duration(id, total_time, suppress, force);
            return;
        }
        let is_negative = total_time < 0.0;
        let t_time = if total_time > tm.t_dur - TINY && !is_negative {
            tm.t_dur
        } else if total_time < TINY {
            0.0
        } else {
            total_time
        };
        let changed = t_time != tm.t_time
            || total_time == 0.0
            || force
            || (!tm.initted && tm.t_time != 0.0);
        if !changed {
            return;
        }

        let mut time = t_time;
        let mut iteration = 0;
        let mut prev_iteration = 0;
        let mut is_yoyo = false;
        if tm.repeat != 0 {
            let cycle = dur + tm.r_delay;
            time = round_precise(t_time % cycle);
            if t_time == tm.t_dur {
                iteration = tm.repeat.max(0);
                time = dur;
            } else {
                let cycles = round_precise(t_time / cycle);
                iteration = cycles.trunc() as i64;
                if iteration != 0 && iteration as f64 == cycles {
                    time = dur;
                    iteration -= 1;
                } else if time > dur {
                    time = dur;
                }
            }
            is_yoyo = tm.yoyo && iteration & 1 == 1;
            if is_yoyo {
                time = dur - time;
            }
            prev_iteration = animation_cycle(tm.t_time, cycle);
            if time == prev_time && !force && tm.initted && iteration == prev_iteration {
                // inside a repeat delay
                self.update_timing(id, |tm| tm.t_time = t_time);
                return;
            }
        }

        if !tm.initted {
            self.init_tween(id);
            if !self.contains(id) {
                return;
            }
        }

        self.update_timing(id, |tm| {
            tm.t_time = t_time;
            tm.time = time;
            if !tm.active && tm.ts != 0.0 {
                tm.active = true;
            }
        });
        let ratio = self.eased(id, time / dur, is_yoyo);
        self.set_ratio(id, ratio);

        if time != 0.0 && prev_time == 0.0 && !suppress && iteration == 0 {
            self.fire(id, CallbackKind::Start);
            if self.timing(id).map_or(true, |tm| tm.t_time != t_time) {
                return;
            }
        }

        self.render_prop_tweens(id, ratio);

        if !suppress {
            self.fire(id, CallbackKind::Update);
        }
        if tm.repeat != 0 && !suppress && tm.parent.is_some() {
            // once per boundary crossed, in either direction
            for _ in 0..(iteration - prev_iteration).unsigned_abs() {
                self.fire(id, CallbackKind::Repeat);
                if !self.contains(id) {
                    return;
                }
            }
        }

        let Some(tm) = self.timing(id) else {
            return;
        };
        if (t_time == tm.t_dur || t_time == 0.0) && tm.t_time == t_time {
            let finished_forward = t_time == tm.t_dur && tm.ts > 0.0;
            let finished_backward = t_time == 0.0 && tm.ts < 0.0;
            if total_time != 0.0 && (finished_forward || finished_backward) {
                self.remove_from_parent(id, true);
            }
            if !suppress
                && !(is_negative && prev_time == 0.0)
                && (t_time != 0.0 || prev_time != 0.0 || is_yoyo)
            {
                let kind = if t_time == tm.t_dur {
                    CallbackKind::Complete
                } else {
                    CallbackKind::ReverseComplete
                };
                self.fire(id, kind);
            }
        }
    }

    /// Zero-duration tweens jump between their start (ratio 0) and end
    /// (ratio 1) when the playhead crosses them, once per crossing
    fn render_zero_duration(
        &mut self,
        id: AnimationId,
        total_time: f64,
        suppress: bool,
        force: bool,
    ) {
        let Some(tm) = self.timing(id) else {
            return;
        };
        let parent_reversed = tm
            .detached_parent
            .and_then(|p| self.timing(p))
            .is_some_and(|p| p.ts < 0.0);
        let mut ratio = if total_time < 0.0
            || (total_time == 0.0
                && ((tm.start == 0.0 && self.parent_playhead_is_before_start(id))
                    || tm.ts < 0.0
                    || parent_reversed))
        {
            0.0
        } else {
            1.0
        };

        let mut prev_ratio = self.ratio_of(id);
        let mut t_time = 0.0;
        if tm.r_delay != 0.0 && tm.repeat != 0 {
            t_time = total_time.clamp(0.0, tm.t_dur);
            let iteration = animation_cycle(t_time, tm.r_delay);
            if tm.yoyo && iteration & 1 == 1 {
                ratio = 1.0 - ratio;
            }
            if iteration != animation_cycle(tm.t_time, tm.r_delay) {
                prev_ratio = Some(1.0 - ratio);
            }
        }

        let crossed = prev_ratio != Some(ratio)
            || force
            || tm.z_time == TINY
            || (total_time == 0.0 && tm.z_time != 0.0);
        if !crossed {
            if tm.z_time == 0.0 {
                self.update_timing(id, |tm| tm.z_time = total_time);
            }
            return;
        }

        if !tm.initted {
            self.init_tween(id);
            if !self.contains(id) {
                return;
            }
        }
        let prev_z = tm.z_time;
        // Arriving exactly at 0 with events suppressed leaves the callback
        // for when the playhead moves off again
        let z_time = if total_time != 0.0 {
            total_time
        } else if suppress {
            TINY
        } else {
            0.0
        };
        let suppress = suppress || (total_time != 0.0 && prev_z == 0.0);
        self.update_timing(id, |tm| {
            tm.z_time = z_time;
            tm.time = 0.0;
            tm.t_time = t_time;
        });
        self.set_ratio(id, ratio);
        self.render_prop_tweens(id, ratio);

        if !suppress {
            self.fire(id, CallbackKind::Update);
        }
        if t_time != 0.0 && tm.repeat != 0 && !suppress && tm.parent.is_some() {
            self.fire(id, CallbackKind::Repeat);
        }

        let Some(tm) = self.timing(id) else {
            return;
        };
        if (total_time >= tm.t_dur || total_time < 0.0) && self.ratio_of(id) == Some(ratio) {
            if ratio != 0.0 {
                self.remove_from_parent(id, true);
            }
            if !suppress {
                let kind = if ratio != 0.0 {
                    CallbackKind::Complete
                } else {
                    CallbackKind::ReverseComplete
                };
                self.fire(id, kind);
            }
        }
    }

    fn parent_playhead_is_before_start(&mut self, id: AnimationId) -> bool {
        let Some(parent) = self.timing(id).and_then(|tm| tm.parent) else {
            return false;
        };
        let Some(ptm) = self.timing(parent) else {
            return false;
        };
        let locked = self
            .nodes
            .get(parent)
            .and_then(Node::timeline)
            .is_some_and(|tl| tl.lock != 0);
        ptm.ts != 0.0
            && ptm.initted
            && !locked
            && (self.raw_time(parent, false) < 0.0 || self.parent_playhead_is_before_start(parent))
    }

    /// Targets of a tween
    pub fn targets_of(&self, id: AnimationId) -> Vec<Target> {
        self.nodes
            .get(id)
            .and_then(Node::tween)
            .map(|tween| tween.targets.to_vec())
            .unwrap_or_default()
    }

    /// Properties `id` still writes on `target`
    ///
    /// Before the first render this lists the configured properties that
    /// overwriting has not taken away.
    pub fn animated_properties(&self, id: AnimationId, target: &Target) -> Vec<String> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        let Some(tween) = node.tween() else {
            return Vec::new();
        };
        let key = target.key();
        let mut names: Vec<String> = if node.timing.initted {
            tween
                .prop_tweens
                .iter()
                .filter(|pt| pt.target().key() == key)
                .map(|pt| pt.logical().to_string())
                .collect()
        } else if tween.targets.iter().any(|t| t.key() == key) {
            tween
                .logical_props()
                .filter(|name| !tween.is_killed(key, name))
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };
        names.dedup();
        names
    }

    /// Eased ratio of the last render of a tween
    pub fn ratio(&self, id: AnimationId) -> Option<f64> {
        self.ratio_of(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kill_props_before_init() {
        let target = Target::new(tempo_core::PropertyBag::new());
        let mut state = TweenState {
            targets: SmallVec::from_vec(vec![target.clone()]),
            props: vec![
                ("x".into(), TweenValue::Number(1.0)),
                ("y".into(), TweenValue::Number(1.0)),
            ],
            start_props: None,
            run_backwards: false,
            ease: Ease::linear(),
            yoyo_ease: None,
            prop_tweens: Vec::new(),
            ratio: None,
            killed: Vec::new(),
            overwrite: Overwrite::Auto,
            lazy: false,
        };

        assert!(state.kill_props(target.key(), Some(&["x".to_string()]), false));
        assert!(state.is_killed(target.key(), "x"));
        assert!(!state.is_killed(target.key(), "y"));
        assert!(!state.kill_props(target.key(), Some(&["y".to_string()]), false));
    }

    #[test]
    fn test_kill_whole_target() {
        let target = Target::new(tempo_core::PropertyBag::new());
        let mut state = TweenState {
            targets: SmallVec::from_vec(vec![target.clone()]),
            props: vec![("x".into(), TweenValue::Number(1.0))],
            start_props: None,
            run_backwards: false,
            ease: Ease::linear(),
            yoyo_ease: None,
            prop_tweens: Vec::new(),
            ratio: None,
            killed: Vec::new(),
            overwrite: Overwrite::Auto,
            lazy: false,
        };
        assert!(!state.kill_props(target.key(), None, false));
    }
}
