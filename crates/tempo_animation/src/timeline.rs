//! Timelines: composite animations that sequence their children
//!
//! A timeline converts its own playhead into each child's local time and
//! renders the children in start order (reverse order when its playhead
//! moves backward). Its duration is the end of its last child, recomputed
//! lazily after children are added, moved or removed.
//!
//! Children are rendered from a snapshot of ids. A child removed or moved to
//! another timeline by a callback during the pass is skipped, and a timeline
//! whose own playhead was moved by a callback stops the rest of its pass.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::animation::{
    animation_cycle, round_precise, AnimationId, Node, NodeKind, Timing, BIG, TINY,
};
use crate::callback::{shared_pair, CallbackKind};
use crate::error::{AnimationError, Result};
use crate::position::Position;
use crate::scheduler::Scheduler;
use crate::tween::{IntoTargets, TweenKind};
use crate::vars::{ChildDefaults, Overwrite, TimelineVars, TweenVars};

pub(crate) struct TimelineState {
    /// Ordered by start time (insertion order for equal starts) unless
    /// `sort` is off
    pub children: Vec<AnimationId>,
    pub labels: FxHashMap<String, f64>,
    /// Most recently added child
    pub recent: Option<AnimationId>,
    pub smooth_child_timing: bool,
    pub auto_remove_children: bool,
    pub sort: bool,
    /// Set while the timeline re-renders itself at an iteration boundary
    pub lock: u8,
    pub defaults: ChildDefaults,
}

impl TimelineState {
    pub(crate) fn new(vars: &mut TimelineVars) -> Self {
        Self {
            children: Vec::new(),
            labels: FxHashMap::default(),
            recent: None,
            smooth_child_timing: vars.smooth_child_timing,
            auto_remove_children: vars.auto_remove_children,
            sort: true,
            lock: 0,
            defaults: std::mem::take(&mut vars.defaults),
        }
    }
}

impl Scheduler {
    fn timeline_state(&self, id: AnimationId) -> Option<&TimelineState> {
        self.nodes.get(id).and_then(Node::timeline)
    }

    fn timeline_state_mut(&mut self, id: AnimationId) -> Option<&mut TimelineState> {
        self.nodes.get_mut(id).and_then(Node::timeline_mut)
    }

    pub(crate) fn require_timeline(&self, id: AnimationId) -> Result<()> {
        match self.nodes.get(id) {
            None => Err(AnimationError::UnknownAnimation(id)),
            Some(node) if node.timeline().is_none() => Err(AnimationError::NotATimeline(id)),
            Some(_) => Ok(()),
        }
    }

    pub(crate) fn sorts_children(&self, id: AnimationId) -> bool {
        self.timeline_state(id).is_some_and(|tl| tl.sort)
    }

    fn lock_of(&self, id: AnimationId) -> u8 {
        self.timeline_state(id).map_or(0, |tl| tl.lock)
    }

    fn set_lock(&mut self, id: AnimationId, lock: u8) {
        if let Some(tl) = self.timeline_state_mut(id) {
            tl.lock = lock;
        }
    }

    fn children_snapshot(&self, id: AnimationId) -> SmallVec<[AnimationId; 16]> {
        self.timeline_state(id)
            .map(|tl| tl.children.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Build a timeline inside `parent`
    pub(crate) fn create_timeline(
        &mut self,
        parent: AnimationId,
        mut vars: TimelineVars,
    ) -> AnimationId {
        let delay = if vars.delay.is_nan() { 0.0 } else { vars.delay };
        let timing = Timing::new(
            delay,
            0.0,
            vars.repeat.as_i64(),
            vars.repeat_delay,
            vars.yoyo,
        );
        let state = TimelineState::new(&mut vars);
        let mut node = Node::new(timing, NodeKind::Timeline(state));
        node.callbacks = std::mem::take(&mut vars.callbacks);
        node.name = vars.name.take();
        let id = self.nodes.insert(node);

        let position = self.resolve_position(parent, vars.position.as_ref(), Some(id));
        self.add_to_timeline(parent, id, position, false);
        if vars.reversed {
            self.set_reversed(id, true);
        }
        if vars.paused {
            self.set_paused(id, true);
        }
        id
    }

    /// Defaults for tweens created in `parent`, nearest timeline first
    pub(crate) fn inherited_defaults(&self, parent: AnimationId) -> ChildDefaults {
        let mut out = ChildDefaults::default();
        let mut current = Some(parent);
        while let Some(id) = current {
            let Some(node) = self.nodes.get(id) else {
                break;
            };
            if let Some(tl) = node.timeline() {
                let d = &tl.defaults;
                out.duration = out.duration.or(d.duration);
                out.ease = out.ease.take().or_else(|| d.ease.clone());
                out.overwrite = out.overwrite.or(d.overwrite);
            }
            current = node.timing.parent.or(node.timing.detached_parent);
        }
        out
    }

    /// Insert `child` into `timeline` at `position` (before its delay)
    pub(crate) fn add_to_timeline(
        &mut self,
        timeline: AnimationId,
        child: AnimationId,
        position: f64,
        skip_checks: bool,
    ) {
        if self.timing(child).is_some_and(|tm| tm.parent.is_some()) {
            self.remove_from_parent(child, false);
        }
        self.total_duration(child);
        self.update_timing(child, |tm| {
            tm.start = round_precise(position + tm.delay);
            tm.parent = Some(timeline);
            tm.detached_parent = Some(timeline);
        });
        self.set_end(child);

        let start = self.timing(child).map_or(0.0, |tm| tm.start);
        let sort = self.sorts_children(timeline);
        let index = self.timeline_state(timeline).map(|tl| {
            if sort {
                tl.children
                    .iter()
                    .rposition(|c| self.timing(*c).map_or(true, |tm| tm.start <= start))
                    .map_or(0, |i| i + 1)
            } else {
                tl.children.len()
            }
        });
        if let (Some(index), Some(tl)) = (index, self.timeline_state_mut(timeline)) {
            tl.children.insert(index, child);
            tl.recent = Some(child);
        }

        if !skip_checks {
            self.post_add_checks(timeline, child);
        }
        if let Some(tm) = self.timing(timeline) {
            if tm.ts < 0.0 {
                self.align_playhead(timeline, tm.t_time);
            }
        }
    }

    /// Bring a newly inserted child in line with the playhead and re-enable
    /// finished ancestors it extends
    pub(crate) fn post_add_checks(&mut self, timeline: AnimationId, child: AnimationId) {
        let Some(ct) = self.timing(child) else {
            return;
        };
        let Some(tt) = self.timing(timeline) else {
            return;
        };
        let child_is_timeline = self.is_timeline(child);
        if ct.time != 0.0
            || (ct.dur == 0.0 && ct.initted)
            || (ct.start < tt.time && (ct.dur != 0.0 || !child_is_timeline))
        {
            let raw = self.raw_time(timeline, false);
            let t = self.parent_to_child_total_time(raw, child);
            let total = self.total_duration(child);
            let ct = self.timing(child).unwrap_or(ct);
            if ct.dur == 0.0 || t.clamp(0.0, total) - ct.t_time > TINY {
                self.render(child, t, true, false);
            }
        }

        self.uncache(Some(timeline));
        let Some(tt) = self.timing(timeline) else {
            return;
        };
        if tt.detached_parent.is_some() && tt.initted && tt.time >= tt.dur && tt.ts != 0.0 {
            if tt.dur < self.duration_of(timeline) {
                let mut current = timeline;
                while let Some(tm) = self.timing(current) {
                    let Some(dp) = tm.detached_parent else {
                        break;
                    };
                    if self.raw_time(current, false) >= 0.0 {
                        self.set_total_time_inner(current, tm.t_time, false);
                    }
                    current = dp;
                }
            }
            self.update_timing(timeline, |tm| tm.z_time = -TINY);
        }
    }

    /// Take `child` out of `timeline`; it remembers the timeline as its last
    /// parent
    pub(crate) fn remove_child(&mut self, timeline: AnimationId, child: AnimationId) {
        if let Some(tl) = self.timeline_state_mut(timeline) {
            tl.children.retain(|c| *c != child);
            if tl.recent == Some(child) {
                tl.recent = tl.children.last().copied();
            }
        }
        self.update_timing(child, |tm| tm.parent = None);
        self.uncache(Some(timeline));
    }

    /// Recompute a dirty timeline's duration from its children
    pub(crate) fn recompute_timeline_duration(&mut self, id: AnimationId) {
        let Some(state) = self.timeline_state(id) else {
            return;
        };
        let sort = state.sort && state.lock == 0;
        let children = state.children.clone();

        for &child in &children {
            if self.timing(child).is_some_and(|tm| tm.dirty) {
                self.total_duration(child);
            }
        }

        if sort {
            let start = |s: &Self, c: &AnimationId| s.timing(*c).map_or(0.0, |tm| tm.start);
            let in_order = children
                .windows(2)
                .all(|w| start(self, &w[0]) <= start(self, &w[1]));
            if !in_order {
                let mut ordered = children.clone();
                ordered.sort_by(|a, b| start(self, a).total_cmp(&start(self, b)));
                if let Some(tl) = self.timeline_state_mut(id) {
                    tl.children = ordered;
                }
            }
        }

        let min_start = children
            .iter()
            .filter_map(|c| self.timing(*c))
            .filter(|tm| tm.ts != 0.0)
            .map(|tm| tm.start)
            .fold(0.0, f64::min);
        if min_start < 0.0 {
            // Children may not start before 0; shift them and, where the
            // parent allows it, move this timeline back to compensate.
            if let Some(tm) = self.timing(id) {
                let shift_self = match tm.parent {
                    None => tm.detached_parent.is_none(),
                    Some(parent) => self.smooth_child_timing(parent),
                };
                if shift_self && tm.ts != 0.0 {
                    self.update_timing(id, |tm| {
                        tm.start += min_start / tm.ts;
                        tm.time -= min_start;
                        tm.t_time -= min_start;
                    });
                }
            }
            self.shift_children_inner(id, -min_start, false, f64::NEG_INFINITY);
        }

        let max = children
            .iter()
            .filter_map(|c| self.timing(*c))
            .filter(|tm| tm.ts != 0.0)
            .map(|tm| tm.end)
            .fold(0.0, f64::max);
        let Some(tm) = self.timing(id) else {
            return;
        };
        let duration = if id == self.root && tm.time > max {
            tm.time
        } else {
            max
        };
        self.set_duration_internal(id, duration, true, true);
        self.update_timing(id, |tm| tm.dirty = false);
    }

    fn shift_children_inner(
        &mut self,
        id: AnimationId,
        amount: f64,
        adjust_labels: bool,
        ignore_before: f64,
    ) {
        for child in self.children_snapshot(id) {
            self.update_timing(child, |tm| {
                if tm.start >= ignore_before {
                    tm.start += amount;
                    tm.end += amount;
                }
            });
        }
        if adjust_labels {
            if let Some(tl) = self.timeline_state_mut(id) {
                for time in tl.labels.values_mut() {
                    if *time >= ignore_before {
                        *time += amount;
                    }
                }
            }
        }
        self.uncache(Some(id));
    }

    /// Local time of `child` when its parent's playhead is at `time`
    fn child_local_time(&mut self, child: AnimationId, ct: &Timing, time: f64) -> f64 {
        if ct.ts > 0.0 {
            (time - ct.start) * ct.ts
        } else {
            self.total_duration(child) + (time - ct.start) * ct.ts
        }
    }

    pub(crate) fn render_timeline(
        &mut self,
        id: AnimationId,
        total_time: f64,
        suppress: bool,
        force: bool,
    ) {
        let Some(before) = self.timing(id) else {
            return;
        };
        let is_root = id == self.root;
        let mut prev_time = before.time;
        let mut t_dur = if before.dirty {
            self.total_duration(id)
        } else {
            before.t_dur
        };
        let Some(tm) = self.timing(id) else {
            return;
        };
        let mut total_time = total_time;
        let mut dur = tm.dur;
        let mut t_time = if total_time <= 0.0 {
            0.0
        } else {
            round_precise(total_time)
        };
        let crossing_start = (tm.z_time < 0.0) != (total_time < 0.0) && (tm.initted || dur == 0.0);
        if !is_root && t_time > t_dur && total_time >= 0.0 {
            t_time = t_dur;
        }
        if !(t_time != tm.t_time || force || crossing_start) {
            return;
        }
        if prev_time != tm.time && dur != 0.0 {
            // the duration recompute shifted children with negative starts
            let shift = tm.time - prev_time;
            t_time += shift;
            total_time += shift;
        }

        let mut time = t_time;
        let prev_start = tm.start;
        let time_scale = tm.ts;
        let prev_paused = time_scale == 0.0;
        let mut iteration = 0;

        if crossing_start {
            if dur == 0.0 {
                prev_time = tm.z_time;
            }
            if total_time != 0.0 || !suppress {
                self.update_timing(id, |tm| tm.z_time = total_time);
            }
        }

        if tm.repeat != 0 {
            let yoyo = tm.yoyo;
            let cycle = dur + tm.r_delay;
            time = round_precise(t_time % cycle);
            if t_time == t_dur {
                iteration = tm.repeat.max(0);
                time = dur;
            } else {
                let cycles = round_precise(t_time / cycle);
                iteration = cycles.trunc() as i64;
                if iteration != 0 && iteration as f64 == cycles {
                    time = dur;
                    iteration -= 1;
                }
                if time > dur {
                    time = dur;
                }
            }
            let mut prev_iteration = animation_cycle(tm.t_time, cycle);
            if prev_time == 0.0
                && tm.t_time != 0.0
                && prev_iteration != iteration
                && tm.t_time - prev_iteration as f64 * cycle - tm.dur <= 0.0
            {
                prev_iteration = iteration;
            }
            let is_yoyo = yoyo && iteration & 1 == 1;
            if is_yoyo {
                time = dur - time;
            }

            if iteration != prev_iteration && self.lock_of(id) == 0 {
                // Finish the iteration that was left before starting the
                // new one, so children near the boundary are not skipped.
                let mut rewinding = yoyo && prev_iteration & 1 == 1;
                let does_wrap = rewinding == is_yoyo;
                if iteration < prev_iteration {
                    rewinding = !rewinding;
                }
                prev_time = if rewinding {
                    0.0
                } else if dur != 0.0 && t_time % dur != 0.0 {
                    dur
                } else {
                    t_time
                };
                let boundary = if prev_time != 0.0 {
                    prev_time
                } else if is_yoyo {
                    0.0
                } else {
                    round_precise(iteration as f64 * cycle)
                };
                self.set_lock(id, 1);
                self.render_timeline(id, boundary, suppress, dur == 0.0);
                self.set_lock(id, 0);
                self.update_timing(id, |tm| tm.t_time = t_time);
                if !suppress && self.timing(id).is_some_and(|tm| tm.parent.is_some()) {
                    for _ in 0..(iteration - prev_iteration).unsigned_abs() {
                        self.fire(id, CallbackKind::Repeat);
                        if !self.contains(id) {
                            return;
                        }
                    }
                }

                let Some(now) = self.timing(id) else {
                    return;
                };
                if (prev_time != 0.0 && prev_time != now.time) || prev_paused != (now.ts == 0.0) {
                    return;
                }
                dur = now.dur;
                t_dur = now.t_dur;
                if does_wrap {
                    self.set_lock(id, 2);
                    prev_time = if rewinding { dur } else { -0.0001 };
                    self.render_timeline(id, prev_time, true, false);
                }
                self.set_lock(id, 0);
                if self
                    .timing(id)
                    .map_or(true, |now| now.ts == 0.0 && !prev_paused)
                {
                    return;
                }
            }
        }

        let first_render = self.timing(id).is_some_and(|tm| !tm.initted);
        self.update_timing(id, |tm| {
            tm.t_time = t_time;
            tm.time = time;
            tm.active = time_scale == 0.0;
            if !tm.initted {
                tm.initted = true;
                tm.z_time = total_time;
            }
        });
        if first_render {
            // the first render always moves forward
            prev_time = 0.0;
        }

        if prev_time == 0.0 && time != 0.0 && !suppress && iteration == 0 {
            self.fire(id, CallbackKind::Start);
            if self.timing(id).map_or(true, |tm| tm.t_time != t_time) {
                return;
            }
        }

        let children = self.children_snapshot(id);
        if time >= prev_time && total_time >= 0.0 {
            for (i, &child) in children.iter().enumerate() {
                let Some(ct) = self.timing(child) else {
                    continue;
                };
                if ct.parent != Some(id) {
                    continue;
                }
                if (ct.active || time >= ct.start) && ct.ts != 0.0 {
                    let local = self.child_local_time(child, &ct, time);
                    self.render(child, local, suppress, force);
                    let Some(now) = self.timing(id) else {
                        return;
                    };
                    if time != now.time || (now.ts == 0.0 && !prev_paused) {
                        if i + 1 < children.len() {
                            self.update_timing(id, |tm| tm.z_time = -TINY);
                            t_time -= TINY;
                        }
                        break;
                    }
                }
            }
        } else {
            // Past the start, children get the negative time so zero-length
            // children know to render their start values
            let adjusted = if total_time < 0.0 { total_time } else { time };
            for (i, &child) in children.iter().enumerate().rev() {
                let Some(ct) = self.timing(child) else {
                    continue;
                };
                if ct.parent != Some(id) {
                    continue;
                }
                if (ct.active || adjusted <= ct.end) && ct.ts != 0.0 {
                    let local = self.child_local_time(child, &ct, adjusted);
                    self.render(child, local, suppress, force);
                    let Some(now) = self.timing(id) else {
                        return;
                    };
                    if time != now.time || (now.ts == 0.0 && !prev_paused) {
                        if i > 0 {
                            let z = if adjusted != 0.0 { -TINY } else { TINY };
                            self.update_timing(id, |tm| tm.z_time = z);
                            t_time += z;
                        }
                        break;
                    }
                }
            }
        }

        if !suppress {
            self.fire(id, CallbackKind::Update);
        }
        if is_root {
            return;
        }

        let Some(now) = self.timing(id) else {
            return;
        };
        let total_now = self.total_duration(id);
        let reached_end = t_time == t_dur && now.t_time >= total_now;
        let reached_start = t_time == 0.0 && prev_time != 0.0;
        if !(reached_end || reached_start) {
            return;
        }
        // A callback may have moved or rescaled this timeline meanwhile
        let undisturbed = prev_start == now.start || time_scale.abs() != now.ts.abs();
        if !undisturbed || self.lock_of(id) != 0 {
            return;
        }
        let finished_forward = t_time == t_dur && now.ts > 0.0;
        let finished_backward = t_time == 0.0 && now.ts < 0.0;
        if (total_time != 0.0 || dur == 0.0) && (finished_forward || finished_backward) {
            self.remove_from_parent(id, true);
        }
        if !suppress
            && !(total_time < 0.0 && prev_time == 0.0)
            && (t_time != 0.0 || prev_time != 0.0 || t_dur == 0.0)
        {
            let kind = if t_time == t_dur && total_time >= 0.0 {
                CallbackKind::Complete
            } else {
                CallbackKind::ReverseComplete
            };
            self.fire(id, kind);
        }
    }

    /// Resolve a position expression into a time on `timeline`
    ///
    /// Labels that do not exist yet are created at the end of the timeline.
    pub(crate) fn resolve_position(
        &mut self,
        timeline: AnimationId,
        position: Option<&Position>,
        child: Option<AnimationId>,
    ) -> f64 {
        let Some(position) = position else {
            if timeline == self.root {
                return self.timing(timeline).map_or(0.0, |tm| tm.time);
            }
            return self.clipped_duration(timeline);
        };
        let child_total = child.map_or(0.0, |c| self.total_duration(c));
        let recent = self.timeline_state(timeline).and_then(|tl| tl.recent);
        match position {
            Position::End => self.clipped_duration(timeline),
            Position::Absolute(time) => *time,
            Position::Relative(offset) => {
                self.clipped_duration(timeline) + offset.resolve(child_total)
            }
            Position::Label { name, offset } => {
                let base = self.label_or_create(timeline, name);
                base + offset.map_or(0.0, |o| o.resolve(child_total))
            }
            Position::PreviousStart(offset) => {
                let (start, total) = match recent {
                    Some(r) => (self.start_time(r), self.total_duration(r)),
                    None => (0.0, 0.0),
                };
                start + offset.map_or(0.0, |o| o.resolve(total))
            }
            Position::PreviousEnd(offset) => {
                let (end, total) = match recent {
                    Some(r) => {
                        let with_repeats = self.repeat(r) >= 0;
                        (self.end_time(r, with_repeats), self.total_duration(r))
                    }
                    None => (0.0, 0.0),
                };
                end + offset.map_or(0.0, |o| o.resolve(total))
            }
        }
    }

    /// End of the timeline; infinite timelines use the end of the most
    /// recent child instead
    fn clipped_duration(&mut self, timeline: AnimationId) -> f64 {
        if self.duration_of(timeline) >= BIG {
            let recent = self.timeline_state(timeline).and_then(|tl| tl.recent);
            return recent.map_or(0.0, |r| self.end_time(r, false));
        }
        self.timing(timeline).map_or(0.0, |tm| tm.dur)
    }

    fn label_or_create(&mut self, timeline: AnimationId, name: &str) -> f64 {
        if let Some(time) = self.timeline_state(timeline).and_then(|tl| tl.labels.get(name)) {
            return *time;
        }
        let time = self.clipped_duration(timeline);
        debug!("created label '{}' at {} on {:?}", name, time, timeline);
        if let Some(tl) = self.timeline_state_mut(timeline) {
            tl.labels.insert(name.to_string(), time);
        }
        time
    }

    fn check_cycle(&self, timeline: AnimationId, child: AnimationId) -> Result<()> {
        let mut current = Some(timeline);
        while let Some(id) = current {
            if id == child {
                return Err(AnimationError::Cycle {
                    parent: timeline,
                    child,
                });
            }
            current = self.timing(id).and_then(|tm| tm.parent);
        }
        Ok(())
    }

    pub(crate) fn create_delayed_call(
        &mut self,
        parent: AnimationId,
        delay: f64,
        position: Option<Position>,
        callback: impl FnMut(&mut Scheduler, AnimationId) + 'static,
    ) -> AnimationId {
        let (forward, backward) = shared_pair(Box::new(callback));
        let mut vars = TweenVars::new()
            .duration(0.0)
            .delay(delay)
            .immediate_render(false)
            .overwrite(Overwrite::None);
        vars.position = position;
        vars.callbacks.set(CallbackKind::Complete, forward);
        vars.callbacks.set(CallbackKind::ReverseComplete, backward);
        self.create_tween(parent, Vec::new(), vars, TweenKind::To, false)
    }
}

// Timeline API
impl Scheduler {
    /// Append a tween to `timeline`
    ///
    /// Without a position (`TweenVars::at`) the tween goes at the end, so
    /// successive calls play one after another.
    pub fn timeline_to(
        &mut self,
        timeline: AnimationId,
        targets: impl IntoTargets,
        vars: TweenVars,
    ) -> Result<AnimationId> {
        self.require_timeline(timeline)?;
        Ok(self.create_tween(timeline, targets.into_targets(), vars, TweenKind::To, false))
    }

    pub fn timeline_from(
        &mut self,
        timeline: AnimationId,
        targets: impl IntoTargets,
        vars: TweenVars,
    ) -> Result<AnimationId> {
        self.require_timeline(timeline)?;
        Ok(self.create_tween(timeline, targets.into_targets(), vars, TweenKind::From, false))
    }

    pub fn timeline_from_to(
        &mut self,
        timeline: AnimationId,
        targets: impl IntoTargets,
        from: TweenVars,
        to: TweenVars,
    ) -> Result<AnimationId> {
        self.require_timeline(timeline)?;
        let kind = TweenKind::FromTo(from.props);
        Ok(self.create_tween(timeline, targets.into_targets(), to, kind, false))
    }

    pub fn timeline_set(
        &mut self,
        timeline: AnimationId,
        targets: impl IntoTargets,
        vars: TweenVars,
    ) -> Result<AnimationId> {
        self.require_timeline(timeline)?;
        Ok(self.create_tween(timeline, targets.into_targets(), vars, TweenKind::Set, false))
    }

    /// Call `callback` when the playhead crosses `position`, in either
    /// direction
    pub fn timeline_call(
        &mut self,
        timeline: AnimationId,
        position: impl Into<Position>,
        callback: impl FnMut(&mut Scheduler, AnimationId) + 'static,
    ) -> Result<AnimationId> {
        self.require_timeline(timeline)?;
        Ok(self.create_delayed_call(timeline, 0.0, Some(position.into()), callback))
    }

    /// Create a timeline nested in `timeline`
    pub fn timeline_nested(
        &mut self,
        timeline: AnimationId,
        vars: TimelineVars,
    ) -> Result<AnimationId> {
        self.require_timeline(timeline)?;
        Ok(self.create_timeline(timeline, vars))
    }

    /// Move an existing animation into `timeline`
    pub fn add(
        &mut self,
        timeline: AnimationId,
        child: AnimationId,
        position: impl Into<Position>,
    ) -> Result<()> {
        self.require_timeline(timeline)?;
        if !self.contains(child) {
            return Err(AnimationError::UnknownAnimation(child));
        }
        self.check_cycle(timeline, child)?;
        if child == self.root {
            return Err(AnimationError::Cycle {
                parent: timeline,
                child,
            });
        }
        let position = position.into();
        let time = self.resolve_position(timeline, Some(&position), Some(child));
        self.add_to_timeline(timeline, child, time, false);
        Ok(())
    }

    /// Detach `child` from `timeline` without killing it
    pub fn remove(&mut self, timeline: AnimationId, child: AnimationId) -> Result<()> {
        self.require_timeline(timeline)?;
        if self.parent(child) == Some(timeline) {
            self.remove_child(timeline, child);
            self.update_timing(child, |tm| tm.active = false);
        }
        Ok(())
    }

    /// Detach every child and, optionally, drop the labels
    pub fn clear(&mut self, timeline: AnimationId, labels: bool) -> Result<()> {
        self.require_timeline(timeline)?;
        for child in self.children_snapshot(timeline) {
            self.remove_child(timeline, child);
            self.update_timing(child, |tm| tm.active = false);
        }
        if let Some(tl) = self.timeline_state_mut(timeline) {
            if labels {
                tl.labels.clear();
            }
            tl.recent = None;
        }
        Ok(())
    }

    /// Children in start order
    pub fn children(&self, timeline: AnimationId) -> Vec<AnimationId> {
        self.timeline_state(timeline)
            .map(|tl| tl.children.clone())
            .unwrap_or_default()
    }

    /// Most recently added child
    pub fn recent(&self, timeline: AnimationId) -> Option<AnimationId> {
        self.timeline_state(timeline).and_then(|tl| tl.recent)
    }

    /// Move children starting at or after `ignore_before` by `amount`
    pub fn shift_children(
        &mut self,
        timeline: AnimationId,
        amount: f64,
        adjust_labels: bool,
        ignore_before: f64,
    ) -> Result<()> {
        self.require_timeline(timeline)?;
        self.shift_children_inner(timeline, amount, adjust_labels, ignore_before);
        Ok(())
    }

    /// Name a point on `timeline`, resolved once into an absolute time
    pub fn add_label(
        &mut self,
        timeline: AnimationId,
        name: impl Into<String>,
        position: impl Into<Position>,
    ) -> Result<f64> {
        self.require_timeline(timeline)?;
        let name = name.into();
        let position = position.into();
        let time = self.resolve_position(timeline, Some(&position), None);
        debug!("label '{}' at {} on {:?}", name, time, timeline);
        if let Some(tl) = self.timeline_state_mut(timeline) {
            tl.labels.insert(name, time);
        }
        Ok(time)
    }

    pub fn remove_label(&mut self, timeline: AnimationId, name: &str) -> Result<f64> {
        self.require_timeline(timeline)?;
        self.timeline_state_mut(timeline)
            .and_then(|tl| tl.labels.remove(name))
            .ok_or_else(|| AnimationError::UnknownLabel(name.to_string()))
    }

    pub fn label_time(&self, timeline: AnimationId, name: &str) -> Option<f64> {
        self.timeline_state(timeline)
            .and_then(|tl| tl.labels.get(name).copied())
    }

    /// Labels ordered by time
    pub fn labels(&self, timeline: AnimationId) -> Vec<(String, f64)> {
        let mut labels: Vec<(String, f64)> = self
            .timeline_state(timeline)
            .map(|tl| tl.labels.iter().map(|(n, t)| (n.clone(), *t)).collect())
            .unwrap_or_default();
        labels.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        labels
    }

    /// Closest label after `time` (the playhead when `None`)
    pub fn next_label(&self, timeline: AnimationId, time: Option<f64>) -> Option<String> {
        self.label_in_direction(timeline, time, false)
    }

    /// Closest label before `time` (the playhead when `None`)
    pub fn previous_label(&self, timeline: AnimationId, time: Option<f64>) -> Option<String> {
        self.label_in_direction(timeline, time, true)
    }

    fn label_in_direction(
        &self,
        timeline: AnimationId,
        time: Option<f64>,
        backward: bool,
    ) -> Option<String> {
        let from = time.unwrap_or_else(|| self.time(timeline));
        self.labels(timeline)
            .into_iter()
            .filter(|(_, t)| {
                let distance = t - from;
                distance != 0.0 && (distance < 0.0) == backward
            })
            .min_by(|a, b| (a.1 - from).abs().total_cmp(&(b.1 - from).abs()))
            .map(|(name, _)| name)
    }

    /// Seek `timeline` to a label
    pub fn seek_label(&mut self, timeline: AnimationId, name: &str) -> Result<()> {
        self.require_timeline(timeline)?;
        let time = self
            .label_time(timeline, name)
            .ok_or_else(|| AnimationError::UnknownLabel(name.to_string()))?;
        self.seek(timeline, time);
        Ok(())
    }
}
