//! Shared virtual-time state of tweens and timelines
//!
//! Every node in the tree carries a [`Timing`]: where it starts on its
//! parent, how long one iteration lasts, how many iterations there are, its
//! playhead, and its time scale. The playhead setters in this module move a
//! node's playhead the way a user expects, re-attaching finished animations
//! to their last parent and shifting start times under parents that have
//! smooth child timing (the root always does).

use slotmap::new_key_type;
use tracing::{debug, warn};

use crate::callback::{CallbackKind, Callbacks};
use crate::error::{AnimationError, Result};
use crate::scheduler::Scheduler;
use crate::timeline::TimelineState;
use crate::tween::TweenState;

new_key_type! {
    /// Identifies a tween or timeline inside one [`Scheduler`]
    pub struct AnimationId;
}

/// Smallest meaningful time step
pub(crate) const TINY: f64 = 1e-8;
/// Durations at or above this count as unbounded when placing children
pub(crate) const BIG: f64 = 1e8;
/// Total duration of an infinitely repeating animation
pub(crate) const INFINITE_DURATION: f64 = 1e10;

/// Round to 7 decimal places, mapping NaN and -0 to 0
pub(crate) fn round_precise(value: f64) -> f64 {
    let rounded = (value * 10_000_000.0).round() / 10_000_000.0;
    if rounded == 0.0 || rounded.is_nan() {
        0.0
    } else {
        rounded
    }
}

/// Iteration (0-based) a total time falls in
///
/// A time exactly on a cycle boundary belongs to the iteration that just
/// ended.
pub(crate) fn animation_cycle(total_time: f64, cycle_duration: f64) -> i64 {
    if cycle_duration <= 0.0 {
        return 0;
    }
    let cycles = round_precise(total_time / cycle_duration);
    let whole = cycles.floor();
    if cycles != 0.0 && whole == cycles {
        whole as i64 - 1
    } else {
        whole as i64
    }
}

/// Total duration of `repeat` extra iterations with a gap between them
pub(crate) fn total_span(duration: f64, repeat: i64, repeat_delay: f64) -> f64 {
    match repeat {
        0 => duration,
        r if r < 0 => INFINITE_DURATION,
        r => round_precise(duration * (r + 1) as f64 + repeat_delay * r as f64),
    }
}

/// Negative and NaN durations are treated as zero
pub(crate) fn sanitize_duration(seconds: f64) -> f64 {
    if seconds.is_nan() || seconds < 0.0 {
        warn!("invalid duration {}, using 0", seconds);
        0.0
    } else {
        seconds
    }
}

/// Timing state of one animation
#[derive(Clone, Copy, Debug)]
pub(crate) struct Timing {
    /// Start on the parent's timeline, delay included
    pub start: f64,
    pub delay: f64,
    /// One iteration
    pub dur: f64,
    /// All iterations and repeat delays
    pub t_dur: f64,
    /// Playhead inside the current iteration
    pub time: f64,
    /// Playhead across all iterations
    pub t_time: f64,
    /// Effective time scale, 0 while paused
    pub ts: f64,
    /// Time scale as set by the user
    pub rts: f64,
    pub paused: bool,
    /// Extra iterations, -1 for infinite
    pub repeat: i64,
    pub r_delay: f64,
    pub yoyo: bool,
    pub parent: Option<AnimationId>,
    /// Last parent; survives auto-removal so the animation can be put back
    pub detached_parent: Option<AnimationId>,
    pub initted: bool,
    pub active: bool,
    /// Cached total duration is stale (timelines only)
    pub dirty: bool,
    /// Total time of the last render that landed on or crossed 0
    pub z_time: f64,
    /// End on the parent's timeline
    pub end: f64,
    /// Playhead recorded when paused
    pub p_time: f64,
}

impl Timing {
    pub(crate) fn new(
        delay: f64,
        duration: f64,
        repeat: i64,
        repeat_delay: f64,
        yoyo: bool,
    ) -> Self {
        let dur = round_precise(duration);
        let (r_delay, yoyo) = if repeat != 0 {
            (repeat_delay.max(0.0), yoyo)
        } else {
            (0.0, false)
        };
        Self {
            start: 0.0,
            delay,
            dur,
            t_dur: total_span(dur, repeat, r_delay),
            time: 0.0,
            t_time: 0.0,
            ts: 1.0,
            rts: 1.0,
            paused: false,
            repeat,
            r_delay,
            yoyo,
            parent: None,
            detached_parent: None,
            initted: false,
            active: false,
            dirty: false,
            z_time: -TINY,
            end: 0.0,
            p_time: 0.0,
        }
    }

    /// Time scale used when mapping spans onto the parent
    pub(crate) fn span_scale(&self) -> f64 {
        if self.ts != 0.0 {
            self.ts.abs()
        } else if self.rts != 0.0 {
            self.rts.abs()
        } else {
            TINY
        }
    }
}

pub(crate) enum NodeKind {
    Tween(TweenState),
    Timeline(TimelineState),
}

pub(crate) struct Node {
    pub timing: Timing,
    pub kind: NodeKind,
    pub callbacks: Callbacks,
    pub name: Option<String>,
}

impl Node {
    pub(crate) fn new(timing: Timing, kind: NodeKind) -> Self {
        Self {
            timing,
            kind,
            callbacks: Callbacks::new(),
            name: None,
        }
    }

    pub(crate) fn timeline(&self) -> Option<&TimelineState> {
        match &self.kind {
            NodeKind::Timeline(tl) => Some(tl),
            NodeKind::Tween(_) => None,
        }
    }

    pub(crate) fn timeline_mut(&mut self) -> Option<&mut TimelineState> {
        match &mut self.kind {
            NodeKind::Timeline(tl) => Some(tl),
            NodeKind::Tween(_) => None,
        }
    }

    pub(crate) fn tween(&self) -> Option<&TweenState> {
        match &self.kind {
            NodeKind::Tween(tw) => Some(tw),
            NodeKind::Timeline(_) => None,
        }
    }

    pub(crate) fn tween_mut(&mut self) -> Option<&mut TweenState> {
        match &mut self.kind {
            NodeKind::Tween(tw) => Some(tw),
            NodeKind::Timeline(_) => None,
        }
    }
}

// Internal timing machinery
impl Scheduler {
    pub(crate) fn timing(&self, id: AnimationId) -> Option<Timing> {
        self.nodes.get(id).map(|node| node.timing)
    }

    pub(crate) fn store_timing(&mut self, id: AnimationId, timing: Timing) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.timing = timing;
        }
    }

    pub(crate) fn update_timing(&mut self, id: AnimationId, f: impl FnOnce(&mut Timing)) {
        if let Some(node) = self.nodes.get_mut(id) {
            f(&mut node.timing);
        }
    }

    pub(crate) fn is_timeline(&self, id: AnimationId) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|node| node.timeline().is_some())
    }

    pub(crate) fn smooth_child_timing(&self, id: AnimationId) -> bool {
        self.nodes
            .get(id)
            .and_then(Node::timeline)
            .is_some_and(|tl| tl.smooth_child_timing)
    }

    pub(crate) fn auto_remove_children(&self, id: AnimationId) -> bool {
        self.nodes
            .get(id)
            .and_then(Node::timeline)
            .is_some_and(|tl| tl.auto_remove_children)
    }

    /// Map a time on the parent onto this animation's total time
    pub(crate) fn parent_to_child_total_time(&mut self, parent_time: f64, id: AnimationId) -> f64 {
        let Some(tm) = self.timing(id) else {
            return 0.0;
        };
        let local = (parent_time - tm.start) * tm.ts;
        if tm.ts >= 0.0 {
            local
        } else {
            local + self.total_duration(id)
        }
    }

    pub(crate) fn set_end(&mut self, id: AnimationId) {
        self.update_timing(id, |tm| {
            tm.end = round_precise(tm.start + tm.t_dur / tm.span_scale());
        });
    }

    /// Mark cached durations stale from `id` up to the root
    pub(crate) fn uncache(&mut self, id: Option<AnimationId>) {
        let mut current = id;
        while let Some(id) = current {
            let Some(node) = self.nodes.get_mut(id) else {
                break;
            };
            node.timing.dirty = true;
            current = node.timing.parent;
        }
    }

    /// Recompute the durations of every ancestor below the root
    pub(crate) fn recache_ancestors(&mut self, id: AnimationId) {
        let mut parent = self.timing(id).and_then(|tm| tm.parent);
        while let Some(p) = parent {
            let Some(tm) = self.timing(p) else {
                break;
            };
            let Some(grand) = tm.parent else {
                break;
            };
            self.update_timing(p, |tm| tm.dirty = true);
            self.total_duration(p);
            parent = Some(grand);
        }
    }

    /// Shift the start time so that `total_time` lines up with the parent's
    /// playhead (parents with smooth child timing only)
    pub(crate) fn align_playhead(&mut self, id: AnimationId, total_time: f64) {
        let Some(tm) = self.timing(id) else {
            return;
        };
        let Some(parent) = tm.detached_parent else {
            return;
        };
        if tm.ts == 0.0 || !self.smooth_child_timing(parent) {
            return;
        }
        let parent_time = self.timing(parent).map_or(0.0, |p| p.time);
        let offset = if tm.ts > 0.0 {
            total_time / tm.ts
        } else {
            (self.total_duration(id) - total_time) / -tm.ts
        };
        self.update_timing(id, |tm| tm.start = round_precise(parent_time - offset));
        self.set_end(id);
        if self.timing(parent).is_some_and(|p| !p.dirty) {
            self.uncache(Some(parent));
        }
    }

    /// Change the duration of one iteration
    pub(crate) fn set_duration_internal(
        &mut self,
        id: AnimationId,
        duration: f64,
        skip_uncache: bool,
        leave_playhead: bool,
    ) {
        let Some(mut tm) = self.timing(id) else {
            return;
        };
        let dur = round_precise(duration);
        let total_progress = if tm.t_dur != 0.0 {
            tm.t_time / tm.t_dur
        } else {
            0.0
        };
        if total_progress != 0.0 && !leave_playhead && tm.dur != 0.0 {
            tm.time *= dur / tm.dur;
        }
        tm.dur = dur;
        tm.t_dur = total_span(dur, tm.repeat, tm.r_delay);
        let parent = tm.parent;
        self.store_timing(id, tm);

        if total_progress > 0.0 && !leave_playhead {
            let t_time = tm.t_dur * total_progress;
            self.update_timing(id, |tm| tm.t_time = t_time);
            self.align_playhead(id, t_time);
        }
        if parent.is_some() {
            self.set_end(id);
        }
        if !skip_uncache {
            self.uncache(parent);
        }
    }

    /// Playhead of `id` derived from its parent's playhead
    pub(crate) fn raw_time(&mut self, id: AnimationId, wrap_repeats: bool) -> f64 {
        let Some(tm) = self.timing(id) else {
            return 0.0;
        };
        let Some(parent) = tm.parent.or(tm.detached_parent) else {
            return tm.t_time;
        };
        if wrap_repeats
            && (tm.ts == 0.0
                || (tm.repeat != 0 && tm.time != 0.0 && self.total_progress_of(id) < 1.0))
        {
            return tm.t_time % (tm.dur + tm.r_delay);
        }
        if tm.ts == 0.0 {
            return tm.t_time;
        }
        let parent_time = self.raw_time(parent, wrap_repeats);
        self.parent_to_child_total_time(parent_time, id)
    }

    /// Full duration of the iterations already completed
    pub(crate) fn elapsed_cycle_duration(&mut self, id: AnimationId) -> f64 {
        let Some(tm) = self.timing(id) else {
            return 0.0;
        };
        if tm.repeat == 0 {
            return 0.0;
        }
        let cycle = self.duration_of(id) + tm.r_delay;
        animation_cycle(tm.t_time, cycle) as f64 * cycle
    }

    pub(crate) fn duration_of(&mut self, id: AnimationId) -> f64 {
        self.total_duration(id);
        self.timing(id).map_or(0.0, |tm| tm.dur)
    }

    pub(crate) fn total_progress_of(&mut self, id: AnimationId) -> f64 {
        let total = self.total_duration(id);
        let Some(tm) = self.timing(id) else {
            return 0.0;
        };
        if total != 0.0 {
            (tm.t_time / tm.t_dur).min(1.0)
        } else if tm.initted && self.raw_time(id, false) >= 0.0 {
            1.0
        } else {
            0.0
        }
    }

    /// Render `id` at a total time of its own
    ///
    /// Tweens that initialize during the pass write their values once the
    /// outermost render returns.
    pub(crate) fn render(&mut self, id: AnimationId, total_time: f64, suppress: bool, force: bool) {
        self.render_depth += 1;
        if self.is_timeline(id) {
            self.render_timeline(id, total_time, suppress, force);
        } else {
            self.render_tween(id, total_time, suppress, force);
        }
        self.render_depth -= 1;
        if self.render_depth == 0 {
            self.flush_lazy();
        }
    }

    /// Move the playhead, keeping the animation in line with its parent
    pub(crate) fn set_total_time_inner(
        &mut self,
        id: AnimationId,
        total_time: f64,
        suppress: bool,
    ) {
        let Some(tm) = self.timing(id) else {
            return;
        };
        if let Some(dp) = tm.detached_parent {
            if tm.ts != 0.0 && self.smooth_child_timing(dp) {
                self.align_playhead(id, total_time);
                if let Some(parent) = self.timing(dp) {
                    if parent.detached_parent.is_some() && parent.parent.is_none() {
                        self.post_add_checks(dp, id);
                    }
                }
                self.realign_ancestors(dp);

                let Some(tm) = self.timing(id) else {
                    return;
                };
                let reattach = (tm.ts > 0.0 && total_time < tm.t_dur)
                    || (tm.ts < 0.0 && total_time > 0.0)
                    || (tm.t_dur == 0.0 && total_time == 0.0);
                if tm.parent.is_none() && self.auto_remove_children(dp) && reattach {
                    debug!("re-attaching {:?} to {:?}", id, dp);
                    self.add_to_timeline(dp, id, tm.start - tm.delay, false);
                }
            }
        }

        let Some(tm) = self.timing(id) else {
            return;
        };
        if tm.t_time != total_time
            || (tm.dur == 0.0 && !suppress)
            || (tm.initted && tm.z_time.abs() == TINY)
            || (total_time == 0.0 && !tm.initted)
        {
            if tm.ts == 0.0 {
                self.update_timing(id, |tm| tm.p_time = total_time);
            }
            self.render(id, total_time, suppress, false);
        }
    }

    /// Bring every ancestor below the root back in line with its parent
    fn realign_ancestors(&mut self, from: AnimationId) {
        let mut current = Some(from);
        while let Some(a) = current {
            let Some(tm) = self.timing(a) else {
                break;
            };
            let Some(grand) = tm.parent else {
                break;
            };
            if tm.ts != 0.0 {
                let offset = if tm.ts > 0.0 {
                    tm.t_time / tm.ts
                } else {
                    (self.total_duration(a) - tm.t_time) / -tm.ts
                };
                let grand_time = self.timing(grand).map_or(0.0, |g| g.time);
                if grand_time != tm.start + offset {
                    self.set_total_time_inner(a, tm.t_time, true);
                }
            }
            current = Some(grand);
        }
    }

    /// Take `id` out of its parent's children
    ///
    /// With `only_if_auto_remove`, only parents that drop finished children
    /// let go.
    pub(crate) fn remove_from_parent(&mut self, id: AnimationId, only_if_auto_remove: bool) {
        if let Some(parent) = self.timing(id).and_then(|tm| tm.parent) {
            if !only_if_auto_remove || self.auto_remove_children(parent) {
                self.remove_child(parent, id);
                if only_if_auto_remove && parent == self.root && self.ticking {
                    self.finished.push(id);
                }
            }
        }
        self.update_timing(id, |tm| tm.active = false);
    }

    /// Release `id` and everything below it
    pub(crate) fn free(&mut self, id: AnimationId) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        match node.kind {
            NodeKind::Tween(mut tween) => {
                tween.flush();
                self.overwrite.unregister(id, tween.targets());
            }
            NodeKind::Timeline(timeline) => {
                for child in timeline.children {
                    self.free(child);
                }
            }
        }
    }

    pub(crate) fn has_paused_ancestor(&self, id: AnimationId) -> bool {
        let mut current = Some(id);
        while let Some(a) = current {
            let Some(tm) = self.timing(a) else {
                break;
            };
            if tm.ts == 0.0 {
                return true;
            }
            current = tm.parent;
        }
        false
    }

    fn require(&self, id: AnimationId) -> Result<Timing> {
        self.timing(id).ok_or(AnimationError::UnknownAnimation(id))
    }
}

// Control API
impl Scheduler {
    /// Whether `id` refers to a live animation
    pub fn contains(&self, id: AnimationId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Play forward from the current position
    pub fn play(&mut self, id: AnimationId) {
        self.set_reversed(id, false);
        self.set_paused(id, false);
    }

    pub fn pause(&mut self, id: AnimationId) {
        self.set_paused(id, true);
    }

    pub fn resume(&mut self, id: AnimationId) {
        self.set_paused(id, false);
    }

    /// Play backward from the current position
    pub fn reverse(&mut self, id: AnimationId) {
        self.set_reversed(id, true);
        self.set_paused(id, false);
    }

    /// Restart from the beginning, optionally replaying the delay
    ///
    /// Events between the old position and the start are not fired.
    pub fn restart(&mut self, id: AnimationId, include_delay: bool) {
        self.play(id);
        let Some(tm) = self.timing(id) else {
            return;
        };
        let target = if include_delay { -tm.delay } else { 0.0 };
        self.set_total_time_inner(id, target, true);
        if self.timing(id).is_some_and(|tm| tm.dur == 0.0) {
            self.update_timing(id, |tm| tm.z_time = -TINY);
        }
    }

    /// Jump to a total time, firing the events crossed on the way
    pub fn seek(&mut self, id: AnimationId, time: f64) {
        self.seek_with(id, time, false);
    }

    pub fn seek_with(&mut self, id: AnimationId, time: f64, suppress_events: bool) {
        if time.is_nan() {
            warn!("ignoring seek of {:?} to NaN", id);
            return;
        }
        self.set_total_time_inner(id, time, suppress_events);
    }

    /// Kill an animation: detach it, fire `on_interrupt` if it had not
    /// finished, and release it with everything it contains
    pub fn kill(&mut self, id: AnimationId) {
        if id == self.root {
            warn!("the root timeline cannot be killed");
            return;
        }
        if !self.contains(id) {
            return;
        }
        let interrupted = self.total_progress_of(id) < 1.0;
        self.remove_from_parent(id, false);
        if interrupted {
            self.fire(id, CallbackKind::Interrupt);
        }
        debug!("killed {:?}", id);
        self.free(id);
    }

    pub fn is_paused(&self, id: AnimationId) -> bool {
        self.timing(id).is_some_and(|tm| tm.paused)
    }

    pub fn set_paused(&mut self, id: AnimationId, paused: bool) {
        let Some(tm) = self.timing(id) else {
            return;
        };
        if tm.paused == paused {
            return;
        }
        if paused {
            let p_time = if tm.t_time != 0.0 {
                tm.t_time
            } else {
                (-tm.delay).max(self.raw_time(id, false))
            };
            self.update_timing(id, |tm| {
                tm.p_time = p_time;
                tm.paused = true;
                tm.ts = 0.0;
                tm.active = false;
            });
        } else {
            self.update_timing(id, |tm| {
                tm.paused = false;
                tm.ts = tm.rts;
            });
            let Some(tm) = self.timing(id) else {
                return;
            };
            let target = match tm.parent {
                Some(parent) if !self.smooth_child_timing(parent) => self.raw_time(id, false),
                _ if tm.t_time != 0.0 => tm.t_time,
                _ => tm.p_time,
            };
            // A finished animation resumed at its end renders once more so
            // its parent can drop it again.
            let at_end = self.progress(id) == 1.0 && tm.z_time.abs() != TINY;
            if at_end {
                self.update_timing(id, |tm| tm.t_time -= TINY);
            }
            self.set_total_time_inner(id, target, at_end);
        }
    }

    pub fn is_reversed(&self, id: AnimationId) -> bool {
        self.timing(id).is_some_and(|tm| tm.rts < 0.0)
    }

    pub fn set_reversed(&mut self, id: AnimationId, reversed: bool) {
        let Some(tm) = self.timing(id) else {
            return;
        };
        if reversed == (tm.rts < 0.0) {
            return;
        }
        let scale = if tm.rts != 0.0 {
            -tm.rts
        } else if reversed {
            -TINY
        } else {
            0.0
        };
        self.set_time_scale(id, scale);
    }

    pub fn time_scale(&self, id: AnimationId) -> f64 {
        self.timing(id)
            .map_or(1.0, |tm| if tm.rts == -TINY { 0.0 } else { tm.rts })
    }

    /// Change the playback rate; negative values play backward
    ///
    /// The playhead stays where it is; under a smooth parent the start time
    /// moves instead.
    pub fn set_time_scale(&mut self, id: AnimationId, scale: f64) {
        let Some(tm) = self.timing(id) else {
            return;
        };
        if tm.rts == scale {
            return;
        }
        let t_time = match tm.parent {
            Some(parent) if tm.ts != 0.0 => {
                let parent_time = self.timing(parent).map_or(0.0, |p| p.time);
                self.parent_to_child_total_time(parent_time, id)
            }
            _ => tm.t_time,
        };
        let scale = if scale.is_nan() { 0.0 } else { scale };
        self.update_timing(id, |tm| {
            tm.rts = scale;
            tm.ts = if tm.paused || scale == -TINY { 0.0 } else { scale };
        });
        let total = self.total_duration(id);
        let delay = tm.delay.abs();
        self.set_total_time_inner(id, t_time.clamp(-delay, total.max(-delay)), true);
        self.set_end(id);
        self.recache_ancestors(id);
    }

    /// Playhead inside the current iteration
    pub fn time(&self, id: AnimationId) -> f64 {
        self.timing(id).map_or(0.0, |tm| tm.time)
    }

    /// Move the playhead inside the current iteration
    pub fn set_time(&mut self, id: AnimationId, time: f64) {
        let elapsed = self.elapsed_cycle_duration(id);
        let total = self.total_duration(id);
        self.set_total_time_inner(id, (time + elapsed).min(total), false);
    }

    /// Playhead across all iterations
    pub fn total_time(&self, id: AnimationId) -> f64 {
        self.timing(id).map_or(0.0, |tm| tm.t_time)
    }

    pub fn set_total_time(&mut self, id: AnimationId, time: f64) {
        self.set_total_time_inner(id, time, false);
    }

    /// Progress through the current iteration, 0 to 1
    ///
    /// Yoyo iterations count backward.
    pub fn progress(&mut self, id: AnimationId) -> f64 {
        let dur = self.duration_of(id);
        let Some(tm) = self.timing(id) else {
            return 0.0;
        };
        if dur != 0.0 {
            (tm.time / tm.dur).min(1.0)
        } else if self.raw_time(id, false) > 0.0 {
            1.0
        } else {
            0.0
        }
    }

    pub fn set_progress(&mut self, id: AnimationId, progress: f64) {
        let Some(tm) = self.timing(id) else {
            return;
        };
        let odd = tm.yoyo && self.iteration(id) % 2 == 1;
        let value = if odd { 1.0 - progress } else { progress };
        let target = self.duration_of(id) * value + self.elapsed_cycle_duration(id);
        self.set_total_time_inner(id, target, false);
    }

    /// Progress across all iterations, 0 to 1
    pub fn total_progress(&mut self, id: AnimationId) -> f64 {
        self.total_progress_of(id)
    }

    pub fn set_total_progress(&mut self, id: AnimationId, progress: f64) {
        let target = self.total_duration(id) * progress;
        self.set_total_time_inner(id, target, false);
    }

    /// Length of one iteration
    ///
    /// For timelines this is the end of the last child.
    pub fn duration(&mut self, id: AnimationId) -> f64 {
        self.duration_of(id)
    }

    /// Change the length of one iteration
    ///
    /// Timelines reach the new length by changing their time scale.
    pub fn set_duration(&mut self, id: AnimationId, duration: f64) {
        let Some(tm) = self.timing(id) else {
            return;
        };
        let duration = sanitize_duration(duration);
        if self.is_timeline(id) {
            let total = if tm.repeat > 0 {
                duration + (duration + tm.r_delay) * tm.repeat as f64
            } else {
                duration
            };
            self.set_total_duration(id, total);
        } else {
            self.update_timing(id, |tm| tm.dirty = false);
            self.set_duration_internal(id, duration, false, false);
        }
    }

    /// Duration of all iterations, repeat delays included
    pub fn total_duration(&mut self, id: AnimationId) -> f64 {
        if self.timing(id).is_some_and(|tm| tm.dirty) && self.is_timeline(id) {
            self.recompute_timeline_duration(id);
        }
        self.timing(id).map_or(0.0, |tm| tm.t_dur)
    }

    pub fn set_total_duration(&mut self, id: AnimationId, total: f64) {
        let Some(tm) = self.timing(id) else {
            return;
        };
        let total = sanitize_duration(total);
        if self.is_timeline(id) {
            if total == 0.0 {
                warn!("cannot squeeze timeline {:?} to zero length", id);
                return;
            }
            let current = if tm.repeat < 0 {
                self.duration_of(id)
            } else {
                self.total_duration(id)
            };
            let scale = if tm.rts < 0.0 { -total } else { total };
            self.set_time_scale(id, current / scale);
        } else {
            let per_iteration = if tm.repeat < 0 {
                total
            } else {
                (total - tm.repeat as f64 * tm.r_delay) / (tm.repeat + 1) as f64
            };
            self.update_timing(id, |tm| tm.dirty = false);
            self.set_duration_internal(id, per_iteration.max(0.0), false, false);
        }
    }

    pub fn delay(&self, id: AnimationId) -> f64 {
        self.timing(id).map_or(0.0, |tm| tm.delay)
    }

    pub fn set_delay(&mut self, id: AnimationId, delay: f64) {
        let Some(tm) = self.timing(id) else {
            return;
        };
        if tm.parent.is_some_and(|p| self.smooth_child_timing(p)) {
            self.set_start_time(id, tm.start + delay - tm.delay);
        }
        self.update_timing(id, |tm| tm.delay = delay);
    }

    /// Start on the parent's timeline, delay included
    pub fn start_time(&self, id: AnimationId) -> f64 {
        self.timing(id).map_or(0.0, |tm| tm.start)
    }

    pub fn set_start_time(&mut self, id: AnimationId, start: f64) {
        let Some(tm) = self.timing(id) else {
            return;
        };
        self.update_timing(id, |tm| tm.start = start);
        match tm.parent.or(tm.detached_parent) {
            Some(parent) if tm.parent.is_none() || self.sorts_children(parent) => {
                self.add_to_timeline(parent, id, start - tm.delay, false);
            }
            Some(parent) => {
                self.set_end(id);
                self.uncache(Some(parent));
            }
            None => {}
        }
    }

    /// End on the parent's timeline
    pub fn end_time(&mut self, id: AnimationId, include_repeats: bool) -> f64 {
        let span = if include_repeats {
            self.total_duration(id)
        } else {
            self.duration_of(id)
        };
        self.timing(id).map_or(0.0, |tm| {
            let scale = if tm.ts != 0.0 { tm.ts.abs() } else { 1.0 };
            tm.start + span / scale
        })
    }

    /// Current iteration, 0-based
    pub fn iteration(&mut self, id: AnimationId) -> i64 {
        let Some(tm) = self.timing(id) else {
            return 0;
        };
        if tm.repeat == 0 {
            return 0;
        }
        let cycle = self.duration_of(id) + tm.r_delay;
        animation_cycle(tm.t_time, cycle)
    }

    /// Whether the parent's playhead is currently inside this animation
    pub fn is_active(&mut self, id: AnimationId) -> bool {
        let Some(tm) = self.timing(id) else {
            return false;
        };
        let Some(parent) = tm.parent.or(tm.detached_parent) else {
            return true;
        };
        if tm.ts == 0.0 || !tm.initted || !self.is_active(parent) {
            return false;
        }
        let raw = self.raw_time(parent, true);
        raw >= tm.start && raw < self.end_time(id, true) - TINY
    }

    /// Timeline `id` currently sits in
    pub fn parent(&self, id: AnimationId) -> Option<AnimationId> {
        self.timing(id).and_then(|tm| tm.parent)
    }

    /// Map a time on the parent's timeline to this animation's total time
    pub fn parent_to_local(&mut self, id: AnimationId, parent_time: f64) -> Result<f64> {
        self.require(id)?;
        Ok(self.parent_to_child_total_time(parent_time, id))
    }

    /// Map a total time of this animation back onto the parent's timeline
    pub fn local_to_parent(&mut self, id: AnimationId, local_time: f64) -> Result<f64> {
        let tm = self.require(id)?;
        if tm.ts == 0.0 {
            return Ok(tm.start);
        }
        let local = if tm.ts >= 0.0 {
            local_time
        } else {
            local_time - self.total_duration(id)
        };
        Ok(tm.start + local / tm.ts)
    }

    /// First live animation with this name
    pub fn find_by_name(&self, name: &str) -> Option<AnimationId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name.as_deref() == Some(name))
            .map(|(id, _)| id)
    }

    pub fn name(&self, id: AnimationId) -> Option<&str> {
        self.nodes.get(id).and_then(|node| node.name.as_deref())
    }

    pub fn repeat(&self, id: AnimationId) -> i64 {
        self.timing(id).map_or(0, |tm| tm.repeat)
    }

    pub fn yoyo(&self, id: AnimationId) -> bool {
        self.timing(id).is_some_and(|tm| tm.yoyo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_precise() {
        assert_eq!(round_precise(0.1 + 0.2), 0.3);
        assert_eq!(round_precise(-0.0), 0.0);
        assert_eq!(round_precise(f64::NAN), 0.0);
    }

    #[test]
    fn test_cycle_boundaries_belong_to_previous_iteration() {
        assert_eq!(animation_cycle(0.0, 1.0), 0);
        assert_eq!(animation_cycle(0.5, 1.0), 0);
        assert_eq!(animation_cycle(1.0, 1.0), 0);
        assert_eq!(animation_cycle(1.5, 1.0), 1);
        assert_eq!(animation_cycle(2.0, 1.0), 1);
        assert_eq!(animation_cycle(3.0, 0.0), 0);
    }

    #[test]
    fn test_total_span() {
        assert_eq!(total_span(2.0, 0, 0.5), 2.0);
        assert_eq!(total_span(2.0, 2, 0.5), 7.0);
        assert_eq!(total_span(2.0, -1, 0.0), INFINITE_DURATION);
    }

    #[test]
    fn test_timing_drops_repeat_settings_without_repeat() {
        let tm = Timing::new(0.0, 1.0, 0, 0.5, true);
        assert_eq!(tm.r_delay, 0.0);
        assert!(!tm.yoyo);
        assert_eq!(tm.t_dur, 1.0);

        let tm = Timing::new(0.0, 1.0, 1, 0.5, true);
        assert_eq!(tm.t_dur, 2.5);
        assert!(tm.yoyo);
    }

    #[test]
    fn test_sanitize_duration() {
        assert_eq!(sanitize_duration(-1.0), 0.0);
        assert_eq!(sanitize_duration(f64::NAN), 0.0);
        assert_eq!(sanitize_duration(1.5), 1.5);
    }
}
