//! Animation scheduler
//!
//! The [`Scheduler`] is the context every animation lives in: the node arena,
//! the root timeline, the ease/accessor/plugin registries, the overwrite
//! index and the ticker. There are no globals; tests and applications create
//! as many schedulers as they need.

use slotmap::{new_key_type, SlotMap};
use tempo_core::AccessorRegistry;
use tracing::{debug, warn};

use crate::animation::{AnimationId, Node, NodeKind, Timing};
use crate::config::EngineConfig;
use crate::easing::{EaseRegistry, EaseSpec};
use crate::overwrite::OverwriteIndex;
use crate::plugin::{PluginRegistry, TweenPlugin};
use crate::ticker::{Clock, FrameInfo, FrameSource, MonotonicClock, Ticker};
use crate::timeline::TimelineState;
use crate::tween::{IntoTargets, TweenKind};
use crate::vars::{ChildDefaults, TimelineVars, TweenVars};

new_key_type! {
    /// Identifies a tick listener
    pub struct ListenerId;
}

/// Called after the root timeline rendered a frame
pub type TickListener = Box<dyn FnMut(&mut Scheduler, FrameInfo)>;

/// Owns and drives every tween and timeline
pub struct Scheduler {
    pub(crate) nodes: SlotMap<AnimationId, Node>,
    pub(crate) root: AnimationId,
    pub(crate) eases: EaseRegistry,
    pub(crate) accessors: AccessorRegistry,
    pub(crate) plugins: PluginRegistry,
    pub(crate) overwrite: OverwriteIndex,
    /// Nesting of `render` calls; the pass ends when it drops back to 0
    pub(crate) render_depth: u32,
    /// Tweens initialized during the current pass, values not yet written
    pub(crate) lazy: Vec<AnimationId>,
    pub(crate) ticking: bool,
    /// Animations the root dropped during the current tick
    pub(crate) finished: Vec<AnimationId>,
    ticker: Ticker,
    listeners: SlotMap<ListenerId, Option<TickListener>>,
    config: EngineConfig,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }

    /// Build a scheduler on a specific clock, such as a
    /// [`ManualClock`](crate::ManualClock) in tests
    pub fn with_clock(config: EngineConfig, clock: impl Clock + 'static) -> Self {
        let ticker = Ticker::new(clock, &config);
        let eases = EaseRegistry::new();
        if !eases.contains(&config.defaults.ease) {
            warn!("default ease '{}' is unknown", config.defaults.ease);
        }

        let mut nodes = SlotMap::with_key();
        let mut root_vars = TimelineVars::new()
            .smooth_child_timing(true)
            .auto_remove_children(true)
            .defaults(ChildDefaults {
                duration: Some(config.defaults.duration),
                ease: Some(EaseSpec::from(config.defaults.ease.as_str())),
                overwrite: Some(config.defaults.overwrite),
            });
        let mut state = TimelineState::new(&mut root_vars);
        state.sort = false;
        let mut timing = Timing::new(0.0, 0.0, 0, 0.0, false);
        timing.initted = true;
        let root = nodes.insert(Node::new(timing, NodeKind::Timeline(state)));

        debug!("scheduler created ({} fps)", config.fps);
        Self {
            nodes,
            root,
            eases,
            accessors: AccessorRegistry::new(),
            plugins: PluginRegistry::new(),
            overwrite: OverwriteIndex::default(),
            render_depth: 0,
            lazy: Vec::new(),
            ticking: false,
            finished: Vec::new(),
            ticker,
            listeners: SlotMap::with_key(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The timeline every top-level animation is placed on
    pub fn root(&self) -> AnimationId {
        self.root
    }

    pub fn eases(&self) -> &EaseRegistry {
        &self.eases
    }

    pub fn eases_mut(&mut self) -> &mut EaseRegistry {
        &mut self.eases
    }

    pub fn accessors_mut(&mut self) -> &mut AccessorRegistry {
        &mut self.accessors
    }

    pub fn register_plugin(&mut self, plugin: impl TweenPlugin + 'static) {
        self.plugins.register(plugin);
    }

    pub fn unregister_plugin(&mut self, name: &str) -> bool {
        self.plugins.unregister(name)
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn ticker_mut(&mut self) -> &mut Ticker {
        &mut self.ticker
    }

    pub fn set_frame_source(&mut self, source: impl FrameSource + 'static) {
        self.ticker.set_frame_source(source);
    }

    /// Number of live tweens and timelines, the root included
    pub fn animation_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// Construction
impl Scheduler {
    /// Tween `targets` from their current values to the given ones
    ///
    /// ```rust
    /// use tempo_animation::{Scheduler, TweenVars};
    /// use tempo_core::{PropertyBag, Target};
    ///
    /// let mut scheduler = Scheduler::new();
    /// let ball = Target::new(PropertyBag::new().with("x", 0.0));
    /// let tween = scheduler.to(&ball, TweenVars::new().prop("x", 100.0).duration(2.0).ease("linear"));
    ///
    /// scheduler.seek(tween, 1.0);
    /// assert_eq!(ball.get_number("x"), Some(50.0));
    /// ```
    pub fn to(&mut self, targets: impl IntoTargets, vars: TweenVars) -> AnimationId {
        self.create_tween(self.root, targets.into_targets(), vars, TweenKind::To, false)
    }

    /// Tween `targets` from the given values back to their current ones
    pub fn from(&mut self, targets: impl IntoTargets, vars: TweenVars) -> AnimationId {
        self.create_tween(self.root, targets.into_targets(), vars, TweenKind::From, false)
    }

    /// Tween between explicit start values (`from`) and end values (`to`);
    /// timing comes from `to`
    pub fn from_to(
        &mut self,
        targets: impl IntoTargets,
        from: TweenVars,
        to: TweenVars,
    ) -> AnimationId {
        let kind = TweenKind::FromTo(from.props);
        self.create_tween(self.root, targets.into_targets(), to, kind, false)
    }

    /// Apply values immediately through a zero-length tween
    pub fn set(&mut self, targets: impl IntoTargets, vars: TweenVars) -> AnimationId {
        self.create_tween(self.root, targets.into_targets(), vars, TweenKind::Set, false)
    }

    /// Create a timeline on the root
    pub fn timeline(&mut self, vars: TimelineVars) -> AnimationId {
        self.create_timeline(self.root, vars)
    }

    /// Call `callback` once `delay` seconds from now
    pub fn delayed_call(
        &mut self,
        delay: f64,
        callback: impl FnMut(&mut Scheduler, AnimationId) + 'static,
    ) -> AnimationId {
        self.create_delayed_call(self.root, delay, None, callback)
    }
}

// Frame loop
impl Scheduler {
    /// Advance the ticker and render the root timeline when a frame is due
    ///
    /// A manual tick always renders. Top-level animations that finish
    /// during the frame are released before the listeners run.
    pub fn tick(&mut self, manual: bool) -> Option<FrameInfo> {
        let frame = self.ticker.tick(manual)?;
        if let Some(root) = self.timing(self.root) {
            if root.ts != 0.0 {
                let time = (frame.time - root.start) * root.ts;
                self.ticking = true;
                self.render(self.root, time, false, false);
                self.ticking = false;
            }
        }
        self.release_finished();
        self.dispatch_listeners(frame);
        Some(frame)
    }

    /// Register a callback run after every rendered frame
    pub fn add_tick_listener(
        &mut self,
        listener: impl FnMut(&mut Scheduler, FrameInfo) + 'static,
    ) -> ListenerId {
        self.listeners.insert(Some(Box::new(listener)))
    }

    pub fn remove_tick_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id).is_some()
    }

    /// Free what the root dropped this frame unless a callback put it back
    fn release_finished(&mut self) {
        let mut released = 0;
        for id in std::mem::take(&mut self.finished) {
            if self.timing(id).is_some_and(|tm| tm.parent.is_none()) {
                self.free(id);
                released += 1;
            }
        }
        if released > 0 {
            debug!("released {} finished animations", released);
        }
    }

    /// Write the values of every tween that initialized during the pass
    pub(crate) fn flush_lazy(&mut self) {
        for id in std::mem::take(&mut self.lazy) {
            if let Some(tween) = self.nodes.get_mut(id).and_then(Node::tween_mut) {
                tween.flush();
            }
        }
    }

    fn dispatch_listeners(&mut self, frame: FrameInfo) {
        let ids: Vec<ListenerId> = self.listeners.keys().collect();
        for id in ids {
            let Some(mut listener) = self.listeners.get_mut(id).and_then(Option::take) else {
                continue;
            };
            listener(self, frame);
            // a listener that removed itself stays removed
            if let Some(slot) = self.listeners.get_mut(id) {
                *slot = Some(listener);
            }
        }
    }

    /// Speed up or slow down everything on the root
    ///
    /// The root's playhead stays where it is.
    pub fn set_global_time_scale(&mut self, scale: f64) {
        let scale = if scale.is_finite() { scale.max(0.0) } else { 1.0 };
        let now = self.ticker.time();
        let root = self.root;
        self.update_timing(root, |tm| {
            if scale != 0.0 {
                tm.start = now - tm.t_time / scale;
            }
            tm.ts = scale;
            tm.rts = scale;
        });
    }

    pub fn global_time_scale(&self) -> f64 {
        self.timing(self.root).map_or(1.0, |tm| tm.rts)
    }

    /// Drive the ticker through its frame source until `done` returns true
    ///
    /// Returns the number of frames rendered. The frame source is released
    /// when the loop ends.
    pub fn run_until(&mut self, mut done: impl FnMut(&mut Scheduler) -> bool) -> u64 {
        self.ticker.start();
        let mut frames = 0;
        while !done(self) {
            if let Err(err) = self.ticker.wait_for_frame() {
                warn!("frame loop stopped: {}", err);
                break;
            }
            if self.tick(false).is_some() {
                frames += 1;
            }
        }
        self.ticker.stop();
        frames
    }

    /// Release animations that were detached from every timeline
    ///
    /// Ticks release the top-level animations they finish. Animations
    /// removed by hand, or finished by seeking outside a tick, stay
    /// addressable until this is called.
    pub fn prune_detached(&mut self) -> usize {
        let detached: Vec<AnimationId> = self
            .nodes
            .iter()
            .filter(|(id, node)| *id != self.root && node.timing.parent.is_none())
            .map(|(id, _)| id)
            .collect();
        let count = detached.len();
        for id in detached {
            self.free(id);
        }
        if count > 0 {
            debug!("pruned {} detached animations", count);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticker::ManualClock;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use tempo_core::{PropertyBag, Target};

    fn scheduler() -> (Scheduler, ManualClock) {
        let clock = ManualClock::new();
        let config = EngineConfig {
            lag_threshold: 0.0,
            ..EngineConfig::default()
        };
        (Scheduler::with_clock(config, clock.clone()), clock)
    }

    #[test]
    fn test_ticks_render_the_root() {
        let (mut scheduler, clock) = scheduler();
        let target = Target::new(PropertyBag::new().with("x", 0.0));
        scheduler.to(&target, TweenVars::new().prop("x", 10.0).duration(1.0).ease("linear"));

        clock.advance(0.5);
        scheduler.tick(true);
        assert_eq!(target.get_number("x"), Some(5.0));

        clock.advance(0.5);
        scheduler.tick(true);
        assert_eq!(target.get_number("x"), Some(10.0));
    }

    #[test]
    fn test_listener_can_remove_itself() {
        let (mut scheduler, clock) = scheduler();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let own_id: Rc<Cell<Option<ListenerId>>> = Rc::default();

        let log = seen.clone();
        let own = own_id.clone();
        let id = scheduler.add_tick_listener(move |s, frame| {
            log.borrow_mut().push(frame.frame);
            if frame.frame == 2 {
                if let Some(id) = own.get() {
                    s.remove_tick_listener(id);
                }
            }
        });
        own_id.set(Some(id));

        for _ in 0..3 {
            clock.advance(0.1);
            scheduler.tick(true);
        }
        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert!(!scheduler.remove_tick_listener(id));
    }

    #[test]
    fn test_global_time_scale_keeps_the_playhead() {
        let (mut scheduler, clock) = scheduler();
        let target = Target::new(PropertyBag::new().with("x", 0.0));
        scheduler.to(&target, TweenVars::new().prop("x", 100.0).duration(4.0).ease("linear"));

        clock.advance(1.0);
        scheduler.tick(true);
        assert_eq!(target.get_number("x"), Some(25.0));

        scheduler.set_global_time_scale(2.0);
        clock.advance(1.0);
        scheduler.tick(true);
        assert_eq!(target.get_number("x"), Some(75.0));
    }

    #[test]
    fn test_ticks_release_finished_tweens() {
        let (mut scheduler, clock) = scheduler();
        let target = Target::new(PropertyBag::new().with("x", 0.0));
        let tween = scheduler.to(&target, TweenVars::new().prop("x", 1.0).duration(0.5));

        clock.advance(1.0);
        scheduler.tick(true);
        assert!(!scheduler.contains(tween));
        assert_eq!(target.get_number("x"), Some(1.0));
        assert_eq!(scheduler.animation_count(), 1);
        assert!(scheduler.tweens_of(&target, false).is_empty());
    }

    #[test]
    fn test_prune_detached_releases_seeked_tweens() {
        let (mut scheduler, _clock) = scheduler();
        let target = Target::new(PropertyBag::new().with("x", 0.0));
        let tween = scheduler.to(&target, TweenVars::new().prop("x", 1.0).duration(0.5));

        scheduler.seek(tween, 0.5);
        assert!(scheduler.contains(tween));
        assert_eq!(scheduler.parent(tween), None);

        assert_eq!(scheduler.prune_detached(), 1);
        assert!(!scheduler.contains(tween));
        assert_eq!(scheduler.animation_count(), 1);
    }

    #[test]
    fn test_callback_can_restart_a_finished_tween() {
        let (mut scheduler, clock) = scheduler();
        let target = Target::new(PropertyBag::new().with("x", 0.0));
        let restarts = Rc::new(Cell::new(0));
        let count = restarts.clone();
        let tween = scheduler.to(
            &target,
            TweenVars::new()
                .prop("x", 1.0)
                .duration(0.5)
                .on_complete(move |s, id| {
                    if count.get() == 0 {
                        count.set(1);
                        s.restart(id, false);
                    }
                }),
        );

        clock.advance(1.0);
        scheduler.tick(true);
        assert_eq!(restarts.get(), 1);
        assert!(scheduler.contains(tween));
        assert_eq!(scheduler.parent(tween), Some(scheduler.root()));
    }
}
