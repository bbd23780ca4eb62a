//! Lifecycle callbacks
//!
//! Callbacks receive the scheduler and the id of the animation that fired
//! them, so they can freely create, seek or kill animations (including the
//! one that is firing). While a callback runs it is taken out of its slot;
//! it is put back afterwards unless the animation was killed or the slot was
//! refilled in the meantime.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::animation::AnimationId;
use crate::scheduler::Scheduler;

/// A user callback
pub type Callback = Box<dyn FnMut(&mut Scheduler, AnimationId)>;

/// Which lifecycle event a callback is attached to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    /// The playhead left the start moving forward
    Start,
    /// Every render that changed the animation's time
    Update,
    /// The playhead reached the end moving forward
    Complete,
    /// The playhead reached the start moving backward
    ReverseComplete,
    /// An iteration boundary was crossed
    Repeat,
    /// The animation was killed before finishing
    Interrupt,
}

/// Callback slots of one animation
#[derive(Default)]
pub struct Callbacks {
    on_start: Option<Callback>,
    on_update: Option<Callback>,
    on_complete: Option<Callback>,
    on_reverse_complete: Option<Callback>,
    on_repeat: Option<Callback>,
    on_interrupt: Option<Callback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn slot(&mut self, kind: CallbackKind) -> &mut Option<Callback> {
        match kind {
            CallbackKind::Start => &mut self.on_start,
            CallbackKind::Update => &mut self.on_update,
            CallbackKind::Complete => &mut self.on_complete,
            CallbackKind::ReverseComplete => &mut self.on_reverse_complete,
            CallbackKind::Repeat => &mut self.on_repeat,
            CallbackKind::Interrupt => &mut self.on_interrupt,
        }
    }

    pub fn set(&mut self, kind: CallbackKind, callback: Callback) {
        *self.slot(kind) = Some(callback);
    }

    pub fn clear(&mut self, kind: CallbackKind) {
        *self.slot(kind) = None;
    }

    pub fn has(&self, kind: CallbackKind) -> bool {
        match kind {
            CallbackKind::Start => self.on_start.is_some(),
            CallbackKind::Update => self.on_update.is_some(),
            CallbackKind::Complete => self.on_complete.is_some(),
            CallbackKind::ReverseComplete => self.on_reverse_complete.is_some(),
            CallbackKind::Repeat => self.on_repeat.is_some(),
            CallbackKind::Interrupt => self.on_interrupt.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        [
            CallbackKind::Start,
            CallbackKind::Update,
            CallbackKind::Complete,
            CallbackKind::ReverseComplete,
            CallbackKind::Repeat,
            CallbackKind::Interrupt,
        ]
        .into_iter()
        .all(|kind| !self.has(kind))
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_start", &self.on_start.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_reverse_complete", &self.on_reverse_complete.is_some())
            .field("on_repeat", &self.on_repeat.is_some())
            .field("on_interrupt", &self.on_interrupt.is_some())
            .finish()
    }
}

/// Split one callback into two slots that share it
///
/// Used by delayed calls, which fire the same function whichever direction
/// the playhead crosses them in.
pub(crate) fn shared_pair(callback: Callback) -> (Callback, Callback) {
    let shared = Rc::new(RefCell::new(callback));
    let other = shared.clone();
    let first: Callback = Box::new(move |scheduler, id| {
        if let Ok(mut cb) = shared.try_borrow_mut() {
            cb(scheduler, id);
        }
    });
    let second: Callback = Box::new(move |scheduler, id| {
        if let Ok(mut cb) = other.try_borrow_mut() {
            cb(scheduler, id);
        }
    });
    (first, second)
}

impl Scheduler {
    /// Invoke one callback of `id`
    pub(crate) fn fire(&mut self, id: AnimationId, kind: CallbackKind) {
        let Some(mut callback) = self
            .nodes
            .get_mut(id)
            .and_then(|node| node.callbacks.slot(kind).take())
        else {
            return;
        };

        callback(self, id);

        if let Some(node) = self.nodes.get_mut(id) {
            let slot = node.callbacks.slot(kind);
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }

    /// Attach or replace a callback on an existing animation
    pub fn set_callback(
        &mut self,
        id: AnimationId,
        kind: CallbackKind,
        callback: impl FnMut(&mut Scheduler, AnimationId) + 'static,
    ) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.callbacks.set(kind, Box::new(callback));
        }
    }

    pub fn clear_callback(&mut self, id: AnimationId, kind: CallbackKind) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.callbacks.clear(kind);
        }
    }
}
