//! Shared ownership of a scheduler
//!
//! UI code usually keeps the scheduler in one place and hands out weak
//! handles. A handle never keeps the scheduler alive, and a call made while
//! the scheduler is already borrowed (from inside one of its own callbacks)
//! returns `None` instead of panicking.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::animation::AnimationId;
use crate::scheduler::Scheduler;

/// Owning, shareable scheduler
pub type SharedScheduler = Rc<RefCell<Scheduler>>;

pub fn shared(scheduler: Scheduler) -> SharedScheduler {
    Rc::new(RefCell::new(scheduler))
}

/// Weak reference to a [`SharedScheduler`]
#[derive(Clone, Debug, Default)]
pub struct SchedulerHandle {
    inner: Weak<RefCell<Scheduler>>,
}

impl SchedulerHandle {
    pub fn new(scheduler: &SharedScheduler) -> Self {
        Self {
            inner: Rc::downgrade(scheduler),
        }
    }

    /// Run `f` on the scheduler if it is alive and not borrowed
    pub fn with<R>(&self, f: impl FnOnce(&mut Scheduler) -> R) -> Option<R> {
        let scheduler = self.inner.upgrade()?;
        let mut guard = scheduler.try_borrow_mut().ok()?;
        Some(f(&mut guard))
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Handle for one animation of this scheduler
    pub fn animation(&self, id: AnimationId) -> AnimationHandle {
        AnimationHandle {
            id,
            scheduler: self.clone(),
        }
    }
}

/// Controls one animation through a [`SchedulerHandle`]
///
/// Every call is a no-op (returning `None` or `false`) once the scheduler is
/// gone or while it is busy.
#[derive(Clone, Debug)]
pub struct AnimationHandle {
    id: AnimationId,
    scheduler: SchedulerHandle,
}

impl AnimationHandle {
    pub fn id(&self) -> AnimationId {
        self.id
    }

    /// Whether the animation still exists
    pub fn is_alive(&self) -> bool {
        self.scheduler.with(|s| s.contains(self.id)).unwrap_or(false)
    }

    pub fn play(&self) -> bool {
        self.scheduler.with(|s| s.play(self.id)).is_some()
    }

    pub fn pause(&self) -> bool {
        self.scheduler.with(|s| s.pause(self.id)).is_some()
    }

    pub fn resume(&self) -> bool {
        self.scheduler.with(|s| s.resume(self.id)).is_some()
    }

    pub fn reverse(&self) -> bool {
        self.scheduler.with(|s| s.reverse(self.id)).is_some()
    }

    pub fn restart(&self) -> bool {
        self.scheduler.with(|s| s.restart(self.id, false)).is_some()
    }

    pub fn seek(&self, time: f64) -> bool {
        self.scheduler.with(|s| s.seek(self.id, time)).is_some()
    }

    pub fn kill(&self) -> bool {
        self.scheduler.with(|s| s.kill(self.id)).is_some()
    }

    pub fn progress(&self) -> Option<f64> {
        self.scheduler.with(|s| s.progress(self.id))
    }

    pub fn set_progress(&self, progress: f64) -> bool {
        self.scheduler
            .with(|s| s.set_progress(self.id, progress))
            .is_some()
    }

    pub fn time_scale(&self) -> Option<f64> {
        self.scheduler.with(|s| s.time_scale(self.id))
    }

    pub fn set_time_scale(&self, scale: f64) -> bool {
        self.scheduler
            .with(|s| s.set_time_scale(self.id, scale))
            .is_some()
    }

    pub fn is_active(&self) -> bool {
        self.scheduler.with(|s| s.is_active(self.id)).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::TweenVars;
    use tempo_core::{PropertyBag, Target};

    #[test]
    fn test_handle_controls_animation() {
        let scheduler = shared(Scheduler::new());
        let handle = SchedulerHandle::new(&scheduler);
        let target = Target::new(PropertyBag::new().with("x", 0.0));

        let id = handle
            .with(|s| s.to(&target, TweenVars::new().prop("x", 10.0).duration(1.0).ease("linear")))
            .unwrap();
        let tween = handle.animation(id);

        assert!(tween.seek(0.5));
        assert_eq!(target.get_number("x"), Some(5.0));
        assert_eq!(tween.progress(), Some(0.5));
    }

    #[test]
    fn test_handle_is_inert_while_borrowed_or_dropped() {
        let scheduler = shared(Scheduler::new());
        let handle = SchedulerHandle::new(&scheduler);

        {
            let _busy = scheduler.borrow_mut();
            assert!(handle.with(|_| ()).is_none());
        }
        assert!(handle.with(|_| ()).is_some());

        drop(scheduler);
        assert!(!handle.is_alive());
        assert!(handle.with(|_| ()).is_none());
    }
}
