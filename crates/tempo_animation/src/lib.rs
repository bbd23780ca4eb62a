//! Tempo Animation
//!
//! A hierarchical animation scheduler on virtual time.
//!
//! # Features
//!
//! - **Tweens**: interpolate numeric and string properties of any
//!   [`Target`](tempo_core::Target), with relative values (`"+=10"`)
//! - **Timelines**: nest tweens and timelines, place them with position
//!   expressions (`"<"`, `"-=0.5"`, `"intro+=1"`) and labels
//! - **Easing**: the standard families, `steps(n)`, `cubicBezier(...)` and
//!   custom functions
//! - **Repeat and yoyo**: with repeat delays and a separate yoyo ease
//! - **Overwriting**: new tweens take properties away from running ones
//! - **Ticker**: frame pacing with lag smoothing, driven by a real or a
//!   manual clock
//!
//! # Example
//!
//! ```rust
//! use tempo_animation::{Scheduler, TimelineVars, TweenVars};
//! use tempo_core::{PropertyBag, Target};
//!
//! let mut scheduler = Scheduler::new();
//! let a = Target::new(PropertyBag::new().with("x", 0.0));
//! let b = Target::new(PropertyBag::new().with("x", 0.0));
//!
//! let tl = scheduler.timeline(TimelineVars::new());
//! scheduler.timeline_to(tl, &a, TweenVars::new().prop("x", 1.0).duration(1.0).ease("linear")).unwrap();
//! scheduler.timeline_to(tl, &b, TweenVars::new().prop("x", 1.0).duration(1.0).ease("linear")).unwrap();
//! assert_eq!(scheduler.duration(tl), 2.0);
//!
//! scheduler.seek(tl, 1.5);
//! assert_eq!(a.get_number("x"), Some(1.0));
//! assert_eq!(b.get_number("x"), Some(0.5));
//! ```

pub mod animation;
pub mod callback;
pub mod config;
pub mod easing;
pub mod error;
pub mod handle;
pub mod interpolate;
pub mod overwrite;
pub mod plugin;
pub mod position;
pub mod prop_tween;
pub mod scheduler;
pub mod ticker;
pub mod timeline;
pub mod tween;
pub mod vars;

pub use animation::AnimationId;
pub use callback::{Callback, CallbackKind, Callbacks};
pub use config::{EngineConfig, TweenDefaults};
pub use easing::{Ease, EaseDirection, EaseRegistry, EaseSpec, Easing};
pub use error::{AnimationError, Result};
pub use handle::{shared, AnimationHandle, SchedulerHandle, SharedScheduler};
pub use interpolate::{RelativeOp, StringInterpolator, TweenValue};
pub use plugin::{AliasPlugin, PluginContext, PluginRegistry, TweenPlugin};
pub use position::{Offset, Position};
pub use prop_tween::{Endpoints, PropTween};
pub use scheduler::{ListenerId, Scheduler, TickListener};
pub use ticker::{
    Clock, FrameInfo, FrameSource, IntervalTimer, ManualClock, MonotonicClock, SimulatedFrames,
    Ticker,
};
pub use tween::IntoTargets;
pub use vars::{ChildDefaults, Overwrite, Repeat, Stagger, StaggerFrom, TimelineVars, TweenVars};
