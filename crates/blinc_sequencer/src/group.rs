//! Call groups and lifecycle callbacks
//!
//! Every `animate` creates one group: the calls for each target share its
//! options, so `begin` fires once for the first call to start and
//! `complete` fires once when the last member retires.

use slotmap::new_key_type;
use smallvec::SmallVec;
use std::fmt;

use crate::call::CallId;
use crate::easing::Easing;
use crate::element::ElementId;
use crate::queue::Queue;
use crate::scheduler::AnimationScheduler;
use crate::tween::Tween;

new_key_type! {
    /// Handle to a group of calls created together
    pub struct GroupId;
}

/// Result returned by lifecycle callbacks
pub type CallbackResult = anyhow::Result<()>;

/// Fired once, when the first call of the group starts
pub type BeginFn = Box<dyn FnOnce(&mut AnimationScheduler, &[ElementId]) -> CallbackResult>;

/// Fired once, when the last call of the group completes
pub type CompleteFn = Box<dyn FnOnce(&mut AnimationScheduler, &[ElementId]) -> CallbackResult>;

/// Fired every frame the group's first call advances
pub type ProgressFn = Box<dyn FnMut(&mut AnimationScheduler, &Progress<'_>) -> CallbackResult>;

/// Resolution callback chained on a group's completion
pub type Waiter = Box<dyn FnOnce(&mut AnimationScheduler, &[ElementId])>;

/// Snapshot passed to progress callbacks
#[derive(Clone, Copy, Debug)]
pub struct Progress<'a> {
    pub elements: &'a [ElementId],
    pub call: CallId,
    /// 0.0 to 1.0
    pub percent: f64,
    pub remaining_ms: f64,
    pub time_start: f64,
}

/// Which lifecycle callback failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hook {
    Begin,
    Progress,
    Complete,
}

/// A callback error, reported to the host instead of aborting traversal
#[derive(Debug)]
pub struct CallbackFailure {
    pub hook: Hook,
    pub group: GroupId,
    pub error: anyhow::Error,
}

/// Options shared by every call of one `animate`
#[derive(Default)]
pub struct AnimationOptions {
    pub(crate) queue: Option<Queue>,
    pub(crate) duration_ms: Option<f64>,
    pub(crate) delay_ms: Option<f64>,
    pub(crate) easing: Option<Easing>,
    pub(crate) begin: Option<BeginFn>,
    pub(crate) progress: Option<ProgressFn>,
    pub(crate) complete: Option<CompleteFn>,
}

impl AnimationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue lane for the group; `Queue::Unqueued` runs immediately
    pub fn queue(mut self, queue: impl Into<Queue>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn duration(mut self, ms: f64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn delay(mut self, ms: f64) -> Self {
        self.delay_ms = Some(ms);
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn on_begin<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut AnimationScheduler, &[ElementId]) -> CallbackResult + 'static,
    {
        self.begin = Some(Box::new(f));
        self
    }

    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut AnimationScheduler, &Progress<'_>) -> CallbackResult + 'static,
    {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut AnimationScheduler, &[ElementId]) -> CallbackResult + 'static,
    {
        self.complete = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for AnimationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationOptions")
            .field("queue", &self.queue)
            .field("duration_ms", &self.duration_ms)
            .field("delay_ms", &self.delay_ms)
            .field("easing", &self.easing)
            .field("begin", &self.begin.is_some())
            .field("progress", &self.progress.is_some())
            .field("complete", &self.complete.is_some())
            .finish()
    }
}

/// Per-target plan used by `animate_each`
#[derive(Clone, Debug, Default)]
pub struct CallPlan {
    pub(crate) tweens: Vec<Tween>,
    pub(crate) queue: Option<Queue>,
    pub(crate) duration_ms: Option<f64>,
    pub(crate) delay_ms: Option<f64>,
    pub(crate) easing: Option<Easing>,
}

impl CallPlan {
    pub fn new(tweens: Vec<Tween>) -> Self {
        Self {
            tweens,
            ..Self::default()
        }
    }

    /// Queue override for this call only
    pub fn queue(mut self, queue: impl Into<Queue>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn duration(mut self, ms: f64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn delay(mut self, ms: f64) -> Self {
        self.delay_ms = Some(ms);
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }
}

/// Shared state of one group
pub(crate) struct Group {
    pub(crate) options: AnimationOptions,
    pub(crate) elements: SmallVec<[ElementId; 4]>,
    pub(crate) total: usize,
    /// Members that have begun; only ever increments
    pub(crate) started: usize,
    pub(crate) completed: usize,
    /// First member to start, the context for `begin` and `progress`
    pub(crate) first: Option<CallId>,
    pub(crate) waiters: Vec<Waiter>,
}

impl Group {
    pub(crate) fn new(options: AnimationOptions, elements: SmallVec<[ElementId; 4]>) -> Self {
        Self {
            options,
            total: elements.len(),
            elements,
            started: 0,
            completed: 0,
            first: None,
            waiters: Vec::new(),
        }
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.completed >= self.total
    }
}

/// Handle to the calls created by one `animate`
///
/// Finishing or stopping through a set touches exactly these calls and
/// never disturbs other elements' animations.
#[derive(Clone, Debug, Default)]
pub struct AnimationSet {
    pub(crate) group: Option<GroupId>,
    pub(crate) elements: SmallVec<[ElementId; 4]>,
    pub(crate) calls: SmallVec<[CallId; 4]>,
}

impl AnimationSet {
    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub fn elements(&self) -> &[ElementId] {
        &self.elements
    }

    pub fn calls(&self) -> &[CallId] {
        &self.calls
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
