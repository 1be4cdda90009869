//! Blinc Animation Sequencer
//!
//! Schedules property animations on abstract elements and advances them
//! frame by frame.
//!
//! # Features
//!
//! - **Call Groups**: one `animate` covers many elements; `begin` fires once
//!   when the first call starts and `complete` once when the last retires
//! - **Queue Lanes**: per-element named FIFO lanes, plus unqueued calls that
//!   run alongside everything else
//! - **Tick Engine**: delays, per-keyframe easing, pattern-based value
//!   rendering, progress callbacks
//! - **Finish / Stop / Pause / Resume**: forced transitions safe to call from
//!   inside callbacks, with an explicit "finish all" boundary
//! - **Integrity Checks**: every live call is held by exactly one structure

pub mod call;
pub mod config;
pub mod easing;
pub mod element;
pub mod error;
pub mod finish;
pub mod group;
pub mod queue;
pub mod scheduler;
pub mod sink;
pub mod tween;

mod active;
mod tick;

pub use call::{AnimationCall, CallId, CallState, Placement};
pub use config::SchedulerConfig;
pub use easing::Easing;
pub use element::{ElementData, ElementId};
pub use error::{Result, SequencerError};
pub use finish::Selection;
pub use group::{
    AnimationOptions, AnimationSet, CallPlan, CallbackFailure, CallbackResult, GroupId, Hook,
    Progress,
};
pub use queue::{Admission, Queue, QueueArg, QueueFilter, QueueIndex};
pub use scheduler::AnimationScheduler;
pub use sink::{NullSink, PropertySink, PropertyWrite, RecordingSink};
pub use tween::{Keyframe, Pattern, PatternSlot, Sequence, Tween};
