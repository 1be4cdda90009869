//! Animation calls
//!
//! One [`AnimationCall`] animates one element. It moves through
//! [`CallState`] in order and is removed from the scheduler's arena when it
//! retires.

use indexmap::IndexMap;
use slotmap::new_key_type;

use crate::easing::Easing;
use crate::element::ElementId;
use crate::error::{Result, SequencerError};
use crate::group::GroupId;
use crate::queue::Queue;
use crate::tween::Tween;

new_key_type! {
    /// Handle to a scheduled animation call
    pub struct CallId;
}

/// Lifecycle of a call
///
/// `Queued → Active → Started → Finalizing`, after which the call is
/// removed (retired). Finish and stop may skip ahead from any live state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallState {
    /// Parked behind another call in a queue lane
    Queued,
    /// In the active list, begin-time work not yet done
    Active,
    /// Begin-time work done; being advanced each frame
    Started,
    /// Completion in progress; further finish/stop requests are no-ops
    Finalizing,
}

impl CallState {
    pub fn can_transition(self, to: CallState) -> bool {
        use CallState::*;
        matches!(
            (self, to),
            (Queued, Active)
                | (Queued, Started)
                | (Queued, Finalizing)
                | (Active, Started)
                | (Active, Finalizing)
                | (Started, Finalizing)
        )
    }

    pub fn is_started(self) -> bool {
        matches!(self, CallState::Started | CallState::Finalizing)
    }
}

/// Which structure currently holds a call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// In the active list, visited by the current tick
    Active,
    /// Linked after the staging boundary; absorbed on the next pass
    Staged,
    /// Parked in its element's queue lane
    Queued,
}

/// One scheduled animation unit bound to one element
#[derive(Debug)]
pub struct AnimationCall {
    pub(crate) element: ElementId,
    pub(crate) group: GroupId,
    pub(crate) tweens: IndexMap<String, Tween>,
    /// Per-call queue override, as requested
    pub(crate) queue: Option<Queue>,
    /// Effective queue, resolved when the call was created
    pub(crate) lane: Queue,
    pub(crate) state: CallState,
    pub(crate) validated: bool,
    pub(crate) paused: bool,
    /// Index into the active list, when linked there
    pub(crate) slot: Option<usize>,
    pub(crate) time_start: Option<f64>,
    pub(crate) elapsed_ms: f64,
    pub(crate) percent: f64,
    pub(crate) duration_ms: f64,
    pub(crate) delay_ms: f64,
    pub(crate) easing: Easing,
}

impl AnimationCall {
    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// Queue override given for this call, if any
    pub fn queue_override(&self) -> Option<&Queue> {
        self.queue.as_ref()
    }

    /// Queue this call is filtered and laned by
    pub fn effective_queue(&self) -> &Queue {
        &self.lane
    }

    pub fn tweens(&self) -> impl Iterator<Item = &Tween> {
        self.tweens.values()
    }

    pub fn tween(&self, property: &str) -> Option<&Tween> {
        self.tweens.get(property)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Progress of the last tick, 0.0 to 1.0
    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub(crate) fn transition(&mut self, to: CallState) -> Result<()> {
        if self.state == to {
            return Ok(());
        }
        if !self.state.can_transition(to) {
            return Err(SequencerError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}
