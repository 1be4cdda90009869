//! Finish, stop, pause and resume
//!
//! All four take the same selection and queue arguments. A finish forces the
//! selected calls to completion: unstarted calls begin, every tween jumps to
//! its end value, `complete` fires for groups whose last member retires, and
//! the next call in each lane is promoted.

use crate::call::{CallId, CallState};
use crate::element::ElementId;
use crate::group::AnimationSet;
use crate::queue::{QueueArg, QueueFilter};
use crate::scheduler::{AnimationScheduler, Settle};

/// Which calls an operation applies to
#[derive(Clone, Copy, Debug)]
pub enum Selection<'a> {
    /// Every active call
    All,
    /// Active calls on these elements
    Elements(&'a [ElementId]),
    /// Exactly the calls of one `animate` invocation, queued or active
    Set(&'a AnimationSet),
}

impl<'a> Selection<'a> {
    pub fn is_empty(&self) -> bool {
        match self {
            Selection::All => false,
            Selection::Elements(elements) => elements.is_empty(),
            Selection::Set(set) => set.is_empty(),
        }
    }

    /// Elements named by the selection (empty for `All`)
    pub fn elements(&self) -> &'a [ElementId] {
        match *self {
            Selection::All => &[],
            Selection::Elements(elements) => elements,
            Selection::Set(set) => set.elements(),
        }
    }

    fn admits(&self, element: ElementId) -> bool {
        match self {
            Selection::All => true,
            Selection::Elements(elements) => elements.contains(&element),
            Selection::Set(set) => set.elements().contains(&element),
        }
    }
}

impl AnimationScheduler {
    /// Force the selected calls to their end values and complete them
    ///
    /// `queue` is omitted (`None::<&str>`), a lane name, `false` for unqueued
    /// calls, or `true` for every queue including calls linked while the
    /// finish runs. Returns the number of calls finished.
    pub fn finish(&mut self, selection: Selection<'_>, queue: impl Into<QueueArg>, all: bool) -> usize {
        self.sweep(selection, queue.into(), all, Settle::Finish)
    }

    /// Finish, then run `on_done` once the selection's group has completed
    ///
    /// For element selections, or sets whose group is already gone, `on_done`
    /// runs right away with the selected elements.
    pub fn finish_then<F>(
        &mut self,
        selection: Selection<'_>,
        queue: impl Into<QueueArg>,
        all: bool,
        on_done: F,
    ) -> usize
    where
        F: FnOnce(&mut AnimationScheduler, &[ElementId]) + 'static,
    {
        if let Selection::Set(set) = selection {
            self.then(set, on_done);
            return self.finish(selection, queue, all);
        }
        let finished = self.finish(selection, queue, all);
        let elements = selection.elements().to_vec();
        on_done(self, &elements);
        finished
    }

    /// Retire the selected calls where they are, without end values or
    /// `complete`; waiters still run and lanes still advance
    pub fn stop(&mut self, selection: Selection<'_>, queue: impl Into<QueueArg>, all: bool) -> usize {
        self.sweep(selection, queue.into(), all, Settle::Stop)
    }

    /// Freeze the selected calls; their clocks stop until resumed
    pub fn pause(&mut self, selection: Selection<'_>, queue: impl Into<QueueArg>) -> usize {
        self.set_paused(selection, queue.into(), true)
    }

    pub fn resume(&mut self, selection: Selection<'_>, queue: impl Into<QueueArg>) -> usize {
        self.set_paused(selection, queue.into(), false)
    }

    fn sweep(&mut self, selection: Selection<'_>, queue: QueueArg, all: bool, mode: Settle) -> usize {
        if selection.is_empty() {
            return 0;
        }
        let (filter, all) = queue.resolve(all);
        let mut settled = 0;

        let mut pass = self.pass();
        match selection {
            Selection::Set(set) => {
                for &id in set.calls() {
                    if pass.settle(id, &filter, mode) {
                        settled += 1;
                    }
                }
            }
            Selection::All | Selection::Elements(_) => {
                pass.drain_staging();
                let mut index = 0;
                while index < pass.active.slot_len() {
                    if !all && pass.active.is_staged(index) {
                        break;
                    }
                    let slot = index;
                    index += 1;
                    let Some(id) = pass.active.get(slot) else {
                        continue;
                    };
                    let selected = pass
                        .calls
                        .get(id)
                        .is_some_and(|call| selection.admits(call.element));
                    if selected && pass.settle(id, &filter, mode) {
                        settled += 1;
                    }
                }
            }
        }
        drop(pass);

        tracing::debug!(
            "AnimationScheduler: {} {} call(s) (all: {})",
            match mode {
                Settle::Stop => "stopped",
                _ => "finished",
            },
            settled,
            all
        );
        settled
    }

    fn set_paused(&mut self, selection: Selection<'_>, queue: QueueArg, paused: bool) -> usize {
        if selection.is_empty() {
            return 0;
        }
        let (filter, _) = queue.resolve(false);
        let targets: Vec<CallId> = match selection {
            Selection::Set(set) => set.calls().to_vec(),
            Selection::All | Selection::Elements(_) => self.active.iter().collect(),
        };

        let mut changed = 0;
        for id in targets {
            let Some(call) = self.calls.get_mut(id) else {
                continue;
            };
            if call.state == CallState::Finalizing
                || call.paused == paused
                || !selection.admits(call.element)
                || !filter.matches(&call.lane)
            {
                continue;
            }
            call.paused = paused;
            changed += 1;
        }
        tracing::debug!(
            "AnimationScheduler: {} {} call(s)",
            if paused { "paused" } else { "resumed" },
            changed
        );
        changed
    }
}
