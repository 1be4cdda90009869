//! Animation scheduler
//!
//! Owns every live call, the active list that the tick engine walks, and the
//! per-element queue lanes. All lifecycle callbacks receive `&mut
//! AnimationScheduler`, so they may animate, finish or stop other calls
//! while a pass is running; passes stay correct because slot indices are
//! stable until the outermost pass ends.
//!
//! # Example
//!
//! ```
//! use blinc_sequencer::{AnimationOptions, AnimationScheduler, RecordingSink, Selection, Tween};
//!
//! let sink = RecordingSink::new();
//! let mut scheduler = AnimationScheduler::new().with_sink(sink.clone());
//! let card = scheduler.add_element("card");
//!
//! let set = scheduler
//!     .animate(&[card], &[Tween::from_to("left", 0.0, 100.0, "px")], AnimationOptions::new())
//!     .unwrap();
//! scheduler.finish(Selection::Set(&set), None::<&str>, false);
//!
//! assert_eq!(sink.last_value(card, "left").as_deref(), Some("100px"));
//! ```

use indexmap::IndexMap;
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::ops::{Deref, DerefMut};
use std::time::Instant;

use crate::active::ActiveList;
use crate::call::{AnimationCall, CallId, CallState, Placement};
use crate::config::SchedulerConfig;
use crate::element::{ElementData, ElementId};
use crate::error::{Result, SequencerError};
use crate::group::{
    AnimationOptions, AnimationSet, CallPlan, CallbackFailure, CallbackResult, Group, GroupId,
    Hook,
};
use crate::queue::{Admission, QueueFilter};
use crate::sink::{NullSink, PropertySink};
use crate::tween::Tween;

/// How a call is being retired
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Settle {
    /// Elapsed time reached the duration; the last frame already wrote values
    Natural,
    /// Forced completion: write end values, run the full begin/complete contract
    Finish,
    /// Forced retirement without end values or `complete`
    Stop,
}

/// Bookkeeping for one pass over the active list
///
/// Dropping the guard closes the pass, also while unwinding out of a
/// panicking callback, so a failed pass never leaves the scheduler marked
/// busy.
pub(crate) struct PassGuard<'a> {
    scheduler: &'a mut AnimationScheduler,
    frame: bool,
}

impl Deref for PassGuard<'_> {
    type Target = AnimationScheduler;

    fn deref(&self) -> &AnimationScheduler {
        self.scheduler
    }
}

impl DerefMut for PassGuard<'_> {
    fn deref_mut(&mut self) -> &mut AnimationScheduler {
        self.scheduler
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if self.frame {
            self.scheduler.ticking = false;
        }
        self.scheduler.exit_pass();
    }
}

/// The scheduler that owns and advances animation calls
///
/// Each instance is independent; hosts typically keep one per window and
/// call [`tick`](Self::tick) once per frame.
pub struct AnimationScheduler {
    pub(crate) config: SchedulerConfig,
    pub(crate) calls: SlotMap<CallId, AnimationCall>,
    pub(crate) groups: SlotMap<GroupId, Group>,
    pub(crate) elements: SlotMap<ElementId, ElementData>,
    pub(crate) active: ActiveList,
    pub(crate) sink: Box<dyn PropertySink>,
    failures: Vec<CallbackFailure>,
    /// Nesting of passes in flight; compaction waits for zero
    pass_depth: usize,
    pub(crate) origin: Instant,
    pub(crate) last_tick: Option<f64>,
    pub(crate) ticking: bool,
}

impl AnimationScheduler {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            calls: SlotMap::with_key(),
            groups: SlotMap::with_key(),
            elements: SlotMap::with_key(),
            active: ActiveList::new(),
            sink: Box::new(NullSink),
            failures: Vec::new(),
            pass_depth: 0,
            origin: Instant::now(),
            last_tick: None,
            ticking: false,
        }
    }

    /// Replace the sink receiving computed values
    pub fn with_sink(mut self, sink: impl PropertySink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn set_sink(&mut self, sink: impl PropertySink + 'static) {
        self.sink = Box::new(sink);
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Change defaults; calls already created keep their resolved settings
    pub fn set_config(&mut self, config: SchedulerConfig) {
        self.config = config;
    }

    // =========================================================================
    // Elements
    // =========================================================================

    pub fn add_element(&mut self, label: impl Into<String>) -> ElementId {
        self.elements.insert(ElementData::new(label.into()))
    }

    pub fn element(&self, id: ElementId) -> Option<&ElementData> {
        self.elements.get(id)
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Remove an element, stopping its active calls and discarding its queues
    ///
    /// Returns `false` if the element was not registered.
    pub fn remove_element(&mut self, id: ElementId) -> bool {
        let Some(element) = self.elements.get_mut(id) else {
            return false;
        };
        element.removing = true;
        let parked = element.queues.drain_all();

        let mut pass = self.pass();
        for call in parked {
            pass.complete_call(call, Settle::Stop);
        }
        let running: Vec<CallId> = pass
            .active
            .iter()
            .filter(|&call| pass.calls.get(call).is_some_and(|c| c.element == id))
            .collect();
        for call in running {
            pass.complete_call(call, Settle::Stop);
        }
        drop(pass);

        tracing::debug!("AnimationScheduler: removed element {:?}", id);
        self.elements.remove(id).is_some()
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Animate `tweens` on every target as one group
    pub fn animate(
        &mut self,
        targets: &[ElementId],
        tweens: &[Tween],
        options: AnimationOptions,
    ) -> Result<AnimationSet> {
        self.animate_each(targets, |_| CallPlan::new(tweens.to_vec()), options)
    }

    /// Animate every target as one group, with a per-target plan
    ///
    /// An empty target list is a no-op returning an empty set. Validation
    /// happens before anything is linked, so an error leaves the scheduler
    /// untouched.
    pub fn animate_each<F>(
        &mut self,
        targets: &[ElementId],
        mut plan: F,
        options: AnimationOptions,
    ) -> Result<AnimationSet>
    where
        F: FnMut(ElementId) -> CallPlan,
    {
        if targets.is_empty() {
            return Ok(AnimationSet::default());
        }

        let mut prepared = Vec::with_capacity(targets.len());
        for &element in targets {
            // Elements mid-removal accept no new calls
            if !self.elements.get(element).is_some_and(|data| !data.removing) {
                return Err(SequencerError::UnknownElement(format!("{element:?}")));
            }
            let plan = plan(element);
            let mut tweens = IndexMap::with_capacity(plan.tweens.len());
            for tween in &plan.tweens {
                let property = tween.property().to_string();
                if tweens.insert(property.clone(), tween.clone()).is_some() {
                    return Err(SequencerError::DuplicateProperty(property));
                }
            }
            prepared.push((element, plan, tweens));
        }

        let lane_default = options
            .queue
            .clone()
            .unwrap_or_else(|| self.config.queue.clone());
        let duration = options.duration_ms.unwrap_or(self.config.duration_ms);
        let delay = options.delay_ms.unwrap_or(self.config.delay_ms);
        let easing = options.easing.unwrap_or(self.config.easing);

        let elements: SmallVec<[ElementId; 4]> = targets.iter().copied().collect();
        let group = self.groups.insert(Group::new(options, elements.clone()));
        let mut calls: SmallVec<[CallId; 4]> = SmallVec::new();

        for (element, plan, tweens) in prepared {
            let lane = plan.queue.clone().unwrap_or_else(|| lane_default.clone());
            let id = self.calls.insert(AnimationCall {
                element,
                group,
                tweens,
                queue: plan.queue,
                lane,
                state: CallState::Queued,
                validated: false,
                paused: false,
                slot: None,
                time_start: None,
                elapsed_ms: 0.0,
                percent: 0.0,
                duration_ms: plan.duration_ms.unwrap_or(duration),
                delay_ms: plan.delay_ms.unwrap_or(delay),
                easing: plan.easing.unwrap_or(easing),
            });
            self.enqueue(id);
            calls.push(id);
        }

        tracing::debug!(
            "AnimationScheduler: animate group {:?} on {} element(s)",
            group,
            calls.len()
        );

        Ok(AnimationSet {
            group: Some(group),
            elements,
            calls,
        })
    }

    /// Chain `waiter` onto the set's completion
    ///
    /// Runs immediately when the group has already completed.
    pub fn then<F>(&mut self, set: &AnimationSet, waiter: F)
    where
        F: FnOnce(&mut AnimationScheduler, &[ElementId]) + 'static,
    {
        if let Some(group) = set.group.and_then(|id| self.groups.get_mut(id)) {
            if !group.is_settled() {
                group.waiters.push(Box::new(waiter));
                return;
            }
        }
        waiter(self, &set.elements);
    }

    /// Link into the active list, or park behind the lane's current holder
    fn enqueue(&mut self, id: CallId) {
        let Some(call) = self.calls.get(id) else {
            return;
        };
        let element = call.element;
        let admission = match call.lane.lane() {
            None => Admission::Run,
            Some(lane) => match self.elements.get_mut(element) {
                Some(data) => data.queues.admit(lane, id),
                None => Admission::Run,
            },
        };
        if admission == Admission::Run {
            self.link_active(id);
        }
    }

    fn link_active(&mut self, id: CallId) {
        let slot = self.active.push(id);
        let Some(call) = self.calls.get_mut(id) else {
            return;
        };
        call.slot = Some(slot);
        if call.state == CallState::Queued {
            call.state = CallState::Active;
        }
        if let Some(element) = self.elements.get_mut(call.element) {
            element.active_calls += 1;
        }
    }

    // =========================================================================
    // Completion protocol
    // =========================================================================

    /// Resolve any deferred tweens and absorb the call out of staging
    ///
    /// Idempotent. Returns `false` for calls that no longer exist.
    pub(crate) fn validate_tweens(&mut self, id: CallId) -> bool {
        let Some(call) = self.calls.get_mut(id) else {
            return false;
        };
        if let Some(slot) = call.slot {
            self.active.absorb(slot);
        }
        if !call.validated {
            let element = call.element;
            call.tweens.retain(|property, tween| match tween.resolve(element) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(
                        "AnimationScheduler: dropping tween `{}` on {:?}: {}",
                        property,
                        element,
                        err
                    );
                    false
                }
            });
            call.validated = true;
        }
        true
    }

    /// Validate every staged call, leaving the staging region empty
    pub(crate) fn drain_staging(&mut self) {
        while let Some(index) = self.active.first_new() {
            if let Some(id) = self.active.get(index) {
                self.validate_tweens(id);
            }
            self.active.absorb(index);
        }
    }

    /// Mark a call started; the group's first start fires `begin`
    pub(crate) fn begin_once(&mut self, id: CallId) {
        let Some(call) = self.calls.get_mut(id) else {
            return;
        };
        if call.state.is_started() {
            return;
        }
        if let Err(err) = call.transition(CallState::Started) {
            tracing::warn!("AnimationScheduler: {}", err);
            return;
        }
        let group_id = call.group;
        let Some(group) = self.groups.get_mut(group_id) else {
            return;
        };
        group.started += 1;
        if group.started == 1 {
            group.first = Some(id);
            if let Some(begin) = group.options.begin.take() {
                let elements = group.elements.clone();
                let result = begin(self, &elements);
                self.report(Hook::Begin, group_id, result);
            }
        }
    }

    /// Commit every tween's end value
    fn write_final_values(&mut self, id: CallId) {
        let Some(call) = self.calls.get(id) else {
            return;
        };
        let element = call.element;
        for tween in call.tweens.values() {
            let Some(sequence) = tween.sequence() else {
                continue;
            };
            let value = sequence.final_literal();
            match tween.setter() {
                Some(setter) => setter(element, tween.property(), &value),
                None => self
                    .sink
                    .set_property_value(element, tween.property(), &value),
            }
        }
    }

    /// Retire one call: the single path for natural, finished and stopped calls
    ///
    /// Returns `true` if the call matched `filter` and was (or began being)
    /// retired. Calls already finalizing or gone are left alone.
    pub(crate) fn settle(&mut self, id: CallId, filter: &QueueFilter, mode: Settle) -> bool {
        if !self.validate_tweens(id) {
            return false;
        }
        let Some(call) = self.calls.get(id) else {
            return false;
        };
        if call.state == CallState::Finalizing || !filter.matches(&call.lane) {
            return false;
        }

        if mode != Settle::Stop {
            self.begin_once(id);
            // `begin` may have retired this call already
            match self.calls.get(id) {
                Some(call) if call.state != CallState::Finalizing => {}
                _ => return true,
            }
            if mode == Settle::Finish {
                self.write_final_values(id);
            }
        }

        self.complete_call(id, mode);
        true
    }

    /// Unlink, run group completion, promote the lane, and drop the call
    fn complete_call(&mut self, id: CallId, mode: Settle) {
        let Some(call) = self.calls.get_mut(id) else {
            return;
        };
        if call.state == CallState::Finalizing {
            return;
        }
        if let Err(err) = call.transition(CallState::Finalizing) {
            tracing::warn!("AnimationScheduler: {}", err);
            return;
        }
        let element = call.element;
        let group_id = call.group;
        let lane = call.lane.clone();
        let slot = call.slot.take();
        let natural_end = call.time_start.map(|start| start + call.duration_ms);

        // Unlink from whichever structure holds the call
        if let Some(slot) = slot {
            self.active.unlink(slot);
        }
        if let Some(data) = self.elements.get_mut(element) {
            match (slot, lane.lane()) {
                (Some(_), _) => data.active_calls = data.active_calls.saturating_sub(1),
                (None, Some(name)) => {
                    data.queues.withdraw(name, id);
                }
                (None, None) => {}
            }
            if let (Some(_), Some(name)) = (slot, lane.lane()) {
                match (mode, natural_end) {
                    (Settle::Natural, Some(end)) => {
                        data.last_finish.insert(name.to_string(), end);
                    }
                    _ => {
                        data.last_finish.remove(name);
                    }
                }
            }
        }

        // Group completion
        let mut complete = None;
        let mut waiters = Vec::new();
        let mut elements = SmallVec::<[ElementId; 4]>::new();
        if let Some(group) = self.groups.get_mut(group_id) {
            group.completed += 1;
            if group.is_settled() {
                if mode != Settle::Stop {
                    complete = group.options.complete.take();
                }
                waiters = std::mem::take(&mut group.waiters);
                elements = group.elements.clone();
            }
        }
        if let Some(complete) = complete {
            let result = complete(self, &elements);
            self.report(Hook::Complete, group_id, result);
        }
        for waiter in waiters {
            waiter(self, &elements);
        }

        // Promote the next call on the lane this call held
        if let (Some(_), Some(name)) = (slot, lane.lane()) {
            let next = self
                .elements
                .get_mut(element)
                .and_then(|data| data.queues.advance(name));
            if let Some(next) = next {
                tracing::debug!(
                    "AnimationScheduler: promoting {:?} on lane {:?} of {:?}",
                    next,
                    name,
                    element
                );
                self.link_active(next);
            }
        }

        self.calls.remove(id);
        if self.groups.get(group_id).is_some_and(Group::is_settled) {
            self.groups.remove(group_id);
        }
    }

    pub(crate) fn report(&mut self, hook: Hook, group: GroupId, result: CallbackResult) {
        if let Err(error) = result {
            tracing::error!(
                "AnimationScheduler: {:?} callback of group {:?} failed: {:#}",
                hook,
                group,
                error
            );
            self.failures.push(CallbackFailure { hook, group, error });
        }
    }

    /// Take callback errors reported since the last call
    pub fn take_callback_failures(&mut self) -> Vec<CallbackFailure> {
        std::mem::take(&mut self.failures)
    }

    // =========================================================================
    // Pass bookkeeping
    // =========================================================================

    /// Open a pass over the active list; slot indices stay stable until the
    /// outermost pass guard drops
    pub(crate) fn pass(&mut self) -> PassGuard<'_> {
        self.pass_depth += 1;
        PassGuard {
            scheduler: self,
            frame: false,
        }
    }

    /// Open the pass of one frame; marks the scheduler as ticking until the
    /// guard drops
    pub(crate) fn frame(&mut self) -> PassGuard<'_> {
        self.ticking = true;
        let mut guard = self.pass();
        guard.frame = true;
        guard
    }

    fn exit_pass(&mut self) {
        self.pass_depth = self.pass_depth.saturating_sub(1);
        if self.pass_depth == 0 {
            for (id, slot) in self.active.compact() {
                if let Some(call) = self.calls.get_mut(id) {
                    call.slot = Some(slot);
                }
            }
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn call(&self, id: CallId) -> Option<&AnimationCall> {
        self.calls.get(id)
    }

    /// Lifecycle state, `None` once retired
    pub fn state(&self, id: CallId) -> Option<CallState> {
        self.calls.get(id).map(|call| call.state)
    }

    /// Which structure holds the call, `None` once retired
    pub fn placement(&self, id: CallId) -> Option<Placement> {
        let call = self.calls.get(id)?;
        match call.slot {
            Some(slot) if self.active.is_staged(slot) => Some(Placement::Staged),
            Some(_) => Some(Placement::Active),
            None if call.state == CallState::Queued => Some(Placement::Queued),
            None => None,
        }
    }

    pub fn is_active(&self, id: CallId) -> bool {
        matches!(
            self.placement(id),
            Some(Placement::Active | Placement::Staged)
        )
    }

    /// Calls in the active list (including staged ones)
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Calls parked in queue lanes across all elements
    pub fn queued_count(&self) -> usize {
        self.elements.values().map(|e| e.queues.parked_len()).sum()
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Active calls in list order
    pub fn active_calls(&self) -> Vec<CallId> {
        self.active.iter().collect()
    }

    /// Whether anything is left to animate
    pub fn has_active_animations(&self) -> bool {
        !self.active.is_empty()
    }

    /// Check that every live call is held by exactly one structure
    pub fn verify_integrity(&self) -> Result<()> {
        for (id, call) in &self.calls {
            if call.state == CallState::Finalizing {
                continue;
            }
            let in_active = self.active.iter().filter(|&c| c == id).count();
            let in_queues: usize = self
                .elements
                .values()
                .map(|e| e.queues.occurrences(id))
                .sum();
            if in_active + in_queues != 1 {
                return Err(SequencerError::Integrity(format!(
                    "{id:?} held {in_active} time(s) by the active list and {in_queues} time(s) by queues"
                )));
            }
            if (in_active == 1) != call.slot.is_some() {
                return Err(SequencerError::Integrity(format!(
                    "{id:?} slot bookkeeping disagrees with the active list"
                )));
            }
            if let Some(slot) = call.slot {
                if self.active.get(slot) != Some(id) {
                    return Err(SequencerError::Integrity(format!(
                        "{id:?} records slot {slot} but the list holds {:?}",
                        self.active.get(slot)
                    )));
                }
            }
            if (in_queues == 1) != (call.state == CallState::Queued) {
                return Err(SequencerError::Integrity(format!(
                    "{id:?} is {:?} but queue membership is {in_queues}",
                    call.state
                )));
            }
        }
        for id in self.active.iter() {
            if !self.calls.contains_key(id) {
                return Err(SequencerError::Integrity(format!(
                    "active list holds retired call {id:?}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for AnimationScheduler {
    fn default() -> Self {
        Self::new()
    }
}
