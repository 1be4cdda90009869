//! Tick engine
//!
//! Once per frame: absorb staged calls, assign start times, honour delays,
//! interpolate every tween and commit it, then fire progress callbacks and
//! retire calls whose elapsed time reached their duration.

use crate::call::{CallId, CallState};
use crate::group::{Hook, Progress};
use crate::queue::QueueFilter;
use crate::scheduler::{AnimationScheduler, Settle};

impl AnimationScheduler {
    /// Tick using the scheduler's monotonic clock
    ///
    /// Returns true if any animations are still active (need another tick).
    pub fn tick(&mut self) -> bool {
        let now = self.origin.elapsed().as_secs_f64() * 1000.0;
        self.tick_at(now)
    }

    /// Tick at an explicit timestamp in milliseconds
    ///
    /// Timestamps must be monotonic for a given scheduler. Frames arriving
    /// sooner than the configured minimum frame time are skipped, and a tick
    /// requested from inside a callback is ignored.
    pub fn tick_at(&mut self, now: f64) -> bool {
        if self.ticking {
            tracing::warn!("AnimationScheduler: ignoring re-entrant tick");
            return self.has_active_animations();
        }
        let delta = match self.last_tick {
            Some(last) => {
                let delta = now - last;
                if delta < self.config.min_frame_time() {
                    return self.has_active_animations();
                }
                delta
            }
            None => self.config.frame_time(),
        };

        self.last_tick = Some(now);
        {
            let mut frame = self.frame();
            frame.drain_staging();
            frame.assign_start_times(now, delta);
            let (progressed, completed) = frame.advance_calls(now);

            for id in progressed {
                frame.fire_progress(id, now);
            }
            for id in completed {
                frame.settle(id, &QueueFilter::Any, Settle::Natural);
            }
        }

        let active = self.has_active_animations();
        if !active {
            // Next animation starts from a fresh frame
            self.last_tick = None;
        }
        tracing::trace!(
            "AnimationScheduler: tick at {:.1}ms, {} active, {} queued",
            now,
            self.active_count(),
            self.queued_count()
        );
        active
    }

    /// First pass: start times for new calls, time shift for paused ones
    fn assign_start_times(&mut self, now: f64, delta: f64) {
        for index in 0..self.active.slot_len() {
            let Some(id) = self.active.get(index) else {
                continue;
            };
            let Some(call) = self.calls.get_mut(id) else {
                continue;
            };
            match call.time_start {
                None => {
                    let mut start = now - delta;
                    // Never before the lane's previous call ended
                    if let Some(lane) = call.lane.lane() {
                        let previous = self
                            .elements
                            .get(call.element)
                            .and_then(|data| data.last_finish.get(lane));
                        if let Some(&finished) = previous {
                            start = start.max(finished);
                        }
                    }
                    call.time_start = Some(start);
                }
                Some(start) if call.paused => call.time_start = Some(start + delta),
                Some(_) => {}
            }
        }
    }

    /// Second pass: begin, interpolate and commit
    ///
    /// Stops at the staging boundary, so calls linked by a `begin` callback
    /// during this pass wait for the next frame.
    fn advance_calls(&mut self, now: f64) -> (Vec<CallId>, Vec<CallId>) {
        let mut progressed = Vec::new();
        let mut completed = Vec::new();

        let mut index = 0;
        while index < self.active.slot_len() && !self.active.is_staged(index) {
            let slot = index;
            index += 1;
            let Some(id) = self.active.get(slot) else {
                continue;
            };
            let Some(call) = self.calls.get_mut(id) else {
                continue;
            };
            if call.paused || call.state == CallState::Finalizing {
                continue;
            }
            let Some(time_start) = call.time_start else {
                continue;
            };

            if !call.state.is_started() {
                if call.delay_ms > 0.0 && time_start + call.delay_ms > now {
                    continue;
                }
                call.time_start = Some(time_start + call.delay_ms);
                self.begin_once(id);
                match self.calls.get(id) {
                    Some(call) if call.state == CallState::Started => {}
                    _ => continue,
                }
            }

            let mock = self.config.mock;
            let Some(call) = self.calls.get_mut(id) else {
                continue;
            };
            let time_start = call.time_start.unwrap_or(now);
            let elapsed = now - time_start;
            let percent = if mock || call.duration_ms <= 0.0 {
                1.0
            } else {
                (elapsed / call.duration_ms).clamp(0.0, 1.0)
            };
            call.elapsed_ms = elapsed;
            call.percent = percent;

            if let Some(group) = self.groups.get(call.group) {
                if group.options.progress.is_some() && group.first == Some(id) {
                    progressed.push(id);
                }
            }
            if percent >= 1.0 {
                completed.push(id);
            }

            let element = call.element;
            for tween in call.tweens.values() {
                let Some(sequence) = tween.sequence() else {
                    continue;
                };
                let value = sequence.sample(percent, tween.easing().unwrap_or(call.easing));
                match tween.setter() {
                    Some(setter) => setter(element, tween.property(), &value),
                    None => self
                        .sink
                        .set_property_value(element, tween.property(), &value),
                }
            }
        }

        (progressed, completed)
    }

    fn fire_progress(&mut self, id: CallId, now: f64) {
        let Some(call) = self.calls.get(id) else {
            return;
        };
        if call.state == CallState::Finalizing {
            return;
        }
        let group_id = call.group;
        let percent = call.percent;
        let time_start = call.time_start.unwrap_or(now);
        let remaining_ms = (time_start + call.duration_ms - now).max(0.0);

        let Some(group) = self.groups.get_mut(group_id) else {
            return;
        };
        let Some(mut progress) = group.options.progress.take() else {
            return;
        };
        let elements = group.elements.clone();
        let result = progress(
            self,
            &Progress {
                elements: &elements,
                call: id,
                percent,
                remaining_ms,
                time_start,
            },
        );
        self.report(Hook::Progress, group_id, result);
        if let Some(group) = self.groups.get_mut(group_id) {
            if group.options.progress.is_none() {
                group.options.progress = Some(progress);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::call::{CallId, Placement};
    use crate::config::SchedulerConfig;
    use crate::element::ElementId;
    use crate::finish::Selection;
    use crate::group::AnimationOptions;
    use crate::queue::Queue;
    use crate::scheduler::AnimationScheduler;
    use crate::sink::RecordingSink;
    use crate::tween::{Keyframe, Pattern, PatternSlot, Sequence, Tween};
    use std::cell::{Cell, RefCell};
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::rc::Rc;

    /// 50fps: the first frame counts as 20ms
    fn scheduler() -> (AnimationScheduler, RecordingSink) {
        let sink = RecordingSink::new();
        let config = SchedulerConfig::testing().with_fps(50);
        let scheduler = AnimationScheduler::with_config(config).with_sink(sink.clone());
        (scheduler, sink)
    }

    fn left(to: f64) -> Tween {
        Tween::from_to("left", 0.0, to, "px")
    }

    fn px(sink: &RecordingSink, element: ElementId, property: &str) -> f64 {
        sink.last_value(element, property)
            .and_then(|value| value.trim_end_matches("px").parse().ok())
            .unwrap_or(f64::NAN)
    }

    fn assert_near(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_tick_interpolates_until_complete() {
        let (mut scheduler, sink) = scheduler();
        let card = scheduler.add_element("card");
        let completed = Rc::new(Cell::new(false));
        let flag = completed.clone();
        scheduler
            .animate(
                &[card],
                &[left(100.0)],
                AnimationOptions::new().duration(100.0).on_complete(move |_, _| {
                    flag.set(true);
                    Ok(())
                }),
            )
            .unwrap();

        assert!(scheduler.tick_at(0.0));
        assert_near(px(&sink, card, "left"), 20.0);
        assert!(scheduler.tick_at(50.0));
        assert_near(px(&sink, card, "left"), 70.0);
        assert!(!completed.get());

        assert!(!scheduler.tick_at(100.0));
        assert_eq!(sink.last_value(card, "left").as_deref(), Some("100px"));
        assert!(completed.get());
        assert_eq!(scheduler.call_count(), 0);
    }

    #[test]
    fn test_frames_closer_than_min_frame_time_are_skipped() {
        let (mut scheduler, sink) = scheduler();
        let card = scheduler.add_element("card");
        scheduler
            .animate(&[card], &[left(100.0)], AnimationOptions::new().duration(100.0))
            .unwrap();

        scheduler.tick_at(0.0);
        let writes = sink.len();
        scheduler.tick_at(10.0);
        assert_eq!(sink.len(), writes);
        scheduler.tick_at(20.0);
        assert_near(px(&sink, card, "left"), 40.0);
    }

    #[test]
    fn test_delay_postpones_begin() {
        let (mut scheduler, sink) = scheduler();
        let card = scheduler.add_element("card");
        let began = Rc::new(Cell::new(0));
        let count = began.clone();
        scheduler
            .animate(
                &[card],
                &[left(100.0)],
                AnimationOptions::new()
                    .duration(100.0)
                    .delay(30.0)
                    .on_begin(move |_, _| {
                        count.set(count.get() + 1);
                        Ok(())
                    }),
            )
            .unwrap();

        // Starts at -20, so the delay ends at 10
        scheduler.tick_at(0.0);
        assert_eq!(began.get(), 0);
        assert_eq!(sink.last_value(card, "left"), None);

        scheduler.tick_at(20.0);
        assert_eq!(began.get(), 1);
        assert_near(px(&sink, card, "left"), 10.0);

        scheduler.tick_at(40.0);
        assert_eq!(began.get(), 1);
    }

    #[test]
    fn test_mock_mode_completes_on_first_frame() {
        let (mut scheduler, sink) = scheduler();
        scheduler.set_config(scheduler.config().clone().with_mock(true));
        let card = scheduler.add_element("card");
        scheduler
            .animate(&[card], &[left(100.0)], AnimationOptions::new().duration(5000.0))
            .unwrap();

        assert!(!scheduler.tick_at(0.0));
        assert_eq!(sink.last_value(card, "left").as_deref(), Some("100px"));
    }

    #[test]
    fn test_zero_duration_completes_on_first_frame() {
        let (mut scheduler, sink) = scheduler();
        let card = scheduler.add_element("card");
        scheduler
            .animate(&[card], &[left(7.0)], AnimationOptions::new().duration(0.0))
            .unwrap();

        assert!(!scheduler.tick_at(0.0));
        assert_eq!(sink.last_value(card, "left").as_deref(), Some("7px"));
    }

    #[test]
    fn test_unqueued_calls_run_concurrently() {
        let (mut scheduler, sink) = scheduler();
        let card = scheduler.add_element("card");
        scheduler
            .animate(&[card], &[left(100.0)], AnimationOptions::new().duration(100.0))
            .unwrap();
        scheduler
            .animate(
                &[card],
                &[Tween::from_to("top", 0.0, 100.0, "px")],
                AnimationOptions::new().duration(100.0).queue(Queue::Unqueued),
            )
            .unwrap();

        assert_eq!(scheduler.active_count(), 2);
        scheduler.tick_at(0.0);
        assert_near(px(&sink, card, "left"), 20.0);
        assert_near(px(&sink, card, "top"), 20.0);
    }

    #[test]
    fn test_promoted_call_starts_from_previous_frame() {
        let (mut scheduler, sink) = scheduler();
        let card = scheduler.add_element("card");
        scheduler
            .animate(&[card], &[left(100.0)], AnimationOptions::new().duration(100.0))
            .unwrap();
        let next = scheduler
            .animate(
                &[card],
                &[Tween::from_to("top", 0.0, 100.0, "px")],
                AnimationOptions::new().duration(100.0),
            )
            .unwrap();
        let next = next.calls()[0];

        scheduler.tick_at(0.0);
        assert_eq!(scheduler.placement(next), Some(Placement::Queued));
        assert_eq!(sink.last_value(card, "top"), None);

        scheduler.tick_at(90.0);
        assert_eq!(sink.last_value(card, "left").as_deref(), Some("100px"));
        assert_eq!(scheduler.placement(next), Some(Placement::Staged));
        assert_eq!(sink.last_value(card, "top"), None);

        scheduler.tick_at(110.0);
        assert_near(px(&sink, card, "top"), 20.0);
        scheduler.verify_integrity().unwrap();
    }

    #[test]
    fn test_promotion_waits_for_complete_callback() {
        let (mut scheduler, _) = scheduler();
        let card = scheduler.add_element("card");
        let next: Rc<Cell<Option<CallId>>> = Rc::new(Cell::new(None));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (pending, record) = (next.clone(), seen.clone());
        scheduler
            .animate(
                &[card],
                &[left(10.0)],
                AnimationOptions::new().duration(0.0).on_complete(move |scheduler, _| {
                    let placement = pending.get().and_then(|id| scheduler.placement(id));
                    record.borrow_mut().push(placement);
                    Ok(())
                }),
            )
            .unwrap();
        let set = scheduler
            .animate(&[card], &[left(20.0)], AnimationOptions::new())
            .unwrap();
        next.set(Some(set.calls()[0]));

        scheduler.tick_at(0.0);
        assert_eq!(*seen.borrow(), vec![Some(Placement::Queued)]);
        assert!(scheduler.is_active(set.calls()[0]));
    }

    #[test]
    fn test_progress_fires_once_per_frame_per_group() {
        let (mut scheduler, _) = scheduler();
        let a = scheduler.add_element("a");
        let b = scheduler.add_element("b");
        let reports = Rc::new(RefCell::new(Vec::new()));
        let record = reports.clone();
        scheduler
            .animate(
                &[a, b],
                &[left(100.0)],
                AnimationOptions::new()
                    .duration(100.0)
                    .on_progress(move |_, progress| {
                        record
                            .borrow_mut()
                            .push((progress.elements.len(), progress.percent, progress.remaining_ms));
                        Ok(())
                    }),
            )
            .unwrap();

        scheduler.tick_at(0.0);
        scheduler.tick_at(50.0);
        scheduler.tick_at(100.0);

        let reports = reports.borrow();
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|(elements, _, _)| *elements == 2));
        assert_near(reports[0].1, 0.2);
        assert_near(reports[1].2, 30.0);
        assert_eq!(reports[2].1, 1.0);
        assert_eq!(reports[2].2, 0.0);
    }

    #[test]
    fn test_tick_from_callback_is_ignored() {
        let (mut scheduler, sink) = scheduler();
        let card = scheduler.add_element("card");
        scheduler
            .animate(
                &[card],
                &[left(100.0)],
                AnimationOptions::new().duration(100.0).on_begin(|scheduler, _| {
                    scheduler.tick_at(1000.0);
                    Ok(())
                }),
            )
            .unwrap();

        assert!(scheduler.tick_at(0.0));
        assert_near(px(&sink, card, "left"), 20.0);
    }

    #[test]
    fn test_begin_callback_animations_wait_for_next_frame() {
        let (mut scheduler, sink) = scheduler();
        let card = scheduler.add_element("card");
        let other = scheduler.add_element("other");
        scheduler
            .animate(
                &[card],
                &[left(100.0)],
                AnimationOptions::new().duration(100.0).on_begin(move |scheduler, _| {
                    scheduler.animate(
                        &[other],
                        &[Tween::from_to("left", 0.0, 100.0, "px")],
                        AnimationOptions::new().duration(100.0),
                    )?;
                    Ok(())
                }),
            )
            .unwrap();

        scheduler.tick_at(0.0);
        assert_eq!(sink.last_value(other, "left"), None);
        assert_eq!(scheduler.active_count(), 2);

        scheduler.tick_at(20.0);
        assert_near(px(&sink, other, "left"), 20.0);
    }

    #[test]
    fn test_deferred_tween_resolves_on_first_frame() {
        let (mut scheduler, sink) = scheduler();
        let card = scheduler.add_element("card");
        let resolved = Rc::new(Cell::new(0));
        let count = resolved.clone();
        let tween = Tween::deferred("opacity", move |_| {
            count.set(count.get() + 1);
            Sequence::new(
                Pattern::new([PatternSlot::Number]),
                vec![Keyframe::numbers(0.0, [1.0]), Keyframe::numbers(1.0, [0.0])],
            )
            .map_err(Into::into)
        });
        scheduler
            .animate(
                &[card],
                &[tween, Tween::deferred("width", |_| Err(anyhow::anyhow!("no width")))],
                AnimationOptions::new().duration(100.0),
            )
            .unwrap();
        assert_eq!(resolved.get(), 0);

        scheduler.tick_at(0.0);
        scheduler.tick_at(50.0);
        assert_eq!(resolved.get(), 1);
        assert_near(
            sink.last_value(card, "opacity")
                .and_then(|v| v.parse().ok())
                .unwrap_or(f64::NAN),
            0.3,
        );
        assert_eq!(sink.last_value(card, "width"), None);

        scheduler.finish(Selection::All, None::<&str>, false);
        assert_eq!(sink.last_value(card, "opacity").as_deref(), Some("0"));
    }

    #[test]
    fn test_custom_setter_bypasses_sink() {
        let (mut scheduler, sink) = scheduler();
        let card = scheduler.add_element("card");
        let written = Rc::new(RefCell::new(Vec::new()));
        let record = written.clone();
        let tween = left(100.0).with_setter(move |_, property, value| {
            record.borrow_mut().push(format!("{property}={value}"));
        });
        scheduler
            .animate(&[card], &[tween], AnimationOptions::new().duration(0.0))
            .unwrap();

        scheduler.tick_at(0.0);
        assert!(sink.is_empty());
        assert_eq!(*written.borrow(), vec!["left=100px"]);
    }

    #[test]
    fn test_integrity_across_ticks_and_finishes() {
        let (mut scheduler, _) = scheduler();
        let elements: Vec<ElementId> = (0..4)
            .map(|i| scheduler.add_element(format!("el{i}")))
            .collect();

        for (round, &element) in elements.iter().cycle().take(12).enumerate() {
            let lane = if round % 3 == 0 { "fx" } else { "" };
            scheduler
                .animate(
                    &[element],
                    &[left(round as f64)],
                    AnimationOptions::new()
                        .duration(40.0 + round as f64 * 10.0)
                        .queue(lane),
                )
                .unwrap();
        }
        scheduler.verify_integrity().unwrap();

        let mut now = 0.0;
        for step in 0..30 {
            scheduler.tick_at(now);
            scheduler.verify_integrity().unwrap();
            match step % 5 {
                1 => {
                    scheduler.finish(Selection::Elements(&elements[..1]), None::<&str>, false);
                }
                3 => {
                    scheduler.finish(Selection::All, "fx", false);
                }
                4 => {
                    scheduler.stop(Selection::Elements(&elements[2..3]), None::<&str>, false);
                }
                _ => {}
            }
            scheduler.verify_integrity().unwrap();
            now += 25.0;
        }
        assert!(!scheduler.has_active_animations());
        assert_eq!(scheduler.queued_count(), 0);
        assert_eq!(scheduler.call_count(), 0);
        assert_eq!(scheduler.group_count(), 0);
    }

    #[test]
    fn test_panicking_callback_does_not_wedge_the_scheduler() {
        let (mut scheduler, sink) = scheduler();
        let card = scheduler.add_element("card");
        let other = scheduler.add_element("other");
        scheduler
            .animate(
                &[card],
                &[left(100.0)],
                AnimationOptions::new()
                    .duration(100.0)
                    .on_begin(|_, _| panic!("begin exploded")),
            )
            .unwrap();

        let result = catch_unwind(AssertUnwindSafe(|| scheduler.tick_at(0.0)));
        assert!(result.is_err());
        scheduler.verify_integrity().unwrap();

        let set = scheduler
            .animate(&[other], &[left(50.0)], AnimationOptions::new().duration(10.0))
            .unwrap();
        scheduler.tick_at(100.0);
        assert_eq!(scheduler.state(set.calls()[0]), None);
        assert_eq!(sink.last_value(other, "left").as_deref(), Some("50px"));
        assert!(!scheduler.has_active_animations());
    }

    #[test]
    fn test_lane_finish_time_delays_call_after_early_retirement() {
        let sink = RecordingSink::new();
        let config = SchedulerConfig::testing().with_fps(50).with_mock(true);
        let mut scheduler = AnimationScheduler::with_config(config).with_sink(sink);
        let card = scheduler.add_element("card");
        let starts = Rc::new(RefCell::new(Vec::new()));
        let record = starts.clone();

        scheduler
            .animate(&[card], &[left(10.0)], AnimationOptions::new().duration(100.0))
            .unwrap();
        scheduler
            .animate(
                &[card],
                &[left(20.0)],
                AnimationOptions::new()
                    .duration(100.0)
                    .on_progress(move |_, progress| {
                        record
                            .borrow_mut()
                            .push((progress.time_start, progress.remaining_ms));
                        Ok(())
                    }),
            )
            .unwrap();

        // First call starts at -20 and retires at once; its nominal end is 80
        scheduler.tick_at(0.0);
        scheduler.tick_at(20.0);

        assert_eq!(*starts.borrow(), vec![(80.0, 160.0)]);
    }

    #[test]
    fn test_idle_scheduler_restarts_frame_clock() {
        let (mut scheduler, sink) = scheduler();
        let card = scheduler.add_element("card");
        assert!(!scheduler.tick_at(0.0));

        scheduler
            .animate(&[card], &[left(100.0)], AnimationOptions::new().duration(100.0))
            .unwrap();
        // A long idle gap is not charged to the new animation
        scheduler.tick_at(10_000.0);
        assert_near(px(&sink, card, "left"), 20.0);
    }
}
