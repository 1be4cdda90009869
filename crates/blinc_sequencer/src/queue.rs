//! Queue lanes
//!
//! Every element owns a [`QueueIndex`]: one FIFO lane per queue name. A call
//! admitted to an idle lane runs immediately and holds the lane until it
//! retires; calls admitted to a busy lane are parked behind it and promoted
//! one at a time. Calls with [`Queue::Unqueued`] never enter a lane.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::call::CallId;
use crate::error::SequencerError;

/// Queue assignment of a call
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "QueueSetting", into = "QueueSetting")]
pub enum Queue {
    /// A named FIFO lane (the default lane is the empty name)
    Named(String),
    /// Run immediately, in parallel with anything else on the element
    Unqueued,
}

impl Queue {
    pub fn named(name: impl Into<String>) -> Self {
        Queue::Named(name.into())
    }

    /// Lane name, or `None` for unqueued calls
    pub fn lane(&self) -> Option<&str> {
        match self {
            Queue::Named(name) => Some(name),
            Queue::Unqueued => None,
        }
    }

    pub fn is_unqueued(&self) -> bool {
        matches!(self, Queue::Unqueued)
    }
}

impl Default for Queue {
    fn default() -> Self {
        Queue::Named(String::new())
    }
}

impl From<&str> for Queue {
    fn from(name: &str) -> Self {
        Queue::Named(name.to_string())
    }
}

impl From<String> for Queue {
    fn from(name: String) -> Self {
        Queue::Named(name)
    }
}

/// Serialized form of a queue: a lane name or `false`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum QueueSetting {
    Name(String),
    Flag(bool),
}

impl TryFrom<QueueSetting> for Queue {
    type Error = SequencerError;

    fn try_from(setting: QueueSetting) -> Result<Self, Self::Error> {
        match setting {
            QueueSetting::Name(name) => Ok(Queue::Named(name)),
            QueueSetting::Flag(false) => Ok(Queue::Unqueued),
            QueueSetting::Flag(true) => Err(SequencerError::InvalidQueue(
                "`true` is not a queue; use a lane name or `false`".to_string(),
            )),
        }
    }
}

impl From<Queue> for QueueSetting {
    fn from(queue: Queue) -> Self {
        match queue {
            Queue::Named(name) => QueueSetting::Name(name),
            Queue::Unqueued => QueueSetting::Flag(false),
        }
    }
}

/// Which calls a finish/stop/pause sweep applies to, by queue
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum QueueFilter {
    /// Ignore queue matching
    #[default]
    Any,
    /// Only calls whose effective queue equals this one
    Only(Queue),
}

impl QueueFilter {
    pub fn matches(&self, queue: &Queue) -> bool {
        match self {
            QueueFilter::Any => true,
            QueueFilter::Only(wanted) => wanted == queue,
        }
    }
}

/// Queue argument accepted by `finish` and `stop`
///
/// Mirrors the loose argument of the public call: omitted, a lane name,
/// `false` for the unqueued lane, or `true` as shorthand for "any queue,
/// and include calls linked during this pass".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum QueueArg {
    #[default]
    Omitted,
    Lane(Queue),
    Everything,
}

impl QueueArg {
    /// Resolve into a filter and the effective finish-all flag
    pub fn resolve(self, all: bool) -> (QueueFilter, bool) {
        match self {
            QueueArg::Omitted => (QueueFilter::Any, all),
            QueueArg::Lane(queue) => (QueueFilter::Only(queue), all),
            QueueArg::Everything => (QueueFilter::Any, true),
        }
    }
}

impl From<&str> for QueueArg {
    fn from(name: &str) -> Self {
        QueueArg::Lane(Queue::from(name))
    }
}

impl From<String> for QueueArg {
    fn from(name: String) -> Self {
        QueueArg::Lane(Queue::Named(name))
    }
}

impl From<Queue> for QueueArg {
    fn from(queue: Queue) -> Self {
        QueueArg::Lane(queue)
    }
}

impl From<bool> for QueueArg {
    fn from(flag: bool) -> Self {
        if flag {
            QueueArg::Everything
        } else {
            QueueArg::Lane(Queue::Unqueued)
        }
    }
}

impl<T: Into<QueueArg>> From<Option<T>> for QueueArg {
    fn from(arg: Option<T>) -> Self {
        arg.map_or(QueueArg::Omitted, Into::into)
    }
}

/// Outcome of admitting a call to a lane
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// The lane was idle; the call now holds it and should be activated
    Run,
    /// The lane is busy; the call waits behind the current holder
    Parked,
}

/// Per-element FIFO lanes keyed by queue name
///
/// A lane that is present is busy (some call holds it); its deque holds the
/// calls waiting behind the holder. An absent lane is idle.
#[derive(Debug, Default)]
pub struct QueueIndex {
    lanes: FxHashMap<String, VecDeque<CallId>>,
}

impl QueueIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a call to `lane`
    pub fn admit(&mut self, lane: &str, call: CallId) -> Admission {
        match self.lanes.get_mut(lane) {
            Some(pending) => {
                pending.push_back(call);
                Admission::Parked
            }
            None => {
                self.lanes.insert(lane.to_string(), VecDeque::new());
                Admission::Run
            }
        }
    }

    /// The holder of `lane` retired: hand the lane to the next parked call
    ///
    /// Returns the call to activate, or `None` after releasing the lane.
    pub fn advance(&mut self, lane: &str) -> Option<CallId> {
        let pending = self.lanes.get_mut(lane)?;
        match pending.pop_front() {
            Some(next) => Some(next),
            None => {
                self.lanes.remove(lane);
                None
            }
        }
    }

    /// Remove a parked call without touching the lane holder
    pub fn withdraw(&mut self, lane: &str, call: CallId) -> bool {
        let Some(pending) = self.lanes.get_mut(lane) else {
            return false;
        };
        match pending.iter().position(|&id| id == call) {
            Some(index) => {
                pending.remove(index);
                true
            }
            None => false,
        }
    }

    /// Whether some call currently holds `lane`
    pub fn is_busy(&self, lane: &str) -> bool {
        self.lanes.contains_key(lane)
    }

    /// Calls parked on `lane`, front first
    pub fn pending(&self, lane: &str) -> impl Iterator<Item = CallId> + '_ {
        self.lanes.get(lane).into_iter().flatten().copied()
    }

    /// Whether `call` is parked on any lane
    pub fn contains(&self, call: CallId) -> bool {
        self.lanes.values().any(|pending| pending.contains(&call))
    }

    /// How many times `call` is parked across all lanes
    pub fn occurrences(&self, call: CallId) -> usize {
        self.lanes
            .values()
            .map(|pending| pending.iter().filter(|&&id| id == call).count())
            .sum()
    }

    /// Total number of parked calls across all lanes
    pub fn parked_len(&self) -> usize {
        self.lanes.values().map(VecDeque::len).sum()
    }

    /// Names of busy lanes
    pub fn lanes(&self) -> impl Iterator<Item = &str> {
        self.lanes.keys().map(String::as_str)
    }

    /// Take every parked call and release every lane
    pub fn drain_all(&mut self) -> Vec<CallId> {
        self.lanes.drain().flat_map(|(_, pending)| pending).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<CallId> {
        let mut map: SlotMap<CallId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn test_first_admission_runs_rest_park() {
        let ids = ids(3);
        let mut index = QueueIndex::new();

        assert_eq!(index.admit("", ids[0]), Admission::Run);
        assert_eq!(index.admit("", ids[1]), Admission::Parked);
        assert_eq!(index.admit("", ids[2]), Admission::Parked);
        assert_eq!(index.pending("").collect::<Vec<_>>(), vec![ids[1], ids[2]]);
        assert_eq!(index.parked_len(), 2);
    }

    #[test]
    fn test_lanes_are_independent() {
        let ids = ids(2);
        let mut index = QueueIndex::new();

        assert_eq!(index.admit("fade", ids[0]), Admission::Run);
        assert_eq!(index.admit("slide", ids[1]), Admission::Run);
        assert!(index.is_busy("fade"));
        assert!(index.is_busy("slide"));
        assert!(!index.is_busy(""));
    }

    #[test]
    fn test_advance_promotes_in_order_then_releases() {
        let ids = ids(3);
        let mut index = QueueIndex::new();
        index.admit("", ids[0]);
        index.admit("", ids[1]);
        index.admit("", ids[2]);

        assert_eq!(index.advance(""), Some(ids[1]));
        assert_eq!(index.advance(""), Some(ids[2]));
        assert!(index.is_busy(""));
        assert_eq!(index.advance(""), None);
        assert!(!index.is_busy(""));
        assert_eq!(index.advance(""), None);
    }

    #[test]
    fn test_withdraw_leaves_holder_alone() {
        let ids = ids(3);
        let mut index = QueueIndex::new();
        index.admit("", ids[0]);
        index.admit("", ids[1]);
        index.admit("", ids[2]);

        assert!(index.withdraw("", ids[1]));
        assert!(!index.withdraw("", ids[1]));
        assert!(!index.contains(ids[1]));
        assert!(index.contains(ids[2]));
        assert_eq!(index.advance(""), Some(ids[2]));
    }

    #[test]
    fn test_queue_arg_true_means_everything() {
        assert_eq!(QueueArg::from(true).resolve(false), (QueueFilter::Any, true));
        assert_eq!(
            QueueArg::from(false).resolve(false),
            (QueueFilter::Only(Queue::Unqueued), false)
        );
        assert_eq!(
            QueueArg::from("fx").resolve(true),
            (QueueFilter::Only(Queue::named("fx")), true)
        );
        assert_eq!(QueueArg::from(None::<&str>), QueueArg::Omitted);
    }

    #[test]
    fn test_queue_setting_round_trip_through_toml() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            queue: Queue,
        }
        let named: Wrapper = toml::from_str("queue = \"fx\"").unwrap();
        assert_eq!(named.queue, Queue::named("fx"));
        let off: Wrapper = toml::from_str("queue = false").unwrap();
        assert_eq!(off.queue, Queue::Unqueued);
        assert!(toml::from_str::<Wrapper>("queue = true").is_err());
    }
}
