//! Animation targets
//!
//! Elements are opaque to the scheduler beyond identity; each one carries
//! its queue lanes and bookkeeping used to chain queued calls in time.

use rustc_hash::FxHashMap;
use slotmap::new_key_type;

use crate::queue::QueueIndex;

new_key_type! {
    /// Handle to an element registered with a scheduler
    pub struct ElementId;
}

/// Per-element scheduling state
#[derive(Debug, Default)]
pub struct ElementData {
    /// Debug label (e.g. a node path)
    pub(crate) label: String,
    /// Pending calls per queue lane
    pub(crate) queues: QueueIndex,
    /// Nominal end time of the last call that finished naturally on each
    /// lane (ms)
    ///
    /// The next call on the lane never starts before this. Only calls that
    /// retire ahead of their nominal end (mock mode) leave it later than the
    /// promoting frame.
    pub(crate) last_finish: FxHashMap<String, f64>,
    /// Calls currently in the active list for this element
    pub(crate) active_calls: usize,
    /// Set once removal starts
    pub(crate) removing: bool,
}

impl ElementData {
    pub(crate) fn new(label: String) -> Self {
        Self {
            label,
            ..Self::default()
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn queues(&self) -> &QueueIndex {
        &self.queues
    }

    /// Whether any call for this element is in the active list
    pub fn is_animating(&self) -> bool {
        self.active_calls > 0
    }
}
