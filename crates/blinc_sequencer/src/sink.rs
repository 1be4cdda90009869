//! Property sinks
//!
//! The scheduler never renders anything itself: every computed value is
//! committed through a [`PropertySink`] (or a tween's own setter).

use std::cell::RefCell;
use std::rc::Rc;

use crate::element::ElementId;

/// Receives computed property values
pub trait PropertySink {
    fn set_property_value(&mut self, element: ElementId, property: &str, value: &str);
}

impl<F> PropertySink for F
where
    F: FnMut(ElementId, &str, &str),
{
    fn set_property_value(&mut self, element: ElementId, property: &str, value: &str) {
        self(element, property, value)
    }
}

/// Sink that discards every value
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl PropertySink for NullSink {
    fn set_property_value(&mut self, _element: ElementId, _property: &str, _value: &str) {}
}

/// A value committed to an element
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyWrite {
    pub element: ElementId,
    pub property: String,
    pub value: String,
}

/// Sink that records every write into a shared log
///
/// Clones share the same log, so one copy can be handed to the scheduler
/// while another is kept for inspection.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    writes: Rc<RefCell<Vec<PropertyWrite>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All writes so far, oldest first
    pub fn writes(&self) -> Vec<PropertyWrite> {
        self.writes.borrow().clone()
    }

    /// Most recent value written for `property` on `element`
    pub fn last_value(&self, element: ElementId, property: &str) -> Option<String> {
        self.writes
            .borrow()
            .iter()
            .rev()
            .find(|w| w.element == element && w.property == property)
            .map(|w| w.value.clone())
    }

    pub fn len(&self) -> usize {
        self.writes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.writes.borrow_mut().clear();
    }
}

impl PropertySink for RecordingSink {
    fn set_property_value(&mut self, element: ElementId, property: &str, value: &str) {
        self.writes.borrow_mut().push(PropertyWrite {
            element,
            property: property.to_string(),
            value: value.to_string(),
        });
    }
}
