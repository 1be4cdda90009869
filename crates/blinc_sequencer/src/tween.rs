//! Tweens: one property's animation plan within a call
//!
//! A property value is described by a [`Pattern`] of literal and numeric
//! slots. Each [`Keyframe`] supplies a number for the numeric slots (or
//! `None` to keep the literal), so `"translate(10px, 20px)"` animates as the
//! two numbers while the surrounding text stays fixed. Parsing values into
//! patterns happens outside this crate.

use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;

use crate::easing::Easing;
use crate::element::ElementId;
use crate::error::{Result, SequencerError};

/// Writes a computed literal onto an element, overriding the scheduler's sink
pub type SetterFn = Rc<dyn Fn(ElementId, &str, &str)>;

/// Lazily builds a tween's sequence the first time the call is validated
pub type ResolveFn = Rc<dyn Fn(ElementId) -> anyhow::Result<Sequence>>;

/// One slot of a property value template
#[derive(Clone, Debug, PartialEq)]
pub enum PatternSlot {
    /// Text copied verbatim
    Literal(String),
    /// Animated number
    Number,
    /// Animated number rounded to an integer when rendered
    Integer,
}

impl PatternSlot {
    pub fn literal(text: impl Into<String>) -> Self {
        PatternSlot::Literal(text.into())
    }

    fn text(&self) -> &str {
        match self {
            PatternSlot::Literal(text) => text,
            PatternSlot::Number | PatternSlot::Integer => "",
        }
    }

    fn render(&self, value: f64, out: &mut String) {
        use std::fmt::Write;
        let value = match self {
            PatternSlot::Integer => value.round(),
            _ => value,
        };
        // Avoid rendering "-0"
        let value = if value == 0.0 { 0.0 } else { value };
        let _ = write!(out, "{value}");
    }
}

/// Template describing which parts of a value are numeric
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pattern {
    slots: SmallVec<[PatternSlot; 4]>,
}

impl Pattern {
    pub fn new(slots: impl IntoIterator<Item = PatternSlot>) -> Self {
        Self {
            slots: slots.into_iter().collect(),
        }
    }

    /// A single number followed by a unit suffix, e.g. `10px`
    pub fn with_unit(unit: &str) -> Self {
        if unit.is_empty() {
            Self::new([PatternSlot::Number])
        } else {
            Self::new([PatternSlot::Number, PatternSlot::literal(unit)])
        }
    }

    pub fn slots(&self) -> &[PatternSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Values for every numeric slot at one point of a sequence
#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
    /// Position in the call's progress (0.0 to 1.0)
    pub percent: f64,
    /// Easing used when transitioning TO this keyframe
    pub easing: Option<Easing>,
    values: SmallVec<[Option<f64>; 4]>,
}

impl Keyframe {
    pub fn new(percent: f64, values: impl IntoIterator<Item = Option<f64>>) -> Self {
        Self {
            percent,
            easing: None,
            values: values.into_iter().collect(),
        }
    }

    /// Keyframe whose values are all numeric, in slot order
    pub fn numbers(percent: f64, values: impl IntoIterator<Item = f64>) -> Self {
        Self::new(percent, values.into_iter().map(Some))
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    /// Value for slot `index`, `None` when the template literal applies
    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }
}

/// Ordered keyframes of a property plus the pattern they fill in
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    pattern: Pattern,
    keyframes: Vec<Keyframe>,
}

impl Sequence {
    /// Build a sequence; keyframes are sorted by percent
    pub fn new(pattern: Pattern, mut keyframes: Vec<Keyframe>) -> Result<Self> {
        if keyframes.is_empty() {
            return Err(SequencerError::EmptySequence);
        }
        if let Some(frame) = keyframes.iter().find(|k| k.values.len() > pattern.len()) {
            return Err(SequencerError::PatternMismatch {
                values: frame.values.len(),
                slots: pattern.len(),
            });
        }
        keyframes.sort_by(|a, b| a.percent.total_cmp(&b.percent));
        Ok(Self { pattern, keyframes })
    }

    /// Two-keyframe sequence for a single number with a unit
    pub fn from_to(start: f64, end: f64, unit: &str) -> Self {
        Self {
            pattern: Pattern::with_unit(unit),
            keyframes: vec![
                Keyframe::numbers(0.0, [start]),
                Keyframe::numbers(1.0, [end]),
            ],
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// The end value: the final keyframe substituted into the pattern
    pub fn final_literal(&self) -> String {
        let mut out = String::new();
        // Constructors guarantee at least one keyframe
        let Some(last) = self.keyframes.last() else {
            return out;
        };
        for (index, slot) in self.pattern.slots.iter().enumerate() {
            match last.value(index) {
                Some(value) => slot.render(value, &mut out),
                None => out.push_str(slot.text()),
            }
        }
        out
    }

    /// Render the value at linear progress `percent`
    ///
    /// The surrounding keyframe pair is picked from `percent`; the segment is
    /// eased with the destination keyframe's easing, falling back to `easing`.
    pub fn sample(&self, percent: f64, easing: Easing) -> String {
        if percent >= 1.0 {
            return self.final_literal();
        }
        let frames = &self.keyframes;
        let mut best = 0;
        for (index, frame) in frames.iter().enumerate().take(frames.len() - 1) {
            if frame.percent < percent {
                best = index;
            }
        }
        let from = &frames[best];
        let to = frames.get(best + 1).unwrap_or(from);
        let span = to.percent - from.percent;
        let local = if span > 0.0 {
            ((percent - from.percent) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let segment_easing = to.easing.unwrap_or(easing);

        let mut out = String::new();
        for (index, slot) in self.pattern.slots.iter().enumerate() {
            match (from.value(index), to.value(index)) {
                (None, _) => out.push_str(slot.text()),
                (Some(start), Some(end)) if start != end => {
                    slot.render(segment_easing.interpolate(local, start, end), &mut out)
                }
                (Some(start), _) => slot.render(start, &mut out),
            }
        }
        out
    }
}

#[derive(Clone)]
enum Plan {
    Resolved(Sequence),
    Deferred(ResolveFn),
}

/// One property's interpolation plan
#[derive(Clone)]
pub struct Tween {
    property: String,
    plan: Plan,
    easing: Option<Easing>,
    setter: Option<SetterFn>,
}

impl Tween {
    pub fn new(property: impl Into<String>, sequence: Sequence) -> Self {
        Self {
            property: property.into(),
            plan: Plan::Resolved(sequence),
            easing: None,
            setter: None,
        }
    }

    /// Convenience for a single number with a unit
    pub fn from_to(property: impl Into<String>, start: f64, end: f64, unit: &str) -> Self {
        Self::new(property, Sequence::from_to(start, end, unit))
    }

    /// Tween whose sequence is computed per element on first validation
    ///
    /// Typically used to read the element's current value as the start
    /// keyframe at the moment the call actually begins.
    pub fn deferred<F>(property: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(ElementId) -> anyhow::Result<Sequence> + 'static,
    {
        Self {
            property: property.into(),
            plan: Plan::Deferred(Rc::new(resolve)),
            easing: None,
            setter: None,
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(ElementId, &str, &str) + 'static,
    {
        self.setter = Some(Rc::new(setter));
        self
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn easing(&self) -> Option<Easing> {
        self.easing
    }

    pub fn setter(&self) -> Option<&SetterFn> {
        self.setter.as_ref()
    }

    /// The sequence, once resolved
    pub fn sequence(&self) -> Option<&Sequence> {
        match &self.plan {
            Plan::Resolved(sequence) => Some(sequence),
            Plan::Deferred(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.plan, Plan::Resolved(_))
    }

    /// Run a deferred resolver; a no-op once resolved
    pub(crate) fn resolve(&mut self, element: ElementId) -> anyhow::Result<()> {
        if let Plan::Deferred(resolve) = &self.plan {
            let sequence = resolve(element)?;
            self.plan = Plan::Resolved(sequence);
        }
        Ok(())
    }
}

impl fmt::Debug for Tween {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tween")
            .field("property", &self.property)
            .field("sequence", &self.sequence())
            .field("easing", &self.easing)
            .field("custom_setter", &self.setter.is_some())
            .finish()
    }
}
