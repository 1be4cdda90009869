//! Error types for blinc_sequencer

use thiserror::Error;

use crate::call::CallState;

/// Errors that can occur while scheduling animations
#[derive(Error, Debug)]
pub enum SequencerError {
    /// The element id does not belong to this scheduler
    #[error("unknown element: {0}")]
    UnknownElement(String),

    /// Two tweens in the same call target the same property
    #[error("property `{0}` is animated twice in the same call")]
    DuplicateProperty(String),

    /// A tween sequence was built without keyframes
    #[error("tween sequence has no keyframes")]
    EmptySequence,

    /// A keyframe carries more values than its pattern has slots
    #[error("keyframe has {values} values but the pattern has {slots} slots")]
    PatternMismatch { values: usize, slots: usize },

    /// A queue setting could not be interpreted
    #[error("invalid queue setting: {0}")]
    InvalidQueue(String),

    /// Configuration could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// A call was asked to move to a state it cannot reach
    #[error("invalid call state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: CallState, to: CallState },

    /// The active list and queue indexes disagree about a call
    #[error("scheduler integrity violation: {0}")]
    Integrity(String),
}

impl From<toml::de::Error> for SequencerError {
    fn from(err: toml::de::Error) -> Self {
        SequencerError::Config(err.to_string())
    }
}

impl From<std::io::Error> for SequencerError {
    fn from(err: std::io::Error) -> Self {
        SequencerError::Config(err.to_string())
    }
}

/// Result type for blinc_sequencer operations
pub type Result<T> = std::result::Result<T, SequencerError>;
