//! Scheduler configuration
//!
//! Defaults applied to calls that don't override them. Loadable from TOML:
//!
//! ```toml
//! duration_ms = 250.0
//! easing = "ease-out"
//! queue = false
//! fps = 120
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::easing::Easing;
use crate::error::Result;
use crate::queue::Queue;

/// Process-wide animation defaults for one scheduler
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Duration of calls without an explicit duration (ms)
    pub duration_ms: f64,
    /// Delay before a call starts (ms)
    pub delay_ms: f64,
    /// Easing of calls and tweens without an explicit easing
    pub easing: Easing,
    /// Queue of calls without an explicit queue; `false` disables queueing
    pub queue: Queue,
    /// Target frame rate; ticks closer together than one frame are skipped
    pub fps: u32,
    /// Complete every call on its first frame (for tests and reduced motion)
    pub mock: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl SchedulerConfig {
    /// Standard configuration for general use.
    pub fn standard() -> Self {
        Self {
            duration_ms: 400.0,
            delay_ms: 0.0,
            easing: Easing::Swing,
            queue: Queue::default(),
            fps: 60,
            mock: false,
        }
    }

    /// Testing configuration: linear easing, no frame throttling
    pub fn testing() -> Self {
        Self {
            easing: Easing::Linear,
            fps: 0,
            ..Self::standard()
        }
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Minimum time between processed frames (ms); 0 disables throttling
    pub fn min_frame_time(&self) -> f64 {
        if self.fps == 0 {
            0.0
        } else {
            1000.0 / f64::from(self.fps)
        }
    }

    /// Nominal frame length used for the very first frame (ms)
    pub(crate) fn frame_time(&self) -> f64 {
        match self.fps {
            0 => 1000.0 / 60.0,
            fps => 1000.0 / f64::from(fps),
        }
    }

    pub fn with_duration(mut self, ms: f64) -> Self {
        self.duration_ms = ms;
        self
    }

    pub fn with_delay(mut self, ms: f64) -> Self {
        self.delay_ms = ms;
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_queue(mut self, queue: impl Into<Queue>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_mock(mut self, mock: bool) -> Self {
        self.mock = mock;
        self
    }
}
