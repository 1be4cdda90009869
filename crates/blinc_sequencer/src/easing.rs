//! Easing functions
//!
//! A small built-in set of timing curves. Each curve maps linear progress in
//! `0.0..=1.0` to eased progress; `interpolate` applies it between two values.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Timing curve applied to a tween's progress
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    Linear,
    /// Half-cosine curve, slightly slower at both ends
    #[default]
    Swing,
    EaseIn,
    EaseOut,
    EaseInOut,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
    /// Jump straight to the end value once progress reaches 1
    Step,
}

impl Easing {
    /// Map linear progress `t` to eased progress
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::Swing => 0.5 - (t * PI).cos() / 2.0,
            Easing::EaseIn => t * t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::EaseInCubic => t * t * t,
            Easing::EaseOutCubic => {
                let u = t - 1.0;
                u * u * u + 1.0
            }
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = 2.0 * t - 2.0;
                    0.5 * u * u * u + 1.0
                }
            }
            Easing::Step => {
                if t >= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Interpolate between `start` and `end` at linear progress `t`
    pub fn interpolate(self, t: f64, start: f64, end: f64) -> f64 {
        start + (end - start) * self.apply(t)
    }
}
