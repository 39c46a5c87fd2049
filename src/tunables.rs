//! Timing and threshold constants for the control core.
//!
//! Every timer in the surface is a plain control-tick counter, never a
//! wall-clock timer, so a given `Tunables` makes the whole core
//! deterministic and sample-accurate under test.

use serde::{Deserialize, Serialize};

/// Tunable limits and thresholds, all in control ticks or normalized units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tunables {
    /// Ticks the primary button must be held (strictly exceeded) before a
    /// save is armed.
    pub save_limit: u32,
    /// Ticks the reset combo must be held (strictly exceeded) before the
    /// parameter reset fires.
    pub reset_limit: u32,
    /// Panel holds longer than this randomize with a slew of `1/held`;
    /// shorter holds randomize instantly.
    pub random_slew_ticks: u32,
    /// Catch-up window as a fraction of control range.
    pub catch_up_epsilon: f32,
    /// Output level change per tick while fading for a save.
    pub fade_increment: f32,
    /// Schmitt trigger arming threshold (input must rise above this).
    pub trigger_high: f32,
    /// Schmitt trigger re-arm threshold (input must fall below this).
    pub trigger_low: f32,
    /// Fader readings at or above this snap to exactly 1.0.
    pub fader_top: f32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            save_limit: 384,
            reset_limit: 384,
            random_slew_ticks: 48,
            catch_up_epsilon: 0.01,
            fade_increment: 0.05,
            trigger_high: 0.5,
            trigger_low: 0.2,
            fader_top: 0.98,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let t = Tunables::default();
        assert!(t.trigger_low < t.trigger_high);
        assert!(t.catch_up_epsilon > 0.0 && t.catch_up_epsilon < 0.1);
        assert!(t.fade_increment > 0.0 && t.fade_increment <= 1.0);
        assert!(t.fader_top < 1.0);
    }
}
