//! LED feedback mapping.
//!
//! A pure function from surface state to per-LED requests, recomputed
//! after everything else in the control tick. Blink pattern timing is
//! owned by the LED device abstraction on the host side; this module only
//! says what each LED should do now.

use serde::Serialize;

use crate::control::layer::Layer;

/// Input level above which the peak indicator takes over.
pub const PEAK_THRESHOLD: f32 = 0.7;

/// What one LED should do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedRequest {
    #[default]
    Off,
    On,
    /// Intensity in [0, 1].
    Level(f32),
    /// Blink this many times; pattern timing is the device's business.
    Blink(u8),
}

/// Everything the mapping needs, gathered by the surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct LedInputs {
    /// Running input metering value in [0, 1].
    pub input_level: f32,
    /// Current modulation waveform value, roughly [-0.5, 0.5].
    pub mod_value: f32,
    /// Mod level parameter in [0, 1].
    pub mod_level: f32,
    /// A clock tick was detected this control tick.
    pub clock_tick: bool,
    pub layer: Layer,
    pub shift_on: bool,
    /// A save completed this tick (double-blink the active amount LED).
    pub save_completed: bool,
    /// An external random gate fired this tick.
    pub random_triggered: bool,
    /// A slewed randomization completed this tick.
    pub random_completed: bool,
    /// A randomization session is running.
    pub random_active: bool,
}

/// Requests for the full LED complement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LedOutputs {
    pub input: LedRequest,
    pub input_peak: LedRequest,
    pub sync: LedRequest,
    pub mod_depth: LedRequest,
    pub random: LedRequest,
    pub random_map: LedRequest,
    pub shift: LedRequest,
    pub mod_amount: LedRequest,
    pub cv_amount: LedRequest,
}

/// Linear remap of `value` from one range to another, unclamped.
fn map_range(value: f32, in_lo: f32, in_hi: f32, out_lo: f32, out_hi: f32) -> f32 {
    out_lo + (value - in_lo) * (out_hi - out_lo) / (in_hi - in_lo)
}

/// Compute every LED request from the tick's state.
pub fn feedback(inputs: &LedInputs) -> LedOutputs {
    let mut out = LedOutputs::default();

    // Input metering over the low range; the peak LED takes over above
    // the threshold.
    if inputs.input_level < PEAK_THRESHOLD {
        out.input = LedRequest::Level(map_range(inputs.input_level, 0.0, 1.0, 0.5, 1.0));
        out.input_peak = LedRequest::Off;
    } else {
        out.input = LedRequest::Off;
        out.input_peak = LedRequest::On;
    }

    // Mod depth: waveform scaled by mod level, clipped below center.
    let depth = map_range(
        inputs.mod_value,
        -0.5,
        0.5,
        0.49,
        0.5 + inputs.mod_level * 0.5,
    );
    out.mod_depth = if depth < 0.5 {
        LedRequest::Level(0.0)
    } else {
        LedRequest::Level(depth)
    };

    if inputs.clock_tick {
        out.sync = LedRequest::Blink(1);
    }

    // Layer indication.
    out.shift = match inputs.layer {
        Layer::Alt | Layer::Cv => LedRequest::On,
        _ => LedRequest::Off,
    };
    out.mod_amount = if inputs.layer == Layer::Mod {
        LedRequest::On
    } else {
        LedRequest::Off
    };
    out.cv_amount = if inputs.layer == Layer::Cv {
        LedRequest::On
    } else {
        LedRequest::Off
    };
    out.random_map = if inputs.layer == Layer::Rnd {
        LedRequest::On
    } else {
        LedRequest::Off
    };

    if inputs.random_active {
        out.random = LedRequest::On;
    }

    // One-shot completion blinks override the steady states.
    if inputs.save_completed {
        if inputs.shift_on {
            out.cv_amount = LedRequest::Blink(2);
        } else {
            out.mod_amount = LedRequest::Blink(2);
        }
    }
    if inputs.random_triggered {
        out.random = LedRequest::Blink(1);
    }
    if inputs.random_completed {
        out.random = LedRequest::Blink(2);
    }

    out
}
