//! Button edge detection and hold tracking.
//!
//! [`SchmittTrigger`] is the debounce primitive: a rising edge only fires
//! after the input has cleared below the low threshold, so chatter around
//! a single threshold cannot retrigger. [`ButtonState`] layers a latched
//! on/off level and a consumable press edge on top for the monitored
//! panel buttons.

/// Hysteresis-based edge detector.
///
/// `process` returns `true` exactly once per excursion above the high
/// threshold; the input must fall below the low threshold before the
/// trigger re-arms.
#[derive(Debug, Clone)]
pub struct SchmittTrigger {
    high: f32,
    low: f32,
    state: bool,
}

impl SchmittTrigger {
    pub fn new(high: f32, low: f32) -> Self {
        Self {
            high,
            low,
            state: false,
        }
    }

    /// Feed one sample. Returns `true` on the arming edge.
    pub fn process(&mut self, input: f32) -> bool {
        if self.state {
            if input < self.low {
                self.state = false;
            }
            false
        } else if input > self.high {
            self.state = true;
            true
        } else {
            false
        }
    }

    /// Current latched state (high until the input clears below `low`).
    pub fn is_high(&self) -> bool {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = false;
    }
}

/// State for one monitored panel button.
///
/// Levels arrive as asynchronous edge notifications and are applied via
/// [`ButtonState::set_level`]; the arbiter reads the latched level and
/// the press edge once per control tick and keeps its own hold counters,
/// since every hold it times is gated by a button combination.
#[derive(Debug, Clone)]
pub struct ButtonState {
    trigger: SchmittTrigger,
    on: bool,
    pressed_edge: bool,
}

impl ButtonState {
    pub fn new(high: f32, low: f32) -> Self {
        Self {
            trigger: SchmittTrigger::new(high, low),
            on: false,
            pressed_edge: false,
        }
    }

    /// Apply a buffered level notification.
    pub fn set_level(&mut self, level: f32) {
        if self.trigger.process(level) {
            self.pressed_edge = true;
        }
        self.on = self.trigger.is_high();
    }

    /// Current on/off level.
    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Consume the rising-edge flag. Returns `true` at most once per press.
    pub fn take_pressed_edge(&mut self) -> bool {
        std::mem::take(&mut self.pressed_edge)
    }
}
