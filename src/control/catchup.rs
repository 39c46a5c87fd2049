//! Soft takeover for layered controls.
//!
//! When the active layer changes, the physical control is usually nowhere
//! near the value stored for the new layer. The tracker holds the stored
//! value until the control reaches it, then hands over 1:1 tracking.
//! Catch happens either inside the epsilon window or when the reading
//! crosses the target (the sign of the distance flips between ticks),
//! whichever fires first.

use crate::control::layer::Layer;

/// Outcome of one tracker step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved {
    /// Not caught up: the stored value stands, the reading is discarded.
    Held(f32),
    /// Caught up: the reading is live and becomes the new stored value.
    Live(f32),
}

impl Resolved {
    pub fn value(self) -> f32 {
        match self {
            Resolved::Held(v) | Resolved::Live(v) => v,
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, Resolved::Live(_))
    }
}

/// Per-binding takeover state machine.
#[derive(Debug, Clone)]
pub struct CatchUpTracker {
    epsilon: f32,
    /// Layer observed at the previous tick. `None` before the first read:
    /// the first read is always treated as caught up so the control is
    /// live without requiring motion.
    layer: Option<Layer>,
    caught_up: bool,
    prev_delta: Option<f32>,
}

impl CatchUpTracker {
    pub fn new(epsilon: f32) -> Self {
        Self {
            epsilon,
            layer: None,
            caught_up: true,
            prev_delta: None,
        }
    }

    pub fn is_caught_up(&self) -> bool {
        self.caught_up
    }

    /// Force a new takeover without a layer change. Used when the stored
    /// value moves underneath the control (load, reset, randomize, undo).
    pub fn invalidate(&mut self) {
        self.caught_up = false;
        self.prev_delta = None;
    }

    /// Record the layer active this tick without reading the control.
    /// Bindings that mean nothing in the current layer still need the
    /// layer change noticed, so returning to a layer they do target
    /// starts a fresh takeover.
    pub fn observe_layer(&mut self, layer: Layer) {
        match self.layer {
            // First observation keeps the startup state: live unless a
            // load already invalidated the tracker.
            None => self.layer = Some(layer),
            Some(previous) if previous != layer => {
                self.caught_up = false;
                self.prev_delta = None;
                self.layer = Some(layer);
            }
            _ => {}
        }
    }

    /// Run one tick against the stored value for the active layer.
    pub fn process(&mut self, physical: f32, layer: Layer, stored: f32) -> Resolved {
        self.observe_layer(layer);

        if self.caught_up {
            return Resolved::Live(physical);
        }

        let delta = physical - stored;
        let crossed = matches!(self.prev_delta, Some(prev) if prev != 0.0 && prev.signum() != delta.signum());
        self.prev_delta = Some(delta);

        if delta.abs() <= self.epsilon || crossed {
            self.caught_up = true;
            Resolved::Live(physical)
        } else {
            Resolved::Held(stored)
        }
    }
}
