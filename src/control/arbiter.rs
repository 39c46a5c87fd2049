//! Layer arbitration from button combinations.
//!
//! The arbiter is a finite-state machine over the four monitored buttons
//! (Shift, Mod/Cv, Random, RandomMap). It decides the active layer, arms
//! the long-press save, fires the reset combo exactly once per hold, and
//! raises undo/redo and randomize-release events. It runs once per
//! control tick and is fed exclusively from the buffered edge queue, so
//! there is no concurrent mutation and no reentrancy within a tick.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::control::button::ButtonState;
use crate::control::layer::Layer;
use crate::tunables::Tunables;

/// The monitored panel buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonId {
    Shift,
    ModCv,
    Random,
    RandomMap,
}

impl ButtonId {
    fn index(self) -> usize {
        match self {
            ButtonId::Shift => 0,
            ButtonId::ModCv => 1,
            ButtonId::Random => 2,
            ButtonId::RandomMap => 3,
        }
    }
}

/// A buffered button notification from the host.
///
/// `sample_offset` is the position within the audio block where the edge
/// was observed; the arbiter applies all events synchronously at the next
/// control tick regardless.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButtonEvent {
    pub button: ButtonId,
    pub level: f32,
    pub sample_offset: u32,
}

impl ButtonEvent {
    pub fn press(button: ButtonId) -> Self {
        Self {
            button,
            level: 1.0,
            sample_offset: 0,
        }
    }

    pub fn release(button: ButtonId) -> Self {
        Self {
            button,
            level: 0.0,
            sample_offset: 0,
        }
    }
}

/// Facts the arbiter raises for the surface to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbiterEvent {
    LayerChanged { from: Layer, to: Layer },
    /// Long-press save armed. Raised exactly once per hold.
    SaveArmed,
    /// Reset every mapped binding of the given layer to neutral defaults.
    ResetLayer(Layer),
    /// Undo/redo of the last Normal-layer change (Alt layer only).
    UndoRedo,
    /// Panel random button released after being held this many ticks.
    RandomizeReleased { held_ticks: u32 },
}

/// Button-driven layer selection state machine.
#[derive(Debug, Clone)]
pub struct LayerArbiter {
    buttons: [ButtonState; 4],
    layer: Layer,
    previous_layer: Layer,

    save_limit: u32,
    reset_limit: u32,

    save_hold: u32,
    save_flag: bool,
    /// Layer frozen when the save armed, reinstated on release.
    armed_layer: Option<Layer>,

    combo_hold: u32,
    reset_fired: bool,

    random_hold: u32,
}

impl LayerArbiter {
    pub fn new(tunables: &Tunables) -> Self {
        let button = ButtonState::new(tunables.trigger_high, tunables.trigger_low);
        Self {
            buttons: [button.clone(), button.clone(), button.clone(), button],
            layer: Layer::Normal,
            previous_layer: Layer::Normal,
            save_limit: tunables.save_limit,
            reset_limit: tunables.reset_limit,
            save_hold: 0,
            save_flag: false,
            armed_layer: None,
            combo_hold: 0,
            reset_fired: false,
            random_hold: 0,
        }
    }

    /// Apply one buffered button notification.
    pub fn apply(&mut self, event: ButtonEvent) {
        self.buttons[event.button.index()].set_level(event.level);
    }

    /// Currently active layer.
    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Layer that was active before the last transition.
    pub fn previous_layer(&self) -> Layer {
        self.previous_layer
    }

    /// Whether a long-press save is armed and transitions are suppressed.
    pub fn save_pending(&self) -> bool {
        self.save_flag
    }

    pub fn is_on(&self, button: ButtonId) -> bool {
        self.buttons[button.index()].is_on()
    }

    /// Run one control tick; facts are pushed onto `events` in the order
    /// they occurred.
    pub fn tick(&mut self, events: &mut Vec<ArbiterEvent>) {
        // Drain edge flags every tick so a stale press can never fire
        // during a later, unrelated combination.
        let random_edge = self.buttons[ButtonId::Random.index()].take_pressed_edge();
        for id in [ButtonId::Shift, ButtonId::ModCv, ButtonId::RandomMap] {
            self.buttons[id.index()].take_pressed_edge();
        }

        let shift = self.is_on(ButtonId::Shift);
        let mod_cv = self.is_on(ButtonId::ModCv);
        let random = self.is_on(ButtonId::Random);
        let random_map = self.is_on(ButtonId::RandomMap);

        // Long-press save: Mod/Cv held without Shift. Holding for exactly
        // `save_limit` ticks is not enough; the counter must exceed it.
        let mut restore_tick = false;
        if mod_cv && !shift {
            self.save_hold = self.save_hold.saturating_add(1);
            if self.save_hold > self.save_limit && !self.save_flag {
                self.save_flag = true;
                self.armed_layer = Some(self.layer);
                debug!(held = self.save_hold, "save armed");
                events.push(ArbiterEvent::SaveArmed);
            }
        } else if !mod_cv {
            if self.save_flag {
                // Release ends the armed window and reinstates the layer
                // that was active when the save armed; the live button
                // state resolves again on the next tick.
                self.save_flag = false;
                if let Some(layer) = self.armed_layer.take() {
                    self.layer = layer;
                    restore_tick = true;
                }
                debug!(layer = %self.layer, "save released");
            }
            self.save_hold = 0;
        }

        // Layer selection, strict mutual exclusion, first match wins.
        // Suppressed entirely while a save is armed and on the release
        // tick that restores the armed layer.
        if !self.save_flag && !restore_tick {
            let desired = match (shift, mod_cv, random_map) {
                (true, false, false) => Layer::Alt,
                (false, true, false) => Layer::Mod,
                (true, true, false) => Layer::Cv,
                (false, false, true) => Layer::Rnd,
                (false, false, false) => Layer::Normal,
                // Ambiguous combinations hold the current layer.
                _ => self.layer,
            };
            if desired != self.layer {
                self.previous_layer = self.layer;
                debug!(from = %self.layer, to = %desired, "layer changed");
                events.push(ArbiterEvent::LayerChanged {
                    from: self.layer,
                    to: desired,
                });
                self.layer = desired;
                self.combo_hold = 0;
                self.reset_fired = false;
            }
        }

        if self.layer == Layer::Normal {
            // Holding the random button selects the slew on release.
            if random {
                self.random_hold = self.random_hold.saturating_add(1);
            } else if self.random_hold > 0 {
                events.push(ArbiterEvent::RandomizeReleased {
                    held_ticks: self.random_hold,
                });
                self.random_hold = 0;
            }
        } else {
            if random || random_map {
                if self.combo_hold < self.reset_limit {
                    self.combo_hold += 1;
                    // A lone random press in Alt is undo/redo, provided
                    // no reset fired during this hold.
                    if self.layer == Layer::Alt && random_edge && !random_map && !self.reset_fired
                    {
                        events.push(ArbiterEvent::UndoRedo);
                    }
                } else if random && random_map && !self.reset_fired {
                    // Fires exactly once per hold; releasing and
                    // re-pressing is required to fire again.
                    self.reset_fired = true;
                    debug!(layer = %self.layer, "parameter reset");
                    events.push(ArbiterEvent::ResetLayer(self.layer));
                }
            } else {
                self.combo_hold = 0;
                self.reset_fired = false;
            }
            self.random_hold = 0;
        }
    }
}
