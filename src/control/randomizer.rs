//! Instant and slew-limited randomization of the voice parameters.
//!
//! A session draws one fresh target per eligible binding, weighted by the
//! binding's Rnd-layer amount, then walks the stored Normal values toward
//! the targets. External gate triggers always jump in a single tick;
//! panel triggers derive the slew rate from how long the button was held.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::control::binding::{ControlBinding, ParamStore, Slot};
use crate::control::layer::Layer;
use crate::tunables::Tunables;

/// How a randomization was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomTrigger {
    /// Momentary external gate: always instant.
    External,
    /// Panel button released after this many ticks.
    Panel { held_ticks: u32 },
}

/// Result of advancing the randomizer by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomizerStatus {
    Idle,
    Running,
    /// The session reached its targets this tick.
    Completed,
}

#[derive(Debug, Clone, Copy)]
struct SessionSlot {
    slot: Slot,
    from: f32,
    to: f32,
}

/// One-at-a-time randomization engine.
///
/// Re-entrant triggers while a session is armed are rejected.
#[derive(Debug)]
pub struct Randomizer {
    rng: SmallRng,
    active: bool,
    slewed: bool,
    rate: f32,
    accumulator: f32,
    slots: Vec<SessionSlot>,
}

impl Randomizer {
    /// Deterministic construction for a fixed seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            active: false,
            slewed: false,
            rate: 1.0,
            accumulator: 0.0,
            slots: Vec::new(),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
            active: false,
            slewed: false,
            rate: 1.0,
            accumulator: 0.0,
            slots: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the current session interpolates over multiple ticks.
    pub fn is_slewed(&self) -> bool {
        self.active && self.slewed
    }

    /// Arm a session. Returns `false` (and does nothing) if one is
    /// already in flight.
    pub fn trigger(
        &mut self,
        trigger: RandomTrigger,
        tunables: &Tunables,
        store: &ParamStore,
        bindings: &[ControlBinding],
    ) -> bool {
        if self.active {
            return false;
        }

        let (rate, slewed) = match trigger {
            RandomTrigger::External => (1.0, false),
            RandomTrigger::Panel { held_ticks } if held_ticks > tunables.random_slew_ticks => {
                (1.0 / held_ticks as f32, true)
            }
            RandomTrigger::Panel { .. } => (1.0, false),
        };

        self.slots.clear();
        for binding in bindings.iter().filter(|b| b.randomizable) {
            let (Some(slot), Some(rnd_slot)) = (binding.normal_slot(), binding.rnd_slot()) else {
                continue;
            };
            let amount = store.get(Layer::Rnd, rnd_slot).clamp(0.0, 1.0);
            let from = store.get(Layer::Normal, slot);
            let drawn: f32 = self.rng.gen();
            // Weighted pull toward the drawn value: amount 0 leaves the
            // parameter alone, amount 1 adopts the draw outright.
            let to = from + (drawn - from) * amount;
            self.slots.push(SessionSlot { slot, from, to });
        }

        self.rate = rate;
        self.slewed = slewed;
        self.accumulator = 0.0;
        self.active = true;
        debug!(rate, slewed, slots = self.slots.len(), "randomize armed");
        true
    }

    /// Advance one tick, writing interpolated values into the store.
    pub fn tick(&mut self, store: &mut ParamStore) -> RandomizerStatus {
        if !self.active {
            return RandomizerStatus::Idle;
        }

        self.accumulator += self.rate;
        let t = self.accumulator.min(1.0);
        for s in &self.slots {
            store.set(Layer::Normal, s.slot, s.from + (s.to - s.from) * t);
        }

        if self.accumulator >= 1.0 {
            self.active = false;
            RandomizerStatus::Completed
        } else {
            RandomizerStatus::Running
        }
    }

    /// Normal slots the current (or last) session touches.
    pub fn session_slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.slots.iter().map(|s| s.slot)
    }
}
