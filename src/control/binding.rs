//! Physical controls, their per-layer targets, and the parameter store.
//!
//! A [`ControlBinding`] routes one knob or fader to at most one slot per
//! layer. The binding table is fixed at startup and owns the only mapping
//! between panel positions and logical parameters; nothing else in the
//! crate stores slot addresses.

use serde::{Deserialize, Serialize};

use crate::control::layer::{Layer, LAYER_COUNT};

/// Index of a parameter within a layer's persisted vector.
pub type Slot = usize;

/// Number of volume faders (not persisted, always live).
pub const VOLUME_COUNT: usize = 4;

/// Identifier for one physical control on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlId {
    // Knobs
    AmbienceDecay,
    AmbienceSpacetime,
    EchoDensity,
    EchoRepeats,
    FilterCutoff,
    FilterResonance,
    ResonatorFeedback,
    ResonatorTune,
    ModLevel,
    ModSpeed,
    // Faders
    FilterVol,
    ResonatorVol,
    EchoVol,
    AmbienceVol,
}

impl ControlId {
    /// Knobs in Normal-vector slot order.
    pub const KNOBS: [ControlId; 10] = [
        ControlId::AmbienceDecay,
        ControlId::AmbienceSpacetime,
        ControlId::EchoDensity,
        ControlId::EchoRepeats,
        ControlId::FilterCutoff,
        ControlId::FilterResonance,
        ControlId::ResonatorFeedback,
        ControlId::ResonatorTune,
        ControlId::ModLevel,
        ControlId::ModSpeed,
    ];

    /// Faders in volume-bank order.
    pub const FADERS: [ControlId; VOLUME_COUNT] = [
        ControlId::FilterVol,
        ControlId::ResonatorVol,
        ControlId::EchoVol,
        ControlId::AmbienceVol,
    ];
}

/// Where a binding writes within one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A persisted slot of the layer's vector.
    Slot(Slot),
    /// One of the live volume faders (never persisted).
    Volume(usize),
}

/// Association of one physical control with up to five logical targets.
#[derive(Debug, Clone)]
pub struct ControlBinding {
    pub control: ControlId,
    targets: [Option<Target>; LAYER_COUNT],
    /// Whether the randomizer may touch this binding's Normal target.
    pub randomizable: bool,
    /// Whether the Normal target requires soft takeover. Faders are
    /// defined as directly live; knobs hold persisted values the physical
    /// position may not match.
    pub catch_up_in_normal: bool,
    /// Step count for a quantized Alt target (mode selectors).
    pub alt_steps: Option<u32>,
}

impl ControlBinding {
    fn new(control: ControlId) -> Self {
        Self {
            control,
            targets: [None; LAYER_COUNT],
            randomizable: false,
            catch_up_in_normal: true,
            alt_steps: None,
        }
    }

    fn with_target(mut self, layer: Layer, target: Target) -> Self {
        self.targets[layer.index()] = Some(target);
        self
    }

    fn randomizable(mut self) -> Self {
        self.randomizable = true;
        self
    }

    fn live_in_normal(mut self) -> Self {
        self.catch_up_in_normal = false;
        self
    }

    fn alt_steps(mut self, steps: u32) -> Self {
        self.alt_steps = Some(steps);
        self
    }

    /// Target for the given layer, if the control means anything there.
    pub fn target(&self, layer: Layer) -> Option<Target> {
        self.targets[layer.index()]
    }

    /// Normal-vector slot, if any.
    pub fn normal_slot(&self) -> Option<Slot> {
        match self.target(Layer::Normal) {
            Some(Target::Slot(slot)) => Some(slot),
            _ => None,
        }
    }

    /// Rnd-layer amount slot, if any.
    pub fn rnd_slot(&self) -> Option<Slot> {
        match self.target(Layer::Rnd) {
            Some(Target::Slot(slot)) => Some(slot),
            _ => None,
        }
    }

    /// Quantize a value for the given layer's target.
    pub fn quantize(&self, layer: Layer, value: f32) -> f32 {
        match (layer, self.alt_steps) {
            (Layer::Alt, Some(steps)) if steps > 1 => {
                let step = (value * steps as f32).floor().min(steps as f32 - 1.0);
                step / (steps as f32 - 1.0)
            }
            _ => value,
        }
    }
}

/// The fixed binding table, created once at startup.
///
/// Knob order matches the Normal vector; the eight voice knobs carry
/// Mod/Cv/Rnd amount targets at the amount-vector index of their
/// parameter, and six of them double as Alt targets.
pub fn default_bindings() -> Vec<ControlBinding> {
    let voice = |control: ControlId, slot: Slot| {
        ControlBinding::new(control)
            .with_target(Layer::Normal, Target::Slot(slot))
            .with_target(Layer::Mod, Target::Slot(slot))
            .with_target(Layer::Cv, Target::Slot(slot))
            .with_target(Layer::Rnd, Target::Slot(slot))
            .randomizable()
    };

    let mut bindings = vec![
        // Voice knobs. Normal slot == amount slot by construction.
        voice(ControlId::AmbienceDecay, 0),
        voice(ControlId::AmbienceSpacetime, 1)
            .with_target(Layer::Alt, Target::Slot(alt::AUTO_PAN)),
        voice(ControlId::EchoDensity, 2).with_target(Layer::Alt, Target::Slot(alt::ECHO_FILTER)),
        voice(ControlId::EchoRepeats, 3),
        voice(ControlId::FilterCutoff, 4)
            .with_target(Layer::Alt, Target::Slot(alt::FILTER_MODE))
            .alt_steps(4),
        voice(ControlId::FilterResonance, 5)
            .with_target(Layer::Alt, Target::Slot(alt::FILTER_POSITION))
            .alt_steps(4),
        voice(ControlId::ResonatorFeedback, 6),
        voice(ControlId::ResonatorTune, 7)
            .with_target(Layer::Alt, Target::Slot(alt::RESONATOR_DISSONANCE)),
        // Modulation source controls: no amounts, not randomizable.
        ControlBinding::new(ControlId::ModLevel).with_target(Layer::Normal, Target::Slot(8)),
        ControlBinding::new(ControlId::ModSpeed)
            .with_target(Layer::Normal, Target::Slot(9))
            .with_target(Layer::Alt, Target::Slot(alt::MOD_TYPE))
            .alt_steps(3),
    ];

    for (index, control) in ControlId::FADERS.into_iter().enumerate() {
        bindings.push(
            ControlBinding::new(control)
                .with_target(Layer::Normal, Target::Volume(index))
                .live_in_normal(),
        );
    }

    bindings
}

/// Alt-vector slot names.
pub mod alt {
    use super::Slot;

    pub const AUTO_PAN: Slot = 0;
    pub const ECHO_FILTER: Slot = 1;
    pub const FILTER_POSITION: Slot = 2;
    pub const FILTER_MODE: Slot = 3;
    pub const MOD_TYPE: Slot = 4;
    pub const RESONATOR_DISSONANCE: Slot = 5;
}

/// Per-layer parameter vectors plus the live volume bank.
///
/// Owned exclusively by the control surface; the DSP collaborator only
/// ever sees values copied into a snapshot after the tick completes.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamStore {
    normal: [f32; 10],
    alt: [f32; 6],
    mod_amount: [f32; 8],
    cv_amount: [f32; 8],
    rnd_amount: [f32; 8],
    volumes: [f32; VOLUME_COUNT],
}

impl Default for ParamStore {
    fn default() -> Self {
        let mut store = Self {
            normal: [0.0; 10],
            alt: [0.0; 6],
            mod_amount: [0.0; 8],
            cv_amount: [0.0; 8],
            rnd_amount: [0.0; 8],
            volumes: [1.0; VOLUME_COUNT],
        };
        // Hardcoded power-on defaults. The echo filter's center is
        // deliberately off 0.5; filter cutoff ships with modulation, and
        // the four primary CV inputs ship fully open.
        store.alt[alt::ECHO_FILTER] = 0.55;
        store.mod_amount[4] = 0.5;
        for slot in [1, 2, 4, 7] {
            store.cv_amount[slot] = 1.0;
        }
        store
    }
}

impl ParamStore {
    /// Read one slot of a layer.
    pub fn get(&self, layer: Layer, slot: Slot) -> f32 {
        *self.layer_values(layer).get(slot).unwrap_or(&0.0)
    }

    /// Write one slot of a layer. Out-of-range slots are ignored.
    pub fn set(&mut self, layer: Layer, slot: Slot, value: f32) {
        if let Some(v) = self.layer_values_mut(layer).get_mut(slot) {
            *v = value;
        }
    }

    /// The full vector for a layer, in persisted slot order.
    pub fn layer_values(&self, layer: Layer) -> &[f32] {
        match layer {
            Layer::Normal => &self.normal,
            Layer::Alt => &self.alt,
            Layer::Mod => &self.mod_amount,
            Layer::Cv => &self.cv_amount,
            Layer::Rnd => &self.rnd_amount,
        }
    }

    fn layer_values_mut(&mut self, layer: Layer) -> &mut [f32] {
        match layer {
            Layer::Normal => &mut self.normal,
            Layer::Alt => &mut self.alt,
            Layer::Mod => &mut self.mod_amount,
            Layer::Cv => &mut self.cv_amount,
            Layer::Rnd => &mut self.rnd_amount,
        }
    }

    /// Overwrite a layer's vector from a decoded record. Slots beyond the
    /// layer's size are ignored, shorter records leave the tail untouched.
    pub fn set_layer_values(&mut self, layer: Layer, values: &[f32]) {
        let dest = self.layer_values_mut(layer);
        for (d, v) in dest.iter_mut().zip(values) {
            *d = *v;
        }
    }

    /// The neutral default for one slot, used by the reset broadcast.
    pub fn neutral_default(layer: Layer, slot: Slot) -> f32 {
        ParamStore::default().get(layer, slot)
    }

    pub fn volume(&self, index: usize) -> f32 {
        *self.volumes.get(index).unwrap_or(&1.0)
    }

    pub fn set_volume(&mut self, index: usize, value: f32) {
        if let Some(v) = self.volumes.get_mut(index) {
            *v = value;
        }
    }

    pub fn volumes(&self) -> [f32; VOLUME_COUNT] {
        self.volumes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_table_shape() {
        let bindings = default_bindings();
        assert_eq!(bindings.len(), 14);

        let knobs = bindings.iter().filter(|b| b.normal_slot().is_some()).count();
        assert_eq!(knobs, 10);

        let faders = bindings
            .iter()
            .filter(|b| matches!(b.target(Layer::Normal), Some(Target::Volume(_))))
            .count();
        assert_eq!(faders, VOLUME_COUNT);
    }

    #[test]
    fn test_voice_knobs_share_slot_across_amount_layers() {
        for binding in default_bindings().iter().filter(|b| b.randomizable) {
            let normal = binding.normal_slot().unwrap();
            for layer in [Layer::Mod, Layer::Cv, Layer::Rnd] {
                assert_eq!(binding.target(layer), Some(Target::Slot(normal)));
            }
        }
    }

    #[test]
    fn test_mod_level_and_speed_not_randomizable() {
        let bindings = default_bindings();
        for control in [ControlId::ModLevel, ControlId::ModSpeed] {
            let b = bindings.iter().find(|b| b.control == control).unwrap();
            assert!(!b.randomizable);
            assert!(b.target(Layer::Rnd).is_none());
        }
    }

    #[test]
    fn test_faders_live_without_layers() {
        let bindings = default_bindings();
        for control in ControlId::FADERS {
            let b = bindings.iter().find(|b| b.control == control).unwrap();
            assert!(!b.catch_up_in_normal);
            for layer in [Layer::Alt, Layer::Mod, Layer::Cv, Layer::Rnd] {
                assert!(b.target(layer).is_none());
            }
        }
    }

    #[test]
    fn test_quantize_four_steps() {
        let bindings = default_bindings();
        let cutoff = bindings
            .iter()
            .find(|b| b.control == ControlId::FilterCutoff)
            .unwrap();
        assert_eq!(cutoff.quantize(Layer::Alt, 0.0), 0.0);
        assert_eq!(cutoff.quantize(Layer::Alt, 0.3), 1.0 / 3.0);
        assert_eq!(cutoff.quantize(Layer::Alt, 0.9), 1.0);
        assert_eq!(cutoff.quantize(Layer::Alt, 1.0), 1.0);
        // Quantization only applies to the Alt target.
        assert_eq!(cutoff.quantize(Layer::Normal, 0.3), 0.3);
    }

    #[test]
    fn test_store_defaults() {
        let store = ParamStore::default();
        assert_eq!(store.get(Layer::Alt, alt::ECHO_FILTER), 0.55);
        assert_eq!(store.get(Layer::Mod, 4), 0.5);
        assert_eq!(store.get(Layer::Cv, 4), 1.0);
        assert_eq!(store.get(Layer::Cv, 0), 0.0);
        assert_eq!(store.get(Layer::Rnd, 3), 0.0);
        assert_eq!(store.volume(0), 1.0);
    }

    #[test]
    fn test_out_of_range_access_is_harmless() {
        let mut store = ParamStore::default();
        store.set(Layer::Alt, 99, 0.7);
        assert_eq!(store.get(Layer::Alt, 99), 0.0);
    }

    #[test]
    fn test_set_layer_values_partial() {
        let mut store = ParamStore::default();
        store.set_layer_values(Layer::Normal, &[0.1, 0.2]);
        assert_eq!(store.get(Layer::Normal, 0), 0.1);
        assert_eq!(store.get(Layer::Normal, 1), 0.2);
        assert_eq!(store.get(Layer::Normal, 2), 0.0);
    }
}
