//! The control surface root object.
//!
//! `ControlSurface` owns the parameter tables, the binding table, and all
//! of the tick-driven machinery: buffered button input, layer
//! arbitration, soft takeover, randomization, the save fade sequence, and
//! LED feedback. One call to [`ControlSurface::tick`] per audio block
//! advances everything; afterwards the [`Snapshot`] is a coherent view of
//! every logical parameter for the DSP collaborator to read without
//! locking.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::control::arbiter::{ArbiterEvent, ButtonEvent, ButtonId, LayerArbiter};
use crate::control::binding::{
    default_bindings, ControlBinding, ControlId, ParamStore, Target, VOLUME_COUNT,
};
use crate::control::catchup::CatchUpTracker;
use crate::control::layer::Layer;
use crate::control::randomizer::{RandomTrigger, Randomizer, RandomizerStatus};
use crate::error::Result;
use crate::led::{feedback, LedInputs, LedOutputs};
use crate::persist::codec::encode_layer_frame;
use crate::persist::store::{
    encode_layer_record, layer_resource_name, load_config, load_layer_vector, Config,
    ResourceStore,
};
use crate::tunables::Tunables;

/// Number of Normal-vector slots.
const NORMAL_SLOTS: usize = 10;
/// Voice parameters occupy the first eight Normal slots.
const VOICE_SLOTS: usize = 8;
const MOD_LEVEL_SLOT: usize = 8;
const MOD_SPEED_SLOT: usize = 9;

/// One control tick's worth of continuous readings, sampled by the host.
#[derive(Debug, Clone, Copy)]
pub struct PanelFrame {
    /// Knob positions in [0, 1], [`ControlId::KNOBS`] order.
    pub knobs: [f32; 10],
    /// Fader positions in [0, 1], [`ControlId::FADERS`] order.
    pub faders: [f32; 4],
    /// CV readings, bipolar, voice-slot order.
    pub cvs: [f32; VOICE_SLOTS],
    /// Running input metering value in [0, 1].
    pub input_level: f32,
    /// Current modulation waveform value, roughly [-0.5, 0.5].
    pub mod_value: f32,
    /// A sync clock tick was detected during this block.
    pub clock_tick: bool,
}

impl Default for PanelFrame {
    fn default() -> Self {
        Self {
            knobs: [0.0; 10],
            faders: [0.0; 4],
            cvs: [0.0; VOICE_SLOTS],
            input_level: 0.0,
            mod_value: 0.0,
            clock_tick: false,
        }
    }
}

impl PanelFrame {
    fn read(&self, control: ControlId) -> f32 {
        if let Some(i) = ControlId::KNOBS.iter().position(|c| *c == control) {
            self.knobs[i]
        } else if let Some(i) = ControlId::FADERS.iter().position(|c| *c == control) {
            self.faders[i]
        } else {
            0.0
        }
    }
}

/// Coherent post-tick view of every logical parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snapshot {
    pub layer: Layer,
    /// Output level, 1.0 except while the save fade runs.
    pub out_level: f32,
    /// Voice parameters post catch-up and post mod/CV blending.
    pub voice: [f32; VOICE_SLOTS],
    pub mod_level: f32,
    pub mod_speed: f32,
    pub alt: [f32; 6],
    pub volumes: [f32; VOLUME_COUNT],
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            layer: Layer::Normal,
            out_level: 1.0,
            voice: [0.0; VOICE_SLOTS],
            mod_level: 0.0,
            mod_speed: 0.0,
            alt: [0.0; 6],
            volumes: [1.0; VOLUME_COUNT],
        }
    }
}

/// The control/arbitration/persistence core.
pub struct ControlSurface<S: ResourceStore> {
    base: String,
    tunables: Tunables,
    config: Config,
    store: S,

    params: ParamStore,
    bindings: Vec<ControlBinding>,
    trackers: Vec<CatchUpTracker>,

    arbiter: LayerArbiter,
    randomizer: Randomizer,

    /// Asynchronous button notifications, applied at the next tick.
    queue: VecDeque<ButtonEvent>,
    external_random_pending: bool,

    startup: bool,
    out_level: f32,
    fade_out: bool,
    fade_in: bool,
    save_when_silent: bool,

    /// Single-level undo/redo swap buffer for the Normal vector.
    undo_buffer: Option<[f32; NORMAL_SLOTS]>,

    /// Encoded save frames awaiting the host transport, in send order.
    outbound: VecDeque<Vec<u8>>,

    snapshot: Snapshot,
    leds: LedOutputs,
}

impl<S: ResourceStore> ControlSurface<S> {
    /// Create a surface persisting under `base` (`base.prm`, `base.alt`,
    /// ...). The configuration record is read immediately; parameter
    /// vectors load on the first tick.
    pub fn new(base: impl Into<String>, tunables: Tunables, store: S) -> Result<Self> {
        Self::build(base, tunables, store, Randomizer::from_entropy())
    }

    /// Same, with a fixed randomizer seed for deterministic sessions.
    pub fn with_seed(
        base: impl Into<String>,
        tunables: Tunables,
        store: S,
        seed: u64,
    ) -> Result<Self> {
        Self::build(base, tunables, store, Randomizer::with_seed(seed))
    }

    fn build(
        base: impl Into<String>,
        tunables: Tunables,
        store: S,
        randomizer: Randomizer,
    ) -> Result<Self> {
        let base = base.into();
        let config = load_config(&store, &base)?;
        info!(base = %base, revision = config.revision, "control surface created");

        let bindings = default_bindings();
        let trackers = bindings
            .iter()
            .map(|_| CatchUpTracker::new(tunables.catch_up_epsilon))
            .collect();

        Ok(Self {
            arbiter: LayerArbiter::new(&tunables),
            base,
            tunables,
            config,
            store,
            params: ParamStore::default(),
            bindings,
            trackers,
            randomizer,
            queue: VecDeque::new(),
            external_random_pending: false,
            startup: true,
            out_level: 1.0,
            fade_out: false,
            fade_in: false,
            save_when_silent: false,
            undo_buffer: None,
            outbound: VecDeque::new(),
            snapshot: Snapshot::default(),
            leds: LedOutputs::default(),
        })
    }

    /// Buffer a button notification for the next control tick.
    pub fn push_button(&mut self, event: ButtonEvent) {
        self.queue.push_back(event);
    }

    /// External randomize gate: always instant, applied next tick.
    pub fn trigger_random_external(&mut self) {
        self.external_random_pending = true;
    }

    pub fn layer(&self) -> Layer {
        self.arbiter.layer()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn leds(&self) -> &LedOutputs {
        &self.leds
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Tear down the surface and hand back its store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Take the save frames queued for the outward transport.
    pub fn drain_outbound(&mut self) -> Vec<Vec<u8>> {
        self.outbound.drain(..).collect()
    }

    /// Advance the surface by one control tick.
    pub fn tick(&mut self, frame: &PanelFrame) {
        // Buffered inputs first: all mutation happens here, on this
        // thread, at this point.
        while let Some(event) = self.queue.pop_front() {
            self.arbiter.apply(event);
        }
        let mut events = Vec::new();
        self.arbiter.tick(&mut events);

        if self.startup {
            self.startup = false;
            self.load_all();
        }

        let mut random_triggered = false;
        if std::mem::take(&mut self.external_random_pending) {
            random_triggered = self.start_randomize(RandomTrigger::External);
        }

        for event in events {
            match event {
                ArbiterEvent::LayerChanged { from, to } => {
                    debug!(%from, %to, "active layer changed");
                }
                ArbiterEvent::SaveArmed => {
                    // One save in flight at a time; re-arms while fading
                    // are rejected.
                    if !self.fade_out && !self.save_when_silent {
                        self.save_when_silent = true;
                        self.fade_out = true;
                        self.fade_in = false;
                    }
                }
                ArbiterEvent::ResetLayer(layer) => self.reset_layer(layer),
                ArbiterEvent::UndoRedo => self.undo_redo(),
                ArbiterEvent::RandomizeReleased { held_ticks } => {
                    self.start_randomize(RandomTrigger::Panel { held_ticks });
                }
            }
        }

        // The randomizer writes before the controls are read so the
        // takeover trackers see the randomized values as the stored
        // targets instead of overwriting them.
        let slewed = self.randomizer.is_slewed();
        let random_completed =
            self.randomizer.tick(&mut self.params) == RandomizerStatus::Completed && slewed;

        self.read_controls(frame);

        let save_completed = self.advance_fade();

        self.rebuild_snapshot(frame);
        self.leds = feedback(&LedInputs {
            input_level: frame.input_level,
            mod_value: frame.mod_value,
            mod_level: self.snapshot.mod_level,
            clock_tick: frame.clock_tick,
            layer: self.arbiter.layer(),
            shift_on: self.arbiter.is_on(ButtonId::Shift),
            save_completed,
            random_triggered,
            random_completed,
            random_active: self.randomizer.is_active(),
        });
    }

    /// Route every physical reading through its binding.
    fn read_controls(&mut self, frame: &PanelFrame) {
        let layer = self.arbiter.layer();
        let normal_before = self.normal_vector();
        let mut arm_undo = false;
        for (binding, tracker) in self.bindings.iter().zip(&mut self.trackers) {
            let physical = frame.read(binding.control);
            let Some(target) = binding.target(layer).or_else(|| {
                // The volume faders stay live in every layer.
                binding
                    .target(Layer::Normal)
                    .filter(|t| matches!(t, Target::Volume(_)))
            }) else {
                // Inert in this layer, but the layer change must still
                // register so returning starts a takeover.
                tracker.observe_layer(layer);
                continue;
            };

            match target {
                Target::Volume(index) => {
                    let value = if physical >= self.tunables.fader_top {
                        1.0
                    } else {
                        physical
                    };
                    self.params.set_volume(index, value);
                }
                Target::Slot(slot) => {
                    if layer == Layer::Normal && !binding.catch_up_in_normal {
                        self.params.set(layer, slot, physical);
                        tracker.observe_layer(layer);
                        continue;
                    }
                    let was_caught = tracker.is_caught_up();
                    let stored = self.params.get(layer, slot);
                    let resolved = tracker.process(physical, layer, stored);
                    if resolved.is_live() {
                        let value = binding.quantize(layer, resolved.value());
                        if layer == Layer::Normal
                            && !was_caught
                            && (value - stored).abs() > f32::EPSILON
                        {
                            // A takeover just landed on a Normal value:
                            // that is the undoable change.
                            arm_undo = true;
                        }
                        self.params.set(layer, slot, value);
                    }
                }
            }
        }

        if arm_undo {
            self.undo_buffer = Some(normal_before);
        }
    }

    fn normal_vector(&self) -> [f32; NORMAL_SLOTS] {
        let mut out = [0.0; NORMAL_SLOTS];
        out.copy_from_slice(self.params.layer_values(Layer::Normal));
        out
    }

    fn undo_redo(&mut self) {
        let Some(buffer) = self.undo_buffer else {
            return;
        };
        let current = self.normal_vector();
        self.params.set_layer_values(Layer::Normal, &buffer);
        self.undo_buffer = Some(current);
        debug!("undo/redo swapped normal vector");
        self.invalidate_trackers(|binding| binding.normal_slot().is_some());
    }

    fn reset_layer(&mut self, layer: Layer) {
        if layer == Layer::Normal {
            // The arbiter never resets Normal itself, but a clamped
            // invalid selector lands here and the change must be undoable.
            self.undo_buffer = Some(self.normal_vector());
        }
        for binding in &self.bindings {
            if let Some(Target::Slot(slot)) = binding.target(layer) {
                self.params
                    .set(layer, slot, ParamStore::neutral_default(layer, slot));
            }
        }
        info!(%layer, "layer reset to neutral defaults");
        self.invalidate_trackers(|binding| matches!(binding.target(layer), Some(Target::Slot(_))));
    }

    /// Arm a randomization session; `true` when one actually started.
    fn start_randomize(&mut self, trigger: RandomTrigger) -> bool {
        if self.randomizer.is_active() {
            return false;
        }
        let before = self.normal_vector();
        if self
            .randomizer
            .trigger(trigger, &self.tunables, &self.params, &self.bindings)
        {
            self.undo_buffer = Some(before);
            self.invalidate_trackers(|binding| binding.randomizable);
            true
        } else {
            false
        }
    }

    fn invalidate_trackers(&mut self, mut select: impl FnMut(&ControlBinding) -> bool) {
        for (binding, tracker) in self.bindings.iter().zip(&mut self.trackers) {
            if select(binding) {
                tracker.invalidate();
            }
        }
    }

    /// Attempt to restore every layer vector. Absent resources leave the
    /// hardcoded defaults untouched; nothing here is fatal.
    fn load_all(&mut self) {
        for layer in Layer::ALL {
            let loaded = load_layer_vector(&self.store, &self.base, layer);
            match loaded {
                Ok(Some(values)) => {
                    self.params.set_layer_values(layer, &values);
                    debug!(%layer, "restored layer vector");
                    // Stored targets now exist: the controls must catch
                    // up to them instead of clobbering them on first read.
                    self.invalidate_trackers(|binding| {
                        matches!(binding.target(layer), Some(Target::Slot(_)))
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(%layer, error = %e, "layer load failed, keeping defaults");
                }
            }
        }
    }

    /// Persist all five layers: raw records into the store plus one
    /// framed command sequence per layer for the outward transport.
    /// Frames are queued back to back and never interleave.
    fn save_all(&mut self) {
        for layer in Layer::ALL {
            let values: Vec<f32> = self.params.layer_values(layer).to_vec();
            let name = layer_resource_name(&self.base, layer);
            if let Err(e) = self.store.save(&name, &encode_layer_record(&values)) {
                warn!(resource = %name, error = %e, "layer save failed");
            }
            self.outbound.push_back(encode_layer_frame(layer, &values));
        }
        info!(base = %self.base, "all layers saved");
    }

    /// Advance the output fade; returns `true` on the tick the save
    /// actually executed.
    fn advance_fade(&mut self) -> bool {
        if self.fade_out {
            self.out_level = (self.out_level - self.tunables.fade_increment).max(0.0);
            if self.out_level <= 0.0 {
                let saved = if self.save_when_silent {
                    self.save_when_silent = false;
                    self.save_all();
                    true
                } else {
                    false
                };
                self.fade_out = false;
                self.fade_in = true;
                return saved;
            }
        } else if self.fade_in {
            self.out_level += self.tunables.fade_increment;
            if self.out_level >= 1.0 {
                self.out_level = 1.0;
                self.fade_in = false;
            }
        }
        false
    }

    fn rebuild_snapshot(&mut self, frame: &PanelFrame) {
        let signed = |amount: f32, attenuverter: bool| {
            if attenuverter {
                amount * 2.0 - 1.0
            } else {
                amount
            }
        };

        let mod_level = self.params.get(Layer::Normal, MOD_LEVEL_SLOT);
        let mut voice = [0.0; VOICE_SLOTS];
        for (slot, out) in voice.iter_mut().enumerate() {
            let base = self.params.get(Layer::Normal, slot);
            let mod_amount = signed(
                self.params.get(Layer::Mod, slot),
                self.config.mod_attenuverters,
            );
            let cv_amount = signed(
                self.params.get(Layer::Cv, slot),
                self.config.cv_attenuverters,
            );
            let blended =
                base + frame.mod_value * mod_level * mod_amount + frame.cvs[slot] * cv_amount;
            *out = blended.clamp(0.0, 1.0);
        }

        let mut alt = [0.0; 6];
        alt.copy_from_slice(self.params.layer_values(Layer::Alt));

        self.snapshot = Snapshot {
            layer: self.arbiter.layer(),
            out_level: self.out_level,
            voice,
            mod_level,
            mod_speed: self.params.get(Layer::Normal, MOD_SPEED_SLOT),
            alt,
            volumes: self.params.volumes(),
        };
    }
}
