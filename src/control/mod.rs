//! Control-plane machinery.
//!
//! Everything that turns physical gestures into parameter state: layer
//! selection, debounced buttons, the binding table, soft takeover, and
//! randomization. All of it is synchronous and tick-driven; the only
//! entry point during operation is the surface's control tick.

pub mod arbiter;
pub mod binding;
pub mod button;
pub mod catchup;
pub mod layer;
pub mod randomizer;

pub use arbiter::{ArbiterEvent, ButtonEvent, ButtonId, LayerArbiter};
pub use binding::{default_bindings, ControlBinding, ControlId, ParamStore, Slot, Target};
pub use catchup::{CatchUpTracker, Resolved};
pub use layer::{Layer, LAYER_COUNT};
pub use randomizer::{RandomTrigger, Randomizer, RandomizerStatus};
