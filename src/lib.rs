//! Strata - Layered Control Surface Core
//!
//! Strata is the control core of a multi-effect audio device whose small
//! panel addresses many more parameters than it has controls. Every knob
//! routes through one of five layers:
//!
//! - Normal: the primary sound parameters
//! - Alt: secondary parameters behind the shift button
//! - Mod: per-parameter modulation amounts
//! - Cv: per-parameter CV amounts
//! - Rnd: per-parameter randomization amounts
//!
//! # Architecture
//!
//! [`surface::ControlSurface`] owns all state and advances it one control
//! tick at a time. Button edges arrive through a buffered queue, layer
//! selection and long-press gestures run through a small state machine,
//! and soft takeover keeps re-layered knobs from jumping. Parameters
//! persist as Q13 fixed-point resources and travel as framed command
//! streams. After each tick the surface exposes an immutable snapshot and
//! a full set of LED requests; the audio side never shares mutable state
//! with the control side.

pub mod control;
pub mod error;
pub mod led;
pub mod persist;
pub mod surface;
pub mod tunables;

pub use error::{Result, StrataError};
pub use surface::{ControlSurface, PanelFrame, Snapshot};
pub use tunables::Tunables;
