//! Parameter layers.
//!
//! Five mutually exclusive namespaces share the same physical controls.
//! Exactly one layer is active at any control tick; `Normal` is the
//! power-on state and the fallback for any out-of-range selector.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of layers, including `Normal`.
pub const LAYER_COUNT: usize = 5;

/// One of the five parameter namespaces addressed by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// Primary parameters, directly on the panel.
    #[default]
    Normal,
    /// Shift-accessed secondary parameters.
    Alt,
    /// Per-parameter modulation amounts.
    Mod,
    /// Per-parameter CV amounts.
    Cv,
    /// Per-parameter randomization amounts.
    Rnd,
}

impl Layer {
    /// All layers in persisted-tag order.
    pub const ALL: [Layer; LAYER_COUNT] =
        [Layer::Normal, Layer::Alt, Layer::Mod, Layer::Cv, Layer::Rnd];

    /// Position of this layer in tag order (0 = Normal ... 4 = Rnd).
    pub fn index(self) -> usize {
        match self {
            Layer::Normal => 0,
            Layer::Alt => 1,
            Layer::Mod => 2,
            Layer::Cv => 3,
            Layer::Rnd => 4,
        }
    }

    /// Layer for a tag index. Out-of-range indices clamp to `Normal`,
    /// matching the defensive handling of invalid selectors.
    pub fn from_index(index: usize) -> Layer {
        Layer::ALL.get(index).copied().unwrap_or(Layer::Normal)
    }

    /// Number of persisted parameter slots in this layer's vector.
    pub fn slot_count(self) -> usize {
        match self {
            Layer::Normal => 10,
            Layer::Alt => 6,
            Layer::Mod | Layer::Cv | Layer::Rnd => 8,
        }
    }

    /// Resource name suffix for this layer's persisted vector.
    pub fn suffix(self) -> &'static str {
        match self {
            Layer::Normal => "prm",
            Layer::Alt => "alt",
            Layer::Mod => "mod",
            Layer::Cv => "cv",
            Layer::Rnd => "rnd",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Normal => write!(f, "Normal"),
            Layer::Alt => write!(f, "Alt"),
            Layer::Mod => write!(f, "Mod"),
            Layer::Cv => write!(f, "Cv"),
            Layer::Rnd => write!(f, "Rnd"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for layer in Layer::ALL {
            assert_eq!(Layer::from_index(layer.index()), layer);
        }
    }

    #[test]
    fn test_invalid_index_clamps_to_normal() {
        assert_eq!(Layer::from_index(5), Layer::Normal);
        assert_eq!(Layer::from_index(usize::MAX), Layer::Normal);
    }

    #[test]
    fn test_slot_counts() {
        assert_eq!(Layer::Normal.slot_count(), 10);
        assert_eq!(Layer::Alt.slot_count(), 6);
        assert_eq!(Layer::Mod.slot_count(), 8);
        assert_eq!(Layer::Cv.slot_count(), 8);
        assert_eq!(Layer::Rnd.slot_count(), 8);
    }

    #[test]
    fn test_suffixes_are_unique() {
        let mut suffixes: Vec<_> = Layer::ALL.iter().map(|l| l.suffix()).collect();
        suffixes.sort_unstable();
        suffixes.dedup();
        assert_eq!(suffixes.len(), LAYER_COUNT);
    }

    #[test]
    fn test_default_is_normal() {
        assert_eq!(Layer::default(), Layer::Normal);
    }
}
