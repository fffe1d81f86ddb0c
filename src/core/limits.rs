//! The combo resource limit pair.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kconfig setting sizing the per-key combo lookup table.
pub const MAX_COMBOS_PER_KEY: &str = "CONFIG_ZMK_COMBO_MAX_COMBOS_PER_KEY";

/// Kconfig setting sizing the per-combo key position array.
pub const MAX_KEYS_PER_COMBO: &str = "CONFIG_ZMK_COMBO_MAX_KEYS_PER_COMBO";

/// Hardware table bounds derived from the combo-definition artifact.
///
/// Both values are exact maxima over the artifact's records. `(0, 0)` means
/// the artifact declares no combos and the feature is disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_combos_per_key: u32,
    pub max_keys_per_combo: u32,
}

impl ResourceLimits {
    pub fn new(max_combos_per_key: u32, max_keys_per_combo: u32) -> Self {
        ResourceLimits {
            max_combos_per_key,
            max_keys_per_combo,
        }
    }

    /// True when no combo records were found.
    pub fn is_disabled(&self) -> bool {
        self.max_combos_per_key == 0 && self.max_keys_per_combo == 0
    }

    /// Settings as `(key, value)` pairs, in fragment order.
    pub fn settings(&self) -> [(&'static str, u32); 2] {
        [
            (MAX_COMBOS_PER_KEY, self.max_combos_per_key),
            (MAX_KEYS_PER_COMBO, self.max_keys_per_combo),
        ]
    }
}

impl fmt::Display for ResourceLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max-combos-per-key={} max-keys-per-combo={}",
            self.max_combos_per_key, self.max_keys_per_combo
        )
    }
}
