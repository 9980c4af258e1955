//! Derived interaction features.
//!
//! Interaction features multiply usage with a volume or efficiency feature so
//! a linear classifier can express "this matters more at high usage". They are
//! stored alongside the base features under reserved keys and recomputed
//! whenever usage or a volume feature changes. Base keys are never modified here.

use crate::feature::{FeatureVector, keys};

/// A product of two base features stored under its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interaction {
    pub key: &'static str,
    pub left: &'static str,
    pub right: &'static str,
}

pub const INTERACTIONS: [Interaction; 3] = [
    Interaction {
        key: keys::USG_X_CREATION_VOLUME,
        left: keys::USG_PCT,
        right: keys::CREATION_VOLUME_RATIO,
    },
    Interaction {
        key: keys::USG_X_PRESSURE_APPETITE,
        left: keys::USG_PCT,
        right: keys::RS_PRESSURE_APPETITE,
    },
    Interaction {
        key: keys::USG_X_CREATION_TAX,
        left: keys::USG_PCT,
        right: keys::CREATION_TAX,
    },
];

impl Interaction {
    /// Product of both operands; absent when either operand is absent.
    #[must_use]
    pub fn compute(&self, features: &FeatureVector) -> Option<f32> {
        Some(features.get(self.left)? * features.get(self.right)?)
    }
}

/// Recomputes every interaction feature in place.
pub fn apply_interactions(features: &mut FeatureVector) {
    for interaction in &INTERACTIONS {
        let value = interaction.compute(features);
        features.set(interaction.key, value);
    }
}

pub fn derived_keys() -> impl Iterator<Item = &'static str> {
    INTERACTIONS.iter().map(|i| i.key)
}

#[must_use]
pub fn is_derived(key: &str) -> bool {
    derived_keys().any(|k| k == key)
}
