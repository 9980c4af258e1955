//! Named feature vectors.
//!
//! A [`FeatureVector`] maps feature identifiers to optional values. Absence is
//! meaningful: a key holding `None` means the column exists but the value was
//! not measured. It is never the same thing as zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Feature identifiers the engine reads or writes.
///
/// Tables may carry any other keys; they are passed through untouched.
pub mod keys {
    /// Fraction of the team's possessions used by the player (0..1).
    pub const USG_PCT: &str = "usg_pct";

    // Volume features: how often something happens. Projected with usage.
    pub const CREATION_VOLUME_RATIO: &str = "creation_volume_ratio";
    pub const RS_PRESSURE_APPETITE: &str = "rs_pressure_appetite";
    pub const RS_RIM_APPETITE: &str = "rs_rim_appetite";
    pub const FT_RATE: &str = "ft_rate";

    // Efficiency features: how well it happens. Never projected.
    pub const CREATION_TAX: &str = "creation_tax";
    pub const RS_PRESSURE_RESILIENCE: &str = "rs_pressure_resilience";
    pub const RIM_FG_PCT: &str = "rim_fg_pct";
    pub const EFG_ISO_WEIGHTED: &str = "efg_iso_weighted";
    pub const SHOT_QUALITY_GENERATION_DELTA: &str = "shot_quality_generation_delta";

    // High-leverage deltas (clutch minus regular).
    pub const LEVERAGE_TS_DELTA: &str = "leverage_ts_delta";
    pub const LEVERAGE_USG_DELTA: &str = "leverage_usg_delta";

    // Sample counts behind the rates above.
    pub const PRESSURE_SHOTS: &str = "pressure_shots";
    pub const CLUTCH_MINUTES: &str = "clutch_minutes";
    pub const GAMES_PLAYED: &str = "games_played";

    pub const AGE: &str = "age";

    // Derived interaction features.
    pub const USG_X_CREATION_VOLUME: &str = "usg_x_creation_volume";
    pub const USG_X_PRESSURE_APPETITE: &str = "usg_x_pressure_appetite";
    pub const USG_X_CREATION_TAX: &str = "usg_x_creation_tax";
}

/// Features whose absence makes a season's profile unreliable.
pub const CRITICAL_FEATURES: [&str; 6] = [
    keys::LEVERAGE_TS_DELTA,
    keys::LEVERAGE_USG_DELTA,
    keys::CREATION_TAX,
    keys::CREATION_VOLUME_RATIO,
    keys::RS_PRESSURE_RESILIENCE,
    keys::EFG_ISO_WEIGHTED,
];

/// Mapping from feature identifiers to optional values.
///
/// Only finite values are stored: writing NaN or an infinity records the
/// feature as absent.
///
/// # Examples
///
/// ```
/// use keystone_core::feature::FeatureVector;
///
/// let mut features = FeatureVector::new();
/// features.set("usg_pct", Some(0.28));
/// features.set("creation_tax", None);
///
/// assert_eq!(features.get("usg_pct"), Some(0.28));
/// assert_eq!(features.get("creation_tax"), None);
/// assert!(features.contains_key("creation_tax"));
/// assert!(!features.contains_key("age"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    values: BTreeMap<String, Option<f32>>,
}

impl FeatureVector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of `key`, or `None` when the key is unknown or not measured.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f32> {
        self.values.get(key).copied().flatten()
    }

    /// Whether the vector has a column named `key`, measured or not.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set<K>(&mut self, key: K, value: Option<f32>)
    where
        K: Into<String>,
    {
        self.values.insert(key.into(), value.filter(|v| v.is_finite()));
    }

    /// Builder-style variant of [`set`](Self::set) for a measured value.
    #[must_use]
    pub fn with<K>(mut self, key: K, value: f32) -> Self
    where
        K: Into<String>,
    {
        self.set(key, Some(value));
        self
    }

    /// Builder-style variant of [`set`](Self::set) for an unmeasured value.
    #[must_use]
    pub fn with_missing<K>(mut self, key: K) -> Self
    where
        K: Into<String>,
    {
        self.set(key, None);
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f32>)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the subset of `keys` without a measured value.
    #[must_use]
    pub fn missing<'a>(&self, keys: &[&'a str]) -> Vec<&'a str> {
        keys.iter()
            .copied()
            .filter(|key| self.get(key).is_none())
            .collect()
    }
}

impl<K> FromIterator<(K, Option<f32>)> for FeatureVector
where
    K: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, Option<f32>)>>(iter: T) -> Self {
        let mut features = Self::new();
        for (key, value) in iter {
            features.set(key, value);
        }
        features
    }
}
