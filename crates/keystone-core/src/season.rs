use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    feature::{FeatureVector, keys},
    interaction,
};

/// Identity of a player-season: `(player_id, season)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeasonKey {
    pub player_id: String,
    pub season: String,
}

impl fmt::Display for SeasonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.player_id, self.season)
    }
}

/// One player's feature vector for one season.
///
/// Derived interaction features are computed on construction and stored
/// alongside the base features.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSeason {
    pub player_id: String,
    pub player_name: String,
    pub season: String,
    features: FeatureVector,
}

impl PlayerSeason {
    #[must_use]
    pub fn new(
        player_id: impl Into<String>,
        player_name: impl Into<String>,
        season: impl Into<String>,
        mut features: FeatureVector,
    ) -> Self {
        interaction::apply_interactions(&mut features);
        Self {
            player_id: player_id.into(),
            player_name: player_name.into(),
            season: season.into(),
            features,
        }
    }

    #[must_use]
    pub fn key(&self) -> SeasonKey {
        SeasonKey {
            player_id: self.player_id.clone(),
            season: self.season.clone(),
        }
    }

    #[must_use]
    pub fn features(&self) -> &FeatureVector {
        &self.features
    }

    /// Observed usage of the season, if measured.
    #[must_use]
    pub fn usage(&self) -> Option<f32> {
        self.features.get(keys::USG_PCT)
    }
}
