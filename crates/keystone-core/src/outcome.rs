//! Categorical outcomes: the classifier's archetypes and the risk quadrants.

use serde::{Deserialize, Serialize};

/// Identifier of the class set [`Archetype::ALL`] belongs to.
///
/// A trained classifier must declare exactly this class set.
pub const ARCHETYPE_CLASS_SET: &str = "archetype-v1";

/// The categorical performance label the classifier predicts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Star-level production that holds up under pressure.
    #[display("king")]
    King,
    /// Star-level production through force, with weaker efficiency.
    #[display("bulldozer")]
    Bulldozer,
    /// Efficient at a low volume.
    #[display("sniper")]
    Sniper,
    /// Production collapses when the context gets harder.
    #[display("victim")]
    Victim,
}

impl Archetype {
    pub const ALL: [Self; 4] = [Self::King, Self::Bulldozer, Self::Sniper, Self::Victim];

    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::King => "king",
            Self::Bulldozer => "bulldozer",
            Self::Sniper => "sniper",
            Self::Victim => "victim",
        }
    }

    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.id() == id)
    }

    /// Whether the class counts toward the star-level score by default.
    #[must_use]
    pub fn is_star_level(self) -> bool {
        matches!(self, Self::King | Self::Bulldozer)
    }
}

/// Risk quadrant combining performance and dependence.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    /// High performance that travels: build around this player.
    #[display("Franchise Cornerstone")]
    FranchiseCornerstone,
    /// High performance that depends on the surrounding context.
    #[display("Luxury Component")]
    LuxuryComponent,
    /// Modest performance that travels.
    #[display("Depth")]
    Depth,
    /// Modest performance that does not travel.
    #[display("Avoid")]
    Avoid,
}

impl RiskCategory {
    pub const ALL: [Self; 4] = [
        Self::FranchiseCornerstone,
        Self::LuxuryComponent,
        Self::Depth,
        Self::Avoid,
    ];
}
