//! Declarative gate rule definitions.
//!
//! Rules are plain data and (de)serialize from JSON, so thresholds can be
//! changed without touching the interpreter. A rule is compiled against a
//! [`ReferenceDistribution`](keystone_analysis::distribution::ReferenceDistribution)
//! before use; see [`GateHierarchy::compile`](super::GateHierarchy::compile).
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "id": "creation_collapse",
//!   "tier": 1,
//!   "condition": { "compare": { "feature": "creation_tax", "op": "lt", "threshold": { "fixed": -0.15 } } },
//!   "exemptions": [
//!     { "all": [
//!       { "compare": { "feature": "creation_volume_ratio", "op": "ge", "threshold": { "percentile": { "pct": "p90" } } } },
//!       { "compare": { "feature": "efg_iso_weighted", "op": "ge", "threshold": { "percentile": { "pct": "p75" } } } }
//!     ] }
//!   ],
//!   "cap": 0.30
//! }
//! ```

use std::fmt;

use keystone_analysis::distribution::Pct;
use keystone_core::Archetype;
use serde::{Deserialize, Serialize};

/// Priority class of a rule. Lower tiers are evaluated first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    /// Fatal failure patterns. Never relaxed by a later tier.
    Fatal = 1,
    /// Missing or thin data.
    DataQuality = 2,
    /// Contextual penalties.
    Contextual = 3,
}

impl Tier {
    pub const ALL: [Self; 3] = [Self::Fatal, Self::DataQuality, Self::Contextual];

    #[must_use]
    pub fn number(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.number())
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.number()
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|t| t.number() == value)
            .ok_or_else(|| format!("invalid gate tier {value} (expected 1, 2 or 3)"))
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    #[display("<")]
    Lt,
    #[display("<=")]
    Le,
    #[display(">")]
    Gt,
    #[display(">=")]
    Ge,
}

impl CompareOp {
    #[must_use]
    pub fn apply(self, lhs: f32, rhs: f32) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    Fixed(f32),
    /// A percentile of the reference distribution, resolved once at compile time.
    ///
    /// `of` names the feature whose distribution is used; it defaults to the
    /// compared feature.
    Percentile {
        pct: Pct,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        of: Option<String>,
    },
}

impl Threshold {
    #[must_use]
    pub fn pct(pct: Pct) -> Self {
        Self::Percentile { pct, of: None }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(v) => write!(f, "{v}"),
            Self::Percentile { pct, of: None } => write!(f, "{pct}"),
            Self::Percentile { pct, of: Some(of) } => write!(f, "{pct}({of})"),
        }
    }
}

/// Predicate over a feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    All(Vec<Condition>),
    Any(Vec<Condition>),
    /// At least `min` of the listed conditions hold.
    CountAtLeast { min: usize, of: Vec<Condition> },
    Compare {
        feature: String,
        op: CompareOp,
        threshold: Threshold,
    },
    /// More than `above` (a fraction) of `features` are absent.
    ///
    /// Only legal in missing-data rules.
    MissingFraction { features: Vec<String>, above: f32 },
}

impl Condition {
    #[must_use]
    pub fn compare(feature: &str, op: CompareOp, threshold: Threshold) -> Self {
        Self::Compare {
            feature: feature.to_owned(),
            op,
            threshold,
        }
    }

    #[must_use]
    pub fn lt(feature: &str, threshold: Threshold) -> Self {
        Self::compare(feature, CompareOp::Lt, threshold)
    }

    #[must_use]
    pub fn gt(feature: &str, threshold: Threshold) -> Self {
        Self::compare(feature, CompareOp::Gt, threshold)
    }

    #[must_use]
    pub fn ge(feature: &str, threshold: Threshold) -> Self {
        Self::compare(feature, CompareOp::Ge, threshold)
    }

    pub(crate) fn contains_missing_fraction(&self) -> bool {
        match self {
            Self::All(cs) | Self::Any(cs) | Self::CountAtLeast { of: cs, .. } => {
                cs.iter().any(Self::contains_missing_fraction)
            }
            Self::Compare { .. } => false,
            Self::MissingFraction { .. } => true,
        }
    }
}

/// One rule of the gate hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRuleSpec {
    pub id: String,
    pub tier: Tier,
    pub condition: Condition,
    /// If any exemption holds, the rule has no effect.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exemptions: Vec<Condition>,
    /// Ceiling on the final performance score when the rule fires.
    pub cap: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_archetype: Option<Archetype>,
    /// When the rule fires, no later rule is evaluated.
    #[serde(default, skip_serializing_if = "is_false")]
    pub terminal: bool,
    /// The rule detects absent data; an unknown condition fires it.
    #[serde(default, skip_serializing_if = "is_false")]
    pub missing_data: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[expect(clippy::trivially_copy_pass_by_ref)]
fn is_false(b: &bool) -> bool {
    !*b
}

impl GateRuleSpec {
    #[must_use]
    pub fn new(id: &str, tier: Tier, condition: Condition, cap: f32) -> Self {
        Self {
            id: id.to_owned(),
            tier,
            condition,
            exemptions: vec![],
            cap,
            forced_archetype: None,
            terminal: false,
            missing_data: false,
            description: None,
        }
    }

    #[must_use]
    pub fn exempt_if(mut self, exemption: Condition) -> Self {
        self.exemptions.push(exemption);
        self
    }

    #[must_use]
    pub fn forcing(mut self, archetype: Archetype) -> Self {
        self.forced_archetype = Some(archetype);
        self
    }

    #[must_use]
    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    #[must_use]
    pub fn missing_data(mut self) -> Self {
        self.missing_data = true;
        self
    }

    #[must_use]
    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }
}
