//! Tiered veto rules that cap the performance score.
//!
//! A gate is a named predicate over a (projected) feature vector. When it
//! fires it caps the final score and may force an archetype. Rules are
//! declared as data ([`GateRuleSpec`]) and interpreted by one generic loop
//! ([`GateHierarchy::evaluate`]), so adding a rule never changes the
//! evaluator.
//!
//! # Tiers
//!
//! | Tier | Meaning | Example |
//! |------|---------|---------|
//! | 1 | Fatal failure patterns, at most two narrow exemptions | clutch collapse |
//! | 2 | Missing or thin data | insufficient sample |
//! | 3 | Contextual penalties | replacement-level creator |
//!
//! Caps combine by minimum, so a later tier can never raise a cap set by an
//! earlier one.
//!
//! # Example
//!
//! ```
//! use keystone_analysis::{
//!     distribution::{DistributionConfig, ReferenceDistribution},
//!     qualification::VolumeQualification,
//! };
//! use keystone_core::{FeatureVector, PlayerSeason};
//! use keystone_evaluator::gate::{
//!     Condition, GateCatalog, GateHierarchy, GateRuleSpec, Threshold, Tier,
//! };
//!
//! let population = vec![PlayerSeason::new(
//!     "1",
//!     "A",
//!     "2020-21",
//!     FeatureVector::new().with("usg_pct", 0.2).with("games_played", 50.0),
//! )];
//! let dist = ReferenceDistribution::build(
//!     &population,
//!     &VolumeQualification::default(),
//!     DistributionConfig::default(),
//! )
//! .unwrap();
//!
//! let catalog = GateCatalog::new(vec![GateRuleSpec::new(
//!     "clutch_collapse",
//!     Tier::Fatal,
//!     Condition::lt("leverage_ts_delta", Threshold::Fixed(-0.10)),
//!     0.30,
//! )]);
//! let gates = GateHierarchy::compile(&catalog, &dist).unwrap();
//!
//! let outcome = gates.evaluate(&FeatureVector::new().with("leverage_ts_delta", -0.2));
//! assert_eq!(outcome.cap, Some(0.30));
//! assert_eq!(outcome.binding_rule.as_deref(), Some("clutch_collapse"));
//! ```

pub use self::{
    catalog::GateCatalog,
    hierarchy::{
        CatalogError, CompiledCondition, CompiledRule, ExemptedGate, FiredGate, GateHierarchy,
        GateOutcome, Truth, UnevaluatedGate,
    },
    spec::{CompareOp, Condition, GateRuleSpec, Threshold, Tier},
};

pub mod catalog;
mod hierarchy;
mod spec;
