use std::collections::{BTreeSet, HashSet};

use keystone_analysis::distribution::{Pct, ReferenceDistribution};
use keystone_core::{Archetype, DataIssue, DataQuality, FeatureVector};
use serde::Serialize;

use super::{
    catalog::GateCatalog,
    spec::{CompareOp, Condition, GateRuleSpec, Threshold, Tier},
};

/// Maximum number of exemptions a tier-1 rule may declare.
pub const MAX_FATAL_EXEMPTIONS: usize = 2;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CatalogError {
    #[display("duplicate gate rule id '{id}'")]
    DuplicateRule { id: String },
    #[display("rule '{rule}': cap {cap} is outside [0, 1]")]
    InvalidCap { rule: String, cap: f32 },
    #[display("rule '{rule}': tier-1 rules allow at most two exemptions (got {count})")]
    TooManyFatalExemptions { rule: String, count: usize },
    #[display("rule '{rule}': missing_fraction is only allowed in missing-data rules")]
    MissingFractionOutsideMissingDataRule { rule: String },
    #[display("rule '{rule}': missing-data rules must be tier 2 (got {tier})")]
    MissingDataRuleTier { rule: String, tier: Tier },
    #[display("rule '{rule}': {pct} of '{feature}' is not available in the reference distribution")]
    UnresolvedPercentile {
        rule: String,
        feature: String,
        pct: Pct,
    },
    #[display("rule '{rule}': empty condition list")]
    EmptyCondition { rule: String },
    #[display("rule '{rule}': count_at_least needs 1..={len} conditions (got {min})")]
    InvalidCount { rule: String, min: usize, len: usize },
    #[display("rule '{rule}': missing fraction {above} is outside [0, 1]")]
    InvalidFraction { rule: String, above: f32 },
}

/// Three-valued result of evaluating a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    /// The condition depends on absent features.
    Unknown(BTreeSet<String>),
}

impl Truth {
    #[must_use]
    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    fn from_bool(b: bool) -> Self {
        if b { Self::True } else { Self::False }
    }
}

/// A condition with every threshold resolved to a number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompiledCondition {
    All(Vec<CompiledCondition>),
    Any(Vec<CompiledCondition>),
    CountAtLeast {
        min: usize,
        of: Vec<CompiledCondition>,
    },
    Compare {
        feature: String,
        op: CompareOp,
        threshold: f32,
        /// The declared threshold, before resolution.
        declared: Threshold,
    },
    MissingFraction {
        features: Vec<String>,
        above: f32,
    },
}

impl CompiledCondition {
    fn compile(
        condition: &Condition,
        rule: &str,
        dist: &ReferenceDistribution,
    ) -> Result<Self, CatalogError> {
        let compile_all = |cs: &[Condition]| {
            if cs.is_empty() {
                return Err(CatalogError::EmptyCondition {
                    rule: rule.to_owned(),
                });
            }
            cs.iter()
                .map(|c| Self::compile(c, rule, dist))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(match condition {
            Condition::All(cs) => Self::All(compile_all(cs)?),
            Condition::Any(cs) => Self::Any(compile_all(cs)?),
            Condition::CountAtLeast { min, of } => {
                if *min == 0 || *min > of.len() {
                    return Err(CatalogError::InvalidCount {
                        rule: rule.to_owned(),
                        min: *min,
                        len: of.len(),
                    });
                }
                Self::CountAtLeast {
                    min: *min,
                    of: compile_all(of)?,
                }
            }
            Condition::Compare {
                feature,
                op,
                threshold,
            } => {
                let value = match threshold {
                    Threshold::Fixed(v) => *v,
                    Threshold::Percentile { pct, of } => {
                        let of = of.as_deref().unwrap_or(feature);
                        dist.percentile(of, *pct).ok_or_else(|| {
                            CatalogError::UnresolvedPercentile {
                                rule: rule.to_owned(),
                                feature: of.to_owned(),
                                pct: *pct,
                            }
                        })?
                    }
                };
                Self::Compare {
                    feature: feature.clone(),
                    op: *op,
                    threshold: value,
                    declared: threshold.clone(),
                }
            }
            Condition::MissingFraction { features, above } => {
                if features.is_empty() {
                    return Err(CatalogError::EmptyCondition {
                        rule: rule.to_owned(),
                    });
                }
                if !(0.0..=1.0).contains(above) {
                    return Err(CatalogError::InvalidFraction {
                        rule: rule.to_owned(),
                        above: *above,
                    });
                }
                Self::MissingFraction {
                    features: features.clone(),
                    above: *above,
                }
            }
        })
    }

    /// Evaluates the condition with Kleene logic over absent features.
    #[must_use]
    pub fn evaluate(&self, features: &FeatureVector) -> Truth {
        match self {
            Self::Compare {
                feature,
                op,
                threshold,
                ..
            } => match features.get(feature) {
                Some(value) => Truth::from_bool(op.apply(value, *threshold)),
                None => Truth::Unknown(BTreeSet::from([feature.clone()])),
            },
            Self::MissingFraction { features: keys, above } => {
                let missing = keys.iter().filter(|k| features.get(k).is_none()).count();
                #[expect(clippy::cast_precision_loss)]
                let fraction = missing as f32 / keys.len() as f32;
                Truth::from_bool(fraction > *above)
            }
            Self::All(cs) => {
                let mut unknown = BTreeSet::new();
                for c in cs {
                    match c.evaluate(features) {
                        Truth::False => return Truth::False,
                        Truth::Unknown(keys) => unknown.extend(keys),
                        Truth::True => {}
                    }
                }
                if unknown.is_empty() {
                    Truth::True
                } else {
                    Truth::Unknown(unknown)
                }
            }
            Self::Any(cs) => {
                let mut unknown = BTreeSet::new();
                for c in cs {
                    match c.evaluate(features) {
                        Truth::True => return Truth::True,
                        Truth::Unknown(keys) => unknown.extend(keys),
                        Truth::False => {}
                    }
                }
                if unknown.is_empty() {
                    Truth::False
                } else {
                    Truth::Unknown(unknown)
                }
            }
            Self::CountAtLeast { min, of } => {
                let mut count = 0;
                let mut undecided = 0;
                let mut unknown = BTreeSet::new();
                for c in of {
                    match c.evaluate(features) {
                        Truth::True => count += 1,
                        Truth::False => {}
                        Truth::Unknown(keys) => {
                            undecided += 1;
                            unknown.extend(keys);
                        }
                    }
                }
                if count >= *min {
                    Truth::True
                } else if count + undecided < *min {
                    Truth::False
                } else {
                    Truth::Unknown(unknown)
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledRule {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tier: Tier,
    pub condition: CompiledCondition,
    pub exemptions: Vec<CompiledCondition>,
    pub cap: f32,
    pub forced_archetype: Option<Archetype>,
    pub terminal: bool,
    pub missing_data: bool,
}

impl CompiledRule {
    fn compile(spec: &GateRuleSpec, dist: &ReferenceDistribution) -> Result<Self, CatalogError> {
        let rule = spec.id.as_str();
        if !(0.0..=1.0).contains(&spec.cap) {
            return Err(CatalogError::InvalidCap {
                rule: rule.to_owned(),
                cap: spec.cap,
            });
        }
        if spec.tier == Tier::Fatal && spec.exemptions.len() > MAX_FATAL_EXEMPTIONS {
            return Err(CatalogError::TooManyFatalExemptions {
                rule: rule.to_owned(),
                count: spec.exemptions.len(),
            });
        }
        if spec.missing_data && spec.tier != Tier::DataQuality {
            return Err(CatalogError::MissingDataRuleTier {
                rule: rule.to_owned(),
                tier: spec.tier,
            });
        }
        let uses_missing_fraction = spec.condition.contains_missing_fraction()
            || spec
                .exemptions
                .iter()
                .any(Condition::contains_missing_fraction);
        if uses_missing_fraction && !spec.missing_data {
            return Err(CatalogError::MissingFractionOutsideMissingDataRule {
                rule: rule.to_owned(),
            });
        }

        Ok(Self {
            id: spec.id.clone(),
            description: spec.description.clone(),
            tier: spec.tier,
            condition: CompiledCondition::compile(&spec.condition, rule, dist)?,
            exemptions: spec
                .exemptions
                .iter()
                .map(|e| CompiledCondition::compile(e, rule, dist))
                .collect::<Result<_, _>>()?,
            cap: spec.cap,
            forced_archetype: spec.forced_archetype,
            terminal: spec.terminal,
            missing_data: spec.missing_data,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiredGate {
    pub id: String,
    pub tier: Tier,
    pub cap: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExemptedGate {
    pub id: String,
    /// Index of the first exemption that held.
    pub exemption: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnevaluatedGate {
    pub id: String,
    pub missing: Vec<String>,
}

/// Result of evaluating the gate hierarchy against one feature vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GateOutcome {
    /// Lowest cap among fired rules.
    pub cap: Option<f32>,
    /// The rule that produced `cap`.
    pub binding_rule: Option<String>,
    /// Archetype forced by the highest-priority fired rule that forces one.
    pub forced_archetype: Option<Archetype>,
    pub fired: Vec<FiredGate>,
    pub exempted: Vec<ExemptedGate>,
    pub unevaluated: Vec<UnevaluatedGate>,
    /// Rules not evaluated because a terminal rule fired first.
    pub skipped: Vec<String>,
    #[serde(skip)]
    pub quality: DataQuality,
}

impl GateOutcome {
    #[must_use]
    pub fn fired_ids(&self) -> Vec<&str> {
        self.fired.iter().map(|g| g.id.as_str()).collect()
    }

    #[must_use]
    pub fn has_fired(&self, id: &str) -> bool {
        self.fired.iter().any(|g| g.id == id)
    }

    /// Applies the cap to a score.
    #[must_use]
    pub fn apply_cap(&self, score: f32) -> f32 {
        self.cap.map_or(score, |cap| score.min(cap))
    }
}

/// Compiled, priority-ordered gate rules.
///
/// # Evaluation
///
/// Rules run in tier order (1, 2, 3) and in declared order within a tier:
///
/// 1. A condition that is unknown because of absent features marks the rule
///    as unevaluated and lowers data quality. Missing-data rules fire instead.
/// 2. A true condition is suppressed when any exemption is true. Unknown
///    exemptions do not exempt.
/// 3. The lowest cap among fired rules wins; on ties the earlier rule stays
///    binding. Later rules can only lower the cap, never raise it.
/// 4. A terminal rule that fires stops evaluation; the remaining rules are
///    reported as skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateHierarchy {
    rules: Vec<CompiledRule>,
}

impl GateHierarchy {
    /// Validates the catalog and resolves percentile thresholds against `dist`.
    pub fn compile(
        catalog: &GateCatalog,
        dist: &ReferenceDistribution,
    ) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for rule in &catalog.rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(CatalogError::DuplicateRule {
                    id: rule.id.clone(),
                });
            }
        }
        let mut rules = catalog
            .rules
            .iter()
            .map(|spec| CompiledRule::compile(spec, dist))
            .collect::<Result<Vec<_>, _>>()?;
        // stable: declared order is kept within a tier
        rules.sort_by_key(|r| r.tier);
        tracing::info!(rules = rules.len(), "compiled gate hierarchy");
        Ok(Self { rules })
    }

    #[must_use]
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    #[must_use]
    pub fn evaluate(&self, features: &FeatureVector) -> GateOutcome {
        let mut outcome = GateOutcome::default();
        let mut terminated = false;

        for rule in &self.rules {
            if terminated {
                outcome.skipped.push(rule.id.clone());
                continue;
            }

            match rule.condition.evaluate(features) {
                Truth::False => continue,
                Truth::Unknown(_) if rule.missing_data => {}
                Truth::Unknown(missing) => {
                    let missing = missing.into_iter().collect::<Vec<_>>();
                    tracing::warn!(rule = %rule.id, ?missing, "gate rule cannot be evaluated");
                    outcome.quality.push(DataIssue::UnevaluatedRule {
                        rule: rule.id.clone(),
                        missing: missing.clone(),
                    });
                    outcome.unevaluated.push(UnevaluatedGate {
                        id: rule.id.clone(),
                        missing,
                    });
                    continue;
                }
                Truth::True => {}
            }

            if let Some(exemption) = rule
                .exemptions
                .iter()
                .position(|e| e.evaluate(features).is_true())
            {
                tracing::debug!(rule = %rule.id, exemption, "gate rule exempted");
                outcome.exempted.push(ExemptedGate {
                    id: rule.id.clone(),
                    exemption,
                });
                continue;
            }

            tracing::debug!(rule = %rule.id, cap = rule.cap, "gate rule fired");
            if rule.missing_data {
                outcome.quality.push(DataIssue::IncompleteData {
                    rule: rule.id.clone(),
                });
            }
            if outcome.cap.is_none_or(|cap| rule.cap < cap) {
                outcome.cap = Some(rule.cap);
                outcome.binding_rule = Some(rule.id.clone());
            }
            if outcome.forced_archetype.is_none() {
                outcome.forced_archetype = rule.forced_archetype;
            }
            outcome.fired.push(FiredGate {
                id: rule.id.clone(),
                tier: rule.tier,
                cap: rule.cap,
            });
            terminated = rule.terminal;
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use keystone_analysis::{
        distribution::DistributionConfig, qualification::VolumeQualification,
    };
    use keystone_core::{PlayerSeason, feature::keys};

    use super::*;
    use crate::gate::catalog::{
        ABDICATION, CLUTCH_COLLAPSE, CREATION_COLLAPSE, INSUFFICIENT_SAMPLE,
        MISSING_CRITICAL_FEATURES, NEGATIVE_SIGNAL_ACCUMULATION,
    };

    fn distribution() -> ReferenceDistribution {
        let population = (0..20u8)
            .map(|i| {
                let x = f32::from(i) / 20.0;
                let features = FeatureVector::new()
                    .with(keys::USG_PCT, 0.10 + x * 0.25)
                    .with(keys::GAMES_PLAYED, 60.0)
                    .with(keys::CREATION_VOLUME_RATIO, x)
                    .with(keys::EFG_ISO_WEIGHTED, 0.4 + x * 0.2)
                    .with(keys::RS_PRESSURE_RESILIENCE, 0.3 + x * 0.3)
                    .with(keys::RS_RIM_APPETITE, x)
                    .with(keys::FT_RATE, x / 2.0);
                PlayerSeason::new(i.to_string(), "P", "2020-21", features)
            })
            .collect::<Vec<_>>();
        ReferenceDistribution::build(
            &population,
            &VolumeQualification::default(),
            DistributionConfig::default(),
        )
        .unwrap()
    }

    fn hierarchy() -> GateHierarchy {
        GateHierarchy::compile(&GateCatalog::default(), &distribution()).unwrap()
    }

    /// Rule firing whenever feature `a` is negative.
    fn negative_a(id: &str, tier: Tier, cap: f32) -> GateRuleSpec {
        GateRuleSpec::new(id, tier, Condition::lt("a", Threshold::Fixed(0.0)), cap)
    }

    /// A season that trips no default rule.
    fn clean() -> FeatureVector {
        FeatureVector::new()
            .with(keys::USG_PCT, 0.22)
            .with(keys::LEVERAGE_TS_DELTA, 0.02)
            .with(keys::LEVERAGE_USG_DELTA, 0.01)
            .with(keys::CREATION_TAX, 0.03)
            .with(keys::CREATION_VOLUME_RATIO, 0.5)
            .with(keys::RS_PRESSURE_RESILIENCE, 0.5)
            .with(keys::EFG_ISO_WEIGHTED, 0.52)
            .with(keys::SHOT_QUALITY_GENERATION_DELTA, 0.01)
            .with(keys::RS_RIM_APPETITE, 0.3)
            .with(keys::FT_RATE, 0.2)
            .with(keys::PRESSURE_SHOTS, 200.0)
            .with(keys::CLUTCH_MINUTES, 80.0)
            .with(keys::AGE, 26.0)
    }

    #[test]
    fn test_clean_season_fires_nothing() {
        let outcome = hierarchy().evaluate(&clean());
        assert_eq!(outcome.cap, None);
        assert!(outcome.fired.is_empty());
        assert!(outcome.unevaluated.is_empty());
        assert!(!outcome.quality.is_low());
    }

    #[test]
    fn test_rules_are_sorted_by_tier() {
        let spec = GateCatalog::new(vec![
            negative_a("late", Tier::Contextual, 0.5),
            negative_a("first", Tier::Fatal, 0.5),
            negative_a("second", Tier::Fatal, 0.5),
        ]);
        let hierarchy = GateHierarchy::compile(&spec, &distribution()).unwrap();
        let ids = hierarchy.rules().iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["first", "second", "late"]);

        // equal caps: the earlier rule stays binding
        let outcome = hierarchy.evaluate(&FeatureVector::new().with("a", -1.0));
        assert_eq!(outcome.binding_rule.as_deref(), Some("first"));
        assert_eq!(outcome.fired.len(), 3);
    }

    #[test]
    fn test_compiled_rules_keep_descriptions() {
        let hierarchy = hierarchy();
        let rule = hierarchy
            .rules()
            .iter()
            .find(|r| r.id == CLUTCH_COLLAPSE)
            .unwrap();
        assert_eq!(
            rule.description.as_deref(),
            Some("efficiency collapses in high-leverage minutes")
        );
        let json = serde_json::to_value(rule).unwrap();
        assert_eq!(json["description"], "efficiency collapses in high-leverage minutes");

        let bare = GateCatalog::new(vec![negative_a("bare", Tier::Contextual, 0.5)]);
        let hierarchy = GateHierarchy::compile(&bare, &distribution()).unwrap();
        assert_eq!(hierarchy.rules()[0].description, None);
        let json = serde_json::to_value(&hierarchy.rules()[0]).unwrap();
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_clutch_collapse_caps() {
        let features = clean().with(keys::LEVERAGE_TS_DELTA, -0.15);
        let outcome = hierarchy().evaluate(&features);
        assert_eq!(outcome.cap, Some(0.30));
        assert_eq!(outcome.binding_rule.as_deref(), Some(CLUTCH_COLLAPSE));
    }

    #[test]
    fn test_abdication_exemption() {
        let passive = clean()
            .with(keys::LEVERAGE_USG_DELTA, -0.08)
            .with(keys::LEVERAGE_TS_DELTA, 0.0);
        assert!(hierarchy().evaluate(&passive).has_fired(ABDICATION));

        let skilled = passive.with(keys::LEVERAGE_TS_DELTA, 0.06);
        let outcome = hierarchy().evaluate(&skilled);
        assert!(!outcome.has_fired(ABDICATION));
        assert_eq!(outcome.exempted[0].id, ABDICATION);
    }

    #[test]
    fn test_unknown_exemption_does_not_exempt() {
        let mut features = clean()
            .with(keys::LEVERAGE_USG_DELTA, -0.08)
            .with(keys::CREATION_TAX, -0.20);
        features.set(keys::LEVERAGE_TS_DELTA, None);
        features.set(keys::AGE, None);
        let outcome = hierarchy().evaluate(&features);
        assert!(outcome.has_fired(ABDICATION));
        assert!(outcome.has_fired(CREATION_COLLAPSE));
    }

    #[test]
    fn test_creation_collapse_young_exemption() {
        let features = clean()
            .with(keys::CREATION_TAX, -0.20)
            .with(keys::AGE, 20.0)
            .with(keys::LEVERAGE_TS_DELTA, 0.01)
            .with(keys::RS_PRESSURE_RESILIENCE, 0.55);
        let outcome = hierarchy().evaluate(&features);
        assert!(!outcome.has_fired(CREATION_COLLAPSE));
        assert_eq!(outcome.exempted[0].exemption, 1);
    }

    #[test]
    fn test_missing_predicate_input_is_unevaluated() {
        let mut features = clean();
        features.set(keys::LEVERAGE_TS_DELTA, None);
        let outcome = hierarchy().evaluate(&features);
        assert!(!outcome.has_fired(CLUTCH_COLLAPSE));
        assert_eq!(outcome.unevaluated[0].id, CLUTCH_COLLAPSE);
        assert_eq!(outcome.unevaluated[0].missing, vec![keys::LEVERAGE_TS_DELTA]);
        assert!(outcome.quality.is_low());
    }

    #[test]
    fn test_any_is_decided_by_a_present_true() {
        let mut features = clean().with(keys::PRESSURE_SHOTS, 10.0);
        features.set(keys::CLUTCH_MINUTES, None);
        let outcome = hierarchy().evaluate(&features);
        assert!(outcome.has_fired(INSUFFICIENT_SAMPLE));
        assert_eq!(outcome.cap, Some(0.40));
    }

    #[test]
    fn test_missing_critical_features_fires() {
        let mut features = clean();
        for key in [keys::LEVERAGE_TS_DELTA, keys::LEVERAGE_USG_DELTA, keys::CREATION_TAX] {
            features.set(key, None);
        }
        let outcome = hierarchy().evaluate(&features);
        assert!(outcome.has_fired(MISSING_CRITICAL_FEATURES));
        assert_eq!(outcome.binding_rule.as_deref(), Some(MISSING_CRITICAL_FEATURES));
        assert!(outcome.quality.issues().contains(&DataIssue::IncompleteData {
            rule: MISSING_CRITICAL_FEATURES.to_owned()
        }));
    }

    #[test]
    fn test_two_missing_critical_features_is_tolerated() {
        // 2 of 6 = 33% is not above 34%
        let mut features = clean();
        features.set(keys::LEVERAGE_TS_DELTA, None);
        features.set(keys::LEVERAGE_USG_DELTA, None);
        let outcome = hierarchy().evaluate(&features);
        assert!(!outcome.has_fired(MISSING_CRITICAL_FEATURES));
    }

    #[test]
    fn test_count_at_least() {
        let features = clean()
            .with(keys::LEVERAGE_TS_DELTA, -0.01)
            .with(keys::LEVERAGE_USG_DELTA, -0.01)
            .with(keys::CREATION_TAX, -0.01);
        let outcome = hierarchy().evaluate(&features);
        assert!(outcome.has_fired(NEGATIVE_SIGNAL_ACCUMULATION));

        // two signals and one unknown: cannot be decided
        let mut features = clean()
            .with(keys::LEVERAGE_TS_DELTA, -0.01)
            .with(keys::LEVERAGE_USG_DELTA, -0.01);
        features.set(keys::SHOT_QUALITY_GENERATION_DELTA, None);
        let outcome = hierarchy().evaluate(&features);
        assert!(!outcome.has_fired(NEGATIVE_SIGNAL_ACCUMULATION));
        assert!(outcome.unevaluated.iter().any(|g| g.id == NEGATIVE_SIGNAL_ACCUMULATION));
    }

    #[test]
    fn test_terminal_rule_skips_the_rest() {
        let catalog = GateCatalog::new(vec![
            negative_a("stop", Tier::Fatal, 0.5).terminal(),
            negative_a("lower", Tier::Contextual, 0.1),
        ]);
        let hierarchy = GateHierarchy::compile(&catalog, &distribution()).unwrap();
        let outcome = hierarchy.evaluate(&FeatureVector::new().with("a", -1.0));
        assert_eq!(outcome.cap, Some(0.5));
        assert_eq!(outcome.skipped, vec!["lower"]);
    }

    #[test]
    fn test_forced_archetype_from_highest_priority_rule() {
        let catalog = GateCatalog::new(vec![
            negative_a("t3", Tier::Contextual, 0.2).forcing(Archetype::Victim),
            negative_a("t1", Tier::Fatal, 0.5).forcing(Archetype::Sniper),
        ]);
        let hierarchy = GateHierarchy::compile(&catalog, &distribution()).unwrap();
        let outcome = hierarchy.evaluate(&FeatureVector::new().with("a", -1.0));
        assert_eq!(outcome.forced_archetype, Some(Archetype::Sniper));
        assert_eq!(outcome.binding_rule.as_deref(), Some("t3"));
    }

    #[test]
    fn test_compile_rejects_invalid_catalogs() {
        let dist = distribution();
        let rule = |id: &str| negative_a(id, Tier::Contextual, 0.5);

        let dup = GateCatalog::new(vec![rule("x"), rule("x")]);
        assert!(matches!(
            GateHierarchy::compile(&dup, &dist),
            Err(CatalogError::DuplicateRule { .. })
        ));

        let mut bad_cap = rule("x");
        bad_cap.cap = 1.5;
        assert!(matches!(
            GateHierarchy::compile(&GateCatalog::new(vec![bad_cap]), &dist),
            Err(CatalogError::InvalidCap { .. })
        ));

        let mut fatal = rule("x");
        fatal.tier = Tier::Fatal;
        let fatal = fatal
            .exempt_if(Condition::lt("b", Threshold::Fixed(0.0)))
            .exempt_if(Condition::lt("c", Threshold::Fixed(0.0)))
            .exempt_if(Condition::lt("d", Threshold::Fixed(0.0)));
        assert!(matches!(
            GateHierarchy::compile(&GateCatalog::new(vec![fatal]), &dist),
            Err(CatalogError::TooManyFatalExemptions { count: 3, .. })
        ));

        let unresolved = GateRuleSpec::new(
            "x",
            Tier::Contextual,
            Condition::lt("never_observed", Threshold::pct(Pct::P50)),
            0.5,
        );
        assert!(matches!(
            GateHierarchy::compile(&GateCatalog::new(vec![unresolved]), &dist),
            Err(CatalogError::UnresolvedPercentile { .. })
        ));

        let stray = GateRuleSpec::new(
            "x",
            Tier::DataQuality,
            Condition::MissingFraction {
                features: vec!["a".to_owned()],
                above: 0.5,
            },
            0.5,
        );
        assert!(matches!(
            GateHierarchy::compile(&GateCatalog::new(vec![stray.clone()]), &dist),
            Err(CatalogError::MissingFractionOutsideMissingDataRule { .. })
        ));

        let mut misplaced = stray.missing_data();
        misplaced.tier = Tier::Contextual;
        assert!(matches!(
            GateHierarchy::compile(&GateCatalog::new(vec![misplaced]), &dist),
            Err(CatalogError::MissingDataRuleTier { .. })
        ));
    }

    #[test]
    fn test_percentiles_are_resolved_at_compile_time() {
        let dist = distribution();
        let hierarchy = GateHierarchy::compile(&GateCatalog::default(), &dist).unwrap();
        let rule = hierarchy
            .rules()
            .iter()
            .find(|r| r.id == crate::gate::catalog::SELF_CREATED_VOLUME_MINIMUM)
            .unwrap();
        let CompiledCondition::Compare { threshold, .. } = &rule.condition else {
            panic!("unexpected condition shape");
        };
        assert_eq!(
            Some(*threshold),
            dist.percentile(keys::CREATION_VOLUME_RATIO, Pct::P10)
        );
    }
}
