//! The default gate catalog.

use keystone_analysis::distribution::Pct;
use keystone_core::{
    Archetype,
    feature::{CRITICAL_FEATURES, keys},
};
use serde::{Deserialize, Serialize};

use super::spec::{Condition, GateRuleSpec, Threshold, Tier};

/// Ordered list of gate rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GateCatalog {
    pub rules: Vec<GateRuleSpec>,
}

impl GateCatalog {
    #[must_use]
    pub fn new(rules: Vec<GateRuleSpec>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&GateRuleSpec> {
        self.rules.iter().find(|r| r.id == id)
    }
}

impl Default for GateCatalog {
    fn default() -> Self {
        Self::new(vec![
            clutch_collapse(),
            abdication(),
            creation_collapse(),
            missing_critical_features(),
            insufficient_sample(),
            efficiency_floor(),
            self_created_volume_minimum(),
            negative_signal_accumulation(),
            replacement_level_creator(),
        ])
    }
}

fn fixed(v: f32) -> Threshold {
    Threshold::Fixed(v)
}

fn pct(p: Pct) -> Threshold {
    Threshold::pct(p)
}

pub const CLUTCH_COLLAPSE: &str = "clutch_collapse";
pub const ABDICATION: &str = "abdication";
pub const CREATION_COLLAPSE: &str = "creation_collapse";
pub const MISSING_CRITICAL_FEATURES: &str = "missing_critical_features";
pub const INSUFFICIENT_SAMPLE: &str = "insufficient_sample";
pub const EFFICIENCY_FLOOR: &str = "efficiency_floor";
pub const SELF_CREATED_VOLUME_MINIMUM: &str = "self_created_volume_minimum";
pub const NEGATIVE_SIGNAL_ACCUMULATION: &str = "negative_signal_accumulation";
pub const REPLACEMENT_LEVEL_CREATOR: &str = "replacement_level_creator";

fn clutch_collapse() -> GateRuleSpec {
    GateRuleSpec::new(
        CLUTCH_COLLAPSE,
        Tier::Fatal,
        Condition::lt(keys::LEVERAGE_TS_DELTA, fixed(-0.10)),
        0.30,
    )
    .describe("efficiency collapses in high-leverage minutes")
}

fn abdication() -> GateRuleSpec {
    GateRuleSpec::new(
        ABDICATION,
        Tier::Fatal,
        Condition::lt(keys::LEVERAGE_USG_DELTA, fixed(-0.05)),
        0.30,
    )
    // deferring while getting more efficient is a skill read, not passivity
    .exempt_if(Condition::ge(keys::LEVERAGE_TS_DELTA, fixed(0.05)))
    .describe("usage drops in high-leverage minutes without an efficiency gain")
}

fn creation_collapse() -> GateRuleSpec {
    GateRuleSpec::new(
        CREATION_COLLAPSE,
        Tier::Fatal,
        Condition::lt(keys::CREATION_TAX, fixed(-0.15)),
        0.30,
    )
    .exempt_if(Condition::All(vec![
        Condition::ge(keys::CREATION_VOLUME_RATIO, pct(Pct::P90)),
        Condition::ge(keys::EFG_ISO_WEIGHTED, pct(Pct::P75)),
    ]))
    .exempt_if(Condition::All(vec![
        Condition::lt(keys::AGE, fixed(22.0)),
        Condition::gt(keys::LEVERAGE_TS_DELTA, fixed(0.0)),
        Condition::ge(keys::RS_PRESSURE_RESILIENCE, pct(Pct::P50)),
    ]))
    .describe("self-created efficiency collapses")
}

fn missing_critical_features() -> GateRuleSpec {
    GateRuleSpec::new(
        MISSING_CRITICAL_FEATURES,
        Tier::DataQuality,
        Condition::MissingFraction {
            features: CRITICAL_FEATURES.iter().map(|&f| f.to_owned()).collect(),
            above: 0.34,
        },
        0.30,
    )
    .missing_data()
    .describe("too many critical features are missing")
}

fn insufficient_sample() -> GateRuleSpec {
    GateRuleSpec::new(
        INSUFFICIENT_SAMPLE,
        Tier::DataQuality,
        Condition::Any(vec![
            Condition::lt(keys::PRESSURE_SHOTS, fixed(50.0)),
            Condition::lt(keys::CLUTCH_MINUTES, fixed(15.0)),
        ]),
        0.40,
    )
    .describe("pressure or clutch sample is too small")
}

fn efficiency_floor() -> GateRuleSpec {
    GateRuleSpec::new(
        EFFICIENCY_FLOOR,
        Tier::Contextual,
        Condition::All(vec![
            Condition::lt(keys::RS_PRESSURE_RESILIENCE, pct(Pct::P25)),
            Condition::lt(keys::EFG_ISO_WEIGHTED, pct(Pct::P25)),
        ]),
        0.50,
    )
    .exempt_if(Condition::ge(keys::RS_RIM_APPETITE, pct(Pct::P80)))
    .describe("bottom-quartile efficiency both under pressure and in isolation")
}

fn self_created_volume_minimum() -> GateRuleSpec {
    GateRuleSpec::new(
        SELF_CREATED_VOLUME_MINIMUM,
        Tier::Contextual,
        Condition::lt(keys::CREATION_VOLUME_RATIO, pct(Pct::P10)),
        0.40,
    )
    .forcing(Archetype::Sniper)
    .exempt_if(Condition::ge(keys::RS_RIM_APPETITE, pct(Pct::P90)))
    .describe("too little self-created volume to carry an offense")
}

fn negative_signal_accumulation() -> GateRuleSpec {
    GateRuleSpec::new(
        NEGATIVE_SIGNAL_ACCUMULATION,
        Tier::Contextual,
        Condition::CountAtLeast {
            min: 3,
            of: vec![
                Condition::lt(keys::LEVERAGE_TS_DELTA, fixed(0.0)),
                Condition::lt(keys::LEVERAGE_USG_DELTA, fixed(0.0)),
                Condition::lt(keys::CREATION_TAX, fixed(0.0)),
                Condition::lt(keys::RS_PRESSURE_RESILIENCE, pct(Pct::P33)),
                Condition::lt(keys::SHOT_QUALITY_GENERATION_DELTA, fixed(0.0)),
            ],
        },
        0.30,
    )
    .describe("several independent negative signals at once")
}

fn replacement_level_creator() -> GateRuleSpec {
    GateRuleSpec::new(
        REPLACEMENT_LEVEL_CREATOR,
        Tier::Contextual,
        Condition::All(vec![
            Condition::ge(keys::USG_PCT, fixed(0.25)),
            Condition::ge(keys::CREATION_VOLUME_RATIO, pct(Pct::P50)),
            Condition::lt(keys::EFG_ISO_WEIGHTED, pct(Pct::P25)),
        ]),
        0.35,
    )
    .forcing(Archetype::Victim)
    .exempt_if(Condition::All(vec![
        Condition::ge(keys::RS_RIM_APPETITE, pct(Pct::P90)),
        Condition::ge(keys::FT_RATE, pct(Pct::P75)),
    ]))
    .describe("high-usage creator with replacement-level isolation efficiency")
}
