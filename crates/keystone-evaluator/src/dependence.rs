//! Dependence (portability) score.
//!
//! Two competing pathways to value are scored independently:
//!
//! - **Physical**: rim pressure and free-throw generation. Dominance that is
//!   fed by teammates' setups does not travel, so the pathway is halved when
//!   self-created volume is very low.
//! - **Skill**: shot quality generated, creation efficiency and isolation
//!   efficiency. Negative shot-quality generation cannot indicate independent
//!   skill, so the pathway is capped near zero when it is negative.
//!
//! ```text
//! dependence = 1 - max(physical, skill)
//! ```
//!
//! Mastering either pathway is enough for independence; being mediocre at
//! both leaves a player dependent.
//!
//! Components are normalized to `[0, 1]` over the P10..P90 range of the
//! reference distribution. Absent components are dropped and the remaining
//! weights renormalized; a pathway with no present component contributes 0.

use keystone_analysis::distribution::{Pct, ReferenceDistribution};
use keystone_core::{DataQuality, FeatureVector, feature::keys};
use serde::{Deserialize, Serialize};

const CONSUMER: &str = "dependence";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwayComponent {
    pub feature: String,
    pub weight: f32,
}

impl PathwayComponent {
    fn new(feature: &str, weight: f32) -> Self {
        Self {
            feature: feature.to_owned(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependenceConfig {
    pub physical: Vec<PathwayComponent>,
    pub skill: Vec<PathwayComponent>,
    /// Self-created volume feature checked for assisted dominance.
    pub assisted_volume_feature: String,
    pub assisted_volume_below: f32,
    pub assisted_penalty: f32,
    /// Skill pathway ceiling when shot quality generated is negative.
    pub skill_floor_feature: String,
    pub skill_floor_cap: f32,
    pub normalize_low: Pct,
    pub normalize_high: Pct,
}

impl Default for DependenceConfig {
    fn default() -> Self {
        Self {
            physical: vec![
                PathwayComponent::new(keys::RS_RIM_APPETITE, 0.6),
                PathwayComponent::new(keys::FT_RATE, 0.4),
            ],
            skill: vec![
                PathwayComponent::new(keys::SHOT_QUALITY_GENERATION_DELTA, 0.4),
                PathwayComponent::new(keys::CREATION_TAX, 0.3),
                PathwayComponent::new(keys::EFG_ISO_WEIGHTED, 0.3),
            ],
            assisted_volume_feature: keys::CREATION_VOLUME_RATIO.to_owned(),
            assisted_volume_below: 0.15,
            assisted_penalty: 0.5,
            skill_floor_feature: keys::SHOT_QUALITY_GENERATION_DELTA.to_owned(),
            skill_floor_cap: 0.05,
            normalize_low: Pct::P10,
            normalize_high: Pct::P90,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DependenceScore {
    /// `1 - max(physical, skill)`, in `[0, 1]`.
    pub value: f32,
    /// `None` when no physical component was present.
    pub physical: Option<f32>,
    /// `None` when no skill component was present.
    pub skill: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct DependenceScorer {
    config: DependenceConfig,
}

impl DependenceScorer {
    #[must_use]
    pub fn new(config: DependenceConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &DependenceConfig {
        &self.config
    }

    /// Scores `features`; absent inputs are recorded in `quality`.
    pub fn score(
        &self,
        features: &FeatureVector,
        dist: &ReferenceDistribution,
        quality: &mut DataQuality,
    ) -> DependenceScore {
        let c = &self.config;

        let physical = self
            .pathway(&c.physical, features, dist, quality)
            .map(|score| match features.get(&c.assisted_volume_feature) {
                Some(volume) if volume < c.assisted_volume_below => score * c.assisted_penalty,
                Some(_) => score,
                None => {
                    quality.missing_feature(&c.assisted_volume_feature, CONSUMER);
                    score
                }
            });

        let skill = self
            .pathway(&c.skill, features, dist, quality)
            .map(|score| match features.get(&c.skill_floor_feature) {
                Some(sq) if sq < 0.0 => score.min(c.skill_floor_cap),
                _ => score,
            });

        let best = physical.unwrap_or(0.0).max(skill.unwrap_or(0.0));
        DependenceScore {
            value: (1.0 - best).clamp(0.0, 1.0),
            physical,
            skill,
        }
    }

    fn pathway(
        &self,
        components: &[PathwayComponent],
        features: &FeatureVector,
        dist: &ReferenceDistribution,
        quality: &mut DataQuality,
    ) -> Option<f32> {
        let mut total = 0.0;
        let mut weight = 0.0;
        for component in components {
            let value = features.get(&component.feature).and_then(|v| {
                let lo = dist.percentile(&component.feature, self.config.normalize_low)?;
                let hi = dist.percentile(&component.feature, self.config.normalize_high)?;
                Some(normalize(v, lo, hi))
            });
            match value {
                Some(v) => {
                    total += v * component.weight;
                    weight += component.weight;
                }
                None => quality.missing_feature(&component.feature, CONSUMER),
            }
        }
        (weight > 0.0).then(|| (total / weight).clamp(0.0, 1.0))
    }
}

/// Maps `v` linearly from `[lo, hi]` to `[0, 1]`, clamping outside.
///
/// A degenerate range maps its own value to 0.5.
fn normalize(v: f32, lo: f32, hi: f32) -> f32 {
    const EPSILON: f32 = 1e-9;
    let span = hi - lo;
    if span > EPSILON {
        ((v - lo) / span).clamp(0.0, 1.0)
    } else if v > hi {
        1.0
    } else if v < lo {
        0.0
    } else {
        0.5
    }
}

#[cfg(test)]
mod tests {
    use keystone_analysis::{
        distribution::DistributionConfig, qualification::VolumeQualification,
    };
    use keystone_core::PlayerSeason;

    use super::*;

    /// Every component spans 0.0..1.0 over the population.
    fn distribution() -> ReferenceDistribution {
        let population = (0..=100u8)
            .map(|i| {
                let x = f32::from(i) / 100.0;
                let features = FeatureVector::new()
                    .with(keys::USG_PCT, 0.2)
                    .with(keys::GAMES_PLAYED, 60.0)
                    .with(keys::RS_RIM_APPETITE, x)
                    .with(keys::FT_RATE, x)
                    .with(keys::SHOT_QUALITY_GENERATION_DELTA, x)
                    .with(keys::CREATION_TAX, x)
                    .with(keys::EFG_ISO_WEIGHTED, x)
                    .with(keys::CREATION_VOLUME_RATIO, x);
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

    fn features(rim: f32, ft: f32, sq: f32, tax: f32, iso: f32, volume: f32) -> FeatureVector {
        FeatureVector::new()
            .with(keys::RS_RIM_APPETITE, rim)
            .with(keys::FT_RATE, ft)
            .with(keys::SHOT_QUALITY_GENERATION_DELTA, sq)
            .with(keys::CREATION_TAX, tax)
            .with(keys::EFG_ISO_WEIGHTED, iso)
            .with(keys::CREATION_VOLUME_RATIO, volume)
    }

    #[test]
    fn test_either_pathway_is_sufficient() {
        let dist = distribution();
        let scorer = DependenceScorer::default();
        let mut quality = DataQuality::default();

        let physical = scorer.score(&features(0.9, 0.9, 0.1, 0.1, 0.1, 0.5), &dist, &mut quality);
        assert!(physical.value < 0.05);

        let skill = scorer.score(&features(0.1, 0.1, 0.9, 0.9, 0.9, 0.5), &dist, &mut quality);
        assert!(skill.value < 0.05);

        let mediocre = scorer.score(&features(0.4, 0.4, 0.4, 0.4, 0.4, 0.5), &dist, &mut quality);
        assert!(mediocre.value > 0.6);
        assert!(!quality.is_low());
    }

    #[test]
    fn test_value_is_one_minus_max() {
        let dist = distribution();
        let scorer = DependenceScorer::default();
        let mut quality = DataQuality::default();
        let score = scorer.score(&features(0.7, 0.2, 0.3, 0.6, 0.5, 0.5), &dist, &mut quality);
        let physical = score.physical.unwrap();
        let skill = score.skill.unwrap();
        assert!((score.value - (1.0 - physical.max(skill))).abs() < 1e-6);
        // not the average of the pathways
        assert!((score.value - (1.0 - (physical + skill) / 2.0)).abs() > 1e-3);
    }

    #[test]
    fn test_assisted_dominance_is_penalized() {
        let dist = distribution();
        let scorer = DependenceScorer::default();
        let mut quality = DataQuality::default();
        let creator = scorer.score(&features(0.9, 0.9, 0.0, 0.0, 0.0, 0.5), &dist, &mut quality);
        let assisted = scorer.score(&features(0.9, 0.9, 0.0, 0.0, 0.0, 0.1), &dist, &mut quality);
        let ratio = assisted.physical.unwrap() / creator.physical.unwrap();
        assert!((ratio - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_negative_shot_quality_caps_skill() {
        // shot quality spans -1..1 so a negative raw value can still normalize high
        let population = (0..=100u8)
            .map(|i| {
                let x = f32::from(i) / 100.0;
                let features = FeatureVector::new()
                    .with(keys::USG_PCT, 0.2)
                    .with(keys::GAMES_PLAYED, 60.0)
                    .with(keys::SHOT_QUALITY_GENERATION_DELTA, 2.0 * x - 1.0)
                    .with(keys::CREATION_TAX, x)
                    .with(keys::EFG_ISO_WEIGHTED, x);
                PlayerSeason::new(i.to_string(), "P", "2020-21", features)
            })
            .collect::<Vec<_>>();
        let dist = ReferenceDistribution::build(
            &population,
            &VolumeQualification::default(),
            DistributionConfig::default(),
        )
        .unwrap();
        let input = FeatureVector::new()
            .with(keys::SHOT_QUALITY_GENERATION_DELTA, -0.01)
            .with(keys::CREATION_TAX, 1.0)
            .with(keys::EFG_ISO_WEIGHTED, 1.0);
        let mut quality = DataQuality::default();
        let score = DependenceScorer::default().score(&input, &dist, &mut quality);
        assert!(score.skill.unwrap() <= 0.05);
        assert!(score.value > 0.94);
    }

    #[test]
    fn test_missing_components_renormalize() {
        let dist = distribution();
        let mut input = features(0.9, 0.0, 0.5, 0.5, 0.5, 0.5);
        input.set(keys::FT_RATE, None);
        let mut quality = DataQuality::default();
        let score = DependenceScorer::default().score(&input, &dist, &mut quality);
        // rim alone carries the whole physical weight
        let physical = score.physical.unwrap();
        assert!((physical - 1.0).abs() < 1e-6);
        assert!(quality.is_low());
    }

    #[test]
    fn test_empty_pathway_is_absent() {
        let dist = distribution();
        let input = FeatureVector::new()
            .with(keys::SHOT_QUALITY_GENERATION_DELTA, 0.5)
            .with(keys::CREATION_TAX, 0.5)
            .with(keys::EFG_ISO_WEIGHTED, 0.5);
        let mut quality = DataQuality::default();
        let score = DependenceScorer::default().score(&input, &dist, &mut quality);
        assert_eq!(score.physical, None);
        assert!(score.skill.is_some());
        assert!((0.0..=1.0).contains(&score.value));

        let nothing = DependenceScorer::default().score(&FeatureVector::new(), &dist, &mut quality);
        assert_eq!(nothing.value, 1.0);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(5.0, 0.0, 10.0), 0.5);
        assert_eq!(normalize(-1.0, 0.0, 10.0), 0.0);
        assert_eq!(normalize(11.0, 0.0, 10.0), 1.0);
        assert_eq!(normalize(3.0, 3.0, 3.0), 0.5);
        assert_eq!(normalize(4.0, 3.0, 3.0), 1.0);
    }
}
