//! Star-level performance score.
//!
//! The classifier's class probabilities are collapsed into one scalar,
//! `Σ p(class) × weight(class)`, and the gate cap is applied on top:
//! `final = min(raw, cap)`.

use std::{collections::BTreeMap, sync::Arc};

use keystone_core::{Archetype, FeatureVector};
use serde::{Deserialize, Serialize};

use crate::{
    classifier::{ArchetypeClassifier, ClassProbabilities},
    gate::GateOutcome,
};

/// Contribution of each archetype to the star-level score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StarLevelWeights(BTreeMap<Archetype, f32>);

impl Default for StarLevelWeights {
    fn default() -> Self {
        Self(
            Archetype::ALL
                .into_iter()
                .map(|a| (a, if a.is_star_level() { 1.0 } else { 0.0 }))
                .collect(),
        )
    }
}

impl StarLevelWeights {
    #[must_use]
    pub fn get(&self, archetype: Archetype) -> f32 {
        self.0.get(&archetype).copied().unwrap_or(0.0)
    }

    /// Weighted probability mass, clamped to `[0, 1]`.
    #[must_use]
    pub fn score(&self, probabilities: &ClassProbabilities) -> f32 {
        probabilities
            .iter()
            .map(|(&class, &p)| p * self.get(class))
            .sum::<f32>()
            .clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceScore {
    pub probabilities: ClassProbabilities,
    /// Classifier argmax.
    pub predicted: Option<Archetype>,
    pub raw: f32,
    /// `min(raw, cap)`.
    pub score: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imputed: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PerformanceScorer {
    classifier: Arc<dyn ArchetypeClassifier>,
    weights: StarLevelWeights,
}

impl PerformanceScorer {
    #[must_use]
    pub fn new(classifier: Arc<dyn ArchetypeClassifier>, weights: StarLevelWeights) -> Self {
        Self {
            classifier,
            weights,
        }
    }

    #[must_use]
    pub fn classifier(&self) -> &dyn ArchetypeClassifier {
        self.classifier.as_ref()
    }

    #[must_use]
    pub fn weights(&self) -> &StarLevelWeights {
        &self.weights
    }

    #[must_use]
    pub fn score(&self, features: &FeatureVector, gates: &GateOutcome) -> PerformanceScore {
        let prediction = self.classifier.predict_probabilities(features);
        let raw = self.weights.score(&prediction.probabilities);
        PerformanceScore {
            predicted: prediction.argmax(),
            probabilities: prediction.probabilities,
            raw,
            score: gates.apply_cap(raw),
            imputed: prediction.imputed,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classifier::Prediction;

    /// Returns the same probabilities for every input.
    #[derive(Debug)]
    pub(crate) struct FixedClassifier(pub(crate) ClassProbabilities);

    impl FixedClassifier {
        pub(crate) fn star(p: f32) -> Self {
            Self(ClassProbabilities::from([
                (Archetype::King, p),
                (Archetype::Bulldozer, 0.0),
                (Archetype::Sniper, 1.0 - p),
                (Archetype::Victim, 0.0),
            ]))
        }
    }

    impl ArchetypeClassifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        fn version(&self) -> &str {
            "0"
        }

        fn class_set(&self) -> &str {
            keystone_core::ARCHETYPE_CLASS_SET
        }

        fn classes(&self) -> &[Archetype] {
            &Archetype::ALL
        }

        fn feature_schema(&self) -> Vec<&str> {
            vec![]
        }

        fn predict_probabilities(&self, _features: &FeatureVector) -> Prediction {
            Prediction {
                probabilities: self.0.clone(),
                imputed: vec![],
            }
        }
    }

    #[test]
    fn test_default_weights_count_star_classes() {
        let weights = StarLevelWeights::default();
        let probabilities = ClassProbabilities::from([
            (Archetype::King, 0.5),
            (Archetype::Bulldozer, 0.2),
            (Archetype::Sniper, 0.2),
            (Archetype::Victim, 0.1),
        ]);
        assert!((weights.score(&probabilities) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_cap_is_applied() {
        let scorer = PerformanceScorer::new(
            Arc::new(FixedClassifier::star(0.9)),
            StarLevelWeights::default(),
        );
        let uncapped = scorer.score(&FeatureVector::new(), &GateOutcome::default());
        assert!((uncapped.raw - 0.9).abs() < 1e-6);
        assert_eq!(uncapped.score, uncapped.raw);
        assert_eq!(uncapped.predicted, Some(Archetype::King));

        let gates = GateOutcome {
            cap: Some(0.3),
            binding_rule: Some("clutch_collapse".to_owned()),
            ..GateOutcome::default()
        };
        let capped = scorer.score(&FeatureVector::new(), &gates);
        assert_eq!(capped.score, 0.3);
        assert!(capped.score < capped.raw);
    }

    #[test]
    fn test_cap_above_raw_keeps_raw() {
        let scorer = PerformanceScorer::new(
            Arc::new(FixedClassifier::star(0.2)),
            StarLevelWeights::default(),
        );
        let gates = GateOutcome {
            cap: Some(0.5),
            ..GateOutcome::default()
        };
        let score = scorer.score(&FeatureVector::new(), &gates);
        assert_eq!(score.score, score.raw);
    }

    #[test]
    fn test_weights_json_is_a_map() {
        let json = serde_json::to_value(StarLevelWeights::default()).unwrap();
        assert_eq!(json["king"], 1.0);
        assert_eq!(json["victim"], 0.0);
    }
}
