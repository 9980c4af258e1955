//! Archetype classifier contract and the softmax artifact.
//!
//! The classifier is trained elsewhere and treated as a black box. The engine
//! only relies on [`ArchetypeClassifier`]: a fixed, versioned class set, the
//! feature keys the model reads, and a deterministic probability output.
//!
//! # Artifact format
//!
//! [`SoftmaxClassifier`] reads a multinomial logistic regression from JSON:
//!
//! ```json
//! {
//!   "name": "archetype-logit",
//!   "version": "2024.1",
//!   "class_set": "archetype-v1",
//!   "trained_at": "2024-06-01T00:00:00Z",
//!   "classes": ["king", "bulldozer", "sniper", "victim"],
//!   "features": [
//!     { "id": "creation_tax", "mean": 0.0, "scale": 0.08, "impute": 0.0 }
//!   ],
//!   "coefficients": [[1.2], [0.4], [-0.3], [-1.1]],
//!   "intercepts": [0.0, 0.0, 0.0, 0.0]
//! }
//! ```
//!
//! `coefficients[k][j]` is the weight of feature `j` for class `k`. Inputs are
//! standardized as `(x - mean) / scale`; absent inputs are replaced by
//! `impute` before standardization.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt, io,
};

use chrono::{DateTime, Utc};
use keystone_core::{ARCHETYPE_CLASS_SET, Archetype, FeatureVector, interaction};
use serde::{Deserialize, Serialize};

/// Probability per archetype. Sums to 1.
pub type ClassProbabilities = BTreeMap<Archetype, f32>;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ClassifierError {
    #[display("failed to parse classifier artifact")]
    Json(serde_json::Error),
    #[display("unknown class '{class}' in classifier artifact")]
    UnknownClass { class: String },
    #[display("class '{class}' is listed twice")]
    DuplicateClass { class: Archetype },
    #[display("{what}: expected {expected} entries, got {actual}")]
    Shape {
        what: String,
        expected: usize,
        actual: usize,
    },
    #[display("feature '{feature}': scale must be positive and finite (got {scale})")]
    InvalidScale { feature: String, scale: f32 },
    #[display("{what} is not a finite number")]
    NonFinite { what: String },
    #[display("classifier expects features the engine does not supply: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },
    #[display("classifier class set '{actual}' does not match engine class set '{expected}'")]
    ClassSetMismatch { expected: String, actual: String },
}

/// Output of one classifier call.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub probabilities: ClassProbabilities,
    /// Model inputs that were absent and replaced by the model default.
    pub imputed: Vec<String>,
}

impl Prediction {
    /// The most probable class. Ties go to the first class in [`Archetype::ALL`] order.
    #[must_use]
    pub fn argmax(&self) -> Option<Archetype> {
        self.probabilities
            .iter()
            .fold(None, |best: Option<(Archetype, f32)>, (&class, &p)| match best {
                Some((_, best_p)) if best_p >= p => best,
                _ => Some((class, p)),
            })
            .map(|(class, _)| class)
    }
}

/// A trained probabilistic archetype classifier.
///
/// Implementations must be deterministic: identical inputs give identical
/// probabilities.
pub trait ArchetypeClassifier: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Identifier of the class set, e.g. [`ARCHETYPE_CLASS_SET`].
    fn class_set(&self) -> &str;

    fn classes(&self) -> &[Archetype];

    /// Feature keys the model reads.
    fn feature_schema(&self) -> Vec<&str>;

    fn predict_probabilities(&self, features: &FeatureVector) -> Prediction;
}

/// Fails unless `classifier` can be fed from `supplied` keys and predicts
/// exactly the engine's archetypes.
///
/// Derived interaction keys are always supplied.
pub fn ensure_schema(
    classifier: &dyn ArchetypeClassifier,
    supplied: &BTreeSet<String>,
) -> Result<(), ClassifierError> {
    if classifier.class_set() != ARCHETYPE_CLASS_SET {
        return Err(ClassifierError::ClassSetMismatch {
            expected: ARCHETYPE_CLASS_SET.to_owned(),
            actual: classifier.class_set().to_owned(),
        });
    }
    let classes = classifier.classes().iter().copied().collect::<BTreeSet<_>>();
    if classes != BTreeSet::from(Archetype::ALL) || classes.len() != classifier.classes().len() {
        return Err(ClassifierError::ClassSetMismatch {
            expected: format!("{:?}", Archetype::ALL.map(Archetype::id)),
            actual: format!(
                "{:?}",
                classifier.classes().iter().map(|c| c.id()).collect::<Vec<_>>()
            ),
        });
    }

    let missing = classifier
        .feature_schema()
        .into_iter()
        .filter(|f| !supplied.contains(*f) && !interaction::is_derived(f))
        .map(str::to_owned)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(ClassifierError::SchemaMismatch { missing });
    }
    tracing::info!(
        classifier = classifier.name(),
        version = classifier.version(),
        features = classifier.feature_schema().len(),
        "classifier schema verified"
    );
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFeature {
    pub id: String,
    pub mean: f32,
    pub scale: f32,
    /// Raw value substituted when the feature is absent.
    pub impute: f32,
}

/// Serialized multinomial logistic regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxArtifact {
    pub name: String,
    pub version: String,
    pub class_set: String,
    pub trained_at: DateTime<Utc>,
    pub classes: Vec<String>,
    pub features: Vec<ModelFeature>,
    pub coefficients: Vec<Vec<f32>>,
    pub intercepts: Vec<f32>,
}

/// Multinomial logistic regression over standardized features.
#[derive(Debug, Clone)]
pub struct SoftmaxClassifier {
    artifact: SoftmaxArtifact,
    classes: Vec<Archetype>,
}

impl SoftmaxClassifier {
    /// Validates an artifact: class names, matrix shapes, scales and finiteness.
    pub fn from_artifact(artifact: SoftmaxArtifact) -> Result<Self, ClassifierError> {
        let mut classes = vec![];
        for class in &artifact.classes {
            let archetype = Archetype::from_id(class)
                .ok_or_else(|| ClassifierError::UnknownClass {
                    class: class.clone(),
                })?;
            if classes.contains(&archetype) {
                return Err(ClassifierError::DuplicateClass { class: archetype });
            }
            classes.push(archetype);
        }

        let shape = |what: &str, expected: usize, actual: usize| {
            if expected == actual {
                Ok(())
            } else {
                Err(ClassifierError::Shape {
                    what: what.to_owned(),
                    expected,
                    actual,
                })
            }
        };
        shape("intercepts", classes.len(), artifact.intercepts.len())?;
        shape("coefficient rows", classes.len(), artifact.coefficients.len())?;
        for (class, row) in artifact.classes.iter().zip(&artifact.coefficients) {
            shape(
                &format!("coefficients of class '{class}'"),
                artifact.features.len(),
                row.len(),
            )?;
        }

        for feature in &artifact.features {
            if !(feature.scale.is_finite() && feature.scale > 0.0) {
                return Err(ClassifierError::InvalidScale {
                    feature: feature.id.clone(),
                    scale: feature.scale,
                });
            }
            if !(feature.mean.is_finite() && feature.impute.is_finite()) {
                return Err(ClassifierError::NonFinite {
                    what: format!("mean or impute of feature '{}'", feature.id),
                });
            }
        }
        let weights_finite = artifact
            .coefficients
            .iter()
            .flatten()
            .chain(&artifact.intercepts)
            .all(|w| w.is_finite());
        if !weights_finite {
            return Err(ClassifierError::NonFinite {
                what: "a coefficient or intercept".to_owned(),
            });
        }

        Ok(Self { artifact, classes })
    }

    pub fn from_json_reader<R>(reader: R) -> Result<Self, ClassifierError>
    where
        R: io::Read,
    {
        let artifact = serde_json::from_reader(reader).map_err(ClassifierError::Json)?;
        Self::from_artifact(artifact)
    }

    #[must_use]
    pub fn artifact(&self) -> &SoftmaxArtifact {
        &self.artifact
    }

    #[must_use]
    pub fn trained_at(&self) -> DateTime<Utc> {
        self.artifact.trained_at
    }
}

impl ArchetypeClassifier for SoftmaxClassifier {
    fn name(&self) -> &str {
        &self.artifact.name
    }

    fn version(&self) -> &str {
        &self.artifact.version
    }

    fn class_set(&self) -> &str {
        &self.artifact.class_set
    }

    fn classes(&self) -> &[Archetype] {
        &self.classes
    }

    fn feature_schema(&self) -> Vec<&str> {
        self.artifact
            .features
            .iter()
            .map(|f| f.id.as_str())
            .collect()
    }

    fn predict_probabilities(&self, features: &FeatureVector) -> Prediction {
        let mut imputed = vec![];
        let inputs = self
            .artifact
            .features
            .iter()
            .map(|f| {
                let raw = features.get(&f.id).unwrap_or_else(|| {
                    imputed.push(f.id.clone());
                    f.impute
                });
                (raw - f.mean) / f.scale
            })
            .collect::<Vec<_>>();

        let logits = self
            .artifact
            .coefficients
            .iter()
            .zip(&self.artifact.intercepts)
            .map(|(row, intercept)| {
                intercept + row.iter().zip(&inputs).map(|(w, x)| w * x).sum::<f32>()
            })
            .collect::<Vec<_>>();

        Prediction {
            probabilities: self.classes.iter().copied().zip(softmax(&logits)).collect(),
            imputed,
        }
    }
}

/// Numerically stable softmax.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps = logits.iter().map(|z| (z - max).exp()).collect::<Vec<_>>();
    let sum = exps.iter().sum::<f32>();
    exps.into_iter().map(|e| e / sum).collect()
}
