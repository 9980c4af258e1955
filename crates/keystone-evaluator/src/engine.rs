//! The usage-conditional inference engine.
//!
//! One query runs the full pipeline for one season at one target usage:
//!
//! ```text
//! season features ─► project to target usage ─► gate hierarchy ─► performance score
//!        │                                                               │
//!        └──────────────► dependence score ─────────────────────────────►┴─► risk category
//! ```
//!
//! Everything the pipeline reads (reference distribution, compiled gates,
//! classifier, risk boundaries) is built once by [`EngineBuilder`] and never
//! mutated afterwards, so one engine can serve any number of threads.

use std::sync::Arc;

use keystone_analysis::{
    distribution::{DistributionConfig, DistributionError, ReferenceDistribution},
    projection::{FeatureProjector, ProjectionConfig, ProjectionReport},
    qualification::{VolumeQualification, star_cohort},
};
use keystone_core::{Archetype, DataIssue, DataQuality, FeatureTable, PlayerSeason, RiskCategory};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    classifier::{ArchetypeClassifier, ClassProbabilities, ClassifierError, ensure_schema},
    dependence::{DependenceConfig, DependenceScore, DependenceScorer},
    gate::{CatalogError, GateCatalog, GateHierarchy, GateOutcome},
    performance::{PerformanceScore, PerformanceScorer, StarLevelWeights},
    risk::{BoundarySource, RiskBoundaries, RiskCategorizer, RiskConfig},
};

/// Every tunable of the engine. Thresholds are configuration, not code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub qualification: VolumeQualification,
    pub distribution: DistributionConfig,
    pub projection: ProjectionConfig,
    pub gates: GateCatalog,
    pub star_level_weights: StarLevelWeights,
    pub dependence: DependenceConfig,
    pub risk: RiskConfig,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum EngineBuildError {
    #[display("failed to build the reference distribution")]
    Distribution(DistributionError),
    #[display("classifier does not match the feature table")]
    Classifier(ClassifierError),
    #[display("invalid gate catalog")]
    Catalog(CatalogError),
    #[display("star cohort (usage >= {star_usage}) is empty; cannot calibrate risk boundaries")]
    EmptyStarCohort { star_usage: f32 },
}

/// Result of one (season, target usage) query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceResult {
    pub player_id: String,
    pub player_name: String,
    pub season: String,
    pub current_usage: Option<f32>,
    pub target_usage: f32,
    pub probabilities: ClassProbabilities,
    /// Forced by a fired gate, otherwise the classifier argmax.
    pub archetype: Archetype,
    pub archetype_forced: bool,
    /// Star-level score before the gate cap.
    pub raw_score: f32,
    /// Final performance score, `min(raw_score, cap)`.
    pub performance: f32,
    pub dependence: DependenceScore,
    pub category: RiskCategory,
    pub dependence_law_applied: bool,
    /// Gate whose cap is binding.
    pub binding_gate: Option<String>,
    pub fired_gates: Vec<String>,
    pub unevaluated_rules: Vec<String>,
    pub projection: ProjectionReport,
    pub data_quality: DataQuality,
}

/// Everything but the risk categorization. Shared by calibration and queries.
#[derive(Debug)]
struct Scorers {
    dist: Arc<ReferenceDistribution>,
    projector: FeatureProjector,
    gates: GateHierarchy,
    performance: PerformanceScorer,
    dependence: DependenceScorer,
}

struct Scored {
    projection: ProjectionReport,
    gates: GateOutcome,
    performance: PerformanceScore,
    dependence: DependenceScore,
    quality: DataQuality,
}

impl Scorers {
    fn score(&self, season: &PlayerSeason, target_usage: f32) -> Scored {
        let mut quality = DataQuality::default();

        let projection =
            self.projector
                .project(season.features(), season.usage(), target_usage, &self.dist);
        quality.extend(projection.quality.issues().iter().cloned());

        let gates = self.gates.evaluate(&projection.features);
        quality.extend(gates.quality.issues().iter().cloned());

        let performance = self.performance.score(&projection.features, &gates);
        if !performance.imputed.is_empty() {
            tracing::warn!(
                season = %season.key(),
                imputed = ?performance.imputed,
                "classifier imputed absent inputs"
            );
        }
        quality.extend(
            performance
                .imputed
                .iter()
                .map(|feature| DataIssue::ImputedInput {
                    feature: feature.clone(),
                }),
        );

        // portability is a property of the observed profile
        let dependence = self
            .dependence
            .score(season.features(), &self.dist, &mut quality);

        if quality.is_low() {
            tracing::debug!(
                season = %season.key(),
                issues = quality.issues().len(),
                "query has low data quality"
            );
        }

        Scored {
            projection: projection.report,
            gates,
            performance,
            dependence,
            quality,
        }
    }
}

/// One-time construction of an [`InferenceEngine`].
///
/// Build order: reference distribution, classifier schema check, gate
/// compilation, risk calibration. Every fatal configuration error surfaces
/// here, before any season is scored.
#[derive(Debug)]
pub struct EngineBuilder {
    config: EngineConfig,
    classifier: Arc<dyn ArchetypeClassifier>,
}

impl EngineBuilder {
    #[must_use]
    pub fn new(config: EngineConfig, classifier: Arc<dyn ArchetypeClassifier>) -> Self {
        Self { config, classifier }
    }

    /// Builds the engine with `table` as the reference population.
    pub fn build(self, table: &FeatureTable) -> Result<InferenceEngine, EngineBuildError> {
        let Self { config, classifier } = self;

        let dist = ReferenceDistribution::build(
            table.seasons(),
            &config.qualification,
            config.distribution.clone(),
        )
        .map_err(EngineBuildError::Distribution)?;

        ensure_schema(classifier.as_ref(), table.columns())
            .map_err(EngineBuildError::Classifier)?;

        let gates =
            GateHierarchy::compile(&config.gates, &dist).map_err(EngineBuildError::Catalog)?;

        let scorers = Scorers {
            dist: Arc::new(dist),
            projector: FeatureProjector::new(config.projection),
            gates,
            performance: PerformanceScorer::new(classifier, config.star_level_weights.clone()),
            dependence: DependenceScorer::new(config.dependence.clone()),
        };

        let boundaries = match config.risk.boundaries {
            BoundarySource::Fixed {
                performance,
                dependence,
            } => RiskBoundaries {
                performance,
                dependence,
            },
            BoundarySource::Calibrated {
                performance_percentile,
                dependence_percentile,
            } => {
                let star_usage = scorers.dist.star_usage();
                let cohort = star_cohort(table.seasons(), &config.qualification, star_usage)
                    .collect::<Vec<_>>();
                // own usage: projection is the identity
                let (performance, dependence): (Vec<_>, Vec<_>) = cohort
                    .par_iter()
                    .filter_map(|season| {
                        let usage = season.usage()?;
                        let scored = scorers.score(season, usage);
                        Some((scored.performance.score, scored.dependence.value))
                    })
                    .unzip();
                let boundaries = RiskBoundaries::calibrate(
                    &performance,
                    &dependence,
                    performance_percentile,
                    dependence_percentile,
                )
                .ok_or(EngineBuildError::EmptyStarCohort { star_usage })?;
                tracing::info!(
                    cohort = performance.len(),
                    performance = boundaries.performance,
                    dependence = boundaries.dependence,
                    "calibrated risk boundaries"
                );
                boundaries
            }
        };

        Ok(InferenceEngine {
            scorers,
            risk: RiskCategorizer::new(boundaries, config.risk.dependence_ceiling),
        })
    }
}

/// Immutable, thread-safe inference engine.
#[derive(Debug)]
pub struct InferenceEngine {
    scorers: Scorers,
    risk: RiskCategorizer,
}

impl InferenceEngine {
    #[must_use]
    pub fn distribution(&self) -> &Arc<ReferenceDistribution> {
        &self.scorers.dist
    }

    #[must_use]
    pub fn gates(&self) -> &GateHierarchy {
        &self.scorers.gates
    }

    #[must_use]
    pub fn classifier(&self) -> &dyn ArchetypeClassifier {
        self.scorers.performance.classifier()
    }

    #[must_use]
    pub fn risk_boundaries(&self) -> RiskBoundaries {
        self.risk.boundaries()
    }

    /// Runs one query. Never fails: problems degrade into caps and data-quality issues.
    #[must_use]
    pub fn predict(&self, season: &PlayerSeason, target_usage: f32) -> InferenceResult {
        let Scored {
            projection,
            gates,
            performance,
            dependence,
            quality,
        } = self.scorers.score(season, target_usage);

        let risk = self.risk.categorize(performance.score, dependence.value);
        let (archetype, archetype_forced) = match (gates.forced_archetype, performance.predicted) {
            (Some(forced), _) => (forced, true),
            (None, Some(predicted)) => (predicted, false),
            // a classifier with an empty class set never passes the schema check
            (None, None) => (Archetype::Victim, false),
        };

        InferenceResult {
            player_id: season.player_id.clone(),
            player_name: season.player_name.clone(),
            season: season.season.clone(),
            current_usage: season.usage(),
            target_usage,
            probabilities: performance.probabilities,
            archetype,
            archetype_forced,
            raw_score: performance.raw,
            performance: performance.score,
            dependence,
            category: risk.category,
            dependence_law_applied: risk.law_applied,
            binding_gate: gates.binding_rule,
            fired_gates: gates.fired.into_iter().map(|g| g.id).collect(),
            unevaluated_rules: gates.unevaluated.into_iter().map(|g| g.id).collect(),
            projection,
            data_quality: quality,
        }
    }
}
