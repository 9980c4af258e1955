//! Parallel batch evaluation and its flat export format.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use keystone_core::{Archetype, PlayerSeason, QualityLevel, RiskCategory};
use keystone_stats::descriptive::DescriptiveStats;
use rayon::prelude::*;
use serde::Serialize;

use crate::engine::{InferenceEngine, InferenceResult};

/// Evaluates every `(season, target)` pair.
///
/// Results are ordered season-major, in input order: all targets of the first
/// season, then all targets of the second, and so on.
pub fn run_batch(
    engine: &InferenceEngine,
    seasons: &[PlayerSeason],
    targets: &[f32],
) -> Vec<InferenceResult> {
    tracing::info!(
        seasons = seasons.len(),
        targets = targets.len(),
        "running batch"
    );
    let results = seasons
        .par_iter()
        .flat_map_iter(|season| targets.iter().map(move |&t| engine.predict(season, t)))
        .collect::<Vec<_>>();
    tracing::info!(results = results.len(), "batch finished");
    results
}

/// One row of the batch export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRecord {
    pub player_id: String,
    pub player_name: String,
    pub season: String,
    pub current_usage: Option<f32>,
    pub target_usage: f32,
    pub archetype: Archetype,
    pub archetype_forced: bool,
    pub raw_score: f32,
    pub performance: f32,
    pub dependence: f32,
    pub physical: Option<f32>,
    pub skill: Option<f32>,
    pub category: RiskCategory,
    pub dependence_law_applied: bool,
    pub binding_gate: Option<String>,
    /// Fired gate ids joined by `;`.
    pub fired_gates: String,
    pub data_quality: QualityLevel,
    pub issues: usize,
}

impl From<&InferenceResult> for BatchRecord {
    fn from(result: &InferenceResult) -> Self {
        Self {
            player_id: result.player_id.clone(),
            player_name: result.player_name.clone(),
            season: result.season.clone(),
            current_usage: result.current_usage,
            target_usage: result.target_usage,
            archetype: result.archetype,
            archetype_forced: result.archetype_forced,
            raw_score: result.raw_score,
            performance: result.performance,
            dependence: result.dependence.value,
            physical: result.dependence.physical,
            skill: result.dependence.skill,
            category: result.category,
            dependence_law_applied: result.dependence_law_applied,
            binding_gate: result.binding_gate.clone(),
            fired_gates: result.fired_gates.join(";"),
            data_quality: result.data_quality.level(),
            issues: result.data_quality.issues().len(),
        }
    }
}

/// Aggregate view of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub generated_at: DateTime<Utc>,
    pub results: usize,
    pub performance: Option<DescriptiveStats>,
    pub dependence: Option<DescriptiveStats>,
    pub categories: BTreeMap<RiskCategory, usize>,
    /// How often each gate fired.
    pub gates: BTreeMap<String, usize>,
    pub dependence_law_applied: usize,
    pub low_quality: usize,
}

impl BatchSummary {
    #[must_use]
    pub fn from_results(results: &[InferenceResult]) -> Self {
        let mut categories = RiskCategory::ALL
            .into_iter()
            .map(|c| (c, 0))
            .collect::<BTreeMap<_, _>>();
        let mut gates = BTreeMap::<String, usize>::new();
        for result in results {
            *categories.entry(result.category).or_default() += 1;
            for gate in &result.fired_gates {
                *gates.entry(gate.clone()).or_default() += 1;
            }
        }

        Self {
            generated_at: Utc::now(),
            results: results.len(),
            performance: DescriptiveStats::new(results.iter().map(|r| r.performance)),
            dependence: DescriptiveStats::new(results.iter().map(|r| r.dependence.value)),
            categories,
            gates,
            dependence_law_applied: results.iter().filter(|r| r.dependence_law_applied).count(),
            low_quality: results.iter().filter(|r| r.data_quality.is_low()).count(),
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Batch summary ({} results)", self.results)?;
        for (label, stats) in [
            ("performance", &self.performance),
            ("dependence", &self.dependence),
        ] {
            if let Some(s) = stats {
                writeln!(
                    f,
                    "  {label:<12} mean {:.3}  median {:.3}  sd {:.3}  [{:.3}, {:.3}]",
                    s.mean, s.median, s.std_dev, s.min, s.max
                )?;
            }
        }
        writeln!(f, "Categories:")?;
        for (category, count) in &self.categories {
            writeln!(f, "  {:<22} {count}", category.to_string())?;
        }
        if !self.gates.is_empty() {
            writeln!(f, "Gates fired:")?;
            for (gate, count) in &self.gates {
                writeln!(f, "  {gate:<30} {count}")?;
            }
        }
        writeln!(f, "Dependence Law applied: {}", self.dependence_law_applied)?;
        write!(f, "Low data quality: {}", self.low_quality)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use keystone_core::feature::keys;

    use super::*;
    use crate::{
        engine::tests::{engine, season},
        gate::catalog::CLUTCH_COLLAPSE,
        performance::tests::FixedClassifier,
    };

    #[test]
    fn test_run_batch_preserves_order() {
        let engine = engine(Arc::new(FixedClassifier::star(0.7)));
        let seasons = (0..20u8).map(|i| season(i, 0.15)).collect::<Vec<_>>();
        let targets = [0.15, 0.25, 0.30];

        let results = run_batch(&engine, &seasons, &targets);
        assert_eq!(results.len(), seasons.len() * targets.len());
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.player_id, seasons[i / targets.len()].player_id);
            assert_eq!(result.target_usage, targets[i % targets.len()]);
        }
    }

    #[test]
    fn test_batch_matches_single_queries() {
        let engine = engine(Arc::new(FixedClassifier::star(0.7)));
        let seasons = (0..8u8).map(|i| season(i, 0.2)).collect::<Vec<_>>();
        let results = run_batch(&engine, &seasons, &[0.3]);
        for (season, result) in seasons.iter().zip(&results) {
            assert_eq!(&engine.predict(season, 0.3), result);
        }
    }

    #[test]
    fn test_record_flattens_result() {
        let engine = engine(Arc::new(FixedClassifier::star(0.9)));
        let mut features = season(3, 0.2).features().clone();
        features.set(keys::LEVERAGE_TS_DELTA, Some(-0.3));
        let season = PlayerSeason::new("p", "P", "2023-24", features);

        let result = engine.predict(&season, 0.2);
        let record = BatchRecord::from(&result);
        assert_eq!(record.binding_gate.as_deref(), Some(CLUTCH_COLLAPSE));
        assert!(record.fired_gates.split(';').any(|g| g == CLUTCH_COLLAPSE));
        assert_eq!(record.performance, result.performance);
        assert_eq!(record.dependence, result.dependence.value);
    }

    #[test]
    fn test_records_write_as_csv() {
        let engine = engine(Arc::new(FixedClassifier::star(0.5)));
        let seasons = vec![season(1, 0.2), season(2, 0.22)];
        let results = run_batch(&engine, &seasons, &[0.25]);

        let mut writer = csv::Writer::from_writer(vec![]);
        for result in &results {
            writer.serialize(BatchRecord::from(result)).unwrap();
        }
        let csv = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("player_id,player_name,season,current_usage,target_usage"));
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn test_summary_counts() {
        let engine = engine(Arc::new(FixedClassifier::star(0.5)));
        let seasons = (0..10u8).map(|i| season(i, 0.2)).collect::<Vec<_>>();
        let results = run_batch(&engine, &seasons, &[0.2, 0.3]);
        let summary = BatchSummary::from_results(&results);

        assert_eq!(summary.results, 20);
        assert_eq!(summary.categories.values().sum::<usize>(), 20);
        assert_eq!(summary.categories.len(), RiskCategory::ALL.len());
        assert_eq!(summary.performance.as_ref().unwrap().count, 20);
        let fired = results.iter().map(|r| r.fired_gates.len()).sum::<usize>();
        assert_eq!(summary.gates.values().sum::<usize>(), fired);
        assert!(summary.to_string().starts_with("Batch summary (20 results)"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = BatchSummary::from_results(&[]);
        assert_eq!(summary.results, 0);
        assert_eq!(summary.performance, None);
        assert!(summary.gates.is_empty());
    }
}
