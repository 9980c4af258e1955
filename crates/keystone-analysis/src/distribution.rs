//! Reference distribution of the qualified population.
//!
//! The distribution is computed once per run and shared read-only by every
//! query. It provides:
//!
//! - per-feature percentiles ([`FeaturePercentiles`]), used by data-driven gate
//!   thresholds and dependence normalization
//! - per-usage-bucket medians of each volume feature ([`BucketMedian`]), used by
//!   the projector
//! - star-cohort medians of each volume feature, used by the Flash rule
//!
//! # Example
//!
//! ```
//! use keystone_analysis::{
//!     distribution::{DistributionConfig, Pct, ReferenceDistribution},
//!     qualification::VolumeQualification,
//! };
//! use keystone_core::{FeatureVector, PlayerSeason};
//!
//! let population = (0..40u8)
//!     .map(|i| {
//!         let usage = 0.10 + 0.0075 * f32::from(i);
//!         let features = FeatureVector::new()
//!             .with("usg_pct", usage)
//!             .with("games_played", 60.0)
//!             .with("creation_volume_ratio", usage * 1.5);
//!         PlayerSeason::new(i.to_string(), "P", "2020-21", features)
//!     })
//!     .collect::<Vec<_>>();
//!
//! let dist = ReferenceDistribution::build(
//!     &population,
//!     &VolumeQualification::default(),
//!     DistributionConfig::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(dist.qualified_count(), 40);
//! assert!(dist.percentile("usg_pct", Pct::P50).is_some());
//! assert!(dist.bucket_median("creation_volume_ratio", 0.30).is_some());
//! ```

use std::collections::{BTreeMap, BTreeSet};

use keystone_core::{PlayerSeason, feature::keys};
use keystone_stats::{
    buckets::{BucketValue, FixedBuckets, fill_gaps},
    percentiles::{Percentiles, STANDARD_POINTS, median},
};
use serde::{Deserialize, Serialize};

use crate::qualification::{Qualification, star_cohort};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum DistributionError {
    #[display("no season in the population of {total} passed the qualification filter")]
    EmptyPopulation { total: usize },
}

/// Percentile points stored for every feature.
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
pub enum Pct {
    #[display("P05")]
    P05,
    #[display("P10")]
    P10,
    #[display("P25")]
    P25,
    #[display("P33")]
    P33,
    #[display("P50")]
    P50,
    #[display("P66")]
    P66,
    #[display("P75")]
    P75,
    #[display("P80")]
    P80,
    #[display("P90")]
    P90,
    #[display("P95")]
    P95,
    #[display("P99")]
    P99,
}

impl Pct {
    pub const ALL: [Self; 11] = [
        Self::P05,
        Self::P10,
        Self::P25,
        Self::P33,
        Self::P50,
        Self::P66,
        Self::P75,
        Self::P80,
        Self::P90,
        Self::P95,
        Self::P99,
    ];

    /// The percentile point in `0..=100`.
    #[must_use]
    pub fn point(self) -> f32 {
        match self {
            Self::P05 => 5.0,
            Self::P10 => 10.0,
            Self::P25 => 25.0,
            Self::P33 => 33.0,
            Self::P50 => 50.0,
            Self::P66 => 66.0,
            Self::P75 => 75.0,
            Self::P80 => 80.0,
            Self::P90 => 90.0,
            Self::P95 => 95.0,
            Self::P99 => 99.0,
        }
    }
}

/// Percentile values of one feature over the qualified population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePercentiles {
    /// Number of qualified seasons where the feature was present
    pub count: usize,
    pub p05: f32,
    pub p10: f32,
    pub p25: f32,
    pub p33: f32,
    pub p50: f32,
    pub p66: f32,
    pub p75: f32,
    pub p80: f32,
    pub p90: f32,
    pub p95: f32,
    pub p99: f32,
}

impl FeaturePercentiles {
    /// Computes the percentiles of `values`; `None` when nothing was observed.
    #[must_use]
    pub fn from_values(values: &[f32]) -> Option<Self> {
        let percentiles = Percentiles::new(values, &STANDARD_POINTS);
        if percentiles.is_empty() {
            return None;
        }
        let at = |pct: Pct| percentiles.get(pct.point());
        Some(Self {
            count: percentiles.sample_count(),
            p05: at(Pct::P05)?,
            p10: at(Pct::P10)?,
            p25: at(Pct::P25)?,
            p33: at(Pct::P33)?,
            p50: at(Pct::P50)?,
            p66: at(Pct::P66)?,
            p75: at(Pct::P75)?,
            p80: at(Pct::P80)?,
            p90: at(Pct::P90)?,
            p95: at(Pct::P95)?,
            p99: at(Pct::P99)?,
        })
    }

    #[must_use]
    pub fn get(&self, pct: Pct) -> f32 {
        match pct {
            Pct::P05 => self.p05,
            Pct::P10 => self.p10,
            Pct::P25 => self.p25,
            Pct::P33 => self.p33,
            Pct::P50 => self.p50,
            Pct::P66 => self.p66,
            Pct::P75 => self.p75,
            Pct::P80 => self.p80,
            Pct::P90 => self.p90,
            Pct::P95 => self.p95,
            Pct::P99 => self.p99,
        }
    }
}

/// A volume feature projected with usage, optionally paired with the
/// efficiency feature that measures how well the volume is converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeFeature {
    pub feature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efficiency: Option<String>,
}

impl VolumeFeature {
    #[must_use]
    pub fn new(feature: &str, efficiency: Option<&str>) -> Self {
        Self {
            feature: feature.to_owned(),
            efficiency: efficiency.map(str::to_owned),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionConfig {
    pub buckets: FixedBuckets,
    /// Minimum usage of the star cohort
    pub star_usage: f32,
    pub volume_features: Vec<VolumeFeature>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            buckets: default_buckets(),
            star_usage: 0.25,
            volume_features: vec![
                VolumeFeature::new(keys::CREATION_VOLUME_RATIO, Some(keys::CREATION_TAX)),
                VolumeFeature::new(keys::RS_PRESSURE_APPETITE, Some(keys::RS_PRESSURE_RESILIENCE)),
                VolumeFeature::new(keys::RS_RIM_APPETITE, Some(keys::RIM_FG_PCT)),
                VolumeFeature::new(keys::FT_RATE, None),
            ],
        }
    }
}

fn default_buckets() -> FixedBuckets {
    // 10%..40% in 5% steps
    FixedBuckets::new(0.10, 0.05, 6).expect("default bucket layout is valid")
}

/// Median of one volume feature within one usage bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketMedian {
    /// Number of qualified seasons in the bucket with the feature present
    pub count: usize,
    pub median: BucketValue,
}

impl BucketMedian {
    #[must_use]
    pub fn value(&self) -> Option<f32> {
        self.median.value()
    }
}

/// Statistics of the qualified reference population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDistribution {
    config: DistributionConfig,
    total_count: usize,
    qualified_count: usize,
    star_count: usize,
    percentiles: BTreeMap<String, FeaturePercentiles>,
    bucket_medians: BTreeMap<String, Vec<BucketMedian>>,
    star_medians: BTreeMap<String, f32>,
}

impl ReferenceDistribution {
    /// Computes the distribution over the seasons of `population` that pass
    /// `qualification`.
    pub fn build<Q>(
        population: &[PlayerSeason],
        qualification: &Q,
        config: DistributionConfig,
    ) -> Result<Self, DistributionError>
    where
        Q: Qualification + ?Sized,
    {
        let qualified = population
            .iter()
            .filter(|season| qualification.qualifies(season))
            .collect::<Vec<_>>();
        if qualified.is_empty() {
            return Err(DistributionError::EmptyPopulation {
                total: population.len(),
            });
        }
        tracing::info!(
            total = population.len(),
            qualified = qualified.len(),
            "building reference distribution"
        );

        let percentiles = compute_percentiles(&qualified);

        let mut bucket_medians = BTreeMap::new();
        for volume in &config.volume_features {
            let medians = compute_bucket_medians(&qualified, &config.buckets, &volume.feature);
            for (range, bucket) in config.buckets.ranges().zip(&medians) {
                match bucket.median {
                    BucketValue::Observed(_) => {}
                    BucketValue::Interpolated(_) => tracing::debug!(
                        feature = %volume.feature,
                        bucket = ?range,
                        "bucket median interpolated"
                    ),
                    BucketValue::Nearest(_) | BucketValue::Unusable => tracing::warn!(
                        feature = %volume.feature,
                        bucket = ?range,
                        median = ?bucket.median,
                        "usage bucket has no observations"
                    ),
                }
            }
            bucket_medians.insert(volume.feature.clone(), medians);
        }

        let stars = star_cohort(population, qualification, config.star_usage).collect::<Vec<_>>();
        let mut star_medians = BTreeMap::new();
        for volume in &config.volume_features {
            let values = stars.iter().filter_map(|s| s.features().get(&volume.feature));
            match median(values) {
                Some(m) => {
                    star_medians.insert(volume.feature.clone(), m);
                }
                None => tracing::warn!(
                    feature = %volume.feature,
                    "no star-cohort observation; Flash projection disabled for feature"
                ),
            }
        }

        Ok(Self {
            total_count: population.len(),
            qualified_count: qualified.len(),
            star_count: stars.len(),
            percentiles,
            bucket_medians,
            star_medians,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    #[must_use]
    pub fn buckets(&self) -> &FixedBuckets {
        &self.config.buckets
    }

    #[must_use]
    pub fn volume_features(&self) -> &[VolumeFeature] {
        &self.config.volume_features
    }

    #[must_use]
    pub fn star_usage(&self) -> f32 {
        self.config.star_usage
    }

    /// Size of the population the distribution was built from, qualified or not.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    #[must_use]
    pub fn qualified_count(&self) -> usize {
        self.qualified_count
    }

    #[must_use]
    pub fn star_count(&self) -> usize {
        self.star_count
    }

    #[must_use]
    pub fn feature_percentiles(&self, feature: &str) -> Option<&FeaturePercentiles> {
        self.percentiles.get(feature)
    }

    /// Percentile value of `feature`, or `None` if it was never observed.
    #[must_use]
    pub fn percentile(&self, feature: &str, pct: Pct) -> Option<f32> {
        self.percentiles.get(feature).map(|p| p.get(pct))
    }

    pub fn percentiles(&self) -> impl Iterator<Item = (&str, &FeaturePercentiles)> + '_ {
        self.percentiles.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Bucket median of a volume feature at `usage` (clamped to the layout).
    ///
    /// `None` when `feature` is not a configured volume feature.
    #[must_use]
    pub fn bucket_median(&self, feature: &str, usage: f32) -> Option<BucketMedian> {
        let medians = self.bucket_medians.get(feature)?;
        medians.get(self.config.buckets.index_of(usage)).copied()
    }

    #[must_use]
    pub fn bucket_medians(&self, feature: &str) -> Option<&[BucketMedian]> {
        self.bucket_medians.get(feature).map(Vec::as_slice)
    }

    /// Median of a volume feature over the star cohort.
    #[must_use]
    pub fn star_median(&self, feature: &str) -> Option<f32> {
        self.star_medians.get(feature).copied()
    }
}

fn compute_percentiles(qualified: &[&PlayerSeason]) -> BTreeMap<String, FeaturePercentiles> {
    let features = qualified
        .iter()
        .flat_map(|s| s.features().keys())
        .collect::<BTreeSet<_>>();
    features
        .into_iter()
        .filter_map(|feature| {
            let values = qualified
                .iter()
                .filter_map(|s| s.features().get(feature))
                .collect::<Vec<_>>();
            FeaturePercentiles::from_values(&values).map(|p| (feature.to_owned(), p))
        })
        .collect()
}

fn compute_bucket_medians(
    qualified: &[&PlayerSeason],
    buckets: &FixedBuckets,
    feature: &str,
) -> Vec<BucketMedian> {
    let mut per_bucket = vec![vec![]; buckets.len()];
    for season in qualified {
        let (Some(usage), Some(value)) = (season.usage(), season.features().get(feature)) else {
            continue;
        };
        per_bucket[buckets.index_of(usage)].push(value);
    }
    let observed = per_bucket
        .iter()
        .map(|values| median(values.iter().copied()))
        .collect::<Vec<_>>();
    per_bucket
        .iter()
        .zip(fill_gaps(&observed))
        .map(|(values, median)| BucketMedian {
            count: values.len(),
            median,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use keystone_core::FeatureVector;

    use super::*;
    use crate::qualification::VolumeQualification;

    fn season(id: usize, usage: f32, creation: Option<f32>, games: f32) -> PlayerSeason {
        let mut features = FeatureVector::new()
            .with(keys::USG_PCT, usage)
            .with(keys::GAMES_PLAYED, games);
        features.set(keys::CREATION_VOLUME_RATIO, creation);
        PlayerSeason::new(id.to_string(), "P", "2020-21", features)
    }

    fn config() -> DistributionConfig {
        DistributionConfig {
            volume_features: vec![VolumeFeature::new(
                keys::CREATION_VOLUME_RATIO,
                Some(keys::CREATION_TAX),
            )],
            ..DistributionConfig::default()
        }
    }

    #[test]
    fn test_empty_qualified_population_is_fatal() {
        let population = vec![season(0, 0.30, Some(0.5), 3.0)];
        let err = ReferenceDistribution::build(
            &population,
            &VolumeQualification::default(),
            config(),
        )
        .unwrap_err();
        assert!(matches!(err, DistributionError::EmptyPopulation { total: 1 }));
    }

    #[test]
    fn test_percentiles_ignore_unqualified_seasons() {
        let mut population = (0..10)
            .map(|i| season(i, 0.20, Some(0.1), 50.0))
            .collect::<Vec<_>>();
        // low-sample outlier
        population.push(season(99, 0.20, Some(9.0), 2.0));
        let dist = ReferenceDistribution::build(
            &population,
            &VolumeQualification::default(),
            config(),
        )
        .unwrap();
        assert_eq!(dist.qualified_count(), 10);
        assert_eq!(dist.total_count(), 11);
        assert_eq!(dist.percentile(keys::CREATION_VOLUME_RATIO, Pct::P99), Some(0.1));
        assert_eq!(
            dist.feature_percentiles(keys::CREATION_VOLUME_RATIO)
                .unwrap()
                .count,
            10
        );
        assert_eq!(dist.percentile(keys::AGE, Pct::P50), None);
    }

    #[test]
    fn test_bucket_medians_fill_gaps() {
        // observations only in the 0.10 and 0.30 buckets
        let population = vec![
            season(0, 0.11, Some(0.1), 50.0),
            season(1, 0.12, Some(0.3), 50.0),
            season(2, 0.31, Some(0.6), 50.0),
        ];
        let dist = ReferenceDistribution::build(
            &population,
            &VolumeQualification::default(),
            config(),
        )
        .unwrap();
        let medians = dist.bucket_medians(keys::CREATION_VOLUME_RATIO).unwrap();
        assert_eq!(medians.len(), 6);
        assert!(matches!(medians[0].median, BucketValue::Observed(v) if (v - 0.2).abs() < 1e-6));
        assert_eq!(medians[0].count, 2);
        assert!(matches!(
            medians[2].median,
            BucketValue::Interpolated(v) if (v - 0.4).abs() < 1e-6
        ));
        assert_eq!(medians[4].median, BucketValue::Observed(0.6));
        assert!(medians[5].median.is_estimated());
        assert_eq!(medians[5].value(), Some(0.6));
        assert_eq!(medians[5].count, 0);
    }

    #[test]
    fn test_feature_without_observations_has_unusable_buckets() {
        let population = vec![season(0, 0.20, None, 50.0)];
        let dist = ReferenceDistribution::build(
            &population,
            &VolumeQualification::default(),
            config(),
        )
        .unwrap();
        let bucket = dist.bucket_median(keys::CREATION_VOLUME_RATIO, 0.2).unwrap();
        assert_eq!(bucket.median, BucketValue::Unusable);
        assert_eq!(dist.star_median(keys::CREATION_VOLUME_RATIO), None);
        assert_eq!(dist.bucket_median(keys::AGE, 0.2), None);
    }

    #[test]
    fn test_bucket_lookup_clamps_usage() {
        let population = vec![
            season(0, 0.10, Some(0.1), 50.0),
            season(1, 0.38, Some(0.9), 50.0),
        ];
        let dist = ReferenceDistribution::build(
            &population,
            &VolumeQualification::default(),
            config(),
        )
        .unwrap();
        let high = dist.bucket_median(keys::CREATION_VOLUME_RATIO, 0.55).unwrap();
        let low = dist.bucket_median(keys::CREATION_VOLUME_RATIO, 0.02).unwrap();
        assert_eq!(high.value(), Some(0.9));
        assert_eq!(low.value(), Some(0.1));
    }

    #[test]
    fn test_star_medians_use_star_cohort() {
        let population = vec![
            season(0, 0.15, Some(0.1), 50.0),
            season(1, 0.26, Some(0.5), 50.0),
            season(2, 0.30, Some(0.7), 50.0),
            season(3, 0.33, Some(0.8), 5.0),
        ];
        let dist = ReferenceDistribution::build(
            &population,
            &VolumeQualification::default(),
            config(),
        )
        .unwrap();
        assert_eq!(dist.star_count(), 2);
        let star = dist.star_median(keys::CREATION_VOLUME_RATIO).unwrap();
        assert!((star - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_distribution_serializes() {
        let population = vec![season(0, 0.2, Some(0.3), 50.0)];
        let dist = ReferenceDistribution::build(
            &population,
            &VolumeQualification::default(),
            config(),
        )
        .unwrap();
        let json = serde_json::to_value(&dist).unwrap();
        assert_eq!(json["qualified_count"], 1);
        assert_eq!(json["config"]["star_usage"], 0.25);
        assert!(json["percentiles"]["usg_pct"]["p50"].is_number());

        let back: ReferenceDistribution = serde_json::from_value(json).unwrap();
        assert_eq!(back.qualified_count(), 1);
    }

    #[test]
    fn test_pct_serde_names() {
        assert_eq!(serde_json::to_string(&Pct::P05).unwrap(), r#""p05""#);
        assert_eq!(Pct::P90.to_string(), "P90");
        for pct in Pct::ALL {
            assert!(STANDARD_POINTS.contains(&pct.point()));
        }
    }
}
