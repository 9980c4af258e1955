//! Usage-conditional feature projection.
//!
//! Projects a season's volume features from its observed usage to a target
//! usage. Efficiency features are never touched.
//!
//! # Upward projection
//!
//! Volume does not scale linearly with usage: a role player's volume grows
//! the way the population's volume grows between usage buckets. The
//! projected value keeps the season's position relative to its current
//! bucket median:
//!
//! ```text
//! projected = target_median × value / current_median
//! ```
//!
//! When the current median is zero the relative position is undefined and
//! the additive offset `target_median + (value - current_median)` is used
//! instead.
//!
//! The Flash rule overrides this for seasons that are elite in efficiency
//! (above P80 of the paired efficiency feature) but rare in volume (below
//! P25): such seasons are projected straight to the star-cohort median.
//!
//! # Downward projection
//!
//! Plain linear scaling by `target / current`.

use keystone_core::{
    DataIssue, DataQuality, FeatureVector,
    feature::keys,
    interaction,
};
use serde::{Deserialize, Serialize};

use crate::distribution::{Pct, ReferenceDistribution, VolumeFeature};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Usage differences below this are treated as "no projection".
    pub epsilon: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self { epsilon: 1e-4 }
    }
}

/// How a volume feature's projected value was obtained.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMethod {
    /// Target usage equals current usage.
    #[display("unchanged")]
    Unchanged,
    /// Scaled by the usage-bucket medians.
    #[display("cohort")]
    Cohort,
    /// Replaced by the star-cohort median.
    #[display("flash")]
    Flash,
    /// Scaled by `target / current` (downward projection).
    #[display("linear")]
    Linear,
    /// Bucket medians were unusable; linear scaling was used instead.
    #[display("linear_fallback")]
    LinearFallback,
    /// The feature was not measured and stays absent.
    #[display("absent")]
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureProjection {
    pub feature: String,
    pub method: ProjectionMethod,
    pub from: Option<f32>,
    pub to: Option<f32>,
}

/// Per-feature record of one projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectionReport {
    pub current_usage: Option<f32>,
    pub target_usage: f32,
    pub features: Vec<FeatureProjection>,
}

impl ProjectionReport {
    #[must_use]
    pub fn method_of(&self, feature: &str) -> Option<ProjectionMethod> {
        self.features
            .iter()
            .find(|f| f.feature == feature)
            .map(|f| f.method)
    }
}

/// Result of [`FeatureProjector::project`].
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub features: FeatureVector,
    pub report: ProjectionReport,
    pub quality: DataQuality,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureProjector {
    config: ProjectionConfig,
}

impl FeatureProjector {
    #[must_use]
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Projects `features`, observed at `current_usage`, to `target_usage`.
    ///
    /// Every key of the input is kept. Absent volume values stay absent. When
    /// `current_usage` is unknown or not positive the features are returned
    /// unchanged and the quality records [`DataIssue::MissingUsage`]. A
    /// `target_usage` that is not a positive finite number is handled the same
    /// way and recorded as [`DataIssue::InvalidTargetUsage`].
    #[must_use]
    pub fn project(
        &self,
        features: &FeatureVector,
        current_usage: Option<f32>,
        target_usage: f32,
        dist: &ReferenceDistribution,
    ) -> Projection {
        let mut quality = DataQuality::default();
        let mut report = ProjectionReport {
            current_usage,
            target_usage,
            features: vec![],
        };

        if !(target_usage.is_finite() && target_usage > 0.0) {
            tracing::warn!(target_usage, "invalid target usage; features left unprojected");
            quality.push(DataIssue::InvalidTargetUsage {
                usage: target_usage,
            });
            return Projection {
                features: features.clone(),
                report,
                quality,
            };
        }

        let Some(current) = current_usage.filter(|&u| u > 0.0) else {
            quality.push(DataIssue::MissingUsage);
            return Projection {
                features: features.clone(),
                report,
                quality,
            };
        };

        let mut projected = features.clone();
        let unchanged = (target_usage - current).abs() < self.config.epsilon;
        let upward = target_usage > current;

        for volume in dist.volume_features() {
            let from = features.get(&volume.feature);
            let (to, method) = match from {
                None => (None, ProjectionMethod::Absent),
                Some(value) if unchanged => (Some(value), ProjectionMethod::Unchanged),
                Some(value) if upward => {
                    let (v, method) = project_up(
                        volume,
                        value,
                        current,
                        target_usage,
                        features,
                        dist,
                        &mut quality,
                    );
                    (Some(v), method)
                }
                Some(value) => (
                    Some(linear(value, current, target_usage)),
                    ProjectionMethod::Linear,
                ),
            };
            if to != from {
                projected.set(volume.feature.as_str(), to);
            }
            tracing::debug!(
                feature = %volume.feature,
                %method,
                ?from,
                ?to,
                "projected volume feature"
            );
            report.features.push(FeatureProjection {
                feature: volume.feature.clone(),
                method,
                from,
                to,
            });
        }

        if unchanged {
            return Projection {
                features: projected,
                report,
                quality,
            };
        }

        projected.set(keys::USG_PCT, Some(target_usage));
        interaction::apply_interactions(&mut projected);

        Projection {
            features: projected,
            report,
            quality,
        }
    }
}

fn linear(value: f32, current: f32, target: f32) -> f32 {
    value * target / current
}

fn project_up(
    volume: &VolumeFeature,
    value: f32,
    current: f32,
    target: f32,
    features: &FeatureVector,
    dist: &ReferenceDistribution,
    quality: &mut DataQuality,
) -> (f32, ProjectionMethod) {
    if let Some(star) = flash_target(volume, value, features, dist, quality) {
        return (star, ProjectionMethod::Flash);
    }

    let feature = volume.feature.as_str();
    let current_bucket = dist.bucket_median(feature, current);
    let target_bucket = dist.bucket_median(feature, target);
    for (usage, bucket) in [(current, current_bucket), (target, target_bucket)] {
        match bucket {
            Some(b) if b.median.is_estimated() => quality.push(DataIssue::EstimatedBucket {
                feature: feature.to_owned(),
                usage,
            }),
            Some(b) if b.value().is_some() => {}
            _ => {
                tracing::warn!(feature, usage, "no usable usage bucket; scaling linearly");
                quality.push(DataIssue::UnusableBucket {
                    feature: feature.to_owned(),
                    usage,
                });
            }
        }
    }

    let (Some(current_median), Some(target_median)) = (
        current_bucket.and_then(|b| b.value()),
        target_bucket.and_then(|b| b.value()),
    ) else {
        return (
            linear(value, current, target),
            ProjectionMethod::LinearFallback,
        );
    };

    let scaled = if current_median > 0.0 {
        target_median * value / current_median
    } else {
        target_median + (value - current_median)
    };
    (scaled.max(0.0), ProjectionMethod::Cohort)
}

/// Star-cohort median if the season is an efficient low-volume outlier.
fn flash_target(
    volume: &VolumeFeature,
    value: f32,
    features: &FeatureVector,
    dist: &ReferenceDistribution,
    quality: &mut DataQuality,
) -> Option<f32> {
    let efficiency_key = volume.efficiency.as_deref()?;
    let volume_p25 = dist.percentile(&volume.feature, Pct::P25)?;
    if value >= volume_p25 {
        return None;
    }
    let Some(efficiency) = features.get(efficiency_key) else {
        quality.missing_feature(efficiency_key, "projection");
        return None;
    };
    let efficiency_p80 = dist.percentile(efficiency_key, Pct::P80)?;
    let star = dist.star_median(&volume.feature)?;
    (efficiency > efficiency_p80).then_some(star)
}
