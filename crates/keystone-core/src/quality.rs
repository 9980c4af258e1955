//! Data-quality tracking for a single query.
//!
//! Problems local to one feature or one rule never abort a query. They are
//! recorded here instead, and any recorded issue lowers the quality level.

use serde::{Serialize, ser::SerializeStruct as _};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display, derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    #[display("high")]
    High,
    #[display("low")]
    Low,
}

/// Why a result's data quality was lowered.
#[derive(Debug, Clone, PartialEq, Serialize, derive_more::Display)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataIssue {
    /// Current usage is not known, so the season cannot be projected.
    #[display("current usage is missing")]
    MissingUsage,
    /// The requested target usage is not a positive finite number.
    #[display("target usage {usage} is not a positive finite number")]
    InvalidTargetUsage { usage: f32 },
    /// A feature needed by `consumer` was absent.
    #[display("{consumer} needs missing feature '{feature}'")]
    MissingFeature {
        feature: String,
        consumer: &'static str,
    },
    /// The classifier substituted its default for an absent input.
    #[display("classifier imputed '{feature}'")]
    ImputedInput { feature: String },
    /// No usage bucket had data for the feature; linear scaling was used.
    #[display("no usable usage bucket for '{feature}' at usage {usage:.3}")]
    UnusableBucket { feature: String, usage: f32 },
    /// The bucket median was copied from the nearest populated bucket.
    #[display("usage bucket for '{feature}' at usage {usage:.3} was estimated")]
    EstimatedBucket { feature: String, usage: f32 },
    /// A gate rule could not be evaluated because its inputs were absent.
    #[display("rule '{rule}' could not be evaluated (missing {})", missing.join(", "))]
    UnevaluatedRule { rule: String, missing: Vec<String> },
    /// A gate rule about missing data fired.
    #[display("rule '{rule}' flagged incomplete data")]
    IncompleteData { rule: String },
}

/// Collected data-quality issues of one result.
///
/// # Examples
///
/// ```
/// use keystone_core::quality::{DataIssue, DataQuality, QualityLevel};
///
/// let mut quality = DataQuality::default();
/// assert_eq!(quality.level(), QualityLevel::High);
///
/// quality.push(DataIssue::MissingUsage);
/// quality.push(DataIssue::MissingUsage);
/// assert_eq!(quality.level(), QualityLevel::Low);
/// assert_eq!(quality.issues().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataQuality {
    issues: Vec<DataIssue>,
}

impl DataQuality {
    #[must_use]
    pub fn level(&self) -> QualityLevel {
        if self.issues.is_empty() {
            QualityLevel::High
        } else {
            QualityLevel::Low
        }
    }

    #[must_use]
    pub fn is_low(&self) -> bool {
        self.level().is_low()
    }

    #[must_use]
    pub fn issues(&self) -> &[DataIssue] {
        &self.issues
    }

    /// Records an issue unless an identical one is already recorded.
    pub fn push(&mut self, issue: DataIssue) {
        if !self.issues.contains(&issue) {
            self.issues.push(issue);
        }
    }

    pub fn missing_feature(&mut self, feature: &str, consumer: &'static str) {
        self.push(DataIssue::MissingFeature {
            feature: feature.to_owned(),
            consumer,
        });
    }
}

impl Extend<DataIssue> for DataQuality {
    fn extend<T: IntoIterator<Item = DataIssue>>(&mut self, iter: T) {
        for issue in iter {
            self.push(issue);
        }
    }
}

impl Serialize for DataQuality {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("DataQuality", 2)?;
        state.serialize_field("level", &self.level())?;
        state.serialize_field("issues", &self.issues)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_deduplicates() {
        let mut quality = DataQuality::default();
        quality.missing_feature("age", "dependence");
        quality.extend([
            DataIssue::MissingFeature {
                feature: "age".to_owned(),
                consumer: "dependence",
            },
            DataIssue::MissingFeature {
                feature: "age".to_owned(),
                consumer: "gates",
            },
        ]);
        assert_eq!(quality.issues().len(), 2);
    }

    #[test]
    fn test_serializes_level_and_issues() {
        let mut quality = DataQuality::default();
        quality.push(DataIssue::ImputedInput {
            feature: "age".to_owned(),
        });
        let json = serde_json::to_value(&quality).unwrap();
        assert_eq!(json["level"], "low");
        assert_eq!(json["issues"][0]["kind"], "imputed_input");
        assert_eq!(json["issues"][0]["feature"], "age");
    }

    #[test]
    fn test_display_lists_missing_inputs() {
        let issue = DataIssue::UnevaluatedRule {
            rule: "clutch_collapse".to_owned(),
            missing: vec!["leverage_ts_delta".to_owned()],
        };
        assert_eq!(
            issue.to_string(),
            "rule 'clutch_collapse' could not be evaluated (missing leverage_ts_delta)"
        );
    }
}
