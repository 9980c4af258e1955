//! Risk quadrants over (performance, dependence).
//!
//! ```text
//!                     dependence < low       dependence >= low
//! performance >= high  Franchise Cornerstone  Luxury Component
//! performance <  high  Depth                  Avoid
//! ```
//!
//! The Dependence Law is checked first: a dependence above the ceiling can
//! never be a Franchise Cornerstone, whatever the performance.

use keystone_core::RiskCategory;
use keystone_stats::percentiles::Percentiles;
use serde::{Deserialize, Serialize};

/// How quadrant boundaries are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoundarySource {
    /// Percentiles of the star cohort, scored at its own usage.
    Calibrated {
        performance_percentile: f32,
        dependence_percentile: f32,
    },
    Fixed { performance: f32, dependence: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub boundaries: BoundarySource,
    /// Dependence above this value triggers the Dependence Law.
    pub dependence_ceiling: f32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            boundaries: BoundarySource::Calibrated {
                performance_percentile: 66.0,
                dependence_percentile: 33.0,
            },
            dependence_ceiling: 0.60,
        }
    }
}

/// Resolved quadrant boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskBoundaries {
    /// Performance at or above this is "high".
    pub performance: f32,
    /// Dependence below this is "low".
    pub dependence: f32,
}

impl RiskBoundaries {
    /// Boundaries at the given percentiles of cohort scores.
    ///
    /// `None` when either score list is empty.
    #[must_use]
    pub fn calibrate(
        performance: &[f32],
        dependence: &[f32],
        performance_percentile: f32,
        dependence_percentile: f32,
    ) -> Option<Self> {
        let performance =
            Percentiles::new(performance, &[performance_percentile]).get(performance_percentile)?;
        let dependence =
            Percentiles::new(dependence, &[dependence_percentile]).get(dependence_percentile)?;
        Some(Self {
            performance,
            dependence,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub category: RiskCategory,
    /// The Dependence Law decided the category.
    pub law_applied: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RiskCategorizer {
    boundaries: RiskBoundaries,
    dependence_ceiling: f32,
}

impl RiskCategorizer {
    #[must_use]
    pub fn new(boundaries: RiskBoundaries, dependence_ceiling: f32) -> Self {
        Self {
            boundaries,
            dependence_ceiling,
        }
    }

    #[must_use]
    pub fn boundaries(&self) -> RiskBoundaries {
        self.boundaries
    }

    #[must_use]
    pub fn dependence_ceiling(&self) -> f32 {
        self.dependence_ceiling
    }

    #[must_use]
    pub fn categorize(&self, performance: f32, dependence: f32) -> RiskAssessment {
        let high = performance >= self.boundaries.performance;

        if dependence > self.dependence_ceiling {
            return RiskAssessment {
                category: if high {
                    RiskCategory::LuxuryComponent
                } else {
                    RiskCategory::Avoid
                },
                law_applied: true,
            };
        }

        let low_dependence = dependence < self.boundaries.dependence;
        let category = match (high, low_dependence) {
            (true, true) => RiskCategory::FranchiseCornerstone,
            (true, false) => RiskCategory::LuxuryComponent,
            (false, true) => RiskCategory::Depth,
            (false, false) => RiskCategory::Avoid,
        };
        RiskAssessment {
            category,
            law_applied: false,
        }
    }
}
