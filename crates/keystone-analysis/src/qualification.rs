//! Qualification predicates for the reference population.
//!
//! Percentiles computed over every season in a table are distorted by
//! small-sample seasons, which populate the tails with noise. Every statistic
//! in [`ReferenceDistribution`](crate::distribution::ReferenceDistribution)
//! is therefore computed over the qualified subset only.

use keystone_core::{PlayerSeason, feature::keys};
use serde::{Deserialize, Serialize};

/// Decides whether a season belongs to the qualified reference population.
pub trait Qualification {
    fn qualifies(&self, season: &PlayerSeason) -> bool;
}

impl<F> Qualification for F
where
    F: Fn(&PlayerSeason) -> bool,
{
    fn qualifies(&self, season: &PlayerSeason) -> bool {
        self(season)
    }
}

/// Minimum usage and sample-volume thresholds.
///
/// A season whose usage or games played is not measured never qualifies.
///
/// # Example
///
/// ```
/// use keystone_analysis::qualification::{Qualification, VolumeQualification};
/// use keystone_core::{FeatureVector, PlayerSeason};
///
/// let qualification = VolumeQualification::default();
/// let season = PlayerSeason::new(
///     "1",
///     "A",
///     "2020-21",
///     FeatureVector::new().with("usg_pct", 0.22).with("games_played", 60.0),
/// );
/// assert!(qualification.qualifies(&season));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeQualification {
    pub min_usage: f32,
    pub min_games: f32,
}

impl Default for VolumeQualification {
    fn default() -> Self {
        Self {
            min_usage: 0.10,
            min_games: 20.0,
        }
    }
}

impl Qualification for VolumeQualification {
    fn qualifies(&self, season: &PlayerSeason) -> bool {
        let usage_ok = season.usage().is_some_and(|u| u >= self.min_usage);
        let games_ok = season
            .features()
            .get(keys::GAMES_PLAYED)
            .is_some_and(|g| g >= self.min_games);
        usage_ok && games_ok
    }
}

/// Qualified seasons whose usage reaches the star-level threshold.
pub fn star_cohort<'a, Q>(
    population: &'a [PlayerSeason],
    qualification: &'a Q,
    star_usage: f32,
) -> impl Iterator<Item = &'a PlayerSeason> + 'a
where
    Q: Qualification + ?Sized,
{
    population.iter().filter(move |season| {
        qualification.qualifies(season) && season.usage().is_some_and(|u| u >= star_usage)
    })
}

#[cfg(test)]
mod tests {
    use keystone_core::FeatureVector;

    use super::*;

    fn season(usage: Option<f32>, games: Option<f32>) -> PlayerSeason {
        let mut features = FeatureVector::new();
        features.set(keys::USG_PCT, usage);
        features.set(keys::GAMES_PLAYED, games);
        PlayerSeason::new("1", "A", "2020-21", features)
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let q = VolumeQualification::default();
        assert!(q.qualifies(&season(Some(0.10), Some(20.0))));
        assert!(!q.qualifies(&season(Some(0.099), Some(20.0))));
        assert!(!q.qualifies(&season(Some(0.2), Some(19.0))));
    }

    #[test]
    fn test_missing_inputs_never_qualify() {
        let q = VolumeQualification::default();
        assert!(!q.qualifies(&season(None, Some(70.0))));
        assert!(!q.qualifies(&season(Some(0.3), None)));
    }

    #[test]
    fn test_closures_are_qualifications() {
        let q = |s: &PlayerSeason| s.usage().is_some();
        assert!(q.qualifies(&season(Some(0.3), None)));
    }

    #[test]
    fn test_star_cohort_requires_qualification_and_usage() {
        let population = vec![
            season(Some(0.30), Some(70.0)),
            season(Some(0.20), Some(70.0)),
            season(Some(0.32), Some(5.0)),
        ];
        let q = VolumeQualification::default();
        assert_eq!(star_cohort(&population, &q, 0.25).count(), 1);
    }
}
