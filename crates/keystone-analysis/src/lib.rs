//! Reference statistics and usage-conditional projection
//!
//! This crate turns a population of player-seasons into the shared
//! [`ReferenceDistribution`](distribution::ReferenceDistribution) and uses it
//! to project a single season's features to a different usage level.
//!
//! # Overview
//!
//! 1. **Qualify** ([`qualification::Qualification`]): Select the reference population
//! 2. **Compute Statistics** ([`distribution::ReferenceDistribution`]): Percentiles,
//!    usage-bucket medians and star-cohort medians over the qualified seasons
//! 3. **Project** ([`projection::FeatureProjector`]): Move a season's volume features
//!    from its observed usage to a target usage
//!
//! # Example
//!
//! ```
//! use keystone_analysis::{
//!     distribution::{DistributionConfig, ReferenceDistribution},
//!     projection::FeatureProjector,
//!     qualification::VolumeQualification,
//! };
//! use keystone_core::{FeatureVector, PlayerSeason};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let population = (0..60u8)
//!     .map(|i| {
//!         let usage = 0.10 + 0.005 * f32::from(i);
//!         let features = FeatureVector::new()
//!             .with("usg_pct", usage)
//!             .with("games_played", 70.0)
//!             .with("creation_volume_ratio", 2.0 * usage * usage);
//!         PlayerSeason::new(i.to_string(), "P", "2021-22", features)
//!     })
//!     .collect::<Vec<_>>();
//!
//! let dist = ReferenceDistribution::build(
//!     &population,
//!     &VolumeQualification::default(),
//!     DistributionConfig::default(),
//! )?;
//!
//! let role_player = &population[10];
//! let projection = FeatureProjector::default().project(
//!     role_player.features(),
//!     role_player.usage(),
//!     0.28,
//!     &dist,
//! );
//! assert_eq!(projection.features.get("usg_pct"), Some(0.28));
//! # Ok(())
//! # }
//! ```

pub mod distribution;
pub mod projection;
pub mod qualification;
