//! Statistical helpers for the keystone workspace.
//!
//! This crate provides the small set of statistics the reference distribution
//! and the batch reports are built from:
//!
//! - **Descriptive statistics**: count, min, max, mean, median and spread of a dataset
//! - **Percentiles**: nearest-rank percentile tables for a fixed set of points
//! - **Fixed-width buckets**: bucket assignment and gap filling for per-bucket aggregates
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`percentiles`]: Percentile computation and storage
//! - [`buckets`]: Fixed-width bucketing and interpolation of empty buckets
//!
//! # Examples
//!
//! ## Computing percentiles
//!
//! ```
//! use keystone_stats::percentiles::{Percentiles, STANDARD_POINTS};
//!
//! let values = (1..=100).map(|v| v as f32).collect::<Vec<_>>();
//! let percentiles = Percentiles::new(&values, &STANDARD_POINTS);
//! assert_eq!(percentiles.get(50.0), Some(51.0));
//! assert_eq!(percentiles.get(90.0), Some(91.0));
//! ```
//!
//! ## Summarizing a dataset
//!
//! ```
//! use keystone_stats::descriptive::DescriptiveStats;
//!
//! let stats = DescriptiveStats::new([0.2, 0.4, 0.6]).unwrap();
//! assert_eq!(stats.count, 3);
//! assert_eq!(stats.median, 0.4);
//! ```

pub mod buckets;
pub mod descriptive;
pub mod percentiles;
