//! Data model shared by every keystone crate.
//!
//! - [`feature`]: feature identifiers and [`FeatureVector`], the optional-valued feature map
//! - [`interaction`]: derived interaction features stored next to base features
//! - [`season`]: [`PlayerSeason`], one entity of the bulk feature table
//! - [`table`]: [`FeatureTable`], CSV/JSON loading of a whole table
//! - [`outcome`]: [`Archetype`] and [`RiskCategory`]
//! - [`quality`]: [`DataQuality`], the per-result record of degraded inputs

pub use self::{
    feature::FeatureVector,
    outcome::{ARCHETYPE_CLASS_SET, Archetype, RiskCategory},
    quality::{DataIssue, DataQuality, QualityLevel},
    season::{PlayerSeason, SeasonKey},
    table::{FeatureTable, FeatureTableError},
};

pub mod feature;
pub mod interaction;
pub mod outcome;
pub mod quality;
pub mod season;
pub mod table;
