//! Usage-conditional inference for player seasons.
//!
//! Given a season's feature vector and a hypothetical target usage, the
//! [`InferenceEngine`](engine::InferenceEngine) answers two questions:
//!
//! 1. **How good would this player be at that usage?** The features are
//!    projected to the target usage, run through a trained
//!    [classifier](classifier), and collapsed into a star-level
//!    [performance score](performance). Tiered [gates](gate) cap the score
//!    when a known failure pattern is present.
//! 2. **How much does that production depend on context?** The
//!    [dependence score](dependence) is `1 - max(physical, skill)`, where the
//!    two pathways measure how portable the season's production is.
//!
//! The two scores are combined into a [risk category](risk).
//!
//! # Architecture
//!
//! ```text
//! FeatureTable ──► EngineBuilder::build ──► InferenceEngine (immutable, Send + Sync)
//!                    │ reference distribution          │
//!                    │ classifier schema check         ├─► predict(season, usage)
//!                    │ gate compilation                │
//!                    └ risk calibration                └─► batch::run_batch (rayon)
//! ```
//!
//! Configuration problems are fatal and surface from
//! [`EngineBuilder::build`](engine::EngineBuilder::build). Problems with one
//! season never fail a query; they lower the result's
//! [`DataQuality`](keystone_core::DataQuality) instead.

pub mod batch;
pub mod classifier;
pub mod dependence;
pub mod engine;
pub mod gate;
pub mod performance;
pub mod risk;
