// src/models/mod.rs

//! Domain models for the review core.
//!
//! This module contains all data structures used throughout the crate,
//! organized by their primary purpose.

mod analysis;
mod config;
mod organization;
mod rule;
mod weights;

// Re-export all public types
pub use analysis::{
    AnalysisContext, AnalysisResult, CategoryScores, Classification, Finding, ParamValue,
    Parameters, Rating,
};
pub use config::{
    CacheConfig, CircuitBreakerConfig, ClientConfig, Config, RetryConfig, ServiceConfig,
};
pub use organization::{ConfigReport, ConfigSummary, OrganizationConfig};
pub use rule::{CustomRule, PatternType, RuleUpdate, Severity};
pub use weights::{AnalysisPreset, AnalysisWeights, Category, DistributionType, WeightValidation};
