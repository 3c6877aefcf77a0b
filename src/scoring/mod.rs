//! Rubric scoring.
//!
//! - `RuleEngine`: evaluates organization pattern rules against text
//! - `ScoreCalculator`: combines category scores with validated weights
//! - `LocalAnalyzer`: both of the above behind the `Analyzer` trait

pub mod calculator;
pub mod local;
pub mod rules;

pub use calculator::ScoreCalculator;
pub use local::LocalAnalyzer;
pub use rules::RuleEngine;
