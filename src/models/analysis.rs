//! Analysis request and result structures.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Category, Severity};

/// Hierarchical document classification, most general level first
/// (e.g. `["bidding", "auction", "services"]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Classification(pub Vec<String>);

impl Classification {
    pub fn new<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(levels.into_iter().map(Into::into).collect())
    }

    /// Parse a slash-separated path such as `bidding/auction/services`.
    pub fn parse(path: &str) -> Self {
        Self::new(
            path.split('/')
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        )
    }

    pub fn levels(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// A single analysis parameter value.
///
/// Equality is structural: floats compare by value, lists element-wise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Parse a CLI-style value: booleans, integers, floats, otherwise text.
    pub fn parse(raw: &str) -> Self {
        if let Ok(b) = raw.parse::<bool>() {
            ParamValue::Bool(b)
        } else if let Ok(i) = raw.parse::<i64>() {
            ParamValue::Int(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            ParamValue::Float(f)
        } else {
            ParamValue::Text(raw.to_string())
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        ParamValue::Float(f)
    }
}

/// Analysis parameters. Ordered so serialization is key-order independent.
pub type Parameters = BTreeMap<String, ParamValue>;

/// Everything a single analysis request carries. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub text: String,
    pub classification: Classification,
    #[serde(default)]
    pub parameters: Parameters,
}

impl AnalysisContext {
    pub fn new(text: impl Into<String>, classification: Classification) -> Self {
        Self {
            text: text.into(),
            classification,
            parameters: Parameters::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Conformity score (0-100) per category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub structural: f64,
    pub legal: f64,
    pub clarity: f64,
    pub abnt: f64,
}

impl CategoryScores {
    pub fn new(structural: f64, legal: f64, clarity: f64, abnt: f64) -> Self {
        Self {
            structural,
            legal,
            clarity,
            abnt,
        }
    }

    /// All categories at the same score.
    pub fn uniform(score: f64) -> Self {
        Self::new(score, score, score, score)
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Structural => self.structural,
            Category::Legal => self.legal,
            Category::Clarity => self.clarity,
            Category::Abnt => self.abnt,
        }
    }

    pub fn set(&mut self, category: Category, value: f64) {
        match category {
            Category::Structural => self.structural = value,
            Category::Legal => self.legal = value,
            Category::Clarity => self.clarity = value,
            Category::Abnt => self.abnt = value,
        }
    }
}

/// A rule hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub rule_name: String,
    pub category: Category,
    pub severity: Severity,
    pub weight: f64,
    pub message: String,
}

impl Finding {
    /// Severity weight scaled by the rule weight.
    pub fn impact(&self) -> f64 {
        self.severity.weight() * self.weight
    }
}

/// Qualitative band for a 0-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Critical,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Excellent => "excellent",
            Rating::Good => "good",
            Rating::Acceptable => "acceptable",
            Rating::Poor => "poor",
            Rating::Critical => "critical",
        }
    }
}

/// Outcome of an analysis. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub scores: CategoryScores,
    pub weighted_score: f64,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default = "Utc::now")]
    pub analyzed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_parse_skips_empty_levels() {
        let c = Classification::parse("/bidding//auction/ services /");
        assert_eq!(c.levels(), ["bidding", "auction", "services"]);
        assert_eq!(c.to_string(), "bidding/auction/services");
    }

    #[test]
    fn param_value_parse() {
        assert_eq!(ParamValue::parse("true"), ParamValue::Bool(true));
        assert_eq!(ParamValue::parse("42"), ParamValue::Int(42));
        assert_eq!(ParamValue::parse("0.5"), ParamValue::Float(0.5));
        assert_eq!(ParamValue::parse("strict"), ParamValue::Text("strict".into()));
    }

    #[test]
    fn param_values_deserialize_untagged() {
        let params: Parameters =
            serde_json::from_str(r#"{"depth": 2, "mode": "full", "tags": ["a", true]}"#).unwrap();
        assert_eq!(params["depth"], ParamValue::Int(2));
        assert_eq!(
            params["tags"],
            ParamValue::List(vec![ParamValue::Text("a".into()), ParamValue::Bool(true)])
        );
    }

    #[test]
    fn finding_impact_scales_with_severity() {
        let finding = Finding {
            rule_id: "r".into(),
            rule_name: "rule".into(),
            category: Category::Legal,
            severity: Severity::High,
            weight: 2.0,
            message: "msg".into(),
        };
        assert_eq!(finding.impact(), 6.0);
    }
}
