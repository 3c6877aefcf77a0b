//! Organization-defined pattern rules.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Category;

/// How a rule's pattern is matched against text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    #[default]
    Regex,
    Keyword,
    Phrase,
}

/// Severity of a rule hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Numeric weight used for ranking and score deductions (1-4).
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Low => 1.0,
            Severity::Medium => 2.0,
            Severity::High => 3.0,
            Severity::Critical => 4.0,
        }
    }
}

/// A configurable rule evaluated against extracted document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRule {
    pub id: String,
    pub name: String,
    pub pattern: String,

    #[serde(default)]
    pub pattern_type: PatternType,

    pub severity: Severity,
    pub category: Category,

    /// Relative weight in [0, 10]
    #[serde(default = "default_rule_weight")]
    pub weight: f64,

    #[serde(default = "default_active")]
    pub active: bool,

    /// Message attached to findings; defaults to the rule name
    #[serde(default)]
    pub message: Option<String>,
}

fn default_rule_weight() -> f64 {
    1.0
}

fn default_active() -> bool {
    true
}

/// Partial update applied through [`CustomRule::apply_update`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub pattern: Option<String>,
    pub pattern_type: Option<PatternType>,
    pub severity: Option<Severity>,
    pub category: Option<Category>,
    pub weight: Option<f64>,
    pub active: Option<bool>,
    pub message: Option<String>,
}

impl CustomRule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        pattern: impl Into<String>,
        pattern_type: PatternType,
        severity: Severity,
        category: Category,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            pattern: pattern.into(),
            pattern_type,
            severity,
            category,
            weight: default_rule_weight(),
            active: true,
            message: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Field-level sanity checks. Regex syntax is checked by the rule engine.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::validation("rule id is empty"));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::validation(format!(
                "rule '{}' has an empty name",
                self.id
            )));
        }
        if self.pattern.trim().is_empty() {
            return Err(AppError::validation(format!(
                "rule '{}' has an empty pattern",
                self.id
            )));
        }
        if !(0.0..=10.0).contains(&self.weight) {
            return Err(AppError::validation(format!(
                "rule '{}' weight must be between 0 and 10, got {}",
                self.id, self.weight
            )));
        }
        Ok(())
    }

    /// Apply a partial update. This is the only way a rule changes after
    /// creation; the updated rule is re-validated before it replaces `self`.
    pub fn apply_update(&mut self, update: RuleUpdate) -> Result<()> {
        let mut next = self.clone();
        if let Some(name) = update.name {
            next.name = name;
        }
        if let Some(pattern) = update.pattern {
            next.pattern = pattern;
        }
        if let Some(pattern_type) = update.pattern_type {
            next.pattern_type = pattern_type;
        }
        if let Some(severity) = update.severity {
            next.severity = severity;
        }
        if let Some(category) = update.category {
            next.category = category;
        }
        if let Some(weight) = update.weight {
            next.weight = weight;
        }
        if let Some(active) = update.active {
            next.active = active;
        }
        if let Some(message) = update.message {
            next.message = Some(message);
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rule() -> CustomRule {
        CustomRule::new(
            "r1",
            "Missing deadline",
            "prazo",
            PatternType::Keyword,
            Severity::High,
            Category::Legal,
        )
    }

    #[test]
    fn severity_weights_are_ordered() {
        assert!(Severity::Critical.weight() > Severity::High.weight());
        assert!(Severity::High > Severity::Medium);
        assert_eq!(Severity::Low.weight(), 1.0);
    }

    #[test]
    fn update_changes_only_given_fields() {
        let mut rule = sample_rule();
        rule.apply_update(RuleUpdate {
            severity: Some(Severity::Critical),
            active: Some(false),
            ..RuleUpdate::default()
        })
        .unwrap();

        assert_eq!(rule.severity, Severity::Critical);
        assert!(!rule.active);
        assert_eq!(rule.pattern, "prazo");
    }

    #[test]
    fn rejected_update_leaves_rule_untouched() {
        let mut rule = sample_rule();
        let result = rule.apply_update(RuleUpdate {
            weight: Some(11.0),
            name: Some("Renamed".into()),
            ..RuleUpdate::default()
        });

        assert!(result.is_err());
        assert_eq!(rule, sample_rule());
    }

    #[test]
    fn deserializes_with_defaults() {
        let rule: CustomRule = toml::from_str(
            r#"
            id = "r2"
            name = "Ambiguous term"
            pattern = "a critério"
            severity = "medium"
            category = "clarity"
            "#,
        )
        .unwrap();

        assert_eq!(rule.pattern_type, PatternType::Regex);
        assert_eq!(rule.weight, 1.0);
        assert!(rule.active);
        assert_eq!(rule.message(), "Ambiguous term");
    }
}
