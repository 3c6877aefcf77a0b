//! Organization rubric: weights plus custom rules.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{
    AnalysisPreset, AnalysisWeights, Category, CustomRule, DistributionType, PatternType,
    RuleUpdate,
};
use crate::scoring::RuleEngine;

/// An organization's analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationConfig {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub preset: AnalysisPreset,

    /// Explicit weights; the preset's weights are used when absent
    #[serde(default)]
    pub weights: Option<AnalysisWeights>,

    #[serde(default)]
    pub rules: Vec<CustomRule>,
}

/// Result of [`OrganizationConfig::validate`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Short description of a rubric.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub id: String,
    pub name: String,
    pub preset: AnalysisPreset,
    pub dominant_category: Category,
    pub distribution_type: DistributionType,
    pub active_rules: usize,
    pub total_rules: usize,
}

impl OrganizationConfig {
    /// Rubric using a preset's weights and no custom rules.
    pub fn from_preset(id: impl Into<String>, name: impl Into<String>, preset: AnalysisPreset) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            preset,
            weights: None,
            rules: Vec::new(),
        }
    }

    /// Load a rubric from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn effective_weights(&self) -> AnalysisWeights {
        self.weights.unwrap_or_else(|| self.preset.weights())
    }

    pub fn active_rules(&self) -> impl Iterator<Item = &CustomRule> {
        self.rules.iter().filter(|r| r.active)
    }

    /// Update a rule by id through [`CustomRule::apply_update`].
    pub fn update_rule(&mut self, rule_id: &str, update: RuleUpdate) -> Result<&CustomRule> {
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.id == rule_id)
            .ok_or_else(|| AppError::validation(format!("unknown rule '{rule_id}'")))?;
        rule.apply_update(update)?;
        Ok(rule)
    }

    /// Check weights and rules, collecting errors, warnings and suggestions.
    pub fn validate(&self) -> ConfigReport {
        let mut report = ConfigReport::default();
        let weights = self.effective_weights();

        report.errors.extend(weights.validate().errors);

        for rule in &self.rules {
            if let Err(e) = rule.validate() {
                report.errors.push(e.to_string());
                continue;
            }
            if rule.pattern_type == PatternType::Regex {
                if let Err(e) = RuleEngine::compile(rule) {
                    report.errors.push(e.to_string());
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.as_str()) {
                report
                    .errors
                    .push(format!("duplicate rule id '{}'", rule.id));
            }
        }

        if self.active_rules().next().is_none() {
            report.warnings.push(
                "No active custom rules. Consider adding organization-specific rules.".into(),
            );
        }

        if weights.validate().ok && weights.distribution_type() == DistributionType::LegalFocused {
            report.suggestions.push(
                "Configuration is focused on legal aspects. Consider balancing with structural \
                 aspects for a more complete analysis."
                    .into(),
            );
        }

        report.valid = report.errors.is_empty();
        report
    }

    pub fn summary(&self) -> ConfigSummary {
        let weights = self.effective_weights();
        ConfigSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            preset: self.preset,
            dominant_category: weights.dominant_category(),
            distribution_type: weights.distribution_type(),
            active_rules: self.active_rules().count(),
            total_rules: self.rules.len(),
        }
    }
}
