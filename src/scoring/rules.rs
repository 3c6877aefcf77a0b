//! Pattern rule evaluation.
//!
//! Regex rules are compiled case-insensitively and cached per rule id; a
//! rule whose pattern changes is recompiled on next use. A malformed pattern
//! only disables its own rule.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use regex::{Regex, RegexBuilder};

use crate::error::{AppError, Result};
use crate::models::{CustomRule, Finding, PatternType};

/// Compiled pattern; `regex` is `None` when the source failed to compile.
#[derive(Debug, Clone)]
struct CompiledPattern {
    source: String,
    regex: Option<Regex>,
}

/// Evaluates [`CustomRule`]s against document text.
#[derive(Debug, Default)]
pub struct RuleEngine {
    compiled: Mutex<HashMap<String, CompiledPattern>>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a regex rule's pattern, failing with a pattern error.
    pub fn compile(rule: &CustomRule) -> Result<Regex> {
        RegexBuilder::new(&rule.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| AppError::pattern(&rule.id, e))
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, CompiledPattern>> {
        self.compiled.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn regex_for(&self, rule: &CustomRule) -> Option<Regex> {
        let mut cache = self.cache();
        if let Some(entry) = cache.get(&rule.id) {
            if entry.source == rule.pattern {
                return entry.regex.clone();
            }
        }

        let regex = match Self::compile(rule) {
            Ok(regex) => Some(regex),
            Err(e) => {
                log::warn!("Skipping rule '{}' ({}): {}", rule.id, rule.name, e);
                None
            }
        };
        cache.insert(
            rule.id.clone(),
            CompiledPattern {
                source: rule.pattern.clone(),
                regex: regex.clone(),
            },
        );
        regex
    }

    /// Whether a single rule matches the text. Ignores the `active` flag.
    pub fn matches(&self, rule: &CustomRule, text: &str) -> bool {
        self.hit(rule, text, &text.to_lowercase())
    }

    fn hit(&self, rule: &CustomRule, text: &str, lowered: &str) -> bool {
        match rule.pattern_type {
            PatternType::Regex => self
                .regex_for(rule)
                .is_some_and(|regex| regex.is_match(text)),
            PatternType::Keyword | PatternType::Phrase => {
                lowered.contains(&rule.pattern.to_lowercase())
            }
        }
    }

    /// Run every active rule, producing one finding per matching rule.
    pub fn evaluate(&self, rules: &[CustomRule], text: &str) -> Vec<Finding> {
        let lowered = text.to_lowercase();

        rules
            .iter()
            .filter(|rule| rule.active)
            .filter(|rule| self.hit(rule, text, &lowered))
            .map(|rule| Finding {
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                category: rule.category,
                severity: rule.severity,
                weight: rule.weight,
                message: rule.message().to_string(),
            })
            .collect()
    }

    /// Drop cached compilations, e.g. after a rubric reload.
    pub fn clear(&self) {
        self.cache().clear();
    }
}
