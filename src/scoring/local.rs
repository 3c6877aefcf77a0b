//! In-process analyzer built on the rule engine and score calculator.
//!
//! Mirrors the remote analyzer's contract so the service can run offline:
//! each category starts at 100 and loses the impact of every finding in it.

use async_trait::async_trait;
use chrono::Utc;

use crate::error::Result;
use crate::models::{
    AnalysisContext, AnalysisResult, AnalysisWeights, Category, CategoryScores, Finding,
    OrganizationConfig, Severity,
};
use crate::scoring::{RuleEngine, ScoreCalculator};
use crate::service::Analyzer;

/// Legal findings weigh double in their category.
const LEGAL_PENALTY_FACTOR: f64 = 2.0;

/// Worst weighted category below this gets a recommendation.
const WEAK_CATEGORY_SCORE: f64 = 70.0;

/// Dominant category below this gets a recommendation.
const WEAK_DOMINANT_SCORE: f64 = 80.0;

/// Scores documents locally with an organization's rubric.
#[derive(Debug)]
pub struct LocalAnalyzer {
    engine: RuleEngine,
    max_recommendations: usize,
}

impl LocalAnalyzer {
    pub fn new(max_recommendations: usize) -> Self {
        Self {
            engine: RuleEngine::new(),
            max_recommendations,
        }
    }

    /// Per-category conformity scores from a set of findings.
    pub fn category_scores(findings: &[Finding]) -> CategoryScores {
        let mut scores = CategoryScores::uniform(100.0);
        for category in Category::ALL {
            let factor = if category == Category::Legal {
                LEGAL_PENALTY_FACTOR
            } else {
                1.0
            };
            let penalty: f64 = findings
                .iter()
                .filter(|f| f.category == category)
                .map(Finding::impact)
                .sum();
            scores.set(category, (100.0 - penalty * factor).clamp(0.0, 100.0));
        }
        scores
    }

    /// Recommendations ordered by relevance, capped at `max_recommendations`.
    pub fn recommendations(
        &self,
        scores: &CategoryScores,
        weights: &AnalysisWeights,
        findings: &[Finding],
    ) -> Vec<String> {
        let mut out = Vec::new();

        let worst = Category::ALL
            .iter()
            .copied()
            .min_by(|a, b| {
                let wa = scores.get(*a) * weights.get(*a) / 100.0;
                let wb = scores.get(*b) * weights.get(*b) / 100.0;
                wa.total_cmp(&wb)
            })
            .unwrap_or(Category::Structural);
        if scores.get(worst) < WEAK_CATEGORY_SCORE {
            out.push(format!(
                "Prioritize improvements in the {} category (score {:.1}), weighted at {:.1}% by your organization.",
                worst,
                scores.get(worst),
                weights.get(worst)
            ));
        }

        let critical = findings
            .iter()
            .filter(|f| f.severity == Severity::Critical)
            .count();
        if critical > 0 {
            out.push(format!(
                "Resolve {critical} critical issue(s) before moving forward with the process."
            ));
        }

        if !findings.is_empty() {
            out.push(format!(
                "Review {} violation(s) of your organization's custom rules.",
                findings.len()
            ));
        }

        let dominant = weights.dominant_category();
        if scores.get(dominant) < WEAK_DOMINANT_SCORE {
            out.push(format!(
                "Focus on the {} category (weight {:.1}%), a priority for your organization currently scoring {:.1}.",
                dominant,
                weights.get(dominant),
                scores.get(dominant)
            ));
        }

        out.truncate(self.max_recommendations);
        out
    }

    /// Analyze text synchronously.
    pub fn analyze_text(
        &self,
        context: &AnalysisContext,
        organization: &OrganizationConfig,
    ) -> Result<AnalysisResult> {
        let weights = organization.effective_weights();
        let findings = self.engine.evaluate(&organization.rules, &context.text);
        let scores = Self::category_scores(&findings);
        let weighted_score = ScoreCalculator::weighted_score(&scores, &weights)?;
        let recommendations = self.recommendations(&scores, &weights, &findings);

        log::debug!(
            "Local analysis for '{}': {} findings, weighted score {:.1}",
            context.classification,
            findings.len(),
            weighted_score
        );

        Ok(AnalysisResult {
            scores,
            weighted_score,
            findings,
            recommendations,
            analyzed_at: Utc::now(),
        })
    }
}

impl Default for LocalAnalyzer {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait]
impl Analyzer for LocalAnalyzer {
    async fn analyze(
        &self,
        context: &AnalysisContext,
        organization: &OrganizationConfig,
    ) -> Result<AnalysisResult> {
        self.analyze_text(context, organization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisPreset, Classification, CustomRule, PatternType};

    fn org_with_rules() -> OrganizationConfig {
        let mut org = OrganizationConfig::from_preset("o", "Org", AnalysisPreset::Standard);
        org.rules = vec![
            CustomRule::new(
                "vague",
                "Vague term",
                "a critério da administração",
                PatternType::Phrase,
                Severity::Medium,
                Category::Clarity,
            )
            .with_weight(5.0),
            CustomRule::new(
                "exclusive",
                "Brand restriction",
                r"marca\s+exclusiva",
                PatternType::Regex,
                Severity::Critical,
                Category::Legal,
            )
            .with_weight(5.0),
        ];
        org
    }

    #[test]
    fn clean_text_scores_full_marks() {
        let analyzer = LocalAnalyzer::default();
        let ctx = AnalysisContext::new("Objeto: aquisição de papel.", Classification::parse("goods"));

        let result = analyzer.analyze_text(&ctx, &org_with_rules()).unwrap();
        assert!(result.findings.is_empty());
        assert_eq!(result.weighted_score, 100.0);
        assert!(result.recommendations.is_empty());
    }

    #[test]
    fn findings_reduce_their_category() {
        let analyzer = LocalAnalyzer::default();
        let ctx = AnalysisContext::new(
            "Será exigida MARCA EXCLUSIVA, a critério da administração.",
            Classification::parse("goods"),
        );

        let result = analyzer.analyze_text(&ctx, &org_with_rules()).unwrap();
        assert_eq!(result.findings.len(), 2);
        // Clarity: 100 - 2 * 5
        assert_eq!(result.scores.clarity, 90.0);
        // Legal: 100 - 4 * 5 * 2
        assert_eq!(result.scores.legal, 60.0);
        assert_eq!(result.scores.structural, 100.0);
        assert_eq!(result.weighted_score, 87.5);
        assert!(
            result
                .recommendations
                .iter()
                .any(|r| r.contains("1 critical issue"))
        );
    }

    #[test]
    fn scores_are_clamped_at_zero() {
        let findings: Vec<Finding> = (0..20)
            .map(|i| Finding {
                rule_id: format!("r{i}"),
                rule_name: "r".into(),
                category: Category::Abnt,
                severity: Severity::Critical,
                weight: 10.0,
                message: "m".into(),
            })
            .collect();
        assert_eq!(LocalAnalyzer::category_scores(&findings).abnt, 0.0);
    }

    #[test]
    fn invalid_weights_fail_analysis() {
        let analyzer = LocalAnalyzer::default();
        let mut org = org_with_rules();
        org.weights = Some(AnalysisWeights::new(10.0, 10.0, 10.0, 10.0));
        let ctx = AnalysisContext::new("text", Classification::parse("goods"));

        assert!(analyzer.analyze_text(&ctx, &org).is_err());
    }

    #[test]
    fn recommendations_are_capped() {
        let analyzer = LocalAnalyzer::new(1);
        let scores = CategoryScores::new(10.0, 10.0, 10.0, 10.0);
        let findings = vec![Finding {
            rule_id: "r".into(),
            rule_name: "r".into(),
            category: Category::Legal,
            severity: Severity::Critical,
            weight: 1.0,
            message: "m".into(),
        }];
        let recs =
            analyzer.recommendations(&scores, &AnalysisWeights::default(), &findings);
        assert_eq!(recs.len(), 1);
    }
}
