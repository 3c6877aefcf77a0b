//! Weighted score calculation.

use crate::error::Result;
use crate::models::{AnalysisWeights, Category, CategoryScores, Rating};

/// Combines per-category scores with an organization's weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreCalculator;

impl ScoreCalculator {
    /// Weighted sum of the category scores.
    ///
    /// Refuses to run on an invalid weight vector; the error carries the
    /// actual sum and each violated field.
    pub fn weighted_score(scores: &CategoryScores, weights: &AnalysisWeights) -> Result<f64> {
        weights.validate().into_result()?;

        Ok(Category::ALL
            .iter()
            .map(|c| scores.get(*c) * weights.get(*c) / 100.0)
            .sum())
    }

    /// Qualitative band; each lower bound is inclusive.
    pub fn rating(score: f64) -> Rating {
        if score >= 90.0 {
            Rating::Excellent
        } else if score >= 75.0 {
            Rating::Good
        } else if score >= 60.0 {
            Rating::Acceptable
        } else if score >= 40.0 {
            Rating::Poor
        } else {
            Rating::Critical
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn balanced_weights_average_the_scores() {
        let scores = CategoryScores::new(80.0, 90.0, 70.0, 60.0);
        let weights = AnalysisWeights::new(25.0, 25.0, 25.0, 25.0);
        assert_eq!(ScoreCalculator::weighted_score(&scores, &weights).unwrap(), 75.0);
    }

    #[test]
    fn single_category_weight_selects_its_score() {
        let scores = CategoryScores::new(80.0, 90.0, 70.0, 60.0);
        for (category, expected) in [
            (Category::Structural, 80.0),
            (Category::Legal, 90.0),
            (Category::Clarity, 70.0),
            (Category::Abnt, 60.0),
        ] {
            let mut values = [0.0; 4];
            values[Category::ALL.iter().position(|c| *c == category).unwrap()] = 100.0;
            let weights = AnalysisWeights::new(values[0], values[1], values[2], values[3]);
            assert_eq!(
                ScoreCalculator::weighted_score(&scores, &weights).unwrap(),
                expected
            );
        }
    }

    #[test]
    fn score_is_linear_in_weights() {
        let scores = CategoryScores::new(100.0, 50.0, 0.0, 0.0);
        let a = AnalysisWeights::new(60.0, 40.0, 0.0, 0.0);
        let b = AnalysisWeights::new(40.0, 60.0, 0.0, 0.0);

        let sa = ScoreCalculator::weighted_score(&scores, &a).unwrap();
        let sb = ScoreCalculator::weighted_score(&scores, &b).unwrap();
        // Moving 20 points from structural to legal costs 20 * (100 - 50) / 100
        assert!((sa - sb - 10.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_weights_are_refused() {
        let scores = CategoryScores::uniform(100.0);
        let weights = AnalysisWeights::new(30.0, 30.0, 30.0, 30.0);

        match ScoreCalculator::weighted_score(&scores, &weights) {
            Err(AppError::InvalidWeights { sum, .. }) => assert_eq!(sum, 120.0),
            other => panic!("expected InvalidWeights, got {other:?}"),
        }
    }

    #[test]
    fn rating_bands_are_inclusive_at_lower_bound() {
        assert_eq!(ScoreCalculator::rating(100.0), Rating::Excellent);
        assert_eq!(ScoreCalculator::rating(90.0), Rating::Excellent);
        assert_eq!(ScoreCalculator::rating(89.99), Rating::Good);
        assert_eq!(ScoreCalculator::rating(75.0), Rating::Good);
        assert_eq!(ScoreCalculator::rating(60.0), Rating::Acceptable);
        assert_eq!(ScoreCalculator::rating(59.9), Rating::Poor);
        assert_eq!(ScoreCalculator::rating(40.0), Rating::Poor);
        assert_eq!(ScoreCalculator::rating(39.9), Rating::Critical);
        assert_eq!(ScoreCalculator::rating(0.0), Rating::Critical);
    }
}
