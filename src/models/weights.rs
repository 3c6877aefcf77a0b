//! Analysis weights and their classification.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Allowed deviation of the weight sum from 100.
pub const SUM_TOLERANCE: f64 = 0.01;

/// Conformity category scored by the rubric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Structural,
    Legal,
    Clarity,
    Abnt,
}

impl Category {
    /// All categories in canonical order.
    pub const ALL: [Category; 4] = [
        Category::Structural,
        Category::Legal,
        Category::Clarity,
        Category::Abnt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Structural => "structural",
            Category::Legal => "legal",
            Category::Clarity => "clarity",
            Category::Abnt => "abnt",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionType {
    Balanced,
    LegalFocused,
    TechnicalFocused,
    StructuralFocused,
    Custom,
}

/// Predefined weight vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisPreset {
    Rigorous,
    #[default]
    Standard,
    Technical,
    Fast,
    Custom,
}

impl AnalysisPreset {
    pub const ALL: [AnalysisPreset; 5] = [
        AnalysisPreset::Rigorous,
        AnalysisPreset::Standard,
        AnalysisPreset::Technical,
        AnalysisPreset::Fast,
        AnalysisPreset::Custom,
    ];

    /// Weights associated with the preset. `Custom` starts from `Standard`.
    pub fn weights(&self) -> AnalysisWeights {
        match self {
            AnalysisPreset::Rigorous => AnalysisWeights::new(15.0, 60.0, 20.0, 5.0),
            AnalysisPreset::Standard | AnalysisPreset::Custom => {
                AnalysisWeights::new(25.0, 25.0, 25.0, 25.0)
            }
            AnalysisPreset::Technical => AnalysisWeights::new(35.0, 25.0, 15.0, 25.0),
            AnalysisPreset::Fast => AnalysisWeights::new(30.0, 40.0, 20.0, 10.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPreset::Rigorous => "rigorous",
            AnalysisPreset::Standard => "standard",
            AnalysisPreset::Technical => "technical",
            AnalysisPreset::Fast => "fast",
            AnalysisPreset::Custom => "custom",
        }
    }
}

/// Percentage weight per category. Must sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWeights {
    pub structural: f64,
    pub legal: f64,
    pub clarity: f64,
    pub abnt: f64,
}

impl Default for AnalysisWeights {
    fn default() -> Self {
        AnalysisPreset::Standard.weights()
    }
}

/// Outcome of [`AnalysisWeights::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightValidation {
    pub ok: bool,
    pub sum: f64,
    pub errors: Vec<String>,
}

impl WeightValidation {
    /// Convert into a `Result`, failing with the actual sum and violations.
    pub fn into_result(self) -> Result<()> {
        if self.ok {
            Ok(())
        } else {
            Err(AppError::InvalidWeights {
                sum: self.sum,
                violations: self.errors,
            })
        }
    }
}

impl AnalysisWeights {
    pub fn new(structural: f64, legal: f64, clarity: f64, abnt: f64) -> Self {
        Self {
            structural,
            legal,
            clarity,
            abnt,
        }
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Structural => self.structural,
            Category::Legal => self.legal,
            Category::Clarity => self.clarity,
            Category::Abnt => self.abnt,
        }
    }

    pub fn total(&self) -> f64 {
        Category::ALL.iter().map(|c| self.get(*c)).sum()
    }

    /// Check ranges and the sum, collecting one message per violation.
    pub fn validate(&self) -> WeightValidation {
        let mut errors = Vec::new();

        for category in Category::ALL {
            let value = self.get(category);
            if !(0.0..=100.0).contains(&value) {
                errors.push(format!(
                    "{category} weight must be between 0 and 100, got {value}"
                ));
            }
        }

        let sum = self.total();
        if (sum - 100.0).abs() >= SUM_TOLERANCE {
            errors.push(format!(
                "weights must sum to 100%, got {sum:.2}% (structural {}, legal {}, clarity {}, abnt {})",
                self.structural, self.legal, self.clarity, self.abnt
            ));
        }

        WeightValidation {
            ok: errors.is_empty(),
            sum,
            errors,
        }
    }

    /// Category with the largest weight. Earlier categories win ties.
    pub fn dominant_category(&self) -> Category {
        let mut best = Category::Structural;
        for category in Category::ALL {
            if self.get(category) > self.get(best) {
                best = category;
            }
        }
        best
    }

    /// Classify the vector. Branch order matters: a heavy structural weight
    /// satisfies both the technical and structural branches.
    pub fn distribution_type(&self) -> DistributionType {
        let values = Category::ALL.map(|c| self.get(c));
        let max = values.iter().copied().fold(f64::MIN, f64::max);
        let min = values.iter().copied().fold(f64::MAX, f64::min);

        if max - min <= 10.0 {
            return DistributionType::Balanced;
        }

        let dominant = self.dominant_category();
        let value = self.get(dominant);

        match dominant {
            Category::Legal if value >= 50.0 => DistributionType::LegalFocused,
            Category::Structural | Category::Abnt if value >= 35.0 => {
                DistributionType::TechnicalFocused
            }
            Category::Structural if value >= 40.0 => DistributionType::StructuralFocused,
            _ => DistributionType::Custom,
        }
    }

    /// Weights formatted as percentages, e.g. `"25.0%"`.
    pub fn as_percentages(&self) -> Vec<(Category, String)> {
        Category::ALL
            .iter()
            .map(|c| (*c, format!("{:.1}%", self.get(*c))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_weights_are_valid() {
        let result = AnalysisWeights::new(25.0, 25.0, 25.0, 25.0).validate();
        assert!(result.ok);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn sum_within_tolerance_is_accepted() {
        assert!(AnalysisWeights::new(25.005, 25.0, 25.0, 25.0).validate().ok);
        assert!(!AnalysisWeights::new(25.02, 25.0, 25.0, 25.0).validate().ok);
    }

    #[test]
    fn each_violation_is_reported() {
        let result = AnalysisWeights::new(-5.0, 120.0, 0.0, 0.0).validate();
        assert!(!result.ok);
        // Two range errors and one sum error
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors[0].contains("structural"));
        assert!(result.errors[1].contains("legal"));
        assert!((result.sum - 115.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_weights_convert_into_error() {
        let err = AnalysisWeights::new(10.0, 10.0, 10.0, 10.0)
            .validate()
            .into_result()
            .unwrap_err();
        match err {
            AppError::InvalidWeights { sum, violations } => {
                assert!((sum - 40.0).abs() < f64::EPSILON);
                assert_eq!(violations.len(), 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn dominant_category_first_seen_wins_ties() {
        let w = AnalysisWeights::new(30.0, 30.0, 20.0, 20.0);
        assert_eq!(w.dominant_category(), Category::Structural);

        let w = AnalysisWeights::new(10.0, 40.0, 40.0, 10.0);
        assert_eq!(w.dominant_category(), Category::Legal);
    }

    #[test]
    fn distribution_types() {
        assert_eq!(
            AnalysisWeights::new(25.0, 25.0, 25.0, 25.0).distribution_type(),
            DistributionType::Balanced
        );
        assert_eq!(
            AnalysisWeights::new(30.0, 20.0, 25.0, 25.0).distribution_type(),
            DistributionType::Balanced
        );
        assert_eq!(
            AnalysisWeights::new(15.0, 60.0, 20.0, 5.0).distribution_type(),
            DistributionType::LegalFocused
        );
        assert_eq!(
            AnalysisWeights::new(35.0, 25.0, 15.0, 25.0).distribution_type(),
            DistributionType::TechnicalFocused
        );
        assert_eq!(
            AnalysisWeights::new(10.0, 20.0, 30.0, 40.0).distribution_type(),
            DistributionType::TechnicalFocused
        );
        // Legal dominant but below the legal threshold
        assert_eq!(
            AnalysisWeights::new(30.0, 40.0, 20.0, 10.0).distribution_type(),
            DistributionType::Custom
        );
        assert_eq!(
            AnalysisWeights::new(20.0, 20.0, 45.0, 15.0).distribution_type(),
            DistributionType::Custom
        );
    }

    #[test]
    fn structural_heavy_is_technical_first() {
        // Satisfies both the technical (>= 35) and structural (>= 40) branches
        let w = AnalysisWeights::new(45.0, 20.0, 20.0, 15.0);
        assert_eq!(w.distribution_type(), DistributionType::TechnicalFocused);
    }

    #[test]
    fn presets_are_valid() {
        for preset in AnalysisPreset::ALL {
            assert!(preset.weights().validate().ok, "{}", preset.as_str());
        }
        assert_eq!(
            AnalysisPreset::Custom.weights(),
            AnalysisPreset::Standard.weights()
        );
    }

    #[test]
    fn percentages_are_formatted() {
        let formatted = AnalysisWeights::new(15.0, 60.0, 20.0, 5.0).as_percentages();
        assert_eq!(formatted[1], (Category::Legal, "60.0%".to_string()));
    }
}
