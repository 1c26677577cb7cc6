use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use crate::types::AnalysisResult;

/// Semantic bucket of a free-form regime label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RegimeCategory {
    Bullish,
    Bearish,
    Cautionary,
    Unclassified,
}

impl RegimeCategory {
    pub fn color(&self) -> &'static str {
        match self {
            RegimeCategory::Bullish => "#10b981",
            RegimeCategory::Bearish => "#ef4444",
            RegimeCategory::Cautionary => "#f59e0b",
            RegimeCategory::Unclassified => "#8b5cf6",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegimeCategory::Bullish => "Bullish",
            RegimeCategory::Bearish => "Bearish",
            RegimeCategory::Cautionary => "Cautionary",
            RegimeCategory::Unclassified => "Unclassified",
        }
    }
}

impl fmt::Display for RegimeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegimeClass {
    pub category: RegimeCategory,
    pub color: &'static str,
}

impl From<RegimeCategory> for RegimeClass {
    fn from(category: RegimeCategory) -> Self {
        Self {
            category,
            color: category.color(),
        }
    }
}

/// Classifies a label by case-sensitive substring, first match wins:
/// Bull > Bear > Sideways/High > default.
pub fn classify(label: &str) -> RegimeClass {
    let category = if label.contains("Bull") {
        RegimeCategory::Bullish
    } else if label.contains("Bear") {
        RegimeCategory::Bearish
    } else if label.contains("Sideways") || label.contains("High") {
        RegimeCategory::Cautionary
    } else {
        RegimeCategory::Unclassified
    };
    category.into()
}

/// Label classes assigned once per analysis result and shared by every view.
#[derive(Debug, Clone, Default)]
pub struct RegimePalette {
    classes: HashMap<String, RegimeClass>,
}

impl RegimePalette {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let mut classes = HashMap::new();
        for label in result.all_labels() {
            if !result.is_mapped(label) {
                warn!("Regime label '{}' is not part of the regime mapping", label);
            }
            classes.insert(label.to_string(), classify(label));
        }
        Self { classes }
    }

    pub fn class_of(&self, label: &str) -> RegimeClass {
        self.classes.get(label).copied().unwrap_or_else(|| classify(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::analysis::fixtures::sample_result;

    #[test]
    fn test_classify_basic_labels() {
        assert_eq!(classify("Bull").category, RegimeCategory::Bullish);
        assert_eq!(classify("Bear").category, RegimeCategory::Bearish);
        assert_eq!(classify("Sideways").category, RegimeCategory::Cautionary);
        assert_eq!(classify("High Vol").category, RegimeCategory::Cautionary);
        assert_eq!(classify("Calm").category, RegimeCategory::Unclassified);
        assert_eq!(classify("").category, RegimeCategory::Unclassified);
    }

    #[test]
    fn test_classify_priority_order() {
        assert_eq!(classify("Bear High Vol").category, RegimeCategory::Bearish);
        assert_eq!(classify("Bull Bear Flip").category, RegimeCategory::Bullish);
        assert_eq!(classify("Bear then Bull").category, RegimeCategory::Bullish);
        assert_eq!(classify("Sideways High").category, RegimeCategory::Cautionary);
    }

    #[test]
    fn test_labels_with_bull_and_bear_are_bullish() {
        for label in ["BullBear", "BearBull", "x Bear y Bull z", "Bull/Bear High Sideways"] {
            assert_eq!(classify(label).category, RegimeCategory::Bullish, "label {}", label);
        }
    }

    #[test]
    fn test_classify_case_sensitive() {
        assert_eq!(classify("bull").category, RegimeCategory::Unclassified);
        assert_eq!(classify("BEAR").category, RegimeCategory::Unclassified);
    }

    #[test]
    fn test_colors() {
        assert_eq!(classify("Bull Market").color, "#10b981");
        assert_eq!(classify("Bear Market").color, "#ef4444");
        assert_eq!(classify("Sideways").color, "#f59e0b");
        assert_eq!(classify("Unknown").color, "#8b5cf6");
    }

    #[test]
    fn test_palette_matches_classify() {
        let result = sample_result();
        let palette = RegimePalette::from_result(&result);

        for label in result.regime_mapping.values() {
            assert_eq!(palette.class_of(label), classify(label));
        }
        assert_eq!(palette.class_of("Never Seen").category, RegimeCategory::Unclassified);
    }
}
