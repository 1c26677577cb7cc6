use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::warn;

use super::regime::{RegimeClass, RegimePalette};
use super::stability::{classify_quality, stability_entries, QualityClass, StabilityEntry};
use super::timeline::TimelineChart;
use crate::types::{AnalysisResult, PredictionResult};

/// Immutable, version-stamped analysis result with its label classes
/// assigned once. All dashboard views are recomputed from one snapshot.
#[derive(Debug)]
pub struct RegimeSnapshot {
    version: u64,
    result: AnalysisResult,
    palette: RegimePalette,
}

impl RegimeSnapshot {
    pub fn new(version: u64, result: AnalysisResult) -> Self {
        let palette = RegimePalette::from_result(&result);
        Self {
            version,
            result,
            palette,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn result(&self) -> &AnalysisResult {
        &self.result
    }

    pub fn palette(&self) -> &RegimePalette {
        &self.palette
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusBanner {
    pub regime: String,
    #[serde(flatten)]
    pub class: RegimeClass,
    pub total_days: u32,
    pub n_states: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityPanel {
    #[serde(flatten)]
    pub quality: QualityClass,
    pub quality_string: String,
    pub persistence_score: f64,
    pub avg_duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.7 {
            ConfidenceLevel::High
        } else if confidence > 0.5 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "#34d399",
            ConfidenceLevel::Medium => "#fbbf24",
            ConfidenceLevel::Low => "#f87171",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeProbability {
    pub regime: String,
    pub probability: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionView {
    pub next_regime: String,
    pub next_class: RegimeClass,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub confidence_color: &'static str,
    pub expected_return: f64,
    pub expected_return_color: &'static str,
    pub expected_volatility: f64,
    pub probabilities: Vec<RegimeProbability>,
}

impl PredictionView {
    pub fn build(prediction: &PredictionResult, palette: &RegimePalette) -> Self {
        let level = ConfidenceLevel::from_confidence(prediction.confidence);

        let mut probabilities: Vec<RegimeProbability> = prediction
            .state_probabilities
            .iter()
            .map(|(regime, p)| RegimeProbability {
                regime: regime.to_string(),
                probability: *p,
                color: palette.class_of(regime).color,
            })
            .collect();
        probabilities.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(Ordering::Equal)
        });

        Self {
            next_regime: prediction.next_regime.clone(),
            next_class: palette.class_of(&prediction.next_regime),
            confidence: prediction.confidence,
            confidence_level: level,
            confidence_color: level.color(),
            expected_return: prediction.expected_return,
            expected_return_color: if prediction.expected_return >= 0.0 {
                "#10b981"
            } else {
                "#ef4444"
            },
            expected_volatility: prediction.expected_volatility,
            probabilities,
        }
    }
}

/// Every view rendered for one snapshot. A malformed history degrades the
/// timeline to `None` instead of failing the whole dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub version: u64,
    pub filename: String,
    pub status: StatusBanner,
    pub quality: QualityPanel,
    pub stability: Vec<StabilityEntry>,
    pub prediction: PredictionView,
    pub timeline: Option<TimelineChart>,
}

impl DashboardView {
    pub fn build(snapshot: &Arc<RegimeSnapshot>) -> Self {
        let result = snapshot.result();
        let palette = snapshot.palette();
        let persistence = &result.persistence;

        let timeline = match TimelineChart::build(&result.regime_history, palette) {
            Ok(chart) => Some(chart),
            Err(e) => {
                warn!("Timeline unavailable for {}: {}", result.filename, e);
                None
            }
        };

        Self {
            version: snapshot.version(),
            filename: result.filename.clone(),
            status: StatusBanner {
                regime: result.current_regime.clone(),
                class: palette.class_of(&result.current_regime),
                total_days: result.total_days,
                n_states: result.n_states,
            },
            quality: QualityPanel {
                quality: classify_quality(&persistence.quality_string),
                quality_string: persistence.quality_string.clone(),
                persistence_score: persistence.persistence_score,
                avg_duration: persistence.avg_duration,
            },
            stability: stability_entries(&persistence.duration_by_regime, palette),
            prediction: PredictionView::build(&result.prediction, palette),
            timeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::analysis::fixtures::{result_with_history, sample_result, SAMPLE_JSON};
    use crate::views::regime::{classify, RegimeCategory};
    use crate::views::stability::QualityTier;

    fn snapshot(result: AnalysisResult) -> Arc<RegimeSnapshot> {
        Arc::new(RegimeSnapshot::new(7, result))
    }

    #[test]
    fn test_dashboard_view_from_snapshot() {
        let view = DashboardView::build(&snapshot(sample_result()));

        assert_eq!(view.version, 7);
        assert_eq!(view.status.regime, "Bull Market");
        assert_eq!(view.status.class.category, RegimeCategory::Bullish);
        assert_eq!(view.status.total_days, 104);
        assert_eq!(view.quality.quality.tier, QualityTier::Moderate);

        let ranked: Vec<&str> = view.stability.iter().map(|e| e.row.regime.as_str()).collect();
        assert_eq!(ranked, vec!["Bull Market", "Sideways", "Bear High Vol"]);

        let timeline = view.timeline.expect("timeline");
        assert_eq!(timeline.categories, vec!["Bull Market", "Sideways"]);
    }

    #[test]
    fn test_views_agree_on_colors() {
        let view = DashboardView::build(&snapshot(sample_result()));
        let timeline = view.timeline.as_ref().unwrap();

        for point in &timeline.series {
            assert_eq!(point.color, classify(&point.regime).color);
        }
        for entry in &view.stability {
            assert_eq!(entry.class, classify(&entry.row.regime));
        }
        assert_eq!(view.status.class, classify(&view.status.regime));
        assert_eq!(view.prediction.next_class, classify(&view.prediction.next_regime));
    }

    #[test]
    fn test_empty_history_degrades_timeline_only() {
        let view = DashboardView::build(&snapshot(result_with_history(&[])));
        assert!(view.timeline.is_none());
        assert_eq!(view.stability.len(), 3);
        assert_eq!(view.prediction.next_regime, "Bull Market");
    }

    #[test]
    fn test_prediction_view() {
        let view = DashboardView::build(&snapshot(sample_result()));
        let prediction = &view.prediction;

        assert_eq!(prediction.confidence_level, ConfidenceLevel::High);
        assert_eq!(prediction.confidence_color, "#34d399");
        assert_eq!(prediction.expected_return_color, "#10b981");
        let order: Vec<&str> = prediction.probabilities.iter().map(|p| p.regime.as_str()).collect();
        assert_eq!(order, vec!["Bull Market", "Sideways", "Bear High Vol"]);
    }

    fn with_probabilities(probabilities: &str) -> AnalysisResult {
        let original = r#""state_probabilities": {"Bull Market": 0.8, "Bear High Vol": 0.05, "Sideways": 0.15}"#;
        let payload = SAMPLE_JSON.replace(original, &format!(r#""state_probabilities": {}"#, probabilities));
        assert_ne!(payload, SAMPLE_JSON);
        serde_json::from_str(&payload).unwrap()
    }

    #[test]
    fn test_probability_ties_keep_payload_order() {
        let result = with_probabilities(r#"{"Sideways": 0.1, "Bull Market": 0.8, "Bear High Vol": 0.1}"#);
        let view = DashboardView::build(&snapshot(result));
        let order: Vec<&str> = view.prediction.probabilities.iter().map(|p| p.regime.as_str()).collect();
        assert_eq!(order, vec!["Bull Market", "Sideways", "Bear High Vol"]);

        let result = with_probabilities(r#"{"Bear High Vol": 0.1, "Bull Market": 0.8, "Sideways": 0.1}"#);
        let view = DashboardView::build(&snapshot(result));
        let order: Vec<&str> = view.prediction.probabilities.iter().map(|p| p.regime.as_str()).collect();
        assert_eq!(order, vec!["Bull Market", "Bear High Vol", "Sideways"]);
    }

    #[test]
    fn test_confidence_levels() {
        assert_eq!(ConfidenceLevel::from_confidence(0.71), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_confidence(0.7), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_confidence(0.51), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_confidence(0.5), ConfidenceLevel::Low);
    }

    #[test]
    fn test_negative_expected_return_is_red() {
        let mut result = sample_result();
        result.prediction.expected_return = -0.002;
        let view = DashboardView::build(&snapshot(result));
        assert_eq!(view.prediction.expected_return_color, "#ef4444");
    }
}
