use serde::Serialize;
use std::cmp::Ordering;

use super::regime::{RegimeClass, RegimePalette};
use crate::types::{DurationStats, OrderedEntries};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StabilityRow {
    pub regime: String,
    pub avg: f64,
    pub count: u64,
}

/// Regimes ordered by descending mean duration. The sort is stable, so equal
/// averages keep the order the service sent them in.
pub fn rank_durations(duration_by_regime: &OrderedEntries<DurationStats>) -> Vec<StabilityRow> {
    let mut rows: Vec<StabilityRow> = duration_by_regime
        .iter()
        .map(|(regime, stats)| StabilityRow {
            regime: regime.to_string(),
            avg: stats.avg,
            count: stats.count,
        })
        .collect();

    rows.sort_by(|a, b| b.avg.partial_cmp(&a.avg).unwrap_or(Ordering::Equal));
    rows
}

/// A ranked row together with its display class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StabilityEntry {
    #[serde(flatten)]
    pub row: StabilityRow,
    #[serde(flatten)]
    pub class: RegimeClass,
}

pub fn stability_entries(
    duration_by_regime: &OrderedEntries<DurationStats>,
    palette: &RegimePalette,
) -> Vec<StabilityEntry> {
    rank_durations(duration_by_regime)
        .into_iter()
        .map(|row| {
            let class = palette.class_of(&row.regime);
            StabilityEntry { row, class }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityTier {
    Good,
    Moderate,
    Poor,
}

impl QualityTier {
    pub fn color(&self) -> &'static str {
        match self {
            QualityTier::Good => "#10b981",
            QualityTier::Moderate => "#f59e0b",
            QualityTier::Poor => "#ef4444",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Good => "GOOD",
            QualityTier::Moderate => "MODERATE",
            QualityTier::Poor => "POOR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityClass {
    pub tier: QualityTier,
    pub color: &'static str,
}

/// Closed three-tier classification; anything unrecognised is Poor.
pub fn classify_quality(quality: &str) -> QualityClass {
    let q = quality.to_uppercase();
    let tier = if q.contains("GOOD") {
        QualityTier::Good
    } else if q.contains("MODERATE") {
        QualityTier::Moderate
    } else {
        QualityTier::Poor
    };
    QualityClass {
        tier,
        color: tier.color(),
    }
}
