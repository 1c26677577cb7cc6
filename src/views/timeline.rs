use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;

use super::regime::{RegimeCategory, RegimePalette};
use crate::error::{DashboardError, DashboardResult};
use crate::types::RegimeHistoryItem;

/// Target number of visible date labels on the x axis.
const TARGET_AXIS_LABELS: usize = 15;

/// One observation of the step series, coloured by its regime class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepPoint {
    pub date: String,
    pub regime: String,
    pub category: RegimeCategory,
    pub color: &'static str,
}

/// Data behind a hovered point; produced here so tooltip and series colouring
/// never disagree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipData {
    pub date: String,
    pub regime: String,
    pub color: &'static str,
}

/// A maximal run of one regime over history indices `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeSegment {
    pub regime: String,
    pub category: RegimeCategory,
    pub start: usize,
    pub end: usize,
    pub start_date: String,
    pub end_date: String,
}

impl RegimeSegment {
    pub fn observations(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineChart {
    /// Distinct regime labels, lexicographically sorted.
    pub categories: Vec<String>,
    pub series: Vec<StepPoint>,
    pub axis_label_density: usize,
}

impl TimelineChart {
    pub fn build(history: &[RegimeHistoryItem], palette: &RegimePalette) -> DashboardResult<Self> {
        if history.is_empty() {
            return Err(DashboardError::DataShape("regime history is empty".to_string()));
        }

        let categories: Vec<String> = history
            .iter()
            .map(|item| item.regime.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        let series = history
            .iter()
            .map(|item| {
                let class = palette.class_of(&item.regime);
                StepPoint {
                    date: item.date.clone(),
                    regime: item.regime.clone(),
                    category: class.category,
                    color: class.color,
                }
            })
            .collect();

        Ok(Self {
            categories,
            series,
            axis_label_density: axis_label_density(history.len()),
        })
    }

    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|p| p.date.as_str())
    }

    pub fn tooltip(&self, index: usize) -> Option<TooltipData> {
        self.series.get(index).map(|p| TooltipData {
            date: p.date.clone(),
            regime: p.regime.clone(),
            color: p.color,
        })
    }

    pub fn segments(&self) -> Vec<RegimeSegment> {
        let mut segments: Vec<RegimeSegment> = Vec::new();

        for (i, point) in self.series.iter().enumerate() {
            match segments.last_mut() {
                Some(current) if current.regime == point.regime => {
                    current.end = i + 1;
                    current.end_date = point.date.clone();
                }
                _ => segments.push(RegimeSegment {
                    regime: point.regime.clone(),
                    category: point.category,
                    start: i,
                    end: i + 1,
                    start_date: point.date.clone(),
                    end_date: point.date.clone(),
                }),
            }
        }

        segments
    }

    /// Renderer configuration: category axes, a step-end line series with
    /// per-point colours, and LTTB sampling left to the chart engine.
    pub fn chart_option(&self) -> Value {
        let dates: Vec<&str> = self.dates().collect();
        let data: Vec<Value> = (0..self.series.len())
            .filter_map(|i| self.tooltip(i))
            .map(|tip| {
                json!({
                    "name": tip.date,
                    "value": tip.regime,
                    "itemStyle": { "color": tip.color },
                })
            })
            .collect();

        json!({
            "tooltip": { "trigger": "axis" },
            "xAxis": {
                "type": "category",
                "data": dates,
                "axisLabel": { "interval": self.axis_label_density, "rotate": 30 },
            },
            "yAxis": {
                "type": "category",
                "data": self.categories,
            },
            "series": [{
                "name": "Regime",
                "type": "line",
                "step": "end",
                "data": data,
                "showSymbol": false,
                "sampling": "lttb",
            }],
        })
    }
}

/// Tick-label thinning hint: `ceil(n / 15)`.
pub fn axis_label_density(n_dates: usize) -> usize {
    n_dates.div_ceil(TARGET_AXIS_LABELS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::analysis::fixtures::history;

    fn build(labels: &[&str]) -> TimelineChart {
        TimelineChart::build(&history(labels), &RegimePalette::default()).unwrap()
    }

    #[test]
    fn test_empty_history_is_data_shape_error() {
        let err = TimelineChart::build(&[], &RegimePalette::default()).unwrap_err();
        assert!(matches!(err, DashboardError::DataShape(_)));
    }

    #[test]
    fn test_categories_distinct_and_sorted() {
        let chart = build(&["Sideways", "Bull", "Bear High Vol", "Bull", "Sideways", "Bear High Vol"]);
        assert_eq!(chart.categories, vec!["Bear High Vol", "Bull", "Sideways"]);

        let chart = build(&["Only"]);
        assert_eq!(chart.categories, vec!["Only"]);
    }

    #[test]
    fn test_categories_match_label_set_for_generated_histories() {
        const POOL: [&str; 7] = [
            "Sideways", "Bull Market", "Bear High Vol", "Crash", "Bull", "bull", "Recovery",
        ];
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for _ in 0..200 {
            let len = 1 + (next() % 60) as usize;
            let labels: Vec<&str> = (0..len).map(|_| POOL[(next() % POOL.len() as u64) as usize]).collect();

            let chart = build(&labels);
            let expected: Vec<String> = labels
                .iter()
                .map(|l| l.to_string())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            assert_eq!(chart.categories, expected, "history {:?}", labels);
            assert_eq!(chart.series.len(), labels.len());
        }
    }

    #[test]
    fn test_axis_label_density() {
        assert_eq!(axis_label_density(150), 10);
        assert_eq!(axis_label_density(14), 1);
        assert_eq!(axis_label_density(15), 1);
        assert_eq!(axis_label_density(16), 2);
        assert_eq!(axis_label_density(1), 1);
    }

    #[test]
    fn test_one_point_per_observation() {
        let labels: Vec<&str> = (0..150).map(|i| if i % 7 == 0 { "Bear" } else { "Bull" }).collect();
        let chart = build(&labels);
        assert_eq!(chart.series.len(), 150);
        assert_eq!(chart.axis_label_density, 10);
    }

    #[test]
    fn test_step_series_holds_between_flips() {
        let labels: Vec<&str> = (0..20)
            .map(|i| if (5..15).contains(&i) { "Bear Market" } else { "Bull Market" })
            .collect();
        let chart = build(&labels);

        assert_eq!(chart.series.len(), 20);
        for (i, point) in chart.series.iter().enumerate() {
            let expected = if (5..15).contains(&i) { "Bear Market" } else { "Bull Market" };
            assert_eq!(point.regime, expected, "index {}", i);
        }

        let segments = chart.segments();
        let spans: Vec<(&str, usize, usize)> = segments
            .iter()
            .map(|s| (s.regime.as_str(), s.start, s.end))
            .collect();
        assert_eq!(
            spans,
            vec![("Bull Market", 0, 5), ("Bear Market", 5, 15), ("Bull Market", 15, 20)]
        );
        assert_eq!(segments[1].observations(), 10);
        assert_eq!(segments[1].start_date, "2024-01-06");
        assert_eq!(segments[1].end_date, "2024-01-15");
    }

    #[test]
    fn test_tooltip_matches_series_color() {
        let chart = build(&["Bull", "Bear High Vol", "Calm"]);
        for (i, point) in chart.series.iter().enumerate() {
            let tip = chart.tooltip(i).unwrap();
            assert_eq!(tip.color, point.color);
            assert_eq!(tip.date, point.date);
            assert_eq!(tip.regime, point.regime);
        }
        assert_eq!(chart.tooltip(1).unwrap().color, "#ef4444");
        assert!(chart.tooltip(3).is_none());
    }

    #[test]
    fn test_chart_option_contract() {
        let chart = build(&["Bull", "Bear", "Bear"]);
        let option = chart.chart_option();

        assert_eq!(option["series"][0]["step"], "end");
        assert_eq!(option["series"][0]["sampling"], "lttb");
        assert_eq!(option["xAxis"]["axisLabel"]["interval"], 1);
        assert_eq!(option["xAxis"]["data"][2], "2024-01-03");
        assert_eq!(option["yAxis"]["data"], json!(["Bear", "Bull"]));
        assert_eq!(option["series"][0]["data"][0]["itemStyle"]["color"], "#10b981");
        assert_eq!(option["series"][0]["data"].as_array().unwrap().len(), 3);
    }
}
