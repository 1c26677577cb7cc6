use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::iter;
use std::marker::PhantomData;

/// Full output of the remote regime-analysis service for one dataset.
///
/// Treated as read-only once received; every view is derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub filename: String,
    pub total_days: u32,
    pub n_states: u32,
    #[serde(default)]
    pub features_used: Vec<String>,
    #[serde(default)]
    pub model_selection: Option<Vec<ModelSelectionEntry>>,
    pub training_stats: TrainingStats,
    pub regime_mapping: BTreeMap<u32, String>,
    #[serde(default)]
    pub state_statistics: BTreeMap<u32, StateStatistics>,
    pub persistence: PersistenceMetrics,
    pub current_regime: String,
    pub current_state: u32,
    pub regime_history: Vec<RegimeHistoryItem>,
    pub model_params: ModelParams,
    pub prediction: PredictionResult,
}

impl AnalysisResult {
    /// Every regime label that appears anywhere in the result, mapping first.
    pub fn all_labels(&self) -> Vec<&str> {
        let candidates = self
            .regime_mapping
            .values()
            .map(String::as_str)
            .chain(iter::once(self.current_regime.as_str()))
            .chain(iter::once(self.prediction.next_regime.as_str()))
            .chain(self.regime_history.iter().map(|item| item.regime.as_str()))
            .chain(self.persistence.duration_by_regime.iter().map(|(label, _)| label));

        let mut labels: Vec<&str> = Vec::new();
        for label in candidates {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }

    pub fn is_mapped(&self, label: &str) -> bool {
        self.regime_mapping.values().any(|l| l == label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeHistoryItem {
    pub date: String,
    pub regime: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
    #[serde(default)]
    pub log_likelihood: Option<f64>,
    #[serde(default)]
    pub aic: Option<f64>,
    #[serde(default)]
    pub bic: Option<f64>,
    #[serde(default)]
    pub n_params: Option<u64>,
    #[serde(default)]
    pub n_iter: Option<u64>,
    #[serde(default)]
    pub converged: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSelectionEntry {
    pub n_states: u32,
    pub bic: f64,
    pub aic: f64,
    pub log_likelihood: f64,
}

/// Per-state return/volatility summary. The service may send `null` for a
/// standard deviation computed over a single observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateStatistics {
    #[serde(deserialize_with = "count_from_number")]
    pub count: u64,
    pub mean_return: f64,
    #[serde(default)]
    pub std_return: Option<f64>,
    pub mean_volatility: f64,
    #[serde(default)]
    pub std_volatility: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceMetrics {
    #[serde(default)]
    pub total_switches: u64,
    pub avg_duration: f64,
    #[serde(default)]
    pub median_duration: f64,
    #[serde(default)]
    pub min_duration: u64,
    #[serde(default)]
    pub max_duration: u64,
    #[serde(default)]
    pub persistence_score: f64,
    pub duration_by_regime: OrderedEntries<DurationStats>,
    #[serde(rename = "quality")]
    pub quality_string: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub avg: f64,
    #[serde(deserialize_with = "count_from_number")]
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default)]
    pub start_probs: Vec<f64>,
    #[serde(default)]
    pub transition_matrix: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub next_state: u32,
    pub next_regime: String,
    pub state_probabilities: OrderedEntries<f64>,
    pub expected_return: f64,
    pub expected_volatility: f64,
    pub confidence: f64,
}

/// A JSON object decoded into a sequence of `(key, value)` pairs in document
/// order. Ranking ties are broken by the order the service emitted them, which
/// a hash or btree map would lose.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedEntries<V>(pub Vec<(String, V)>);

impl<V> OrderedEntries<V> {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<V> Default for OrderedEntries<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedEntries<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<V: Serialize> Serialize for OrderedEntries<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedEntries<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = OrderedEntries<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

/// Counts arrive as `3` or `3.0` depending on how the service built the dict.
fn count_from_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() || raw < 0.0 || raw.fract() != 0.0 {
        return Err(de::Error::custom(format!("invalid count: {}", raw)));
    }
    Ok(raw as u64)
}
