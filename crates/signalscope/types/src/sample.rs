//! Metric samples and series as handed over by the collector.
//!
//! Samples are immutable once produced. A series carries no ordering
//! guarantee: components that depend on temporal order sort a copy.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Source tag written by the cleaning step when a sample carries none.
pub const DEFAULT_QUALITY_SOURCE: &str = "collector";

// ── Sample Quality ──────────────────────────────────────────────────────

/// Per-sample quality tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleQuality {
    /// Whether the collector considers the sample usable.
    pub is_valid: bool,
    /// Collector confidence in the value (0.0 to 1.0).
    pub confidence: f64,
    /// Whether the collector already flagged this sample as anomalous.
    pub anomaly: bool,
    /// Where the tag came from.
    pub source: String,
}

impl Default for SampleQuality {
    fn default() -> Self {
        Self {
            is_valid: true,
            confidence: 1.0,
            anomaly: false,
            source: DEFAULT_QUALITY_SOURCE.to_string(),
        }
    }
}

// ── Sample ──────────────────────────────────────────────────────────────

/// A single metric observation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    /// Observed value. A JSON `null` is read as NaN.
    #[serde(deserialize_with = "nullable_f64")]
    pub value: f64,
    /// Metric labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Quality tag; absent on raw collector output until cleaning back-fills it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<SampleQuality>,
}

impl Sample {
    /// Create an untagged sample without labels.
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self {
            timestamp,
            value,
            labels: BTreeMap::new(),
            quality: None,
        }
    }

    /// Attach a quality tag.
    pub fn with_quality(mut self, quality: SampleQuality) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Whether the sample survives cleaning: finite value, positive timestamp.
    pub fn is_usable(&self) -> bool {
        self.value.is_finite() && self.timestamp > 0
    }

    /// Usable and not marked invalid by its quality tag.
    pub fn is_valid(&self) -> bool {
        self.is_usable() && self.quality.as_ref().map_or(true, |q| q.is_valid)
    }

    /// Whether the collector flagged this sample as anomalous.
    pub fn is_flagged_anomaly(&self) -> bool {
        self.quality.as_ref().is_some_and(|q| q.anomaly)
    }

    /// Timestamp as a UTC datetime, if representable.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }
}

fn nullable_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

// ── Quality Info ────────────────────────────────────────────────────────

/// Series-level quality assessment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityInfo {
    pub total_points: usize,
    pub valid_points: usize,
    /// Valid points / total points.
    pub completeness: f64,
    /// One minus the anomalous share of valid points.
    pub accuracy: f64,
    /// Fixed at 1.0 for freshly pulled data.
    pub timeliness: f64,
    /// Weighted composite of the three scores above.
    pub quality_score: f64,
    /// Human-readable findings.
    #[serde(default)]
    pub issues: Vec<String>,
}

// ── Metric Series ───────────────────────────────────────────────────────

/// A named metric with its samples.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub name: String,
    /// Metric type as reported by the backend (gauge, counter, ...).
    #[serde(rename = "type", default)]
    pub metric_type: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub series: Vec<Sample>,
    #[serde(default)]
    pub quality_info: QualityInfo,
}

impl MetricSeries {
    pub fn new(name: impl Into<String>, series: Vec<Sample>) -> Self {
        Self {
            name: name.into(),
            series,
            ..Self::default()
        }
    }

    /// Build a series from plain values with evenly spaced timestamps.
    pub fn from_values(
        name: impl Into<String>,
        start: i64,
        step_secs: i64,
        values: &[f64],
    ) -> Self {
        let series = values
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::new(start + i as i64 * step_secs, v))
            .collect();
        Self::new(name, series)
    }

    /// Values in the order received.
    pub fn values(&self) -> Vec<f64> {
        self.series.iter().map(|s| s.value).collect()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
