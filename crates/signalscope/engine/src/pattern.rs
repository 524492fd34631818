//! Coarse pattern classification: trend, seasonality and cycles.

use signalscope_types::{AnalysisConfig, PatternConfig, PatternFeatureSet, Sample};

use crate::math;
use crate::timeseries::{candidate_periods, cycle_similarity};

/// Minimum |r| of the trend fit for a trend to be reported.
const TREND_GATE: f64 = 0.3;
/// Margin a later candidate needs to replace an earlier one.
const SCORE_TOLERANCE: f64 = 1e-9;

pub const TREND_INCREASING: &str = "increasing";
pub const TREND_DECREASING: &str = "decreasing";
pub const TREND_NONE: &str = "none";

/// Recognizes simple patterns in a sample sequence taken in received order.
#[derive(Clone, Debug)]
pub struct PatternRecognizer {
    config: PatternConfig,
    seasonal_periods: Vec<usize>,
}

impl Default for PatternRecognizer {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl PatternRecognizer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.pattern.clone(),
            seasonal_periods: config.time_series.seasonal_periods.clone(),
        }
    }

    pub fn recognize(&self, samples: &[Sample]) -> PatternFeatureSet {
        let mut features = PatternFeatureSet {
            trend_pattern: TREND_NONE.to_string(),
            ..PatternFeatureSet::default()
        };
        if samples.len() < 3 {
            return features;
        }
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let timestamps: Vec<i64> = samples.iter().map(|s| s.timestamp).collect();

        // Trend
        let fit = math::linear_regression(&values);
        let r = fit.r_squared.sqrt();
        if r >= TREND_GATE && fit.slope != 0.0 {
            features.trend_pattern = if fit.slope > 0.0 {
                TREND_INCREASING
            } else {
                TREND_DECREASING
            }
            .to_string();
            features.trend_confidence = r;
        }

        // Seasonality
        let seasonal = candidate_periods(&timestamps, &self.seasonal_periods)
            .into_iter()
            .filter_map(|p| cycle_similarity(&values, p).map(|s| (p, s)))
            .fold(None, best_score);
        if let Some((period, score)) = seasonal {
            if score > self.config.similarity_threshold {
                features.has_seasonality = true;
                features.seasonal_period = period;
                features.seasonal_confidence = score;
            }
        }

        // Cycles
        let n = values.len();
        let longest = self.config.max_pattern_length.min(n / 2);
        let cycle = (self.config.min_pattern_length..=longest)
            .map(|p| (p, math::pearson(&values[..n - p], &values[p..])))
            .fold(None, best_score);
        if let Some((length, score)) = cycle {
            if score > self.config.similarity_threshold {
                features.has_cycle = true;
                features.cycle_length = length;
                features.cycle_confidence = score;
            }
        }

        let signals: Vec<f64> = [
            features.trend_confidence,
            features.seasonal_confidence,
            features.cycle_confidence,
        ]
        .into_iter()
        .filter(|c| *c > 0.0)
        .collect();
        features.overall_confidence = math::mean(&signals);

        features
    }
}

/// Keep the first candidate with the highest score. Later candidates must
/// win by more than rounding noise so harmonics lose to the base period.
pub(crate) fn best_score(
    best: Option<(usize, f64)>,
    candidate: (usize, f64),
) -> Option<(usize, f64)> {
    match best {
        Some((_, score)) if score + SCORE_TOLERANCE >= candidate.1 => best,
        _ => Some(candidate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalscope_types::MetricSeries;
    use std::f64::consts::PI;

    fn samples(values: &[f64]) -> Vec<Sample> {
        MetricSeries::from_values("m", 1_700_000_000, 3_600, values).series
    }

    #[test]
    fn short_input_has_no_pattern() {
        let f = PatternRecognizer::default().recognize(&samples(&[1.0, 2.0]));
        assert_eq!(f.trend_pattern, TREND_NONE);
        assert_eq!(f.overall_confidence, 0.0);
    }

    #[test]
    fn ramp_is_an_increasing_trend() {
        let values: Vec<f64> = (0..40).map(f64::from).collect();
        let f = PatternRecognizer::default().recognize(&samples(&values));
        assert_eq!(f.trend_pattern, TREND_INCREASING);
        assert!((f.trend_confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn falling_ramp_is_decreasing() {
        let values: Vec<f64> = (0..40).map(|i| 100.0 - 2.0 * i as f64).collect();
        let f = PatternRecognizer::default().recognize(&samples(&values));
        assert_eq!(f.trend_pattern, TREND_DECREASING);
    }

    #[test]
    fn sinusoid_is_seasonal_and_cyclic() {
        let values: Vec<f64> = (0..96)
            .map(|i| 10.0 + 3.0 * (2.0 * PI * i as f64 / 24.0).sin())
            .collect();
        let f = PatternRecognizer::default().recognize(&samples(&values));
        assert!(f.has_seasonality);
        assert_eq!(f.seasonal_period, 24);
        assert!(f.has_cycle);
        assert_eq!(f.cycle_length, 24);
        assert!(f.overall_confidence > 0.8);
    }

    #[test]
    fn sub_hourly_sinusoid_is_seasonal() {
        let values: Vec<f64> = (0..96)
            .map(|i| 10.0 + 3.0 * (2.0 * PI * i as f64 / 24.0).sin())
            .collect();
        let samples = MetricSeries::from_values("m", 1_700_000_000, 60, &values).series;
        let f = PatternRecognizer::default().recognize(&samples);
        assert!(f.has_seasonality);
        assert_eq!(f.seasonal_period, 24);
    }

    #[test]
    fn out_of_order_timestamps_keep_derived_periods() {
        // five-minute samples: an hour is 12 points
        let values: Vec<f64> = (0..200)
            .map(|i| 10.0 + 3.0 * (2.0 * PI * i as f64 / 12.0).sin())
            .collect();
        let mut samples = MetricSeries::from_values("m", 1_700_000_000, 300, &values).series;
        let mut stamps: Vec<i64> = samples.iter().map(|s| s.timestamp).collect();
        stamps.reverse();
        for (sample, ts) in samples.iter_mut().zip(stamps) {
            sample.timestamp = ts;
        }
        let f = PatternRecognizer::default().recognize(&samples);
        assert!(f.has_seasonality);
        assert_eq!(f.seasonal_period, 12);
    }

    #[test]
    fn short_cycle_found_by_scan() {
        let values: Vec<f64> = (0..60).map(|i| [1.0, 5.0, 9.0, 5.0][i % 4]).collect();
        let f = PatternRecognizer::default().recognize(&samples(&values));
        assert!(f.has_cycle);
        assert_eq!(f.cycle_length, 4);
        assert!((f.cycle_confidence - 1.0).abs() < 1e-9);
        assert_eq!(f.trend_pattern, TREND_NONE);
    }

    #[test]
    fn overall_confidence_ignores_absent_signals() {
        let values: Vec<f64> = (0..40).map(f64::from).collect();
        let f = PatternRecognizer::default().recognize(&samples(&values));
        // a ramp also autocorrelates with itself, so average what is present
        let present: Vec<f64> = [f.trend_confidence, f.seasonal_confidence, f.cycle_confidence]
            .into_iter()
            .filter(|c| *c > 0.0)
            .collect();
        assert!((f.overall_confidence - math::mean(&present)).abs() < 1e-12);
    }
}
