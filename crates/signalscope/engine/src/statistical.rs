//! Descriptive statistics over a value sequence.

use signalscope_types::StatisticalFeatureSet;

use crate::math;

/// Extracts location, spread and shape statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatisticalExtractor;

impl StatisticalExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Compute the statistical feature set.
    ///
    /// Never fails. Empty input gives an all-zero record; a single value
    /// fills the location fields and leaves spread and shape at zero.
    pub fn extract(&self, values: &[f64]) -> StatisticalFeatureSet {
        let count = values.len();
        if count == 0 {
            return StatisticalFeatureSet::default();
        }

        let sorted = math::sorted(values);
        let mean = math::mean(values);
        let median = math::percentile(&sorted, 0.5);
        let min = sorted[0];
        let max = sorted[count - 1];

        if count < 2 {
            return StatisticalFeatureSet {
                count,
                mean,
                median,
                min,
                max,
                q1: median,
                q3: median,
                p95: median,
                p99: median,
                ..StatisticalFeatureSet::default()
            };
        }

        let variance = math::variance(values);
        let (skewness, kurtosis) = shape(values, mean);
        let q1 = math::percentile(&sorted, 0.25);
        let q3 = math::percentile(&sorted, 0.75);

        StatisticalFeatureSet {
            count,
            mean,
            median,
            std_dev: variance.sqrt(),
            variance,
            skewness,
            kurtosis,
            min,
            max,
            range: max - min,
            q1,
            q3,
            iqr: q3 - q1,
            p95: math::percentile(&sorted, 0.95),
            p99: math::percentile(&sorted, 0.99),
        }
    }
}

/// Moment-based skewness and excess kurtosis; zero for a constant series.
fn shape(values: &[f64], mean: f64) -> (f64, f64) {
    let n = values.len() as f64;
    let (m2, m3, m4) = values.iter().fold((0.0, 0.0, 0.0), |(a, b, c), v| {
        let d = v - mean;
        let d2 = d * d;
        (a + d2, b + d2 * d, c + d2 * d2)
    });
    let (m2, m3, m4) = (m2 / n, m3 / n, m4 / n);
    if m2 < f64::EPSILON {
        return (0.0, 0.0);
    }
    (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
}
