//! Temporal features: trend, seasonality, stationarity, autocorrelation,
//! volatility, change points and distribution drift.
//!
//! Every sub-analysis has its own minimum length and leaves its fields at
//! zero below it. Input is sorted by timestamp before anything runs.

use signalscope_types::{AnalysisConfig, Sample, TimeSeriesFeatureSet, TrendType};

use crate::math;
use crate::pattern::best_score;

/// Slope magnitude below which a trend is stable.
const STABLE_SLOPE: f64 = 0.01;
/// Residual dispersion relative to |mean| above which a trend is volatile.
const VOLATILE_RATIO: f64 = 0.5;
/// Split-half drift tolerated by a stationary series.
const STATIONARY_DRIFT: f64 = 0.1;
/// Split-half variance drift that stops differencing.
const DIFFERENCING_DRIFT: f64 = 0.3;
const MAX_DIFFERENCING: u32 = 3;
const MAX_ACF_LAG: usize = 20;
const CHANGE_POINT_RATIO: f64 = 0.3;
const MEAN_SHIFT_RATIO: f64 = 0.2;
const VARIANCE_CHANGE_RATIO: f64 = 0.5;

/// Hourly, daily, weekly and 30-day cycles in seconds.
const CYCLE_SECONDS: [i64; 4] = [3_600, 86_400, 604_800, 2_592_000];
/// Hourly-bucket periods that are always scored alongside derived ones.
const FALLBACK_PERIODS: [usize; 3] = [24, 168, 720];

/// Extracts temporal features from a sample sequence.
#[derive(Clone, Debug)]
pub struct TimeSeriesExtractor {
    seasonal_periods: Vec<usize>,
    similarity_threshold: f64,
}

impl Default for TimeSeriesExtractor {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl TimeSeriesExtractor {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            seasonal_periods: config.time_series.seasonal_periods.clone(),
            similarity_threshold: config.pattern.similarity_threshold,
        }
    }

    /// Compute the time-series feature set.
    pub fn extract(&self, samples: &[Sample]) -> TimeSeriesFeatureSet {
        let ordered = sort_by_time(samples);
        let n = ordered.len();
        let mut features = TimeSeriesFeatureSet {
            length: n,
            ..TimeSeriesFeatureSet::default()
        };
        if n < 3 {
            return features;
        }

        let timestamps: Vec<i64> = ordered.iter().map(|s| s.timestamp).collect();
        let values: Vec<f64> = ordered.iter().map(|s| s.value).collect();

        self.trend(&values, &mut features);
        features.candidate_periods = candidate_periods(&timestamps, &self.seasonal_periods);
        self.seasonality(&values, &mut features);
        stationarity(&values, &mut features);
        autocorrelation(&values, &mut features);
        volatility(&values, &mut features);
        change_points(&values, &mut features);
        drift(&values, &mut features);

        features
    }

    fn trend(&self, values: &[f64], f: &mut TimeSeriesFeatureSet) {
        let fit = math::linear_regression(values);
        let mean = math::mean(values);
        let residuals: Vec<f64> = values
            .iter()
            .enumerate()
            .map(|(i, v)| v - fit.predict(i as f64))
            .collect();

        f.trend_slope = fit.slope;
        f.trend_intercept = fit.intercept;
        f.trend_r2 = fit.r_squared;
        f.trend_strength = fit.slope.abs() / (mean.abs() + 1.0);
        f.trend_type = if math::std_dev(&residuals) > VOLATILE_RATIO * mean.abs() {
            TrendType::Volatile
        } else if fit.slope.abs() < STABLE_SLOPE {
            TrendType::Stable
        } else if fit.slope > 0.0 {
            TrendType::Increasing
        } else {
            TrendType::Decreasing
        };
    }

    fn seasonality(&self, values: &[f64], f: &mut TimeSeriesFeatureSet) {
        if values.len() < 6 {
            return;
        }
        let best = f
            .candidate_periods
            .iter()
            .filter_map(|&p| cycle_similarity(values, p).map(|score| (p, score)))
            .fold(None, best_score);

        if let Some((period, score)) = best {
            f.dominant_period = period;
            f.seasonal_strength = score.max(0.0);
            f.seasonality = score > self.similarity_threshold;
            f.seasonal_amplitude = math::mean(
                &(period..values.len())
                    .map(|i| (values[i] - values[i - period]).abs())
                    .collect::<Vec<_>>(),
            );
        }
    }
}

/// Copy of `samples` in ascending timestamp order.
pub(crate) fn sort_by_time(samples: &[Sample]) -> Vec<Sample> {
    let mut ordered = samples.to_vec();
    ordered.sort_by_key(|s| s.timestamp);
    ordered
}

/// Seasonal periods worth scoring for a series with these timestamps.
///
/// A non-empty `overrides` list wins. Otherwise the hourly-bucket defaults
/// are merged with the cycles derived from the median positive sampling
/// interval, so a sub-hourly series can still match a period of 24.
/// Periods longer than half the series are dropped.
pub fn candidate_periods(timestamps: &[i64], overrides: &[usize]) -> Vec<usize> {
    let mut periods: Vec<usize> = if !overrides.is_empty() {
        overrides.to_vec()
    } else {
        let mut periods = FALLBACK_PERIODS.to_vec();
        if let Some(interval) = median_interval(timestamps) {
            periods.extend(
                CYCLE_SECONDS
                    .iter()
                    .map(|&cycle| (cycle as f64 / interval).round() as usize),
            );
        }
        periods
    };
    periods.sort_unstable();
    periods.dedup();
    let limit = timestamps.len() / 2;
    periods.retain(|&p| p >= 2 && p <= limit);
    periods
}

/// Median positive gap between timestamps, taken in time order.
fn median_interval(timestamps: &[i64]) -> Option<f64> {
    let mut ordered = timestamps.to_vec();
    ordered.sort_unstable();
    let gaps: Vec<f64> = ordered
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64)
        .filter(|&d| d > 0.0)
        .collect();
    if gaps.is_empty() {
        return None;
    }
    Some(math::median(&gaps))
}

/// Average Pearson correlation between consecutive full cycles of length
/// `period`. `None` when fewer than two cycles fit.
pub(crate) fn cycle_similarity(values: &[f64], period: usize) -> Option<f64> {
    if period < 2 {
        return None;
    }
    let cycles = values.len() / period;
    if cycles < 2 {
        return None;
    }
    let scores: Vec<f64> = (0..cycles - 1)
        .map(|c| {
            let a = &values[c * period..(c + 1) * period];
            let b = &values[(c + 1) * period..(c + 2) * period];
            math::pearson(a, b)
        })
        .collect();
    Some(math::mean(&scores))
}

fn split_half_drift(values: &[f64]) -> (f64, f64) {
    let (first, second) = values.split_at(values.len() / 2);
    let (m1, m2) = (math::mean(first), math::mean(second));
    let (v1, v2) = (math::variance(first), math::variance(second));
    (math::relative_gap(m2, m1, m1), math::relative_gap(v2, v1, v1))
}

fn stationarity(values: &[f64], f: &mut TimeSeriesFeatureSet) {
    if values.len() < 10 {
        return;
    }
    let (mean_drift, variance_drift) = split_half_drift(values);
    f.mean_drift = mean_drift;
    f.variance_drift = variance_drift;
    f.is_stationary = mean_drift <= STATIONARY_DRIFT && variance_drift <= STATIONARY_DRIFT;

    let mut series = values.to_vec();
    let mut order = 0;
    while order < MAX_DIFFERENCING && split_half_drift(&series).1 >= DIFFERENCING_DRIFT {
        series = math::difference(&series);
        order += 1;
    }
    f.differencing_order = order;
}

fn autocorrelation(values: &[f64], f: &mut TimeSeriesFeatureSet) {
    let max_lag = (values.len() / 3).min(MAX_ACF_LAG);
    if max_lag == 0 {
        return;
    }
    let acf: Vec<f64> = (1..=max_lag)
        .map(|lag| math::autocorrelation(values, lag))
        .collect();

    // Durbin-Levinson truncated after the first coefficient.
    let r1 = acf[0];
    let pacf: Vec<f64> = acf
        .iter()
        .enumerate()
        .map(|(k, &rk)| {
            if k == 0 {
                return rk;
            }
            let prev = acf[k - 1];
            let denom = 1.0 - prev * r1;
            if denom.abs() < f64::EPSILON {
                0.0
            } else {
                (rk - prev * r1) / denom
            }
        })
        .collect();

    let (best_idx, best) = acf
        .iter()
        .enumerate()
        .fold((0, 0.0_f64), |(bi, bv), (i, &v)| {
            if v.abs() > bv.abs() {
                (i, v)
            } else {
                (bi, bv)
            }
        });

    f.max_autocorrelation = best;
    f.max_autocorrelation_lag = if best == 0.0 { 0 } else { best_idx + 1 };
    f.autocorrelation = acf;
    f.partial_autocorrelation = pacf;
}

fn volatility(values: &[f64], f: &mut TimeSeriesFeatureSet) {
    let changes: Vec<f64> = values
        .windows(2)
        .map(|w| {
            let delta = w[1] - w[0];
            if w[0].abs() < f64::EPSILON {
                delta
            } else {
                delta / w[0].abs()
            }
        })
        .collect();
    f.volatility = math::std_dev(&changes);

    let window = (values.len() / 3).min(10);
    if window >= 2 {
        let variances: Vec<f64> = values.windows(window).map(math::variance).collect();
        f.local_variability = math::mean(&variances);
    }
}

fn change_points(values: &[f64], f: &mut TimeSeriesFeatureSet) {
    let n = values.len();
    if n < 6 {
        return;
    }
    let window = (n / 10).max(3);
    if 2 * window > n {
        return;
    }
    let points: Vec<usize> = (window..=n - window)
        .filter(|&i| {
            let trailing = math::mean(&values[i - window..i]);
            let leading = math::mean(&values[i..i + window]);
            (leading - trailing).abs() > CHANGE_POINT_RATIO * trailing.abs()
        })
        .collect();
    f.change_point_count = points.len();
    f.change_points = points;
}

fn drift(values: &[f64], f: &mut TimeSeriesFeatureSet) {
    let n = values.len();
    if n < 10 {
        return;
    }
    let len = n / 3;
    let segments = [&values[..len], &values[len..2 * len], &values[2 * len..]];
    let means: Vec<f64> = segments.iter().map(|s| math::mean(s)).collect();
    let variances: Vec<f64> = segments.iter().map(|s| math::variance(s)).collect();

    f.mean_shift = (means[2] - means[0]).abs() > MEAN_SHIFT_RATIO * means[0].abs();
    f.variance_change = (variances[2] - variances[0]).abs() > VARIANCE_CHANGE_RATIO * variances[0];
    f.distribution_stability = 1.0 / (1.0 + math::std_dev(&means) + math::std_dev(&variances));
    f.segment_means = means;
    f.segment_variances = variances;
}
