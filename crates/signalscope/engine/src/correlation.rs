//! Correlation and lag analysis between a primary metric and related metrics.

use signalscope_types::{
    CorrelationConfig, CorrelationFeatureSet, CorrelationStrength, LagAnalysis, LagCorrelation,
    MetricCorrelation, MetricSeries,
};
use tracing::debug;

use crate::math;

/// Fewest overlapping pairs a lag is scored on.
const MIN_LAG_OVERLAP: usize = 3;
const TIE_TOLERANCE: f64 = 1e-12;

/// Pairwise Pearson correlation with a brute-force lag search.
#[derive(Clone, Debug, Default)]
pub struct CorrelationAnalyzer {
    config: CorrelationConfig,
}

impl CorrelationAnalyzer {
    pub fn new(config: CorrelationConfig) -> Self {
        Self { config }
    }

    /// Correlate `primary` against each of `related`.
    ///
    /// Sequences are prefix-truncated to the shorter length. Pairs below
    /// the configured threshold are dropped.
    pub fn analyze(&self, primary: &MetricSeries, related: &[MetricSeries]) -> CorrelationFeatureSet {
        let x = primary.values();
        let mut correlations: Vec<MetricCorrelation> = related
            .iter()
            .filter_map(|other| self.correlate(&x, other))
            .collect();

        correlations.sort_by(|a, b| {
            b.correlation
                .abs()
                .total_cmp(&a.correlation.abs())
                .then_with(|| a.metric.cmp(&b.metric))
        });

        let (strongest_metric, strongest_correlation) = correlations
            .first()
            .map(|c| (Some(c.metric.clone()), c.correlation))
            .unwrap_or((None, 0.0));

        CorrelationFeatureSet {
            analyzed_count: related.len(),
            significant_count: correlations.len(),
            correlations,
            strongest_metric,
            strongest_correlation,
        }
    }

    fn correlate(&self, x: &[f64], other: &MetricSeries) -> Option<MetricCorrelation> {
        let y = other.values();
        let sample_size = x.len().min(y.len());
        if sample_size < 2 {
            debug!(metric = %other.name, sample_size, "too few points to correlate");
            return None;
        }
        let r = math::pearson(x, &y);
        if r.abs() < self.config.min_correlation_threshold {
            return None;
        }

        Some(MetricCorrelation {
            metric: other.name.clone(),
            correlation: r,
            strength: CorrelationStrength::from_coefficient(r),
            confidence: confidence(sample_size, r),
            sample_size,
            lag: lag_search(x, &y, self.config.max_lag_periods),
        })
    }
}

/// Heuristic confidence from sample size and coefficient magnitude.
fn confidence(n: usize, r: f64) -> f64 {
    let r = r.abs();
    if n > 30 && r > 0.7 {
        0.95
    } else if n > 10 && r > 0.5 {
        0.80
    } else if r > 0.3 {
        0.60
    } else {
        0.40
    }
}

/// Correlation of `x` against `y` shifted by every lag in `-max_lag..=max_lag`.
///
/// At lag `L >= 0` the pairs are `(x[i], y[i + L])`, so a positive best lag
/// means `y` trails `x`. Lags with fewer than three overlapping pairs are
/// not scored. Ties go to the smaller absolute lag.
pub fn lag_search(x: &[f64], y: &[f64], max_lag: usize) -> LagAnalysis {
    let max_lag = max_lag as i64;
    let mut analysis = LagAnalysis::default();
    let mut best: Option<(i64, f64)> = None;

    for lag in -max_lag..=max_lag {
        let shift = lag.unsigned_abs() as usize;
        let (xs, ys) = if lag >= 0 {
            (x, y.get(shift..).unwrap_or(&[]))
        } else {
            (x.get(shift..).unwrap_or(&[]), y)
        };
        if xs.len().min(ys.len()) < MIN_LAG_OVERLAP {
            continue;
        }
        let correlation = math::pearson(xs, ys);
        analysis.lag_correlations.push(LagCorrelation { lag, correlation });

        best = match best {
            Some((best_lag, best_r))
                if best_r.abs() > correlation.abs() + TIE_TOLERANCE
                    || ((best_r.abs() - correlation.abs()).abs() <= TIE_TOLERANCE
                        && best_lag.abs() <= lag.abs()) =>
            {
                Some((best_lag, best_r))
            }
            _ => Some((lag, correlation)),
        };
    }

    if let Some((lag, r)) = best {
        analysis.best_lag = lag;
        analysis.best_correlation = r;
    }
    analysis
}
