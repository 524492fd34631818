//! End-to-end checks through `FeatureEngine` on synthetic metrics.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use signalscope_engine::FeatureEngine;
use signalscope_types::{AnalysisConfig, FeatureFamily, MetricSeries, TrendType};

const START: i64 = 1_700_000_000;
const HOUR: i64 = 3_600;

fn engine() -> FeatureEngine {
    FeatureEngine::new(AnalysisConfig::default()).expect("default config is valid")
}

fn noise(seed: u64, n: usize, half_width: f64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-half_width..half_width)).collect()
}

fn random_walk(seed: u64, n: usize) -> Vec<f64> {
    let mut level = 100.0;
    noise(seed, n, 1.0)
        .into_iter()
        .map(|step| {
            level += step;
            level
        })
        .collect()
}

#[tokio::test]
async fn large_spike_reaches_consensus() {
    let mut values: Vec<f64> = noise(7, 100, 1.0).into_iter().map(|v| 50.0 + v).collect();
    // uniform(-1, 1) has sigma ~0.577; this spike sits over 10 sigma out
    values[60] = 50.0 + 12.0 * (1.0f64 / 3.0).sqrt();
    let series = MetricSeries::from_values("latency", START, 60, &values);

    let bundle = engine().extract_features(&series, &[]).await;
    let anomaly = bundle.anomaly.expect("anomaly family");
    let ensemble = &anomaly.ensemble;

    let flagged_by = ensemble
        .per_method_results
        .iter()
        .filter(|r| r.anomaly_points.iter().any(|p| p.position_index == 60))
        .count();
    assert!(flagged_by >= 3, "only {} detectors flagged the spike", flagged_by);
    assert!(ensemble.consensus_points.iter().any(|p| p.position_index == 60));
    assert_eq!(anomaly.top_anomalies[0].position_index, 60);
}

#[tokio::test]
async fn identical_and_negated_related_metrics() {
    let x = random_walk(11, 80);
    let negated: Vec<f64> = x.iter().map(|v| -v).collect();
    let primary = MetricSeries::from_values("cpu", START, 60, &x);
    let related = vec![
        MetricSeries::from_values("cpu_copy", START, 60, &x),
        MetricSeries::from_values("cpu_negated", START, 60, &negated),
    ];

    let bundle = engine().extract_features(&primary, &related).await;
    let correlation = bundle.correlation.expect("correlation family");
    assert_eq!(correlation.significant_count, 2);
    for c in &correlation.correlations {
        match c.metric.as_str() {
            "cpu_copy" => assert!((c.correlation - 1.0).abs() < 1e-9),
            "cpu_negated" => assert!((c.correlation + 1.0).abs() < 1e-9),
            other => panic!("unexpected metric {}", other),
        }
    }
}

#[tokio::test]
async fn lagged_metric_recovers_lag() {
    let x = random_walk(23, 120);
    let lag = 3;
    let mut y = vec![x[0]; lag];
    y.extend_from_slice(&x[..x.len() - lag]);

    let primary = MetricSeries::from_values("requests", START, 60, &x);
    let related = vec![MetricSeries::from_values("queue_depth", START, 60, &y)];
    let bundle = engine().extract_features(&primary, &related).await;

    let correlation = bundle.correlation.expect("correlation family");
    let pair = &correlation.correlations[0];
    assert_eq!(pair.metric, "queue_depth");
    assert_eq!(pair.lag.best_lag, lag as i64);
    assert!((pair.lag.best_correlation - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn all_invalid_input_scores_zero() {
    let series = MetricSeries::from_values("broken", START, 60, &[f64::NAN; 20]);
    let bundle = engine().extract_features(&series, &[]).await;

    assert_eq!(bundle.data_quality.total_points, 20);
    assert_eq!(bundle.data_quality.completeness, 0.0);
    assert_eq!(bundle.data_quality.quality_score, 0.0);
    // still a complete, zero-valued bundle
    assert_eq!(bundle.families(), FeatureFamily::ALL.to_vec());
    assert_eq!(bundle.statistical.expect("statistical").count, 0);
    assert!(bundle.warnings.iter().any(|w| w.message.contains("quality score")));
}

#[tokio::test]
async fn clean_input_scores_near_one() {
    let values: Vec<f64> = noise(5, 200, 2.0).into_iter().map(|v| 30.0 + v).collect();
    let series = MetricSeries::from_values("memory", START, 60, &values);
    let bundle = engine().extract_features(&series, &[]).await;
    assert!((bundle.data_quality.quality_score - 1.0).abs() < 0.05);
    assert!(bundle.warnings.is_empty());
}

#[tokio::test]
async fn ramp_is_increasing() {
    let values: Vec<f64> = (1..=100).map(f64::from).collect();
    let series = MetricSeries::from_values("disk", START, 60, &values);
    let bundle = engine().extract_features(&series, &[]).await;

    let ts = bundle.time_series.expect("time-series family");
    assert_eq!(ts.trend_type, TrendType::Increasing);
    assert!(ts.trend_r2 > 0.95);
    assert_eq!(bundle.pattern.expect("pattern family").trend_pattern, "increasing");
}

#[tokio::test]
async fn daily_cycle_on_hourly_data() {
    let jitter = noise(42, 72, 0.5);
    let values: Vec<f64> = (0..72)
        .map(|i| 100.0 + 10.0 * (2.0 * PI * i as f64 / 24.0).sin() + jitter[i])
        .collect();
    let series = MetricSeries::from_values("traffic", START, HOUR, &values);
    let bundle = engine().extract_features(&series, &[]).await;

    let ts = bundle.time_series.expect("time-series family");
    assert!(ts.seasonality);
    assert_eq!(ts.dominant_period, 24);
    assert_eq!(ts.candidate_periods, vec![24]);

    let pattern = bundle.pattern.expect("pattern family");
    assert!(pattern.has_seasonality);
    assert_eq!(pattern.seasonal_period, 24);
}

#[tokio::test]
async fn period_24_cycle_found_at_any_sampling_step() {
    for (step, n) in [(60, 96), (1, 96), (1, 48)] {
        let jitter = noise(7, n, 0.5);
        let values: Vec<f64> = (0..n)
            .map(|i| 100.0 + 10.0 * (2.0 * PI * i as f64 / 24.0).sin() + jitter[i])
            .collect();
        let series = MetricSeries::from_values("traffic", START, step, &values);
        let bundle = engine().extract_features(&series, &[]).await;

        let ts = bundle.time_series.expect("time-series family");
        assert!(ts.seasonality, "step {step}, n {n}");
        assert_eq!(ts.dominant_period, 24, "step {step}, n {n}");

        let pattern = bundle.pattern.expect("pattern family");
        assert!(pattern.has_seasonality, "step {step}, n {n}");
        assert_eq!(pattern.seasonal_period, 24, "step {step}, n {n}");
    }
}

#[tokio::test]
async fn bundles_are_reproducible() {
    let values = random_walk(99, 90);
    let primary = MetricSeries::from_values("cpu", START, 60, &values);
    let related = vec![MetricSeries::from_values("load", START, 60, &random_walk(100, 90))];

    let e = engine();
    let mut a = e.extract_features(&primary, &related).await;
    let b = e.extract_features(&primary, &related).await;
    a.generated_at = b.generated_at;
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}
