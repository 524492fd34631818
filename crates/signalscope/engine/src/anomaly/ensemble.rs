//! Consensus reconciliation across the detector list.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;
use signalscope_types::{
    AnomalyFeatureSet, AnomalyPoint, EnsembleConfig, EnsembleResult, PerMethodResult, Sample,
    Severity,
};
use tracing::debug;

use super::detectors::{
    AnomalyDetector, IqrDetector, LocalDensityDetector, MadDetector, StatisticalDetector,
    ZScoreDetector,
};
use super::MIN_DETECTION_POINTS;
use crate::math;

/// Confidence a single-detector point needs to reach the final list.
const SOLO_CONFIDENCE: f64 = 0.8;

/// Method name stamped on reconciled points.
pub const CONSENSUS_METHOD: &str = "consensus";

/// Runs every detector and reconciles their output.
pub struct EnsembleDetector {
    config: EnsembleConfig,
    detectors: Vec<Box<dyn AnomalyDetector>>,
}

impl EnsembleDetector {
    /// Ensemble over the five built-in detectors.
    pub fn new(config: EnsembleConfig) -> Self {
        Self::with_detectors(
            config,
            vec![
                Box::new(StatisticalDetector),
                Box::new(IqrDetector),
                Box::new(ZScoreDetector),
                Box::new(MadDetector),
                Box::new(LocalDensityDetector),
            ],
        )
    }

    /// Ensemble over a caller-supplied detector list.
    pub fn with_detectors(config: EnsembleConfig, detectors: Vec<Box<dyn AnomalyDetector>>) -> Self {
        Self { config, detectors }
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Run all detectors over `samples` and reconcile the results.
    ///
    /// A detector that errors is logged and left out of `methods_run`.
    pub fn detect(&self, samples: &[Sample]) -> EnsembleResult {
        if samples.len() < MIN_DETECTION_POINTS {
            debug!(points = samples.len(), "series too short for anomaly detection");
            return EnsembleResult::default();
        }

        let mut methods_run = Vec::with_capacity(self.detectors.len());
        let mut per_method_results = Vec::with_capacity(self.detectors.len());
        for detector in &self.detectors {
            match detector.detect(samples) {
                Ok(result) => {
                    debug!(
                        method = detector.name(),
                        flagged = result.anomaly_count,
                        "detector finished"
                    );
                    methods_run.push(detector.name().to_string());
                    per_method_results.push(result);
                }
                Err(e) => {
                    debug!(method = detector.name(), error = %e, "detector skipped");
                }
            }
        }

        // Group flags by the point they refer to.
        let mut groups: BTreeMap<(i64, usize), Vec<&AnomalyPoint>> = BTreeMap::new();
        for result in &per_method_results {
            for point in &result.anomaly_points {
                groups
                    .entry((point.timestamp, point.position_index))
                    .or_default()
                    .push(point);
            }
        }

        let weight = self.config.consensus_weight;
        let mut consensus_points = Vec::new();
        let mut final_anomalies = Vec::new();
        let mut agreeing_votes = 0usize;

        for points in groups.values() {
            let methods: BTreeSet<&str> = points.iter().map(|p| p.method.as_str()).collect();
            if methods.len() >= self.config.min_consensus {
                agreeing_votes += points.len();
                let merged = merge(points, &methods);
                let mut ranked = merged.clone();
                ranked.confidence *= weight;
                consensus_points.push(merged);
                final_anomalies.push(ranked);
            } else {
                for point in points.iter().filter(|p| p.confidence > SOLO_CONFIDENCE) {
                    let mut ranked = (*point).clone();
                    ranked.confidence *= 1.0 - weight;
                    final_anomalies.push(ranked);
                }
            }
        }

        final_anomalies.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(a.position_index.cmp(&b.position_index))
                .then_with(|| a.method.cmp(&b.method))
        });

        let aggregated_score = aggregated_score(&per_method_results);
        let reliability_score = reliability_score(&per_method_results, agreeing_votes);

        EnsembleResult {
            methods_run,
            per_method_results,
            consensus_points,
            final_anomalies,
            aggregated_score,
            reliability_score,
        }
    }

    /// Prompt-facing summary of `result` over a series of `total_points`.
    pub fn summarize(&self, result: &EnsembleResult, total_points: usize) -> AnomalyFeatureSet {
        let anomaly_count = result.final_anomalies.len();
        let anomaly_rate = if total_points == 0 {
            0.0
        } else {
            (anomaly_count as f64 / total_points as f64).min(1.0)
        };

        let mut severity_counts: BTreeMap<Severity, usize> =
            Severity::ALL.iter().map(|&s| (s, 0)).collect();
        for point in &result.final_anomalies {
            *severity_counts.entry(point.severity).or_default() += 1;
        }

        let method_counts = result
            .per_method_results
            .iter()
            .map(|r| (r.method.clone(), r.anomaly_count))
            .collect();

        AnomalyFeatureSet {
            total_points,
            anomaly_count,
            consensus_count: result.consensus_points.len(),
            anomaly_rate,
            max_severity: result.final_anomalies.iter().map(|p| p.severity).max(),
            severity_counts,
            top_anomalies: result
                .final_anomalies
                .iter()
                .take(self.config.top_anomalies)
                .cloned()
                .collect(),
            methods_run: result.methods_run.clone(),
            method_counts,
            aggregated_score: result.aggregated_score,
            reliability_score: result.reliability_score,
            ensemble: result.clone(),
        }
    }
}

/// Collapse agreeing flags on one point into a consensus point.
fn merge(points: &[&AnomalyPoint], methods: &BTreeSet<&str>) -> AnomalyPoint {
    let first = points[0];
    let confidences: Vec<f64> = points.iter().map(|p| p.confidence).collect();
    let expected = math::mean(&points.iter().map(|p| p.expected).collect::<Vec<_>>());
    let severity = Severity::mean_of(points.iter().map(|p| p.severity)).unwrap_or(first.severity);

    let mut metadata = BTreeMap::new();
    metadata.insert("methods".to_string(), json!(methods.iter().collect::<Vec<_>>()));
    metadata.insert("agreement".to_string(), json!(methods.len()));

    AnomalyPoint {
        position_index: first.position_index,
        timestamp: first.timestamp,
        value: first.value,
        expected,
        deviation: (first.value - expected).abs(),
        severity,
        method: CONSENSUS_METHOD.to_string(),
        confidence: math::mean(&confidences).clamp(0.0, 1.0),
        metadata,
    }
}

/// Confidence-weighted mean of `1 - anomaly_rate`.
fn aggregated_score(results: &[PerMethodResult]) -> f64 {
    let total_weight: f64 = results.iter().map(|r| r.confidence_score).sum();
    if total_weight < f64::EPSILON {
        return 0.0;
    }
    results
        .iter()
        .map(|r| r.confidence_score * (1.0 - r.anomaly_rate))
        .sum::<f64>()
        / total_weight
}

/// Mean of the share of flags that reached consensus and the agreement of
/// detector self-confidences.
fn reliability_score(results: &[PerMethodResult], agreeing_votes: usize) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let flagged: usize = results.iter().map(|r| r.anomaly_count).sum();
    let consensus_share = if flagged == 0 {
        1.0
    } else {
        agreeing_votes as f64 / flagged as f64
    };
    let self_confidences: Vec<f64> = results.iter().map(|r| r.confidence_score).collect();
    let spread = 1.0 / (1.0 + math::variance(&self_confidences));
    ((consensus_share + spread) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalscope_types::{AnalysisError, AnalysisResult, MetricSeries};

    fn spiked(n: usize, at: usize) -> Vec<Sample> {
        let mut values: Vec<f64> = (0..n)
            .map(|i| 100.0 + [0.0, 0.6, -0.4, 0.3, -0.7, 0.2, 0.5, -0.5][i % 8])
            .collect();
        values[at] = 130.0;
        MetricSeries::from_values("m", 1_000, 60, &values).series
    }

    struct Failing;

    impl AnomalyDetector for Failing {
        fn detect(&self, _samples: &[Sample]) -> AnalysisResult<PerMethodResult> {
            Err(AnalysisError::NonFiniteInput {
                method: "failing".into(),
                index: 0,
            })
        }
        fn name(&self) -> &str {
            "failing"
        }
        fn self_confidence(&self) -> f64 {
            0.5
        }
        fn description(&self) -> &str {
            "always fails"
        }
    }

    /// Detector that reports a fixed list of `(index, severity, confidence)` flags.
    struct Scripted {
        name: &'static str,
        self_confidence: f64,
        flags: Vec<(usize, Severity, f64)>,
    }

    impl AnomalyDetector for Scripted {
        fn detect(&self, samples: &[Sample]) -> AnalysisResult<PerMethodResult> {
            let points = self
                .flags
                .iter()
                .map(|&(index, severity, confidence)| AnomalyPoint {
                    position_index: index,
                    timestamp: samples[index].timestamp,
                    value: samples[index].value,
                    expected: 0.0,
                    deviation: samples[index].value.abs(),
                    severity,
                    method: self.name.to_string(),
                    confidence,
                    metadata: BTreeMap::new(),
                })
                .collect();
            Ok(PerMethodResult::from_points(
                self.name,
                points,
                samples.len(),
                self.self_confidence,
            ))
        }
        fn name(&self) -> &str {
            self.name
        }
        fn self_confidence(&self) -> f64 {
            self.self_confidence
        }
        fn description(&self) -> &str {
            "fixed flags"
        }
    }

    /// Three detectors agree on index 2, one flags 7 confidently alone and
    /// one flags 5 weakly alone.
    fn mixed_votes() -> EnsembleResult {
        let ensemble = EnsembleDetector::with_detectors(
            EnsembleConfig::default(),
            vec![
                Box::new(Scripted {
                    name: "a",
                    self_confidence: 0.8,
                    flags: vec![(2, Severity::Critical, 0.9), (7, Severity::Low, 0.9)],
                }),
                Box::new(Scripted {
                    name: "b",
                    self_confidence: 0.6,
                    flags: vec![(2, Severity::Low, 0.7)],
                }),
                Box::new(Scripted {
                    name: "c",
                    self_confidence: 0.7,
                    flags: vec![(2, Severity::High, 0.8), (5, Severity::Medium, 0.5)],
                }),
            ],
        );
        let values: Vec<f64> = (0..10).map(f64::from).collect();
        ensemble.detect(&MetricSeries::from_values("m", 1_000, 60, &values).series)
    }

    #[test]
    fn mixed_votes_rank_consensus_then_confident_solo() {
        let result = mixed_votes();
        assert_eq!(result.consensus_points.len(), 1);

        let merged = &result.consensus_points[0];
        assert_eq!(merged.position_index, 2);
        assert!((merged.confidence - 0.8).abs() < 1e-12);
        assert_eq!(merged.metadata["agreement"], 3);
        assert_eq!(merged.metadata["methods"], json!(["a", "b", "c"]));

        // the weak solo flag on 5 is dropped
        let order: Vec<(usize, &str)> = result
            .final_anomalies
            .iter()
            .map(|p| (p.position_index, p.method.as_str()))
            .collect();
        assert_eq!(order, vec![(2, CONSENSUS_METHOD), (7, "a")]);
        assert!((result.final_anomalies[0].confidence - 0.8 * 0.7).abs() < 1e-12);
        assert!((result.final_anomalies[1].confidence - 0.9 * 0.3).abs() < 1e-12);
    }

    #[test]
    fn merged_severity_is_the_rebinned_mean() {
        // critical, low and high average to ordinal 2.67
        let result = mixed_votes();
        assert_eq!(result.consensus_points[0].severity, Severity::High);

        let low_and_medium = EnsembleDetector::with_detectors(
            EnsembleConfig::default(),
            vec![
                Box::new(Scripted {
                    name: "a",
                    self_confidence: 0.8,
                    flags: vec![(1, Severity::Low, 0.9)],
                }),
                Box::new(Scripted {
                    name: "b",
                    self_confidence: 0.8,
                    flags: vec![(1, Severity::Medium, 0.9)],
                }),
            ],
        );
        let samples = MetricSeries::from_values("m", 1_000, 60, &[1.0, 2.0, 3.0]).series;
        let result = low_and_medium.detect(&samples);
        // ordinal 1.5 rounds up to medium
        assert_eq!(result.consensus_points[0].severity, Severity::Medium);
    }

    #[test]
    fn mixed_votes_scores() {
        let result = mixed_votes();

        // rates 0.2, 0.1, 0.2 weighted by 0.8, 0.6, 0.7
        let aggregated = (0.8 * 0.8 + 0.6 * 0.9 + 0.7 * 0.8) / 2.1;
        assert!((result.aggregated_score - aggregated).abs() < 1e-12);

        // 3 of 5 flags agreed; self-confidence variance is 0.01
        let reliability = (3.0 / 5.0 + 1.0 / 1.01) / 2.0;
        assert!((result.reliability_score - reliability).abs() < 1e-12);
    }

    #[test]
    fn spike_reaches_consensus() {
        let ensemble = EnsembleDetector::new(EnsembleConfig::default());
        let result = ensemble.detect(&spiked(80, 40));
        assert_eq!(result.methods_run.len(), 5);

        let spike = result
            .consensus_points
            .iter()
            .find(|p| p.position_index == 40)
            .expect("spike in consensus");
        assert_eq!(spike.method, CONSENSUS_METHOD);
        assert!(spike.metadata["agreement"].as_u64().unwrap() >= 3);

        let top = &result.final_anomalies[0];
        assert_eq!(top.position_index, 40);
        assert!((top.confidence - spike.confidence * 0.7).abs() < 1e-12);
    }

    #[test]
    fn final_list_sorted_descending() {
        let ensemble = EnsembleDetector::new(EnsembleConfig::default());
        let result = ensemble.detect(&spiked(80, 10));
        for pair in result.final_anomalies.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn failing_detector_is_skipped() {
        let ensemble = EnsembleDetector::with_detectors(
            EnsembleConfig::default(),
            vec![Box::new(Failing), Box::new(ZScoreDetector), Box::new(MadDetector)],
        );
        let result = ensemble.detect(&spiked(40, 5));
        assert_eq!(result.methods_run, vec!["zscore", "mad"]);
        assert_eq!(result.per_method_results.len(), 2);
        assert!(result.consensus_points.iter().any(|p| p.position_index == 5));
    }

    #[test]
    fn short_input_yields_empty_result() {
        let ensemble = EnsembleDetector::new(EnsembleConfig::default());
        let samples = MetricSeries::from_values("m", 1_000, 60, &[1.0, 2.0]).series;
        assert_eq!(ensemble.detect(&samples), EnsembleResult::default());
    }

    #[test]
    fn quiet_series_scores() {
        let ensemble = EnsembleDetector::new(EnsembleConfig::default());
        let samples = MetricSeries::from_values("m", 1_000, 60, &[7.0; 30]).series;
        let result = ensemble.detect(&samples);
        assert!(result.final_anomalies.is_empty());
        assert!((result.aggregated_score - 1.0).abs() < 1e-12);
        // nothing flagged: consensus share 1, spread term just under 1
        assert!(result.reliability_score > 0.99);
    }

    #[test]
    fn stricter_consensus_needs_more_votes() {
        let config = EnsembleConfig {
            min_consensus: 5,
            ..EnsembleConfig::default()
        };
        let ensemble = EnsembleDetector::with_detectors(
            config,
            vec![Box::new(ZScoreDetector), Box::new(MadDetector)],
        );
        let result = ensemble.detect(&spiked(40, 5));
        assert!(result.consensus_points.is_empty());
        // solo points above 0.8 confidence survive with the complementary weight
        for p in &result.final_anomalies {
            assert_ne!(p.method, CONSENSUS_METHOD);
            assert!(p.confidence <= 0.95 * 0.3 + 1e-12);
        }
        assert!(!result.final_anomalies.is_empty());
    }

    #[test]
    fn summary_counts() {
        let ensemble = EnsembleDetector::new(EnsembleConfig {
            top_anomalies: 1,
            ..EnsembleConfig::default()
        });
        let samples = spiked(80, 40);
        let result = ensemble.detect(&samples);
        let summary = ensemble.summarize(&result, samples.len());

        assert_eq!(summary.total_points, 80);
        assert_eq!(summary.anomaly_count, result.final_anomalies.len());
        assert_eq!(summary.consensus_count, result.consensus_points.len());
        assert_eq!(summary.top_anomalies.len(), 1);
        assert_eq!(summary.severity_counts.len(), 4);
        assert_eq!(
            summary.severity_counts.values().sum::<usize>(),
            summary.anomaly_count
        );
        assert_eq!(summary.method_counts.len(), 5);
        assert_eq!(summary.max_severity, Some(Severity::Critical));
        assert_eq!(summary.ensemble, result);
    }
}
