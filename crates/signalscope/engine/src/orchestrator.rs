//! Feature extraction entry point.
//!
//! Standardizes raw metrics, then runs each enabled feature family on the
//! blocking pool and folds the results into one `FeatureBundle`. A family
//! that panics is left out and reported as a bundle warning.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use signalscope_types::{
    AnalysisConfig, AnalysisError, AnalysisResult, AnomalyFeatureSet, CorrelationFeatureSet,
    FeatureBundle, FeatureFamily, MetricSeries, PatternFeatureSet, StatisticalFeatureSet,
    TimeSeriesFeatureSet,
};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::anomaly::{AnomalyDetector, EnsembleDetector};
use crate::cleaning::clean_series;
use crate::correlation::CorrelationAnalyzer;
use crate::pattern::PatternRecognizer;
use crate::quality::QualityScorer;
use crate::statistical::StatisticalExtractor;
use crate::timeseries::TimeSeriesExtractor;

/// Entry point of the engine: standardizes metrics and extracts features.
///
/// Cheap to clone; clones share the same analyzers. Analyzers hold only
/// configuration, so one engine serves any number of concurrent calls.
#[derive(Clone)]
pub struct FeatureEngine {
    inner: Arc<Analyzers>,
}

struct Analyzers {
    config: AnalysisConfig,
    statistical: StatisticalExtractor,
    time_series: TimeSeriesExtractor,
    ensemble: EnsembleDetector,
    pattern: PatternRecognizer,
    correlation: CorrelationAnalyzer,
    quality: QualityScorer,
}

/// Output of one family task, routed back into the bundle after the join.
enum FamilyOutput {
    Statistical(StatisticalFeatureSet),
    TimeSeries(TimeSeriesFeatureSet),
    Anomaly(AnomalyFeatureSet),
    Pattern(PatternFeatureSet),
    Correlation(CorrelationFeatureSet),
}

impl FamilyOutput {
    fn family(&self) -> FeatureFamily {
        match self {
            Self::Statistical(_) => FeatureFamily::Statistical,
            Self::TimeSeries(_) => FeatureFamily::TimeSeries,
            Self::Anomaly(_) => FeatureFamily::Anomaly,
            Self::Pattern(_) => FeatureFamily::Pattern,
            Self::Correlation(_) => FeatureFamily::Correlation,
        }
    }

    fn merge_into(self, bundle: &mut FeatureBundle) {
        match self {
            Self::Statistical(f) => bundle.statistical = Some(f),
            Self::TimeSeries(f) => bundle.time_series = Some(f),
            Self::Anomaly(f) => bundle.anomaly = Some(f),
            Self::Pattern(f) => bundle.pattern = Some(f),
            Self::Correlation(f) => bundle.correlation = Some(f),
        }
    }
}

impl Analyzers {
    fn standardize(&self, series: &MetricSeries) -> MetricSeries {
        let quality = self.quality.assess(&series.series);
        let mut cleaned = clean_series(series);
        debug!(
            metric = %series.name,
            raw = series.len(),
            kept = cleaned.len(),
            quality = quality.quality_score,
            "standardized metric"
        );
        cleaned.quality_info = quality;
        cleaned
    }

    fn run(
        &self,
        family: FeatureFamily,
        primary: &MetricSeries,
        related: &[MetricSeries],
    ) -> FamilyOutput {
        match family {
            FeatureFamily::Statistical => {
                FamilyOutput::Statistical(self.statistical.extract(&primary.values()))
            }
            FeatureFamily::TimeSeries => {
                FamilyOutput::TimeSeries(self.time_series.extract(&primary.series))
            }
            FeatureFamily::Anomaly => {
                let result = self.ensemble.detect(&primary.series);
                FamilyOutput::Anomaly(self.ensemble.summarize(&result, primary.len()))
            }
            FeatureFamily::Pattern => FamilyOutput::Pattern(self.pattern.recognize(&primary.series)),
            FeatureFamily::Correlation => {
                FamilyOutput::Correlation(self.correlation.analyze(primary, related))
            }
        }
    }
}

impl FeatureEngine {
    /// Validate `config` and build the analyzers.
    pub fn new(config: AnalysisConfig) -> AnalysisResult<Self> {
        let ensemble = EnsembleDetector::new(config.ensemble.clone());
        Self::build(config, ensemble)
    }

    /// Like [`FeatureEngine::new`] with a caller-supplied detector list.
    pub fn with_detectors(
        config: AnalysisConfig,
        detectors: Vec<Box<dyn AnomalyDetector>>,
    ) -> AnalysisResult<Self> {
        let ensemble = EnsembleDetector::with_detectors(config.ensemble.clone(), detectors);
        Self::build(config, ensemble)
    }

    fn build(config: AnalysisConfig, ensemble: EnsembleDetector) -> AnalysisResult<Self> {
        config.validate()?;
        debug!(features = ?config.enabled_features, "feature engine configured");
        Ok(Self {
            inner: Arc::new(Analyzers {
                statistical: StatisticalExtractor::new(),
                time_series: TimeSeriesExtractor::new(&config),
                ensemble,
                pattern: PatternRecognizer::new(&config),
                correlation: CorrelationAnalyzer::new(config.correlation.clone()),
                quality: QualityScorer::new(&config),
                config,
            }),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.inner.config
    }

    /// Clean one raw series and attach its quality assessment.
    ///
    /// Quality is scored on the raw samples so dropped points count
    /// against completeness.
    pub fn standardize_metric(&self, series: &MetricSeries) -> MetricSeries {
        self.inner.standardize(series)
    }

    /// Standardize every metric concurrently, one blocking task per metric.
    ///
    /// Output order matches input order. A metric whose task fails is
    /// logged and left out.
    pub async fn standardize_all(&self, metrics: &[MetricSeries]) -> Vec<MetricSeries> {
        let mut tasks = JoinSet::new();
        for (index, series) in metrics.iter().cloned().enumerate() {
            let inner = Arc::clone(&self.inner);
            tasks.spawn_blocking(move || (index, inner.standardize(&series)));
        }

        let mut slots: Vec<Option<MetricSeries>> = vec![None; metrics.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, series)) => slots[index] = Some(series),
                Err(e) => warn!(error = %e, "standardization task failed"),
            }
        }
        slots.into_iter().flatten().collect()
    }

    /// Extract every enabled feature family for `primary`.
    ///
    /// Both `primary` and `related` are raw series; they are standardized
    /// here. Each family runs as its own blocking task over shared input. A
    /// family whose task fails is absent from the bundle and leaves a
    /// warning; the call itself never fails.
    pub async fn extract_features(
        &self,
        primary: &MetricSeries,
        related: &[MetricSeries],
    ) -> FeatureBundle {
        let config = &self.inner.config;
        let primary = self.standardize_metric(primary);
        let related = if config.is_enabled(FeatureFamily::Correlation) {
            self.standardize_all(related).await
        } else {
            Vec::new()
        };

        let mut bundle = FeatureBundle::new(&primary.name, primary.quality_info.clone());
        if primary.len() < config.min_data_points {
            bundle.warn(
                None,
                format!(
                    "{} usable points, fewer than min_data_points {}",
                    primary.len(),
                    config.min_data_points
                ),
            );
        }
        if bundle.data_quality.quality_score < config.quality_threshold {
            bundle.warn(
                None,
                format!(
                    "quality score {:.2} below threshold {:.2}",
                    bundle.data_quality.quality_score, config.quality_threshold
                ),
            );
        }

        let primary = Arc::new(primary);
        let related = Arc::new(related);
        let mut tasks = JoinSet::new();
        for &family in &config.enabled_features {
            let inner = Arc::clone(&self.inner);
            let primary = Arc::clone(&primary);
            let related = Arc::clone(&related);
            tasks.spawn_blocking(move || {
                let started = Instant::now();
                let output = inner.run(family, &primary, &related);
                debug!(
                    metric = %primary.name,
                    family = %family,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "feature family extracted"
                );
                output
            });
        }

        let mut completed = BTreeSet::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(output) => {
                    completed.insert(output.family());
                    output.merge_into(&mut bundle);
                }
                Err(e) => warn!(metric = %bundle.metric_name, error = %e, "feature task failed"),
            }
        }

        for &family in &config.enabled_features {
            if !completed.contains(&family) {
                let failure = AnalysisError::TaskFailed {
                    family,
                    reason: "task panicked or was cancelled".to_string(),
                };
                warn!(metric = %bundle.metric_name, family = %family, "family omitted from bundle");
                bundle.warn(Some(family), failure.to_string());
            }
        }

        bundle
    }
}
