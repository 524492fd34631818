//! Series cleaning ahead of analysis.

use signalscope_types::{MetricSeries, SampleQuality};

/// Copy of `series` without unusable samples, every sample quality-tagged.
///
/// Drops null, NaN and infinite values and non-positive timestamps.
/// Samples without a quality tag get the default collector tag. The input
/// is left untouched.
pub fn clean_series(series: &MetricSeries) -> MetricSeries {
    let samples = series
        .series
        .iter()
        .filter(|s| s.is_usable())
        .map(|s| {
            let mut sample = s.clone();
            sample.quality.get_or_insert_with(SampleQuality::default);
            sample
        })
        .collect();

    MetricSeries {
        name: series.name.clone(),
        metric_type: series.metric_type.clone(),
        unit: series.unit.clone(),
        series: samples,
        quality_info: series.quality_info.clone(),
    }
}
