//! Compact descriptors for telling works apart.

use serde_json::Value;

use super::{as_samples, bucket_durations, bucket_pitches, json, rounded, MetricDef};
use crate::categories::{harmonic, melodic, rhythmic};
use crate::context::AnalysisContext;
use crate::error::MetricError;
use crate::orchestrator::Granularity;
use crate::stats::{binned_entropy, interval_series, round_to, std_dev, windowed_stat};
use crate::value::MetricResult;

pub static GLOBAL: &[MetricDef] = &[
    MetricDef { name: "interval_variability", compute: interval_variability },
];

pub static AGGREGATE: &[MetricDef] = &[
    MetricDef { name: "combined_entropy", compute: combined_entropy },
];

pub static PER_MEASURE: &[MetricDef] = &[
    MetricDef { name: "variability_per_measure", compute: variability_per_measure },
    MetricDef { name: "combined_entropy_per_measure", compute: combined_entropy_per_measure },
];

/// Run this category's metrics at one granularity.
pub fn compute(ctx: &AnalysisContext<'_>, granularity: Granularity) -> MetricResult {
    super::run(super::select(granularity, GLOBAL, AGGREGATE, PER_MEASURE), ctx)
}

fn interval_spread(pitches: &[u8]) -> f64 {
    let steps: Vec<f64> = interval_series(pitches).into_iter().map(f64::from).collect();
    std_dev(&steps)
}

fn interval_variability(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    rounded(interval_spread(&ctx.view().pitches()), 2)
}

/// Mean of the melodic, duration and harmonic entropies.
fn combined_entropy(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let total = melodic::pitch_entropy(ctx)
        + rhythmic::whole_duration_entropy(ctx)
        + harmonic::whole_harmonic_entropy(ctx);
    rounded(total / 3.0, 3)
}

fn variability_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = windowed_stat(ctx.measures(), |events| {
        round_to(interval_spread(&bucket_pitches(events)), 2)
    });
    json(&series)
}

fn combined_entropy_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let local = windowed_stat(ctx.measures(), |events| {
        binned_entropy(&as_samples(&bucket_pitches(events)), melodic::PITCH_BINS)
            + binned_entropy(&bucket_durations(events), rhythmic::DURATION_BINS)
    });
    let combined = local.zip_with(harmonic::harmonic_entropy_series(ctx), |sum, harmonic| {
        round_to((sum + harmonic) / 3.0, 3)
    });
    json(&combined)
}
