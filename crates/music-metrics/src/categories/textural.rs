//! Texture: independence of voices, self-similarity and density trends.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{as_samples, bucket_durations, bucket_pitches, json, rounded, MetricDef};
use crate::categories::{formal, harmonic, interaction, melodic, rhythmic};
use crate::context::AnalysisContext;
use crate::error::MetricError;
use crate::orchestrator::Granularity;
use crate::stats::{
    binned_entropy, fractal_signature, round_to, smoothed_bits, std_dev, windowed_stat,
    Histogram,
};
use crate::value::MetricResult;

/// Pitched-event change between measures that counts as a trend.
const DENSITY_THRESHOLD: isize = 5;

/// Lower bounds (exclusive) of the estimated dynamic bands, loudest first.
const DYNAMIC_BANDS: [(f64, &str); 3] = [(25.0, "forte"), (15.0, "mezzo-forte"), (8.0, "mezzo-piano")];

pub static GLOBAL: &[MetricDef] = &[
    MetricDef { name: "active_counterpoint", compute: active_counterpoint },
    MetricDef { name: "fractal_signature", compute: fractal },
];

pub static AGGREGATE: &[MetricDef] = &[
    MetricDef { name: "aggregate_complexity", compute: aggregate_complexity },
];

pub static PER_MEASURE: &[MetricDef] = &[
    MetricDef { name: "counterpoint_per_measure", compute: counterpoint_per_measure },
    MetricDef { name: "complexity_per_measure", compute: complexity_per_measure },
    MetricDef { name: "density_variability", compute: density_variability },
    MetricDef { name: "estimated_dynamic_per_measure", compute: estimated_dynamic_per_measure },
];

/// Run this category's metrics at one granularity.
pub fn compute(ctx: &AnalysisContext<'_>, granularity: Granularity) -> MetricResult {
    super::run(super::select(granularity, GLOBAL, AGGREGATE, PER_MEASURE), ctx)
}

/// Std-dev of per-voice pitch entropies over voices with at least two
/// sounding pitches. Fewer than two such voices give 0.0.
fn counterpoint(voices: impl IntoIterator<Item = Vec<u8>>) -> f64 {
    let entropies: Vec<f64> = voices
        .into_iter()
        .filter(|pitches| pitches.len() >= 2)
        .map(|pitches| {
            let histogram = Histogram::fixed_bins(&as_samples(&pitches), melodic::PITCH_BINS);
            smoothed_bits(&histogram.counts)
        })
        .collect();
    if entropies.len() < 2 {
        return 0.0;
    }
    std_dev(&entropies)
}

fn active_counterpoint(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let voices = ctx.view().parts().iter().map(|p| p.pitches());
    rounded(counterpoint(voices), 3)
}

fn fractal(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    rounded(fractal_signature(&ctx.view().sorted_onsets()), 3)
}

/// Sum of melodic, rhythmic, harmonic and interaction entropies.
pub(crate) fn complexity(ctx: &AnalysisContext<'_>) -> f64 {
    melodic::pitch_entropy(ctx)
        + rhythmic::whole_duration_entropy(ctx)
        + harmonic::whole_harmonic_entropy(ctx)
        + interaction::graph(ctx).entropy()
}

fn aggregate_complexity(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    rounded(complexity(ctx), 3)
}

fn counterpoint_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = windowed_stat(ctx.measures(), |events| {
        let mut voices: BTreeMap<usize, Vec<u8>> = BTreeMap::new();
        for event in events {
            voices
                .entry(event.part())
                .or_default()
                .extend_from_slice(event.pitches());
        }
        round_to(counterpoint(voices.into_values()), 3)
    });
    json(&series)
}

/// Pitch entropy plus duration entropy, measure by measure.
fn complexity_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = windowed_stat(ctx.measures(), |events| {
        let pitch = binned_entropy(&as_samples(&bucket_pitches(events)), melodic::PITCH_BINS);
        let duration = binned_entropy(&bucket_durations(events), rhythmic::DURATION_BINS);
        round_to(pitch + duration, 3)
    });
    json(&series)
}

/// "crescendo", "diminuendo" or "stable" against the previous measure.
fn density_variability(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let counts = windowed_stat(ctx.measures(), |events| {
        events.iter().filter(|e| e.is_pitched()).count() as isize
    });

    let mut previous: Option<isize> = None;
    let trend = counts.map(|count| {
        let label = match previous {
            Some(p) if count - p > DENSITY_THRESHOLD => "crescendo",
            Some(p) if p - count > DENSITY_THRESHOLD => "diminuendo",
            _ => "stable",
        };
        previous = Some(count);
        label
    });
    json(&trend)
}

/// Dynamic marking implied by how busy a measure is.
fn dynamic_label(intensity: f64) -> &'static str {
    DYNAMIC_BANDS
        .iter()
        .find(|(floor, _)| intensity > *floor)
        .map_or("piano", |(_, label)| label)
}

/// Pitched events plus half the pitch range plus two per sounding part.
fn estimated_dynamic_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = windowed_stat(ctx.measures(), |events| {
        let texture = formal::texture(events);
        dynamic_label(texture[0] + 0.5 * texture[1] + 2.0 * texture[3])
    });
    json(&series)
}
