//! Pitch content: entropy, intervals, motifs, range.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::{as_samples, bucket_pitches, json, rounded, MetricDef};
use crate::context::AnalysisContext;
use crate::error::MetricError;
use crate::harmony::{note_name, pitch_name};
use crate::orchestrator::Granularity;
use crate::stats::{
    binned_entropy, interval_series, motif_counts, round_to, std_dev, windowed_stat,
    IntervalTally,
};
use crate::value::MetricResult;

pub const PITCH_BINS: usize = 12;
pub const MOTIF_LENGTH: usize = 3;

pub static GLOBAL: &[MetricDef] = &[
    MetricDef { name: "melodic_entropy", compute: melodic_entropy },
    MetricDef { name: "predominant_intervals", compute: predominant_intervals },
    MetricDef { name: "recurrent_motifs", compute: recurrent_motifs },
    MetricDef { name: "tonal_variety", compute: tonal_variety },
];

pub static AGGREGATE: &[MetricDef] = &[
    MetricDef { name: "melodic_compactness", compute: melodic_compactness },
    MetricDef { name: "motif_repetition", compute: motif_repetition },
];

pub static PER_MEASURE: &[MetricDef] = &[
    MetricDef { name: "notes_per_measure", compute: notes_per_measure },
    MetricDef { name: "compactness_per_measure", compute: compactness_per_measure },
    MetricDef { name: "motifs_per_measure", compute: motifs_per_measure },
    MetricDef { name: "ambitus_per_measure", compute: ambitus_per_measure },
];

/// Run this category's metrics at one granularity.
pub fn compute(ctx: &AnalysisContext<'_>, granularity: Granularity) -> MetricResult {
    super::run(super::select(granularity, GLOBAL, AGGREGATE, PER_MEASURE), ctx)
}

/// 12-bin pitch entropy of the whole view.
pub(crate) fn pitch_entropy(ctx: &AnalysisContext<'_>) -> f64 {
    binned_entropy(&as_samples(&ctx.view().pitches()), PITCH_BINS)
}

fn melodic_entropy(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    rounded(pitch_entropy(ctx), 3)
}

fn predominant_intervals(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let tally = IntervalTally::from_series(&interval_series(&ctx.view().pitches()));
    json(&tally.ranked())
}

fn recurrent_motifs(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    json(&motif_counts(&ctx.view().pitches(), MOTIF_LENGTH).recurrent())
}

fn tonal_variety(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let mut classes: BTreeMap<&str, usize> = BTreeMap::new();
    for pitch in ctx.view().pitches() {
        *classes.entry(note_name(pitch % 12)).or_default() += 1;
    }
    Ok(json!({
        "distinct_pitch_classes": classes.len(),
        "pitch_classes": classes,
    }))
}

fn melodic_compactness(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    rounded(std_dev(&as_samples(&ctx.view().pitches())), 2)
}

fn motif_repetition(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    rounded(motif_counts(&ctx.view().pitches(), MOTIF_LENGTH).mean_recurrence(), 2)
}

fn notes_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    json(&windowed_stat(ctx.measures(), |events| bucket_pitches(events).len()))
}

fn compactness_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = windowed_stat(ctx.measures(), |events| {
        round_to(std_dev(&as_samples(&bucket_pitches(events))), 2)
    });
    json(&series)
}

fn motifs_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = windowed_stat(ctx.measures(), |events| {
        motif_counts(&bucket_pitches(events), MOTIF_LENGTH).recurrent()
    });
    json(&series)
}

/// Lowest and highest pitch of each measure, as MIDI numbers and note names.
fn ambitus_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = windowed_stat(ctx.measures(), |events| {
        let pitches = bucket_pitches(events);
        match (pitches.iter().min(), pitches.iter().max()) {
            (Some(&low), Some(&high)) => json!({
                "min": low,
                "max": high,
                "lowest": pitch_name(low),
                "highest": pitch_name(high),
                "semitones": high - low,
            }),
            _ => json!({
                "min": null,
                "max": null,
                "lowest": null,
                "highest": null,
                "semitones": 0,
            }),
        }
    });
    json(&series)
}
