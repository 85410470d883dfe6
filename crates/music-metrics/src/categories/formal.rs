//! Large-scale form: proportions, sections and symmetry.
//!
//! Sections are found by clustering a small texture vector per measure with
//! seeded k-means, so labels are stable across runs.

use serde_json::{json, Value};

use score_model::MusicalEvent;

use super::{bucket_pitches, json, rounded, MetricDef};
use crate::cluster::{kmeans, SECTION_SEED};
use crate::context::AnalysisContext;
use crate::error::MetricError;
use crate::orchestrator::Granularity;
use crate::stats::{pearson, round_to, windowed_stat, MeasureValue, Series};
use crate::value::MetricResult;

const GOLDEN_RATIO: f64 = 0.618;
const SECTION_COUNT: usize = 4;
/// Euclidean texture distance that marks a section boundary.
const TRANSITION_DISTANCE: f64 = 10.0;

pub static GLOBAL: &[MetricDef] = &[
    MetricDef { name: "golden_section", compute: golden_section },
];

pub static AGGREGATE: &[MetricDef] = &[
    MetricDef { name: "golden_section", compute: golden_section },
    MetricDef { name: "estimated_measure_count", compute: estimated_measure_count },
];

pub static PER_MEASURE: &[MetricDef] = &[
    MetricDef { name: "estimated_measure_count", compute: estimated_measure_count },
    MetricDef { name: "section_labels", compute: section_labels },
    MetricDef { name: "section_transitions", compute: section_transitions },
    MetricDef { name: "formal_symmetry", compute: formal_symmetry },
];

/// Run this category's metrics at one granularity.
pub fn compute(ctx: &AnalysisContext<'_>, granularity: Granularity) -> MetricResult {
    super::run(super::select(granularity, GLOBAL, AGGREGATE, PER_MEASURE), ctx)
}

/// `[pitched events, pitch range, chords, distinct parts]` of one measure.
pub(crate) fn texture(events: &[&MusicalEvent]) -> Vec<f64> {
    let pitches = bucket_pitches(events);
    let range = match (pitches.iter().min(), pitches.iter().max()) {
        (Some(&low), Some(&high)) => (high - low) as f64,
        _ => 0.0,
    };
    let mut parts: Vec<usize> = events.iter().map(|e| e.part()).collect();
    parts.sort_unstable();
    parts.dedup();

    vec![
        events.iter().filter(|e| e.is_pitched()).count() as f64,
        range,
        events.iter().filter(|e| e.is_chord()).count() as f64,
        parts.len() as f64,
    ]
}

fn textures(ctx: &AnalysisContext<'_>) -> Series<Vec<f64>> {
    windowed_stat(ctx.measures(), |events| texture(events))
}

/// The point at 0.618 of the view's length and the measure containing it.
fn golden_section(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let beat = ctx.view().total_duration() * GOLDEN_RATIO;
    let measure = ctx
        .view()
        .grid()
        .iter()
        .find(|m| m.contains(beat))
        .map(|m| m.index);
    Ok(json!({
        "beat": round_to(beat, 3),
        "measure": measure,
    }))
}

/// Half-beat steps grouped in fours.
fn estimated_measure_count(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let count = (ctx.view().total_duration() / 0.5 / 4.0).floor() as u64;
    Ok(json!(count))
}

fn section_labels(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let textures = textures(ctx);
    let points: Vec<Vec<f64>> = textures.raw().cloned().collect();
    let labels = kmeans(&points, SECTION_COUNT, SECTION_SEED);

    let series = Series {
        alignment: textures.alignment,
        values: textures
            .values
            .iter()
            .zip(labels)
            .map(|(mv, label)| MeasureValue {
                measure: mv.measure,
                value: format!("Section {}", (b'A' + label as u8) as char),
            })
            .collect(),
    };
    json(&series)
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Whether each measure's texture jumps away from the previous one.
fn section_transitions(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let mut previous: Option<Vec<f64>> = None;
    let series = textures(ctx).map(|texture| {
        let jump = previous
            .as_deref()
            .is_some_and(|p| distance(p, &texture) > TRANSITION_DISTANCE);
        previous = Some(texture);
        jump
    });
    json(&series)
}

/// Correlation of the first half's activity with the second half's.
fn formal_symmetry(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let activity: Vec<f64> = textures(ctx).raw().map(|t| t[0] + t[2]).collect();
    if activity.len() < 2 {
        return rounded(0.0, 3);
    }
    let half = activity.len() / 2;
    let first = &activity[..half];
    let last = &activity[activity.len() - half..];
    rounded(pearson(first, last), 3)
}
