//! Durations, meter and per-measure rhythmic activity.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::{bucket_durations, json, rounded, MetricDef};
use crate::context::AnalysisContext;
use crate::error::MetricError;
use crate::orchestrator::Granularity;
use crate::stats::{binned_entropy, lcm, mean, population_variance, windowed_stat, Series};
use crate::value::MetricResult;

pub const DURATION_BINS: usize = 8;

pub static GLOBAL: &[MetricDef] = &[
    MetricDef { name: "duration_entropy", compute: duration_entropy },
    MetricDef { name: "time_signature_histogram", compute: time_signature_histogram },
];

pub static AGGREGATE: &[MetricDef] = &[
    MetricDef { name: "duration_entropy", compute: mean_duration_entropy },
];

pub static PER_MEASURE: &[MetricDef] = &[
    MetricDef { name: "note_count_mean", compute: note_count_mean },
    MetricDef { name: "note_count_variance", compute: note_count_variance },
    MetricDef { name: "duration_entropy_per_measure", compute: duration_entropy_per_measure },
    MetricDef { name: "polyrhythm_per_measure", compute: polyrhythm_per_measure },
];

/// Run this category's metrics at one granularity.
pub fn compute(ctx: &AnalysisContext<'_>, granularity: Granularity) -> MetricResult {
    super::run(super::select(granularity, GLOBAL, AGGREGATE, PER_MEASURE), ctx)
}

/// 8-bin entropy of every pitched event's duration.
pub(crate) fn whole_duration_entropy(ctx: &AnalysisContext<'_>) -> f64 {
    let durations: Vec<f64> = ctx.view().pitched_events().map(|e| e.duration()).collect();
    binned_entropy(&durations, DURATION_BINS)
}

pub(crate) fn duration_entropy_series(ctx: &AnalysisContext<'_>) -> Series<f64> {
    windowed_stat(ctx.measures(), |events| {
        binned_entropy(&bucket_durations(events), DURATION_BINS)
    })
}

/// Pitched events in each measure.
fn event_counts(ctx: &AnalysisContext<'_>) -> Vec<f64> {
    ctx.measures()
        .iter()
        .map(|b| b.items.iter().filter(|e| e.is_pitched()).count() as f64)
        .collect()
}

fn duration_entropy(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    rounded(whole_duration_entropy(ctx), 3)
}

fn time_signature_histogram(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let mut histogram: BTreeMap<String, usize> = BTreeMap::new();
    for measure in ctx.view().grid() {
        if let Some(ts) = measure.time_signature {
            *histogram.entry(ts.to_string()).or_default() += 1;
        }
    }
    json(&histogram)
}

fn mean_duration_entropy(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = duration_entropy_series(ctx);
    let values: Vec<f64> = series.raw().copied().collect();
    rounded(mean(&values), 3)
}

fn note_count_mean(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    rounded(mean(&event_counts(ctx)), 2)
}

fn note_count_variance(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    rounded(population_variance(&event_counts(ctx)), 2)
}

fn duration_entropy_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    json(&duration_entropy_series(ctx))
}

/// Beat subdivision implied by a duration: 0.25 -> 4, 3.0 -> 3.
fn subdivision(duration: f64) -> u64 {
    let raw = if duration < 1.0 {
        (1.0 / duration + 1e-9).floor()
    } else {
        (duration + 1e-9).floor()
    };
    raw.max(1.0) as u64
}

/// Distinct subdivisions per measure; their LCM when two or more coexist.
fn polyrhythm_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = windowed_stat(ctx.measures(), |events| {
        let mut subdivisions: Vec<u64> = bucket_durations(events)
            .into_iter()
            .filter(|d| *d > 0.0)
            .map(subdivision)
            .collect();
        subdivisions.sort_unstable();
        subdivisions.dedup();

        let common = if subdivisions.len() >= 2 {
            lcm(&subdivisions)
        } else {
            None
        };
        json!({ "subdivisions": subdivisions, "lcm": common })
    });
    json(&series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::InstrumentFilter;
    use pretty_assertions::assert_eq;
    use score_model::{Note, Part, PerformanceTrack, Score};

    #[test]
    fn subdivisions() {
        assert_eq!(subdivision(0.25), 4);
        assert_eq!(subdivision(1.0 / 3.0), 3);
        assert_eq!(subdivision(0.5), 2);
        assert_eq!(subdivision(1.0), 1);
        assert_eq!(subdivision(3.0), 3);
    }

    #[test]
    fn triplets_against_eighths() {
        let third = 1.0 / 3.0;
        let mut notes = vec![Note::new(60, 0.0, 0.5), Note::new(62, 0.5, 0.5)];
        notes.extend((0..3).map(|i| Note::new(67, 1.0 + i as f64 * third, third)));
        notes.push(Note::new(72, 2.0, 2.0));
        let score = Score::new(vec![Part::new("Piano", notes)]).unwrap();
        let track = PerformanceTrack::from_score(&score);
        let ctx = AnalysisContext::filtered(&score, &track, &InstrumentFilter::all());

        let poly = polyrhythm_per_measure(&ctx).unwrap();
        assert_eq!(poly[0]["value"], json!({"subdivisions": [2, 3], "lcm": 6}));
        assert_eq!(note_count_mean(&ctx).unwrap(), json!(6.0));
        assert_eq!(note_count_variance(&ctx).unwrap(), json!(0.0));
    }

    #[test]
    fn meter_histogram_reads_the_grid() {
        let score = Score::new(vec![Part::new("Piano", vec![Note::new(60, 0.0, 12.0)])]).unwrap();
        let track = PerformanceTrack::from_score(&score);
        let ctx = AnalysisContext::filtered(&score, &track, &InstrumentFilter::all());
        assert_eq!(time_signature_histogram(&ctx).unwrap(), json!({"4/4": 3}));
        assert_eq!(duration_entropy(&ctx).unwrap(), json!(0.0));
    }
}
