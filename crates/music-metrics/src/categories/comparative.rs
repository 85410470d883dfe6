//! Performance-side comparisons: tempo, duration and dynamics.

use serde_json::Value;

use super::{json, rounded, MetricDef};
use crate::context::AnalysisContext;
use crate::error::MetricError;
use crate::orchestrator::Granularity;
use crate::segment::PerformedNote;
use crate::stats::{mean, round_to, windowed_stat};
use crate::value::MetricResult;

pub static GLOBAL: &[MetricDef] = &[
    MetricDef { name: "tempo_estimate", compute: tempo_estimate },
    MetricDef { name: "total_duration", compute: total_duration },
];

pub static AGGREGATE: &[MetricDef] = &[
    MetricDef { name: "mean_dynamic_range", compute: mean_dynamic_range },
];

pub static PER_MEASURE: &[MetricDef] = &[
    MetricDef { name: "dynamic_range_per_measure", compute: dynamic_range_per_measure },
    MetricDef { name: "energy_per_measure", compute: energy_per_measure },
];

/// Run this category's metrics at one granularity.
pub fn compute(ctx: &AnalysisContext<'_>, granularity: Granularity) -> MetricResult {
    super::run(super::select(granularity, GLOBAL, AGGREGATE, PER_MEASURE), ctx)
}

/// Loudest minus softest velocity, `None` for a silent window.
fn dynamic_range(notes: &[PerformedNote<'_>]) -> Option<u8> {
    let velocities = notes.iter().map(|n| n.note.velocity);
    let high = velocities.clone().max()?;
    let low = velocities.min()?;
    Some(high - low)
}

fn tempo_estimate(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    rounded(ctx.performance().track().tempo_estimate(), 2)
}

/// Seconds until the last filtered note ends.
fn total_duration(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    rounded(ctx.performance().total_duration(), 3)
}

/// Mean range over every window, silent ones counting as zero.
fn mean_dynamic_range(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let ranges: Vec<f64> = ctx
        .windows()
        .iter()
        .map(|w| f64::from(dynamic_range(&w.items).unwrap_or(0)))
        .collect();
    rounded(mean(&ranges), 2)
}

fn dynamic_range_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = windowed_stat(ctx.windows(), |notes| dynamic_range(notes).unwrap_or(0));
    json(&series)
}

/// Mean velocity per window; silence is zero energy.
fn energy_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = windowed_stat(ctx.windows(), |notes| {
        let velocities: Vec<f64> = notes.iter().map(|n| n.note.velocity as f64).collect();
        round_to(mean(&velocities), 2)
    });
    json(&series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::InstrumentFilter;
    use pretty_assertions::assert_eq;
    use score_model::{
        Note, Part, PerformanceInstrument, PerformanceNote, PerformanceTrack, Score,
    };
    use serde_json::json;

    fn performed(velocities: &[(f64, u8)]) -> PerformanceInstrument {
        let notes = velocities
            .iter()
            .map(|&(start, velocity)| PerformanceNote {
                pitch: 60,
                velocity,
                start,
                end: start + 0.5,
            })
            .collect();
        PerformanceInstrument::new("Piano", 0, notes)
    }

    fn two_measures() -> Score {
        Score::new(vec![Part::new("Piano", vec![Note::new(60, 0.0, 8.0)])]).unwrap()
    }

    #[test]
    fn dynamics_per_window() {
        let score = two_measures();
        let track = PerformanceTrack::new(
            vec![performed(&[(0.0, 40), (1.0, 100), (3.0, 80), (3.5, 80)])],
            96.0,
        );
        let ctx = AnalysisContext::filtered(&score, &track, &InstrumentFilter::all());

        assert_eq!(tempo_estimate(&ctx).unwrap(), json!(96.0));
        assert_eq!(total_duration(&ctx).unwrap(), json!(4.0));
        assert_eq!(
            dynamic_range_per_measure(&ctx).unwrap(),
            json!({
                "alignment": "proportional",
                "measures": [{"measure": 1, "value": 60}, {"measure": 2, "value": 0}],
            })
        );
        assert_eq!(mean_dynamic_range(&ctx).unwrap(), json!(30.0));
        assert_eq!(
            energy_per_measure(&ctx).unwrap()["measures"][0]["value"],
            json!(70.0)
        );
    }

    #[test]
    fn silent_windows_pull_the_mean_down() {
        let score = Score::new(vec![Part::new("Piano", vec![Note::new(60, 0.0, 12.0)])]).unwrap();
        let track = PerformanceTrack::new(
            vec![performed(&[(0.0, 40), (0.5, 100), (5.5, 70)])],
            120.0,
        );
        let ctx = AnalysisContext::filtered(&score, &track, &InstrumentFilter::all());

        let ranges: Vec<i64> = dynamic_range_per_measure(&ctx).unwrap()["measures"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["value"].as_i64().unwrap())
            .collect();
        assert_eq!(ranges, vec![60, 0, 0]);
        assert_eq!(mean_dynamic_range(&ctx).unwrap(), json!(20.0));
    }

    #[test]
    fn silent_windows_are_zero() {
        let score = two_measures();
        let track = PerformanceTrack::new(vec![performed(&[(0.0, 50), (3.0, 70)])], 120.0);
        let ctx = AnalysisContext::filtered(&score, &track, &InstrumentFilter::new(["Organ"]));

        assert_eq!(total_duration(&ctx).unwrap(), json!(0.0));
        assert_eq!(mean_dynamic_range(&ctx).unwrap(), json!(0.0));
        assert_eq!(
            energy_per_measure(&ctx).unwrap()["measures"],
            json!([{"measure": 1, "value": 0.0}, {"measure": 2, "value": 0.0}])
        );
    }
}
