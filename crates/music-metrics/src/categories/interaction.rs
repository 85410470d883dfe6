//! How parts sound together: co-occurrence graph, entries and onset spread.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::{json, rounded, MetricDef};
use crate::context::AnalysisContext;
use crate::error::MetricError;
use crate::orchestrator::Granularity;
use crate::stats::{interaction_graph, round_to, std_dev, windowed_stat, InteractionGraph};
use crate::value::MetricResult;

pub static GLOBAL: &[MetricDef] = &[
    MetricDef { name: "interaction_entropy", compute: interaction_entropy },
    MetricDef { name: "interaction_network", compute: interaction_network },
];

pub static AGGREGATE: &[MetricDef] = &[
    MetricDef { name: "entry_synchrony", compute: entry_synchrony },
    MetricDef { name: "onset_dispersion", compute: onset_dispersion },
];

pub static PER_MEASURE: &[MetricDef] = &[
    MetricDef { name: "synchrony_per_measure", compute: synchrony_per_measure },
    MetricDef { name: "dispersion_per_measure", compute: dispersion_per_measure },
];

/// Run this category's metrics at one granularity.
pub fn compute(ctx: &AnalysisContext<'_>, granularity: Granularity) -> MetricResult {
    super::run(super::select(granularity, GLOBAL, AGGREGATE, PER_MEASURE), ctx)
}

pub(crate) fn graph(ctx: &AnalysisContext<'_>) -> InteractionGraph {
    let view = ctx.view();
    interaction_graph(view.parts().iter().map(|p| (p.name.trim(), p.onsets())))
}

fn interaction_entropy(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    rounded(graph(ctx).entropy(), 3)
}

fn interaction_network(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let graph = graph(ctx);
    Ok(json!({
        "nodes": graph.nodes,
        "edges": graph.named_edges(),
    }))
}

/// Spread of the instruments' first entries in the performance, in seconds.
fn entry_synchrony(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let entries: Vec<f64> = ctx
        .performance()
        .instruments()
        .iter()
        .filter_map(|i| i.first_entry())
        .collect();
    if entries.len() < 2 {
        return rounded(0.0, 3);
    }
    rounded(std_dev(&entries), 3)
}

fn onset_dispersion(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    rounded(std_dev(&ctx.view().sorted_onsets()), 3)
}

/// Spread of each part's first onset inside the measure.
fn synchrony_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = windowed_stat(ctx.measures(), |events| {
        let mut first: BTreeMap<usize, f64> = BTreeMap::new();
        for event in events.iter().filter(|e| e.is_pitched()) {
            first
                .entry(event.part())
                .and_modify(|onset| *onset = onset.min(event.onset()))
                .or_insert(event.onset());
        }
        let entries: Vec<f64> = first.into_values().collect();
        if entries.len() < 2 {
            0.0
        } else {
            round_to(std_dev(&entries), 3)
        }
    });
    json(&series)
}

fn dispersion_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = windowed_stat(ctx.measures(), |events| {
        let onsets: Vec<f64> = events
            .iter()
            .filter(|e| e.is_pitched())
            .map(|e| e.onset())
            .collect();
        round_to(std_dev(&onsets), 3)
    });
    json(&series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::InstrumentFilter;
    use pretty_assertions::assert_eq;
    use score_model::{Note, Part, PerformanceTrack, Score};

    fn trio() -> Score {
        Score::new(vec![
            Part::new("Violin", vec![Note::new(76, 0.0, 1.0), Note::new(77, 1.0, 1.0)]),
            Part::new("Viola", vec![Note::new(67, 0.0, 1.0), Note::new(69, 2.0, 1.0)]),
            Part::new("Cello", vec![Note::new(48, 1.0, 2.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn network_counts_shared_onsets() {
        let score = trio();
        let track = PerformanceTrack::from_score(&score);
        let ctx = AnalysisContext::filtered(&score, &track, &InstrumentFilter::all());

        let network = interaction_network(&ctx).unwrap();
        assert_eq!(network["nodes"], json!(["Violin", "Viola", "Cello"]));
        assert_eq!(network["edges"], json!({"Cello-Violin": 1, "Viola-Violin": 1}));
        assert_eq!(interaction_entropy(&ctx).unwrap(), json!(1.0));
    }

    #[test]
    fn synchrony_needs_two_parts() {
        let score = trio();
        let track = PerformanceTrack::from_score(&score);
        let ctx = AnalysisContext::filtered(&score, &track, &InstrumentFilter::new(["cello"]));
        assert_eq!(entry_synchrony(&ctx).unwrap(), json!(0.0));
        assert_eq!(
            synchrony_per_measure(&ctx).unwrap(),
            json!([{"measure": 1, "value": 0.0}])
        );
    }

    #[test]
    fn entries_in_seconds() {
        let score = trio();
        let track = PerformanceTrack::from_score(&score);
        let ctx = AnalysisContext::filtered(&score, &track, &InstrumentFilter::all());
        // First entries 0.0, 0.0, 0.5 s at 120 BPM
        assert_eq!(entry_synchrony(&ctx).unwrap(), json!(0.236));
    }
}
