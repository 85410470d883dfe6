//! Instrumentation: which parts play, how much, and in what families.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use score_model::InstrumentFamily;

use super::{json, MetricDef};
use crate::context::AnalysisContext;
use crate::error::MetricError;
use crate::orchestrator::Granularity;
use crate::stats::{round_to, windowed_stat};
use crate::value::MetricResult;

pub static GLOBAL: &[MetricDef] = &[
    MetricDef { name: "detected_instruments", compute: detected_instruments },
    MetricDef { name: "total_note_count", compute: total_note_count },
    MetricDef { name: "detected_parts", compute: detected_parts },
];

pub static AGGREGATE: &[MetricDef] = &[
    MetricDef { name: "participation_percentage", compute: participation_percentage },
    MetricDef { name: "instrument_families", compute: instrument_families },
];

pub static PER_MEASURE: &[MetricDef] = &[
    MetricDef { name: "part_activity", compute: part_activity },
    MetricDef { name: "dynamic_balance", compute: dynamic_balance },
    MetricDef { name: "active_instruments", compute: active_instruments },
];

/// Run this category's metrics at one granularity.
pub fn compute(ctx: &AnalysisContext<'_>, granularity: Granularity) -> MetricResult {
    super::run(super::select(granularity, GLOBAL, AGGREGATE, PER_MEASURE), ctx)
}

fn detected_instruments(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    json(&ctx.view().names())
}

fn total_note_count(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let total: usize = ctx.view().parts().iter().map(|p| p.note_count()).sum();
    Ok(json!(total))
}

fn detected_parts(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let parts: Vec<Value> = ctx
        .view()
        .parts()
        .iter()
        .map(|p| {
            let family = match p.program {
                Some(program) => InstrumentFamily::classify(program, p.is_percussion),
                None if p.is_percussion => InstrumentFamily::Percussion,
                None => InstrumentFamily::Other,
            };
            json!({
                "name": p.name.trim(),
                "note_count": p.note_count(),
                "family": family,
            })
        })
        .collect();
    Ok(Value::Array(parts))
}

/// Share of all sounding notes per instrument name, in percent.
fn participation_percentage(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for part in ctx.view().parts() {
        *counts.entry(part.name.trim().to_string()).or_default() += part.note_count();
    }
    let total: usize = counts.values().sum();
    if total == 0 {
        return Ok(json!({}));
    }

    let shares: BTreeMap<String, f64> = counts
        .into_iter()
        .map(|(name, count)| (name, round_to(count as f64 * 100.0 / total as f64, 2)))
        .collect();
    json(&shares)
}

/// Performance instruments grouped by family; every family is present.
fn instrument_families(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let mut families: BTreeMap<&'static str, Vec<String>> = InstrumentFamily::ALL
        .iter()
        .map(|f| (f.as_str(), Vec::new()))
        .collect();

    for instrument in ctx.performance().instruments() {
        let family = InstrumentFamily::classify(instrument.program, instrument.is_drum);
        let members = families.entry(family.as_str()).or_default();
        let name = instrument.name.trim().to_string();
        if !members.contains(&name) {
            members.push(name);
        }
    }
    json(&families)
}

/// Sounding notes per part name in each measure, zero-filled.
fn part_activity(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let view = ctx.view();
    let names = view.names();
    let series = windowed_stat(ctx.measures(), |events| {
        let mut activity: BTreeMap<&str, usize> =
            names.iter().map(|n| (n.as_str(), 0)).collect();
        for event in events {
            *activity.entry(view.part_name(event.part())).or_default() += event.pitches().len();
        }
        activity
    });
    json(&series)
}

/// Mean velocity of each instrument heard in each performance window.
fn dynamic_balance(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = windowed_stat(ctx.windows(), |notes| {
        let mut sums: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
        for played in notes {
            let entry = sums.entry(played.instrument.name.trim()).or_default();
            entry.0 += played.note.velocity as u32;
            entry.1 += 1;
        }
        sums.into_iter()
            .map(|(name, (sum, n))| (name, round_to(sum as f64 / n as f64, 2)))
            .collect::<BTreeMap<&str, f64>>()
    });
    json(&series)
}

fn active_instruments(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = windowed_stat(ctx.windows(), |notes| {
        let mut names: Vec<&str> = notes.iter().map(|n| n.instrument.name.trim()).collect();
        names.sort_unstable();
        names.dedup();
        json!({ "count": names.len(), "instruments": names })
    });
    json(&series)
}
