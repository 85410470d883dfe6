//! Metric categories.
//!
//! Each category module publishes three static tables, one per granularity.
//! A metric is a plain function from the analysis context to JSON; the
//! orchestrator runs every entry through the fault-isolated invoker.

use serde::Serialize;
use serde_json::Value;

use score_model::MusicalEvent;

use crate::context::AnalysisContext;
use crate::error::MetricError;
use crate::invoke::invoke;
use crate::orchestrator::{Category, Granularity};
use crate::stats::round_to;
use crate::value::MetricResult;

pub mod comparative;
pub mod differentiating;
pub mod formal;
pub mod harmonic;
pub mod instrumental;
pub mod interaction;
pub mod melodic;
pub mod rhythmic;
pub mod textural;

pub type MetricFn = fn(&AnalysisContext<'_>) -> Result<Value, MetricError>;

/// One named metric.
#[derive(Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub compute: MetricFn,
}

impl std::fmt::Debug for MetricDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricDef").field("name", &self.name).finish()
    }
}

/// Pick one of a category's three tables.
pub(crate) fn select(
    granularity: Granularity,
    global: &'static [MetricDef],
    aggregate: &'static [MetricDef],
    per_measure: &'static [MetricDef],
) -> &'static [MetricDef] {
    match granularity {
        Granularity::Global => global,
        Granularity::Aggregate => aggregate,
        Granularity::PerMeasure => per_measure,
    }
}

/// The metric table for one `(category, granularity)` pair.
pub fn table(category: Category, granularity: Granularity) -> &'static [MetricDef] {
    let g = granularity;
    match category {
        Category::Instrumental => {
            select(g, instrumental::GLOBAL, instrumental::AGGREGATE, instrumental::PER_MEASURE)
        }
        Category::Melodic => select(g, melodic::GLOBAL, melodic::AGGREGATE, melodic::PER_MEASURE),
        Category::Rhythmic => select(g, rhythmic::GLOBAL, rhythmic::AGGREGATE, rhythmic::PER_MEASURE),
        Category::Harmonic => select(g, harmonic::GLOBAL, harmonic::AGGREGATE, harmonic::PER_MEASURE),
        Category::Textural => select(g, textural::GLOBAL, textural::AGGREGATE, textural::PER_MEASURE),
        Category::Formal => select(g, formal::GLOBAL, formal::AGGREGATE, formal::PER_MEASURE),
        Category::Interaction => {
            select(g, interaction::GLOBAL, interaction::AGGREGATE, interaction::PER_MEASURE)
        }
        Category::Comparative => {
            select(g, comparative::GLOBAL, comparative::AGGREGATE, comparative::PER_MEASURE)
        }
        Category::Differentiating => select(
            g,
            differentiating::GLOBAL,
            differentiating::AGGREGATE,
            differentiating::PER_MEASURE,
        ),
    }
}

/// Run every metric of a table, isolating failures.
pub fn run(metrics: &[MetricDef], ctx: &AnalysisContext<'_>) -> MetricResult {
    let mut result = MetricResult::new();
    for metric in metrics {
        let value = invoke(metric.name, || (metric.compute)(ctx));
        result.insert(metric.name, value);
    }
    result
}

/// A finite number as JSON.
pub(crate) fn number(value: f64) -> Result<Value, MetricError> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or(MetricError::NonFinite(value))
}

/// Round, then encode.
pub(crate) fn rounded(value: f64, decimals: i32) -> Result<Value, MetricError> {
    number(round_to(value, decimals))
}

pub(crate) fn json<T: Serialize>(value: &T) -> Result<Value, MetricError> {
    Ok(serde_json::to_value(value)?)
}

/// Flattened pitches of a bucket's events.
pub(crate) fn bucket_pitches(events: &[&MusicalEvent]) -> Vec<u8> {
    events.iter().flat_map(|e| e.pitches().iter().copied()).collect()
}

/// Durations of a bucket's pitched events.
pub(crate) fn bucket_durations(events: &[&MusicalEvent]) -> Vec<f64> {
    events
        .iter()
        .filter(|e| e.is_pitched())
        .map(|e| e.duration())
        .collect()
}

pub(crate) fn as_samples(pitches: &[u8]) -> Vec<f64> {
    pitches.iter().map(|&p| p as f64).collect()
}
