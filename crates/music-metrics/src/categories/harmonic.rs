//! Harmonic descriptors over chordified sonorities.
//!
//! Chord labels are template guesses; the harmonic entropy uses only the
//! first letter of each label as an ordinal class.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use score_model::MusicalEvent;

use super::{json, rounded, MetricDef};
use crate::context::AnalysisContext;
use crate::error::MetricError;
use crate::harmony::Sonority;
use crate::orchestrator::Granularity;
use crate::stats::{binned_entropy, frequencies, mean, round_to, std_dev, windowed_stat, Series};
use crate::value::MetricResult;

pub const LETTER_BINS: usize = 8;

pub static GLOBAL: &[MetricDef] = &[
    MetricDef { name: "harmonic_entropy", compute: harmonic_entropy },
    MetricDef { name: "chord_progressions", compute: chord_progressions },
];

pub static AGGREGATE: &[MetricDef] = &[
    MetricDef { name: "chord_density", compute: chord_density },
    MetricDef { name: "statistical_novelty", compute: statistical_novelty },
];

pub static PER_MEASURE: &[MetricDef] = &[
    MetricDef { name: "chord_density_per_measure", compute: chord_density_per_measure },
    MetricDef { name: "harmonic_entropy_per_measure", compute: harmonic_entropy_per_measure },
    MetricDef { name: "harmonic_rhythm_per_measure", compute: harmonic_rhythm_per_measure },
    MetricDef { name: "tension_curve", compute: tension_curve },
];

/// Run this category's metrics at one granularity.
pub fn compute(ctx: &AnalysisContext<'_>, granularity: Granularity) -> MetricResult {
    super::run(super::select(granularity, GLOBAL, AGGREGATE, PER_MEASURE), ctx)
}

fn letter_entropy<'s>(sonorities: impl IntoIterator<Item = &'s Sonority>) -> f64 {
    let letters: Vec<f64> = sonorities
        .into_iter()
        .map(|s| s.letter_class() as f64)
        .collect();
    binned_entropy(&letters, LETTER_BINS)
}

fn density<'s>(sonorities: impl IntoIterator<Item = &'s Sonority>) -> f64 {
    let sizes: Vec<f64> = sonorities
        .into_iter()
        .map(|s| s.pitches.len() as f64)
        .collect();
    mean(&sizes)
}

/// Distinct chord labels among sonorities of two or more pitches.
fn changes(sonorities: &[&Sonority]) -> usize {
    let mut symbols: Vec<String> = sonorities
        .iter()
        .filter(|s| s.is_chord())
        .map(|s| s.symbol())
        .collect();
    symbols.sort();
    symbols.dedup();
    symbols.len()
}

pub(crate) fn whole_harmonic_entropy(ctx: &AnalysisContext<'_>) -> f64 {
    letter_entropy(ctx.sonorities())
}

pub(crate) fn harmonic_entropy_series(ctx: &AnalysisContext<'_>) -> Series<f64> {
    windowed_stat(&ctx.sonorities_by_measure(), |s| letter_entropy(s.iter().copied()))
}

fn harmonic_entropy(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    rounded(whole_harmonic_entropy(ctx), 3)
}

/// Label counts plus transitions between successive distinct labels.
fn chord_progressions(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let symbols: Vec<String> = ctx.sonorities().iter().map(Sonority::symbol).collect();

    let mut collapsed = symbols.clone();
    collapsed.dedup();
    let mut transitions: BTreeMap<String, usize> = BTreeMap::new();
    for pair in collapsed.windows(2) {
        *transitions.entry(format!("{} -> {}", pair[0], pair[1])).or_default() += 1;
    }

    Ok(json!({
        "chords": frequencies(&symbols),
        "transitions": transitions,
    }))
}

fn chord_density(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    rounded(density(ctx.sonorities()), 2)
}

/// Share of sonorities whose label has not been seen before.
fn statistical_novelty(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let symbols: Vec<String> = ctx.sonorities().iter().map(Sonority::symbol).collect();
    if symbols.is_empty() {
        return rounded(0.0, 3);
    }
    let distinct = frequencies(&symbols).len();
    rounded(distinct as f64 / symbols.len() as f64, 3)
}

fn chord_density_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let series = windowed_stat(&ctx.sonorities_by_measure(), |s| {
        round_to(density(s.iter().copied()), 2)
    });
    json(&series)
}

fn harmonic_entropy_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    json(&harmonic_entropy_series(ctx))
}

fn harmonic_rhythm_per_measure(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    json(&windowed_stat(&ctx.sonorities_by_measure(), |s| changes(s)))
}

/// Spread of single-note pitches times harmonic rhythm, per measure. A
/// measure without single notes has no tension.
fn tension_curve(ctx: &AnalysisContext<'_>) -> Result<Value, MetricError> {
    let spread = windowed_stat(ctx.measures(), |events| {
        let pitches: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                MusicalEvent::Note(note) => Some(note.pitch as f64),
                _ => None,
            })
            .collect();
        if pitches.is_empty() {
            return 0.0;
        }
        std_dev(&pitches)
    });
    let rhythm = windowed_stat(&ctx.sonorities_by_measure(), |s| changes(s));
    let tension = spread.zip_with(rhythm, |sd, n| round_to(sd * n as f64, 2));
    json(&tension)
}
