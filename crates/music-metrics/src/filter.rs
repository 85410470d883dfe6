//! Instrument allow-lists and the read-only views they produce.

use serde::{Deserialize, Serialize};

use score_model::{
    Measure, MusicalEvent, Part, PerformanceInstrument, PerformanceTrack, Score,
};

/// Case-insensitive allow-list of part names. Empty means "every part".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentFilter {
    names: Vec<String>,
}

impl InstrumentFilter {
    /// A filter that keeps everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    /// Names as given, for reporting.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_unrestricted(&self) -> bool {
        self.names.is_empty()
    }

    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        self.is_unrestricted() || self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Stable key for caching: lowercased, sorted, deduplicated.
    pub fn cache_key(&self) -> String {
        let mut names: Vec<String> = self.names.iter().map(|n| n.to_lowercase()).collect();
        names.sort();
        names.dedup();
        names.join(",")
    }

    pub fn view<'a>(&self, score: &'a Score) -> ScoreView<'a> {
        let parts = score
            .parts()
            .iter()
            .filter(|p| self.matches(&p.name))
            .collect();
        ScoreView { score, parts }
    }

    pub fn performance_view<'a>(&self, track: &'a PerformanceTrack) -> PerformanceView<'a> {
        let instruments = track
            .instruments()
            .iter()
            .filter(|i| self.matches(&i.name))
            .collect();
        PerformanceView { track, instruments }
    }
}

/// The parts of a score that passed a filter. Never mutates the score.
#[derive(Debug, Clone)]
pub struct ScoreView<'a> {
    score: &'a Score,
    parts: Vec<&'a Part>,
}

impl<'a> ScoreView<'a> {
    pub fn score(&self) -> &'a Score {
        self.score
    }

    pub fn parts(&self) -> &[&'a Part] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|p| p.events().is_empty())
    }

    /// The canonical measure grid of the underlying score.
    pub fn grid(&self) -> &'a [Measure] {
        self.score.measures()
    }

    /// Every event of every view part, part by part.
    pub fn events(&self) -> impl Iterator<Item = &'a MusicalEvent> + '_ {
        self.parts.iter().flat_map(|p| p.events().iter())
    }

    pub fn pitched_events(&self) -> impl Iterator<Item = &'a MusicalEvent> + '_ {
        self.events().filter(|e| e.is_pitched())
    }

    /// Flattened pitches in part order (chords contribute every pitch).
    pub fn pitches(&self) -> Vec<u8> {
        self.parts.iter().flat_map(|p| p.pitches()).collect()
    }

    /// Onsets of pitched events, sorted in time.
    pub fn sorted_onsets(&self) -> Vec<f64> {
        let mut onsets: Vec<f64> = self.pitched_events().map(MusicalEvent::onset).collect();
        onsets.sort_by(f64::total_cmp);
        onsets
    }

    /// Latest event end among the view's parts, in beats.
    pub fn total_duration(&self) -> f64 {
        self.parts.iter().map(|p| p.end()).fold(0.0, f64::max)
    }

    /// Display names of the view's parts, deduplicated in order.
    pub fn names(&self) -> Vec<String> {
        unique_names(self.parts.iter().copied())
    }

    /// Display name of the score part an event belongs to.
    pub fn part_name(&self, index: usize) -> &'a str {
        self.score.part(index).map_or(UNNAMED, |p| display_name(&p.name))
    }
}

/// The performance instruments that passed a filter.
#[derive(Debug, Clone)]
pub struct PerformanceView<'a> {
    track: &'a PerformanceTrack,
    instruments: Vec<&'a PerformanceInstrument>,
}

impl<'a> PerformanceView<'a> {
    pub fn track(&self) -> &'a PerformanceTrack {
        self.track
    }

    pub fn instruments(&self) -> &[&'a PerformanceInstrument] {
        &self.instruments
    }

    /// Duration of the filtered instruments, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.instruments
            .iter()
            .flat_map(|i| i.notes.iter().map(|n| n.end))
            .fold(0.0, f64::max)
    }
}

const UNNAMED: &str = "Unnamed part";

fn display_name(name: &str) -> &str {
    match name.trim() {
        "" => UNNAMED,
        trimmed => trimmed,
    }
}

fn unique_names<'a>(parts: impl Iterator<Item = &'a Part>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for part in parts {
        let name = display_name(&part.name);
        if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    }
    names
}

/// Part names in score order, trimmed and deduplicated without regard to
/// case. The first spelling wins.
pub fn part_names(score: &Score) -> Vec<String> {
    unique_names(score.parts().iter())
}
