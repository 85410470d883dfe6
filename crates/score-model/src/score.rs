use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event::MusicalEvent;
use crate::{Error, Result};

/// Tolerance used when checking that measure boundaries meet.
const BOUNDARY_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub const COMMON: TimeSignature = TimeSignature {
        numerator: 4,
        denominator: 4,
    };

    pub fn new(numerator: u8, denominator: u8) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Measure length in quarter-note beats.
    pub fn beats_per_measure(&self) -> f64 {
        if self.denominator == 0 {
            return 4.0;
        }
        self.numerator as f64 * 4.0 / self.denominator as f64
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// A contiguous time span of a part, indexed from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub index: usize,
    /// Start offset in beats
    pub start: f64,
    /// Length in beats
    pub duration: f64,
    pub time_signature: Option<TimeSignature>,
}

impl Measure {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn contains(&self, onset: f64) -> bool {
        onset >= self.start && onset < self.end()
    }

    /// Build a regular grid of `time_signature` measures covering `[0, total_beats)`.
    ///
    /// At least one measure is produced whenever `has_content` is set, so a
    /// work whose events all sit at beat 0 still has a bucket to land in.
    pub fn regular_grid(
        total_beats: f64,
        time_signature: TimeSignature,
        has_content: bool,
    ) -> Vec<Measure> {
        let length = time_signature.beats_per_measure();
        if length <= 0.0 {
            return Vec::new();
        }

        let mut count = (total_beats / length).ceil().max(0.0) as usize;
        if count == 0 && has_content {
            count = 1;
        }

        (0..count)
            .map(|i| Measure {
                index: i + 1,
                start: i as f64 * length,
                duration: length,
                time_signature: Some(time_signature),
            })
            .collect()
    }
}

/// One instrument's line: a display name, its events, and optionally its own measures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub name: String,
    /// General MIDI program, when known
    pub program: Option<u8>,
    pub is_percussion: bool,
    events: Vec<MusicalEvent>,
    measures: Vec<Measure>,
}

impl Part {
    /// Create a part; events are ordered by onset (stable for equal onsets).
    pub fn new(name: impl Into<String>, events: Vec<impl Into<MusicalEvent>>) -> Self {
        let mut events: Vec<MusicalEvent> = events.into_iter().map(Into::into).collect();
        events.sort_by(|a, b| a.onset().total_cmp(&b.onset()));

        Self {
            name: name.into(),
            program: None,
            is_percussion: false,
            events,
            measures: Vec::new(),
        }
    }

    pub fn with_measures(mut self, measures: Vec<Measure>) -> Self {
        self.measures = measures;
        self
    }

    pub fn with_program(mut self, program: u8) -> Self {
        self.program = Some(program);
        self
    }

    pub fn percussion(mut self) -> Self {
        self.is_percussion = true;
        self
    }

    pub fn events(&self) -> &[MusicalEvent] {
        &self.events
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    /// Every sounding pitch in event order, chords flattened.
    pub fn pitches(&self) -> Vec<u8> {
        self.events
            .iter()
            .flat_map(|e| e.pitches().iter().copied())
            .collect()
    }

    /// Count of sounding pitches (a three-note chord counts three).
    pub fn note_count(&self) -> usize {
        self.events.iter().map(|e| e.pitches().len()).sum()
    }

    /// Onsets of pitched events, in event order.
    pub fn onsets(&self) -> Vec<f64> {
        self.events
            .iter()
            .filter(|e| e.is_pitched())
            .map(|e| e.onset())
            .collect()
    }

    /// Latest event end, in beats.
    pub fn end(&self) -> f64 {
        self.events.iter().map(|e| e.end()).fold(0.0, f64::max)
    }

    fn validate_measures(&self) -> Result<()> {
        for (i, pair) in self.measures.windows(2).enumerate() {
            let gap = (pair[1].start - pair[0].end()).abs();
            if gap > BOUNDARY_EPSILON || pair[1].index <= pair[0].index {
                return Err(Error::NonContiguousMeasures {
                    part: self.name.clone(),
                    index: i + 2,
                });
            }
        }
        Ok(())
    }
}

/// An ordered collection of parts plus the canonical measure grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    parts: Vec<Part>,
    reference: usize,
    tempo_bpm: f64,
    grid: Vec<Measure>,
}

impl Score {
    pub const DEFAULT_TEMPO: f64 = 120.0;

    /// Assemble a score, numbering each event with its part index and
    /// validating every part's measure grid.
    pub fn new(mut parts: Vec<Part>) -> Result<Self> {
        for (index, part) in parts.iter_mut().enumerate() {
            part.validate_measures()?;
            for event in &mut part.events {
                event.set_part(index);
            }
        }

        let mut score = Self {
            parts,
            reference: 0,
            tempo_bpm: Self::DEFAULT_TEMPO,
            grid: Vec::new(),
        };
        score.rebuild_grid();
        Ok(score)
    }

    pub fn with_tempo(mut self, bpm: f64) -> Self {
        if bpm.is_finite() && bpm > 0.0 {
            self.tempo_bpm = bpm;
        }
        self
    }

    /// Choose which part supplies the measure grid.
    pub fn with_reference_part(mut self, index: usize) -> Result<Self> {
        if index >= self.parts.len() {
            return Err(Error::InvalidReference(index));
        }
        self.reference = index;
        self.rebuild_grid();
        Ok(self)
    }

    fn rebuild_grid(&mut self) {
        self.grid = match self.parts.get(self.reference) {
            Some(part) if !part.measures.is_empty() => part.measures.clone(),
            _ => {
                let has_content = self.parts.iter().any(|p| !p.events.is_empty());
                Measure::regular_grid(self.total_duration(), TimeSignature::COMMON, has_content)
            }
        };
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, index: usize) -> Option<&Part> {
        self.parts.get(index)
    }

    pub fn reference_part(&self) -> Option<&Part> {
        self.parts.get(self.reference)
    }

    pub fn reference_index(&self) -> usize {
        self.reference
    }

    /// The canonical measure grid used for all per-measure segmentation.
    pub fn measures(&self) -> &[Measure] {
        &self.grid
    }

    /// Highest event end across all parts, in beats.
    pub fn total_duration(&self) -> f64 {
        self.parts.iter().map(Part::end).fold(0.0, f64::max)
    }

    pub fn tempo_estimate(&self) -> f64 {
        self.tempo_bpm
    }

    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|p| p.events.is_empty())
    }
}
