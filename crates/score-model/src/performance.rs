use serde::{Deserialize, Serialize};

use crate::score::Score;

/// A performed note with absolute timing in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceNote {
    pub pitch: u8,
    pub velocity: u8,
    pub start: f64,
    pub end: f64,
}

/// One instrument's performed notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceInstrument {
    pub name: String,
    pub program: u8,
    pub is_drum: bool,
    /// Sorted by start time
    pub notes: Vec<PerformanceNote>,
}

impl PerformanceInstrument {
    pub fn new(name: impl Into<String>, program: u8, mut notes: Vec<PerformanceNote>) -> Self {
        notes.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self {
            name: name.into(),
            program,
            is_drum: false,
            notes,
        }
    }

    /// Start time of the first note, if any.
    pub fn first_entry(&self) -> Option<f64> {
        self.notes.first().map(|n| n.start)
    }
}

/// Velocity- and time-bearing view of a work, parallel to the symbolic score.
///
/// Not guaranteed to align 1:1 with the score's parts or measures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceTrack {
    instruments: Vec<PerformanceInstrument>,
    tempo_bpm: f64,
}

impl PerformanceTrack {
    pub fn new(instruments: Vec<PerformanceInstrument>, tempo_bpm: f64) -> Self {
        Self {
            instruments,
            tempo_bpm,
        }
    }

    /// Render a symbolic score at its tempo estimate, one instrument per part.
    ///
    /// Used when no independent performance data exists for a work.
    pub fn from_score(score: &Score) -> Self {
        let seconds_per_beat = 60.0 / score.tempo_estimate();

        let instruments = score
            .parts()
            .iter()
            .map(|part| {
                let notes = part
                    .events()
                    .iter()
                    .flat_map(|event| {
                        let velocity = event.velocity().unwrap_or(0);
                        let start = event.onset() * seconds_per_beat;
                        let end = event.end() * seconds_per_beat;
                        event.pitches().iter().map(move |&pitch| PerformanceNote {
                            pitch,
                            velocity,
                            start,
                            end,
                        })
                    })
                    .collect();

                let mut instrument =
                    PerformanceInstrument::new(part.name.clone(), part.program.unwrap_or(0), notes);
                instrument.is_drum = part.is_percussion;
                instrument
            })
            .collect();

        Self::new(instruments, score.tempo_estimate())
    }

    pub fn instruments(&self) -> &[PerformanceInstrument] {
        &self.instruments
    }

    pub fn tempo_estimate(&self) -> f64 {
        self.tempo_bpm
    }

    /// End time of the last sounding note, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.instruments
            .iter()
            .flat_map(|i| i.notes.iter().map(|n| n.end))
            .fold(0.0, f64::max)
    }
}
