use serde::{Deserialize, Serialize};

/// Velocity assigned to programmatically built notes.
pub const DEFAULT_VELOCITY: u8 = 64;

/// A single sounding pitch with beat timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    /// Onset in beats from the start of the work
    pub onset: f64,
    /// Duration in beats
    pub duration: f64,
    pub velocity: u8,
    /// Index of the owning part within its score
    pub part: usize,
}

impl Note {
    pub fn new(pitch: u8, onset: f64, duration: f64) -> Self {
        Self {
            pitch,
            onset,
            duration,
            velocity: DEFAULT_VELOCITY,
            part: 0,
        }
    }

    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity.min(127);
        self
    }
}

/// Several pitches struck together within one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    /// Sorted ascending, without duplicates
    pub pitches: Vec<u8>,
    pub onset: f64,
    pub duration: f64,
    pub velocity: u8,
    pub part: usize,
}

impl Chord {
    pub fn new(mut pitches: Vec<u8>, onset: f64, duration: f64) -> Self {
        pitches.sort_unstable();
        pitches.dedup();
        Self {
            pitches,
            onset,
            duration,
            velocity: DEFAULT_VELOCITY,
            part: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rest {
    pub onset: f64,
    pub duration: f64,
    pub part: usize,
}

impl Rest {
    pub fn new(onset: f64, duration: f64) -> Self {
        Self {
            onset,
            duration,
            part: 0,
        }
    }
}

/// Anything that occupies time in a part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MusicalEvent {
    Note(Note),
    Chord(Chord),
    Rest(Rest),
}

impl MusicalEvent {
    pub fn onset(&self) -> f64 {
        match self {
            Self::Note(n) => n.onset,
            Self::Chord(c) => c.onset,
            Self::Rest(r) => r.onset,
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            Self::Note(n) => n.duration,
            Self::Chord(c) => c.duration,
            Self::Rest(r) => r.duration,
        }
    }

    pub fn end(&self) -> f64 {
        self.onset() + self.duration()
    }

    pub fn part(&self) -> usize {
        match self {
            Self::Note(n) => n.part,
            Self::Chord(c) => c.part,
            Self::Rest(r) => r.part,
        }
    }

    pub(crate) fn set_part(&mut self, part: usize) {
        match self {
            Self::Note(n) => n.part = part,
            Self::Chord(c) => c.part = part,
            Self::Rest(r) => r.part = part,
        }
    }

    /// Flat pitch list: empty for a rest, one pitch for a note, every pitch of a chord.
    pub fn pitches(&self) -> &[u8] {
        match self {
            Self::Note(n) => std::slice::from_ref(&n.pitch),
            Self::Chord(c) => &c.pitches,
            Self::Rest(_) => &[],
        }
    }

    pub fn velocity(&self) -> Option<u8> {
        match self {
            Self::Note(n) => Some(n.velocity),
            Self::Chord(c) => Some(c.velocity),
            Self::Rest(_) => None,
        }
    }

    pub fn is_pitched(&self) -> bool {
        !self.pitches().is_empty()
    }

    pub fn is_chord(&self) -> bool {
        matches!(self, Self::Chord(_))
    }
}

impl From<Note> for MusicalEvent {
    fn from(note: Note) -> Self {
        Self::Note(note)
    }
}

impl From<Chord> for MusicalEvent {
    fn from(chord: Chord) -> Self {
        Self::Chord(chord)
    }
}

impl From<Rest> for MusicalEvent {
    fn from(rest: Rest) -> Self {
        Self::Rest(rest)
    }
}
