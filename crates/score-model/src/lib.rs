//! In-memory model of a symbolic musical work.
//!
//! A [`Score`] is an ordered set of [`Part`]s whose events are closed
//! [`MusicalEvent`] variants (note, chord or rest). A [`PerformanceTrack`] is
//! the parallel velocity/time representation of the same work, sourced
//! independently and not guaranteed to align with the symbolic measures.
//!
//! The [`midi`] module is the decoding collaborator that turns Standard MIDI
//! File bytes into both representations; [`writer`] goes the other way for a
//! symbolic score.

pub mod event;
pub mod gm;
pub mod midi;
pub mod performance;
pub mod score;
pub mod writer;

pub use event::{Chord, MusicalEvent, Note, Rest};
pub use gm::InstrumentFamily;
pub use midi::{decode, DecodedWork};
pub use performance::{PerformanceInstrument, PerformanceNote, PerformanceTrack};
pub use score::{Measure, Part, Score, TimeSignature};
pub use writer::encode;

/// Errors from building or decoding a score.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("input contains no data")]
    EmptyInput,

    #[error("part '{part}' has a non-contiguous measure grid at measure {index}")]
    NonContiguousMeasures { part: String, index: usize },

    #[error("reference part {0} does not exist")]
    InvalidReference(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
