//! Coarse harmonic labelling: template chord naming over sonorities.
//!
//! Sonorities come from "chordifying" a set of events: every onset/offset
//! breakpoint yields the set of pitches sounding until the next breakpoint.
//! Labels are a heuristic, not functional harmony.

use serde::{Deserialize, Serialize};

use score_model::MusicalEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Suspended4,
    Suspended2,
    Dominant7,
    Major7,
    Minor7,
    MinorMajor7,
    Diminished7,
    HalfDiminished7,
    Major6,
    Minor6,
    Add9,
    Power,
}

impl ChordQuality {
    /// Suffix for chord symbol display
    pub fn suffix(&self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Diminished => "dim",
            ChordQuality::Augmented => "aug",
            ChordQuality::Suspended4 => "sus4",
            ChordQuality::Suspended2 => "sus2",
            ChordQuality::Dominant7 => "7",
            ChordQuality::Major7 => "maj7",
            ChordQuality::Minor7 => "m7",
            ChordQuality::MinorMajor7 => "m(maj7)",
            ChordQuality::Diminished7 => "dim7",
            ChordQuality::HalfDiminished7 => "m7b5",
            ChordQuality::Major6 => "6",
            ChordQuality::Minor6 => "m6",
            ChordQuality::Add9 => "add9",
            ChordQuality::Power => "5",
        }
    }
}

/// Interval set from the root as a bitmask over 12 pitch classes.
struct ChordTemplate {
    quality: ChordQuality,
    intervals: u16,
    size: usize,
}

impl ChordTemplate {
    const fn new(quality: ChordQuality, intervals: &[u8]) -> Self {
        let mut mask = 0u16;
        let mut i = 0;
        while i < intervals.len() {
            mask |= 1 << intervals[i];
            i += 1;
        }
        Self {
            quality,
            intervals: mask,
            size: intervals.len(),
        }
    }
}

/// Larger templates first so they win ties.
static TEMPLATES: &[ChordTemplate] = &[
    ChordTemplate::new(ChordQuality::Dominant7, &[0, 4, 7, 10]),
    ChordTemplate::new(ChordQuality::Major7, &[0, 4, 7, 11]),
    ChordTemplate::new(ChordQuality::Minor7, &[0, 3, 7, 10]),
    ChordTemplate::new(ChordQuality::MinorMajor7, &[0, 3, 7, 11]),
    ChordTemplate::new(ChordQuality::Diminished7, &[0, 3, 6, 9]),
    ChordTemplate::new(ChordQuality::HalfDiminished7, &[0, 3, 6, 10]),
    ChordTemplate::new(ChordQuality::Major6, &[0, 4, 7, 9]),
    ChordTemplate::new(ChordQuality::Minor6, &[0, 3, 7, 9]),
    ChordTemplate::new(ChordQuality::Add9, &[0, 2, 4, 7]),
    ChordTemplate::new(ChordQuality::Major, &[0, 4, 7]),
    ChordTemplate::new(ChordQuality::Minor, &[0, 3, 7]),
    ChordTemplate::new(ChordQuality::Diminished, &[0, 3, 6]),
    ChordTemplate::new(ChordQuality::Augmented, &[0, 4, 8]),
    ChordTemplate::new(ChordQuality::Suspended4, &[0, 5, 7]),
    ChordTemplate::new(ChordQuality::Suspended2, &[0, 2, 7]),
    ChordTemplate::new(ChordQuality::Power, &[0, 7]),
];

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

pub fn note_name(pitch_class: u8) -> &'static str {
    NOTE_NAMES[(pitch_class % 12) as usize]
}

/// Scientific pitch name, e.g. 60 -> `C4`.
pub fn pitch_name(pitch: u8) -> String {
    format!("{}{}", note_name(pitch), pitch as i16 / 12 - 1)
}

/// Result of matching pitch classes against the templates.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordMatch {
    pub root: u8,
    pub quality: ChordQuality,
    pub confidence: f64,
}

impl ChordMatch {
    pub fn symbol(&self) -> String {
        format!("{}{}", note_name(self.root), self.quality.suffix())
    }
}

fn interval_mask(pitch_classes: &[u8], root: u8) -> u16 {
    pitch_classes
        .iter()
        .fold(0u16, |mask, &pc| mask | 1 << ((pc % 12 + 12 - root) % 12))
}

/// Best template match over all 12 roots, or `None` below the confidence floor.
///
/// `bass` biases root selection when ambiguous.
pub fn match_chord(pitch_classes: &[u8], bass: Option<u8>) -> Option<ChordMatch> {
    if pitch_classes.len() < 2 {
        return None;
    }

    let mut best: Option<ChordMatch> = None;
    let mut best_score = 0.0_f64;

    for root in 0..12u8 {
        let intervals = interval_mask(pitch_classes, root);

        for template in TEMPLATES {
            let matched = (intervals & template.intervals).count_ones() as usize;
            if matched < template.size.min(2) {
                continue;
            }

            let extra = (intervals & !template.intervals).count_ones();
            let mut score = matched as f64 / template.size as f64 - extra as f64 * 0.1;
            if bass.is_some_and(|b| b % 12 == root) {
                score += 0.15;
            }
            if intervals & template.intervals == template.intervals {
                score += 0.1;
            }

            if score > best_score {
                best_score = score;
                best = Some(ChordMatch {
                    root,
                    quality: template.quality,
                    confidence: score.min(1.0),
                });
            }
        }
    }

    best.filter(|_| best_score > 0.4)
}

/// Pitches sounding together between two breakpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sonority {
    pub onset: f64,
    pub duration: f64,
    /// Sorted, deduplicated
    pub pitches: Vec<u8>,
}

impl Sonority {
    pub fn pitch_classes(&self) -> Vec<u8> {
        let mut pcs: Vec<u8> = self.pitches.iter().map(|p| p % 12).collect();
        pcs.sort_unstable();
        pcs.dedup();
        pcs
    }

    /// More than one distinct pitch.
    pub fn is_chord(&self) -> bool {
        self.pitches.len() > 1
    }

    /// Template symbol when one matches, otherwise the bass note's name.
    pub fn symbol(&self) -> String {
        let bass = self.pitches.first().copied().unwrap_or(0);
        match match_chord(&self.pitch_classes(), Some(bass)) {
            Some(m) => m.symbol(),
            None => note_name(bass).to_string(),
        }
    }

    /// Ordinal of the symbol's first letter (A = 0 .. G = 6).
    pub fn letter_class(&self) -> u8 {
        let symbol = self.symbol();
        symbol
            .bytes()
            .next()
            .map(|b| b.saturating_sub(b'A') % 7)
            .unwrap_or(0)
    }
}

/// Slice pitched events at every onset and offset into sonorities.
///
/// Spans where nothing sounds are skipped; zero-length events never sound.
pub fn chordify<'a>(events: impl IntoIterator<Item = &'a MusicalEvent>) -> Vec<Sonority> {
    let mut pitched: Vec<&MusicalEvent> = events
        .into_iter()
        .filter(|e| e.is_pitched() && e.duration() > 0.0)
        .collect();
    pitched.sort_by(|a, b| a.onset().total_cmp(&b.onset()));

    let mut breakpoints: Vec<f64> = pitched.iter().flat_map(|e| [e.onset(), e.end()]).collect();
    breakpoints.sort_by(f64::total_cmp);
    breakpoints.dedup();

    let mut sonorities = Vec::new();
    let mut next = 0;
    let mut active: Vec<&MusicalEvent> = Vec::new();

    for span in breakpoints.windows(2) {
        let (start, end) = (span[0], span[1]);
        while next < pitched.len() && pitched[next].onset() <= start {
            active.push(pitched[next]);
            next += 1;
        }
        active.retain(|e| e.end() > start);

        let mut pitches: Vec<u8> = active.iter().flat_map(|e| e.pitches().iter().copied()).collect();
        if pitches.is_empty() {
            continue;
        }
        pitches.sort_unstable();
        pitches.dedup();
        sonorities.push(Sonority {
            onset: start,
            duration: end - start,
            pitches,
        });
    }

    sonorities
}

#[cfg(test)]
mod tests {
    use super::*;
    use score_model::{Chord, Note, Rest};

    #[test]
    fn c_major_triad() {
        let m = match_chord(&[0, 4, 7], None).unwrap();
        assert_eq!(m.root, 0);
        assert_eq!(m.symbol(), "C");
        assert_eq!(m.quality, ChordQuality::Major);
    }

    #[test]
    fn g_dominant_7th() {
        let m = match_chord(&[7, 11, 2, 5], None).unwrap();
        assert_eq!(m.symbol(), "G7");
    }

    #[test]
    fn bass_favors_root() {
        let m = match_chord(&[0, 4, 7], Some(48)).unwrap();
        assert_eq!(m.root, 0);
    }

    #[test]
    fn single_pitch_class_does_not_match() {
        assert!(match_chord(&[0], None).is_none());
    }

    #[test]
    fn pitch_names() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(69), "A4");
        assert_eq!(pitch_name(0), "C-1");
    }

    #[test]
    fn chordify_splits_at_breakpoints() {
        let events: Vec<MusicalEvent> = vec![
            Note::new(48, 0.0, 2.0).into(),
            Chord::new(vec![64, 67], 0.0, 1.0).into(),
            Rest::new(2.0, 1.0).into(),
            Note::new(62, 3.0, 1.0).into(),
        ];
        let sonorities = chordify(&events);

        assert_eq!(sonorities.len(), 3);
        assert_eq!(sonorities[0].pitches, vec![48, 64, 67]);
        assert_eq!(sonorities[0].symbol(), "C");
        assert_eq!(sonorities[1].pitches, vec![48]);
        assert_eq!(sonorities[1].duration, 1.0);
        assert_eq!(sonorities[2].onset, 3.0);
        assert_eq!(sonorities[2].symbol(), "D");
    }

    #[test]
    fn letter_classes() {
        let sonority = |pitches: Vec<u8>| Sonority {
            onset: 0.0,
            duration: 1.0,
            pitches,
        };
        assert_eq!(sonority(vec![57]).letter_class(), 0); // A
        assert_eq!(sonority(vec![60, 64, 67]).letter_class(), 2); // C
        assert_eq!(sonority(vec![67, 71, 74]).letter_class(), 6); // G
    }
}
