//! General MIDI program names and instrument families.

use serde::{Deserialize, Serialize};

const PROGRAM_NAMES: [&str; 128] = [
    "Acoustic Grand Piano", "Bright Acoustic Piano", "Electric Grand Piano", "Honky-tonk Piano",
    "Electric Piano 1", "Electric Piano 2", "Harpsichord", "Clavinet",
    "Celesta", "Glockenspiel", "Music Box", "Vibraphone",
    "Marimba", "Xylophone", "Tubular Bells", "Dulcimer",
    "Drawbar Organ", "Percussive Organ", "Rock Organ", "Church Organ",
    "Reed Organ", "Accordion", "Harmonica", "Tango Accordion",
    "Acoustic Guitar (nylon)", "Acoustic Guitar (steel)", "Electric Guitar (jazz)", "Electric Guitar (clean)",
    "Electric Guitar (muted)", "Overdriven Guitar", "Distortion Guitar", "Guitar Harmonics",
    "Acoustic Bass", "Electric Bass (finger)", "Electric Bass (pick)", "Fretless Bass",
    "Slap Bass 1", "Slap Bass 2", "Synth Bass 1", "Synth Bass 2",
    "Violin", "Viola", "Cello", "Contrabass",
    "Tremolo Strings", "Pizzicato Strings", "Orchestral Harp", "Timpani",
    "String Ensemble 1", "String Ensemble 2", "Synth Strings 1", "Synth Strings 2",
    "Choir Aahs", "Voice Oohs", "Synth Choir", "Orchestra Hit",
    "Trumpet", "Trombone", "Tuba", "Muted Trumpet",
    "French Horn", "Brass Section", "Synth Brass 1", "Synth Brass 2",
    "Soprano Sax", "Alto Sax", "Tenor Sax", "Baritone Sax",
    "Oboe", "English Horn", "Bassoon", "Clarinet",
    "Piccolo", "Flute", "Recorder", "Pan Flute",
    "Blown bottle", "Shakuhachi", "Whistle", "Ocarina",
    "Lead 1 (square)", "Lead 2 (sawtooth)", "Lead 3 (calliope)", "Lead 4 (chiff)",
    "Lead 5 (charang)", "Lead 6 (voice)", "Lead 7 (fifths)", "Lead 8 (bass + lead)",
    "Pad 1 (new age)", "Pad 2 (warm)", "Pad 3 (polysynth)", "Pad 4 (choir)",
    "Pad 5 (bowed)", "Pad 6 (metallic)", "Pad 7 (halo)", "Pad 8 (sweep)",
    "FX 1 (rain)", "FX 2 (soundtrack)", "FX 3 (crystal)", "FX 4 (atmosphere)",
    "FX 5 (brightness)", "FX 6 (goblins)", "FX 7 (echoes)", "FX 8 (sci-fi)",
    "Sitar", "Banjo", "Shamisen", "Koto",
    "Kalimba", "Bagpipe", "Fiddle", "Shanai",
    "Tinkle Bell", "Agogo", "Steel Drums", "Woodblock",
    "Taiko Drum", "Melodic Tom", "Synth Drum", "Reverse Cymbal",
    "Guitar Fret Noise", "Breath Noise", "Seashore", "Bird Tweet",
    "Telephone Ring", "Helicopter", "Applause", "Gunshot",
];

/// GM instrument name for a program number (0–127).
pub fn program_name(program: u8) -> &'static str {
    PROGRAM_NAMES[(program & 0x7F) as usize]
}

/// Coarse orchestral family used for instrumentation summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentFamily {
    Strings,
    Woodwinds,
    Brass,
    Percussion,
    Keyboard,
    Other,
}

impl InstrumentFamily {
    pub const ALL: [InstrumentFamily; 6] = [
        Self::Strings,
        Self::Woodwinds,
        Self::Brass,
        Self::Percussion,
        Self::Keyboard,
        Self::Other,
    ];

    /// Classify by GM program; the drum channel always wins.
    pub fn classify(program: u8, is_drum: bool) -> Self {
        if is_drum {
            return Self::Percussion;
        }
        match program {
            0..=7 | 16..=23 => Self::Keyboard,
            8..=15 | 47 | 112..=119 => Self::Percussion,
            24..=46 | 48..=51 | 104..=107 | 110 => Self::Strings,
            56..=63 => Self::Brass,
            64..=79 | 109 | 111 => Self::Woodwinds,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strings => "strings",
            Self::Woodwinds => "woodwinds",
            Self::Brass => "brass",
            Self::Percussion => "percussion",
            Self::Keyboard => "keyboard",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for InstrumentFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_names() {
        assert_eq!(program_name(0), "Acoustic Grand Piano");
        assert_eq!(program_name(40), "Violin");
        assert_eq!(program_name(127), "Gunshot");
    }

    #[test]
    fn families() {
        assert_eq!(InstrumentFamily::classify(0, false), InstrumentFamily::Keyboard);
        assert_eq!(InstrumentFamily::classify(40, false), InstrumentFamily::Strings);
        assert_eq!(InstrumentFamily::classify(56, false), InstrumentFamily::Brass);
        assert_eq!(InstrumentFamily::classify(73, false), InstrumentFamily::Woodwinds);
        assert_eq!(InstrumentFamily::classify(40, true), InstrumentFamily::Percussion);
        assert_eq!(InstrumentFamily::classify(90, false), InstrumentFamily::Other);
    }
}
