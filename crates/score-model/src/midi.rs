//! Standard MIDI File decoding.
//!
//! Produces both the symbolic [`Score`] (beats, chords grouped per onset,
//! measures from the time-signature map) and the parallel
//! [`PerformanceTrack`] (seconds from the tempo map, raw velocities).

use std::collections::{BTreeMap, HashMap};

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use tracing::debug;

use crate::event::{Chord, MusicalEvent, Note};
use crate::gm;
use crate::performance::{PerformanceInstrument, PerformanceNote, PerformanceTrack};
use crate::score::{Measure, Part, Score, TimeSignature};
use crate::{Error, Result};

const DEFAULT_USEC_PER_BEAT: u32 = 500_000;
const DRUM_CHANNEL: u8 = 9;

/// A decoded work: the symbolic score plus its performance rendering.
#[derive(Debug, Clone)]
pub struct DecodedWork {
    pub score: Score,
    pub performance: PerformanceTrack,
}

#[derive(Debug, Clone)]
struct RawNote {
    onset_tick: u64,
    offset_tick: u64,
    pitch: u8,
    velocity: u8,
}

/// Notes that end up in one part: a whole track, or one channel of a format-0 track.
#[derive(Debug, Default)]
struct Voice {
    name: Option<String>,
    program: Option<u8>,
    is_drum: bool,
    notes: Vec<RawNote>,
}

/// Tick-to-seconds conversion over a sorted tempo map.
struct TempoMap {
    ppq: f64,
    /// (tick, microseconds per beat), sorted and deduplicated
    changes: Vec<(u64, u32)>,
}

impl TempoMap {
    fn seconds_at(&self, tick: u64) -> f64 {
        let mut seconds = 0.0;
        let mut last_tick = 0u64;
        let mut usec = DEFAULT_USEC_PER_BEAT;

        for &(change_tick, change_usec) in &self.changes {
            if change_tick >= tick {
                break;
            }
            seconds += self.span_seconds(change_tick - last_tick, usec);
            last_tick = change_tick;
            usec = change_usec;
        }

        seconds + self.span_seconds(tick - last_tick, usec)
    }

    fn span_seconds(&self, ticks: u64, usec: u32) -> f64 {
        ticks as f64 / self.ppq * usec as f64 / 1_000_000.0
    }

    /// Mean BPM weighted by how long each tempo is in effect up to `end_tick`.
    fn weighted_bpm(&self, end_tick: u64) -> f64 {
        if self.changes.is_empty() || end_tick == 0 {
            return self
                .changes
                .first()
                .map(|&(_, usec)| 60_000_000.0 / usec as f64)
                .unwrap_or(Score::DEFAULT_TEMPO);
        }

        let mut weighted = 0.0;
        let mut last_tick = 0u64;
        let mut usec = DEFAULT_USEC_PER_BEAT;

        for &(change_tick, change_usec) in &self.changes {
            let change_tick = change_tick.min(end_tick);
            weighted += (change_tick - last_tick) as f64 * 60_000_000.0 / usec as f64;
            last_tick = change_tick;
            usec = change_usec;
        }
        weighted += (end_tick - last_tick) as f64 * 60_000_000.0 / usec as f64;

        weighted / end_tick as f64
    }
}

/// Decode Standard MIDI File bytes.
pub fn decode(bytes: &[u8]) -> Result<DecodedWork> {
    if bytes.is_empty() {
        return Err(Error::EmptyInput);
    }
    let smf = Smf::parse(bytes).map_err(|e| Error::MidiParse(e.to_string()))?;

    let ppq = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int().max(1),
        Timing::Timecode(_, _) => 480,
    };
    let single_track = matches!(smf.header.format, midly::Format::SingleTrack);

    let mut voices: BTreeMap<(usize, u8), Voice> = BTreeMap::new();
    let mut tempo_changes: Vec<(u64, u32)> = Vec::new();
    let mut signatures: Vec<(u64, TimeSignature)> = Vec::new();
    let mut total_ticks: u64 = 0;

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut current_tick: u64 = 0;
        let mut track_name: Option<String> = None;
        let mut programs: HashMap<u8, u8> = HashMap::new();
        // (channel, pitch) -> stack of (onset_tick, velocity)
        let mut pending: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();
        let mut closed: Vec<(u8, RawNote)> = Vec::new();

        for event in track {
            current_tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    tempo_changes.push((current_tick, tempo.as_int().max(1)));
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow, _, _)) => {
                    let denominator = 1u8.checked_shl(denom_pow as u32).unwrap_or(4);
                    signatures.push((current_tick, TimeSignature::new(num.max(1), denominator)));
                }
                TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                    let name = String::from_utf8_lossy(name).trim().to_string();
                    if !name.is_empty() {
                        track_name = Some(name);
                    }
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int();
                    match message {
                        MidiMessage::ProgramChange { program } => {
                            programs.entry(ch).or_insert(program.as_int());
                        }
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            pending
                                .entry((ch, key.as_int()))
                                .or_default()
                                .push((current_tick, vel.as_int()));
                        }
                        MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                            let key = (ch, key.as_int());
                            if let Some((onset, velocity)) =
                                pending.get_mut(&key).and_then(|stack| stack.pop())
                            {
                                closed.push((
                                    ch,
                                    RawNote {
                                        onset_tick: onset,
                                        offset_tick: current_tick,
                                        pitch: key.1,
                                        velocity,
                                    },
                                ));
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }

            total_ticks = total_ticks.max(current_tick);
        }

        // Unterminated notes end with their track
        for ((ch, pitch), stack) in pending {
            for (onset, velocity) in stack {
                closed.push((
                    ch,
                    RawNote {
                        onset_tick: onset,
                        offset_tick: current_tick,
                        pitch,
                        velocity,
                    },
                ));
            }
        }

        for (ch, note) in closed {
            let key = if single_track { (track_index, ch) } else { (track_index, 0) };
            let voice = voices.entry(key).or_default();
            voice.is_drum |= ch == DRUM_CHANNEL;
            if voice.program.is_none() {
                voice.program = programs.get(&ch).copied();
            }
            voice.notes.push(note);
        }

        let channels_in_track = voices.keys().filter(|(t, _)| *t == track_index).count();
        for ((_, _), voice) in voices.range_mut((track_index, 0)..=(track_index, u8::MAX)) {
            if !single_track || channels_in_track == 1 {
                voice.name = track_name.clone();
            }
        }
    }

    tempo_changes.sort_by_key(|&(tick, _)| tick);
    tempo_changes.dedup_by(|a, b| a.0 == b.0);
    signatures.sort_by_key(|&(tick, _)| tick);
    signatures.dedup_by(|a, b| a.0 == b.0);

    let tempo_map = TempoMap {
        ppq: ppq as f64,
        changes: tempo_changes,
    };
    let beats = |tick: u64| tick as f64 / ppq as f64;

    let last_note_tick = voices
        .values()
        .flat_map(|v| v.notes.iter().map(|n| n.offset_tick))
        .max()
        .unwrap_or(0);
    let has_content = voices.values().any(|v| !v.notes.is_empty());
    let grid = measure_grid(&signatures, ppq, beats(last_note_tick), has_content);

    let mut parts = Vec::with_capacity(voices.len());
    let mut instruments = Vec::with_capacity(voices.len());

    for voice in voices.into_values().filter(|v| !v.notes.is_empty()) {
        let mut notes = voice.notes;
        notes.sort_by(|a, b| a.onset_tick.cmp(&b.onset_tick).then(a.pitch.cmp(&b.pitch)));

        let name = voice.name.unwrap_or_else(|| {
            if voice.is_drum {
                "Percussion".to_string()
            } else {
                gm::program_name(voice.program.unwrap_or(0)).to_string()
            }
        });

        let performance_notes = notes
            .iter()
            .map(|n| PerformanceNote {
                pitch: n.pitch,
                velocity: n.velocity,
                start: tempo_map.seconds_at(n.onset_tick),
                end: tempo_map.seconds_at(n.offset_tick),
            })
            .collect();
        let mut instrument =
            PerformanceInstrument::new(name.clone(), voice.program.unwrap_or(0), performance_notes);
        instrument.is_drum = voice.is_drum;
        instruments.push(instrument);

        let events = group_onsets(&notes, ppq);
        let mut part = Part::new(name, events).with_measures(grid.clone());
        if let Some(program) = voice.program {
            part = part.with_program(program);
        }
        if voice.is_drum {
            part = part.percussion();
        }
        parts.push(part);
    }

    let tempo = tempo_map.weighted_bpm(total_ticks);
    debug!(
        parts = parts.len(),
        measures = grid.len(),
        tempo,
        "decoded MIDI file"
    );

    let score = Score::new(parts)?.with_tempo(tempo);
    let performance = PerformanceTrack::new(instruments, score.tempo_estimate());

    Ok(DecodedWork { score, performance })
}

/// Merge notes that start on the same tick into chords.
fn group_onsets(notes: &[RawNote], ppq: u16) -> Vec<MusicalEvent> {
    let ppq = ppq as f64;
    let mut events = Vec::new();

    for group in notes.chunk_by(|a, b| a.onset_tick == b.onset_tick) {
        let onset = group[0].onset_tick as f64 / ppq;
        let offset = group.iter().map(|n| n.offset_tick).max().unwrap_or(group[0].offset_tick);
        let duration = offset.saturating_sub(group[0].onset_tick) as f64 / ppq;
        let velocity = group.iter().map(|n| n.velocity).max().unwrap_or(0);

        let mut pitches: Vec<u8> = group.iter().map(|n| n.pitch).collect();
        pitches.dedup();

        if pitches.len() > 1 {
            let mut chord = Chord::new(pitches, onset, duration);
            chord.velocity = velocity;
            events.push(MusicalEvent::Chord(chord));
        } else {
            events.push(Note::new(group[0].pitch, onset, duration).with_velocity(velocity).into());
        }
    }

    events
}

/// Lay measures over `[0, total_beats)` following the time-signature map.
///
/// A signature change that falls mid-measure shortens that measure so the
/// grid stays contiguous.
fn measure_grid(
    signatures: &[(u64, TimeSignature)],
    ppq: u16,
    total_beats: f64,
    has_content: bool,
) -> Vec<Measure> {
    let mut segments: Vec<(f64, TimeSignature)> = signatures
        .iter()
        .map(|&(tick, ts)| (tick as f64 / ppq as f64, ts))
        .collect();
    if segments.first().map_or(true, |&(start, _)| start > 0.0) {
        segments.insert(0, (0.0, TimeSignature::COMMON));
    }
    if segments.len() == 1 {
        return Measure::regular_grid(total_beats, segments[0].1, has_content);
    }

    let mut measures: Vec<Measure> = Vec::new();
    for (i, &(start, ts)) in segments.iter().enumerate() {
        let length = ts.beats_per_measure();
        // Changes past the last note do not stretch the grid
        let boundary = segments
            .get(i + 1)
            .map(|&(next, _)| next)
            .filter(|&next| next < total_beats);
        let limit = boundary.unwrap_or(total_beats);

        let mut cursor = start;
        while cursor < limit {
            let duration = match boundary {
                Some(end) => length.min(end - cursor),
                None => length,
            };
            measures.push(Measure {
                index: measures.len() + 1,
                start: cursor,
                duration,
                time_signature: Some(ts),
            });
            cursor += duration;
        }

        if boundary.is_none() {
            break;
        }
    }

    if measures.is_empty() && has_content {
        measures.push(Measure {
            index: 1,
            start: 0.0,
            duration: segments[0].1.beats_per_measure(),
            time_signature: Some(segments[0].1),
        });
    }

    measures
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(buf: &mut Vec<u8>, format: u16, tracks: u16) {
        buf.extend_from_slice(b"MThd");
        buf.extend_from_slice(&6u32.to_be_bytes());
        buf.extend_from_slice(&format.to_be_bytes());
        buf.extend_from_slice(&tracks.to_be_bytes());
        buf.extend_from_slice(&480u16.to_be_bytes());
    }

    fn push_track(buf: &mut Vec<u8>, track: &[u8]) {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track.len() as u32).to_be_bytes());
        buf.extend_from_slice(track);
    }

    fn make_two_part_midi() -> Vec<u8> {
        let mut buf = Vec::new();
        header(&mut buf, 1, 3);

        // Track 0: 120 BPM, 3/4
        let mut track0 = Vec::new();
        track0.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
        track0.extend_from_slice(&[0x00, 0xFF, 0x58, 0x04, 0x03, 0x02, 0x18, 0x08]);
        track0.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        push_track(&mut buf, &track0);

        // Track 1: "Flute", C4 E4 G4 one beat each
        let mut track1 = Vec::new();
        track1.extend_from_slice(&[0x00, 0xFF, 0x03, 0x05]);
        track1.extend_from_slice(b"Flute");
        track1.extend_from_slice(&[0x00, 0xC0, 73]);
        for pitch in [60u8, 64, 67] {
            track1.extend_from_slice(&[0x00, 0x90, pitch, 100]);
            track1.extend_from_slice(&[0x83, 0x60, 0x80, pitch, 0]);
        }
        track1.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        push_track(&mut buf, &track1);

        // Track 2: unnamed cello, C3+G3 chord for two beats
        let mut track2 = Vec::new();
        track2.extend_from_slice(&[0x00, 0xC1, 42]);
        track2.extend_from_slice(&[0x00, 0x91, 48, 80]);
        track2.extend_from_slice(&[0x00, 0x91, 55, 90]);
        track2.extend_from_slice(&[0x87, 0x40, 0x81, 48, 0]);
        track2.extend_from_slice(&[0x00, 0x91, 55, 0]);
        track2.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        push_track(&mut buf, &track2);

        buf
    }

    #[test]
    fn decodes_parts_and_chords() {
        let work = decode(&make_two_part_midi()).unwrap();
        let score = &work.score;

        assert_eq!(score.parts().len(), 2);
        assert_eq!(score.parts()[0].name, "Flute");
        assert_eq!(score.parts()[0].pitches(), vec![60, 64, 67]);
        assert_eq!(score.parts()[0].program, Some(73));

        let cello = &score.parts()[1];
        assert_eq!(cello.name, "Cello");
        assert_eq!(cello.events().len(), 1);
        assert!(cello.events()[0].is_chord());
        assert_eq!(cello.events()[0].pitches(), &[48, 55]);
        assert_eq!(cello.events()[0].duration(), 2.0);
        assert_eq!(cello.events()[0].velocity(), Some(90));
    }

    #[test]
    fn measures_follow_time_signature() {
        let work = decode(&make_two_part_midi()).unwrap();
        let measures = work.score.measures();

        assert_eq!(measures.len(), 1);
        assert_eq!(measures[0].duration, 3.0);
        assert_eq!(measures[0].time_signature, Some(TimeSignature::new(3, 4)));
    }

    #[test]
    fn performance_uses_seconds() {
        let work = decode(&make_two_part_midi()).unwrap();
        let flute = &work.performance.instruments()[0];

        assert!((work.score.tempo_estimate() - 120.0).abs() < 1e-9);
        assert!((flute.notes[1].start - 0.5).abs() < 1e-9);
        assert!((work.performance.total_duration() - 1.5).abs() < 1e-9);
        assert_eq!(flute.notes[0].velocity, 100);
    }

    #[test]
    fn format0_splits_by_channel() {
        let mut buf = Vec::new();
        header(&mut buf, 0, 1);
        let mut track = Vec::new();
        track.extend_from_slice(&[0x00, 0xC0, 0]);
        track.extend_from_slice(&[0x00, 0xC1, 40]);
        track.extend_from_slice(&[0x00, 0x90, 60, 100]);
        track.extend_from_slice(&[0x00, 0x91, 76, 100]);
        track.extend_from_slice(&[0x00, 0x99, 36, 100]);
        track.extend_from_slice(&[0x83, 0x60, 0x80, 60, 0]);
        track.extend_from_slice(&[0x00, 0x81, 76, 0]);
        track.extend_from_slice(&[0x00, 0x89, 36, 0]);
        track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        push_track(&mut buf, &track);

        let work = decode(&buf).unwrap();
        let names: Vec<&str> = work.score.parts().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Acoustic Grand Piano", "Violin", "Percussion"]);
        assert!(work.score.parts()[2].is_percussion);
        assert!(work.performance.instruments()[2].is_drum);
    }

    #[test]
    fn tempo_is_duration_weighted() {
        let map = TempoMap {
            ppq: 480.0,
            changes: vec![(0, 500_000), (960, 1_000_000)],
        };
        // Two beats at 120 and two at 60
        assert!((map.weighted_bpm(1920) - 90.0).abs() < 1e-9);
        assert!((map.seconds_at(1920) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn grid_shortens_measure_at_signature_change() {
        let signatures = vec![
            (0, TimeSignature::COMMON),
            (480 * 6, TimeSignature::new(3, 4)),
        ];
        let grid = measure_grid(&signatures, 480, 9.0, true);

        let durations: Vec<f64> = grid.iter().map(|m| m.duration).collect();
        assert_eq!(durations, vec![4.0, 2.0, 3.0]);
        assert_eq!(grid[2].start, 6.0);
        assert_eq!(grid[2].index, 3);
    }

    #[test]
    fn rejects_garbage_and_empty_input() {
        assert!(matches!(decode(&[]), Err(Error::EmptyInput)));
        assert!(matches!(decode(b"not a midi file"), Err(Error::MidiParse(_))));
    }
}
