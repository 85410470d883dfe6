//! Standard MIDI File export of a [`Score`].
//!
//! Track 0 carries tempo and time signatures from the measure grid; every
//! part becomes its own track with a name, a program change and its notes.
//! Decoding the output with [`crate::midi::decode`] recovers the parts.

use crate::score::{Score, TimeSignature};

pub const EXPORT_PPQ: u16 = 480;
const PERCUSSION_CHANNEL: u8 = 9;

/// Encode a score as format 1 SMF bytes.
pub fn encode(score: &Score) -> Vec<u8> {
    let mut tracks = vec![conductor_track(score)];

    let mut next_channel = 0u8;
    for part in score.parts() {
        let channel = if part.is_percussion {
            PERCUSSION_CHANNEL
        } else {
            let channel = next_channel.min(15);
            next_channel += 1;
            if next_channel == PERCUSSION_CHANNEL {
                next_channel += 1;
            }
            channel
        };

        let mut events: Vec<(u64, Vec<u8>)> = Vec::new();
        events.push((0, text_event(0x03, &part.name)));
        events.push((0, vec![0xC0 | channel, part.program.unwrap_or(0) & 0x7F]));

        for event in part.events() {
            let on = to_ticks(event.onset());
            let off = to_ticks(event.end()).max(on + 1);
            let velocity = event.velocity().unwrap_or(0).clamp(1, 127);
            for &pitch in event.pitches() {
                events.push((on, vec![0x90 | channel, pitch & 0x7F, velocity]));
                events.push((off, vec![0x80 | channel, pitch & 0x7F, 0]));
            }
        }

        // Note-offs first at equal ticks so repeated pitches re-strike cleanly
        events.sort_by(|a, b| {
            a.0.cmp(&b.0).then_with(|| {
                let a_off = a.1.first().is_some_and(|s| s & 0xF0 == 0x80);
                let b_off = b.1.first().is_some_and(|s| s & 0xF0 == 0x80);
                b_off.cmp(&a_off)
            })
        });
        tracks.push(serialize_track(events));
    }

    assemble(&tracks)
}

fn to_ticks(beats: f64) -> u64 {
    (beats.max(0.0) * EXPORT_PPQ as f64).round() as u64
}

fn conductor_track(score: &Score) -> Vec<u8> {
    let usec = (60_000_000.0 / score.tempo_estimate()).round() as u32;
    let mut events = vec![(
        0,
        vec![0xFF, 0x51, 0x03, (usec >> 16) as u8, (usec >> 8) as u8, usec as u8],
    )];

    let mut current: Option<TimeSignature> = None;
    for measure in score.measures() {
        let Some(ts) = measure.time_signature else {
            continue;
        };
        if current == Some(ts) || ts.denominator == 0 {
            continue;
        }
        let denominator_power = ts.denominator.trailing_zeros() as u8;
        events.push((
            to_ticks(measure.start),
            vec![0xFF, 0x58, 0x04, ts.numerator, denominator_power, 0x18, 0x08],
        ));
        current = Some(ts);
    }

    serialize_track(events)
}

fn text_event(kind: u8, text: &str) -> Vec<u8> {
    let mut event = vec![0xFF, kind];
    write_vlq(&mut event, text.len() as u32);
    event.extend_from_slice(text.as_bytes());
    event
}

/// Delta-encode absolute-tick events and close the track.
fn serialize_track(events: Vec<(u64, Vec<u8>)>) -> Vec<u8> {
    let mut data = Vec::new();
    let mut last_tick = 0u64;
    for (tick, bytes) in events {
        write_vlq(&mut data, tick.saturating_sub(last_tick) as u32);
        data.extend_from_slice(&bytes);
        last_tick = tick;
    }
    write_vlq(&mut data, 0);
    data.extend_from_slice(&[0xFF, 0x2F, 0x00]);
    data
}

fn assemble(tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&EXPORT_PPQ.to_be_bytes());
    for track in tracks {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track.len() as u32).to_be_bytes());
        buf.extend_from_slice(track);
    }
    buf
}

fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    buf.extend_from_slice(&bytes);
}
