//! Standard MIDI File export (format 0, one track, percussion channel)

use std::fs::File;
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::sequencer::swing::step_duration;
use crate::sequencer::track::Track;
use crate::sequencer::Snapshot;

pub const TICKS_PER_QUARTER: u16 = 480;
/// Longest note in ticks, so one-shot hits never overlap the next step
pub const MAX_NOTE_TICKS: f64 = 60.0;
pub const VELOCITY: u8 = 100;

const NOTE_ON: u8 = 0x99;
const NOTE_OFF: u8 = 0x89;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write MIDI file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEventKind {
    On,
    Off,
}

/// A note event at an absolute tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub tick: u32,
    pub kind: NoteEventKind,
    pub note: u8,
}

/// Audible cells as note on/off pairs, sorted by tick. Events on the same
/// tick keep the order they were generated in.
pub fn note_events(snapshot: &Snapshot) -> Vec<NoteEvent> {
    let base_ticks = TICKS_PER_QUARTER as f64 / snapshot.transport.subdivision() as f64;
    let swing = snapshot.transport.swing() as f64;
    let mut events = Vec::new();
    let mut current_tick = 0.0_f64;

    for step in 0..snapshot.transport.total_steps() {
        let step_ticks = step_duration(step, base_ticks, swing);
        for track in Track::ALL {
            if !snapshot.is_audible(track, step) {
                continue;
            }
            let note = track.midi_note();
            events.push(NoteEvent {
                tick: current_tick.round() as u32,
                kind: NoteEventKind::On,
                note,
            });
            events.push(NoteEvent {
                tick: (current_tick + step_ticks.min(MAX_NOTE_TICKS)).round() as u32,
                kind: NoteEventKind::Off,
                note,
            });
        }
        current_tick += step_ticks;
    }

    events.sort_by_key(|e| e.tick);
    events
}

/// Microseconds per quarter note for the tempo meta event
pub fn micros_per_quarter(tempo: u32) -> u32 {
    (60_000_000.0 / tempo as f64).round() as u32
}

/// Encode a snapshot as a complete `.mid` file
pub fn encode_midi(snapshot: &Snapshot) -> Vec<u8> {
    let track = build_track_chunk(snapshot);

    let mut out = Vec::with_capacity(22 + track.len());
    // MThd  length=6  format=0  ntrks=1  division
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&TICKS_PER_QUARTER.to_be_bytes());

    out.extend_from_slice(b"MTrk");
    out.extend_from_slice(&(track.len() as u32).to_be_bytes());
    out.extend_from_slice(&track);
    out
}

fn build_track_chunk(snapshot: &Snapshot) -> Vec<u8> {
    let mut t = Vec::new();

    // Tempo meta event at delta 0
    let micros = micros_per_quarter(snapshot.transport.tempo());
    t.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03]);
    t.extend_from_slice(&micros.to_be_bytes()[1..]);

    let mut last_tick = 0;
    for event in note_events(snapshot) {
        assert!(event.tick >= last_tick, "note events must be sorted by tick");
        write_vlq(&mut t, event.tick - last_tick);
        last_tick = event.tick;
        match event.kind {
            NoteEventKind::On => t.extend_from_slice(&[NOTE_ON, event.note, VELOCITY]),
            NoteEventKind::Off => t.extend_from_slice(&[NOTE_OFF, event.note, 0]),
        }
    }

    // End of track
    t.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
    t
}

/// Append `value` as a MIDI variable-length quantity, shortest form
pub fn write_vlq(out: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 5];
    let mut n = 0;
    let mut v = value;
    loop {
        groups[n] = (v & 0x7F) as u8;
        n += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i > 0 { 0x80 } else { 0x00 };
        out.push(groups[i] | continuation);
    }
}

/// Decode a variable-length quantity from the front of `bytes`.
/// Returns the value and the number of bytes consumed.
pub fn read_vlq(bytes: &[u8]) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    for (i, &byte) in bytes.iter().take(5).enumerate() {
        value = value.checked_mul(128)? | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

pub fn export_to_file(path: impl AsRef<Path>, snapshot: &Snapshot) -> Result<(), ExportError> {
    let bytes = encode_midi(snapshot);
    let mut file = File::create(path.as_ref())?;
    file.write_all(&bytes)?;
    info!(path = %path.as_ref().display(), bytes = bytes.len(), "exported MIDI file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::TransportConfig;

    fn vlq(value: u32) -> Vec<u8> {
        let mut out = Vec::new();
        write_vlq(&mut out, value);
        out
    }

    #[test]
    fn test_vlq_known_encodings() {
        assert_eq!(vlq(0), [0x00]);
        assert_eq!(vlq(0x40), [0x40]);
        assert_eq!(vlq(127), [0x7F]);
        assert_eq!(vlq(128), [0x81, 0x00]);
        assert_eq!(vlq(16383), [0xFF, 0x7F]);
        assert_eq!(vlq(16384), [0x81, 0x80, 0x00]);
        assert_eq!(vlq(0x0FFF_FFFF), [0xFF, 0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn test_vlq_round_trip() {
        for n in [0, 1, 127, 128, 16383, 16384, 2_097_151, 2_097_152, 1 << 28, u32::MAX] {
            let bytes = vlq(n);
            assert_eq!(read_vlq(&bytes), Some((n, bytes.len())), "n = {n}");
        }
    }

    #[test]
    fn test_read_vlq_rejects_truncated_input() {
        assert_eq!(read_vlq(&[]), None);
        assert_eq!(read_vlq(&[0x81]), None);
    }

    #[test]
    fn test_micros_per_quarter() {
        assert_eq!(micros_per_quarter(120), 500_000);
        assert_eq!(micros_per_quarter(110), 545_455);
        assert_eq!(micros_per_quarter(40), 1_500_000);
    }

    #[test]
    fn test_note_off_is_capped() {
        let mut snapshot = Snapshot::new(TransportConfig::new(120, 2, 2, 0));
        snapshot.pattern.set(Track::Snare, 1, true);
        let events = note_events(&snapshot);
        assert_eq!(
            events,
            vec![
                NoteEvent { tick: 240, kind: NoteEventKind::On, note: 38 },
                NoteEvent { tick: 300, kind: NoteEventKind::Off, note: 38 },
            ]
        );
    }

    #[test]
    fn test_swing_shifts_odd_steps() {
        let mut snapshot = Snapshot::new(TransportConfig::new(120, 4, 4, 50));
        snapshot.pattern.set(Track::HihatClosed, 1, true);
        snapshot.pattern.set(Track::HihatClosed, 2, true);
        let on_ticks: Vec<u32> = note_events(&snapshot)
            .iter()
            .filter(|e| e.kind == NoteEventKind::On)
            .map(|e| e.tick)
            .collect();
        // Step 0 lasts 180 ticks, step 1 lasts 60
        assert_eq!(on_ticks, vec![180, 240]);
    }

    #[test]
    fn test_equal_ticks_keep_insertion_order() {
        let mut snapshot = Snapshot::default();
        snapshot.pattern.set(Track::Kick, 0, true);
        snapshot.pattern.set(Track::HihatClosed, 0, true);
        let notes: Vec<(u32, u8)> =
            note_events(&snapshot).iter().map(|e| (e.tick, e.note)).collect();
        assert_eq!(notes, vec![(0, 42), (0, 36), (60, 42), (60, 36)]);
    }

    #[test]
    fn test_muted_tracks_are_not_exported() {
        let mut snapshot = Snapshot::default();
        snapshot.pattern.set(Track::Kick, 0, true);
        snapshot.mutes.set(Track::Kick, true);
        assert!(note_events(&snapshot).is_empty());
    }

    #[test]
    fn test_empty_pattern_layout() {
        let bytes = encode_midi(&Snapshot::new(TransportConfig::new(120, 4, 4, 0)));
        let parts: [&[u8]; 6] = [
            b"MThd",
            &[0, 0, 0, 6, 0, 0, 0, 1, 0x01, 0xE0],
            b"MTrk",
            &[0, 0, 0, 11],
            &[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20],
            &[0x00, 0xFF, 0x2F, 0x00],
        ];
        assert_eq!(bytes, parts.concat());
    }
}
