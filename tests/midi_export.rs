//! Byte-level checks of exported MIDI files

use rhythmcraft::midi::export::{note_events, read_vlq, NoteEventKind};
use rhythmcraft::{encode_midi, export_to_file, PatternStore, Track};

/// Kick on every beat of a 4/4 bar of sixteenths at 120 BPM
fn four_on_the_floor() -> PatternStore {
    let mut store = PatternStore::new();
    store.set_tempo(120);
    store.set_beats(4);
    store.set_subdivision(4);
    store.set_swing(0);
    for step in [0, 4, 8, 12] {
        store.set_cell(Track::Kick, step, true);
    }
    store
}

/// Walk the track chunk and return (absolute tick, status, note) per note event
fn parse_notes(bytes: &[u8]) -> Vec<(u32, u8, u8)> {
    let track = &bytes[22..];
    // Skip the tempo meta event
    let mut pos = 7;
    let mut tick = 0;
    let mut notes = Vec::new();
    loop {
        let (delta, len) = read_vlq(&track[pos..]).expect("valid delta");
        pos += len;
        tick += delta;
        if track[pos] == 0xFF {
            assert_eq!(&track[pos..pos + 3], &[0xFF, 0x2F, 0x00]);
            assert_eq!(pos + 3, track.len());
            return notes;
        }
        notes.push((tick, track[pos], track[pos + 1]));
        pos += 3;
    }
}

#[test]
fn kick_on_every_beat() {
    let store = four_on_the_floor();
    let bytes = encode_midi(&store.snapshot());

    assert_eq!(&bytes[0..14], &[
        b'M', b'T', b'h', b'd', 0, 0, 0, 6, 0, 0, 0, 1, 0x01, 0xE0,
    ]);
    assert_eq!(&bytes[14..18], b"MTrk");
    let length = u32::from_be_bytes([bytes[18], bytes[19], bytes[20], bytes[21]]) as usize;
    assert_eq!(length, bytes.len() - 22);

    // 500000 microseconds per quarter
    assert_eq!(&bytes[22..29], &[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);

    let notes = parse_notes(&bytes);
    let on: Vec<u32> = notes.iter().filter(|n| n.1 == 0x99).map(|n| n.0).collect();
    let off: Vec<u32> = notes.iter().filter(|n| n.1 == 0x89).map(|n| n.0).collect();
    assert_eq!(on, vec![0, 480, 960, 1440]);
    assert_eq!(off, vec![60, 540, 1020, 1500]);
    assert!(notes.iter().all(|n| n.2 == 36));
}

#[test]
fn deltas_use_shortest_encoding() {
    let store = four_on_the_floor();
    let bytes = encode_midi(&store.snapshot());
    // First kick: delta 0, note on, velocity 100
    assert_eq!(&bytes[29..33], &[0x00, 0x99, 36, 100]);
    // Note off 60 ticks later, then the next note on 420 ticks after that
    assert_eq!(&bytes[33..37], &[60, 0x89, 36, 0]);
    assert_eq!(&bytes[37..42], &[0x83, 0x24, 0x99, 36, 100]);
}

#[test]
fn export_is_deterministic() {
    let mut store = four_on_the_floor();
    store.set_swing(33);
    store.set_cell(Track::HihatClosed, 1, true);
    store.set_cell(Track::HihatClosed, 3, true);
    let snapshot = store.snapshot();
    assert_eq!(encode_midi(&snapshot), encode_midi(&snapshot));
}

#[test]
fn muted_tracks_are_left_out() {
    let mut store = four_on_the_floor();
    store.set_cell(Track::Snare, 4, true);
    store.toggle_mute(Track::Kick);

    let events = note_events(&store.snapshot());
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.note == 38));
    assert_eq!(events[0].kind, NoteEventKind::On);
    assert_eq!(events[0].tick, 480);

    store.toggle_mute(Track::Kick);
    assert_eq!(note_events(&store.snapshot()).len(), 10);
}

#[test]
fn rudiment_exports_every_stroke() {
    let mut store = PatternStore::new();
    store.load_rudiment(rhythmcraft::Rudiment::find("single_stroke_four").unwrap());
    let notes = parse_notes(&encode_midi(&store.snapshot()));
    let on: Vec<u32> = notes.iter().filter(|n| n.1 == 0x99).map(|n| n.0).collect();
    assert_eq!(on, vec![0, 120, 240, 360, 960, 1080, 1200, 1320]);
}

#[test]
fn writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("beat.mid");
    let snapshot = four_on_the_floor().snapshot();

    export_to_file(&path, &snapshot).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), encode_midi(&snapshot));
}

#[test]
fn export_fails_for_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("beat.mid");
    assert!(export_to_file(&path, &PatternStore::new().snapshot()).is_err());
}
