//! Lookahead playback against a real wall clock

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rhythmcraft::{Session, SystemClock, Track, VoiceBank};

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<(Track, f64)>>>);

impl Recorder {
    fn hits(&self) -> Vec<(Track, f64)> {
        self.0.lock().unwrap().clone()
    }
}

impl VoiceBank for Recorder {
    fn trigger(&mut self, track: Track, time: f64) {
        self.0.lock().unwrap().push((track, time));
    }
}

#[test]
fn triggers_are_evenly_spaced_on_the_audio_clock() {
    let recorder = Recorder::default();
    let mut session = Session::new(recorder.clone(), Arc::new(SystemClock::new()));
    session.set_tempo(240);
    for step in 0..16 {
        session.toggle_cell(Track::HihatClosed, step);
    }
    // Previews from the edits above
    let previews = recorder.hits().len();
    assert_eq!(previews, 16);

    session.start();
    thread::sleep(Duration::from_millis(300));
    session.stop();

    let times: Vec<f64> = recorder.hits()[previews..].iter().map(|h| h.1).collect();
    assert!(times.len() >= 4, "only {} triggers", times.len());
    for pair in times.windows(2) {
        assert!((pair[1] - pair[0] - 0.0625).abs() < 1e-9);
    }
}

#[test]
fn swing_alternates_step_lengths() {
    let recorder = Recorder::default();
    let mut session = Session::new(recorder.clone(), Arc::new(SystemClock::new()));
    session.set_tempo(240);
    session.set_swing(50);
    session.toggle_mute(Track::Snare);
    for step in 0..16 {
        session.toggle_cell(Track::Snare, step);
    }
    assert!(recorder.hits().is_empty());
    session.toggle_mute(Track::Snare);

    session.start();
    thread::sleep(Duration::from_millis(300));
    session.stop();

    let times: Vec<f64> = recorder.hits().iter().map(|h| h.1).collect();
    assert!(times.len() >= 4, "only {} triggers", times.len());
    for (i, pair) in times.windows(2).enumerate() {
        let expected = if i % 2 == 0 { 0.09375 } else { 0.03125 };
        assert!((pair[1] - pair[0] - expected).abs() < 1e-9);
    }
}

#[test]
fn stopped_session_shows_no_playhead() {
    let mut session = Session::new(Recorder::default(), Arc::new(SystemClock::new()));
    assert_eq!(session.displayed_step(), None);
    session.start();
    thread::sleep(Duration::from_millis(50));
    assert!(session.displayed_step().is_some());
    session.stop();
    assert_eq!(session.displayed_step(), None);
}
