//! Session - pattern store, playback engine and voice bank wired together
//!
//! This is the surface an interface layer drives: edits go to the store,
//! transport buttons go to `start`/`stop`, and the playhead is read back
//! through `displayed_step`.
use std::sync::Arc;

use crate::sequencer::playback::{AudioClock, PlaybackEngine, SchedulerConfig, VoiceBank};
use crate::sequencer::rudiment::Rudiment;
use crate::sequencer::track::Track;
use crate::sequencer::{PatternStore, Snapshot};
use crate::sequencer::proposal::ProposalError;

pub struct Session<V> {
    store: PatternStore,
    engine: PlaybackEngine,
    voices: V,
    clock: Arc<dyn AudioClock>,
}

impl<V> Session<V>
where
    V: VoiceBank + Clone + 'static,
{
    pub fn new(voices: V, clock: Arc<dyn AudioClock>) -> Self {
        Self::with_config(voices, clock, SchedulerConfig::default())
    }

    pub fn with_config(voices: V, clock: Arc<dyn AudioClock>, config: SchedulerConfig) -> Self {
        Self {
            store: PatternStore::new(),
            engine: PlaybackEngine::with_config(config),
            voices,
            clock,
        }
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.snapshot()
    }

    pub fn voices(&self) -> &V {
        &self.voices
    }

    /// Swap the voice bank. Takes effect the next time playback starts.
    pub fn set_voices(&mut self, voices: V) {
        self.voices = voices;
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_running()
    }

    pub fn start(&mut self) {
        self.engine
            .start(self.store.shared(), Arc::clone(&self.clock), self.voices.clone());
    }

    pub fn stop(&mut self) {
        self.engine.stop();
    }

    pub fn toggle_play(&mut self) {
        if self.is_playing() {
            self.stop();
        } else {
            self.start();
        }
    }

    pub fn displayed_step(&self) -> Option<usize> {
        self.engine.displayed_step()
    }

    /// Flip a cell. While stopped, a cell switched on is auditioned
    /// immediately unless its track is muted.
    pub fn toggle_cell(&mut self, track: Track, step: usize) -> bool {
        let active = self.store.toggle_cell(track, step);
        if active && !self.is_playing() && !self.store.is_muted(track) {
            self.voices.trigger(track, self.clock.now());
        }
        active
    }

    pub fn toggle_mute(&mut self, track: Track) -> bool {
        self.store.toggle_mute(track)
    }

    pub fn set_tempo(&mut self, tempo: u32) {
        self.store.set_tempo(tempo);
    }

    pub fn set_swing(&mut self, swing: u32) {
        self.store.set_swing(swing);
    }

    pub fn set_beats(&mut self, beats: u32) {
        self.store.set_beats(beats);
        self.restart_if_playing();
    }

    pub fn set_subdivision(&mut self, subdivision: u32) {
        self.store.set_subdivision(subdivision);
        self.restart_if_playing();
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn load_rudiment(&mut self, rudiment: &'static Rudiment) {
        self.store.load_rudiment(rudiment);
    }

    pub fn apply_proposal(&mut self, json: &str) -> Result<(), ProposalError> {
        self.store.apply_proposal(json)
    }

    // Bar layout is captured when the scheduler starts
    fn restart_if_playing(&mut self) {
        if self.is_playing() {
            self.stop();
            self.start();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::playback::tests::Recorder;
    use crate::sequencer::playback::SystemClock;

    fn session() -> (Session<Recorder>, Recorder) {
        let recorder = Recorder::default();
        let session = Session::new(recorder.clone(), Arc::new(SystemClock::new()));
        (session, recorder)
    }

    #[test]
    fn test_toggle_previews_when_stopped() {
        let (mut session, recorder) = session();
        assert!(session.toggle_cell(Track::Clap, 2));
        assert_eq!(recorder.hits().len(), 1);
        assert_eq!(recorder.hits()[0].0, Track::Clap);

        // Switching off is silent
        assert!(!session.toggle_cell(Track::Clap, 2));
        assert_eq!(recorder.hits().len(), 1);
    }

    #[test]
    fn test_no_preview_for_muted_track() {
        let (mut session, recorder) = session();
        session.toggle_mute(Track::Snare);
        session.toggle_cell(Track::Snare, 0);
        assert!(recorder.hits().is_empty());
        assert!(session.snapshot().pattern.get(Track::Snare, 0));
    }

    #[test]
    fn test_toggle_play() {
        let (mut session, _) = session();
        session.toggle_play();
        assert!(session.is_playing());
        session.toggle_play();
        assert!(!session.is_playing());
        assert_eq!(session.displayed_step(), None);
    }

    #[test]
    fn test_layout_change_restarts_playback() {
        let (mut session, _) = session();
        session.start();
        session.set_beats(8);
        assert!(session.is_playing());
        assert_eq!(session.snapshot().pattern.steps(), 32);
        assert!(session.displayed_step().is_some_and(|s| s < 32));
        session.stop();
    }
}
