//! RhythmCraft - a drum step sequencer library
//!
//! This library provides the core components of the sequencer:
//! - Pattern store with copy-on-write snapshots of the grid, mutes and transport
//! - Swing timing shared by playback and export
//! - Lookahead playback scheduler driving an abstract voice bank
//! - Synthesized percussion voice bank (cpal) and live MIDI output (midir)
//! - Standard MIDI File export

pub mod audio;
pub mod midi;
pub mod sequencer;
pub mod session;

// Re-export commonly used types
pub use audio::{AudioError, DrumSynth, FrameClock, SynthVoices};
pub use midi::export::{encode_midi, export_to_file, ExportError};
pub use midi::{MidiError, MidiOutputDevice, MidiVoiceBank};
pub use sequencer::playback::{
    AudioClock, PlaybackEngine, Scheduler, SchedulerConfig, SystemClock, VoiceBank,
    VoiceDispatcher,
};
pub use sequencer::proposal::ProposalError;
pub use sequencer::rudiment::{Rudiment, Sticking, RUDIMENTS};
pub use sequencer::swing::step_duration;
pub use sequencer::track::{NoteSymbol, Track, VoiceGroup};
pub use sequencer::{MuteSet, Pattern, PatternStore, SharedSnapshot, Snapshot, TransportConfig};
pub use session::Session;
