//! MIDI output using midir, plus file export
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use midir::{MidiOutput, MidiOutputConnection};
use tracing::{info, warn};

use crate::sequencer::playback::{AudioClock, VoiceBank};
use crate::sequencer::track::Track;

pub mod export;

const CLIENT_NAME: &str = "RhythmCraft MIDI Output";
/// Channel 10 (zero based 9) is the General MIDI percussion channel
const PERCUSSION_CHANNEL: u8 = 9;

#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("failed to create MIDI output: {0}")]
    Init(#[from] midir::InitError),

    #[error("invalid MIDI port index {0}")]
    InvalidPort(usize),

    #[error("failed to connect to MIDI port: {0}")]
    Connect(String),

    #[error("failed to send MIDI message: {0}")]
    Send(#[from] midir::SendError),

    #[error("no MIDI port connected")]
    NotConnected,
}

pub struct MidiOutputDevice {
    connection: Option<MidiOutputConnection>,
}

impl MidiOutputDevice {
    pub fn new() -> Self {
        Self { connection: None }
    }

    pub fn available_ports() -> Vec<String> {
        match MidiOutput::new(CLIENT_NAME) {
            Ok(midi_out) => midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect(),
            Err(err) => {
                warn!(%err, "MIDI output unavailable");
                vec![]
            }
        }
    }

    pub fn connect(&mut self, port_index: usize) -> Result<(), MidiError> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;

        let ports = midi_out.ports();
        let port = ports.get(port_index).ok_or(MidiError::InvalidPort(port_index))?;
        let name = midi_out.port_name(port).unwrap_or_default();

        let connection = midi_out
            .connect(port, "rhythmcraft")
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        info!(port = %name, "MIDI output connected");
        self.connection = Some(connection);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn send_note_on(&mut self, note: u8, velocity: u8) -> Result<(), MidiError> {
        let conn = self.connection.as_mut().ok_or(MidiError::NotConnected)?;
        conn.send(&[0x90 | PERCUSSION_CHANNEL, note, velocity])?;
        Ok(())
    }

    pub fn send_note_off(&mut self, note: u8) -> Result<(), MidiError> {
        let conn = self.connection.as_mut().ok_or(MidiError::NotConnected)?;
        conn.send(&[0x80 | PERCUSSION_CHANNEL, note, 0])?;
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
    }

    /// Hand the connection to a voice bank that plays triggers at their
    /// scheduled time on `clock`.
    pub fn into_voice_bank(self, clock: Arc<dyn AudioClock>) -> Result<MidiVoiceBank, MidiError> {
        if !self.is_connected() {
            return Err(MidiError::NotConnected);
        }
        Ok(MidiVoiceBank::spawn(self, clock))
    }
}

impl Default for MidiOutputDevice {
    fn default() -> Self {
        Self::new()
    }
}

/// Live MIDI voice bank. Triggers arrive ahead of time from the scheduler;
/// a sender thread holds each one until the clock reaches it.
#[derive(Clone)]
pub struct MidiVoiceBank {
    sender: Sender<(u8, f64)>,
}

impl MidiVoiceBank {
    fn spawn(mut device: MidiOutputDevice, clock: Arc<dyn AudioClock>) -> Self {
        let (sender, receiver) = channel::<(u8, f64)>();

        thread::spawn(move || {
            // Ends once every clone of the sender is gone
            for (note, time) in receiver {
                let wait = time - clock.now();
                if wait > 0.0 {
                    thread::sleep(Duration::from_secs_f64(wait));
                }
                // Percussion ignores note length; release right away
                let sent = device
                    .send_note_on(note, export::VELOCITY)
                    .and_then(|()| device.send_note_off(note));
                if let Err(err) = sent {
                    warn!(%err, note, "MIDI trigger dropped");
                }
            }
            device.disconnect();
        });

        Self { sender }
    }
}

impl VoiceBank for MidiVoiceBank {
    fn trigger(&mut self, track: Track, time: f64) {
        // The sender thread only exits when all senders are dropped
        let _ = self.sender.send((track.midi_note(), time));
    }
}

pub fn midi_note_name(note: u8) -> String {
    let note_names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note / 12) as i32 - 1;
    let note_index = (note % 12) as usize;
    format!("{}{}", note_names[note_index], octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_names() {
        assert_eq!(midi_note_name(36), "C2");
        assert_eq!(midi_note_name(42), "F#2");
        assert_eq!(midi_note_name(76), "E5");
    }

    #[test]
    fn test_send_without_connection() {
        let mut device = MidiOutputDevice::new();
        assert!(matches!(device.send_note_on(36, 100), Err(MidiError::NotConnected)));
    }
}
