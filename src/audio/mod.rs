//! Audio output using cpal - a small synthesized drum kit
//!
//! The stream's rendered frame count is the audio clock: a trigger for time
//! `t` starts on frame `round(t * sample_rate)`, so the scheduler's
//! timestamps land sample-accurately regardless of callback timing.
use std::f32::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::sequencer::playback::{AudioClock, VoiceBank};
use crate::sequencer::track::Track;

const MASTER_GAIN: f32 = 0.5;
/// Upper bound on simultaneously sounding voices
const MAX_VOICES: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("failed to query output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build output stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

/// Frames rendered so far, read as seconds
#[derive(Debug)]
pub struct FrameClock {
    frames: AtomicU64,
    sample_rate: f64,
}

impl FrameClock {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            frames: AtomicU64::new(0),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::AcqRel);
    }

    fn frame_at(&self, time: f64) -> u64 {
        (time.max(0.0) * self.sample_rate).round() as u64
    }
}

impl AudioClock for FrameClock {
    fn now(&self) -> f64 {
        self.frames() as f64 / self.sample_rate
    }
}

/// A trigger waiting for its start frame
#[derive(Debug, Clone, Copy)]
struct Trigger {
    track: Track,
    frame: u64,
}

/// Cloneable handle that queues triggers for the audio callback
#[derive(Clone)]
pub struct SynthVoices {
    sender: Sender<Trigger>,
    clock: Arc<FrameClock>,
}

impl VoiceBank for SynthVoices {
    fn trigger(&mut self, track: Track, time: f64) {
        let frame = self.clock.frame_at(time);
        // Only fails once the stream is gone, when nothing can sound anyway
        let _ = self.sender.send(Trigger { track, frame });
    }
}

pub struct DrumSynth {
    _stream: cpal::Stream,
    voices: SynthVoices,
}

impl DrumSynth {
    /// Open the default output device and start rendering silence
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let config = device.default_output_config()?;

        let format = config.sample_format();
        if format != cpal::SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(format));
        }

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;
        let clock = Arc::new(FrameClock::new(sample_rate as f64));
        let (sender, receiver) = channel();

        let mut renderer = Renderer::new(sample_rate, receiver);
        let render_clock = Arc::clone(&clock);
        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let start = render_clock.frames();
                let frames = renderer.render(data, channels, start);
                render_clock.advance(frames);
            },
            |err| error!(%err, "audio stream error"),
            None,
        )?;
        stream.play()?;

        info!(sample_rate, channels, "audio output started");
        Ok(Self {
            _stream: stream,
            voices: SynthVoices { sender, clock },
        })
    }

    pub fn voices(&self) -> SynthVoices {
        self.voices.clone()
    }

    pub fn clock(&self) -> Arc<FrameClock> {
        Arc::clone(&self.voices.clock)
    }
}

/// Audio-thread side: pending triggers and sounding voices
struct Renderer {
    sample_rate: f32,
    receiver: Receiver<Trigger>,
    pending: Vec<Trigger>,
    active: Vec<Voice>,
    seed: u32,
}

impl Renderer {
    fn new(sample_rate: f32, receiver: Receiver<Trigger>) -> Self {
        Self {
            sample_rate,
            receiver,
            pending: Vec::with_capacity(MAX_VOICES),
            active: Vec::with_capacity(MAX_VOICES),
            seed: 0x1234_5678,
        }
    }

    /// Fill an interleaved buffer, returning the number of frames written
    fn render(&mut self, data: &mut [f32], channels: usize, start: u64) -> u64 {
        while let Ok(trigger) = self.receiver.try_recv() {
            if self.pending.len() < MAX_VOICES {
                self.pending.push(trigger);
            }
        }

        let channels = channels.max(1);
        let mut frame = start;
        for out in data.chunks_mut(channels) {
            self.start_due(frame);
            let mut mix = 0.0;
            self.active.retain_mut(|voice| match voice.next_sample() {
                Some(sample) => {
                    mix += sample;
                    true
                }
                None => false,
            });
            out.fill(mix * MASTER_GAIN);
            frame += 1;
        }
        frame - start
    }

    fn start_due(&mut self, frame: u64) {
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].frame <= frame {
                let trigger = self.pending.swap_remove(i);
                if self.active.len() < MAX_VOICES {
                    self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                    self.active.push(Voice::new(trigger.track, self.sample_rate, self.seed | 1));
                }
            } else {
                i += 1;
            }
        }
    }
}

/// Exponential ramp from `from` to `to` over `length` seconds
fn ramp(from: f32, to: f32, length: f32, t: f32) -> f32 {
    from * (to / from).powf((t / length).min(1.0))
}

/// One-pole filter pair used to shape noise
#[derive(Debug, Clone, Copy, Default)]
struct NoiseFilter {
    highpass: Option<f32>,
    lowpass: Option<f32>,
    prev_in: f32,
    prev_hp: f32,
    prev_lp: f32,
}

impl NoiseFilter {
    fn highpass(cutoff: f32, sample_rate: f32) -> Self {
        Self {
            highpass: Some(hp_coefficient(cutoff, sample_rate)),
            ..Default::default()
        }
    }

    fn bandpass(center: f32, sample_rate: f32) -> Self {
        Self {
            highpass: Some(hp_coefficient(center * 0.7, sample_rate)),
            lowpass: Some(lp_coefficient(center * 1.4, sample_rate)),
            ..Default::default()
        }
    }

    fn process(&mut self, x: f32) -> f32 {
        let mut y = x;
        if let Some(a) = self.highpass {
            self.prev_hp = a * (self.prev_hp + x - self.prev_in);
            self.prev_in = x;
            y = self.prev_hp;
        }
        if let Some(a) = self.lowpass {
            self.prev_lp += a * (y - self.prev_lp);
            y = self.prev_lp;
        }
        y
    }
}

fn hp_coefficient(cutoff: f32, sample_rate: f32) -> f32 {
    let rc = 1.0 / (2.0 * PI * cutoff);
    let dt = 1.0 / sample_rate;
    rc / (rc + dt)
}

fn lp_coefficient(cutoff: f32, sample_rate: f32) -> f32 {
    let rc = 1.0 / (2.0 * PI * cutoff);
    let dt = 1.0 / sample_rate;
    dt / (rc + dt)
}

/// A sounding one-shot
struct Voice {
    track: Track,
    sample_rate: f32,
    frame: u32,
    length: u32,
    phase: f32,
    noise: u32,
    filter: NoiseFilter,
}

impl Voice {
    fn new(track: Track, sample_rate: f32, seed: u32) -> Self {
        let (seconds, filter) = match track {
            Track::Kick => (0.5, NoiseFilter::default()),
            Track::Snare => (0.2, NoiseFilter::highpass(1000.0, sample_rate)),
            Track::HihatClosed => (0.05, NoiseFilter::highpass(7000.0, sample_rate)),
            Track::HihatOpen => (0.4, NoiseFilter::highpass(7000.0, sample_rate)),
            Track::TomLow => (0.4, NoiseFilter::default()),
            Track::Clap => (0.15, NoiseFilter::bandpass(1500.0, sample_rate)),
            Track::Metronome => (0.1, NoiseFilter::default()),
        };
        Self {
            track,
            sample_rate,
            frame: 0,
            length: (seconds * sample_rate) as u32,
            phase: 0.0,
            noise: seed,
            filter,
        }
    }

    fn next_noise(&mut self) -> f32 {
        // xorshift32
        self.noise ^= self.noise << 13;
        self.noise ^= self.noise >> 17;
        self.noise ^= self.noise << 5;
        self.noise as f32 / u32::MAX as f32 * 2.0 - 1.0
    }

    fn tone(&mut self, frequency: f32) -> f32 {
        self.phase = (self.phase + frequency / self.sample_rate).fract();
        (self.phase * 2.0 * PI).sin()
    }

    fn next_sample(&mut self) -> Option<f32> {
        if self.frame >= self.length {
            return None;
        }
        let t = self.frame as f32 / self.sample_rate;
        self.frame += 1;

        let sample = match self.track {
            Track::Kick => self.tone(ramp(150.0, 0.01, 0.5, t)) * ramp(1.0, 0.01, 0.5, t),
            Track::TomLow => self.tone(ramp(100.0, 50.0, 0.4, t)) * ramp(0.7, 0.01, 0.4, t),
            Track::Metronome => self.tone(800.0) * ramp(1.0, 0.01, 0.1, t),
            Track::Snare => {
                let noise = self.next_noise();
                let noise = self.filter.process(noise) * ramp(0.8, 0.01, 0.2, t);
                let body = self.tone(200.0) * ramp(0.5, 0.01, 0.1, t);
                noise + body
            }
            Track::HihatClosed => {
                let noise = self.next_noise();
                self.filter.process(noise) * ramp(0.6, 0.01, 0.05, t)
            }
            Track::HihatOpen => {
                let noise = self.next_noise();
                self.filter.process(noise) * ramp(0.6, 0.01, 0.4, t)
            }
            Track::Clap => {
                let noise = self.next_noise();
                self.filter.process(noise) * ramp(0.7, 0.01, 0.15, t)
            }
        };
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f32 = 48_000.0;

    #[test]
    fn test_frame_clock() {
        let clock = FrameClock::new(48_000.0);
        assert_eq!(clock.now(), 0.0);
        clock.advance(24_000);
        assert_eq!(clock.now(), 0.5);
        assert_eq!(clock.frame_at(0.25), 12_000);
        assert_eq!(clock.frame_at(-1.0), 0);
    }

    #[test]
    fn test_every_voice_ends() {
        for track in Track::ALL {
            let mut voice = Voice::new(track, RATE, 7);
            let mut frames = 0;
            while let Some(sample) = voice.next_sample() {
                assert!(sample.is_finite());
                frames += 1;
            }
            assert!(frames > 0 && frames <= RATE as u32 / 2, "{track}");
        }
    }

    #[test]
    fn test_trigger_starts_on_its_frame() {
        let (sender, receiver) = channel();
        let mut renderer = Renderer::new(RATE, receiver);
        sender.send(Trigger { track: Track::Metronome, frame: 100 }).unwrap();

        let mut buffer = vec![0.0f32; 256];
        assert_eq!(renderer.render(&mut buffer, 2, 0), 128);
        // Interleaved stereo: frame 100 is samples 200 and 201
        assert!(buffer[..200].iter().all(|&s| s == 0.0));
        assert!(buffer[202..].iter().any(|&s| s != 0.0));
        assert_eq!(buffer[202], buffer[203]);
    }

    #[test]
    fn test_late_trigger_starts_immediately() {
        let (sender, receiver) = channel();
        let mut renderer = Renderer::new(RATE, receiver);
        sender.send(Trigger { track: Track::Kick, frame: 10 }).unwrap();

        let mut buffer = vec![0.0f32; 64];
        renderer.render(&mut buffer, 1, 1_000);
        assert_eq!(renderer.active.len(), 1);
        assert!(renderer.pending.is_empty());
    }
}
