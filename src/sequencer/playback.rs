//! Playback engine - lookahead scheduling of voice triggers
//!
//! A background thread wakes every `SchedulerConfig::interval` of wall-clock
//! time and hands the voice bank every step that falls due within
//! `schedule_ahead` seconds on the audio clock. Trigger times come from the
//! audio clock, so wake-up jitter never reaches the sound.
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use super::swing::step_duration;
use super::track::Track;
use super::{SharedSnapshot, Snapshot};

/// Source of the time base triggers are scheduled against, in seconds
pub trait AudioClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall-clock time since creation, for headless use
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for SystemClock {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// Fire-and-forget percussion output. `time` is on the audio clock.
pub trait VoiceBank: Send {
    fn trigger(&mut self, track: Track, time: f64);
}

impl<V: VoiceBank + ?Sized> VoiceBank for Box<V> {
    fn trigger(&mut self, track: Track, time: f64) {
        (**self).trigger(track, time);
    }
}

impl<V: VoiceBank> VoiceBank for Option<V> {
    fn trigger(&mut self, track: Track, time: f64) {
        if let Some(bank) = self {
            bank.trigger(track, time);
        }
    }
}

impl<A: VoiceBank, B: VoiceBank> VoiceBank for (A, B) {
    fn trigger(&mut self, track: Track, time: f64) {
        self.0.trigger(track, time);
        self.1.trigger(track, time);
    }
}

/// Forwards scheduled cells to the voice bank. Mute filtering happens
/// before this point, so every call reaches the bank.
pub struct VoiceDispatcher<V> {
    bank: V,
}

impl<V: VoiceBank> VoiceDispatcher<V> {
    pub fn new(bank: V) -> Self {
        Self { bank }
    }

    pub fn dispatch(&mut self, track: Track, time: f64) {
        trace!(track = track.id(), time, "trigger");
        self.bank.trigger(track, time);
    }

    pub fn bank(&self) -> &V {
        &self.bank
    }

    pub fn into_inner(self) -> V {
        self.bank
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Wall-clock time between scheduling passes
    pub interval: Duration,
    /// How far past the audio clock each pass schedules, in seconds
    pub schedule_ahead: f64,
    /// Delay before the first step after start, in seconds
    pub start_offset: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(25),
            schedule_ahead: 0.1,
            start_offset: 0.05,
        }
    }
}

/// Playback position and the audio-clock time of the next step.
///
/// Subdivision and bar length are fixed when playback starts. Tempo, swing,
/// cells and mutes are read from each pass's snapshot.
#[derive(Debug, Clone)]
pub struct Scheduler {
    config: SchedulerConfig,
    next_event_time: f64,
    cursor: usize,
    subdivision: u32,
    total_steps: usize,
}

impl Scheduler {
    pub fn start(config: SchedulerConfig, now: f64, snapshot: &Snapshot) -> Self {
        Self {
            config,
            next_event_time: now + config.start_offset,
            cursor: 0,
            subdivision: snapshot.transport.subdivision(),
            total_steps: snapshot.transport.total_steps(),
        }
    }

    /// Step whose events are scheduled next
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn next_event_time(&self) -> f64 {
        self.next_event_time
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// One step behind the cursor: the step most recently handed to the bank
    pub fn displayed_step(&self) -> usize {
        (self.cursor + self.total_steps - 1) % self.total_steps
    }

    /// Schedule every step due before `now + schedule_ahead`.
    /// Returns how many steps were scheduled.
    pub fn pass<V: VoiceBank>(
        &mut self,
        now: f64,
        snapshot: &Snapshot,
        dispatcher: &mut VoiceDispatcher<V>,
    ) -> usize {
        let horizon = now + self.config.schedule_ahead;
        let mut scheduled = 0;
        while self.next_event_time < horizon {
            for track in Track::ALL {
                if snapshot.is_audible(track, self.cursor) {
                    dispatcher.dispatch(track, self.next_event_time);
                }
            }
            self.advance(snapshot);
            scheduled += 1;
        }
        scheduled
    }

    fn advance(&mut self, snapshot: &Snapshot) {
        let base = 60.0 / snapshot.transport.tempo() as f64 / self.subdivision as f64;
        self.next_event_time += step_duration(self.cursor, base, snapshot.transport.swing() as f64);
        self.cursor = (self.cursor + 1) % self.total_steps;
    }
}

const IDLE: usize = usize::MAX;

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Owns the scheduling thread and publishes the playhead for display
pub struct PlaybackEngine {
    config: SchedulerConfig,
    cursor: Arc<AtomicUsize>,
    total_steps: usize,
    worker: Option<Worker>,
}

impl PlaybackEngine {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            cursor: Arc::new(AtomicUsize::new(IDLE)),
            total_steps: 0,
            worker: None,
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    pub fn start<V>(&mut self, shared: SharedSnapshot, clock: Arc<dyn AudioClock>, voices: V)
    where
        V: VoiceBank + 'static,
    {
        if self.is_running() {
            return;
        }

        let snapshot = shared.load();
        let mut scheduler = Scheduler::start(self.config, clock.now(), &snapshot);
        self.total_steps = scheduler.total_steps();
        self.cursor.store(scheduler.cursor(), Ordering::Release);

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let cursor = Arc::clone(&self.cursor);
        let interval = self.config.interval;

        info!(
            tempo = snapshot.transport.tempo(),
            steps = self.total_steps,
            swing = snapshot.transport.swing(),
            "playback started"
        );

        let spawned = thread::Builder::new()
            .name("rhythmcraft-scheduler".into())
            .spawn(move || {
                let mut dispatcher = VoiceDispatcher::new(voices);
                while !thread_stop.load(Ordering::Acquire) {
                    let snapshot = shared.load();
                    let scheduled = scheduler.pass(clock.now(), &snapshot, &mut dispatcher);
                    if scheduled > 0 {
                        debug!(scheduled, cursor = scheduler.cursor(), "scheduling pass");
                    }
                    cursor.store(scheduler.cursor(), Ordering::Release);
                    thread::park_timeout(interval);
                }
            });

        match spawned {
            Ok(handle) => self.worker = Some(Worker { stop, handle }),
            Err(err) => {
                warn!(%err, "failed to spawn scheduler thread");
                self.cursor.store(IDLE, Ordering::Release);
            }
        }
    }

    /// Halt scheduling. Returns once no further pass can run. Triggers
    /// already handed to the voice bank still sound.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.store(true, Ordering::Release);
            worker.handle.thread().unpark();
            if worker.handle.join().is_err() {
                warn!("scheduler thread panicked");
            }
            info!("playback stopped");
        }
        self.cursor.store(IDLE, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Step to highlight: one behind the scheduling cursor, `None` when idle
    pub fn displayed_step(&self) -> Option<usize> {
        match self.cursor.load(Ordering::Acquire) {
            IDLE => None,
            cursor => Some((cursor + self.total_steps - 1) % self.total_steps),
        }
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
