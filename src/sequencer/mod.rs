//! Core sequencer state - pattern grid, mutes and transport settings
//!
//! Mutations go through `PatternStore`, which publishes a fresh immutable
//! `Snapshot` after every change. The scheduler only ever reads snapshots.
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

pub mod playback;
pub mod proposal;
pub mod rudiment;
pub mod swing;
pub mod track;

use proposal::ProposalError;
use rudiment::Rudiment;
use track::Track;

pub const MIN_TEMPO: u32 = 40;
pub const MAX_TEMPO: u32 = 240;
pub const MIN_BEATS: u32 = 2;
pub const MAX_BEATS: u32 = 8;
pub const MIN_SUBDIVISION: u32 = 2;
pub const MAX_SUBDIVISION: u32 = 8;
pub const MAX_SWING: u32 = 50;

pub const DEFAULT_TEMPO: u32 = 110;
pub const DEFAULT_BEATS: u32 = 4;
pub const DEFAULT_SUBDIVISION: u32 = 4;

/// Boolean grid, one row per track, all rows the same length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    cells: Vec<Vec<bool>>,
    steps: usize,
}

impl Pattern {
    pub fn new(steps: usize) -> Self {
        Self {
            cells: vec![vec![false; steps]; Track::COUNT],
            steps,
        }
    }

    /// Build a pattern from a possibly ragged matrix. Extra rows are ignored,
    /// long rows truncated, short or missing rows padded with inactive cells.
    pub fn from_rows<R: AsRef<[bool]>>(rows: &[R], steps: usize) -> Self {
        let mut pattern = Self::new(steps);
        for (cells, row) in pattern.cells.iter_mut().zip(rows) {
            let row = row.as_ref();
            let n = row.len().min(steps);
            cells[..n].copy_from_slice(&row[..n]);
        }
        pattern
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn get(&self, track: Track, step: usize) -> bool {
        self.cells[track.index()].get(step).copied().unwrap_or(false)
    }

    pub fn set(&mut self, track: Track, step: usize, value: bool) {
        if let Some(cell) = self.cells[track.index()].get_mut(step) {
            *cell = value;
        }
    }

    /// Flip a cell and return its new value
    pub fn toggle(&mut self, track: Track, step: usize) -> bool {
        let value = !self.get(track, step);
        self.set(track, step, value);
        self.get(track, step)
    }

    pub fn row(&self, track: Track) -> &[bool] {
        &self.cells[track.index()]
    }

    pub fn clear(&mut self) {
        for row in &mut self.cells {
            row.fill(false);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|row| row.iter().all(|cell| !cell))
    }

    /// Change the step count, keeping cells up to the shorter length
    pub fn resize(&mut self, steps: usize) {
        for row in &mut self.cells {
            row.resize(steps, false);
        }
        self.steps = steps;
    }
}

/// Tempo, bar layout and swing. Setters clamp into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    tempo: u32,
    beats: u32,
    subdivision: u32,
    swing: u32,
}

impl TransportConfig {
    pub fn new(tempo: u32, beats: u32, subdivision: u32, swing: u32) -> Self {
        let mut config = Self::default();
        config.set_tempo(tempo);
        config.set_beats(beats);
        config.set_subdivision(subdivision);
        config.set_swing(swing);
        config
    }

    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn set_tempo(&mut self, tempo: u32) {
        self.tempo = tempo.clamp(MIN_TEMPO, MAX_TEMPO);
    }

    pub fn beats(&self) -> u32 {
        self.beats
    }

    pub fn set_beats(&mut self, beats: u32) {
        self.beats = beats.clamp(MIN_BEATS, MAX_BEATS);
    }

    pub fn subdivision(&self) -> u32 {
        self.subdivision
    }

    pub fn set_subdivision(&mut self, subdivision: u32) {
        self.subdivision = subdivision.clamp(MIN_SUBDIVISION, MAX_SUBDIVISION);
    }

    /// Swing amount in percent (0..=50)
    pub fn swing(&self) -> u32 {
        self.swing
    }

    pub fn set_swing(&mut self, swing: u32) {
        self.swing = swing.min(MAX_SWING);
    }

    pub fn total_steps(&self) -> usize {
        (self.beats * self.subdivision) as usize
    }

    /// Straight step length in seconds
    pub fn step_seconds(&self) -> f64 {
        60.0 / self.tempo as f64 / self.subdivision as f64
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tempo: DEFAULT_TEMPO,
            beats: DEFAULT_BEATS,
            subdivision: DEFAULT_SUBDIVISION,
            swing: 0,
        }
    }
}

/// Per-track mute flags, independent of the cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MuteSet([bool; Track::COUNT]);

impl MuteSet {
    pub fn is_muted(&self, track: Track) -> bool {
        self.0[track.index()]
    }

    pub fn set(&mut self, track: Track, muted: bool) {
        self.0[track.index()] = muted;
    }

    pub fn toggle(&mut self, track: Track) -> bool {
        self.0[track.index()] = !self.0[track.index()];
        self.0[track.index()]
    }

    pub fn clear(&mut self) {
        self.0 = [false; Track::COUNT];
    }
}

/// Everything playback and export read, frozen at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub pattern: Pattern,
    pub transport: TransportConfig,
    pub mutes: MuteSet,
}

impl Snapshot {
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            pattern: Pattern::new(transport.total_steps()),
            transport,
            mutes: MuteSet::default(),
        }
    }

    /// A cell that should actually sound: active and not muted
    pub fn is_audible(&self, track: Track, step: usize) -> bool {
        self.pattern.get(track, step) && !self.mutes.is_muted(track)
    }

    fn sync_pattern_length(&mut self) {
        let steps = self.transport.total_steps();
        if self.pattern.steps() != steps {
            self.pattern.resize(steps);
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

/// Shared slot holding the latest published snapshot
#[derive(Debug, Clone)]
pub struct SharedSnapshot {
    current: Arc<Mutex<Arc<Snapshot>>>,
}

impl SharedSnapshot {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: Arc::new(Mutex::new(Arc::new(snapshot))),
        }
    }

    /// Latest snapshot. Cheap: only the `Arc` is cloned.
    pub fn load(&self) -> Arc<Snapshot> {
        Arc::clone(&self.lock())
    }

    pub fn publish(&self, snapshot: Snapshot) {
        *self.lock() = Arc::new(snapshot);
    }

    fn lock(&self) -> MutexGuard<'_, Arc<Snapshot>> {
        // A panic while holding the lock cannot leave a half-written Arc behind
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owner of the editable session state. Every mutation copies the current
/// snapshot, edits the copy and publishes it in one step.
#[derive(Debug)]
pub struct PatternStore {
    shared: SharedSnapshot,
    active_rudiment: Option<&'static Rudiment>,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::with_snapshot(Snapshot::default())
    }

    pub fn with_snapshot(mut snapshot: Snapshot) -> Self {
        snapshot.sync_pattern_length();
        Self {
            shared: SharedSnapshot::new(snapshot),
            active_rudiment: None,
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.shared.load()
    }

    /// Handle for readers on other threads
    pub fn shared(&self) -> SharedSnapshot {
        self.shared.clone()
    }

    pub fn transport(&self) -> TransportConfig {
        self.snapshot().transport
    }

    pub fn active_rudiment(&self) -> Option<&'static Rudiment> {
        self.active_rudiment
    }

    fn update<T>(&mut self, edit: impl FnOnce(&mut Snapshot) -> T) -> T {
        let mut next = Snapshot::clone(&self.shared.load());
        let result = edit(&mut next);
        next.sync_pattern_length();
        self.shared.publish(next);
        result
    }

    pub fn is_active(&self, track: Track, step: usize) -> bool {
        self.snapshot().pattern.get(track, step)
    }

    pub fn set_cell(&mut self, track: Track, step: usize, value: bool) {
        self.update(|s| s.pattern.set(track, step, value));
    }

    /// Flip a cell and return its new value
    pub fn toggle_cell(&mut self, track: Track, step: usize) -> bool {
        self.update(|s| s.pattern.toggle(track, step))
    }

    pub fn is_muted(&self, track: Track) -> bool {
        self.snapshot().mutes.is_muted(track)
    }

    pub fn toggle_mute(&mut self, track: Track) -> bool {
        let muted = self.update(|s| s.mutes.toggle(track));
        debug!(track = track.id(), muted, "mute toggled");
        muted
    }

    pub fn set_tempo(&mut self, tempo: u32) {
        self.update(|s| s.transport.set_tempo(tempo));
    }

    pub fn set_swing(&mut self, swing: u32) {
        self.update(|s| s.transport.set_swing(swing));
    }

    pub fn set_beats(&mut self, beats: u32) {
        self.update(|s| s.transport.set_beats(beats));
    }

    pub fn set_subdivision(&mut self, subdivision: u32) {
        self.update(|s| s.transport.set_subdivision(subdivision));
    }

    /// Clear all cells and mutes, and forget the loaded rudiment
    pub fn clear(&mut self) {
        self.update(|s| {
            s.pattern.clear();
            s.mutes.clear();
        });
        self.active_rudiment = None;
    }

    /// Replace the grid with a rudiment on the snare row
    pub fn load_rudiment(&mut self, rudiment: &'static Rudiment) {
        self.update(|s| s.pattern = rudiment.to_pattern(s.transport.total_steps()));
        self.active_rudiment = Some(rudiment);
        debug!(rudiment = rudiment.id, "rudiment loaded");
    }

    /// Replace the grid with a proposed pattern. On error the grid is untouched.
    pub fn apply_proposal(&mut self, json: &str) -> Result<(), ProposalError> {
        let steps = self.transport().total_steps();
        let pattern = proposal::parse_proposal(json, steps).inspect_err(|err| {
            warn!(%err, "pattern proposal rejected");
        })?;
        self.update(|s| s.pattern = pattern);
        Ok(())
    }
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new()
    }
}
