//! Headless MIDI export: build a pattern from flags and write a `.mid` file

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use rhythmcraft::{export_to_file, sequencer, PatternStore, Rudiment, Track, RUDIMENTS};

/// Export a RhythmCraft pattern as a Standard MIDI File
#[derive(Parser)]
#[command(name = "rhythmcraft-cli")]
#[command(about = "Export a drum pattern as a Standard MIDI File")]
struct Cli {
    /// Tempo in BPM (clamped to 40..=240)
    #[arg(long, default_value_t = sequencer::DEFAULT_TEMPO)]
    tempo: u32,

    /// Beats per bar (clamped to 2..=8)
    #[arg(long, default_value_t = sequencer::DEFAULT_BEATS)]
    beats: u32,

    /// Steps per beat (clamped to 2..=8)
    #[arg(long, default_value_t = sequencer::DEFAULT_SUBDIVISION)]
    subdivision: u32,

    /// Swing in percent (clamped to 0..=50)
    #[arg(long, default_value_t = 0)]
    swing: u32,

    /// Load a snare rudiment by id
    #[arg(long, conflicts_with = "pattern")]
    rudiment: Option<String>,

    /// Load a JSON pattern file: {"pattern": [[true, false, ...], ...]}
    #[arg(long)]
    pattern: Option<PathBuf>,

    /// Mute a track by id (repeatable)
    #[arg(long = "mute", value_parser = parse_track)]
    mutes: Vec<Track>,

    /// Output path
    #[arg(short, long, default_value = "rhythm-craft-beat.mid")]
    output: PathBuf,

    /// List rudiment and track ids, then exit
    #[arg(long)]
    list: bool,
}

fn parse_track(id: &str) -> Result<Track, String> {
    Track::from_id(id).ok_or_else(|| {
        let ids: Vec<_> = Track::ALL.iter().map(|t| t.id()).collect();
        format!("unknown track '{id}', expected one of: {}", ids.join(", "))
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.list {
        println!("Rudiments:");
        for rudiment in RUDIMENTS.iter() {
            println!("  {:<20} {}", rudiment.id, rudiment.name);
        }
        println!("Tracks:");
        for track in Track::ALL {
            println!("  {:<20} {} (note {})", track.id(), track.name(), track.midi_note());
        }
        return Ok(());
    }

    let mut store = PatternStore::new();
    store.set_tempo(cli.tempo);
    store.set_beats(cli.beats);
    store.set_subdivision(cli.subdivision);
    store.set_swing(cli.swing);

    if let Some(id) = &cli.rudiment {
        let rudiment = Rudiment::find(id).ok_or_else(|| anyhow!("unknown rudiment '{id}'"))?;
        store.load_rudiment(rudiment);
    }

    if let Some(path) = &cli.pattern {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read pattern file {}", path.display()))?;
        store
            .apply_proposal(&json)
            .with_context(|| format!("Invalid pattern file {}", path.display()))?;
    }

    for track in cli.mutes {
        if !store.is_muted(track) {
            store.toggle_mute(track);
        }
    }

    export_to_file(&cli.output, &store.snapshot())
        .with_context(|| format!("Failed to export {}", cli.output.display()))?;
    println!("Wrote {}", cli.output.display());
    Ok(())
}
