//! Cadenza — text-based music sequencer.
//!
//! The CLI is the host around the compiler and scheduler: it renders
//! diagnostics, dumps compiled events, and drives playback headlessly:
//!   cadenza check song.seq
//!   cadenza events song.seq --json
//!   cadenza play song.seq [--duration 10] [--no-loop] [--mute drums]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use cadenza::audio::ToneEngine;
use cadenza::dsl::{CompiledSong, Compiler};
use cadenza::event::EventKind;
use cadenza::sched::{Scheduler, SchedulerConfig, LOOKAHEAD_MS};

#[derive(Parser)]
#[command(name = "cadenza", about = "Text-based music sequencer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file and report the result
    Check {
        /// Path to a .seq source file
        file: PathBuf,
    },
    /// Compile a source file and dump its event list
    Events {
        /// Path to a .seq source file
        file: PathBuf,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Play a source file through the default audio device
    Play {
        /// Path to a .seq source file
        file: PathBuf,
        /// Stop after this many seconds (omit to play out or loop forever)
        #[arg(short, long)]
        duration: Option<f64>,
        /// Play straight through instead of looping
        #[arg(long)]
        no_loop: bool,
        /// Mute these tracks
        #[arg(long = "mute", value_name = "TRACK")]
        muted: Vec<String>,
        /// Solo these tracks (overrides mute)
        #[arg(long = "solo", value_name = "TRACK")]
        soloed: Vec<String>,
        /// Master volume, 0.0 to 1.0
        #[arg(long, default_value_t = 0.8)]
        volume: f32,
    },
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { file } => check(&file),
        Commands::Events { file, json } => events(&file, json),
        Commands::Play {
            file,
            duration,
            no_loop,
            muted,
            soloed,
            volume,
        } => play(&file, duration, no_loop, &muted, &soloed, volume),
    }
}

/// Compile a file, rendering any diagnostic to stderr and exiting.
fn load_and_compile(file: &Path) -> io::Result<CompiledSong> {
    let source = std::fs::read_to_string(file)?;
    match Compiler::compile(&source) {
        Ok(song) => Ok(song),
        Err(e) => {
            eprintln!("{}:{}:{}: error: {}", file.display(), e.line, e.col, e.message);
            std::process::exit(1);
        }
    }
}

fn check(file: &Path) -> io::Result<()> {
    let song = load_and_compile(file)?;
    println!(
        "ok: {} events, {:.0} bpm, {:.3}s",
        song.event_count(),
        song.bpm,
        song.total_duration
    );
    Ok(())
}

fn events(file: &Path, json: bool) -> io::Result<()> {
    let song = load_and_compile(file)?;

    if json {
        let rendered = serde_json::to_string_pretty(&song)
            .map_err(|e| io::Error::other(e.to_string()))?;
        println!("{rendered}");
        return Ok(());
    }

    println!(
        "{:>8}  {:>7}  {:<4}  {:>4}  {:>9}  {:>4}  {:<10}  {:<8}  track",
        "time", "dur", "kind", "midi", "freq", "vel", "instrument", "waveform"
    );
    for e in &song.events {
        let kind = match e.kind {
            EventKind::Note => "note",
            EventKind::Rest => "rest",
        };
        let midi = e.midi.map_or("-".to_string(), |m| m.to_string());
        let freq = e.freq.map_or("-".to_string(), |f| format!("{f:.2}"));
        println!(
            "{:>8.3}  {:>7.3}  {:<4}  {:>4}  {:>9}  {:>4.2}  {:<10}  {:<8}  {}",
            e.t,
            e.dur,
            kind,
            midi,
            freq,
            e.velocity,
            e.instrument,
            e.waveform.name(),
            e.track.as_deref().unwrap_or("-")
        );
    }
    println!(
        "{} events, {:.0} bpm, {:.3}s total",
        song.event_count(),
        song.bpm,
        song.total_duration
    );
    Ok(())
}

fn play(
    file: &Path,
    duration: Option<f64>,
    no_loop: bool,
    muted: &[String],
    soloed: &[String],
    volume: f32,
) -> io::Result<()> {
    let song = load_and_compile(file)?;
    let event_count = song.event_count();

    let mut engine = ToneEngine::new()
        .map_err(|e| io::Error::other(format!("audio init failed: {e}")))?;
    let _ = engine.set_volume(volume);

    let mut scheduler = Scheduler::new(SchedulerConfig {
        events: song.events,
        bpm: song.bpm,
        loop_bars: song.settings.loop_bars,
        loop_enabled: !no_loop,
    });
    for track in muted {
        scheduler.set_track_muted(track, true);
    }
    for track in soloed {
        scheduler.set_track_soloed(track, true);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        stop_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| io::Error::other(format!("failed to set Ctrl-C handler: {e}")))?;

    eprintln!(
        "Playing {} at {:.0} BPM, {event_count} events... (Ctrl-C to stop)",
        file.display(),
        song.bpm
    );

    scheduler.play(&mut engine);

    let started = Instant::now();
    let limit = duration.map(Duration::from_secs_f64);

    while scheduler.is_playing() {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        if let Some(t) = limit {
            if started.elapsed() >= t {
                break;
            }
        }
        scheduler.tick(&mut engine);
        std::thread::sleep(Duration::from_millis(LOOKAHEAD_MS));
    }

    scheduler.stop(&mut engine);
    // Give the audio thread a moment to drain the cancel.
    std::thread::sleep(Duration::from_millis(50));
    eprintln!("Stopped.");
    Ok(())
}
