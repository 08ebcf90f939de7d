//! Lookahead scheduler — phase-locks a compiled event list to the audio
//! clock.
//!
//! An external timer drives [`Scheduler::tick`] every [`LOOKAHEAD_MS`]
//! while playing; each tick dispatches the events that fall inside the
//! next [`SCHEDULE_AHEAD_SEC`] of clock time to the backend, honoring loop
//! boundaries and per-track mute/solo. The tick is the only mutator of
//! transport state, so a single-threaded driver needs no locking.

pub mod backend;

pub use backend::{AudioBackend, PlayheadListener, StateListener};

use std::collections::HashSet;

use crate::event::{self, Event, EventKind};

/// How far ahead of the clock a tick schedules events, in seconds.
pub const SCHEDULE_AHEAD_SEC: f64 = 0.2;

/// Tick period for the external driver, in milliseconds.
pub const LOOKAHEAD_MS: u64 = 25;

/// Everything the scheduler needs to start playback.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Compiled events, sorted by onset time.
    pub events: Vec<Event>,
    pub bpm: f64,
    pub loop_bars: u32,
    pub loop_enabled: bool,
}

/// A read-only view of transport state for listeners and hosts.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSnapshot {
    pub playing: bool,
    pub loop_enabled: bool,
    pub bpm: f64,
    pub loop_bars: u32,
    pub loop_duration_sec: f64,
    pub playhead: f64,
}

/// The transport: owns the event list and all mutable playback state.
pub struct Scheduler {
    events: Vec<Event>,
    bpm: f64,
    loop_bars: u32,
    loop_enabled: bool,
    loop_duration_sec: f64,
    total_duration: f64,
    playing: bool,
    start_time: f64,
    next_index: usize,
    /// Event indices already dispatched within the current loop iteration.
    scheduled_in_loop: HashSet<usize>,
    loop_iteration: u64,
    muted: HashSet<String>,
    soloed: HashSet<String>,
    playhead: f64,
    state_listener: Option<StateListener>,
    playhead_listener: Option<PlayheadListener>,
}

impl Scheduler {
    /// Build a scheduler. Never fails: a non-positive tempo or loop length
    /// collapses the loop duration to zero, which silently selects
    /// non-looping playback.
    pub fn new(config: SchedulerConfig) -> Self {
        let loop_duration_sec = if config.bpm > 0.0 && config.loop_bars > 0 {
            config.loop_bars as f64 * 4.0 * 60.0 / config.bpm
        } else {
            0.0
        };
        let total_duration = event::total_duration(&config.events);
        Self {
            events: config.events,
            bpm: config.bpm,
            loop_bars: config.loop_bars,
            loop_enabled: config.loop_enabled,
            loop_duration_sec,
            total_duration,
            playing: false,
            start_time: 0.0,
            next_index: 0,
            scheduled_in_loop: HashSet::new(),
            loop_iteration: 0,
            muted: HashSet::new(),
            soloed: HashSet::new(),
            playhead: 0.0,
            state_listener: None,
            playhead_listener: None,
        }
    }

    /// Start playback from the beginning. No-op if already playing.
    ///
    /// The caller begins driving [`tick`](Self::tick) every
    /// [`LOOKAHEAD_MS`] afterwards.
    pub fn play(&mut self, backend: &mut dyn AudioBackend) {
        if self.playing {
            return;
        }
        backend.resume();
        self.start_time = backend.now();
        self.playing = true;
        self.next_index = 0;
        self.loop_iteration = 0;
        self.scheduled_in_loop.clear();
        self.playhead = 0.0;
        self.notify_state();
    }

    /// Stop playback, silence pending dispatches, and rewind.
    pub fn stop(&mut self, backend: &mut dyn AudioBackend) {
        backend.cancel_all();
        self.playing = false;
        self.start_time = 0.0;
        self.next_index = 0;
        self.loop_iteration = 0;
        self.scheduled_in_loop.clear();
        self.playhead = 0.0;
        self.notify_state();
    }

    /// Stop and immediately play from the beginning.
    pub fn restart(&mut self, backend: &mut dyn AudioBackend) {
        self.stop(backend);
        self.play(backend);
    }

    /// One scheduling pass. Driven externally every [`LOOKAHEAD_MS`] while
    /// playing; does nothing when stopped.
    pub fn tick(&mut self, backend: &mut dyn AudioBackend) {
        if !self.playing {
            return;
        }
        let now = backend.now();
        let elapsed = now - self.start_time;
        let looping = self.loop_enabled && self.loop_duration_sec > 0.0;

        self.playhead = if looping {
            elapsed % self.loop_duration_sec
        } else {
            elapsed
        };
        if let Some(listener) = &mut self.playhead_listener {
            listener(self.playhead);
        }

        if looping {
            self.tick_looping(backend, now, elapsed);
        } else {
            self.tick_linear(backend, now);
        }
    }

    fn tick_linear(&mut self, backend: &mut dyn AudioBackend, now: f64) {
        while self.next_index < self.events.len() {
            let e = &self.events[self.next_index];
            let when = self.start_time + e.t;
            if when >= now + SCHEDULE_AHEAD_SEC {
                return;
            }
            // An onset already in the past is dropped, not played late.
            if when >= now && e.kind == EventKind::Note && self.accepts(e) {
                backend.schedule_note(e, when);
            }
            self.next_index += 1;
        }
        if now > self.start_time + self.total_duration {
            self.stop(backend);
        }
    }

    fn tick_looping(&mut self, backend: &mut dyn AudioBackend, now: f64, elapsed: f64) {
        let loop_dur = self.loop_duration_sec;

        let new_iteration = (elapsed / loop_dur).floor() as u64;
        if new_iteration > self.loop_iteration {
            self.loop_iteration = new_iteration;
            self.next_index = 0;
            self.scheduled_in_loop.clear();
        }
        let loop_origin = self.start_time + self.loop_iteration as f64 * loop_dur;

        while self.next_index < self.events.len() {
            let idx = self.next_index;
            let e = &self.events[idx];
            // Sorted input: once past the loop window, nothing later fits.
            if e.t >= loop_dur {
                break;
            }
            let when = loop_origin + e.t;
            if when >= now + SCHEDULE_AHEAD_SEC {
                break;
            }
            if when >= now
                && e.kind == EventKind::Note
                && !self.scheduled_in_loop.contains(&idx)
                && self.accepts(e)
            {
                backend.schedule_note(e, when);
                self.scheduled_in_loop.insert(idx);
            }
            self.next_index += 1;
        }

        // Near the loop boundary the lookahead window reaches into the
        // next iteration; pre-schedule its opening events. These are not
        // recorded in scheduled_in_loop, which is keyed to the current
        // iteration only.
        if (elapsed % loop_dur) + SCHEDULE_AHEAD_SEC >= loop_dur {
            let next_origin = loop_origin + loop_dur;
            for idx in 0..self.events.len() {
                let e = &self.events[idx];
                if e.t >= loop_dur {
                    break;
                }
                let when = next_origin + e.t;
                if when >= now + SCHEDULE_AHEAD_SEC {
                    break;
                }
                if when >= now && e.kind == EventKind::Note && self.accepts(e) {
                    backend.schedule_note(e, when);
                }
            }
        }
    }

    /// Solo overrides mute: with any track soloed, only soloed tracks
    /// play; otherwise everything not muted plays.
    fn accepts(&self, e: &Event) -> bool {
        let track = e.track_name();
        if !self.soloed.is_empty() {
            self.soloed.contains(track)
        } else {
            !self.muted.contains(track)
        }
    }

    pub fn set_loop_enabled(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
        self.notify_state();
    }

    pub fn set_track_muted(&mut self, track: &str, muted: bool) {
        if muted {
            self.muted.insert(track.to_string());
        } else {
            self.muted.remove(track);
        }
    }

    pub fn set_track_soloed(&mut self, track: &str, soloed: bool) {
        if soloed {
            self.soloed.insert(track.to_string());
        } else {
            self.soloed.remove(track);
        }
    }

    pub fn is_track_muted(&self, track: &str) -> bool {
        self.muted.contains(track)
    }

    pub fn is_track_soloed(&self, track: &str) -> bool {
        self.soloed.contains(track)
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Position within the piece (or within the loop window while
    /// looping), as of the last tick.
    pub fn playhead_position(&self) -> f64 {
        self.playhead
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        TransportSnapshot {
            playing: self.playing,
            loop_enabled: self.loop_enabled,
            bpm: self.bpm,
            loop_bars: self.loop_bars,
            loop_duration_sec: self.loop_duration_sec,
            playhead: self.playhead,
        }
    }

    /// Register a listener called on every play/stop/loop-enable change.
    pub fn set_state_listener(&mut self, listener: StateListener) {
        self.state_listener = Some(listener);
    }

    /// Register a listener called with the playhead position each tick.
    pub fn set_playhead_listener(&mut self, listener: PlayheadListener) {
        self.playhead_listener = Some(listener);
    }

    fn notify_state(&mut self) {
        let snapshot = self.snapshot();
        if let Some(listener) = &mut self.state_listener {
            listener(&snapshot);
        }
    }
}
