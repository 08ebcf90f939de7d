//! Voices — one oscillator plus envelope per sounding note.

use std::f64::consts::PI;

use crate::event::{Adsr, Waveform};

use super::command::ScheduledNote;

/// Generate a single oscillator sample for `waveform` at `phase` in
/// [0.0, 1.0). Returns a value in [-1.0, 1.0].
pub fn oscillator(waveform: Waveform, phase: f64) -> f64 {
    match waveform {
        Waveform::Sine => (phase * 2.0 * PI).sin(),
        Waveform::Sawtooth => 2.0 * phase - 1.0,
        Waveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Triangle => {
            if phase < 0.25 {
                4.0 * phase
            } else if phase < 0.75 {
                2.0 - 4.0 * phase
            } else {
                4.0 * phase - 4.0
            }
        }
    }
}

/// Envelope amplitude at `t` seconds into a note held for `dur` seconds:
/// linear attack to 1, linear decay to the sustain level, hold, then
/// linear release to 0 after the hold ends.
pub fn envelope_amplitude(adsr: &Adsr, t: f64, dur: f64) -> f64 {
    if t < 0.0 {
        return 0.0;
    }
    if t < adsr.attack {
        if adsr.attack <= 0.0 {
            1.0
        } else {
            t / adsr.attack
        }
    } else if t < adsr.attack + adsr.decay {
        if adsr.decay <= 0.0 {
            adsr.sustain
        } else {
            let frac = (t - adsr.attack) / adsr.decay;
            1.0 - frac * (1.0 - adsr.sustain)
        }
    } else if t < dur {
        adsr.sustain
    } else if t < dur + adsr.release {
        if adsr.release <= 0.0 {
            0.0
        } else {
            let frac = (t - dur) / adsr.release;
            adsr.sustain * (1.0 - frac)
        }
    } else {
        0.0
    }
}

/// A single sounding note on the audio thread.
pub struct Voice {
    freq: f64,
    waveform: Waveform,
    /// Velocity and instrument gain folded together.
    amp: f64,
    adsr: Adsr,
    dur: f64,
    start_sample: u64,
    phase: f64,
}

impl Voice {
    /// Spawn a voice from a scheduled note. `floor_sample` clamps starts
    /// that have already slipped into the past so the envelope still
    /// begins at its attack.
    pub fn new(note: &ScheduledNote, sample_rate: u32, floor_sample: u64) -> Self {
        let start_sample = ((note.when * sample_rate as f64).round() as u64).max(floor_sample);
        Self {
            freq: note.freq,
            waveform: note.waveform,
            amp: note.velocity * note.gain,
            adsr: note.adsr,
            dur: note.dur,
            start_sample,
            phase: 0.0,
        }
    }

    pub fn start_sample(&self) -> u64 {
        self.start_sample
    }

    /// Render one mono sample at the absolute sample index, advancing the
    /// oscillator phase when the voice is active.
    pub fn sample(&mut self, sample_index: u64, sample_rate: u32) -> f64 {
        if sample_index < self.start_sample {
            return 0.0;
        }
        let t = (sample_index - self.start_sample) as f64 / sample_rate as f64;
        let env = envelope_amplitude(&self.adsr, t, self.dur);
        let out = oscillator(self.waveform, self.phase) * env * self.amp;
        self.phase += self.freq / sample_rate as f64;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        out
    }

    /// Whether the envelope has fully released at the given sample index.
    pub fn finished(&self, sample_index: u64, sample_rate: u32) -> bool {
        if sample_index < self.start_sample {
            return false;
        }
        let t = (sample_index - self.start_sample) as f64 / sample_rate as f64;
        t >= self.dur + self.adsr.release
    }
}
