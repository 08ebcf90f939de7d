//! Audio-thread state — runs inside the cpal callback.
//!
//! Drains commands from the ring buffer, starts pending voices at their
//! scheduled sample, mixes active voices into the output, and publishes
//! the sample clock that backs the scheduler's notion of "now".

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::Consumer;
use ringbuf::HeapCons;

use super::command::{ScheduledNote, SynthCommand};
use super::voice::Voice;

/// Hard ceiling applied after mixing.
const MASTER_CEILING: f32 = 0.95;

/// State that lives on the audio thread. Accessed only from the cpal
/// callback.
pub struct SynthCallback {
    consumer: HeapCons<SynthCommand>,
    /// Notes whose start lies beyond the current block.
    pending: Vec<ScheduledNote>,
    voices: Vec<Voice>,
    /// Absolute sample position, published for `AudioBackend::now()`.
    position: u64,
    clock: Arc<AtomicU64>,
    volume: f32,
    channels: u16,
    sample_rate: u32,
}

impl SynthCallback {
    pub fn new(
        consumer: HeapCons<SynthCommand>,
        clock: Arc<AtomicU64>,
        channels: u16,
        sample_rate: u32,
    ) -> Self {
        Self {
            consumer,
            pending: Vec::new(),
            voices: Vec::new(),
            position: 0,
            clock,
            volume: 1.0,
            channels,
            sample_rate,
        }
    }

    /// Fill one interleaved output block.
    pub fn process(&mut self, output: &mut [f32]) {
        while let Some(cmd) = self.consumer.try_pop() {
            match cmd {
                SynthCommand::Note(note) => self.pending.push(note),
                SynthCommand::SetVolume(v) => self.volume = v.clamp(0.0, 1.0),
                SynthCommand::CancelAll => {
                    self.pending.clear();
                    self.voices.clear();
                }
            }
        }

        let channels = self.channels as usize;
        let frames = output.len() / channels;
        let block_end = self.position + frames as u64;

        // Promote notes that start before this block ends.
        let sample_rate = self.sample_rate;
        let position = self.position;
        let mut i = 0;
        while i < self.pending.len() {
            let start = (self.pending[i].when * sample_rate as f64).round() as u64;
            if start < block_end {
                let note = self.pending.swap_remove(i);
                self.voices.push(Voice::new(&note, sample_rate, position));
            } else {
                i += 1;
            }
        }

        for frame in 0..frames {
            let idx = self.position + frame as u64;
            let mut mix = 0.0f64;
            for voice in &mut self.voices {
                mix += voice.sample(idx, sample_rate);
            }
            let sample =
                ((mix as f32) * self.volume).clamp(-MASTER_CEILING, MASTER_CEILING);
            for ch in 0..channels {
                output[frame * channels + ch] = sample;
            }
        }

        let end = block_end;
        self.voices
            .retain(|voice| !voice.finished(end, sample_rate));

        self.position = end;
        self.clock.store(end, Ordering::Release);
    }
}
