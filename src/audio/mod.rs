//! Tone engine — cpal output stream driven over a lock-free queue.
//!
//! The engine owns the cpal stream and talks to the audio thread through a
//! SPSC ring buffer of [`SynthCommand`]s. The audio thread publishes its
//! sample position through an atomic, which backs the monotonic clock the
//! scheduler phase-locks to, so "now" and "when to fire" agree by
//! construction.

pub mod callback;
pub mod command;
pub mod voice;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    traits::{Producer, Split},
    HeapRb,
};

use crate::event::Event;
use crate::sched::AudioBackend;

pub use command::{ScheduledNote, SynthCommand};

use callback::SynthCallback;

/// Ring buffer capacity (number of commands).
const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Audio engine errors.
#[derive(Debug)]
pub enum AudioError {
    /// No audio output device found.
    NoOutputDevice,
    /// Failed to query device configuration.
    DeviceConfig(String),
    /// Failed to build the audio stream.
    StreamBuild(String),
    /// Failed to start the audio stream.
    StreamPlay(String),
    /// Command queue is full — the audio thread is not draining.
    QueueFull,
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::NoOutputDevice => write!(f, "no audio output device found"),
            AudioError::DeviceConfig(e) => write!(f, "device config error: {e}"),
            AudioError::StreamBuild(e) => write!(f, "stream build error: {e}"),
            AudioError::StreamPlay(e) => write!(f, "stream play error: {e}"),
            AudioError::QueueFull => write!(f, "synth command queue is full"),
        }
    }
}

impl std::error::Error for AudioError {}

/// The tone engine. Owns the cpal stream and the command producer, and
/// implements [`AudioBackend`] for the scheduler.
pub struct ToneEngine {
    stream: cpal::Stream,
    producer: ringbuf::HeapProd<SynthCommand>,
    clock: Arc<AtomicU64>,
    sample_rate: u32,
    channels: u16,
}

impl ToneEngine {
    /// Create and start the engine on the default output device.
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        Self::build_with_device(&device, sample_rate, channels)
    }

    fn build_with_device(
        device: &cpal::Device,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, AudioError> {
        let rb = HeapRb::<SynthCommand>::new(COMMAND_QUEUE_CAPACITY);
        let (producer, consumer) = rb.split();

        let clock = Arc::new(AtomicU64::new(0));
        let mut synth = SynthCallback::new(consumer, Arc::clone(&clock), channels, sample_rate);

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err: cpal::StreamError| {
            eprintln!("audio stream error: {err}");
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    synth.process(data);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        Ok(Self {
            stream,
            producer,
            clock,
            sample_rate,
            channels,
        })
    }

    /// Set master volume.
    pub fn set_volume(&mut self, volume: f32) -> Result<(), AudioError> {
        self.producer
            .try_push(SynthCommand::SetVolume(volume))
            .map_err(|_| AudioError::QueueFull)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl AudioBackend for ToneEngine {
    fn now(&self) -> f64 {
        self.clock.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn resume(&mut self) {
        if let Err(e) = self.stream.play() {
            eprintln!("audio resume failed: {e}");
        }
    }

    fn schedule_note(&mut self, event: &Event, when: f64) {
        let Some(freq) = event.freq else {
            return;
        };
        let note = ScheduledNote {
            when,
            freq,
            dur: event.dur,
            velocity: event.velocity,
            waveform: event.waveform,
            gain: event.gain.unwrap_or(1.0),
            adsr: event.adsr.unwrap_or_default(),
        };
        // A full queue drops the note rather than blocking the tick.
        let _ = self.producer.try_push(SynthCommand::Note(note));
    }

    fn cancel_all(&mut self) {
        let _ = self.producer.try_push(SynthCommand::CancelAll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires an audio device — run manually with `cargo test -- --ignored`
    fn engine_creation() {
        let engine = ToneEngine::new();
        assert!(engine.is_ok(), "ToneEngine::new() failed: {:?}", engine.err());
        let engine = engine.unwrap();
        assert!(engine.sample_rate() > 0);
        assert!(engine.channels() > 0);
    }

    #[test]
    #[ignore] // Requires an audio device
    fn clock_is_monotonic() {
        let engine = ToneEngine::new().expect("no audio device");
        let a = engine.now();
        std::thread::sleep(std::time::Duration::from_millis(50));
        let b = engine.now();
        assert!(b >= a);
    }

    #[test]
    fn audio_error_display() {
        assert_eq!(
            AudioError::NoOutputDevice.to_string(),
            "no audio output device found"
        );
        assert_eq!(
            AudioError::QueueFull.to_string(),
            "synth command queue is full"
        );
        assert_eq!(
            AudioError::StreamBuild("boom".to_string()).to_string(),
            "stream build error: boom"
        );
    }
}
