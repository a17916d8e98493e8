//! System audio output via rodio
//!
//! One `Sink` per voice; the sink's volume is the voice gain. Sinks read
//! the decoded samples in place through `SharedSamples`. The output
//! stream is not `Send`, so this engine must live on the thread that runs
//! the main loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info};

use super::{AudioEngine, PlaybackError, VoiceId};
use crate::assets::Asset;

pub struct RodioEngine {
    output: Option<(OutputStream, OutputStreamHandle)>,
    sinks: HashMap<VoiceId, Sink>,
    max_voices: usize,
}

impl RodioEngine {
    /// Open the default output device
    pub fn open(max_voices: usize) -> Result<Self, PlaybackError> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| PlaybackError::InitFailed(format!("no output device: {}", e)))?;
        info!(max_voices, "audio output opened");
        Ok(Self {
            output: Some((stream, handle)),
            sinks: HashMap::new(),
            max_voices,
        })
    }

    fn reap(&mut self) {
        self.sinks.retain(|_, sink| !sink.empty());
    }
}

impl AudioEngine for RodioEngine {
    fn play(&mut self, asset: &Asset, gain: f32, looped: bool) -> Result<VoiceId, PlaybackError> {
        let Some((_, handle)) = self.output.as_ref() else {
            return Err(PlaybackError::Unavailable("output closed".to_string()));
        };

        self.reap();
        if self.sinks.len() >= self.max_voices {
            return Err(PlaybackError::Unavailable(format!(
                "all {} voices busy",
                self.max_voices
            )));
        }

        let sink = Sink::try_new(handle)
            .map_err(|e| PlaybackError::Unavailable(format!("sink: {}", e)))?;
        sink.set_volume(gain.clamp(0.0, 1.0));

        sink.append(SharedSamples::new(asset, looped));

        let id = VoiceId::new();
        debug!(voice = %id, asset = %asset.name, looped, "sink started");
        self.sinks.insert(id, sink);
        Ok(id)
    }

    fn set_gain(&mut self, voice: VoiceId, gain: f32) -> Result<(), PlaybackError> {
        match self.sinks.get(&voice) {
            Some(sink) if !sink.empty() => {
                sink.set_volume(gain.clamp(0.0, 1.0));
                Ok(())
            }
            _ => Err(PlaybackError::Stale(voice)),
        }
    }

    fn stop(&mut self, voice: VoiceId) {
        if let Some(sink) = self.sinks.remove(&voice) {
            sink.stop();
        }
    }

    fn is_active(&self, voice: VoiceId) -> bool {
        self.sinks.get(&voice).is_some_and(|sink| !sink.empty())
    }

    fn shutdown(&mut self) {
        for (_, sink) in self.sinks.drain() {
            sink.stop();
        }
        if self.output.take().is_some() {
            info!("audio output closed");
        }
    }
}

/// Plays a decoded asset straight from its shared sample buffer
struct SharedSamples {
    samples: Arc<[f32]>,
    pos: usize,
    channels: u16,
    sample_rate: u32,
    looped: bool,
}

impl SharedSamples {
    fn new(asset: &Asset, looped: bool) -> Self {
        Self {
            samples: Arc::clone(&asset.samples),
            pos: 0,
            channels: asset.channels,
            sample_rate: asset.sample_rate,
            looped,
        }
    }
}

impl Iterator for SharedSamples {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.pos >= self.samples.len() {
            if !self.looped || self.samples.is_empty() {
                return None;
            }
            self.pos = 0;
        }
        let sample = self.samples[self.pos];
        self.pos += 1;
        Some(sample)
    }
}

impl Source for SharedSamples {
    fn current_frame_len(&self) -> Option<usize> {
        let remaining = self.samples.len() - self.pos;
        if remaining == 0 && self.looped {
            Some(self.samples.len())
        } else {
            Some(remaining)
        }
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        if self.looped || self.channels == 0 || self.sample_rate == 0 {
            return None;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        Some(Duration::from_nanos(frames * 1_000_000_000 / self.sample_rate as u64))
    }
}
