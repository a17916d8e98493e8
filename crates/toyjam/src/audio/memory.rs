//! Headless engine that keeps voice bookkeeping in memory
//!
//! Used for bench runs without a sound card and throughout the tests. It
//! enforces a voice limit like a real mixer would, and one-shot voices end
//! once their asset's duration has elapsed.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::{AudioEngine, PlaybackError, VoiceId};
use crate::assets::Asset;

/// Observable state of one voice
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceState {
    pub asset: String,
    pub gain: f32,
    pub looped: bool,
    pub stopped: bool,
    started: Instant,
    length: Duration,
}

impl VoiceState {
    fn is_active(&self, now: Instant) -> bool {
        if self.stopped {
            return false;
        }
        self.looped || now.saturating_duration_since(self.started) < self.length
    }
}

#[derive(Debug)]
pub struct MemoryEngine {
    voices: HashMap<VoiceId, VoiceState>,
    max_voices: usize,
    available: bool,
    plays: usize,
    shut_down: bool,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new(8)
    }
}

impl MemoryEngine {
    pub fn new(max_voices: usize) -> Self {
        Self {
            voices: HashMap::new(),
            max_voices,
            available: true,
            plays: 0,
            shut_down: false,
        }
    }

    /// Make every subsequent `play` fail (or succeed again)
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// End a voice as if a one-shot asset ran out
    pub fn finish(&mut self, voice: VoiceId) {
        if let Some(state) = self.voices.get_mut(&voice) {
            state.stopped = true;
        }
    }

    pub fn voice(&self, voice: VoiceId) -> Option<&VoiceState> {
        self.voices.get(&voice)
    }

    /// Voices still producing audio
    pub fn active_count(&self) -> usize {
        let now = Instant::now();
        self.voices.values().filter(|v| v.is_active(now)).count()
    }

    /// Total successful `play` calls over the engine's life
    pub fn plays(&self) -> usize {
        self.plays
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl AudioEngine for MemoryEngine {
    fn play(&mut self, asset: &Asset, gain: f32, looped: bool) -> Result<VoiceId, PlaybackError> {
        if !self.available || self.shut_down {
            return Err(PlaybackError::Unavailable("engine offline".to_string()));
        }
        // Finished voices free their slot, as a mixer channel would
        let now = Instant::now();
        self.voices.retain(|_, v| v.is_active(now));
        if self.voices.len() >= self.max_voices {
            return Err(PlaybackError::Unavailable(format!(
                "all {} voices busy",
                self.max_voices
            )));
        }

        let length = if asset.sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(asset.frames() as f64 / asset.sample_rate as f64)
        };
        let id = VoiceId::new();
        self.voices.insert(
            id,
            VoiceState {
                asset: asset.name.clone(),
                gain: gain.clamp(0.0, 1.0),
                looped,
                stopped: false,
                started: now,
                length,
            },
        );
        self.plays += 1;
        debug!(voice = %id, asset = %asset.name, gain, looped, "voice started");
        Ok(id)
    }

    fn set_gain(&mut self, voice: VoiceId, gain: f32) -> Result<(), PlaybackError> {
        let now = Instant::now();
        match self.voices.get_mut(&voice) {
            Some(state) if state.is_active(now) => {
                state.gain = gain.clamp(0.0, 1.0);
                Ok(())
            }
            _ => Err(PlaybackError::Stale(voice)),
        }
    }

    fn stop(&mut self, voice: VoiceId) {
        if let Some(state) = self.voices.get_mut(&voice) {
            state.stopped = true;
        }
    }

    fn is_active(&self, voice: VoiceId) -> bool {
        let now = Instant::now();
        self.voices.get(&voice).is_some_and(|v| v.is_active(now))
    }

    fn shutdown(&mut self) {
        for state in self.voices.values_mut() {
            state.stopped = true;
        }
        self.shut_down = true;
    }
}
