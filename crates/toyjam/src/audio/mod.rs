//! Audio engine seam and the channel pool built on top of it
//!
//! The engine is the collaborator that actually renders sound. The pool owns
//! every live voice on behalf of the session state machine and hands out
//! exclusively-owned [`ChannelHandle`]s.

mod memory;
mod pool;
#[cfg(feature = "rodio")]
mod rodio_engine;

pub use memory::{MemoryEngine, VoiceState};
pub use pool::{AudioChannelPool, ChannelHandle};
#[cfg(feature = "rodio")]
pub use rodio_engine::RodioEngine;

use std::fmt;

use uuid::Uuid;

use crate::assets::Asset;

/// Engine-side identity of one playing instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub Uuid);

impl VoiceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VoiceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaybackError {
    /// The engine has no free voice or could not open one
    #[error("playback unavailable: {0}")]
    Unavailable(String),

    /// The voice behind a handle already finished or was stopped
    #[error("voice {0} is no longer playing")]
    Stale(VoiceId),

    #[error("audio engine init failed: {0}")]
    InitFailed(String),
}

/// Playback collaborator
///
/// Implementations must tolerate `stop` on a voice that already finished.
pub trait AudioEngine {
    /// Start a new voice of `asset` at `gain`. Looped voices play until stopped.
    fn play(&mut self, asset: &Asset, gain: f32, looped: bool) -> Result<VoiceId, PlaybackError>;

    fn set_gain(&mut self, voice: VoiceId, gain: f32) -> Result<(), PlaybackError>;

    fn stop(&mut self, voice: VoiceId);

    /// Whether the voice is still producing audio
    fn is_active(&self, voice: VoiceId) -> bool;

    /// Release the output device. No voices survive this.
    fn shutdown(&mut self);
}

impl<E: AudioEngine + ?Sized> AudioEngine for Box<E> {
    fn play(&mut self, asset: &Asset, gain: f32, looped: bool) -> Result<VoiceId, PlaybackError> {
        (**self).play(asset, gain, looped)
    }

    fn set_gain(&mut self, voice: VoiceId, gain: f32) -> Result<(), PlaybackError> {
        (**self).set_gain(voice, gain)
    }

    fn stop(&mut self, voice: VoiceId) {
        (**self).stop(voice)
    }

    fn is_active(&self, voice: VoiceId) -> bool {
        (**self).is_active(voice)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}
