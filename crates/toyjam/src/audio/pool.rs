//! Channel pool: exclusive ownership of live voices
//!
//! A [`ChannelHandle`] is neither `Clone` nor `Copy`, so exactly one owner
//! (a slot or a bed side) can hold it, and `stop` consumes it. Using a
//! handle after stopping it does not compile.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::{AudioEngine, PlaybackError, VoiceId};
use crate::assets::AssetLibrary;
use crate::slot::TrackId;

/// Ownership token for one playing instance
#[derive(Debug, PartialEq, Eq)]
pub struct ChannelHandle {
    voice: VoiceId,
    track: TrackId,
}

impl ChannelHandle {
    pub fn voice(&self) -> VoiceId {
        self.voice
    }

    pub fn track(&self) -> TrackId {
        self.track
    }
}

#[derive(Debug, Clone, Copy)]
struct ChannelEntry {
    track: TrackId,
    volume: f32,
}

pub struct AudioChannelPool<E> {
    engine: E,
    library: AssetLibrary,
    looped: bool,
    channels: HashMap<VoiceId, ChannelEntry>,
}

impl<E: AudioEngine> AudioChannelPool<E> {
    pub fn new(engine: E, library: AssetLibrary, looped: bool) -> Self {
        Self {
            engine,
            library,
            looped,
            channels: HashMap::new(),
        }
    }

    /// Begin playback of `track` at `volume`
    pub fn start(&mut self, track: TrackId, volume: f32) -> Result<ChannelHandle, PlaybackError> {
        let volume = volume.clamp(0.0, 1.0);
        let asset = self.library.get(track);
        let voice = self.engine.play(asset, volume, self.looped)?;
        self.channels.insert(voice, ChannelEntry { track, volume });
        debug!(%track, voice = %voice, volume, "channel started");
        Ok(ChannelHandle { voice, track })
    }

    /// Set gain, clamped to [0, 1]
    ///
    /// Fails with [`PlaybackError::Stale`] when the voice has ended; the
    /// caller should stop the handle and start a fresh one.
    pub fn set_volume(&mut self, handle: &ChannelHandle, level: f32) -> Result<(), PlaybackError> {
        let level = level.clamp(0.0, 1.0);
        if !self.is_live(handle) {
            return Err(PlaybackError::Stale(handle.voice));
        }
        self.engine.set_gain(handle.voice, level)?;
        if let Some(entry) = self.channels.get_mut(&handle.voice) {
            entry.volume = level;
        }
        Ok(())
    }

    /// Release a handle. Stopping a voice that already ended is a no-op.
    pub fn stop(&mut self, handle: ChannelHandle) {
        if self.channels.remove(&handle.voice).is_none() {
            warn!(track = %handle.track, voice = %handle.voice, "stop on unknown channel");
            return;
        }
        self.engine.stop(handle.voice);
        debug!(track = %handle.track, voice = %handle.voice, "channel stopped");
    }

    /// Whether the voice behind `handle` is still playing
    pub fn is_live(&self, handle: &ChannelHandle) -> bool {
        self.channels.contains_key(&handle.voice) && self.engine.is_active(handle.voice)
    }

    /// Last volume applied through this pool
    pub fn volume(&self, handle: &ChannelHandle) -> Option<f32> {
        self.channels.get(&handle.voice).map(|e| e.volume)
    }

    /// Channels started and not yet stopped
    pub fn live_count(&self) -> usize {
        self.channels
            .keys()
            .filter(|voice| self.engine.is_active(**voice))
            .count()
    }

    /// Stop whatever is left and release the engine
    pub fn shutdown(&mut self) {
        for (voice, entry) in self.channels.drain() {
            debug!(track = %entry.track, voice = %voice, "stopping at shutdown");
            self.engine.stop(voice);
        }
        self.engine.shutdown();
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}
