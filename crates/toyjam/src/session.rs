//! Session state machine
//!
//! Owns slot occupancy, the idle deadline and every channel handle. A
//! session begins on the first insertion while idle and ends when the tick
//! finds the deadline has passed. Each accepted insertion pushes the
//! deadline to `now + playback_duration`, never earlier than it already was.
//!
//! All six foreground voices start with the bed. A slot is muted by volume
//! 0, not by stopping its voice, so removing an object and putting it back
//! before the timeout reuses the same voice.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::audio::{AudioChannelPool, AudioEngine, ChannelHandle};
use crate::crossfade::Blend;
use crate::slot::{Side, SlotId, TrackId, SLOT_COUNT};

/// Idle timeout used when `now + playback_duration` does not fit an instant
const FALLBACK_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Default)]
pub struct Slot {
    pub occupied: bool,
    pub channel: Option<ChannelHandle>,
}

#[derive(Debug, Default)]
pub struct BackgroundPair {
    pub a: Option<ChannelHandle>,
    pub b: Option<ChannelHandle>,
}

impl BackgroundPair {
    pub fn get(&self, side: Side) -> Option<&ChannelHandle> {
        match side {
            Side::A => self.a.as_ref(),
            Side::B => self.b.as_ref(),
        }
    }

    fn entry(&mut self, side: Side) -> &mut Option<ChannelHandle> {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Active,
}

pub struct SessionStateMachine {
    slots: [Slot; SLOT_COUNT],
    background: BackgroundPair,
    deadline: Option<Instant>,
    playback_duration: Duration,
}

impl SessionStateMachine {
    pub fn new(playback_duration: Duration) -> Self {
        Self {
            slots: Default::default(),
            background: BackgroundPair::default(),
            deadline: None,
            playback_duration,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.deadline.is_some() {
            SessionState::Active
        } else {
            SessionState::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn slot(&self, slot: SlotId) -> &Slot {
        &self.slots[slot.index()]
    }

    pub fn background(&self) -> &BackgroundPair {
        &self.background
    }

    /// An object was inserted on `slot`
    ///
    /// `seed` supplies the bed balance and is only called when a background
    /// voice has to be started.
    pub fn on_occupied<E: AudioEngine>(
        &mut self,
        pool: &mut AudioChannelPool<E>,
        slot: SlotId,
        now: Instant,
        seed: impl FnOnce() -> Blend,
    ) {
        let starting = !self.is_active();
        let target = match now.checked_add(self.playback_duration) {
            Some(target) => target,
            None => {
                warn!(duration = ?self.playback_duration, "playback duration out of range, using one day");
                now.checked_add(FALLBACK_DURATION).unwrap_or(now)
            }
        };

        if starting {
            info!(%slot, "session started");
        }
        self.ensure_background(pool, seed);
        self.deadline = self.deadline.max(Some(target));

        self.slots[slot.index()].occupied = true;
        self.ensure_voice(pool, slot, 1.0);
        debug!(%slot, "slot unmuted");

        // Remaining slots start muted
        if starting {
            for other in SlotId::all().filter(|&other| other != slot) {
                self.ensure_voice(pool, other, 0.0);
            }
        }
    }

    /// The object was removed from `slot`
    pub fn on_vacated<E: AudioEngine>(&mut self, pool: &mut AudioChannelPool<E>, slot: SlotId) {
        self.slots[slot.index()].occupied = false;
        if !self.is_active() {
            debug!(%slot, "slot vacated while idle");
            return;
        }

        if let Some(handle) = self.slots[slot.index()].channel.as_ref() {
            // A dead voice is replaced on the next insertion
            if let Err(e) = pool.set_volume(handle, 0.0) {
                debug!(%slot, error = %e, "mute skipped");
            }
        }
        debug!(%slot, "slot muted");
    }

    /// Check the idle deadline. Returns true when the session just ended.
    pub fn on_tick<E: AudioEngine>(&mut self, pool: &mut AudioChannelPool<E>, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                info!("session timed out, stopping playback");
                self.teardown(pool);
                true
            }
            _ => false,
        }
    }

    /// Push a bed balance to both background voices
    pub fn apply_blend<E: AudioEngine>(&mut self, pool: &mut AudioChannelPool<E>, blend: Blend) {
        if !self.is_active() {
            return;
        }
        for side in Side::BOTH {
            if let Some(handle) = self.background.get(side) {
                if let Err(e) = pool.set_volume(handle, blend.gain(side)) {
                    debug!(track = %handle.track(), error = %e, "crossfade skipped");
                }
            }
        }
    }

    /// Stop every voice and return to idle
    pub fn teardown<E: AudioEngine>(&mut self, pool: &mut AudioChannelPool<E>) {
        for slot in self.slots.iter_mut() {
            slot.occupied = false;
            if let Some(handle) = slot.channel.take() {
                pool.stop(handle);
            }
        }
        for side in Side::BOTH {
            if let Some(handle) = self.background.entry(side).take() {
                pool.stop(handle);
            }
        }
        self.deadline = None;
    }

    /// Make sure `slot` has a live voice at `volume`, replacing a missing or
    /// dead one
    fn ensure_voice<E: AudioEngine>(
        &mut self,
        pool: &mut AudioChannelPool<E>,
        slot: SlotId,
        volume: f32,
    ) {
        let entry = &mut self.slots[slot.index()];
        if let Some(handle) = entry.channel.take() {
            if pool.is_live(&handle) && pool.set_volume(&handle, volume).is_ok() {
                entry.channel = Some(handle);
                return;
            }
            debug!(%slot, "voice ended, restarting");
            pool.stop(handle);
        }

        match pool.start(TrackId::Foreground(slot), volume) {
            Ok(handle) => entry.channel = Some(handle),
            Err(e) => warn!(%slot, error = %e, "failed to start foreground track"),
        }
    }

    fn ensure_background<E: AudioEngine>(
        &mut self,
        pool: &mut AudioChannelPool<E>,
        seed: impl FnOnce() -> Blend,
    ) {
        for side in Side::BOTH {
            let entry = self.background.entry(side);
            if let Some(handle) = entry.take() {
                if pool.is_live(&handle) {
                    *entry = Some(handle);
                } else {
                    pool.stop(handle);
                }
            }
        }
        if self.background.a.is_some() && self.background.b.is_some() {
            return;
        }

        let blend = seed();
        for side in Side::BOTH {
            let entry = self.background.entry(side);
            if entry.is_some() {
                continue;
            }
            let track = TrackId::Background(side);
            match pool.start(track, blend.gain(side)) {
                Ok(handle) => *entry = Some(handle),
                Err(e) => warn!(%track, error = %e, "failed to start background track"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetLibrary;
    use crate::audio::MemoryEngine;

    const DURATION: Duration = Duration::from_secs(120);

    fn pool() -> AudioChannelPool<MemoryEngine> {
        AudioChannelPool::new(MemoryEngine::new(8), AssetLibrary::silent(), true)
    }

    fn slot(i: usize) -> SlotId {
        SlotId::new(i).unwrap()
    }

    fn volume(pool: &AudioChannelPool<MemoryEngine>, handle: Option<&ChannelHandle>) -> Option<f32> {
        handle.and_then(|h| pool.volume(h))
    }

    #[test]
    fn test_first_insertion_starts_everything() {
        let mut pool = pool();
        let mut session = SessionStateMachine::new(DURATION);
        let t0 = Instant::now();

        session.on_occupied(&mut pool, slot(0), t0, || Blend { a: 0.25, b: 0.75 });

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.deadline(), Some(t0 + DURATION));
        assert_eq!(pool.live_count(), 8);
        assert_eq!(volume(&pool, session.slot(slot(0)).channel.as_ref()), Some(1.0));
        assert_eq!(volume(&pool, session.slot(slot(1)).channel.as_ref()), Some(0.0));
        assert_eq!(volume(&pool, session.background().get(Side::A)), Some(0.25));
        assert_eq!(volume(&pool, session.background().get(Side::B)), Some(0.75));
    }

    #[test]
    fn test_seed_not_called_when_bed_is_playing() {
        let mut pool = pool();
        let mut session = SessionStateMachine::new(DURATION);
        let t0 = Instant::now();

        session.on_occupied(&mut pool, slot(0), t0, Blend::default);
        session.on_occupied(&mut pool, slot(1), t0, || panic!("bed already playing"));
    }

    #[test]
    fn test_vacate_while_idle_records_only() {
        let mut pool = pool();
        let mut session = SessionStateMachine::new(DURATION);

        session.on_vacated(&mut pool, slot(4));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.slot(slot(4)).occupied);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn test_mute_twice_keeps_voice() {
        let mut pool = pool();
        let mut session = SessionStateMachine::new(DURATION);
        let t0 = Instant::now();
        session.on_occupied(&mut pool, slot(2), t0, Blend::default);
        let voice = session.slot(slot(2)).channel.as_ref().unwrap().voice();

        session.on_vacated(&mut pool, slot(2));
        session.on_vacated(&mut pool, slot(2));

        let handle = session.slot(slot(2)).channel.as_ref().unwrap();
        assert_eq!(handle.voice(), voice);
        assert_eq!(pool.volume(handle), Some(0.0));
        assert!(pool.is_live(handle));
    }

    #[test]
    fn test_tick_before_deadline_keeps_session() {
        let mut pool = pool();
        let mut session = SessionStateMachine::new(DURATION);
        let t0 = Instant::now();
        session.on_occupied(&mut pool, slot(0), t0, Blend::default);

        assert!(!session.on_tick(&mut pool, t0 + Duration::from_secs(119)));
        assert!(session.on_tick(&mut pool, t0 + DURATION));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn test_unrepresentable_duration_falls_back() {
        let mut pool = pool();
        let mut session = SessionStateMachine::new(Duration::MAX);
        let t0 = Instant::now();

        session.on_occupied(&mut pool, slot(0), t0, Blend::default);

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.deadline(), Some(t0 + FALLBACK_DURATION));
        assert!(!session.on_tick(&mut pool, t0 + DURATION));
    }

    #[test]
    fn test_apply_blend_ignored_while_idle() {
        let mut pool = pool();
        let mut session = SessionStateMachine::new(DURATION);
        session.apply_blend(&mut pool, Blend { a: 1.0, b: 0.0 });
        assert!(session.background().get(Side::A).is_none());
    }
}
