//! All mutable daemon state, owned by the main loop

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::audio::{AudioChannelPool, AudioEngine, ChannelHandle};
use crate::crossfade::{Blend, CrossfadeController};
use crate::debounce::DebounceFilter;
use crate::sensor::{EdgeEvent, LineMap};
use crate::session::{SessionState, SessionStateMachine};
use crate::slot::{Side, SlotId};

pub struct SystemState<E: AudioEngine> {
    pool: AudioChannelPool<E>,
    session: SessionStateMachine,
    crossfade: CrossfadeController,
    debounce: DebounceFilter,
    lines: LineMap,
}

impl<E: AudioEngine> SystemState<E> {
    pub fn new(
        pool: AudioChannelPool<E>,
        session: SessionStateMachine,
        crossfade: CrossfadeController,
        debounce: DebounceFilter,
        lines: LineMap,
    ) -> Self {
        Self {
            pool,
            session,
            crossfade,
            debounce,
            lines,
        }
    }

    /// Map, debounce and dispatch one raw edge
    pub fn handle_edge(&mut self, event: EdgeEvent) {
        let Some(slot) = self.lines.slot_for(event.line) else {
            warn!(line = event.line, level = %event.level, "edge on unmapped line discarded");
            return;
        };
        if !self.debounce.accept(slot, event.at) {
            trace!(%slot, level = %event.level, "bounce dropped");
            return;
        }
        debug!(%slot, level = %event.level, "edge accepted");

        if event.level.is_occupied() {
            let crossfade = &mut self.crossfade;
            self.session
                .on_occupied(&mut self.pool, slot, event.at, || crossfade.sample());
        } else {
            self.session.on_vacated(&mut self.pool, slot);
        }
    }

    /// Periodic work: idle timeout first, then the bed crossfade
    ///
    /// Returns true when the session timed out on this tick.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.session.on_tick(&mut self.pool, now) {
            return true;
        }
        if self.session.is_active() {
            let blend = self.crossfade.sample();
            self.session.apply_blend(&mut self.pool, blend);
        }
        false
    }

    /// Stop every voice and close the engine
    pub fn shutdown(&mut self) {
        self.session.teardown(&mut self.pool);
        self.pool.shutdown();
    }

    pub fn session(&self) -> &SessionStateMachine {
        &self.session
    }

    pub fn pool(&self) -> &AudioChannelPool<E> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut AudioChannelPool<E> {
        &mut self.pool
    }

    pub fn snapshot(&self, now: Instant) -> Snapshot {
        let channel = |handle: Option<&ChannelHandle>| ChannelSnapshot {
            volume: handle.and_then(|h| self.pool.volume(h)),
            live: handle.is_some_and(|h| self.pool.is_live(h)),
        };

        Snapshot {
            state: self.session.state(),
            remaining_ms: self
                .session
                .deadline()
                .map(|d| d.saturating_duration_since(now).as_millis() as u64),
            slots: SlotId::all()
                .map(|id| {
                    let slot = self.session.slot(id);
                    SlotSnapshot {
                        slot: id.index() + 1,
                        occupied: slot.occupied,
                        channel: channel(slot.channel.as_ref()),
                    }
                })
                .collect(),
            background: Side::BOTH.map(|side| channel(self.session.background().get(side))),
            blend: self.crossfade.last(),
            live_channels: self.pool.live_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSnapshot {
    pub volume: Option<f32>,
    pub live: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotSnapshot {
    /// One-based, as labelled on the installation
    pub slot: usize,
    pub occupied: bool,
    pub channel: ChannelSnapshot,
}

/// Point-in-time view for logs and tests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub state: SessionState,
    pub remaining_ms: Option<u64>,
    pub slots: Vec<SlotSnapshot>,
    pub background: [ChannelSnapshot; 2],
    pub blend: Option<Blend>,
    pub live_channels: usize,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::assets::AssetLibrary;
    use crate::audio::MemoryEngine;
    use crate::sensor::{AnalogReader, SharedDial};
    use crate::slot::Level;

    fn system(dial: &SharedDial) -> SystemState<MemoryEngine> {
        SystemState::new(
            AudioChannelPool::new(MemoryEngine::new(8), AssetLibrary::silent(), true),
            SessionStateMachine::new(Duration::from_secs(120)),
            CrossfadeController::new(AnalogReader::new(Box::new(dial.clone()), 512), 962),
            DebounceFilter::new(Duration::from_millis(300)),
            LineMap::new(vec![17, 27, 22, 5, 6, 13]),
        )
    }

    fn edge(line: u32, level: Level, at: Instant) -> EdgeEvent {
        EdgeEvent { line, level, at }
    }

    #[test]
    fn test_unmapped_line_is_ignored() {
        let mut sys = system(&SharedDial::new(481));
        sys.handle_edge(edge(99, Level::Low, Instant::now()));
        assert_eq!(sys.session().state(), SessionState::Idle);
        assert_eq!(sys.pool().live_count(), 0);
    }

    #[test]
    fn test_edge_maps_through_line_table() {
        let mut sys = system(&SharedDial::new(481));
        let t0 = Instant::now();
        sys.handle_edge(edge(22, Level::Low, t0));

        let snap = sys.snapshot(t0);
        assert_eq!(snap.state, SessionState::Active);
        assert!(snap.slots[2].occupied);
        assert_eq!(snap.slots[2].channel.volume, Some(1.0));
        assert_eq!(snap.remaining_ms, Some(120_000));
        assert_eq!(snap.live_channels, 8);
    }

    #[test]
    fn test_tick_follows_dial() {
        let dial = SharedDial::new(481);
        let mut sys = system(&dial);
        let t0 = Instant::now();
        sys.handle_edge(edge(17, Level::Low, t0));

        dial.set(962);
        assert!(!sys.tick(t0 + Duration::from_millis(100)));
        let snap = sys.snapshot(t0);
        assert_eq!(snap.background[0].volume, Some(1.0));
        assert_eq!(snap.background[1].volume, Some(0.0));
        assert_eq!(snap.blend, Some(Blend { a: 1.0, b: 0.0 }));
    }

    #[test]
    fn test_snapshot_serializes() {
        let sys = system(&SharedDial::new(0));
        let json = serde_json::to_value(sys.snapshot(Instant::now())).unwrap();
        assert_eq!(json["state"], "idle");
        assert_eq!(json["slots"].as_array().unwrap().len(), 6);
        assert_eq!(json["slots"][0]["slot"], 1);
    }

    #[test]
    fn test_shutdown_closes_engine() {
        let mut sys = system(&SharedDial::new(481));
        sys.handle_edge(edge(5, Level::Low, Instant::now()));
        sys.shutdown();

        assert_eq!(sys.session().state(), SessionState::Idle);
        assert_eq!(sys.pool().live_count(), 0);
        assert!(sys.pool().engine().is_shut_down());
    }
}
