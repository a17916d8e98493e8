//! Main loop behaviour under paused tokio time

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use toyjam::{
    edge_queue, AnalogReader, Asset, AssetLibrary, AudioChannelPool, AudioEngine,
    CrossfadeController, DebounceFilter, Level, LineMap, MainLoop, MemoryEngine, PlaybackError,
    SessionState, SessionStateMachine, SharedDial, SystemState, VoiceId,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Play,
    Gain(f32),
    Stop,
    Shutdown,
}

/// MemoryEngine that also records what happened and when
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<(Instant, Op)>>>);

impl Journal {
    fn push(&self, op: Op) {
        self.0.lock().unwrap().push((Instant::now(), op));
    }

    fn count(&self, wanted: fn(&Op) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|(_, op)| wanted(op)).count()
    }

    fn first(&self, wanted: fn(&Op) -> bool) -> Option<Instant> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .find(|(_, op)| wanted(op))
            .map(|(at, _)| *at)
    }

    fn last_gain(&self) -> Option<f32> {
        self.0.lock().unwrap().iter().rev().find_map(|(_, op)| match op {
            Op::Gain(g) => Some(*g),
            _ => None,
        })
    }
}

struct Recording {
    inner: MemoryEngine,
    journal: Journal,
}

impl AudioEngine for Recording {
    fn play(&mut self, asset: &Asset, gain: f32, looped: bool) -> Result<VoiceId, PlaybackError> {
        let voice = self.inner.play(asset, gain, looped)?;
        self.journal.push(Op::Play);
        Ok(voice)
    }

    fn set_gain(&mut self, voice: VoiceId, gain: f32) -> Result<(), PlaybackError> {
        self.inner.set_gain(voice, gain)?;
        self.journal.push(Op::Gain(gain));
        Ok(())
    }

    fn stop(&mut self, voice: VoiceId) {
        self.inner.stop(voice);
        self.journal.push(Op::Stop);
    }

    fn is_active(&self, voice: VoiceId) -> bool {
        self.inner.is_active(voice)
    }

    fn shutdown(&mut self) {
        self.inner.shutdown();
        self.journal.push(Op::Shutdown);
    }
}

const TICK: Duration = Duration::from_millis(100);

fn system(journal: &Journal, dial: &SharedDial) -> SystemState<Recording> {
    let engine = Recording {
        inner: MemoryEngine::new(8),
        journal: journal.clone(),
    };
    SystemState::new(
        AudioChannelPool::new(engine, AssetLibrary::silent(), true),
        SessionStateMachine::new(Duration::from_secs(120)),
        CrossfadeController::new(AnalogReader::new(Box::new(dial.clone()), 512), 962),
        DebounceFilter::new(Duration::from_millis(300)),
        LineMap::default(),
    )
}

fn is_play(op: &Op) -> bool {
    matches!(op, Op::Play)
}

fn is_stop(op: &Op) -> bool {
    matches!(op, Op::Stop)
}

fn is_shutdown(op: &Op) -> bool {
    matches!(op, Op::Shutdown)
}

#[tokio::test(start_paused = true)]
async fn test_insertion_through_queue_starts_session() {
    let journal = Journal::default();
    let dial = SharedDial::new(481);
    let (tx, rx) = edge_queue(16);
    let cancel = CancellationToken::new();
    let run = tokio::spawn(MainLoop::new(system(&journal, &dial), rx, TICK).run(cancel.clone()));

    tx.notify(0, Level::Low);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(journal.count(is_play), 8);

    // Crossfade follows the dial on the next ticks
    dial.set(962);
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(journal.last_gain(), Some(0.0));

    cancel.cancel();
    let state = run.await.unwrap();
    assert_eq!(state.session().state(), SessionState::Idle);
    assert_eq!(journal.count(is_stop), 8);
    assert_eq!(journal.count(is_shutdown), 1);
}

#[tokio::test(start_paused = true)]
async fn test_session_times_out_on_tick() {
    let journal = Journal::default();
    let (tx, rx) = edge_queue(16);
    let cancel = CancellationToken::new();
    let run = tokio::spawn(
        MainLoop::new(system(&journal, &SharedDial::new(481)), rx, TICK).run(cancel.clone()),
    );

    let t0 = Instant::now();
    tx.notify(2, Level::Low);
    tokio::time::sleep(Duration::from_secs(119)).await;
    assert_eq!(journal.count(is_stop), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(journal.count(is_stop), 8);
    let stopped_at = journal.first(is_stop).unwrap();
    assert!(stopped_at >= t0 + Duration::from_secs(120));
    assert!(stopped_at <= t0 + Duration::from_secs(120) + TICK);
    assert_eq!(journal.count(is_shutdown), 0);

    cancel.cancel();
    run.await.unwrap();
    assert_eq!(journal.count(is_shutdown), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fires_after_producers_leave() {
    let journal = Journal::default();
    let (tx, rx) = edge_queue(16);
    let cancel = CancellationToken::new();
    let run = tokio::spawn(
        MainLoop::new(system(&journal, &SharedDial::new(481)), rx, TICK).run(cancel.clone()),
    );

    tx.notify(1, Level::Low);
    drop(tx);
    tokio::time::sleep(Duration::from_secs(121)).await;
    assert_eq!(journal.count(is_stop), 8);

    cancel.cancel();
    run.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unmapped_line_starts_nothing() {
    let journal = Journal::default();
    let (tx, rx) = edge_queue(16);
    let cancel = CancellationToken::new();
    let run = tokio::spawn(
        MainLoop::new(system(&journal, &SharedDial::new(481)), rx, TICK).run(cancel.clone()),
    );

    tx.notify(42, Level::Low);
    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();

    let state = run.await.unwrap();
    assert_eq!(journal.count(is_play), 0);
    assert_eq!(state.session().state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_tears_down_active_session() {
    let journal = Journal::default();
    let (tx, rx) = edge_queue(16);
    let cancel = CancellationToken::new();
    let run = tokio::spawn(
        MainLoop::new(system(&journal, &SharedDial::new(481)), rx, TICK).run(cancel.clone()),
    );

    tx.notify(0, Level::Low);
    tx.notify(3, Level::Low);
    tokio::time::sleep(Duration::from_secs(5)).await;
    cancel.cancel();

    let state = run.await.unwrap();
    let snapshot = state.snapshot(Instant::now());
    assert_eq!(snapshot.state, SessionState::Idle);
    assert_eq!(snapshot.live_channels, 0);
    assert!(snapshot.slots.iter().all(|s| !s.occupied));
    assert_eq!(journal.count(is_play), 8);
    assert_eq!(journal.count(is_stop), 8);
    assert_eq!(journal.count(is_shutdown), 1);
}
