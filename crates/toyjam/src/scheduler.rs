//! The main loop
//!
//! Single owner of [`SystemState`]. Waits on cancellation, the edge queue
//! and the tick interval, in that priority order, and runs each handler to
//! completion before waiting again, so edge handling and the crossfade never
//! interleave.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::audio::AudioEngine;
use crate::sensor::EdgeEvent;
use crate::system::SystemState;

pub struct MainLoop<E: AudioEngine> {
    state: SystemState<E>,
    edges: mpsc::Receiver<EdgeEvent>,
    tick: Duration,
}

impl<E: AudioEngine> MainLoop<E> {
    pub fn new(state: SystemState<E>, edges: mpsc::Receiver<EdgeEvent>, tick: Duration) -> Self {
        Self { state, edges, tick }
    }

    /// Run until `cancel` fires, then tear everything down
    ///
    /// The state is handed back for inspection after shutdown.
    pub async fn run(mut self, cancel: CancellationToken) -> SystemState<E> {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut edges_open = true;

        info!(tick_ms = self.tick.as_millis() as u64, "main loop running");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("shutdown requested");
                    break;
                }

                event = self.edges.recv(), if edges_open => {
                    match event {
                        Some(event) => self.state.handle_edge(event),
                        None => {
                            // Producers gone; keep ticking so the timeout still fires
                            debug!("edge queue closed");
                            edges_open = false;
                        }
                    }
                }

                _ = ticker.tick() => {
                    self.state.tick(Instant::now());
                }
            }
        }

        self.state.shutdown();
        info!("main loop stopped");
        self.state
    }
}
