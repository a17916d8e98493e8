//! Sensor input: slot trigger edges and the analog crossfade sensor
//!
//! Edge producers (interrupt callbacks, the sysfs poller thread, the console
//! reader) never touch session state. They timestamp the edge and push it
//! onto a bounded queue with [`EdgeSender::notify`], which never blocks. The
//! main loop is the only consumer.

mod console;
mod sysfs;

pub use console::{ConsoleSensors, SharedDial};
pub use sysfs::{IioAdc, SysfsGpio};

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::slot::{Level, SlotId};

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unexpected value {value:?} in {path}")]
    Parse { path: PathBuf, value: String },

    #[error("sensor source closed")]
    Closed,
}

/// One raw transition on a trigger line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    /// Hardware line number, mapped to a slot by [`LineMap`]
    pub line: u32,
    pub level: Level,
    /// When the producer saw the edge
    pub at: Instant,
}

/// Producer side of the edge queue. Cheap to clone, safe from any thread.
#[derive(Debug, Clone)]
pub struct EdgeSender {
    tx: mpsc::Sender<EdgeEvent>,
}

impl EdgeSender {
    /// Timestamp and enqueue an edge. Returns false when it was dropped.
    pub fn notify(&self, line: u32, level: Level) -> bool {
        self.send(EdgeEvent {
            line,
            level,
            at: Instant::now(),
        })
    }

    pub fn send(&self, event: EdgeEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(line = event.line, level = %event.level, "edge queue full, dropping edge");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("edge queue closed");
                false
            }
        }
    }
}

/// Bounded edge queue between producers and the main loop
pub fn edge_queue(capacity: usize) -> (EdgeSender, mpsc::Receiver<EdgeEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EdgeSender { tx }, rx)
}

/// Hardware line number for each slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMap {
    lines: Vec<u32>,
}

impl LineMap {
    pub fn new(lines: Vec<u32>) -> Self {
        Self { lines }
    }

    pub fn slot_for(&self, line: u32) -> Option<SlotId> {
        self.lines
            .iter()
            .position(|&l| l == line)
            .and_then(SlotId::new)
    }

    pub fn line_for(&self, slot: SlotId) -> Option<u32> {
        self.lines.get(slot.index()).copied()
    }

    pub fn lines(&self) -> &[u32] {
        &self.lines
    }
}

impl Default for LineMap {
    fn default() -> Self {
        Self::new(vec![0, 1, 2, 3, 4, 5])
    }
}

/// A source of raw analog samples
pub trait AnalogSensor: Send {
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

/// Something holding hardware that must be handed back at shutdown
pub trait SensorRelease {
    fn release(&mut self);
}

/// Analog reads that never fail
///
/// A failed read yields the last good sample, or `fallback` when no read
/// has succeeded yet. The first failure in a run is a warning; repeats are
/// debug so a dead sensor does not flood the log at tick rate.
pub struct AnalogReader {
    sensor: Box<dyn AnalogSensor>,
    last_good: Option<u16>,
    fallback: u16,
    failing: bool,
}

impl AnalogReader {
    pub fn new(sensor: Box<dyn AnalogSensor>, fallback: u16) -> Self {
        Self {
            sensor,
            last_good: None,
            fallback,
            failing: false,
        }
    }

    pub fn read(&mut self) -> u16 {
        match self.sensor.read_raw() {
            Ok(raw) => {
                if self.failing {
                    info!(raw, "analog sensor recovered");
                    self.failing = false;
                }
                self.last_good = Some(raw);
                raw
            }
            Err(e) => {
                let substitute = self.last_good.unwrap_or(self.fallback);
                if self.failing {
                    debug!(error = %e, substitute, "analog read failed");
                } else {
                    warn!(error = %e, substitute, "analog read failed, using substitute value");
                    self.failing = true;
                }
                substitute
            }
        }
    }

    pub fn last_good(&self) -> Option<u16> {
        self.last_good
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<Result<u16, SensorError>>);

    impl AnalogSensor for Scripted {
        fn read_raw(&mut self) -> Result<u16, SensorError> {
            self.0.pop_front().unwrap_or(Err(SensorError::Closed))
        }
    }

    #[test]
    fn test_line_map() {
        let map = LineMap::new(vec![17, 27, 22, 5, 6, 13]);
        assert_eq!(map.slot_for(22), SlotId::new(2));
        assert_eq!(map.slot_for(4), None);
        assert_eq!(map.line_for(SlotId::new(5).unwrap()), Some(13));
        assert_eq!(map.lines(), &[17, 27, 22, 5, 6, 13]);
    }

    #[test]
    fn test_analog_fallback_before_first_success() {
        let mut reader = AnalogReader::new(Box::new(Scripted(VecDeque::new())), 512);
        assert_eq!(reader.read(), 512);
        assert_eq!(reader.last_good(), None);
    }

    #[test]
    fn test_analog_keeps_last_good() {
        let script = VecDeque::from(vec![Ok(300), Err(SensorError::Closed), Ok(700)]);
        let mut reader = AnalogReader::new(Box::new(Scripted(script)), 512);

        assert_eq!(reader.read(), 300);
        assert_eq!(reader.read(), 300);
        assert_eq!(reader.read(), 700);
        assert_eq!(reader.read(), 700);
    }

    #[tokio::test]
    async fn test_edge_queue_drops_when_full() {
        let (tx, mut rx) = edge_queue(1);
        assert!(tx.notify(0, Level::Low));
        assert!(!tx.notify(1, Level::Low));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.line, 0);
        assert!(tx.notify(2, Level::High));
    }

    #[test]
    fn test_send_after_close() {
        let (tx, rx) = edge_queue(4);
        drop(rx);
        assert!(!tx.notify(0, Level::Low));
    }

    #[test]
    fn test_notify_from_plain_thread() {
        let (tx, mut rx) = edge_queue(4);
        std::thread::spawn(move || {
            tx.notify(3, Level::Low);
        })
        .join()
        .unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.line, 3);
        assert_eq!(event.level, Level::Low);
    }
}
