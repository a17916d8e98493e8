//! Bench sensors driven from a terminal
//!
//! Reads one command per line:
//!
//! ```text
//! low 3      slot line 3 goes LOW (occupied)
//! high 3     slot line 3 goes HIGH (empty)
//! dial 481   analog sensor now reads 481
//! ```

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{AnalogSensor, EdgeSender, SensorError, SensorRelease};
use crate::slot::Level;

/// Analog value shared between the console reader and the crossfade
#[derive(Debug, Clone)]
pub struct SharedDial(Arc<AtomicU16>);

impl SharedDial {
    pub fn new(initial: u16) -> Self {
        Self(Arc::new(AtomicU16::new(initial)))
    }

    pub fn set(&self, raw: u16) {
        self.0.store(raw, Ordering::Relaxed);
    }

    pub fn get(&self) -> u16 {
        self.0.load(Ordering::Relaxed)
    }
}

impl AnalogSensor for SharedDial {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        Ok(self.get())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Edge { line: u32, level: Level },
    Dial(u16),
}

pub fn parse_command(input: &str) -> Result<Command, String> {
    let mut words = input.split_whitespace();
    let verb = words.next().ok_or_else(|| "empty line".to_string())?;
    let arg = words
        .next()
        .ok_or_else(|| format!("'{}' needs an argument", verb))?;
    if let Some(extra) = words.next() {
        return Err(format!("unexpected '{}'", extra));
    }

    match verb.to_ascii_lowercase().as_str() {
        "low" | "high" => {
            let line = arg
                .parse()
                .map_err(|_| format!("bad line number '{}'", arg))?;
            let level = if verb.eq_ignore_ascii_case("low") {
                Level::Low
            } else {
                Level::High
            };
            Ok(Command::Edge { line, level })
        }
        "dial" => arg
            .parse()
            .map(Command::Dial)
            .map_err(|_| format!("bad dial value '{}'", arg)),
        other => Err(format!("unknown command '{}'", other)),
    }
}

pub struct ConsoleSensors {
    task: Option<JoinHandle<()>>,
}

impl ConsoleSensors {
    /// Read commands from stdin
    pub fn stdin(sender: EdgeSender, dial: SharedDial) -> Self {
        Self::spawn(BufReader::new(tokio::io::stdin()), sender, dial)
    }

    pub fn spawn<R>(reader: R, sender: EdgeSender, dial: SharedDial) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        info!("console sensors: type 'low N', 'high N' or 'dial RAW'");
        let task = tokio::spawn(async move {
            let mut lines = reader.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match parse_command(&line) {
                            Ok(Command::Edge { line, level }) => {
                                sender.notify(line, level);
                            }
                            Ok(Command::Dial(raw)) => {
                                debug!(raw, "dial set");
                                dial.set(raw);
                            }
                            Err(e) => warn!(input = %line, "{}", e),
                        }
                    }
                    Ok(None) => {
                        debug!("console input closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "console read failed");
                        break;
                    }
                }
            }
        });
        Self { task: Some(task) }
    }
}

impl SensorRelease for ConsoleSensors {
    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ConsoleSensors {
    fn drop(&mut self) {
        self.release();
    }
}
