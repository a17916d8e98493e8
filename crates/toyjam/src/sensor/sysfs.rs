//! Linux sysfs GPIO lines and an IIO ADC channel
//!
//! The GPIO poller runs on its own thread, compares each line against the
//! last value it saw and reports changes through an [`EdgeSender`]. Lines it
//! had to export are unexported again on release.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{AnalogSensor, EdgeSender, SensorError, SensorRelease};
use crate::slot::Level;

/// The kernel creates the line directory asynchronously after export
const EXPORT_SETTLE_ATTEMPTS: u32 = 20;
const EXPORT_SETTLE_DELAY: Duration = Duration::from_millis(50);

pub struct SysfsGpio {
    root: PathBuf,
    exported: Vec<u32>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SysfsGpio {
    /// Prepare `lines` as inputs and start polling them every `poll`
    ///
    /// Lines exported before a failure are unexported again when the
    /// partially built value drops.
    pub fn open(
        root: &Path,
        lines: &[u32],
        poll: Duration,
        sender: EdgeSender,
    ) -> Result<Self, SensorError> {
        let mut gpio = Self {
            root: root.to_path_buf(),
            exported: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        };
        let mut value_paths = Vec::with_capacity(lines.len());

        for &line in lines {
            let dir = root.join(format!("gpio{}", line));
            if !dir.exists() {
                write_attr(&root.join("export"), &line.to_string())?;
                gpio.exported.push(line);
                wait_for_dir(&dir);
            }
            write_attr(&dir.join("direction"), "in")?;
            value_paths.push((line, dir.join("value")));
        }

        let mut last: Vec<Option<Level>> = Vec::with_capacity(value_paths.len());
        for (_, path) in &value_paths {
            last.push(Some(read_level(path)?));
        }
        info!(lines = ?lines, poll_ms = poll.as_millis() as u64, "gpio lines ready");

        let worker_stop = Arc::clone(&gpio.stop);
        let worker = std::thread::Builder::new()
            .name("toyjam-gpio".to_string())
            .spawn(move || poll_lines(value_paths, last, poll, sender, worker_stop))
            .map_err(|source| SensorError::Io {
                path: root.to_path_buf(),
                source,
            })?;
        gpio.worker = Some(worker);

        Ok(gpio)
    }
}

impl SensorRelease for SysfsGpio {
    fn release(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("gpio poller panicked");
            }
        }
        for line in self.exported.drain(..) {
            if let Err(e) = write_attr(&self.root.join("unexport"), &line.to_string()) {
                warn!(line, error = %e, "failed to unexport gpio line");
            }
        }
        debug!("gpio released");
    }
}

impl Drop for SysfsGpio {
    fn drop(&mut self) {
        self.release();
    }
}

fn poll_lines(
    paths: Vec<(u32, PathBuf)>,
    mut last: Vec<Option<Level>>,
    poll: Duration,
    sender: EdgeSender,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(poll);
        for ((line, path), previous) in paths.iter().zip(last.iter_mut()) {
            match read_level(path) {
                Ok(level) => {
                    if *previous != Some(level) {
                        // A line that failed and came back reports its level as an edge
                        *previous = Some(level);
                        sender.notify(*line, level);
                    }
                }
                Err(e) => {
                    if previous.is_some() {
                        warn!(line, error = %e, "gpio read failed");
                        *previous = None;
                    }
                }
            }
        }
    }
}

fn wait_for_dir(dir: &Path) {
    for _ in 0..EXPORT_SETTLE_ATTEMPTS {
        if dir.exists() {
            return;
        }
        std::thread::sleep(EXPORT_SETTLE_DELAY);
    }
}

fn write_attr(path: &Path, value: &str) -> Result<(), SensorError> {
    fs::write(path, value).map_err(|source| SensorError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_level(path: &Path) -> Result<Level, SensorError> {
    let raw = fs::read_to_string(path).map_err(|source| SensorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match raw.trim() {
        "0" => Ok(Level::Low),
        "1" => Ok(Level::High),
        other => Err(SensorError::Parse {
            path: path.to_path_buf(),
            value: other.to_string(),
        }),
    }
}

/// One IIO voltage channel, e.g. `/sys/bus/iio/devices/iio:device0/in_voltage0_raw`
pub struct IioAdc {
    path: PathBuf,
}

impl IioAdc {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AnalogSensor for IioAdc {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| SensorError::Io {
            path: self.path.clone(),
            source,
        })?;
        raw.trim().parse().map_err(|_| SensorError::Parse {
            path: self.path.clone(),
            value: raw.trim().to_string(),
        })
    }
}
