//! Hardware configuration - sensor wiring and telemetry, fixed for the life of the process.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where slot edges and analog readings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SensorBackend {
    /// Linux sysfs GPIO lines plus an IIO ADC channel.
    #[default]
    Sysfs,
    /// Line-oriented commands on stdin, for bench runs without hardware.
    Console,
}

impl FromStr for SensorBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sysfs" => Ok(Self::Sysfs),
            "console" => Ok(Self::Console),
            other => Err(format!("unknown sensor backend '{}' (expected sysfs or console)", other)),
        }
    }
}

impl fmt::Display for SensorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sysfs => f.write_str("sysfs"),
            Self::Console => f.write_str("console"),
        }
    }
}

/// Digital trigger lines and the analog crossfade sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorsConfig {
    /// Sensor source.
    /// Default: sysfs
    #[serde(default)]
    pub backend: SensorBackend,

    /// GPIO line number for each slot, in slot order. Exactly six entries.
    /// Default: [0, 1, 2, 3, 4, 5]
    #[serde(default = "SensorsConfig::default_slot_lines")]
    pub slot_lines: Vec<u32>,

    /// Root of the sysfs GPIO tree.
    /// Default: /sys/class/gpio
    #[serde(default = "SensorsConfig::default_gpio_root")]
    pub gpio_root: PathBuf,

    /// How often the sysfs poller samples line values.
    /// Default: 5
    #[serde(default = "SensorsConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// IIO raw-value file for the analog sensor.
    #[serde(default = "SensorsConfig::default_adc_path")]
    pub adc_path: PathBuf,

    /// Converter full scale (exclusive upper bound of raw readings).
    /// Default: 1024
    #[serde(default = "SensorsConfig::default_adc_max")]
    pub adc_max: u16,

    /// Highest raw value the physical sensor actually produces.
    /// Default: 962 (about 94% of full scale)
    #[serde(default = "SensorsConfig::default_sensor_max")]
    pub sensor_max: u16,

    /// Reading used until the first successful analog sample.
    /// Default: 512
    #[serde(default = "SensorsConfig::default_fallback_raw")]
    pub fallback_raw: u16,

    /// Capacity of the edge event queue between producers and the main loop.
    /// Default: 64
    #[serde(default = "SensorsConfig::default_queue_capacity")]
    pub queue_capacity: usize,
}

impl SensorsConfig {
    fn default_slot_lines() -> Vec<u32> {
        vec![0, 1, 2, 3, 4, 5]
    }

    fn default_gpio_root() -> PathBuf {
        PathBuf::from("/sys/class/gpio")
    }

    fn default_poll_interval_ms() -> u64 {
        5
    }

    fn default_adc_path() -> PathBuf {
        PathBuf::from("/sys/bus/iio/devices/iio:device0/in_voltage0_raw")
    }

    fn default_adc_max() -> u16 {
        1024
    }

    fn default_sensor_max() -> u16 {
        962
    }

    fn default_fallback_raw() -> u16 {
        512
    }

    fn default_queue_capacity() -> usize {
        64
    }
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            backend: SensorBackend::default(),
            slot_lines: Self::default_slot_lines(),
            gpio_root: Self::default_gpio_root(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            adc_path: Self::default_adc_path(),
            adc_max: Self::default_adc_max(),
            sensor_max: Self::default_sensor_max(),
            fallback_raw: Self::default_fallback_raw(),
            queue_capacity: Self::default_queue_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter (trace, debug, info, warn, error, or an EnvFilter directive).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
