//! Configuration loading for the toyjam installation daemon.
//!
//! Configuration is split into two groups:
//!
//! - **Hardware** (`SensorsConfig`, `TelemetryConfig`): how the box is wired -
//!   GPIO lines, the ADC channel, its calibration, logging.
//!
//! - **Playback** (`TimingConfig`, `AudioConfig`): how a session behaves -
//!   idle timeout, debounce window, tick cadence, which WAV files play.
//!
//! # Usage
//!
//! ```rust,no_run
//! use toyconf::ToyConfig;
//!
//! let config = ToyConfig::load().expect("Failed to load config");
//! config.validate().expect("Invalid config");
//!
//! println!("Timeout: {}s", config.timing.playback_duration_secs);
//! println!("Sensor ceiling: {}", config.sensors.sensor_max);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/toyjam/config.toml` (system)
//! 2. `~/.config/toyjam/config.toml` (user)
//! 3. `./toyjam.toml` (local override, or the `--config` path)
//! 4. Environment variables (`TOYJAM_*`)
//!
//! # Example Config
//!
//! ```toml
//! [timing]
//! playback_duration_secs = 120
//! debounce_ms = 300
//! tick_ms = 100
//!
//! [sensors]
//! backend = "sysfs"
//! slot_lines = [0, 1, 2, 3, 4, 5]
//! sensor_max = 962
//!
//! [audio]
//! engine = "rodio"
//! asset_dir = "~/installation/wav_files"
//! loop_forever = true
//! ```

pub mod hardware;
pub mod loader;
pub mod playback;

pub use hardware::{SensorBackend, SensorsConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};
pub use playback::{AudioConfig, EngineKind, TimingConfig};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

/// Number of foreground slots the installation has.
pub const SLOT_COUNT: usize = 6;

/// Longest accepted idle timeout: one day.
pub const MAX_PLAYBACK_DURATION_SECS: u64 = 24 * 60 * 60;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Complete toyjam configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToyConfig {
    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub sensors: SensorsConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl ToyConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/toyjam/config.toml`
    /// 3. `~/.config/toyjam/config.toml`
    /// 4. `./toyjam.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::load_table(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let mut config = loader::from_table(merged, sources.files.last().map(|p| p.as_path()))?;
        loader::apply_env_overrides(&mut config, &mut sources);
        config.expand_paths();

        Ok((config, sources))
    }

    fn expand_paths(&mut self) {
        self.audio.asset_dir = loader::expand_path(&self.audio.asset_dir.to_string_lossy());
        self.sensors.gpio_root = loader::expand_path(&self.sensors.gpio_root.to_string_lossy());
        self.sensors.adc_path = loader::expand_path(&self.sensors.adc_path.to_string_lossy());
    }

    /// Reject configurations the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.playback_duration_secs == 0
            || self.timing.playback_duration_secs > MAX_PLAYBACK_DURATION_SECS
        {
            return Err(ConfigError::Invalid {
                field: "timing.playback_duration_secs",
                reason: format!(
                    "{} is outside 1..={}",
                    self.timing.playback_duration_secs, MAX_PLAYBACK_DURATION_SECS
                ),
            });
        }
        if self.timing.tick_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "timing.tick_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.sensors.sensor_max == 0 {
            return Err(ConfigError::Invalid {
                field: "sensors.sensor_max",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.sensors.sensor_max > self.sensors.adc_max {
            return Err(ConfigError::Invalid {
                field: "sensors.sensor_max",
                reason: format!(
                    "{} exceeds converter full scale {}",
                    self.sensors.sensor_max, self.sensors.adc_max
                ),
            });
        }
        if self.sensors.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "sensors.poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.sensors.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "sensors.queue_capacity",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.sensors.slot_lines.len() != SLOT_COUNT {
            return Err(ConfigError::Invalid {
                field: "sensors.slot_lines",
                reason: format!(
                    "expected {} lines, got {}",
                    SLOT_COUNT,
                    self.sensors.slot_lines.len()
                ),
            });
        }
        let unique: HashSet<_> = self.sensors.slot_lines.iter().collect();
        if unique.len() != self.sensors.slot_lines.len() {
            return Err(ConfigError::Invalid {
                field: "sensors.slot_lines",
                reason: "lines must be distinct".to_string(),
            });
        }
        if self.audio.foreground.len() != SLOT_COUNT {
            return Err(ConfigError::Invalid {
                field: "audio.foreground",
                reason: format!(
                    "expected {} files, got {}",
                    SLOT_COUNT,
                    self.audio.foreground.len()
                ),
            });
        }
        if self.audio.background.len() != 2 {
            return Err(ConfigError::Invalid {
                field: "audio.background",
                reason: format!("expected 2 files, got {}", self.audio.background.len()),
            });
        }
        if self
            .audio
            .foreground
            .iter()
            .chain(self.audio.background.iter())
            .any(|name| name.trim().is_empty())
        {
            return Err(ConfigError::Invalid {
                field: "audio",
                reason: "asset file names must not be empty".to_string(),
            });
        }
        if self.audio.init_max_attempts == Some(0) {
            return Err(ConfigError::Invalid {
                field: "audio.init_max_attempts",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Built by hand so optional keys show up as comments
        let mut output = String::new();

        output.push_str("# toyjam configuration\n\n");

        output.push_str("[timing]\n");
        output.push_str(&format!(
            "playback_duration_secs = {}\n",
            self.timing.playback_duration_secs
        ));
        output.push_str(&format!("debounce_ms = {}\n", self.timing.debounce_ms));
        output.push_str(&format!("tick_ms = {}\n", self.timing.tick_ms));

        output.push_str("\n[sensors]\n");
        output.push_str(&format!("backend = {}\n", quote(&self.sensors.backend.to_string())));
        let lines: Vec<String> = self.sensors.slot_lines.iter().map(|l| l.to_string()).collect();
        output.push_str(&format!("slot_lines = [{}]\n", lines.join(", ")));
        output.push_str(&format!("gpio_root = {}\n", quote_path(&self.sensors.gpio_root)));
        output.push_str(&format!(
            "poll_interval_ms = {}\n",
            self.sensors.poll_interval_ms
        ));
        output.push_str(&format!("adc_path = {}\n", quote_path(&self.sensors.adc_path)));
        output.push_str(&format!("adc_max = {}\n", self.sensors.adc_max));
        output.push_str(&format!("sensor_max = {}\n", self.sensors.sensor_max));
        output.push_str(&format!("fallback_raw = {}\n", self.sensors.fallback_raw));
        output.push_str(&format!("queue_capacity = {}\n", self.sensors.queue_capacity));

        output.push_str("\n[audio]\n");
        output.push_str(&format!("engine = {}\n", quote(&self.audio.engine.to_string())));
        output.push_str(&format!("asset_dir = {}\n", quote_path(&self.audio.asset_dir)));
        output.push_str("foreground = [\n");
        for name in &self.audio.foreground {
            output.push_str(&format!("    {},\n", quote(name)));
        }
        output.push_str("]\n");
        output.push_str("background = [\n");
        for name in &self.audio.background {
            output.push_str(&format!("    {},\n", quote(name)));
        }
        output.push_str("]\n");
        output.push_str(&format!("loop_forever = {}\n", self.audio.loop_forever));
        output.push_str(&format!("max_voices = {}\n", self.audio.max_voices));
        output.push_str(&format!("init_backoff_ms = {}\n", self.audio.init_backoff_ms));
        match self.audio.init_max_attempts {
            Some(n) => output.push_str(&format!("init_max_attempts = {}\n", n)),
            None => output.push_str("# init_max_attempts = 10  (unset: retry forever)\n"),
        }
        if self.audio.startup_chime.is_empty() {
            output.push_str("# startup_chime = [\"aplay\", \"/path/to/chime.wav\"]\n");
        } else {
            let parts: Vec<String> = self
                .audio
                .startup_chime
                .iter()
                .map(|p| quote(p))
                .collect();
            output.push_str(&format!("startup_chime = [{}]\n", parts.join(", ")));
        }

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = {}\n", quote(&self.telemetry.log_level)));

        output
    }
}

/// A TOML string literal, escaped by the toml crate
fn quote(value: &str) -> String {
    toml::Value::from(value).to_string()
}

fn quote_path(path: &std::path::Path) -> String {
    quote(&path.to_string_lossy())
}
