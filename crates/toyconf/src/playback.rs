//! Playback configuration - session timing and the audio assets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Session and loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Idle timeout after the most recent insertion, in seconds.
    /// Default: 120
    #[serde(default = "TimingConfig::default_playback_duration_secs")]
    pub playback_duration_secs: u64,

    /// Per-slot quiet window for edge debouncing.
    /// Default: 300
    #[serde(default = "TimingConfig::default_debounce_ms")]
    pub debounce_ms: u64,

    /// Main loop tick (timeout checks and crossfade updates).
    /// Default: 100
    #[serde(default = "TimingConfig::default_tick_ms")]
    pub tick_ms: u64,
}

impl TimingConfig {
    fn default_playback_duration_secs() -> u64 {
        120
    }

    fn default_debounce_ms() -> u64 {
        300
    }

    fn default_tick_ms() -> u64 {
        100
    }

    pub fn playback_duration(&self) -> Duration {
        Duration::from_secs(self.playback_duration_secs)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            playback_duration_secs: Self::default_playback_duration_secs(),
            debounce_ms: Self::default_debounce_ms(),
            tick_ms: Self::default_tick_ms(),
        }
    }
}

/// Which audio engine renders the voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// In-process bookkeeping only; nothing reaches a sound card.
    #[default]
    Memory,
    /// System output through rodio (requires the `rodio` feature).
    Rodio,
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rodio" => Ok(Self::Rodio),
            other => Err(format!("unknown audio engine '{}' (expected memory or rodio)", other)),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Rodio => f.write_str("rodio"),
        }
    }
}

/// Audio engine and asset selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Audio engine.
    /// Default: memory
    #[serde(default)]
    pub engine: EngineKind,

    /// Directory holding the WAV assets.
    /// Default: wav_files
    #[serde(default = "AudioConfig::default_asset_dir")]
    pub asset_dir: PathBuf,

    /// Foreground track file per slot, in slot order.
    #[serde(default = "AudioConfig::default_foreground")]
    pub foreground: Vec<String>,

    /// The two ambience bed files, `a` then `b`.
    #[serde(default = "AudioConfig::default_background")]
    pub background: Vec<String>,

    /// Loop every voice until stopped. When false, voices play once.
    /// Default: true
    #[serde(default = "AudioConfig::default_loop_forever")]
    pub loop_forever: bool,

    /// Voices the engine may hold at once.
    /// Default: 8
    #[serde(default = "AudioConfig::default_max_voices")]
    pub max_voices: usize,

    /// Delay between audio engine init attempts.
    /// Default: 2000
    #[serde(default = "AudioConfig::default_init_backoff_ms")]
    pub init_backoff_ms: u64,

    /// Give up after this many init attempts. Unset retries forever.
    #[serde(default)]
    pub init_max_attempts: Option<u32>,

    /// Command run once after startup, e.g. `["aplay", "/opt/chime.wav"]`.
    /// Empty disables it.
    #[serde(default)]
    pub startup_chime: Vec<String>,
}

impl AudioConfig {
    fn default_asset_dir() -> PathBuf {
        PathBuf::from("wav_files")
    }

    fn default_foreground() -> Vec<String> {
        (1..=6).map(|n| format!("track{}.wav", n)).collect()
    }

    fn default_background() -> Vec<String> {
        vec!["track0a.wav".to_string(), "track0b.wav".to_string()]
    }

    fn default_loop_forever() -> bool {
        true
    }

    fn default_max_voices() -> usize {
        8
    }

    fn default_init_backoff_ms() -> u64 {
        2000
    }

    pub fn init_backoff(&self) -> Duration {
        Duration::from_millis(self.init_backoff_ms)
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            asset_dir: Self::default_asset_dir(),
            foreground: Self::default_foreground(),
            background: Self::default_background(),
            loop_forever: Self::default_loop_forever(),
            max_voices: Self::default_max_voices(),
            init_backoff_ms: Self::default_init_backoff_ms(),
            init_max_attempts: None,
            startup_chime: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_durations() {
        let timing = TimingConfig::default();
        assert_eq!(timing.playback_duration(), Duration::from_secs(120));
        assert_eq!(timing.debounce_window(), Duration::from_millis(300));
        assert_eq!(timing.tick_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_default_asset_names() {
        let audio = AudioConfig::default();
        assert_eq!(audio.foreground.len(), 6);
        assert_eq!(audio.foreground[0], "track1.wav");
        assert_eq!(audio.foreground[5], "track6.wav");
        assert_eq!(audio.background, vec!["track0a.wav", "track0b.wav"]);
        assert!(audio.loop_forever);
    }

    #[test]
    fn test_engine_kind_from_str() {
        assert_eq!("rodio".parse::<EngineKind>(), Ok(EngineKind::Rodio));
        assert_eq!("MEMORY".parse::<EngineKind>(), Ok(EngineKind::Memory));
        assert!("alsa".parse::<EngineKind>().is_err());
    }
}
