//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, ToyConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/toyjam/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("toyjam/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("toyjam.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file into a raw table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load config from a single TOML file.
pub fn load_from_file(path: &Path) -> Result<ToyConfig, ConfigError> {
    let table = load_table(path)?;
    from_table(table, Some(path))
}

/// Deserialize a merged table; missing keys take their defaults.
pub fn from_table(table: toml::Table, origin: Option<&Path>) -> Result<ToyConfig, ConfigError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: origin
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("<merged>")),
            message: e.to_string(),
        })
}

/// Merge `overlay` into `base`, key by key. Nested tables merge recursively;
/// any other value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut ToyConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, env::vars());
}

/// Apply overrides from an explicit set of variables.
///
/// Values that fail to parse are ignored and the existing value is kept.
pub fn apply_overrides_from<I>(config: &mut ToyConfig, sources: &mut ConfigSources, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut rust_log = None;

    for (key, value) in vars {
        let applied = match key.as_str() {
            "TOYJAM_PLAYBACK_DURATION" => set_parsed(&mut config.timing.playback_duration_secs, &value),
            "TOYJAM_DEBOUNCE_MS" => set_parsed(&mut config.timing.debounce_ms, &value),
            "TOYJAM_TICK_MS" => set_parsed(&mut config.timing.tick_ms, &value),
            "TOYJAM_SENSORS" => set_parsed(&mut config.sensors.backend, &value),
            "TOYJAM_SENSOR_MAX" => set_parsed(&mut config.sensors.sensor_max, &value),
            "TOYJAM_ADC_PATH" => {
                config.sensors.adc_path = PathBuf::from(&value);
                true
            }
            "TOYJAM_GPIO_ROOT" => {
                config.sensors.gpio_root = PathBuf::from(&value);
                true
            }
            "TOYJAM_ENGINE" => set_parsed(&mut config.audio.engine, &value),
            "TOYJAM_ASSET_DIR" => {
                config.audio.asset_dir = PathBuf::from(&value);
                true
            }
            "TOYJAM_LOOP_FOREVER" => set_parsed(&mut config.audio.loop_forever, &value),
            "TOYJAM_LOG_LEVEL" => {
                config.telemetry.log_level = value.clone();
                true
            }
            // Applied last so it wins over TOYJAM_LOG_LEVEL regardless of order
            "RUST_LOG" => {
                rust_log = Some(value.clone());
                false
            }
            _ => false,
        };

        if applied {
            sources.env_overrides.push(key);
        }
    }

    if let Some(filter) = rust_log {
        config.telemetry.log_level = filter;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, value: &str) -> bool {
    match value.trim().parse() {
        Ok(parsed) => {
            *slot = parsed;
            true
        }
        Err(_) => false,
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineKind, SensorBackend};
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let expanded = expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_parse_minimal_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timing]\nplayback_duration_secs = 30").unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.timing.playback_duration_secs, 30);
        // Other values should be defaults
        assert_eq!(config.timing.debounce_ms, 300);
        assert_eq!(config.sensors.sensor_max, 962);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[timing]
playback_duration_secs = 90
debounce_ms = 250
tick_ms = 50

[sensors]
backend = "console"
slot_lines = [17, 27, 22, 5, 6, 13]
sensor_max = 900

[audio]
engine = "rodio"
asset_dir = "/srv/sounds"
loop_forever = false
init_max_attempts = 3
startup_chime = ["aplay", "/srv/sounds/hello.wav"]

[telemetry]
log_level = "debug"
"#;
        let table: toml::Table = toml.parse().unwrap();
        let config = from_table(table, None).unwrap();

        assert_eq!(config.timing.playback_duration_secs, 90);
        assert_eq!(config.timing.debounce_ms, 250);
        assert_eq!(config.timing.tick_ms, 50);
        assert_eq!(config.sensors.backend, SensorBackend::Console);
        assert_eq!(config.sensors.slot_lines, vec![17, 27, 22, 5, 6, 13]);
        assert_eq!(config.sensors.sensor_max, 900);
        assert_eq!(config.audio.engine, EngineKind::Rodio);
        assert_eq!(config.audio.asset_dir, PathBuf::from("/srv/sounds"));
        assert!(!config.audio.loop_forever);
        assert_eq!(config.audio.init_max_attempts, Some(3));
        assert_eq!(config.audio.startup_chime.len(), 2);
        assert_eq!(config.telemetry.log_level, "debug");
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timing\nbroken").unwrap();

        let err = load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let table: toml::Table = "[timing]\ntick_ms = \"fast\"".parse().unwrap();
        assert!(from_table(table, None).is_err());
    }

    #[test]
    fn test_merge_tables_is_key_by_key() {
        let mut base: toml::Table = r#"
[timing]
playback_duration_secs = 60
debounce_ms = 200
"#
        .parse()
        .unwrap();
        let overlay: toml::Table = r#"
[timing]
debounce_ms = 400
[audio]
engine = "rodio"
"#
        .parse()
        .unwrap();

        merge_tables(&mut base, overlay);
        let config = from_table(base, None).unwrap();

        assert_eq!(config.timing.playback_duration_secs, 60);
        assert_eq!(config.timing.debounce_ms, 400);
        assert_eq!(config.audio.engine, EngineKind::Rodio);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ToyConfig::default();
        let mut sources = ConfigSources::default();

        apply_overrides_from(
            &mut config,
            &mut sources,
            vars(&[
                ("TOYJAM_PLAYBACK_DURATION", "45"),
                ("TOYJAM_SENSORS", "console"),
                ("TOYJAM_ENGINE", "rodio"),
                ("TOYJAM_SENSOR_MAX", "1000"),
                ("HOME", "/root"),
            ]),
        );

        assert_eq!(config.timing.playback_duration_secs, 45);
        assert_eq!(config.sensors.backend, SensorBackend::Console);
        assert_eq!(config.audio.engine, EngineKind::Rodio);
        assert_eq!(config.sensors.sensor_max, 1000);
        assert_eq!(sources.env_overrides.len(), 4);
    }

    #[test]
    fn test_env_override_bad_value_is_ignored() {
        let mut config = ToyConfig::default();
        let mut sources = ConfigSources::default();

        apply_overrides_from(&mut config, &mut sources, vars(&[("TOYJAM_TICK_MS", "soon")]));

        assert_eq!(config.timing.tick_ms, 100);
        assert!(sources.env_overrides.is_empty());
    }

    #[test]
    fn test_rust_log_wins_over_log_level() {
        let mut config = ToyConfig::default();
        let mut sources = ConfigSources::default();

        apply_overrides_from(
            &mut config,
            &mut sources,
            vars(&[("RUST_LOG", "toyjam=trace"), ("TOYJAM_LOG_LEVEL", "warn")]),
        );

        assert_eq!(config.telemetry.log_level, "toyjam=trace");
    }
}
