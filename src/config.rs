use crate::app_dirs::AppDirs;
use crate::cadence::PidGains;
use crate::error::ConfigError;
use crate::schedule::{Preset, WpmSchedule, WORDS_PER_TARGET};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Control sequence looked up in the working directory unless overridden.
pub const DEFAULT_CONTROL_FILE: &str = "control.json";

/// Upper bound accepted for `delay_clamp_ms`.
pub const MAX_KEY_DELAY_MS: f64 = 60_000.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub preset: Preset,
    pub typing: TypingConfig,
}

/// Knobs for cadence, mistakes and session limits. Ranges are inclusive
/// `[min, max]` pairs in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TypingConfig {
    pub default_target_wpm: u32,
    pub wrong_word_probability: f64,
    pub typos_enabled: bool,
    pub typo_probability: f64,
    pub typo_max_chars: usize,
    pub word_pauses_enabled: bool,
    pub word_pause_every: usize,
    pub word_pause_ms: (u64, u64),
    pub jitter_ms: (u64, u64),
    pub space_delay_ms: (u64, u64),
    pub delay_clamp_ms: (f64, f64),
    pub safety_ceiling_ms: u64,
    pub poll_interval_ms: u64,
    pub words_per_target: usize,
    pub apply_pid_correction: bool,
    pub gains: PidGains,
    pub factor_clamp: (f64, f64),
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            default_target_wpm: 105,
            wrong_word_probability: 0.08,
            typos_enabled: false,
            typo_probability: 0.03,
            typo_max_chars: 5,
            word_pauses_enabled: false,
            word_pause_every: 10,
            word_pause_ms: (150, 500),
            jitter_ms: (4, 20),
            space_delay_ms: (12, 35),
            delay_clamp_ms: (8.0, 220.0),
            safety_ceiling_ms: 70_000,
            poll_interval_ms: 150,
            words_per_target: WORDS_PER_TARGET,
            apply_pid_correction: false,
            gains: PidGains::default(),
            factor_clamp: (0.4, 2.2),
        }
    }
}

impl TypingConfig {
    pub fn safety_ceiling(&self) -> Duration {
        Duration::from_millis(self.safety_ceiling_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Replace bounds that could not produce a usable key delay with their
    /// defaults. Delay bounds must be finite with `0 <= lo <= hi`, factor
    /// bounds positive with `lo <= hi`.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if !ordered_within(self.delay_clamp_ms, 0.0, MAX_KEY_DELAY_MS) {
            let (lo, hi) = self.delay_clamp_ms;
            warn!(lo, hi, "invalid delay_clamp_ms; using defaults");
            self.delay_clamp_ms = defaults.delay_clamp_ms;
        }

        if !ordered_within(self.factor_clamp, f64::MIN_POSITIVE, f64::MAX) {
            let (lo, hi) = self.factor_clamp;
            warn!(lo, hi, "invalid factor_clamp; using defaults");
            self.factor_clamp = defaults.factor_clamp;
        }

        self
    }
}

// NaN and infinities fail every comparison that matters here.
fn ordered_within((lo, hi): (f64, f64), min: f64, max: f64) -> bool {
    min <= lo && lo <= hi && hi <= max
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("ghostkeys_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let cfg: Config = fs::read(&self.path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();
        Config {
            typing: cfg.typing.validated(),
            ..cfg
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}

/// Read a persisted WPM control sequence.
///
/// A missing file is `Ok(None)`. Anything other than a non-empty JSON array of
/// positive integers is rejected so the caller can warn and fall back to a
/// preset.
pub fn load_control_sequence(path: &Path) -> Result<Option<WpmSchedule>, ConfigError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let value: Value = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    parse_control_value(path, &value).map(Some)
}

fn parse_control_value(path: &Path, value: &Value) -> Result<WpmSchedule, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidControl {
        path: path.to_path_buf(),
        reason,
    };

    let Value::Array(items) = value else {
        return Err(invalid("expected a json array of wpm values".into()));
    };
    if items.is_empty() {
        return Err(invalid("array is empty".into()));
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_u64()
                .filter(|n| *n > 0)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    invalid(format!("entry {i} is not a positive integer: {item}"))
                })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(WpmSchedule::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("config.json"));
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        assert_eq!(store.load(), cfg);
    }

    #[test]
    fn save_creates_parent_dirs_and_keeps_overrides() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nested/deeper/config.json"));
        let cfg = Config {
            preset: Preset::Gamer,
            typing: TypingConfig {
                typos_enabled: true,
                apply_pid_correction: true,
                safety_ceiling_ms: 5_000,
                ..TypingConfig::default()
            },
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load(), cfg);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let json = r#"{"preset":"fatigue","typing":{"wrong_word_probability":0.2}}"#;
        fs::write(&path, json).unwrap();
        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.preset, Preset::Fatigue);
        assert_eq!(cfg.typing.wrong_word_probability, 0.2);
        assert_eq!(cfg.typing.safety_ceiling_ms, 70_000);
        assert_eq!(cfg.typing.jitter_ms, (4, 20));
    }

    #[test]
    fn unreadable_config_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
        let missing = FileConfigStore::with_path(dir.path().join("absent.json"));
        assert_eq!(missing.load(), Config::default());
    }

    #[test]
    fn unusable_clamps_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let json = r#"{"typing":{"delay_clamp_ms":[-50.0,-10.0],"factor_clamp":[0.0,2.0]}}"#;
        fs::write(&path, json).unwrap();
        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.typing.delay_clamp_ms, (8.0, 220.0));
        assert_eq!(cfg.typing.factor_clamp, (0.4, 2.2));

        let inverted = TypingConfig {
            delay_clamp_ms: (300.0, 10.0),
            ..TypingConfig::default()
        };
        assert_eq!(inverted.validated().delay_clamp_ms, (8.0, 220.0));

        let huge = TypingConfig {
            delay_clamp_ms: (8.0, f64::MAX),
            ..TypingConfig::default()
        };
        assert_eq!(huge.validated().delay_clamp_ms, (8.0, 220.0));

        let custom = TypingConfig {
            delay_clamp_ms: (0.0, 500.0),
            factor_clamp: (0.5, 1.5),
            ..TypingConfig::default()
        };
        assert_eq!(custom.clone().validated(), custom);
    }

    #[test]
    fn control_sequence_loads_exact_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("control.json");
        fs::write(&path, "[110, 115, 120]").unwrap();
        let schedule = load_control_sequence(&path).unwrap().unwrap();
        assert_eq!(schedule.as_slice(), &[110, 115, 120]);
    }

    #[test]
    fn missing_control_file_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("control.json");
        assert_matches!(load_control_sequence(&path), Ok(None));
    }

    #[test]
    fn malformed_control_files_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("control.json");

        fs::write(&path, "{\"wpm\": [110]}").unwrap();
        assert_matches!(
            load_control_sequence(&path),
            Err(ConfigError::InvalidControl { .. })
        );

        fs::write(&path, "[110, \"fast\"]").unwrap();
        assert_matches!(
            load_control_sequence(&path),
            Err(ConfigError::InvalidControl { .. })
        );

        fs::write(&path, "[110, 0]").unwrap();
        assert_matches!(
            load_control_sequence(&path),
            Err(ConfigError::InvalidControl { .. })
        );

        fs::write(&path, "[110.5]").unwrap();
        assert_matches!(
            load_control_sequence(&path),
            Err(ConfigError::InvalidControl { .. })
        );

        fs::write(&path, "[]").unwrap();
        assert_matches!(
            load_control_sequence(&path),
            Err(ConfigError::InvalidControl { .. })
        );

        fs::write(&path, "[110,").unwrap();
        assert_matches!(load_control_sequence(&path), Err(ConfigError::Json { .. }));
    }
}
