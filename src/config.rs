use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use chrono_tz::Tz;

use crate::error::ConfigError;
use crate::store::appointments::DEFAULT_APPOINTMENTS_FILE;
use crate::store::settings::DEFAULT_SETTINGS_FILE;

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_RUN_FREQUENCY_MINUTES: u64 = 15;

/// `KEY=value` pairs from the file named by `CONFIG_FILE`.
#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine {
                    line: idx + 1,
                    content: line.to_string(),
                });
            };
            let mut value = value.trim();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            values.insert(key.trim().to_string(), value.to_string());
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    /// File value first, then the environment.
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).or_else(|| env::var(key).ok())
    }
}

/// Resolved host settings: where the data lives and how often to run.
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    pub data_dir: PathBuf,
    pub appointments_file: String,
    pub settings_file: String,
    pub run_frequency_minutes: u64,
    pub display_tz: Option<Tz>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            appointments_file: DEFAULT_APPOINTMENTS_FILE.to_string(),
            settings_file: DEFAULT_SETTINGS_FILE.to_string(),
            run_frequency_minutes: DEFAULT_RUN_FREQUENCY_MINUTES,
            display_tz: None,
        }
    }
}

impl HostConfig {
    pub fn resolve(config: &AppConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let run_frequency_minutes = match config.lookup("RUN_FREQUENCY_MINUTES") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(minutes) if minutes > 0 => minutes,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        key: "RUN_FREQUENCY_MINUTES".to_string(),
                        value: raw,
                    });
                }
            },
            None => defaults.run_frequency_minutes,
        };
        let display_tz = match config.lookup("DISPLAY_TIMEZONE") {
            Some(name) if !name.trim().is_empty() => Some(
                name.trim()
                    .parse::<Tz>()
                    .map_err(|_| ConfigError::InvalidTimezone(name.clone()))?,
            ),
            _ => None,
        };
        Ok(Self {
            data_dir: config
                .lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            appointments_file: config
                .lookup("APPOINTMENTS_FILE")
                .unwrap_or(defaults.appointments_file),
            settings_file: config
                .lookup("SETTINGS_FILE")
                .unwrap_or(defaults.settings_file),
            run_frequency_minutes,
            display_tz,
        })
    }

    pub fn appointments_path(&self) -> PathBuf {
        self.data_dir.join(&self.appointments_file)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(&self.settings_file)
    }
}
