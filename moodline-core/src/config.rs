use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::Error;

const ENV_SOURCE_PATH: &str = "MOODLINE_SOURCE_PATH";
const ENV_SQLITE_PATH: &str = "MOODLINE_SQLITE_PATH";
const ENV_CSV_PATH: &str = "MOODLINE_CSV_PATH";
const ENV_OFFSET_PATH: &str = "MOODLINE_OFFSET_PATH";
const ENV_POLL_INTERVAL_SECS: &str = "MOODLINE_POLL_INTERVAL_SECS";
const ENV_BATCH_SIZE: &str = "MOODLINE_BATCH_SIZE";

const DEFAULT_SOURCE_PATH: &str = "data/live_messages.jsonl";
const DEFAULT_SQLITE_PATH: &str = "data/moodline.db";
const DEFAULT_CSV_PATH: &str = "data/enriched_messages.csv";
const DEFAULT_OFFSET_PATH: &str = "data/moodline.offset";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
const DEFAULT_BATCH_SIZE: usize = 500;

pub fn config() -> &'static Settings {
    static CONF: OnceLock<Settings> = OnceLock::new();
    CONF.get_or_init(|| {
        let env_vars: HashMap<String, String> = env::vars().collect();
        match env_vars.try_into() {
            Ok(v) => v,
            Err(e) => {
                panic!("Failed to load configuration: {e:?}");
            }
        }
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// live data file appended to by the producer; read-only here
    pub source_path: PathBuf,
    /// relational sink location
    pub sqlite_path: PathBuf,
    /// flat append sink location
    pub csv_path: PathBuf,
    /// durable last-committed-offset value
    pub offset_path: PathBuf,
    /// idle wait between consumption cycles
    pub poll_interval: Duration,
    /// upper bound on records committed per cycle
    pub batch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_path: DEFAULT_SOURCE_PATH.into(),
            sqlite_path: DEFAULT_SQLITE_PATH.into(),
            csv_path: DEFAULT_CSV_PATH.into(),
            offset_path: DEFAULT_OFFSET_PATH.into(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// This implementation is to load settings from env variables
impl TryFrom<HashMap<String, String>> for Settings {
    type Error = Error;

    fn try_from(env_vars: HashMap<String, String>) -> std::result::Result<Self, Self::Error> {
        let mut settings = Settings::default();

        if let Some(source_path) = env_vars.get(ENV_SOURCE_PATH) {
            settings.source_path = source_path.into();
        }

        if let Some(sqlite_path) = env_vars.get(ENV_SQLITE_PATH) {
            settings.sqlite_path = sqlite_path.into();
        }

        if let Some(csv_path) = env_vars.get(ENV_CSV_PATH) {
            settings.csv_path = csv_path.into();
        }

        if let Some(offset_path) = env_vars.get(ENV_OFFSET_PATH) {
            settings.offset_path = offset_path.into();
        }

        if let Some(poll_interval) = env_vars.get(ENV_POLL_INTERVAL_SECS) {
            let secs: u64 = poll_interval.parse().map_err(|e| {
                Error::Config(format!(
                    "Parsing {ENV_POLL_INTERVAL_SECS}(set to '{poll_interval}'): {e:?}"
                ))
            })?;
            if secs == 0 {
                return Err(Error::Config(format!(
                    "{ENV_POLL_INTERVAL_SECS} must be greater than zero"
                )));
            }
            settings.poll_interval = Duration::from_secs(secs);
        }

        if let Some(batch_size) = env_vars.get(ENV_BATCH_SIZE) {
            settings.batch_size = batch_size.parse().map_err(|e| {
                Error::Config(format!(
                    "Parsing {ENV_BATCH_SIZE}(set to '{batch_size}'): {e:?}"
                ))
            })?;
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings: Settings = HashMap::new().try_into().unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.poll_interval, Duration::from_secs(2));
        assert_eq!(settings.batch_size, 500);
    }

    #[test]
    fn test_settings_load() {
        let env_vars: HashMap<String, String> = [
            (ENV_SOURCE_PATH, "/tmp/feed.jsonl"),
            (ENV_SQLITE_PATH, "/tmp/feed.db"),
            (ENV_CSV_PATH, "/tmp/feed.csv"),
            (ENV_OFFSET_PATH, "/tmp/feed.offset"),
            (ENV_POLL_INTERVAL_SECS, "7"),
            (ENV_BATCH_SIZE, "25"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let settings: Settings = env_vars.try_into().unwrap();
        assert_eq!(settings.source_path, PathBuf::from("/tmp/feed.jsonl"));
        assert_eq!(settings.sqlite_path, PathBuf::from("/tmp/feed.db"));
        assert_eq!(settings.csv_path, PathBuf::from("/tmp/feed.csv"));
        assert_eq!(settings.offset_path, PathBuf::from("/tmp/feed.offset"));
        assert_eq!(settings.poll_interval, Duration::from_secs(7));
        assert_eq!(settings.batch_size, 25);
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let env_vars: HashMap<String, String> =
            [(ENV_POLL_INTERVAL_SECS.to_string(), "0".to_string())]
                .into_iter()
                .collect();
        let result: std::result::Result<Settings, Error> = env_vars.try_into();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unparseable_batch_size_is_rejected() {
        let env_vars: HashMap<String, String> =
            [(ENV_BATCH_SIZE.to_string(), "lots".to_string())]
                .into_iter()
                .collect();
        let result: std::result::Result<Settings, Error> = env_vars.try_into();
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
