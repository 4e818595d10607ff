use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;

/// Daemon settings, persisted as settings.json next to the data directory.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Primary API base URL.
    pub api_primary: String,
    /// Fallback base tried when the primary is exhausted.
    #[serde(default)]
    pub api_fallback: Option<String>,
    pub db_path: PathBuf,
    /// Seconds between poll cycles in `run` mode.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Pause after each successful remote fetch.
    #[serde(default = "default_rate_sleep")]
    pub rate_sleep_ms: u64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub fetch_retries: u32,
    #[serde(default = "default_backoff")]
    pub fetch_backoff_ms: u64,
    /// When set, events are POSTed here instead of printed.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_poll_interval() -> u64 {
    300
}

fn default_rate_sleep() -> u64 {
    5_000
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_timeout() -> u64 {
    15
}

fn default_retries() -> u32 {
    3
}

fn default_backoff() -> u64 {
    2_000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_primary: "https://api.diveharder.com/raw".to_string(),
            api_fallback: Some("https://api.helldivers2.dev/raw".to_string()),
            db_path: PathBuf::from("data/war-watcher.sqlite"),
            poll_interval_secs: default_poll_interval(),
            rate_sleep_ms: default_rate_sleep(),
            cache_ttl_secs: default_cache_ttl(),
            request_timeout_secs: default_timeout(),
            fetch_retries: default_retries(),
            fetch_backoff_ms: default_backoff(),
            webhook_url: None,
        }
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            config_path: config_dir.join("settings.json"),
        }
    }

    pub fn load(&self) -> Settings {
        if self.config_path.exists() {
            if let Ok(content) = fs::read_to_string(&self.config_path) {
                if let Ok(settings) = serde_json::from_str(&content) {
                    return settings;
                }
            }
        }
        Settings::default()
    }

    pub fn save(&self, settings: &Settings) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.config_path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());

        let default = manager.load();
        assert_eq!(default.poll_interval_secs, 300);
        assert_eq!(default.fetch_retries, 3);

        let new_settings = Settings {
            api_primary: "http://localhost:9999".to_string(),
            poll_interval_secs: 60,
            ..Settings::default()
        };
        manager.save(&new_settings).unwrap();

        let loaded = manager.load();
        assert_eq!(loaded.api_primary, "http://localhost:9999");
        assert_eq!(loaded.poll_interval_secs, 60);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), "{ not json").unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());
        let loaded = manager.load();
        assert_eq!(loaded.rate_sleep_ms, 5_000);
    }
}
