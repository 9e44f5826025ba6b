use crate::search::SlackPolicy;
use crate::timestamp::Zone;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8078,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// What to do when a requested folder cannot be listed at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderErrorPolicy {
    #[default]
    Fail,
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Prefix joined onto every requested folder name.
    pub base_dir: PathBuf,
    /// `local`, `UTC` or a fixed `+HH:MM` offset.
    pub timezone: String,
    #[serde(default = "default_max_concurrent_folders")]
    pub max_concurrent_folders: usize,
    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: usize,
    pub read_timeout_ms: Option<u64>,
    #[serde(default = "default_slack")]
    pub slack_before: usize,
    #[serde(default = "default_slack")]
    pub slack_after: usize,
    pub on_folder_error: FolderErrorPolicy,
}

fn default_max_concurrent_folders() -> usize {
    8
}
fn default_max_concurrent_files() -> usize {
    (num_cpus::get() * 2).clamp(4, 64)
}
fn default_slack() -> usize {
    1
}
fn default_read_timeout_ms() -> Option<u64> {
    Some(30_000)
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            timezone: "local".to_string(),
            max_concurrent_folders: default_max_concurrent_folders(),
            max_concurrent_files: default_max_concurrent_files(),
            read_timeout_ms: default_read_timeout_ms(),
            slack_before: default_slack(),
            slack_after: default_slack(),
            on_folder_error: FolderErrorPolicy::default(),
        }
    }
}

impl SearchConfig {
    pub fn zone(&self) -> crate::error::Result<Zone> {
        self.timezone.parse()
    }

    pub fn slack(&self) -> SlackPolicy {
        SlackPolicy {
            before: self.slack_before,
            after: self.slack_after,
        }
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

impl Config {
    /// Load from `explicit` if given, otherwise from the first config file found.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_path(),
        };

        let config: Config = if let Some(path) = config_path {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    fn find_config_path() -> Option<PathBuf> {
        if let Some(xdg_config) = dirs::config_dir() {
            let xdg_path = xdg_config.join("rflog/config.toml");
            if xdg_path.exists() {
                return Some(xdg_path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let home_path = home.join(".rflog.toml");
            if home_path.exists() {
                return Some(home_path);
            }
        }

        let current_path = Path::new(".rflog.toml");
        if current_path.exists() {
            return Some(current_path.to_path_buf());
        }

        None
    }

    pub fn validate(&self) -> Result<()> {
        self.search
            .zone()
            .with_context(|| format!("Invalid search.timezone '{}'", self.search.timezone))?;
        anyhow::ensure!(
            self.search.max_concurrent_folders > 0,
            "search.max_concurrent_folders must be at least 1"
        );
        anyhow::ensure!(
            self.search.max_concurrent_files > 0,
            "search.max_concurrent_files must be at least 1"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr(), "0.0.0.0:8078");
        assert_eq!(config.search.slack(), SlackPolicy::default());
        assert_eq!(config.search.on_folder_error, FolderErrorPolicy::Fail);
        assert_eq!(config.search.read_timeout(), Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rflog.toml");
        fs::write(
            &path,
            r#"
[server]
port = 9000

[search]
base_dir = "/var/log"
timezone = "+01:00"
slack_after = 2
on_folder_error = "skip"
read_timeout_ms = 0
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.server.listen_addr(), "0.0.0.0:9000");
        assert_eq!(config.search.base_dir, PathBuf::from("/var/log"));
        assert_eq!(config.search.slack().before, 1);
        assert_eq!(config.search.slack().after, 2);
        assert_eq!(config.search.on_folder_error, FolderErrorPolicy::Skip);
        assert_eq!(config.search.read_timeout(), None);
        assert!(matches!(config.search.zone().unwrap(), Zone::Fixed(_)));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rflog.toml");

        fs::write(&path, "[search]\ntimezone = \"mars\"\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());

        fs::write(&path, "[search]\nmax_concurrent_files = 0\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());

        fs::write(&path, "[server\nport = 1").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
