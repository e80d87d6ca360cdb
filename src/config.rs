//! Runtime configuration.

use crate::error::{HostsError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "HOSTS_SYNC_DATA_DIR";

/// Environment variable enabling safe mode when set to `1`.
pub const SAFE_MODE_ENV: &str = "HOSTS_SYNC_SAFE_MODE";

/// Default number of write-history entries kept on disk.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

const CONFIG_FILE: &str = "config.json";

/// Where profiles live, which hosts file is managed, and how writes behave.
///
/// # Example
///
/// ```
/// use hosts_sync::SyncConfig;
///
/// let config = SyncConfig::new("/tmp/hosts-data")
///     .with_hosts_path("/tmp/hosts")
///     .with_safe_mode(true);
///
/// assert_eq!(config.hosts_path.to_str(), Some("/tmp/hosts"));
/// assert!(config.safe_mode);
/// assert_eq!(config.history_limit, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory holding `list.json`, `trashcan.json`, profile contents and
    /// history.
    pub data_dir: PathBuf,

    /// The system hosts file that receives the managed region.
    pub hosts_path: PathBuf,

    /// Write to a throwaway temp file instead of the real hosts file.
    pub safe_mode: bool,

    /// Maximum number of entries kept in `history.json`.
    pub history_limit: usize,
}

impl SyncConfig {
    /// Creates a config rooted at `data_dir` targeting the platform hosts file.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            hosts_path: system_hosts_path(),
            safe_mode: false,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Builds a config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`HostsError::Io`] if no data directory is set and the home
    /// directory cannot be resolved.
    pub fn from_env() -> Result<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };
        let safe_mode = std::env::var(SAFE_MODE_ENV).is_ok_and(|v| v == "1");
        Ok(Self::new(data_dir).with_safe_mode(safe_mode))
    }

    /// Reads `<data_dir>/config.json`, falling back to defaults for any
    /// missing key. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`HostsError::Io`] if the file exists but cannot be read, or
    /// [`HostsError::Parse`] if it is not valid JSON.
    pub fn load(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::new(data_dir));
        }

        let raw = std::fs::read_to_string(&path)?;
        let mut config: Self =
            serde_json::from_str(&raw).map_err(|e| HostsError::parse(path.display().to_string(), e))?;
        config.data_dir = data_dir;
        Ok(config)
    }

    /// Writes this config to `<data_dir>/config.json`.
    ///
    /// # Errors
    ///
    /// Returns [`HostsError::Io`] if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        let path = self.data_dir.join(CONFIG_FILE);
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| HostsError::parse(path.display().to_string(), e))?;
        crate::util::write_atomic(&path, raw.as_bytes())?;
        Ok(())
    }

    /// Overrides the managed hosts file.
    #[must_use]
    pub fn with_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.hosts_path = path.into();
        self
    }

    /// Enables or disables safe mode.
    #[must_use]
    pub const fn with_safe_mode(mut self, on: bool) -> Self {
        self.safe_mode = on;
        self
    }

    /// Overrides the history cap.
    #[must_use]
    pub const fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(PathBuf::from(".").join("sweethosts"))
    }
}

/// Platform location of the system hosts file.
#[must_use]
pub fn system_hosts_path() -> PathBuf {
    if cfg!(target_os = "windows") {
        let windir = std::env::var("windir").unwrap_or_else(|_| "C:\\Windows".to_string());
        PathBuf::from(windir)
            .join("system32")
            .join("drivers")
            .join("etc")
            .join("hosts")
    } else {
        PathBuf::from("/etc/hosts")
    }
}

fn default_data_dir() -> Result<PathBuf> {
    let base = directories::BaseDirs::new().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "cannot resolve home directory")
    })?;
    Ok(base.home_dir().join(".sweethosts"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_defaults() {
        let c = SyncConfig::new("/data");
        assert_eq!(c.data_dir, PathBuf::from("/data"));
        assert_eq!(c.hosts_path, system_hosts_path());
        assert!(!c.safe_mode);
        assert_eq!(c.history_limit, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = SyncConfig::load(dir.path()).unwrap();
        assert_eq!(c, SyncConfig::new(dir.path()));
    }

    #[test]
    fn load_merges_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"history_limit": 7, "safe_mode": true}"#,
        )
        .unwrap();

        let c = SyncConfig::load(dir.path()).unwrap();
        assert_eq!(c.history_limit, 7);
        assert!(c.safe_mode);
        assert_eq!(c.data_dir, dir.path());
        assert_eq!(c.hosts_path, system_hosts_path());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let c = SyncConfig::new(dir.path())
            .with_hosts_path(dir.path().join("hosts"))
            .with_history_limit(3);
        c.save().unwrap();
        assert_eq!(SyncConfig::load(dir.path()).unwrap(), c);
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "not json").unwrap();
        assert!(matches!(
            SyncConfig::load(dir.path()),
            Err(HostsError::Parse { .. })
        ));
    }
}
