//! OS-aware path detection for appdist state.
//!
//! - **Windows**: `%APPDATA%\Appdist\`
//! - **macOS**: `~/Library/Application Support/Appdist/`
//! - **Linux**: `~/.local/share/Appdist/` (state) and `~/.config/Appdist/` (config)
//!
//! Both locations can be overridden with `APPDIST_DATA_DIR` and
//! `APPDIST_CONFIG_DIR`.

use std::path::PathBuf;
use tracing::debug;

use crate::error::{Result, StorageError};

/// Application name used for storage directories.
pub const APP_NAME: &str = "Appdist";

/// Subdirectory names.
pub const STATE_DIR: &str = "state";
pub const DOWNLOADS_DIR: &str = "downloads";
pub const LOGS_DIR: &str = "logs";

/// Appdist storage paths container.
#[derive(Debug, Clone)]
pub struct AppdistPaths {
    /// Root data directory (platform-specific).
    pub data_dir: PathBuf,
    /// Per-service state files.
    pub state_dir: PathBuf,
    /// Downloaded release packages.
    pub downloads_dir: PathBuf,
    /// Log files.
    pub logs_dir: PathBuf,
}

impl AppdistPaths {
    /// Create AppdistPaths with automatic OS detection.
    pub fn new() -> Result<Self> {
        let data_dir = appdist_data_dir()?;
        Ok(Self::from_root(data_dir))
    }

    /// Create AppdistPaths from a custom root directory.
    pub fn from_root(data_dir: PathBuf) -> Self {
        Self {
            state_dir: data_dir.join(STATE_DIR),
            downloads_dir: data_dir.join(DOWNLOADS_DIR),
            logs_dir: data_dir.join(LOGS_DIR),
            data_dir,
        }
    }

    /// Ensure all directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.state_dir)?;
        std::fs::create_dir_all(&self.downloads_dir)?;
        std::fs::create_dir_all(&self.logs_dir)?;
        debug!(data_dir = %self.data_dir.display(), "Appdist storage directories initialized");
        Ok(())
    }

    /// Get the state file for a named service scope.
    pub fn state_file(&self, scope: &str) -> PathBuf {
        self.state_dir.join(format!("{scope}.json"))
    }
}

/// Get the appdist data directory based on the current OS.
pub fn appdist_data_dir() -> Result<PathBuf> {
    if let Some(path) = env_override("APPDIST_DATA_DIR") {
        debug!(path = %path.display(), "Using APPDIST_DATA_DIR override");
        return Ok(path);
    }

    let base = dirs::data_dir().ok_or(StorageError::HomeDirNotFound)?;
    Ok(base.join(APP_NAME))
}

/// Get the appdist config directory based on the current OS.
pub fn appdist_config_dir() -> Result<PathBuf> {
    if let Some(path) = env_override("APPDIST_CONFIG_DIR") {
        debug!(path = %path.display(), "Using APPDIST_CONFIG_DIR override");
        return Ok(path);
    }

    let base = dirs::config_dir().ok_or(StorageError::HomeDirNotFound)?;
    Ok(base.join(APP_NAME))
}

fn env_override(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|val| !val.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_structure() {
        let paths = AppdistPaths::from_root(PathBuf::from("/tmp/appdist"));
        assert!(paths.state_dir.ends_with(STATE_DIR));
        assert!(paths.downloads_dir.ends_with(DOWNLOADS_DIR));
        assert!(paths.logs_dir.ends_with(LOGS_DIR));
        assert_eq!(paths.data_dir, PathBuf::from("/tmp/appdist"));
    }

    #[test]
    fn test_state_file() {
        let paths = AppdistPaths::from_root(PathBuf::from("/tmp/appdist"));
        let file = paths.state_file("updates");
        assert_eq!(file, PathBuf::from("/tmp/appdist/state/updates.json"));
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppdistPaths::from_root(dir.path().join("root"));
        paths.ensure_dirs().unwrap();
        assert!(paths.state_dir.is_dir());
        assert!(paths.downloads_dir.is_dir());
        assert!(paths.logs_dir.is_dir());
    }
}
