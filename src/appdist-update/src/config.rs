//! Update configuration types.

use std::path::{Path, PathBuf};

use appdist_login::{DEFAULT_LOGIN_URL, DEFAULT_PLATFORM};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{UpdateError, UpdateResult};
use crate::version::LocalRelease;

/// Default base URL for API calls.
pub const DEFAULT_API_URL: &str = "https://api.appdist.dev";

/// File name of the update configuration inside the config directory.
pub const CONFIG_FILE: &str = "update.json";

/// Identity of the installed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    /// Package identifier, also used as the login redirect id.
    pub package_name: String,
    /// Human readable version.
    pub version_name: String,
    /// Monotonic build number.
    pub version_code: i64,
}

impl Default for AppIdentity {
    fn default() -> Self {
        Self {
            package_name: String::new(),
            version_name: "0.0.0".to_string(),
            version_code: 0,
        }
    }
}

impl AppIdentity {
    /// The installed release as seen by the applicability check.
    pub fn local_release(&self) -> LocalRelease {
        LocalRelease::new(self.version_code, crate::version::release_hash(self))
    }
}

/// User configuration for updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Application secret identifying the app on the distribution service.
    #[serde(default)]
    pub app_secret: String,

    /// Base URL for API calls.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL opened in the browser to log in.
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Platform name reported to the login page.
    #[serde(default = "default_platform")]
    pub platform: String,

    /// Whether the update service is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Where downloaded packages are stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,

    /// Command used to install a downloaded package. `{}` is replaced by the
    /// package path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_command: Option<String>,

    /// Installed application identity.
    #[serde(default)]
    pub app: AppIdentity,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_string()
}

fn default_platform() -> String {
    DEFAULT_PLATFORM.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            app_secret: String::new(),
            api_url: default_api_url(),
            login_url: default_login_url(),
            platform: default_platform(),
            enabled: true,
            download_dir: None,
            install_command: None,
            app: AppIdentity::default(),
        }
    }
}

impl UpdateConfig {
    /// Default location of the config file.
    pub fn default_path() -> Option<PathBuf> {
        appdist_storage::appdist_config_dir()
            .ok()
            .map(|dir| dir.join(CONFIG_FILE))
    }

    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                debug!(path = %path.display(), error = %e, "Using default update config");
                Self::default()
            }),
            None => Self::default(),
        }
    }

    /// Load config from a specific file.
    pub fn load_from(path: &Path) -> UpdateResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to a specific file.
    pub fn save_to(&self, path: &Path) -> UpdateResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `APPDIST_APP_SECRET`, `APPDIST_API_URL` and `APPDIST_LOGIN_URL`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(secret) = lookup("APPDIST_APP_SECRET") {
            self.app_secret = secret;
        }
        if let Some(url) = lookup("APPDIST_API_URL") {
            self.api_url = url;
        }
        if let Some(url) = lookup("APPDIST_LOGIN_URL") {
            self.login_url = url;
        }
        self
    }

    /// Check the config is usable before starting a workflow.
    pub fn validate(&self) -> UpdateResult<()> {
        if self.app_secret.trim().is_empty() {
            return Err(UpdateError::ConfigError {
                message: "app_secret is required".to_string(),
            });
        }
        for (name, value) in [("api_url", &self.api_url), ("login_url", &self.login_url)] {
            let url = url::Url::parse(value).map_err(|e| UpdateError::ConfigError {
                message: format!("{name} is not a valid URL: {e}"),
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(UpdateError::ConfigError {
                    message: format!("{name} must use http or https"),
                });
            }
            if url.scheme() == "http" {
                warn!(%name, url = %value, "Update service configured over plain http");
            }
        }
        Ok(())
    }
}
