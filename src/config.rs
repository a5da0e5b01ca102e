//! Application-level configuration: admin credential and media storage.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVIA_RUSH_CONFIG_PATH";
/// Environment override for the shared admin credential.
const ADMIN_KEY_ENV: &str = "ADMIN_KEY";
/// Environment override for the media storage root.
const MEDIA_ROOT_ENV: &str = "MEDIA_ROOT";
/// Placeholder credential shipped with the binary.
const DEFAULT_ADMIN_KEY: &str = "change-me";
/// URL prefix under which stored media blobs are served.
const DEFAULT_MEDIA_BASE: &str = "/media";

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    admin_key: String,
    media_root: Option<PathBuf>,
    media_public_base: String,
}

impl AppConfig {
    /// Load the configuration from disk, apply environment overrides, and
    /// fall back to built-in defaults when the file is absent or malformed.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if let Ok(key) = env::var(ADMIN_KEY_ENV) {
            if !key.is_empty() {
                config.admin_key = key;
            }
        }
        if let Ok(root) = env::var(MEDIA_ROOT_ENV) {
            if !root.is_empty() {
                config.media_root = Some(PathBuf::from(root));
            }
        }

        if config.admin_key == DEFAULT_ADMIN_KEY {
            warn!("admin key is the built-in placeholder; set {ADMIN_KEY_ENV} in production");
        }

        config
    }

    /// Shared secret expected in the `X-Admin-Key` header.
    pub fn admin_key(&self) -> &str {
        &self.admin_key
    }

    /// Root directory for stored question images, when media is configured.
    pub fn media_root(&self) -> Option<&Path> {
        self.media_root.as_deref()
    }

    /// URL prefix under which media blobs are served.
    pub fn media_public_base(&self) -> &str {
        &self.media_public_base
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            admin_key: DEFAULT_ADMIN_KEY.to_owned(),
            media_root: None,
            media_public_base: DEFAULT_MEDIA_BASE.to_owned(),
        }
    }
}

/// JSON representation of the configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    admin_key: Option<String>,
    media_root: Option<PathBuf>,
    media_public_base: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            admin_key: value.admin_key.unwrap_or(defaults.admin_key),
            media_root: value.media_root,
            media_public_base: value
                .media_public_base
                .unwrap_or(defaults.media_public_base),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
