//! Node configuration management.
//!
//! Configuration is stored as TOML at `~/.config/echo/echo.toml` (override
//! with `ECHO_CONFIG`). The Overseer address and token may instead come
//! from `ECHO_OVERSEER_URL` / `ECHO_OVERSEER_TOKEN`, which win over empty
//! file fields — deployments usually inject the secret that way.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Display name of this node (hostname by default), used in logs.
    #[serde(default = "default_name")]
    pub name: String,

    /// HTTP listen port for uploads and downloads.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory where item files are stored.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,

    /// WebSocket URL of the Overseer's node endpoint.
    #[serde(default)]
    pub overseer_url: String,

    /// Shared secret identifying this node to the Overseer.
    #[serde(default)]
    pub overseer_token: String,

    /// PEM certificate path for serving HTTPS directly (optional).
    #[serde(default)]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key path for serving HTTPS directly (optional).
    #[serde(default)]
    pub tls_key: Option<PathBuf>,
}

fn default_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "Echo".into())
}

fn default_port() -> u16 {
    5002
}

fn default_storage_path() -> String {
    "./storage".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            port: default_port(),
            storage_path: default_storage_path(),
            overseer_url: String::new(),
            overseer_token: String::new(),
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found,
    /// then applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.apply_env(
            std::env::var("ECHO_OVERSEER_URL").ok(),
            std::env::var("ECHO_OVERSEER_TOKEN").ok(),
        );
        Ok(config)
    }

    /// Saves the current configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        // The file may hold the Overseer token; keep it private.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Environment values win over empty file fields.
    fn apply_env(&mut self, url: Option<String>, token: Option<String>) {
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            self.overseer_url = url;
        }
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.overseer_token = token;
        }
    }
}

/// Returns the configuration file path.
fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("ECHO_CONFIG") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home)
        .join(".config")
        .join("echo")
        .join("echo.toml")
}
