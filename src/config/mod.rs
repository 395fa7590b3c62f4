// illustrator-relay/src/config/mod.rs
//
// Copyright (c) 2025 Arcella Team
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE>
// or the MIT license <LICENSE-MIT>, at your option.
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::{Path, PathBuf};
use serde::Deserialize;

use crate::error::{RelayError, Result as RelayResult};

/// Proxy the plugin talks to when nothing else is configured.
pub const DEFAULT_PROXY_URL: &str = "http://localhost:3001";

/// Application name announced in the `register` event.
pub const DEFAULT_APPLICATION: &str = "illustrator";

const CONFIG_FILE_NAME: &str = "relay.toml";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub base_dir: PathBuf,
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
    pub proxy_url: String,
    pub application: String,
    /// Routes `executeScript` to the host's script evaluator. Has no effect
    /// with a host that provides none, such as `MemoryHost`.
    pub unsafe_eval: bool,
}

/// On-disk shape of `relay.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RelayToml {
    proxy_url: Option<String>,
    application: Option<String>,
    // Needs a host that provides a script evaluator.
    unsafe_eval: Option<bool>,
    log_dir: Option<PathBuf>,
}

impl RelayConfig {
    pub fn with_base_dir(base: PathBuf) -> Self {
        Self {
            config_dir: base.join("config"),
            log_dir: base.join("log"),
            base_dir: base,
            proxy_url: DEFAULT_PROXY_URL.to_string(),
            application: DEFAULT_APPLICATION.to_string(),
            unsafe_eval: false,
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    fn apply(&mut self, file: RelayToml) {
        if let Some(url) = file.proxy_url {
            self.proxy_url = url;
        }
        if let Some(app) = file.application {
            self.application = app;
        }
        if let Some(flag) = file.unsafe_eval {
            self.unsafe_eval = flag;
        }
        if let Some(dir) = file.log_dir {
            self.log_dir = if dir.is_relative() {
                self.base_dir.join(dir)
            } else {
                dir
            };
        }
    }
}

/// Default base directory: `~/.illustrator-relay`.
pub fn default_base_dir() -> RelayResult<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".illustrator-relay"))
        .ok_or_else(|| RelayError::Config("home directory not found".to_string()))
}

/// Loads `relay.toml` from `<base>/config`. A missing file yields defaults.
pub async fn load(base_dir: Option<PathBuf>) -> RelayResult<RelayConfig> {
    let base = match base_dir {
        Some(dir) => dir,
        None => default_base_dir()?,
    };

    let mut config = RelayConfig::with_base_dir(base);
    let path = config.config_file();

    if let Some(file) = read_config_file(&path).await? {
        config.apply(file);
    } else {
        tracing::debug!("No config file at {:?}, using defaults", path);
    }

    Ok(config)
}

async fn read_config_file(path: &Path) -> RelayResult<Option<RelayToml>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RelayError::io_with_path(path.to_path_buf(), e)),
    };

    toml::from_str(&contents)
        .map(Some)
        .map_err(|e| RelayError::Config(format!("{}: {}", CONFIG_FILE_NAME, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load(Some(temp_dir.path().to_path_buf())).await.unwrap();

        assert_eq!(config.proxy_url, DEFAULT_PROXY_URL);
        assert_eq!(config.application, "illustrator");
        assert!(!config.unsafe_eval);
        assert_eq!(config.log_dir, temp_dir.path().join("log"));
    }

    #[tokio::test]
    async fn test_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_dir = temp_dir.path().join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("relay.toml"),
            "proxy_url = \"http://127.0.0.1:4000\"\nunsafe_eval = true\nlog_dir = \"logs\"\n",
        )
        .unwrap();

        let config = load(Some(temp_dir.path().to_path_buf())).await.unwrap();
        assert_eq!(config.proxy_url, "http://127.0.0.1:4000");
        assert_eq!(config.application, "illustrator");
        assert!(config.unsafe_eval);
        assert_eq!(config.log_dir, temp_dir.path().join("logs"));
    }

    #[tokio::test]
    async fn test_malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_dir = temp_dir.path().join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("relay.toml"), "proxy_url = [").unwrap();

        let err = load(Some(temp_dir.path().to_path_buf())).await.unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[tokio::test]
    async fn test_unknown_key_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_dir = temp_dir.path().join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("relay.toml"), "transport = \"polling\"\n").unwrap();

        assert!(load(Some(temp_dir.path().to_path_buf())).await.is_err());
    }
}
