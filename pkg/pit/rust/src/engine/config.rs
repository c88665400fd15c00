// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::project::config::DEFAULT_PHP_VERSION;

fn default_php_version() -> String {
    DEFAULT_PHP_VERSION.to_string()
}

fn default_proxy_port() -> u16 {
    80
}

fn default_php_port() -> u16 {
    9099
}

fn default_api_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7070))
}

/// `config/engine.json`. Every field has a default so older one-field files
/// keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_php_version")]
    pub php_version: String,
    #[serde(default = "default_proxy_port")]
    pub proxy_port: u16,
    #[serde(default = "default_php_port")]
    pub php_port: u16,
    #[serde(default = "default_api_addr")]
    pub api_addr: SocketAddr,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            php_version: default_php_version(),
            proxy_port: default_proxy_port(),
            php_port: default_php_port(),
            api_addr: default_api_addr(),
        }
    }
}

impl EngineConfig {
    /// Load from `path`, falling back to defaults when the file is missing
    /// or malformed.
    pub fn load(path: &Path) -> Self {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) => {
                debug!("no engine config at {} ({e}), using defaults", path.display());
                return Self::default();
            }
        };

        match serde_json::from_str::<EngineConfig>(&data) {
            Ok(mut cfg) => {
                if cfg.php_version.trim().is_empty() {
                    cfg.php_version = default_php_version();
                }
                cfg
            }
            Err(e) => {
                warn!("ignoring malformed engine config {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
