// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_PHP_VERSION: &str = "83";
pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_ROOT: &str = "public";

/// The pool's TCP fallback sits this far above the proxy port; both ports
/// are reserved together.
pub const POOL_PORT_OFFSET: u16 = 100;
pub const MAX_PORT: u16 = u16::MAX - POOL_PORT_OFFSET;

/// Persisted record of a project, `projects/<name>/.pit/config.json`.
///
/// Every runtime path is derived from `name` and `port`; nothing derived is
/// stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub php_version: String,
    pub port: u16,
    /// Document root, relative to the project directory.
    pub root: String,
}

impl ProjectConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            php_version: DEFAULT_PHP_VERSION.to_string(),
            port: DEFAULT_PORT,
            root: DEFAULT_ROOT.to_string(),
        }
    }

    pub fn pool_port(&self) -> u16 {
        self.port.saturating_add(POOL_PORT_OFFSET)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidProject {
            name: self.name.clone(),
            reason,
        };
        if self.port == 0 || self.port > MAX_PORT {
            return Err(invalid(format!("port {} outside 1..={MAX_PORT}", self.port)));
        }
        if self.php_version.trim().is_empty() {
            return Err(invalid("empty php_version".to_string()));
        }
        if Path::new(&self.root).is_absolute() || self.root.split('/').any(|c| c == "..") {
            return Err(invalid(format!("root {:?} escapes the project", self.root)));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::config(path, "missing"),
            _ => Error::config(path, e),
        })?;
        serde_json::from_str(&data).map_err(|e| Error::config(path, e))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
