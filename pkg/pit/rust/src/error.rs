// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A persisted record is missing or cannot be parsed.
    #[error("invalid config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    /// A required executable or installation directory is absent.
    #[error("{what} not found at {}", path.display())]
    BinaryNotFound { what: String, path: PathBuf },

    /// Spawning or signalling a process failed.
    #[error("{context}: {source}")]
    ProcessControl {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A project pool was started while no php-fpm master serves its version.
    #[error("php-fpm {version} master is not running (needed by {service})")]
    DependencyNotReady { service: String, version: String },

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("project already exists: {0}")]
    ProjectExists(String),

    #[error("invalid project {name}: {reason}")]
    InvalidProject { name: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn process(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::ProcessControl {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn config(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Config {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn not_found(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Error::BinaryNotFound {
            what: what.into(),
            path: path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_subject() {
        let err = Error::not_found("php-fpm 74", "/opt/pit/php/74/sbin/php-fpm");
        assert_eq!(
            err.to_string(),
            "php-fpm 74 not found at /opt/pit/php/74/sbin/php-fpm"
        );

        let err = Error::DependencyNotReady {
            service: "php-pool:acme".to_string(),
            version: "83".to_string(),
        };
        assert!(err.to_string().contains("php-pool:acme"));
        assert!(err.to_string().contains("83"));
    }

    #[test]
    fn test_process_control_keeps_source() {
        use std::error::Error as _;

        let io = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let err = Error::process("failed to spawn nginx", io);
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("failed to spawn nginx: "));
    }
}
