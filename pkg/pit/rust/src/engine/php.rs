// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fs;
use std::io::ErrorKind;

use crate::error::{Error, Result};
use crate::layout::Layout;

/// Versions under `php/` that ship a php-fpm binary, sorted.
pub fn list_versions(layout: &Layout) -> Result<Vec<String>> {
    let entries = match fs::read_dir(layout.php_root()) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut versions: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|version| layout.php(version).fpm_binary().is_file())
        .collect();
    versions.sort();
    Ok(versions)
}

/// Fail unless `version` is installed.
pub fn require_installed(layout: &Layout, version: &str) -> Result<()> {
    if version.is_empty() || version.contains('/') {
        return Err(Error::not_found(
            format!("php-fpm {version:?}"),
            layout.php_root(),
        ));
    }
    let binary = layout.php(version).fpm_binary();
    if binary.is_file() {
        Ok(())
    } else {
        Err(Error::not_found(format!("php-fpm {version}"), binary))
    }
}
