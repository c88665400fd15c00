// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Keeps the `<site>.test` domains resolvable through a hosts file.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::Result;

const BEGIN_MARKER: &str = "# BEGIN PIT";
const END_MARKER: &str = "# END PIT";

pub trait HostsSync: Send + Sync {
    /// Make every domain in `domains` resolve to the loopback address.
    fn ensure(&self, domains: &[String]) -> Result<()>;
}

/// A hosts file with a pit-managed block delimited by marker comments.
#[derive(Debug, Clone)]
pub struct EtcHosts {
    path: PathBuf,
}

impl EtcHosts {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn system() -> Self {
        Self::new("/etc/hosts")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HostsSync for EtcHosts {
    fn ensure(&self, domains: &[String]) -> Result<()> {
        let current = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let updated = replace_block(&current, domains);
        if updated == current {
            debug!("{} already up to date", self.path.display());
            return Ok(());
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".pit.tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, &updated)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!("updated {} with {} domain(s)", self.path.display(), domains.len());
        Ok(())
    }
}

/// Does nothing; for installs that manage name resolution elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHosts;

impl HostsSync for NoHosts {
    fn ensure(&self, _domains: &[String]) -> Result<()> {
        Ok(())
    }
}

/// `content` with the managed block replaced by one listing `domains`
/// (deduplicated, blanks dropped). An empty list removes the block.
fn replace_block(content: &str, domains: &[String]) -> String {
    let mut kept = Vec::new();
    let mut inside = false;
    for line in content.lines() {
        match line.trim() {
            BEGIN_MARKER => inside = true,
            END_MARKER => inside = false,
            _ if !inside => kept.push(line),
            _ => {}
        }
    }
    while kept.last().is_some_and(|l| l.trim().is_empty()) {
        kept.pop();
    }

    let mut out = kept.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }

    let domains: BTreeSet<&str> = domains
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .collect();
    if domains.is_empty() {
        return out;
    }

    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(BEGIN_MARKER);
    out.push('\n');
    for domain in domains {
        out.push_str("127.0.0.1 ");
        out.push_str(domain);
        out.push('\n');
    }
    out.push_str(END_MARKER);
    out.push('\n');
    out
}
