// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Read-only readiness checks run before `start`.

use std::path::Path;

use log::debug;
use serde::Serialize;
use tokio::process::Command;

use super::config::EngineConfig;
use crate::layout::Layout;
use crate::pidfile;
use crate::procfs::{Needle, ProcFs};

/// Ports below this need `cap_net_bind_service` (or root) to bind.
const PRIVILEGED_PORT_LIMIT: u16 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub ok: bool,
    pub severity: Severity,
    pub reason: String,
    pub fix: String,
}

impl CheckResult {
    fn pass(name: impl Into<String>, severity: Severity) -> Self {
        Self {
            name: name.into(),
            ok: true,
            severity,
            reason: String::new(),
            fix: String::new(),
        }
    }

    fn fail(
        name: impl Into<String>,
        severity: Severity,
        reason: impl Into<String>,
        fix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ok: false,
            severity,
            reason: reason.into(),
            fix: fix.into(),
        }
    }

    fn check(
        name: &str,
        severity: Severity,
        ok: bool,
        reason: impl Into<String>,
        fix: impl Into<String>,
    ) -> Self {
        if ok {
            Self::pass(name, severity)
        } else {
            Self::fail(name, severity, reason, fix)
        }
    }
}

/// False iff an error-severity check failed.
pub fn preflight_ok(results: &[CheckResult]) -> bool {
    results
        .iter()
        .all(|r| r.ok || r.severity == Severity::Warning)
}

pub async fn run_checks(
    layout: &Layout,
    config: &EngineConfig,
    procfs: &ProcFs,
) -> Vec<CheckResult> {
    let nginx = layout.nginx();
    let binary = nginx.binary();
    let port = config.proxy_port;

    vec![
        CheckResult::check(
            "nginx binary",
            Severity::Error,
            binary.is_file(),
            format!("nginx binary not found at {}", binary.display()),
            "reinstall pit",
        ),
        CheckResult::check(
            "nginx trust",
            Severity::Error,
            port >= PRIVILEGED_PORT_LIMIT || has_net_bind_cap(&binary).await,
            format!("port {port} requires the cap_net_bind_service capability"),
            "run: sudo setcap cap_net_bind_service=+ep <base>/nginx/sbin/nginx",
        ),
        CheckResult::check(
            &format!("port {port}"),
            Severity::Error,
            foreign_listeners(procfs, port, pidfile::read_pid(&nginx.pid_file())).is_empty(),
            format!("port {port} is already in use"),
            "stop the service holding it or run: pit stop",
        ),
        CheckResult::check(
            "php-fpm",
            Severity::Warning,
            php_running(layout, config, procfs),
            "php-fpm is not running",
            "it is launched by `pit start`; check the PHP install if it stays down",
        ),
    ]
}

async fn has_net_bind_cap(binary: &Path) -> bool {
    match Command::new("getcap").arg(binary).output().await {
        Ok(out) => String::from_utf8_lossy(&out.stdout).contains("cap_net_bind_service"),
        Err(e) => {
            debug!("getcap unavailable: {e}");
            false
        }
    }
}

/// Listeners on `port` that are neither our proxy master nor its workers.
fn foreign_listeners(procfs: &ProcFs, port: u16, proxy: Option<u32>) -> Vec<i32> {
    let proxy = proxy
        .filter(|&pid| pidfile::is_alive(pid))
        .and_then(|pid| i32::try_from(pid).ok());
    procfs
        .listeners(port)
        .into_iter()
        .filter(|&pid| match proxy {
            Some(master) => pid != master && procfs.parent(pid) != Some(master),
            None => true,
        })
        .collect()
}

fn php_running(layout: &Layout, config: &EngineConfig, procfs: &ProcFs) -> bool {
    let master = pidfile::read_pid(&layout.php(&config.php_version).pid_file());
    if master.is_some_and(pidfile::is_alive) {
        return true;
    }
    let me = i32::try_from(std::process::id()).ok();
    procfs
        .matching(&[Needle::Contains("php-fpm")])
        .into_iter()
        .any(|pid| Some(pid) != me)
}
