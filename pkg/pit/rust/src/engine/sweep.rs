// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Force-kill sweep over project runtimes.
//!
//! Works from the filesystem alone (the `runtime/` tree and the project
//! catalogue), so it can run before anything is loaded and from a process
//! other than the supervisor. Missing files are never an error, which makes
//! concurrent sweeps safe.

use std::fs;

use log::{debug, info};

use crate::layout::{Layout, ProjectPaths};
use crate::project::ProjectRegistry;
use crate::services::project_pool::pool_definition;
use crate::{pidfile, ports};

/// Kill the PID-tracked processes of every project namespace under
/// `runtime/` and drop their stale sockets. Reserved namespaces (`_tools`)
/// belong to global services and are left alone.
pub async fn kill_runtime_pids(layout: &Layout) {
    let Ok(entries) = fs::read_dir(layout.runtime_dir()) else {
        return;
    };

    for entry in entries.filter_map(|e| e.ok()) {
        if !entry.file_type().is_ok_and(|t| t.is_dir())
            || entry.file_name().to_string_lossy().starts_with(['_', '.'])
        {
            continue;
        }
        let paths = ProjectPaths { root: entry.path() };
        debug!("[sweep] {}", paths.root.display());
        kill_namespace(&paths).await;
    }
}

async fn kill_namespace(paths: &ProjectPaths) {
    pidfile::kill_pid(&paths.php_pid()).await;
    pidfile::kill_pid(&paths.nginx_pid()).await;
    pidfile::remove_quiet(&paths.php_socket());
}

/// Guarantee a clean slate for every project: PID-based kills across
/// `runtime/`, then per catalogued project the port pair, its PID files,
/// its socket and any pool definition left registered.
pub async fn force_kill_all(layout: &Layout) {
    info!("[sweep] cleaning all project runtimes");
    kill_runtime_pids(layout).await;

    let registry = ProjectRegistry::new(layout);
    let Ok(projects) = registry.list() else {
        return;
    };
    let versions = super::php::list_versions(layout).unwrap_or_default();

    for name in projects {
        let paths = layout.project_runtime(&name);
        if let Ok(config) = registry.load_config(&name) {
            ports::kill_by_port(config.port).await;
            ports::kill_by_port(config.pool_port()).await;
        }
        kill_namespace(&paths).await;

        for version in &versions {
            pidfile::remove_quiet(&pool_definition(&layout.php(version), &name));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweep_on_empty_base() {
        let base = tempfile::tempdir().unwrap();
        force_kill_all(&Layout::new(base.path())).await;
    }

    #[tokio::test]
    async fn test_sweep_removes_stale_files() {
        let base = tempfile::tempdir().unwrap();
        let layout = Layout::new(base.path());
        let paths = layout.project_runtime("orphan");
        fs::create_dir_all(paths.php_dir()).unwrap();
        fs::write(paths.php_socket(), "").unwrap();
        pidfile::write_pid(&paths.nginx_pid(), 999_999_999).unwrap();
        fs::write(layout.supervisor_pid(), "1").unwrap();
        let tools = layout.tools();
        pidfile::write_pid(&tools.pid_file(), 999_999_998).unwrap();

        kill_runtime_pids(&layout).await;

        assert!(!paths.nginx_pid().exists());
        assert!(!paths.php_socket().exists());
        assert!(layout.supervisor_pid().exists());
        assert!(tools.pid_file().exists());
    }
}
