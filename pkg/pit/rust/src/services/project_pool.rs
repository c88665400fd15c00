// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! A project's PHP pool. Nothing is spawned here: the pool definition is
//! dropped into the shared installation of its PHP version and the already
//! running master is told to reload.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, warn};
use nix::sys::signal::Signal;

use super::{ManagedService, ProjectRole, ServiceId, ServiceStatus};
use crate::error::{Error, Result};
use crate::layout::{Layout, PhpInstall, ProjectPaths};
use crate::pidfile;

/// Pool name registered with the master for `project`.
pub fn pool_name(project: &str) -> String {
    format!("pit_{}", project.replace('-', "_"))
}

/// Path of the pool definition of `project` inside `php`.
pub fn pool_definition(php: &PhpInstall, project: &str) -> PathBuf {
    php.pool_dir().join(format!("{}.conf", pool_name(project)))
}

pub struct ProjectPoolService {
    project: String,
    fallback_port: u16,
    php: PhpInstall,
    runtime: ProjectPaths,
}

impl ProjectPoolService {
    pub fn new(layout: &Layout, project: &str, version: &str, fallback_port: u16) -> Self {
        Self {
            project: project.to_string(),
            fallback_port,
            php: layout.php(version),
            runtime: layout.project_runtime(project),
        }
    }

    pub fn pool_name(&self) -> String {
        pool_name(&self.project)
    }

    fn definition(&self) -> PathBuf {
        pool_definition(&self.php, &self.project)
    }

    fn render(&self) -> String {
        let user = std::env::var("USER").unwrap_or_default();
        format!(
            "[{pool}]
listen = {socket}
listen.owner = {user}
listen.group = {user}
listen.mode = 0660

pm = dynamic
pm.max_children = 5
pm.start_servers = 2
pm.min_spare_servers = 1
pm.max_spare_servers = 3

php_admin_value[error_log] = {log}
php_admin_flag[log_errors] = on
",
            pool = self.pool_name(),
            socket = self.runtime.php_socket().display(),
            log = self.runtime.php_log().display(),
        )
    }

    /// Live master of this pool's PHP version.
    fn master(&self) -> Option<u32> {
        pidfile::read_pid(&self.php.pid_file()).filter(|&pid| pidfile::is_alive(pid))
    }

    /// SIGUSR2 the master: graceful reload picking up pool changes.
    fn reload_master(&self) -> Result<()> {
        let Some(pid) = self.master() else {
            return Err(Error::DependencyNotReady {
                service: self.id().to_string(),
                version: self.php.version.clone(),
            });
        };
        debug!("[{}] reloading php-fpm master {pid}", self.id());
        pidfile::send_signal(pid, Signal::SIGUSR2)
    }
}

#[async_trait]
impl ManagedService for ProjectPoolService {
    fn id(&self) -> ServiceId {
        ServiceId::project(ProjectRole::PhpPool, &self.project)
    }

    async fn start(&self) -> Result<()> {
        // Fail before touching the pool directory.
        if self.master().is_none() {
            return Err(Error::DependencyNotReady {
                service: self.id().to_string(),
                version: self.php.version.clone(),
            });
        }

        fs::create_dir_all(self.runtime.php_dir())?;
        fs::create_dir_all(self.runtime.logs_dir())?;
        fs::create_dir_all(self.php.pool_dir())?;
        fs::write(self.definition(), self.render())?;

        self.reload_master()
    }

    async fn stop(&self) {
        pidfile::remove_quiet(&self.definition());
        pidfile::remove_quiet(&self.runtime.php_socket());

        // A second reload flushes workers still draining from the first.
        for _ in 0..2 {
            if let Err(e) = self.reload_master() {
                warn!("[{}] {e}", self.id());
                break;
            }
        }
    }

    fn status(&self) -> ServiceStatus {
        let pid = self.master();
        ServiceStatus {
            running: pid.is_some() && self.definition().is_file(),
            pid,
            port: Some(self.fallback_port),
        }
    }
}
