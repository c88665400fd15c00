// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! The two php-fpm masters the supervisor launches itself: the default
//! pool of the selected PHP version and the tools pool.

use std::fs::{self, OpenOptions};
use std::path::Path;

use async_trait::async_trait;
use log::{debug, info};

use super::{GlobalRole, ManagedService, ServiceId, ServiceStatus};
use crate::error::{Error, Result};
use crate::layout::{Layout, PhpInstall, ToolsPaths};
use crate::{pidfile, ports, process};

fn require_binary(php: &PhpInstall) -> Result<()> {
    let binary = php.fpm_binary();
    if binary.is_file() {
        Ok(())
    } else {
        Err(Error::not_found(format!("php-fpm {}", php.version), binary))
    }
}

fn touch(path: &Path) -> Result<()> {
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}

/// Master process of one PHP installation, listening on a fixed TCP port.
///
/// Bound to a single version for its whole life: switching versions builds
/// a new instance.
pub struct PhpFpmService {
    php: PhpInstall,
    port: u16,
}

impl PhpFpmService {
    pub fn new(layout: &Layout, version: &str, port: u16) -> Self {
        Self {
            php: layout.php(version),
            port,
        }
    }

    fn prepare_dirs(&self) -> Result<()> {
        for dir in ["logs", "var/run", "var/log"] {
            fs::create_dir_all(self.php.prefix.join(dir))?;
        }
        touch(&self.php.logs().join("php-fpm.log"))
    }
}

#[async_trait]
impl ManagedService for PhpFpmService {
    fn id(&self) -> ServiceId {
        ServiceId::Global(GlobalRole::PhpPool)
    }

    async fn start(&self) -> Result<()> {
        require_binary(&self.php)?;

        ports::kill_by_port(self.port).await;
        pidfile::cleanup_stale(&self.php.pid_file());
        self.prepare_dirs()?;

        info!("[{}] starting PHP {}", self.id(), self.php.version);
        let mut cmd = process::portable_command(&self.php.fpm_binary(), &self.php.libs());
        cmd.arg("-p")
            .arg(&self.php.prefix)
            .arg("-y")
            .arg(self.php.fpm_config())
            .arg("-c")
            .arg(self.php.php_ini())
            .arg("--nodaemonize")
            .arg("-g")
            .arg(self.php.pid_file())
            .current_dir(&self.php.prefix);

        let pid = process::spawn_detached(&self.id().to_string(), cmd)?;
        pidfile::write_pid(&self.php.pid_file(), pid)?;
        Ok(())
    }

    async fn stop(&self) {
        pidfile::kill_pid(&self.php.pid_file()).await;
        ports::kill_by_port(self.port).await;
    }

    fn status(&self) -> ServiceStatus {
        let pid = pidfile::read_pid(&self.php.pid_file());
        ServiceStatus {
            running: pid.is_some_and(pidfile::is_alive),
            pid,
            port: Some(self.port),
        }
    }
}

/// Always-on pool serving the bundled tools over a unix socket.
pub struct ToolsPoolService {
    php: PhpInstall,
    paths: ToolsPaths,
}

impl ToolsPoolService {
    pub fn new(layout: &Layout, version: &str) -> Self {
        Self {
            php: layout.php(version),
            paths: layout.tools(),
        }
    }

    /// Write the pool config unless one already exists; a hand-edited file
    /// is left alone.
    pub fn ensure_config(&self) -> Result<()> {
        fs::create_dir_all(self.paths.logs())?;
        let conf = self.paths.fpm_config();
        if conf.exists() {
            return Ok(());
        }

        debug!("[{}] writing {}", self.id(), conf.display());
        fs::write(
            &conf,
            format!(
                "[global]
error_log = {logs}/error.log
daemonize = no

[www]
listen = {socket}
listen.mode = 0660
pm = dynamic
pm.max_children = 5
pm.start_servers = 1
pm.min_spare_servers = 1
pm.max_spare_servers = 3
",
                logs = self.paths.logs().display(),
                socket = self.paths.socket().display(),
            ),
        )?;
        Ok(())
    }
}

#[async_trait]
impl ManagedService for ToolsPoolService {
    fn id(&self) -> ServiceId {
        ServiceId::Global(GlobalRole::ToolsPool)
    }

    async fn start(&self) -> Result<()> {
        require_binary(&self.php)?;

        let pid_file = self.paths.pid_file();
        pidfile::kill_pid(&pid_file).await;
        pidfile::remove_quiet(&self.paths.socket());
        self.ensure_config()?;

        let mut cmd = process::portable_command(&self.php.fpm_binary(), &self.php.libs());
        cmd.arg("--fpm-config")
            .arg(self.paths.fpm_config())
            .arg("--nodaemonize");

        let pid = process::spawn_detached(&self.id().to_string(), cmd)?;
        pidfile::write_pid(&pid_file, pid)?;
        Ok(())
    }

    async fn stop(&self) {
        pidfile::kill_pid(&self.paths.pid_file()).await;
        pidfile::remove_quiet(&self.paths.socket());
    }

    fn status(&self) -> ServiceStatus {
        let pid = pidfile::read_pid(&self.paths.pid_file());
        ServiceStatus {
            running: pid.is_some_and(pidfile::is_alive),
            pid,
            port: None,
        }
    }
}
