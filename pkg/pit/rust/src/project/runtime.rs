// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;

use log::{error, info, warn};

use super::config::ProjectConfig;
use crate::error::Result;
use crate::layout::{Layout, ProjectPaths};
use crate::procfs::Needle;
use crate::services::project_pool::pool_name;
use crate::services::{
    ManagedService, ProjectPoolService, ProjectProxyService, ServiceId, ServiceStatus,
};
use crate::{pidfile, ports};

/// One project's proxy and PHP pool, managed as a unit inside the project's
/// runtime namespace.
pub struct ProjectRuntime {
    config: ProjectConfig,
    paths: ProjectPaths,
    pool: ProjectPoolService,
    proxy: ProjectProxyService,
}

impl ProjectRuntime {
    pub fn new(layout: &Layout, config: ProjectConfig) -> Self {
        let doc_root = layout.project_dir(&config.name).join(&config.root);
        Self {
            pool: ProjectPoolService::new(
                layout,
                &config.name,
                &config.php_version,
                config.pool_port(),
            ),
            proxy: ProjectProxyService::new(layout, &config.name, config.port, doc_root),
            paths: layout.project_runtime(&config.name),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The config this runtime was loaded with.
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Owned services in start order.
    fn services(&self) -> [&dyn ManagedService; 2] {
        [&self.pool, &self.proxy]
    }

    /// Kill whatever escaped PID tracking: pool workers and nginx processes
    /// of this project, then anything on the reserved port pair.
    pub async fn kill_leftovers(&self) {
        let pool = pool_name(&self.config.name);
        ports::kill_matching(&[Needle::Contains("php-fpm"), Needle::Word(&pool)]).await;

        let prefix = self.paths.cmdline_prefix();
        ports::kill_matching(&[Needle::Contains("nginx"), Needle::Contains(&prefix)]).await;

        ports::kill_by_port(self.config.port).await;
        ports::kill_by_port(self.config.pool_port()).await;
    }

    pub async fn start(&self) -> Result<()> {
        info!("[project:{}] starting", self.name());
        for dir in self.paths.dirs() {
            fs::create_dir_all(dir)?;
        }

        self.kill_leftovers().await;

        for service in self.services() {
            if let Err(e) = service.start().await {
                error!("[{}] failed to start: {e}", service.id());
                return Err(e);
            }
        }
        Ok(())
    }

    pub async fn stop(&self) {
        info!("[project:{}] stopping", self.name());
        for service in self.services() {
            service.stop().await;
        }

        self.kill_leftovers().await;

        for path in [
            self.paths.php_pid(),
            self.paths.nginx_pid(),
            self.paths.php_socket(),
            self.paths.nginx_socket(),
        ] {
            pidfile::remove_quiet(&path);
        }
    }

    pub async fn restart(&self) -> Result<()> {
        self.stop().await;
        self.start().await
    }

    /// Stop, then delete the whole runtime namespace.
    pub async fn force_stop_all(&self) {
        self.stop().await;
        if let Err(e) = fs::remove_dir_all(&self.paths.root)
            && e.kind() != ErrorKind::NotFound
        {
            warn!(
                "[project:{}] failed to remove {}: {e}",
                self.name(),
                self.paths.root.display()
            );
        }
    }

    pub fn status(&self) -> BTreeMap<ServiceId, ServiceStatus> {
        self.services()
            .into_iter()
            .map(|service| (service.id(), service.status()))
            .collect()
    }
}
