// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;

use super::nginx_conf;
use super::{ManagedService, ProjectRole, ServiceId, ServiceStatus};
use crate::error::{Error, Result};
use crate::layout::{Layout, NginxInstall, ProjectPaths};
use crate::procfs::Needle;
use crate::{pidfile, ports, process};

/// A project's own nginx, confined to `runtime/<project>/`.
pub struct ProjectProxyService {
    project: String,
    port: u16,
    doc_root: PathBuf,
    nginx: NginxInstall,
    runtime: ProjectPaths,
}

impl ProjectProxyService {
    pub fn new(layout: &Layout, project: &str, port: u16, doc_root: PathBuf) -> Self {
        Self {
            project: project.to_string(),
            port,
            doc_root,
            nginx: layout.nginx(),
            runtime: layout.project_runtime(project),
        }
    }

    fn write_config(&self) -> Result<()> {
        fs::create_dir_all(self.runtime.nginx_logs())?;
        fs::create_dir_all(self.runtime.run_dir())?;
        let conf = nginx_conf::render_project(
            &self.nginx,
            &self.runtime,
            &self.project,
            self.port,
            &self.doc_root,
        );
        fs::write(self.runtime.nginx_config(), conf)?;
        Ok(())
    }
}

#[async_trait]
impl ManagedService for ProjectProxyService {
    fn id(&self) -> ServiceId {
        ServiceId::project(ProjectRole::Proxy, &self.project)
    }

    async fn start(&self) -> Result<()> {
        let binary = self.nginx.binary();
        if !binary.is_file() {
            return Err(Error::not_found("nginx", binary));
        }
        self.write_config()?;

        // The fastcgi socket may not exist yet; nginx dials it per request.
        let pid_file = self.runtime.nginx_pid();
        let mut cmd = process::portable_command(&binary, &self.nginx.libs());
        cmd.arg("-p")
            .arg(self.runtime.nginx_dir())
            .arg("-c")
            .arg(self.runtime.nginx_config())
            .arg("-g")
            .arg(format!("pid {}; daemon off;", pid_file.display()))
            .current_dir(self.runtime.nginx_dir());

        let pid = process::spawn_detached(&self.id().to_string(), cmd)?;
        pidfile::write_pid(&pid_file, pid)?;
        Ok(())
    }

    async fn stop(&self) {
        pidfile::kill_pid(&self.runtime.nginx_pid()).await;
        let prefix = self.runtime.cmdline_prefix();
        ports::kill_matching(&[Needle::Contains("nginx"), Needle::Contains(&prefix)]).await;
    }

    fn status(&self) -> ServiceStatus {
        let pid = pidfile::read_pid(&self.runtime.nginx_pid());
        ServiceStatus {
            running: pid.is_some_and(pidfile::is_alive),
            pid,
            port: Some(self.port),
        }
    }
}
