// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fs::{self, OpenOptions};

use async_trait::async_trait;
use log::{info, warn};

use super::nginx_conf::{self, Site};
use super::{GlobalRole, ManagedService, ServiceId, ServiceStatus};
use crate::error::{Error, Result};
use crate::layout::{Layout, NginxInstall};
use crate::{pidfile, ports, process};

const SCRATCH_DIRS: [&str; 6] = [
    "client_body_temp",
    "fastcgi_temp",
    "proxy_temp",
    "scgi_temp",
    "uwsgi_temp",
    "logs",
];

/// The global nginx serving every `www/<site>` as `<site>.test`.
pub struct ProxyService {
    layout: Layout,
    nginx: NginxInstall,
    port: u16,
    php_port: u16,
}

impl ProxyService {
    pub fn new(layout: &Layout, port: u16, php_port: u16) -> Self {
        Self {
            layout: layout.clone(),
            nginx: layout.nginx(),
            port,
            php_port,
        }
    }

    /// Sites currently present under `www/`.
    pub fn sites(&self) -> Result<Vec<Site>> {
        Ok(nginx_conf::discover_sites(&self.layout.www_dir())?)
    }

    fn prepare_dirs(&self) -> Result<()> {
        for dir in SCRATCH_DIRS {
            fs::create_dir_all(self.nginx.prefix.join(dir))?;
        }
        for log in ["access.log", "error.log"] {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.nginx.logs().join(log))?;
        }
        Ok(())
    }

    fn write_config(&self) -> Result<()> {
        let conf = nginx_conf::render_global(&self.nginx, &self.sites()?, self.port, self.php_port);
        fs::create_dir_all(self.nginx.conf_dir())?;
        fs::write(self.nginx.config(), conf)?;
        Ok(())
    }

    /// Ask the running master to re-read its configuration.
    pub async fn reload(&self) -> Result<()> {
        let mut cmd = process::portable_command(&self.nginx.binary(), &self.nginx.libs());
        cmd.arg("-p")
            .arg(&self.nginx.prefix)
            .arg("-c")
            .arg(self.nginx.config())
            .args(["-s", "reload"]);
        info!("[{}] reloading", self.id());
        process::run(&self.id().to_string(), cmd).await
    }
}

#[async_trait]
impl ManagedService for ProxyService {
    fn id(&self) -> ServiceId {
        ServiceId::Global(GlobalRole::Proxy)
    }

    async fn start(&self) -> Result<()> {
        let binary = self.nginx.binary();
        if !binary.is_file() {
            return Err(Error::not_found("nginx", binary));
        }

        ports::kill_by_port(self.port).await;
        pidfile::cleanup_stale(&self.nginx.pid_file());
        self.prepare_dirs()?;
        self.write_config()?;

        let pid_file = self.nginx.pid_file();
        let mut cmd = process::portable_command(&binary, &self.nginx.libs());
        cmd.arg("-p")
            .arg(&self.nginx.prefix)
            .arg("-c")
            .arg(self.nginx.config())
            .arg("-g")
            .arg(format!("pid {}; daemon off;", pid_file.display()))
            .current_dir(&self.nginx.prefix);

        let pid = process::spawn_detached(&self.id().to_string(), cmd)?;
        pidfile::write_pid(&pid_file, pid)?;
        Ok(())
    }

    async fn stop(&self) {
        pidfile::kill_pid(&self.nginx.pid_file()).await;
        let leftovers = ports::kill_by_port(self.port).await;
        if !leftovers.is_empty() {
            warn!("[{}] port {} was still held by {leftovers:?}", self.id(), self.port);
        }
    }

    fn status(&self) -> ServiceStatus {
        let pid = pidfile::read_pid(&self.nginx.pid_file());
        ServiceStatus {
            running: pid.is_some_and(pidfile::is_alive),
            pid,
            port: Some(self.port),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Install an nginx stand-in that runs `script` with the prefix as `$2`.
    fn fake_nginx(layout: &Layout, script: &str) {
        let binary = layout.nginx().binary();
        fs::create_dir_all(binary.parent().unwrap()).unwrap();
        fs::write(&binary, format!("#!/bin/sh\n{script}\n")).unwrap();
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test]
    async fn test_reload_signals_master() {
        let base = tempfile::tempdir().unwrap();
        let layout = Layout::new(base.path());
        fake_nginx(&layout, r#"printf '%s\n' "$@" > "$2/logs/signal.args""#);
        let proxy = ProxyService::new(&layout, 47080, 49099);
        proxy.prepare_dirs().unwrap();

        proxy.reload().await.unwrap();

        let args = fs::read_to_string(layout.nginx().logs().join("signal.args")).unwrap();
        let args: Vec<&str> = args.lines().collect();
        let nginx = layout.nginx();
        assert_eq!(
            args,
            vec![
                "-p",
                nginx.prefix.to_str().unwrap(),
                "-c",
                nginx.config().to_str().unwrap(),
                "-s",
                "reload",
            ]
        );
    }

    #[tokio::test]
    async fn test_reload_failures() {
        let base = tempfile::tempdir().unwrap();
        let layout = Layout::new(base.path());
        let proxy = ProxyService::new(&layout, 47080, 49099);

        let err = proxy.reload().await.unwrap_err();
        assert!(matches!(err, Error::ProcessControl { .. }), "{err:?}");

        fake_nginx(&layout, "exit 1");
        let err = proxy.reload().await.unwrap_err();
        assert!(err.to_string().contains("exited with"), "{err}");
    }

    #[tokio::test]
    async fn test_start_without_binary() {
        let base = tempfile::tempdir().unwrap();
        let proxy = ProxyService::new(&Layout::new(base.path()), 47080, 49099);

        let err = proxy.start().await.unwrap_err();
        assert!(matches!(err, Error::BinaryNotFound { .. }));
        assert!(!proxy.status().running);
        assert_eq!(proxy.status().port, Some(47080));
    }

    #[test]
    fn test_write_config_lists_sites() {
        let base = tempfile::tempdir().unwrap();
        let layout = Layout::new(base.path());
        fs::create_dir_all(layout.www_dir().join("shop")).unwrap();
        let proxy = ProxyService::new(&layout, 47080, 49099);

        proxy.prepare_dirs().unwrap();
        proxy.write_config().unwrap();

        let conf = fs::read_to_string(layout.nginx().config()).unwrap();
        assert!(conf.contains("server_name shop.test;"));
        assert!(conf.contains("fastcgi_pass 127.0.0.1:49099;"));
        assert!(layout.nginx().logs().join("error.log").is_file());
        assert!(layout.nginx().prefix.join("fastcgi_temp").is_dir());
    }
}
