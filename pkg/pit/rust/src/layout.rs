// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! On-disk layout of a pit installation.
//!
//! Every path the supervisor touches is derived here from the base directory
//! (and, for projects, from the project name). Generated configs embed these
//! paths, so they must stay stable across releases.

use std::path::{Path, PathBuf};

/// Runtime namespace of the tools pool.
pub const TOOLS_NAMESPACE: &str = "_tools";

const SUPERVISOR_PID_FILE: &str = "pit.pid";

#[derive(Debug, Clone)]
pub struct Layout {
    base: PathBuf,
}

impl Layout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn engine_config(&self) -> PathBuf {
        self.base.join("config").join("engine.json")
    }

    pub fn www_dir(&self) -> PathBuf {
        self.base.join("www")
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.base.join("runtime")
    }

    pub fn supervisor_pid(&self) -> PathBuf {
        self.runtime_dir().join(SUPERVISOR_PID_FILE)
    }

    pub fn nginx(&self) -> NginxInstall {
        NginxInstall {
            prefix: self.base.join("nginx"),
        }
    }

    pub fn php_root(&self) -> PathBuf {
        self.base.join("php")
    }

    pub fn php(&self, version: &str) -> PhpInstall {
        PhpInstall {
            version: version.to_string(),
            prefix: self.php_root().join(version),
        }
    }

    pub fn tools(&self) -> ToolsPaths {
        ToolsPaths {
            root: self.runtime_dir().join(TOOLS_NAMESPACE),
        }
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.base.join("projects")
    }

    pub fn project_dir(&self, name: &str) -> PathBuf {
        self.projects_dir().join(name)
    }

    pub fn project_config(&self, name: &str) -> PathBuf {
        self.project_dir(name).join(".pit").join("config.json")
    }

    pub fn project_runtime(&self, name: &str) -> ProjectPaths {
        ProjectPaths {
            root: self.runtime_dir().join(name),
        }
    }
}

/// Portable nginx build shared by the global and project proxies.
#[derive(Debug, Clone)]
pub struct NginxInstall {
    pub prefix: PathBuf,
}

impl NginxInstall {
    pub fn binary(&self) -> PathBuf {
        self.prefix.join("sbin").join("nginx")
    }

    pub fn conf_dir(&self) -> PathBuf {
        self.prefix.join("conf")
    }

    pub fn config(&self) -> PathBuf {
        self.conf_dir().join("nginx.conf")
    }

    pub fn mime_types(&self) -> PathBuf {
        self.conf_dir().join("mime.types")
    }

    pub fn fastcgi_conf(&self) -> PathBuf {
        self.conf_dir().join("fastcgi.conf")
    }

    pub fn tools_include(&self) -> PathBuf {
        self.prefix.join("conf.d").join("tools").join("*.conf")
    }

    pub fn logs(&self) -> PathBuf {
        self.prefix.join("logs")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.logs().join("nginx.pid")
    }

    pub fn fallback_root(&self) -> PathBuf {
        self.prefix.join("html")
    }

    pub fn libs(&self) -> PathBuf {
        self.prefix.join("libs")
    }
}

/// One portable PHP installation, `php/<version>/`.
#[derive(Debug, Clone)]
pub struct PhpInstall {
    pub version: String,
    pub prefix: PathBuf,
}

impl PhpInstall {
    pub fn fpm_binary(&self) -> PathBuf {
        self.prefix.join("sbin").join("php-fpm")
    }

    pub fn fpm_config(&self) -> PathBuf {
        self.prefix.join("etc").join("php-fpm.conf")
    }

    pub fn php_ini(&self) -> PathBuf {
        self.prefix.join("etc").join("php.ini")
    }

    /// Drop-in directory scanned by the master on reload.
    pub fn pool_dir(&self) -> PathBuf {
        self.prefix.join("etc").join("php-fpm.d")
    }

    pub fn logs(&self) -> PathBuf {
        self.prefix.join("logs")
    }

    /// PID file of the version's master process.
    pub fn pid_file(&self) -> PathBuf {
        self.logs().join("php-fpm.pid")
    }

    pub fn libs(&self) -> PathBuf {
        self.prefix.join("libs")
    }
}

#[derive(Debug, Clone)]
pub struct ToolsPaths {
    pub root: PathBuf,
}

impl ToolsPaths {
    pub fn php_dir(&self) -> PathBuf {
        self.root.join("php")
    }

    pub fn fpm_config(&self) -> PathBuf {
        self.php_dir().join("php-fpm.conf")
    }

    pub fn socket(&self) -> PathBuf {
        self.php_dir().join("php-fpm.sock")
    }

    pub fn logs(&self) -> PathBuf {
        self.php_dir().join("logs")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.root.join("run").join("php-fpm.pid")
    }
}

/// Runtime namespace of one project, `runtime/<project>/`.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
}

impl ProjectPaths {
    pub fn run_dir(&self) -> PathBuf {
        self.root.join("run")
    }

    pub fn php_dir(&self) -> PathBuf {
        self.root.join("php")
    }

    pub fn nginx_dir(&self) -> PathBuf {
        self.root.join("nginx")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn nginx_pid(&self) -> PathBuf {
        self.run_dir().join("nginx.pid")
    }

    pub fn php_pid(&self) -> PathBuf {
        self.run_dir().join("php-fpm.pid")
    }

    pub fn php_socket(&self) -> PathBuf {
        self.php_dir().join("php-fpm.sock")
    }

    pub fn nginx_socket(&self) -> PathBuf {
        self.nginx_dir().join("nginx.sock")
    }

    pub fn nginx_config(&self) -> PathBuf {
        self.nginx_dir().join("nginx.conf")
    }

    pub fn nginx_logs(&self) -> PathBuf {
        self.nginx_dir().join("logs")
    }

    pub fn php_log(&self) -> PathBuf {
        self.logs_dir().join("php-fpm.log")
    }

    /// Prefix carried on the command line of every process launched in this
    /// namespace. The trailing separator keeps `acme` from matching `acme2`.
    pub fn cmdline_prefix(&self) -> String {
        format!("{}/", self.root.display())
    }

    /// Every directory of the namespace, created on first start.
    pub fn dirs(&self) -> [PathBuf; 5] {
        [
            self.root.clone(),
            self.run_dir(),
            self.php_dir(),
            self.nginx_dir(),
            self.logs_dir(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_paths_are_namespaced() {
        let layout = Layout::new("/opt/pit");
        let acme = layout.project_runtime("acme");

        assert_eq!(acme.php_pid(), Path::new("/opt/pit/runtime/acme/run/php-fpm.pid"));
        assert_eq!(acme.nginx_pid(), Path::new("/opt/pit/runtime/acme/run/nginx.pid"));
        assert_eq!(
            acme.php_socket(),
            Path::new("/opt/pit/runtime/acme/php/php-fpm.sock")
        );
        assert_ne!(acme.root, layout.project_runtime("other").root);
    }

    #[test]
    fn test_global_paths() {
        let layout = Layout::new("/opt/pit");
        assert_eq!(layout.supervisor_pid(), Path::new("/opt/pit/runtime/pit.pid"));
        assert_eq!(
            layout.php("74").fpm_binary(),
            Path::new("/opt/pit/php/74/sbin/php-fpm")
        );
        assert_eq!(
            layout.tools().socket(),
            Path::new("/opt/pit/runtime/_tools/php/php-fpm.sock")
        );
        assert_eq!(
            layout.project_config("acme"),
            Path::new("/opt/pit/projects/acme/.pit/config.json")
        );
    }
}
