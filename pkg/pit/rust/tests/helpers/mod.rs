// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

#![allow(dead_code)]

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use pit::engine::EngineConfig;
use pit::hosts::NoHosts;
use pit::{Engine, Layout};
use scopeguard::ScopeGuard;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Stand-in for nginx and php-fpm: stays up and ignores the reload signal.
/// An nginx `-s` invocation records its arguments under `<prefix>/logs` and
/// exits.
const FAKE_DAEMON: &str = r#"#!/bin/sh
case " $* " in
*" -s "*) printf '%s\n' "$@" > "$2/logs/signal.args"; exit 0 ;;
esac
trap '' USR2
exec sleep 300
"#;

/// A throwaway installation directory with fake nginx and php-fpm builds.
pub struct FakeInstall {
    pub dir: TempDir,
    pub layout: Layout,
}

impl FakeInstall {
    /// Installation with nginx and the given PHP versions, configured to use
    /// unprivileged ports derived from `port_base`.
    pub fn new(versions: &[&str], port_base: u16) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());

        write_executable(&layout.nginx().binary());
        for version in versions {
            write_executable(&layout.php(version).fpm_binary());
        }
        fs::create_dir_all(layout.www_dir()).unwrap();

        let config = EngineConfig {
            php_version: versions.first().copied().unwrap_or("83").to_string(),
            proxy_port: port_base,
            php_port: port_base + 1,
            api_addr: ([127, 0, 0, 1], port_base + 2).into(),
        };
        fs::create_dir_all(layout.engine_config().parent().unwrap()).unwrap();
        config.save(&layout.engine_config()).unwrap();

        Self { dir, layout }
    }

    pub fn base(&self) -> &Path {
        self.dir.path()
    }

    pub fn engine(&self) -> Engine {
        Engine::with_hosts(self.layout.clone(), Box::new(NoHosts))
    }

    /// Guard that SIGKILLs every process recorded in a PID file under the
    /// installation, so a failing test does not leak fake daemons.
    pub fn reap_on_exit(&self) -> ScopeGuard<PathBuf, impl FnOnce(PathBuf)> {
        scopeguard::guard(self.base().to_path_buf(), |base| {
            for pid_file in pid_files(&base) {
                if let Some(pid) = read_pid(&pid_file)
                    && pid != std::process::id()
                {
                    let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
                }
            }
        })
    }

    pub fn add_site(&self, name: &str) {
        fs::create_dir_all(self.layout.www_dir().join(name).join("public")).unwrap();
    }
}

pub fn write_executable(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, FAKE_DAEMON).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn pid_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(pid_files(&path));
        } else if path.extension().is_some_and(|ext| ext == "pid") {
            found.push(path);
        }
    }
    found
}

/// Read a PID file written by the supervisor.
pub fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Check if a PID is still alive.
pub fn pid_is_alive(pid: u32) -> bool {
    signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Wait until a PID is no longer alive, or timeout.
pub fn wait_for_pid_gone(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !pit::pidfile::is_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

/// Wait until `pid` has replaced its shell with the fake daemon, so the
/// `trap` ignoring USR2 is in place before a reload is signalled.
pub fn wait_for_exec(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        let cmdline = fs::read(format!("/proc/{pid}/cmdline")).unwrap_or_default();
        if cmdline.starts_with(b"sleep") {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// `start_all` plus a wait for every global daemon to be fully up.
pub async fn start_stack(engine: &Engine) {
    engine.start_all().await.unwrap();
    for status in engine.service_statuses().await.values() {
        let pid = status.pid.unwrap();
        assert!(wait_for_exec(pid, DEFAULT_TIMEOUT), "pid {pid} never came up");
    }
}

/// Run the `pit` binary against `base` and collect its output.
pub fn run_cli(base: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pit"))
        .arg("--base")
        .arg(base)
        .args(args)
        .env("PIT_LOG_LEVEL", "error")
        .output()
        .expect("failed to run pit")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}
