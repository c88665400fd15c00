// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! PID files and liveness probes.
//!
//! Killing is best-effort throughout: the functions that terminate processes
//! log what went wrong and never hand an error back, so stop paths can call
//! them from any prior state.

use std::fs::{DirBuilder, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::Path;

use log::{debug, info, warn};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::time::{Duration, Instant, sleep};

use crate::error::{Error, Result};
use crate::procfs::ProcFs;

/// How long `kill_pid` waits for a SIGKILLed process to vanish.
pub const KILL_WAIT: Duration = Duration::from_secs(1);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Write `pid` as the sole content of `path`, creating parent directories.
/// Last writer wins.
pub fn write_pid(path: &Path, pid: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        DirBuilder::new()
            .recursive(true)
            .mode(0o755)
            .create(parent)?;
    }

    let mut file = OpenOptions::new()
        .write(true)
        .mode(0o644)
        .truncate(true)
        .create(true)
        .open(path)?;
    file.write_all(pid.to_string().as_bytes())?;

    debug!("wrote pid {pid} to {}", path.display());
    Ok(())
}

/// PID stored in `path`, or `None` when the file is missing or unparsable.
pub fn read_pid(path: &Path) -> Option<u32> {
    let content = std::fs::read_to_string(path).ok()?;
    content.trim().parse().ok().filter(|&pid| pid != 0)
}

/// Zero-signal probe. Zombies, PID 0, permission errors and vanished
/// processes all count as not alive.
pub fn is_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw == 0 {
        return false;
    }
    signal::kill(Pid::from_raw(raw), None).is_ok() && !ProcFs::host().is_zombie(raw)
}

/// Send `sig` to `pid`.
pub fn send_signal(pid: u32, sig: Signal) -> Result<()> {
    let raw = i32::try_from(pid).map_err(|_| {
        Error::process(
            format!("cannot signal pid {pid}"),
            std::io::Error::from(ErrorKind::InvalidInput),
        )
    })?;
    signal::kill(Pid::from_raw(raw), sig).map_err(|errno| {
        Error::process(
            format!("failed to send {sig} to pid {pid}"),
            std::io::Error::from(errno),
        )
    })
}

/// Poll until `pid` is gone or `limit` elapses. Returns true if it is gone.
pub async fn wait_gone(pid: u32, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while is_alive(pid) {
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL_INTERVAL).await;
    }
    true
}

/// SIGKILL `pid` and wait for it to disappear. Never signals the calling
/// process itself.
pub async fn force_kill(pid: u32) {
    if pid == std::process::id() {
        warn!("refusing to kill own pid {pid}");
        return;
    }
    if !is_alive(pid) {
        return;
    }
    match send_signal(pid, Signal::SIGKILL) {
        Ok(()) => {
            if !wait_gone(pid, KILL_WAIT).await {
                warn!("pid {pid} still alive {}ms after SIGKILL", KILL_WAIT.as_millis());
            }
        }
        Err(e) => warn!("{e}"),
    }
}

/// Kill the process recorded in `path`, then delete the file whether or not
/// the kill worked.
pub async fn kill_pid(path: &Path) {
    if let Some(pid) = read_pid(path) {
        info!("killing pid {pid} from {}", path.display());
        force_kill(pid).await;
    }
    remove_quiet(path);
}

/// Delete `path` if it names a process that is no longer alive. Returns true
/// when a stale file was removed.
pub fn cleanup_stale(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    match read_pid(path) {
        Some(pid) if is_alive(pid) => false,
        _ => {
            debug!("removing stale pid file {}", path.display());
            remove_quiet(path);
            true
        }
    }
}

/// Remove a file; a missing file is success, anything else is logged.
pub fn remove_quiet(path: &Path) {
    if let Err(e) = std::fs::remove_file(path)
        && e.kind() != ErrorKind::NotFound
    {
        warn!("failed to remove {}: {e}", path.display());
    }
}
