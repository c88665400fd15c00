// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use log::{info, warn};
use tokio::process::Command;

use crate::error::{Error, Result};

/// Build a command for a portable binary whose shared libraries live in
/// `libs`, prepended to any inherited `LD_LIBRARY_PATH`.
pub(crate) fn portable_command(binary: &Path, libs: &Path) -> Command {
    let mut cmd = Command::new(binary);
    cmd.env("LD_LIBRARY_PATH", library_path(libs));
    cmd
}

fn library_path(libs: &Path) -> OsString {
    let mut value = libs.as_os_str().to_os_string();
    value.push(":");
    if let Some(inherited) = std::env::var_os("LD_LIBRARY_PATH") {
        value.push(inherited);
    }
    value
}

/// Spawn `cmd` and leave it running. The child is reaped by a background
/// task that logs its exit; the supervisor never waits on it otherwise.
pub(crate) fn spawn_detached(subject: &str, mut cmd: Command) -> Result<u32> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::inherit());
    cmd.stderr(Stdio::inherit());

    let program = format!("{:?}", cmd.as_std().get_program());
    let mut child = cmd
        .spawn()
        .map_err(|e| Error::process(format!("[{subject}] failed to spawn {program}"), e))?;

    let Some(pid) = child.id() else {
        return Err(Error::process(
            format!("[{subject}] {program} exited before reporting a pid"),
            std::io::Error::from(std::io::ErrorKind::BrokenPipe),
        ));
    };
    info!("[{subject}] spawned (pid={pid}, cmd={program})");

    let subject = subject.to_string();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => info!("[{subject}] pid {pid} exited with {status}"),
            Err(e) => warn!("[{subject}] failed to wait on pid {pid}: {e}"),
        }
    });

    Ok(pid)
}

/// Run `cmd` to completion and fail unless it exits successfully.
pub(crate) async fn run(subject: &str, mut cmd: Command) -> Result<()> {
    let program = format!("{:?}", cmd.as_std().get_program());
    let status = cmd
        .status()
        .await
        .map_err(|e| Error::process(format!("[{subject}] failed to run {program}"), e))?;
    if status.success() {
        Ok(())
    } else {
        Err(Error::process(
            format!("[{subject}] {program} exited with {status}"),
            std::io::Error::other("non-zero exit status"),
        ))
    }
}
