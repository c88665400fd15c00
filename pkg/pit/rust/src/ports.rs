// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Fallback kills for processes that PID files do not track: whatever
//! listens on a port, or whatever matches a command line.

use log::info;

use crate::pidfile;
use crate::procfs::{Needle, ProcFs};

/// SIGKILL every process listening on `port` and return the PIDs signalled.
/// The calling process is never included.
pub async fn kill_by_port(port: u16) -> Vec<u32> {
    kill_by_port_in(&ProcFs::host(), port).await
}

pub async fn kill_by_port_in(procfs: &ProcFs, port: u16) -> Vec<u32> {
    let pids = others(procfs.listeners(port));
    if !pids.is_empty() {
        info!("port {port} held by {pids:?}, killing");
    }
    for &pid in &pids {
        pidfile::force_kill(pid).await;
    }
    pids
}

/// SIGKILL every process whose command line contains all `needles`.
pub async fn kill_matching(needles: &[Needle<'_>]) -> Vec<u32> {
    let pids = others(ProcFs::host().matching(needles));
    if !pids.is_empty() {
        info!("killing leftover processes matching {needles:?}: {pids:?}");
    }
    for &pid in &pids {
        pidfile::force_kill(pid).await;
    }
    pids
}

/// PIDs other than our own, converted for signalling.
fn others(pids: Vec<i32>) -> Vec<u32> {
    let me = std::process::id();
    pids.into_iter()
        .filter_map(|pid| u32::try_from(pid).ok())
        .filter(|&pid| pid != me)
        .collect()
}

/// PID currently listening on `port`, if any, excluding the caller.
pub fn listener_of(port: u16) -> Option<u32> {
    others(ProcFs::host().listeners(port)).into_iter().next()
}
