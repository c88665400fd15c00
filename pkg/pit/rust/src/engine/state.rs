// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;

use serde::Serialize;

/// Lifecycle of the whole local stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Stopping,
    /// Supervisor PID file present but its process is gone.
    Stale,
}

impl EngineState {
    pub(crate) fn can_transition_to(self, next: EngineState) -> bool {
        use EngineState::*;
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Stale, Starting)
                | (Starting, Running)
                | (Running, Stopping)
                | (Starting, Stopping)
                | (Stale, Stopping)
                | (Stopped, Stopping)
                | (Stopping, Stopped)
        )
    }

    pub fn is_transitional(self) -> bool {
        matches!(self, EngineState::Starting | EngineState::Stopping)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Starting => write!(f, "starting"),
            EngineState::Running => write!(f, "running"),
            EngineState::Stopping => write!(f, "stopping"),
            EngineState::Stale => write!(f, "stale"),
        }
    }
}

/// Result of a successful `start_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A live supervisor was already recorded; nothing was spawned.
    AlreadyRunning,
}
