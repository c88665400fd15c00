// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod api;
pub mod engine;
mod error;
pub mod hosts;
pub mod layout;
pub mod pidfile;
pub mod ports;
mod process;
pub mod procfs;
pub mod project;
pub mod services;

pub use engine::{CheckResult, Engine, EngineConfig, EngineState, Severity, StartOutcome};
pub use error::{Error, Result};
pub use layout::Layout;
pub use project::{ProjectConfig, ProjectRegistry, ProjectRuntime};
pub use services::{ManagedService, ServiceId, ServiceStatus};
