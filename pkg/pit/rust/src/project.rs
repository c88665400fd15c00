// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Projects: persisted config, the catalogue of them, and the runtime that
//! pairs a project's proxy with its PHP pool.

pub mod config;
pub mod registry;
pub mod runtime;

pub use config::ProjectConfig;
pub use registry::ProjectRegistry;
pub use runtime::ProjectRuntime;
