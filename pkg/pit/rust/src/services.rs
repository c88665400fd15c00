// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Managed services: OS processes (or pool registrations) the supervisor can
//! start, stop and probe.

pub mod nginx_conf;
pub mod php_fpm;
pub mod project_pool;
pub mod project_proxy;
pub mod proxy;

use std::fmt;

use async_trait::async_trait;
use serde::{Serialize, Serializer};

use crate::error::Result;

pub use php_fpm::{PhpFpmService, ToolsPoolService};
pub use project_pool::ProjectPoolService;
pub use project_proxy::ProjectProxyService;
pub use proxy::ProxyService;

/// Roles of the global services. Declaration order is start order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GlobalRole {
    PhpPool,
    ToolsPool,
    Proxy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProjectRole {
    PhpPool,
    Proxy,
}

/// Identity of a service, the key of every status map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceId {
    Global(GlobalRole),
    Project { role: ProjectRole, project: String },
}

impl ServiceId {
    pub fn project(role: ProjectRole, project: &str) -> Self {
        ServiceId::Project {
            role,
            project: project.to_string(),
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceId::Global(GlobalRole::PhpPool) => write!(f, "php-fpm"),
            ServiceId::Global(GlobalRole::ToolsPool) => write!(f, "php-fpm-tools"),
            ServiceId::Global(GlobalRole::Proxy) => write!(f, "nginx"),
            ServiceId::Project {
                role: ProjectRole::Proxy,
                project,
            } => write!(f, "nginx-project:{project}"),
            ServiceId::Project {
                role: ProjectRole::PhpPool,
                project,
            } => write!(f, "php-pool:{project}"),
        }
    }
}

impl Serialize for ServiceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Point-in-time snapshot, probed fresh on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub port: Option<u16>,
}

#[async_trait]
pub trait ManagedService: Send + Sync {
    fn id(&self) -> ServiceId;

    /// Launch the service. Returning `Ok` means the launch call succeeded,
    /// not that the service accepts connections yet.
    async fn start(&self) -> Result<()>;

    /// Best-effort stop. Failures are logged, never returned.
    async fn stop(&self);

    fn status(&self) -> ServiceStatus;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_service_id_display() {
        assert_eq!(ServiceId::Global(GlobalRole::Proxy).to_string(), "nginx");
        assert_eq!(ServiceId::Global(GlobalRole::PhpPool).to_string(), "php-fpm");
        assert_eq!(
            ServiceId::Global(GlobalRole::ToolsPool).to_string(),
            "php-fpm-tools"
        );
        assert_eq!(
            ServiceId::project(ProjectRole::Proxy, "acme").to_string(),
            "nginx-project:acme"
        );
        assert_eq!(
            ServiceId::project(ProjectRole::PhpPool, "acme").to_string(),
            "php-pool:acme"
        );
    }

    #[test]
    fn test_status_map_serializes_with_string_keys() {
        let mut statuses = BTreeMap::new();
        statuses.insert(
            ServiceId::Global(GlobalRole::Proxy),
            ServiceStatus {
                running: true,
                pid: Some(42),
                port: Some(80),
            },
        );
        statuses.insert(ServiceId::Global(GlobalRole::ToolsPool), ServiceStatus::default());

        let json = serde_json::to_value(&statuses).unwrap();
        assert_eq!(json["nginx"]["running"], true);
        assert_eq!(json["nginx"]["pid"], 42);
        assert_eq!(json["php-fpm-tools"]["pid"], serde_json::Value::Null);
    }

    #[test]
    fn test_global_roles_start_order() {
        let mut roles = vec![GlobalRole::Proxy, GlobalRole::ToolsPool, GlobalRole::PhpPool];
        roles.sort();
        assert_eq!(
            roles,
            vec![GlobalRole::PhpPool, GlobalRole::ToolsPool, GlobalRole::Proxy]
        );
    }
}
