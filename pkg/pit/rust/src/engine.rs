// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Top-level orchestrator of the local stack.
//!
//! The engine owns the global services, keyed by role, and serialises every
//! multi-step operation: one mutex for whole-stack sequences (start, stop,
//! PHP switch) and one per project for project sequences.

pub mod config;
pub mod php;
pub mod preflight;
pub mod state;
pub mod sweep;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use log::{error, info, warn};
use nix::sys::signal::Signal;
use tokio::sync::{Mutex, RwLock};

use crate::error::Result;
use crate::hosts::{EtcHosts, HostsSync};
use crate::layout::Layout;
use crate::pidfile;
use crate::procfs::ProcFs;
use crate::project::{ProjectConfig, ProjectRegistry};
use crate::services::{
    GlobalRole, ManagedService, PhpFpmService, ProxyService, ServiceId, ServiceStatus,
    ToolsPoolService,
};

pub use config::EngineConfig;
pub use preflight::{CheckResult, Severity, preflight_ok};
pub use state::{EngineState, StartOutcome};

struct Inner {
    config: EngineConfig,
    services: BTreeMap<GlobalRole, Arc<dyn ManagedService>>,
    proxy: Arc<ProxyService>,
}

impl Inner {
    fn new(layout: &Layout, config: EngineConfig) -> Self {
        let proxy = Arc::new(ProxyService::new(layout, config.proxy_port, config.php_port));
        let mut services: BTreeMap<GlobalRole, Arc<dyn ManagedService>> = BTreeMap::new();
        services.insert(
            GlobalRole::PhpPool,
            Arc::new(PhpFpmService::new(layout, &config.php_version, config.php_port)),
        );
        services.insert(
            GlobalRole::ToolsPool,
            Arc::new(ToolsPoolService::new(layout, &config.php_version)),
        );
        services.insert(GlobalRole::Proxy, proxy.clone());
        Self {
            config,
            services,
            proxy,
        }
    }

    /// Services in start order.
    fn ordered(&self) -> Vec<Arc<dyn ManagedService>> {
        self.services.values().cloned().collect()
    }
}

pub struct Engine {
    layout: Layout,
    inner: RwLock<Inner>,
    orchestration: Mutex<()>,
    phase: StdMutex<EngineState>,
    hosts: Box<dyn HostsSync>,
    registry: ProjectRegistry,
    project_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Engine {
    /// Engine for the installation at `layout`, syncing `/etc/hosts`.
    pub fn new(layout: Layout) -> Self {
        Self::with_hosts(layout, Box::new(EtcHosts::system()))
    }

    pub fn with_hosts(layout: Layout, hosts: Box<dyn HostsSync>) -> Self {
        let config = EngineConfig::load(&layout.engine_config());
        Self {
            inner: RwLock::new(Inner::new(&layout, config)),
            orchestration: Mutex::new(()),
            phase: StdMutex::new(EngineState::Stopped),
            hosts,
            registry: ProjectRegistry::new(&layout),
            project_locks: Mutex::new(HashMap::new()),
            layout,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    pub async fn config(&self) -> EngineConfig {
        self.inner.read().await.config.clone()
    }

    fn set_phase(&self, next: EngineState) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if !phase.can_transition_to(next) {
            warn!("unexpected engine transition {} -> {next}", *phase);
        }
        *phase = next;
    }

    /// Current lifecycle state. Outside of a start or stop sequence this is
    /// read from the supervisor PID file, so it also reflects a supervisor
    /// running in another process.
    pub fn state(&self) -> EngineState {
        let phase = *self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if phase.is_transitional() {
            return phase;
        }
        match pidfile::read_pid(&self.layout.supervisor_pid()) {
            Some(pid) if pidfile::is_alive(pid) => EngineState::Running,
            Some(_) => EngineState::Stale,
            None if self.layout.supervisor_pid().exists() => EngineState::Stale,
            None => EngineState::Stopped,
        }
    }

    pub async fn preflight_checks(&self) -> Vec<CheckResult> {
        let config = self.config().await;
        preflight::run_checks(&self.layout, &config, &ProcFs::host()).await
    }

    /// Record this process as the supervisor, sync site domains, then start
    /// every global service in order. The first failure is returned and the
    /// services already started are left running.
    pub async fn start_all(&self) -> Result<StartOutcome> {
        let _guard = self.orchestration.lock().await;
        let pid_file = self.layout.supervisor_pid();

        match self.state() {
            EngineState::Running => {
                info!("pit already running (pid file {})", pid_file.display());
                return Ok(StartOutcome::AlreadyRunning);
            }
            EngineState::Stale => {
                info!("found stale pit pid file, cleaning up");
                pidfile::remove_quiet(&pid_file);
            }
            _ => {}
        }

        self.set_phase(EngineState::Starting);
        if let Err(e) = pidfile::write_pid(&pid_file, std::process::id()) {
            self.set_phase(EngineState::Stopping);
            self.set_phase(EngineState::Stopped);
            return Err(e);
        }

        let services = {
            let inner = self.inner.read().await;
            self.sync_hosts(&inner.proxy);
            inner.ordered()
        };

        let mut result = Ok(StartOutcome::Started);
        for service in services {
            info!("[{}] starting", service.id());
            if let Err(e) = service.start().await {
                error!("[{}] failed to start: {e}", service.id());
                result = Err(e);
                break;
            }
        }

        // A partial start still leaves a recorded supervisor behind.
        self.set_phase(EngineState::Running);
        result
    }

    fn sync_hosts(&self, proxy: &ProxyService) {
        let domains: Vec<String> = match proxy.sites() {
            Ok(sites) => sites.iter().map(|s| s.domain()).collect(),
            Err(e) => {
                warn!("[hosts] cannot scan sites: {e}");
                return;
            }
        };
        if domains.is_empty() {
            return;
        }
        info!("[hosts] syncing {} domain(s)", domains.len());
        if let Err(e) = self.hosts.ensure(&domains) {
            warn!("[hosts] failed to update hosts file: {e}");
        }
    }

    /// Stop every global service, sweep every runtime namespace and clear
    /// the supervisor PID file. Never fails.
    pub async fn stop_all(&self) {
        let _guard = self.orchestration.lock().await;
        self.set_phase(EngineState::Stopping);

        let services = self.inner.read().await.ordered();
        for service in services.iter().rev() {
            info!("[{}] stopping", service.id());
            service.stop().await;
        }

        sweep::kill_runtime_pids(&self.layout).await;

        let pid_file = self.layout.supervisor_pid();
        if let Some(pid) = pidfile::read_pid(&pid_file)
            && pid != std::process::id()
            && pidfile::is_alive(pid)
        {
            info!("signalling running supervisor {pid}");
            if let Err(e) = pidfile::send_signal(pid, Signal::SIGTERM) {
                warn!("{e}");
            }
        }
        pidfile::remove_quiet(&pid_file);

        self.set_phase(EngineState::Stopped);
        info!("pit stopped");
    }

    pub async fn service_statuses(&self) -> BTreeMap<ServiceId, ServiceStatus> {
        let inner = self.inner.read().await;
        inner
            .services
            .values()
            .map(|service| (service.id(), service.status()))
            .collect()
    }

    pub async fn reload_proxy(&self) -> Result<()> {
        let proxy = self.inner.read().await.proxy.clone();
        proxy.reload().await
    }

    pub async fn current_php_version(&self) -> String {
        self.inner.read().await.config.php_version.clone()
    }

    pub fn list_php_versions(&self) -> Result<Vec<String>> {
        php::list_versions(&self.layout)
    }

    /// Switch the default pool to `version`: the old service is stopped and
    /// replaced by a new instance bound to the new installation. Nothing is
    /// touched when `version` is not installed.
    pub async fn set_php_version(&self, version: &str) -> Result<()> {
        php::require_installed(&self.layout, version)?;
        let _guard = self.orchestration.lock().await;

        let (old, mut config) = {
            let inner = self.inner.read().await;
            (inner.services.get(&GlobalRole::PhpPool).cloned(), inner.config.clone())
        };
        if let Some(old) = old {
            info!("[{}] stopping for version switch", old.id());
            old.stop().await;
        }

        config.php_version = version.to_string();
        config.save(&self.layout.engine_config())?;

        let replacement: Arc<dyn ManagedService> =
            Arc::new(PhpFpmService::new(&self.layout, version, config.php_port));
        {
            let mut inner = self.inner.write().await;
            inner.config = config;
            inner.services.insert(GlobalRole::PhpPool, replacement.clone());
        }

        info!("switched to PHP {version}");
        replacement.start().await
    }

    /// Clean-slate sweep over every project; callable in any state.
    pub async fn force_kill_all_project_runtimes(&self) {
        sweep::force_kill_all(&self.layout).await;
    }

    async fn project_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.project_locks.lock().await;
        locks.entry(name.to_string()).or_default().clone()
    }

    pub async fn start_project(&self, name: &str) -> Result<()> {
        let lock = self.project_lock(name).await;
        let _guard = lock.lock().await;
        self.registry.load(name)?.start().await
    }

    pub async fn stop_project(&self, name: &str) -> Result<()> {
        let lock = self.project_lock(name).await;
        let _guard = lock.lock().await;
        self.registry.load(name)?.stop().await;
        Ok(())
    }

    pub async fn restart_project(&self, name: &str) -> Result<()> {
        let lock = self.project_lock(name).await;
        let _guard = lock.lock().await;
        self.registry.load(name)?.restart().await
    }

    pub async fn force_stop_project(&self, name: &str) -> Result<()> {
        let lock = self.project_lock(name).await;
        let _guard = lock.lock().await;
        self.registry.load(name)?.force_stop_all().await;
        Ok(())
    }

    pub async fn project_status(&self, name: &str) -> Result<BTreeMap<ServiceId, ServiceStatus>> {
        Ok(self.registry.load(name)?.status())
    }

    /// Change a project's port and/or PHP version, then restart it on the
    /// new settings. The old runtime is stopped with the old settings.
    pub async fn update_project(
        &self,
        name: &str,
        port: Option<u16>,
        php_version: Option<&str>,
    ) -> Result<ProjectConfig> {
        let lock = self.project_lock(name).await;
        let _guard = lock.lock().await;

        let mut config = self.registry.load_config(name)?;
        if let Some(port) = port {
            config.port = port;
        }
        if let Some(version) = php_version {
            php::require_installed(&self.layout, version)?;
            config.php_version = version.to_string();
        }
        config.validate()?;

        self.registry.load(name)?.stop().await;
        self.registry.save_config(name, &config)?;
        self.registry.load(name)?.start().await?;
        Ok(config)
    }
}
