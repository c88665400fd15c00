// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::info;
use pit::engine::sweep;
use pit::{CheckResult, Engine, Layout, Severity, StartOutcome, api};
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};

#[derive(Parser, Debug)]
#[command(name = "pit")]
#[command(about = "Local nginx + PHP-FPM development supervisor")]
#[command(version)]
struct Cli {
    /// Installation directory (defaults to the directory holding the binary)
    #[arg(long, env = "PIT_BASE", global = true)]
    base: Option<PathBuf>,

    #[arg(long, env = "PIT_LOG_LEVEL", default_value = "info", global = true)]
    log_level: log::Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the stack and serve the control API until interrupted
    Start,
    /// Stop the stack and any running supervisor
    Stop,
    /// Show supervisor state and global service status
    Status,
    /// Run the preflight checks
    Preflight,
    /// Serve the control API without starting the stack
    Api,
    /// Manage the default PHP version
    #[command(subcommand)]
    Php(PhpCommand),
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),
}

#[derive(Subcommand, Debug)]
enum PhpCommand {
    /// Switch the default PHP pool to VERSION (e.g. 83)
    Use { version: String },
    /// List installed PHP versions
    Versions,
    /// Print the configured PHP version
    Current,
}

#[derive(Subcommand, Debug)]
enum ProjectCommand {
    Create { name: String },
    List,
    Info { name: String },
    Start { name: String },
    Stop { name: String },
    Restart { name: String },
    Status { name: String },
    SetPort { name: String, port: u16 },
}

fn default_base() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot locate the pit executable")?;
    exe.parent()
        .map(PathBuf::from)
        .context("executable has no parent directory")
}

fn print_checks(checks: &[CheckResult]) {
    for check in checks {
        let mark = match (check.ok, check.severity) {
            (true, _) => "ok",
            (false, Severity::Error) => "FAIL",
            (false, Severity::Warning) => "warn",
        };
        println!("[{mark:>4}] {}", check.name);
        if !check.ok {
            println!("       {}", check.reason);
            if !check.fix.is_empty() {
                println!("       fix: {}", check.fix);
            }
        }
    }
}

fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
    })
}

async fn serve_api(engine: Arc<Engine>) -> Result<()> {
    let addr = engine.config().await.api_addr;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind control API on {addr}"))?;
    let shutdown = shutdown_signal()?;
    api::serve(engine, listener, shutdown).await?;
    Ok(())
}

async fn start(engine: Arc<Engine>) -> Result<()> {
    let checks = engine.preflight_checks().await;
    print_checks(&checks);
    if !pit::engine::preflight_ok(&checks) {
        bail!("preflight failed");
    }

    sweep::force_kill_all(engine.layout()).await;

    match engine.start_all().await {
        Ok(StartOutcome::Started) => info!("pit started"),
        Ok(StartOutcome::AlreadyRunning) => {
            println!("pit is already running");
            return Ok(());
        }
        Err(e) => {
            engine.stop_all().await;
            return Err(e).context("failed to start the stack");
        }
    }

    let served = serve_api(engine.clone()).await;
    engine.stop_all().await;
    served
}

async fn status(engine: &Engine) -> Result<()> {
    println!("pit: {}", engine.state());
    for (id, status) in engine.service_statuses().await {
        let pid = status.pid.map_or_else(|| "-".to_string(), |p| p.to_string());
        let state = if status.running { "running" } else { "stopped" };
        println!("  {:<16} {state:<8} pid={pid}", id.to_string());
    }
    Ok(())
}

async fn php(engine: &Engine, command: PhpCommand) -> Result<()> {
    match command {
        PhpCommand::Use { version } => {
            engine
                .set_php_version(&version)
                .await
                .with_context(|| format!("cannot switch to PHP {version}"))?;
            println!("PHP {version} active");
        }
        PhpCommand::Versions => {
            let current = engine.current_php_version().await;
            for version in engine.list_php_versions()? {
                let mark = if version == current { "*" } else { " " };
                println!("{mark} {version}");
            }
        }
        PhpCommand::Current => println!("{}", engine.current_php_version().await),
    }
    Ok(())
}

async fn project(engine: &Engine, command: ProjectCommand) -> Result<()> {
    match command {
        ProjectCommand::Create { name } => {
            let config = engine.registry().create(&name)?;
            println!(
                "created {} (port {}, PHP {})",
                config.name, config.port, config.php_version
            );
        }
        ProjectCommand::List => {
            for name in engine.registry().list()? {
                println!("{name}");
            }
        }
        ProjectCommand::Info { name } => {
            let config = engine.registry().load_config(&name)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ProjectCommand::Start { name } => {
            engine
                .start_project(&name)
                .await
                .with_context(|| format!("failed to start project {name}"))?;
            println!("{name} running");
        }
        ProjectCommand::Stop { name } => {
            engine.stop_project(&name).await?;
            println!("{name} stopped");
        }
        ProjectCommand::Restart { name } => {
            engine
                .restart_project(&name)
                .await
                .with_context(|| format!("failed to restart project {name}"))?;
            println!("{name} restarted");
        }
        ProjectCommand::Status { name } => {
            for (id, status) in engine.project_status(&name).await? {
                let pid = status.pid.map_or_else(|| "-".to_string(), |p| p.to_string());
                let port = status.port.map_or_else(|| "-".to_string(), |p| p.to_string());
                let state = if status.running { "running" } else { "stopped" };
                println!("  {:<24} {state:<8} pid={pid} port={port}", id.to_string());
            }
        }
        ProjectCommand::SetPort { name, port } => {
            let config = engine
                .update_project(&name, Some(port), None)
                .await
                .with_context(|| format!("failed to move {name} to port {port}"))?;
            println!("{} now on port {}", config.name, config.port);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    simple_logger::init_with_level(cli.log_level)?;

    let base = match cli.base {
        Some(base) => base,
        None => default_base()?,
    };
    info!("pit base directory {}", base.display());
    let engine = Arc::new(Engine::new(Layout::new(base)));

    match cli.command {
        Command::Start => start(engine).await,
        Command::Stop => {
            engine.stop_all().await;
            println!("pit stopped");
            Ok(())
        }
        Command::Status => status(&engine).await,
        Command::Preflight => {
            let checks = engine.preflight_checks().await;
            print_checks(&checks);
            if !pit::engine::preflight_ok(&checks) {
                bail!("preflight failed");
            }
            Ok(())
        }
        Command::Api => {
            sweep::force_kill_all(engine.layout()).await;
            serve_api(engine).await
        }
        Command::Php(command) => php(&engine, command).await,
        Command::Project(command) => project(&engine, command).await,
    }
}
