//! drowsed: the on-demand game server daemon.
//!
//! Two entry points share one binary:
//!
//! - `drowsed launcher` consumes resolver query-log lines on stdin and
//!   wakes the workload on first contact;
//! - `drowsed watchdog` runs inside the workload task, keeps DNS in
//!   step with the instance address, and scales back to zero after the
//!   idle timeout.
//!
//! Runtime settings come from the environment (`CLUSTER`, `SERVICE`,
//! `DNSZONE`, `SERVERNAME`, `SNSTOPIC`, `STARTUPMIN`, `SHUTDOWNMIN`,
//! ...); the cloud API calls themselves come from argv templates in a
//! backends file. `--local` swaps in the in-memory backends for a
//! smoke run with no cloud access.
//!
//! ```text
//! drowsed launcher --backends /etc/drowse/backends.toml < query.log
//! drowsed watchdog --backends /etc/drowse/backends.toml
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tracing::info;

use drowse_cloud::{
    BackendFile, DnsApi, ExecDns, ExecOrchestrator, ExecPublisher, MemoryDns, MemoryOrchestrator,
    MemoryPublisher, Notifier, Orchestrator, PortProbe, Publisher, RecordSync, ScriptedProbe,
    WorkloadProbe,
};
use drowse_core::Config;
use drowse_launcher::{Launcher, QueryLogFeed};
use drowse_watchdog::Watchdog;

#[derive(Parser)]
#[command(name = "drowsed", about = "On-demand game server launcher and watchdog")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Wake the workload when its hostname is resolved.
    Launcher {
        /// Backend command templates (TOML).
        #[arg(long)]
        backends: Option<PathBuf>,

        /// Use in-memory backends instead of a backends file.
        #[arg(long)]
        local: bool,
    },
    /// Watch the running workload and scale it to zero when idle.
    Watchdog {
        /// Backend command templates (TOML).
        #[arg(long)]
        backends: Option<PathBuf>,

        /// Use in-memory backends instead of a backends file.
        #[arg(long)]
        local: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,drowsed=debug,drowse=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Launcher { backends, local } => {
            let config = load_config(local)?;
            if local {
                run_launcher(config, MemoryOrchestrator::new()).await
            } else {
                let file = load_backends(backends)?;
                run_launcher(config, ExecOrchestrator::new(file.orchestrator)).await
            }
        }
        Command::Watchdog { backends, local } => {
            let config = load_config(local)?;
            if local {
                // A pretend workload that is already up and idle.
                let orchestrator = MemoryOrchestrator::with_desired(1);
                orchestrator.set_running(&["127.0.0.1"]);
                run_watchdog(
                    &config,
                    orchestrator,
                    MemoryDns::new(),
                    MemoryPublisher::new(),
                    ScriptedProbe::new(true, 0),
                )
                .await
            } else {
                let file = load_backends(backends)?;
                let probe = PortProbe::new(config.server_port);
                run_watchdog(
                    &config,
                    ExecOrchestrator::new(file.orchestrator),
                    ExecDns::new(file.dns),
                    ExecPublisher::new(file.publisher.unwrap_or_default()),
                    probe,
                )
                .await
            }
        }
    }
}

fn load_config(local: bool) -> anyhow::Result<Config> {
    if local {
        // Self-contained defaults so a smoke run needs no environment.
        let vars = [
            ("CLUSTER", "local"),
            ("SERVICE", "local"),
            ("DNSZONE", "local"),
            ("SERVERNAME", "game.localhost"),
            ("STARTUPMIN", "0"),
            ("SHUTDOWNMIN", "1"),
            ("POLLSEC", "5"),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string()));
        Ok(Config::from_vars(vars)?)
    } else {
        Config::from_env().context("reading configuration from the environment")
    }
}

fn load_backends(path: Option<PathBuf>) -> anyhow::Result<BackendFile> {
    let path = path.context("--backends is required unless --local is set")?;
    BackendFile::from_file(&path)
        .with_context(|| format!("loading backend templates from {}", path.display()))
}

/// Convert Ctrl-C into the watch-channel shutdown signal.
fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = tx.send(true);
        }
    });
    rx
}

async fn run_launcher<O>(config: Config, orchestrator: O) -> anyhow::Result<()>
where
    O: Orchestrator + 'static,
{
    let (events_tx, events_rx) = mpsc::channel(64);
    let feed = QueryLogFeed::new(&config.server_name);
    let feed_handle = tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        feed.run(stdin, events_tx).await
    });

    let launcher = Launcher::new(&config, orchestrator);
    launcher.run(events_rx, shutdown_channel()).await;

    feed_handle.abort();
    Ok(())
}

async fn run_watchdog<O, D, P, W>(
    config: &Config,
    orchestrator: O,
    dns: D,
    publisher: P,
    probe: W,
) -> anyhow::Result<()>
where
    O: Orchestrator,
    D: DnsApi,
    P: Publisher,
    W: WorkloadProbe,
{
    let records = RecordSync::new(dns, config);
    let notifier = Notifier::new(publisher, config.topic.clone(), config.server_name.clone());
    let watchdog = Watchdog::new(config, orchestrator, records, notifier, probe);
    watchdog.run(shutdown_channel()).await?;
    Ok(())
}
