//! fabric-syncd entry point.
//!
//! Runs a synchronization pass every `sync.interval_secs` until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use l3pe_fabric_client::{FabricSession, HttpTransport};
use l3pe_fabric_syncd::{
    listener, DiffEngine, EventQueue, FabricSyncConfig, KeystoneClient, NeutronClient,
    OperationApplier, SyncSettings, Synchronizer, DEFAULT_CONFIG_PATH,
};
use tracing::{info, warn};

/// Fabric L3 synchronizer daemon
#[derive(Parser, Debug)]
#[command(name = "fabric-syncd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Compute operations without applying them
    #[arg(long)]
    dry_run: bool,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(log_level: &str, json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().with_target(true).json())
            .init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs);

    let mut config = FabricSyncConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if args.dry_run {
        config.sync.dry_run = true;
    }
    config.validate().context("invalid configuration")?;

    info!(
        api_url = %config.fabric.api_url,
        deployment_id = %config.sync.deployment_id,
        interval_secs = config.sync.interval_secs,
        dry_run = config.sync.dry_run,
        "Starting fabric-syncd"
    );

    let options = config.transport_options();
    let transport = Arc::new(HttpTransport::new(&options).context("building fabric transport")?);
    let keystone = Arc::new(
        KeystoneClient::new(
            &config.identity.auth_url,
            config.identity.username.clone(),
            config.identity.password.clone(),
            config.identity.tenant_name.clone(),
            &options,
        )
        .context("building identity client")?,
    );
    let neutron = Arc::new(
        NeutronClient::new(&config.registry.neutron_url, keystone.clone(), &options)
            .context("building registry client")?,
    );

    let mut synchronizer = Synchronizer::new(
        FabricSession::new(config.fabric_credentials(), transport),
        keystone,
        neutron,
        DiffEngine::new(config.sync.deployment_id.clone()),
        OperationApplier::new(config.pacing(), config.sync.dry_run),
        SyncSettings {
            exclude_physical_networks: config.sync.exclude_physical_networks.clone(),
            prune_orphan_tenant_interfaces: config.sync.prune_orphan_tenant_interfaces,
        },
    );

    let queue = config.events.enabled.then(|| Arc::new(EventQueue::new()));
    if let Some(queue) = &queue {
        let addr = config.events.listen_addr;
        listener::spawn(addr, Arc::clone(queue))
            .await
            .with_context(|| format!("binding event listener on {}", addr))?;
    }

    loop {
        let events = queue.as_ref().map(|q| q.drain());
        match synchronizer.synchronize(events).await {
            Ok(summary) if args.once => {
                info!(converged = summary.is_converged(), "Single pass finished");
                break;
            }
            Ok(_) => {}
            Err(e) if args.once => return Err(e).context("synchronization pass failed"),
            Err(e) => warn!(error = %e, retryable = e.is_retryable(), "Synchronization pass failed"),
        }

        tokio::select! {
            _ = tokio::time::sleep(config.interval()) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    info!("fabric-syncd stopped");
    Ok(())
}
