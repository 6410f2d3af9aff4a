//! Mind runtime (mind-rt) - Main entry point
//!
//! Hosts the MusicalThought / TheoryGate node graph, drives generation and
//! resolution against the remote service, and schedules the resulting parts
//! on a bar-quantized transport. The graph is controlled over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mind_common::config::TomlConfig;
use mind_common::events::EventBus;
use mind_rt::api::{self, AppContext};
use mind_rt::client::{HttpThoughtService, ThoughtService};
use mind_rt::graph::{GateNodeProps, GraphSettings, ThoughtNodeProps};
use mind_rt::profiles::ProfileCatalog;
use mind_rt::scheduler::PartSwapScheduler;
use mind_rt::transport::{LoggingEngine, VirtualTransport};
use mind_rt::{Graph, RuntimeStore};
use tokio::runtime::Handle;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for mind-rt
#[derive(Parser, Debug)]
#[command(name = "mind-rt")]
#[command(about = "Musical thought runtime")]
#[command(version)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "MIND_PORT")]
    port: Option<u16>,

    /// Base URL of the generation/resolution service (overrides the config file)
    #[arg(long, env = "MIND_SERVICE_URL")]
    service_url: Option<String>,

    /// Start with an empty graph
    #[arg(long)]
    no_seed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing is up so its log level can apply
    let (mut config, source) =
        TomlConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(url) = args.service_url {
        config.service_url = url;
    }

    // Initialize tracing
    let level = config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("mind_rt={level},mind_common={level},tower_http=info").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mind runtime on port {}", config.port);
    source.log();
    info!("Service URL: {}", config.service_url);

    let meter = config.meter().context("Invalid transport meter")?;
    info!(
        "Transport: {} BPM, {} ({:.3}s per bar)",
        config.tempo,
        config.time_signature,
        meter.bar_seconds()
    );

    let store = Arc::new(RuntimeStore::new(EventBus::new(config.event_bus_capacity)));

    let transport = Arc::new(VirtualTransport::new(meter, Handle::current()));
    let engine = Arc::new(LoggingEngine::new(meter, Handle::current()));
    let scheduler = PartSwapScheduler::new(transport, engine, Arc::clone(&store), meter);

    let service: Arc<dyn ThoughtService> = Arc::new(
        HttpThoughtService::new(&config.service_url)
            .context("Failed to build service client")?,
    );
    let catalog = ProfileCatalog::fetch(service.as_ref()).await;
    info!("{} style profiles available", catalog.profiles().len());

    let graph = Graph::new(
        service,
        Arc::clone(&store),
        Arc::clone(&scheduler),
        catalog,
        GraphSettings::from_config(&config),
    );

    if args.no_seed {
        info!("Starting with an empty graph");
    } else {
        seed_graph(&graph).context("Failed to seed graph")?;
    }

    let ctx = AppContext {
        graph,
        store,
        scheduler: Arc::clone(&scheduler),
    };
    api::run(ctx, config.port, shutdown_signal())
        .await
        .context("Server error")?;

    scheduler.shutdown();
    info!("Server shutdown complete");
    Ok(())
}

/// One MusicalThought and one unconnected TheoryGate
fn seed_graph(graph: &Graph) -> mind_rt::Result<()> {
    let thought = graph.add_thought_node(ThoughtNodeProps::default())?;
    let gate = graph.add_gate_node(GateNodeProps::default())?;
    info!("Seeded graph with {} and {}", thought.node_id, gate.node_id);
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
