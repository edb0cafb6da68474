use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atus_core::{
    intake::{CategoryFilter, HttpLookup, HttpSourceConnector, NoLookup, ReleaseLookup},
    load_config,
    samples::PassthroughSampleProcessor,
    upload::{Destination, HttpDestination, NoDestination},
    validate_config, ArtifactStore, Config, EventBus, HttpAgentConnector, LogSubscriber,
    Orchestrator, OrchestratorParts, SqliteStore, CONFIG_PATH_ENV,
};

use atus_server::api::create_router;
use atus_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Logging depends on the config, so load errors are printed directly
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {:?}: {}", config_path, e);
            return Err(e).with_context(|| format!("Failed to load config from {:?}", config_path));
        }
    };

    init_logging(&config);
    info!("Loaded configuration from {:?}", config_path);

    validate_config(&config).context("Configuration validation failed")?;

    info!("Database path: {:?}", config.database.path);
    info!("Artifact directory: {:?}", config.storage.data_dir);

    let store = Arc::new(
        SqliteStore::new(&config.database.path).context("Failed to open database")?,
    );
    let artifacts = ArtifactStore::new(&config.storage.data_dir);

    let lookup: Arc<dyn ReleaseLookup> = match &config.lookup.url {
        Some(url) => {
            info!("Using release lookup at {}", url);
            Arc::new(
                HttpLookup::new(url, config.orchestrator.lookup_timeout())
                    .context("Failed to create release lookup")?,
            )
        }
        None => {
            info!("No release lookup configured, releases stay uncategorized");
            Arc::new(NoLookup)
        }
    };

    let destination: Arc<dyn Destination> = if config.upload.is_configured() {
        info!("Uploading to {}", config.upload.api_url);
        Arc::new(HttpDestination::new(&config.upload).context("Failed to create destination")?)
    } else {
        warn!("No upload destination configured, releases stop at DOWNLOADED");
        Arc::new(NoDestination)
    };

    let events = EventBus::new();
    events.subscribe(Arc::new(LogSubscriber));

    let orchestrator = Arc::new(Orchestrator::new(
        config.orchestrator_settings(),
        OrchestratorParts {
            store,
            artifacts,
            agents: Arc::new(HttpAgentConnector::new(config.agent_defaults.clone())),
            sources: Arc::new(HttpSourceConnector::new(config.discovery.request_timeout())),
            lookup,
            policy: Arc::new(CategoryFilter::new(&config.filters)),
            destination,
            sample_processor: Arc::new(PassthroughSampleProcessor),
            events,
        },
    ));

    let agents = orchestrator
        .bootstrap_agents(&config.agents)
        .await
        .context("Failed to bootstrap agents")?;
    let sources = orchestrator
        .bootstrap_sources(&config.sources)
        .context("Failed to bootstrap sources")?;
    info!(
        "Bootstrapped {} agents and {} sources from configuration",
        agents, sources
    );

    orchestrator
        .start()
        .await
        .context("Failed to start orchestrator")?;

    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&orchestrator)));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    orchestrator.shutdown().await;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
