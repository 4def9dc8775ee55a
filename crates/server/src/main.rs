use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use events::EventBus;
use orchestrator::{OpenRouterProvider, ProviderAdapter, ScriptedProvider};
use server::config::{ServerConfig, DEFAULT_CONFIG_FILE};
use server::{create_router, state::AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "roundtable-server")]
#[command(about = "Sequential multi-model debate server", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Answer every turn with canned text instead of calling a provider
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = ServerConfig::read(&cli.config).await;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let provider: Arc<dyn ProviderAdapter> = if cli.demo {
        tracing::warn!("Demo mode: turns are answered by the scripted provider");
        Arc::new(ScriptedProvider::new())
    } else {
        let provider = OpenRouterProvider::from_env(
            &config.provider.api_key_env,
            config.provider.base_url.clone(),
        )
        .context("Failed to configure provider (use --demo to run without one)")?
        .with_pricing(config.pricing())
        .with_usage_reporting(config.provider.include_usage);
        tracing::info!("Provider: {}", config.provider.base_url);
        Arc::new(provider)
    };

    let event_bus = EventBus::with_capacity(config.orchestrator.event_channel_capacity);
    let state = AppState::with_event_bus(provider, config.orchestrator_config(), event_bus);
    spawn_eviction(&state, &config);

    let app = create_router(state);
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    tracing::info!("Server listening on {}", listener.local_addr()?);
    tracing::info!("Swagger UI at http://{}/swagger-ui", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn spawn_eviction(state: &AppState, config: &ServerConfig) {
    let orchestrator = state.orchestrator.clone();
    let ttl = config.debate_ttl();
    let mut interval = tokio::time::interval(config.eviction_interval());

    tokio::spawn(async move {
        loop {
            interval.tick().await;
            let evicted = orchestrator.evict_expired(ttl).await;
            if !evicted.is_empty() {
                tracing::debug!(count = evicted.len(), "Eviction sweep finished");
            }
        }
    });
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roundtable_server=info,server=info,orchestrator=info,tower_http=info".into()),
        )
        .init();
}
