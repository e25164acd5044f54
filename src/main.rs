use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use protein_architect::config::Config;
use protein_architect::models::AppState;
use protein_architect::pipeline::ResearchPipeline;
use protein_architect::providers::{AlphaFoldClient, ProviderSet, RemoteDockingBackend};
use protein_architect::routes::create_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "protein_architect=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    // Resolve provider clients once; the pipeline never probes the
    // environment itself.
    let providers = ProviderSet::from_config(&config);
    let pipeline = Arc::new(ResearchPipeline::from_config(providers, &config));
    let http = reqwest::Client::new();
    let timeout = Duration::from_secs(config.providers.request_timeout_secs);
    let docking = Arc::new(RemoteDockingBackend::new(
        config.providers.docking_endpoint.clone(),
        http.clone(),
        timeout,
    ));
    let structure = Arc::new(AlphaFoldClient::new(
        config.providers.alphafold_base_url.clone(),
        http,
        timeout,
    ));

    let state = AppState {
        config: config.clone(),
        pipeline,
        docking,
        structure,
        run_counter: Arc::new(AtomicU64::new(0)),
    };

    let app = create_router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
