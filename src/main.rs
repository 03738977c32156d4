//! Resale price checker binary entrypoint.
//! Boots the Axum HTTP server, wiring the source registry, the outbound
//! fetcher, and the metrics exporter.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sedori_price_checker::api::{self, AppState};
use sedori_price_checker::config::{self, FetchConfig};
use sedori_price_checker::fetch::HttpFetcher;
use sedori_price_checker::metrics::Metrics;
use sedori_price_checker::sources::SourceRegistry;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sedori_price_checker=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let registry = SourceRegistry::load_default();
    let cfg = FetchConfig::from_env();
    tracing::info!(
        sources = registry.enabled_len(),
        timeout_secs = cfg.timeout.as_secs(),
        relays = cfg.proxy_endpoints.len(),
        "starting price checker"
    );

    let metrics = Metrics::init(registry.enabled_len());
    let fetcher = HttpFetcher::new(&cfg)?;

    let state = AppState {
        registry: Arc::new(registry),
        fetcher: Arc::new(fetcher),
    };
    let app = api::router(state).merge(metrics.router());

    let addr = config::bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
