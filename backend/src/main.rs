//! Shelfwise - Backend Server
//!
//! Serves sales reports enriched with inventory, reorder points, ABC tiers
//! and dead stock for a single commerce store.

use std::{net::SocketAddr, sync::Arc};

use shelfwise_backend::{
    config::Config,
    create_app,
    external::{commerce_api, FetchClient, FetchPolicy, HttpTransport},
    services::{ReportService, SystemClock},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "shelfwise_server=debug,shelfwise_backend=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Shelfwise Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!(
        shop = %config.commerce.shop_domain,
        generation = config.commerce.generation.as_str(),
        calls_per_second = config.commerce.rate_limit_calls_per_second,
        "Commerce API configured"
    );

    // Commerce client: transport, then the rate-limited fetch discipline
    let transport = Arc::new(HttpTransport::new(&config.commerce)?);
    let client = Arc::new(FetchClient::new(
        transport,
        FetchPolicy::from_config(&config.commerce),
    ));
    let api = commerce_api(client, &config.commerce);

    let reports = ReportService::new(api, &config, Arc::new(SystemClock));

    // Create application state
    let state = AppState {
        config: Arc::new(config.clone()),
        reports: Arc::new(reports),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::new(host, config.server.port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
