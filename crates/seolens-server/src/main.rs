use std::net::SocketAddr;

use seolens_server::{AppState, ServerConfig, app, scheduler};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seolens_server=debug,seolens_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    if config.pagespeed_api_key.is_none() {
        tracing::info!("PAGESPEED_API_KEY not set; performance checks are disabled");
    }
    if config.google_oauth.is_none() {
        tracing::info!("Google OAuth env vars not set; Search Console integration is disabled");
    }

    let state = AppState::in_memory(config)?;
    scheduler::spawn(state.clone());

    let router = app(state).layer(TraceLayer::new_for_http());

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("PORT must be a number");

    let addr = SocketAddr::new(host.parse().expect("Invalid HOST"), port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
