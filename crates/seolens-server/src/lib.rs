//! # seolens-server
//!
//! HTTP API over the validation core: trigger validations, register sites
//! for scheduled re-checks, browse and update stored issues, and connect a
//! Google Search Console account per site.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, patch, post};
use seolens_core::fetch::{Fetch, PageFetcher};

pub mod error;
pub mod inspection;
pub mod oauth;
pub mod routes;
pub mod scheduler;
pub mod storage;

use oauth::GoogleOAuthConfig;
use storage::{IssueStore, MemStore, SiteStore, TokenStore};

/// Maximum URLs one validation request may cover.
pub const MAX_URLS_CAP: usize = 50;
pub const DEFAULT_MAX_URLS: usize = 10;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub pagespeed_api_key: Option<String>,
    pub google_oauth: Option<GoogleOAuthConfig>,
    pub scheduler_interval: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let google_oauth = match (
            std::env::var("GOOGLE_CLIENT_ID"),
            std::env::var("GOOGLE_CLIENT_SECRET"),
            std::env::var("GOOGLE_REDIRECT_URI"),
        ) {
            (Ok(client_id), Ok(client_secret), Ok(redirect_uri)) => Some(GoogleOAuthConfig {
                client_id,
                client_secret,
                redirect_uri,
            }),
            _ => None,
        };

        let scheduler_interval = std::env::var("SCHEDULER_INTERVAL_SECS")
            .ok()
            .and_then(|value| value.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(300));

        Self {
            pagespeed_api_key: std::env::var("PAGESPEED_API_KEY").ok(),
            google_oauth,
            scheduler_interval,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub issues: Arc<dyn IssueStore>,
    pub sites: Arc<dyn SiteStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub fetcher: Arc<dyn Fetch>,
    pub http: reqwest::Client,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// State backed by the in-memory store and the live fetcher.
    pub fn in_memory(config: ServerConfig) -> anyhow::Result<Self> {
        let store = MemStore::new();
        let fetcher = PageFetcher::new()?;
        Ok(Self {
            issues: store.clone(),
            sites: store.clone(),
            tokens: store,
            fetcher: Arc::new(fetcher),
            http: reqwest::Client::new(),
            config: Arc::new(config),
        })
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/validate", post(routes::validate::validate))
        .route(
            "/sites",
            post(routes::sites::register_site).get(routes::sites::list_sites),
        )
        .route("/sites/{site_id}/issues", get(routes::issues::list_site_issues))
        .route("/issues/{issue_id}", patch(routes::issues::update_issue_status))
        .route("/auth/google", get(routes::auth::begin))
        .route("/auth/google/callback", get(routes::auth::callback))
        .with_state(state)
}
