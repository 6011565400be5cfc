//! Site registration and listing

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use seolens_core::types::{CheckSchedule, Site};
use seolens_core::extract_site_id;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct RegisterSiteRequest {
    pub site_url: String,
    #[serde(default)]
    pub sitemap_url: Option<String>,
    #[serde(default)]
    pub gsc_property: Option<String>,
    #[serde(default)]
    pub check_schedule: Option<String>,
    #[serde(default)]
    pub notification_webhook: Option<String>,
    #[serde(default)]
    pub notification_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SiteListResponse {
    pub sites: Vec<Site>,
    pub count: usize,
}

pub async fn register_site(
    State(state): State<AppState>,
    Json(request): Json<RegisterSiteRequest>,
) -> Result<(StatusCode, Json<Site>), ApiError> {
    let parsed = Url::parse(&request.site_url)
        .map_err(|_| ApiError::Validation(format!("invalid site_url: {}", request.site_url)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::Validation("site_url must be http(s)".to_string()));
    }
    let site_id = extract_site_id(parsed.as_str())
        .ok_or_else(|| ApiError::Validation("site_url has no hostname".to_string()))?;

    let check_schedule = match request.check_schedule.as_deref() {
        None => CheckSchedule::Weekly,
        Some(raw) => CheckSchedule::parse(raw)
            .ok_or_else(|| ApiError::Validation(format!("unknown check_schedule: {raw}")))?,
    };

    let now = Utc::now();
    // Re-registration keeps the run history; everything else is replaced.
    let existing = state.sites.get(&site_id).await?;
    let site = Site {
        site_id: site_id.clone(),
        site_url: request.site_url,
        sitemap_url: request.sitemap_url,
        gsc_property: request.gsc_property,
        check_schedule,
        notification_webhook: request.notification_webhook,
        notification_email: request.notification_email,
        last_check: existing.as_ref().and_then(|site| site.last_check),
        next_check: check_schedule.next_check_after(now),
        open_issues: existing.as_ref().map(|site| site.open_issues).unwrap_or(0),
        created_at: existing.map(|site| site.created_at).unwrap_or(now),
    };
    state.sites.upsert(&site).await?;

    Ok((StatusCode::CREATED, Json(site)))
}

pub async fn list_sites(
    State(state): State<AppState>,
) -> Result<Json<SiteListResponse>, ApiError> {
    let sites = state.sites.list().await?;
    let count = sites.len();
    Ok(Json(SiteListResponse { sites, count }))
}
