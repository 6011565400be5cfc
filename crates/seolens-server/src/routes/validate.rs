//! `POST /validate` — run checks against a site now
//!
//! Two detection paths feed one assembly: the local fetch-backed validators,
//! or — when the caller opts in and a Google credential is stored — the URL
//! Inspection API. Search Console carries no performance data, so the local
//! performance check still runs alongside the GSC path and the two lists
//! are concatenated without deduplication.

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use seolens_core::assembler::assemble;
use seolens_core::gsc::map_inspection;
use seolens_core::types::{CheckKind, Issue, RawIssue, ValidationSummary};
use seolens_core::{discover, extract_site_id, validators};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::ApiError;
use crate::{AppState, DEFAULT_MAX_URLS, MAX_URLS_CAP, inspection, oauth};

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub site_url: String,
    #[serde(default)]
    pub checks: Option<Vec<String>>,
    #[serde(default)]
    pub max_urls: Option<usize>,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub use_gsc: bool,
    #[serde(default)]
    pub gsc_property: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub validation_id: String,
    pub status: &'static str,
    pub urls_checked: usize,
    pub summary: ValidationSummary,
    pub issues: Vec<Issue>,
    pub gsc_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gsc_property: Option<String>,
}

pub async fn validate(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let site_url = parse_site_url(&request.site_url)?;
    let checks = parse_checks(request.checks.as_deref())?;
    let max_urls = request
        .max_urls
        .unwrap_or(DEFAULT_MAX_URLS)
        .clamp(1, MAX_URLS_CAP);

    let site_id = match request.site_id {
        Some(explicit) => explicit,
        None => extract_site_id(site_url.as_str())
            .ok_or_else(|| ApiError::Validation("site_url has no hostname".to_string()))?,
    };
    let site = state.sites.get(&site_id).await?;

    // Resolve the credential before any fetching so a disconnected site
    // fails fast.
    let gsc_token = if request.use_gsc {
        let record = state.tokens.get_token(&site_id).await?.ok_or_else(|| {
            ApiError::NotConnected(format!("no Google credential stored for site {site_id}"))
        })?;
        let record = if record.is_expired(Utc::now()) {
            let config = state.config.google_oauth.as_ref().ok_or_else(|| {
                ApiError::NotConnected("Google OAuth is not configured".to_string())
            })?;
            let fresh = oauth::refresh(&state.http, config, &record)
                .await
                .map_err(|err| {
                    tracing::warn!(%site_id, error = %err, "google token refresh failed");
                    ApiError::Unauthorized("stored Google credential could not be refreshed".to_string())
                })?;
            state.tokens.put_token(&site_id, &fresh).await?;
            fresh
        } else {
            record
        };
        Some(record)
    } else {
        None
    };

    let sitemap_url = site.as_ref().and_then(|site| site.sitemap_url.clone());
    let urls = discover::discover_urls(
        state.fetcher.as_ref(),
        site_url.as_str(),
        sitemap_url.as_deref(),
        max_urls,
    )
    .await;

    let mut raw: Vec<RawIssue> = Vec::new();
    let mut gsc_property = None;

    match &gsc_token {
        Some(token) => {
            let property = request
                .gsc_property
                .clone()
                .or_else(|| site.as_ref().and_then(|site| site.gsc_property.clone()))
                .unwrap_or_else(|| origin_of(&site_url));
            for url in &urls {
                match inspection::inspect(&state.http, &token.access_token, &property, url).await {
                    Ok(result) => raw.extend(map_inspection(url, &result)),
                    Err(err) => {
                        tracing::warn!(%url, error = %err, "url inspection failed");
                    }
                }
            }
            if checks.contains(&CheckKind::Performance) {
                for url in &urls {
                    raw.extend(
                        validators::performance::validate(
                            state.config.pagespeed_api_key.as_deref(),
                            url,
                        )
                        .await,
                    );
                }
            }
            gsc_property = Some(property);
        }
        None => {
            for url in &urls {
                raw.extend(
                    validators::run_checks(
                        state.fetcher.as_ref(),
                        url,
                        &checks,
                        state.config.pagespeed_api_key.as_deref(),
                    )
                    .await,
                );
            }
        }
    }

    let assembled = assemble(raw);
    state.issues.put_issues(&site_id, &assembled.issues).await?;

    Ok(Json(ValidateResponse {
        validation_id: Uuid::new_v4().to_string(),
        status: "completed",
        urls_checked: urls.len(),
        summary: assembled.summary,
        issues: assembled.issues,
        gsc_used: gsc_token.is_some(),
        gsc_property,
    }))
}

fn parse_site_url(raw: &str) -> Result<Url, ApiError> {
    let parsed = Url::parse(raw)
        .map_err(|_| ApiError::Validation(format!("invalid site_url: {raw}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::Validation(format!(
            "site_url must be http(s), got {}",
            parsed.scheme()
        )));
    }
    Ok(parsed)
}

fn parse_checks(requested: Option<&[String]>) -> Result<Vec<CheckKind>, ApiError> {
    match requested {
        None => Ok(CheckKind::ALL.to_vec()),
        Some([]) => Ok(CheckKind::ALL.to_vec()),
        Some(names) => names
            .iter()
            .map(|name| {
                CheckKind::parse(name)
                    .ok_or_else(|| ApiError::Validation(format!("unknown check: {name}")))
            })
            .collect(),
    }
}

fn origin_of(url: &Url) -> String {
    format!("{}/", url.origin().ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_names_parse_or_reject() {
        let checks = parse_checks(Some(&["mobile".to_string(), "indexing".to_string()])).unwrap();
        assert_eq!(checks, vec![CheckKind::Mobile, CheckKind::Indexing]);

        assert!(parse_checks(Some(&["lighthouse".to_string()])).is_err());
        assert_eq!(parse_checks(None).unwrap().len(), 4);
        assert_eq!(parse_checks(Some(&[])).unwrap().len(), 4);
    }

    #[test]
    fn site_urls_must_be_http() {
        assert!(parse_site_url("https://example.com").is_ok());
        assert!(parse_site_url("ftp://example.com").is_err());
        assert!(parse_site_url("nonsense").is_err());
    }
}
