//! Google OAuth endpoints
//!
//! `GET /auth/google` stores a short-lived CSRF state bound to the site and
//! redirects to the consent screen; the callback consumes that state,
//! exchanges the code and persists the credential for the site.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::Redirect;
use chrono::{Duration, Utc};
use seolens_core::extract_site_id;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use crate::oauth;

const STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct BeginQuery {
    pub site_id: Option<String>,
    pub site_url: Option<String>,
}

pub async fn begin(
    State(state): State<AppState>,
    Query(query): Query<BeginQuery>,
) -> Result<Redirect, ApiError> {
    let config = state
        .config
        .google_oauth
        .as_ref()
        .ok_or_else(|| ApiError::NotConnected("Google OAuth is not configured".to_string()))?;

    let site_id = match (query.site_id, query.site_url) {
        (Some(site_id), _) => site_id,
        (None, Some(site_url)) => extract_site_id(&site_url)
            .ok_or_else(|| ApiError::Validation(format!("invalid site_url: {site_url}")))?,
        (None, None) => {
            return Err(ApiError::Validation(
                "site_id or site_url query parameter required".to_string(),
            ));
        }
    };

    let csrf_state = Uuid::new_v4().to_string();
    state
        .tokens
        .put_oauth_state(
            &csrf_state,
            &site_id,
            Utc::now() + Duration::minutes(STATE_TTL_MINUTES),
        )
        .await?;

    Ok(Redirect::temporary(&oauth::consent_url(config, &csrf_state)))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub connected: bool,
    pub site_id: String,
}

pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CallbackResponse>, ApiError> {
    if let Some(error) = query.error {
        return Err(ApiError::Unauthorized(format!("consent denied: {error}")));
    }

    let config = state
        .config
        .google_oauth
        .as_ref()
        .ok_or_else(|| ApiError::NotConnected("Google OAuth is not configured".to_string()))?;

    let csrf_state = query
        .state
        .ok_or_else(|| ApiError::Validation("missing state parameter".to_string()))?;
    let code = query
        .code
        .ok_or_else(|| ApiError::Validation("missing code parameter".to_string()))?;

    let site_id = state
        .tokens
        .take_oauth_state(&csrf_state)
        .await?
        .ok_or_else(|| ApiError::Validation("unknown or expired oauth state".to_string()))?;

    let record = oauth::exchange_code(&state.http, config, &code)
        .await
        .map_err(|err| {
            tracing::warn!(%site_id, error = %err, "oauth code exchange failed");
            ApiError::Unauthorized("authorization code exchange failed".to_string())
        })?;
    state.tokens.put_token(&site_id, &record).await?;

    Ok(Json(CallbackResponse {
        connected: true,
        site_id,
    }))
}
