//! Google OAuth client for Search Console access
//!
//! Handles the consent URL, the code-for-token exchange and refreshing
//! expired access tokens. Refreshing updates the access token and expiry in
//! place and always preserves the stored refresh token, because Google only
//! issues one on the initial consent.

use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use seolens_core::types::GoogleTokenRecord;
use serde::Deserialize;

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

pub const GSC_SCOPE: &str = "https://www.googleapis.com/auth/webmasters.readonly";

#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Consent URL the browser is redirected to. `access_type=offline` plus
/// `prompt=consent` is what makes Google return a refresh token.
pub fn consent_url(config: &GoogleOAuthConfig, state: &str) -> String {
    format!(
        "{AUTH_ENDPOINT}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(GSC_SCOPE),
        urlencoding::encode(state),
    )
}

/// Exchange an authorization code for a token record.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &GoogleOAuthConfig,
    code: &str,
) -> Result<GoogleTokenRecord> {
    let response = client
        .post(TOKEN_ENDPOINT)
        .form(&[
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
        ])
        .send()
        .await
        .context("token exchange request failed")?;

    if !response.status().is_success() {
        bail!("token exchange returned {}", response.status());
    }

    let token: TokenResponse = response
        .json()
        .await
        .context("unreadable token exchange response")?;
    let refresh_token = token
        .refresh_token
        .context("token exchange response carried no refresh token")?;

    Ok(GoogleTokenRecord {
        access_token: token.access_token,
        refresh_token,
        scope: token.scope,
        expires_at: expiry_from_now(token.expires_in),
    })
}

/// Refresh an expired access token. The refresh token is carried over from
/// the existing record.
pub async fn refresh(
    client: &reqwest::Client,
    config: &GoogleOAuthConfig,
    record: &GoogleTokenRecord,
) -> Result<GoogleTokenRecord> {
    let response = client
        .post(TOKEN_ENDPOINT)
        .form(&[
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", record.refresh_token.as_str()),
        ])
        .send()
        .await
        .context("token refresh request failed")?;

    if !response.status().is_success() {
        bail!("token refresh returned {}", response.status());
    }

    let token: TokenResponse = response
        .json()
        .await
        .context("unreadable token refresh response")?;

    Ok(GoogleTokenRecord {
        access_token: token.access_token,
        refresh_token: record.refresh_token.clone(),
        scope: token.scope.or_else(|| record.scope.clone()),
        expires_at: expiry_from_now(token.expires_in),
    })
}

fn expiry_from_now(expires_in: Option<i64>) -> chrono::DateTime<Utc> {
    Utc::now() + Duration::seconds(expires_in.unwrap_or(3600))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consent_url_carries_state_and_scope() {
        let config = GoogleOAuthConfig {
            client_id: "client-1".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "https://api.example.com/auth/google/callback".to_string(),
        };
        let url = consent_url(&config, "csrf-token");
        assert!(url.starts_with(AUTH_ENDPOINT));
        assert!(url.contains("state=csrf-token"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains(&urlencoding::encode(GSC_SCOPE).into_owned()));
        assert!(url.contains(&urlencoding::encode(&config.redirect_uri).into_owned()));
    }

    #[test]
    fn token_response_tolerates_missing_fields() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(token.access_token, "abc");
        assert!(token.refresh_token.is_none());
        assert!(token.expires_in.is_none());
    }
}
