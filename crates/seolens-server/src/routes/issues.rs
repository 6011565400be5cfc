//! Issue browsing and lifecycle updates

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use seolens_core::types::{Issue, IssueCategory, IssueStatus, Severity};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::storage::IssueFilter;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub struct IssueQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub severity: Option<String>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IssueListResponse {
    pub site_id: String,
    pub returned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub issues: Vec<Issue>,
}

pub async fn list_site_issues(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    Query(query): Query<IssueQuery>,
) -> Result<Json<IssueListResponse>, ApiError> {
    if state.sites.get(&site_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("unknown site: {site_id}")));
    }

    let filter = IssueFilter {
        status: parse_filter(query.status.as_deref(), IssueStatus::parse, "status")?,
        category: parse_filter(query.category.as_deref(), IssueCategory::parse, "category")?,
        severity: parse_filter(query.severity.as_deref(), Severity::parse, "severity")?,
    };

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }

    let page = state
        .issues
        .query(&site_id, &filter, limit, query.cursor.as_deref())
        .await?;

    Ok(Json(IssueListResponse {
        site_id,
        returned: page.issues.len(),
        next_cursor: page.next_cursor,
        issues: page.issues,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateIssueRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateIssueResponse {
    pub id: String,
    pub status: IssueStatus,
    pub updated_at: DateTime<Utc>,
}

pub async fn update_issue_status(
    State(state): State<AppState>,
    Path(issue_id): Path<String>,
    Json(request): Json<UpdateIssueRequest>,
) -> Result<Json<UpdateIssueResponse>, ApiError> {
    let status = IssueStatus::parse(&request.status).ok_or_else(|| {
        ApiError::Validation(format!(
            "unknown status '{}', expected one of open, fixing, fixed, wontfix",
            request.status
        ))
    })?;

    let updated = state
        .issues
        .set_status(&issue_id, status, Utc::now())
        .await?;

    Ok(Json(UpdateIssueResponse {
        id: updated.id,
        status: updated.status,
        updated_at: updated.updated_at,
    }))
}

fn parse_filter<T>(
    raw: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
    name: &str,
) -> Result<Option<T>, ApiError> {
    match raw {
        None => Ok(None),
        Some(value) => parse(value)
            .map(Some)
            .ok_or_else(|| ApiError::Validation(format!("unknown {name}: {value}"))),
    }
}
