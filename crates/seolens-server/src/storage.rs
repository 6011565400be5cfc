//! Storage ports
//!
//! The validator/assembler core never performs I/O; handlers and the
//! scheduler talk to these injected ports instead. Pagination cursors are
//! opaque continuation tokens produced and consumed by the implementation —
//! callers pass them through verbatim.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use seolens_core::types::{
    GoogleTokenRecord, Issue, IssueCategory, IssueStatus, Severity, Site,
};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid cursor")]
    InvalidCursor,

    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub category: Option<IssueCategory>,
    pub severity: Option<Severity>,
}

impl IssueFilter {
    fn matches(&self, issue: &Issue) -> bool {
        self.status.is_none_or(|status| issue.status == status)
            && self.category.is_none_or(|category| issue.category == category)
            && self.severity.is_none_or(|severity| issue.severity == severity)
    }
}

#[derive(Debug, Clone)]
pub struct IssuePage {
    pub issues: Vec<Issue>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn put_issues(&self, site_id: &str, issues: &[Issue]) -> Result<(), StorageError>;

    async fn get(&self, issue_id: &str) -> Result<Option<Issue>, StorageError>;

    /// Update an issue's lifecycle status. Idempotent; errors with
    /// `NotFound` for unknown ids.
    async fn set_status(
        &self,
        issue_id: &str,
        status: IssueStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Issue, StorageError>;

    async fn query(
        &self,
        site_id: &str,
        filter: &IssueFilter,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<IssuePage, StorageError>;

    async fn count_open(&self, site_id: &str) -> Result<usize, StorageError>;
}

#[async_trait]
pub trait SiteStore: Send + Sync {
    async fn upsert(&self, site: &Site) -> Result<(), StorageError>;

    async fn get(&self, site_id: &str) -> Result<Option<Site>, StorageError>;

    async fn list(&self) -> Result<Vec<Site>, StorageError>;

    /// Sites whose `next_check` has passed.
    async fn due_before(&self, now: DateTime<Utc>) -> Result<Vec<Site>, StorageError>;

    /// Record a completed scheduled run.
    async fn record_run(
        &self,
        site_id: &str,
        last_check: DateTime<Utc>,
        next_check: DateTime<Utc>,
        open_issues: usize,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn put_token(&self, site_id: &str, record: &GoogleTokenRecord)
    -> Result<(), StorageError>;

    async fn get_token(&self, site_id: &str) -> Result<Option<GoogleTokenRecord>, StorageError>;

    /// Store a short-lived OAuth CSRF state bound to a site.
    async fn put_oauth_state(
        &self,
        state: &str,
        site_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Consume an OAuth state, returning the bound site id. States are
    /// single-use; expired or unknown states yield `None`.
    async fn take_oauth_state(&self, state: &str) -> Result<Option<String>, StorageError>;
}

/// In-memory store backing all three ports; used by tests and standalone
/// runs. Its cursors are decimal offsets, but that is an implementation
/// detail callers must not rely on.
#[derive(Default)]
pub struct MemStore {
    issues: RwLock<HashMap<String, Vec<Issue>>>,
    issue_sites: RwLock<HashMap<String, String>>,
    sites: RwLock<HashMap<String, Site>>,
    tokens: RwLock<HashMap<String, GoogleTokenRecord>>,
    oauth_states: RwLock<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl IssueStore for MemStore {
    async fn put_issues(&self, site_id: &str, issues: &[Issue]) -> Result<(), StorageError> {
        let mut by_site = self.issues.write().await;
        let mut index = self.issue_sites.write().await;
        let bucket = by_site.entry(site_id.to_string()).or_default();
        for issue in issues {
            index.insert(issue.id.clone(), site_id.to_string());
            bucket.push(issue.clone());
        }
        Ok(())
    }

    async fn get(&self, issue_id: &str) -> Result<Option<Issue>, StorageError> {
        let index = self.issue_sites.read().await;
        let Some(site_id) = index.get(issue_id) else {
            return Ok(None);
        };
        let by_site = self.issues.read().await;
        Ok(by_site
            .get(site_id)
            .and_then(|bucket| bucket.iter().find(|issue| issue.id == issue_id))
            .cloned())
    }

    async fn set_status(
        &self,
        issue_id: &str,
        status: IssueStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Issue, StorageError> {
        let index = self.issue_sites.read().await;
        let site_id = index
            .get(issue_id)
            .ok_or_else(|| StorageError::NotFound(format!("issue {issue_id}")))?;
        let mut by_site = self.issues.write().await;
        let bucket = by_site
            .get_mut(site_id)
            .ok_or_else(|| StorageError::NotFound(format!("issue {issue_id}")))?;
        let issue = bucket
            .iter_mut()
            .find(|issue| issue.id == issue_id)
            .ok_or_else(|| StorageError::NotFound(format!("issue {issue_id}")))?;
        issue.status = status;
        issue.updated_at = updated_at;
        Ok(issue.clone())
    }

    async fn query(
        &self,
        site_id: &str,
        filter: &IssueFilter,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<IssuePage, StorageError> {
        let offset = match cursor {
            Some(token) => token.parse::<usize>().map_err(|_| StorageError::InvalidCursor)?,
            None => 0,
        };

        let by_site = self.issues.read().await;
        let matching: Vec<&Issue> = by_site
            .get(site_id)
            .map(|bucket| bucket.iter().filter(|issue| filter.matches(issue)).collect())
            .unwrap_or_default();

        let issues: Vec<Issue> = matching
            .iter()
            .skip(offset)
            .take(limit)
            .map(|issue| (*issue).clone())
            .collect();

        let next_cursor = if offset + issues.len() < matching.len() {
            Some((offset + issues.len()).to_string())
        } else {
            None
        };

        Ok(IssuePage { issues, next_cursor })
    }

    async fn count_open(&self, site_id: &str) -> Result<usize, StorageError> {
        let by_site = self.issues.read().await;
        Ok(by_site
            .get(site_id)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|issue| issue.status == IssueStatus::Open)
                    .count()
            })
            .unwrap_or(0))
    }
}

#[async_trait]
impl SiteStore for MemStore {
    async fn upsert(&self, site: &Site) -> Result<(), StorageError> {
        self.sites
            .write()
            .await
            .insert(site.site_id.clone(), site.clone());
        Ok(())
    }

    async fn get(&self, site_id: &str) -> Result<Option<Site>, StorageError> {
        Ok(self.sites.read().await.get(site_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Site>, StorageError> {
        let mut sites: Vec<Site> = self.sites.read().await.values().cloned().collect();
        sites.sort_by(|a, b| a.site_id.cmp(&b.site_id));
        Ok(sites)
    }

    async fn due_before(&self, now: DateTime<Utc>) -> Result<Vec<Site>, StorageError> {
        Ok(self
            .sites
            .read()
            .await
            .values()
            .filter(|site| site.next_check <= now)
            .cloned()
            .collect())
    }

    async fn record_run(
        &self,
        site_id: &str,
        last_check: DateTime<Utc>,
        next_check: DateTime<Utc>,
        open_issues: usize,
    ) -> Result<(), StorageError> {
        let mut sites = self.sites.write().await;
        let site = sites
            .get_mut(site_id)
            .ok_or_else(|| StorageError::NotFound(format!("site {site_id}")))?;
        site.last_check = Some(last_check);
        site.next_check = next_check;
        site.open_issues = open_issues;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemStore {
    async fn put_token(
        &self,
        site_id: &str,
        record: &GoogleTokenRecord,
    ) -> Result<(), StorageError> {
        self.tokens
            .write()
            .await
            .insert(site_id.to_string(), record.clone());
        Ok(())
    }

    async fn get_token(&self, site_id: &str) -> Result<Option<GoogleTokenRecord>, StorageError> {
        Ok(self.tokens.read().await.get(site_id).cloned())
    }

    async fn put_oauth_state(
        &self,
        state: &str,
        site_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.oauth_states
            .write()
            .await
            .insert(state.to_string(), (site_id.to_string(), expires_at));
        Ok(())
    }

    async fn take_oauth_state(&self, state: &str) -> Result<Option<String>, StorageError> {
        let mut states = self.oauth_states.write().await;
        Ok(states
            .remove(state)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(site_id, _)| site_id))
    }
}
