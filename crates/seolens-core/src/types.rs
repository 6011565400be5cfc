//! Common types shared by the validators, the result mapper and the assembler

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use url::Url;

/// Category an issue belongs to. Every [`IssueType`] maps to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    StructuredData,
    Indexing,
    Performance,
    Mobile,
}

impl IssueCategory {
    pub const ALL: [IssueCategory; 4] = [
        IssueCategory::StructuredData,
        IssueCategory::Indexing,
        IssueCategory::Performance,
        IssueCategory::Mobile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::StructuredData => "structured_data",
            IssueCategory::Indexing => "indexing",
            IssueCategory::Performance => "performance",
            IssueCategory::Mobile => "mobile",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "structured_data" => Some(IssueCategory::StructuredData),
            "indexing" => Some(IssueCategory::Indexing),
            "performance" => Some(IssueCategory::Performance),
            "mobile" => Some(IssueCategory::Mobile),
            _ => None,
        }
    }
}

/// Closed enumeration of detectable issue types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    // structured data
    MissingSchema,
    SyntaxError,
    MissingRequiredField,
    MissingRecommendedField,
    InvalidFieldValue,
    // indexing
    #[serde(rename = "not_found_404")]
    NotFound404,
    #[serde(rename = "server_error_5xx")]
    ServerError5xx,
    RedirectChain,
    RedirectLoop,
    DuplicateWithoutCanonical,
    ConflictingCanonical,
    NoindexTag,
    BlockedByRobots,
    CrawledNotIndexed,
    // performance
    NeedsImprovementLcp,
    PoorLcp,
    NeedsImprovementInp,
    PoorInp,
    NeedsImprovementCls,
    PoorCls,
    // mobile
    NoViewport,
    ContentWiderThanScreen,
    TextTooSmall,
    TapTargetsTooClose,
}

impl IssueType {
    /// The category this type belongs to. Total by construction.
    pub fn category(&self) -> IssueCategory {
        use IssueType::*;
        match self {
            MissingSchema | SyntaxError | MissingRequiredField | MissingRecommendedField
            | InvalidFieldValue => IssueCategory::StructuredData,
            NotFound404 | ServerError5xx | RedirectChain | RedirectLoop
            | DuplicateWithoutCanonical | ConflictingCanonical | NoindexTag | BlockedByRobots
            | CrawledNotIndexed => IssueCategory::Indexing,
            NeedsImprovementLcp | PoorLcp | NeedsImprovementInp | PoorInp
            | NeedsImprovementCls | PoorCls => IssueCategory::Performance,
            NoViewport | ContentWiderThanScreen | TextTooSmall | TapTargetsTooClose => {
                IssueCategory::Mobile
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "error" => Some(Severity::Error),
            "warning" => Some(Severity::Warning),
            _ => None,
        }
    }
}

/// Lifecycle status of a persisted issue. Defaults to `open` at creation and
/// is only ever changed by an explicit caller update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    Fixing,
    Fixed,
    Wontfix,
}

impl IssueStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(IssueStatus::Open),
            "fixing" => Some(IssueStatus::Fixing),
            "fixed" => Some(IssueStatus::Fixed),
            "wontfix" => Some(IssueStatus::Wontfix),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::Fixing => "fixing",
            IssueStatus::Fixed => "fixed",
            IssueStatus::Wontfix => "wontfix",
        }
    }
}

/// Evidence attached to an issue. Known keys are typed; anything
/// category-specific goes through the flattened `extra` map. Absent keys are
/// omitted from the serialized form entirely, never stored as nulls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hops: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// One detected problem as produced by a validator or the result mapper.
/// Carries no identifier, status or timestamps: those belong to the
/// assembler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawIssue {
    pub url: String,
    pub issue_type: IssueType,
    pub severity: Severity,
    pub auto_fixable: bool,
    pub suggested_fix: String,
    pub details: IssueDetails,
}

impl RawIssue {
    pub fn category(&self) -> IssueCategory {
        self.issue_type.category()
    }
}

/// A fully assembled, persistable issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub url: String,
    pub category: IssueCategory,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub status: IssueStatus,
    pub auto_fixable: bool,
    pub suggested_fix: String,
    #[serde(default)]
    pub details: IssueDetails,
    pub detected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub error: usize,
    pub warning: usize,
}

/// Per-category issue counts, always carrying all four categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub structured_data: usize,
    pub indexing: usize,
    pub performance: usize,
    pub mobile: usize,
}

impl CategoryCounts {
    pub fn bump(&mut self, category: IssueCategory) {
        match category {
            IssueCategory::StructuredData => self.structured_data += 1,
            IssueCategory::Indexing => self.indexing += 1,
            IssueCategory::Performance => self.performance += 1,
            IssueCategory::Mobile => self.mobile += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_issues: usize,
    pub by_severity: SeverityCounts,
    pub by_category: CategoryCounts,
}

/// How often a registered site is re-validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckSchedule {
    Daily,
    Weekly,
    Manual,
}

impl CheckSchedule {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(CheckSchedule::Daily),
            "weekly" => Some(CheckSchedule::Weekly),
            "manual" => Some(CheckSchedule::Manual),
            _ => None,
        }
    }

    /// Next due time computed from `now`. `manual` never comes due on its
    /// own; a concrete far-future instant keeps due-site scans a plain
    /// timestamp comparison.
    pub fn next_check_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            CheckSchedule::Daily => now + Duration::hours(24),
            CheckSchedule::Weekly => now + Duration::days(7),
            CheckSchedule::Manual => now + Duration::days(36_500),
        }
    }
}

/// A site registered for scheduled monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub site_id: String,
    pub site_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sitemap_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gsc_property: Option<String>,
    pub check_schedule: CheckSchedule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_webhook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
    pub next_check: DateTime<Utc>,
    pub open_issues: usize,
    pub created_at: DateTime<Utc>,
}

/// Stored Google OAuth credential for one site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleTokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl GoogleTokenRecord {
    /// Expired (with a 60s skew margin) relative to `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(60) <= now
    }
}

/// The checks a validation request can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    StructuredData,
    Indexing,
    Performance,
    Mobile,
}

impl CheckKind {
    pub const ALL: [CheckKind; 4] = [
        CheckKind::StructuredData,
        CheckKind::Indexing,
        CheckKind::Performance,
        CheckKind::Mobile,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "structured_data" => Some(CheckKind::StructuredData),
            "indexing" => Some(CheckKind::Indexing),
            "performance" => Some(CheckKind::Performance),
            "mobile" => Some(CheckKind::Mobile),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::StructuredData => "structured_data",
            CheckKind::Indexing => "indexing",
            CheckKind::Performance => "performance",
            CheckKind::Mobile => "mobile",
        }
    }
}

/// Derive the partition key joining sites and issues from a site URL:
/// the hostname, lowercased, with a leading `www.` stripped. Scheme, port,
/// path and query are ignored.
pub fn extract_site_id(site_url: &str) -> Option<String> {
    let parsed = Url::parse(site_url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}
