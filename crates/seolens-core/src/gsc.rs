//! Search Console URL Inspection result mapping
//!
//! Normalizes Google's URL Inspection API payload into the same issue shape
//! the local validators produce, tagged with `source: "gsc"` in the details.
//! The index-status and rich-results classifications are ordered keyword
//! tables over free-text fields; a wording change upstream can silently
//! shift classifications, which is why the rules live in one table per
//! concern instead of being spread through the code.

use serde::{Deserialize, Serialize};

use crate::types::{IssueDetails, IssueType, RawIssue, Severity};

/// Subset of the URL Inspection API response this system consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UrlInspectionResult {
    pub index_status_result: Option<IndexStatusResult>,
    pub mobile_usability_result: Option<MobileUsabilityResult>,
    pub rich_results_result: Option<RichResultsResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexStatusResult {
    pub verdict: Option<String>,
    pub coverage_state: Option<String>,
    pub robots_txt_state: Option<String>,
    pub indexing_state: Option<String>,
    pub last_crawl_time: Option<String>,
    pub google_canonical: Option<String>,
    pub user_canonical: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MobileUsabilityResult {
    pub verdict: Option<String>,
    pub issues: Vec<MobileUsabilityIssue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MobileUsabilityIssue {
    pub issue_type: Option<String>,
    pub severity: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RichResultsResult {
    pub verdict: Option<String>,
    pub detected_items: Vec<DetectedItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectedItem {
    pub rich_result_type: Option<String>,
    pub items: Vec<RichResultItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RichResultItem {
    pub name: Option<String>,
    pub issues: Vec<RichResultIssue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RichResultIssue {
    pub issue_message: Option<String>,
    pub severity: Option<String>,
}

/// Ordered substring rules over the lowercased coverage state; first match
/// wins.
const COVERAGE_RULES: &[(&[&str], IssueType, Severity, bool, &str)] = &[
    (
        &["noindex"],
        IssueType::NoindexTag,
        Severity::Warning,
        false,
        "Remove the noindex directive if this page should appear in search results",
    ),
    (
        &["blocked"],
        IssueType::BlockedByRobots,
        Severity::Error,
        true,
        "Allow crawling of this URL in robots.txt",
    ),
    (
        &["not found", "404"],
        IssueType::NotFound404,
        Severity::Error,
        false,
        "Restore the page or redirect the URL to a live replacement",
    ),
    (
        &["server error", "5xx"],
        IssueType::ServerError5xx,
        Severity::Error,
        false,
        "Investigate the server error preventing this page from being crawled",
    ),
    (
        &["redirect"],
        IssueType::RedirectChain,
        Severity::Warning,
        true,
        "Link directly to the final destination instead of chaining redirects",
    ),
];

/// Normalize one inspection result into raw issues.
pub fn map_inspection(url: &str, result: &UrlInspectionResult) -> Vec<RawIssue> {
    let mut issues = Vec::new();

    if let Some(index_status) = &result.index_status_result {
        map_index_status(url, index_status, &mut issues);
    }
    if let Some(mobile) = &result.mobile_usability_result {
        map_mobile_usability(url, mobile, &mut issues);
    }
    if let Some(rich_results) = &result.rich_results_result {
        map_rich_results(url, rich_results, &mut issues);
    }

    issues
}

fn map_index_status(url: &str, status: &IndexStatusResult, issues: &mut Vec<RawIssue>) {
    let verdict_failed = status
        .verdict
        .as_deref()
        .is_some_and(|verdict| verdict.eq_ignore_ascii_case("FAIL"));

    if let Some(coverage_state) = status.coverage_state.as_deref() {
        let lowered = coverage_state.to_ascii_lowercase();
        let matched = COVERAGE_RULES.iter().find(|(keywords, ..)| {
            keywords.iter().any(|keyword| lowered.contains(keyword))
        });

        if let Some((_, issue_type, severity, auto_fixable, suggested_fix)) = matched {
            issues.push(RawIssue {
                url: url.to_string(),
                issue_type: *issue_type,
                severity: *severity,
                auto_fixable: *auto_fixable,
                suggested_fix: (*suggested_fix).to_string(),
                details: gsc_details(|details| {
                    details
                        .extra
                        .insert("coverage_state".to_string(), coverage_state.into());
                }),
            });
        } else if verdict_failed {
            issues.push(RawIssue {
                url: url.to_string(),
                issue_type: IssueType::CrawledNotIndexed,
                severity: Severity::Error,
                auto_fixable: false,
                suggested_fix:
                    "Improve the page's content quality and internal linking so Google indexes it"
                        .to_string(),
                details: gsc_details(|details| {
                    details
                        .extra
                        .insert("coverage_state".to_string(), coverage_state.into());
                }),
            });
        }
    }

    match (&status.google_canonical, &status.user_canonical) {
        (Some(google), Some(user)) if google != user => issues.push(RawIssue {
            url: url.to_string(),
            issue_type: IssueType::ConflictingCanonical,
            severity: Severity::Warning,
            auto_fixable: true,
            suggested_fix: "Align the declared canonical with the URL Google selected".to_string(),
            details: gsc_details(|details| {
                details.expected = Some(user.clone());
                details.actual = Some(google.clone());
            }),
        }),
        (_, user) if user.as_deref().map_or(true, str::is_empty) => {
            let verdict_passed = status
                .verdict
                .as_deref()
                .is_some_and(|verdict| verdict.eq_ignore_ascii_case("PASS"));
            if !verdict_passed {
                issues.push(RawIssue {
                    url: url.to_string(),
                    issue_type: IssueType::DuplicateWithoutCanonical,
                    severity: Severity::Warning,
                    auto_fixable: true,
                    suggested_fix: "Declare a canonical URL for this page".to_string(),
                    details: gsc_details(|_| {}),
                });
            }
        }
        _ => {}
    }
}

/// Fixed lookup from GSC mobile usability issue types to local mobile issue
/// types. Unrecognized types fall back to `no_viewport` — an approximation,
/// not a semantic claim.
fn map_mobile_issue_type(gsc_type: &str) -> IssueType {
    match gsc_type {
        "CONFIGURE_VIEWPORT" => IssueType::NoViewport,
        "FIXED_WIDTH_VIEWPORT" | "SIZE_CONTENT_TO_VIEWPORT" => IssueType::ContentWiderThanScreen,
        "USE_LEGIBLE_FONT_SIZES" => IssueType::TextTooSmall,
        "TAP_TARGETS_TOO_CLOSE" => IssueType::TapTargetsTooClose,
        _ => IssueType::NoViewport,
    }
}

fn map_mobile_usability(url: &str, mobile: &MobileUsabilityResult, issues: &mut Vec<RawIssue>) {
    for entry in &mobile.issues {
        let gsc_type = entry.issue_type.as_deref().unwrap_or("");
        let issue_type = map_mobile_issue_type(gsc_type);
        let severity = match entry.severity.as_deref() {
            Some(severity) if severity.eq_ignore_ascii_case("WARNING") => Severity::Warning,
            _ => Severity::Error,
        };
        issues.push(RawIssue {
            url: url.to_string(),
            issue_type,
            severity,
            auto_fixable: matches!(
                issue_type,
                IssueType::NoViewport | IssueType::ContentWiderThanScreen
            ),
            suggested_fix: entry
                .message
                .clone()
                .unwrap_or_else(|| "Fix the reported mobile usability problem".to_string()),
            details: gsc_details(|details| {
                details.value = Some(gsc_type.to_string());
            }),
        });
    }
}

fn map_rich_results(url: &str, rich_results: &RichResultsResult, issues: &mut Vec<RawIssue>) {
    for detected in &rich_results.detected_items {
        for item in &detected.items {
            for issue in &item.issues {
                let message = issue.issue_message.clone().unwrap_or_default();
                let lowered = message.to_ascii_lowercase();
                // GSC exposes no structured field name, so classify by the
                // message wording.
                let (issue_type, severity) = if lowered.contains("missing") {
                    (IssueType::MissingRequiredField, Severity::Error)
                } else if lowered.contains("invalid") {
                    (IssueType::InvalidFieldValue, Severity::Error)
                } else {
                    (IssueType::MissingRecommendedField, Severity::Warning)
                };
                issues.push(RawIssue {
                    url: url.to_string(),
                    issue_type,
                    severity,
                    auto_fixable: true,
                    suggested_fix: if message.is_empty() {
                        "Fix the reported rich result problem".to_string()
                    } else {
                        message.clone()
                    },
                    details: gsc_details(|details| {
                        details.schema_type = detected.rich_result_type.clone();
                        if !message.is_empty() {
                            details.value = Some(message.clone());
                        }
                    }),
                });
            }
        }
    }
}

fn gsc_details(build: impl FnOnce(&mut IssueDetails)) -> IssueDetails {
    let mut details = IssueDetails {
        source: Some("gsc".to_string()),
        ..Default::default()
    };
    build(&mut details);
    details
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/page";

    fn index_status(coverage: &str, verdict: &str) -> UrlInspectionResult {
        UrlInspectionResult {
            index_status_result: Some(IndexStatusResult {
                verdict: Some(verdict.to_string()),
                coverage_state: Some(coverage.to_string()),
                user_canonical: Some(URL.to_string()),
                google_canonical: Some(URL.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn coverage_keywords_match_in_priority_order() {
        let cases = [
            ("Excluded by 'noindex' tag", IssueType::NoindexTag),
            ("Blocked by robots.txt", IssueType::BlockedByRobots),
            ("Not found (404)", IssueType::NotFound404),
            ("Server error (5xx)", IssueType::ServerError5xx),
            ("Page with redirect", IssueType::RedirectChain),
        ];
        for (coverage, expected) in cases {
            let issues = map_inspection(URL, &index_status(coverage, "FAIL"));
            assert_eq!(issues.len(), 1, "{coverage}");
            assert_eq!(issues[0].issue_type, expected, "{coverage}");
            assert_eq!(issues[0].details.source.as_deref(), Some("gsc"));
        }
    }

    #[test]
    fn noindex_outranks_blocked_when_both_appear() {
        let issues = map_inspection(
            URL,
            &index_status("Blocked due to 'noindex' tag", "FAIL"),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::NoindexTag);
    }

    #[test]
    fn unmatched_failing_coverage_becomes_crawled_not_indexed() {
        let issues = map_inspection(
            URL,
            &index_status("Crawled - currently not indexed", "FAIL"),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::CrawledNotIndexed);
        assert_eq!(
            issues[0].details.extra["coverage_state"],
            "Crawled - currently not indexed"
        );
    }

    #[test]
    fn passing_unmatched_coverage_yields_nothing() {
        let issues = map_inspection(URL, &index_status("Submitted and indexed", "PASS"));
        assert!(issues.is_empty());
    }

    #[test]
    fn canonical_mismatch_is_a_warning() {
        let result = UrlInspectionResult {
            index_status_result: Some(IndexStatusResult {
                verdict: Some("PASS".to_string()),
                coverage_state: Some("Submitted and indexed".to_string()),
                user_canonical: Some(URL.to_string()),
                google_canonical: Some("https://example.com/other".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let issues = map_inspection(URL, &result);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::ConflictingCanonical);
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn undeclared_canonical_without_pass_verdict() {
        let result = UrlInspectionResult {
            index_status_result: Some(IndexStatusResult {
                verdict: Some("NEUTRAL".to_string()),
                coverage_state: Some("Discovered - currently not indexed".to_string()),
                user_canonical: None,
                google_canonical: Some(URL.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let issues = map_inspection(URL, &result);
        assert!(
            issues
                .iter()
                .any(|issue| issue.issue_type == IssueType::DuplicateWithoutCanonical
                    && issue.severity == Severity::Warning)
        );
    }

    #[test]
    fn mobile_issue_types_map_through_the_fixed_table() {
        let result = UrlInspectionResult {
            mobile_usability_result: Some(MobileUsabilityResult {
                verdict: Some("FAIL".to_string()),
                issues: vec![
                    MobileUsabilityIssue {
                        issue_type: Some("USE_LEGIBLE_FONT_SIZES".to_string()),
                        severity: Some("ERROR".to_string()),
                        message: Some("Text too small to read".to_string()),
                    },
                    MobileUsabilityIssue {
                        issue_type: Some("SOMETHING_NEW".to_string()),
                        severity: Some("WARNING".to_string()),
                        message: None,
                    },
                ],
            }),
            ..Default::default()
        };
        let issues = map_inspection(URL, &result);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].issue_type, IssueType::TextTooSmall);
        assert_eq!(issues[0].severity, Severity::Error);
        // Unknown types fall back to no_viewport.
        assert_eq!(issues[1].issue_type, IssueType::NoViewport);
        assert_eq!(issues[1].severity, Severity::Warning);
    }

    #[test]
    fn rich_result_messages_are_keyword_classified() {
        let result = UrlInspectionResult {
            rich_results_result: Some(RichResultsResult {
                verdict: Some("FAIL".to_string()),
                detected_items: vec![DetectedItem {
                    rich_result_type: Some("Product snippets".to_string()),
                    items: vec![RichResultItem {
                        name: Some("Widget".to_string()),
                        issues: vec![
                            RichResultIssue {
                                issue_message: Some("Missing field 'image'".to_string()),
                                severity: Some("ERROR".to_string()),
                            },
                            RichResultIssue {
                                issue_message: Some("Invalid value in field 'price'".to_string()),
                                severity: Some("ERROR".to_string()),
                            },
                            RichResultIssue {
                                issue_message: Some("Either 'offers' or 'review' should be specified".to_string()),
                                severity: Some("WARNING".to_string()),
                            },
                        ],
                    }],
                }],
            }),
            ..Default::default()
        };
        let issues = map_inspection(URL, &result);
        assert_eq!(issues.len(), 3);
        assert_eq!(issues[0].issue_type, IssueType::MissingRequiredField);
        assert_eq!(issues[1].issue_type, IssueType::InvalidFieldValue);
        assert_eq!(issues[2].issue_type, IssueType::MissingRecommendedField);
        assert_eq!(
            issues[0].details.schema_type.as_deref(),
            Some("Product snippets")
        );
    }

    #[test]
    fn inspection_payload_deserializes_from_camel_case() {
        let result: UrlInspectionResult = serde_json::from_str(
            r#"{
                "indexStatusResult": {
                    "verdict": "PASS",
                    "coverageState": "Submitted and indexed",
                    "googleCanonical": "https://example.com/",
                    "userCanonical": "https://example.com/"
                },
                "mobileUsabilityResult": {"verdict": "PASS", "issues": []}
            }"#,
        )
        .unwrap();
        assert_eq!(
            result
                .index_status_result
                .unwrap()
                .coverage_state
                .as_deref(),
            Some("Submitted and indexed")
        );
    }
}
