//! Issue assembly
//!
//! The single place where raw validator output becomes persistable issues:
//! identifiers are assigned here, lifecycle status defaults to `open` here,
//! and the summary counts are computed here. Validators and the result
//! mapper never see any of this.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{Issue, IssueStatus, RawIssue, Severity, ValidationSummary};

#[derive(Debug, Clone)]
pub struct AssembledValidation {
    pub issues: Vec<Issue>,
    pub summary: ValidationSummary,
}

/// Assemble raw issues with fresh identifiers and `detected_at = now`.
pub fn assemble(raw: Vec<RawIssue>) -> AssembledValidation {
    assemble_at(raw, Utc::now())
}

pub fn assemble_at(raw: Vec<RawIssue>, now: DateTime<Utc>) -> AssembledValidation {
    let issues: Vec<Issue> = raw
        .into_iter()
        .map(|issue| Issue {
            id: Uuid::new_v4().to_string(),
            category: issue.issue_type.category(),
            url: issue.url,
            issue_type: issue.issue_type,
            severity: issue.severity,
            status: IssueStatus::Open,
            auto_fixable: issue.auto_fixable,
            suggested_fix: issue.suggested_fix,
            details: issue.details,
            detected_at: now,
            updated_at: now,
        })
        .collect();

    let summary = summarize(&issues);
    AssembledValidation { issues, summary }
}

/// Count issues by severity and category; categories with no issues stay
/// present with a zero count.
pub fn summarize(issues: &[Issue]) -> ValidationSummary {
    let mut summary = ValidationSummary::default();
    for issue in issues {
        summary.total_issues += 1;
        match issue.severity {
            Severity::Error => summary.by_severity.error += 1,
            Severity::Warning => summary.by_severity.warning += 1,
        }
        summary.by_category.bump(issue.category);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IssueDetails, IssueType};
    use std::collections::HashSet;

    fn raw(issue_type: IssueType, severity: Severity) -> RawIssue {
        RawIssue {
            url: "https://example.com/".to_string(),
            issue_type,
            severity,
            auto_fixable: false,
            suggested_fix: "fix it".to_string(),
            details: IssueDetails::default(),
        }
    }

    #[test]
    fn ids_are_unique_and_status_defaults_to_open() {
        let assembled = assemble(vec![
            raw(IssueType::MissingSchema, Severity::Error),
            raw(IssueType::NoViewport, Severity::Error),
            raw(IssueType::RedirectChain, Severity::Warning),
        ]);
        let ids: HashSet<_> = assembled.issues.iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert!(
            assembled
                .issues
                .iter()
                .all(|issue| issue.status == IssueStatus::Open)
        );
        assert!(
            assembled
                .issues
                .iter()
                .all(|issue| issue.detected_at == issue.updated_at)
        );
    }

    #[test]
    fn summary_is_zero_filled_across_categories() {
        let assembled = assemble(vec![
            raw(IssueType::MissingSchema, Severity::Error),
            raw(IssueType::NoViewport, Severity::Error),
            raw(IssueType::TextTooSmall, Severity::Warning),
        ]);
        let summary = assembled.summary;
        assert_eq!(summary.total_issues, 3);
        assert_eq!(summary.by_severity.error, 2);
        assert_eq!(summary.by_severity.warning, 1);
        assert_eq!(summary.by_category.structured_data, 1);
        assert_eq!(summary.by_category.mobile, 2);
        assert_eq!(summary.by_category.indexing, 0);
        assert_eq!(summary.by_category.performance, 0);

        let rendered = serde_json::to_value(summary).unwrap();
        assert_eq!(rendered["by_category"]["performance"], 0);
    }

    #[test]
    fn empty_input_assembles_to_empty_summary() {
        let assembled = assemble(Vec::new());
        assert!(assembled.issues.is_empty());
        assert_eq!(assembled.summary, ValidationSummary::default());
    }

    #[test]
    fn category_is_derived_from_the_type() {
        let assembled = assemble(vec![raw(IssueType::PoorLcp, Severity::Error)]);
        assert_eq!(
            assembled.issues[0].category,
            crate::types::IssueCategory::Performance
        );
    }
}
