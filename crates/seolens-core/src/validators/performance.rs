//! Performance validation via the PageSpeed Insights API
//!
//! Maps Core Web Vitals against fixed "good" / "needs improvement"
//! thresholds. The check is optional: without an API key, or on any API or
//! network failure, it contributes zero issues rather than failing the run.
//! Total blocking time stands in for INP, which the lab API does not report.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{IssueDetails, IssueType, RawIssue, Severity};

const PAGESPEED_ENDPOINT: &str = "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";
const PAGESPEED_TIMEOUT: Duration = Duration::from_secs(60);

pub const LCP_GOOD_SECS: f64 = 2.5;
pub const LCP_POOR_SECS: f64 = 4.0;
pub const INP_GOOD_MS: f64 = 200.0;
pub const INP_POOR_MS: f64 = 500.0;
pub const CLS_GOOD: f64 = 0.10;
pub const CLS_POOR: f64 = 0.25;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PagespeedResponse {
    lighthouse_result: Option<LighthouseResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LighthouseResult {
    audits: HashMap<String, Audit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Audit {
    numeric_value: Option<f64>,
}

/// Run the performance check for one URL. `api_key` absent means the
/// feature is disabled.
pub async fn validate(api_key: Option<&str>, url: &str) -> Vec<RawIssue> {
    let Some(key) = api_key else {
        return Vec::new();
    };

    let client = match reqwest::Client::builder().timeout(PAGESPEED_TIMEOUT).build() {
        Ok(client) => client,
        Err(err) => {
            tracing::warn!(error = %err, "failed to build pagespeed client");
            return Vec::new();
        }
    };

    let response = match client
        .get(PAGESPEED_ENDPOINT)
        .query(&[("url", url), ("key", key), ("strategy", "mobile")])
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            tracing::warn!(url, status = %response.status(), "pagespeed API returned an error");
            return Vec::new();
        }
        Err(err) => {
            tracing::warn!(url, error = %err, "pagespeed request failed");
            return Vec::new();
        }
    };

    let parsed: PagespeedResponse = match response.json().await {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(url, error = %err, "unreadable pagespeed response");
            return Vec::new();
        }
    };

    let Some(result) = parsed.lighthouse_result else {
        return Vec::new();
    };

    let metric = |name: &str| result.audits.get(name).and_then(|audit| audit.numeric_value);
    let lcp_secs = metric("largest-contentful-paint").map(|ms| ms / 1000.0);
    let tbt_ms = metric("total-blocking-time");
    let cls = metric("cumulative-layout-shift");

    classify_metrics(url, lcp_secs, tbt_ms, cls)
}

/// Compare each Core Web Vital against its thresholds. Values at the "good"
/// threshold pass; values at the "needs improvement" threshold are not yet
/// poor.
pub fn classify_metrics(
    url: &str,
    lcp_secs: Option<f64>,
    tbt_ms: Option<f64>,
    cls: Option<f64>,
) -> Vec<RawIssue> {
    let mut issues = Vec::new();

    if let Some(lcp) = lcp_secs {
        issues.extend(metric_issue(
            url,
            lcp,
            LCP_GOOD_SECS,
            LCP_POOR_SECS,
            IssueType::NeedsImprovementLcp,
            IssueType::PoorLcp,
            "Largest Contentful Paint",
            "Reduce render-blocking resources and optimize the largest above-the-fold element",
        ));
    }
    if let Some(tbt) = tbt_ms {
        issues.extend(metric_issue(
            url,
            tbt,
            INP_GOOD_MS,
            INP_POOR_MS,
            IssueType::NeedsImprovementInp,
            IssueType::PoorInp,
            "Total Blocking Time",
            "Break up long main-thread tasks and defer non-critical JavaScript",
        ));
    }
    if let Some(cls) = cls {
        issues.extend(metric_issue(
            url,
            cls,
            CLS_GOOD,
            CLS_POOR,
            IssueType::NeedsImprovementCls,
            IssueType::PoorCls,
            "Cumulative Layout Shift",
            "Reserve space for images, ads and embeds so content does not shift while loading",
        ));
    }

    issues
}

#[allow(clippy::too_many_arguments)]
fn metric_issue(
    url: &str,
    value: f64,
    good: f64,
    poor: f64,
    needs_improvement: IssueType,
    poor_type: IssueType,
    metric_name: &str,
    suggested_fix: &str,
) -> Option<RawIssue> {
    let (issue_type, severity, threshold) = if value <= good {
        return None;
    } else if value <= poor {
        (needs_improvement, Severity::Warning, good)
    } else {
        (poor_type, Severity::Error, poor)
    };

    Some(RawIssue {
        url: url.to_string(),
        issue_type,
        severity,
        auto_fixable: false,
        suggested_fix: suggested_fix.to_string(),
        details: IssueDetails {
            field: Some(metric_name.to_string()),
            metric: Some(value),
            threshold: Some(threshold),
            ..Default::default()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/";

    #[test]
    fn lcp_boundaries_are_exact() {
        assert!(classify_metrics(URL, Some(2.5), None, None).is_empty());

        let issues = classify_metrics(URL, Some(2.51), None, None);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::NeedsImprovementLcp);
        assert_eq!(issues[0].severity, Severity::Warning);

        let issues = classify_metrics(URL, Some(4.0), None, None);
        assert_eq!(issues[0].issue_type, IssueType::NeedsImprovementLcp);

        let issues = classify_metrics(URL, Some(4.01), None, None);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::PoorLcp);
        assert_eq!(issues[0].severity, Severity::Error);
    }

    #[test]
    fn inp_proxy_and_cls_thresholds() {
        let issues = classify_metrics(URL, None, Some(199.9), Some(0.10));
        assert!(issues.is_empty());

        let issues = classify_metrics(URL, None, Some(350.0), Some(0.3));
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].issue_type, IssueType::NeedsImprovementInp);
        assert_eq!(issues[1].issue_type, IssueType::PoorCls);
    }

    #[test]
    fn performance_issues_are_never_auto_fixable() {
        let issues = classify_metrics(URL, Some(9.0), Some(900.0), Some(0.9));
        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|issue| !issue.auto_fixable));
        assert!(issues.iter().all(|issue| issue.details.metric.is_some()));
    }

    #[test]
    fn absent_metrics_produce_no_issues() {
        assert!(classify_metrics(URL, None, None, None).is_empty());
    }

    #[tokio::test]
    async fn missing_api_key_disables_the_check() {
        assert!(validate(None, URL).await.is_empty());
    }

    #[test]
    fn pagespeed_response_parses_with_missing_sections() {
        let parsed: PagespeedResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.lighthouse_result.is_none());

        let parsed: PagespeedResponse = serde_json::from_str(
            r#"{
                "lighthouseResult": {
                    "audits": {
                        "largest-contentful-paint": {"numericValue": 3100.0},
                        "total-blocking-time": {"numericValue": 120.0},
                        "cumulative-layout-shift": {"numericValue": 0.05},
                        "speed-index": {"score": 0.9}
                    }
                }
            }"#,
        )
        .unwrap();
        let result = parsed.lighthouse_result.unwrap();
        assert_eq!(
            result.audits["largest-contentful-paint"].numeric_value,
            Some(3100.0)
        );
        assert_eq!(result.audits["speed-index"].numeric_value, None);
    }
}
