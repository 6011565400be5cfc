//! Mobile usability validation
//!
//! Fetches with a mobile user agent and applies viewport checks plus
//! pattern scans over raw HTML. The scans are heuristics over inline style
//! attributes, not a layout engine: they trade false positives/negatives for
//! not needing a browser, and each pattern reports at most once per page.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::fetch::Fetch;
use crate::types::{IssueDetails, IssueType, RawIssue, Severity};

/// Inline widths at or above this many pixels suggest fixed-width content.
const WIDE_CONTENT_PX: f64 = 1000.0;

/// Minimum legible font size in CSS pixels.
const MIN_FONT_PX: f64 = 12.0;

/// Minimum tap target edge in CSS pixels.
const MIN_TAP_TARGET_PX: f64 = 44.0;

/// Points to pixels.
const PT_TO_PX: f64 = 1.333;

static STYLE_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)style\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("invalid style regex")
});
static WIDTH_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[\s;])width\s*:\s*(\d+(?:\.\d+)?)px").expect("invalid width regex"));
static HEIGHT_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[\s;])height\s*:\s*(\d+(?:\.\d+)?)px").expect("invalid height regex"));
static FONT_SIZE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)font-size\s*:\s*(\d+(?:\.\d+)?)(px|pt)").expect("invalid font-size regex")
});

/// Fetch a URL with a mobile user agent and run the mobile checks.
pub async fn validate(fetcher: &dyn Fetch, url: &str) -> Vec<RawIssue> {
    let page = match fetcher.get_mobile(url).await {
        Ok(page) if page.is_success() => page,
        Ok(page) => {
            tracing::debug!(url, status = page.status, "skipping mobile checks");
            return Vec::new();
        }
        Err(err) => {
            tracing::debug!(url, error = %err, "mobile fetch failed");
            return Vec::new();
        }
    };
    check_html(url, &page.body)
}

/// Run all mobile checks against already-fetched HTML.
pub fn check_html(url: &str, html: &str) -> Vec<RawIssue> {
    let mut issues = Vec::new();

    let document = Html::parse_document(html);
    let viewport_selector = Selector::parse("meta[name='viewport']").expect("valid selector");
    let viewport = document
        .select(&viewport_selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(|content| content.to_ascii_lowercase());

    match viewport {
        None => issues.push(no_viewport_issue(url, None)),
        Some(content) => {
            if !content.contains("width=") {
                issues.push(no_viewport_issue(url, Some(&content)));
            }
            if content.contains("user-scalable=no") || content.contains("user-scalable=0") {
                // Disabled zoom is flagged as a usability concern, not a
                // hard block.
                issues.push(RawIssue {
                    url: url.to_string(),
                    issue_type: IssueType::ContentWiderThanScreen,
                    severity: Severity::Warning,
                    auto_fixable: true,
                    suggested_fix: "Remove 'user-scalable=no' so visitors can zoom the page"
                        .to_string(),
                    details: IssueDetails {
                        value: Some(content.clone()),
                        ..Default::default()
                    },
                });
            }
        }
    }

    issues.extend(scan_inline_styles(url, html));
    issues
}

/// One pass over every inline `style` attribute; each pattern fires at most
/// once per page.
fn scan_inline_styles(url: &str, html: &str) -> Vec<RawIssue> {
    let mut issues = Vec::new();
    let mut wide_reported = false;
    let mut font_reported = false;
    let mut tap_reported = false;

    for captures in STYLE_ATTR.captures_iter(html) {
        let declaration = captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();

        let width = WIDTH_DECL
            .captures(declaration)
            .and_then(|c| c[1].parse::<f64>().ok());
        let height = HEIGHT_DECL
            .captures(declaration)
            .and_then(|c| c[1].parse::<f64>().ok());

        if !wide_reported
            && let Some(width) = width
            && width >= WIDE_CONTENT_PX
        {
            wide_reported = true;
            issues.push(RawIssue {
                url: url.to_string(),
                issue_type: IssueType::ContentWiderThanScreen,
                severity: Severity::Warning,
                auto_fixable: true,
                suggested_fix: "Replace fixed pixel widths with responsive units such as max-width or percentages"
                    .to_string(),
                details: IssueDetails {
                    actual: Some(format!("{width}px")),
                    threshold: Some(WIDE_CONTENT_PX),
                    ..Default::default()
                },
            });
        }

        if !font_reported
            && let Some(captures) = FONT_SIZE_DECL.captures(declaration)
        {
            let size: f64 = captures[1].parse().unwrap_or(MIN_FONT_PX);
            let px = if captures[2].eq_ignore_ascii_case("pt") {
                size * PT_TO_PX
            } else {
                size
            };
            if px < MIN_FONT_PX {
                font_reported = true;
                issues.push(RawIssue {
                    url: url.to_string(),
                    issue_type: IssueType::TextTooSmall,
                    severity: Severity::Warning,
                    auto_fixable: false,
                    suggested_fix: "Use a base font size of at least 12px for body text".to_string(),
                    details: IssueDetails {
                        actual: Some(format!("{px:.1}px")),
                        threshold: Some(MIN_FONT_PX),
                        ..Default::default()
                    },
                });
            }
        }

        if !tap_reported
            && let (Some(width), Some(height)) = (width, height)
            && width < MIN_TAP_TARGET_PX
            && height < MIN_TAP_TARGET_PX
        {
            tap_reported = true;
            issues.push(RawIssue {
                url: url.to_string(),
                issue_type: IssueType::TapTargetsTooClose,
                severity: Severity::Warning,
                auto_fixable: false,
                suggested_fix: "Make tappable elements at least 44x44 CSS pixels".to_string(),
                details: IssueDetails {
                    actual: Some(format!("{width}x{height}px")),
                    threshold: Some(MIN_TAP_TARGET_PX),
                    ..Default::default()
                },
            });
        }
    }

    issues
}

fn no_viewport_issue(url: &str, content: Option<&str>) -> RawIssue {
    RawIssue {
        url: url.to_string(),
        issue_type: IssueType::NoViewport,
        severity: Severity::Error,
        auto_fixable: true,
        suggested_fix:
            "Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"> to the page head"
                .to_string(),
        details: IssueDetails {
            actual: content.map(str::to_string),
            ..Default::default()
        },
    }
}
