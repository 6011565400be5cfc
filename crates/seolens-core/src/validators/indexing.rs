//! Indexing validation
//!
//! Walks redirect chains by hand (redirects are not auto-followed here, so
//! chains and loops stay observable), then inspects the final response for
//! terminal status codes, canonical correctness, noindex signals and — for
//! site roots — a robots.txt blanket block.

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

use crate::fetch::{Fetch, FetchedPage};
use crate::types::{IssueDetails, IssueType, RawIssue, Severity};

const MAX_REDIRECT_HOPS: u32 = 10;

/// Fetch a URL and run every indexing check against it.
pub async fn validate(fetcher: &dyn Fetch, url: &str) -> Vec<RawIssue> {
    let first = match fetcher.get_no_redirect(url).await {
        Ok(page) => page,
        Err(err) => {
            tracing::debug!(url, error = %err, "indexing fetch failed");
            return Vec::new();
        }
    };

    let mut issues = Vec::new();
    let final_page = match walk_redirects(fetcher, url, first).await {
        RedirectOutcome::Loop { at, hops } => {
            issues.push(redirect_loop_issue(url, &at, hops));
            return issues;
        }
        RedirectOutcome::Exhausted { hops } => {
            issues.push(redirect_chain_issue(url, hops));
            return issues;
        }
        RedirectOutcome::Failed => return issues,
        RedirectOutcome::Chain { hops, final_page } => {
            if hops > 1 {
                issues.push(redirect_chain_issue(url, hops));
            }
            final_page
        }
    };

    issues.extend(check_response(url, &final_page));

    if final_page.is_success() && path_is_root(url) {
        if let Some(issue) = robots_check(fetcher, url).await {
            issues.push(issue);
        }
    }

    issues
}

enum RedirectOutcome {
    /// A URL was revisited mid-chain.
    Loop { at: String, hops: u32 },
    /// The chain kept redirecting past the hop cap.
    Exhausted { hops: u32 },
    /// A fetch or URL resolution failed mid-chain; degrade to no issue.
    Failed,
    /// The chain landed on a non-redirect response after `hops` redirects
    /// (zero when the first response was not a redirect at all).
    Chain { hops: u32, final_page: FetchedPage },
}

async fn walk_redirects(fetcher: &dyn Fetch, start: &str, first: FetchedPage) -> RedirectOutcome {
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start.to_string());
    let mut current_url = start.to_string();
    let mut page = first;
    let mut hops: u32 = 0;

    loop {
        if !page.is_redirect() {
            return RedirectOutcome::Chain { hops, final_page: page };
        }
        let Some(location) = page.header("location") else {
            // 3xx without a Location is terminal; treat it like any other
            // non-2xx final response.
            return RedirectOutcome::Chain { hops, final_page: page };
        };
        if hops >= MAX_REDIRECT_HOPS {
            return RedirectOutcome::Exhausted { hops };
        }
        let Some(next) = resolve_location(&current_url, location) else {
            tracing::debug!(url = %current_url, location, "unresolvable redirect target");
            return RedirectOutcome::Failed;
        };
        hops += 1;
        if !visited.insert(next.clone()) {
            return RedirectOutcome::Loop { at: next, hops };
        }
        match fetcher.get_no_redirect(&next).await {
            Ok(next_page) => {
                current_url = next;
                page = next_page;
            }
            Err(err) => {
                tracing::debug!(url = %next, error = %err, "redirect hop fetch failed");
                return RedirectOutcome::Failed;
            }
        }
    }
}

fn resolve_location(base: &str, location: &str) -> Option<String> {
    Url::parse(base)
        .ok()?
        .join(location)
        .ok()
        .map(|resolved| resolved.to_string())
}

/// Checks applied to the resolved final response. Terminal status codes
/// short-circuit: no content checks run for a 404 or 5xx page.
pub fn check_response(url: &str, page: &FetchedPage) -> Vec<RawIssue> {
    match page.status {
        404 => vec![RawIssue {
            url: url.to_string(),
            issue_type: IssueType::NotFound404,
            severity: Severity::Error,
            auto_fixable: false,
            suggested_fix: "Restore the page or redirect the URL to a live replacement"
                .to_string(),
            details: IssueDetails {
                actual: Some("404".to_string()),
                ..Default::default()
            },
        }],
        status if status >= 500 => vec![RawIssue {
            url: url.to_string(),
            issue_type: IssueType::ServerError5xx,
            severity: Severity::Error,
            auto_fixable: false,
            suggested_fix: "Investigate the server error preventing this page from being served"
                .to_string(),
            details: IssueDetails {
                actual: Some(status.to_string()),
                ..Default::default()
            },
        }],
        status if !(200..300).contains(&status) => Vec::new(),
        _ => content_checks(url, page),
    }
}

fn content_checks(url: &str, page: &FetchedPage) -> Vec<RawIssue> {
    let mut issues = Vec::new();
    let document = Html::parse_document(&page.body);

    let canonical_selector = Selector::parse("link[rel='canonical']").expect("valid selector");
    let canonical = document
        .select(&canonical_selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty());

    match canonical {
        None => issues.push(RawIssue {
            url: url.to_string(),
            issue_type: IssueType::DuplicateWithoutCanonical,
            severity: Severity::Error,
            auto_fixable: true,
            suggested_fix: "Add a self-referencing <link rel=\"canonical\"> tag to the page head"
                .to_string(),
            details: IssueDetails::default(),
        }),
        Some(href) => {
            // Path-level comparison after resolving the href against the
            // page URL, so relative and absolute self-references both pass.
            if let Ok(base) = Url::parse(&page.final_url)
                && let Ok(canonical_url) = base.join(href)
                && normalize_path(canonical_url.path()) != normalize_path(base.path())
            {
                issues.push(RawIssue {
                    url: url.to_string(),
                    issue_type: IssueType::ConflictingCanonical,
                    severity: Severity::Error,
                    auto_fixable: true,
                    suggested_fix:
                        "Point the canonical link at this page's own URL, or consolidate the duplicate content"
                            .to_string(),
                    details: IssueDetails {
                        expected: Some(base.path().to_string()),
                        actual: Some(href.to_string()),
                        ..Default::default()
                    },
                });
            }
        }
    }

    if let Some(issue) = noindex_check(url, page, &document) {
        issues.push(issue);
    }

    issues
}

fn noindex_check(url: &str, page: &FetchedPage, document: &Html) -> Option<RawIssue> {
    let robots_selector = Selector::parse("meta[name='robots']").expect("valid selector");
    let meta_noindex = document
        .select(&robots_selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(|content| content.to_ascii_lowercase())
        .filter(|content| content.contains("noindex"));

    let header_noindex = page
        .header("x-robots-tag")
        .map(|value| value.to_ascii_lowercase())
        .filter(|value| value.contains("noindex"));

    let signal = meta_noindex.or(header_noindex)?;
    Some(RawIssue {
        url: url.to_string(),
        issue_type: IssueType::NoindexTag,
        severity: Severity::Warning,
        auto_fixable: false,
        suggested_fix: "Remove the noindex directive if this page should appear in search results"
            .to_string(),
        details: IssueDetails {
            value: Some(signal),
            ..Default::default()
        },
    })
}

async fn robots_check(fetcher: &dyn Fetch, url: &str) -> Option<RawIssue> {
    let origin = Url::parse(url).ok()?.origin().ascii_serialization();
    let robots_url = format!("{origin}/robots.txt");
    let page = match fetcher.get(&robots_url).await {
        Ok(page) if page.is_success() => page,
        Ok(_) => return None,
        Err(err) => {
            tracing::debug!(url = %robots_url, error = %err, "robots.txt fetch failed");
            return None;
        }
    };

    if robots_blocks_all(&page.body) {
        Some(RawIssue {
            url: url.to_string(),
            issue_type: IssueType::BlockedByRobots,
            severity: Severity::Error,
            auto_fixable: true,
            suggested_fix: "Remove the blanket 'Disallow: /' rule from robots.txt".to_string(),
            details: IssueDetails {
                value: Some(robots_url),
                ..Default::default()
            },
        })
    } else {
        None
    }
}

/// True when a `Disallow: /` rule applies to all crawlers or to Googlebot.
/// Consecutive `User-agent` lines form one group sharing the rules below.
pub fn robots_blocks_all(content: &str) -> bool {
    let mut current_agents: Vec<String> = Vec::new();
    let mut previous_was_agent = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            previous_was_agent = false;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        let Some((directive, value)) = line.split_once(':') else {
            continue;
        };
        let directive = directive.trim().to_ascii_lowercase();
        let value = value.trim();

        match directive.as_str() {
            "user-agent" => {
                if previous_was_agent {
                    current_agents.push(value.to_ascii_lowercase());
                } else {
                    current_agents = vec![value.to_ascii_lowercase()];
                }
                previous_was_agent = true;
            }
            "disallow" => {
                previous_was_agent = false;
                if value == "/"
                    && current_agents
                        .iter()
                        .any(|agent| agent == "*" || agent.contains("googlebot"))
                {
                    return true;
                }
            }
            _ => {
                previous_was_agent = false;
            }
        }
    }

    false
}

fn path_is_root(url: &str) -> bool {
    Url::parse(url)
        .map(|parsed| parsed.path() == "/" || parsed.path().is_empty())
        .unwrap_or(false)
}

fn normalize_path(path: &str) -> &str {
    path.trim_end_matches('/')
}

fn redirect_chain_issue(url: &str, hops: u32) -> RawIssue {
    RawIssue {
        url: url.to_string(),
        issue_type: IssueType::RedirectChain,
        severity: Severity::Warning,
        auto_fixable: true,
        suggested_fix: "Link directly to the final destination instead of chaining redirects"
            .to_string(),
        details: IssueDetails {
            hops: Some(hops),
            ..Default::default()
        },
    }
}

fn redirect_loop_issue(url: &str, at: &str, hops: u32) -> RawIssue {
    RawIssue {
        url: url.to_string(),
        issue_type: IssueType::RedirectLoop,
        severity: Severity::Error,
        auto_fixable: true,
        suggested_fix: "Break the redirect cycle so the URL resolves to a 2xx page".to_string(),
        details: IssueDetails {
            value: Some(at.to_string()),
            hops: Some(hops),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StaticFetcher;

    fn redirect(url: &str, to: &str) -> FetchedPage {
        FetchedPage::new(301, url, "").with_header("location", to)
    }

    fn ok_page(url: &str, canonical: &str) -> FetchedPage {
        FetchedPage::new(
            200,
            url,
            format!(r#"<html><head><link rel="canonical" href="{canonical}"></head><body></body></html>"#),
        )
    }

    #[tokio::test]
    async fn three_hop_chain_yields_one_chain_issue_with_hops() {
        let fetcher = StaticFetcher::new()
            .with_page("https://e.com/a", redirect("https://e.com/a", "/b"))
            .with_page("https://e.com/b", redirect("https://e.com/b", "/c"))
            .with_page("https://e.com/c", redirect("https://e.com/c", "/d"))
            .with_page("https://e.com/d", ok_page("https://e.com/d", "/d"));

        let issues = validate(&fetcher, "https://e.com/a").await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::RedirectChain);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(issues[0].details.hops, Some(3));
    }

    #[tokio::test]
    async fn single_redirect_is_not_a_chain() {
        let fetcher = StaticFetcher::new()
            .with_page("https://e.com/a", redirect("https://e.com/a", "/b"))
            .with_page("https://e.com/b", ok_page("https://e.com/b", "/b"));

        let issues = validate(&fetcher, "https://e.com/a").await;
        assert!(issues.is_empty());
    }

    #[tokio::test]
    async fn revisited_url_is_a_loop_and_never_a_chain() {
        let fetcher = StaticFetcher::new()
            .with_page("https://e.com/a", redirect("https://e.com/a", "/b"))
            .with_page("https://e.com/b", redirect("https://e.com/b", "/a"));

        let issues = validate(&fetcher, "https://e.com/a").await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::RedirectLoop);
        assert_eq!(issues[0].details.value.as_deref(), Some("https://e.com/a"));
        assert_eq!(issues[0].details.hops, Some(2));
    }

    #[tokio::test]
    async fn not_found_short_circuits_content_checks() {
        // Body deliberately lacks a canonical tag: a 404 must not be joined
        // by canonical or noindex findings.
        let fetcher = StaticFetcher::new().with_page(
            "https://e.com/missing",
            FetchedPage::new(404, "https://e.com/missing", "<html><body>gone</body></html>"),
        );

        let issues = validate(&fetcher, "https://e.com/missing").await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::NotFound404);
        assert!(!issues[0].auto_fixable);
    }

    #[tokio::test]
    async fn server_errors_are_terminal() {
        let fetcher = StaticFetcher::new().with_page(
            "https://e.com/broken",
            FetchedPage::new(503, "https://e.com/broken", ""),
        );

        let issues = validate(&fetcher, "https://e.com/broken").await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::ServerError5xx);
        assert_eq!(issues[0].details.actual.as_deref(), Some("503"));
    }

    #[tokio::test]
    async fn other_non_success_statuses_yield_nothing() {
        let fetcher = StaticFetcher::new().with_page(
            "https://e.com/teapot",
            FetchedPage::new(418, "https://e.com/teapot", ""),
        );
        assert!(validate(&fetcher, "https://e.com/teapot").await.is_empty());
    }

    #[test]
    fn missing_canonical_is_flagged() {
        let page = FetchedPage::new(
            200,
            "https://e.com/page",
            "<html><head></head><body></body></html>",
        );
        let issues = check_response("https://e.com/page", &page);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::DuplicateWithoutCanonical);
    }

    #[test]
    fn canonical_pointing_elsewhere_conflicts() {
        let page = ok_page("https://e.com/page", "https://e.com/other");
        let issues = check_response("https://e.com/page", &page);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::ConflictingCanonical);
        assert_eq!(issues[0].details.expected.as_deref(), Some("/page"));
    }

    #[test]
    fn relative_self_canonical_passes() {
        let page = ok_page("https://e.com/page", "/page");
        assert!(check_response("https://e.com/page", &page).is_empty());

        // Trailing slash differences are not a conflict.
        let page = ok_page("https://e.com/page/", "/page");
        assert!(check_response("https://e.com/page/", &page).is_empty());
    }

    #[test]
    fn noindex_meta_and_header_are_detected() {
        let page = FetchedPage::new(
            200,
            "https://e.com/p",
            r#"<html><head><link rel="canonical" href="/p"><meta name="robots" content="NOINDEX, nofollow"></head></html>"#,
        );
        let issues = check_response("https://e.com/p", &page);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::NoindexTag);
        assert_eq!(issues[0].severity, Severity::Warning);

        let page = ok_page("https://e.com/p", "/p").with_header("x-robots-tag", "noindex");
        let issues = check_response("https://e.com/p", &page);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::NoindexTag);
    }

    #[tokio::test]
    async fn root_pages_are_checked_against_robots_txt() {
        let fetcher = StaticFetcher::new()
            .with_page("https://e.com/", ok_page("https://e.com/", "/"))
            .with_page(
                "https://e.com/robots.txt",
                FetchedPage::new(
                    200,
                    "https://e.com/robots.txt",
                    "User-agent: *\nDisallow: /\n",
                ),
            );

        let issues = validate(&fetcher, "https://e.com/").await;
        assert!(
            issues
                .iter()
                .any(|issue| issue.issue_type == IssueType::BlockedByRobots)
        );
    }

    #[tokio::test]
    async fn missing_robots_txt_is_not_an_issue() {
        let fetcher = StaticFetcher::new()
            .with_page("https://e.com/", ok_page("https://e.com/", "/"));
        let issues = validate(&fetcher, "https://e.com/").await;
        assert!(
            !issues
                .iter()
                .any(|issue| issue.issue_type == IssueType::BlockedByRobots)
        );
    }

    #[test]
    fn robots_blanket_block_detection() {
        assert!(robots_blocks_all("User-agent: *\nDisallow: /"));
        assert!(robots_blocks_all(
            "User-agent: Googlebot\nDisallow: /\n\nUser-agent: *\nDisallow:"
        ));
        // Consecutive agent lines share the group's rules.
        assert!(robots_blocks_all(
            "User-agent: bingbot\nUser-agent: googlebot\nDisallow: /"
        ));
        assert!(!robots_blocks_all("User-agent: *\nDisallow: /admin/"));
        assert!(!robots_blocks_all("User-agent: badbot\nDisallow: /"));
        assert!(!robots_blocks_all("# nothing here\n"));
    }

    #[test]
    fn root_path_detection() {
        assert!(path_is_root("https://e.com"));
        assert!(path_is_root("https://e.com/"));
        assert!(!path_is_root("https://e.com/about"));
    }
}
