//! Sitemap-based URL discovery
//!
//! Expands a validation target from a single site URL to the pages its
//! sitemap lists, up to a caller-imposed cap. Any fetch or parse failure
//! degrades to validating just the site URL itself.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::fetch::Fetch;

/// Nested sitemaps fetched from a sitemap index before giving up.
const MAX_NESTED_SITEMAPS: usize = 3;

static LOC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<loc>\s*([^<]+?)\s*</loc>").expect("invalid loc regex"));

#[derive(Debug, PartialEq)]
pub enum SitemapDocument {
    /// `<urlset>` — page URLs.
    UrlSet(Vec<String>),
    /// `<sitemapindex>` — pointers to further sitemaps.
    Index(Vec<String>),
    Unrecognized,
}

/// Classify sitemap XML and pull out its `<loc>` entries.
pub fn parse_sitemap(xml: &str) -> SitemapDocument {
    let locs = || {
        LOC.captures_iter(xml)
            .map(|captures| decode_xml_entities(captures[1].trim()))
            .collect::<Vec<_>>()
    };
    if xml.contains("<sitemapindex") {
        SitemapDocument::Index(locs())
    } else if xml.contains("<urlset") {
        SitemapDocument::UrlSet(locs())
    } else {
        SitemapDocument::Unrecognized
    }
}

/// Build the list of URLs to validate: the site URL first, then sitemap
/// entries until `max_urls` is reached. Duplicates are dropped, order is
/// preserved.
pub async fn discover_urls(
    fetcher: &dyn Fetch,
    site_url: &str,
    sitemap_url: Option<&str>,
    max_urls: usize,
) -> Vec<String> {
    let mut urls = vec![site_url.to_string()];
    if max_urls <= 1 {
        return urls;
    }

    let target = match sitemap_url {
        Some(explicit) => explicit.to_string(),
        None => match Url::parse(site_url) {
            Ok(parsed) => format!("{}/sitemap.xml", parsed.origin().ascii_serialization()),
            Err(_) => return urls,
        },
    };

    let mut entries = fetch_sitemap_entries(fetcher, &target).await;
    if let Some(more) = entries.as_mut() {
        for url in more.drain(..) {
            if urls.len() >= max_urls {
                break;
            }
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}

async fn fetch_sitemap_entries(fetcher: &dyn Fetch, sitemap_url: &str) -> Option<Vec<String>> {
    let page = match fetcher.get(sitemap_url).await {
        Ok(page) if page.is_success() => page,
        Ok(page) => {
            tracing::debug!(url = sitemap_url, status = page.status, "sitemap unavailable");
            return None;
        }
        Err(err) => {
            tracing::debug!(url = sitemap_url, error = %err, "sitemap fetch failed");
            return None;
        }
    };

    match parse_sitemap(&page.body) {
        SitemapDocument::UrlSet(locs) => Some(locs),
        SitemapDocument::Index(nested) => {
            // One level of nesting only; deeper indexes are unusual and not
            // worth chasing on every validation run.
            let mut collected = Vec::new();
            for nested_url in nested.into_iter().take(MAX_NESTED_SITEMAPS) {
                if let Ok(page) = fetcher.get(&nested_url).await
                    && page.is_success()
                    && let SitemapDocument::UrlSet(locs) = parse_sitemap(&page.body)
                {
                    collected.extend(locs);
                }
            }
            Some(collected)
        }
        SitemapDocument::Unrecognized => {
            tracing::debug!(url = sitemap_url, "unrecognized sitemap format");
            None
        }
    }
}

fn decode_xml_entities(value: &str) -> String {
    value
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchedPage, StaticFetcher};

    #[test]
    fn urlset_entries_are_extracted() {
        let xml = r#"<?xml version="1.0"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                <url><loc>https://e.com/</loc><lastmod>2024-01-01</lastmod></url>
                <url><loc> https://e.com/about </loc></url>
                <url><loc>https://e.com/p?a=1&amp;b=2</loc></url>
            </urlset>"#;
        assert_eq!(
            parse_sitemap(xml),
            SitemapDocument::UrlSet(vec![
                "https://e.com/".to_string(),
                "https://e.com/about".to_string(),
                "https://e.com/p?a=1&b=2".to_string(),
            ])
        );
    }

    #[test]
    fn index_documents_are_recognized() {
        let xml = r#"<sitemapindex><sitemap><loc>https://e.com/s1.xml</loc></sitemap></sitemapindex>"#;
        assert_eq!(
            parse_sitemap(xml),
            SitemapDocument::Index(vec!["https://e.com/s1.xml".to_string()])
        );
        assert_eq!(parse_sitemap("<html></html>"), SitemapDocument::Unrecognized);
    }

    #[tokio::test]
    async fn discovery_caps_and_dedupes() {
        let sitemap = r#"<urlset>
            <url><loc>https://e.com/</loc></url>
            <url><loc>https://e.com/a</loc></url>
            <url><loc>https://e.com/b</loc></url>
            <url><loc>https://e.com/c</loc></url>
        </urlset>"#;
        let fetcher = StaticFetcher::new().with_page(
            "https://e.com/sitemap.xml",
            FetchedPage::new(200, "https://e.com/sitemap.xml", sitemap),
        );

        let urls = discover_urls(&fetcher, "https://e.com/", None, 3).await;
        // The site URL leads; its sitemap duplicate is dropped.
        assert_eq!(
            urls,
            vec![
                "https://e.com/".to_string(),
                "https://e.com/a".to_string(),
                "https://e.com/b".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn missing_sitemap_degrades_to_site_url() {
        let fetcher = StaticFetcher::new();
        let urls = discover_urls(&fetcher, "https://e.com/", None, 10).await;
        assert_eq!(urls, vec!["https://e.com/".to_string()]);
    }

    #[tokio::test]
    async fn explicit_sitemap_url_wins_and_indexes_nest_once() {
        let index = r#"<sitemapindex><sitemap><loc>https://e.com/pages.xml</loc></sitemap></sitemapindex>"#;
        let pages = r#"<urlset><url><loc>https://e.com/x</loc></url></urlset>"#;
        let fetcher = StaticFetcher::new()
            .with_page(
                "https://e.com/custom.xml",
                FetchedPage::new(200, "https://e.com/custom.xml", index),
            )
            .with_page(
                "https://e.com/pages.xml",
                FetchedPage::new(200, "https://e.com/pages.xml", pages),
            );

        let urls =
            discover_urls(&fetcher, "https://e.com/", Some("https://e.com/custom.xml"), 10).await;
        assert_eq!(
            urls,
            vec!["https://e.com/".to_string(), "https://e.com/x".to_string()]
        );
    }

    #[tokio::test]
    async fn max_urls_of_one_skips_discovery_entirely() {
        let fetcher = StaticFetcher::new();
        let urls = discover_urls(&fetcher, "https://e.com/", None, 1).await;
        assert_eq!(urls.len(), 1);
    }
}
