//! HTTP fetching for the validators
//!
//! Every validator performs its own fetch of the target URL; there is no
//! shared response cache between them. The [`Fetch`] trait is the seam that
//! lets tests and offline runs substitute fixture responses for the live
//! client.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::redirect::Policy;

pub const DESKTOP_USER_AGENT: &str =
    concat!("Mozilla/5.0 (compatible; seolens/", env!("CARGO_PKG_VERSION"), ")");

pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 12; Pixel 6) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Mobile Safari/537.36";

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_FOLLOWED_REDIRECTS: usize = 10;

/// One fetched HTTP response, body already read as text.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub final_url: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl FetchedPage {
    pub fn new(status: u16, final_url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            final_url: final_url.into(),
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Attach a response header; used when building fixture pages.
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_str(value).expect("valid header value"),
        );
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// Outbound fetch operations the validators depend on.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// GET following redirects, desktop user agent.
    async fn get(&self, url: &str) -> Result<FetchedPage>;

    /// GET without following redirects; `Location` stays observable.
    async fn get_no_redirect(&self, url: &str) -> Result<FetchedPage>;

    /// GET following redirects with a mobile user agent.
    async fn get_mobile(&self, url: &str) -> Result<FetchedPage>;
}

/// Live reqwest-backed fetcher.
#[derive(Debug)]
pub struct PageFetcher {
    following: reqwest::Client,
    direct: reqwest::Client,
}

impl PageFetcher {
    pub fn new() -> Result<Self> {
        let following = reqwest::Client::builder()
            .user_agent(DESKTOP_USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .redirect(Policy::limited(MAX_FOLLOWED_REDIRECTS))
            .build()
            .context("building redirect-following HTTP client")?;
        let direct = reqwest::Client::builder()
            .user_agent(DESKTOP_USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .redirect(Policy::none())
            .build()
            .context("building non-following HTTP client")?;
        Ok(Self { following, direct })
    }

    async fn run(
        client: &reqwest::Client,
        url: &str,
        user_agent: Option<&str>,
    ) -> Result<FetchedPage> {
        let mut request = client.get(url);
        if let Some(agent) = user_agent {
            request = request.header(USER_AGENT, agent);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .with_context(|| format!("reading response body from {url}"))?;

        Ok(FetchedPage {
            status,
            final_url,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Fetch for PageFetcher {
    async fn get(&self, url: &str) -> Result<FetchedPage> {
        Self::run(&self.following, url, None).await
    }

    async fn get_no_redirect(&self, url: &str) -> Result<FetchedPage> {
        Self::run(&self.direct, url, None).await
    }

    async fn get_mobile(&self, url: &str) -> Result<FetchedPage> {
        Self::run(&self.following, url, Some(MOBILE_USER_AGENT)).await
    }
}

/// Fixture-backed fetcher serving pre-registered responses by exact URL.
/// Unregistered URLs fail the same way an unreachable host would.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, FetchedPage>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, page: FetchedPage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    fn lookup(&self, url: &str) -> Result<FetchedPage> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("no fixture registered for {url}"))
    }
}

#[async_trait]
impl Fetch for StaticFetcher {
    async fn get(&self, url: &str) -> Result<FetchedPage> {
        // Mirror a following client: chase Location headers across fixtures.
        let mut current = self.lookup(url)?;
        let mut hops = 0;
        while current.is_redirect() && hops < MAX_FOLLOWED_REDIRECTS {
            let Some(location) = current.header("location") else {
                break;
            };
            let next = match url::Url::parse(&current.final_url)
                .and_then(|base| base.join(location))
            {
                Ok(resolved) => resolved.to_string(),
                Err(_) => location.to_string(),
            };
            current = self.lookup(&next)?;
            hops += 1;
        }
        Ok(current)
    }

    async fn get_no_redirect(&self, url: &str) -> Result<FetchedPage> {
        self.lookup(url)
    }

    async fn get_mobile(&self, url: &str) -> Result<FetchedPage> {
        self.get(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_fetcher_follows_location_chains() {
        let fetcher = StaticFetcher::new()
            .with_page(
                "https://example.com/a",
                FetchedPage::new(301, "https://example.com/a", "").with_header("location", "/b"),
            )
            .with_page(
                "https://example.com/b",
                FetchedPage::new(200, "https://example.com/b", "landed"),
            );

        let page = fetcher.get("https://example.com/a").await.unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.body, "landed");

        let raw = fetcher.get_no_redirect("https://example.com/a").await.unwrap();
        assert_eq!(raw.status, 301);
        assert_eq!(raw.header("location"), Some("/b"));
    }

    #[tokio::test]
    async fn unknown_fixture_is_an_error() {
        let fetcher = StaticFetcher::new();
        assert!(fetcher.get("https://missing.example").await.is_err());
    }
}
