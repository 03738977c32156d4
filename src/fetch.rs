//! # Fetcher
//!
//! One HTTP GET against one source, with browser-like disguise headers and
//! a hard per-request timeout. Never returns `Err` to the aggregation layer:
//! every transport failure is folded into [`RawFetchResult`], so one dead
//! shop can only ever cost its own quote.
//!
//! When direct access is refused (some shops block datacenter origins the
//! same way they block cross-origin browsers), an ordered chain of relay
//! endpoints is walked sequentially; the first 2xx answer with a non-empty
//! body wins. First-success-wins, not fastest-wins, so runs are reproducible.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::future::Future;

use crate::config::FetchConfig;

/// Pretend to be a desktop Chrome; several shops serve bots an empty shell.
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";
const ACCEPT_LANG_JA: &str = "ja,en-US;q=0.9,en;q=0.8";

/// How a fetch failed. Only for logs/metrics; the aggregate result never
/// distinguishes these beyond "quote degraded to zero".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Network,
    Timeout,
    HttpStatus(u16),
    /// Direct access failed and every relay in the chain was tried.
    ProxyExhausted,
}

/// Outcome of fetching one page. `body` is empty whenever `succeeded` is
/// false; `error` is set in exactly that case.
#[derive(Debug, Clone)]
pub struct RawFetchResult {
    pub body: String,
    pub succeeded: bool,
    pub error: Option<FetchErrorKind>,
}

impl RawFetchResult {
    pub fn ok(body: String) -> Self {
        Self {
            body,
            succeeded: true,
            error: None,
        }
    }

    pub fn failed(kind: FetchErrorKind) -> Self {
        Self {
            body: String::new(),
            succeeded: false,
            error: Some(kind),
        }
    }
}

/// Seam between the aggregator and the network, so tests can script page
/// bodies, failures, and timing without sockets.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> RawFetchResult;
}

/// Expand a relay template for a target page. `{target}` receives the
/// percent-encoded URL; templates without the placeholder get it appended.
pub fn proxy_url(template: &str, target: &str) -> String {
    let encoded = urlencoding::encode(target);
    if template.contains("{target}") {
        template.replace("{target}", &encoded)
    } else {
        format!("{template}{encoded}")
    }
}

/// Walk the relay chain in order, stopping at the first 2xx non-empty body.
/// `attempt` is injected so tests can record call order.
pub async fn fetch_via_chain<F, Fut>(
    templates: &[String],
    target: &str,
    mut attempt: F,
) -> Result<String, FetchErrorKind>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<String, FetchErrorKind>>,
{
    for template in templates {
        let url = proxy_url(template, target);
        match attempt(url).await {
            Ok(body) if !body.is_empty() => return Ok(body),
            Ok(_) => {
                tracing::debug!(relay = %template, "relay answered with empty body");
            }
            Err(kind) => {
                tracing::debug!(relay = %template, error = ?kind, "relay attempt failed");
            }
        }
    }
    Err(FetchErrorKind::ProxyExhausted)
}

/// Production fetcher: reqwest with disguise headers, client-level timeout,
/// and the relay chain as fallback after a failed direct attempt.
pub struct HttpFetcher {
    client: reqwest::Client,
    proxies: Vec<String>,
}

impl HttpFetcher {
    pub fn new(cfg: &FetchConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANG_JA));

        let client = reqwest::Client::builder()
            .user_agent(BROWSER_UA)
            .default_headers(headers)
            .timeout(cfg.timeout)
            .build()?;

        Ok(Self {
            client,
            proxies: cfg.proxy_endpoints.clone(),
        })
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchErrorKind> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchErrorKind::HttpStatus(status.as_u16()));
        }
        resp.text().await.map_err(classify_reqwest_error)
    }

    async fn get_text_owned(&self, url: String) -> Result<String, FetchErrorKind> {
        self.get_text(&url).await
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> FetchErrorKind {
    if e.is_timeout() {
        FetchErrorKind::Timeout
    } else {
        FetchErrorKind::Network
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> RawFetchResult {
        match self.get_text(url).await {
            Ok(body) => RawFetchResult::ok(body),
            Err(kind) if self.proxies.is_empty() => RawFetchResult::failed(kind),
            Err(kind) => {
                tracing::debug!(%url, error = ?kind, "direct fetch failed, walking relay chain");
                match fetch_via_chain(&self.proxies, url, |u| self.get_text_owned(u)).await {
                    Ok(body) => RawFetchResult::ok(body),
                    Err(kind) => RawFetchResult::failed(kind),
                }
            }
        }
    }
}
