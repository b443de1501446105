//! HTTP client for the JRS schedule feed and candidate pages
//!
//! The feed is a JavaScript document hosted on a CDN bucket. Every request
//! carries a browser-like `User-Agent` and the referer of the origin site,
//! and the feed URL gets a fresh `_=<millis>` parameter so that the CDN never
//! answers from cache.
//!
//! # Example
//!
//! ```no_run
//! use lmjrs::FeedClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = FeedClient::new()?;
//!     let script = client.fetch_feed().await?;
//!     println!("{} bytes", script.len());
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::seq::IndexedRandom;
use reqwest::header::{REFERER, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default schedule feed
pub const DEFAULT_SOURCE_URL: &str =
    "https://im-imgs-bucket.oss-accelerate.aliyuncs.com/index.js?t_5";

/// Referer expected by the feed and most candidate pages
pub const DEFAULT_REFERER: &str = "https://www.jrs21.com/";

/// Default timeout for the feed request (15 seconds)
pub const DEFAULT_FEED_TIMEOUT_SECS: u64 = 15;

/// Desktop browser identities, one is picked when the client is built
pub const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// Source of candidate pages for the stream resolver
///
/// Implemented by [`FeedClient`]; tests and alternative transports can
/// provide their own.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET `url` and return its body
    ///
    /// `referer` overrides the default referer header. Any non-200 answer
    /// is an [`Error::HttpStatus`].
    async fn fetch_page(&self, url: &str, referer: Option<&str>, timeout: Duration)
    -> Result<String>;
}

/// JRS feed client
///
/// The client is stateless apart from the cache-busting counter, which only
/// ever grows.
#[derive(Debug, Clone)]
pub struct FeedClient {
    pub(crate) client: Client,
    source_url: String,
    referer: String,
    user_agent: String,
    timeout: Duration,
    last_cache_buster: Arc<AtomicU64>,
}

impl FeedClient {
    /// Create a new client with default settings
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Get the feed URL (without cache-busting parameter)
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn referer(&self) -> &str {
        &self.referer
    }

    /// Get the `User-Agent` sent with every request
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Get the internal HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Fetch the raw feed script
    ///
    /// No retry is attempted here; the next scheduled cycle is the retry.
    pub async fn fetch_feed(&self) -> Result<String> {
        let url = self.feed_url()?;
        debug!("Fetching feed {}", url);

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .header(REFERER, &self.referer)
            .timeout(self.timeout)
            .send()
            .await?;

        read_ok(response, url.as_str()).await
    }

    /// Feed URL with a fresh `_=<millis>` parameter
    pub fn feed_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.source_url)?;
        url.query_pairs_mut()
            .append_pair("_", &self.next_cache_buster().to_string());
        Ok(url)
    }

    /// Current epoch millis, bumped when two calls land on the same millisecond
    fn next_cache_buster(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let previous = self
            .last_cache_buster
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or_else(|prev| prev);
        now.max(previous + 1)
    }
}

#[async_trait]
impl PageFetcher for FeedClient {
    async fn fetch_page(
        &self,
        url: &str,
        referer: Option<&str>,
        timeout: Duration,
    ) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(REFERER, referer.unwrap_or(&self.referer))
            .timeout(timeout)
            .send()
            .await?;

        read_ok(response, url).await
    }
}

async fn read_ok(response: Response, url: &str) -> Result<String> {
    let status = response.status();
    if status != StatusCode::OK {
        return Err(Error::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response.text().await?)
}

/// Builder for [`FeedClient`]
#[derive(Debug)]
pub struct ClientBuilder {
    client: Option<Client>,
    source_url: String,
    referer: String,
    timeout: Duration,
    user_agent: Option<String>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            source_url: DEFAULT_SOURCE_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            timeout: Duration::from_secs(DEFAULT_FEED_TIMEOUT_SECS),
            user_agent: None,
        }
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the feed URL
    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    /// Set the default referer header
    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    /// Set the feed request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a fixed User-Agent instead of a random browser identity
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<FeedClient> {
        // Fail early rather than on the first cycle
        Url::parse(&self.source_url)?;

        let client = match self.client {
            Some(client) => client,
            None => Client::builder().build()?,
        };

        let user_agent = self.user_agent.unwrap_or_else(random_user_agent);

        Ok(FeedClient {
            client,
            source_url: self.source_url,
            referer: self.referer,
            user_agent,
            timeout: self.timeout,
            last_cache_buster: Arc::new(AtomicU64::new(0)),
        })
    }
}

fn random_user_agent() -> String {
    BROWSER_USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(BROWSER_USER_AGENTS[0])
        .to_string()
}
