//! Stream resolution
//!
//! Given the text of a candidate page, [`StreamResolver::resolve`] looks for
//! a playable HLS manifest URL. Four strategies are tried in order and the
//! first one that produces a URL wins:
//!
//! 1. a quoted `.m3u8` URL (absolute or root-relative) in the raw text,
//! 2. a player configuration entry (`source`, `file`, `video`, `url`)
//!    assigned an absolute URL,
//! 3. a quoted base64 token that decodes to an absolute `.m3u8` URL,
//! 4. the embedded frames of the page, fetched with the current page as
//!    referer and resolved recursively.
//!
//! Recursion is bounded by [`ResolverOptions::max_depth`] only. There is no
//! visited-URL set: a frame chain that loops back on itself is refetched
//! until the depth ceiling stops it.

use crate::client::PageFetcher;
use crate::models::Channel;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use futures::FutureExt;
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Extension of the HLS manifests we are looking for
pub const MEDIA_EXTENSION: &str = ".m3u8";

/// Default frame recursion ceiling
pub const DEFAULT_MAX_DEPTH: usize = 2;

/// Default minimum length of a base64 token worth decoding
pub const DEFAULT_MIN_BASE64_LEN: usize = 30;

static DIRECT_MEDIA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["']((?:https?:)?/[^"'\s]*?\.m3u8(?:\?[^"'\s]*)?)["']"#)
        .expect("valid media regex")
});

static PLAYER_CONFIG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(?:source|file|video|url)["']?\s*[:=]\s*["'](https?://[^"'\s]+)["']"#)
        .expect("valid player config regex")
});

static QUOTED_BASE64: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["']([A-Za-z0-9+/]+={0,2})["']"#).expect("valid base64 regex"));

static FRAMES: Lazy<Selector> =
    Lazy::new(|| Selector::parse("iframe[src], frame[src]").expect("valid frame selector"));

/// Standard alphabet, padding optional
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Tunables of the resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Frames are fetched only while the current depth is below this value
    pub max_depth: usize,
    pub min_base64_len: usize,
    /// Timeout for a candidate page
    pub page_timeout: Duration,
    /// Timeout for an embedded frame
    pub frame_timeout: Duration,
    /// Pause after each network call
    pub throttle: Duration,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            min_base64_len: DEFAULT_MIN_BASE64_LEN,
            page_timeout: Duration::from_secs(8),
            frame_timeout: Duration::from_secs(5),
            throttle: Duration::from_millis(200),
        }
    }
}

/// Resolves candidate pages to media URLs
#[derive(Clone)]
pub struct StreamResolver {
    fetcher: Arc<dyn PageFetcher>,
    options: ResolverOptions,
}

impl StreamResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>, options: ResolverOptions) -> Self {
        Self { fetcher, options }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Tries the candidates of `channel` in order
    ///
    /// A candidate that already is a manifest URL is accepted as is. Other
    /// candidates are fetched and resolved at depth 0. A failing candidate
    /// only moves on to the next one.
    pub async fn resolve_channel(&self, channel: &Channel) -> Option<String> {
        for candidate in channel.candidate_urls() {
            if is_media_url(candidate) {
                return Some(candidate.to_string());
            }

            let page = self
                .fetcher
                .fetch_page(candidate, None, self.options.page_timeout)
                .await;
            self.pause().await;

            match page {
                Ok(body) => {
                    if let Some(media) = self.resolve(&body, candidate, 0).await {
                        return Some(media);
                    }
                    debug!("No stream found in {}", candidate);
                }
                Err(e) => warn!("⚠️ Candidate {} unavailable: {}", candidate, e),
            }
        }
        None
    }

    /// Looks for a media URL in `html`, fetched from `page_url`
    ///
    /// Returns `None` once every strategy is exhausted. The result only
    /// depends on the arguments and on what the frames serve.
    pub fn resolve<'a>(
        &'a self,
        html: &'a str,
        page_url: &'a str,
        depth: usize,
    ) -> BoxFuture<'a, Option<String>> {
        async move {
            if let Some(media) = self.match_text(html, page_url) {
                return Some(media);
            }

            let frames = frame_sources(html, page_url);
            if frames.is_empty() {
                return None;
            }
            if depth >= self.options.max_depth {
                debug!(
                    "Depth ceiling {} reached, {} frame(s) of {} ignored",
                    self.options.max_depth,
                    frames.len(),
                    page_url
                );
                return None;
            }

            for frame in frames {
                let page = self
                    .fetcher
                    .fetch_page(&frame, Some(page_url), self.options.frame_timeout)
                    .await;
                self.pause().await;

                match page {
                    Ok(body) => {
                        if let Some(media) = self.resolve(&body, &frame, depth + 1).await {
                            return Some(media);
                        }
                    }
                    Err(e) => warn!("⚠️ Frame {} unavailable: {}", frame, e),
                }
            }
            None
        }
        .boxed()
    }

    /// Text-only strategies, in precedence order
    fn match_text(&self, html: &str, page_url: &str) -> Option<String> {
        find_direct_media_url(html, page_url)
            .or_else(|| find_player_config_url(html))
            .or_else(|| find_base64_media_url(html, self.options.min_base64_len))
    }

    async fn pause(&self) {
        if !self.options.throttle.is_zero() {
            tokio::time::sleep(self.options.throttle).await;
        }
    }
}

/// True when the URL path ends with the manifest extension
pub fn is_media_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.path().ends_with(MEDIA_EXTENSION))
        .unwrap_or(false)
}

/// First quoted `.m3u8` URL that is absolute once joined with `page_url`
pub fn find_direct_media_url(html: &str, page_url: &str) -> Option<String> {
    let base = Url::parse(page_url).ok();
    DIRECT_MEDIA
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| absolutize(m.as_str(), base.as_ref()))
}

/// First player configuration entry holding an absolute URL
pub fn find_player_config_url(html: &str) -> Option<String> {
    PLAYER_CONFIG
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|value| is_http_url(value))
        .map(str::to_string)
}

/// First quoted base64 token decoding to an absolute `.m3u8` URL
pub fn find_base64_media_url(html: &str, min_len: usize) -> Option<String> {
    QUOTED_BASE64
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|token| token.len() >= min_len)
        .find_map(decode_media_url)
}

fn decode_media_url(token: &str) -> Option<String> {
    let bytes = LENIENT_BASE64.decode(token).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let text = text.trim();
    let plausible = text.contains(MEDIA_EXTENSION)
        && (text.starts_with("http://") || text.starts_with("https://"));
    plausible.then(|| text.to_string())
}

/// Sources of the embedded frames, in document order, joined with `page_url`
///
/// The parsed document does not outlive this call.
pub fn frame_sources(html: &str, page_url: &str) -> Vec<String> {
    let base = Url::parse(page_url).ok();
    let document = Html::parse_document(html);
    document
        .select(&FRAMES)
        .filter_map(|frame| frame.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .filter_map(|src| absolutize(src, base.as_ref()))
        .collect()
}

fn absolutize(raw: &str, base: Option<&Url>) -> Option<String> {
    let url = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}
