//! Feed unwrapping and event extraction
//!
//! The upstream feed is not HTML but a script made of
//! `document.write('<fragment>');` calls. [`unwrap_feed`] joins the
//! fragments back into one document and [`extract_events`] reads the
//! schedule rows out of it.
//!
//! Extraction is best effort: a row or an anchor that does not have the
//! expected shape is skipped, it never fails the whole feed.

use crate::models::{Channel, Event};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// League label used when a row has none
pub const UNKNOWN_LEAGUE: &str = "未知";

static WRITE_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"document\.write\('(.*?)'\);").expect("valid feed regex"));

static ROW: Lazy<Selector> = Lazy::new(|| selector("ul.item"));
static LEAGUE: Lazy<Selector> = Lazy::new(|| selector("li.lab_events"));
static TIME: Lazy<Selector> = Lazy::new(|| selector("li.lab_time"));
static HOME: Lazy<Selector> = Lazy::new(|| selector("li.lab_team_home strong"));
static AWAY: Lazy<Selector> = Lazy::new(|| selector("li.lab_team_away strong"));
static CHANNELS: Lazy<Selector> = Lazy::new(|| selector("li.lab_channel"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid CSS selector")
}

/// Joins every `document.write('…');` payload, in order of appearance
///
/// Returns an empty string when the script contains no such call.
pub fn unwrap_feed(raw: &str) -> String {
    WRITE_CALL
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Parses the unwrapped feed into events
///
/// Events without any usable channel are dropped.
pub fn extract_events(html: &str) -> Vec<Event> {
    let document = Html::parse_document(html);
    document.select(&ROW).filter_map(parse_row).collect()
}

fn parse_row(row: ElementRef<'_>) -> Option<Event> {
    let league = first_text(row, &LEAGUE).unwrap_or_else(|| UNKNOWN_LEAGUE.to_string());
    let time = first_text(row, &TIME)?;
    let home = first_text(row, &HOME)?;
    let away = first_text(row, &AWAY)?;

    let mut event = Event::new(&league, time, &home, &away);
    if let Some(container) = row.select(&CHANNELS).next() {
        event.channels = container.select(&ANCHOR).filter_map(parse_channel).collect();
    }

    if event.channels.is_empty() {
        None
    } else {
        Some(event)
    }
}

fn parse_channel(anchor: ElementRef<'_>) -> Option<Channel> {
    let mut channel = Channel::new(element_text(anchor));

    // data-play first, the plain link is only a fallback
    for attr in ["data-play", "href"] {
        if let Some(url) = anchor.value().attr(attr).and_then(absolute_url) {
            channel.push_candidate(url);
        }
    }

    channel.has_candidates().then_some(channel)
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

/// Text content with each text node trimmed, then joined
fn element_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

/// Keeps only absolute http(s) URLs; placeholders such as `#` or
/// `javascript:void(0)` are rejected
fn absolute_url(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') {
        return None;
    }
    let url = Url::parse(value).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| value.to_string())
}
