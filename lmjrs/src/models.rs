//! Data models for the schedule feed, resolved streams and run statistics

use chrono::{DateTime, Local};
use indexmap::IndexSet;
use serde::Serialize;

/// One scheduled match listed by the feed
///
/// Events are rebuilt from scratch on every cycle; their identity is their
/// position in the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// `"[league] home vs away"`
    pub name: String,
    /// Kick-off time as displayed by the feed (e.g. `19:30`)
    pub display_time: String,
    pub channels: Vec<Channel>,
}

impl Event {
    pub fn new(league: &str, display_time: impl Into<String>, home: &str, away: &str) -> Self {
        Self {
            name: format!("[{}] {} vs {}", league, home, away),
            display_time: display_time.into(),
            channels: Vec::new(),
        }
    }
}

/// One broadcast line of an event
///
/// Candidate entry pages are kept in insertion order without duplicates;
/// they are tried in that order until one resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub title: String,
    candidate_urls: IndexSet<String>,
}

impl Channel {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            candidate_urls: IndexSet::new(),
        }
    }

    /// Adds a candidate URL, returns `false` if it was already present
    pub fn push_candidate(&mut self, url: impl Into<String>) -> bool {
        self.candidate_urls.insert(url.into())
    }

    pub fn candidate_urls(&self) -> impl Iterator<Item = &str> {
        self.candidate_urls.iter().map(String::as_str)
    }

    pub fn has_candidates(&self) -> bool {
        !self.candidate_urls.is_empty()
    }
}

/// A channel whose candidate resolved to a playable media URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedStream {
    pub group_label: String,
    /// `"<time> <event name> - <channel title>"`
    pub display_name: String,
    pub media_url: String,
}

impl ResolvedStream {
    pub fn new(
        group_label: impl Into<String>,
        event: &Event,
        channel: &Channel,
        media_url: impl Into<String>,
    ) -> Self {
        Self {
            group_label: group_label.into(),
            display_name: format!(
                "{} {} - {}",
                event.display_time, event.name, channel.title
            ),
            media_url: media_url.into(),
        }
    }
}

/// Statistics of the update cycles, published together with the playlist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub last_run: Option<DateTime<Local>>,
    pub next_run: Option<DateTime<Local>>,
    pub event_count: usize,
    pub stream_count: usize,
    pub running: bool,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_keep_first_seen_order() {
        let mut channel = Channel::new("Line1");
        assert!(channel.push_candidate("https://b.example/play"));
        assert!(channel.push_candidate("https://a.example/page"));
        assert!(!channel.push_candidate("https://b.example/play"));

        let urls: Vec<&str> = channel.candidate_urls().collect();
        assert_eq!(urls, vec!["https://b.example/play", "https://a.example/page"]);
    }

    #[test]
    fn test_display_name() {
        let mut event = Event::new("L", "19:30", "A", "B");
        let channel = Channel::new("Line1");
        event.channels.push(channel.clone());

        let stream = ResolvedStream::new("JRS直播", &event, &channel, "https://cdn.example/x.m3u8");
        assert_eq!(stream.display_name, "19:30 [L] A vs B - Line1");
        assert_eq!(stream.group_label, "JRS直播");
    }
}
