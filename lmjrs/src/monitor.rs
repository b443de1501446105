//! Update orchestrator
//!
//! [`LiveMonitor`] runs the whole pipeline (feed → fragments → events →
//! streams → playlist) and publishes the playlist together with its run
//! statistics as one immutable [`Snapshot`].
//!
//! # Publishing
//!
//! Readers clone an `Arc<Snapshot>` and never see a half-written playlist or
//! statistics coming from two different cycles. The lock is only held for
//! the pointer clone or swap, never across an await.
//!
//! # Single flight
//!
//! [`LiveMonitor::trigger`] returns immediately when a cycle is already
//! running, so the scheduler and the manual refresh endpoint can call it
//! freely.

use crate::client::FeedClient;
use crate::config_ext::LiveMonitorConfigExt;
use crate::error::{Error, Result};
use crate::feed::{extract_events, unwrap_feed};
use crate::models::{ResolvedStream, RunStats};
use crate::playlist::{build_playlist, empty_playlist};
use crate::resolver::{ResolverOptions, StreamResolver};
use chrono::Local;
use futures::FutureExt;
use lmconfig::Config;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default playlist group label
pub const DEFAULT_GROUP_LABEL: &str = "JRS直播";

/// Published state: a playlist and the statistics of the cycle that made it
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub playlist: Arc<str>,
    pub stats: RunStats,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            playlist: Arc::from(empty_playlist()),
            stats: RunStats::default(),
        }
    }
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub group_label: String,
    /// Delay between two scheduled cycles
    pub interval: Duration,
    /// Delay before the first scheduled cycle
    pub startup_delay: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            group_label: DEFAULT_GROUP_LABEL.to_string(),
            interval: Duration::from_secs(300),
            startup_delay: Duration::from_secs(5),
        }
    }
}

/// Result of a successful cycle
struct CycleOutput {
    playlist: String,
    event_count: usize,
    stream_count: usize,
}

/// Periodic playlist builder
pub struct LiveMonitor {
    client: FeedClient,
    resolver: StreamResolver,
    settings: MonitorSettings,
    running: AtomicBool,
    published: RwLock<Arc<Snapshot>>,
}

impl LiveMonitor {
    pub fn new(client: FeedClient, resolver: StreamResolver, settings: MonitorSettings) -> Self {
        Self {
            client,
            resolver,
            settings,
            running: AtomicBool::new(false),
            published: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Builds the client, the resolver and the settings from the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = FeedClient::builder()
            .source_url(config.get_source_url()?)
            .referer(config.get_referer()?)
            .timeout(config.get_feed_timeout()?)
            .build()?;

        let options = ResolverOptions {
            max_depth: config.get_resolver_max_depth()?,
            min_base64_len: config.get_min_base64_len()?,
            page_timeout: config.get_page_timeout()?,
            frame_timeout: config.get_frame_timeout()?,
            throttle: config.get_throttle()?,
        };
        let resolver = StreamResolver::new(Arc::new(client.clone()), options);

        let settings = MonitorSettings {
            group_label: config.get_group_label()?,
            interval: config.get_fetch_interval()?,
            startup_delay: config.get_startup_delay()?,
        };

        info!(
            "LiveMonitor configured: source={} interval={}s",
            client.source_url(),
            settings.interval.as_secs()
        );

        Ok(Self::new(client, resolver, settings))
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Current published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn playlist(&self) -> Arc<str> {
        self.snapshot().playlist.clone()
    }

    pub fn stats(&self) -> RunStats {
        self.snapshot().stats.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn publish(&self, snapshot: Snapshot) {
        *self
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    }

    /// Runs one update cycle unless one is already running
    ///
    /// Returns `false` when the call was ignored. Failures, panics included,
    /// are recorded in the statistics and keep the previous playlist.
    pub async fn trigger(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Update already running, trigger ignored");
            return false;
        }

        info!("🔄 Starting update cycle");
        let previous = self.snapshot();
        self.publish(Snapshot {
            playlist: previous.playlist.clone(),
            stats: RunStats {
                running: true,
                last_error: None,
                ..previous.stats.clone()
            },
        });

        let outcome = AssertUnwindSafe(self.run_cycle()).catch_unwind().await;

        let finished = Local::now();
        let next_run = chrono::Duration::from_std(self.settings.interval)
            .ok()
            .and_then(|interval| finished.checked_add_signed(interval));

        let previous = self.snapshot();
        let snapshot = match outcome {
            Ok(Ok(cycle)) => {
                info!(
                    "✅ Update finished: {} event(s), {} stream(s)",
                    cycle.event_count, cycle.stream_count
                );
                Snapshot {
                    playlist: Arc::from(cycle.playlist),
                    stats: RunStats {
                        last_run: Some(finished),
                        next_run,
                        event_count: cycle.event_count,
                        stream_count: cycle.stream_count,
                        running: false,
                        last_error: None,
                    },
                }
            }
            Ok(Err(e)) => self.failed(&previous, e.to_string(), finished, next_run),
            Err(panic) => {
                let message = format!("update cycle panicked: {}", panic_message(&*panic));
                self.failed(&previous, message, finished, next_run)
            }
        };

        self.publish(snapshot);
        self.running.store(false, Ordering::Release);
        true
    }

    fn failed(
        &self,
        previous: &Snapshot,
        message: String,
        finished: chrono::DateTime<Local>,
        next_run: Option<chrono::DateTime<Local>>,
    ) -> Snapshot {
        error!("❌ Update failed, keeping previous playlist: {}", message);
        Snapshot {
            playlist: previous.playlist.clone(),
            stats: RunStats {
                last_run: Some(finished),
                next_run,
                running: false,
                last_error: Some(message),
                ..previous.stats.clone()
            },
        }
    }

    async fn run_cycle(&self) -> Result<CycleOutput> {
        let raw = self.client.fetch_feed().await?;
        let html = unwrap_feed(&raw);
        let events = extract_events(&html);
        if events.is_empty() {
            warn!("⚠️ No events extracted from the feed");
            return Err(Error::NoEvents);
        }
        info!("📋 {} event(s) extracted", events.len());

        let mut streams = Vec::new();
        for event in &events {
            for channel in &event.channels {
                match self.resolver.resolve_channel(channel).await {
                    Some(url) => {
                        debug!("🎯 {} - {} → {}", event.name, channel.title, url);
                        streams.push(ResolvedStream::new(
                            &self.settings.group_label,
                            event,
                            channel,
                            url,
                        ));
                    }
                    None => debug!("Unresolved channel {} - {}", event.name, channel.title),
                }
            }
        }

        Ok(CycleOutput {
            playlist: build_playlist(&streams),
            event_count: events.len(),
            stream_count: streams.len(),
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> LiveMonitor {
        let client = FeedClient::builder()
            .source_url("http://127.0.0.1:1/index.js?t_5")
            .build()
            .unwrap();
        let resolver = StreamResolver::new(Arc::new(client.clone()), ResolverOptions::default());
        LiveMonitor::new(client, resolver, MonitorSettings::default())
    }

    #[test]
    fn test_initial_snapshot() {
        let monitor = monitor();
        assert_eq!(&*monitor.playlist(), "#EXTM3U\n");
        let stats = monitor.stats();
        assert!(!stats.running);
        assert!(stats.last_run.is_none());
        assert!(stats.last_error.is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_is_recorded() {
        let monitor = monitor();
        assert!(monitor.trigger().await);

        let stats = monitor.stats();
        assert!(!stats.running);
        assert!(stats.last_run.is_some());
        assert!(stats.next_run > stats.last_run);
        assert!(stats.last_error.is_some());
        assert_eq!(&*monitor.playlist(), "#EXTM3U\n");
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_trigger_is_ignored_while_running() {
        let monitor = monitor();
        monitor.running.store(true, Ordering::Release);
        assert!(!monitor.trigger().await);
        assert!(monitor.stats().last_run.is_none());
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*boxed), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*boxed), "bang");
    }
}
