//! JRS live schedule harvester for LiveMonitor
//!
//! This crate turns the JRS schedule feed into an extended M3U playlist of
//! directly playable HLS streams.
//!
//! # Pipeline
//!
//! One update cycle runs the following steps in order:
//!
//! - **Feed**: fetch the schedule script with a cache-busting parameter
//!   ([`FeedClient`])
//! - **Unwrap**: join the `document.write('…')` fragments into one HTML
//!   document ([`unwrap_feed`])
//! - **Extract**: read events and their broadcast channels
//!   ([`extract_events`])
//! - **Resolve**: turn each channel's candidate pages into a `.m3u8` URL,
//!   following embedded frames ([`StreamResolver`])
//! - **Publish**: render the playlist and swap it in together with the run
//!   statistics ([`LiveMonitor`])
//!
//! # Example
//!
//! ```no_run
//! use lmjrs::LiveMonitor;
//! use lmconfig::get_config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let monitor = LiveMonitor::from_config(&get_config())?;
//!     monitor.trigger().await;
//!
//!     println!("{}", monitor.playlist());
//!     println!("{:?}", monitor.stats());
//!     Ok(())
//! }
//! ```
//!
//! # Server Integration
//!
//! With the `server` feature (enabled by default), [`LiveMonitorExt`] adds
//! the playlist, dashboard, status and refresh routes to an
//! `lmserver::Server`, and [`spawn_scheduler`] drives the periodic updates.

pub mod client;
pub mod config_ext;
pub mod error;
pub mod feed;
pub mod models;
pub mod monitor;
pub mod playlist;
pub mod resolver;
pub mod scheduler;

#[cfg(feature = "server")]
pub mod api_rest;

#[cfg(feature = "server")]
pub mod server_ext;

#[cfg(feature = "server")]
mod server_impl;

// Re-exports
pub use client::{ClientBuilder, FeedClient, PageFetcher};
pub use config_ext::LiveMonitorConfigExt;
pub use error::{Error, Result};
pub use feed::{extract_events, unwrap_feed};
pub use models::{Channel, Event, ResolvedStream, RunStats};
pub use monitor::{LiveMonitor, MonitorSettings, Snapshot};
pub use playlist::{M3U_CONTENT_TYPE, build_playlist};
pub use resolver::{ResolverOptions, StreamResolver};
pub use scheduler::spawn_scheduler;

#[cfg(feature = "server")]
pub use server_ext::{LiveMonitorExt, LiveMonitorState};
