//! Implémentation du trait LiveMonitorExt pour lmserver::Server

use crate::api_rest::create_router;
use crate::monitor::LiveMonitor;
use crate::server_ext::{LiveMonitorExt, LiveMonitorState};
use anyhow::Result;
use lmserver::Server;
use std::sync::Arc;
use tracing::info;

impl LiveMonitorExt for Server {
    async fn init_livemonitor(
        &mut self,
        monitor: Arc<LiveMonitor>,
    ) -> Result<Arc<LiveMonitorState>> {
        info!("Initializing LiveMonitor routes...");

        let state = LiveMonitorState::new(monitor, self.log_state());
        self.add_router("/", create_router(state.clone())).await;

        info!("Playlist available at /playlist.m3u");
        Ok(Arc::new(state))
    }
}
