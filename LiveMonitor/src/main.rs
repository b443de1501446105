use lmconfig::get_config;
use lmjrs::{LiveMonitor, LiveMonitorExt, spawn_scheduler};
use lmserver::ServerBuilder;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ========== PHASE 1 : Infrastructure HTTP ==========

    let mut server = ServerBuilder::new_configured().build();
    server.init_logging().await;

    server
        .add_route("/info", || async {
            serde_json::json!({"name": "LiveMonitor", "version": env!("CARGO_PKG_VERSION")})
        })
        .await;

    // ========== PHASE 2 : Configuration métier ==========

    info!("📺 Initializing JRS live monitor...");
    let monitor = Arc::new(LiveMonitor::from_config(&get_config())?);
    server.init_livemonitor(monitor.clone()).await?;

    // ========== PHASE 3 : Démarrage ==========

    info!("🌐 Starting HTTP server...");
    server.start().await?;

    // Le premier cycle attend le délai de démarrage, le serveur répond déjà
    let scheduler = spawn_scheduler(monitor);

    info!("✅ LiveMonitor is ready!");
    info!("Press Ctrl+C to stop...");
    server.wait().await;
    scheduler.abort();

    Ok(())
}
