//! Extension lmserver pour LiveMonitor
//!
//! Ce module fournit un trait d'extension pour ajouter la playlist, le
//! tableau de bord et le déclenchement manuel à un serveur lmserver.

use crate::monitor::LiveMonitor;
use anyhow::Result;
use lmserver::LogState;
use std::sync::Arc;

/// État partagé pour les handlers LiveMonitor
#[derive(Clone)]
pub struct LiveMonitorState {
    pub monitor: Arc<LiveMonitor>,
    /// Buffer de logs affiché par le tableau de bord
    pub logs: Option<LogState>,
}

impl LiveMonitorState {
    pub fn new(monitor: Arc<LiveMonitor>, logs: Option<LogState>) -> Self {
        Self { monitor, logs }
    }
}

/// Trait pour étendre lmserver avec les routes LiveMonitor
///
/// `lmserver` reste un serveur HTTP générique ; `lmjrs` lui ajoute ses
/// routes via ce trait sans que le serveur dépende de `lmjrs`.
///
/// # Exemple
///
/// ```rust,no_run
/// use lmjrs::{LiveMonitor, LiveMonitorExt};
/// use lmserver::ServerBuilder;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut server = ServerBuilder::new_configured().build();
///     server.init_logging().await;
///
///     let monitor = Arc::new(LiveMonitor::from_config(&lmconfig::get_config())?);
///     server.init_livemonitor(monitor).await?;
///
///     server.start().await?;
///     server.wait().await;
///     Ok(())
/// }
/// ```
pub trait LiveMonitorExt {
    /// Enregistre les routes LiveMonitor
    ///
    /// # Routes enregistrées
    ///
    /// - `GET /playlist.m3u` - Playlist courante
    /// - `GET /` - Tableau de bord
    /// - `GET /api/status` - Statistiques du dernier cycle (JSON)
    /// - `GET|POST /refresh` - Lance un cycle puis redirige vers `/`
    ///
    /// Appeler `init_logging()` avant pour que le tableau de bord affiche les logs.
    async fn init_livemonitor(&mut self, monitor: Arc<LiveMonitor>)
    -> Result<Arc<LiveMonitorState>>;
}

// L'implémentation est dans server_impl.rs
