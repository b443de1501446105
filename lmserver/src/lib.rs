//! # lmserver - Serveur web haut niveau basé sur Axum
//!
//! Cette crate fournit une abstraction simple pour exposer LiveMonitor en HTTP
//! avec Axum, ainsi que le puits de logs consulté par le tableau de bord.
//!
//! ## Fonctionnalités
//!
//! - 🚀 **API de haut niveau** : routes JSON, handlers avec état, redirections
//! - 📡 **Server-Sent Events (SSE)** : logs en temps réel via `/log-sse`
//! - 🧾 **Buffer circulaire** : les N derniers logs, lisibles par le dashboard
//! - ⚡ **Arrêt gracieux** : gestion propre de l'arrêt sur Ctrl+C
//!
//! ## Architecture
//!
//! - [`server`] : implémentation du serveur principal et du builder
//! - [`logs`] : buffer de logs, layer `tracing` et handlers HTTP associés
//!
//! ## Exemple d'utilisation
//!
//! ```rust,no_run
//! use lmserver::ServerBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = ServerBuilder::new("MyServer", "localhost", 8080).build();
//!     server.init_logging().await;
//!
//!     server.add_route("/api/status", || async {
//!         serde_json::json!({"status": "ok"})
//!     }).await;
//!
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod logs;
pub mod server;

pub use logs::{BufferLayer, LogEntry, LogState, log_dump, log_sse};
pub use server::{Server, ServerBuilder, ServerInfo};
