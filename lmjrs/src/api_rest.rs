//! Endpoints HTTP de LiveMonitor
//!
//! Ce module définit les handlers de la playlist, du tableau de bord, du
//! statut JSON et du déclenchement manuel.

use crate::models::RunStats;
use crate::playlist::M3U_CONTENT_TYPE;
use crate::server_ext::LiveMonitorState;
use axum::{
    Json, Router,
    extract::State,
    http::header,
    response::{Html, IntoResponse, Redirect},
    routing::get,
};
use chrono::{DateTime, Local};
use lmserver::LogEntry;
use std::fmt::Write;
use tracing::info;

/// Nombre de lignes de log affichées par le tableau de bord
pub const DASHBOARD_LOG_LINES: usize = 100;

/// Crée le router LiveMonitor
pub fn create_router(state: LiveMonitorState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/playlist.m3u", get(playlist))
        .route("/api/status", get(status))
        .route("/refresh", get(refresh).post(refresh))
        .with_state(state)
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /playlist.m3u
async fn playlist(State(state): State<LiveMonitorState>) -> impl IntoResponse {
    let body = state.monitor.playlist().to_string();
    (
        [
            (header::CONTENT_TYPE, M3U_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
}

/// GET /api/status
async fn status(State(state): State<LiveMonitorState>) -> Json<RunStats> {
    Json(state.monitor.stats())
}

/// GET|POST /refresh
/// Lance un cycle en tâche de fond et redirige vers le tableau de bord
async fn refresh(State(state): State<LiveMonitorState>) -> Redirect {
    if state.monitor.is_running() {
        info!("Manual refresh requested while an update is running");
    } else {
        info!("Manual refresh requested");
        let monitor = state.monitor.clone();
        tokio::spawn(async move {
            monitor.trigger().await;
        });
    }
    Redirect::to("/")
}

/// GET /
async fn dashboard(State(state): State<LiveMonitorState>) -> Html<String> {
    let logs = state
        .logs
        .as_ref()
        .map(|logs| logs.recent(DASHBOARD_LOG_LINES))
        .unwrap_or_default();
    Html(render_dashboard(&state.monitor.stats(), &logs))
}

// ============================================================================
// Rendering
// ============================================================================

fn render_dashboard(stats: &RunStats, logs: &[LogEntry]) -> String {
    let state = if stats.running { "🔄 Running" } else { "💤 Idle" };
    let error = stats
        .last_error
        .as_deref()
        .map(|e| format!(r#"<p class="error">Last error: {}</p>"#, escape_html(e)))
        .unwrap_or_default();

    let mut rows = String::new();
    for entry in logs {
        let time: DateTime<Local> = entry.timestamp.into();
        let _ = writeln!(
            rows,
            r#"<tr class="{level}"><td>{time}</td><td>{level}</td><td>{message}</td></tr>"#,
            time = time.format("%Y-%m-%d %H:%M:%S"),
            level = escape_html(&entry.level),
            message = escape_html(&entry.message),
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>LiveMonitor</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
table {{ border-collapse: collapse; }}
td {{ padding: 2px 8px; font-family: monospace; vertical-align: top; }}
.error {{ color: #b00; }}
tr.ERROR td {{ color: #b00; }}
tr.WARN td {{ color: #a60; }}
</style>
</head>
<body>
<h1>LiveMonitor</h1>
<p>Playlist: <a href="/playlist.m3u">/playlist.m3u</a></p>
<ul>
<li>State: {state}</li>
<li>Last run: {last_run}</li>
<li>Next run: {next_run}</li>
<li>Events: {events}</li>
<li>Streams: {streams}</li>
</ul>
{error}
<form method="post" action="/refresh"><button type="submit">Refresh now</button></form>
<h2>Recent logs</h2>
<table>
{rows}</table>
</body>
</html>
"#,
        state = state,
        last_run = format_time(stats.last_run),
        next_run = format_time(stats.next_run),
        events = stats.event_count,
        streams = stats.stream_count,
        error = error,
        rows = rows,
    )
}

fn format_time(time: Option<DateTime<Local>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_dashboard_shows_stats_and_logs() {
        let stats = RunStats {
            event_count: 3,
            stream_count: 2,
            last_error: Some("HTTP status 503 for <feed>".to_string()),
            ..RunStats::default()
        };
        let logs = vec![LogEntry {
            timestamp: SystemTime::now(),
            level: "WARN".to_string(),
            target: "lmjrs".to_string(),
            message: "candidate <b> unavailable".to_string(),
        }];

        let html = render_dashboard(&stats, &logs);
        assert!(html.contains("<li>Events: 3</li>"));
        assert!(html.contains("<li>Streams: 2</li>"));
        assert!(html.contains("HTTP status 503 for &lt;feed&gt;"));
        assert!(html.contains("candidate &lt;b&gt; unavailable"));
        assert!(html.contains("<li>Last run: -</li>"));
    }
}
