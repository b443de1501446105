//! Integration tests for lmjrs

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header as http_header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lmjrs::api_rest::create_router;
use lmjrs::{
    Channel, FeedClient, LiveMonitor, LiveMonitorState, MonitorSettings, ResolverOptions,
    StreamResolver,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_AGENT: &str = "LiveMonitor-tests";

fn client_for(server: &MockServer) -> FeedClient {
    FeedClient::builder()
        .source_url(format!("{}/index.js?t_5", server.uri()))
        .user_agent(TEST_AGENT)
        .build()
        .unwrap()
}

fn resolver_for(client: &FeedClient, max_depth: usize) -> StreamResolver {
    let options = ResolverOptions {
        max_depth,
        page_timeout: Duration::from_secs(2),
        frame_timeout: Duration::from_secs(2),
        throttle: Duration::ZERO,
        ..ResolverOptions::default()
    };
    StreamResolver::new(Arc::new(client.clone()), options)
}

fn monitor_for(server: &MockServer) -> Arc<LiveMonitor> {
    let client = client_for(server);
    let resolver = resolver_for(&client, 2);
    Arc::new(LiveMonitor::new(client, resolver, MonitorSettings::default()))
}

/// A feed script with one event and one channel
fn feed_script(candidate: &str) -> String {
    let fragments = [
        r#"<ul class="item"><li class="lab_events">L</li><li class="lab_time">19:30</li>"#.to_string(),
        r#"<li class="lab_team_home"><strong>A</strong></li><li class="lab_team_away"><strong>B</strong></li>"#.to_string(),
        format!(r#"<li class="lab_channel"><a class="item" data-play="{}">Line1</a></li></ul>"#, candidate),
    ];
    fragments
        .iter()
        .map(|f| format!("document.write('{}');\n", f))
        .collect()
}

async fn mount_feed(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path("/index.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

// ============================================================================
// Feed client
// ============================================================================

#[tokio::test]
async fn test_feed_request_headers_and_cache_buster() {
    let mock_server = MockServer::start().await;
    mount_feed(&mock_server, "document.write('x');".to_string()).await;

    let client = client_for(&mock_server);
    let first = client.fetch_feed().await.unwrap();
    client.fetch_feed().await.unwrap();
    assert_eq!(first, "document.write('x');");

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let busters: Vec<u64> = requests
        .iter()
        .map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "_")
                .and_then(|(_, v)| v.parse().ok())
                .unwrap()
        })
        .collect();
    assert!(busters[1] > busters[0]);

    let req = &requests[0];
    assert!(req.url.query_pairs().any(|(k, _)| k == "t_5"));
    assert_eq!(req.headers.get("referer").unwrap(), "https://www.jrs21.com/");
    assert_eq!(req.headers.get("user-agent").unwrap(), TEST_AGENT);
}

#[tokio::test]
async fn test_feed_http_status_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.js"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let err = client_for(&mock_server).fetch_feed().await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_feed_transport_failure() {
    let client = FeedClient::builder()
        .source_url("http://127.0.0.1:1/index.js")
        .build()
        .unwrap();
    let err = client.fetch_feed().await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.status(), None);
}

// ============================================================================
// Stream resolver
// ============================================================================

#[tokio::test]
async fn test_frame_recursion_within_ceiling() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/inner"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<script>play("https://cdn.example/live/inner.m3u8")</script>"#),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let page_url = format!("{}/outer", mock_server.uri());
    let outer = r#"<html><body><iframe src="/inner"></iframe></body></html>"#;

    let resolver = resolver_for(&client, 1);
    assert_eq!(
        resolver.resolve(outer, &page_url, 0).await.as_deref(),
        Some("https://cdn.example/live/inner.m3u8")
    );
}

#[tokio::test]
async fn test_frame_recursion_disabled_at_ceiling_zero() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/inner"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#""https://cdn.example/live/inner.m3u8""#),
        )
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let page_url = format!("{}/outer", mock_server.uri());
    let outer = r#"<iframe src="/inner"></iframe>"#;

    let resolver = resolver_for(&client, 0);
    assert_eq!(resolver.resolve(outer, &page_url, 0).await, None);
}

#[tokio::test]
async fn test_frame_fetch_uses_page_as_referer() {
    let mock_server = MockServer::start().await;
    let page_url = format!("{}/outer", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/inner"))
        .and(header("referer", page_url.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"src='https://cdn.example/r.m3u8'"#),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let outer = r#"<iframe src="inner"></iframe>"#;
    let resolver = resolver_for(&client, 2);
    assert_eq!(
        resolver.resolve(outer, &page_url, 0).await.as_deref(),
        Some("https://cdn.example/r.m3u8")
    );
}

#[tokio::test]
async fn test_failing_frame_does_not_stop_the_next_one() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/working"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#""https://cdn.example/ok.m3u8""#),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let page_url = format!("{}/outer", mock_server.uri());
    let outer = r#"<iframe src="/broken"></iframe><iframe src="/working"></iframe>"#;
    let resolver = resolver_for(&client, 1);
    assert_eq!(
        resolver.resolve(outer, &page_url, 0).await.as_deref(),
        Some("https://cdn.example/ok.m3u8")
    );
}

#[tokio::test]
async fn test_self_referencing_frame_terminates() {
    let mock_server = MockServer::start().await;
    let looping = r#"<html><body><iframe src="/loop"></iframe></body></html>"#;

    // depth 0 and depth 1 fetch the frame, depth 2 stops
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(200).set_body_string(looping))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let page_url = format!("{}/loop", mock_server.uri());
    let resolver = resolver_for(&client, 2);
    assert_eq!(resolver.resolve(looping, &page_url, 0).await, None);
}

#[tokio::test]
async fn test_resolve_is_repeatable() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/inner"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#""https://cdn.example/same.m3u8""#),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let page_url = format!("{}/outer", mock_server.uri());
    let outer = r#"<iframe src="/inner"></iframe>"#;
    let resolver = resolver_for(&client, 2);

    let first = resolver.resolve(outer, &page_url, 0).await;
    let second = resolver.resolve(outer, &page_url, 0).await;
    assert_eq!(first, second);
    assert!(first.is_some());
}

#[tokio::test]
async fn test_direct_literal_wins_over_base64() {
    let client = FeedClient::new().unwrap();
    let resolver = resolver_for(&client, 2);
    let hidden = STANDARD.encode("https://cdn.example/decoded.m3u8");
    let page = format!(
        r#"var a = "{}"; var b = "https://cdn.example/direct.m3u8";"#,
        hidden
    );
    assert_eq!(
        resolver
            .resolve(&page, "https://player.example/p", 0)
            .await
            .as_deref(),
        Some("https://cdn.example/direct.m3u8")
    );
}

#[tokio::test]
async fn test_candidate_order_stops_at_first_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"player.src("https://cdn.example/b.m3u8");"#),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#""https://cdn.example/c.m3u8""#),
        )
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut channel = Channel::new("Line1");
    channel.push_candidate("http://127.0.0.1:1/a");
    channel.push_candidate(format!("{}/b", mock_server.uri()));
    channel.push_candidate(format!("{}/c", mock_server.uri()));

    let client = client_for(&mock_server);
    let resolver = resolver_for(&client, 2);
    assert_eq!(
        resolver.resolve_channel(&channel).await.as_deref(),
        Some("https://cdn.example/b.m3u8")
    );
}

#[tokio::test]
async fn test_player_config_page_end_to_end() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/player"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<script>var p = new Player({ source: "https://cdn.example/s.m3u8", autoplay: true });</script>"#,
        ))
        .mount(&mock_server)
        .await;

    let mut channel = Channel::new("Line1");
    channel.push_candidate(format!("{}/player", mock_server.uri()));

    let client = client_for(&mock_server);
    let resolver = resolver_for(&client, 2);
    assert_eq!(
        resolver.resolve_channel(&channel).await.as_deref(),
        Some("https://cdn.example/s.m3u8")
    );
}

#[tokio::test]
async fn test_media_candidate_is_not_fetched() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut channel = Channel::new("Line1");
    channel.push_candidate(format!("{}/live/x.m3u8?token=1", mock_server.uri()));

    let client = client_for(&mock_server);
    let resolver = resolver_for(&client, 2);
    assert_eq!(
        resolver.resolve_channel(&channel).await,
        Some(format!("{}/live/x.m3u8?token=1", mock_server.uri()))
    );
}

// ============================================================================
// Orchestrator
// ============================================================================

#[tokio::test]
async fn test_cycle_publishes_playlist() {
    let mock_server = MockServer::start().await;
    mount_feed(&mock_server, feed_script("https://cdn.example/live/x.m3u8")).await;

    let monitor = monitor_for(&mock_server);
    assert!(monitor.trigger().await);

    let playlist = monitor.playlist();
    let lines: Vec<&str> = playlist.lines().collect();
    assert_eq!(lines[0], "#EXTM3U");
    assert_eq!(
        lines[1],
        "#EXTINF:-1 group-title=\"JRS直播\", 19:30 [L] A vs B - Line1"
    );
    assert_eq!(lines[2], "https://cdn.example/live/x.m3u8");
    assert_eq!(lines.len(), 3);

    let stats = monitor.stats();
    assert_eq!(stats.event_count, 1);
    assert_eq!(stats.stream_count, 1);
    assert!(!stats.running);
    assert!(stats.last_error.is_none());
    assert!(stats.next_run > stats.last_run);
}

#[tokio::test]
async fn test_failed_cycle_keeps_previous_playlist() {
    let mock_server = MockServer::start().await;
    mount_feed(&mock_server, feed_script("https://cdn.example/live/x.m3u8")).await;

    let monitor = monitor_for(&mock_server);
    monitor.trigger().await;
    let before = monitor.playlist();
    let first_run = monitor.stats().last_run;

    mock_server.reset().await;
    Mock::given(method("GET"))
        .and(path("/index.js"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    assert!(monitor.trigger().await);

    assert_eq!(monitor.playlist().as_bytes(), before.as_bytes());
    let stats = monitor.stats();
    let error = stats.last_error.unwrap();
    assert!(error.contains("503"), "{}", error);
    assert_eq!(stats.event_count, 1);
    assert!(!stats.running);
    assert!(stats.last_run >= first_run);
}

#[tokio::test]
async fn test_empty_feed_is_a_handled_failure() {
    let mock_server = MockServer::start().await;
    mount_feed(&mock_server, "console.log('maintenance');".to_string()).await;

    let monitor = monitor_for(&mock_server);
    monitor.trigger().await;

    assert_eq!(&*monitor.playlist(), "#EXTM3U\n");
    assert!(monitor.stats().last_error.is_some());
}

#[tokio::test]
async fn test_error_is_cleared_by_next_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.js"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_feed(&mock_server, feed_script("https://cdn.example/live/x.m3u8")).await;

    let monitor = monitor_for(&mock_server);
    monitor.trigger().await;
    assert!(monitor.stats().last_error.is_some());

    monitor.trigger().await;
    assert!(monitor.stats().last_error.is_none());
    assert_eq!(monitor.stats().stream_count, 1);
}

#[tokio::test]
async fn test_overlapping_trigger_is_ignored() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.js"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(feed_script("https://cdn.example/live/x.m3u8"))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let monitor = monitor_for(&mock_server);
    let (first, second) = tokio::join!(monitor.trigger(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let running = monitor.stats().running;
        (running, monitor.trigger().await)
    });

    assert!(first);
    assert_eq!(second, (true, false));
    assert_eq!(monitor.stats().stream_count, 1);
}

// ============================================================================
// HTTP routes
// ============================================================================

async fn send(router: &axum::Router, method: Method, uri: &str) -> axum::response::Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

#[tokio::test]
async fn test_routes() {
    let mock_server = MockServer::start().await;
    mount_feed(&mock_server, feed_script("https://cdn.example/live/x.m3u8")).await;

    let monitor = monitor_for(&mock_server);
    monitor.trigger().await;
    let router = create_router(LiveMonitorState::new(monitor.clone(), None));

    let response = send(&router, Method::GET, "/playlist.m3u").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(http_header::CONTENT_TYPE).unwrap(),
        "audio/x-mpegurl"
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], monitor.playlist().as_bytes());

    let response = send(&router, Method::GET, "/api/status").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let status: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(status["event_count"], 1);
    assert_eq!(status["stream_count"], 1);
    assert_eq!(status["running"], false);

    let response = send(&router, Method::GET, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("<li>Streams: 1</li>"));

    let response = send(&router, Method::POST, "/refresh").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(http_header::LOCATION).unwrap(), "/");
}
