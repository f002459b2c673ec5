mod common;

use axum::{
    Router,
    http::{Method, StatusCode},
    routing::get,
};
use axum_test::TestServer;
use portal_proxy::config::Config;
use serde_json::{Value, json};

const PLAYLIST: &str = "#EXTM3U\n\
#EXTINF:-1 tvg-id=\"bbc1\" tvg-logo=\"http://x/logo.png\" group-title=\"News\",BBC One\n\
http://stream.example/bbc1.m3u8\n\
#EXTINF:-1 tvg-id=\"itv\" group-title=\"General\",ITV\n\
http://stream.example/itv.m3u8\n";

async fn lists_server() -> String {
    common::serve(Router::new().route("/tv.m3u", get(|| async { PLAYLIST }))).await
}

async fn server_with(config: Config, playlists: Vec<Value>) -> TestServer {
    let store = common::store_with(playlists.into_iter().map(common::playlist).collect()).await;
    TestServer::new(common::app(config, store)).unwrap()
}

fn panel_playlist() -> Value {
    json!({
        "id": "panel",
        "name": "Panel",
        "type": "xtream",
        "sourceUrl": "http://panel.example:8080",
        "xtreamUsername": "alice",
        "xtreamPassword": "pw",
    })
}

#[tokio::test]
async fn health_endpoint() {
    let server = server_with(Config::default(), vec![]).await;

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn get_stream_resolves_xtream_id() {
    let server = server_with(Config::default(), vec![panel_playlist()]).await;

    let response = server
        .post("/api/channels/get-stream")
        .json(&json!({ "playlistId": "panel", "channelId": "77", "cmd": "77" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["url"], "http://panel.example:8080/live/alice/pw/77.ts");
    assert_eq!(body["dialect"], "xtream");
    assert_eq!(body["stale"], false);
}

#[tokio::test]
async fn get_stream_error_statuses() {
    let server = server_with(
        Config::default(),
        vec![json!({ "id": "lists", "name": "Lists", "type": "m3u", "sourceUrl": "http://lists.example/tv.m3u" })],
    )
    .await;

    let missing = server
        .post("/api/channels/get-stream")
        .json(&json!({ "playlistId": "nope", "channelId": "1" }))
        .await;
    missing.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(missing.json::<Value>()["success"], false);

    let unusable = server
        .post("/api/channels/get-stream")
        .json(&json!({ "playlistId": "lists", "channelId": "1", "cmd": "garbage" }))
        .await;
    unusable.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(unusable.json::<Value>()["message"], "No valid URL found in cmd");

    let incomplete = server
        .post("/api/channels/get-stream")
        .json(&json!({ "playlistId": "lists" }))
        .await;
    incomplete.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn api_token_gates_admin_routes_only() {
    let mut config = Config::default();
    config.web.api_token = Some("secret".to_string());
    let server = server_with(config, vec![panel_playlist()]).await;

    server
        .get("/api/playlists/panel/channels")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/api/playlists/panel/channels")
        .authorization_bearer("secret")
        .await
        .assert_status_ok();
    server.get("/api/proxy/test").await.assert_status_ok();
}

#[tokio::test]
async fn proxy_test_and_preflight() {
    let server = server_with(Config::default(), vec![]).await;

    let test = server.get("/api/proxy/test").await;
    test.assert_status_ok();
    assert_eq!(test.json::<Value>()["message"], "Proxy route is working");

    let preflight = server
        .method(Method::OPTIONS, "/api/proxy/stream")
        .add_header("origin", "http://player.example")
        .add_header("access-control-request-method", "GET")
        .add_header("access-control-request-headers", "range")
        .await;
    preflight.assert_status(StatusCode::NO_CONTENT);
    assert_eq!(preflight.header("access-control-allow-origin"), "*");
    assert_eq!(
        preflight.header("access-control-allow-methods"),
        "GET, OPTIONS"
    );
    assert_eq!(
        preflight.header("access-control-allow-headers"),
        "Range, Content-Type"
    );
    assert_eq!(preflight.header("access-control-max-age"), "86400");

    let no_url = server.get("/api/proxy/stream").await;
    no_url.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(no_url.json::<Value>()["error"], "URL is required");
}

#[tokio::test]
async fn connection_test_counts_m3u_channels() {
    let lists = lists_server().await;
    let server = server_with(Config::default(), vec![]).await;

    let response = server
        .post("/api/playlists/test-connection")
        .json(&json!({ "type": "m3u", "sourceUrl": format!("{lists}/tv.m3u") }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["channelsCount"], 2);
}

#[tokio::test]
async fn sync_then_list_channels() {
    let lists = lists_server().await;
    let server = server_with(
        Config::default(),
        vec![json!({
            "id": "lists",
            "name": "Lists",
            "type": "m3u",
            "sourceUrl": format!("{lists}/tv.m3u"),
            "channelSettings": [{ "channelId": "itv", "customOrder": 2 }],
        })],
    )
    .await;

    let sync = server.post("/api/playlists/lists/sync").await;
    sync.assert_status_ok();
    let outcome: Value = sync.json();
    assert_eq!(outcome["channelCount"], 2);
    assert_eq!(outcome["status"], "active");

    let channels: Value = server.get("/api/playlists/lists/channels").await.json();
    assert_eq!(channels["count"], 2);
    assert_eq!(channels["channels"][0]["channelId"], "itv");
    assert_eq!(channels["channels"][1]["name"], "BBC One");

    let all: Value = server.get("/api/channels").await.json();
    assert_eq!(all["count"], 2);
}

#[tokio::test]
async fn json_routes_answer_cors_preflight() {
    let mut config = Config::default();
    config.web.api_token = Some("secret".to_string());
    let server = server_with(config, vec![panel_playlist()]).await;

    let preflight = server
        .method(Method::OPTIONS, "/api/channels/get-stream")
        .add_header("origin", "http://admin.example")
        .add_header("access-control-request-method", "POST")
        .await;
    preflight.assert_status_ok();
    assert_eq!(preflight.header("access-control-allow-origin"), "*");
}

#[tokio::test]
async fn channel_stream_accepts_query_token() {
    let mut config = Config::default();
    config.web.api_token = Some("secret".to_string());
    let server = server_with(config, vec![panel_playlist()]).await;

    server
        .get("/api/channels/panel/missing/stream")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/api/channels/panel/missing/stream")
        .add_query_param("token", "wrong")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Past the gate the unknown channel is reported as missing
    server
        .get("/api/channels/panel/missing/stream")
        .add_query_param("token", "secret")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get("/api/channels/panel/missing/stream")
        .authorization_bearer("secret")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // Admin routes keep requiring the header
    server
        .get("/api/playlists/panel/channels")
        .add_query_param("token", "secret")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
