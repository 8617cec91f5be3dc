use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt as _;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use coursemap::app::{AppState, router};
use coursemap::map::{ContentForest, Course, Node};
use coursemap::snapshot::SnapshotStore;

struct Fixture {
    _dir: tempfile::TempDir,
    state: AppState,
    snapshot: SnapshotStore,
    settings_path: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = SnapshotStore::new(dir.path().join("map.json"));
    let settings_path = dir.path().join("config").join("settings.json");
    let state = AppState::new(snapshot.clone(), &settings_path);
    Fixture {
        _dir: dir,
        state,
        snapshot,
        settings_path,
    }
}

fn sample_forest() -> ContentForest {
    let mut forest = ContentForest::new();
    forest
        .push(Course::new(
            "Course A",
            vec![Node::folder(
                "s1",
                "Week 1",
                vec![Node::module("m1", "Intro", Vec::new())],
            )],
        ))
        .unwrap();
    forest
}

async fn send(state: AppState, req: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, body, content_type)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn healthz_is_ok() {
    let fx = fixture();
    let (status, body, _) = send(fx.state, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok\n");
}

#[tokio::test]
async fn stats_without_snapshot_are_zero() {
    let fx = fixture();
    let (status, body, _) = send(fx.state, get("/api/stats")).await;
    assert_eq!(status, StatusCode::OK);

    let stats: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats["courses"], 0);
    assert_eq!(stats["modules"], 0);
    assert_eq!(stats["sets"], 0);
    assert_eq!(stats["videos"], 0);
    assert_eq!(stats["attachments"], 0);
    assert_eq!(stats["has_snapshot"], false);
    assert_eq!(stats["has_settings"], false);
}

#[tokio::test]
async fn map_is_404_until_assembled() {
    let fx = fixture();
    let (status, body, _) = send(fx.state.clone(), get("/api/map")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({ "error": "No map found. Run the mapper first." }));

    fx.snapshot.save(&sample_forest()).unwrap();
    let (status, body, _) = send(fx.state.clone(), get("/api/map")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    let module = &body["courses"][0]["details"]["hierarchy"][0]["children"][0];
    assert_eq!(module["id"], "m1");
    assert_eq!(module["unitType"], "module");
    assert_eq!(module["metadata"], json!({}));

    let (_, body, _) = send(fx.state, get("/api/stats")).await;
    let stats: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats["modules"], 1);
    assert_eq!(stats["sets"], 1);
    assert_eq!(stats["has_snapshot"], true);
}

#[tokio::test]
async fn outline_is_markdown() {
    let fx = fixture();
    let (status, _, _) = send(fx.state.clone(), get("/api/outline")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    fx.snapshot.save(&sample_forest()).unwrap();
    let (status, body, content_type) = send(fx.state, get("/api/outline")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/markdown; charset=utf-8"));
    let body = String::from_utf8(body).unwrap();
    assert!(body.starts_with("# Community Map\n"));
    assert!(body.contains("- **Week 1**\n  - Intro\n"));
}

#[tokio::test]
async fn settings_post_merges_and_persists() {
    let fx = fixture();
    std::fs::create_dir_all(fx.settings_path.parent().unwrap()).unwrap();
    std::fs::write(&fx.settings_path, r#"{"output_dir": "out", "theme": "dark"}"#).unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/api/settings")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"target_url": "https://example.com/group"}"#))
        .unwrap();
    let (status, body, _) = send(fx.state.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({ "success": true }));

    let (status, body, _) = send(fx.state.clone(), get("/api/settings")).await;
    assert_eq!(status, StatusCode::OK);
    let settings: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(settings["target_url"], "https://example.com/group");
    assert_eq!(settings["output_dir"], "out");
    assert_eq!(settings["theme"], "dark");

    let (_, body, _) = send(fx.state, get("/api/stats")).await;
    let stats: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats["has_settings"], true);
    assert_eq!(stats["target_url"], "https://example.com/group");
}

#[tokio::test]
async fn settings_post_rejects_non_object_body() {
    let fx = fixture();
    let req = Request::builder()
        .method("POST")
        .uri("/api/settings")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("[1, 2]"))
        .unwrap();
    let (status, _, _) = send(fx.state, req).await;
    assert!(status.is_client_error());
    assert!(!fx.settings_path.exists());
}

#[tokio::test]
async fn stats_survive_mistyped_settings_file() {
    let fx = fixture();
    std::fs::create_dir_all(fx.settings_path.parent().unwrap()).unwrap();
    std::fs::write(
        &fx.settings_path,
        r#"{"target_url": "https://x", "resource_hosts": null, "output_dir": 7}"#,
    )
    .unwrap();

    let (status, body, _) = send(fx.state.clone(), get("/api/stats")).await;
    assert_eq!(status, StatusCode::OK);
    let stats: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats["has_settings"], true);
    assert_eq!(stats["target_url"], "https://x");

    let (status, body, _) = send(fx.state, get("/api/settings")).await;
    assert_eq!(status, StatusCode::OK);
    let settings: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(settings, json!({ "target_url": "https://x" }));
}

#[tokio::test]
async fn settings_post_rejects_mistyped_known_key() {
    let fx = fixture();
    std::fs::create_dir_all(fx.settings_path.parent().unwrap()).unwrap();
    std::fs::write(&fx.settings_path, r#"{"target_url": "https://x"}"#).unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/api/settings")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"target_url": 42}"#))
        .unwrap();
    let (status, body, _) = send(fx.state, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8(body).unwrap().contains("target_url"));

    let stored = std::fs::read_to_string(&fx.settings_path).unwrap();
    assert_eq!(stored, r#"{"target_url": "https://x"}"#);
}
