#![cfg(feature = "web")]

mod common;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::Router;
use common::{FlakyStore, rows_named};
use leaderboard::AppConfig;
use leaderboard::app::{AppState, router};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tower::ServiceExt;

fn config() -> AppConfig {
    AppConfig {
        question_count: 3,
        ..AppConfig::default()
    }
}

fn app(store: &Arc<FlakyStore>) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(&config(), store.clone()).unwrap());
    (router(state.clone(), Path::new("static")), state)
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Identifies as `name` and returns the `session=...` cookie pair.
async fn join(app: &Router, name: &str) -> (String, Value) {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/session", None, json!({ "name": name })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    (cookie, body_json(response).await)
}

#[tokio::test]
async fn page_carries_settings() {
    let store = Arc::new(FlakyStore::default());
    let (app, _) = app(&store);
    let response = app.oneshot(get("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("BOARD_SETTINGS"));
    assert!(html.contains("\"question_count\":3"));
}

#[tokio::test]
async fn new_participant_starts_from_zero() {
    let store = Arc::new(FlakyStore::default());
    let (app, _) = app(&store);
    let (cookie, body) = join(&app, "  Ann ").await;
    assert!(cookie.starts_with("session="));
    assert_eq!(body["name"], "Ann");
    assert_eq!(body["scores"], json!([0, 0, 0]));
    assert_eq!(body["lookup"], "not_found");

    let response = app.oneshot(get("/api/session", Some(&cookie))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Ann");
}

#[tokio::test]
async fn blank_nickname_is_rejected() {
    let store = Arc::new(FlakyStore::default());
    let (app, state) = app(&store);
    let response = app
        .oneshot(json_request("POST", "/api/session", None, json!({ "name": "   " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(state.sessions.is_empty());
}

#[tokio::test]
async fn score_edit_saves_and_rejoin_restores() {
    let store = Arc::new(FlakyStore::default());
    let (app, _) = app(&store);
    let (cookie, _) = join(&app, "X").await;

    for (index, value) in [(0, 1), (2, 2)] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/score",
                Some(&cookie),
                json!({ "index": index, "value": value }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }
    assert_eq!(rows_named(&store.rows(), "X").len(), 1);

    let (_, body) = join(&app, "X").await;
    assert_eq!(body["lookup"], "found");
    assert_eq!(body["scores"], json!([1, 0, 2]));
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn save_failure_is_reported_inline() {
    let store = Arc::new(FlakyStore::default());
    let (app, state) = app(&store);
    let (cookie, _) = join(&app, "X").await;
    store.fail_writes.store(true, Ordering::SeqCst);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/score",
            Some(&cookie),
            json!({ "index": 1, "value": 4 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("store unavailable"));
    assert_eq!(body["total"], 4);

    let id = cookie.trim_start_matches("session=");
    assert_eq!(state.sessions.get(id).unwrap().lock().await.total(), 4);
}

#[tokio::test]
async fn overlapping_edits_are_both_kept() {
    let store = Arc::new(FlakyStore::default());
    let (app, state) = app(&store);
    let (cookie, _) = join(&app, "X").await;
    store.read_delay_ms.store(50, Ordering::SeqCst);

    let first = app.clone().oneshot(json_request(
        "POST",
        "/api/score",
        Some(&cookie),
        json!({ "index": 0, "value": 5 }),
    ));
    let second = app.clone().oneshot(json_request(
        "POST",
        "/api/score",
        Some(&cookie),
        json!({ "index": 1, "value": 3 }),
    ));
    let (first, second) = tokio::join!(first, second);
    for response in [first.unwrap(), second.unwrap()] {
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    let id = cookie.trim_start_matches("session=");
    assert_eq!(state.sessions.get(id).unwrap().lock().await.scores(), &[5, 3, 0]);
    let rows = store.rows();
    let xs = rows_named(&rows, "X");
    assert_eq!(xs.len(), 1);
    assert_eq!(*xs[0], vec![json!("X"), json!(8), json!(5), json!(3), json!(0)]);
}

#[tokio::test]
async fn extreme_scores_are_saved_or_refused_without_panicking() {
    let store = Arc::new(FlakyStore::default());
    let (app, state) = app(&store);
    let (cookie, _) = join(&app, "X").await;

    let edit = |index: usize, value: i64| {
        json_request(
            "POST",
            "/api/score",
            Some(&cookie),
            json!({ "index": index, "value": value }),
        )
    };

    let response = app.clone().oneshot(edit(0, i64::MAX)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["total"], json!(i64::MAX));

    let response = app.clone().oneshot(edit(1, 1)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["total"], json!(i64::MAX));

    let response = app.clone().oneshot(edit(1, i64::MIN)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["total"], json!(-1));

    let id = cookie.trim_start_matches("session=");
    assert_eq!(
        state.sessions.get(id).unwrap().lock().await.scores(),
        &[i64::MAX, i64::MIN, 0]
    );
    assert!(state.board.refresh().await);
    let response = app.oneshot(get("/leaderboard/chart.svg", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn current_session_reports_how_it_was_seeded() {
    let store = Arc::new(FlakyStore::default());
    let (app, _) = app(&store);
    let (cookie, body) = join(&app, "Ann").await;
    assert_eq!(body["lookup"], "not_found");

    let response = app.clone().oneshot(get("/api/session", Some(&cookie))).await.unwrap();
    assert_eq!(body_json(response).await["lookup"], "not_found");

    store.fail_reads.store(true, Ordering::SeqCst);
    let (cookie, body) = join(&app, "Bob").await;
    assert_eq!(body["lookup"], "unavailable");
    let response = app.oneshot(get("/api/session", Some(&cookie))).await.unwrap();
    assert_eq!(body_json(response).await["lookup"], "unavailable");
}

#[tokio::test]
async fn bad_index_and_missing_session() {
    let store = Arc::new(FlakyStore::default());
    let (app, _) = app(&store);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/score", None, json!({ "index": 0, "value": 1 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (cookie, _) = join(&app, "X").await;
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/score",
            Some(&cookie),
            json!({ "index": 3, "value": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(store.rows().is_empty());
}

#[tokio::test]
async fn leaving_ends_the_session() {
    let store = Arc::new(FlakyStore::default());
    let (app, state) = app(&store);
    let (cookie, _) = join(&app, "X").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/session")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(state.sessions.is_empty());

    let response = app.oneshot(get("/api/session", Some(&cookie))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn leaderboard_reflects_refreshed_board() {
    let store = Arc::new(FlakyStore::default());
    let (app, state) = app(&store);

    let response = app.clone().oneshot(get("/leaderboard/chart.svg", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.clone().oneshot(get("/leaderboard/table", None)).await.unwrap();
    assert!(body_text(response).await.contains("No data yet"));

    for (name, value) in [("A", 10), ("B", 25), ("C", 25)] {
        let (cookie, _) = join(&app, name).await;
        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/score",
                Some(&cookie),
                json!({ "index": 0, "value": value }),
            ))
            .await
            .unwrap();
    }
    assert!(state.board.refresh().await);

    let response = app.clone().oneshot(get("/api/leaderboard", None)).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(
        body["rows"],
        json!([
            { "rank": 1, "name": "B", "total": 25 },
            { "rank": 2, "name": "C", "total": 25 },
            { "rank": 3, "name": "A", "total": 10 },
        ])
    );
    assert!(body["refreshed_at"].is_string());

    let response = app.clone().oneshot(get("/leaderboard/table", None)).await.unwrap();
    let html = body_text(response).await;
    assert!(html.contains("rank-gold"));

    let response = app.oneshot(get("/leaderboard/chart.svg", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/svg+xml"
    );
}
