use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::board::RankingBoard;
use crate::chart::{self, ChartOptions};
use crate::config::{AppConfig, StoreConfig};
use crate::credentials::{ServiceAccountAuth, load_service_account};
use crate::error::LeaderboardError;
use crate::ranking::RankedRow;
use crate::repository::LeaderboardRepository;
use crate::session::{ScoreSession, SessionRegistry, normalize_name};
use crate::sheets::SheetsTableStore;
use crate::store::{MemoryTableStore, TableStore};
use crate::view::{PageSettings, Views};

const SESSION_COOKIE: &str = "session";

pub struct AppState {
    pub repo: LeaderboardRepository,
    pub sessions: SessionRegistry,
    pub board: Arc<RankingBoard>,
    views: Views,
    chart: ChartOptions,
    settings: PageSettings,
}

impl AppState {
    /// # Errors
    /// * `Render` if the bundled templates fail to compile
    pub fn new(config: &AppConfig, store: Arc<dyn TableStore>) -> Result<Self, LeaderboardError> {
        let repo = LeaderboardRepository::new(store, config.question_count, config.upsert_strategy);
        Ok(AppState {
            board: Arc::new(RankingBoard::new(repo.clone())),
            repo,
            sessions: SessionRegistry::default(),
            views: Views::new(config.show_rank_column)?,
            chart: ChartOptions::default(),
            settings: PageSettings {
                question_count: config.question_count,
                refresh_interval_ms: config.refresh_interval().as_millis() as u64,
            },
        })
    }
}

#[derive(Deserialize)]
struct IdentifyRequest {
    name: String,
}

#[derive(Serialize)]
struct SessionResponse {
    name: String,
    scores: Vec<i64>,
    total: i64,
    lookup: &'static str,
}

#[derive(Deserialize)]
struct ScoreUpdate {
    index: usize,
    value: i64,
}

#[derive(Serialize)]
struct SaveResponse {
    status: String,
    message: Option<String>,
    total: Option<i64>,
}

#[derive(Serialize)]
struct LeaderboardResponse {
    rows: Vec<RankedRow>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl SaveResponse {
    fn ok(total: i64) -> Self {
        SaveResponse {
            status: "ok".to_string(),
            message: None,
            total: Some(total),
        }
    }

    fn error(message: impl Into<String>, total: Option<i64>) -> Self {
        SaveResponse {
            status: "error".to_string(),
            message: Some(message.into()),
            total,
        }
    }
}

/// Opens the configured table store.
///
/// # Errors
/// * `Auth` if the sheets store is selected and no usable key is found
pub fn build_store(config: &AppConfig) -> Result<Arc<dyn TableStore>, LeaderboardError> {
    match &config.store {
        StoreConfig::Memory => {
            log::warn!("using in-memory store; scores are lost on restart");
            Ok(Arc::new(MemoryTableStore::new()))
        }
        StoreConfig::Sheets {
            spreadsheet_id,
            worksheet,
            api_base,
        } => {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .map_err(|e| LeaderboardError::StoreUnavailable(e.to_string()))?;
            let key = load_service_account(&config.credentials, |var| std::env::var(var).ok())?;
            let auth = ServiceAccountAuth::new(
                key,
                config.credentials.token_uri.clone(),
                client.clone(),
            )?;
            log::info!(
                "using worksheet {:?} of spreadsheet {}",
                worksheet,
                spreadsheet_id
            );
            Ok(Arc::new(SheetsTableStore::new(
                client,
                Arc::new(auth),
                api_base.clone(),
                spreadsheet_id.clone(),
                worksheet.clone(),
            )))
        }
    }
}

pub fn router(state: Arc<AppState>, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(serve_page))
        .route(
            "/api/session",
            post(identify).get(current_session).delete(leave),
        )
        .route("/api/score", post(set_score))
        .route("/api/leaderboard", get(leaderboard_json))
        .route("/leaderboard/table", get(leaderboard_table))
        .route("/leaderboard/chart.svg", get(leaderboard_chart))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = build_store(&config)?;
    let state = Arc::new(AppState::new(&config, store)?);

    // The refresh task lives as long as the server.
    let _refresh = state.board.clone().spawn(config.refresh_interval());

    let app = router(state, &config.static_dir);

    let listener = TcpListener::bind(&config.bind).await?;
    log::info!("Listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

fn session_id(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE).map(|c| c.value().to_string())
}

fn no_session() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(SaveResponse::error("no active session", None)),
    )
        .into_response()
}

fn session_body(session: &ScoreSession) -> SessionResponse {
    SessionResponse {
        name: session.name().to_string(),
        scores: session.scores().to_vec(),
        total: session.total(),
        lookup: session.lookup().as_str(),
    }
}

async fn serve_page(State(state): State<Arc<AppState>>) -> Response {
    match state.views.page(&state.settings) {
        Ok(html) => Html(html).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn identify(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<IdentifyRequest>,
) -> Response {
    let name = match normalize_name(&payload.name) {
        Ok(name) => name,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(SaveResponse::error(e.to_string(), None)),
            )
                .into_response();
        }
    };

    let (session, lookup) = ScoreSession::identify(&state.repo, &name).await;
    log::info!("{:?} joined ({})", name, lookup.as_str());

    if let Some(old) = session_id(&jar) {
        state.sessions.remove(&old);
    }
    let body = session_body(&session);
    let id = state.sessions.create(session);
    let cookie = Cookie::build((SESSION_COOKIE, id)).path("/").http_only(true);

    (jar.add(cookie), Json(body)).into_response()
}

async fn current_session(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    match session_id(&jar).and_then(|id| state.sessions.get(&id)) {
        Some(handle) => Json(session_body(&*handle.lock().await)).into_response(),
        None => no_session(),
    }
}

async fn leave(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(handle) = session_id(&jar).and_then(|id| state.sessions.remove(&id)) {
        log::info!("{:?} left", handle.lock().await.name());
    }
    let cookie = Cookie::build((SESSION_COOKIE, "")).path("/");
    (jar.remove(cookie), StatusCode::NO_CONTENT).into_response()
}

async fn set_score(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<ScoreUpdate>,
) -> Response {
    let Some(handle) = session_id(&jar).and_then(|id| state.sessions.get(&id)) else {
        return no_session();
    };
    // held until the row is saved so edits in one session do not interleave
    let mut session = handle.lock().await;

    match session.set_score(&state.repo, payload.index, payload.value).await {
        Ok(()) => Json(SaveResponse::ok(session.total())).into_response(),
        Err(e @ (LeaderboardError::ScoreIndex { .. } | LeaderboardError::TotalOverflow { .. })) => (
            StatusCode::BAD_REQUEST,
            Json(SaveResponse::error(e.to_string(), Some(session.total()))),
        )
            .into_response(),
        Err(e) => {
            // the value stays in the session; the next edit saves it again
            log::warn!("save for {:?} failed: {}", session.name(), e);
            Json(SaveResponse::error(e.to_string(), Some(session.total()))).into_response()
        }
    }
}

fn current_rows(state: &AppState) -> (Vec<RankedRow>, Option<DateTime<Utc>>) {
    match state.board.current() {
        Some(view) => (view.rows, Some(view.refreshed_at)),
        None => (Vec::new(), None),
    }
}

async fn leaderboard_json(State(state): State<Arc<AppState>>) -> Json<LeaderboardResponse> {
    let (rows, refreshed_at) = current_rows(&state);
    Json(LeaderboardResponse { rows, refreshed_at })
}

async fn leaderboard_table(State(state): State<Arc<AppState>>) -> Response {
    let (rows, _) = current_rows(&state);
    match state.views.leaderboard_table(&rows) {
        Ok(html) => Html(html).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn leaderboard_chart(State(state): State<Arc<AppState>>) -> Response {
    let (rows, _) = current_rows(&state);
    match chart::render_svg(&rows, &state.chart) {
        Ok(Some(svg)) => ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            log::warn!("chart render failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
