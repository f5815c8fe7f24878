//! Axum server and routes.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use uuid::Uuid;
use verbose_filter::ExpressionFilter;
use verbose_recorder::{NotifyTarget, RecorderConfig, RecorderSession};
use verbose_types::{
    BaseResponse, Clock, IngestData, IngestRequest, IngestResponse, Notifier, Publisher,
    SessionStatus, SessionStatusResponse, StartSessionData, StartSessionRequest,
    StartSessionResponse, UploadData, UploadResponse,
};

pub struct AppState {
    pub sessions: RwLock<HashMap<String, Arc<RecorderSession>>>,
    pub publisher: Arc<dyn Publisher>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub config: RecorderConfig,
}

impl AppState {
    pub fn new(
        config: RecorderConfig,
        publisher: Arc<dyn Publisher>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            publisher,
            notifier,
            clock,
            config,
        }
    }

    async fn session(&self, id: &str) -> Option<Arc<RecorderSession>> {
        self.sessions.read().await.get(id).cloned()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/verbose/sessions", post(handle_start))
        .route("/verbose/sessions/:id", get(handle_status))
        .route("/verbose/sessions/:id/checks", post(handle_checks))
        .route("/verbose/sessions/:id/upload", post(handle_upload))
        .route("/health", get(handle_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn handle_start(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartSessionRequest>,
) -> Json<StartSessionResponse> {
    let expression = req.filter.as_deref().unwrap_or("");
    let filter = match ExpressionFilter::try_parse(expression) {
        Ok(f) => f,
        Err(e) => return Json(BaseResponse::error(400, format!("invalid filter: {}", e))),
    };
    let mut session = RecorderSession::new(
        state.config.clone(),
        req.user.clone(),
        Arc::new(filter),
        Arc::clone(&state.clock),
    );
    if req.notify {
        session = session.with_notify(NotifyTarget {
            observer: req.user.clone(),
            notifier: Arc::clone(&state.notifier),
        });
    }
    let session_id = Uuid::new_v4().to_string();
    state
        .sessions
        .write()
        .await
        .insert(session_id.clone(), Arc::new(session));
    tracing::info!(session_id = %session_id, user = %req.user, filter = %expression, "verbose session started");
    Json(BaseResponse::ok(StartSessionData { session_id }))
}

async fn handle_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<SessionStatusResponse> {
    let Some(session) = state.session(&id).await else {
        return Json(BaseResponse::error(404, "Session not found"));
    };
    let snapshot = session.snapshot();
    Json(BaseResponse::ok(SessionStatus {
        session_id: id,
        user: snapshot.requested_by,
        filter: snapshot.filter,
        started_at: snapshot.started_at,
        seen: snapshot.seen,
        matched: snapshot.matched,
        retained: snapshot.events.len(),
    }))
}

async fn handle_checks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<IngestRequest>,
) -> Json<IngestResponse> {
    let Some(session) = state.session(&id).await else {
        return Json(BaseResponse::error(404, "Session not found"));
    };
    let accepted = req.checks.len();
    for check in req.checks {
        session.ingest(check);
    }
    Json(BaseResponse::ok(IngestData { accepted }))
}

async fn handle_upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<UploadResponse> {
    let Some(session) = state.session(&id).await else {
        return Json(BaseResponse::error(404, "Session not found"));
    };
    match session.render_and_publish(state.publisher.as_ref()).await {
        Ok(outcome) => {
            state.sessions.write().await.remove(&id);
            tracing::info!(session_id = %id, url = %outcome.reference, "verbose session closed");
            Json(BaseResponse::ok(UploadData {
                url: outcome.reference,
                seen: outcome.seen,
                matched: outcome.matched,
                retained: outcome.retained,
            }))
        }
        Err(e) => Json(BaseResponse::error(502, e.to_string())),
    }
}

async fn handle_health() -> &'static str {
    "ok"
}
