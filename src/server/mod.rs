//! HTTP ingress of the board service
//!
//! `standboard run` owns the only [`Engine`]. Members' phones and the CLI
//! reach it through this router, so the drawing state and the ledger have
//! a single writer.
//!
//! | Method | Path                  | Operation                   |
//! |--------|-----------------------|-----------------------------|
//! | GET    | `/api/health`         | liveness, drawing flag      |
//! | GET    | `/api/board`          | [`Engine::board`]           |
//! | POST   | `/api/check`          | [`Engine::attempt_check`]   |
//! | POST   | `/api/entry`          | [`Engine::toggle_entry`]    |
//! | POST   | `/api/skip`           | [`Engine::skip_turn`]       |
//! | GET    | `/api/status/{user}`  | [`Engine::current_status`]  |
//! | GET    | `/api/draws/latest`   | [`Engine::last_order`]      |
//! | POST   | `/api/draws`          | [`Engine::start_lottery`]   |
//! | POST   | `/api/border`         | [`Engine::add_adjacency`]   |
//! | POST   | `/api/members`        | [`Engine::upsert_member`]   |
//! | GET    | `/metrics`            | Prometheus text format      |

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::{DrawStatus, Engine, EntryToggle, LotterySummary};
use crate::error::{BoardErrorTrait, Error, ErrorCategory, Rejection};
use crate::metrics;
use crate::models::{Adjacency, BoardEntry, Member, UserId};
use crate::occupancy::{CheckOutcome, CheckRequest};
use crate::storage::RecordedOrder;

// ============================================================================
// Wire types
// ============================================================================

/// Body of `POST /api/check`
///
/// There is no force flag: forced toggles are reserved for the drawing's
/// eviction sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckBody {
    pub location: String,
    pub user: String,
    #[serde(default)]
    pub guest: Option<String>,
}

/// Body naming a single member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBody {
    pub user: String,
}

/// Body of `POST /api/border`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderBody {
    pub a: String,
    pub b: String,
}

/// Body of `POST /api/members`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberBody {
    pub user: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub priority: bool,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// A drawing is locked or running
    pub drawing: bool,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub category: ErrorCategory,
    /// Present for policy rejections, carrying the machine-checkable code
    #[serde(default)]
    pub rejection: Option<Rejection>,
}

/// Engine error rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<Rejection> for ApiError {
    fn from(reason: Rejection) -> Self {
        Self(Error::Rejected(reason))
    }
}

/// HTTP status for an engine error
pub fn status_for(err: &Error) -> StatusCode {
    match err.category() {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::Conflict => StatusCode::CONFLICT,
        ErrorCategory::TurnViolation => StatusCode::FORBIDDEN,
        ErrorCategory::LockContention => StatusCode::LOCKED,
        ErrorCategory::Storage if err.is_recoverable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = ErrorBody {
            error: self.0.to_string(),
            category: self.0.category(),
            rejection: self.0.rejection().cloned(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Router
// ============================================================================

/// Build the router over `engine`
pub fn router(engine: Engine) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/board", get(board_handler))
        .route("/api/check", post(check_handler))
        .route("/api/entry", post(entry_handler))
        .route("/api/skip", post(skip_handler))
        .route("/api/status/{user}", get(status_handler))
        .route("/api/draws", post(draw_handler))
        .route("/api/draws/latest", get(latest_draw_handler))
        .route("/api/border", post(border_handler))
        .route("/api/members", post(member_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Serve `engine` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, engine: Engine, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Board service listening");
    }
    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown)
        .await
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler(State(engine): State<Engine>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        drawing: engine.is_drawing().await,
    })
}

async fn board_handler(State(engine): State<Engine>) -> ApiResult<Vec<BoardEntry>> {
    Ok(Json(engine.board().await?))
}

async fn check_handler(
    State(engine): State<Engine>,
    Json(body): Json<CheckBody>,
) -> ApiResult<CheckOutcome> {
    let mut request = CheckRequest::new(body.location, body.user);
    if let Some(guest) = body.guest {
        request = request.with_guest(guest);
    }
    Ok(Json(engine.attempt_check(request).await?))
}

async fn entry_handler(
    State(engine): State<Engine>,
    Json(body): Json<UserBody>,
) -> ApiResult<EntryToggle> {
    Ok(Json(engine.toggle_entry(&body.user).await?))
}

async fn skip_handler(
    State(engine): State<Engine>,
    Json(body): Json<UserBody>,
) -> Result<StatusCode, ApiError> {
    engine.skip_turn(&body.user).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn status_handler(
    State(engine): State<Engine>,
    Path(user): Path<String>,
) -> ApiResult<DrawStatus> {
    Ok(Json(engine.current_status(&user).await?))
}

async fn draw_handler(State(engine): State<Engine>) -> Json<Option<LotterySummary>> {
    Json(engine.start_lottery().await)
}

async fn latest_draw_handler(State(engine): State<Engine>) -> ApiResult<Option<RecordedOrder>> {
    Ok(Json(engine.last_order().await?))
}

async fn border_handler(
    State(engine): State<Engine>,
    Json(body): Json<BorderBody>,
) -> ApiResult<Adjacency> {
    Ok(Json(engine.add_adjacency(&body.a, &body.b).await?))
}

async fn member_handler(
    State(engine): State<Engine>,
    Json(body): Json<MemberBody>,
) -> ApiResult<Member> {
    let user = UserId::parse(&body.user).ok_or(Rejection::MissingIdentifier)?;

    let mut member = Member::new(user).with_priority(body.priority);
    if let Some(contact) = body.contact.filter(|c| !c.trim().is_empty()) {
        member = member.with_contact(contact);
    }

    engine.upsert_member(&member).await?;
    Ok(Json(member))
}

async fn metrics_handler() -> Response {
    match metrics::encode_metrics() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
