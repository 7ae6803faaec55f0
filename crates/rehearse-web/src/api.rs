//! REST API endpoint handlers.
//!
//! Every session endpoint locks the session for the whole request, so two
//! answers from the same browser never interleave. Guard rejections and
//! interview errors map onto status codes in [`ApiError`].

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use rehearse::backend::LlmBackend;
use rehearse::config::{AppConfig, Theme};
use rehearse::guard::Rejection;
use rehearse::interview::{InterviewError, Interviewer, TurnOutcome};
use rehearse::score::Evaluation;
use rehearse::session::{Difficulty, InterviewSettings, Persona, Role};
use rehearse::telemetry::{ActivityLog, LogLevel, LogLine};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use crate::snapshot::SessionSnapshot;
use crate::store::{SessionStore, SharedSession};

/// Single-page UI served at `/` when no static directory is configured.
pub const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn LlmBackend>,
    pub config: Arc<AppConfig>,
    pub store: SessionStore,
    pub activity: ActivityLog,
}

impl AppState {
    fn session(&self, id: &str) -> Result<SharedSession, ApiError> {
        self.store.get(id).ok_or(ApiError::NotFound)
    }

    fn interviewer(&self) -> Interviewer<'_> {
        Interviewer::new(self.backend.as_ref(), &self.config)
    }

    fn snapshot(&self, session: &rehearse::session::InterviewSession) -> SessionSnapshot {
        SessionSnapshot::from_session(session, &self.config.guard)
    }
}

// ── Errors ─────────────────────────────────────────────────────────

/// Handler error with its HTTP mapping.
#[derive(Debug)]
pub enum ApiError {
    NotFound,
    Interview(InterviewError),
    Rejected {
        rejection: Rejection,
        session: Box<SessionSnapshot>,
    },
}

impl From<InterviewError> for ApiError {
    fn from(e: InterviewError) -> Self {
        ApiError::Interview(e)
    }
}

/// Status code for an interview error.
pub fn interview_status(e: &InterviewError) -> StatusCode {
    match e {
        InterviewError::EmptyJobDescription | InterviewError::InvalidJobDescription => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        InterviewError::AlreadyStarted
        | InterviewError::NotStarted
        | InterviewError::NothingToEvaluate => StatusCode::CONFLICT,
        InterviewError::Provider(_) | InterviewError::MalformedEvaluation(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

/// Status code for a guard rejection.
pub fn rejection_status(r: &Rejection) -> StatusCode {
    match r {
        Rejection::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Unknown session." })),
            )
                .into_response(),
            ApiError::Interview(e) => {
                let status = interview_status(&e);
                if status == StatusCode::BAD_GATEWAY {
                    error!("Provider failure: {e}");
                }
                (status, Json(json!({ "error": e.to_string() }))).into_response()
            }
            ApiError::Rejected { rejection, session } => (
                rejection_status(&rejection),
                Json(json!({
                    "error": rejection.user_message(),
                    "rejection": rejection,
                    "session": session,
                })),
            )
                .into_response(),
        }
    }
}

// ── Static ─────────────────────────────────────────────────────────

/// GET /: Embedded single-page UI.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Response body for GET /api/config.
#[derive(Serialize)]
pub struct ConfigResponse {
    pub model: String,
    pub theme: Theme,
    pub font_family: &'static str,
    pub max_input_chars: usize,
    pub max_requests_per_session: u32,
    pub difficulties: Vec<Difficulty>,
    pub personas: Vec<Persona>,
    pub roles: Vec<RoleOption>,
    pub defaults: InterviewSettings,
}

/// A selectable interviewer preset: wire value plus display label.
#[derive(Serialize)]
pub struct RoleOption {
    pub value: Role,
    pub label: &'static str,
}

/// GET /api/config: Theme, limits and the selectable settings.
pub async fn get_config(State(app): State<AppState>) -> Json<ConfigResponse> {
    let config = &app.config;
    Json(ConfigResponse {
        model: config.provider.model.clone(),
        theme: config.theme.clone(),
        font_family: config.theme.css_font_family(),
        max_input_chars: config.guard.max_input_chars,
        max_requests_per_session: config.guard.max_requests_per_session,
        difficulties: Difficulty::ALL.to_vec(),
        personas: Persona::ALL.to_vec(),
        roles: Role::ALL
            .into_iter()
            .map(|value| RoleOption {
                value,
                label: value.label(),
            })
            .collect(),
        defaults: InterviewSettings::default(),
    })
}

/// Query for GET /api/logs.
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_log_limit")]
    pub limit: usize,
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

fn default_log_limit() -> usize {
    100
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

/// GET /api/logs: Recent captured log lines, oldest first.
pub async fn get_logs(
    State(app): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Json<Vec<LogLine>> {
    Json(app.activity.recent(query.limit, query.level))
}

// ── Sessions ───────────────────────────────────────────────────────

/// POST /api/sessions: Create a session. Returns 201 with its snapshot.
pub async fn create_session(State(app): State<AppState>) -> impl IntoResponse {
    let (id, session) = app.store.create();
    debug!(session = %id, "Session created");
    let snapshot = app.snapshot(&*session.lock().await);
    (StatusCode::CREATED, Json(snapshot))
}

/// GET /api/sessions/{id}: Session snapshot.
pub async fn get_session(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = app.session(&id)?;
    let session = session.lock().await;
    Ok(Json(app.snapshot(&session)))
}

/// POST /api/sessions/{id}/reset: Start a new interview in the same session.
pub async fn reset_session(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = app.session(&id)?;
    let mut session = session.lock().await;
    session.reset();
    debug!(session = %id, "Session reset");
    Ok(Json(app.snapshot(&session)))
}

/// Request body for POST /api/sessions/{id}/job.
#[derive(Deserialize)]
pub struct JobRequest {
    pub job_description: String,
}

#[derive(Serialize)]
pub struct JobResponse {
    pub strategy: String,
    pub session: SessionSnapshot,
}

/// POST /api/sessions/{id}/job: Analyse a job description.
pub async fn analyze_job(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<JobRequest>,
) -> Result<Json<JobResponse>, ApiError> {
    let session = app.session(&id)?;
    let mut session = session.lock().await;
    let strategy = app
        .interviewer()
        .analyze_job_description(&mut session, &body.job_description)
        .await?;
    Ok(Json(JobResponse {
        strategy,
        session: app.snapshot(&session),
    }))
}

#[derive(Serialize)]
pub struct StartResponse {
    pub question: String,
    pub session: SessionSnapshot,
}

/// POST /api/sessions/{id}/start: Lock settings and ask the first question.
///
/// The body is an [`InterviewSettings`]; omitted fields take their defaults.
/// Works with or without an analysed job description.
pub async fn start_interview(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(settings): Json<InterviewSettings>,
) -> Result<Json<StartResponse>, ApiError> {
    let session = app.session(&id)?;
    let mut session = session.lock().await;
    let question = app
        .interviewer()
        .start_interview(&mut session, settings)
        .await?;
    Ok(Json(StartResponse {
        question,
        session: app.snapshot(&session),
    }))
}

/// Request body for POST /api/sessions/{id}/answer.
#[derive(Deserialize)]
pub struct AnswerRequest {
    pub answer: String,
}

#[derive(Serialize)]
pub struct AnswerResponse {
    pub reply: String,
    pub score: Option<u8>,
    pub filtered: bool,
    pub session: SessionSnapshot,
}

/// POST /api/sessions/{id}/answer: One guarded interview turn.
///
/// Returns 429 once the request budget is spent and 422 for every other
/// guard rejection.
pub async fn submit_answer(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let session = app.session(&id)?;
    let mut session = session.lock().await;
    let outcome = app
        .interviewer()
        .submit_answer(&mut session, &body.answer)
        .await?;
    match outcome {
        TurnOutcome::Accepted {
            reply,
            score,
            filtered,
        } => Ok(Json(AnswerResponse {
            reply,
            score,
            filtered,
            session: app.snapshot(&session),
        })),
        TurnOutcome::Rejected { rejection } => Err(ApiError::Rejected {
            rejection,
            session: Box::new(app.snapshot(&session)),
        }),
    }
}

#[derive(Serialize)]
pub struct EvaluationResponse {
    pub evaluation: Evaluation,
    pub session: SessionSnapshot,
}

/// POST /api/sessions/{id}/evaluate: Structured evaluation of the last answer.
pub async fn evaluate_answer(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    let session = app.session(&id)?;
    let mut session = session.lock().await;
    let evaluation = app.interviewer().evaluate_last_answer(&mut session).await?;
    Ok(Json(EvaluationResponse {
        evaluation,
        session: app.snapshot(&session),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            interview_status(&InterviewError::InvalidJobDescription),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            interview_status(&InterviewError::AlreadyStarted),
            StatusCode::CONFLICT
        );
        assert_eq!(
            interview_status(&InterviewError::Provider("down".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            rejection_status(&Rejection::RateLimited { limit: 30 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            rejection_status(&Rejection::OffTopic),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn request_bodies_deserialize() {
        let settings: InterviewSettings =
            serde_json::from_str(r#"{"difficulty":"Hard"}"#).unwrap();
        assert_eq!(settings.difficulty, Difficulty::Hard);
        assert_eq!(settings.persona, Persona::Neutral);
        assert_eq!(settings.role, Role::General);

        let query: LogsQuery = serde_json::from_str(r#"{"level":"warn"}"#).unwrap();
        assert_eq!(query.level, LogLevel::Warn);
        assert_eq!(query.limit, 100);
    }
}
