//! Axum route handlers for search, analysis and the lead collection.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::identity::resolve_owner;
use crate::leads::analysis::analyze_job;
use crate::leads::collection::StoreError;
use crate::leads::models::{JobPosting, LeadAnalysis, LeadStatus, NewLead};
use crate::leads::prompts::MISSION_PILLARS;
use crate::leads::search::search_jobs;
use crate::leads::store::LeadView;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub resume: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub jobs: Vec<JobPosting>,
    pub message: String,
}

/// Accepts both the current and the older proxy field names.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(alias = "job_title")]
    pub title: String,
    pub company: String,
    #[serde(alias = "job_details", alias = "job_description")]
    pub description: String,
}

impl AnalyzeRequest {
    fn validate(&self) -> Result<(), AppError> {
        for (name, value) in [
            ("title", &self.title),
            ("company", &self.company),
            ("description", &self.description),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{name} cannot be empty")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: LeadStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionRequest {
    /// Falls back to the configured bootstrap token when absent.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub owner_id: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/search
pub async fn handle_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if request.query.trim().is_empty() {
        return Err(AppError::Validation("query cannot be empty".to_string()));
    }

    let jobs = search_jobs(&state.llm, &request.query, request.resume.as_deref()).await?;
    let message = format!("Search successful. Found {} leads.", jobs.len());

    Ok(Json(SearchResponse { jobs, message }))
}

/// POST /api/v1/analyze
///
/// Scores a job without storing it.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<LeadAnalysis>, AppError> {
    request.validate()?;
    let analysis = analyze_job(
        &state.llm,
        &request.title,
        &request.company,
        &request.description,
    )
    .await?;
    Ok(Json(analysis))
}

/// POST /api/v1/leads/analyze
///
/// Scores a job and stores it as a new ACTIVE lead. The lead shows up in
/// `GET /api/v1/leads` once the change notification for it arrives.
pub async fn handle_analyze_and_create(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    request.validate()?;
    // Checked up front so an unresolved session never costs a model call.
    if !state.leads.is_ready().await {
        return Err(StoreError::NotReady.into());
    }

    let analysis = analyze_job(
        &state.llm,
        &request.title,
        &request.company,
        &request.description,
    )
    .await?;

    let id = state
        .leads
        .create(NewLead {
            title: request.title,
            company: request.company,
            description: request.description,
            analysis,
        })
        .await?;

    Ok((StatusCode::ACCEPTED, Json(CreatedResponse { id })))
}

/// POST /api/v1/leads
///
/// Manual entry: the caller supplies the scoring fields and no model call is made.
pub async fn handle_create_lead(
    State(state): State<AppState>,
    Json(lead): Json<NewLead>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    lead.validate().map_err(AppError::Validation)?;
    let id = state.leads.create(lead).await?;
    Ok((StatusCode::ACCEPTED, Json(CreatedResponse { id })))
}

/// GET /api/v1/leads
pub async fn handle_list_leads(State(state): State<AppState>) -> Json<LeadView> {
    Json(state.leads.snapshot())
}

/// PATCH /api/v1/leads/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<StatusCode, AppError> {
    if !update.status.is_writable() {
        return Err(AppError::Validation(format!(
            "status {} cannot be set",
            update.status.as_str()
        )));
    }
    state.leads.update_status(id, update.status).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/leads/:id/toggle
///
/// Flips ACTIVE and CLOSED on the stored document. The view catches up with
/// the next change notification.
pub async fn handle_toggle_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusUpdate>, AppError> {
    let status = state.leads.toggle_status(id).await?;
    Ok(Json(StatusUpdate { status }))
}

/// GET /api/v1/leads/stream
///
/// Server-sent events: the current view, then every replacement of it.
pub async fn handle_lead_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let mut rx = state.leads.view();
    let initial = rx.borrow_and_update().clone();

    let first = stream::once(async move { Event::default().event("leads").json_data(&initial) });
    let updates = stream::unfold(rx, |mut rx| async move {
        rx.changed().await.ok()?;
        let view = rx.borrow_and_update().clone();
        Some((Event::default().event("leads").json_data(&view), rx))
    });

    Sse::new(first.chain(updates)).keep_alive(KeepAlive::default())
}

/// POST /api/v1/session
///
/// Re-resolves the owner identity. This is also how a failed change
/// subscription is re-established.
pub async fn handle_resolve_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Json<SessionResponse> {
    let token = request.token.or_else(|| state.config.owner_token.clone());
    let owner = resolve_owner(token.as_deref());
    info!("Session re-resolved for owner {owner}");
    state.leads.resolve_identity(owner.clone()).await;
    Json(SessionResponse {
        owner_id: owner.to_string(),
    })
}

/// GET /api/v1/mandates
pub async fn handle_mandates() -> Json<Vec<&'static str>> {
    Json(MISSION_PILLARS.to_vec())
}
