use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::assist::ScoreAdjuster;
use super::domain::{Lead, LeadId, RuleId, RuleSpec};
use super::facade::{ScoringFacade, ScoringServiceError};
use super::repository::LeadRepository;
use super::service::BatchCancellation;

/// Router builder exposing rule administration and lead scoring endpoints.
pub fn scoring_router<R, A>(facade: Arc<ScoringFacade<R, A>>) -> Router
where
    R: LeadRepository + 'static,
    A: ScoreAdjuster + 'static,
{
    Router::new()
        .route("/api/v1/scoring/settings", get(settings_handler::<R, A>))
        .route("/api/v1/scoring/rules", post(create_rule_handler::<R, A>))
        .route(
            "/api/v1/scoring/rules/:rule_id",
            put(update_rule_handler::<R, A>).delete(delete_rule_handler::<R, A>),
        )
        .route("/api/v1/scoring/bounds", put(bounds_handler::<R, A>))
        .route("/api/v1/scoring/ai-assist", put(ai_assist_handler::<R, A>))
        .route("/api/v1/leads/score", post(score_batch_handler::<R, A>))
        .route("/api/v1/leads/:lead_id", put(save_lead_handler::<R, A>))
        .route(
            "/api/v1/leads/:lead_id/score",
            post(score_lead_handler::<R, A>),
        )
        .with_state(facade)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BoundsRequest {
    pub min_score: i32,
    pub max_score: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AiAssistRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchRequest {
    pub lead_ids: Vec<LeadId>,
}

pub(crate) async fn settings_handler<R, A>(
    State(facade): State<Arc<ScoringFacade<R, A>>>,
) -> Response
where
    R: LeadRepository + 'static,
    A: ScoreAdjuster + 'static,
{
    let settings = facade.settings();
    (StatusCode::OK, axum::Json(settings.as_ref().clone())).into_response()
}

pub(crate) async fn create_rule_handler<R, A>(
    State(facade): State<Arc<ScoringFacade<R, A>>>,
    axum::Json(spec): axum::Json<RuleSpec>,
) -> Response
where
    R: LeadRepository + 'static,
    A: ScoreAdjuster + 'static,
{
    match facade.create_rule(spec) {
        Ok(id) => (StatusCode::CREATED, axum::Json(json!({ "id": id }))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_rule_handler<R, A>(
    State(facade): State<Arc<ScoringFacade<R, A>>>,
    Path(rule_id): Path<String>,
    axum::Json(spec): axum::Json<RuleSpec>,
) -> Response
where
    R: LeadRepository + 'static,
    A: ScoreAdjuster + 'static,
{
    match facade.update_rule(&RuleId(rule_id), spec) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_rule_handler<R, A>(
    State(facade): State<Arc<ScoringFacade<R, A>>>,
    Path(rule_id): Path<String>,
) -> Response
where
    R: LeadRepository + 'static,
    A: ScoreAdjuster + 'static,
{
    facade.delete_rule(&RuleId(rule_id));
    StatusCode::NO_CONTENT.into_response()
}

pub(crate) async fn bounds_handler<R, A>(
    State(facade): State<Arc<ScoringFacade<R, A>>>,
    axum::Json(request): axum::Json<BoundsRequest>,
) -> Response
where
    R: LeadRepository + 'static,
    A: ScoreAdjuster + 'static,
{
    match facade.set_bounds(request.min_score, request.max_score) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn ai_assist_handler<R, A>(
    State(facade): State<Arc<ScoringFacade<R, A>>>,
    axum::Json(request): axum::Json<AiAssistRequest>,
) -> Response
where
    R: LeadRepository + 'static,
    A: ScoreAdjuster + 'static,
{
    facade.set_ai_assist(request.enabled);
    StatusCode::NO_CONTENT.into_response()
}

pub(crate) async fn save_lead_handler<R, A>(
    State(facade): State<Arc<ScoringFacade<R, A>>>,
    Path(lead_id): Path<String>,
    axum::Json(lead): axum::Json<Lead>,
) -> Response
where
    R: LeadRepository + 'static,
    A: ScoreAdjuster + 'static,
{
    if lead.id.0 != lead_id {
        let payload = json!({
            "error": format!("lead id '{}' does not match path '{lead_id}'", lead.id),
        });
        return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
    }

    match facade.save_lead(lead).await {
        Ok(score) => (StatusCode::OK, axum::Json(score)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn score_lead_handler<R, A>(
    State(facade): State<Arc<ScoringFacade<R, A>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    R: LeadRepository + 'static,
    A: ScoreAdjuster + 'static,
{
    match facade.score_lead(&LeadId(lead_id)).await {
        Ok(score) => (StatusCode::OK, axum::Json(score)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn score_batch_handler<R, A>(
    State(facade): State<Arc<ScoringFacade<R, A>>>,
    axum::Json(request): axum::Json<BatchRequest>,
) -> Response
where
    R: LeadRepository + 'static,
    A: ScoreAdjuster + 'static,
{
    // The batch runs detached so leads already in flight still finish and persist
    // when the client goes away; the guard only stops further dispatch.
    let cancellation = BatchCancellation::new();
    let _guard = CancelOnDrop(cancellation.clone());
    let batch = tokio::spawn(async move {
        facade.score_leads(request.lead_ids, &cancellation).await
    });

    match batch.await {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => {
            warn!(%error, "batch scoring task terminated abnormally");
            let payload = json!({ "error": "batch scoring failed" });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

struct CancelOnDrop(BatchCancellation);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn error_response(error: ScoringServiceError) -> Response {
    let status = match &error {
        ScoringServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ScoringServiceError::RuleNotFound(_) | ScoringServiceError::LeadNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        ScoringServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
