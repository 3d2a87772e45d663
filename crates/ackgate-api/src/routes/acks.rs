//! Rule acknowledgement routes.
//!
//! ## Routes
//!
//! - `GET    /ack` - List acknowledgements of the caller
//! - `POST   /ack` - Acknowledge a rule
//! - `GET    /ack/{rule_selector}` - Get one acknowledgement
//! - `PUT    /ack/{rule_selector}` - Update the justification
//! - `DELETE /ack/{rule_selector}` - Remove an acknowledgement

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::Instrument;
use utoipa::ToSchema;

use ackgate_core::{AckKey, AckOrchestrator, RuleSelector, ack_span};

use crate::context::{Caller, RequestContext};
use crate::error::{ApiError, ApiResult};
use crate::metrics::record_ack_operation;
use crate::render::AckReply;
use crate::server::AppState;

/// Request to acknowledge a rule.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AckCreateRequest {
    /// Rule selector (`rule_id|error_key`).
    #[schema(example = "ccx_rules_ocp.external.rules.nodes_kubelet_version_check|NODE_KUBELET_VERSION")]
    pub rule_id: String,
    /// Why the rule is acknowledged.
    #[serde(default)]
    pub justification: String,
}

/// Request to change the justification of an acknowledgement.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AckUpdateRequest {
    /// New justification.
    pub justification: String,
}

/// Creates acknowledgement routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ack", get(list_acks).post(acknowledge))
        .route(
            "/ack/:rule_selector",
            get(get_ack).put(update_ack).delete(delete_ack),
        )
}

fn orchestrator(state: &AppState, ctx: &RequestContext) -> AckOrchestrator {
    AckOrchestrator::new(Arc::clone(&state.aggregator)).with_deadline(ctx.deadline)
}

fn ack_key(caller: &Caller, selector: &str) -> ApiResult<AckKey> {
    let selector = RuleSelector::parse(selector).map_err(|err| {
        tracing::warn!(error = %err, "Rejecting request");
        ApiError::from(err)
    })?;
    let identity = caller.0.identity();
    Ok(AckKey::new(identity.org_id, identity.user_id.clone(), selector))
}

fn selector_from_path(path: Result<Path<String>, PathRejection>) -> ApiResult<String> {
    path.map(|Path(selector)| selector)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

fn body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(body)| body).map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Unable to read request body");
        ApiError::bad_request(rejection.body_text())
    })
}

/// Records the operation outcome and attaches the request ID to errors.
fn finish(
    operation: &'static str,
    ctx: &RequestContext,
    started: Instant,
    result: ApiResult<AckReply>,
) -> ApiResult<AckReply> {
    let outcome = match &result {
        Ok(AckReply::Created(_)) => "created",
        Ok(AckReply::Found(_)) if operation == "acknowledge" => "already_acknowledged",
        Ok(AckReply::Deleted) => "deleted",
        Ok(_) => "ok",
        Err(err) => match err.status() {
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::CONFLICT => "unconfirmed",
            StatusCode::GATEWAY_TIMEOUT => "deadline_exceeded",
            _ => "error",
        },
    };
    record_ack_operation(operation, outcome, started.elapsed());
    result.map_err(|err| err.with_request_id(ctx.request_id.clone()))
}

/// List acknowledged rules.
///
/// GET /api/v2/ack
#[utoipa::path(
    get,
    path = "/api/v2/ack",
    tag = "acks",
    responses(
        (status = 200, description = "Acknowledgements listed", body = crate::render::AckListResponse),
        (status = 403, description = "Missing or malformed identity", body = crate::error::ApiErrorBody),
        (status = 502, description = "Aggregator unavailable", body = crate::error::ApiErrorBody),
        (status = 504, description = "Deadline exceeded", body = crate::error::ApiErrorBody),
    ),
    security(
        ("bearerAuth" = []),
        ("identityHeader" = [])
    )
)]
pub(crate) async fn list_acks(
    ctx: RequestContext,
    Caller(caller): Caller,
    State(state): State<Arc<AppState>>,
) -> ApiResult<AckReply> {
    let started = Instant::now();
    let span = ack_span("list", caller.org_id(), caller.user_id());
    let result = async {
        let list = orchestrator(&state, &ctx)
            .list(caller.org_id(), caller.user_id())
            .await?;
        Ok::<_, ApiError>(AckReply::List(list))
    }
    .instrument(span)
    .await;
    finish("list", &ctx, started, result)
}

/// Get the acknowledgement of one rule.
///
/// GET /api/v2/ack/{rule_selector}
#[utoipa::path(
    get,
    path = "/api/v2/ack/{rule_selector}",
    tag = "acks",
    params(("rule_selector" = String, Path, description = "Rule selector (`rule_id|error_key`)")),
    responses(
        (status = 200, description = "Acknowledgement found", body = crate::render::AckResponse),
        (status = 400, description = "Malformed rule selector", body = crate::error::ApiErrorBody),
        (status = 403, description = "Missing or malformed identity", body = crate::error::ApiErrorBody),
        (status = 404, description = "Rule is not acknowledged", body = crate::error::ApiErrorBody),
        (status = 502, description = "Aggregator unavailable", body = crate::error::ApiErrorBody),
        (status = 504, description = "Deadline exceeded", body = crate::error::ApiErrorBody),
    ),
    security(
        ("bearerAuth" = []),
        ("identityHeader" = [])
    )
)]
pub(crate) async fn get_ack(
    ctx: RequestContext,
    caller: Caller,
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<AckReply> {
    let started = Instant::now();
    let span = ack_span("get", caller.0.org_id(), caller.0.user_id());
    let result = async {
        let key = ack_key(&caller, &selector_from_path(path)?)?;
        let record = orchestrator(&state, &ctx).get(&key).await?;
        Ok::<_, ApiError>(AckReply::Found(record))
    }
    .instrument(span)
    .await;
    finish("get", &ctx, started, result)
}

/// Acknowledge a rule.
///
/// Returns `201` when the rule was acknowledged by this request and `200`
/// when it already was; an existing justification is left untouched.
///
/// POST /api/v2/ack
#[utoipa::path(
    post,
    path = "/api/v2/ack",
    tag = "acks",
    request_body = crate::routes::acks::AckCreateRequest,
    responses(
        (status = 201, description = "Rule acknowledged", body = crate::render::AckResponse),
        (status = 200, description = "Rule was already acknowledged", body = crate::render::AckResponse),
        (status = 400, description = "Malformed rule selector or body", body = crate::error::ApiErrorBody),
        (status = 403, description = "Missing or malformed identity", body = crate::error::ApiErrorBody),
        (status = 409, description = "Acknowledged but not found on re-read", body = crate::error::ApiErrorBody),
        (status = 502, description = "Aggregator unavailable", body = crate::error::ApiErrorBody),
        (status = 504, description = "Deadline exceeded", body = crate::error::ApiErrorBody),
    ),
    security(
        ("bearerAuth" = []),
        ("identityHeader" = [])
    )
)]
pub(crate) async fn acknowledge(
    ctx: RequestContext,
    caller: Caller,
    State(state): State<Arc<AppState>>,
    request: Result<Json<AckCreateRequest>, JsonRejection>,
) -> ApiResult<AckReply> {
    let started = Instant::now();
    let span = ack_span("acknowledge", caller.0.org_id(), caller.0.user_id());
    let result = async {
        let request = body(request)?;
        let key = ack_key(&caller, &request.rule_id)?;
        let outcome = orchestrator(&state, &ctx)
            .acknowledge(&key, &request.justification)
            .await?;
        AckReply::from_outcome(outcome)
    }
    .instrument(span)
    .await;
    finish("acknowledge", &ctx, started, result)
}

/// Change the justification of an acknowledged rule.
///
/// PUT /api/v2/ack/{rule_selector}
#[utoipa::path(
    put,
    path = "/api/v2/ack/{rule_selector}",
    tag = "acks",
    params(("rule_selector" = String, Path, description = "Rule selector (`rule_id|error_key`)")),
    request_body = crate::routes::acks::AckUpdateRequest,
    responses(
        (status = 200, description = "Justification updated", body = crate::render::AckResponse),
        (status = 400, description = "Malformed rule selector or body", body = crate::error::ApiErrorBody),
        (status = 403, description = "Missing or malformed identity", body = crate::error::ApiErrorBody),
        (status = 404, description = "Rule is not acknowledged", body = crate::error::ApiErrorBody),
        (status = 409, description = "Updated but not found on re-read", body = crate::error::ApiErrorBody),
        (status = 502, description = "Aggregator unavailable", body = crate::error::ApiErrorBody),
        (status = 504, description = "Deadline exceeded", body = crate::error::ApiErrorBody),
    ),
    security(
        ("bearerAuth" = []),
        ("identityHeader" = [])
    )
)]
pub(crate) async fn update_ack(
    ctx: RequestContext,
    caller: Caller,
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    request: Result<Json<AckUpdateRequest>, JsonRejection>,
) -> ApiResult<AckReply> {
    let started = Instant::now();
    let span = ack_span("update", caller.0.org_id(), caller.0.user_id());
    let result = async {
        let key = ack_key(&caller, &selector_from_path(path)?)?;
        let request = body(request)?;
        let outcome = orchestrator(&state, &ctx)
            .update(&key, &request.justification)
            .await?;
        AckReply::from_outcome(outcome)
    }
    .instrument(span)
    .await;
    finish("update", &ctx, started, result)
}

/// Remove the acknowledgement of a rule.
///
/// DELETE /api/v2/ack/{rule_selector}
#[utoipa::path(
    delete,
    path = "/api/v2/ack/{rule_selector}",
    tag = "acks",
    params(("rule_selector" = String, Path, description = "Rule selector (`rule_id|error_key`)")),
    responses(
        (status = 204, description = "Acknowledgement removed"),
        (status = 400, description = "Malformed rule selector", body = crate::error::ApiErrorBody),
        (status = 403, description = "Missing or malformed identity", body = crate::error::ApiErrorBody),
        (status = 404, description = "Rule is not acknowledged", body = crate::error::ApiErrorBody),
        (status = 502, description = "Aggregator unavailable", body = crate::error::ApiErrorBody),
        (status = 504, description = "Deadline exceeded", body = crate::error::ApiErrorBody),
    ),
    security(
        ("bearerAuth" = []),
        ("identityHeader" = [])
    )
)]
pub(crate) async fn delete_ack(
    ctx: RequestContext,
    caller: Caller,
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<AckReply> {
    let started = Instant::now();
    let span = ack_span("delete", caller.0.org_id(), caller.0.user_id());
    let result = async {
        let key = ack_key(&caller, &selector_from_path(path)?)?;
        orchestrator(&state, &ctx).delete(&key).await?;
        Ok::<_, ApiError>(AckReply::Deleted)
    }
    .instrument(span)
    .await;
    finish("delete", &ctx, started, result)
}
