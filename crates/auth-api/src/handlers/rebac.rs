//! /api/rebac/* (spec §4.7, §6): direct write/delete, explicit-expression
//! check, and the direct-tuple list-objects/list-users indices.

use axum::extract::{Json, Query, State};
use auth_core::audit::{AuditCategory, AuditEvent, AuditSeverity};
use auth_core::models::rebac::{
    EvaluationContext, RebacWriteEvent, RebacWriteOp, RelationExpression, RelationshipTuple,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

/// Fire-and-forget permission-change event for a ReBAC tuple write/delete
/// (spec.md §6 "writes publish a permission-change event"); failure to
/// publish never affects the response, matching token introspection's event
/// publication contract.
async fn publish_rebac_write(state: &AppState, write_event: RebacWriteEvent) {
    let action = match write_event.op {
        RebacWriteOp::Grant => "rebac.write.grant",
        RebacWriteOp::Revoke => "rebac.write.revoke",
    };
    state
        .audit_logger
        .log(AuditEvent {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            category: AuditCategory::Authorization,
            action: action.to_string(),
            severity: AuditSeverity::Info,
            actor_id: None,
            resource_id: Some(write_event.resource.clone()),
            ip_address: None,
            user_agent: None,
            tenant_id: Some(write_event.tenant),
            metadata: serde_json::to_value(&write_event).unwrap_or_default(),
            outcome: auth_core::audit::AuditOutcome::Success,
        })
        .await;
}

pub async fn write_tuple(
    State(state): State<AppState>,
    Json(tuple): Json<RelationshipTuple>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.rebac_store.write(tuple.clone()).await?;
    state.rebac_evaluator.invalidate_object(tuple.tenant_id, &tuple.to_id);
    publish_rebac_write(
        &state,
        RebacWriteEvent {
            op: RebacWriteOp::Grant,
            tenant: tuple.tenant_id,
            subject: format!("{}:{}", tuple.from_type, tuple.from_id),
            resource: format!("{}:{}", tuple.to_type, tuple.to_id),
            relation: tuple.relation.clone(),
        },
    )
    .await;
    Ok(Json(serde_json::json!({ "written": true })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteTupleRequest {
    pub tenant_id: Uuid,
    pub from_type: String,
    pub from_id: String,
    pub to_type: String,
    pub to_id: String,
    pub relation: String,
}

pub async fn delete_tuple(
    State(state): State<AppState>,
    Json(req): Json<DeleteTupleRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .rebac_store
        .delete(req.tenant_id, &req.from_type, &req.from_id, &req.to_type, &req.to_id, &req.relation)
        .await?;
    state.rebac_evaluator.invalidate_object(req.tenant_id, &req.to_id);
    publish_rebac_write(
        &state,
        RebacWriteEvent {
            op: RebacWriteOp::Revoke,
            tenant: req.tenant_id,
            subject: format!("{}:{}", req.from_type, req.from_id),
            resource: format!("{}:{}", req.to_type, req.to_id),
            relation: req.relation.clone(),
        },
    )
    .await;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct RebacCheckBody {
    pub tenant_id: Uuid,
    pub user_type: String,
    pub user_id: String,
    pub object_type: String,
    pub object_id: String,
    pub relation: String,
    pub expression: RelationExpression,
    pub max_depth: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RebacCheckResponse {
    pub allowed: bool,
}

pub async fn check(
    State(state): State<AppState>,
    Json(body): Json<RebacCheckBody>,
) -> Result<Json<RebacCheckResponse>, ApiError> {
    let ctx = EvaluationContext::new(
        body.tenant_id,
        body.user_type,
        body.user_id,
        body.object_type,
        body.object_id,
        body.max_depth.unwrap_or(state.rebac_max_depth),
    );
    let allowed = state.rebac_evaluator.check(&body.expression, &body.relation, ctx).await?;
    Ok(Json(RebacCheckResponse { allowed }))
}

#[derive(Debug, Deserialize)]
pub struct ListObjectsQuery {
    pub tenant_id: Uuid,
    pub user_type: String,
    pub user_id: String,
    pub object_type: String,
    pub relation: String,
}

pub async fn list_objects(
    State(state): State<AppState>,
    Query(q): Query<ListObjectsQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let objects = state
        .rebac_store
        .objects_for_subject(q.tenant_id, &q.user_type, &q.user_id, &q.object_type, &q.relation)
        .await?;
    Ok(Json(objects))
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub tenant_id: Uuid,
    pub object_type: String,
    pub object_id: String,
    pub relation: String,
}

#[derive(Debug, Serialize)]
pub struct Subject {
    pub user_type: String,
    pub user_id: String,
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(q): Query<ListUsersQuery>,
) -> Result<Json<Vec<Subject>>, ApiError> {
    let subjects = state
        .rebac_store
        .subjects_for_object(q.tenant_id, &q.object_type, &q.object_id, &q.relation)
        .await?
        .into_iter()
        .map(|(user_type, user_id)| Subject { user_type, user_id })
        .collect();
    Ok(Json(subjects))
}
