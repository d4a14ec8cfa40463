use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::{
    models::{
        event::Event,
        platform_status::{CreatePlatformStatus, PlatformStatus, SetPlatformStatus, StatusChange},
        status_history::StatusHistoryEntry,
    },
    types::Platform,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::access::{Actor, Permission};
use utils_core::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, http::auth::require_permission};

#[derive(Debug, Default, Deserialize)]
pub struct VersionQuery {
    pub version: Option<i32>,
}

pub async fn get_statuses(
    Extension(actor): Extension<Actor>,
    Extension(event): Extension<Event>,
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<VersionQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<PlatformStatus>>>, ApiError> {
    require_permission(&actor, Permission::View)?;
    let statuses = deployment
        .tracking_plan()
        .list_platform_statuses(&deployment.db().pool, event.id, query.version)
        .await?;
    Ok(ResponseJson(ApiResponse::success(statuses)))
}

pub async fn create_status(
    Extension(actor): Extension<Actor>,
    Extension(event): Extension<Event>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreatePlatformStatus>,
) -> Result<ResponseJson<ApiResponse<StatusChange>>, ApiError> {
    require_permission(&actor, Permission::UpdateStatus)?;
    let change = deployment
        .tracking_plan()
        .create_platform_status(&deployment.db().pool, event.id, &payload, actor.user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(change)))
}

pub async fn set_status(
    Extension(actor): Extension<Actor>,
    State(deployment): State<DeploymentImpl>,
    Path((event_id, platform)): Path<(Uuid, Platform)>,
    Json(payload): Json<SetPlatformStatus>,
) -> Result<ResponseJson<ApiResponse<StatusChange>>, ApiError> {
    require_permission(&actor, Permission::UpdateStatus)?;
    let change = deployment
        .tracking_plan()
        .set_platform_status(
            &deployment.db().pool,
            event_id,
            platform,
            &payload,
            actor.user_id,
        )
        .await?;
    Ok(ResponseJson(ApiResponse::success(change)))
}

pub async fn get_history(
    Extension(actor): Extension<Actor>,
    State(deployment): State<DeploymentImpl>,
    Path((event_id, platform)): Path<(Uuid, Platform)>,
    Query(query): Query<VersionQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<StatusHistoryEntry>>>, ApiError> {
    require_permission(&actor, Permission::View)?;
    let history = deployment
        .tracking_plan()
        .status_history(&deployment.db().pool, event_id, platform, query.version)
        .await?;
    Ok(ResponseJson(ApiResponse::success(history)))
}

/// Routes nested under `/events/{event_id}` that rely on the loaded event.
pub(crate) fn event_router() -> Router<DeploymentImpl> {
    Router::new().route("/statuses", get(get_statuses).post(create_status))
}

/// Routes relative to `/events` that carry a platform segment.
pub(crate) fn platform_router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/{event_id}/statuses/{platform}", put(set_status))
        .route("/{event_id}/statuses/{platform}/history", get(get_history))
}
