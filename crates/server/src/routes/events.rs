use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    event::{CreateEvent, Event, EventDetail, EventFilter, UpdateEvent},
    event_version::EventVersion,
};
use deployment::Deployment;
use services::services::access::{Actor, Permission};
use utils_core::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl, error::ApiError, http::auth::require_permission,
    middleware::load_event_middleware, routes::platform_statuses,
};

pub async fn get_events(
    Extension(actor): Extension<Actor>,
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<EventFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<Event>>>, ApiError> {
    require_permission(&actor, Permission::View)?;
    let events = deployment
        .tracking_plan()
        .list_events(&deployment.db().pool, &filter)
        .await?;
    Ok(ResponseJson(ApiResponse::success(events)))
}

pub async fn get_event(
    Extension(actor): Extension<Actor>,
    Extension(event): Extension<Event>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<EventDetail>>, ApiError> {
    require_permission(&actor, Permission::View)?;
    let detail = deployment
        .tracking_plan()
        .get_event_detail(&deployment.db().pool, event.id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

pub async fn create_event(
    Extension(actor): Extension<Actor>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateEvent>,
) -> Result<ResponseJson<ApiResponse<Event>>, ApiError> {
    require_permission(&actor, Permission::EditEvents)?;
    tracing::debug!(category = %payload.category, action = %payload.action, "Creating event");
    let event = deployment
        .tracking_plan()
        .create_event(&deployment.db().pool, &payload, actor.user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(event)))
}

pub async fn update_event(
    Extension(actor): Extension<Actor>,
    Extension(event): Extension<Event>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateEvent>,
) -> Result<ResponseJson<ApiResponse<Event>>, ApiError> {
    require_permission(&actor, Permission::EditEvents)?;
    let event = deployment
        .tracking_plan()
        .update_event(&deployment.db().pool, event.id, &payload, actor.user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(event)))
}

pub async fn delete_event(
    Extension(actor): Extension<Actor>,
    Extension(event): Extension<Event>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    require_permission(&actor, Permission::DeleteEvents)?;
    deployment
        .tracking_plan()
        .delete_event(&deployment.db().pool, event.id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_versions(
    Extension(actor): Extension<Actor>,
    Extension(event): Extension<Event>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<EventVersion>>>, ApiError> {
    require_permission(&actor, Permission::View)?;
    let versions = deployment
        .tracking_plan()
        .list_versions(&deployment.db().pool, event.id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(versions)))
}

pub async fn get_version(
    Extension(actor): Extension<Actor>,
    State(deployment): State<DeploymentImpl>,
    Path((event_id, version)): Path<(Uuid, i32)>,
) -> Result<ResponseJson<ApiResponse<EventVersion>>, ApiError> {
    require_permission(&actor, Permission::View)?;
    let version = deployment
        .tracking_plan()
        .get_version(&deployment.db().pool, event_id, version)
        .await?;
    Ok(ResponseJson(ApiResponse::success(version)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let event_id_router = Router::new()
        .route("/", get(get_event).put(update_event).delete(delete_event))
        .route("/versions", get(get_versions))
        .merge(platform_statuses::event_router())
        .merge(super::comments::event_router())
        .layer(from_fn_with_state(
            deployment.clone(),
            load_event_middleware::<DeploymentImpl>,
        ));

    let events_router = Router::new()
        .route("/", get(get_events).post(create_event))
        .route("/{event_id}/versions/{version}", get(get_version))
        .merge(platform_statuses::platform_router())
        .nest("/{event_id}", event_id_router);

    Router::new().nest("/events", events_router)
}
