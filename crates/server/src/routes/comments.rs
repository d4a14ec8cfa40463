use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, get},
};
use db::models::{
    comment::{Comment, CreateComment},
    event::Event,
};
use deployment::Deployment;
use services::services::access::{Actor, Permission};
use utils_core::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, http::auth::require_permission};

pub async fn get_comments(
    Extension(actor): Extension<Actor>,
    Extension(event): Extension<Event>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Comment>>>, ApiError> {
    require_permission(&actor, Permission::View)?;
    let comments = deployment
        .tracking_plan()
        .list_comments(&deployment.db().pool, event.id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(comments)))
}

pub async fn create_comment(
    Extension(actor): Extension<Actor>,
    Extension(event): Extension<Event>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateComment>,
) -> Result<ResponseJson<ApiResponse<Comment>>, ApiError> {
    require_permission(&actor, Permission::Comment)?;
    let comment = deployment
        .tracking_plan()
        .create_comment(&deployment.db().pool, event.id, &payload.content, &actor.name)
        .await?;
    Ok(ResponseJson(ApiResponse::success(comment)))
}

pub async fn delete_comment(
    Extension(actor): Extension<Actor>,
    State(deployment): State<DeploymentImpl>,
    Path(comment_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    require_permission(&actor, Permission::DeleteComments)?;
    deployment
        .tracking_plan()
        .delete_comment(&deployment.db().pool, comment_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub(crate) fn event_router() -> Router<DeploymentImpl> {
    Router::new().route("/comments", get(get_comments).post(create_comment))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/comments/{comment_id}", delete(delete_comment))
}
