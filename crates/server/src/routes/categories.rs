use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::category::{Category, CategoryWithEventCount, CreateCategory, UpdateCategory};
use deployment::Deployment;
use services::services::access::{Actor, Permission};
use utils_core::response::ApiResponse;

use crate::{
    DeploymentImpl, error::ApiError, http::auth::require_permission,
    middleware::load_category_middleware,
};

pub async fn get_categories(
    Extension(actor): Extension<Actor>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<CategoryWithEventCount>>>, ApiError> {
    require_permission(&actor, Permission::View)?;
    let categories = deployment
        .tracking_plan()
        .list_categories(&deployment.db().pool)
        .await?;
    Ok(ResponseJson(ApiResponse::success(categories)))
}

pub async fn get_category(
    Extension(actor): Extension<Actor>,
    Extension(category): Extension<Category>,
) -> Result<ResponseJson<ApiResponse<Category>>, ApiError> {
    require_permission(&actor, Permission::View)?;
    Ok(ResponseJson(ApiResponse::success(category)))
}

pub async fn create_category(
    Extension(actor): Extension<Actor>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateCategory>,
) -> Result<ResponseJson<ApiResponse<Category>>, ApiError> {
    require_permission(&actor, Permission::ManageCategories)?;
    let category = deployment
        .tracking_plan()
        .create_category(&deployment.db().pool, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(category)))
}

pub async fn update_category(
    Extension(actor): Extension<Actor>,
    Extension(category): Extension<Category>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateCategory>,
) -> Result<ResponseJson<ApiResponse<Category>>, ApiError> {
    require_permission(&actor, Permission::ManageCategories)?;
    let category = deployment
        .tracking_plan()
        .update_category(&deployment.db().pool, category.id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(category)))
}

pub async fn delete_category(
    Extension(actor): Extension<Actor>,
    Extension(category): Extension<Category>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    require_permission(&actor, Permission::DeleteCategories)?;
    deployment
        .tracking_plan()
        .delete_category(&deployment.db().pool, category.id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let category_id_router = Router::new()
        .route(
            "/",
            get(get_category).put(update_category).delete(delete_category),
        )
        .layer(from_fn_with_state(
            deployment.clone(),
            load_category_middleware::<DeploymentImpl>,
        ));

    let categories_router = Router::new()
        .route("/", get(get_categories).post(create_category))
        .nest("/{category_id}", category_id_router);

    Router::new().nest("/categories", categories_router)
}
