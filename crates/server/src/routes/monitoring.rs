use axum::{Extension, Router, extract::State, response::Json as ResponseJson, routing::get};
use db::models::event::MonitoredEvent;
use deployment::Deployment;
use services::services::access::{Actor, Permission};
use utils_core::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, http::auth::require_permission};

pub async fn get_monitored_events(
    Extension(actor): Extension<Actor>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<MonitoredEvent>>>, ApiError> {
    require_permission(&actor, Permission::View)?;
    let events = deployment
        .tracking_plan()
        .events_for_monitoring(&deployment.db().pool)
        .await?;
    Ok(ResponseJson(ApiResponse::success(events)))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/monitoring/events", get(get_monitored_events))
}
