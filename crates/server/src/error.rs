use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::DbErr;
use deployment::DeploymentError;
use services::services::{config::ConfigError, tracking_plan::TrackingPlanError};
use thiserror::Error;
use utils_core::response::ApiResponse;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    TrackingPlan(#[from] TrackingPlanError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::TrackingPlan(err) => match err {
                TrackingPlanError::Validation { .. } => {
                    (StatusCode::BAD_REQUEST, "ValidationError")
                }
                TrackingPlanError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFoundError"),
                TrackingPlanError::Conflict(_)
                | TrackingPlanError::CategoryInUse { .. }
                | TrackingPlanError::VersionConflict { .. } => {
                    (StatusCode::CONFLICT, "ConflictError")
                }
                TrackingPlanError::Database(DbErr::RecordNotFound(_)) => {
                    (StatusCode::NOT_FOUND, "DatabaseError")
                }
                TrackingPlanError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError")
                }
            },
            ApiError::Deployment(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DeploymentError"),
            ApiError::Database(DbErr::RecordNotFound(_)) => {
                (StatusCode::NOT_FOUND, "DatabaseError")
            }
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            ApiError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ConfigError"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "ForbiddenError"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "ConflictError"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = self.status_and_type();

        let error_message = match &self {
            ApiError::TrackingPlan(err) if !status_code.is_server_error() => err.to_string(),
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg) => msg.clone(),
            _ => format!("{}: request could not be completed", error_type),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    #[test]
    fn api_error_maps_to_expected_http_statuses() {
        assert_eq!(
            ApiError::BadRequest("bad".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("nope".to_string())
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Internal("boom".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn tracking_plan_errors_map_to_expected_http_statuses() {
        let status = |err: TrackingPlanError| ApiError::from(err).into_response().status();

        assert_eq!(
            status(TrackingPlanError::Validation {
                field: "action",
                reason: "must not be empty".to_string(),
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(TrackingPlanError::NotFound("Event")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(TrackingPlanError::CategoryInUse { count: 2 }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(TrackingPlanError::VersionConflict {
                expected: 1,
                actual: 2
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(TrackingPlanError::Database(DbErr::Custom("disk".to_string()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn validation_message_names_the_field() {
        let response = ApiError::from(TrackingPlanError::Validation {
            field: "properties",
            reason: "duplicate property 'plan'".to_string(),
        })
        .into_response();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.get("success").and_then(|v| v.as_bool()), Some(false));
        let message = json
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        assert!(message.contains("properties"));
    }
}
