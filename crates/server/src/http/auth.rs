use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use deployment::Deployment;
use services::services::{
    access::{Actor, Permission},
    config::{AccessControlMode, ApiUser},
};
use utils_core::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn extract_request_token(req: &Request) -> Option<String> {
    // 1) Authorization: Bearer <token>
    if let Some(value) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authorization_bearer)
    {
        return Some(value.to_string());
    }

    // 2) X-API-Token: <token>
    req.headers()
        .get("x-api-token")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn actor_for(user: &ApiUser) -> Actor {
    Actor {
        user_id: user.user_id,
        name: user.name.clone(),
        role: user.role,
    }
}

/// Resolves the caller and stores it as an [`Actor`] request extension.
pub async fn require_api_auth(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Response {
    let access_control = {
        let config = deployment.config().read().await;
        config.access_control.clone()
    };

    let actor = match access_control.mode {
        AccessControlMode::Disabled => Actor::local_admin(),
        AccessControlMode::Token => {
            let presented = extract_request_token(&req);
            match presented
                .as_deref()
                .and_then(|token| access_control.find_user(token))
            {
                Some(user) => actor_for(user),
                None => {
                    let reason = if presented.is_none() {
                        "missing_token"
                    } else {
                        "unknown_token"
                    };
                    tracing::warn!(
                        path = %req.uri().path(),
                        method = %req.method(),
                        reason,
                        "Unauthorized API request"
                    );
                    let response = ApiResponse::<()>::error("Unauthorized");
                    return (StatusCode::UNAUTHORIZED, Json(response)).into_response();
                }
            }
        }
    };

    req.extensions_mut().insert(actor);
    next.run(req).await
}

pub fn require_permission(actor: &Actor, permission: Permission) -> Result<(), ApiError> {
    if actor.can(permission) {
        return Ok(());
    }
    tracing::warn!(
        actor = %actor.name,
        role = %actor.role,
        %permission,
        "Permission denied"
    );
    Err(ApiError::Forbidden(format!(
        "Role '{}' lacks the '{}' permission",
        actor.role, permission
    )))
}

#[cfg(test)]
mod tests {
    use services::services::access::Role;

    use super::*;

    #[test]
    fn bearer_prefix_is_case_insensitive() {
        assert_eq!(parse_authorization_bearer("bearer abc"), Some("abc"));
        assert_eq!(parse_authorization_bearer("Bearer   abc "), Some("abc"));
        assert_eq!(parse_authorization_bearer("Basic abc"), None);
        assert_eq!(parse_authorization_bearer("Bearer "), None);
    }

    #[test]
    fn viewers_are_forbidden_from_editing() {
        let viewer = Actor {
            user_id: None,
            name: "guest".to_string(),
            role: Role::Viewer,
        };

        assert!(require_permission(&viewer, Permission::View).is_ok());
        let err = require_permission(&viewer, Permission::EditEvents).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(message) if message.contains("edit_events")));
    }
}
