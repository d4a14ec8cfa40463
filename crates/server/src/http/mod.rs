use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::trace::TraceLayer;

use crate::{DeploymentImpl, routes};

pub(crate) mod auth;

pub fn router(deployment: DeploymentImpl) -> Router {
    let api_routes = Router::new()
        .merge(routes::categories::router(&deployment))
        .merge(routes::events::router(&deployment))
        .merge(routes::comments::router())
        .merge(routes::monitoring::router())
        .layer(from_fn_with_state(
            deployment.clone(),
            auth::require_api_auth,
        ));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
        response::Response,
    };
    use deployment::Deployment;
    use serde_json::{Value, json};
    use services::services::{
        access::Role,
        config::{AccessControlMode, ApiUser, Config},
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::{DeploymentImpl, test_support::TestEnvGuard};

    async fn setup_deployment() -> (TestEnvGuard, DeploymentImpl) {
        let env_guard = TestEnvGuard::new();
        let deployment = DeploymentImpl::new().await.unwrap();
        (env_guard, deployment)
    }

    async fn enable_tokens(deployment: &DeploymentImpl) {
        let mut config = deployment.config().write().await;
        config.access_control.mode = AccessControlMode::Token;
        config.access_control.api_users = vec![
            ApiUser {
                token: "viewer-token".to_string(),
                user_id: Some(Uuid::new_v4()),
                name: "viv".to_string(),
                role: Role::Viewer,
            },
            ApiUser {
                token: "editor-token".to_string(),
                user_id: Some(Uuid::new_v4()),
                name: "eddie".to_string(),
                role: Role::Editor,
            },
        ];
    }

    fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response: Response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn signup_event() -> Value {
        json!({
            "category": "Auth",
            "action": "signup",
            "platforms": ["web", "ios"],
            "properties": [
                { "name": "plan", "type": "string", "required": true }
            ]
        })
    }

    #[tokio::test]
    async fn health_remains_public_in_token_mode() {
        let (_env_guard, deployment) = setup_deployment().await;
        enable_tokens(&deployment).await;
        let app = super::router(deployment);

        let (status, json) = send(&app, request(Method::GET, "/health", None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"], "OK");
    }

    #[tokio::test]
    async fn token_mode_is_read_from_config_file_at_startup() {
        let mut config = Config::default();
        config.access_control.mode = AccessControlMode::Token;
        config.access_control.api_users = vec![ApiUser {
            token: "admin-token".to_string(),
            user_id: None,
            name: "ops".to_string(),
            role: Role::Admin,
        }];
        let env_guard = TestEnvGuard::with_config(&config);
        let deployment = DeploymentImpl::new().await.unwrap();
        assert!(env_guard.root().join("db.sqlite").exists());
        let app = super::router(deployment);

        let (status, _) = send(&app, request(Method::GET, "/api/events", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut authorized = request(Method::GET, "/api/events", None);
        authorized
            .headers_mut()
            .insert("x-api-token", "admin-token".parse().unwrap());
        let (status, json) = send(&app, authorized).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
    }

    #[tokio::test]
    async fn api_requires_a_known_token_when_enabled() {
        let (_env_guard, deployment) = setup_deployment().await;
        enable_tokens(&deployment).await;
        let app = super::router(deployment);

        let (status, json) = send(&app, request(Method::GET, "/api/events", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Unauthorized");

        let mut unknown = request(Method::GET, "/api/events", None);
        unknown
            .headers_mut()
            .insert(header::AUTHORIZATION, "Bearer nope".parse().unwrap());
        let (status, _) = send(&app, unknown).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut viewer = request(Method::GET, "/api/events", None);
        viewer
            .headers_mut()
            .insert("x-api-token", "viewer-token".parse().unwrap());
        let (status, json) = send(&app, viewer).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"], json!([]));
    }

    #[tokio::test]
    async fn roles_gate_writes() {
        let (_env_guard, deployment) = setup_deployment().await;
        enable_tokens(&deployment).await;
        let app = super::router(deployment);

        let mut as_viewer = request(Method::POST, "/api/events", Some(signup_event()));
        as_viewer
            .headers_mut()
            .insert(header::AUTHORIZATION, "Bearer viewer-token".parse().unwrap());
        let (status, json) = send(&app, as_viewer).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["success"], false);

        let mut as_editor = request(Method::POST, "/api/events", Some(signup_event()));
        as_editor
            .headers_mut()
            .insert(header::AUTHORIZATION, "Bearer editor-token".parse().unwrap());
        let (status, json) = send(&app, as_editor).await;
        assert_eq!(status, StatusCode::OK);
        let event_id = json["data"]["id"].as_str().unwrap().to_string();

        let mut delete = request(Method::DELETE, &format!("/api/events/{event_id}"), None);
        delete
            .headers_mut()
            .insert(header::AUTHORIZATION, "Bearer editor-token".parse().unwrap());
        let (status, _) = send(&app, delete).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn event_lifecycle_over_http() {
        let (_env_guard, deployment) = setup_deployment().await;
        let app = super::router(deployment);

        let (status, json) = send(
            &app,
            request(Method::POST, "/api/events", Some(signup_event())),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["current_version"], 1);
        let event_id = json["data"]["id"].as_str().unwrap().to_string();

        let (status, json) = send(
            &app,
            request(
                Method::PUT,
                &format!("/api/events/{event_id}/statuses/web"),
                Some(json!({ "implementation_status": "implemented", "comment": "shipped" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["history"].as_array().unwrap().len(), 1);

        let (status, json) = send(
            &app,
            request(
                Method::PUT,
                &format!("/api/events/{event_id}"),
                Some(json!({ "action": "sign_up" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["current_version"], 2);

        let (status, json) = send(
            &app,
            request(Method::GET, &format!("/api/events/{event_id}"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["versions"].as_array().unwrap().len(), 2);
        assert_eq!(json["data"]["statuses"].as_array().unwrap().len(), 2);

        let (status, json) = send(
            &app,
            request(
                Method::GET,
                &format!("/api/events/{event_id}/statuses/web/history?version=1"),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"].as_array().unwrap().len(), 1);

        let (status, json) = send(
            &app,
            request(
                Method::GET,
                &format!("/api/events/{event_id}/versions/1"),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["action"], "signup");

        let (status, json) = send(
            &app,
            request(
                Method::POST,
                &format!("/api/events/{event_id}/comments"),
                Some(json!({ "content": "  looks good  " })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["content"], "looks good");

        let (status, _) = send(
            &app,
            request(Method::DELETE, &format!("/api/events/{event_id}"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = send(
            &app,
            request(Method::GET, &format!("/api/events/{event_id}"), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn validation_and_conflicts_use_the_error_envelope() {
        let (_env_guard, deployment) = setup_deployment().await;
        let app = super::router(deployment);

        let (status, json) = send(
            &app,
            request(
                Method::POST,
                "/api/events",
                Some(json!({ "category": "Auth", "action": "   " })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"].as_str().unwrap().contains("action"));

        let (status, _) = send(
            &app,
            request(Method::POST, "/api/events", Some(signup_event())),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, json) = send(&app, request(Method::GET, "/api/categories", None)).await;
        let category = &json["data"][0];
        assert_eq!(category["event_count"], 1);
        let category_id = category["id"].as_str().unwrap().to_string();

        let (status, json) = send(
            &app,
            request(
                Method::DELETE,
                &format!("/api/categories/{category_id}"),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["success"], false);

        let (status, _) = send(
            &app,
            request(Method::POST, "/api/categories", Some(json!({ "name": "Auth" }))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn monitoring_lists_events_with_active_platforms() {
        let (_env_guard, deployment) = setup_deployment().await;
        let app = super::router(deployment);

        send(
            &app,
            request(Method::POST, "/api/events", Some(signup_event())),
        )
        .await;

        let (status, json) = send(&app, request(Method::GET, "/api/monitoring/events", None)).await;
        assert_eq!(status, StatusCode::OK);
        let events = json["data"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["action"], "signup");
    }
}
