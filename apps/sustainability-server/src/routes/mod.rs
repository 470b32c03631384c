pub mod auth;
pub mod health;
pub mod kpi;
pub mod users;

use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(kpi::router())
                .merge(crate::openapi::router()),
        )
        .with_state(state)
}

#[cfg(test)]
mod auth_gaps_tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use std::sync::OnceLock;
    use tower::ServiceExt;

    static STATE: OnceLock<AppState> = OnceLock::new();

    fn state() -> AppState {
        STATE.get_or_init(crate::test_support::test_state).clone()
    }

    async fn send(method: Method, uri: &str, bearer: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method.clone()).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = if method == Method::GET {
            Body::empty()
        } else {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from("{}")
        };
        let resp = router(state())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn protected_routes_require_bearer_auth() {
        for (method, uri) in [
            (Method::GET, "/api/auth/profile"),
            (Method::GET, "/api/auth/me"),
            (Method::PUT, "/api/auth/profile"),
            (Method::PUT, "/api/auth/change-password"),
            (Method::POST, "/api/auth/register"),
            (Method::GET, "/api/auth/users"),
            (Method::GET, "/api/kpi/summary"),
            (Method::GET, "/api/kpi/summary/export"),
            (Method::GET, "/api/kpi/energy/insights"),
        ] {
            let (status, body) = send(method.clone(), uri, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body["success"], serde_json::json!(false));
            assert_eq!(
                body["error"],
                serde_json::json!(crate::auth::NOT_AUTHORIZED)
            );
        }
    }

    #[tokio::test]
    async fn forged_token_is_rejected_before_database_lookup() {
        let other = crate::auth::TokenManager::new(b"some-other-secret-value", 3600);
        let token = other.issue(uuid::Uuid::new_v4()).unwrap();
        let (status, _) = send(Method::GET, "/api/kpi/summary", Some(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_validates_before_touching_the_database() {
        let (status, body) = send(Method::POST, "/api/auth/login", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], serde_json::json!("Please include a valid email"));
    }

    #[tokio::test]
    async fn health_and_openapi_are_public() {
        let (status, body) = send(Method::GET, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], serde_json::json!("ok"));

        let (status, body) = send(Method::GET, "/api/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"].is_object());
    }
}
