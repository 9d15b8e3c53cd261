use axum::{middleware, Router};
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    middleware::auth_guard::require_auth,
    state::AppState,
};

mod admin;
mod appointments;
mod auth;
mod children;
mod dashboard;
mod hospital;
mod inventory;
mod vaccines;

/// Build the full `/api/v1` router.
///
/// Registration and login are public; every other route sits behind the
/// session-based [`require_auth`] middleware and narrows further through a
/// capability extractor in its handlers.
pub fn all_routes(state: AppState) -> Router<AppState> {
    let auth_mw = middleware::from_fn_with_state(state, require_auth);
    Router::new()
        .merge(auth::router())
        .merge(
            Router::new()
                .merge(auth::protected_router())
                .merge(dashboard::router())
                .merge(children::router())
                .merge(appointments::router())
                .merge(hospital::router())
                .merge(inventory::router())
                .merge(vaccines::router())
                .merge(admin::router())
                .route_layer(auth_mw),
        )
}

/// The complete application with its HTTP layers, ready to serve.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", all_routes(state.clone()))
        .layer(CookieManagerLayer::new())   // must come before state
        .layer(CorsLayer::permissive())     // tighten in production
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn send(req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app(AppState::lazy_for_tests()).oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn protected_routes_require_a_session() {
        for (method, uri) in [
            (Method::GET,   "/api/v1/children"),
            (Method::GET,   "/api/v1/appointments"),
            (Method::POST,  "/api/v1/appointments/abc/cancel"),
            (Method::POST,  "/api/v1/hospital/appointments/abc/approve"),
            (Method::PATCH, "/api/v1/hospital/appointments/abc/status"),
            (Method::PUT,   "/api/v1/hospital/inventory/abc"),
            (Method::GET,   "/api/v1/hospitals/abc/available-vaccines"),
            (Method::POST,  "/api/v1/admin/hospitals/abc/approve"),
            (Method::GET,   "/api/v1/auth/me"),
        ] {
            let req = Request::builder().method(method.clone()).uri(uri).body(Body::empty()).unwrap();
            let (status, body) = send(req).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body["error"], "Unauthorized");
        }
    }

    #[tokio::test]
    async fn malformed_login_body_is_rejected_before_any_lookup() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"username\": "))
            .unwrap();
        let (status, _) = send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let req = Request::builder().uri("/api/v1/nope").body(Body::empty()).unwrap();
        let (status, _) = send(req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn logout_without_session_clears_cookie() {
        let req = Request::builder().method(Method::POST).uri("/api/v1/auth/logout").body(Body::empty()).unwrap();
        let response = app(AppState::lazy_for_tests()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("session="));
    }
}
