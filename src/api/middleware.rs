//! Authentication Middleware
//!
//! Bearer token verification and role gating for API endpoints.

use crate::models::{Principal, Role};
use crate::service::JwtService;
use crate::utils::error::AppError;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Extension type for storing the authenticated principal in request extensions
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

/// Pull the token out of `Authorization: Bearer <token>`
fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header format".into()))
}

/// Authentication middleware that requires a valid bearer token
///
/// On success the principal is inserted into request extensions as [`AuthUser`].
/// Missing, malformed, or expired tokens yield 401.
pub async fn auth_middleware(
    State(jwt_service): State<Arc<JwtService>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers)?;
    let principal = jwt_service.authenticate(token)?;

    request.extensions_mut().insert(AuthUser(principal));

    Ok(next.run(request).await)
}

/// Optional authentication middleware
///
/// Attaches the principal when a valid bearer token is present and otherwise
/// lets the request through unauthenticated.
pub async fn optional_auth_middleware(
    State(jwt_service): State<Arc<JwtService>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    if let Ok(token) = bearer_token(&headers) {
        match jwt_service.authenticate(token) {
            Ok(principal) => {
                request.extensions_mut().insert(AuthUser(principal));
            }
            Err(e) => log::debug!("Ignoring unusable bearer token: {}", e),
        }
    }

    next.run(request).await
}

/// Role gate for partner-only routes; must run after `auth_middleware`
pub async fn require_partner(request: Request, next: Next) -> Result<Response, AppError> {
    extract_auth_user(&request)?.authorize(&[Role::Partner])?;
    Ok(next.run(request).await)
}

/// Helper function to extract the authenticated principal from request extensions
pub fn extract_auth_user(request: &Request) -> Result<&Principal, AppError> {
    extract_optional_auth_user(request)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
}

/// Helper function to optionally extract the principal from request extensions
pub fn extract_optional_auth_user(request: &Request) -> Option<&Principal> {
    request
        .extensions()
        .get::<AuthUser>()
        .map(|auth_user| &auth_user.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, StatusCode},
        middleware::{from_fn, from_fn_with_state},
        routing::get,
        Router,
    };
    use chrono::Duration;
    use tower::util::ServiceExt;
    use uuid::Uuid;

    fn create_test_jwt_service() -> Arc<JwtService> {
        Arc::new(JwtService::new(
            "test-secret-key-that-is-long-enough-for-hs256",
            Duration::hours(1),
            "identity-service",
        ))
    }

    async fn test_handler() -> &'static str {
        "OK"
    }

    async fn whoami(request: Request) -> Result<String, AppError> {
        Ok(extract_auth_user(&request)?.role.to_string())
    }

    fn get_request(token: Option<&str>) -> Request<Body> {
        let mut builder = axum::http::Request::builder().method(Method::GET).uri("/test");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn protected_app(jwt_service: Arc<JwtService>) -> Router {
        Router::new()
            .route("/test", get(whoami))
            .layer(from_fn_with_state(jwt_service, auth_middleware))
    }

    fn partner_app(jwt_service: Arc<JwtService>) -> Router {
        Router::new()
            .route("/test", get(test_handler))
            .route_layer(from_fn(require_partner))
            .route_layer(from_fn_with_state(jwt_service, auth_middleware))
    }

    #[tokio::test]
    async fn test_auth_middleware_missing_header() {
        let app = protected_app(create_test_jwt_service());
        let response = app.oneshot(get_request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_auth_middleware_invalid_format() {
        let app = protected_app(create_test_jwt_service());
        let request = axum::http::Request::builder()
            .method(Method::GET)
            .uri("/test")
            .header(AUTHORIZATION, "Token abc")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_auth_middleware_valid_token() {
        let jwt_service = create_test_jwt_service();
        let issued = jwt_service.issue(Uuid::new_v4(), Role::Patient).unwrap();

        let app = protected_app(jwt_service);
        let response = app.oneshot(get_request(Some(&issued.token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_auth_middleware_expired_token() {
        let expired_issuer = JwtService::new(
            "test-secret-key-that-is-long-enough-for-hs256",
            Duration::seconds(-30),
            "identity-service",
        );
        let issued = expired_issuer.issue(Uuid::new_v4(), Role::Partner).unwrap();

        let app = protected_app(create_test_jwt_service());
        let response = app.oneshot(get_request(Some(&issued.token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_require_partner_forbids_patient() {
        let jwt_service = create_test_jwt_service();
        let patient = jwt_service.issue(Uuid::new_v4(), Role::Patient).unwrap();
        let partner = jwt_service.issue(Uuid::new_v4(), Role::Partner).unwrap();

        let response = partner_app(jwt_service.clone())
            .oneshot(get_request(Some(&patient.token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = partner_app(jwt_service.clone())
            .oneshot(get_request(Some(&partner.token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Authentication runs before authorization
        let response = partner_app(jwt_service)
            .oneshot(get_request(None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_optional_auth_middleware() {
        let jwt_service = create_test_jwt_service();
        let issued = jwt_service.issue(Uuid::new_v4(), Role::Partner).unwrap();

        let app = Router::new()
            .route(
                "/test",
                get(|request: Request| async move {
                    extract_optional_auth_user(&request)
                        .map(|principal| principal.role.to_string())
                        .unwrap_or_else(|| "anonymous".to_string())
                }),
            )
            .layer(from_fn_with_state(jwt_service, optional_auth_middleware));

        let response = app.clone().oneshot(get_request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"anonymous");

        let response = app.clone().oneshot(get_request(Some(&issued.token))).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"partner");

        let response = app.oneshot(get_request(Some("garbage"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_extract_auth_user() {
        let mut request = get_request(None);
        assert!(extract_auth_user(&request).is_err());

        let principal = Principal {
            subject: Uuid::new_v4(),
            role: Role::Patient,
        };
        request.extensions_mut().insert(AuthUser(principal.clone()));

        assert_eq!(extract_auth_user(&request).unwrap(), &principal);
    }
}
