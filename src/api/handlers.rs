//! HTTP Request Handlers
//!
//! Axum handlers for processing HTTP requests and responses. Request
//! validation happens in the services.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use uuid::Uuid;

use super::extract::{JsonBody, PathParam, QueryParams};
use super::middleware::AuthUser;
use crate::{
    config::AppConfig,
    database::{IdentityStore, Pagination, ProfileStore},
    models::*,
    service::{
        IdentityService, JwtService, OtpDelivery, OtpService, ProfileService, SessionService,
    },
    utils::error::{AppError, AppResult},
    VERSION,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub otp_service: Arc<OtpService>,
    pub identity_service: Arc<IdentityService>,
    pub profile_service: Arc<ProfileService>,
    pub session_service: Arc<SessionService>,
    pub jwt_service: Arc<JwtService>,
    /// Whether POST /users is partner-only or open to anyone
    pub identity_creation_requires_partner: bool,
}

impl AppState {
    /// Wire every service onto the given stores
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        profiles: Arc<dyn ProfileStore>,
        jwt_service: Arc<JwtService>,
        delivery: Arc<dyn OtpDelivery>,
        config: &AppConfig,
    ) -> Self {
        let bcrypt_cost = config.onboarding.bcrypt_cost;

        Self {
            otp_service: Arc::new(
                OtpService::new(identities.clone(), delivery).with_config(&config.otp),
            ),
            identity_service: Arc::new(IdentityService::with_bcrypt_cost(
                identities.clone(),
                bcrypt_cost,
            )),
            profile_service: Arc::new(
                ProfileService::new(identities.clone(), profiles)
                    .require_verified_phone(config.onboarding.profile_requires_verified_phone),
            ),
            session_service: Arc::new(
                SessionService::new(identities, jwt_service.clone()).with_bcrypt_cost(bcrypt_cost),
            ),
            jwt_service,
            identity_creation_requires_partner: config
                .onboarding
                .identity_creation_requires_partner,
        }
    }
}

/// Standard success response wrapper
#[derive(serde::Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

type JsonResult<T> = AppResult<Json<SuccessResponse<T>>>;

/// Issue an OTP, creating a stub identity for unseen phones
pub async fn send_otp(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SendOtpRequest>,
) -> JsonResult<SendOtpResponse> {
    let response = state.otp_service.issue_otp(request).await?;
    Ok(Json(SuccessResponse::new(response)))
}

/// Verify the outstanding OTP for a phone
pub async fn verify_otp(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<VerifyOtpRequest>,
) -> JsonResult<VerifyOtpResponse> {
    let response = state.otp_service.verify_otp(request).await?;
    Ok(Json(SuccessResponse::new(response)))
}

/// Credential login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> JsonResult<LoginResponse> {
    let response = state.session_service.login(request).await?;
    Ok(Json(SuccessResponse::new(response)))
}

/// Create or update a profile for the identity owning a phone
///
/// A bearer token is accepted on this route but not required; invalid tokens
/// are ignored and the request proceeds anonymously.
pub async fn register_profile(
    State(state): State<AppState>,
    auth_user: Option<Extension<AuthUser>>,
    JsonBody(request): JsonBody<RegisterProfileRequest>,
) -> JsonResult<RegisterProfileResponse> {
    if let Some(Extension(AuthUser(principal))) = &auth_user {
        log::debug!("Profile registration by {} ({})", principal.subject, principal.role);
    }

    let response = state.profile_service.register_profile(request).await?;
    Ok(Json(SuccessResponse::new(response)))
}

/// Phone-keyed identity upsert
pub async fn create_identity(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateIdentityRequest>,
) -> AppResult<(StatusCode, Json<SuccessResponse<CreateIdentityResponse>>)> {
    let response = state
        .identity_service
        .create_or_update_identity(request)
        .await?;

    let status = if response.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(SuccessResponse::new(response))))
}

/// Paginated identity directory
pub async fn list_identities(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListIdentitiesQuery>,
) -> JsonResult<Vec<Identity>> {
    let pagination = Pagination::from_query(query.page, query.per_page);
    let identities = state.identity_service.list_identities(pagination).await?;
    Ok(Json(SuccessResponse::new(identities)))
}

/// Get identity by ID
pub async fn get_identity(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> JsonResult<Identity> {
    let identity = state.identity_service.get_identity(id).await?;
    Ok(Json(SuccessResponse::new(identity)))
}

/// Partial update; patients may only update themselves
pub async fn update_identity(
    State(state): State<AppState>,
    Extension(AuthUser(principal)): Extension<AuthUser>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(request): JsonBody<UpdateIdentityRequest>,
) -> JsonResult<Identity> {
    if principal.subject != id && principal.role != Role::Partner {
        return Err(AppError::Forbidden(
            "Only partners may update other identities".to_string(),
        ));
    }

    let identity = state.identity_service.update_identity(id, request).await?;
    Ok(Json(SuccessResponse::new(identity)))
}

/// Soft-delete an identity
pub async fn delete_identity(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> JsonResult<MessageResponse> {
    state.identity_service.delete_identity(id).await?;
    Ok(Json(SuccessResponse::new(MessageResponse {
        message: "Identity deleted".to_string(),
    })))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> JsonResult<HealthCheckResponse> {
    state.identity_service.health_check().await?;

    let response = HealthCheckResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: VERSION.to_string(),
    };

    Ok(Json(SuccessResponse::new(response)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response_creation() {
        let response = SuccessResponse::new("test data");
        assert!(response.success);
        assert_eq!(response.data, "test data");

        let json = serde_json::to_value(SuccessResponse::new(MessageResponse {
            message: "ok".to_string(),
        }))
        .unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["message"], "ok");
    }
}
