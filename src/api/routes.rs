//! API Route Definitions
//!
//! Routes are assembled through [`RouterBuilder`], which lets a deployment
//! switch individual endpoints off. Authentication and role requirements are
//! attached per method as route layers, so the guard always authenticates
//! before it authorizes.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post, MethodRouter},
    Router,
};
use std::sync::Arc;

use super::handlers::*;
use super::middleware::{auth_middleware, optional_auth_middleware, require_partner};
use crate::service::JwtService;

/// Builder for creating API routes with configurable endpoints
#[derive(Default)]
pub struct RouterBuilder {
    /// GET /health
    health_check: bool,
    /// POST /users/send-otp
    send_otp: bool,
    /// POST /users/verify-otp
    verify_otp: bool,
    /// POST /users/login
    login: bool,
    /// POST /users/register-profile
    register_profile: bool,
    /// POST /users
    create_identity: bool,
    /// GET /users
    list_identities: bool,
    /// GET /users/{id}
    get_identity: bool,
    /// PATCH /users/{id}
    update_identity: bool,
    /// DELETE /users/{id}
    delete_identity: bool,
}

impl RouterBuilder {
    /// Creates a new router builder with all routes disabled by default
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a router builder with all routes enabled
    pub fn with_all_routes() -> Self {
        Self {
            health_check: true,
            send_otp: true,
            verify_otp: true,
            login: true,
            register_profile: true,
            create_identity: true,
            list_identities: true,
            get_identity: true,
            update_identity: true,
            delete_identity: true,
        }
    }

    /// Only the unauthenticated verification and login flow
    pub fn with_public_routes() -> Self {
        Self {
            health_check: true,
            send_otp: true,
            verify_otp: true,
            login: true,
            register_profile: true,
            ..Self::default()
        }
    }

    /// Health check only
    pub fn with_minimal_routes() -> Self {
        Self {
            health_check: true,
            ..Self::default()
        }
    }

    pub fn health_check(mut self, enabled: bool) -> Self {
        self.health_check = enabled;
        self
    }

    pub fn send_otp(mut self, enabled: bool) -> Self {
        self.send_otp = enabled;
        self
    }

    pub fn verify_otp(mut self, enabled: bool) -> Self {
        self.verify_otp = enabled;
        self
    }

    pub fn login(mut self, enabled: bool) -> Self {
        self.login = enabled;
        self
    }

    pub fn register_profile(mut self, enabled: bool) -> Self {
        self.register_profile = enabled;
        self
    }

    pub fn create_identity(mut self, enabled: bool) -> Self {
        self.create_identity = enabled;
        self
    }

    pub fn list_identities(mut self, enabled: bool) -> Self {
        self.list_identities = enabled;
        self
    }

    pub fn get_identity(mut self, enabled: bool) -> Self {
        self.get_identity = enabled;
        self
    }

    pub fn update_identity(mut self, enabled: bool) -> Self {
        self.update_identity = enabled;
        self
    }

    pub fn delete_identity(mut self, enabled: bool) -> Self {
        self.delete_identity = enabled;
        self
    }

    /// Builds the router; guards are wired from the state's JWT service
    pub fn build(self, state: &AppState) -> Router<AppState> {
        let jwt = state.jwt_service.clone();
        let mut router = Router::new();

        if self.health_check {
            router = router.route("/health", get(health_check));
        }

        if self.send_otp {
            router = router.route("/users/send-otp", post(send_otp));
        }

        if self.verify_otp {
            router = router.route("/users/verify-otp", post(verify_otp));
        }

        if self.login {
            router = router.route("/users/login", post(login));
        }

        if self.register_profile {
            router = router.route(
                "/users/register-profile",
                optionally_authenticated(&jwt, post(register_profile)),
            );
        }

        if self.create_identity {
            let route = if state.identity_creation_requires_partner {
                partner_only(&jwt, post(create_identity))
            } else {
                optionally_authenticated(&jwt, post(create_identity))
            };
            router = router.route("/users", route);
        }

        if self.list_identities {
            router = router.route("/users", partner_only(&jwt, get(list_identities)));
        }

        if self.get_identity {
            router = router.route("/users/{id}", partner_only(&jwt, get(get_identity)));
        }

        if self.update_identity {
            router = router.route("/users/{id}", authenticated(&jwt, patch(update_identity)));
        }

        if self.delete_identity {
            router = router.route("/users/{id}", partner_only(&jwt, delete(delete_identity)));
        }

        router
    }
}

/// Require a valid bearer token
fn authenticated(
    jwt: &Arc<JwtService>,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(jwt.clone(), auth_middleware))
}

/// Require a valid bearer token carrying the partner role
fn partner_only(jwt: &Arc<JwtService>, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    // Layers run outermost-first: authenticate, then check the role
    route
        .route_layer(from_fn(require_partner))
        .route_layer(from_fn_with_state(jwt.clone(), auth_middleware))
}

/// Attach the principal when a valid bearer token is present
fn optionally_authenticated(
    jwt: &Arc<JwtService>,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(jwt.clone(), optional_auth_middleware))
}

/// Creates all API routes
pub fn create_routes(state: &AppState) -> Router<AppState> {
    RouterBuilder::with_all_routes().build(state)
}
