//! API Layer
//!
//! HTTP endpoints, authentication middleware, and route assembly.

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;

// Re-export commonly used types
pub use extract::{JsonBody, PathParam, QueryParams};
pub use handlers::{AppState, SuccessResponse};
pub use middleware::{
    auth_middleware, extract_auth_user, extract_optional_auth_user, optional_auth_middleware,
    require_partner, AuthUser,
};
pub use routes::{create_routes, RouterBuilder};
