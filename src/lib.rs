//! Identity Service Library
//!
//! Phone-keyed identity management for a two-sided marketplace of patients and
//! partners: OTP verification of phone numbers, a phone-keyed identity upsert,
//! profile linkage, credential login with signed session tokens, and a
//! role-based access guard.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use identity_service::{
//!     api::{AppState, RouterBuilder},
//!     config::AppConfig,
//!     database::MemoryStore,
//!     service::{JwtService, LoggingOtpDelivery},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::from_env();
//!     let store = Arc::new(MemoryStore::new());
//!     let jwt_service = Arc::new(JwtService::from_config(&config.jwt));
//!
//!     let state = AppState::new(
//!         store.clone(),
//!         store,
//!         jwt_service,
//!         Arc::new(LoggingOtpDelivery),
//!         &config,
//!     );
//!
//!     // Only the public verification flow
//!     let app = RouterBuilder::with_public_routes()
//!         .build(&state)
//!         .with_state(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **API Layer**: handlers, bearer/role middleware, and the route builder
//! - **Service Layer**: OTP, identity, profile, and session logic
//! - **Database**: store traits with PostgreSQL and in-memory implementations
//! - **Models**: identities, profiles, token claims, and request payloads
//! - **Utils**: errors, validation, and security helpers

/// HTTP API layer with handlers and configurable routing
pub mod api;

/// Environment-driven configuration
pub mod config;

/// Store traits and their implementations
pub mod database;

/// Data models and request/response structures
pub mod models;

/// Business logic services
pub mod service;

/// Shared utilities for security, validation, and error handling
pub mod utils;

// Re-export commonly used types for convenient access
pub use api::{create_routes, AppState, RouterBuilder};
pub use config::{AppConfig, JwtConfig, OnboardingConfig, OtpConfig, ServerConfig};
pub use database::{DatabaseConfig, IdentityStore, MemoryStore, PgStore, ProfileStore};
pub use models::{Identity, Principal, Profile, Role};
pub use service::{IdentityService, JwtService, OtpService, ProfileService, SessionService};
pub use utils::error::{AppError, AppResult, ErrorResponse};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
