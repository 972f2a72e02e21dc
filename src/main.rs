//! Identity Service Server
//!
//! Runs the full API. Uses PostgreSQL when `DATABASE_URL` is set and falls
//! back to the in-memory store otherwise.

use std::sync::Arc;

use axum::http::HeaderValue;
use dotenv::dotenv;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use identity_service::{
    api::{AppState, RouterBuilder},
    config::{AppConfig, ServerConfig},
    database::{run_migrations, IdentityStore, MemoryStore, PgStore, ProfileStore},
    service::{JwtService, LoggingOtpDelivery},
};

type Stores = (Arc<dyn IdentityStore>, Arc<dyn ProfileStore>);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv().ok();

    let config = AppConfig::from_env();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.server.log_level.as_str()),
    )
    .init();

    log::info!("Starting Identity Service v{}", identity_service::VERSION);

    config.validate()?;
    log::info!("Configuration loaded and validated");

    let (identities, profiles) = open_stores(&config).await?;
    let jwt_service = Arc::new(JwtService::from_config(&config.jwt));

    let state = AppState::new(
        identities,
        profiles,
        jwt_service,
        Arc::new(LoggingOtpDelivery),
        &config,
    );

    log::info!(
        "POST /users requires partner role: {}",
        config.onboarding.identity_creation_requires_partner
    );
    log::info!(
        "Profile registration requires verified phone: {}",
        config.onboarding.profile_requires_verified_phone
    );

    let app = RouterBuilder::with_all_routes()
        .build(&state)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.server))
                .into_inner(),
        );

    let bind_addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    log::info!("Listening on {}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn open_stores(config: &AppConfig) -> Result<Stores, Box<dyn std::error::Error>> {
    match &config.database {
        Some(database) => {
            let pool = database.create_pool().await?;

            log::info!("Running database migrations...");
            run_migrations(&pool).await?;
            log::info!("Database migrations completed");

            let store = Arc::new(PgStore::new(pool));
            let identities: Arc<dyn IdentityStore> = store.clone();
            let profiles: Arc<dyn ProfileStore> = store;
            Ok((identities, profiles))
        }
        None => {
            log::warn!("DATABASE_URL is not set; using the in-memory store. Data will not persist");
            let store = Arc::new(MemoryStore::new());
            let identities: Arc<dyn IdentityStore> = store.clone();
            let profiles: Arc<dyn ProfileStore> = store;
            Ok((identities, profiles))
        }
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if server.cors_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
