//! Configuration Module
//!
//! Environment-driven settings for the server, storage, session tokens, OTP
//! issuance, and onboarding rules.

use crate::database::DatabaseConfig;
use crate::utils::security::DEFAULT_BCRYPT_COST;
use crate::utils::validation::validate_otp_code;
use std::time::Duration;

/// Environment variable helpers
pub mod env {
    use std::env;

    /// Get environment variable as string with default
    pub fn get_string(key: &str, default: &str) -> String {
        env::var(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get a non-empty environment variable
    pub fn get_optional(key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    /// Get environment variable as boolean with default
    pub fn get_bool(key: &str, default: bool) -> bool {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u32 with default
    pub fn get_u32(key: &str, default: u32) -> u32 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u16 with default
    pub fn get_u16(key: &str, default: u16) -> u16 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u64 with default
    pub fn get_u64(key: &str, default: u64) -> u64 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as i64 with default
    pub fn get_i64(key: &str, default: i64) -> i64 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

/// Application configuration combining all service configurations
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,

    /// None runs the service on the in-memory store
    pub database: Option<DatabaseConfig>,

    pub jwt: JwtConfig,

    pub otp: OtpConfig,

    pub onboarding: OnboardingConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub cors_origins: Vec<String>,
}

/// Session token configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HS256 signing secret; a random one is generated at startup when absent
    pub secret: Option<String>,
    pub expires_hours: i64,
    pub issuer: String,
}

/// OTP issuance configuration
#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub ttl_minutes: i64,
    /// Development-only pinned code
    pub fixed_code: Option<String>,
}

/// Rules for creating identities, credentials, and profiles
#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    /// Reject profile registration until the phone is verified
    pub profile_requires_verified_phone: bool,
    /// Only partners may call the identity upsert endpoint
    pub identity_creation_requires_partner: bool,
    pub bcrypt_cost: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: None,
            expires_hours: 24,
            issuer: "identity-service".to_string(),
        }
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 5,
            fixed_code: None,
        }
    }
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            profile_requires_verified_phone: false,
            identity_creation_requires_partner: true,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::get_string("SERVER_HOST", &defaults.host),
            port: env::get_u16("SERVER_PORT", defaults.port),
            log_level: env::get_string("LOG_LEVEL", &defaults.log_level),
            cors_origins: env::get_string("CORS_ORIGINS", "*")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Pool settings, present only when `DATABASE_URL` is set
pub fn database_from_env() -> Option<DatabaseConfig> {
    let url = env::get_optional("DATABASE_URL")?;
    let mut config = DatabaseConfig::new(url);

    config.max_connections = env::get_u32("DB_MAX_CONNECTIONS", config.max_connections);
    config.min_connections = env::get_u32("DB_MIN_CONNECTIONS", config.min_connections);
    config.connect_timeout = Duration::from_secs(env::get_u64(
        "DB_CONNECT_TIMEOUT",
        config.connect_timeout.as_secs(),
    ));
    config.idle_timeout =
        Duration::from_secs(env::get_u64("DB_IDLE_TIMEOUT", config.idle_timeout.as_secs()));
    config.max_lifetime =
        Duration::from_secs(env::get_u64("DB_MAX_LIFETIME", config.max_lifetime.as_secs()));

    Some(config)
}

impl JwtConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            secret: env::get_optional("JWT_SECRET"),
            expires_hours: env::get_i64("JWT_EXPIRES_HOURS", defaults.expires_hours),
            issuer: env::get_string("JWT_ISSUER", &defaults.issuer),
        }
    }
}

impl OtpConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl_minutes: env::get_i64("OTP_TTL_MINUTES", defaults.ttl_minutes),
            fixed_code: env::get_optional("OTP_FIXED_CODE"),
        }
    }
}

impl OnboardingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            profile_requires_verified_phone: env::get_bool(
                "PROFILE_REQUIRES_VERIFIED_PHONE",
                defaults.profile_requires_verified_phone,
            ),
            identity_creation_requires_partner: env::get_bool(
                "IDENTITY_CREATION_REQUIRES_PARTNER",
                defaults.identity_creation_requires_partner,
            ),
            bcrypt_cost: env::get_u32("BCRYPT_COST", defaults.bcrypt_cost),
        }
    }
}

impl AppConfig {
    /// Load complete application configuration from environment
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            database: database_from_env(),
            jwt: JwtConfig::from_env(),
            otp: OtpConfig::from_env(),
            onboarding: OnboardingConfig::from_env(),
        }
    }

    /// Validate the complete configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".into());
        }

        if let Some(database) = &self.database {
            if database.max_connections == 0 {
                return Err("Database max_connections must be greater than 0".into());
            }

            if database.min_connections > database.max_connections {
                return Err(
                    "Database min_connections cannot be greater than max_connections".into(),
                );
            }
        }

        if let Some(secret) = &self.jwt.secret {
            if secret.len() < 32 {
                return Err("JWT secret must be at least 32 characters".into());
            }
        }

        if self.jwt.expires_hours <= 0 {
            return Err("JWT expiry must be a positive number of hours".into());
        }

        if self.otp.ttl_minutes <= 0 {
            return Err("OTP TTL must be a positive number of minutes".into());
        }

        if let Some(code) = &self.otp.fixed_code {
            if !validate_otp_code(code) {
                return Err("OTP_FIXED_CODE must be exactly 6 digits".into());
            }
        }

        if !(4..=31).contains(&self.onboarding.bcrypt_cost) {
            return Err("BCRYPT_COST must be between 4 and 31".into());
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: None,
            jwt: JwtConfig::default(),
            otp: OtpConfig::default(),
            onboarding: OnboardingConfig::default(),
        }
    }
}
