/// Configuration management for the PBMap auth service
use crate::{
    cache::CacheConfig,
    error::{ApiError, ApiResult},
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub providers: ProviderConfig,
    pub cache: CacheConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
}

/// Token and session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    /// Lifetime of issued app tokens and their cache entries
    pub app_token_ttl_secs: u64,
    /// Absolute lifetime of a session's refresh token
    pub session_ttl_days: i64,
}

/// Social identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Expected `aud` of Google ID tokens
    pub google_client_id: String,
    pub google_jwks_url: String,
    /// LINE channel id sent as `client_id` on verification
    pub line_channel_id: String,
    pub line_verify_url: String,
    pub http_timeout_secs: u64,
}

/// Background job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub session_cleanup_interval_secs: u64,
    pub health_check_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directives used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

pub const DEFAULT_GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
pub const DEFAULT_LINE_VERIFY_URL: &str = "https://api.line.me/oauth2/v2.1/verify";

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ApiError::Validation("Invalid port number".to_string()))?;

        let database_path = env::var("PBMAP_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/pbmap.sqlite"));
        let max_connections = env::var("PBMAP_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| ApiError::Validation("JWT secret required".to_string()))?;
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "pbmap_api".to_string());
        let app_token_ttl_secs = env::var("APP_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "259200".to_string())
            .parse()
            .unwrap_or(259200);
        let session_ttl_days = env::var("SESSION_TTL_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let google_client_id = env::var("GOOGLE_CLIENT_ID").unwrap_or_default();
        let google_jwks_url = env::var("GOOGLE_JWKS_URL")
            .unwrap_or_else(|_| DEFAULT_GOOGLE_JWKS_URL.to_string());
        let line_channel_id = env::var("LINE_CHANNEL_ID").unwrap_or_default();
        let line_verify_url = env::var("LINE_VERIFY_URL")
            .unwrap_or_else(|_| DEFAULT_LINE_VERIFY_URL.to_string());
        let http_timeout_secs = env::var("PROVIDER_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let session_cleanup_interval_secs = env::var("SESSION_CLEANUP_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .unwrap_or(3600);
        let health_check_interval_secs = env::var("HEALTH_CHECK_INTERVAL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "pbmap_auth=debug,tower_http=debug".to_string());
        let log_json = env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
            },
            storage: StorageConfig {
                database_path,
                max_connections,
            },
            authentication: AuthConfig {
                jwt_secret,
                jwt_issuer,
                app_token_ttl_secs,
                session_ttl_days,
            },
            providers: ProviderConfig {
                google_client_id,
                google_jwks_url,
                line_channel_id,
                line_verify_url,
                http_timeout_secs,
            },
            cache: CacheConfig::from_env(),
            jobs: JobsConfig {
                session_cleanup_interval_secs,
                health_check_interval_secs,
            },
            logging: LoggingConfig {
                level: log_level,
                json: log_json,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(ApiError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.jwt_issuer.is_empty() {
            return Err(ApiError::Validation("JWT issuer cannot be empty".to_string()));
        }

        if self.authentication.app_token_ttl_secs == 0 {
            return Err(ApiError::Validation(
                "App token TTL must be positive".to_string(),
            ));
        }

        if self.authentication.session_ttl_days <= 0 {
            return Err(ApiError::Validation(
                "Session TTL must be positive".to_string(),
            ));
        }

        if self.providers.google_client_id.is_empty() {
            tracing::warn!("GOOGLE_CLIENT_ID is not set, Google logins will be rejected");
        }
        if self.providers.line_channel_id.is_empty() {
            tracing::warn!("LINE_CHANNEL_ID is not set, LINE logins will be rejected");
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 3000,
        },
        storage: StorageConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
        },
        authentication: AuthConfig {
            jwt_secret: "test-secret-key-for-testing-only-0123456789".to_string(),
            jwt_issuer: "pbmap_api".to_string(),
            app_token_ttl_secs: 259200,
            session_ttl_days: 30,
        },
        providers: ProviderConfig {
            google_client_id: "test-client.apps.googleusercontent.com".to_string(),
            google_jwks_url: DEFAULT_GOOGLE_JWKS_URL.to_string(),
            line_channel_id: "1234567890".to_string(),
            line_verify_url: DEFAULT_LINE_VERIFY_URL.to_string(),
            http_timeout_secs: 10,
        },
        cache: CacheConfig::default(),
        jobs: JobsConfig {
            session_cleanup_interval_secs: 3600,
            health_check_interval_secs: 300,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            json: false,
        },
    }
}
