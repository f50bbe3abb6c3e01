//! Application configuration loaded from environment variables.
//!
//! Secrets (vendor client secrets, JWT signing key) are read once at
//! startup; in production they are injected as environment variables via
//! secret bindings.

use std::env;
use std::time::Duration;

/// Default cadence of the data sync loop (1 hour).
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60 * 60;

/// Default cadence of the token refresh loop (30 minutes).
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30 * 60;

/// Default lookahead before token expiry at which we proactively refresh (1 hour).
const DEFAULT_REFRESH_LOOKAHEAD_SECS: u64 = 60 * 60;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Redirect URI registered with vendors for the authorization-code flow
    pub oauth_redirect_uri: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Register the mock vendor/portal providers (local development)
    pub enable_mock_providers: bool,

    // --- Secrets ---
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,

    // --- Scheduler cadences ---
    /// Interval between data sync passes
    pub sync_interval: Duration,
    /// Interval between token refresh passes
    pub refresh_interval: Duration,
    /// How far before expiry a credential counts as needing refresh
    pub refresh_lookahead: Duration,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            oauth_redirect_uri: "http://localhost:8080/oauth/callback".to_string(),
            gcp_project_id: "test-project".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            enable_mock_providers: true,
            strava_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            refresh_lookahead: Duration::from_secs(DEFAULT_REFRESH_LOOKAHEAD_SECS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            oauth_redirect_uri: env::var("OAUTH_REDIRECT_URI")
                .unwrap_or_else(|_| "http://localhost:8080/oauth/callback".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            enable_mock_providers: env::var("ENABLE_MOCK_PROVIDERS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),

            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),

            sync_interval: duration_from_env("SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS),
            refresh_interval: duration_from_env(
                "TOKEN_REFRESH_INTERVAL_SECS",
                DEFAULT_REFRESH_INTERVAL_SECS,
            ),
            refresh_lookahead: duration_from_env(
                "TOKEN_REFRESH_LOOKAHEAD_SECS",
                DEFAULT_REFRESH_LOOKAHEAD_SECS,
            ),
        })
    }
}

/// Parse a seconds-valued environment variable into a Duration.
fn duration_from_env(name: &str, default_secs: u64) -> Duration {
    let secs = env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
