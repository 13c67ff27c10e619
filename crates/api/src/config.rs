use labflow_core::config::{
    EngineConfig, DEFAULT_COMPLEX_CONCLUSION_THRESHOLD, DEFAULT_COMPLEX_RESULT_THRESHOLD,
};

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
    /// Workflow engine knobs.
    pub engine: EngineConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                    |
    /// |--------------------------------|----------------------------|
    /// | `HOST`                         | `0.0.0.0`                  |
    /// | `PORT`                         | `3000`                     |
    /// | `CORS_ORIGINS`                 | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`         | `30`                       |
    /// | `ENFORCE_ASSIGNMENT_ROLES`     | `false`                    |
    /// | `COMPLEX_RESULT_THRESHOLD`     | `10`                       |
    /// | `COMPLEX_CONCLUSION_THRESHOLD` | `3`                        |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let jwt = JwtConfig::from_env();
        let engine = engine_config_from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt,
            engine,
        }
    }
}

fn engine_config_from_env() -> EngineConfig {
    let enforce_assignment_roles: bool = std::env::var("ENFORCE_ASSIGNMENT_ROLES")
        .unwrap_or_else(|_| "false".into())
        .parse()
        .expect("ENFORCE_ASSIGNMENT_ROLES must be true or false");

    let complex_result_threshold: usize = std::env::var("COMPLEX_RESULT_THRESHOLD")
        .unwrap_or_else(|_| DEFAULT_COMPLEX_RESULT_THRESHOLD.to_string())
        .parse()
        .expect("COMPLEX_RESULT_THRESHOLD must be a valid usize");

    let complex_conclusion_threshold: usize = std::env::var("COMPLEX_CONCLUSION_THRESHOLD")
        .unwrap_or_else(|_| DEFAULT_COMPLEX_CONCLUSION_THRESHOLD.to_string())
        .parse()
        .expect("COMPLEX_CONCLUSION_THRESHOLD must be a valid usize");

    EngineConfig {
        enforce_assignment_roles,
        complex_result_threshold,
        complex_conclusion_threshold,
    }
}
