//! Environment-based configuration

use std::env;

use crate::lobby::DEFAULT_NONCE_ATTEMPTS;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    #[allow(dead_code)]
    pub cors_origins: Vec<String>,
    pub lobby: LobbyConfig,
    pub log_level: String,
}

/// Lobby configuration
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Bound on the room-code retry loop in create_room.
    pub nonce_attempts: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .unwrap_or(8000),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            lobby: LobbyConfig {
                nonce_attempts: env::var("NONCE_ATTEMPTS")
                    .unwrap_or_else(|_| DEFAULT_NONCE_ATTEMPTS.to_string())
                    .parse()
                    .unwrap_or(DEFAULT_NONCE_ATTEMPTS),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}
