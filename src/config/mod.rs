//! Configuration module for the Trash Tracker backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Deployment context. Only production enforces the event-window gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Staging,
    Development,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Development => "development",
        }
    }

    fn from_env_value(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Deployment context, consumed by the eligibility gate
    pub environment: Environment,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("TRASHDROP_API_PSK").ok();

        let db_path = env::var("TRASHDROP_DB_PATH")
            .unwrap_or_else(|_| "./data/app.sqlite".to_string())
            .into();

        let bind_addr = env::var("TRASHDROP_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid TRASHDROP_BIND_ADDR format");

        let log_level = env::var("TRASHDROP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let environment =
            Environment::from_env_value(&env::var("TRASHDROP_ENV").unwrap_or_default());

        Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            environment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("TRASHDROP_API_PSK");
        env::remove_var("TRASHDROP_DB_PATH");
        env::remove_var("TRASHDROP_BIND_ADDR");
        env::remove_var("TRASHDROP_LOG_LEVEL");
        env::remove_var("TRASHDROP_ENV");

        let config = Config::from_env();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/app.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::from_env_value("production"),
            Environment::Production
        );
        assert_eq!(Environment::from_env_value("PROD"), Environment::Production);
        assert_eq!(Environment::from_env_value("staging"), Environment::Staging);
        assert_eq!(
            Environment::from_env_value("anything-else"),
            Environment::Development
        );
    }
}
