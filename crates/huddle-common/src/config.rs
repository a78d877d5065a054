//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults

use serde::Deserialize;
use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Get the global application configuration.
///
/// # Panics
/// Panics if config has not been initialized via [`init`].
pub fn get() -> &'static AppConfig {
    CONFIG.get().expect("Config not initialized. Call huddle_common::config::init() first.")
}

/// Initialize the global configuration from environment.
///
/// Should be called once at application startup, before any other code accesses config.
pub fn init() -> Result<&'static AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let app_config = load(config::Environment::with_prefix("HUDDLE"))?;
    Ok(CONFIG.get_or_init(|| app_config))
}

/// Build a config from defaults, the optional `config.toml`, and the given environment source.
fn load(env: config::Environment) -> Result<AppConfig, config::ConfigError> {
    let cfg = config::Config::builder()
        // Defaults
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("database.url", "sqlite://huddle.db?mode=rwc")?
        .set_default("database.max_connections", 20)?
        .set_default("database.min_connections", 1)?
        .set_default("gateway.topic_capacity", 256)?
        .set_default("limits.max_message_length", 4000)?
        .set_default("limits.default_page_size", 10)?
        .set_default("limits.max_page_size", 100)?
        .set_default("limits.max_channels_per_server", 500)?
        // Optional config file
        .add_source(config::File::with_name("config").required(false))
        // Environment variables (HUDDLE__SERVER__PORT, HUDDLE__AUTH__JWT_SECRET, etc.)
        .add_source(env.prefix_separator("__").separator("__").try_parsing(true))
        .build()?;

    cfg.try_deserialize()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Per-topic event buffer; subscribers lagging further behind lose events.
    pub topic_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    pub max_message_length: usize,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub max_channels_per_server: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_length: 4000,
            default_page_size: 10,
            max_page_size: 100,
            max_channels_per_server: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_fill_everything_but_the_secret() {
        let mut vars = HashMap::new();
        vars.insert("HUDDLE__AUTH__JWT_SECRET".to_string(), "s3cret".to_string());
        vars.insert("HUDDLE__SERVER__PORT".to_string(), "9000".to_string());

        let cfg = load(config::Environment::with_prefix("HUDDLE").source(Some(vars)))
            .expect("config should load");

        assert_eq!(cfg.auth.jwt_secret, "s3cret");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.limits.default_page_size, 10);
        assert_eq!(cfg.gateway.topic_capacity, 256);
    }

    #[test]
    fn missing_secret_is_an_error() {
        let vars: HashMap<String, String> = HashMap::new();
        assert!(load(config::Environment::with_prefix("HUDDLE").source(Some(vars))).is_err());
    }
}
