//! Environment-driven configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default prompt type used by the debug routes.
pub const DEFAULT_PROMPT_TYPE: &str = "standardAssistant";

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Value out of range or missing.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience result alias for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment name (`development`, `production`, ...).
    pub environment: String,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Conversation store settings.
    pub storage: StorageConfig,
    /// Commerce platform settings.
    pub shopify: ShopifyConfig,
    /// AI client settings.
    pub claude: ClaudeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            shopify: ShopifyConfig::default(),
            claude: ClaudeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Unset or unparsable values keep their defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(environment) = lookup("APP_ENV") {
            config.environment = environment;
        }
        if let Some(port) = lookup("STOREFRONT_CHAT_PORT").and_then(|p| p.parse().ok()) {
            config.server.port = port;
        }

        if let Some(path) = lookup("STOREFRONT_CHAT_DB_PATH") {
            config.storage.sqlite_path = PathBuf::from(path);
        }
        if let Some(flag) = lookup("STOREFRONT_CHAT_DB_DISABLED") {
            config.storage.disabled = parse_flag(&flag);
        }

        if let Some(shop) = lookup("SHOPIFY_SHOP_DOMAIN") {
            config.shopify.shop = shop;
        }
        config.shopify.admin_access_token = lookup("SHOPIFY_ADMIN_ACCESS_TOKEN");
        config.shopify.storefront_access_token = lookup("SHOPIFY_STOREFRONT_ACCESS_TOKEN");

        config.claude.api_key = lookup("CLAUDE_API_KEY");
        if let Some(model) = lookup("CLAUDE_MODEL") {
            config.claude.model = model;
        }
        if let Some(base_url) = lookup("CLAUDE_BASE_URL") {
            config.claude.base_url = base_url;
        }
        if let Some(prompt_type) = lookup("CLAUDE_PROMPT_TYPE") {
            config.claude.default_prompt_type = prompt_type;
        }
        if let Some(max_tokens) = lookup("CLAUDE_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            config.claude.max_tokens = max_tokens;
        }

        config
    }

    /// Whether this process runs in production.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be > 0".to_string()));
        }

        if self.shopify.shop.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "shopify.shop must not be empty".to_string(),
            ));
        }

        if self.claude.model.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "claude.model must not be empty".to_string(),
            ));
        }

        if self.claude.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "claude.max_tokens must be > 0".to_string(),
            ));
        }

        Url::parse(&self.claude.base_url)?;

        Ok(())
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

/// Conversation store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Skip the database entirely and use the null store.
    pub disabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("storefront_chat.sqlite"),
            disabled: false,
        }
    }
}

/// Commerce platform settings for a custom app.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShopifyConfig {
    /// Shop domain.
    pub shop: String,
    /// Static admin API token.
    pub admin_access_token: Option<String>,
    /// Static storefront API token.
    pub storefront_access_token: Option<String>,
}

impl Default for ShopifyConfig {
    fn default() -> Self {
        Self {
            shop: "home-in-style-loutraki.myshopify.com".to_string(),
            admin_access_token: None,
            storefront_access_token: None,
        }
    }
}

/// AI client settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClaudeConfig {
    /// API key; the client cannot be created without it.
    pub api_key: Option<String>,
    /// Model name.
    pub model: String,
    /// API base URL.
    pub base_url: String,
    /// Prompt type used when a route does not pick one.
    pub default_prompt_type: String,
    /// Token budget per response.
    pub max_tokens: u32,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "claude-3-5-sonnet-latest".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            default_prompt_type: DEFAULT_PROMPT_TYPE.to_string(),
            max_tokens: 2000,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
