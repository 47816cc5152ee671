//! Centralized server configuration.
//!
//! Strongly-typed configuration loaded via the `config` crate from
//! environment variables (`__` separates nesting, e.g.
//! `QDRANT__COLLECTION`).

use serde::Deserialize;

/// Server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Base URL of the department REST API (status lookups).
    pub api_base_url: String,

    /// Base URL of the billing portal. Falls back to `api_base_url`.
    #[serde(default)]
    pub portal_base_url: Option<String>,

    /// Base URL of the e-district service (certificate fetches).
    pub edistrict_base_url: String,

    /// Text generation endpoint configuration.
    pub generation: GenerationConfig,

    /// Vector search configuration.
    pub qdrant: QdrantConfig,

    /// Billing request signing configuration.
    #[serde(default)]
    pub billing: BillingConfig,

    /// Chat behavior configuration.
    #[serde(default)]
    pub chat: ChatConfig,
}

/// OpenAI-compatible generation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the chat-completions endpoint.
    pub base_url: String,

    /// Bearer token, if the endpoint requires one.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Chat model name.
    pub model: String,

    /// Embedding model name.
    pub embedding_model: String,
}

/// Vector similarity search service.
#[derive(Debug, Clone, Deserialize)]
pub struct QdrantConfig {
    /// Base URL of the Qdrant instance.
    pub url: String,

    /// Collection holding the service knowledge base.
    pub collection: String,

    /// Optional API key.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Billing request signing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingConfig {
    /// Stable client identifier sent with signed requests.
    /// A random identifier is generated at startup when unset.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Shared signing secret. When unset, billing lookups resolve to
    /// a structured "not configured" result without any request.
    #[serde(default)]
    pub secret: Option<String>,
}

/// Chat behavior knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Whether a dropped client connection aborts in-flight generation.
    /// When false, generation runs to completion and the assistant turn
    /// is persisted; frames simply stop being forwarded.
    #[serde(default = "default_cancel_on_disconnect")]
    pub cancel_on_disconnect: bool,

    /// Whether to set the Secure flag on session cookies.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_cancel_on_disconnect() -> bool {
    false
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            cancel_on_disconnect: default_cancel_on_disconnect(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// The billing portal base URL, defaulting to the department API.
    #[must_use]
    pub fn portal_base_url(&self) -> &str {
        self.portal_base_url.as_deref().unwrap_or(&self.api_base_url)
    }
}
