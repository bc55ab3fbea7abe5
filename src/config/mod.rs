//! Relay configuration.
//!
//! Loaded once at startup from `.env`, an optional `relay.toml` and the process
//! environment, then shared read-only with every request handler.

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_SCOPES: &str =
    "read:jira-work read:attachment:jira write:jira-work offline_access";
pub const DEFAULT_AUTH_URL: &str = "https://auth.atlassian.com";
pub const DEFAULT_API_URL: &str = "https://api.atlassian.com";

/// Longest accepted lifetime for a pending OAuth state (one day)
const MAX_STATE_TTL_SECS: u64 = 86_400;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Tenant base URL used by the basic-auth lookup, e.g. `https://acme.atlassian.net`
    pub jira_base_url: Option<String>,
    pub jira_email: Option<String>,
    pub jira_api_token: Option<String>,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    pub oauth_redirect_uri: Option<String>,
    /// Used by `/oauth/token` when the request body carries no refresh token
    pub oauth_refresh_token: Option<String>,
    pub oauth_scopes: String,
    pub oauth_state_ttl_secs: u64,
    pub oauth_comment_on_missing: bool,
    pub atlassian_auth_url: String,
    pub atlassian_api_url: String,
    pub http_timeout_secs: u64,
    pub zip_concurrency: usize,
    pub target_extension: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            jira_base_url: None,
            jira_email: None,
            jira_api_token: None,
            oauth_client_id: None,
            oauth_client_secret: None,
            oauth_redirect_uri: None,
            oauth_refresh_token: None,
            oauth_scopes: DEFAULT_SCOPES.to_string(),
            oauth_state_ttl_secs: 300,
            oauth_comment_on_missing: false,
            atlassian_auth_url: DEFAULT_AUTH_URL.to_string(),
            atlassian_api_url: DEFAULT_API_URL.to_string(),
            http_timeout_secs: 30,
            zip_concurrency: 4,
            target_extension: ".evtx".to_string(),
        }
    }
}

/// Jira API-token credentials for the basic-auth lookup.
#[derive(Clone)]
pub struct BasicAuthSettings {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
}

/// Registered OAuth 2.0 (3LO) client.
#[derive(Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: String,
}

impl RelayConfig {
    /// Load `.env`, then `relay.toml` (optional), then environment variables.
    ///
    /// Environment variable names are the upper-cased field names,
    /// e.g. `JIRA_BASE_URL` or `OAUTH_CLIENT_ID`.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config: RelayConfig = Config::builder()
            .add_source(File::with_name("relay").required(false))
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validated()
    }

    /// Check ranges and normalise URLs.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".into()));
        }
        if self.zip_concurrency == 0 {
            return Err(ConfigError::Invalid("zip_concurrency must be at least 1".into()));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid("http_timeout_secs must be at least 1".into()));
        }
        if self.oauth_state_ttl_secs == 0 {
            return Err(ConfigError::Invalid("oauth_state_ttl_secs must be at least 1".into()));
        }
        if self.oauth_state_ttl_secs > MAX_STATE_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "oauth_state_ttl_secs must not exceed {}",
                MAX_STATE_TTL_SECS
            )));
        }
        if self.target_extension.trim().is_empty() {
            return Err(ConfigError::Invalid("target_extension must not be empty".into()));
        }

        self.atlassian_auth_url = trim_url(&self.atlassian_auth_url);
        self.atlassian_api_url = trim_url(&self.atlassian_api_url);
        self.jira_base_url = self.jira_base_url.as_deref().map(trim_url);

        Ok(self)
    }

    /// Basic-auth settings, if every piece is present.
    pub fn basic_auth(&self) -> Option<BasicAuthSettings> {
        Some(BasicAuthSettings {
            base_url: present(&self.jira_base_url)?,
            email: present(&self.jira_email)?,
            api_token: present(&self.jira_api_token)?,
        })
    }

    /// OAuth client settings, if every piece is present.
    pub fn oauth(&self) -> Option<OAuthSettings> {
        Some(OAuthSettings {
            client_id: present(&self.oauth_client_id)?,
            client_secret: present(&self.oauth_client_secret)?,
            redirect_uri: present(&self.oauth_redirect_uri)?,
            scopes: self.oauth_scopes.clone(),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn trim_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
