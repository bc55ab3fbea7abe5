//! OAuth 2.0 (3LO) token handling: consent URL, code exchange, refresh,
//! anti-replay state tracking and the callback pages.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::sync::Mutex;

use super::client::{ensure_success, AtlassianClient};
use super::types::{AtlassianError, TokenPair};

const AUDIENCE: &str = "api.atlassian.com";
const TOKEN_PATH: &str = "/oauth/token";

impl AtlassianClient {
    /// Consent page URL for the configured client. No network call.
    pub fn authorization_url(&self, state: &str) -> Result<String, AtlassianError> {
        let oauth = self.oauth_settings()?;

        Ok(format!(
            "{}/authorize?audience={}&client_id={}&scope={}&redirect_uri={}&state={}&response_type=code&prompt=consent",
            self.auth_base_url,
            AUDIENCE,
            urlencoding::encode(&oauth.client_id),
            urlencoding::encode(&oauth.scopes),
            urlencoding::encode(&oauth.redirect_uri),
            urlencoding::encode(state),
        ))
    }

    /// Exchange an authorization code for a token pair.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenPair, AtlassianError> {
        let oauth = self.oauth_settings()?;
        let grant = json!({
            "grant_type": "authorization_code",
            "client_id": oauth.client_id,
            "client_secret": oauth.client_secret,
            "code": code,
            "redirect_uri": oauth.redirect_uri,
        });

        self.request_token(&grant, "Authorization code exchange").await
    }

    /// Trade a refresh token for a fresh access token (and usually a rotated refresh token).
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AtlassianError> {
        let oauth = self.oauth_settings()?;
        let grant = json!({
            "grant_type": "refresh_token",
            "client_id": oauth.client_id,
            "client_secret": oauth.client_secret,
            "refresh_token": refresh_token,
        });

        self.request_token(&grant, "Token refresh").await
    }

    async fn request_token(
        &self,
        grant: &serde_json::Value,
        operation: &str,
    ) -> Result<TokenPair, AtlassianError> {
        let response = self
            .http
            .post(format!("{}{}", self.auth_base_url, TOKEN_PATH))
            .json(grant)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let tokens: TokenPair = response.json().await?;
        if tokens.access_token.is_empty() {
            return Err(AtlassianError::OAuth(format!(
                "{} returned an empty access token",
                operation
            )));
        }

        tracing::info!(
            "{} succeeded (expires in {:?}s, refresh token {}, scope {:?})",
            operation,
            tokens.expires_in,
            if tokens.refresh_token.is_some() { "issued" } else { "absent" },
            tokens.scope,
        );

        Ok(tokens)
    }
}

/// Pick the refresh token to use: the caller's, else the configured fallback.
///
/// Empty strings count as absent. Returns `None` when neither is usable, in
/// which case the provider must not be called.
pub fn resolve_refresh_token<'a>(
    input: Option<&'a str>,
    fallback: Option<&'a str>,
) -> Option<&'a str> {
    let usable = |token: Option<&'a str>| token.map(str::trim).filter(|t| !t.is_empty());
    usable(input).or_else(|| usable(fallback))
}

/// Pending authorization states awaiting their callback.
///
/// Each state is single use and expires after the configured lifetime.
pub struct OAuthStateStore {
    pending: Mutex<HashMap<String, DateTime<Utc>>>,
    ttl: Duration,
}

impl OAuthStateStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Issue a fresh, unpredictable state value.
    pub async fn issue(&self) -> String {
        let state = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut pending = self.pending.lock().await;
        pending.retain(|_, expires_at| *expires_at > now);
        pending.insert(state.clone(), now + self.ttl);

        tracing::debug!("Issued OAuth state, {} pending", pending.len());
        state
    }

    /// Accept a state once. Unknown, expired or reused states are rejected.
    pub async fn consume(&self, state: &str) -> bool {
        let now = Utc::now();

        let mut pending = self.pending.lock().await;
        pending.retain(|_, expires_at| *expires_at > now);
        pending.remove(state).is_some()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

/// Escape HTML special characters.
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

const PAGE_STYLE: &str = "body{font-family:system-ui,sans-serif;display:flex;justify-content:center;align-items:center;min-height:100vh;margin:0;background:#f0f0f0;}\
     .card{background:white;padding:2rem;border-radius:8px;box-shadow:0 2px 10px rgba(0,0,0,0.1);max-width:60rem;word-break:break-all;}\
     h1{margin-bottom:0.5rem;}p{color:#666;}pre{white-space:pre-wrap;background:#f7f7f7;padding:1rem;}";

/// Callback page showing the issued tokens and the full grant.
pub fn callback_success_page(tokens: &TokenPair) -> String {
    let full_response = serde_json::to_string_pretty(tokens).unwrap_or_default();
    let refresh_token = tokens.refresh_token.as_deref().unwrap_or("(none issued)");

    format!(
        "<!DOCTYPE html>\
         <html><head><title>Authorization Successful</title><style>{}</style></head>\
         <body><div class='card'><h1 style='color:#22c55e'>Authorization Successful</h1>\
         <p>Access token: {}</p>\
         <p>Refresh token: {}</p>\
         <p>Full response:</p><pre>{}</pre>\
         <p>To refresh, POST to /oauth/token with {{ \"refreshToken\": \"...\" }}.</p>\
         </div></body></html>",
        PAGE_STYLE,
        escape_html(&tokens.access_token),
        escape_html(refresh_token),
        escape_html(&full_response),
    )
}

pub fn callback_error_page(message: &str) -> String {
    format!(
        "<!DOCTYPE html>\
         <html><head><title>Authorization Failed</title><style>{}</style></head>\
         <body><div class='card'><h1 style='color:#ef4444'>Authorization Failed</h1>\
         <p>{}</p></div></body></html>",
        PAGE_STYLE,
        escape_html(message),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oauth_config(base: String) -> RelayConfig {
        RelayConfig {
            oauth_client_id: Some("client-1".into()),
            oauth_client_secret: Some("secret-1".into()),
            oauth_redirect_uri: Some("http://localhost:3000/oauth/callback".into()),
            atlassian_auth_url: base.clone(),
            atlassian_api_url: base,
            ..RelayConfig::default()
        }
    }

    #[test]
    fn test_authorization_url_contains_required_params() {
        let client = AtlassianClient::new(&oauth_config("https://auth.atlassian.com".into())).unwrap();
        let url = client.authorization_url("random-state").unwrap();

        assert!(url.starts_with("https://auth.atlassian.com/authorize?"));
        assert!(url.contains("audience=api.atlassian.com"));
        assert!(url.contains("client_id=client-1"));
        assert!(url.contains("state=random-state"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Foauth%2Fcallback"
        ));
        assert!(url.contains(
            "scope=read%3Ajira-work%20read%3Aattachment%3Ajira%20write%3Ajira-work%20offline_access"
        ));
    }

    #[test]
    fn test_authorization_url_is_deterministic() {
        let client = AtlassianClient::new(&oauth_config("https://auth.atlassian.com".into())).unwrap();
        assert_eq!(
            client.authorization_url("s").unwrap(),
            client.authorization_url("s").unwrap()
        );
    }

    #[test]
    fn test_authorization_url_requires_client() {
        let client = AtlassianClient::new(&RelayConfig::default()).unwrap();
        assert!(matches!(
            client.authorization_url("s"),
            Err(AtlassianError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_resolve_refresh_token_prefers_input() {
        assert_eq!(resolve_refresh_token(Some("input"), Some("fallback")), Some("input"));
        assert_eq!(resolve_refresh_token(None, Some("fallback")), Some("fallback"));
        assert_eq!(resolve_refresh_token(Some(""), Some("fallback")), Some("fallback"));
        assert_eq!(resolve_refresh_token(None, None), None);
        assert_eq!(resolve_refresh_token(Some("  "), Some("")), None);
    }

    #[tokio::test]
    async fn test_exchange_code_posts_authorization_code_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_partial_json(json!({
                "grant_type": "authorization_code",
                "client_id": "client-1",
                "client_secret": "secret-1",
                "code": "code-1",
                "redirect_uri": "http://localhost:3000/oauth/callback",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "expires_in": 3600,
                "scope": "read:jira-work offline_access",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = AtlassianClient::new(&oauth_config(server.uri())).unwrap();
        let tokens = client.exchange_code("code-1").await.unwrap();

        assert_eq!(tokens.access_token, "access-1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_exchange_code_keeps_provider_error_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid authorization code"
            })))
            .mount(&server)
            .await;

        let client = AtlassianClient::new(&oauth_config(server.uri())).unwrap();
        let err = client.exchange_code("stale").await.unwrap_err();

        match err {
            AtlassianError::UpstreamStatus { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("Expected UpstreamStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_posts_refresh_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_partial_json(json!({
                "grant_type": "refresh_token",
                "refresh_token": "refresh-1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-2",
                "refresh_token": "refresh-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = AtlassianClient::new(&oauth_config(server.uri())).unwrap();
        let tokens = client.refresh("refresh-1").await.unwrap();

        assert_eq!(tokens.access_token, "access-2");
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn test_empty_access_token_is_an_oauth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "" })))
            .mount(&server)
            .await;

        let client = AtlassianClient::new(&oauth_config(server.uri())).unwrap();
        let err = client.refresh("refresh-1").await.unwrap_err();
        assert!(matches!(err, AtlassianError::OAuth(_)));
    }

    #[tokio::test]
    async fn test_state_is_single_use() {
        let store = OAuthStateStore::new(300);
        let state = store.issue().await;

        assert!(store.consume(&state).await);
        assert!(!store.consume(&state).await);
    }

    #[tokio::test]
    async fn test_states_are_unique() {
        let store = OAuthStateStore::new(300);
        let first = store.issue().await;
        let second = store.issue().await;

        assert_ne!(first, second);
        assert_eq!(store.pending_count().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_state_is_rejected() {
        let store = OAuthStateStore::new(300);
        store.issue().await;
        assert!(!store.consume("secureRandomState").await);
    }

    #[tokio::test]
    async fn test_expired_state_is_rejected() {
        let store = OAuthStateStore::new(0);
        let state = store.issue().await;

        assert!(!store.consume(&state).await);
        assert_eq!(store.pending_count().await, 0);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>alert('x') & \"y\"</script>"),
            "&lt;script&gt;alert(&#x27;x&#x27;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_callback_success_page() {
        let tokens: TokenPair = serde_json::from_value(json!({
            "access_token": "access<1>",
            "refresh_token": "refresh-1",
            "expires_in": 3600
        }))
        .unwrap();

        let page = callback_success_page(&tokens);
        assert!(page.contains("Authorization Successful"));
        assert!(page.contains("Access token: access&lt;1&gt;"));
        assert!(page.contains("Refresh token: refresh-1"));
        assert!(page.contains("&quot;expires_in&quot;: 3600"));
        assert!(page.contains("/oauth/token"));
    }

    #[test]
    fn test_callback_error_page() {
        let page = callback_error_page("State mismatch <b>");
        assert!(page.contains("Authorization Failed"));
        assert!(page.contains("State mismatch &lt;b&gt;"));
    }
}
