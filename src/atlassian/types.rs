//! Atlassian data types and error definitions

use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtlassianError {
    /// The provider answered with a non-success status.
    #[error("Upstream returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// The request was sent but no response arrived (connect failure, timeout).
    #[error("No response from upstream: {0}")]
    NoResponse(String),

    /// The request could not be built (bad URL, client setup).
    #[error("Request setup failed: {0}")]
    RequestSetup(String),

    #[error("Failed to decode upstream response: {0}")]
    Decode(String),

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl From<reqwest::Error> for AtlassianError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            AtlassianError::RequestSetup(err.to_string())
        } else if err.is_decode() {
            AtlassianError::Decode(err.to_string())
        } else {
            AtlassianError::NoResponse(err.to_string())
        }
    }
}

/// How an outbound Jira request is authorized.
#[derive(Clone)]
pub enum Credential {
    Basic { email: String, api_token: String },
    Bearer(String),
}

impl Credential {
    pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credential::Basic { email, api_token } => request.basic_auth(email, Some(api_token)),
            Credential::Bearer(token) => request.bearer_auth(token),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Basic { email, .. } => write!(f, "Basic({}, <redacted>)", email),
            Credential::Bearer(_) => write!(f, "Bearer(<redacted>)"),
        }
    }
}

/// Token endpoint response. Unknown fields are kept so the full grant can be shown back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A Jira Cloud site reachable with a given access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudSite {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraIssue {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub fields: IssueFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueFields {
    #[serde(default)]
    pub attachment: Option<Vec<Attachment>>,
}

impl JiraIssue {
    pub fn attachments(&self) -> Vec<Attachment> {
        self.fields.attachment.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "content", default)]
    pub content_url: String,
}

impl Attachment {
    /// ZIP-typed by MIME type or by file name.
    pub fn is_zip(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case("application/zip")
            || self.filename.to_lowercase().ends_with(".zip")
    }
}
