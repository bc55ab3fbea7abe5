//! Atlassian integration module
//!
//! OAuth 2.0 (3LO) token handling against the Atlassian identity service and
//! the Jira Cloud REST calls the relay needs: issue retrieval, comments,
//! attachment downloads and accessible-site discovery.

mod client;
mod oauth;
mod types;

pub use client::AtlassianClient;
pub use oauth::{
    callback_error_page, callback_success_page, resolve_refresh_token,
    OAuthStateStore,
};
pub use types::{
    AtlassianError, Attachment, CloudSite, Credential, JiraIssue, TokenPair,
};
