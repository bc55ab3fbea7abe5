//! Atlassian API client for Jira issues, comments and attachments

use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::json;

use super::types::{AtlassianError, CloudSite, Credential, JiraIssue};
use crate::config::{OAuthSettings, RelayConfig};
use crate::ticket::{IssueTarget, TicketQuery};

const ACCESSIBLE_RESOURCES_PATH: &str = "/oauth/token/accessible-resources";

pub struct AtlassianClient {
    pub(super) http: Client,
    pub(super) auth_base_url: String,
    api_base_url: String,
    pub(super) oauth: Option<OAuthSettings>,
}

impl AtlassianClient {
    /// Build a client with the configured endpoints and a per-request timeout.
    pub fn new(config: &RelayConfig) -> Result<Self, AtlassianError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(concat!("evtx-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            auth_base_url: config.atlassian_auth_url.clone(),
            api_base_url: config.atlassian_api_url.clone(),
            oauth: config.oauth(),
        })
    }

    pub(super) fn oauth_settings(&self) -> Result<&OAuthSettings, AtlassianError> {
        self.oauth
            .as_ref()
            .ok_or(AtlassianError::NotConfigured("OAuth client"))
    }

    pub fn issue_url(&self, target: &IssueTarget, ticket_id: &str) -> String {
        match target {
            IssueTarget::Tenant(base_url) => format!(
                "{}/rest/api/3/issue/{}",
                base_url,
                urlencoding::encode(ticket_id)
            ),
            IssueTarget::Cloud(cloud_id) => format!(
                "{}/ex/jira/{}/rest/api/3/issue/{}",
                self.api_base_url,
                urlencoding::encode(cloud_id),
                urlencoding::encode(ticket_id)
            ),
        }
    }

    /// Fetch an issue with its attachment list.
    pub async fn fetch_issue(&self, query: &TicketQuery) -> Result<JiraIssue, AtlassianError> {
        let url = self.issue_url(&query.target, &query.ticket_id);
        tracing::debug!("Fetching Jira issue from {}", url);

        let request = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json");
        let response = query.credential.apply(request).send().await?;
        let response = ensure_success(response).await?;

        let issue: JiraIssue = response.json().await?;
        tracing::info!(
            "Fetched issue {} with {} attachment(s)",
            query.ticket_id,
            issue.fields.attachment.as_ref().map_or(0, Vec::len)
        );

        Ok(issue)
    }

    /// Post a single-paragraph comment to the issue.
    pub async fn add_comment(&self, query: &TicketQuery, text: &str) -> Result<(), AtlassianError> {
        let url = format!("{}/comment", self.issue_url(&query.target, &query.ticket_id));

        let request = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&comment_body(text));
        let response = query.credential.apply(request).send().await?;
        let response = ensure_success(response).await?;

        tracing::info!(
            "Added comment to {} (HTTP {})",
            query.ticket_id,
            response.status().as_u16()
        );
        Ok(())
    }

    /// Download attachment content as raw bytes.
    pub async fn download(&self, url: &str, credential: &Credential) -> Result<Vec<u8>, AtlassianError> {
        let response = credential.apply(self.http.get(url)).send().await?;
        let response = ensure_success(response).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// List the Jira Cloud sites an access token can reach.
    pub async fn accessible_resources(&self, access_token: &str) -> Result<Vec<CloudSite>, AtlassianError> {
        let response = self
            .http
            .get(format!("{}{}", self.api_base_url, ACCESSIBLE_RESOURCES_PATH))
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let json: serde_json::Value = response.json().await?;

        let sites: Vec<CloudSite> = json
            .as_array()
            .map(|resources| {
                resources
                    .iter()
                    .filter_map(|r| match serde_json::from_value::<CloudSite>(r.clone()) {
                        Ok(site) => Some(site),
                        Err(e) => {
                            tracing::warn!("Skipping unreadable accessible resource {}: {}", r, e);
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        if sites.is_empty() {
            tracing::info!("No accessible Jira sites found for this token");
        }
        for site in &sites {
            tracing::info!("Accessible site {} ({}) at {}", site.name, site.id, site.url);
        }

        Ok(sites)
    }
}

/// Turn a non-success response into `UpstreamStatus`, keeping the body for logs.
pub(super) async fn ensure_success(response: Response) -> Result<Response, AtlassianError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(AtlassianError::UpstreamStatus {
        status: status.as_u16(),
        body,
    })
}

/// Atlassian Document Format body holding one plain-text paragraph.
fn comment_body(text: &str) -> serde_json::Value {
    json!({
        "body": {
            "type": "doc",
            "version": 1,
            "content": [
                {
                    "type": "paragraph",
                    "content": [
                        { "type": "text", "text": text }
                    ]
                }
            ]
        }
    })
}
