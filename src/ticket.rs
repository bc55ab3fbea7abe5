//! Ticket identifiers and lookup queries.
//!
//! Callers may send either a bare issue key (`ABC-123`) or a link copied from
//! the browser. Links are parsed explicitly: a `selectedIssue`, `key` or
//! `issueKey` query parameter wins, then the segment after `/browse/`. As a
//! last resort the token after the final `=` is used, but only if it looks
//! like an issue key. Anything else is rejected instead of guessed.

use reqwest::Url;
use thiserror::Error;

use crate::atlassian::Credential;

const KEY_PARAMS: [&str; 3] = ["selectedIssue", "key", "issueKey"];

#[derive(Error, Debug, PartialEq)]
pub enum TicketError {
    #[error("Ticket identifier is empty")]
    Empty,

    #[error("Could not find an issue key in '{0}'")]
    Unparsable(String),
}

/// Where the issue lives.
#[derive(Debug, Clone, PartialEq)]
pub enum IssueTarget {
    /// Tenant base URL, addressed directly (basic auth).
    Tenant(String),
    /// Cloud id, addressed through the API gateway (OAuth).
    Cloud(String),
}

/// A resolved issue lookup.
#[derive(Debug, Clone)]
pub struct TicketQuery {
    pub ticket_id: String,
    pub target: IssueTarget,
    pub credential: Credential,
}

impl TicketQuery {
    pub fn basic(ticket_id: String, base_url: String, email: String, api_token: String) -> Self {
        Self {
            ticket_id,
            target: IssueTarget::Tenant(base_url),
            credential: Credential::Basic { email, api_token },
        }
    }

    pub fn oauth(ticket_id: String, cloud_id: String, access_token: String) -> Self {
        Self {
            ticket_id,
            target: IssueTarget::Cloud(cloud_id),
            credential: Credential::Bearer(access_token),
        }
    }
}

/// Resolve a ticket identifier from a bare key or a Jira link.
pub fn parse_ticket_id(input: &str) -> Result<String, TicketError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TicketError::Empty);
    }

    if input.contains('/') || input.contains('?') || input.contains('=') {
        return extract_from_link(input);
    }

    if input.chars().any(char::is_whitespace) {
        return Err(TicketError::Unparsable(input.to_string()));
    }

    Ok(input.to_string())
}

fn extract_from_link(input: &str) -> Result<String, TicketError> {
    let url = if input.contains("://") {
        Url::parse(input).ok()
    } else {
        Url::parse(&format!("https://{}", input)).ok()
    };

    if let Some(url) = url {
        let from_query = url
            .query_pairs()
            .find(|(name, value)| KEY_PARAMS.contains(&name.as_ref()) && looks_like_issue_key(value))
            .map(|(_, value)| value.into_owned());
        if let Some(key) = from_query {
            return Ok(key);
        }

        if let Some(segments) = url.path_segments() {
            let segments: Vec<&str> = segments.collect();
            let browsed = segments
                .iter()
                .position(|s| *s == "browse")
                .and_then(|pos| segments.get(pos + 1))
                .filter(|key| looks_like_issue_key(key));
            if let Some(key) = browsed {
                return Ok(key.to_string());
            }
        }
    }

    // Fallback for links without a recognised structure
    input
        .rsplit('=')
        .next()
        .map(str::trim)
        .filter(|token| looks_like_issue_key(token))
        .map(String::from)
        .ok_or_else(|| TicketError::Unparsable(input.to_string()))
}

/// `PROJECT-123`: a letter-led project key, a dash, a number.
pub fn looks_like_issue_key(candidate: &str) -> bool {
    let Some((project, number)) = candidate.rsplit_once('-') else {
        return false;
    };

    let mut project_chars = project.chars();
    let leads_with_letter = project_chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic());

    leads_with_letter
        && project_chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit())
}
