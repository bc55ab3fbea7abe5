//! Ticket lookup endpoints.
//!
//! `/jira-ticket` authenticates with the configured API token and comments on
//! the issue when no event log is found. `/jira-oauth-ticket` acts on behalf of
//! the caller's OAuth token and only comments when explicitly enabled.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{non_empty, parse_json_body, QueryParams};
use crate::scan::{scan_attachments, AttachmentReport, ScanReport};
use crate::server::error::ApiError;
use crate::ticket::{parse_ticket_id, TicketQuery};
use crate::AppState;

pub const MISSING_LOG_COMMENT: &str = "No Windows event log (.evtx) file found in attachments.";

const FETCH_FAILED: &str = "Failed to fetch ticket from Jira.";
const OAUTH_FETCH_FAILED: &str = "Failed to fetch ticket from Jira (OAuth).";
const COMMENT_FAILED: &str = "Failed to add comment to Jira ticket.";
const REFRESH_FAILED: &str = "Failed to refresh access token.";
const MISSING_OAUTH_PARAMS: &str =
    "Missing ticketId, cloudId, or accessToken/refreshToken in query params.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRequest {
    pub ticket_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthTicketParams {
    pub ticket_id: Option<String>,
    #[serde(alias = "tenantId")]
    pub cloud_id: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    pub ticket_id: String,
    pub attachments: Vec<AttachmentReport>,
    pub has_evtx: bool,
    pub evtx_files: Vec<String>,
    pub found_log_files: bool,
}

impl TicketResponse {
    fn new(ticket_id: String, report: ScanReport) -> Self {
        let has_evtx = report.has_matches();
        Self {
            ticket_id,
            attachments: report.attachments,
            has_evtx,
            evtx_files: report.matches,
            found_log_files: has_evtx,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthTicketResponse {
    #[serde(flatten)]
    pub ticket: TicketResponse,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Handle POST /jira-ticket.
pub async fn post_ticket(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TicketResponse>, ApiError> {
    let request: TicketRequest = parse_json_body(&body)?;
    let raw = non_empty(request.ticket_id)
        .ok_or_else(|| ApiError::BadRequest("Missing ticketId in request body.".into()))?;

    basic_lookup(&state, &raw).await.map(Json)
}

/// Handle GET /jira-ticket.
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    QueryParams(request): QueryParams<TicketRequest>,
) -> Result<Json<TicketResponse>, ApiError> {
    let raw = non_empty(request.ticket_id)
        .ok_or_else(|| ApiError::BadRequest("Missing ticketId in query params.".into()))?;

    basic_lookup(&state, &raw).await.map(Json)
}

async fn basic_lookup(state: &AppState, raw_ticket: &str) -> Result<TicketResponse, ApiError> {
    let ticket_id = parse_ticket_id(raw_ticket)?;
    let basic = state.config.basic_auth().ok_or_else(|| {
        ApiError::Config("Jira basic-auth credentials are not configured on this server.".into())
    })?;
    let query = TicketQuery::basic(ticket_id, basic.base_url, basic.email, basic.api_token);
    tracing::info!("Looking up {} with API token", query.ticket_id);

    let issue = state
        .client
        .fetch_issue(&query)
        .await
        .map_err(ApiError::upstream(FETCH_FAILED))?;

    let report = scan_attachments(
        &state.client,
        issue.attachments(),
        &query.credential,
        &state.scan_options(),
    )
    .await;

    if !report.has_matches() {
        state
            .client
            .add_comment(&query, MISSING_LOG_COMMENT)
            .await
            .map_err(ApiError::upstream(COMMENT_FAILED))?;
    }

    Ok(TicketResponse::new(query.ticket_id, report))
}

/// Handle GET /jira-oauth-ticket.
pub async fn get_oauth_ticket(
    State(state): State<Arc<AppState>>,
    QueryParams(params): QueryParams<OAuthTicketParams>,
) -> Result<Json<OAuthTicketResponse>, ApiError> {
    let missing = || ApiError::BadRequest(MISSING_OAUTH_PARAMS.into());

    let raw = non_empty(params.ticket_id).ok_or_else(missing)?;
    let cloud_id = non_empty(params.cloud_id).ok_or_else(missing)?;
    let access_token = non_empty(params.access_token);
    let refresh_token = non_empty(params.refresh_token);
    if access_token.is_none() && refresh_token.is_none() {
        return Err(missing());
    }

    let ticket_id = parse_ticket_id(&raw)?;

    let (access_token, refresh_token) = match (access_token, refresh_token) {
        (Some(access), refresh) => (access, refresh),
        (None, Some(refresh)) => {
            tracing::info!("No access token supplied for {}, refreshing first", ticket_id);
            let tokens = state
                .client
                .refresh(&refresh)
                .await
                .map_err(ApiError::upstream(REFRESH_FAILED))?;
            (tokens.access_token, tokens.refresh_token.or(Some(refresh)))
        }
        (None, None) => return Err(missing()),
    };

    let query = TicketQuery::oauth(ticket_id, cloud_id, access_token.clone());
    tracing::info!("Looking up {} with OAuth token", query.ticket_id);

    let issue = state
        .client
        .fetch_issue(&query)
        .await
        .map_err(ApiError::upstream(OAUTH_FETCH_FAILED))?;

    let report = scan_attachments(
        &state.client,
        issue.attachments(),
        &query.credential,
        &state.scan_options(),
    )
    .await;

    if !report.has_matches() && state.config.oauth_comment_on_missing {
        state
            .client
            .add_comment(&query, MISSING_LOG_COMMENT)
            .await
            .map_err(ApiError::upstream(COMMENT_FAILED))?;
    }

    Ok(Json(OAuthTicketResponse {
        ticket: TicketResponse::new(query.ticket_id, report),
        access_token,
        refresh_token,
    }))
}
