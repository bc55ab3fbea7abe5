//! OAuth endpoints: consent redirect, callback and token refresh.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{Html, Redirect};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{non_empty, parse_json_body, QueryParams};
use crate::atlassian::{callback_success_page, resolve_refresh_token};
use crate::server::error::{ApiError, HtmlError};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Handle GET /oauth/start.
pub async fn start(State(state): State<Arc<AppState>>) -> Result<Redirect, ApiError> {
    let oauth_state = state.oauth_states.issue().await;
    let url = state
        .client
        .authorization_url(&oauth_state)
        .map_err(ApiError::upstream("Failed to start OAuth flow."))?;

    tracing::info!("Redirecting to Atlassian consent page");
    Ok(Redirect::to(&url))
}

/// Handle GET /oauth/callback.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    params: Result<QueryParams<CallbackParams>, ApiError>,
) -> Result<Html<String>, HtmlError> {
    let QueryParams(params) = params?;

    if let Some(error) = non_empty(params.error) {
        let detail = non_empty(params.error_description).unwrap_or(error);
        return Err(ApiError::BadRequest(format!("Authorization was not granted: {}", detail)).into());
    }

    let code = non_empty(params.code)
        .ok_or_else(|| ApiError::BadRequest("Missing code in callback".into()))?;
    let returned_state = non_empty(params.state)
        .ok_or_else(|| ApiError::BadRequest("Missing state in callback".into()))?;

    if !state.oauth_states.consume(&returned_state).await {
        return Err(ApiError::BadRequest(
            "State mismatch: the authorization request is unknown, expired or already used".into(),
        )
        .into());
    }

    let tokens = state
        .client
        .exchange_code(&code)
        .await
        .map_err(ApiError::upstream("Failed to exchange code for access token"))?;

    Ok(Html(callback_success_page(&tokens)))
}

/// Handle POST /oauth/token.
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<RefreshResponse>, ApiError> {
    let request: RefreshRequest = parse_json_body(&body)?;
    let token = resolve_refresh_token(
        request.refresh_token.as_deref(),
        state.config.oauth_refresh_token.as_deref(),
    )
    .ok_or_else(|| ApiError::BadRequest("Missing refreshToken in request body.".into()))?;

    let tokens = state
        .client
        .refresh(token)
        .await
        .map_err(ApiError::upstream("Failed to refresh access token."))?;

    Ok(Json(RefreshResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}
