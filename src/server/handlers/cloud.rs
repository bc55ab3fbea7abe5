//! Accessible Jira Cloud sites for an access token.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{non_empty, QueryParams};
use crate::atlassian::CloudSite;
use crate::server::error::ApiError;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudInfoParams {
    pub access_token: Option<String>,
}

/// Response for GET /jira-cloud-info.
#[derive(Debug, Serialize)]
pub struct CloudInfoResponse {
    pub resources: Vec<CloudSite>,
}

/// Handle GET /jira-cloud-info.
pub async fn cloud_info(
    State(state): State<Arc<AppState>>,
    QueryParams(params): QueryParams<CloudInfoParams>,
) -> Result<Json<CloudInfoResponse>, ApiError> {
    let access_token = non_empty(params.access_token)
        .ok_or_else(|| ApiError::BadRequest("Missing accessToken in query params.".into()))?;

    let resources = state
        .client
        .accessible_resources(&access_token)
        .await
        .map_err(ApiError::upstream("Failed to fetch accessible Jira sites."))?;

    Ok(Json(CloudInfoResponse { resources }))
}
