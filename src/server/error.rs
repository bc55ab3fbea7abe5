//! HTTP boundary errors.
//!
//! Upstream detail is logged here and never echoed to the caller.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::atlassian::{callback_error_page, AtlassianError};
use crate::ticket::TicketError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{message}")]
    Upstream {
        message: &'static str,
        #[source]
        source: AtlassianError,
    },

    #[error("{0}")]
    Config(String),
}

impl ApiError {
    /// Map an outbound failure to a generic 500 carrying `message`.
    pub fn upstream(message: &'static str) -> impl FnOnce(AtlassianError) -> ApiError {
        move |source| match source {
            AtlassianError::NotConfigured(what) => {
                ApiError::Config(format!("{} is not configured on this server.", what))
            }
            source => ApiError::Upstream { message, source },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream { .. } | ApiError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn log(&self) {
        match self {
            ApiError::BadRequest(message) => tracing::warn!("Rejected request: {}", message),
            ApiError::Config(message) => tracing::error!("Configuration error: {}", message),
            ApiError::Upstream { message, source } => match source {
                AtlassianError::UpstreamStatus { status, body } => {
                    tracing::error!("{} Upstream responded with HTTP {}: {}", message, status, body)
                }
                AtlassianError::NoResponse(reason) => {
                    tracing::error!("{} No response received: {}", message, reason)
                }
                AtlassianError::RequestSetup(reason) => {
                    tracing::error!("{} Error setting up request: {}", message, reason)
                }
                other => tracing::error!("{} {}", message, other),
            },
        }
    }
}

impl From<TicketError> for ApiError {
    fn from(err: TicketError) -> Self {
        ApiError::BadRequest(format!("{}.", err))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Error rendered as the OAuth callback's HTML failure page.
#[derive(Debug)]
pub struct HtmlError(pub ApiError);

impl From<ApiError> for HtmlError {
    fn from(err: ApiError) -> Self {
        HtmlError(err)
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        self.0.log();
        let page = callback_error_page(&self.0.to_string());
        (self.0.status(), Html(page)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_bad_request_response() {
        let response = ApiError::BadRequest("Missing ticketId in request body.".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["error"], "Missing ticketId in request body.");
    }

    #[tokio::test]
    async fn test_upstream_response_hides_detail() {
        let err = ApiError::upstream("Failed to fetch ticket from Jira.")(AtlassianError::UpstreamStatus {
            status: 401,
            body: "token abc expired".into(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let text = body_text(response).await;
        assert!(text.contains("Failed to fetch ticket from Jira."));
        assert!(!text.contains("abc"));
    }

    #[test]
    fn test_not_configured_maps_to_config() {
        let err = ApiError::upstream("Failed to refresh access token.")(AtlassianError::NotConfigured(
            "OAuth client",
        ));
        assert!(matches!(err, ApiError::Config(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "OAuth client is not configured on this server.");
    }

    #[test]
    fn test_ticket_error_is_bad_request() {
        let err: ApiError = TicketError::Empty.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Ticket identifier is empty.");
    }

    #[tokio::test]
    async fn test_html_error_renders_page() {
        let response = HtmlError(ApiError::BadRequest("Missing code in callback".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let text = body_text(response).await;
        assert!(text.contains("Authorization Failed"));
        assert!(text.contains("Missing code in callback"));
    }
}
