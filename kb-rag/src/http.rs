//! Mapping of HTTP failures onto the crate's error taxonomy.

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::error;

use crate::error::{RagError, Service};

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    /// `{"error": {"message": "..."}}` (OpenAI)
    Nested { error: ErrorDetail },
    /// `{"message": "..."}` or `{"error": "...", "message": "..."}`
    Flat { message: String },
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Classify a failure to send a request or read its body.
pub(crate) fn request_error(service: Service, err: reqwest::Error) -> RagError {
    error!(%service, error = %err, "request failed");
    if err.is_decode() {
        RagError::permanent(service, format!("malformed response: {err}"))
    } else {
        RagError::transient(service, format!("request failed: {err}"))
    }
}

/// Whether a status code signals a condition worth retrying.
pub(crate) fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Turn an unsuccessful response into an error, extracting the service's
/// own message when the body carries one.
pub(crate) async fn status_error(service: Service, response: Response) -> RagError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody::Nested { error }) => error.message,
        Ok(ErrorBody::Flat { message }) => message,
        Err(_) => body,
    };

    error!(%service, %status, detail, "API error");
    let message = format!("API returned {status}: {detail}");
    if is_retryable(status) {
        RagError::transient(service, message)
    } else {
        RagError::permanent(service, message)
    }
}
