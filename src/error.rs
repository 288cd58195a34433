use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorBody;

/// Rejections raised while normalizing a request body. Always the caller's fault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid request format")]
    InvalidFormat,
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// The provider answered, but nothing usable could be pulled out of the answer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResponseShapeError {
    #[error("API returned empty response")]
    EmptyProviderResponse,
    #[error("No valid image URL returned from API")]
    NoImageUrlFound,
    #[error("Unable to parse generation output ({0})")]
    UnparseableOutput(&'static str),
}

/// Error surfaced by a provider client: the upstream library only gives us text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct UpstreamError {
    pub message: String,
}

impl UpstreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Configuration(&'static str),
    #[error("upstream authentication failed: {0}")]
    UpstreamAuth(String),
    #[error("upstream credit exhausted: {0}")]
    UpstreamQuota(String),
    #[error("upstream rate limited: {0}")]
    UpstreamRateLimit(String),
    #[error(transparent)]
    ResponseShape(#[from] ResponseShapeError),
    #[error("upstream failure: {0}")]
    UnknownUpstream(String),
    #[error("No response from optimization service")]
    EmptyOptimizationResult,
    #[error("prompt optimization failed: {0}")]
    OptimizationFailed(String),
}

impl AppError {
    /// Classify an image-provider failure by its message text. The provider
    /// does not expose typed error codes, so substrings are all there is.
    pub fn from_upstream(err: UpstreamError) -> Self {
        let lowered = err.message.to_lowercase();
        if lowered.contains("authentication") {
            AppError::UpstreamAuth(err.message)
        } else if lowered.contains("insufficient") {
            AppError::UpstreamQuota(err.message)
        } else if lowered.contains("rate limit") || lowered.contains("too many requests") {
            AppError::UpstreamRateLimit(err.message)
        } else {
            AppError::UnknownUpstream(err.message)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamAuth(_) => StatusCode::UNAUTHORIZED,
            AppError::UpstreamQuota(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::UpstreamRateLimit(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Configuration(_)
            | AppError::ResponseShape(_)
            | AppError::UnknownUpstream(_)
            | AppError::EmptyOptimizationResult
            | AppError::OptimizationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `{error, details}` pair the frontend renders verbatim.
    pub fn body(&self) -> ErrorBody {
        let (error, details) = match self {
            AppError::Validation(v) => (v.to_string(), None),
            AppError::Configuration(msg) => (msg.to_string(), None),
            AppError::UpstreamAuth(_) => (
                "API authentication failed. Please check your Replicate API token.".to_string(),
                Some("Make sure REPLICATE_API_TOKEN is set correctly in the environment".to_string()),
            ),
            AppError::UpstreamQuota(_) => (
                "Insufficient credits. Please check your Replicate account balance.".to_string(),
                None,
            ),
            AppError::UpstreamRateLimit(_) => {
                ("Rate limit exceeded. Please try again later.".to_string(), None)
            }
            AppError::ResponseShape(shape) => {
                let details = match shape {
                    ResponseShapeError::EmptyProviderResponse => "The model did not return any data",
                    ResponseShapeError::NoImageUrlFound => "The model did not return a valid image URL",
                    ResponseShapeError::UnparseableOutput(_) => "The model output had an unrecognized shape",
                };
                (shape.to_string(), Some(details.to_string()))
            }
            AppError::UnknownUpstream(msg) => ("Failed to generate image".to_string(), Some(msg.clone())),
            AppError::EmptyOptimizationResult => (self.to_string(), None),
            AppError::OptimizationFailed(msg) => ("Prompt optimization failed".to_string(), Some(msg.clone())),
        };
        ErrorBody { error, details }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!("❌ Request failed with {}: {}", status, self);
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classify(msg: &str) -> StatusCode {
        AppError::from_upstream(UpstreamError::new(msg)).status()
    }

    #[test]
    fn upstream_messages_map_to_status_codes() {
        assert_eq!(
            classify(concat!(
                "Request to https://api.replicate.com/v1/predictions failed with status 401 Unauthorized: ",
                r#"{"detail":"Authentication credentials were not provided."}"#,
            )),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(classify("You have insufficient credit to run this model"), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(classify("failed with status 429 Too Many Requests"), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(classify("rate limit reached for this model"), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(classify("connection reset by peer"), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unknown_upstream_errors_carry_the_message_as_details() {
        let body = AppError::from_upstream(UpstreamError::new("model crashed")).body();
        assert_eq!(body.error, "Failed to generate image");
        assert_eq!(body.details.as_deref(), Some("model crashed"));
    }

    #[test]
    fn validation_errors_name_the_field() {
        let err = AppError::from(ValidationError::MissingField("prompt"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body().error, "Missing required field: prompt");
    }
}
