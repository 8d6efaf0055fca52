//! HTTP error mapping to RFC-9457 Problem Details

use crate::contract::SettingsError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// RFC-9457 Problem Details for HTTP API errors
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Problem {
    /// A URI reference that identifies the problem type
    #[serde(rename = "type")]
    pub type_uri: String,

    /// A short, human-readable summary of the problem type
    pub title: String,

    /// The HTTP status code
    pub status: u16,

    /// A human-readable explanation specific to this occurrence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>) -> Self {
        Self {
            type_uri: format!("https://httpstatuses.io/{}", status.as_u16()),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/problem+json")],
            Json(self),
        )
            .into_response()
    }
}

impl From<SettingsError> for Problem {
    fn from(error: SettingsError) -> Self {
        map_domain_error(error)
    }
}

/// Map domain errors to HTTP Problem Details
pub fn map_domain_error(error: SettingsError) -> Problem {
    match error {
        SettingsError::InvalidKey { key, details } => {
            Problem::new(StatusCode::BAD_REQUEST, "Invalid Setting Key")
                .with_detail(format!("Invalid key '{}': {}", key, details))
        }

        SettingsError::Validation { message } => {
            Problem::new(StatusCode::BAD_REQUEST, "Validation Error").with_detail(message)
        }

        SettingsError::SchemaValidation { key, errors } => {
            Problem::new(StatusCode::BAD_REQUEST, "Schema Validation Error").with_detail(format!(
                "Value for '{}' does not match its schema: {}",
                key,
                errors.join("; ")
            ))
        }

        SettingsError::NotFound { key } => Problem::new(StatusCode::NOT_FOUND, "Setting Not Found")
            .with_detail(format!("No value is stored at '{}'", key)),

        SettingsError::Store(error) => {
            tracing::error!(error = ?error, "Settings store failure");
            Problem::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                .with_detail("An unexpected error occurred")
        }
    }
}
