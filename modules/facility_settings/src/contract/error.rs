//! Contract error types for facility settings
//!
//! These errors are transport-agnostic and used for inter-module communication.

/// Facility settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Key has empty segments or characters outside `[A-Za-z0-9_-]`
    #[error("Invalid setting key '{key}': {details}")]
    InvalidKey {
        /// Offending key
        key: String,
        /// Error details
        details: String,
    },

    /// Request is inconsistent (scope/facility mismatch, oversized value, bad file)
    #[error("Validation error: {message}")]
    Validation {
        /// Validation error message
        message: String,
    },

    /// Value does not match the schema declared for its key
    #[error("Value for '{key}' does not match its schema: {}", .errors.join("; "))]
    SchemaValidation {
        /// Key the value was written to
        key: String,
        /// One message per violation
        errors: Vec<String>,
    },

    /// No stored value at the requested key
    #[error("Setting not found: {key}")]
    NotFound {
        /// Requested key
        key: String,
    },

    /// The settings store or the defaults builder failed
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl SettingsError {
    pub(crate) fn invalid_key(key: &str, details: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.to_string(),
            details: details.into(),
        }
    }

    /// Whether the error came from the store rather than from the request
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
