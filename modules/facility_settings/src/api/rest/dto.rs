//! REST DTOs with serde derives for HTTP API

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ===== Read DTOs =====

/// Query for an effective setting value
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GetSettingQuery {
    /// Dotted key, empty or omitted for the whole tree
    #[serde(default)]
    #[schema(example = "survey.defaultCodes.department")]
    pub key: String,

    /// Facility whose overrides apply
    pub facility_id: Option<String>,

    /// Country time zone seeded into the tree; the server default applies when omitted
    pub country_time_zone: Option<String>,
}

/// Query for a value stored in a single scope
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ScopedQuery {
    /// Dotted key, empty or omitted for the whole scope
    #[serde(default)]
    pub key: String,

    /// Scope name: global, central or facility
    #[schema(example = "facility")]
    pub scope: String,

    /// Facility id, required for facility scope only
    pub facility_id: Option<String>,
}

/// Setting value response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingValueResponse {
    /// Requested key
    pub key: String,

    /// Resolved value; omitted when the key is undefined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

// ===== Write DTOs =====

/// Store a value at a key within a scope
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetSettingRequest {
    /// Dotted key, empty to write at the root
    #[serde(default)]
    pub key: String,

    /// Value to store; objects are stored one row per leaf
    pub value: serde_json::Value,

    /// Scope name: global, central or facility
    pub scope: String,

    /// Facility id, required for facility scope only
    pub facility_id: Option<String>,
}

/// Stored setting row
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingRecordDto {
    pub id: Uuid,

    #[schema(example = "survey.defaultCodes.location")]
    pub key: String,

    pub value: serde_json::Value,

    pub scope: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility_id: Option<String>,

    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,

    /// Last update timestamp
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Rows written by a set request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetSettingResponse {
    pub items: Vec<SettingRecordDto>,
    pub total: usize,
}

/// Result of a delete request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    /// Number of rows removed
    pub deleted: usize,
}
