//! Contract models for facility settings
//!
//! These models are transport-agnostic and used for inter-module communication.
//! NO serde derives - these are pure domain models.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::SettingsError;

/// Precedence layer a stored setting belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingsScope {
    /// Applies to every server in the deployment
    Global,
    /// Applies to the central server only
    Central,
    /// Applies to one facility, requires a facility id
    Facility,
}

impl SettingsScope {
    pub const ALL: [SettingsScope; 3] = [
        SettingsScope::Global,
        SettingsScope::Central,
        SettingsScope::Facility,
    ];

    /// Storage representation
    pub fn as_str(self) -> &'static str {
        match self {
            SettingsScope::Global => "global",
            SettingsScope::Central => "central",
            SettingsScope::Facility => "facility",
        }
    }

    /// Check that the facility id presence matches the scope
    pub fn validate_facility(self, facility_id: Option<&str>) -> Result<(), SettingsError> {
        match (self, facility_id) {
            (SettingsScope::Facility, None) => Err(SettingsError::Validation {
                message: "facility scope requires a facility id".to_string(),
            }),
            (SettingsScope::Facility, Some(id)) if id.trim().is_empty() => {
                Err(SettingsError::Validation {
                    message: "facility id cannot be empty".to_string(),
                })
            }
            (SettingsScope::Global | SettingsScope::Central, Some(id)) => {
                Err(SettingsError::Validation {
                    message: format!(
                        "{} scope does not take a facility id (got '{}')",
                        self.as_str(),
                        id
                    ),
                })
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for SettingsScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingsScope {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "global" => Ok(SettingsScope::Global),
            "central" => Ok(SettingsScope::Central),
            "facility" => Ok(SettingsScope::Facility),
            other => Err(SettingsError::Validation {
                message: format!("unknown settings scope '{}'", other),
            }),
        }
    }
}

/// A persisted setting row
#[derive(Debug, Clone, PartialEq)]
pub struct SettingRecord {
    /// Row identifier
    pub id: Uuid,
    /// Dotted key, empty for a root-level override
    pub key: String,
    /// Stored value as JSON
    pub value: serde_json::Value,
    /// Precedence layer
    pub scope: SettingsScope,
    /// Facility the row applies to (FACILITY scope only)
    pub facility_id: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Soft delete timestamp
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SettingRecord {
    /// Create a fresh, not yet persisted record
    pub fn new(
        key: impl Into<String>,
        value: serde_json::Value,
        scope: SettingsScope,
        facility_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            value,
            scope,
            facility_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Row filter used against the settings store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsQuery {
    /// Key to match, together with every key below it. `None` matches all.
    pub key: Option<String>,
    pub scope: SettingsScope,
    pub facility_id: Option<String>,
}

impl SettingsQuery {
    /// Every row of a scope
    pub fn scope(scope: SettingsScope, facility_id: Option<String>) -> Self {
        Self {
            key: None,
            scope,
            facility_id,
        }
    }

    /// Rows at or below `key`
    pub fn key(
        key: impl Into<String>,
        scope: SettingsScope,
        facility_id: Option<String>,
    ) -> Self {
        Self {
            key: Some(key.into()),
            scope,
            facility_id,
        }
    }

    /// Whether a row key falls under this query's key
    pub fn matches_key(&self, row_key: &str) -> bool {
        match self.key.as_deref() {
            None | Some("") => true,
            Some(prefix) => {
                row_key == prefix
                    || (row_key.starts_with(prefix)
                        && row_key.as_bytes().get(prefix.len()) == Some(&b'.'))
            }
        }
    }
}

/// Context a settings tree is resolved for
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ScopeContext {
    /// Facility whose FACILITY-scope rows apply
    pub facility_id: Option<String>,
    /// Server-configured country time zone, seeded as `countryTimeZone`
    pub country_time_zone: Option<String>,
}

impl ScopeContext {
    /// Context with no facility
    pub fn global() -> Self {
        Self::default()
    }

    /// Context bound to a facility
    pub fn facility(facility_id: impl Into<String>) -> Self {
        Self {
            facility_id: Some(facility_id.into()),
            country_time_zone: None,
        }
    }

    pub fn with_country_time_zone(mut self, tz: impl Into<String>) -> Self {
        self.country_time_zone = Some(tz.into());
        self
    }
}

/// Result of loading a settings file
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    /// Flattened leaf rows that were (or would be) written
    pub rows: Vec<(String, serde_json::Value)>,
    /// Whether the load was a dry run
    pub preview: bool,
}
