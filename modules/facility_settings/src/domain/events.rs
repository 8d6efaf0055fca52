/// Change notifications for setting records
///
/// Every write that goes through the settings store emits one event per
/// affected row. Observers registered with the store receive them after the
/// write has been committed; the settings cache uses this to drop stale trees.

use crate::contract::{SettingRecord, SettingsScope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A change to a stored setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SettingEvent {
    /// A new row was stored
    Created(SettingChange),
    /// An existing row got a new value
    Updated(SettingChange),
    /// A row was removed
    Deleted(SettingChange),
}

/// Row identity carried by every event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingChange {
    /// Dotted key of the row
    pub key: String,
    /// Scope of the row
    pub scope: String,
    /// Facility of the row (FACILITY scope only)
    pub facility_id: Option<String>,
    /// Timestamp of the change
    pub timestamp: DateTime<Utc>,
}

impl SettingEvent {
    /// Event for an upserted row
    pub fn upserted(record: &SettingRecord, is_new: bool) -> Self {
        let change = SettingChange::of(record);
        if is_new {
            SettingEvent::Created(change)
        } else {
            SettingEvent::Updated(change)
        }
    }

    /// Event for a removed row
    pub fn deleted(record: &SettingRecord) -> Self {
        SettingEvent::Deleted(SettingChange::of(record))
    }

    pub fn change(&self) -> &SettingChange {
        match self {
            SettingEvent::Created(c) | SettingEvent::Updated(c) | SettingEvent::Deleted(c) => c,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SettingEvent::Created(_) => "created",
            SettingEvent::Updated(_) => "updated",
            SettingEvent::Deleted(_) => "deleted",
        }
    }
}

impl SettingChange {
    fn of(record: &SettingRecord) -> Self {
        Self {
            key: record.key.clone(),
            scope: record.scope.as_str().to_string(),
            facility_id: record.facility_id.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Scope parsed back into the contract enum
    pub fn scope(&self) -> Option<SettingsScope> {
        self.scope.parse().ok()
    }
}

/// Receiver of setting change notifications
///
/// Called synchronously from the writing task, so implementations must not
/// block.
pub trait SettingsObserver: Send + Sync {
    fn on_setting_changed(&self, event: &SettingEvent);
}

/// Observer that writes every change to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl SettingsObserver for LoggingObserver {
    fn on_setting_changed(&self, event: &SettingEvent) {
        let change = event.change();
        tracing::info!(
            kind = event.kind(),
            key = %change.key,
            scope = %change.scope,
            facility_id = ?change.facility_id,
            "Setting changed"
        );
    }
}
