//! Mapper implementations for converting between DTOs and contract models

use super::dto::*;
use crate::contract::{self, ScopeContext, SettingsError, SettingsScope};

impl From<contract::SettingRecord> for SettingRecordDto {
    fn from(record: contract::SettingRecord) -> Self {
        Self {
            id: record.id,
            key: record.key,
            value: record.value,
            scope: record.scope.as_str().to_string(),
            facility_id: record.facility_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<Vec<contract::SettingRecord>> for SetSettingResponse {
    fn from(records: Vec<contract::SettingRecord>) -> Self {
        let items: Vec<SettingRecordDto> = records.into_iter().map(Into::into).collect();
        let total = items.len();
        Self { items, total }
    }
}

impl GetSettingQuery {
    /// Build the resolution context, falling back to the server's time zone
    pub fn context(&self, default_time_zone: Option<&str>) -> ScopeContext {
        ScopeContext {
            facility_id: self.facility_id.clone().filter(|f| !f.is_empty()),
            country_time_zone: self
                .country_time_zone
                .clone()
                .or_else(|| default_time_zone.map(str::to_string)),
        }
    }
}

impl ScopedQuery {
    pub fn scope(&self) -> Result<SettingsScope, SettingsError> {
        self.scope.parse()
    }
}

impl SetSettingRequest {
    pub fn scope(&self) -> Result<SettingsScope, SettingsError> {
        self.scope.parse()
    }
}
