//! HTTP request handlers - thin layer that delegates to the settings API

use super::{dto::*, error::Problem, routes::RestState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

/// Effective value for a context, served from the cache with secrets masked
pub async fn get_setting(
    State(state): State<RestState>,
    Query(query): Query<GetSettingQuery>,
) -> Result<Json<SettingValueResponse>, Problem> {
    let context = query.context(state.country_time_zone.as_deref());
    let value = state
        .api
        .get(&query.key, &context)
        .await?
        .map(|v| state.schemas.mask(v, &query.key));

    Ok(Json(SettingValueResponse {
        key: query.key,
        value,
    }))
}

/// Value stored in one scope; 404 when nothing is stored there
pub async fn get_scoped_setting(
    State(state): State<RestState>,
    Query(query): Query<ScopedQuery>,
) -> Result<Json<SettingValueResponse>, Problem> {
    let scope = query.scope()?;
    let value = state
        .api
        .get_scoped(&query.key, scope, query.facility_id.as_deref())
        .await?
        .ok_or_else(|| crate::contract::SettingsError::NotFound {
            key: query.key.clone(),
        })?;

    Ok(Json(SettingValueResponse {
        value: Some(state.schemas.mask(value, &query.key)),
        key: query.key,
    }))
}

/// Replace the subtree at a key
pub async fn set_setting(
    State(state): State<RestState>,
    Json(req): Json<SetSettingRequest>,
) -> Result<Json<SetSettingResponse>, Problem> {
    let scope = req.scope()?;
    let records = state
        .api
        .set(&req.key, req.value, scope, req.facility_id.as_deref())
        .await?
        .into_iter()
        .map(|mut record| {
            record.value = state.schemas.mask(record.value, &record.key);
            record
        })
        .collect::<Vec<_>>();

    Ok(Json(records.into()))
}

/// Remove the subtree at a key
pub async fn delete_setting(
    State(state): State<RestState>,
    Query(query): Query<ScopedQuery>,
) -> Result<Json<DeleteResponse>, Problem> {
    let scope = query.scope()?;
    let deleted = state
        .api
        .delete(&query.key, scope, query.facility_id.as_deref())
        .await?;

    Ok(Json(DeleteResponse { deleted }))
}

/// Drop every cached settings tree
pub async fn reset_cache(State(state): State<RestState>) -> StatusCode {
    state.api.reset_cache();
    tracing::info!("Settings cache reset requested over REST");
    StatusCode::NO_CONTENT
}
