//! Route registration and OpenAPI document

use super::{dto::*, error::Problem, handlers};
use crate::contract::SettingsApi;
use crate::domain::SchemaRegistry;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct RestState {
    pub api: Arc<dyn SettingsApi>,
    /// Seeded as `countryTimeZone` when a request does not name one
    pub country_time_zone: Option<String>,
    /// Names the secret paths masked in responses
    pub schemas: Arc<SchemaRegistry>,
}

/// OpenAPI components for the settings endpoints
#[derive(OpenApi)]
#[openapi(components(schemas(
    GetSettingQuery,
    ScopedQuery,
    SettingValueResponse,
    SetSettingRequest,
    SettingRecordDto,
    SetSettingResponse,
    DeleteResponse,
    Problem
)))]
pub struct ApiDoc;

/// Register all REST routes on `router`
pub fn register_routes(router: Router, state: RestState) -> Router {
    let settings = Router::new()
        .route(
            "/settings",
            get(handlers::get_setting)
                .put(handlers::set_setting)
                .delete(handlers::delete_setting),
        )
        .route("/settings/scoped", get(handlers::get_scoped_setting))
        .route("/admin/settings-cache/reset", post(handlers::reset_cache))
        .with_state(state);

    router.merge(settings)
}
