//! Facility Settings
//!
//! Layered settings resolution for facility clinical records servers.
//! Effective settings merge file defaults with stored overrides across the
//! CENTRAL, GLOBAL and FACILITY scopes, and are served through a TTL cache
//! that is reset whenever a setting is written.

// Public exports
pub mod contract;
pub use contract::{
    client::SettingsApi, error::SettingsError, LoadOutcome, ScopeContext, SettingRecord,
    SettingsQuery, SettingsScope,
};

pub mod module;
pub use module::SettingsModule;

// Internal modules (hidden from public API)
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
