//! Domain layer - settings resolution, caching and the write path

pub mod builder;
pub mod cache;
pub mod events;
pub mod key;
pub mod merge;
pub mod reader;
pub mod repository;
pub mod schema;
pub mod store;

pub use builder::{FileSettingsBuilder, SettingsBuilder, StaticSettingsBuilder};
pub use cache::{ScopedSettings, SettingsCache, DEFAULT_TTL};
pub use events::{LoggingObserver, SettingEvent, SettingsObserver};
pub use reader::ReadSettings;
pub use repository::SettingsRepository;
pub use schema::{SchemaRegistry, SettingsSchema, SECRET_PLACEHOLDER};
pub use store::SettingsStore;
