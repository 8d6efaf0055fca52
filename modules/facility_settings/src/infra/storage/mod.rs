//! Storage layer - database entity, repository and migrations

pub mod entity;
pub mod mapper;
pub mod migrations;
pub mod repositories;

pub use repositories::SeaOrmSettingsRepository;
