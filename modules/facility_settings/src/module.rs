//! Module wiring and lifecycle

use crate::api::native::NativeClient;
use crate::api::rest::{register_routes, RestState};
use crate::config::Config;
use crate::contract::SettingsApi;
use crate::domain::{
    FileSettingsBuilder, LoggingObserver, SchemaRegistry, SettingsBuilder, SettingsCache,
    SettingsObserver, SettingsRepository, SettingsStore,
};
use crate::infra::storage::{migrations::Migrator, SeaOrmSettingsRepository};
use anyhow::{Context, Result};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Facility settings module: store, cache and API surfaces wired together
pub struct SettingsModule {
    config: Config,
    store: Arc<SettingsStore>,
    cache: Arc<SettingsCache>,
    client: Arc<NativeClient>,
    schemas: Arc<SchemaRegistry>,
    // The store only holds observers weakly
    _logging: Arc<dyn SettingsObserver>,
}

impl SettingsModule {
    /// Run migrations and wire the module over a database connection
    pub async fn init(config: Config, db: DatabaseConnection) -> Result<Self> {
        Migrator::up(&db, None)
            .await
            .context("facility settings migrations failed")?;
        tracing::info!("Facility settings migrations completed");

        let schemas = Arc::new(SchemaRegistry::embedded()?);
        let repo = Arc::new(SeaOrmSettingsRepository::new(Arc::new(db)));
        let builder = Arc::new(FileSettingsBuilder::new(
            schemas.clone(),
            config.defaults_dir.clone(),
        ));
        Ok(Self::with_parts(config, repo, builder, schemas))
    }

    /// Wire the module over an existing repository, builder and schemas
    pub fn with_parts(
        config: Config,
        repo: Arc<dyn SettingsRepository>,
        builder: Arc<dyn SettingsBuilder>,
        schemas: Arc<SchemaRegistry>,
    ) -> Self {
        let store = Arc::new(
            SettingsStore::new(repo)
                .with_max_value_size(config.max_value_size)
                .with_schemas(schemas.clone()),
        );
        let cache = SettingsCache::new(store.clone(), builder, config.cache_ttl);

        let logging: Arc<dyn SettingsObserver> = Arc::new(LoggingObserver);
        store.subscribe(Arc::downgrade(&logging));

        let client = Arc::new(NativeClient::new(store.clone(), cache.clone()));

        tracing::info!(
            cache_ttl = ?config.cache_ttl,
            defaults_dir = ?config.defaults_dir,
            "Facility settings module initialized"
        );

        Self {
            config,
            store,
            cache,
            client,
            schemas,
            _logging: logging,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> Arc<SettingsStore> {
        self.store.clone()
    }

    pub fn cache(&self) -> Arc<SettingsCache> {
        self.cache.clone()
    }

    pub fn schemas(&self) -> Arc<SchemaRegistry> {
        self.schemas.clone()
    }

    /// In-process client for other modules
    pub fn client(&self) -> Arc<dyn SettingsApi> {
        self.client.clone()
    }

    /// Drop every cached settings tree
    pub fn reset(&self) {
        self.cache.reset();
    }

    /// Permanently remove rows soft-deleted longer ago than the configured retention
    pub async fn purge_deleted(&self) -> Result<usize> {
        Ok(self
            .store
            .purge_deleted(self.config.deleted_retention())
            .await?)
    }

    /// REST routes bound to this module
    pub fn router(&self) -> axum::Router {
        register_routes(
            axum::Router::new(),
            RestState {
                api: self.client(),
                country_time_zone: self.config.country_time_zone.clone(),
                schemas: self.schemas.clone(),
            },
        )
    }

    /// Serve the REST API until `cancel` fires
    pub async fn serve(self: Arc<Self>, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(%addr, "Facility settings REST API listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .context("facility settings server failed")?;

        tracing::info!("Facility settings REST API stopped");
        Ok(())
    }
}
