//! Process-wide TTL cache of effective settings trees
//!
//! One entry per [`ScopeContext`]. An entry is served until its TTL elapses or
//! the cache is reset; there is no background eviction. The cache observes the
//! settings store and resets itself on every committed write.

use crate::contract::{ScopeContext, SettingsError};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::builder::SettingsBuilder;
use super::events::{SettingEvent, SettingsObserver};
use super::key::validate_key;
use super::merge::lookup;
use super::reader::ReadSettings;
use super::store::SettingsStore;

/// Default time-to-live of a cached tree
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    tree: Arc<Value>,
    built_at: Instant,
}

#[derive(Default)]
struct CacheState {
    /// Bumped by every reset; a rebuild that started under an older
    /// generation is not stored.
    generation: u64,
    entries: HashMap<ScopeContext, CacheEntry>,
}

/// TTL cache wrapping [`ReadSettings`]
pub struct SettingsCache {
    store: Arc<SettingsStore>,
    builder: Arc<dyn SettingsBuilder>,
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl SettingsCache {
    /// Create an empty cache and subscribe it to the store's change notifications
    pub fn new(
        store: Arc<SettingsStore>,
        builder: Arc<dyn SettingsBuilder>,
        ttl: Duration,
    ) -> Arc<Self> {
        let cache = Arc::new(Self {
            store: store.clone(),
            builder,
            ttl,
            state: RwLock::new(CacheState::default()),
        });
        let observer: Arc<dyn SettingsObserver> = cache.clone();
        store.subscribe(Arc::downgrade(&observer));
        tracing::debug!(ttl = ?ttl, "Settings cache initialized");
        cache
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of contexts currently holding a tree, fresh or not
    pub fn entry_count(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Effective value at `key` for `context`; `None` when undefined
    pub async fn get(
        &self,
        key: &str,
        context: &ScopeContext,
    ) -> Result<Option<Value>, SettingsError> {
        validate_key(key)?;
        let tree = self.tree(context).await?;
        Ok(lookup(&tree, key).cloned())
    }

    /// The whole effective tree for `context`
    pub async fn get_all(&self, context: &ScopeContext) -> Result<Arc<Value>, SettingsError> {
        self.tree(context).await
    }

    /// Drop every cached tree
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.generation += 1;
        let dropped = state.entries.len();
        state.entries.clear();
        tracing::debug!(dropped, generation = state.generation, "Settings cache reset");
    }

    /// Handle bound to one context, for request-scoped code
    pub fn for_context(self: &Arc<Self>, context: ScopeContext) -> ScopedSettings {
        ScopedSettings {
            cache: self.clone(),
            context,
        }
    }

    async fn tree(&self, context: &ScopeContext) -> Result<Arc<Value>, SettingsError> {
        let generation = {
            let state = self.state.read();
            if let Some(entry) = state.entries.get(context) {
                if entry.built_at.elapsed() < self.ttl {
                    return Ok(entry.tree.clone());
                }
            }
            state.generation
        };

        let started = Instant::now();
        let reader = ReadSettings::new(self.store.clone(), self.builder.clone(), context.clone());
        let tree = Arc::new(reader.build_tree().await.inspect_err(|e| {
            tracing::warn!(facility_id = ?context.facility_id, error = %e, "Settings rebuild failed");
        })?);

        let mut state = self.state.write();
        if state.generation == generation {
            state.entries.insert(
                context.clone(),
                CacheEntry {
                    tree: tree.clone(),
                    built_at: started,
                },
            );
            tracing::debug!(facility_id = ?context.facility_id, "Settings tree cached");
        }
        Ok(tree)
    }
}

impl SettingsObserver for SettingsCache {
    fn on_setting_changed(&self, event: &SettingEvent) {
        tracing::debug!(kind = event.kind(), key = %event.change().key, "Invalidating settings cache");
        self.reset();
    }
}

/// Cached settings bound to a context
#[derive(Clone)]
pub struct ScopedSettings {
    cache: Arc<SettingsCache>,
    context: ScopeContext,
}

impl ScopedSettings {
    pub fn context(&self) -> &ScopeContext {
        &self.context
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        self.cache.get(key, &self.context).await
    }

    /// Typed read; `Ok(None)` when undefined, `Validation` when the stored
    /// value does not deserialize into `T`
    pub async fn get_as<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, SettingsError> {
        match self.get(key).await? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| SettingsError::Validation {
                    message: format!("setting '{}' has an unexpected shape: {}", key, e),
                }),
        }
    }
}
