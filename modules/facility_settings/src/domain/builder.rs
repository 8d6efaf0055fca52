//! File-based settings defaults
//!
//! The builder is the boundary that produces the static part of a scope's
//! settings tree: the defaults declared in the scope's schema, then any
//! override file. Database rows are layered on top of its output by the reader.

use crate::contract::SettingsScope;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::merge::deep_merge;
use super::schema::SchemaRegistry;

/// Source of per-scope default settings
#[async_trait]
pub trait SettingsBuilder: Send + Sync {
    /// Build the nested defaults object for a scope
    async fn build(&self, scope: SettingsScope) -> Result<Value>;
}

/// Schema defaults, optionally overridden by files in a directory
/// (`global.yaml`, `central.json`, ...)
#[derive(Debug, Clone)]
pub struct FileSettingsBuilder {
    schemas: Arc<SchemaRegistry>,
    defaults_dir: Option<PathBuf>,
}

impl FileSettingsBuilder {
    pub fn new(schemas: Arc<SchemaRegistry>, defaults_dir: Option<PathBuf>) -> Self {
        Self {
            schemas,
            defaults_dir,
        }
    }

    /// Builder over the embedded schemas with no override directory
    pub fn embedded() -> Result<Self> {
        Ok(Self::new(Arc::new(SchemaRegistry::embedded()?), None))
    }

    fn override_file(&self, scope: SettingsScope) -> Option<PathBuf> {
        let dir = self.defaults_dir.as_ref()?;
        ["json", "yaml", "yml"]
            .iter()
            .map(|ext| dir.join(format!("{}.{}", scope.as_str(), ext)))
            .find(|path| path.is_file())
    }
}

#[async_trait]
impl SettingsBuilder for FileSettingsBuilder {
    async fn build(&self, scope: SettingsScope) -> Result<Value> {
        let mut tree = self.schemas.defaults(scope);

        if let Some(path) = self.override_file(scope) {
            tracing::debug!(scope = %scope, path = %path.display(), "Applying settings defaults file");
            deep_merge(&mut tree, read_settings_file(&path).await?);
        }

        Ok(tree)
    }
}

/// Fixed per-scope trees, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticSettingsBuilder {
    trees: HashMap<SettingsScope, Value>,
}

impl StaticSettingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(mut self, scope: SettingsScope, tree: Value) -> Self {
        self.trees.insert(scope, tree);
        self
    }
}

#[async_trait]
impl SettingsBuilder for StaticSettingsBuilder {
    async fn build(&self, scope: SettingsScope) -> Result<Value> {
        Ok(self
            .trees
            .get(&scope)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())))
    }
}

/// Parse a JSON or YAML settings file into a tree, by extension
pub async fn read_settings_file(path: &Path) -> Result<Value> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read settings file {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("json") => serde_json::from_str(&text)
            .with_context(|| format!("invalid JSON in {}", path.display())),
        Some("yaml") | Some("yml") => serde_yaml::from_str(&text)
            .with_context(|| format!("invalid YAML in {}", path.display())),
        _ => anyhow::bail!(
            "unsupported settings file format: {} (expected .json, .yaml or .yml)",
            path.display()
        ),
    }
}
