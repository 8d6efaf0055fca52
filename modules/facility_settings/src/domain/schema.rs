//! Per-scope settings schemas
//!
//! Each scope's schema is a JSON Schema document whose leaf properties carry
//! a `default`, an optional `description` and an optional `"secret": true`.
//! The schema is the source of the scope's built-in defaults, validates
//! writes, and names the paths whose values are masked when served.

use crate::contract::{SettingsError, SettingsScope};
use anyhow::{Context, Result};
use jsonschema::Validator;
use serde_json::{Map, Value};

use super::key::{join, segments};

const GLOBAL_SCHEMA: &str = include_str!("../../schema/global.json");
const CENTRAL_SCHEMA: &str = include_str!("../../schema/central.json");

/// Shown in place of a secret value
pub const SECRET_PLACEHOLDER: &str = "••••••••";

/// One scope's schema document plus the secret paths found in it
#[derive(Debug, Clone)]
pub struct SettingsSchema {
    document: Value,
    secret_paths: Vec<String>,
}

impl SettingsSchema {
    /// Wrap a schema document, rejecting documents that are not valid JSON Schema
    pub fn new(document: Value) -> Result<Self> {
        Validator::new(&document).map_err(|e| anyhow::anyhow!("invalid settings schema: {}", e))?;

        let mut secret_paths = Vec::new();
        collect_secret_paths(&document, "", &mut secret_paths);
        secret_paths.sort();

        Ok(Self {
            document,
            secret_paths,
        })
    }

    /// Schema with no properties; accepts anything and has no defaults
    pub fn permissive() -> Self {
        Self {
            document: Value::Object(Map::new()),
            secret_paths: Vec::new(),
        }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Nested tree of every `default` declared in the schema
    pub fn defaults(&self) -> Value {
        extract_defaults(&self.document).unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Dotted paths of every property marked `"secret": true`, sorted
    pub fn secret_paths(&self) -> &[String] {
        &self.secret_paths
    }

    pub fn is_secret_path(&self, key: &str) -> bool {
        self.setting_at(key)
            .and_then(|s| s.get("secret"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Schema of the setting at `key`.
    ///
    /// Returns `None` for unknown keys and for categories (nodes with
    /// `properties`), which are not settings themselves.
    pub fn setting_at(&self, key: &str) -> Option<&Value> {
        if key.is_empty() {
            return None;
        }
        self.node_at(key).filter(|node| !is_category(node))
    }

    /// Human-readable description of the setting or category at `key`
    pub fn description(&self, key: &str) -> Option<&str> {
        self.node_at(key)?.get("description")?.as_str()
    }

    fn node_at(&self, key: &str) -> Option<&Value> {
        segments(key).try_fold(&self.document, |node, segment| {
            node.get("properties")?.as_object()?.get(segment)
        })
    }

    /// Check `value` against the schema of `key`.
    ///
    /// Keys the schema does not describe are accepted as they are.
    pub fn validate(&self, key: &str, value: &Value) -> Result<(), SettingsError> {
        let Some(schema) = self.node_at(key) else {
            return Ok(());
        };

        let validator = Validator::new(schema).map_err(|e| SettingsError::Validation {
            message: format!("Invalid JSON Schema at '{}': {}", key, e),
        })?;

        let errors: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
        if !errors.is_empty() {
            return Err(SettingsError::SchemaValidation {
                key: key.to_string(),
                errors,
            });
        }
        Ok(())
    }
}

/// Schemas for every scope.
///
/// FACILITY rows override GLOBAL settings, so facilities share the GLOBAL
/// schema.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    global: SettingsSchema,
    central: SettingsSchema,
}

impl SchemaRegistry {
    pub fn new(global: SettingsSchema, central: SettingsSchema) -> Self {
        Self { global, central }
    }

    /// Schemas compiled into the binary
    pub fn embedded() -> Result<Self> {
        let parse = |name: &str, source: &str| -> Result<SettingsSchema> {
            let document = serde_json::from_str(source)
                .with_context(|| format!("embedded {} schema is not valid JSON", name))?;
            SettingsSchema::new(document)
        };

        Ok(Self::new(
            parse("global", GLOBAL_SCHEMA)?,
            parse("central", CENTRAL_SCHEMA)?,
        ))
    }

    /// Registry that validates nothing and masks nothing
    pub fn permissive() -> Self {
        Self::new(SettingsSchema::permissive(), SettingsSchema::permissive())
    }

    pub fn for_scope(&self, scope: SettingsScope) -> &SettingsSchema {
        match scope {
            SettingsScope::Central => &self.central,
            SettingsScope::Global | SettingsScope::Facility => &self.global,
        }
    }

    /// Built-in defaults of a scope; facilities have none of their own
    pub fn defaults(&self, scope: SettingsScope) -> Value {
        match scope {
            SettingsScope::Facility => Value::Object(Map::new()),
            scope => self.for_scope(scope).defaults(),
        }
    }

    /// Secret paths of every scope, for masking a resolved tree
    pub fn secret_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .global
            .secret_paths()
            .iter()
            .chain(self.central.secret_paths())
            .cloned()
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Mask every secret found in `value`, the subtree stored at `base_key`
    pub fn mask(&self, value: Value, base_key: &str) -> Value {
        mask_secrets(value, base_key, &self.secret_paths())
    }
}

fn is_category(node: &Value) -> bool {
    node.get("properties").is_some_and(Value::is_object)
}

/// Nested defaults of a schema node: categories recurse, leaves yield `default`
pub fn extract_defaults(node: &Value) -> Option<Value> {
    if let Some(properties) = node.get("properties").and_then(Value::as_object) {
        let defaults: Map<String, Value> = properties
            .iter()
            .filter_map(|(name, child)| Some((name.clone(), extract_defaults(child)?)))
            .collect();
        return Some(Value::Object(defaults));
    }
    node.get("default").cloned()
}

fn collect_secret_paths(node: &Value, prefix: &str, paths: &mut Vec<String>) {
    let Some(properties) = node.get("properties").and_then(Value::as_object) else {
        return;
    };
    for (name, child) in properties {
        let path = join(prefix, name);
        if is_category(child) {
            collect_secret_paths(child, &path, paths);
        } else if child.get("secret").and_then(Value::as_bool) == Some(true) {
            paths.push(path);
        }
    }
}

/// Replace secret values in `value` with [`SECRET_PLACEHOLDER`].
///
/// `value` is the subtree at `base_key`; secret paths outside it are ignored.
/// Null and empty-string secrets are left as they are, so an unset secret
/// still reads as unset.
pub fn mask_secrets(mut value: Value, base_key: &str, secret_paths: &[String]) -> Value {
    for path in secret_paths {
        let relative = if base_key.is_empty() {
            Some(path.as_str())
        } else if path == base_key {
            Some("")
        } else {
            path.strip_prefix(base_key).and_then(|rest| rest.strip_prefix('.'))
        };

        let Some(relative) = relative else {
            continue;
        };
        if let Some(target) = lookup_mut(&mut value, relative) {
            if is_maskable(target) {
                *target = Value::String(SECRET_PLACEHOLDER.to_string());
            }
        }
    }
    value
}

fn is_maskable(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn lookup_mut<'a>(tree: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    segments(key).try_fold(tree, |node, segment| node.as_object_mut()?.get_mut(segment))
}
