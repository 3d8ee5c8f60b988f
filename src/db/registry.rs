//! Named data source registry.
//!
//! Resolves source ids to data sources and serves cached schema text for them.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use super::{open_source, DataSource, SchemaProvider};
use crate::config::Config;
use crate::error::{QueryMendError, Result};

/// Summary of a registered source, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub location: String,
    pub description: String,
    pub active: bool,
}

struct Entry {
    source: Arc<dyn DataSource>,
    description: String,
}

/// Registry of named data sources with a per-source schema cache.
#[derive(Default)]
pub struct SourceRegistry {
    entries: BTreeMap<String, Entry>,
    active: Option<String>,
    schema_cache: Mutex<HashMap<String, String>>,
}

impl SourceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from the `[sources]` table of the config.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for (name, source_config) in &config.sources {
            registry.register(
                name.clone(),
                open_source(source_config),
                source_config.description.clone(),
            );
        }
        registry.active = config.active_source.clone();
        registry
    }

    /// Adds or replaces a source, dropping any cached schema for it.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        source: Arc<dyn DataSource>,
        description: impl Into<String>,
    ) {
        let name = name.into();
        self.invalidate_schema(&name);
        self.entries.insert(
            name,
            Entry {
                source,
                description: description.into(),
            },
        );
    }

    /// Returns the data source registered under `name`.
    pub fn data_source(&self, name: &str) -> Result<Arc<dyn DataSource>> {
        self.entries
            .get(name)
            .map(|e| Arc::clone(&e.source))
            .ok_or_else(|| QueryMendError::SourceNotFound(name.to_string()))
    }

    /// Lists all sources in name order.
    pub fn list(&self) -> Vec<SourceSummary> {
        self.entries
            .iter()
            .map(|(name, entry)| SourceSummary {
                name: name.clone(),
                location: entry.source.location(),
                description: entry.description.clone(),
                active: self.active.as_deref() == Some(name.as_str()),
            })
            .collect()
    }

    /// Returns true if no sources are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets the cached schema text for `name`.
    pub fn invalidate_schema(&self, name: &str) {
        if let Ok(mut cache) = self.schema_cache.lock() {
            cache.remove(name);
        }
    }

    fn cached_schema(&self, name: &str) -> Option<String> {
        self.schema_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(name).cloned())
    }
}

#[async_trait]
impl SchemaProvider for SourceRegistry {
    async fn get_schema(&self, source_id: &str) -> Result<String> {
        if let Some(text) = self.cached_schema(source_id) {
            debug!(source = source_id, "Schema cache hit");
            return Ok(text);
        }

        let source = self.data_source(source_id)?;
        let schema = source.introspect_schema().await.map_err(|e| match e {
            QueryMendError::Connection(_) => e,
            other => QueryMendError::connection(other.to_string()),
        })?;
        let text = schema.format_schema_text();
        info!(
            source = source_id,
            tables = schema.tables.len(),
            "Loaded schema"
        );

        if let Ok(mut cache) = self.schema_cache.lock() {
            cache.insert(source_id.to_string(), text.clone());
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::db::{Column, MockDataSource, Schema, Table};

    fn mock_with_table() -> Arc<MockDataSource> {
        Arc::new(MockDataSource::new().with_schema(Schema {
            tables: vec![Table::new("sales").with_column(Column::new("amount", "REAL"))],
        }))
    }

    #[tokio::test]
    async fn test_get_schema_caches_text() {
        let mock = mock_with_table();
        let mut registry = SourceRegistry::new();
        registry.register("sales", mock.clone(), "");

        let first = registry.get_schema("sales").await.unwrap();
        let second = registry.get_schema("sales").await.unwrap();

        assert_eq!(first, "Table: sales\n  - amount (REAL, NULL)");
        assert_eq!(first, second);
        assert_eq!(mock.introspection_count(), 1);

        registry.invalidate_schema("sales");
        registry.get_schema("sales").await.unwrap();
        assert_eq!(mock.introspection_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_source_not_found() {
        let registry = SourceRegistry::new();
        let err = registry.get_schema("missing").await.unwrap_err();
        assert!(matches!(err, QueryMendError::SourceNotFound(ref id) if id == "missing"));
        assert!(registry.data_source("missing").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_source_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.sources.insert(
            "gone".to_string(),
            SourceConfig::sqlite(dir.path().join("gone.db")),
        );
        let registry = SourceRegistry::from_config(&config);

        let err = registry.get_schema("gone").await.unwrap_err();
        assert!(matches!(err, QueryMendError::Connection(_)));
    }

    #[test]
    fn test_list_marks_active_source() {
        let mut config = Config::default();
        config.sources.insert(
            "b".to_string(),
            SourceConfig::sqlite("b.db").with_description("second"),
        );
        config
            .sources
            .insert("a".to_string(), SourceConfig::sqlite("a.db"));
        config.active_source = Some("b".to_string());

        let listing = SourceRegistry::from_config(&config).list();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].name, "a");
        assert!(!listing[0].active);
        assert_eq!(listing[1].description, "second");
        assert_eq!(listing[1].location, "sqlite: b.db");
        assert!(listing[1].active);
    }
}
