//! Capability registry
//!
//! Resolves the textual `type` of a configuration block to a concrete
//! implementation: inventory sources, storage sinks and command-models.
//! Construction tables are populated at startup; there is no reflective
//! lookup. Resolution is idempotent per type for the process lifetime:
//! the first successful construction is cached and later calls return the
//! cached instance, ignoring any configuration differences. Call
//! [`PluginRegistry::reset`] after a configuration change to rebuild.

use crate::models::{builtin_models, DeviceModel, ModelEntry};
use crate::sinks::{FilesystemSink, StorageSink};
use crate::sources::{InventorySource, StaticSource};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Which of the three pluggable roles a type name was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    InventorySource,
    StorageSink,
    CommandModel,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityKind::InventorySource => write!(f, "inventory source"),
            CapabilityKind::StorageSink => write!(f, "storage sink"),
            CapabilityKind::CommandModel => write!(f, "command-model"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no {kind} implementation registered for type '{type_name}'")]
    UnknownCapability {
        kind: CapabilityKind,
        type_name: String,
    },

    #[error("failed to construct {kind} '{type_name}': {source}")]
    Construction {
        kind: CapabilityKind,
        type_name: String,
        #[source]
        source: anyhow::Error,
    },
}

type SourceFactory = fn(&toml::Value) -> anyhow::Result<Arc<dyn InventorySource>>;
type SinkFactory = fn(&toml::Value) -> anyhow::Result<Arc<dyn StorageSink>>;

pub struct PluginRegistry {
    source_factories: HashMap<&'static str, SourceFactory>,
    sink_factories: HashMap<&'static str, SinkFactory>,
    models: Vec<ModelEntry>,

    source_cache: RwLock<HashMap<String, Arc<dyn InventorySource>>>,
    sink_cache: RwLock<HashMap<String, Arc<dyn StorageSink>>>,
    model_cache: RwLock<HashMap<String, Arc<dyn DeviceModel>>>,
}

impl PluginRegistry {
    /// Registry with every implementation shipped in this crate.
    pub fn with_builtins() -> Self {
        let mut source_factories: HashMap<&'static str, SourceFactory> = HashMap::new();
        source_factories.insert("static", |cfg| {
            Ok(Arc::new(StaticSource::from_config(cfg)?) as Arc<dyn InventorySource>)
        });

        let mut sink_factories: HashMap<&'static str, SinkFactory> = HashMap::new();
        sink_factories.insert("filesystem", |cfg| {
            Ok(Arc::new(FilesystemSink::from_config(cfg)?) as Arc<dyn StorageSink>)
        });

        Self {
            source_factories,
            sink_factories,
            models: builtin_models(),
            source_cache: RwLock::new(HashMap::new()),
            sink_cache: RwLock::new(HashMap::new()),
            model_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve an inventory source by type name, constructing it on first
    /// use.
    pub fn resolve_source(
        &self,
        type_name: &str,
        config: &toml::Value,
    ) -> Result<Arc<dyn InventorySource>, RegistryError> {
        if let Some(cached) = self.source_cache.read().unwrap().get(type_name) {
            return Ok(Arc::clone(cached));
        }

        let factory = self.source_factories.get(type_name).ok_or_else(|| {
            RegistryError::UnknownCapability {
                kind: CapabilityKind::InventorySource,
                type_name: type_name.to_string(),
            }
        })?;

        let instance = factory(config).map_err(|source| RegistryError::Construction {
            kind: CapabilityKind::InventorySource,
            type_name: type_name.to_string(),
            source,
        })?;

        debug!("constructed inventory source '{}'", type_name);
        self.source_cache
            .write()
            .unwrap()
            .insert(type_name.to_string(), Arc::clone(&instance));
        Ok(instance)
    }

    /// Resolve a storage sink by type name, constructing it on first use.
    pub fn resolve_sink(
        &self,
        type_name: &str,
        config: &toml::Value,
    ) -> Result<Arc<dyn StorageSink>, RegistryError> {
        if let Some(cached) = self.sink_cache.read().unwrap().get(type_name) {
            return Ok(Arc::clone(cached));
        }

        let factory =
            self.sink_factories
                .get(type_name)
                .ok_or_else(|| RegistryError::UnknownCapability {
                    kind: CapabilityKind::StorageSink,
                    type_name: type_name.to_string(),
                })?;

        let instance = factory(config).map_err(|source| RegistryError::Construction {
            kind: CapabilityKind::StorageSink,
            type_name: type_name.to_string(),
            source,
        })?;

        debug!("constructed storage sink '{}'", type_name);
        self.sink_cache
            .write()
            .unwrap()
            .insert(type_name.to_string(), Arc::clone(&instance));
        Ok(instance)
    }

    /// Resolve the command-model for a device type.
    ///
    /// Two stages: direct lookup of a model registered under the exact
    /// device type, then a scan for a model exposing the device type as an
    /// alias (vendor variants map to a canonical base model).
    pub fn resolve_model(&self, device_type: &str) -> Result<Arc<dyn DeviceModel>, RegistryError> {
        if let Some(cached) = self.model_cache.read().unwrap().get(device_type) {
            return Ok(Arc::clone(cached));
        }

        let entry = self
            .models
            .iter()
            .find(|m| m.name == device_type)
            .or_else(|| {
                self.models
                    .iter()
                    .find(|m| m.aliases.contains(&device_type))
            })
            .ok_or_else(|| RegistryError::UnknownCapability {
                kind: CapabilityKind::CommandModel,
                type_name: device_type.to_string(),
            })?;

        let instance = (entry.build)();
        debug!("resolved command-model '{}' for device type '{}'", entry.name, device_type);
        self.model_cache
            .write()
            .unwrap()
            .insert(device_type.to_string(), Arc::clone(&instance));
        Ok(instance)
    }

    /// Drop every cached instance. Required before honoring configuration
    /// changes, since resolution ignores config after first construction.
    pub fn reset(&self) {
        self.source_cache.write().unwrap().clear();
        self.sink_cache.write().unwrap().clear();
        self.model_cache.write().unwrap().clear();
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table(toml_src: &str) -> toml::Value {
        toml::from_str(toml_src).unwrap()
    }

    #[test]
    fn test_unknown_source_type() {
        let registry = PluginRegistry::with_builtins();
        let err = registry.resolve_source("netbox", &table("")).err().unwrap();
        assert!(matches!(err, RegistryError::UnknownCapability { .. }));
        assert!(err.to_string().contains("netbox"));
    }

    #[test]
    fn test_unknown_model_type() {
        let registry = PluginRegistry::with_builtins();
        let err = registry.resolve_model("juniper_junos").err().unwrap();
        assert!(matches!(
            err,
            RegistryError::UnknownCapability {
                kind: CapabilityKind::CommandModel,
                ..
            }
        ));
    }

    #[test]
    fn test_sink_construction_error_for_bad_config() {
        let registry = PluginRegistry::with_builtins();
        // missing required `path`
        let err = registry
            .resolve_sink("filesystem", &table("retention = 3"))
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::Construction { .. }));
    }

    #[test]
    fn test_model_alias_resolves_to_canonical_commands() {
        let registry = PluginRegistry::with_builtins();

        let canonical = registry.resolve_model("cisco_ios").unwrap();
        let alias = registry.resolve_model("cisco_xe").unwrap();
        assert_eq!(canonical.commands(), alias.commands());

        let fortios = registry.resolve_model("fortios").unwrap();
        for alias_name in ["fortigate", "fortinet"] {
            let aliased = registry.resolve_model(alias_name).unwrap();
            assert_eq!(fortios.commands(), aliased.commands());
        }
    }

    #[test]
    fn test_sink_resolution_is_cached_per_type() {
        let temp = TempDir::new().unwrap();
        let registry = PluginRegistry::with_builtins();

        let cfg = table(&format!("path = '{}'", temp.path().display()));
        let first = registry.resolve_sink("filesystem", &cfg).unwrap();

        // Second call with a different (even invalid) config returns the
        // cached instance: construction-once semantics.
        let second = registry.resolve_sink("filesystem", &table("")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_reset_clears_caches() {
        let temp = TempDir::new().unwrap();
        let registry = PluginRegistry::with_builtins();

        let cfg = table(&format!("path = '{}'", temp.path().display()));
        let first = registry.resolve_sink("filesystem", &cfg).unwrap();

        registry.reset();

        let second = registry.resolve_sink("filesystem", &cfg).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_source_construction_and_caching() {
        let registry = PluginRegistry::with_builtins();
        let cfg = table(
            r#"
[[devices]]
name = "sw1"
host = "10.0.0.1"
device_type = "cisco_ios"
"#,
        );

        let first = registry.resolve_source("static", &cfg).unwrap();
        let second = registry.resolve_source("static", &table("")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.devices().unwrap().len(), 1);
    }
}
