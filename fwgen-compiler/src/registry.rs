// Component registry
// Catalog of known component kinds. Plain kinds are keyed by their document
// key (`uart`); platform kinds live under a platform domain and are keyed
// `<domain>.<platform>` (`sensor.ltr501`).

use crate::emitter::ComponentEmitter;
use fwgen_schema::Schema;
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("component kind '{0}' is registered twice")]
    DuplicateKind(String),

    #[error("platform kind '{kind}' names unknown domain '{domain}'")]
    UnknownDomain { kind: String, domain: String },

    #[error("component '{kind}' lists unknown {relation} kind '{target}'")]
    UnknownRelation {
        kind: String,
        relation: &'static str,
        target: String,
    },

    #[error(transparent)]
    Schema(#[from] fwgen_schema::SchemaError),
}

/// One catalog entry
#[derive(Clone)]
pub struct ComponentKind {
    pub name: String,
    pub schema: Schema,
    pub multi_conf: bool,
    /// Instances of a core kind are emitted before every other instance
    pub core: bool,
    pub auto_load: Vec<String>,
    pub depends_on: Vec<String>,
    pub code_owners: Vec<String>,
    pub emitter: Arc<dyn ComponentEmitter>,
}

impl ComponentKind {
    pub fn new(name: &str, schema: Schema, emitter: impl ComponentEmitter + 'static) -> Self {
        Self {
            name: name.to_string(),
            schema,
            multi_conf: false,
            core: false,
            auto_load: Vec::new(),
            depends_on: Vec::new(),
            code_owners: Vec::new(),
            emitter: Arc::new(emitter),
        }
    }

    pub fn with_multi_conf(mut self) -> Self {
        self.multi_conf = true;
        self
    }

    pub fn with_core(mut self) -> Self {
        self.core = true;
        self
    }

    pub fn with_auto_load(mut self, kinds: &[&str]) -> Self {
        self.auto_load.extend(kinds.iter().map(|k| k.to_string()));
        self
    }

    pub fn with_depends_on(mut self, kinds: &[&str]) -> Self {
        self.depends_on.extend(kinds.iter().map(|k| k.to_string()));
        self
    }

    pub fn with_code_owners(mut self, owners: &[&str]) -> Self {
        self.code_owners.extend(owners.iter().map(|o| o.to_string()));
        self
    }

    /// `("sensor", "ltr501")` for platform kinds
    pub fn platform(&self) -> Option<(&str, &str)> {
        self.name.split_once('.')
    }
}

impl fmt::Debug for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentKind")
            .field("name", &self.name)
            .field("multi_conf", &self.multi_conf)
            .field("core", &self.core)
            .field("auto_load", &self.auto_load)
            .field("depends_on", &self.depends_on)
            .field("code_owners", &self.code_owners)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    kinds: IndexMap<String, ComponentKind>,
    domains: IndexSet<String>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a platform domain such as `sensor`
    pub fn register_domain(&mut self, domain: &str) {
        self.domains.insert(domain.to_string());
    }

    pub fn register(&mut self, mut kind: ComponentKind) -> Result<(), RegistryError> {
        if self.kinds.contains_key(&kind.name) {
            return Err(RegistryError::DuplicateKind(kind.name));
        }
        if let Some((domain, _)) = kind.platform() {
            if !self.domains.contains(domain) {
                return Err(RegistryError::UnknownDomain {
                    domain: domain.to_string(),
                    kind: kind.name.clone(),
                });
            }
            // several platforms per domain are always allowed
            kind.multi_conf = true;
        }
        log::trace!("registered component {}", kind.name);
        self.kinds.insert(kind.name.clone(), kind);
        Ok(())
    }

    /// Check that every auto_load/depends_on entry names a registered kind
    pub fn verify(&self) -> Result<(), RegistryError> {
        for kind in self.kinds.values() {
            let relations = kind
                .auto_load
                .iter()
                .map(|t| ("auto_load", t))
                .chain(kind.depends_on.iter().map(|t| ("depends_on", t)));
            for (relation, target) in relations {
                if !self.kinds.contains_key(target) {
                    return Err(RegistryError::UnknownRelation {
                        kind: kind.name.clone(),
                        relation,
                        target: target.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ComponentKind> {
        self.kinds.get(name)
    }

    pub fn is_domain(&self, name: &str) -> bool {
        self.domains.contains(name)
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &ComponentKind> {
        self.kinds.values()
    }

    /// Platform names registered under `domain`
    pub fn platforms(&self, domain: &str) -> Vec<String> {
        self.kinds
            .values()
            .filter_map(|k| k.platform())
            .filter(|(d, _)| *d == domain)
            .map(|(_, p)| p.to_string())
            .collect()
    }

    /// Names accepted as top-level document keys
    pub fn top_level_names(&self) -> Vec<String> {
        self.kinds
            .values()
            .filter(|k| k.platform().is_none())
            .map(|k| k.name.clone())
            .chain(self.domains.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::noop;

    #[test]
    fn test_platform_kinds_are_multi_conf() {
        let mut registry = ComponentRegistry::new();
        registry.register_domain("sensor");
        registry
            .register(ComponentKind::new("sensor.demo", Schema::new(), noop))
            .unwrap();
        assert!(registry.get("sensor.demo").unwrap().multi_conf);
        assert_eq!(registry.platforms("sensor"), vec!["demo".to_string()]);
        assert_eq!(registry.top_level_names(), vec!["sensor".to_string()]);
    }

    #[test]
    fn test_platform_requires_domain() {
        let mut registry = ComponentRegistry::new();
        let err = registry
            .register(ComponentKind::new("switch.demo", Schema::new(), noop))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownDomain { .. }));
    }

    #[test]
    fn test_duplicate_kind() {
        let mut registry = ComponentRegistry::new();
        registry
            .register(ComponentKind::new("bus", Schema::new(), noop))
            .unwrap();
        let err = registry
            .register(ComponentKind::new("bus", Schema::new(), noop))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateKind("bus".into()));
    }

    #[test]
    fn test_verify_relations() {
        let mut registry = ComponentRegistry::new();
        registry
            .register(ComponentKind::new("dev", Schema::new(), noop).with_depends_on(&["bus"]))
            .unwrap();
        assert!(matches!(
            registry.verify(),
            Err(RegistryError::UnknownRelation { relation: "depends_on", .. })
        ));
        registry
            .register(ComponentKind::new("bus", Schema::new(), noop))
            .unwrap();
        assert!(registry.verify().is_ok());
    }
}
