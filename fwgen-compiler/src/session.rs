// Processing session
// Everything one document run accumulates: the symbol table, the validated
// instances and the reference edges between them. A fresh session is built
// per document, so nothing leaks between runs.

use crate::registry::ComponentRegistry;
use fwgen_diagnostics::ConfigPath;
use fwgen_schema::{InstanceId, SymbolTable};
use fwgen_value::setting::IdNames;
use fwgen_value::{DeclId, Mapping, Settings, Value};

/// One occurrence of a component kind
#[derive(Debug, Clone)]
pub struct Instance {
    pub id: InstanceId,
    /// Registry key, `uart` or `sensor.ltr501`
    pub kind: String,
    /// Where the instance sits in the document
    pub path: ConfigPath,
    pub config: Settings,
    /// Added by auto-load rather than written by the user
    pub auto_loaded: bool,
}

impl Instance {
    /// The instance's own `id`, if its schema declares one
    pub fn declared_id(&self) -> Option<DeclId> {
        self.config.get_decl("id")
    }

    pub fn platform(&self) -> Option<(&str, &str)> {
        self.kind.split_once('.')
    }
}

#[derive(Debug, Default)]
pub struct Session {
    symbols: SymbolTable,
    instances: Vec<Instance>,
    edges: Vec<(InstanceId, InstanceId)>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        symbols: SymbolTable,
        instances: Vec<Instance>,
        edges: Vec<(InstanceId, InstanceId)>,
    ) -> Self {
        Self {
            symbols,
            instances,
            edges,
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(id.0)
    }

    /// (referrer, referent) pairs from id references
    pub fn edges(&self) -> &[(InstanceId, InstanceId)] {
        &self.edges
    }

    /// Human-readable name: the declared id, else the document path
    pub fn label(&self, id: InstanceId) -> String {
        let Some(instance) = self.instance(id) else {
            return id.to_string();
        };
        match instance.declared_id() {
            Some(decl) => self.symbols.declared_name(decl),
            None => instance.path.to_string(),
        }
    }

    /// Validated configuration as a document, ids resolved to names
    pub fn to_document(&self, registry: &ComponentRegistry) -> Mapping {
        let mut root = Mapping::new();
        for instance in &self.instances {
            let mut body = instance.config.to_mapping(&self.symbols);
            let (key, as_list) = match instance.platform() {
                Some((domain, platform)) => {
                    body.shift_insert(0, "platform".to_string(), Value::from(platform));
                    (domain.to_string(), true)
                }
                None => {
                    let multi = registry
                        .get(&instance.kind)
                        .is_some_and(|kind| kind.multi_conf);
                    (instance.kind.clone(), multi)
                }
            };

            if as_list {
                let entry = root
                    .entry(key)
                    .or_insert_with(|| Value::List(Vec::new()));
                if let Value::List(items) = entry {
                    items.push(Value::Map(body));
                }
            } else {
                root.insert(key, Value::Map(body));
            }
        }
        root
    }
}
