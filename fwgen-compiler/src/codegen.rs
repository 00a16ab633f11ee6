// Emission context
// Accumulates what the component emitters produce: global declarations,
// setup statements, includes, defines and library pins. Variable names for
// every declared id are fixed when the context is created, so emitters can
// look them up in any order.

use crate::cpp::{join_args, Arg};
use fwgen_diagnostics::{ConfigPath, Diagnostic, ErrorKind};
use fwgen_schema::{InstanceId, SymbolTable};
use fwgen_value::{DeclId, RefId};
use indexmap::IndexSet;
use log::{debug, warn};
use std::collections::{BTreeMap, HashSet};

/// One setup statement and the instance that issued it
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub owner: InstanceId,
    pub text: String,
}

/// A library request as recorded in the context
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryPin {
    pub version: Option<String>,
    pub requester: String,
}

impl LibraryPin {
    /// PlatformIO coordinate, `name@version` or bare `name`
    pub fn coordinate(&self, name: &str) -> String {
        match &self.version {
            Some(version) => format!("{}@{}", name, version),
            None => name.to_string(),
        }
    }
}

/// Instance currently being emitted
#[derive(Debug, Clone)]
struct Current {
    id: InstanceId,
    label: String,
    path: ConfigPath,
}

#[derive(Debug, Clone)]
pub struct EmissionContext {
    variables: Vec<String>,
    classes: Vec<&'static str>,
    targets: Vec<Option<DeclId>>,
    taken: HashSet<String>,

    globals: Vec<String>,
    statements: Vec<Statement>,
    includes: IndexSet<String>,
    defines: BTreeMap<String, Option<String>>,
    libraries: BTreeMap<String, LibraryPin>,
    environment: Option<String>,
    platformio_options: BTreeMap<String, String>,
    current: Option<Current>,
}

impl EmissionContext {
    /// Context for a resolved symbol table
    pub fn new(symbols: &SymbolTable) -> Self {
        let mut ctx = Self {
            variables: Vec::with_capacity(symbols.len()),
            classes: Vec::with_capacity(symbols.len()),
            targets: symbols.references().map(|(_, r)| r.resolved).collect(),
            taken: HashSet::new(),
            globals: Vec::new(),
            statements: Vec::new(),
            includes: IndexSet::new(),
            defines: BTreeMap::new(),
            libraries: BTreeMap::new(),
            environment: None,
            platformio_options: BTreeMap::new(),
            current: None,
        };
        for (_, decl) in symbols.declarations() {
            let base = decl.name.clone().unwrap_or_else(|| decl.ty.name.to_string());
            let name = ctx.allocate(&base);
            ctx.variables.push(name);
            ctx.classes.push(decl.ty.class);
        }
        ctx
    }

    /// Reserve a unique variable name derived from `base`
    pub fn allocate(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        let mut n = 2;
        while self.taken.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        self.taken.insert(name.clone());
        name
    }

    pub(crate) fn begin_instance(&mut self, id: InstanceId, label: String, path: ConfigPath) {
        debug!("emitting {} ({})", label, path);
        self.current = Some(Current { id, label, path });
    }

    pub(crate) fn end_instance(&mut self) {
        self.current = None;
    }

    fn owner(&self) -> InstanceId {
        self.current
            .as_ref()
            .map_or(InstanceId(usize::MAX), |c| c.id)
    }

    fn requester(&self) -> (String, ConfigPath) {
        self.current
            .as_ref()
            .map_or(("<core>".to_string(), ConfigPath::root()), |c| {
                (c.label.clone(), c.path.clone())
            })
    }

    /// Variable holding a declared id
    pub fn variable(&self, id: DeclId) -> &str {
        self.variables.get(id.0).map_or("nullptr", String::as_str)
    }

    /// Native class of a declared id
    pub fn class_of(&self, id: DeclId) -> &'static str {
        self.classes.get(id.0).copied().unwrap_or("void")
    }

    /// Variable a resolved reference points at
    pub fn referenced(&self, id: RefId) -> &str {
        match self.targets.get(id.0).copied().flatten() {
            Some(target) => self.variable(target),
            None => "nullptr",
        }
    }

    /// Raw setup statement
    pub fn add(&mut self, statement: impl Into<String>) {
        let text = statement.into();
        debug!("statement: {}", text);
        self.statements.push(Statement {
            owner: self.owner(),
            text,
        });
    }

    /// Raw global declaration
    pub fn add_global(&mut self, declaration: impl Into<String>) {
        let text = declaration.into();
        debug!("global: {}", text);
        self.globals.push(text);
    }

    /// Construct the object behind a declared id: a global pointer plus an
    /// assignment in setup. Returns the variable name.
    pub fn new_variable(&mut self, id: DeclId, args: &[Arg]) -> String {
        let var = self.variable(id).to_string();
        let class = self.class_of(id);
        self.add_global(format!("{} *{}{{nullptr}};", class, var));
        self.add(format!("{} = new {}({});", var, class, join_args(args)));
        var
    }

    /// `var->method(args);`
    pub fn call(&mut self, var: &str, method: &str, args: &[Arg]) {
        self.add(format!("{}->{}({});", var, method, join_args(args)));
    }

    /// `App.register_component(var);`
    pub fn register_component(&mut self, var: &str) {
        self.add(format!("App.register_component({});", var));
    }

    pub fn add_include(&mut self, header: &str) {
        if self.includes.insert(header.to_string()) {
            debug!("include: {}", header);
        }
    }

    pub fn add_define(&mut self, name: &str, value: Option<&str>) {
        match self.defines.get(name) {
            Some(existing) if existing.as_deref() != value => {
                warn!(
                    "define {} already set to {:?}, ignoring {:?}",
                    name, existing, value
                );
            }
            Some(_) => {}
            None => {
                debug!("define: {} {:?}", name, value);
                self.defines
                    .insert(name.to_string(), value.map(str::to_string));
            }
        }
    }

    /// Request a library. An unpinned request never conflicts and is
    /// replaced by a later pin; two different pins are an error naming
    /// both requesters.
    pub fn add_library(&mut self, name: &str, version: Option<&str>) -> Result<(), Diagnostic> {
        let (requester, path) = self.requester();
        let requested = LibraryPin {
            version: version.map(str::to_string),
            requester,
        };

        match self.libraries.get(name) {
            None => {}
            Some(existing) => match (&existing.version, &requested.version) {
                (_, None) => return Ok(()),
                (Some(have), Some(want)) if have == want => return Ok(()),
                (Some(have), Some(want)) => {
                    return Err(Diagnostic::new(
                        ErrorKind::LibraryVersionConflict,
                        format!(
                            "Library '{}' requested at version {} by '{}' and at version {} by '{}'",
                            name, have, existing.requester, want, requested.requester
                        ),
                        path,
                    )
                    .with_note(format!("first requested by '{}'", existing.requester)));
                }
                (None, Some(_)) => {}
            },
        }

        debug!("library: {}", requested.coordinate(name));
        self.libraries.insert(name.to_string(), requested);
        Ok(())
    }

    /// Name of the PlatformIO environment section
    pub fn set_environment(&mut self, name: &str) {
        self.environment = Some(name.to_string());
    }

    /// Plain `key = value` entry of the PlatformIO environment
    pub fn set_platformio_option(&mut self, key: &str, value: impl Into<String>) {
        self.platformio_options.insert(key.to_string(), value.into());
    }

    pub fn environment(&self) -> &str {
        self.environment.as_deref().unwrap_or("firmware")
    }

    pub fn platformio_options(&self) -> &BTreeMap<String, String> {
        &self.platformio_options
    }

    pub fn globals(&self) -> &[String] {
        &self.globals
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.includes.iter().map(String::as_str)
    }

    pub fn defines(&self) -> &BTreeMap<String, Option<String>> {
        &self.defines
    }

    pub fn libraries(&self) -> &BTreeMap<String, LibraryPin> {
        &self.libraries
    }

    /// Sorted `name@version` coordinates
    pub fn lib_deps(&self) -> Vec<String> {
        self.libraries
            .iter()
            .map(|(name, pin)| pin.coordinate(name))
            .collect()
    }

    /// Index of the first statement issued by `owner`
    pub fn first_statement_of(&self, owner: InstanceId) -> Option<usize> {
        self.statements.iter().position(|s| s.owner == owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwgen_schema::IdType;

    static BUS: IdType = IdType::new("bus", "Bus", &[]);

    fn context() -> (EmissionContext, DeclId) {
        let mut symbols = SymbolTable::new();
        let id = symbols
            .declare(Some("b"), &BUS, InstanceId(0), ConfigPath::from_keys(&["bus", "id"]))
            .unwrap();
        symbols.resolve_all().unwrap();
        (EmissionContext::new(&symbols), id)
    }

    #[test]
    fn test_new_variable_declares_global() {
        let (mut ctx, id) = context();
        ctx.begin_instance(InstanceId(0), "b".into(), ConfigPath::from_keys(&["bus"]));
        let var = ctx.new_variable(id, &[Arg::Int(9600)]);
        ctx.register_component(&var);

        assert_eq!(ctx.globals(), &["Bus *b{nullptr};".to_string()]);
        let texts: Vec<_> = ctx.statements().iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["b = new Bus(9600);", "App.register_component(b);"]);
        assert_eq!(ctx.first_statement_of(InstanceId(0)), Some(0));
    }

    #[test]
    fn test_helper_names_are_unique() {
        let (mut ctx, _) = context();
        assert_eq!(ctx.allocate("b"), "b_2");
        assert_eq!(ctx.allocate("b"), "b_3");
        assert_eq!(ctx.allocate("filter"), "filter");
    }

    #[test]
    fn test_includes_deduplicate_in_order() {
        let (mut ctx, _) = context();
        ctx.add_include("b.h");
        ctx.add_include("a.h");
        ctx.add_include("b.h");
        assert_eq!(ctx.includes().collect::<Vec<_>>(), vec!["b.h", "a.h"]);
    }

    #[test]
    fn test_library_merge_rules() {
        let (mut ctx, _) = context();
        ctx.begin_instance(InstanceId(0), "a".into(), ConfigPath::from_keys(&["a"]));
        ctx.add_library("L", None).unwrap();
        ctx.add_library("L", Some("1.0")).unwrap();
        ctx.add_library("L", None).unwrap();
        ctx.add_library("L", Some("1.0")).unwrap();
        assert_eq!(ctx.lib_deps(), vec!["L@1.0".to_string()]);

        ctx.begin_instance(InstanceId(1), "b".into(), ConfigPath::from_keys(&["b"]));
        let err = ctx.add_library("L", Some("2.0")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::LibraryVersionConflict);
        assert!(err.message.contains("'a'"));
        assert!(err.message.contains("'b'"));
    }

    #[test]
    fn test_defines_sorted() {
        let (mut ctx, _) = context();
        ctx.add_define("USE_UART", None);
        ctx.add_define("USE_I2C", None);
        ctx.add_define("BAUD", Some("9600"));
        let names: Vec<_> = ctx.defines().keys().cloned().collect();
        assert_eq!(names, vec!["BAUD", "USE_I2C", "USE_UART"]);
    }
}
