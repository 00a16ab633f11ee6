// Symbol registry
// Two-phase id handling: declarations and pending references are collected
// while schemas run, then `resolve_all` links every reference to a declaration
// and yields the instance-level reference edges.

use fwgen_diagnostics::{fuzzy, ConfigPath, Diagnostic, ErrorKind};
use fwgen_value::setting::IdNames;
use fwgen_value::{DeclId, RefId};
use log::{debug, trace};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Component instance handle, the position of the instance in its session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub usize);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of thing an id names: a short kind name used for generated ids, the
/// native class it stands for and the classes it can stand in for.
#[derive(Debug)]
pub struct IdType {
    pub name: &'static str,
    pub class: &'static str,
    pub parents: &'static [&'static IdType],
}

impl IdType {
    pub const fn new(
        name: &'static str,
        class: &'static str,
        parents: &'static [&'static IdType],
    ) -> Self {
        Self {
            name,
            class,
            parents,
        }
    }

    /// True when this type is `other` or descends from it
    pub fn inherits(&self, other: &IdType) -> bool {
        self == other || self.parents.iter().any(|p| p.inherits(other))
    }
}

impl PartialEq for IdType {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class
    }
}

impl Eq for IdType {}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class)
    }
}

#[derive(Debug, Clone)]
pub struct Declaration {
    /// User-given or minted name; `None` until minted
    pub name: Option<String>,
    pub manual: bool,
    pub ty: &'static IdType,
    pub owner: InstanceId,
    pub path: ConfigPath,
}

#[derive(Debug, Clone)]
pub struct Reference {
    /// Referenced name; `None` asks for the first compatible declaration
    pub name: Option<String>,
    pub expected: &'static IdType,
    pub owner: InstanceId,
    pub path: ConfigPath,
    pub resolved: Option<DeclId>,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    declarations: Vec<Declaration>,
    references: Vec<Reference>,
    by_name: HashMap<String, DeclId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id. A missing name is minted during `resolve_all`.
    pub fn declare(
        &mut self,
        name: Option<&str>,
        ty: &'static IdType,
        owner: InstanceId,
        path: ConfigPath,
    ) -> Result<DeclId, Diagnostic> {
        let id = DeclId(self.declarations.len());

        if let Some(name) = name {
            if let Some(previous) = self.by_name.get(name) {
                let mut diagnostic = Diagnostic::new(
                    ErrorKind::DuplicateId,
                    format!("ID {} redefined!", name),
                    path,
                );
                if let Some(first) = self.declarations.get(previous.0) {
                    diagnostic =
                        diagnostic.with_note(format!("first declared at {}", first.path));
                }
                return Err(diagnostic);
            }
            self.by_name.insert(name.to_string(), id);
        }

        trace!("declare {} {:?} ({}) for {}", id, name, ty.class, owner);
        self.declarations.push(Declaration {
            name: name.map(str::to_string),
            manual: name.is_some(),
            ty,
            owner,
            path,
        });
        Ok(id)
    }

    /// Queue a reference; never fails here
    pub fn reference(
        &mut self,
        name: Option<&str>,
        expected: &'static IdType,
        owner: InstanceId,
        path: ConfigPath,
    ) -> RefId {
        let id = RefId(self.references.len());
        trace!("reference {} {:?} ({}) from {}", id, name, expected.class, owner);
        self.references.push(Reference {
            name: name.map(str::to_string),
            expected,
            owner,
            path,
            resolved: None,
        });
        id
    }

    /// Give every anonymous declaration a `<kind>_<n>` name, `n` starting at 1
    /// and skipping names already taken.
    pub fn mint_names(&mut self) {
        let mut taken: HashSet<String> = self.by_name.keys().cloned().collect();
        let mut next: HashMap<&'static str, usize> = HashMap::new();

        for (index, decl) in self.declarations.iter_mut().enumerate() {
            if decl.name.is_some() {
                continue;
            }
            let counter = next.entry(decl.ty.name).or_insert(1);
            let name = loop {
                let candidate = format!("{}_{}", decl.ty.name, counter);
                *counter += 1;
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };
            trace!("minted {} for decl#{}", name, index);
            taken.insert(name.clone());
            self.by_name.insert(name.clone(), DeclId(index));
            decl.name = Some(name);
        }
    }

    /// Link every pending reference, failing on the first fault.
    /// Returns (referrer, referent) instance edges in reference order.
    pub fn resolve_all(&mut self) -> Result<Vec<(InstanceId, InstanceId)>, Diagnostic> {
        self.mint_names();

        let mut edges = Vec::new();
        for index in 0..self.references.len() {
            let Some(reference) = self.references.get(index) else {
                continue;
            };
            let target = self.lookup(reference)?;
            let Some(decl) = self.declarations.get(target.0) else {
                continue;
            };

            let edge = (reference.owner, decl.owner);
            debug!(
                "resolved ref#{} {} -> {}",
                index,
                decl.name.as_deref().unwrap_or_default(),
                decl.owner
            );
            if !edges.contains(&edge) {
                edges.push(edge);
            }
            if let Some(reference) = self.references.get_mut(index) {
                reference.resolved = Some(target);
            }
        }
        Ok(edges)
    }

    fn lookup(&self, reference: &Reference) -> Result<DeclId, Diagnostic> {
        let Some(name) = reference.name.as_deref() else {
            return self
                .declarations
                .iter()
                .position(|d| d.ty.inherits(reference.expected))
                .map(DeclId)
                .ok_or_else(|| {
                    Diagnostic::new(
                        ErrorKind::UnresolvedId,
                        format!(
                            "Couldn't find any component that can be used for '{}'. Are you missing a hub declaration?",
                            reference.expected
                        ),
                        reference.path.clone(),
                    )
                });
        };

        let Some(&target) = self.by_name.get(name) else {
            let candidates: Vec<String> = self
                .declarations
                .iter()
                .filter(|d| d.ty.inherits(reference.expected))
                .filter_map(|d| d.name.clone())
                .collect();
            return Err(Diagnostic::new(
                ErrorKind::UnresolvedId,
                format!(
                    "Couldn't find ID '{}'. Please check you have defined an ID with that name in your configuration.",
                    name
                ),
                reference.path.clone(),
            )
            .with_suggestion_opt(fuzzy::closest(name, &candidates)));
        };

        match self.declarations.get(target.0) {
            Some(decl) if !decl.ty.inherits(reference.expected) => Err(Diagnostic::new(
                ErrorKind::KindMismatch,
                format!(
                    "ID '{}' of type {} doesn't inherit from {}. Please double check your ID is pointing to the correct value",
                    name, decl.ty, reference.expected
                ),
                reference.path.clone(),
            )
            .with_note(format!("'{}' is declared at {}", name, decl.path))),
            _ => Ok(target),
        }
    }

    pub fn declaration(&self, id: DeclId) -> Option<&Declaration> {
        self.declarations.get(id.0)
    }

    pub fn reference_record(&self, id: RefId) -> Option<&Reference> {
        self.references.get(id.0)
    }

    /// Declaration a resolved reference points at
    pub fn target(&self, id: RefId) -> Option<DeclId> {
        self.references.get(id.0).and_then(|r| r.resolved)
    }

    pub fn declarations(&self) -> impl Iterator<Item = (DeclId, &Declaration)> {
        self.declarations
            .iter()
            .enumerate()
            .map(|(i, d)| (DeclId(i), d))
    }

    pub fn references(&self) -> impl Iterator<Item = (RefId, &Reference)> {
        self.references
            .iter()
            .enumerate()
            .map(|(i, r)| (RefId(i), r))
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

impl IdNames for SymbolTable {
    fn declared_name(&self, id: DeclId) -> String {
        self.declaration(id)
            .and_then(|d| d.name.clone())
            .unwrap_or_default()
    }

    fn referenced_name(&self, id: RefId) -> String {
        match self.target(id) {
            Some(target) => self.declared_name(target),
            None => self
                .reference_record(id)
                .and_then(|r| r.name.clone())
                .unwrap_or_default(),
        }
    }
}
