// Validation context
// Carries the breadcrumb path, the shared report and the symbol table while a
// validator tree walks one component instance.

use crate::symbols::{InstanceId, SymbolTable};
use fwgen_diagnostics::{ConfigPath, Diagnostic, ErrorKind, ValidationReport};

/// Marker returned by a validator whose errors were already recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected;

/// Leaf rejection: reason plus an optional "did you mean" hint
#[derive(Debug, Clone, PartialEq)]
pub struct Invalid {
    pub message: String,
    pub suggestion: Option<String>,
}

impl Invalid {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_suggestion_opt(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }
}

pub struct Context<'a> {
    path: ConfigPath,
    report: &'a mut ValidationReport,
    symbols: &'a mut SymbolTable,
    owner: InstanceId,
}

impl<'a> Context<'a> {
    pub fn new(
        path: ConfigPath,
        report: &'a mut ValidationReport,
        symbols: &'a mut SymbolTable,
        owner: InstanceId,
    ) -> Self {
        Self {
            path,
            report,
            symbols,
            owner,
        }
    }

    pub fn path(&self) -> &ConfigPath {
        &self.path
    }

    /// Instance the validated value belongs to
    pub fn owner(&self) -> InstanceId {
        self.owner
    }

    pub fn symbols(&mut self) -> &mut SymbolTable {
        self.symbols
    }

    pub fn error_count(&self) -> usize {
        self.report.error_count()
    }

    /// Run `f` one mapping key deeper
    pub fn at_key<T>(&mut self, key: &str, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push_key(key);
        let out = f(self);
        self.path.pop();
        out
    }

    /// Run `f` one list index deeper
    pub fn at_index<T>(&mut self, index: usize, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push_index(index);
        let out = f(self);
        self.path.pop();
        out
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        self.report.emit(diagnostic);
    }

    /// Record an error at the current path
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) -> Rejected {
        self.report
            .emit(Diagnostic::new(kind, message, self.path.clone()));
        Rejected
    }

    /// Record a leaf rejection as `VALUE_INVALID`
    pub fn invalid(&mut self, invalid: Invalid) -> Rejected {
        self.report.emit(
            Diagnostic::new(ErrorKind::ValueInvalid, invalid.message, self.path.clone())
                .with_suggestion_opt(invalid.suggestion),
        );
        Rejected
    }

    pub fn unknown_key(&mut self, key: &str, valid: &[String]) {
        let path = self.path.key(key);
        self.report.unknown_key(key, path, valid);
    }

    pub fn missing_required(&mut self, key: &str) {
        self.report.missing_required(key, self.path.clone());
    }
}
