// Diagnostics for the fwgen configuration pipeline
// Every fault is data: a kind from a closed taxonomy, a message, the document
// path it refers to and an optional "did you mean" suggestion.

use colored::Colorize;
use serde::Serialize;
use std::fmt;

// Breadcrumb tracking module
pub mod path;
pub use path::{ConfigPath, PathSegment};

/// Closed error taxonomy of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // Leaf validators
    ValueInvalid,
    // Mapping schemas
    MissingRequired,
    UnknownKey,
    ExclusiveConflict,
    OneOfViolation,
    // Symbol registry
    DuplicateId,
    UnresolvedId,
    KindMismatch,
    // Component registry
    UnknownComponent,
    DuplicateSingleton,
    MissingDependency,
    // Resolver
    CircularDependency,
    // Emission
    LibraryVersionConflict,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 13] = [
        ErrorKind::ValueInvalid,
        ErrorKind::MissingRequired,
        ErrorKind::UnknownKey,
        ErrorKind::ExclusiveConflict,
        ErrorKind::OneOfViolation,
        ErrorKind::DuplicateId,
        ErrorKind::UnresolvedId,
        ErrorKind::KindMismatch,
        ErrorKind::UnknownComponent,
        ErrorKind::DuplicateSingleton,
        ErrorKind::MissingDependency,
        ErrorKind::CircularDependency,
        ErrorKind::LibraryVersionConflict,
    ];

    /// Stable code for machine consumers
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::ValueInvalid => error_codes::VALUE_INVALID,
            ErrorKind::MissingRequired => error_codes::MISSING_REQUIRED,
            ErrorKind::UnknownKey => error_codes::UNKNOWN_KEY,
            ErrorKind::ExclusiveConflict => error_codes::EXCLUSIVE_CONFLICT,
            ErrorKind::OneOfViolation => error_codes::ONE_OF_VIOLATION,
            ErrorKind::DuplicateId => error_codes::DUPLICATE_ID,
            ErrorKind::UnresolvedId => error_codes::UNRESOLVED_ID,
            ErrorKind::KindMismatch => error_codes::KIND_MISMATCH,
            ErrorKind::UnknownComponent => error_codes::UNKNOWN_COMPONENT,
            ErrorKind::DuplicateSingleton => error_codes::DUPLICATE_SINGLETON,
            ErrorKind::MissingDependency => error_codes::MISSING_DEPENDENCY,
            ErrorKind::CircularDependency => error_codes::CIRCULAR_DEPENDENCY,
            ErrorKind::LibraryVersionConflict => error_codes::LIBRARY_VERSION_CONFLICT,
        }
    }

    /// Upper-case taxonomy name, e.g. `UNRESOLVED_ID`
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::ValueInvalid => "VALUE_INVALID",
            ErrorKind::MissingRequired => "MISSING_REQUIRED",
            ErrorKind::UnknownKey => "UNKNOWN_KEY",
            ErrorKind::ExclusiveConflict => "EXCLUSIVE_CONFLICT",
            ErrorKind::OneOfViolation => "ONE_OF_VIOLATION",
            ErrorKind::DuplicateId => "DUPLICATE_ID",
            ErrorKind::UnresolvedId => "UNRESOLVED_ID",
            ErrorKind::KindMismatch => "KIND_MISMATCH",
            ErrorKind::UnknownComponent => "UNKNOWN_COMPONENT",
            ErrorKind::DuplicateSingleton => "DUPLICATE_SINGLETON",
            ErrorKind::MissingDependency => "MISSING_DEPENDENCY",
            ErrorKind::CircularDependency => "CIRCULAR_DEPENDENCY",
            ErrorKind::LibraryVersionConflict => "LIBRARY_VERSION_CONFLICT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Structured diagnostic message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
    pub path: ConfigPath,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, message: impl Into<String>, path: ConfigPath) -> Self {
        Self {
            kind,
            code: kind.code(),
            message: message.into(),
            path,
            notes: Vec::new(),
            suggestion: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach a suggestion only when one was found
    pub fn with_suggestion_opt(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }

    /// Format diagnostic in compiler style
    pub fn format(&self) -> String {
        let mut output = String::new();

        // Header: error[E201] UNRESOLVED_ID: message
        output.push_str(&format!(
            "{}[{}] {}: {}\n",
            "error".red().bold(),
            self.code,
            self.kind.name(),
            self.message.bold()
        ));

        // Location: --> dev.bus_id
        output.push_str(&format!(" {} {}\n", "-->".cyan().bold(), self.path));

        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }

        if let Some(suggestion) = &self.suggestion {
            output.push_str(&format!(
                " {} did you mean `{}`?\n",
                "help:".green().bold(),
                suggestion
            ));
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.path, self.message, self.kind)
    }
}

/// Aggregated result of a failed pipeline run
#[derive(Debug, Default, Clone, PartialEq, thiserror::Error)]
#[error("configuration is invalid: {} error(s)", .diagnostics.len())]
pub struct ValidationReport {
    diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn emit_error(&mut self, kind: ErrorKind, message: impl Into<String>, path: ConfigPath) {
        self.emit(Diagnostic::new(kind, message, path));
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.len()
    }

    /// Number of diagnostics of one kind
    pub fn count(&self, kind: ErrorKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Render every diagnostic plus a summary line
    pub fn render(&self) -> String {
        let mut output = String::new();
        for diag in &self.diagnostics {
            output.push_str(&diag.format());
            output.push('\n');
        }
        if let Some(summary) = self.summary() {
            output.push_str(&summary);
            output.push('\n');
        }
        output
    }

    /// Print all diagnostics to stderr
    pub fn print_all(&self) {
        for diag in &self.diagnostics {
            eprintln!("{}", diag.format());
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        if let Some(summary) = self.summary() {
            eprintln!("\n{}", summary);
        }
    }

    fn summary(&self) -> Option<String> {
        let count = self.error_count();
        if count == 0 {
            return None;
        }
        Some(format!(
            "{}: aborting due to {} error{}",
            "error".red().bold(),
            count,
            if count == 1 { "" } else { "s" }
        ))
    }

    /// Export diagnostics as JSON for editors and CI
    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Payload<'a> {
            error_count: usize,
            diagnostics: &'a [Diagnostic],
        }

        serde_json::to_string_pretty(&Payload {
            error_count: self.error_count(),
            diagnostics: &self.diagnostics,
        })
    }
}

impl From<Diagnostic> for ValidationReport {
    fn from(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostics: vec![diagnostic],
        }
    }
}

/// Helper functions for common diagnostic patterns
impl ValidationReport {
    /// Unknown mapping key with "did you mean?" suggestion
    pub fn unknown_key(&mut self, key: &str, path: ConfigPath, valid: &[String]) {
        self.emit(
            Diagnostic::new(
                ErrorKind::UnknownKey,
                format!("[{}] is an invalid option", key),
                path,
            )
            .with_suggestion_opt(fuzzy::closest(key, valid)),
        );
    }

    /// Required key absent from a mapping
    pub fn missing_required(&mut self, key: &str, path: ConfigPath) {
        self.emit(Diagnostic::new(
            ErrorKind::MissingRequired,
            format!("required key not provided: '{}'", key),
            path,
        ));
    }
}

/// Stable codes, grouped by phase
pub mod error_codes {
    // Validation errors (E1xx)
    pub const VALUE_INVALID: &str = "E101";
    pub const MISSING_REQUIRED: &str = "E102";
    pub const UNKNOWN_KEY: &str = "E103";
    pub const EXCLUSIVE_CONFLICT: &str = "E104";
    pub const ONE_OF_VIOLATION: &str = "E105";

    // Symbol errors (E2xx)
    pub const DUPLICATE_ID: &str = "E201";
    pub const UNRESOLVED_ID: &str = "E202";
    pub const KIND_MISMATCH: &str = "E203";

    // Component errors (E3xx)
    pub const UNKNOWN_COMPONENT: &str = "E301";
    pub const DUPLICATE_SINGLETON: &str = "E302";
    pub const MISSING_DEPENDENCY: &str = "E303";

    // Resolution and emission errors (E4xx)
    pub const CIRCULAR_DEPENDENCY: &str = "E401";
    pub const LIBRARY_VERSION_CONFLICT: &str = "E402";
}

/// Near-miss lookup for option keys, component kinds, platforms and ids
pub mod fuzzy {
    use strsim::jaro_winkler;

    /// Similarity a candidate must exceed before it is offered
    pub const MIN_SIMILARITY: f64 = 0.8;

    /// Case-blind, with `-` read as `_` (`Baud-Rate` matches `baud_rate`)
    fn normalize(name: &str) -> String {
        name.to_ascii_lowercase().replace('-', "_")
    }

    /// The candidate most similar to `typed`, if it is close enough.
    /// Ties keep the first candidate, so registry order decides.
    pub fn closest(typed: &str, candidates: &[String]) -> Option<String> {
        let typed = normalize(typed);
        let mut best: Option<(&String, f64)> = None;
        for candidate in candidates {
            let score = jaro_winkler(&typed, &normalize(candidate));
            if score <= MIN_SIMILARITY {
                continue;
            }
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((candidate, score));
            }
        }
        best.map(|(name, _)| name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_format() {
        let diag = Diagnostic::new(
            ErrorKind::UnresolvedId,
            "Couldn't find ID 'missing'",
            ConfigPath::from_keys(&["dev", "bus_id"]),
        )
        .with_note("declared ids: b")
        .with_suggestion("b");

        let formatted = diag.format();
        assert!(formatted.contains("[E202]"));
        assert!(formatted.contains("Couldn't find ID 'missing'"));
        assert!(formatted.contains("dev.bus_id"));
        assert!(formatted.contains("declared ids: b"));
    }

    #[test]
    fn test_report_counts() {
        let mut report = ValidationReport::new();
        assert!(!report.has_errors());

        report.missing_required("baud_rate", ConfigPath::from_keys(&["uart"]));
        report.emit_error(
            ErrorKind::ValueInvalid,
            "bad",
            ConfigPath::from_keys(&["uart", "parity"]),
        );
        assert_eq!(report.error_count(), 2);
        assert_eq!(report.count(ErrorKind::MissingRequired), 1);
        assert_eq!(report.to_string(), "configuration is invalid: 2 error(s)");
        assert!(report.has_errors());
    }

    #[test]
    fn test_unknown_key_suggestion() {
        let mut report = ValidationReport::new();
        let valid = vec!["frequency".to_string(), "scan".to_string()];
        report.unknown_key("frequncy", ConfigPath::from_keys(&["i2c", "frequncy"]), &valid);
        let diag = &report.diagnostics()[0];
        assert_eq!(diag.kind, ErrorKind::UnknownKey);
        assert_eq!(diag.suggestion.as_deref(), Some("frequency"));
    }

    #[test]
    fn test_fuzzy_no_match_for_unrelated() {
        let valid = vec!["sda".to_string(), "scl".to_string()];
        assert_eq!(fuzzy::closest("baud_rate", &valid), None);
    }

    #[test]
    fn test_fuzzy_reads_dash_as_underscore() {
        let valid = vec!["update_interval".to_string(), "address".to_string()];
        assert_eq!(
            fuzzy::closest("Update-Interval", &valid).as_deref(),
            Some("update_interval")
        );
    }

    #[test]
    fn test_fuzzy_picks_best_scoring_kind() {
        let kinds = vec!["uart".to_string(), "i2c".to_string(), "spi".to_string()];
        assert_eq!(fuzzy::closest("uarte", &kinds).as_deref(), Some("uart"));
        assert_eq!(fuzzy::closest("", &kinds), None);
    }

    #[test]
    fn test_every_kind_has_distinct_code() {
        let mut codes: Vec<_> = ErrorKind::ALL.iter().map(|k| k.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), ErrorKind::ALL.len());
    }
}
