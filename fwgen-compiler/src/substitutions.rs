// Substitutions
// A top-level `substitutions:` mapping defines text variables. `$name` and
// `${name}` inside string values, lambda bodies and mapping keys are replaced
// before any component sees the document.

use fwgen_diagnostics::{fuzzy, ConfigPath, Diagnostic, ErrorKind, ValidationReport};
use fwgen_value::{Document, Mapping, Value};
use indexmap::IndexMap;
use log::{debug, warn};
use regex::Regex;
use std::sync::OnceLock;

/// Document key holding the variables
pub const KEY: &str = "substitutions";

static VARIABLE: OnceLock<Option<Regex>> = OnceLock::new();

fn variable_pattern() -> Option<&'static Regex> {
    VARIABLE
        .get_or_init(|| Regex::new(r"\$([A-Za-z0-9_]+|\{[A-Za-z0-9_]+\})").ok())
        .as_ref()
}

/// `[A-Za-z0-9_]+`, not starting with a digit
pub fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Set variables given outside the document; they win over the document's own
pub fn add_overrides(document: &mut Document, overrides: &[(String, String)]) {
    if overrides.is_empty() {
        return;
    }
    let section = document
        .root
        .entry(KEY.to_string())
        .or_insert_with(Value::empty_map);
    if section.is_null() {
        *section = Value::empty_map();
    }
    let Value::Map(variables) = section else {
        // reported by `substitute`
        return;
    };
    for (name, value) in overrides {
        debug!("substitution override {} = {}", name, value);
        variables.insert(name.clone(), Value::String(value.clone()));
    }
}

/// Copy of `document` with the substitutions section removed and every
/// variable replaced
pub fn substitute(document: &Document, report: &mut ValidationReport) -> Document {
    let mut root = document.root.clone();
    let Some(section) = root.shift_remove(KEY) else {
        return Document { root };
    };

    let variables = variables(&section, report);
    debug!("substituting {} variable(s)", variables.len());
    let mut pass = Pass {
        names: variables.keys().cloned().collect(),
        variables,
        report,
    };
    let root = pass.mapping(&root, &ConfigPath::root());
    Document { root }
}

fn variables(section: &Value, report: &mut ValidationReport) -> IndexMap<String, String> {
    let path = ConfigPath::root().key(KEY);
    let mut out = IndexMap::new();
    let map = match section {
        Value::Map(map) => map,
        Value::Null => return out,
        other => {
            report.emit_error(
                ErrorKind::ValueInvalid,
                format!(
                    "Substitutions must be a key to value mapping, got {}",
                    other.type_name()
                ),
                path,
            );
            return out;
        }
    };

    for (key, value) in map {
        let name = key.strip_prefix('$').unwrap_or(key);
        if !is_variable_name(name) {
            report.emit_error(
                ErrorKind::ValueInvalid,
                format!(
                    "Substitution key '{}' must only consist of alphanumeric characters and underscores and must not start with a digit",
                    key
                ),
                path.key(key),
            );
            continue;
        }
        match value {
            Value::Null | Value::List(_) | Value::Map(_) | Value::Lambda(_) => {
                report.emit_error(
                    ErrorKind::ValueInvalid,
                    format!(
                        "Substitution '{}' must be a scalar value, got {}",
                        name,
                        value.type_name()
                    ),
                    path.key(key),
                );
            }
            scalar => {
                out.insert(name.to_string(), scalar.scalar_text().unwrap_or_default());
            }
        }
    }
    out
}

struct Pass<'r> {
    variables: IndexMap<String, String>,
    names: Vec<String>,
    report: &'r mut ValidationReport,
}

impl Pass<'_> {
    fn mapping(&mut self, map: &Mapping, path: &ConfigPath) -> Mapping {
        let mut out = Mapping::with_capacity(map.len());
        for (key, value) in map {
            let child = path.key(key);
            let new_key = self.text(key, &child);
            let new_value = self.value(value, &child);
            if out.insert(new_key.clone(), new_value).is_some() {
                self.report.emit_error(
                    ErrorKind::ValueInvalid,
                    format!("Duplicate key '{}' after substitution", new_key),
                    child,
                );
            }
        }
        out
    }

    fn value(&mut self, value: &Value, path: &ConfigPath) -> Value {
        match value {
            Value::String(text) => Value::String(self.text(text, path)),
            Value::Lambda(code) => Value::Lambda(self.text(code, path)),
            Value::List(items) => Value::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| self.value(item, &path.index(index)))
                    .collect(),
            ),
            Value::Map(map) => Value::Map(self.mapping(map, path)),
            other => other.clone(),
        }
    }

    fn text(&mut self, text: &str, path: &ConfigPath) -> String {
        if !text.contains('$') {
            return text.to_string();
        }
        let Some(pattern) = variable_pattern() else {
            warn!("substitution pattern unavailable, leaving '{}' as is", text);
            return text.to_string();
        };

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for found in pattern.find_iter(text) {
            out.push_str(text.get(last..found.start()).unwrap_or_default());
            let name = found
                .as_str()
                .trim_start_matches('$')
                .trim_start_matches('{')
                .trim_end_matches('}');
            match self.variables.get(name) {
                Some(replacement) => out.push_str(replacement),
                None => {
                    out.push_str(found.as_str());
                    self.report.emit(
                        Diagnostic::new(
                            ErrorKind::ValueInvalid,
                            format!(
                                "Found '{}' which looks like a substitution, but '{}' was not declared",
                                found.as_str(),
                                name
                            ),
                            path.clone(),
                        )
                        .with_suggestion_opt(fuzzy::closest(name, &self.names)),
                    );
                }
            }
            last = found.end();
        }
        out.push_str(text.get(last..).unwrap_or_default());
        out
    }
}
