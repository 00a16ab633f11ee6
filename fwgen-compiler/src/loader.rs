// Loader
// Applies substitutions, dispatches every document section to its component
// kind, expands the auto-load closure, validates each instance and finally
// links ids.
// Validation errors accumulate; id resolution fails fast.

use crate::registry::ComponentRegistry;
use crate::session::{Instance, Session};
use crate::substitutions;
use fwgen_diagnostics::{fuzzy, ConfigPath, Diagnostic, ErrorKind, ValidationReport};
use fwgen_schema::{Context, InstanceId, SymbolTable, Validate};
use fwgen_value::{Document, Setting, Value};
use log::{debug, info};

/// Instance found in the document, not yet validated
#[derive(Debug)]
struct Pending {
    kind: String,
    path: ConfigPath,
    value: Value,
    auto_loaded: bool,
}

/// Kinds present after auto-load: `kinds` first, then every implicitly
/// loaded kind in discovery order
pub fn auto_load_closure(registry: &ComponentRegistry, kinds: &[String]) -> Vec<String> {
    let mut present: Vec<String> = Vec::new();
    for kind in kinds {
        if !present.contains(kind) {
            present.push(kind.clone());
        }
    }

    let mut cursor = 0;
    while let Some(kind) = present.get(cursor).cloned() {
        cursor += 1;
        let Some(entry) = registry.get(&kind) else {
            continue;
        };
        for target in &entry.auto_load {
            if !present.contains(target) {
                debug!("auto-loading {} for {}", target, kind);
                present.push(target.clone());
            }
        }
    }
    present
}

/// Validate `document` against `registry`
pub fn load(document: &Document, registry: &ComponentRegistry) -> Result<Session, ValidationReport> {
    let mut report = ValidationReport::new();
    let document = substitutions::substitute(document, &mut report);
    let mut pending = collect_instances(&document, registry, &mut report);

    // auto-loaded kinds run with an empty configuration
    let kinds: Vec<String> = pending.iter().map(|p| p.kind.clone()).collect();
    for kind in auto_load_closure(registry, &kinds).into_iter().skip(distinct(&kinds)) {
        pending.push(Pending {
            path: ConfigPath::root().key(&kind),
            kind,
            value: Value::empty_map(),
            auto_loaded: true,
        });
    }

    check_dependencies(&pending, registry, &mut report);

    let mut symbols = SymbolTable::new();
    let mut validated = Vec::with_capacity(pending.len());
    for (index, item) in pending.iter().enumerate() {
        let Some(kind) = registry.get(&item.kind) else {
            continue;
        };
        let result = {
            let mut cx = Context::new(
                item.path.clone(),
                &mut report,
                &mut symbols,
                InstanceId(index),
            );
            kind.schema.validate(&item.value, &mut cx)
        };
        if let Ok(Setting::Map(config)) = result {
            validated.push(Instance {
                id: InstanceId(index),
                kind: item.kind.clone(),
                path: item.path.clone(),
                config,
                auto_loaded: item.auto_loaded,
            });
        }
    }

    if report.has_errors() {
        info!("validation failed with {} error(s)", report.error_count());
        return Err(report);
    }

    let edges = symbols.resolve_all().map_err(ValidationReport::from)?;
    info!(
        "validated {} instance(s), {} reference edge(s)",
        validated.len(),
        edges.len()
    );
    Ok(Session::from_parts(symbols, validated, edges))
}

fn distinct(kinds: &[String]) -> usize {
    let mut seen: Vec<&String> = Vec::new();
    for kind in kinds {
        if !seen.contains(&kind) {
            seen.push(kind);
        }
    }
    seen.len()
}

fn collect_instances(
    document: &Document,
    registry: &ComponentRegistry,
    report: &mut ValidationReport,
) -> Vec<Pending> {
    let mut pending = Vec::new();
    for (key, value) in &document.root {
        let path = ConfigPath::root().key(key);

        if registry.is_domain(key) {
            collect_platforms(key, value, &path, registry, report, &mut pending);
            continue;
        }

        let Some(kind) = registry.get(key).filter(|k| k.platform().is_none()) else {
            report.emit(
                Diagnostic::new(
                    ErrorKind::UnknownComponent,
                    format!("Component not found: {}", key),
                    path,
                )
                .with_suggestion_opt(fuzzy::closest(key, &registry.top_level_names())),
            );
            continue;
        };

        match value {
            Value::List(items) if kind.multi_conf => {
                for (index, item) in items.iter().enumerate() {
                    pending.push(Pending {
                        kind: key.clone(),
                        path: path.index(index),
                        value: item.clone(),
                        auto_loaded: false,
                    });
                }
            }
            Value::List(items) if items.len() > 1 => {
                report.emit(
                    Diagnostic::new(
                        ErrorKind::DuplicateSingleton,
                        format!(
                            "Component {} cannot be loaded multiple times, found {} entries",
                            key,
                            items.len()
                        ),
                        path,
                    )
                    .with_note(format!("'{}' does not allow more than one instance", key)),
                );
            }
            Value::List(items) => match items.first() {
                Some(item) => pending.push(Pending {
                    kind: key.clone(),
                    path: path.index(0),
                    value: item.clone(),
                    auto_loaded: false,
                }),
                None => report.emit_error(
                    ErrorKind::ValueInvalid,
                    format!(
                        "Component {} requires exactly one entry, found an empty list",
                        key
                    ),
                    path,
                ),
            },
            other => pending.push(Pending {
                kind: key.clone(),
                path,
                value: other.clone(),
                auto_loaded: false,
            }),
        }
    }
    pending
}

fn collect_platforms(
    domain: &str,
    value: &Value,
    path: &ConfigPath,
    registry: &ComponentRegistry,
    report: &mut ValidationReport,
    pending: &mut Vec<Pending>,
) {
    let items: Vec<Value> = match value {
        Value::Null => Vec::new(),
        Value::List(items) => items.clone(),
        single => vec![single.clone()],
    };

    for (index, item) in items.into_iter().enumerate() {
        let item_path = path.index(index);
        let type_name = item.type_name();
        let Value::Map(mut body) = item else {
            report.emit_error(
                ErrorKind::ValueInvalid,
                format!("expected a dictionary, got {}", type_name),
                item_path,
            );
            continue;
        };

        let platform_path = item_path.key("platform");
        let platform = match body.shift_remove("platform") {
            Some(Value::String(platform)) => platform,
            Some(other) => {
                report.emit_error(
                    ErrorKind::ValueInvalid,
                    format!("platform must be a string, got {}", other.type_name()),
                    platform_path,
                );
                continue;
            }
            None => {
                report.emit_error(
                    ErrorKind::MissingRequired,
                    "required key not provided: 'platform'",
                    platform_path,
                );
                continue;
            }
        };

        let kind = format!("{}.{}", domain, platform);
        if registry.get(&kind).is_none() {
            report.emit(
                Diagnostic::new(
                    ErrorKind::UnknownComponent,
                    format!("Platform not found: '{}'", kind),
                    platform_path,
                )
                .with_suggestion_opt(fuzzy::closest(&platform, &registry.platforms(domain))),
            );
            continue;
        }

        pending.push(Pending {
            kind,
            path: item_path,
            value: Value::Map(body),
            auto_loaded: false,
        });
    }
}

fn check_dependencies(pending: &[Pending], registry: &ComponentRegistry, report: &mut ValidationReport) {
    let present: Vec<&str> = pending.iter().map(|p| p.kind.as_str()).collect();
    let mut checked: Vec<&str> = Vec::new();

    for item in pending {
        if checked.contains(&item.kind.as_str()) {
            continue;
        }
        checked.push(&item.kind);
        let Some(kind) = registry.get(&item.kind) else {
            continue;
        };
        for dependency in &kind.depends_on {
            if !present.contains(&dependency.as_str()) {
                report.emit(
                    Diagnostic::new(
                        ErrorKind::MissingDependency,
                        format!(
                            "Component {} requires component {}",
                            item.kind, dependency
                        ),
                        item.path.clone(),
                    )
                    .with_note(format!("add a '{}:' section to the configuration", dependency)),
                );
            }
        }
    }
}
