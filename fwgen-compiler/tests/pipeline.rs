// End-to-end runs of the pipeline over a small hand-built catalog

use fwgen_compiler::cpp::Arg;
use fwgen_compiler::writer::render_main;
use fwgen_compiler::{compile, validate, ComponentKind, ComponentRegistry, EmissionContext, Instance};
use fwgen_diagnostics::{Diagnostic, ErrorKind, ValidationReport};
use fwgen_schema::{cv, IdType, Schema};
use fwgen_value::Document;
use std::path::Path;

static BUS: IdType = IdType::new("bus", "test::Bus", &[]);
static DEV: IdType = IdType::new("dev", "test::Device", &[]);
static PSU: IdType = IdType::new("psu", "test::Supply", &[]);
static LIB_USER: IdType = IdType::new("lib_user", "test::LibUser", &[]);

fn emit_bus(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    if let Some(id) = instance.config.get_decl("id") {
        let var = ctx.new_variable(id, &[]);
        ctx.register_component(&var);
    }
    ctx.add_include("bus.h");
    Ok(())
}

fn emit_dev(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let bus = config
        .get_ref("bus_id")
        .map(|r| ctx.referenced(r).to_string())
        .unwrap_or_default();
    if let Some(id) = config.get_decl("id") {
        let var = ctx.new_variable(id, &[Arg::var(bus)]);
        ctx.register_component(&var);
    }
    ctx.add_include("bus.h");
    ctx.add_include("dev.h");
    Ok(())
}

fn emit_psu(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    if let Some(id) = config.get_decl("id") {
        let var = ctx.new_variable(id, &[]);
        if let Some(voltage) = config.get_str("voltage") {
            ctx.call(&var, "set_voltage", &[Arg::str(voltage)]);
        }
        if let Some(ms) = config.get_duration("interval") {
            ctx.call(&var, "set_interval", &[Arg::Millis(ms)]);
        }
    }
    Ok(())
}

fn emit_lib_user(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    if let Some(id) = instance.config.get_decl("id") {
        ctx.new_variable(id, &[]);
    }
    ctx.add_library("L", instance.config.get_str("version"))
}

fn registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry
        .register(ComponentKind::new(
            "bus",
            Schema::new().generate_id("id", cv::declare_id(&BUS)),
            emit_bus,
        ))
        .unwrap();
    registry
        .register(
            ComponentKind::new(
                "dev",
                Schema::new()
                    .generate_id("id", cv::declare_id(&DEV))
                    .required("bus_id", cv::use_id(&BUS)),
                emit_dev,
            )
            .with_multi_conf(),
        )
        .unwrap();
    registry
        .register(ComponentKind::new(
            "psu",
            Schema::new()
                .generate_id("id", cv::declare_id(&PSU))
                .optional("voltage", cv::enumeration(&["5V", "10V"]).case_insensitive())
                .optional("interval", cv::positive_duration()),
            emit_psu,
        ))
        .unwrap();
    registry
        .register(
            ComponentKind::new(
                "lib_user",
                Schema::new()
                    .generate_id("id", cv::declare_id(&LIB_USER))
                    .optional("version", cv::string_strict()),
                emit_lib_user,
            )
            .with_multi_conf(),
        )
        .unwrap();
    registry
        .register(ComponentKind::new("needs_bus", Schema::new(), emit_psu).with_depends_on(&["bus"]))
        .unwrap();
    registry.verify().unwrap();
    registry
}

fn doc(yaml: &str) -> Document {
    Document::parse(yaml).unwrap()
}

fn failure(yaml: &str) -> ValidationReport {
    compile(&doc(yaml), &registry()).unwrap_err()
}

fn statements(yaml: &str) -> Vec<String> {
    let compilation = compile(&doc(yaml), &registry()).unwrap();
    compilation
        .output
        .statements()
        .iter()
        .map(|s| s.text.clone())
        .collect()
}

fn position(lines: &[String], text: &str) -> usize {
    lines
        .iter()
        .position(|l| l == text)
        .unwrap_or_else(|| panic!("missing statement {:?} in {:?}", text, lines))
}

#[test]
fn test_bus_is_constructed_before_device() {
    let lines = statements("dev:\n  - id: d\n    bus_id: b\nbus:\n  id: b\n");
    let bus = position(&lines, "b = new test::Bus();");
    let dev = position(&lines, "d = new test::Device(b);");
    assert!(bus < dev);
}

#[test]
fn test_unknown_id_reports_once_at_reference() {
    let report = failure("dev:\n  bus_id: missing\n");
    assert_eq!(report.error_count(), 1);
    assert_eq!(report.count(ErrorKind::UnresolvedId), 1);
    assert_eq!(report.diagnostics()[0].path.to_string(), "dev.bus_id");
}

#[test]
fn test_unknown_id_suggests_close_name() {
    let report = failure("bus:\n  id: main_bus\ndev:\n  bus_id: main_bsu\n");
    assert_eq!(report.diagnostics()[0].suggestion.as_deref(), Some("main_bus"));
}

#[test]
fn test_reference_to_wrong_kind() {
    let report = failure("psu:\n  id: p\ndev:\n  bus_id: p\n");
    assert_eq!(report.count(ErrorKind::KindMismatch), 1);
}

#[test]
fn test_second_bus_is_a_duplicate_singleton() {
    let report = failure("bus:\n  - id: a\n  - id: b\n");
    assert_eq!(report.count(ErrorKind::DuplicateSingleton), 1);
    assert_eq!(report.error_count(), 1);
}

#[test]
fn test_duplicate_id_across_kinds() {
    let report = failure("bus:\n  id: x\npsu:\n  id: x\n");
    assert_eq!(report.count(ErrorKind::DuplicateId), 1);
    assert_eq!(report.diagnostics()[0].path.to_string(), "psu.id");
}

#[test]
fn test_enum_is_normalized_case_insensitively() {
    let compilation = compile(&doc("psu:\n  voltage: 5v\n"), &registry()).unwrap();
    let psu = &compilation.session.instances()[0];
    assert_eq!(psu.config.get_str("voltage"), Some("5V"));
}

#[test]
fn test_duration_is_stored_in_milliseconds() {
    let compilation = compile(&doc("psu:\n  interval: 2s\n"), &registry()).unwrap();
    let psu = &compilation.session.instances()[0];
    assert_eq!(psu.config.get_duration("interval"), Some(2000));

    let report = failure("psu:\n  interval: -1s\n");
    assert_eq!(report.count(ErrorKind::ValueInvalid), 1);
    assert_eq!(report.diagnostics()[0].path.to_string(), "psu.interval");
}

#[test]
fn test_conflicting_library_pins_name_both_requesters() {
    let report = failure("lib_user:\n  - id: first\n    version: \"1.0\"\n  - id: second\n    version: \"2.0\"\n");
    assert_eq!(report.count(ErrorKind::LibraryVersionConflict), 1);
    let message = &report.diagnostics()[0].message;
    assert!(message.contains("first"), "{}", message);
    assert!(message.contains("second"), "{}", message);
}

#[test]
fn test_matching_library_pins_merge() {
    let compilation = compile(
        &doc("lib_user:\n  - version: \"1.0\"\n  - version: \"1.0\"\n  - {}\n"),
        &registry(),
    )
    .unwrap();
    assert_eq!(compilation.output.lib_deps(), vec!["L@1.0".to_string()]);
}

#[test]
fn test_empty_document_is_valid() {
    let compilation = compile(&Document::default(), &registry()).unwrap();
    assert!(compilation.order.is_empty());
    assert!(compilation.output.statements().is_empty());
    assert!(validate(&Document::default(), &registry()).diagnostics().is_empty());
}

#[test]
fn test_single_instance_without_references() {
    let lines = statements("psu: {}\n");
    assert_eq!(lines, vec!["psu_1 = new test::Supply();".to_string()]);
}

#[test]
fn test_missing_dependency() {
    let report = failure("needs_bus: {}\n");
    assert_eq!(report.count(ErrorKind::MissingDependency), 1);
    assert_eq!(report.diagnostics()[0].path.to_string(), "needs_bus");
}

#[test]
fn test_validation_errors_accumulate_across_instances() {
    let report = failure("psu:\n  voltage: 7V\n  interval: 0s\n  color: red\nbogus: {}\n");
    assert_eq!(report.count(ErrorKind::UnknownComponent), 1);
    assert_eq!(report.count(ErrorKind::ValueInvalid), 2);
    assert_eq!(report.count(ErrorKind::UnknownKey), 1);
}

#[test]
fn test_output_is_deterministic() {
    let yaml = "dev:\n  - bus_id: b\n  - bus_id: b\nbus:\n  id: b\npsu: {}\nlib_user:\n  - version: \"3\"\n";
    let render = || {
        let compilation = compile(&doc(yaml), &registry()).unwrap();
        render_main(&compilation.output, 2, None, Path::new("main.cpp")).unwrap()
    };
    assert_eq!(render(), render());
}

#[test]
fn test_generated_names_are_unique() {
    let compilation = compile(
        &doc("dev:\n  - bus_id: bus_1\n  - id: dev_1\n    bus_id: bus_1\n  - bus_id: bus_1\nbus: {}\n"),
        &registry(),
    )
    .unwrap();
    let mut globals = compilation.output.globals().to_vec();
    let total = globals.len();
    globals.sort();
    globals.dedup();
    assert_eq!(globals.len(), total);
    assert!(globals.contains(&"test::Device *dev_1{nullptr};".to_string()));
    assert!(globals.contains(&"test::Device *dev_2{nullptr};".to_string()));
}

#[test]
fn test_includes_are_deduplicated() {
    let compilation = compile(&doc("bus: {}\ndev:\n  - bus_id: bus_1\n"), &registry()).unwrap();
    let includes: Vec<_> = compilation.output.includes().collect();
    assert_eq!(includes, vec!["bus.h", "dev.h"]);
}

#[test]
fn test_validate_agrees_with_compile() {
    let cases = [
        "{}\n",
        "bus: {}\n",
        "dev:\n  bus_id: nowhere\n",
        "psu:\n  voltage: 12V\n",
        "lib_user:\n  - version: a\n  - version: b\n",
        "bus:\n  - {}\n  - {}\n",
    ];
    for yaml in cases {
        let document = doc(yaml);
        let compiled = compile(&document, &registry());
        let report = validate(&document, &registry());
        assert_eq!(compiled.is_err(), report.has_errors(), "{:?}", yaml);
    }
}
