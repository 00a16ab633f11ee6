use fwgen_diagnostics::{ConfigPath, Diagnostic, ErrorKind, ValidationReport};
use serde_json::Value;

#[test]
fn test_report_json_shape() {
    let mut report = ValidationReport::new();

    report.emit(
        Diagnostic::new(
            ErrorKind::UnresolvedId,
            "Couldn't find ID 'missing'",
            ConfigPath::from_keys(&["dev", "bus_id"]),
        )
        .with_suggestion("bus"),
    );
    report.emit(Diagnostic::new(
        ErrorKind::CircularDependency,
        "Circular dependency: a → a",
        ConfigPath::from_keys(&["a"]),
    ));

    let json = report.to_json().expect("report serializes");
    let v: Value = serde_json::from_str(&json).expect("valid json");

    assert_eq!(v["error_count"], 2);
    let first = &v["diagnostics"][0];
    assert_eq!(first["kind"], "UNRESOLVED_ID");
    assert_eq!(first["code"], "E202");
    assert_eq!(first["path"], "dev.bus_id");
    assert_eq!(first["suggestion"], "bus");
    assert!(first.get("notes").is_none());

    let second = &v["diagnostics"][1];
    assert_eq!(second["kind"], "CIRCULAR_DEPENDENCY");
    assert!(second.get("suggestion").is_none());
}

#[test]
fn test_render_lists_every_diagnostic_and_summary() {
    colored::control::set_override(false);

    let mut report = ValidationReport::new();
    report.missing_required("baud_rate", ConfigPath::from_keys(&["uart"]));
    report.unknown_key(
        "tx_pn",
        ConfigPath::from_keys(&["uart", "tx_pn"]),
        &["tx_pin".to_string(), "rx_pin".to_string()],
    );

    let rendered = report.render();
    assert!(rendered.contains("error[E102] MISSING_REQUIRED: required key not provided: 'baud_rate'"));
    assert!(rendered.contains("--> uart.tx_pn"));
    assert!(rendered.contains("help: did you mean `tx_pin`?"));
    assert!(rendered.contains("aborting due to 2 errors"));
}
