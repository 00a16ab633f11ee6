// The built-in catalog driven through the whole pipeline, including the
// artifact writer

use fwgen_compiler::components::builtin_registry;
use fwgen_compiler::{compile, writer, CodegenConfig, Compilation};
use fwgen_diagnostics::ErrorKind;
use fwgen_value::{Document, Value};
use std::fs;

const METER: &str = r#"
device:
  name: meter
  platform: esp32
  board: nodemcu-32s
  libraries:
    - extra/Lib@1.2
uart:
  - id: uart_bus
    tx_pin: GPIO1
    rx_pin: 3
    baud_rate: 9600
sensor:
  - platform: modbus
    name: Power
    address: 0x01
    register: 0x0100
  - platform: dsmr
    power_delivered:
      name: Delivered
"#;

const LIGHT: &str = r#"
device:
  name: lamp
  platform: ESP8266
  board: d1_mini
i2c:
  - id: bus_a
sensor:
  - platform: ltr501
    ambient_light:
      name: Light
output:
  - platform: gpio
    id: relay
    pin: GPIO5
light:
  - platform: binary
    name: Lamp
    output: relay
"#;

fn build(yaml: &str) -> Compilation {
    let registry = builtin_registry().unwrap();
    compile(&Document::parse(yaml).unwrap(), &registry).unwrap()
}

fn texts(compilation: &Compilation) -> Vec<&str> {
    compilation
        .output
        .statements()
        .iter()
        .map(|s| s.text.as_str())
        .collect()
}

fn index_of(lines: &[&str], prefix: &str) -> usize {
    lines
        .iter()
        .position(|l| l.starts_with(prefix))
        .unwrap_or_else(|| panic!("no statement starting with {:?}", prefix))
}

#[test]
fn test_builtin_registry_is_consistent() {
    let registry = builtin_registry().unwrap();
    assert!(registry.get("uart").unwrap().multi_conf);
    assert!(!registry.get("device").unwrap().multi_conf);
    assert_eq!(registry.get("sensor.dsmr").unwrap().auto_load, vec!["dsmr".to_string()]);
    assert!(registry.platforms("sensor").contains(&"ltr501".to_string()));
}

#[test]
fn test_auto_loaded_hubs_precede_their_sensors() {
    let compilation = build(METER);
    let kinds: Vec<&str> = compilation
        .order
        .iter()
        .filter_map(|id| compilation.session.instance(*id))
        .map(|i| i.kind.as_str())
        .collect();
    assert_eq!(
        kinds,
        vec!["device", "uart", "modbus", "dsmr", "sensor.modbus", "sensor.dsmr"]
    );
    let auto: Vec<bool> = compilation
        .session
        .instances()
        .iter()
        .map(|i| i.auto_loaded)
        .collect();
    assert_eq!(auto, vec![false, false, false, false, true, true]);
}

#[test]
fn test_meter_statements() {
    let compilation = build(METER);
    let lines = texts(&compilation);

    assert_eq!(lines[0], "App.pre_setup(\"meter\", __DATE__ \", \" __TIME__);");
    assert!(lines.contains(&"modbus_1->set_uart_parent(uart_bus);"));
    assert!(lines.contains(&"dsmr_1 = new dsmr::Dsmr(uart_bus, true);"));

    let construct = index_of(&lines, "modbus_sensor_1 = new modbus::ModbusSensor(0x01, ");
    let attach = index_of(&lines, "modbus_1->register_device(modbus_sensor_1);");
    assert!(construct < attach);
    assert!(lines.contains(&"dsmr_1->set_power_delivered(sensor_1);"));
    assert!(lines.contains(&"sensor_1->set_name(\"Delivered\");"));
}

#[test]
fn test_meter_libraries_and_defines() {
    let compilation = build(METER);
    let output = &compilation.output;
    let deps = output.lib_deps();
    for expected in ["1655@1.0.2", "ESPmDNS", "extra/Lib@1.2", "glmnet/Dsmr@0.5"] {
        assert!(deps.contains(&expected.to_string()), "{:?}", deps);
    }
    for define in ["USE_ESP32", "USE_UART", "USE_MODBUS", "USE_DSMR", "USE_SENSOR"] {
        assert!(output.defines().contains_key(define), "{}", define);
    }
    assert_eq!(output.environment(), "meter");
    assert_eq!(
        output.platformio_options().get("platform").map(String::as_str),
        Some("espressif32")
    );
}

#[test]
fn test_light_statements() {
    let compilation = build(LIGHT);
    let lines = texts(&compilation);

    assert!(lines.contains(&"ltr501_1->set_i2c_bus(bus_a);"));
    assert!(lines.contains(&"ltr501_1->set_i2c_address(0x23);"));
    assert!(lines.contains(&"ltr501_1->set_als_integration_time(ltr501::INTEGRATION_TIME_100MS);"));
    assert!(lines.contains(&"ltr501_1->set_ambient_light_sensor(sensor_1);"));

    let relay = index_of(&lines, "relay = new gpio::GPIOBinaryOutput(");
    let driver = index_of(&lines, "binary_light_output_1->set_output(relay);");
    assert!(relay < driver);
    assert!(lines.contains(&"light_state_1 = new light::LightState(binary_light_output_1);"));
    assert!(compilation.output.lib_deps().contains(&"Wire".to_string()));
}

#[test]
fn test_light_effects_emit_lambda_and_strobe() {
    let yaml = format!(
        "{}    effects:\n      - lambda:\n          name: Blink\n          update_interval: 1s\n          lambda: !lambda |-\n            static bool on = false;\n            on = !on;\n      - strobe:\n",
        LIGHT
    );
    let compilation = build(&yaml);
    let lines = texts(&compilation);

    assert!(lines.contains(
        &"lambda_light_effect_1 = new light::LambdaLightEffect(\"Blink\", [=](bool initial_run) -> void {\n  static bool on = false;\n  on = !on;\n}, 1000);"
    ));
    assert!(lines.contains(&"strobe_light_effect_1 = new light::StrobeLightEffect(\"Strobe\");"));
    assert!(lines.contains(
        &"strobe_light_effect_1->set_colors({light::StrobeLightEffectColor{light::LightColorValues(true, 1.0f), 500}, light::StrobeLightEffectColor{light::LightColorValues(false, 1.0f), 500}});"
    ));
    let state = index_of(&lines, "light_state_1 = new light::LightState(");
    let added = index_of(
        &lines,
        "light_state_1->add_effects({lambda_light_effect_1, strobe_light_effect_1});",
    );
    assert!(state < added);

    let setup = fwgen_compiler::writer::render_setup(&compilation.output, 2);
    assert!(setup.contains("  }, 1000);\n"), "{}", setup);
    assert!(setup.contains("    on = !on;\n"));
}

#[test]
fn test_device_setup_comes_first_wherever_it_is_written() {
    let yaml = "uart:\n  - tx_pin: 1\n    baud_rate: 9600\ndevice:\n  name: late\n  platform: esp8266\n  board: d1_mini\n";
    let compilation = build(yaml);
    let first = compilation
        .order
        .first()
        .and_then(|id| compilation.session.instance(*id))
        .map(|i| i.kind.as_str());
    assert_eq!(first, Some("device"));
    assert!(texts(&compilation)[0].starts_with("App.pre_setup(\"late\""));
}

#[test]
fn test_web_server_port_and_auth() {
    let yaml = format!(
        "{}web_server:\n  port: 8080\n  auth:\n    username: admin\n    password: hunter2\n",
        LIGHT
    );
    let compilation = build(&yaml);
    let lines = texts(&compilation);
    assert!(lines.contains(&"web_server_1->set_port(8080);"));
    assert!(lines.contains(&"web_server_1->set_auth_username(\"admin\");"));
    let defines = compilation.output.defines();
    assert_eq!(
        defines.get("USE_WEBSERVER_PORT").cloned().flatten().as_deref(),
        Some("8080")
    );
    assert!(defines.contains_key("USE_WEBSERVER"));
}

#[test]
fn test_light_output_must_be_binary() {
    let registry = builtin_registry().unwrap();
    let yaml = LIGHT.replace("output: relay", "output: bus_a");
    let report = compile(&Document::parse(&yaml).unwrap(), &registry).unwrap_err();
    assert_eq!(report.count(ErrorKind::KindMismatch), 1);
    assert_eq!(report.diagnostics()[0].path.to_string(), "light[0].output");
}

#[test]
fn test_sensor_without_bus_is_a_missing_dependency() {
    let registry = builtin_registry().unwrap();
    let doc = Document::parse("sensor:\n  - platform: ltr501\n").unwrap();
    let report = compile(&doc, &registry).unwrap_err();
    assert_eq!(report.count(ErrorKind::MissingDependency), 1);
    assert_eq!(report.diagnostics()[0].path.to_string(), "sensor[0]");
}

#[test]
fn test_unknown_platform_suggests_close_match() {
    let registry = builtin_registry().unwrap();
    let doc = Document::parse("sensor:\n  - platform: modbuss\n").unwrap();
    let report = compile(&doc, &registry).unwrap_err();
    assert_eq!(report.count(ErrorKind::UnknownComponent), 1);
    assert_eq!(report.diagnostics()[0].suggestion.as_deref(), Some("modbus"));
}

#[test]
fn test_validated_document_shows_defaults() {
    let registry = builtin_registry().unwrap();
    let compilation = build(METER);
    let root = compilation.session.to_document(&registry);

    let Some(Value::Map(modbus)) = root.get("modbus") else {
        panic!("auto-loaded modbus missing from {:?}", root.keys().collect::<Vec<_>>());
    };
    assert_eq!(modbus.get("uart_id"), Some(&Value::from("uart_bus")));
    assert_eq!(modbus.get("send_wait_time"), Some(&Value::from("250ms")));

    let Some(Value::List(sensors)) = root.get("sensor") else {
        panic!("sensor list missing");
    };
    let Some(Value::Map(first)) = sensors.first() else {
        panic!("sensor entry is not a mapping");
    };
    assert_eq!(first.keys().next().map(String::as_str), Some("platform"));
    assert_eq!(first.get("platform"), Some(&Value::from("modbus")));
}

#[test]
fn test_write_artifacts_preserves_user_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = CodegenConfig {
        output_dir: dir.path().to_path_buf(),
        ..CodegenConfig::default()
    };
    let compilation = build(METER);

    let written = writer::write(&compilation.output, &config).unwrap();
    assert_eq!(written.len(), 3);
    assert!(writer::write(&compilation.output, &config).unwrap().is_empty());

    let main = fs::read_to_string(config.main_path()).unwrap();
    assert!(main.contains("  modbus_1->set_uart_parent(uart_bus);\n"));
    let edited = main.replace("  App.setup();\n", "  App.setup();\n  my_hook();\n");
    fs::write(config.main_path(), &edited).unwrap();

    assert!(writer::write(&compilation.output, &config).unwrap().is_empty());
    let main = fs::read_to_string(config.main_path()).unwrap();
    assert!(main.contains("my_hook();"));

    let ini = fs::read_to_string(config.libraries_path()).unwrap();
    assert!(ini.contains("[env:meter]\n"));
    assert!(ini.contains("    glmnet/Dsmr@0.5\n"));

    let defines = fs::read_to_string(config.defines_path()).unwrap();
    assert!(defines.starts_with("#pragma once\n"));
    assert!(defines.contains("#define USE_DSMR\n"));
}
