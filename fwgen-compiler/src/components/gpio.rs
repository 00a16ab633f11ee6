// GPIO-backed platforms: binary output, switch and the binary light that
// drives any binary output

use super::{decl, entity_setters, int, lambda, millis, reference, text};
use crate::codegen::EmissionContext;
use crate::cpp::Arg;
use crate::registry::{ComponentKind, RegistryError};
use crate::session::Instance;
use fwgen_diagnostics::Diagnostic;
use fwgen_schema::blocks::{component_schema, entity_schema, COMPONENT};
use fwgen_schema::{cv, IdType, Schema, SchemaError};
use fwgen_value::{Mapping, Setting, Settings, Value};

pub static BINARY_OUTPUT: IdType = IdType::new("binary_output", "output::BinaryOutput", &[]);
pub static GPIO_BINARY_OUTPUT: IdType = IdType {
    name: "gpio_binary_output",
    class: "gpio::GPIOBinaryOutput",
    parents: &[&BINARY_OUTPUT, &COMPONENT],
};

pub static SWITCH: IdType = IdType::new("switch_", "switch_::Switch", &[]);
pub static GPIO_SWITCH: IdType = IdType {
    name: "gpio_switch",
    class: "gpio::GPIOSwitch",
    parents: &[&SWITCH, &COMPONENT],
};

pub static LIGHT_STATE: IdType = IdType {
    name: "light_state",
    class: "light::LightState",
    parents: &[&COMPONENT],
};
pub static BINARY_LIGHT_OUTPUT: IdType =
    IdType::new("binary_light_output", "binary::BinaryLightOutput", &[]);

pub static LIGHT_EFFECT: IdType = IdType::new("light_effect", "light::LightEffect", &[]);
pub static LAMBDA_LIGHT_EFFECT: IdType = IdType {
    name: "lambda_light_effect",
    class: "light::LambdaLightEffect",
    parents: &[&LIGHT_EFFECT],
};
pub static STROBE_LIGHT_EFFECT: IdType = IdType {
    name: "strobe_light_effect",
    class: "light::StrobeLightEffect",
    parents: &[&LIGHT_EFFECT],
};

/// Effects a binary light can run
pub const BINARY_EFFECTS: &[&str] = &["lambda", "strobe"];

pub const RESTORE_MODES: &[&str] = &[
    "RESTORE_DEFAULT_OFF",
    "RESTORE_DEFAULT_ON",
    "ALWAYS_OFF",
    "ALWAYS_ON",
];

pub fn gpio_output_schema() -> Result<Schema, SchemaError> {
    component_schema().extend(
        &Schema::new()
            .required("id", cv::declare_id(&GPIO_BINARY_OUTPUT))
            .required("pin", cv::pin())
            .optional_default("inverted", cv::boolean(), false),
    )
}

pub fn gpio_output() -> Result<ComponentKind, RegistryError> {
    Ok(ComponentKind::new("output.gpio", gpio_output_schema()?, emit_gpio_output))
}

fn emit_gpio_output(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let var = ctx.new_variable(decl(instance, config, "id")?, &[]);
    ctx.register_component(&var);
    ctx.call(&var, "set_pin", &[Arg::Int(int(instance, config, "pin")?)]);
    if config.get_bool("inverted") == Some(true) {
        ctx.call(&var, "set_inverted", &[Arg::Bool(true)]);
    }
    ctx.add_define("USE_OUTPUT", None);
    Ok(())
}

pub fn gpio_switch_schema() -> Result<Schema, SchemaError> {
    entity_schema().extend(&component_schema())?.extend(
        &Schema::new()
            .generate_id("id", cv::declare_id(&GPIO_SWITCH))
            .required("pin", cv::pin())
            .optional_default(
                "restore_mode",
                cv::enumeration(RESTORE_MODES).case_insensitive(),
                "ALWAYS_OFF",
            ),
    )
}

pub fn gpio_switch() -> Result<ComponentKind, RegistryError> {
    Ok(ComponentKind::new("switch.gpio", gpio_switch_schema()?, emit_gpio_switch))
}

fn emit_gpio_switch(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let var = ctx.new_variable(decl(instance, config, "id")?, &[]);
    ctx.register_component(&var);
    ctx.add(format!("App.register_switch({});", var));
    entity_setters(ctx, &var, config);
    ctx.call(&var, "set_pin", &[Arg::Int(int(instance, config, "pin")?)]);
    ctx.call(
        &var,
        "set_restore_mode",
        &[Arg::enum_token(
            "gpio::GPIO_SWITCH_",
            text(instance, config, "restore_mode")?,
        )],
    );
    ctx.add_define("USE_SWITCH", None);
    Ok(())
}

pub fn binary_light_schema() -> Result<Schema, SchemaError> {
    entity_schema().extend(&component_schema())?.extend(
        &Schema::new()
            .generate_id("id", cv::declare_id(&LIGHT_STATE))
            .generate_id("output_id", cv::declare_id(&BINARY_LIGHT_OUTPUT))
            .required("output", cv::use_id(&BINARY_OUTPUT))
            .optional("effects", cv::ensure_list(effect_schema())),
    )
}

/// One effect entry: a single key naming the effect type
fn effect_schema() -> Schema {
    Schema::new()
        .optional("lambda", lambda_effect_schema())
        .optional("strobe", strobe_effect_schema())
        .has_exactly_one_key(BINARY_EFFECTS)
}

fn lambda_effect_schema() -> Schema {
    Schema::new()
        .generate_id("effect_id", cv::declare_id(&LAMBDA_LIGHT_EFFECT))
        .optional_default("name", cv::string_strict(), "Lambda")
        .required("lambda", cv::lambda())
        .optional_default("update_interval", cv::update_interval(), "0ms")
}

fn strobe_color_schema() -> Schema {
    Schema::new()
        .optional_default("state", cv::boolean(), true)
        .optional_default("brightness", cv::percentage(), 1.0)
        .required("duration", cv::positive_duration())
        .has_at_least_one_key(&["state", "brightness"])
}

/// On for half a second, off for half a second
fn default_strobe_colors() -> Value {
    let step = |state: bool| {
        let mut color = Mapping::new();
        color.insert("state".to_string(), Value::Bool(state));
        color.insert("duration".to_string(), Value::from("0.5s"));
        Value::Map(color)
    };
    Value::List(vec![step(true), step(false)])
}

fn strobe_effect_schema() -> Schema {
    Schema::new()
        .generate_id("effect_id", cv::declare_id(&STROBE_LIGHT_EFFECT))
        .optional_default("name", cv::string_strict(), "Strobe")
        .optional_default(
            "colors",
            cv::length(cv::ensure_list(strobe_color_schema()), 2, None),
            default_strobe_colors(),
        )
}

pub fn binary_light() -> Result<ComponentKind, RegistryError> {
    Ok(ComponentKind::new("light.binary", binary_light_schema()?, emit_binary_light))
}

fn emit_binary_light(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let output = ctx.new_variable(decl(instance, config, "output_id")?, &[]);
    let state = ctx.new_variable(decl(instance, config, "id")?, &[Arg::var(output.as_str())]);
    ctx.add(format!("App.register_light({});", state));
    ctx.register_component(&state);
    entity_setters(ctx, &state, config);

    let driver = ctx.referenced(reference(instance, config, "output")?).to_string();
    ctx.call(&output, "set_output", &[Arg::var(driver)]);

    let mut effects = Vec::new();
    for entry in config.get_list("effects").unwrap_or_default() {
        let Some(entry) = entry.as_map() else {
            continue;
        };
        if let Some(effect) = entry.get_map("lambda") {
            effects.push(emit_lambda_effect(instance, effect, ctx)?);
        } else if let Some(effect) = entry.get_map("strobe") {
            effects.push(emit_strobe_effect(instance, effect, ctx)?);
        }
    }
    if !effects.is_empty() {
        ctx.call(&state, "add_effects", &[Arg::Raw(format!("{{{}}}", effects.join(", ")))]);
    }
    ctx.add_define("USE_LIGHT", None);
    Ok(())
}

fn emit_lambda_effect(
    instance: &Instance,
    effect: &Settings,
    ctx: &mut EmissionContext,
) -> Result<String, Diagnostic> {
    let body = lambda(instance, effect, "lambda")?;
    Ok(ctx.new_variable(
        decl(instance, effect, "effect_id")?,
        &[
            Arg::str(text(instance, effect, "name")?),
            Arg::lambda("bool initial_run", "void", body),
            Arg::Millis(millis(instance, effect, "update_interval")?),
        ],
    ))
}

fn emit_strobe_effect(
    instance: &Instance,
    effect: &Settings,
    ctx: &mut EmissionContext,
) -> Result<String, Diagnostic> {
    let var = ctx.new_variable(
        decl(instance, effect, "effect_id")?,
        &[Arg::str(text(instance, effect, "name")?)],
    );
    let colors: Vec<String> = effect
        .get_list("colors")
        .unwrap_or_default()
        .iter()
        .filter_map(Setting::as_map)
        .map(|color| {
            format!(
                "light::StrobeLightEffectColor{{light::LightColorValues({}, {}), {}}}",
                Arg::Bool(color.get_bool("state").unwrap_or(true)),
                Arg::Float(color.get_float("brightness").unwrap_or(1.0)),
                Arg::Millis(color.get_duration("duration").unwrap_or_default()),
            )
        })
        .collect();
    ctx.call(&var, "set_colors", &[Arg::Raw(format!("{{{}}}", colors.join(", ")))]);
    Ok(var)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_hierarchy() {
        assert!(GPIO_BINARY_OUTPUT.inherits(&BINARY_OUTPUT));
        assert!(!BINARY_OUTPUT.inherits(&GPIO_BINARY_OUTPUT));
        assert!(!GPIO_SWITCH.inherits(&BINARY_OUTPUT));
    }

    #[test]
    fn test_output_requires_id() {
        let schema = gpio_output_schema().unwrap();
        assert!(matches!(schema.rule("id"), Some(fwgen_schema::KeyRule::Required)));
    }

    fn effects(yaml: &str) -> Result<Setting, fwgen_diagnostics::ValidationReport> {
        let doc = fwgen_value::Document::parse(yaml).unwrap();
        let value = doc.get("effects").unwrap();
        fwgen_schema::check(&cv::ensure_list(effect_schema()), value)
    }

    #[test]
    fn test_strobe_defaults_to_on_off() {
        let out = effects("effects:\n  - strobe:\n").unwrap();
        let strobe = out.as_list().unwrap()[0]
            .as_map()
            .and_then(|e| e.get_map("strobe"))
            .unwrap();
        assert_eq!(strobe.get_str("name"), Some("Strobe"));
        let colors = strobe.get_list("colors").unwrap();
        assert_eq!(colors.len(), 2);
        let off = colors[1].as_map().unwrap();
        assert_eq!(off.get_bool("state"), Some(false));
        assert_eq!(off.get_float("brightness"), Some(1.0));
        assert_eq!(off.get_duration("duration"), Some(500));
    }

    #[test]
    fn test_effect_entry_needs_exactly_one_type() {
        let report = effects(
            "effects:\n  - lambda:\n      lambda: !lambda return;\n    strobe:\n",
        )
        .unwrap_err();
        assert_eq!(
            report.count(fwgen_diagnostics::ErrorKind::OneOfViolation),
            1
        );
        assert_eq!(report.diagnostics()[0].path.to_string(), "[0]");
    }

    #[test]
    fn test_strobe_needs_two_colors_with_percentages() {
        let report = effects(
            "effects:\n  - strobe:\n      colors:\n        - brightness: 150%\n          duration: 1s\n",
        )
        .unwrap_err();
        let messages: Vec<_> = report.diagnostics().iter().map(|d| d.message.clone()).collect();
        assert_eq!(report.error_count(), 1, "{:?}", messages);
        assert!(report.diagnostics()[0]
            .path
            .to_string()
            .ends_with("colors[0].brightness"));

        let report = effects(
            "effects:\n  - strobe:\n      colors:\n        - brightness: 50%\n          duration: 1s\n",
        )
        .unwrap_err();
        assert!(report.diagnostics()[0].message.contains("at least 2"));
    }
}
