// Sensor domain: shared entity options and the ltr501 / max31855 platforms

use super::{decl, entity_setters, int, millis, reference, text};
use crate::codegen::EmissionContext;
use crate::cpp::Arg;
use crate::registry::{ComponentKind, RegistryError};
use crate::session::Instance;
use fwgen_diagnostics::Diagnostic;
use fwgen_schema::blocks::{
    entity_schema, i2c_device_schema, polling_component_schema, spi_device_schema, POLLING_COMPONENT,
};
use fwgen_schema::{cv, IdType, Invalid, Schema, SchemaError, Validator, ValueType};
use fwgen_value::{Setting, Settings, Value};

pub static SENSOR: IdType = IdType::new("sensor", "sensor::Sensor", &[]);

pub static LTR501: IdType = IdType {
    name: "ltr501",
    class: "ltr501::LTRAlsPs501Component",
    parents: &[&POLLING_COMPONENT],
};

pub static MAX31855: IdType = IdType {
    name: "max31855",
    class: "max31855::MAX31855Sensor",
    parents: &[&SENSOR, &POLLING_COMPONENT],
};

pub const LTR_TYPES: &[&str] = &["ALS", "PS", "ALS_PS"];
pub const ALS_GAINS: &[&str] = &["1X", "150X"];
pub const PS_GAINS: &[&str] = &["1X", "4X", "8X", "16X"];
pub const INTEGRATION_TIMES: &[u64] = &[50, 100, 200, 400];
pub const REPEAT_RATES: &[u64] = &[50, 100, 200, 500, 1000, 2000];

/// Entity options plus unit and precision, with an id of type `ty`
pub fn sensor_schema(ty: &'static IdType) -> Result<Schema, SchemaError> {
    entity_schema().extend(
        &Schema::new()
            .generate_id("id", cv::declare_id(ty))
            .optional("unit_of_measurement", cv::string_strict())
            .optional("accuracy_decimals", cv::int_range(-1, 10))
            .optional("device_class", cv::string_strict()),
    )
}

/// Setters shared by every sensor entity
pub fn register_sensor(ctx: &mut EmissionContext, var: &str, config: &Settings) {
    ctx.add(format!("App.register_sensor({});", var));
    entity_setters(ctx, var, config);
    if let Some(unit) = config.get_str("unit_of_measurement") {
        ctx.call(var, "set_unit_of_measurement", &[Arg::str(unit)]);
    }
    if let Some(decimals) = config.get_int("accuracy_decimals") {
        ctx.call(var, "set_accuracy_decimals", &[Arg::Int(decimals)]);
    }
    if let Some(class) = config.get_str("device_class") {
        ctx.call(var, "set_device_class", &[Arg::str(class)]);
    }
    ctx.add_define("USE_SENSOR", None);
}

/// Build and register a nested sensor declared under `config`
pub fn new_sensor(
    instance: &Instance,
    ctx: &mut EmissionContext,
    config: &Settings,
) -> Result<String, Diagnostic> {
    let var = ctx.new_variable(decl(instance, config, "id")?, &[]);
    register_sensor(ctx, &var, config);
    Ok(var)
}

/// Positive duration restricted to a fixed set of millisecond values
fn duration_choice(choices: &'static [u64]) -> Validator {
    cv::leaf(ValueType::Duration, format!("duration{:?}", choices), move |value: &Value| {
        let ms = match value {
            Value::String(s) => cv::parse_duration(s)?,
            Value::Int(i) if *i >= 0 => *i as u64,
            other => {
                return Err(Invalid::new(format!(
                    "expected a time period, got {}",
                    other.type_name()
                )))
            }
        };
        if choices.contains(&ms) {
            Ok(Setting::Duration(ms))
        } else {
            let valid: Vec<String> = choices.iter().map(|c| format!("{}ms", c)).collect();
            Err(Invalid::new(format!(
                "Unknown value '{}ms', valid options are {}.",
                ms,
                valid.join(", ")
            )))
        }
    })
}

pub fn ltr501_schema() -> Result<Schema, SchemaError> {
    let light = |unit: &str| -> Result<Schema, SchemaError> {
        sensor_schema(&SENSOR)?.extend(
            &Schema::new()
                .optional_default("unit_of_measurement", cv::string_strict(), unit)
                .optional_default("accuracy_decimals", cv::int_range(-1, 10), 1),
        )
    };

    polling_component_schema("60s")
        .extend(&i2c_device_schema(Some(0x23)))?
        .extend(
            &Schema::new()
                .generate_id("id", cv::declare_id(&LTR501))
                .optional_default("type", cv::enumeration(LTR_TYPES).case_insensitive(), "ALS_PS")
                .optional_default("auto_mode", cv::boolean(), true)
                .optional_default("gain", cv::enumeration(ALS_GAINS).case_insensitive(), "1X")
                .optional_default("integration_time", duration_choice(INTEGRATION_TIMES), "100ms")
                .optional_default("repeat", duration_choice(REPEAT_RATES), "500ms")
                .optional_default("glass_attenuation_factor", cv::float_range(Some(1.0), None), 1.0)
                .optional_default("ps_cooldown", cv::positive_duration(), "5s")
                .optional_default("ps_gain", cv::enumeration(PS_GAINS).case_insensitive(), "1X")
                .optional_default("ps_high_threshold", cv::int_range(0, 65535), 65535)
                .optional_default("ps_low_threshold", cv::int_range(0, 65535), 0)
                .optional("ambient_light", light("lx")?)
                .optional("full_spectrum_counts", light("#")?)
                .optional("infrared_counts", light("#")?)
                .optional("ps_counts", light("#")?),
        )
}

pub fn ltr501() -> Result<ComponentKind, RegistryError> {
    Ok(ComponentKind::new("sensor.ltr501", ltr501_schema()?, emit_ltr501)
        .with_depends_on(&["i2c"])
        .with_code_owners(&["@latonita"]))
}

fn emit_ltr501(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let var = ctx.new_variable(decl(instance, config, "id")?, &[]);
    ctx.register_component(&var);
    if let Some(interval) = config.get_duration("update_interval") {
        ctx.call(&var, "set_update_interval", &[Arg::Millis(interval)]);
    }
    let bus = ctx.referenced(reference(instance, config, "i2c_id")?).to_string();
    ctx.call(&var, "set_i2c_bus", &[Arg::var(bus)]);
    ctx.call(&var, "set_i2c_address", &[Arg::Hex(int(instance, config, "address")? as u8)]);

    let ltr_type = text(instance, config, "type")?;
    let token = match ltr_type {
        "ALS" => "ALS_ONLY",
        "PS" => "PS_ONLY",
        _ => "ALS_AND_PS",
    };
    ctx.call(&var, "set_ltr_type", &[Arg::enum_token("ltr501::LTR_TYPE_", token)]);
    ctx.call(
        &var,
        "set_als_auto_mode",
        &[Arg::Bool(config.get_bool("auto_mode").unwrap_or(true))],
    );
    let gain = text(instance, config, "gain")?.trim_end_matches('X');
    ctx.call(&var, "set_als_gain", &[Arg::enum_token("ltr501::GAIN_", gain)]);
    ctx.call(
        &var,
        "set_als_integration_time",
        &[Arg::enum_token(
            "ltr501::INTEGRATION_TIME_",
            format!("{}MS", millis(instance, config, "integration_time")?),
        )],
    );
    ctx.call(
        &var,
        "set_als_meas_repeat_rate",
        &[Arg::enum_token(
            "ltr501::REPEAT_RATE_",
            format!("{}MS", millis(instance, config, "repeat")?),
        )],
    );
    if let Some(factor) = config.get_float("glass_attenuation_factor") {
        ctx.call(&var, "set_als_glass_attenuation_factor", &[Arg::Float(factor)]);
    }
    let cooldown_s = millis(instance, config, "ps_cooldown")? / 1000;
    ctx.call(&var, "set_ps_cooldown_time_s", &[Arg::Millis(cooldown_s)]);
    let ps_gain = text(instance, config, "ps_gain")?.trim_end_matches('X');
    ctx.call(&var, "set_ps_gain", &[Arg::enum_token("ltr501::PS_GAIN_", ps_gain)]);
    ctx.call(
        &var,
        "set_ps_high_threshold",
        &[Arg::Int(int(instance, config, "ps_high_threshold")?)],
    );
    ctx.call(
        &var,
        "set_ps_low_threshold",
        &[Arg::Int(int(instance, config, "ps_low_threshold")?)],
    );

    for (key, setter) in [
        ("ambient_light", "set_ambient_light_sensor"),
        ("full_spectrum_counts", "set_full_spectrum_counts_sensor"),
        ("infrared_counts", "set_infrared_counts_sensor"),
        ("ps_counts", "set_ps_counts_sensor"),
    ] {
        if let Some(sub) = config.get_map(key) {
            let sensor = new_sensor(instance, ctx, sub)?;
            ctx.call(&var, setter, &[Arg::var(sensor)]);
        }
    }
    Ok(())
}

pub fn max31855_schema() -> Result<Schema, SchemaError> {
    sensor_schema(&MAX31855)?
        .extend(&polling_component_schema("60s"))?
        .extend(&spi_device_schema(true))?
        .extend(
            &Schema::new()
                .optional_default("unit_of_measurement", cv::string_strict(), "°C")
                .optional_default("accuracy_decimals", cv::int_range(-1, 10), 1)
                .optional("reference_temperature", sensor_schema(&SENSOR)?),
        )
}

pub fn max31855() -> Result<ComponentKind, RegistryError> {
    Ok(ComponentKind::new("sensor.max31855", max31855_schema()?, emit_max31855)
        .with_depends_on(&["spi"]))
}

fn emit_max31855(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let var = ctx.new_variable(decl(instance, config, "id")?, &[]);
    ctx.register_component(&var);
    if let Some(interval) = config.get_duration("update_interval") {
        ctx.call(&var, "set_update_interval", &[Arg::Millis(interval)]);
    }
    let bus = ctx.referenced(reference(instance, config, "spi_id")?).to_string();
    ctx.call(&var, "set_spi_parent", &[Arg::var(bus)]);
    ctx.call(&var, "set_cs_pin", &[Arg::Int(int(instance, config, "cs_pin")?)]);
    register_sensor(ctx, &var, config);

    if let Some(sub) = config.get_map("reference_temperature") {
        let sensor = new_sensor(instance, ctx, sub)?;
        ctx.call(&var, "set_reference_sensor", &[Arg::var(sensor)]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwgen_diagnostics::ErrorKind;
    use fwgen_schema::check;

    #[test]
    fn test_integration_time_choices() {
        let v = duration_choice(INTEGRATION_TIMES);
        assert_eq!(check(&*v, &Value::from("0.2s")).unwrap(), Setting::Duration(200));
        let report = check(&*v, &Value::from("150ms")).unwrap_err();
        assert_eq!(report.count(ErrorKind::ValueInvalid), 1);
    }

    #[test]
    fn test_max31855_inherits_sensor() {
        assert!(MAX31855.inherits(&SENSOR));
        assert!(MAX31855.inherits(&fwgen_schema::blocks::COMPONENT));
    }

    #[test]
    fn test_schemas_build() {
        let ltr = ltr501_schema().unwrap();
        assert!(ltr.contains("i2c_id"));
        assert!(ltr.contains("update_interval"));
        let max = max31855_schema().unwrap();
        assert!(max.contains("cs_pin"));
        assert!(max.contains("name"));
    }
}
