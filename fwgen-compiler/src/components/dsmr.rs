// DSMR smart meter reader: telegram parser on a UART, optional decryption,
// fixed readings through `sensor.dsmr` and OBIS-coded custom readings.

use super::sensor::{new_sensor, sensor_schema, SENSOR};
use super::{decl, int, reference};
use crate::codegen::EmissionContext;
use crate::cpp::Arg;
use crate::registry::{ComponentKind, RegistryError};
use crate::session::Instance;
use fwgen_diagnostics::Diagnostic;
use fwgen_schema::blocks::{component_schema, uart_device_schema, COMPONENT};
use fwgen_schema::{cv, IdType, Schema, SchemaError};
use fwgen_value::{Setting, Value};

pub static DSMR: IdType = IdType {
    name: "dsmr",
    class: "dsmr::Dsmr",
    parents: &[&COMPONENT],
};

pub const PARSER_LIBRARY: (&str, &str) = ("glmnet/Dsmr", "0.5");
pub const CRYPTO_LIBRARY: (&str, &str) = ("1655", "1.0.2");

/// Fixed readings of `sensor.dsmr`: key and default unit
pub const READINGS: &[(&str, &str)] = &[
    ("energy_delivered_tariff1", "kWh"),
    ("energy_delivered_tariff2", "kWh"),
    ("energy_returned_tariff1", "kWh"),
    ("energy_returned_tariff2", "kWh"),
    ("power_delivered", "kW"),
    ("power_returned", "kW"),
    ("voltage_l1", "V"),
    ("current_l1", "A"),
    ("gas_delivered", "m³"),
];

fn custom_reading() -> Result<Schema, SchemaError> {
    sensor_schema(&SENSOR)?.extend(&Schema::new().required("obis_code", cv::obis_code()?))
}

pub fn dsmr_schema() -> Result<Schema, SchemaError> {
    component_schema().extend(&uart_device_schema())?.extend(
        &Schema::new()
            .generate_id("id", cv::declare_id(&DSMR))
            .optional("decryption_key", cv::byte_list(16, 16))
            .optional_default("crc_check", cv::boolean(), true)
            .optional_default("max_telegram_length", cv::int_range(64, 65535), 1500)
            .optional_default("custom", cv::ensure_list(custom_reading()?), Vec::<Value>::new()),
    )
}

pub fn dsmr() -> Result<ComponentKind, RegistryError> {
    Ok(ComponentKind::new("dsmr", dsmr_schema()?, emit_dsmr)
        .with_depends_on(&["uart"])
        .with_code_owners(&["@glmnet", "@zuidwijk"]))
}

fn emit_dsmr(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let uart = ctx.referenced(reference(instance, config, "uart_id")?).to_string();
    let var = ctx.new_variable(
        decl(instance, config, "id")?,
        &[
            Arg::var(uart),
            Arg::Bool(config.get_bool("crc_check").unwrap_or(true)),
        ],
    );
    ctx.register_component(&var);
    ctx.call(
        &var,
        "set_max_telegram_length",
        &[Arg::Int(int(instance, config, "max_telegram_length")?)],
    );
    if let Some(key) = config.get("decryption_key").and_then(Arg::from_setting) {
        ctx.call(&var, "set_decryption_key", &[key]);
    }

    for reading in config.get_list("custom").unwrap_or_default() {
        let Some(reading) = reading.as_map() else {
            continue;
        };
        let Some(code) = reading.get_str("obis_code") else {
            continue;
        };
        let sensor = new_sensor(instance, ctx, reading)?;
        ctx.call(&var, "register_custom_sensor", &[Arg::str(code), Arg::var(sensor)]);
    }

    ctx.add_define("USE_DSMR", None);
    ctx.add_library(PARSER_LIBRARY.0, Some(PARSER_LIBRARY.1))?;
    ctx.add_library(CRYPTO_LIBRARY.0, Some(CRYPTO_LIBRARY.1))
}

pub fn dsmr_sensor_schema() -> Result<Schema, SchemaError> {
    let mut schema = Schema::new().generate_id("dsmr_id", cv::use_id(&DSMR));
    for (key, unit) in READINGS {
        let reading = sensor_schema(&SENSOR)?.extend(
            &Schema::new()
                .optional_default("unit_of_measurement", cv::string_strict(), *unit)
                .optional_default("accuracy_decimals", cv::int_range(-1, 10), 3),
        )?;
        schema = schema.optional(key, reading);
    }
    Ok(schema)
}

pub fn dsmr_sensor() -> Result<ComponentKind, RegistryError> {
    Ok(ComponentKind::new("sensor.dsmr", dsmr_sensor_schema()?, emit_dsmr_sensor)
        .with_auto_load(&["dsmr"])
        .with_code_owners(&["@glmnet", "@zuidwijk"]))
}

fn emit_dsmr_sensor(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let hub = ctx.referenced(reference(instance, config, "dsmr_id")?).to_string();
    for (key, _) in READINGS {
        if let Some(Setting::Map(reading)) = config.get(key) {
            let sensor = new_sensor(instance, ctx, reading)?;
            ctx.call(&hub, &format!("set_{}", key), &[Arg::var(sensor)]);
        }
    }
    Ok(())
}
