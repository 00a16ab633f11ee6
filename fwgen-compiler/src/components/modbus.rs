// Modbus RTU master on a UART, and register-reading sensors on it

use super::sensor::{register_sensor, sensor_schema, SENSOR};
use super::{decl, int, reference, text};
use crate::codegen::EmissionContext;
use crate::cpp::Arg;
use crate::registry::{ComponentKind, RegistryError};
use crate::session::Instance;
use fwgen_diagnostics::Diagnostic;
use fwgen_schema::blocks::{
    component_schema, polling_component_schema, uart_device_schema, COMPONENT, POLLING_COMPONENT,
};
use fwgen_schema::{cv, IdType, Schema, SchemaError};

pub static MODBUS: IdType = IdType {
    name: "modbus",
    class: "modbus::Modbus",
    parents: &[&COMPONENT],
};

pub static MODBUS_SENSOR: IdType = IdType {
    name: "modbus_sensor",
    class: "modbus::ModbusSensor",
    parents: &[&SENSOR, &POLLING_COMPONENT],
};

pub const REGISTER_TYPES: &[&str] = &["HOLDING", "READ"];
pub const VALUE_TYPES: &[&str] = &["U_WORD", "S_WORD", "U_DWORD", "S_DWORD", "FP32"];

pub fn modbus_schema() -> Schema {
    Schema::new()
        .generate_id("id", cv::declare_id(&MODBUS))
        .optional_default("send_wait_time", cv::positive_duration(), "250ms")
        .optional("flow_control_pin", cv::pin())
}

pub fn modbus() -> Result<ComponentKind, RegistryError> {
    let schema = component_schema()
        .extend(&uart_device_schema())?
        .extend(&modbus_schema())?;
    Ok(ComponentKind::new("modbus", schema, emit_modbus)
        .with_depends_on(&["uart"])
        .with_code_owners(&["@martgras"]))
}

fn emit_modbus(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let var = ctx.new_variable(decl(instance, config, "id")?, &[]);
    ctx.register_component(&var);
    let uart = ctx.referenced(reference(instance, config, "uart_id")?).to_string();
    ctx.call(&var, "set_uart_parent", &[Arg::var(uart)]);
    if let Some(wait) = config.get_duration("send_wait_time") {
        ctx.call(&var, "set_send_wait_time", &[Arg::Millis(wait)]);
    }
    if let Some(pin) = config.get_int("flow_control_pin") {
        ctx.call(&var, "set_flow_control_pin", &[Arg::Int(pin)]);
    }
    ctx.add_define("USE_MODBUS", None);
    Ok(())
}

pub fn modbus_sensor_schema() -> Result<Schema, SchemaError> {
    sensor_schema(&MODBUS_SENSOR)?
        .extend(&polling_component_schema("60s"))?
        .extend(
            &Schema::new()
                .generate_id("modbus_id", cv::use_id(&MODBUS))
                .required("address", cv::hex_int_range(0x01, 0xF7))
                .required("register", cv::hex_int_range(0x0000, 0xFFFF))
                .optional_default(
                    "register_type",
                    cv::enumeration(REGISTER_TYPES).case_insensitive(),
                    "HOLDING",
                )
                .optional_default(
                    "value_type",
                    cv::enumeration(VALUE_TYPES).case_insensitive(),
                    "U_WORD",
                )
                .optional_default("multiply", cv::float_any(), 1.0),
        )
}

pub fn modbus_sensor() -> Result<ComponentKind, RegistryError> {
    Ok(ComponentKind::new("sensor.modbus", modbus_sensor_schema()?, emit_modbus_sensor)
        .with_auto_load(&["modbus"])
        .with_code_owners(&["@martgras"]))
}

fn emit_modbus_sensor(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let var = ctx.new_variable(
        decl(instance, config, "id")?,
        &[
            Arg::Hex(int(instance, config, "address")? as u8),
            Arg::enum_token(
                "modbus::ModbusRegisterType::",
                text(instance, config, "register_type")?,
            ),
            Arg::Int(int(instance, config, "register")?),
            Arg::enum_token(
                "modbus::SensorValueType::",
                text(instance, config, "value_type")?,
            ),
        ],
    );
    ctx.register_component(&var);
    if let Some(interval) = config.get_duration("update_interval") {
        ctx.call(&var, "set_update_interval", &[Arg::Millis(interval)]);
    }
    if let Some(factor) = config.get_float("multiply") {
        ctx.call(&var, "set_multiply", &[Arg::Float(factor)]);
    }
    register_sensor(ctx, &var, config);

    let hub = ctx.referenced(reference(instance, config, "modbus_id")?).to_string();
    ctx.call(&hub, "register_device", &[Arg::var(var)]);
    Ok(())
}
