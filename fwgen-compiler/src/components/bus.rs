// Bus controllers: I2C, SPI and UART. Each may appear several times and
// is referenced by devices through `i2c_id`, `spi_id` or `uart_id`.

use super::{decl, int};
use crate::codegen::EmissionContext;
use crate::cpp::Arg;
use crate::registry::{ComponentKind, RegistryError};
use crate::session::Instance;
use fwgen_diagnostics::Diagnostic;
use fwgen_schema::blocks::{component_schema, COMPONENT, I2C_BUS, SPI_BUS, UART_BUS};
use fwgen_schema::{cv, IdType, Schema, SchemaError};

pub static ARDUINO_I2C_BUS: IdType = IdType {
    name: "i2c_bus",
    class: "i2c::ArduinoI2CBus",
    parents: &[&I2C_BUS, &COMPONENT],
};

pub const PARITIES: &[&str] = &["NONE", "EVEN", "ODD"];

fn base(schema: Schema) -> Result<Schema, SchemaError> {
    component_schema().extend(&schema)
}

pub fn i2c_schema() -> Result<Schema, SchemaError> {
    base(
        Schema::new()
            .generate_id("id", cv::declare_id(&ARDUINO_I2C_BUS))
            .optional_default("sda", cv::pin(), 21)
            .optional_default("scl", cv::pin(), 22)
            .optional_default("frequency", cv::int_range(10_000, 1_000_000), 50_000)
            .optional_default("scan", cv::boolean(), true),
    )
}

pub fn spi_schema() -> Result<Schema, SchemaError> {
    base(
        Schema::new()
            .generate_id("id", cv::declare_id(&SPI_BUS))
            .required("clk_pin", cv::pin())
            .optional("miso_pin", cv::pin())
            .optional("mosi_pin", cv::pin())
            .has_at_least_one_key(&["miso_pin", "mosi_pin"]),
    )
}

pub fn uart_schema() -> Result<Schema, SchemaError> {
    base(
        Schema::new()
            .generate_id("id", cv::declare_id(&UART_BUS))
            .required("baud_rate", cv::positive_int())
            .optional("tx_pin", cv::pin())
            .optional("rx_pin", cv::pin())
            .optional_default("rx_buffer_size", cv::int_range(1, 65535), 256)
            .optional_default("stop_bits", cv::int_range(1, 2), 1)
            .optional_default("data_bits", cv::int_range(5, 8), 8)
            .optional_default("parity", cv::enumeration(PARITIES).case_insensitive(), "NONE")
            .has_at_least_one_key(&["tx_pin", "rx_pin"]),
    )
}

pub fn i2c() -> Result<ComponentKind, RegistryError> {
    Ok(ComponentKind::new("i2c", i2c_schema()?, emit_i2c)
        .with_multi_conf()
        .with_code_owners(&["@fwgen/core"]))
}

pub fn spi() -> Result<ComponentKind, RegistryError> {
    Ok(ComponentKind::new("spi", spi_schema()?, emit_spi)
        .with_multi_conf()
        .with_code_owners(&["@fwgen/core"]))
}

pub fn uart() -> Result<ComponentKind, RegistryError> {
    Ok(ComponentKind::new("uart", uart_schema()?, emit_uart)
        .with_multi_conf()
        .with_code_owners(&["@fwgen/core"]))
}

fn optional_pin(ctx: &mut EmissionContext, var: &str, setter: &str, pin: Option<i64>) {
    if let Some(pin) = pin {
        ctx.call(var, setter, &[Arg::Int(pin)]);
    }
}

fn emit_i2c(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let var = ctx.new_variable(decl(instance, config, "id")?, &[]);
    ctx.register_component(&var);
    ctx.call(&var, "set_sda_pin", &[Arg::Int(int(instance, config, "sda")?)]);
    ctx.call(&var, "set_scl_pin", &[Arg::Int(int(instance, config, "scl")?)]);
    ctx.call(&var, "set_frequency", &[Arg::Int(int(instance, config, "frequency")?)]);
    ctx.call(
        &var,
        "set_scan",
        &[Arg::Bool(config.get_bool("scan").unwrap_or(true))],
    );
    ctx.add_define("USE_I2C", None);
    ctx.add_library("Wire", None)
}

fn emit_spi(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let var = ctx.new_variable(decl(instance, config, "id")?, &[]);
    ctx.register_component(&var);
    ctx.call(&var, "set_clk", &[Arg::Int(int(instance, config, "clk_pin")?)]);
    optional_pin(ctx, &var, "set_miso", config.get_int("miso_pin"));
    optional_pin(ctx, &var, "set_mosi", config.get_int("mosi_pin"));
    ctx.add_define("USE_SPI", None);
    ctx.add_library("SPI", None)
}

fn emit_uart(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let var = ctx.new_variable(decl(instance, config, "id")?, &[]);
    ctx.register_component(&var);
    ctx.call(&var, "set_baud_rate", &[Arg::Int(int(instance, config, "baud_rate")?)]);
    optional_pin(ctx, &var, "set_tx_pin", config.get_int("tx_pin"));
    optional_pin(ctx, &var, "set_rx_pin", config.get_int("rx_pin"));
    ctx.call(
        &var,
        "set_rx_buffer_size",
        &[Arg::Int(int(instance, config, "rx_buffer_size")?)],
    );
    ctx.call(&var, "set_stop_bits", &[Arg::Int(int(instance, config, "stop_bits")?)]);
    ctx.call(&var, "set_data_bits", &[Arg::Int(int(instance, config, "data_bits")?)]);
    let parity = config.get_str("parity").unwrap_or("NONE");
    ctx.call(
        &var,
        "set_parity",
        &[Arg::enum_token("uart::UART_CONFIG_PARITY_", parity)],
    );
    ctx.add_define("USE_UART", None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwgen_diagnostics::ErrorKind;
    use fwgen_schema::check;
    use fwgen_value::Document;

    #[test]
    fn test_uart_needs_a_pin() {
        let doc = Document::parse("baud_rate: 9600\n").unwrap();
        let report = check(&uart_schema().unwrap(), &fwgen_value::Value::Map(doc.root)).unwrap_err();
        assert_eq!(report.count(ErrorKind::OneOfViolation), 1);
    }

    #[test]
    fn test_uart_defaults() {
        let doc = Document::parse("baud_rate: 9600\ntx_pin: GPIO1\nparity: even\n").unwrap();
        let out = check(&uart_schema().unwrap(), &fwgen_value::Value::Map(doc.root)).unwrap();
        let config = out.as_map().unwrap();
        assert_eq!(config.get_int("tx_pin"), Some(1));
        assert_eq!(config.get_int("data_bits"), Some(8));
        assert_eq!(config.get_str("parity"), Some("EVEN"));
    }

    #[test]
    fn test_i2c_bus_inherits_generic_bus() {
        assert!(ARDUINO_I2C_BUS.inherits(&I2C_BUS));
        assert!(!I2C_BUS.inherits(&ARDUINO_I2C_BUS));
    }
}
