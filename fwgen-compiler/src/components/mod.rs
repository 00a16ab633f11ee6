// Built-in component catalog

pub mod bus;
pub mod device;
pub mod dsmr;
pub mod gpio;
pub mod logger;
pub mod modbus;
pub mod sensor;
pub mod web_server;

use crate::codegen::EmissionContext;
use crate::cpp::Arg;
use crate::registry::{ComponentRegistry, RegistryError};
use crate::session::Instance;
use fwgen_diagnostics::{Diagnostic, ErrorKind};
use fwgen_value::{DeclId, RefId, Settings};

/// Platform domains known to the catalog
pub const DOMAINS: &[&str] = &["sensor", "switch", "output", "light"];

/// Registry with every built-in kind
pub fn builtin_registry() -> Result<ComponentRegistry, RegistryError> {
    let mut registry = ComponentRegistry::new();
    for domain in DOMAINS {
        registry.register_domain(domain);
    }

    registry.register(device::device()?)?;
    registry.register(logger::logger())?;
    registry.register(bus::i2c()?)?;
    registry.register(bus::spi()?)?;
    registry.register(bus::uart()?)?;
    registry.register(modbus::modbus()?)?;
    registry.register(dsmr::dsmr()?)?;
    registry.register(web_server::web_server()?)?;

    registry.register(sensor::ltr501()?)?;
    registry.register(sensor::max31855()?)?;
    registry.register(modbus::modbus_sensor()?)?;
    registry.register(dsmr::dsmr_sensor()?)?;
    registry.register(gpio::gpio_output()?)?;
    registry.register(gpio::gpio_switch()?)?;
    registry.register(gpio::binary_light()?)?;

    registry.verify()?;
    log::debug!("built-in registry holds {} kind(s)", registry.len());
    Ok(registry)
}

/// Name and visibility setters shared by entities
pub(crate) fn entity_setters(ctx: &mut EmissionContext, var: &str, config: &Settings) {
    if let Some(name) = config.get_str("name") {
        ctx.call(var, "set_name", &[Arg::str(name)]);
    }
    if config.get_bool("internal") == Some(true) {
        ctx.call(var, "set_internal", &[Arg::Bool(true)]);
    }
    if config.get_bool("disabled_by_default") == Some(true) {
        ctx.call(var, "set_disabled_by_default", &[Arg::Bool(true)]);
    }
    if let Some(icon) = config.get_str("icon") {
        ctx.call(var, "set_icon", &[Arg::str(icon)]);
    }
}

fn missing(instance: &Instance, key: &str) -> Diagnostic {
    Diagnostic::new(
        ErrorKind::MissingRequired,
        format!("validated configuration lacks '{}'", key),
        instance.path.key(key),
    )
}

/// Declared id stored under `key`
pub(crate) fn decl(instance: &Instance, config: &Settings, key: &str) -> Result<DeclId, Diagnostic> {
    config.get_decl(key).ok_or_else(|| missing(instance, key))
}

/// Reference stored under `key`
pub(crate) fn reference(instance: &Instance, config: &Settings, key: &str) -> Result<RefId, Diagnostic> {
    config.get_ref(key).ok_or_else(|| missing(instance, key))
}

pub(crate) fn int(instance: &Instance, config: &Settings, key: &str) -> Result<i64, Diagnostic> {
    config.get_int(key).ok_or_else(|| missing(instance, key))
}

pub(crate) fn text<'a>(instance: &Instance, config: &'a Settings, key: &str) -> Result<&'a str, Diagnostic> {
    config.get_str(key).ok_or_else(|| missing(instance, key))
}

pub(crate) fn lambda<'a>(instance: &Instance, config: &'a Settings, key: &str) -> Result<&'a str, Diagnostic> {
    config.get_lambda(key).ok_or_else(|| missing(instance, key))
}

pub(crate) fn millis(instance: &Instance, config: &Settings, key: &str) -> Result<u64, Diagnostic> {
    config.get_duration(key).ok_or_else(|| missing(instance, key))
}
