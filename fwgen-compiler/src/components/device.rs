// Core device settings: node name, target platform, board and extra
// libraries.

use super::text;
use crate::codegen::EmissionContext;
use crate::cpp::Arg;
use crate::registry::{ComponentKind, RegistryError};
use crate::session::Instance;
use fwgen_diagnostics::Diagnostic;
use fwgen_schema::{cv, Schema};
use fwgen_value::{Setting, Value};

pub const PLATFORMS: &[&str] = &["ESP8266", "ESP32"];

pub fn schema() -> Result<Schema, RegistryError> {
    Ok(Schema::new()
        .required(
            "name",
            cv::pattern(r"^[a-z0-9_-]+$", "lowercase name (a-z, 0-9, '_' and '-')")?,
        )
        .required("platform", cv::enumeration(PLATFORMS).case_insensitive())
        .required("board", cv::string_strict())
        .optional("comment", cv::string())
        .optional_default("includes", cv::ensure_list(cv::string_strict()), Vec::<Value>::new())
        .optional_default("libraries", cv::ensure_list(cv::string_strict()), Vec::<Value>::new()))
}

pub fn device() -> Result<ComponentKind, RegistryError> {
    Ok(ComponentKind::new("device", schema()?, emit)
        .with_core()
        .with_code_owners(&["@fwgen/core"]))
}

/// `name@version` or bare `name`
pub fn split_library(entry: &str) -> (&str, Option<&str>) {
    match entry.split_once('@') {
        Some((name, version)) => (name, Some(version)),
        None => (entry, None),
    }
}

fn strings(setting: Option<&[Setting]>) -> impl Iterator<Item = &str> {
    setting.unwrap_or_default().iter().filter_map(Setting::as_str)
}

fn emit(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let name = text(instance, config, "name")?;
    let platform = text(instance, config, "platform")?;

    ctx.set_environment(name);
    ctx.set_platformio_option("board", text(instance, config, "board")?);
    ctx.set_platformio_option("framework", "arduino");
    ctx.set_platformio_option(
        "platform",
        if platform == "ESP32" {
            "espressif32"
        } else {
            "espressif8266"
        },
    );

    ctx.add(format!(
        "App.pre_setup({}, __DATE__ \", \" __TIME__);",
        Arg::str(name)
    ));
    ctx.add_define(&format!("USE_{}", platform), None);

    if platform == "ESP32" {
        ctx.add_library("ESPmDNS", None)?;
    } else {
        ctx.add_library("ESP8266WiFi", None)?;
        ctx.add_library("ESP8266mDNS", None)?;
    }
    for entry in strings(config.get_list("libraries")) {
        let (library, version) = split_library(entry);
        ctx.add_library(library, version)?;
    }
    for header in strings(config.get_list("includes")) {
        ctx.add_include(header);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_library() {
        assert_eq!(split_library("glmnet/Dsmr@0.5"), ("glmnet/Dsmr", Some("0.5")));
        assert_eq!(split_library("Wire"), ("Wire", None));
    }
}
