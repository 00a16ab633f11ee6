// Logger: global level, serial baud rate and per-tag overrides

use super::{decl, int, text};
use crate::codegen::EmissionContext;
use crate::cpp::Arg;
use crate::registry::ComponentKind;
use crate::session::Instance;
use fwgen_diagnostics::{Diagnostic, ErrorKind};
use fwgen_schema::blocks::COMPONENT;
use fwgen_schema::{cv, Context, IdType, Rejected, Schema, Validate, ValueType};
use fwgen_value::{Setting, Settings, Value};

pub static LOGGER: IdType = IdType {
    name: "logger",
    class: "logger::Logger",
    parents: &[&COMPONENT],
};

pub const LEVELS: &[&str] = &["NONE", "ERROR", "WARN", "INFO", "DEBUG", "VERBOSE", "VERY_VERBOSE"];

/// Mapping of log tag to level; tags are free-form
struct TagLevels(cv::Enumeration);

impl Validate for TagLevels {
    fn validate(&self, value: &Value, cx: &mut Context<'_>) -> Result<Setting, Rejected> {
        let Value::Map(map) = value else {
            if value.is_null() {
                return Ok(Setting::Map(Settings::new()));
            }
            return Err(cx.fail(
                ErrorKind::ValueInvalid,
                format!("expected a dictionary, got {}", value.type_name()),
            ));
        };

        let mut out = Settings::new();
        let mut failed = false;
        for (tag, level) in map {
            match cx.at_key(tag, |cx| self.0.validate(level, cx)) {
                Ok(setting) => out.insert(tag.clone(), setting),
                Err(Rejected) => failed = true,
            }
        }
        if failed {
            Err(Rejected)
        } else {
            Ok(Setting::Map(out))
        }
    }

    fn value_type(&self) -> ValueType {
        ValueType::Map
    }

    fn describe(&self) -> String {
        format!("mapping{{*: {}}}", self.0.describe())
    }
}

fn level() -> cv::Enumeration {
    cv::enumeration(LEVELS).case_insensitive()
}

pub fn schema() -> Schema {
    Schema::new()
        .generate_id("id", cv::declare_id(&LOGGER))
        .optional_default("baud_rate", cv::int_range(0, 4_000_000), 115200)
        .optional_default("tx_buffer_size", cv::int_range(0, 65535), 512)
        .optional_default("level", level(), "DEBUG")
        .optional("logs", TagLevels(level()))
}

pub fn logger() -> ComponentKind {
    ComponentKind::new("logger", schema(), emit).with_code_owners(&["@fwgen/core"])
}

fn emit(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let id = decl(instance, config, "id")?;
    let var = ctx.new_variable(
        id,
        &[
            Arg::Int(int(instance, config, "baud_rate")?),
            Arg::Int(int(instance, config, "tx_buffer_size")?),
        ],
    );
    ctx.call(&var, "pre_setup", &[]);

    if let Some(tags) = config.get_map("logs") {
        for (tag, level) in tags.iter() {
            if let Some(level) = level.as_str() {
                ctx.call(
                    &var,
                    "set_log_level",
                    &[Arg::str(tag), Arg::var(format!("ESPHOME_LOG_LEVEL_{}", level))],
                );
            }
        }
    }
    ctx.register_component(&var);

    let level = text(instance, config, "level")?;
    ctx.add_define("USE_LOGGER", None);
    ctx.add_define("ESPHOME_LOG_LEVEL", Some(format!("ESPHOME_LOG_LEVEL_{}", level).as_str()));
    Ok(())
}
