// Web server: HTTP port, frontend version and optional basic auth

use super::{decl, int, text};
use crate::codegen::EmissionContext;
use crate::cpp::Arg;
use crate::registry::{ComponentKind, RegistryError};
use crate::session::Instance;
use fwgen_diagnostics::Diagnostic;
use fwgen_schema::blocks::{component_schema, COMPONENT};
use fwgen_schema::{cv, IdType, Schema};

pub static WEB_SERVER: IdType = IdType {
    name: "web_server",
    class: "web_server::WebServer",
    parents: &[&COMPONENT],
};

fn credential() -> Result<fwgen_schema::Validator, RegistryError> {
    Ok(cv::pattern(r"^.+$", "non-empty string")?)
}

pub fn schema() -> Result<Schema, RegistryError> {
    let auth = Schema::new()
        .required("username", credential()?)
        .required("password", credential()?);
    Ok(component_schema().extend(
        &Schema::new()
            .generate_id("id", cv::declare_id(&WEB_SERVER))
            .optional_default("port", cv::port(), 80)
            .optional_default("version", cv::int_range(1, 3), 2)
            .optional("auth", auth),
    )?)
}

pub fn web_server() -> Result<ComponentKind, RegistryError> {
    Ok(ComponentKind::new("web_server", schema()?, emit))
}

fn emit(instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    let config = &instance.config;
    let port = int(instance, config, "port")?;
    let version = int(instance, config, "version")?;

    let var = ctx.new_variable(decl(instance, config, "id")?, &[]);
    ctx.register_component(&var);
    ctx.call(&var, "set_port", &[Arg::Int(port)]);
    if let Some(auth) = config.get_map("auth") {
        ctx.call(&var, "set_auth_username", &[Arg::str(text(instance, auth, "username")?)]);
        ctx.call(&var, "set_auth_password", &[Arg::str(text(instance, auth, "password")?)]);
    }

    ctx.add_define("USE_WEBSERVER", None);
    ctx.add_define("USE_WEBSERVER_PORT", Some(port.to_string().as_str()));
    ctx.add_define("USE_WEBSERVER_VERSION", Some(version.to_string().as_str()));
    Ok(())
}
