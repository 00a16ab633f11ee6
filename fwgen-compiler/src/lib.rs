// fwgen compiler
// Component registry, loader, dependency ordering, emission and the
// artifact writer.

pub mod codegen;
pub mod components;
pub mod config;
pub mod cpp;
pub mod emitter;
pub mod graph;
pub mod loader;
pub mod registry;
pub mod session;
pub mod substitutions;
pub mod writer;

pub use codegen::{EmissionContext, LibraryPin, Statement};
pub use config::CodegenConfig;
pub use emitter::ComponentEmitter;
pub use registry::{ComponentKind, ComponentRegistry, RegistryError};
pub use session::{Instance, Session};
pub use writer::WriteError;

use fwgen_diagnostics::ValidationReport;
use fwgen_schema::InstanceId;
use fwgen_value::Document;
use log::info;

/// Result of a successful run
#[derive(Debug)]
pub struct Compilation {
    pub session: Session,
    pub order: Vec<InstanceId>,
    pub output: EmissionContext,
}

/// Full pipeline: validate, link, order and emit. Either a complete
/// emission context or the report; never a partial result.
pub fn compile(document: &Document, registry: &ComponentRegistry) -> Result<Compilation, ValidationReport> {
    let session = loader::load(document, registry)?;
    let order = graph::order(&session, registry).map_err(ValidationReport::from)?;

    let mut output = EmissionContext::new(session.symbols());
    for &id in &order {
        let Some(instance) = session.instance(id) else {
            continue;
        };
        let Some(kind) = registry.get(&instance.kind) else {
            continue;
        };
        output.begin_instance(id, session.label(id), instance.path.clone());
        let emitted = kind.emitter.emit(instance, &mut output);
        output.end_instance();
        emitted.map_err(ValidationReport::from)?;
    }

    info!(
        "emitted {} statement(s) for {} instance(s)",
        output.statements().len(),
        order.len()
    );
    Ok(Compilation {
        session,
        order,
        output,
    })
}

/// Every diagnostic the pipeline would stop on; empty when `compile`
/// succeeds
pub fn validate(document: &Document, registry: &ComponentRegistry) -> ValidationReport {
    match compile(document, registry) {
        Ok(_) => ValidationReport::new(),
        Err(report) => report,
    }
}
