// Emission callbacks

use crate::codegen::EmissionContext;
use crate::session::Instance;
use fwgen_diagnostics::Diagnostic;

/// Turns one validated instance into native-source statements
pub trait ComponentEmitter: Send + Sync {
    /// Append this instance's statements, includes and library pins
    fn emit(&self, instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic>;
}

impl<F> ComponentEmitter for F
where
    F: Fn(&Instance, &mut EmissionContext) -> Result<(), Diagnostic> + Send + Sync,
{
    fn emit(&self, instance: &Instance, ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
        self(instance, ctx)
    }
}

/// Emitter for kinds that only contribute configuration
pub fn noop(_instance: &Instance, _ctx: &mut EmissionContext) -> Result<(), Diagnostic> {
    Ok(())
}
