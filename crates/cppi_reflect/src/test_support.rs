//! Contexts over in-memory compilers for the operation tests.

use std::sync::Arc;

use cppi_compiler::{Model, ModelInterpreter};
use cppi_compiler::testing::StubCompiler;
use cppi_config::{InteropConfig, ToolchainConfig};

use crate::context::InteropContext;

pub fn context() -> InteropContext {
    InteropContext::new(InteropConfig::default())
}

/// A context whose active interpreter serves `model`.
pub fn stub_context(model: Model) -> (InteropContext, Arc<StubCompiler>) {
    let ctx = context();
    let stub = Arc::new(StubCompiler::new(model));
    ctx.register(stub.clone());
    (ctx, stub)
}

/// A context over a toolchain session; no driver is needed until code is
/// compiled.
pub fn interpreter_context() -> InteropContext {
    let ctx = context();
    let interp = ModelInterpreter::new(&ToolchainConfig::default(), &[]).unwrap();
    ctx.register(Arc::new(interp));
    ctx
}
