//! The compiler service behind the reflection API.
//!
//! A [`CompilerService`] owns a declaration [`Model`] plus whatever backend
//! turns C++ text into callable code. [`ModelInterpreter`] drives a system
//! C++ compiler; tests use in-memory stand-ins.

pub mod builder;
pub mod ingest;
pub mod interpreter;
pub mod model;
pub mod spelling;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod toolchain;

use std::ffi::c_void;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cppi_dyld::{DyldError, DynamicLibraryManager};
use parking_lot::{Mutex, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

pub use builder::{FunctionBuilder, ModelBuilder};
pub use interpreter::ModelInterpreter;
pub use model::{DeclId, Model, TemplateArg, TypeId};
pub use toolchain::Toolchain;

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("compilation failed:\n{diagnostics}")]
    Compile { diagnostics: String },
    #[error("malformed AST dump: {0}")]
    AstDump(#[from] serde_json::Error),
    #[error("symbol `{0}` not found")]
    SymbolNotFound(String),
    #[error("declaration is not valid here")]
    InvalidDecl,
    #[error("{0}")]
    Unsupported(String),
    #[error(transparent)]
    Dyld(#[from] DyldError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = CompilerError> = std::result::Result<T, E>;

/// Whether declarations run through access checking when compiled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessControl {
    Enforced,
    Disabled,
}

/// Parsed input not yet committed to the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslationUnit {
    pub code: String,
    pub kind: UnitKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitKind {
    /// Top-level declarations.
    Declarations,
    /// Statements run once for their side effects.
    Statements,
}

/// Counts active diagnostic suppressions; diagnostics are printed only
/// while the count is zero.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticsSilencer {
    depth: Arc<AtomicUsize>,
}

impl DiagnosticsSilencer {
    pub fn suppress(&self) -> DiagnosticsGuard {
        self.depth.fetch_add(1, Ordering::SeqCst);
        DiagnosticsGuard {
            depth: Arc::clone(&self.depth),
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }
}

/// Restores diagnostic output when dropped.
#[must_use]
#[derive(Debug)]
pub struct DiagnosticsGuard {
    depth: Arc<AtomicUsize>,
}

impl Drop for DiagnosticsGuard {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Parse, execute and introspect C++ code.
pub trait CompilerService: Send + Sync {
    fn model(&self) -> RwLockReadGuard<'_, Model>;

    fn model_mut(&self) -> RwLockWriteGuard<'_, Model>;

    /// Checks `code` without committing it.
    fn parse(&self, code: &str) -> Result<TranslationUnit>;

    /// Commits a parsed unit to the session.
    fn execute(&self, unit: TranslationUnit) -> Result<()>;

    fn process(&self, code: &str) -> Result<()> {
        let unit = self.parse(code)?;
        self.execute(unit)
    }

    /// Commits declarations only; statements are rejected.
    fn declare(&self, code: &str) -> Result<()> {
        let unit = self.parse(code)?;
        if unit.kind != UnitKind::Declarations {
            return Err(CompilerError::Unsupported(
                "statements cannot be declared".to_string(),
            ));
        }
        self.execute(unit)
    }

    /// Evaluates an expression converted to a signed integer.
    fn evaluate(&self, expr: &str) -> Result<i64>;

    fn diagnostics(&self) -> &DiagnosticsSilencer;

    fn suppress_diagnostics(&self) -> DiagnosticsGuard {
        self.diagnostics().suppress()
    }

    /// Address of a symbol defined by session code or a loaded library.
    fn symbol_address(&self, symbol: &str) -> Result<*mut c_void>;

    /// Address of the code for `func`, emitting it if needed.
    fn function_address(&self, func: DeclId) -> Result<*mut c_void>;

    /// Compiles a standalone definition and returns the address of `symbol`.
    fn compile_function(
        &self,
        symbol: &str,
        code: &str,
        access: AccessControl,
    ) -> Result<*mut c_void>;

    fn add_include_path(&self, dir: &str);

    fn include_paths(&self, with_system: bool, with_flags: bool) -> Vec<String>;

    fn resource_dir(&self) -> String;

    fn demangle(&self, mangled: &str) -> String;

    fn dynamic_library_manager(&self) -> &Mutex<DynamicLibraryManager>;

    /// Loads a shared library so its symbols resolve for session code.
    fn load_library(&self, path: &str, lookup: bool) -> Result<()>;

    /// Completes `template<args>`; with `instantiate_body` member definitions
    /// are emitted too.
    fn instantiate_class_template(
        &self,
        template: DeclId,
        args: &[TemplateArg],
        instantiate_body: bool,
    ) -> Result<DeclId>;

    fn instantiate_function_template(&self, template: DeclId, args: &[TemplateArg])
    -> Result<DeclId>;

    /// Makes sure the body of a template specialization is available.
    fn instantiate_function_definition(&self, func: DeclId) -> Result<()>;

    /// Size of a type whose layout the model does not know yet.
    fn size_of_type(&self, ty: TypeId) -> Result<usize>;

    fn field_offset(&self, field: DeclId) -> Result<i64>;

    fn base_class_offset(&self, derived: DeclId, base: DeclId) -> Result<i64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_guard_nests() {
        let silencer = DiagnosticsSilencer::default();
        assert!(!silencer.is_suppressed());
        {
            let _outer = silencer.suppress();
            let _inner = silencer.suppress();
            assert!(silencer.is_suppressed());
        }
        assert!(!silencer.is_suppressed());
    }
}
