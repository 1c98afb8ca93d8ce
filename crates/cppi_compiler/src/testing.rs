//! An in-memory [`CompilerService`] for tests of the layers above the
//! compiler. Nothing is compiled: code is recorded, and addresses and
//! evaluation results come from tables the test fills in.

use std::ffi::c_void;

use ahash::AHashMap;
use cppi_dyld::DynamicLibraryManager;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::model::{DeclKind, Lookup};
use crate::{
    AccessControl, CompilerError, CompilerService, DeclId, DiagnosticsSilencer, Model, Result,
    TemplateArg, TranslationUnit, TypeId, UnitKind,
};

/// One `compile_function` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileRequest {
    pub symbol: String,
    pub code: String,
    pub access: AccessControl,
}

#[derive(Default)]
struct Tables {
    symbols: AHashMap<String, usize>,
    evaluations: AHashMap<String, i64>,
    /// Address returned by the next compilations; `None` fails them.
    compile_target: Option<usize>,
    compiled: Vec<CompileRequest>,
    processed: Vec<String>,
    include_paths: Vec<String>,
    base_offsets: AHashMap<(DeclId, DeclId), i64>,
}

pub struct StubCompiler {
    model: RwLock<Model>,
    dyld: Mutex<DynamicLibraryManager>,
    diagnostics: DiagnosticsSilencer,
    tables: Mutex<Tables>,
}

impl StubCompiler {
    pub fn new(model: Model) -> Self {
        Self {
            model: RwLock::new(model),
            dyld: Mutex::new(DynamicLibraryManager::empty()),
            diagnostics: DiagnosticsSilencer::default(),
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Makes compilations succeed with `target` as the symbol address, or
    /// fail when `None`.
    pub fn set_compile_target(&self, target: Option<*mut c_void>) {
        self.tables.lock().compile_target = target.map(|ptr| ptr as usize);
    }

    pub fn define_symbol(&self, name: &str, address: *mut c_void) {
        self.tables.lock().symbols.insert(name.to_string(), address as usize);
    }

    pub fn set_evaluation(&self, expr: &str, value: i64) {
        self.tables.lock().evaluations.insert(expr.to_string(), value);
    }

    pub fn set_base_offset(&self, derived: DeclId, base: DeclId, offset: i64) {
        self.tables.lock().base_offsets.insert((derived, base), offset);
    }

    pub fn compiled(&self) -> Vec<CompileRequest> {
        self.tables.lock().compiled.clone()
    }

    /// Code passed to `process`/`declare`, in order.
    pub fn processed(&self) -> Vec<String> {
        self.tables.lock().processed.clone()
    }

    fn specialization(&self, template: DeclId, args: &[TemplateArg]) -> Option<DeclId> {
        let model = self.model.read();
        let text = format!(
            "{}<{}>",
            model.qualified_name(template),
            model.template_args_text(args)
        );
        match model.lookup_named(&text, None) {
            Lookup::Found(found) => Some(found),
            _ => None,
        }
    }
}

impl CompilerService for StubCompiler {
    fn model(&self) -> RwLockReadGuard<'_, Model> {
        self.model.read()
    }

    fn model_mut(&self) -> RwLockWriteGuard<'_, Model> {
        self.model.write()
    }

    fn parse(&self, code: &str) -> Result<TranslationUnit> {
        if code.contains("#error") {
            return Err(CompilerError::Compile {
                diagnostics: format!("error: {code}"),
            });
        }
        Ok(TranslationUnit {
            code: code.to_string(),
            kind: UnitKind::Declarations,
        })
    }

    fn execute(&self, unit: TranslationUnit) -> Result<()> {
        self.tables.lock().processed.push(unit.code);
        Ok(())
    }

    fn evaluate(&self, expr: &str) -> Result<i64> {
        self.tables
            .lock()
            .evaluations
            .get(expr)
            .copied()
            .ok_or_else(|| CompilerError::Compile {
                diagnostics: format!("cannot evaluate `{expr}`"),
            })
    }

    fn diagnostics(&self) -> &DiagnosticsSilencer {
        &self.diagnostics
    }

    fn symbol_address(&self, symbol: &str) -> Result<*mut c_void> {
        self.tables
            .lock()
            .symbols
            .get(symbol)
            .map(|addr| *addr as *mut c_void)
            .ok_or_else(|| CompilerError::SymbolNotFound(symbol.to_string()))
    }

    fn function_address(&self, func: DeclId) -> Result<*mut c_void> {
        let mangled = self
            .model
            .read()
            .function(func)
            .ok_or(CompilerError::InvalidDecl)?
            .mangled_name
            .clone()
            .ok_or(CompilerError::InvalidDecl)?;
        self.symbol_address(&mangled)
    }

    fn compile_function(
        &self,
        symbol: &str,
        code: &str,
        access: AccessControl,
    ) -> Result<*mut c_void> {
        let mut tables = self.tables.lock();
        tables.compiled.push(CompileRequest {
            symbol: symbol.to_string(),
            code: code.to_string(),
            access,
        });
        tables
            .compile_target
            .map(|addr| addr as *mut c_void)
            .ok_or_else(|| CompilerError::Compile {
                diagnostics: format!("error: cannot compile `{symbol}`"),
            })
    }

    fn add_include_path(&self, dir: &str) {
        let mut tables = self.tables.lock();
        if !tables.include_paths.iter().any(|path| path == dir) {
            tables.include_paths.push(dir.to_string());
        }
    }

    fn include_paths(&self, _with_system: bool, with_flags: bool) -> Vec<String> {
        let tables = self.tables.lock();
        let mut paths = Vec::new();
        for dir in &tables.include_paths {
            if with_flags {
                paths.push("-I".to_string());
            }
            paths.push(dir.clone());
        }
        paths
    }

    fn resource_dir(&self) -> String {
        String::new()
    }

    fn demangle(&self, mangled: &str) -> String {
        mangled.to_string()
    }

    fn dynamic_library_manager(&self) -> &Mutex<DynamicLibraryManager> {
        &self.dyld
    }

    fn load_library(&self, path: &str, _lookup: bool) -> Result<()> {
        self.dyld.lock().load_path(path, true)?;
        Ok(())
    }

    fn instantiate_class_template(
        &self,
        template: DeclId,
        args: &[TemplateArg],
        _instantiate_body: bool,
    ) -> Result<DeclId> {
        self.specialization(template, args).ok_or_else(|| {
            CompilerError::Unsupported("no such specialization in the model".to_string())
        })
    }

    fn instantiate_function_template(
        &self,
        template: DeclId,
        args: &[TemplateArg],
    ) -> Result<DeclId> {
        self.specialization(template, args).ok_or_else(|| {
            CompilerError::Unsupported("no such specialization in the model".to_string())
        })
    }

    fn instantiate_function_definition(&self, func: DeclId) -> Result<()> {
        let mut model = self.model.write();
        let pattern_defined = model
            .function(func)
            .and_then(|info| info.pattern)
            .and_then(|pattern| model.function(pattern))
            .is_some_and(|pattern| pattern.defined);
        let info = model.function_mut(func).ok_or(CompilerError::InvalidDecl)?;
        if pattern_defined {
            info.defined = true;
        }
        Ok(())
    }

    fn size_of_type(&self, ty: TypeId) -> Result<usize> {
        self.model
            .write()
            .static_size_of(ty)
            .ok_or_else(|| CompilerError::Unsupported("layout unknown".to_string()))
    }

    fn field_offset(&self, field: DeclId) -> Result<i64> {
        match &self.model.read().decl(field).kind {
            DeclKind::Variable(info) => info.offset.ok_or(CompilerError::InvalidDecl),
            _ => Err(CompilerError::InvalidDecl),
        }
    }

    fn base_class_offset(&self, derived: DeclId, base: DeclId) -> Result<i64> {
        if derived == base {
            return Ok(0);
        }
        self.tables
            .lock()
            .base_offsets
            .get(&(derived, base))
            .copied()
            .ok_or(CompilerError::InvalidDecl)
    }
}
