//! A [`CompilerService`] backed by a system C++ driver.
//!
//! Committed declarations accumulate in a session prelude. Every artifact
//! (the session library itself, expression evaluations, statement runs and
//! wrappers) is a shared library compiled from the prelude plus its own code
//! and loaded with global symbol visibility. Definitions the prelude repeats
//! bind to the first loaded copy, so session state is shared; names with
//! internal linkage get one copy per artifact.
//!
//! With a clang driver, each committed declaration is re-dumped as a JSON AST
//! and ingested into the model. Other drivers only validate code; their
//! model grows through [`crate::ModelBuilder`].

use std::ffi::c_void;
use std::path::Path;

use cppi_config::ToolchainConfig;
use cppi_dyld::{DyldError, DynamicLibraryManager};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::ingest::Ingester;
use crate::model::{DeclKind, Lookup, TemplateArg, TypeKind};
use crate::toolchain::Toolchain;
use crate::{
    AccessControl, CompilerError, CompilerService, DeclId, DiagnosticsSilencer, Model, Result,
    TranslationUnit, TypeId, UnitKind,
};

const SESSION_SOURCE: &str = "input.cpp";

struct Session {
    toolchain: Toolchain,
    prelude: String,
    /// The prelude changed since the session library was last built.
    dirty: bool,
    counter: usize,
}

impl Session {
    fn next_serial(&mut self) -> usize {
        self.counter += 1;
        self.counter
    }

    fn with_prelude(&self, code: &str) -> String {
        let mut source = self.prelude.clone();
        source.push('\n');
        source.push_str(code);
        source.push('\n');
        source
    }
}

/// Session-backed compiler service.
pub struct ModelInterpreter {
    model: RwLock<Model>,
    session: Mutex<Session>,
    dyld: Mutex<DynamicLibraryManager>,
    diagnostics: DiagnosticsSilencer,
}

impl ModelInterpreter {
    /// Starts a session. `args` are interpreter arguments such as `-std=` or
    /// `-I` flags.
    pub fn new(config: &ToolchainConfig, args: &[String]) -> Result<Self> {
        Self::with_model(Model::new(), config, args)
    }

    /// Starts a session over an existing model.
    pub fn with_model(model: Model, config: &ToolchainConfig, args: &[String]) -> Result<Self> {
        let toolchain = Toolchain::new(config, args)?;
        Ok(Self {
            model: RwLock::new(model),
            session: Mutex::new(Session {
                toolchain,
                prelude: String::new(),
                dirty: false,
                counter: 0,
            }),
            dyld: Mutex::new(DynamicLibraryManager::new()),
            diagnostics: DiagnosticsSilencer::default(),
        })
    }

    /// Whether committed code is reflected into the model.
    pub fn reflects_source(&self) -> bool {
        self.session.lock().toolchain.is_clang()
    }

    /// Everything committed so far.
    pub fn prelude(&self) -> String {
        self.session.lock().prelude.clone()
    }

    fn report(&self, err: CompilerError) -> CompilerError {
        if let CompilerError::Compile { diagnostics } = &err {
            if !self.diagnostics.is_suppressed() {
                tracing::error!("{}", diagnostics.trim_end());
            }
        }
        err
    }

    fn load_artifact(&self, path: &Path, permanent: bool) -> Result<String> {
        let display = path.display().to_string();
        let canonical = DynamicLibraryManager::normalize_path(&display)
            .ok_or_else(|| DyldError::NotFound(display.clone()))?;
        self.dyld.lock().load_path(&canonical, permanent)?;
        Ok(canonical)
    }

    /// Builds and loads the session library if the prelude changed.
    fn ensure_session_library(&self, session: &mut Session) -> Result<()> {
        if !session.dirty {
            return Ok(());
        }
        let path = session
            .toolchain
            .compile_shared("cppi_session", &session.prelude, &[])
            .map_err(|err| self.report(err))?;
        self.load_artifact(&path, true)?;
        session.dirty = false;
        Ok(())
    }

    fn find(&self, symbol: &str) -> Option<*mut c_void> {
        self.dyld
            .lock()
            .find_symbol(symbol)
            .or_else(|| process_symbol(symbol))
    }

    /// Compiles `code` after the prelude into a throwaway library, calls the
    /// `extern "C"` entry `symbol` through `call`, then unloads the library.
    fn run_transient<T>(
        &self,
        session: &mut Session,
        code: &str,
        symbol: &str,
        call: impl FnOnce(*mut c_void) -> T,
    ) -> Result<T> {
        self.ensure_session_library(session)?;
        let source = session.with_prelude(code);
        let path = session
            .toolchain
            .compile_shared("cppi_transient", &source, &[])
            .map_err(|err| self.report(err))?;
        let canonical = self.load_artifact(&path, false)?;
        let entry = self.dyld.lock().find_symbol(symbol);
        let result = entry.map(call);
        self.dyld.lock().unload_library(&canonical);
        result.ok_or_else(|| CompilerError::SymbolNotFound(symbol.to_string()))
    }

    fn reingest(&self, session: &Session) -> Result<()> {
        if !session.toolchain.is_clang() {
            return Ok(());
        }
        let path = session.toolchain.write_source(SESSION_SOURCE, &session.prelude)?;
        let json = session.toolchain.ast_dump(&path)?;
        let main_file = path.display().to_string();
        let mut model = self.model.write();
        let added = Ingester::new(&mut model, &session.prelude, &main_file).ingest(&json)?;
        tracing::debug!("interpreter: ingested {added} new declarations");
        Ok(())
    }

    fn find_specialization(&self, template: DeclId, args: &[TemplateArg]) -> Option<DeclId> {
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

    fn evaluate_locked(&self, session: &mut Session, expr: &str) -> Result<i64> {
        let serial = session.next_serial();
        let symbol = format!("__cppi_eval_{serial}");
        let code = format!("extern \"C\" long long {symbol}() {{ return (long long)({expr}); }}");
        self.run_transient(session, &code, &symbol, |entry| {
            // SAFETY: the entry was just compiled with exactly this signature.
            let eval = unsafe { std::mem::transmute::<*mut c_void, extern "C" fn() -> i64>(entry) };
            eval()
        })
    }
}

#[cfg(unix)]
fn process_symbol(symbol: &str) -> Option<*mut c_void> {
    let this = libloading::os::unix::Library::this();
    // SAFETY: the address is only handed out, never called here.
    unsafe { this.get::<*mut c_void>(symbol.as_bytes()) }
        .ok()
        .map(|sym| *sym)
        .filter(|addr| !addr.is_null())
}

#[cfg(windows)]
fn process_symbol(symbol: &str) -> Option<*mut c_void> {
    let this = libloading::os::windows::Library::this().ok()?;
    // SAFETY: the address is only handed out, never called here.
    unsafe { this.get::<*mut c_void>(symbol.as_bytes()) }
        .ok()
        .map(|sym| *sym)
        .filter(|addr| !addr.is_null())
}

#[cfg(not(any(unix, windows)))]
fn process_symbol(_symbol: &str) -> Option<*mut c_void> {
    None
}

impl CompilerService for ModelInterpreter {
    fn model(&self) -> RwLockReadGuard<'_, Model> {
        self.model.read()
    }

    fn model_mut(&self) -> RwLockWriteGuard<'_, Model> {
        self.model.write()
    }

    fn parse(&self, code: &str) -> Result<TranslationUnit> {
        let mut session = self.session.lock();
        let serial = session.next_serial();
        let source = session.with_prelude(code);
        let path = session.toolchain.write_source("check.cpp", &source)?;
        let declarations = match session.toolchain.syntax_check(&path) {
            Ok(()) => {
                return Ok(TranslationUnit {
                    code: code.to_string(),
                    kind: UnitKind::Declarations,
                });
            }
            Err(err @ CompilerError::Compile { .. }) => err,
            Err(err) => return Err(err),
        };

        let wrapped = session.with_prelude(&format!(
            "extern \"C\" void __cppi_stmt_{serial}() {{\n{code}\n;}}"
        ));
        let path = session.toolchain.write_source("check.cpp", &wrapped)?;
        match session.toolchain.syntax_check(&path) {
            Ok(()) => Ok(TranslationUnit {
                code: code.to_string(),
                kind: UnitKind::Statements,
            }),
            Err(_) => Err(self.report(declarations)),
        }
    }

    fn execute(&self, unit: TranslationUnit) -> Result<()> {
        let mut session = self.session.lock();
        match unit.kind {
            UnitKind::Declarations => {
                let previous = session.prelude.len();
                session.prelude.push('\n');
                session.prelude.push_str(&unit.code);
                session.dirty = true;
                if let Err(err) = self.reingest(&session) {
                    session.prelude.truncate(previous);
                    return Err(self.report(err));
                }
                Ok(())
            }
            UnitKind::Statements => {
                let serial = session.next_serial();
                let symbol = format!("__cppi_stmt_{serial}");
                let code = format!("extern \"C\" void {symbol}() {{\n{}\n;}}", unit.code);
                self.run_transient(&mut session, &code, &symbol, |entry| {
                    // SAFETY: the entry was just compiled with exactly this signature.
                    let run = unsafe { std::mem::transmute::<*mut c_void, extern "C" fn()>(entry) };
                    run();
                })
            }
        }
    }

    fn evaluate(&self, expr: &str) -> Result<i64> {
        let mut session = self.session.lock();
        self.evaluate_locked(&mut session, expr)
    }

    fn diagnostics(&self) -> &DiagnosticsSilencer {
        &self.diagnostics
    }

    fn symbol_address(&self, symbol: &str) -> Result<*mut c_void> {
        let mut session = self.session.lock();
        self.ensure_session_library(&mut session)?;
        drop(session);
        self.find(symbol)
            .ok_or_else(|| CompilerError::SymbolNotFound(symbol.to_string()))
    }

    fn function_address(&self, func: DeclId) -> Result<*mut c_void> {
        let (mangled, pointer_type, name) = {
            let model = self.model.read();
            let info = model.function(func).ok_or(CompilerError::InvalidDecl)?;
            if info.is_instance_method() || info.is_constructor() || info.is_destructor() {
                return Err(CompilerError::Unsupported(
                    "member functions have no plain address".to_string(),
                ));
            }
            let params: Vec<String> = info
                .params
                .iter()
                .map(|param| model.type_to_string(param.ty))
                .chain(info.variadic.then(|| "...".to_string()))
                .collect();
            let pointer_type = model.print_type(info.return_type, &format!("(*)({})", params.join(", ")));
            (
                info.mangled_name.clone(),
                pointer_type,
                model.qualified_complete_name(func),
            )
        };
        if let Some(mangled) = mangled {
            if let Ok(address) = self.symbol_address(&mangled) {
                return Ok(address);
            }
        }

        let mut session = self.session.lock();
        let serial = session.next_serial();
        let symbol = format!("__cppi_addr_{serial}");
        let code = format!(
            "extern \"C\" void* {symbol}() {{ return (void*)static_cast<{pointer_type}>(&{name}); }}"
        );
        // The address belongs to the session library, which outlives the probe.
        let address = self.run_transient(&mut session, &code, &symbol, |entry| {
            // SAFETY: the entry was just compiled with exactly this signature.
            let probe =
                unsafe { std::mem::transmute::<*mut c_void, extern "C" fn() -> *mut c_void>(entry) };
            probe()
        })?;
        Ok(address)
    }

    fn compile_function(
        &self,
        symbol: &str,
        code: &str,
        access: AccessControl,
    ) -> Result<*mut c_void> {
        let mut session = self.session.lock();
        self.ensure_session_library(&mut session)?;
        let source = session.with_prelude(code);
        let extra: &[&str] = match access {
            AccessControl::Enforced => &[],
            AccessControl::Disabled => &["-fno-access-control"],
        };
        let path = session
            .toolchain
            .compile_shared("cppi_wrapper", &source, extra)
            .map_err(|err| self.report(err))?;
        drop(session);
        self.load_artifact(&path, true)?;
        self.find(symbol)
            .ok_or_else(|| CompilerError::SymbolNotFound(symbol.to_string()))
    }

    fn add_include_path(&self, dir: &str) {
        self.session.lock().toolchain.add_include_path(dir);
    }

    fn include_paths(&self, with_system: bool, with_flags: bool) -> Vec<String> {
        let session = self.session.lock();
        let mut paths = Vec::new();
        for dir in session.toolchain.include_paths() {
            if with_flags {
                paths.push("-I".to_string());
            }
            paths.push(dir.clone());
        }
        if with_system {
            for dir in session.toolchain.system_include_paths() {
                if with_flags {
                    paths.push("-isystem".to_string());
                }
                paths.push(dir.clone());
            }
            let resource_dir = session.toolchain.resource_dir();
            if !resource_dir.is_empty() {
                if with_flags {
                    paths.push("-resource-dir".to_string());
                }
                paths.push(resource_dir);
            }
        }
        paths
    }

    fn resource_dir(&self) -> String {
        self.session.lock().toolchain.resource_dir()
    }

    fn demangle(&self, mangled: &str) -> String {
        self.session.lock().toolchain.demangle(mangled)
    }

    fn dynamic_library_manager(&self) -> &Mutex<DynamicLibraryManager> {
        &self.dyld
    }

    fn load_library(&self, path: &str, lookup: bool) -> Result<()> {
        let mut dyld = self.dyld.lock();
        let canonical = if lookup {
            dyld.lookup(path)
                .ok_or_else(|| DyldError::NotFound(path.to_string()))?
        } else {
            path.to_string()
        };
        dyld.load_path(&canonical, false)?;
        Ok(())
    }

    fn instantiate_class_template(
        &self,
        template: DeclId,
        args: &[TemplateArg],
        instantiate_body: bool,
    ) -> Result<DeclId> {
        let existing = self.find_specialization(template, args);
        if let Some(spec) = existing {
            let complete = self.model.read().record(spec).is_some_and(|info| info.complete);
            if complete && !instantiate_body {
                return Ok(spec);
            }
        }
        if !self.reflects_source() {
            return existing.ok_or_else(|| {
                CompilerError::Unsupported("template instantiation needs a clang driver".to_string())
            });
        }

        let spelled = {
            let model = self.model.read();
            if !matches!(model.decl(template).kind, DeclKind::ClassTemplate(_)) {
                return Err(CompilerError::InvalidDecl);
            }
            format!(
                "{}<{}>",
                model.qualified_name(template),
                model.template_args_text(args)
            )
        };
        let code = if instantiate_body {
            format!("template class {spelled};")
        } else {
            format!("static_assert(sizeof({spelled}) != 0, \"\");")
        };
        self.declare(&code)?;
        self.find_specialization(template, args)
            .ok_or(CompilerError::InvalidDecl)
    }

    fn instantiate_function_template(
        &self,
        template: DeclId,
        args: &[TemplateArg],
    ) -> Result<DeclId> {
        if let Some(spec) = self.find_specialization(template, args) {
            return Ok(spec);
        }
        if !self.reflects_source() {
            return Err(CompilerError::Unsupported(
                "template instantiation needs a clang driver".to_string(),
            ));
        }
        let spelled = {
            let model = self.model.read();
            if !matches!(model.decl(template).kind, DeclKind::FunctionTemplate(_)) {
                return Err(CompilerError::InvalidDecl);
            }
            format!(
                "{}<{}>",
                model.qualified_name(template),
                model.template_args_text(args)
            )
        };
        let serial = self.session.lock().next_serial();
        self.declare(&format!(
            "__attribute__((unused)) static auto __cppi_inst_{serial} = &{spelled};"
        ))?;
        self.find_specialization(template, args)
            .ok_or(CompilerError::InvalidDecl)
    }

    fn instantiate_function_definition(&self, func: DeclId) -> Result<()> {
        let mut model = self.model.write();
        let info = model.function(func).ok_or(CompilerError::InvalidDecl)?;
        if info.defined {
            return Ok(());
        }
        let pattern_defined = info
            .pattern
            .and_then(|pattern| model.function(pattern))
            .is_some_and(|pattern| pattern.defined);
        if !pattern_defined {
            return Err(CompilerError::Unsupported(format!(
                "`{}` has no definition to instantiate",
                model.qualified_complete_name(func)
            )));
        }
        // Taking the specialization's address during instantiation already
        // emitted its body into the session library.
        if let Some(info) = model.function_mut(func) {
            info.defined = true;
        }
        Ok(())
    }

    fn size_of_type(&self, ty: TypeId) -> Result<usize> {
        let (spelled, record) = {
            let mut model = self.model.write();
            if let Some(size) = model.static_size_of(ty) {
                return Ok(size);
            }
            let canonical = model.canonical(ty);
            let record = match model.ty(canonical).kind {
                TypeKind::Record(record) => Some(record),
                _ => None,
            };
            (model.type_to_string(ty), record)
        };
        let size = self.evaluate(&format!("sizeof({spelled})"))?;
        let size = usize::try_from(size).map_err(|_| CompilerError::InvalidDecl)?;
        if let Some(record) = record {
            if let Some(info) = self.model.write().record_mut(record) {
                info.size = Some(size);
            }
        }
        Ok(size)
    }

    fn field_offset(&self, field: DeclId) -> Result<i64> {
        let expr = {
            let model = self.model.read();
            let info = model.decl(field).variable().ok_or(CompilerError::InvalidDecl)?;
            if let Some(offset) = info.offset {
                return Ok(offset);
            }
            if !info.is_field {
                return Err(CompilerError::InvalidDecl);
            }
            let parent = model.decl(field).parent.ok_or(CompilerError::InvalidDecl)?;
            format!(
                "__builtin_offsetof({}, {})",
                model.qualified_complete_name(parent),
                model.name(field)
            )
        };
        let offset = self.evaluate(&expr)?;
        if let DeclKind::Variable(info) = &mut self.model.write().decl_mut(field).kind {
            info.offset = Some(offset);
        }
        Ok(offset)
    }

    fn base_class_offset(&self, derived: DeclId, base: DeclId) -> Result<i64> {
        if derived == base {
            return Ok(0);
        }
        let expr = {
            let mut model = self.model.write();
            let path = model.base_path(derived, base).ok_or(CompilerError::InvalidDecl)?;
            let through_virtual = path.iter().any(|(class, index)| {
                model
                    .record(*class)
                    .and_then(|info| info.bases.get(*index))
                    .is_some_and(|spec| spec.is_virtual)
            });
            if through_virtual {
                return Err(CompilerError::Unsupported(
                    "offsets of virtual bases depend on the object".to_string(),
                ));
            }
            let derived_ty = model.record_type(derived);
            let base_ty = model.record_type(base);
            format!(
                "(char*)static_cast<{} *>(reinterpret_cast<{} *>(4096)) - (char*)4096",
                model.type_to_string(base_ty),
                model.type_to_string(derived_ty)
            )
        };
        self.evaluate(&expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clang_session() -> Option<ModelInterpreter> {
        let config = ToolchainConfig::default();
        if !crate::toolchain::reports_clang(&config.driver) {
            return None;
        }
        ModelInterpreter::new(&config, &[]).ok()
    }

    fn driver_session() -> Option<ModelInterpreter> {
        let driver = crate::toolchain::find_driver(&ToolchainConfig::default().driver)?;
        let config = ToolchainConfig {
            driver,
            ..ToolchainConfig::default()
        };
        ModelInterpreter::new(&config, &[]).ok()
    }

    #[test]
    fn test_missing_driver_fails_to_parse() {
        let config = ToolchainConfig {
            driver: "definitely-not-a-compiler".to_string(),
            ..ToolchainConfig::default()
        };
        let interp = ModelInterpreter::new(&config, &[]).unwrap();
        assert!(!interp.reflects_source());
        assert!(matches!(interp.parse("int x;"), Err(CompilerError::Spawn { .. })));
        assert!(interp.prelude().is_empty());
    }

    #[test]
    fn test_declarations_are_reflected_and_evaluated() {
        let Some(interp) = clang_session() else {
            return;
        };
        interp
            .process("namespace N { int twice(int x) { return 2 * x; } struct P { int a; double b; }; }")
            .unwrap();

        let (twice, p, b) = {
            let model = interp.model();
            let twice = model.lookup_named("N::twice", None).found().unwrap();
            let p = model.lookup_named("N::P", None).found().unwrap();
            let b = model.lookup_named("N::P::b", None).found().unwrap();
            (twice, p, b)
        };
        assert!(interp.model().function(twice).unwrap().defined);
        assert_eq!(interp.evaluate("N::twice(21)").unwrap(), 42);

        let p_ty = interp.model_mut().record_type(p);
        assert_eq!(interp.size_of_type(p_ty).unwrap(), 16);
        assert_eq!(interp.field_offset(b).unwrap(), 8);
        assert!(!interp.function_address(twice).unwrap().is_null());
    }

    #[test]
    fn test_statements_share_session_state() {
        let Some(interp) = driver_session() else {
            return;
        };
        interp.process("int counter = 0;").unwrap();
        let unit = interp.parse("counter += 5;").unwrap();
        assert_eq!(unit.kind, UnitKind::Statements);
        interp.execute(unit).unwrap();
        assert_eq!(interp.evaluate("counter").unwrap(), 5);
        assert!(interp.declare("counter += 1;").is_err());
    }

    #[test]
    fn test_compile_errors_leave_prelude_untouched() {
        let Some(interp) = driver_session() else {
            return;
        };
        let _guard = interp.suppress_diagnostics();
        assert!(matches!(
            interp.process("int broken = ;"),
            Err(CompilerError::Compile { .. })
        ));
        assert!(interp.prelude().trim().is_empty());
        assert!(interp.evaluate("1 +").is_err());
    }
}
