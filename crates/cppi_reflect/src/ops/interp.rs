//! Interpreter lifecycle, code execution, include paths and libraries.

use std::io::Write;

use abi_stable::std_types::{RString, RVec};
use cppi_abi::{API_VERSION, InterpHandle, ScopeHandle, c_int};
use cppi_compiler::toolchain;

use crate::context::InteropContext;

pub fn get_version(_ctx: &InteropContext) -> RString {
    RString::from(format!("CppInterOp version {API_VERSION}"))
}

pub fn demangle(ctx: &InteropContext, mangled_name: &str) -> RString {
    match ctx.service() {
        Some(service) => RString::from(service.demangle(mangled_name)),
        None => RString::from(mangled_name),
    }
}

pub fn enable_debug_output(_ctx: &InteropContext, value: bool) {
    cppi_utils::set_debug_output(value);
}

pub fn is_debug_output_enabled(_ctx: &InteropContext) -> bool {
    cppi_utils::is_debug_output_enabled()
}

/// Prints the declaration behind `scope` to stderr.
pub fn dump_scope(ctx: &InteropContext, scope: ScopeHandle) {
    let text = ctx.query(|model| {
        let decl = model.decl_from_scope(scope)?;
        Some(format!(
            "{} `{}` {:#?}",
            decl.index(),
            model.qualified_complete_name(decl),
            model.decl(decl)
        ))
    });
    if let Some(text) = text {
        let _ = writeln!(std::io::stderr(), "{text}");
    }
}

pub fn create_interpreter(ctx: &InteropContext, args: Vec<String>) -> InterpHandle {
    match ctx.create_interpreter(&args) {
        Ok(handle) => handle,
        Err(err) => {
            tracing::error!("CreateInterpreter failed: {err}");
            InterpHandle::null()
        }
    }
}

pub fn delete_interpreter(ctx: &InteropContext, interp: InterpHandle) -> bool {
    ctx.delete_interpreter(interp)
}

pub fn activate_interpreter(ctx: &InteropContext, interp: InterpHandle) -> bool {
    ctx.activate(interp)
}

pub fn get_interpreter(ctx: &InteropContext) -> InterpHandle {
    ctx.active_handle()
}

/// Makes `interp` the interpreter every following call works on. It must
/// have been returned by `CreateInterpreter` in this process.
pub fn use_external_interpreter(ctx: &InteropContext, interp: InterpHandle) {
    if !ctx.activate(interp) {
        tracing::warn!("UseExternalInterpreter: {interp:?} is not a known interpreter");
    }
}

/// Runs `code`; zero on success.
pub fn process(ctx: &InteropContext, code: &str) -> c_int {
    let Some(service) = ctx.service() else {
        return 1;
    };
    match service.process(code) {
        Ok(()) => 0,
        Err(err) => {
            tracing::debug!("Process failed: {err}");
            1
        }
    }
}

/// Declares `code`; zero on success. `silent` suppresses diagnostics.
pub fn declare(ctx: &InteropContext, code: &str, silent: bool) -> c_int {
    let Some(service) = ctx.service() else {
        return 1;
    };
    let result = if silent {
        let _guard = service.suppress_diagnostics();
        service.declare(code)
    } else {
        service.declare(code)
    };
    match result {
        Ok(()) => 0,
        Err(err) => {
            tracing::debug!("Declare failed: {err}");
            1
        }
    }
}

/// Value of `code` as an integer. Failure returns all bits set and raises
/// `had_error`.
pub fn evaluate(ctx: &InteropContext, code: &str, had_error: Option<&mut bool>) -> isize {
    let result = ctx
        .service()
        .ok_or_else(|| "no interpreter".to_string())
        .and_then(|service| service.evaluate(code).map_err(|err| err.to_string()));
    let (value, failed) = match result {
        Ok(value) => (value as isize, false),
        Err(err) => {
            tracing::debug!("Evaluate failed: {err}");
            (!0, true)
        }
    };
    if let Some(flag) = had_error {
        *flag = failed;
    }
    value
}

pub fn add_include_path(ctx: &InteropContext, dir: &str) {
    if let Some(service) = ctx.service() {
        service.add_include_path(dir);
    }
}

pub fn get_include_paths(ctx: &InteropContext, with_system: bool, with_flags: bool) -> RVec<RString> {
    ctx.service()
        .map(|service| {
            service
                .include_paths(with_system, with_flags)
                .into_iter()
                .map(RString::from)
                .collect()
        })
        .unwrap_or_default()
}

pub fn get_resource_dir(ctx: &InteropContext) -> RString {
    ctx.service()
        .map(|service| RString::from(service.resource_dir()))
        .unwrap_or_default()
}

/// Resource directory reported by a clang binary, `clang` when unnamed.
pub fn detect_resource_dir(_ctx: &InteropContext, clang_binary: &str) -> RString {
    let binary = if clang_binary.is_empty() { "clang" } else { clang_binary };
    RString::from(toolchain::detect_resource_dir(binary))
}

/// Include search list of a system compiler, `c++` when unnamed.
pub fn detect_system_compiler_include_paths(_ctx: &InteropContext, compiler: &str) -> RVec<RString> {
    let compiler = if compiler.is_empty() { "c++" } else { compiler };
    toolchain::detect_system_include_paths(compiler)
        .into_iter()
        .map(RString::from)
        .collect()
}

pub fn add_search_path(ctx: &InteropContext, dir: &str, is_user: bool, prepend: bool) {
    if let Some(service) = ctx.service() {
        service
            .dynamic_library_manager()
            .lock()
            .add_search_path(dir, is_user, prepend);
    }
}

pub fn load_library(ctx: &InteropContext, lib_stem: &str, lookup: bool) -> bool {
    let Some(service) = ctx.service() else {
        return false;
    };
    match service.load_library(lib_stem, lookup) {
        Ok(()) => true,
        Err(err) => {
            tracing::error!("LoadLibrary `{lib_stem}` failed: {err}");
            false
        }
    }
}

/// Absolute path `lib_name` resolves to, empty when it cannot be found.
pub fn lookup_library(ctx: &InteropContext, lib_name: &str) -> RString {
    ctx.service()
        .and_then(|service| service.dynamic_library_manager().lock().lookup(lib_name))
        .map(RString::from)
        .unwrap_or_default()
}

pub fn unload_library(ctx: &InteropContext, lib_stem: &str) {
    if let Some(service) = ctx.service() {
        service.dynamic_library_manager().lock().unload_library(lib_stem);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, interpreter_context, stub_context};
    use cppi_compiler::Model;

    #[test]
    fn test_version_mentions_crate_version() {
        let ctx = context();
        assert!(get_version(&ctx).as_str().contains(API_VERSION));
    }

    #[test]
    fn test_operations_without_interpreter() {
        let ctx = context();
        assert!(get_interpreter(&ctx).is_null());
        assert_eq!(process(&ctx, "int x;"), 1);
        let mut had_error = false;
        assert_eq!(evaluate(&ctx, "1", Some(&mut had_error)), !0);
        assert!(had_error);
        assert!(!load_library(&ctx, "m", true));
        assert!(get_include_paths(&ctx, true, false).is_empty());
        assert_eq!(demangle(&ctx, "_Z1fv").as_str(), "_Z1fv");
    }

    #[test]
    fn test_process_declare_and_evaluate() {
        let (ctx, stub) = stub_context(Model::new());
        assert_eq!(process(&ctx, "int x = 1;"), 0);
        assert_eq!(declare(&ctx, "int y;", true), 0);
        assert_eq!(declare(&ctx, "#error nope", false), 1);
        assert_eq!(stub.processed(), ["int x = 1;", "int y;"]);

        stub.set_evaluation("6 * 7", 42);
        let mut had_error = true;
        assert_eq!(evaluate(&ctx, "6 * 7", Some(&mut had_error)), 42);
        assert!(!had_error);
        assert_eq!(evaluate(&ctx, "unknown", None), !0);
    }

    #[test]
    fn test_include_paths() {
        let (ctx, _stub) = stub_context(Model::new());
        add_include_path(&ctx, "/opt/include");
        add_include_path(&ctx, "/opt/include");
        let plain: Vec<String> = get_include_paths(&ctx, false, false)
            .into_iter()
            .map(RString::into_string)
            .collect();
        assert_eq!(plain, ["/opt/include"]);
        assert_eq!(get_include_paths(&ctx, false, true).len(), 2);
    }

    #[test]
    fn test_interpreter_switching() {
        let (ctx, _first) = stub_context(Model::new());
        let first = get_interpreter(&ctx);
        let second = ctx.register(std::sync::Arc::new(
            cppi_compiler::testing::StubCompiler::new(Model::new()),
        ));
        assert_eq!(get_interpreter(&ctx), second);
        use_external_interpreter(&ctx, first);
        assert_eq!(get_interpreter(&ctx), first);
        assert!(activate_interpreter(&ctx, second));
        assert!(delete_interpreter(&ctx, second));
        assert_eq!(get_interpreter(&ctx), first);
    }

    #[test]
    fn test_library_lookup_misses() {
        let (ctx, _stub) = stub_context(Model::new());
        assert!(lookup_library(&ctx, "definitely_not_a_library_xyz").is_empty());
        assert!(!load_library(&ctx, "/nonexistent/libnothing.so", false));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_load_unload_reload_library() {
        let ctx = interpreter_context();
        let path = lookup_library(&ctx, "libm.so.6").into_string();
        if path.is_empty() {
            eprintln!("skipping: libm.so.6 not found in system search paths");
            return;
        }
        let service = ctx.service().unwrap();
        let is_loaded = |path: &str| service.dynamic_library_manager().lock().is_library_loaded(path);

        assert!(load_library(&ctx, &path, false));
        assert!(is_loaded(&path));
        assert!(load_library(&ctx, "libm.so.6", true));

        unload_library(&ctx, &path);
        assert!(!is_loaded(&path));
        assert!(load_library(&ctx, &path, false));
        assert!(is_loaded(&path));
    }
}
