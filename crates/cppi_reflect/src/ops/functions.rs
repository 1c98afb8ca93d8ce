//! Methods, free functions and operators.

use abi_stable::std_types::{RString, RVec};
use cppi_abi::{FunctionHandle, Operator, OperatorArity, ScopeHandle, TypeHandle, c_void};
use cppi_compiler::model::{Access, DeclKind, FunctionInfo, Lookup, SpecialMember, TemplatedKind, TypeKind};
use cppi_compiler::{DeclId, Model};

use crate::context::InteropContext;

fn function_is(ctx: &InteropContext, func: FunctionHandle, test: impl FnOnce(&FunctionInfo) -> bool) -> bool {
    ctx.query(|model| {
        let decl = model.decl_from_function(func)?;
        model.function(decl).map(test)
    })
    .unwrap_or(false)
}

/// Class behind `scope`, looking through a typedef.
fn class_of(model: &mut Model, scope: ScopeHandle) -> Option<DeclId> {
    let decl = model.decl_from_scope(scope)?;
    model.record_of_decl(decl)
}

fn handles(decls: impl IntoIterator<Item = DeclId>) -> RVec<FunctionHandle> {
    decls.into_iter().map(DeclId::function).collect()
}

/// Every method of a class, implicit special members included.
pub fn get_class_methods(ctx: &InteropContext, klass: ScopeHandle) -> RVec<FunctionHandle> {
    ctx.query_mut(|model| {
        let record = class_of(model, klass)?;
        Some(handles(model.methods(record)))
    })
    .unwrap_or_default()
}

/// Member function templates of a class.
pub fn get_function_templated_decls(ctx: &InteropContext, klass: ScopeHandle) -> RVec<FunctionHandle> {
    ctx.query_mut(|model| {
        let record = class_of(model, klass)?;
        let templates = model
            .decl(record)
            .members
            .iter()
            .copied()
            .filter(|member| matches!(model.decl(*member).kind, DeclKind::FunctionTemplate(_)));
        Some(handles(templates))
    })
    .unwrap_or_default()
}

pub fn has_default_constructor(ctx: &InteropContext, scope: ScopeHandle) -> bool {
    !get_default_constructor(ctx, scope).is_null()
}

pub fn get_default_constructor(ctx: &InteropContext, scope: ScopeHandle) -> FunctionHandle {
    ctx.query(|model| {
        let decl = model.decl_from_scope(scope)?;
        model.record(decl)?;
        model.default_constructor(decl).map(DeclId::function)
    })
    .unwrap_or_default()
}

pub fn get_destructor(ctx: &InteropContext, scope: ScopeHandle) -> FunctionHandle {
    ctx.query(|model| {
        let decl = model.decl_from_scope(scope)?;
        model.record(decl)?;
        model.destructor(decl).map(DeclId::function)
    })
    .unwrap_or_default()
}

/// Functions named `name` visible in `scope`, inherited ones included.
pub fn get_functions_using_name(ctx: &InteropContext, scope: ScopeHandle, name: &str) -> RVec<FunctionHandle> {
    if name.is_empty() {
        return RVec::new();
    }
    ctx.query_mut(|model| {
        let decl = model.decl_from_scope(scope)?;
        let scope = if matches!(model.decl(decl).kind, DeclKind::Typedef { .. }) {
            model.record_of_decl(decl)?
        } else {
            decl
        };
        let found = model
            .lookup_in(scope, name)
            .into_iter()
            .filter(|found| model.function(*found).is_some());
        Some(handles(found))
    })
    .unwrap_or_default()
}

pub fn get_function_return_type(ctx: &InteropContext, func: FunctionHandle) -> TypeHandle {
    ctx.query(|model| {
        let decl = model.decl_from_function(func)?;
        model.function(decl).map(|info| info.return_type.handle())
    })
    .unwrap_or_default()
}

pub fn get_function_num_args(ctx: &InteropContext, func: FunctionHandle) -> usize {
    ctx.query(|model| {
        let decl = model.decl_from_function(func)?;
        model.function(decl).map(|info| info.params.len())
    })
    .unwrap_or(0)
}

pub fn get_function_required_args(ctx: &InteropContext, func: FunctionHandle) -> usize {
    ctx.query(|model| {
        let decl = model.decl_from_function(func)?;
        model.function(decl).map(FunctionInfo::min_required_args)
    })
    .unwrap_or(0)
}

pub fn get_function_arg_type(ctx: &InteropContext, func: FunctionHandle, iarg: usize) -> TypeHandle {
    ctx.query(|model| {
        let decl = model.decl_from_function(func)?;
        let param = model.function(decl)?.params.get(iarg)?;
        Some(param.ty.handle())
    })
    .unwrap_or_default()
}

pub fn get_function_arg_name(ctx: &InteropContext, func: FunctionHandle, iarg: usize) -> RString {
    ctx.query(|model| {
        let decl = model.decl_from_function(func)?;
        let param = model.function(decl)?.params.get(iarg)?;
        Some(RString::from(param.name.as_str()))
    })
    .unwrap_or_default()
}

/// Source text of a default argument. Floating-point defaults are shown as
/// written rather than at full precision.
pub fn get_function_arg_default(ctx: &InteropContext, func: FunctionHandle, iarg: usize) -> RString {
    ctx.query_mut(|model| {
        let decl = model.decl_from_function(func)?;
        let param = model.function(decl)?.params.get(iarg)?.clone();
        let default = param.default?;
        let desugared = model.desugar(param.ty);
        let floating = matches!(model.ty(desugared).kind, TypeKind::Builtin(b) if b.is_floating());
        Some(RString::from(if floating {
            reformat_floating(&default)
        } else {
            default
        }))
    })
    .unwrap_or_default()
}

fn reformat_floating(text: &str) -> String {
    if text.ends_with('.') {
        return text.to_string();
    }
    let digits = text.trim_end_matches(['f', 'F', 'l', 'L']);
    digits
        .parse::<f64>()
        .map_or_else(|_| text.to_string(), format_general)
}

/// Formats like C++ streams do by default: six significant digits, trailing
/// zeros dropped, scientific notation outside `[1e-4, 1e6)`.
fn format_general(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let scientific = format!("{value:.5e}");
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{sign}{:02}", trim_zeros(mantissa), exponent.unsigned_abs());
    }
    let decimals = usize::try_from(5 - exponent).unwrap_or(0);
    trim_zeros(&format!("{value:.decimals$}")).to_string()
}

fn trim_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// `ret qualified::name(params) const`, or `<unknown>`.
pub fn get_function_signature(ctx: &InteropContext, func: FunctionHandle) -> RString {
    let text = ctx.query(|model| {
        let decl = model.decl_from_function(func)?;
        model.function_signature(decl)
    });
    RString::from(text.unwrap_or_else(|| "<unknown>".to_string()))
}

pub fn is_function_deleted(ctx: &InteropContext, func: FunctionHandle) -> bool {
    function_is(ctx, func, |info| info.deleted)
}

fn templated(model: &Model, decl: DeclId) -> bool {
    match &model.decl(decl).kind {
        DeclKind::FunctionTemplate(_) => true,
        DeclKind::Function(info) => matches!(
            info.templated,
            TemplatedKind::FunctionTemplate
                | TemplatedKind::FunctionTemplateSpecialization
                | TemplatedKind::DependentFunctionTemplateSpecialization
        ),
        _ => false,
    }
}

/// Function templates and their specializations.
pub fn is_templated_function(ctx: &InteropContext, func: FunctionHandle) -> bool {
    ctx.query(|model| {
        let decl = model.decl_from_function(func)?;
        Some(templated(model, decl))
    })
    .unwrap_or(false)
}

/// Whether `name` in `parent` names a function template. An overload set
/// counts as one.
pub fn exists_function_template(ctx: &InteropContext, name: &str, parent: ScopeHandle) -> bool {
    ctx.query(|model| {
        let within = if parent.is_null() {
            None
        } else {
            Some(model.decl_from_scope(parent)?)
        };
        Some(match model.lookup_named(name, within) {
            Lookup::NotFound => false,
            Lookup::Found(decl) => templated(model, decl),
            Lookup::Ambiguous => true,
        })
    })
    .unwrap_or(false)
}

/// Function templates named `name` in `parent` or its bases.
pub fn get_class_templated_methods(ctx: &InteropContext, name: &str, parent: ScopeHandle) -> RVec<FunctionHandle> {
    ctx.query(|model| {
        let scope = if parent.is_null() {
            Model::TRANSLATION_UNIT
        } else {
            model.decl_from_scope(parent)?
        };
        let found = model
            .lookup_in(scope, name)
            .into_iter()
            .filter(|found| matches!(model.decl(*found).kind, DeclKind::FunctionTemplate(_)));
        Some(handles(found))
    })
    .unwrap_or_default()
}

pub fn is_method(ctx: &InteropContext, func: FunctionHandle) -> bool {
    function_is(ctx, func, |info| info.method.is_some())
}

fn method_access_is(ctx: &InteropContext, func: FunctionHandle, access: Access) -> bool {
    ctx.query(|model| {
        let decl = model.decl_from_function(func)?;
        model.function(decl)?.method?;
        Some(model.decl(decl).access == access)
    })
    .unwrap_or(false)
}

pub fn is_public_method(ctx: &InteropContext, func: FunctionHandle) -> bool {
    method_access_is(ctx, func, Access::Public)
}

pub fn is_protected_method(ctx: &InteropContext, func: FunctionHandle) -> bool {
    method_access_is(ctx, func, Access::Protected)
}

pub fn is_private_method(ctx: &InteropContext, func: FunctionHandle) -> bool {
    method_access_is(ctx, func, Access::Private)
}

pub fn is_constructor(ctx: &InteropContext, func: FunctionHandle) -> bool {
    function_is(ctx, func, FunctionInfo::is_constructor)
}

pub fn is_destructor(ctx: &InteropContext, func: FunctionHandle) -> bool {
    function_is(ctx, func, FunctionInfo::is_destructor)
}

pub fn is_static_method(ctx: &InteropContext, func: FunctionHandle) -> bool {
    function_is(ctx, func, |info| info.method.is_some_and(|m| m.is_static))
}

pub fn is_virtual_method(ctx: &InteropContext, func: FunctionHandle) -> bool {
    function_is(ctx, func, |info| info.method.is_some_and(|m| m.is_virtual))
}

pub fn is_const_method(ctx: &InteropContext, func: FunctionHandle) -> bool {
    function_is(ctx, func, |info| info.method.is_some_and(|m| m.is_const))
}

fn address_of(ctx: &InteropContext, func: FunctionHandle, methods_only: bool) -> *mut c_void {
    let Some(service) = ctx.service() else {
        return std::ptr::null_mut();
    };
    let decl = {
        let model = service.model();
        model
            .decl_from_function(func)
            .filter(|decl| model.function(*decl).is_some_and(|info| !methods_only || info.method.is_some()))
    };
    let Some(decl) = decl else {
        return std::ptr::null_mut();
    };
    service.function_address(decl).unwrap_or_else(|err| {
        tracing::error!("Failed to GetFunctionAddress: {err}");
        std::ptr::null_mut()
    })
}

/// Address of the compiled code of `func`, emitting it when needed.
pub fn get_function_address(ctx: &InteropContext, func: FunctionHandle) -> *mut c_void {
    address_of(ctx, func, false)
}

pub fn get_function_address_from_method(ctx: &InteropContext, method: FunctionHandle) -> *mut c_void {
    address_of(ctx, method, true)
}

/// Address of the symbol `mangled_name` in session code or loaded libraries.
pub fn get_function_address_from_name(ctx: &InteropContext, mangled_name: &str) -> *mut c_void {
    ctx.service()
        .and_then(|service| service.symbol_address(mangled_name).ok())
        .unwrap_or(std::ptr::null_mut())
}

fn collect_operators(model: &Model, scope: DeclId, op: Operator, arity: OperatorArity, out: &mut Vec<DeclId>) {
    for member in &model.decl(scope).members {
        let Some(info) = model.function(*member) else {
            continue;
        };
        if info.special != SpecialMember::Operator(op) {
            continue;
        }
        if model.operator_arity(*member).is_some_and(|found| found.matches(arity)) {
            out.push(*member);
        }
    }
    if model.record(scope).is_some() {
        for base in model.base_records(scope) {
            collect_operators(model, base, op, arity, out);
        }
    }
}

/// Overloads of `op` declared in `scope` (and the bases of a class) whose
/// operand count matches `arity`.
pub fn get_operator(ctx: &InteropContext, scope: ScopeHandle, op: Operator, arity: OperatorArity) -> RVec<FunctionHandle> {
    if op == Operator::None {
        return RVec::new();
    }
    ctx.query(|model| {
        let decl = model.decl_from_scope(scope)?;
        let mut found = Vec::new();
        collect_operators(model, decl, op, arity, &mut found);
        Some(handles(found))
    })
    .unwrap_or_default()
}

/// Operand count of an operator declaration; `Both` for anything else.
pub fn get_operator_arity(ctx: &InteropContext, func: FunctionHandle) -> OperatorArity {
    ctx.query(|model| {
        let decl = model.decl_from_function(func)?;
        model.operator_arity(decl)
    })
    .unwrap_or(OperatorArity::Both)
}

pub fn get_operator_from_spelling(_ctx: &InteropContext, spelling: &str) -> Operator {
    Operator::from_spelling(spelling.trim())
}

pub fn get_spelling_from_operator(_ctx: &InteropContext, op: Operator) -> RString {
    RString::from(op.spelling())
}
