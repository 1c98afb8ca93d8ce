//! Overload resolution over a caller-supplied candidate set.

use cppi_abi::FunctionHandle;
use cppi_compiler::model::{DeclKind, TypeKind};
use cppi_compiler::{CompilerService, DeclId, Model, TemplateArg, TypeId};

use crate::context::InteropContext;
use crate::ops::templates::{TemplateArgSpec, to_template_args};

/// Cost of binding one argument to one parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Conversion {
    Exact = 0,
    Arithmetic = 1,
    DerivedToBase = 2,
}

/// Candidate after template arguments have been filled in.
enum Prepared {
    Function(DeclId),
    Template { template: DeclId, args: Vec<TemplateArg> },
}

/// The one candidate callable with `arg_types` at the lowest conversion cost.
/// Templates are instantiated with `explicit_types`, the remaining
/// parameters deduced from the arguments. Ties yield null.
pub fn best_overload_function_match(
    ctx: &InteropContext,
    candidates: &[FunctionHandle],
    explicit_types: Vec<TemplateArgSpec<'_>>,
    arg_types: Vec<TemplateArgSpec<'_>>,
) -> FunctionHandle {
    let Some(service) = ctx.service() else {
        return FunctionHandle::null();
    };
    let (prepared, args) = {
        let mut model = service.model_mut();
        let (Some(explicit), Some(args)) = (
            to_template_args(&model, &explicit_types),
            arg_types
                .iter()
                .map(|spec| model.type_from_handle(spec.ty))
                .collect::<Option<Vec<TypeId>>>(),
        ) else {
            return FunctionHandle::null();
        };
        let prepared: Vec<Prepared> = candidates
            .iter()
            .filter_map(|handle| prepare(&mut model, *handle, &explicit, &args))
            .collect();
        (prepared, args)
    };
    let functions = instantiate(service.as_ref(), prepared);

    let mut model = service.model_mut();
    let mut best: Option<(usize, DeclId)> = None;
    let mut tied = false;
    for func in functions {
        let Some(cost) = viability(&mut model, func, &args) else {
            continue;
        };
        match best {
            Some((best_cost, best_func)) if cost == best_cost && best_func != func => tied = true,
            Some((best_cost, _)) if cost >= best_cost => {}
            _ => {
                best = Some((cost, func));
                tied = false;
            }
        }
    }
    match best {
        Some((_, func)) if !tied => func.function(),
        _ => FunctionHandle::null(),
    }
}

fn prepare(model: &mut Model, handle: FunctionHandle, explicit: &[TemplateArg], args: &[TypeId]) -> Option<Prepared> {
    let decl = model.decl_from_function(handle)?;
    let (params, pattern) = match &model.decl(decl).kind {
        DeclKind::Function(_) => return Some(Prepared::Function(decl)),
        DeclKind::FunctionTemplate(info) => {
            let names: Vec<String> = info.params.iter().map(|param| param.name.clone()).collect();
            (names, info.pattern?)
        }
        _ => return None,
    };
    let mut filled = explicit.to_vec();
    for name in params.iter().skip(explicit.len()) {
        let ty = deduce(model, pattern, name, args)?;
        filled.push(TemplateArg::ty(ty));
    }
    Some(Prepared::Template {
        template: decl,
        args: filled,
    })
}

/// Type of the first argument passed to a parameter spelled `name`, with
/// references and qualifiers stripped.
fn deduce(model: &mut Model, pattern: DeclId, name: &str, args: &[TypeId]) -> Option<TypeId> {
    let params: Vec<TypeId> = model.function(pattern)?.params.iter().map(|param| param.ty).collect();
    for (param, arg) in params.into_iter().zip(args) {
        let stripped = strip(model, param);
        if model.type_to_string(stripped) == name {
            return Some(strip(model, *arg));
        }
    }
    None
}

fn strip(model: &mut Model, ty: TypeId) -> TypeId {
    let value = model.non_reference(ty);
    model.unqualified(value)
}

fn instantiate(service: &dyn CompilerService, prepared: Vec<Prepared>) -> Vec<DeclId> {
    prepared
        .into_iter()
        .filter_map(|candidate| match candidate {
            Prepared::Function(decl) => Some(decl),
            Prepared::Template { template, args } => service
                .instantiate_function_template(template, &args)
                .inspect_err(|err| tracing::debug!("BestOverloadFunctionMatch: {err}"))
                .ok(),
        })
        .collect()
}

/// Total conversion cost of calling `func` with `args`, or `None` when the
/// call is not viable.
fn viability(model: &mut Model, func: DeclId, args: &[TypeId]) -> Option<usize> {
    let info = model.function(func)?;
    if args.len() < info.min_required_args() || (args.len() > info.params.len() && !info.variadic) {
        return None;
    }
    let params: Vec<TypeId> = info.params.iter().map(|param| param.ty).collect();
    let mut total = 0;
    for (param, arg) in params.into_iter().zip(args) {
        total += conversion(model, *arg, param)? as usize;
    }
    Some(total)
}

fn conversion(model: &mut Model, arg: TypeId, param: TypeId) -> Option<Conversion> {
    let arg = canonical_value(model, arg);
    let param = canonical_value(model, param);
    if arg == param {
        return Some(Conversion::Exact);
    }
    if is_arithmetic(model, arg) && model.is_builtin(param) {
        return Some(Conversion::Arithmetic);
    }
    let derived = class_behind(model, arg)?;
    let base = class_behind(model, param)?;
    (model.is_pointer(arg) == model.is_pointer(param) && model.is_derived_from(derived, base))
        .then_some(Conversion::DerivedToBase)
}

fn is_arithmetic(model: &mut Model, ty: TypeId) -> bool {
    model.is_builtin(ty) || model.is_enum(ty)
}

fn canonical_value(model: &mut Model, ty: TypeId) -> TypeId {
    let value = model.non_reference(ty);
    let canonical = model.canonical(value);
    model.unqualified(canonical)
}

/// Class named by a class type or a pointer to one.
fn class_behind(model: &mut Model, ty: TypeId) -> Option<DeclId> {
    let pointee = match model.ty(ty).kind {
        TypeKind::Pointer(pointee) => Some(pointee),
        _ => None,
    };
    let target = match pointee {
        Some(pointee) => canonical_value(model, pointee),
        None => ty,
    };
    match model.ty(target).kind {
        TypeKind::Record(decl) => Some(decl),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::stub_context;
    use cppi_compiler::ModelBuilder;
    use cppi_compiler::model::{Access, Builtin, TagKind};

    fn spec(ty: TypeId) -> TemplateArgSpec<'static> {
        TemplateArgSpec::ty(ty.handle())
    }

    #[test]
    fn test_exact_match_wins() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let double = builder.builtin(Builtin::Double);
        let void = builder.model().void();
        let by_int = builder.function(Model::TRANSLATION_UNIT, "f", void).param("x", int).build();
        let by_double = builder.function(Model::TRANSLATION_UNIT, "f", void).param("x", double).build();
        let two = builder
            .function(Model::TRANSLATION_UNIT, "f", void)
            .param("x", int)
            .param("y", int)
            .build();
        let (ctx, _stub) = stub_context(model);
        let candidates = [by_int.function(), by_double.function(), two.function()];

        let picked = best_overload_function_match(&ctx, &candidates, Vec::new(), vec![spec(double)]);
        assert_eq!(picked, by_double.function());
        let picked = best_overload_function_match(&ctx, &candidates, Vec::new(), vec![spec(int)]);
        assert_eq!(picked, by_int.function());
        let picked = best_overload_function_match(&ctx, &candidates, Vec::new(), vec![spec(int), spec(int)]);
        assert_eq!(picked, two.function());
        assert!(best_overload_function_match(&ctx, &candidates, Vec::new(), Vec::new()).is_null());
    }

    #[test]
    fn test_ambiguous_conversion_is_null() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let long = builder.builtin(Builtin::Long);
        let double = builder.builtin(Builtin::Double);
        let void = builder.model().void();
        let by_int = builder.function(Model::TRANSLATION_UNIT, "g", void).param("x", int).build();
        let by_double = builder.function(Model::TRANSLATION_UNIT, "g", void).param("x", double).build();
        let (ctx, _stub) = stub_context(model);
        let candidates = [by_int.function(), by_double.function()];
        assert!(best_overload_function_match(&ctx, &candidates, Vec::new(), vec![spec(long)]).is_null());
    }

    #[test]
    fn test_derived_to_base() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let base = builder.record(Model::TRANSLATION_UNIT, "Base", TagKind::Struct);
        builder.finish_record(base);
        let derived = builder.record(Model::TRANSLATION_UNIT, "Derived", TagKind::Struct);
        builder.base(derived, base, Access::Public, false);
        builder.finish_record(derived);
        let base_ty = builder.model().record_type(base);
        let derived_ty = builder.model().record_type(derived);
        let base_ptr = builder.model().pointer(base_ty);
        let derived_ptr = builder.model().pointer(derived_ty);
        let int = builder.builtin(Builtin::Int);
        let void = builder.model().void();
        let take_base = builder
            .function(Model::TRANSLATION_UNIT, "h", void)
            .param("b", base_ptr)
            .build();
        let take_int = builder.function(Model::TRANSLATION_UNIT, "h", void).param("i", int).build();
        let (ctx, _stub) = stub_context(model);
        let candidates = [take_int.function(), take_base.function()];
        let picked = best_overload_function_match(&ctx, &candidates, Vec::new(), vec![spec(derived_ptr)]);
        assert_eq!(picked, take_base.function());
        assert!(best_overload_function_match(&ctx, &candidates, Vec::new(), vec![spec(base_ty)]).is_null());
    }

    #[test]
    fn test_template_candidates_are_instantiated() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let double = builder.builtin(Builtin::Double);
        let t = builder.model().named("T");
        let const_t = builder.model().with_quals(t, cppi_abi::QualKind::CONST);
        let t_ref = builder.model().lvalue_reference(const_t);
        let (tmpl, pattern) = builder.function_template(Model::TRANSLATION_UNIT, "show", &["T"], t);
        pattern.param("v", t_ref).build();
        let as_int = builder
            .function_specialization(tmpl, vec![TemplateArg::ty(int)], int)
            .param("v", int)
            .build();
        let as_double = builder
            .function_specialization(tmpl, vec![TemplateArg::ty(double)], double)
            .param("v", double)
            .build();
        let (ctx, _stub) = stub_context(model);
        let candidates = [tmpl.function()];

        let deduced = best_overload_function_match(&ctx, &candidates, Vec::new(), vec![spec(int)]);
        assert_eq!(deduced, as_int.function());
        let explicit = best_overload_function_match(&ctx, &candidates, vec![spec(double)], vec![spec(int)]);
        assert_eq!(explicit, as_double.function());
    }
}
