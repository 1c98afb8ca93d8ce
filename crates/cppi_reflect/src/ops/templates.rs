//! Template instantiation.

use abi_stable::std_types::RVec;
use cppi_abi::{ScopeHandle, TemplateArgInfo, TypeHandle};
use cppi_compiler::model::DeclKind;
use cppi_compiler::{Model, TemplateArg};

use crate::context::InteropContext;

/// A template argument as received from a caller: a type, plus the literal
/// text of a non-type argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TemplateArgSpec<'a> {
    pub ty: TypeHandle,
    pub value: Option<&'a str>,
}

impl<'a> TemplateArgSpec<'a> {
    pub const fn ty(ty: TypeHandle) -> Self {
        Self { ty, value: None }
    }

    pub const fn value(ty: TypeHandle, value: &'a str) -> Self {
        Self {
            ty,
            value: Some(value),
        }
    }
}

/// Model arguments for `specs`; `None` when a type handle is unknown.
pub(crate) fn to_template_args(model: &Model, specs: &[TemplateArgSpec<'_>]) -> Option<Vec<TemplateArg>> {
    specs
        .iter()
        .map(|spec| {
            let ty = model.type_from_handle(spec.ty)?;
            Some(match spec.value {
                Some(text) => TemplateArg::value(ty, text),
                None => TemplateArg::ty(ty),
            })
        })
        .collect()
}

#[derive(Clone, Copy)]
enum TemplateKind {
    Class,
    Function,
}

/// Instantiates a class or function template with `args`. Class bodies are
/// only emitted when `instantiate_body` is set.
pub fn instantiate_template(
    ctx: &InteropContext,
    tmpl: ScopeHandle,
    args: Vec<TemplateArgSpec<'_>>,
    instantiate_body: bool,
) -> ScopeHandle {
    let Some(service) = ctx.service() else {
        return ScopeHandle::null();
    };
    let request = {
        let model = service.model();
        model.decl_from_scope(tmpl).and_then(|decl| {
            let kind = match model.decl(decl).kind {
                DeclKind::ClassTemplate(_) => TemplateKind::Class,
                DeclKind::FunctionTemplate(_) => TemplateKind::Function,
                _ => return None,
            };
            Some((decl, kind, to_template_args(&model, &args)?))
        })
    };
    let Some((decl, kind, args)) = request else {
        return ScopeHandle::null();
    };
    let instantiated = match kind {
        TemplateKind::Class => service.instantiate_class_template(decl, &args, instantiate_body),
        TemplateKind::Function => service.instantiate_function_template(decl, &args),
    };
    match instantiated {
        Ok(spec) => spec.scope(),
        Err(err) => {
            tracing::error!("InstantiateTemplate failed: {err}");
            ScopeHandle::null()
        }
    }
}

/// Arguments a class template specialization was instantiated with. Value
/// strings stay valid while the interpreter lives.
pub fn get_class_template_instantiation_args(ctx: &InteropContext, klass: ScopeHandle) -> RVec<TemplateArgInfo> {
    ctx.query(|model| {
        let decl = model.decl_from_scope(klass)?;
        let spec = model.record(decl)?.specialization.as_ref()?;
        Some(spec.args.iter().map(arg_info).collect())
    })
    .unwrap_or_default()
}

fn arg_info(arg: &TemplateArg) -> TemplateArgInfo {
    TemplateArgInfo {
        ty: arg.ty.handle(),
        integral_value: arg.value.as_ref().map_or(std::ptr::null(), |value| value.as_ptr()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::stub_context;
    use cppi_compiler::ModelBuilder;
    use cppi_compiler::model::Builtin;

    #[test]
    fn test_instantiate_class_template() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let size_t = builder.builtin(Builtin::ULong);
        let tmpl = builder.class_template(Model::TRANSLATION_UNIT, "Array", &["T", "N"]);
        let spec = builder.specialization(tmpl, vec![TemplateArg::ty(int), TemplateArg::value(size_t, "4")]);
        let (ctx, _stub) = stub_context(model);

        let args = vec![TemplateArgSpec::ty(int.handle()), TemplateArgSpec::value(size_t.handle(), "4")];
        assert_eq!(instantiate_template(&ctx, tmpl.scope(), args, false), spec.scope());

        let missing = vec![TemplateArgSpec::ty(size_t.handle())];
        assert!(instantiate_template(&ctx, tmpl.scope(), missing, true).is_null());
        let unknown = vec![TemplateArgSpec::ty(TypeHandle::null())];
        assert!(instantiate_template(&ctx, tmpl.scope(), unknown, false).is_null());
        assert!(instantiate_template(&ctx, spec.scope(), Vec::new(), false).is_null());

        let info = get_class_template_instantiation_args(&ctx, spec.scope());
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].ty, int.handle());
        // SAFETY: the strings live in the model owned by `ctx`.
        unsafe {
            assert!(info[0].value().is_none());
            assert_eq!(info[1].value().map(|v| v.to_str().unwrap()), Some("4"));
        }
        assert!(get_class_template_instantiation_args(&ctx, tmpl.scope()).is_empty());
    }

    #[test]
    fn test_instantiate_function_template() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let t = builder.model().named("T");
        let (tmpl, pattern) = builder.function_template(Model::TRANSLATION_UNIT, "twice", &["T"], t);
        pattern.param("v", t).build();
        let spec = builder
            .function_specialization(tmpl, vec![TemplateArg::ty(int)], int)
            .param("v", int)
            .build();
        let (ctx, _stub) = stub_context(model);
        let args = vec![TemplateArgSpec::ty(int.handle())];
        assert_eq!(instantiate_template(&ctx, tmpl.scope(), args, false), spec.scope());
    }
}
