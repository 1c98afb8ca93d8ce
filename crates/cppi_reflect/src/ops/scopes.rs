//! Scope predicates, names, lookup and class hierarchy queries.

use abi_stable::std_types::{RString, RVec};
use cppi_abi::{ScopeHandle, TypeHandle};
use cppi_compiler::model::{DeclKind, Lookup, split_qualified};
use cppi_compiler::{DeclId, Model};

use crate::context::InteropContext;

/// Name reported for handles that do not name a declaration.
const UNNAMED: &str = "<unnamed>";

fn decl_is(ctx: &InteropContext, scope: ScopeHandle, test: impl FnOnce(&DeclKind) -> bool) -> bool {
    ctx.query(|model| {
        let decl = model.decl_from_scope(scope)?;
        Some(test(&model.decl(decl).kind))
    })
    .unwrap_or(false)
}

pub fn is_aggregate(ctx: &InteropContext, scope: ScopeHandle) -> bool {
    decl_is(ctx, scope, |kind| matches!(kind, DeclKind::Record(info) if info.aggregate))
}

pub fn is_namespace(ctx: &InteropContext, scope: ScopeHandle) -> bool {
    decl_is(ctx, scope, |kind| matches!(kind, DeclKind::Namespace { .. }))
}

pub fn is_class(ctx: &InteropContext, scope: ScopeHandle) -> bool {
    decl_is(ctx, scope, |kind| matches!(kind, DeclKind::Record(_)))
}

pub fn is_function(ctx: &InteropContext, scope: ScopeHandle) -> bool {
    decl_is(ctx, scope, |kind| matches!(kind, DeclKind::Function(_)))
}

/// Tags are complete once defined; every other declaration is complete.
pub fn is_complete(ctx: &InteropContext, scope: ScopeHandle) -> bool {
    decl_is(ctx, scope, |kind| match kind {
        DeclKind::Record(info) => info.complete,
        DeclKind::Enum(info) => info.complete,
        _ => true,
    })
}

/// Size of a complete class, zero for anything else.
pub fn size_of(ctx: &InteropContext, scope: ScopeHandle) -> usize {
    let Some(service) = ctx.service() else {
        return 0;
    };
    let ty = {
        let mut model = service.model_mut();
        let Some(decl) = model.decl_from_scope(scope) else {
            return 0;
        };
        match model.record(decl) {
            Some(info) if info.complete => model.record_type(decl),
            _ => return 0,
        }
    };
    service.size_of_type(ty).unwrap_or_else(|err| {
        tracing::warn!("SizeOf: {err}");
        0
    })
}

pub fn is_template(ctx: &InteropContext, scope: ScopeHandle) -> bool {
    decl_is(ctx, scope, |kind| {
        matches!(kind, DeclKind::ClassTemplate(_) | DeclKind::FunctionTemplate(_))
    })
}

pub fn is_template_specialization(ctx: &InteropContext, scope: ScopeHandle) -> bool {
    decl_is(ctx, scope, |kind| {
        matches!(kind, DeclKind::Record(info) if info.specialization.is_some())
    })
}

pub fn is_typedefed(ctx: &InteropContext, scope: ScopeHandle) -> bool {
    decl_is(ctx, scope, |kind| matches!(kind, DeclKind::Typedef { .. }))
}

pub fn is_abstract(ctx: &InteropContext, klass: ScopeHandle) -> bool {
    decl_is(ctx, klass, |kind| matches!(kind, DeclKind::Record(info) if info.is_abstract))
}

pub fn is_enum_scope(ctx: &InteropContext, scope: ScopeHandle) -> bool {
    decl_is(ctx, scope, |kind| matches!(kind, DeclKind::Enum(_)))
}

pub fn is_enum_constant(ctx: &InteropContext, scope: ScopeHandle) -> bool {
    decl_is(ctx, scope, |kind| matches!(kind, DeclKind::EnumConstant { .. }))
}

/// Namespace-scope variables and static data members; fields are not
/// variables.
pub fn is_variable(ctx: &InteropContext, scope: ScopeHandle) -> bool {
    decl_is(ctx, scope, |kind| matches!(kind, DeclKind::Variable(info) if !info.is_field))
}

pub fn is_lambda_class(ctx: &InteropContext, ty: TypeHandle) -> bool {
    ctx.query_mut(|model| {
        let ty = model.type_from_handle(ty)?;
        let record = model.record_of_type(ty)?;
        model.record(record).map(|info| info.lambda)
    })
    .unwrap_or(false)
}

pub fn is_class_polymorphic(ctx: &InteropContext, klass: ScopeHandle) -> bool {
    decl_is(ctx, klass, |kind| matches!(kind, DeclKind::Record(info) if info.polymorphic))
}

fn name_of(ctx: &InteropContext, scope: ScopeHandle, name: impl FnOnce(&Model, DeclId) -> String) -> RString {
    let text = ctx.query(|model| {
        let decl = model.decl_from_scope(scope)?;
        if matches!(model.decl(decl).kind, DeclKind::TranslationUnit) {
            return Some(String::new());
        }
        Some(name(model, decl))
    });
    RString::from(text.unwrap_or_else(|| UNNAMED.to_string()))
}

const fn is_tag(kind: &DeclKind) -> bool {
    matches!(kind, DeclKind::Record(_) | DeclKind::Enum(_))
}

pub fn get_name(ctx: &InteropContext, scope: ScopeHandle) -> RString {
    name_of(ctx, scope, Model::name)
}

/// Unqualified name; class template specializations carry their arguments.
pub fn get_complete_name(ctx: &InteropContext, scope: ScopeHandle) -> RString {
    name_of(ctx, scope, |model, decl| {
        if is_tag(&model.decl(decl).kind) {
            model.complete_name(decl)
        } else {
            model.name(decl)
        }
    })
}

pub fn get_qualified_name(ctx: &InteropContext, scope: ScopeHandle) -> RString {
    name_of(ctx, scope, Model::qualified_name)
}

/// Qualified name; specializations anywhere in the chain carry their
/// arguments.
pub fn get_qualified_complete_name(ctx: &InteropContext, scope: ScopeHandle) -> RString {
    name_of(ctx, scope, |model, decl| {
        if is_tag(&model.decl(decl).kind) {
            model.qualified_complete_name(decl)
        } else {
            model.qualified_name(decl)
        }
    })
}

pub fn get_using_namespaces(ctx: &InteropContext, scope: ScopeHandle) -> RVec<ScopeHandle> {
    ctx.query(|model| {
        let decl = model.decl_from_scope(scope)?;
        Some(
            model
                .decl(decl)
                .using_directives
                .iter()
                .map(|nominated| nominated.scope())
                .collect(),
        )
    })
    .unwrap_or_default()
}

pub fn get_global_scope(ctx: &InteropContext) -> ScopeHandle {
    ctx.query(|_| Some(Model::TRANSLATION_UNIT.scope()))
        .unwrap_or_default()
}

/// The class a typedef names, or `scope` itself.
pub fn get_underlying_scope(ctx: &InteropContext, scope: ScopeHandle) -> ScopeHandle {
    if scope.is_null() {
        return scope;
    }
    ctx.query_mut(|model| {
        let decl = model.decl_from_scope(scope)?;
        if !matches!(model.decl(decl).kind, DeclKind::Typedef { .. }) {
            return None;
        }
        model.record_of_decl(decl).map(DeclId::scope)
    })
    .unwrap_or(scope)
}

/// Looks `name` up inside `parent`; a typedef parent stands for the class it
/// names.
fn named(model: &mut Model, name: &str, parent: ScopeHandle) -> Option<DeclId> {
    let within = if parent.is_null() {
        None
    } else {
        let decl = model.decl_from_scope(parent)?;
        if matches!(model.decl(decl).kind, DeclKind::Typedef { .. }) {
            Some(model.record_of_decl(decl)?)
        } else {
            Some(decl)
        }
    };
    model.lookup_named(name, within).found()
}

pub fn get_named(ctx: &InteropContext, name: &str, parent: ScopeHandle) -> ScopeHandle {
    ctx.query_mut(|model| named(model, name, parent).map(DeclId::scope))
        .unwrap_or_default()
}

fn scope_named(model: &mut Model, name: &str, parent: ScopeHandle) -> Option<DeclId> {
    if name.is_empty() {
        return Some(Model::TRANSLATION_UNIT);
    }
    let decl = named(model, name, parent)?;
    matches!(
        model.decl(decl).kind,
        DeclKind::Namespace { .. }
            | DeclKind::Record(_)
            | DeclKind::ClassTemplate(_)
            | DeclKind::Typedef { .. }
    )
    .then_some(decl)
}

/// Like [`get_named`], restricted to namespaces, classes, class templates
/// and typedefs. The empty name is the global scope.
pub fn get_scope(ctx: &InteropContext, name: &str, parent: ScopeHandle) -> ScopeHandle {
    ctx.query_mut(|model| scope_named(model, name, parent).map(DeclId::scope))
        .unwrap_or_default()
}

/// Resolves `A::B<int>::C` one scope at a time from the global scope.
pub fn get_scope_from_complete_name(ctx: &InteropContext, name: &str) -> ScopeHandle {
    ctx.query_mut(|model| {
        let mut current = ScopeHandle::null();
        for segment in split_qualified(name.trim_start_matches("::")) {
            current = scope_named(model, segment, current)?.scope();
        }
        Some(current)
    })
    .unwrap_or_default()
}

pub fn get_parent_scope(ctx: &InteropContext, scope: ScopeHandle) -> ScopeHandle {
    ctx.query(|model| {
        let decl = model.decl_from_scope(scope)?;
        model.decl(decl).parent.map(DeclId::scope)
    })
    .unwrap_or_default()
}

/// Class named by `ty`, looking through one pointer, reference or array.
pub fn get_scope_from_type(ctx: &InteropContext, ty: TypeHandle) -> ScopeHandle {
    ctx.query_mut(|model| {
        let ty = model.type_from_handle(ty)?;
        model.record_of_type(ty).map(DeclId::scope)
    })
    .unwrap_or_default()
}

pub fn get_num_bases(ctx: &InteropContext, klass: ScopeHandle) -> usize {
    ctx.query(|model| {
        let decl = model.decl_from_scope(klass)?;
        let info = model.record(decl)?;
        info.complete.then_some(info.bases.len())
    })
    .unwrap_or(0)
}

pub fn get_base_class(ctx: &InteropContext, klass: ScopeHandle, ibase: usize) -> ScopeHandle {
    ctx.query_mut(|model| {
        let decl = model.decl_from_scope(klass)?;
        let base = model.record(decl)?.bases.get(ibase)?.ty;
        model.record_of_type(base).map(DeclId::scope)
    })
    .unwrap_or_default()
}

/// A class counts as its own subclass.
pub fn is_subclass(ctx: &InteropContext, derived: ScopeHandle, base: ScopeHandle) -> bool {
    if derived == base && !derived.is_null() {
        return true;
    }
    ctx.query(|model| {
        let derived = model.decl_from_scope(derived)?;
        let base = model.decl_from_scope(base)?;
        model.record(derived)?;
        model.record(base)?;
        Some(model.is_derived_from(derived, base))
    })
    .unwrap_or(false)
}

/// Offset of the `base` subobject inside `derived`; -1 when it cannot be
/// computed.
pub fn get_base_class_offset(ctx: &InteropContext, derived: ScopeHandle, base: ScopeHandle) -> i64 {
    if derived == base {
        return 0;
    }
    let Some(service) = ctx.service() else {
        return -1;
    };
    let pair = {
        let model = service.model();
        model
            .decl_from_scope(derived)
            .zip(model.decl_from_scope(base))
            .filter(|(derived, base)| model.record(*derived).is_some() && model.record(*base).is_some())
    };
    let Some((derived, base)) = pair else {
        return -1;
    };
    service.base_class_offset(derived, base).unwrap_or_else(|err| {
        tracing::warn!("GetBaseClassOffset: {err}");
        -1
    })
}

fn member_names(ctx: &InteropContext, scope: ScopeHandle, keep: impl Fn(&DeclKind) -> bool) -> RVec<RString> {
    ctx.query(|model| {
        let decl = model.decl_from_scope(scope)?;
        let entry = model.decl(decl);
        if !matches!(
            entry.kind,
            DeclKind::Record(_) | DeclKind::Enum(_) | DeclKind::Namespace { .. } | DeclKind::TranslationUnit
        ) {
            return None;
        }
        Some(
            entry
                .members
                .iter()
                .map(|member| model.decl(*member))
                .filter(|member| !(member.implicit && member.is_record()) && keep(&member.kind))
                .map(|member| RString::from(member.name.as_str()))
                .collect(),
        )
    })
    .unwrap_or_default()
}

/// Names declared directly in a class, enum or namespace.
pub fn get_all_cpp_names(ctx: &InteropContext, scope: ScopeHandle) -> RVec<RString> {
    member_names(ctx, scope, |_| true)
}

pub fn get_enums(ctx: &InteropContext, scope: ScopeHandle) -> RVec<RString> {
    member_names(ctx, scope, |kind| matches!(kind, DeclKind::Enum(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::stub_context;
    use cppi_compiler::ModelBuilder;
    use cppi_compiler::model::{Access, Builtin, TagKind, TemplateArg};

    struct Fixture {
        ns: DeclId,
        base: DeclId,
        derived: DeclId,
        alias: DeclId,
        color: DeclId,
        spec: DeclId,
        global: DeclId,
    }

    fn fixture(model: &mut Model) -> Fixture {
        let mut builder = ModelBuilder::new(model);
        let int = builder.builtin(Builtin::Int);
        let ns = builder.namespace(Model::TRANSLATION_UNIT, "N");
        let base = builder.record(ns, "Base", TagKind::Struct);
        builder.field(base, "b", int, Access::Public);
        builder.finish_record(base);
        let derived = builder.record(ns, "Derived", TagKind::Class);
        builder.base(derived, base, Access::Public, false);
        builder.field(derived, "d", int, Access::Private);
        builder.finish_record(derived);
        let derived_ty = builder.model().record_type(derived);
        let alias = builder.typedef(ns, "Alias", derived_ty);
        let color = builder.enumeration(ns, "Color", false, &[("Red", 0), ("Green", 1)]);
        let tmpl = builder.class_template(ns, "Box", &["T"]);
        let spec = builder.specialization(tmpl, vec![TemplateArg::ty(int)]);
        let global = builder.variable(Model::TRANSLATION_UNIT, "counter", int);
        Fixture {
            ns,
            base,
            derived,
            alias,
            color,
            spec,
            global,
        }
    }

    #[test]
    fn test_predicates() {
        let mut model = Model::new();
        let f = fixture(&mut model);
        let (ctx, _stub) = stub_context(model);
        assert!(is_namespace(&ctx, f.ns.scope()));
        assert!(is_class(&ctx, f.derived.scope()));
        assert!(!is_class(&ctx, f.ns.scope()));
        assert!(is_typedefed(&ctx, f.alias.scope()));
        assert!(is_enum_scope(&ctx, f.color.scope()));
        assert!(is_variable(&ctx, f.global.scope()));
        assert!(is_template_specialization(&ctx, f.spec.scope()));
        assert!(is_complete(&ctx, f.ns.scope()));
        assert!(!is_complete(&ctx, ScopeHandle::null()));
        assert!(!is_class(&ctx, ScopeHandle::null()));
    }

    #[test]
    fn test_names() {
        let mut model = Model::new();
        let f = fixture(&mut model);
        let (ctx, _stub) = stub_context(model);
        assert_eq!(get_name(&ctx, f.derived.scope()).as_str(), "Derived");
        assert_eq!(get_qualified_name(&ctx, f.derived.scope()).as_str(), "N::Derived");
        assert_eq!(get_complete_name(&ctx, f.spec.scope()).as_str(), "Box<int>");
        assert_eq!(get_qualified_complete_name(&ctx, f.spec.scope()).as_str(), "N::Box<int>");
        assert_eq!(get_name(&ctx, get_global_scope(&ctx)).as_str(), "");
        assert_eq!(get_name(&ctx, ScopeHandle::null()).as_str(), UNNAMED);
    }

    #[test]
    fn test_lookup() {
        let mut model = Model::new();
        let f = fixture(&mut model);
        let (ctx, _stub) = stub_context(model);
        assert_eq!(get_scope(&ctx, "N", ScopeHandle::null()), f.ns.scope());
        assert_eq!(get_scope(&ctx, "Derived", f.ns.scope()), f.derived.scope());
        assert_eq!(get_scope(&ctx, "", ScopeHandle::null()), get_global_scope(&ctx));
        assert!(get_scope(&ctx, "counter", ScopeHandle::null()).is_null());
        assert_eq!(get_named(&ctx, "counter", ScopeHandle::null()), f.global.scope());
        assert_eq!(get_scope_from_complete_name(&ctx, "N::Box<int>"), f.spec.scope());
        assert_eq!(get_scope_from_complete_name(&ctx, "N::Alias"), f.alias.scope());
        // Lookup through a typedef parent reaches the class's members.
        assert!(!get_named(&ctx, "d", f.alias.scope()).is_null());
        assert_eq!(get_underlying_scope(&ctx, f.alias.scope()), f.derived.scope());
        assert_eq!(get_underlying_scope(&ctx, f.ns.scope()), f.ns.scope());
        assert_eq!(get_parent_scope(&ctx, f.derived.scope()), f.ns.scope());
        assert!(get_parent_scope(&ctx, get_global_scope(&ctx)).is_null());
    }

    #[test]
    fn test_bases() {
        let mut model = Model::new();
        let f = fixture(&mut model);
        let (ctx, stub) = stub_context(model);
        assert_eq!(get_num_bases(&ctx, f.derived.scope()), 1);
        assert_eq!(get_base_class(&ctx, f.derived.scope(), 0), f.base.scope());
        assert!(get_base_class(&ctx, f.derived.scope(), 1).is_null());
        assert!(is_subclass(&ctx, f.derived.scope(), f.base.scope()));
        assert!(is_subclass(&ctx, f.base.scope(), f.base.scope()));
        assert!(!is_subclass(&ctx, f.base.scope(), f.derived.scope()));

        stub.set_base_offset(f.derived, f.base, 8);
        assert_eq!(get_base_class_offset(&ctx, f.derived.scope(), f.base.scope()), 8);
        assert_eq!(get_base_class_offset(&ctx, f.ns.scope(), f.base.scope()), -1);
        assert_eq!(get_base_class_offset(&ctx, f.base.scope(), f.base.scope()), 0);
    }

    #[test]
    fn test_member_names() {
        let mut model = Model::new();
        let f = fixture(&mut model);
        let (ctx, _stub) = stub_context(model);
        let names: Vec<String> = get_all_cpp_names(&ctx, f.ns.scope())
            .into_iter()
            .map(RString::into_string)
            .collect();
        assert_eq!(names, ["Base", "Derived", "Alias", "Color", "Box"]);
        let enums: Vec<String> = get_enums(&ctx, f.ns.scope())
            .into_iter()
            .map(RString::into_string)
            .collect();
        assert_eq!(enums, ["Color"]);
        assert!(get_all_cpp_names(&ctx, f.global.scope()).is_empty());
    }

    #[test]
    fn test_size_of_uses_layout() {
        let mut model = Model::new();
        let f = fixture(&mut model);
        model.record_mut(f.base).unwrap().size = Some(4);
        let (ctx, _stub) = stub_context(model);
        assert_eq!(size_of(&ctx, f.base.scope()), 4);
        assert_eq!(size_of(&ctx, f.ns.scope()), 0);
    }
}
