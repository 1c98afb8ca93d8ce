//! Type predicates and type construction.

use abi_stable::std_types::{RString, RVec};
use cppi_abi::{QualKind, ScopeHandle, TypeHandle, ValueKind};
use cppi_compiler::model::{DeclKind, TypeKind};
use cppi_compiler::spelling::{BaseSpec, parse_builtin};
use cppi_compiler::{DeclId, Model, TypeId};

use crate::context::InteropContext;

/// Spellings of the standard smart pointers.
const SMART_POINTERS: [&str; 3] = ["std::unique_ptr", "std::shared_ptr", "std::weak_ptr"];

fn type_is(ctx: &InteropContext, ty: TypeHandle, test: impl FnOnce(&mut Model, TypeId) -> bool) -> bool {
    ctx.query_mut(|model| {
        let ty = model.type_from_handle(ty)?;
        Some(test(model, ty))
    })
    .unwrap_or(false)
}

fn map_type(
    ctx: &InteropContext,
    ty: TypeHandle,
    map: impl FnOnce(&mut Model, TypeId) -> Option<TypeId>,
) -> TypeHandle {
    ctx.query_mut(|model| {
        let ty = model.type_from_handle(ty)?;
        map(model, ty).map(TypeId::handle)
    })
    .unwrap_or_default()
}

pub fn is_builtin(ctx: &InteropContext, ty: TypeHandle) -> bool {
    type_is(ctx, ty, Model::is_builtin)
}

pub fn is_enum_type(ctx: &InteropContext, ty: TypeHandle) -> bool {
    type_is(ctx, ty, Model::is_enum)
}

pub fn is_record_type(ctx: &InteropContext, ty: TypeHandle) -> bool {
    type_is(ctx, ty, Model::is_record)
}

pub fn is_pod_type(ctx: &InteropContext, ty: TypeHandle) -> bool {
    type_is(ctx, ty, Model::is_pod)
}

pub fn is_pointer_type(ctx: &InteropContext, ty: TypeHandle) -> bool {
    type_is(ctx, ty, Model::is_pointer)
}

pub fn is_reference_type(ctx: &InteropContext, ty: TypeHandle) -> bool {
    type_is(ctx, ty, Model::is_reference)
}

pub fn is_lvalue_reference_type(ctx: &InteropContext, ty: TypeHandle) -> bool {
    type_is(ctx, ty, Model::is_lvalue_reference)
}

pub fn is_rvalue_reference_type(ctx: &InteropContext, ty: TypeHandle) -> bool {
    type_is(ctx, ty, Model::is_rvalue_reference)
}

pub fn is_function_pointer_type(ctx: &InteropContext, ty: TypeHandle) -> bool {
    type_is(ctx, ty, Model::is_function_pointer)
}

/// Standard smart pointers, and classes that look like one: a `use_count`
/// member, or both `operator*` and `operator->`.
pub fn is_smart_ptr_type(ctx: &InteropContext, ty: TypeHandle) -> bool {
    type_is(ctx, ty, |model, ty| {
        let desugared = model.desugar(ty);
        let TypeKind::Record(record) = model.ty(desugared).kind else {
            return false;
        };
        let unqualified = model.unqualified(desugared);
        let spelled = model.type_to_string(unqualified);
        if SMART_POINTERS.iter().any(|name| spelled.starts_with(name)) {
            return true;
        }
        model.has_member_named(record, "use_count")
            || (model.has_member_named(record, "operator*")
                && model.has_member_named(record, "operator->"))
    })
}

pub fn get_value_kind(ctx: &InteropContext, ty: TypeHandle) -> ValueKind {
    ctx.query_mut(|model| {
        let ty = model.type_from_handle(ty)?;
        Some(if model.is_rvalue_reference(ty) {
            ValueKind::RValue
        } else if model.is_lvalue_reference(ty) {
            ValueKind::LValue
        } else {
            ValueKind::None
        })
    })
    .unwrap_or(ValueKind::None)
}

/// Pointee of a pointer type; null for everything else.
pub fn get_pointee_type(ctx: &InteropContext, ty: TypeHandle) -> TypeHandle {
    map_type(ctx, ty, |model, ty| {
        if model.is_pointer(ty) {
            model.pointee(ty)
        } else {
            None
        }
    })
}

pub fn get_pointer_type(ctx: &InteropContext, ty: TypeHandle) -> TypeHandle {
    map_type(ctx, ty, |model, ty| Some(model.pointer(ty)))
}

pub fn get_referenced_type(ctx: &InteropContext, ty: TypeHandle, rvalue: bool) -> TypeHandle {
    map_type(ctx, ty, |model, ty| {
        Some(if rvalue {
            model.rvalue_reference(ty)
        } else {
            model.lvalue_reference(ty)
        })
    })
}

pub fn get_non_reference_type(ctx: &InteropContext, ty: TypeHandle) -> TypeHandle {
    map_type(ctx, ty, |model, ty| Some(model.non_reference(ty)))
}

pub fn get_type_as_string(ctx: &InteropContext, ty: TypeHandle) -> RString {
    ctx.query(|model| {
        let ty = model.type_from_handle(ty)?;
        Some(RString::from(model.type_to_string(ty)))
    })
    .unwrap_or_default()
}

pub fn get_canonical_type(ctx: &InteropContext, ty: TypeHandle) -> TypeHandle {
    map_type(ctx, ty, |model, ty| Some(model.canonical(ty)))
}

/// Canonical, unqualified type with arrays, pointers and references peeled.
pub fn get_underlying_type(ctx: &InteropContext, ty: TypeHandle) -> TypeHandle {
    map_type(ctx, ty, |model, ty| Some(model.underlying(ty)))
}

/// Whether `ty` carries every qualifier in `qual`, typedefs included.
pub fn has_type_qualifier(ctx: &InteropContext, ty: TypeHandle, qual: QualKind) -> bool {
    type_is(ctx, ty, |model, ty| {
        let desugared = model.desugar(ty);
        model.ty(desugared).quals.contains(qual)
    })
}

pub fn add_type_qualifier(ctx: &InteropContext, ty: TypeHandle, qual: QualKind) -> TypeHandle {
    if qual == QualKind::NONE {
        return ty;
    }
    map_type(ctx, ty, |model, ty| Some(model.with_quals(ty, qual)))
}

/// Removes `qual` from `ty`. Qualifiers inside a typedef stay.
pub fn remove_type_qualifier(ctx: &InteropContext, ty: TypeHandle, qual: QualKind) -> TypeHandle {
    if qual == QualKind::NONE {
        return ty;
    }
    map_type(ctx, ty, |model, ty| Some(model.without_quals(ty, qual)))
}

pub fn get_size_of_type(ctx: &InteropContext, ty: TypeHandle) -> usize {
    let Some(service) = ctx.service() else {
        return 0;
    };
    let known = {
        let mut model = service.model_mut();
        let Some(ty) = model.type_from_handle(ty) else {
            return 0;
        };
        model.static_size_of(ty).ok_or(ty)
    };
    match known {
        Ok(size) => size,
        Err(ty) => service.size_of_type(ty).unwrap_or_else(|err| {
            tracing::debug!("GetSizeOfType: {err}");
            0
        }),
    }
}

/// Builtin spellings, then classes, enums and typedefs by qualified name.
pub fn get_type(ctx: &InteropContext, name: &str) -> TypeHandle {
    ctx.query_mut(|model| {
        let ty = match parse_builtin(name) {
            Some(BaseSpec::Void) => model.void(),
            Some(BaseSpec::Builtin(builtin)) => model.builtin(builtin),
            Some(BaseSpec::Complex(builtin)) => {
                let element = model.builtin(builtin);
                model.complex(element)
            }
            Some(BaseSpec::Name(_)) | None => {
                let decl = model.lookup_named(name, None).found()?;
                if !matches!(
                    model.decl(decl).kind,
                    DeclKind::Record(_) | DeclKind::Enum(_) | DeclKind::Typedef { .. }
                ) {
                    return None;
                }
                model.type_of_decl(decl)?
            }
        };
        Some(ty.handle())
    })
    .unwrap_or_default()
}

/// Type declared by a class, enum, typedef or variable.
pub fn get_type_from_scope(ctx: &InteropContext, klass: ScopeHandle) -> TypeHandle {
    ctx.query_mut(|model| {
        let decl = model.decl_from_scope(klass)?;
        model.type_of_decl(decl).map(TypeId::handle)
    })
    .unwrap_or_default()
}

pub fn get_complex_type(ctx: &InteropContext, element: TypeHandle) -> TypeHandle {
    map_type(ctx, element, |model, element| Some(model.complex(element)))
}

pub fn get_integer_type_from_enum_scope(ctx: &InteropContext, scope: ScopeHandle) -> TypeHandle {
    ctx.query(|model| {
        let decl = model.decl_from_scope(scope)?;
        match &model.decl(decl).kind {
            DeclKind::Enum(info) => Some(info.integer_type.handle()),
            _ => None,
        }
    })
    .unwrap_or_default()
}

pub fn get_integer_type_from_enum_type(ctx: &InteropContext, ty: TypeHandle) -> TypeHandle {
    map_type(ctx, ty, |model, ty| {
        let desugared = model.desugar(ty);
        let TypeKind::Enum(decl) = model.ty(desugared).kind else {
            return None;
        };
        match &model.decl(decl).kind {
            DeclKind::Enum(info) => Some(info.integer_type),
            _ => None,
        }
    })
}

/// Extent of each array dimension, outermost first; -1 for an unknown bound.
pub fn get_dimensions(ctx: &InteropContext, ty: TypeHandle) -> RVec<i64> {
    ctx.query_mut(|model| {
        let mut current = model.type_from_handle(ty)?;
        let mut dims = RVec::new();
        loop {
            let desugared = model.desugar(current);
            match model.ty(desugared).kind {
                TypeKind::ConstantArray(element, len) => {
                    dims.push(i64::try_from(len).unwrap_or(-1));
                    current = element;
                }
                TypeKind::IncompleteArray(element) => {
                    dims.push(-1);
                    current = element;
                }
                _ => break,
            }
        }
        Some(dims)
    })
    .unwrap_or_default()
}

pub fn is_type_derived_from(ctx: &InteropContext, derived: TypeHandle, base: TypeHandle) -> bool {
    ctx.query_mut(|model| {
        let derived = model.type_from_handle(derived)?;
        let base = model.type_from_handle(base)?;
        let derived = record_named_by(model, derived)?;
        let base = record_named_by(model, base)?;
        Some(model.is_derived_from(derived, base))
    })
    .unwrap_or(false)
}

fn record_named_by(model: &mut Model, ty: TypeId) -> Option<DeclId> {
    let desugared = model.desugar(ty);
    match model.ty(desugared).kind {
        TypeKind::Record(decl) => Some(decl),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::stub_context;
    use cppi_compiler::ModelBuilder;
    use cppi_compiler::model::{Access, Builtin, TagKind, TemplateArg};

    #[test]
    fn test_builtin_lookup_and_predicates() {
        let (ctx, _stub) = stub_context(Model::new());
        let int = get_type(&ctx, "int");
        assert!(!int.is_null());
        assert!(is_builtin(&ctx, int));
        assert!(is_pod_type(&ctx, int));
        assert_eq!(get_type(&ctx, "signed int"), int);
        assert_eq!(get_type_as_string(&ctx, get_type(&ctx, "unsigned long")).as_str(), "unsigned long");
        assert!(get_type(&ctx, "NoSuchType").is_null());
        assert_eq!(get_size_of_type(&ctx, get_type(&ctx, "double")), 8);
    }

    #[test]
    fn test_pointers_and_references() {
        let (ctx, _stub) = stub_context(Model::new());
        let int = get_type(&ctx, "int");
        let ptr = get_pointer_type(&ctx, int);
        assert!(is_pointer_type(&ctx, ptr));
        assert_eq!(get_pointee_type(&ctx, ptr), int);
        assert_eq!(get_type_as_string(&ctx, ptr).as_str(), "int *");

        let lref = get_referenced_type(&ctx, int, false);
        let rref = get_referenced_type(&ctx, int, true);
        assert!(is_lvalue_reference_type(&ctx, lref));
        assert!(is_rvalue_reference_type(&ctx, rref));
        assert!(is_reference_type(&ctx, rref));
        assert!(get_pointee_type(&ctx, lref).is_null());
        assert_eq!(get_non_reference_type(&ctx, rref), int);
        assert_eq!(get_value_kind(&ctx, lref), ValueKind::LValue);
        assert_eq!(get_value_kind(&ctx, rref), ValueKind::RValue);
        assert_eq!(get_value_kind(&ctx, int), ValueKind::None);
    }

    #[test]
    fn test_qualifiers() {
        let (ctx, _stub) = stub_context(Model::new());
        let int = get_type(&ctx, "int");
        let cv = add_type_qualifier(&ctx, int, QualKind::CONST | QualKind::VOLATILE);
        assert!(has_type_qualifier(&ctx, cv, QualKind::CONST));
        assert!(has_type_qualifier(&ctx, cv, QualKind::CONST | QualKind::VOLATILE));
        assert!(!has_type_qualifier(&ctx, cv, QualKind::RESTRICT));
        assert_eq!(get_type_as_string(&ctx, cv).as_str(), "const volatile int");
        let volatile = remove_type_qualifier(&ctx, cv, QualKind::CONST);
        assert!(!has_type_qualifier(&ctx, volatile, QualKind::CONST));
        assert_eq!(remove_type_qualifier(&ctx, volatile, QualKind::VOLATILE), int);
        assert_eq!(add_type_qualifier(&ctx, int, QualKind::NONE), int);
    }

    #[test]
    fn test_typedefs_and_canonical() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let const_int = builder.model().with_quals(int, QualKind::CONST);
        builder.typedef(Model::TRANSLATION_UNIT, "cint", const_int);
        let (ctx, _stub) = stub_context(model);

        let alias = get_type(&ctx, "cint");
        assert_eq!(get_type_as_string(&ctx, alias).as_str(), "cint");
        assert!(has_type_qualifier(&ctx, alias, QualKind::CONST));
        assert_eq!(get_type_as_string(&ctx, get_canonical_type(&ctx, alias)).as_str(), "const int");
        assert_eq!(get_underlying_type(&ctx, alias), get_type(&ctx, "int"));
    }

    #[test]
    fn test_arrays() {
        let mut model = Model::new();
        let int = model.builtin(Builtin::Int);
        let inner = model.constant_array(int, 3);
        let outer = model.constant_array(inner, 2);
        let open = model.incomplete_array(inner);
        let (ctx, _stub) = stub_context(model);
        assert_eq!(get_dimensions(&ctx, outer.handle()).as_slice(), [2, 3]);
        assert_eq!(get_dimensions(&ctx, open.handle()).as_slice(), [-1, 3]);
        assert!(get_dimensions(&ctx, int.handle()).is_empty());
        assert_eq!(get_size_of_type(&ctx, outer.handle()), 24);
        assert_eq!(get_underlying_type(&ctx, outer.handle()), inner.handle());
    }

    #[test]
    fn test_records_and_enums() {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let int = builder.builtin(Builtin::Int);
        let base = builder.record(Model::TRANSLATION_UNIT, "B", TagKind::Struct);
        builder.finish_record(base);
        let derived = builder.record(Model::TRANSLATION_UNIT, "D", TagKind::Struct);
        builder.base(derived, base, Access::Public, false);
        builder.finish_record(derived);
        let color = builder.enumeration(Model::TRANSLATION_UNIT, "Color", true, &[("Red", 1)]);

        let std_ns = builder.namespace(Model::TRANSLATION_UNIT, "std");
        let unique = builder.class_template(std_ns, "unique_ptr", &["T"]);
        let unique_int = builder.specialization(unique, vec![TemplateArg::ty(int)]);
        let handle = builder.record(Model::TRANSLATION_UNIT, "Handle", TagKind::Class);
        let void = builder.model().void();
        builder.function(handle, "use_count", void).build();
        builder.finish_record(handle);
        let unique_ty = builder.model().record_type(unique_int);
        let (ctx, _stub) = stub_context(model);

        let base_ty = get_type_from_scope(&ctx, base.scope());
        let derived_ty = get_type(&ctx, "D");
        assert!(is_record_type(&ctx, derived_ty));
        assert!(is_type_derived_from(&ctx, derived_ty, base_ty));
        assert!(!is_type_derived_from(&ctx, base_ty, derived_ty));
        assert!(!is_type_derived_from(&ctx, base_ty, base_ty));

        let color_ty = get_type(&ctx, "Color");
        assert!(is_enum_type(&ctx, color_ty));
        assert_eq!(get_integer_type_from_enum_type(&ctx, color_ty), int.handle());
        assert_eq!(get_integer_type_from_enum_scope(&ctx, color.scope()), int.handle());
        assert_eq!(get_size_of_type(&ctx, color_ty), 4);

        assert!(is_smart_ptr_type(&ctx, unique_ty.handle()));
        assert!(is_smart_ptr_type(&ctx, get_type(&ctx, "Handle")));
        assert!(!is_smart_ptr_type(&ctx, derived_ty));
        assert!(!is_smart_ptr_type(&ctx, int.handle()));
    }

    #[test]
    fn test_null_handles() {
        let (ctx, _stub) = stub_context(Model::new());
        assert!(!is_builtin(&ctx, TypeHandle::null()));
        assert!(get_pointer_type(&ctx, TypeHandle::null()).is_null());
        assert!(get_type_as_string(&ctx, TypeHandle::null()).is_empty());
        assert_eq!(get_size_of_type(&ctx, TypeHandle::null()), 0);
    }
}
