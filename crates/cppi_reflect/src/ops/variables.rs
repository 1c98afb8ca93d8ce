//! Data members, variables and enumerators.

use abi_stable::std_types::RVec;
use cppi_abi::{QualKind, ScopeHandle, TypeHandle};
use cppi_compiler::model::{Access, DeclKind, VarInfo};
use cppi_compiler::{DeclId, Model};

use crate::context::InteropContext;

fn scopes(decls: impl IntoIterator<Item = DeclId>) -> RVec<ScopeHandle> {
    decls.into_iter().map(DeclId::scope).collect()
}

fn record_members(ctx: &InteropContext, scope: ScopeHandle, members: impl FnOnce(&Model, DeclId) -> Vec<DeclId>) -> RVec<ScopeHandle> {
    ctx.query(|model| {
        let decl = model.decl_from_scope(scope)?;
        model.record(decl)?;
        Some(scopes(members(model, decl)))
    })
    .unwrap_or_default()
}

/// Non-static data members in declaration order.
pub fn get_datamembers(ctx: &InteropContext, scope: ScopeHandle) -> RVec<ScopeHandle> {
    record_members(ctx, scope, Model::fields)
}

pub fn get_static_datamembers(ctx: &InteropContext, scope: ScopeHandle) -> RVec<ScopeHandle> {
    record_members(ctx, scope, Model::static_data_members)
}

/// Enumerators of the enums nested in a class. Scoped enums only count with
/// `include_enum_class`.
pub fn get_enum_constant_datamembers(ctx: &InteropContext, scope: ScopeHandle, include_enum_class: bool) -> RVec<ScopeHandle> {
    record_members(ctx, scope, |model, record| {
        model
            .decl(record)
            .members
            .iter()
            .filter(|member| match &model.decl(**member).kind {
                DeclKind::Enum(info) => include_enum_class || !info.scoped,
                _ => false,
            })
            .flat_map(|member| model.decl(*member).members.iter().copied())
            .collect()
    })
}

/// The field `name` in `parent`; other declarations of that name are not
/// data members.
pub fn lookup_datamember(ctx: &InteropContext, name: &str, parent: ScopeHandle) -> ScopeHandle {
    ctx.query(|model| {
        let within = if parent.is_null() {
            None
        } else {
            Some(model.decl_from_scope(parent)?)
        };
        let found = model.lookup_named(name, within).found()?;
        model
            .decl(found)
            .variable()
            .is_some_and(|info| info.is_field)
            .then(|| found.scope())
    })
    .unwrap_or_default()
}

/// Declared type of a variable, field or enumerator.
pub fn get_variable_type(ctx: &InteropContext, var: ScopeHandle) -> TypeHandle {
    ctx.query(|model| {
        let decl = model.decl_from_scope(var)?;
        match &model.decl(decl).kind {
            DeclKind::Variable(info) => Some(info.ty.handle()),
            DeclKind::EnumConstant { ty, .. } => Some(ty.handle()),
            _ => None,
        }
    })
    .unwrap_or_default()
}

enum Placement {
    Field { field: DeclId, owner: DeclId, within: Option<DeclId> },
    Symbol(String),
}

/// Byte offset of a field inside `parent` (its own class when null), or the
/// address of a namespace-scope or static variable. Zero when unknown.
pub fn get_variable_offset(ctx: &InteropContext, var: ScopeHandle, parent: ScopeHandle) -> isize {
    let Some(service) = ctx.service() else {
        return 0;
    };
    let placement = {
        let model = service.model();
        model.decl_from_scope(var).and_then(|decl| {
            let entry = model.decl(decl);
            let info = entry.variable()?;
            if info.is_field {
                let within = model.decl_from_scope(parent).filter(|within| Some(*within) != entry.parent);
                Some(Placement::Field {
                    field: decl,
                    owner: entry.parent?,
                    within,
                })
            } else {
                Some(Placement::Symbol(
                    info.mangled_name.clone().unwrap_or_else(|| entry.name.clone()),
                ))
            }
        })
    };
    let offset = match placement {
        None => return 0,
        Some(Placement::Symbol(symbol)) => service
            .symbol_address(&symbol)
            .map(|address| address as isize),
        Some(Placement::Field { field, owner, within }) => service.field_offset(field).and_then(|offset| {
            let base = match within {
                Some(derived) => service.base_class_offset(derived, owner)?,
                None => 0,
            };
            Ok(offset + base)
        })
        .map(|offset| isize::try_from(offset).unwrap_or(0)),
    };
    offset.unwrap_or_else(|err| {
        tracing::error!("GetVariableOffset: {err}");
        0
    })
}

fn variable_is(ctx: &InteropContext, var: ScopeHandle, test: impl FnOnce(Access, &VarInfo) -> bool) -> bool {
    ctx.query(|model| {
        let decl = model.decl_from_scope(var)?;
        let entry = model.decl(decl);
        entry.variable().map(|info| test(entry.access, info))
    })
    .unwrap_or(false)
}

pub fn is_public_variable(ctx: &InteropContext, var: ScopeHandle) -> bool {
    variable_is(ctx, var, |access, _| access == Access::Public)
}

pub fn is_protected_variable(ctx: &InteropContext, var: ScopeHandle) -> bool {
    variable_is(ctx, var, |access, _| access == Access::Protected)
}

pub fn is_private_variable(ctx: &InteropContext, var: ScopeHandle) -> bool {
    variable_is(ctx, var, |access, _| access == Access::Private)
}

/// Variables with static storage: globals and static data members.
pub fn is_static_variable(ctx: &InteropContext, var: ScopeHandle) -> bool {
    variable_is(ctx, var, |_, info| !info.is_field)
}

pub fn is_const_variable(ctx: &InteropContext, var: ScopeHandle) -> bool {
    ctx.query_mut(|model| {
        let decl = model.decl_from_scope(var)?;
        let ty = model.decl(decl).variable()?.ty;
        let desugared = model.desugar(ty);
        Some(model.ty(desugared).quals.contains(QualKind::CONST))
    })
    .unwrap_or(false)
}

pub fn get_enum_constants(ctx: &InteropContext, scope: ScopeHandle) -> RVec<ScopeHandle> {
    ctx.query(|model| {
        let decl = model.decl_from_scope(scope)?;
        let entry = model.decl(decl);
        matches!(entry.kind, DeclKind::Enum(_)).then(|| scopes(entry.members.iter().copied()))
    })
    .unwrap_or_default()
}

pub fn get_enum_constant_type(ctx: &InteropContext, scope: ScopeHandle) -> TypeHandle {
    ctx.query(|model| {
        let decl = model.decl_from_scope(scope)?;
        match model.decl(decl).kind {
            DeclKind::EnumConstant { ty, .. } => Some(ty.handle()),
            _ => None,
        }
    })
    .unwrap_or_default()
}

pub fn get_enum_constant_value(ctx: &InteropContext, scope: ScopeHandle) -> i64 {
    ctx.query(|model| {
        let decl = model.decl_from_scope(scope)?;
        match model.decl(decl).kind {
            DeclKind::EnumConstant { value, .. } => Some(value),
            _ => None,
        }
    })
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::stub_context;
    use cppi_abi::c_void;
    use cppi_compiler::ModelBuilder;
    use cppi_compiler::model::{Builtin, TagKind};

    struct Fixture {
        base: DeclId,
        derived: DeclId,
        x: DeclId,
        y: DeclId,
        z: DeclId,
        count: DeclId,
        limit: DeclId,
        plain: DeclId,
        scoped: DeclId,
    }

    fn set_offset(model: &mut Model, field: DeclId, offset: i64) {
        if let DeclKind::Variable(info) = &mut model.decl_mut(field).kind {
            info.offset = Some(offset);
        }
    }

    fn fixture(model: &mut Model) -> Fixture {
        let mut builder = ModelBuilder::new(model);
        let int = builder.builtin(Builtin::Int);
        let const_int = builder.model().with_quals(int, QualKind::CONST);
        let base = builder.record(Model::TRANSLATION_UNIT, "Base", TagKind::Struct);
        let x = builder.field(base, "x", int, Access::Public);
        builder.finish_record(base);
        let derived = builder.record(Model::TRANSLATION_UNIT, "Derived", TagKind::Class);
        builder.base(derived, base, Access::Public, false);
        let y = builder.field(derived, "y", int, Access::Protected);
        let z = builder.field(derived, "z", const_int, Access::Private);
        let count = builder.variable(derived, "count", int);
        let plain = builder.enumeration(derived, "Mode", false, &[("Fast", 1), ("Slow", 2)]);
        let scoped = builder.enumeration(derived, "Level", true, &[("Low", -1)]);
        builder.finish_record(derived);
        let limit = builder.variable(Model::TRANSLATION_UNIT, "limit", const_int);
        set_offset(model, x, 0);
        set_offset(model, y, 4);
        set_offset(model, z, 8);
        Fixture {
            base,
            derived,
            x,
            y,
            z,
            count,
            limit,
            plain,
            scoped,
        }
    }

    #[test]
    fn test_members() {
        let mut model = Model::new();
        let f = fixture(&mut model);
        let (ctx, _stub) = stub_context(model);
        assert_eq!(get_datamembers(&ctx, f.derived.scope()).as_slice(), [f.y.scope(), f.z.scope()]);
        assert_eq!(get_static_datamembers(&ctx, f.derived.scope()).as_slice(), [f.count.scope()]);
        assert_eq!(get_enum_constant_datamembers(&ctx, f.derived.scope(), false).len(), 2);
        assert_eq!(get_enum_constant_datamembers(&ctx, f.derived.scope(), true).len(), 3);
        assert!(get_datamembers(&ctx, f.plain.scope()).is_empty());
        assert_eq!(lookup_datamember(&ctx, "y", f.derived.scope()), f.y.scope());
        assert!(lookup_datamember(&ctx, "count", f.derived.scope()).is_null());
        assert!(lookup_datamember(&ctx, "nothing", f.derived.scope()).is_null());
    }

    #[test]
    fn test_variable_predicates() {
        let mut model = Model::new();
        let f = fixture(&mut model);
        let (ctx, _stub) = stub_context(model);
        assert!(is_public_variable(&ctx, f.x.scope()));
        assert!(is_protected_variable(&ctx, f.y.scope()));
        assert!(is_private_variable(&ctx, f.z.scope()));
        assert!(is_static_variable(&ctx, f.count.scope()));
        assert!(is_static_variable(&ctx, f.limit.scope()));
        assert!(!is_static_variable(&ctx, f.x.scope()));
        assert!(is_const_variable(&ctx, f.z.scope()));
        assert!(is_const_variable(&ctx, f.limit.scope()));
        assert!(!is_const_variable(&ctx, f.y.scope()));
        assert!(!is_public_variable(&ctx, f.derived.scope()));
        let int = get_variable_type(&ctx, f.x.scope());
        assert!(!int.is_null());
        assert_ne!(get_variable_type(&ctx, f.z.scope()), int);
    }

    #[test]
    fn test_offsets() {
        let mut model = Model::new();
        let f = fixture(&mut model);
        let (ctx, stub) = stub_context(model);
        assert_eq!(get_variable_offset(&ctx, f.z.scope(), ScopeHandle::null()), 8);
        assert_eq!(get_variable_offset(&ctx, f.x.scope(), f.base.scope()), 0);
        stub.set_base_offset(f.derived, f.base, 16);
        assert_eq!(get_variable_offset(&ctx, f.x.scope(), f.derived.scope()), 16);

        let mut storage = 0i32;
        let address = std::ptr::from_mut(&mut storage).cast::<c_void>();
        stub.define_symbol("limit", address);
        assert_eq!(get_variable_offset(&ctx, f.limit.scope(), ScopeHandle::null()), address as isize);
        assert_eq!(get_variable_offset(&ctx, f.count.scope(), ScopeHandle::null()), 0);
        assert_eq!(get_variable_offset(&ctx, ScopeHandle::null(), ScopeHandle::null()), 0);
    }

    #[test]
    fn test_enum_constants() {
        let mut model = Model::new();
        let f = fixture(&mut model);
        let (ctx, _stub) = stub_context(model);
        let constants = get_enum_constants(&ctx, f.plain.scope());
        assert_eq!(constants.len(), 2);
        assert_eq!(get_enum_constant_value(&ctx, constants[1]), 2);
        let low = get_enum_constants(&ctx, f.scoped.scope())[0];
        assert_eq!(get_enum_constant_value(&ctx, low), -1);
        assert!(!get_enum_constant_type(&ctx, low).is_null());
        assert_eq!(get_variable_type(&ctx, low), get_enum_constant_type(&ctx, low));
        assert!(get_enum_constants(&ctx, f.derived.scope()).is_empty());
        assert_eq!(get_enum_constant_value(&ctx, f.derived.scope()), 0);
    }
}
