//! Object storage, construction and destruction, and callables.
//!
//! Storage handed out by [`allocate`] (and by [`construct`] without an arena)
//! comes from the Rust global allocator with a fixed alignment, so it must be
//! released through [`deallocate`] or [`destruct`] with `with_free`.

use std::alloc::Layout;
use std::ffi::CStr;

use abi_stable::std_types::RString;
use cppi_abi::{ArgList, FunctionHandle, JitCall, ObjectHandle, ScopeHandle, c_char, c_ulong, c_void};
use cppi_compiler::model::{Builtin, DeclKind, TypeKind};
use cppi_compiler::{Model, TypeId};

use crate::context::InteropContext;
use crate::ops::{get_default_constructor, size_of};

/// Alignment of every allocation, that of `max_align_t`.
const ALIGN: usize = 16;

fn layout(ctx: &InteropContext, scope: ScopeHandle, count: usize) -> Option<Layout> {
    let size = size_of(ctx, scope);
    if size == 0 {
        return None;
    }
    Layout::from_size_align(size.checked_mul(count.max(1))?, ALIGN).ok()
}

/// Uninitialized storage for `count` objects of a class (one when zero).
pub fn allocate(ctx: &InteropContext, scope: ScopeHandle, count: usize) -> ObjectHandle {
    let Some(layout) = layout(ctx, scope, count) else {
        tracing::error!("Allocate: size of {scope:?} is unknown");
        return ObjectHandle::null();
    };
    // SAFETY: the layout has a non-zero size.
    let ptr = unsafe { std::alloc::alloc(layout) };
    ObjectHandle::from_ptr(ptr.cast())
}

/// Releases storage from [`allocate`].
///
/// # Safety
/// `address` must be null or come from [`allocate`] with the same `scope`
/// and `count`, and must not be used afterwards.
pub unsafe fn deallocate(ctx: &InteropContext, scope: ScopeHandle, address: ObjectHandle, count: usize) {
    if address.is_null() {
        return;
    }
    match layout(ctx, scope, count) {
        // SAFETY: guaranteed by the caller.
        Some(layout) => unsafe { std::alloc::dealloc(address.as_ptr().cast(), layout) },
        None => tracing::error!("Deallocate: size of {scope:?} is unknown, leaking {address:?}"),
    }
}

fn default_constructor_call(ctx: &InteropContext, scope: ScopeHandle) -> Option<JitCall> {
    let ctor = get_default_constructor(ctx, scope);
    if ctor.is_null() {
        tracing::error!("Construct: {scope:?} has no default constructor");
        return None;
    }
    let call = make_function_callable(ctx, ctor);
    call.is_valid().then_some(call)
}

/// Default-constructs `count` objects (one when zero) of a class, in
/// `arena` when it is non-null and in fresh storage otherwise. Returns the
/// first object.
///
/// # Safety
/// A non-null `arena` must be valid for writes of `count` objects.
pub unsafe fn construct(ctx: &InteropContext, scope: ScopeHandle, arena: *mut c_void, count: usize) -> ObjectHandle {
    let Some(call) = default_constructor_call(ctx, scope) else {
        return ObjectHandle::null();
    };
    let stride = size_of(ctx, scope);
    let (base, owned) = if arena.is_null() {
        let fresh = allocate(ctx, scope, count);
        if fresh.is_null() {
            return ObjectHandle::null();
        }
        (fresh.as_ptr(), true)
    } else {
        (arena, false)
    };
    if stride == 0 && count > 1 {
        tracing::error!("Construct: size of {scope:?} is unknown");
        if owned {
            // SAFETY: `base` was allocated above and holds no objects.
            unsafe { deallocate(ctx, scope, ObjectHandle::from_ptr(base), count) };
        }
        return ObjectHandle::null();
    }
    for index in 0..count.max(1) {
        // SAFETY: `base` holds room for `count` objects of `stride` bytes.
        let object = unsafe { base.cast::<u8>().add(index * stride) }.cast::<c_void>();
        // SAFETY: the trampoline constructs in place at `object`.
        unsafe { call.invoke(std::ptr::null_mut(), ArgList::empty(), object) };
    }
    ObjectHandle::from_ptr(base)
}

/// Runs the destructor of `count` objects (one when zero) at `object`, then
/// releases the storage when `with_free` is set.
///
/// # Safety
/// `object` must point to live objects of the class, and with `with_free`
/// to storage obtained from [`construct`] or [`allocate`] with `count`.
pub unsafe fn destruct(ctx: &InteropContext, object: ObjectHandle, scope: ScopeHandle, with_free: bool, count: usize) -> bool {
    if object.is_null() {
        return false;
    }
    let Some(service) = ctx.service() else {
        return false;
    };
    let record = {
        let mut model = service.model_mut();
        model
            .decl_from_scope(scope)
            .and_then(|decl| model.record_of_decl(decl))
    };
    let Some(record) = record else {
        tracing::error!("Destruct: {scope:?} is not a class");
        return false;
    };
    let call = match ctx.engine().make_dtor_wrapper(service.as_ref(), record) {
        Ok(call) => JitCall::destructor(call, FunctionHandle::null()),
        Err(err) => {
            tracing::error!("Destruct: {err}");
            return false;
        }
    };
    let nary = if count > 1 {
        c_ulong::try_from(count).unwrap_or(c_ulong::MAX)
    } else {
        0
    };
    // SAFETY: guaranteed by the caller.
    unsafe {
        call.invoke_destructor(object.as_ptr(), nary, false);
        if with_free {
            deallocate(ctx, scope, object, count);
        }
    }
    true
}

/// A callable for `func`; invalid when no trampoline can be made.
pub fn make_function_callable(ctx: &InteropContext, func: FunctionHandle) -> JitCall {
    let Some(service) = ctx.service() else {
        return JitCall::invalid();
    };
    let decl = service.model().decl_from_function(func);
    match decl {
        Some(decl) => ctx.engine().make_function_callable(service.as_ref(), decl),
        None => JitCall::invalid(),
    }
}

/// How an object of a named type is rendered.
enum Rendering {
    Builtin(Builtin),
    CString,
    Pointer,
    Opaque,
}

fn rendering(model: &mut Model, ty: TypeId) -> Rendering {
    let canonical = model.canonical(ty);
    let (enumeration, pointee) = match model.ty(canonical).kind {
        TypeKind::Builtin(builtin) => return Rendering::Builtin(builtin),
        TypeKind::Enum(decl) => (Some(decl), None),
        TypeKind::Pointer(pointee) => (None, Some(pointee)),
        _ => return Rendering::Opaque,
    };
    if let Some(decl) = enumeration {
        let integer = match &model.decl(decl).kind {
            DeclKind::Enum(info) => info.integer_type,
            _ => return Rendering::Opaque,
        };
        return rendering(model, integer);
    }
    let Some(pointee) = pointee else {
        return Rendering::Opaque;
    };
    let pointee = model.canonical(pointee);
    match model.ty(pointee).kind {
        TypeKind::Builtin(Builtin::Char) => Rendering::CString,
        _ => Rendering::Pointer,
    }
}

/// # Safety
/// `ptr` must be valid for a read of the builtin's size.
unsafe fn read_builtin(builtin: Builtin, ptr: *const c_void) -> Option<String> {
    use core::ffi::{c_long, c_longlong, c_ulonglong};

    // SAFETY: guaranteed by the caller; reads tolerate any alignment.
    unsafe {
        Some(match builtin {
            Builtin::Bool => (ptr.cast::<u8>().read() != 0).to_string(),
            Builtin::Char | Builtin::SChar => format!("'{}'", char::from(ptr.cast::<u8>().read())),
            Builtin::UChar | Builtin::Char8 => ptr.cast::<u8>().read().to_string(),
            Builtin::Char16 | Builtin::UShort => ptr.cast::<u16>().read_unaligned().to_string(),
            Builtin::Short => ptr.cast::<i16>().read_unaligned().to_string(),
            Builtin::Char32 | Builtin::UInt => ptr.cast::<u32>().read_unaligned().to_string(),
            Builtin::WChar | Builtin::Int => ptr.cast::<i32>().read_unaligned().to_string(),
            Builtin::Long => ptr.cast::<c_long>().read_unaligned().to_string(),
            Builtin::ULong => ptr.cast::<c_ulong>().read_unaligned().to_string(),
            Builtin::LongLong => ptr.cast::<c_longlong>().read_unaligned().to_string(),
            Builtin::ULongLong => ptr.cast::<c_ulonglong>().read_unaligned().to_string(),
            Builtin::Int128 => ptr.cast::<i128>().read_unaligned().to_string(),
            Builtin::UInt128 => ptr.cast::<u128>().read_unaligned().to_string(),
            Builtin::Float => format!("{}f", ptr.cast::<f32>().read_unaligned()),
            Builtin::Double => ptr.cast::<f64>().read_unaligned().to_string(),
            Builtin::NullPtr => "nullptr".to_string(),
            Builtin::LongDouble => return None,
        })
    }
}

/// Text rendering of the object at `obj` whose type is spelled `type_name`.
/// Unknown types and classes render as their address.
///
/// # Safety
/// `obj` must be null or point to a live object of the named type.
pub unsafe fn obj_to_string(ctx: &InteropContext, type_name: &str, obj: ObjectHandle) -> RString {
    let opaque = || RString::from(format!("@{:p}", obj.as_ptr()));
    if obj.is_null() {
        return RString::from("nullptr");
    }
    let Some(rendering) = ctx.query_mut(|model| {
        let ty = model.parse_type(type_name, Model::TRANSLATION_UNIT);
        Some(rendering(model, ty))
    }) else {
        return opaque();
    };
    let ptr = obj.as_ptr().cast_const();
    // SAFETY: `obj` points to an object of the named type.
    let text = unsafe {
        match rendering {
            Rendering::Builtin(builtin) => read_builtin(builtin, ptr),
            Rendering::CString => {
                let chars = ptr.cast::<*const c_char>().read_unaligned();
                if chars.is_null() {
                    Some("nullptr".to_string())
                } else {
                    Some(format!("{:?}", CStr::from_ptr(chars).to_string_lossy()))
                }
            }
            Rendering::Pointer => Some(format!("{:p}", ptr.cast::<*const c_void>().read_unaligned())),
            Rendering::Opaque => None,
        }
    };
    text.map_or_else(opaque, RString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::stub_context;
    use cppi_abi::c_int;
    use cppi_compiler::ModelBuilder;
    use cppi_compiler::model::TagKind;
    use cppi_compiler::{DeclId, testing::StubCompiler};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    const MARKER: u64 = 0x5eed;

    static DESTROYED: AtomicU64 = AtomicU64::new(0);

    unsafe extern "C" fn construct_marker(obj: *mut c_void, _nargs: c_int, _args: *mut *mut c_void, ret: *mut c_void) {
        unsafe {
            obj.cast::<u64>().write(MARKER);
            if !ret.is_null() {
                ret.cast::<*mut c_void>().write(obj);
            }
        }
    }

    unsafe extern "C" fn count_destroyed(_obj: *mut c_void, nary: c_ulong, with_free: c_int) {
        assert_eq!(with_free, 0);
        DESTROYED.fetch_add(u64::from(nary).max(1), Ordering::SeqCst);
    }

    fn widget() -> (InteropContext, Arc<StubCompiler>, DeclId) {
        let mut model = Model::new();
        let mut builder = ModelBuilder::new(&mut model);
        let record = builder.record(Model::TRANSLATION_UNIT, "Widget", TagKind::Struct);
        builder.finish_record(record);
        if let Some(info) = model.record_mut(record) {
            info.size = Some(8);
        }
        let (ctx, stub) = stub_context(model);
        (ctx, stub, record)
    }

    #[test]
    fn test_allocate() {
        let (ctx, _stub, record) = widget();
        let object = allocate(&ctx, record.scope(), 3);
        assert!(!object.is_null());
        assert_eq!(object.as_ptr() as usize % ALIGN, 0);
        unsafe { deallocate(&ctx, record.scope(), object, 3) };
        assert!(allocate(&ctx, ScopeHandle::null(), 1).is_null());
    }

    #[test]
    fn test_construct_and_destruct() {
        let (ctx, stub, record) = widget();
        stub.set_compile_target(Some(construct_marker as *mut c_void));

        let mut arena = [0u64; 2];
        let placed = unsafe { construct(&ctx, record.scope(), arena.as_mut_ptr().cast(), 2) };
        assert_eq!(placed.as_ptr(), arena.as_mut_ptr().cast::<c_void>());
        assert_eq!(arena, [MARKER, MARKER]);

        let fresh = unsafe { construct(&ctx, record.scope(), std::ptr::null_mut(), 0) };
        assert!(!fresh.is_null());
        assert_eq!(unsafe { fresh.as_ptr().cast::<u64>().read() }, MARKER);

        stub.set_compile_target(Some(count_destroyed as *mut c_void));
        DESTROYED.store(0, Ordering::SeqCst);
        assert!(unsafe { destruct(&ctx, fresh, record.scope(), true, 0) });
        assert!(unsafe { destruct(&ctx, placed, record.scope(), false, 2) });
        assert_eq!(DESTROYED.load(Ordering::SeqCst), 3);
        assert!(!unsafe { destruct(&ctx, ObjectHandle::null(), record.scope(), false, 1) });
    }

    #[test]
    fn test_construct_without_default_constructor() {
        let (ctx, _stub, _record) = widget();
        let none = unsafe { construct(&ctx, ScopeHandle::null(), std::ptr::null_mut(), 1) };
        assert!(none.is_null());
    }

    #[test]
    fn test_make_function_callable() {
        let (ctx, stub, record) = widget();
        let ctor = get_default_constructor(&ctx, record.scope());
        assert!(make_function_callable(&ctx, ctor).is_invalid());
        stub.set_compile_target(Some(construct_marker as *mut c_void));
        let call = make_function_callable(&ctx, ctor);
        assert!(call.is_valid());
        assert_eq!(call.origin(), ctor);
        assert!(make_function_callable(&ctx, FunctionHandle::null()).is_invalid());
    }

    #[test]
    fn test_obj_to_string() {
        let (ctx, _stub, _record) = widget();
        let mut number = 42i32;
        let mut flag = true;
        let mut ratio = 0.5f64;
        let text = c"hi".as_ptr();
        let mut text_cell = text;
        let render = |name: &str, ptr: *mut c_void| unsafe { obj_to_string(&ctx, name, ObjectHandle::from_ptr(ptr)) };
        assert_eq!(render("int", (&raw mut number).cast()).as_str(), "42");
        assert_eq!(render("bool", (&raw mut flag).cast()).as_str(), "true");
        assert_eq!(render("double", (&raw mut ratio).cast()).as_str(), "0.5");
        assert_eq!(render("const char*", (&raw mut text_cell).cast()).as_str(), "\"hi\"");
        let widget_ptr = (&raw mut number).cast::<c_void>();
        assert_eq!(render("Widget", widget_ptr).as_str(), format!("@{widget_ptr:p}"));
        assert_eq!(render("Unknown", widget_ptr).as_str(), format!("@{widget_ptr:p}"));
        assert_eq!(render("int", std::ptr::null_mut()).as_str(), "nullptr");
    }
}
