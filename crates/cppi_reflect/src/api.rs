//! `extern "C"` entry points, one per operation of the table.
//!
//! Each entry converts its C arguments, runs the operation against the
//! process context and turns a panic into the operation's failure value.
//! Nothing here is exported by symbol name: callers reach the entries
//! through [`crate::resolver`].

use std::ffi::CStr;
use std::panic::{AssertUnwindSafe, catch_unwind};

use abi_stable::std_types::{RSlice, RString, RVec};
use cppi_abi::{
    FunctionHandle, InterpHandle, JitCall, ObjectHandle, Operator, OperatorArity, QualKind, ScopeHandle,
    TemplateArgInfo, TypeHandle, ValueKind, c_char, c_void,
};
use once_cell::sync::Lazy;

use crate::context::InteropContext;
use crate::ops::TemplateArgSpec;

static CONTEXT: Lazy<InteropContext> = Lazy::new(InteropContext::from_env);

/// The process-wide context behind the entry points.
pub fn context() -> &'static InteropContext {
    &CONTEXT
}

/// Conversion of a C argument into what the operation takes.
pub trait FromAbi<'a> {
    type Target;

    /// # Safety
    /// Pointers must be null or valid for `'a`.
    unsafe fn from_abi(self) -> Self::Target;
}

macro_rules! identity_from_abi {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromAbi<'_> for $ty {
                type Target = Self;

                unsafe fn from_abi(self) -> Self {
                    self
                }
            }
        )*
    };
}

identity_from_abi!(
    bool,
    usize,
    ScopeHandle,
    TypeHandle,
    FunctionHandle,
    ObjectHandle,
    InterpHandle,
    QualKind,
    Operator,
    OperatorArity,
    *mut c_void,
);

/// # Safety
/// `ptr` must be null or a NUL-terminated string valid for `'a`.
unsafe fn text<'a>(ptr: *const c_char) -> &'a str {
    if ptr.is_null() {
        return "";
    }
    // SAFETY: guaranteed by the caller.
    let raw = unsafe { CStr::from_ptr(ptr) };
    raw.to_str().unwrap_or_else(|_| {
        tracing::warn!("ignoring string argument that is not UTF-8: {raw:?}");
        ""
    })
}

impl<'a> FromAbi<'a> for *const c_char {
    type Target = &'a str;

    unsafe fn from_abi(self) -> &'a str {
        // SAFETY: forwarded from the caller.
        unsafe { text(self) }
    }
}

impl<'a> FromAbi<'a> for *mut bool {
    type Target = Option<&'a mut bool>;

    unsafe fn from_abi(self) -> Option<&'a mut bool> {
        // SAFETY: forwarded from the caller.
        unsafe { self.as_mut() }
    }
}

impl<'a> FromAbi<'a> for RSlice<'a, *const c_char> {
    type Target = Vec<String>;

    unsafe fn from_abi(self) -> Vec<String> {
        self.as_slice()
            .iter()
            // SAFETY: forwarded from the caller.
            .map(|arg| unsafe { text(*arg) }.to_string())
            .collect()
    }
}

impl<'a> FromAbi<'a> for RSlice<'a, FunctionHandle> {
    type Target = &'a [FunctionHandle];

    unsafe fn from_abi(self) -> &'a [FunctionHandle] {
        self.as_slice()
    }
}

impl<'a> FromAbi<'a> for RSlice<'a, TemplateArgInfo> {
    type Target = Vec<TemplateArgSpec<'a>>;

    unsafe fn from_abi(self) -> Vec<TemplateArgSpec<'a>> {
        self.as_slice()
            .iter()
            .map(|info| {
                if info.integral_value.is_null() {
                    TemplateArgSpec::ty(info.ty)
                } else {
                    // SAFETY: forwarded from the caller.
                    TemplateArgSpec::value(info.ty, unsafe { text(info.integral_value) })
                }
            })
            .collect()
    }
}

/// Value an entry returns when its operation panics.
pub trait Sentinel {
    fn sentinel() -> Self;
}

macro_rules! default_sentinel {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Sentinel for $ty {
                fn sentinel() -> Self {
                    Self::default()
                }
            }
        )*
    };
}

default_sentinel!(
    (),
    bool,
    usize,
    isize,
    i32,
    i64,
    RString,
    QualKind,
    ScopeHandle,
    TypeHandle,
    FunctionHandle,
    ObjectHandle,
    InterpHandle,
    JitCall,
);

impl<T> Sentinel for RVec<T> {
    fn sentinel() -> Self {
        Self::new()
    }
}

impl Sentinel for *mut c_void {
    fn sentinel() -> Self {
        std::ptr::null_mut()
    }
}

impl Sentinel for ValueKind {
    fn sentinel() -> Self {
        Self::None
    }
}

impl Sentinel for OperatorArity {
    fn sentinel() -> Self {
        Self::Both
    }
}

impl Sentinel for Operator {
    fn sentinel() -> Self {
        Self::None
    }
}

/// Runs `op`, logging a panic and answering the sentinel instead of
/// unwinding into C.
pub fn guarded<R: Sentinel>(name: &str, op: impl FnOnce() -> R) -> R {
    catch_unwind(AssertUnwindSafe(op)).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("unknown panic");
        tracing::error!("{name} panicked: {message}");
        R::sentinel()
    })
}

macro_rules! export_operations {
    ($($name:ident => $func:ident ($($arg:ident : $ty:ty),*) -> $ret:ty;)*) => {
        $(
            #[doc = concat!("Entry point of `", stringify!($name), "`.")]
            ///
            /// # Safety
            /// String and slice arguments must be null or valid for the
            /// duration of the call; object and arena pointers must satisfy
            /// the operation's own requirements.
            #[allow(unused_unsafe, clippy::unused_unit)]
            pub unsafe extern "C" fn $func($($arg: $ty),*) -> $ret {
                guarded(stringify!($name), || {
                    // SAFETY: forwarded from the caller.
                    unsafe { crate::ops::$func(context(), $(FromAbi::from_abi($arg)),*) }
                })
            }
        )*
    };
}

cppi_abi::cppinterop_api!(export_operations);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_arguments() {
        unsafe {
            assert_eq!(text(std::ptr::null()), "");
            assert_eq!(text(c"std::vector".as_ptr()), "std::vector");
            let invalid = [0xffu8, 0xfe, 0];
            assert_eq!(text(invalid.as_ptr().cast()), "");
        }
    }

    #[test]
    fn test_slice_arguments() {
        let args = [c"-std=c++17".as_ptr(), std::ptr::null()];
        let converted = unsafe { RSlice::from_slice(&args).from_abi() };
        assert_eq!(converted, ["-std=c++17".to_string(), String::new()]);

        let infos = [
            TemplateArgInfo::from_type(TypeHandle::null()),
            TemplateArgInfo::with_value(TypeHandle::null(), c"3"),
        ];
        let specs = unsafe { RSlice::from_slice(&infos).from_abi() };
        assert_eq!(specs[0].value, None);
        assert_eq!(specs[1].value, Some("3"));

        let mut flag = false;
        let out = unsafe { (&raw mut flag).from_abi() };
        if let Some(out) = out {
            *out = true;
        }
        assert!(flag);
        assert!(unsafe { std::ptr::null_mut::<bool>().from_abi() }.is_none());
    }

    #[test]
    fn test_guarded_returns_sentinels() {
        assert!(!guarded("Panics", || -> bool { panic!("boom") }));
        assert!(guarded("Panics", || -> ScopeHandle { panic!("boom") }).is_null());
        assert_eq!(guarded("Panics", || -> OperatorArity { panic!("boom") }), OperatorArity::Both);
        assert!(guarded("Panics", || -> RVec<RString> { panic!("boom") }).is_empty());
        assert_eq!(guarded("Fine", || 7usize), 7);
    }

    #[test]
    fn test_entries_without_interpreter() {
        unsafe {
            assert!(get_version().as_str().starts_with("CppInterOp version"));
            assert_eq!(get_operator_from_spelling(c"+=".as_ptr()), Operator::PlusEqual);
            assert!(get_scope(c"std".as_ptr(), ScopeHandle::null()).is_null());
            assert!(get_class_methods(ScopeHandle::null()).is_empty());
            assert!(make_function_callable(FunctionHandle::null()).is_invalid());
        }
    }
}
