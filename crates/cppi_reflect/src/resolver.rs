//! Name-to-address resolution for the entry points in [`crate::api`].

use std::ffi::CStr;

use ahash::AHashMap;
use cppi_abi::{CppFnPtr, c_uchar};
use once_cell::sync::Lazy;

macro_rules! resolver_entries {
    ($($name:ident => $func:ident ($($arg:ident : $ty:ty),*) -> $ret:ty;)*) => {
        [$(
            (
                stringify!($name),
                // SAFETY: callers cast the address back to the entry's own
                // signature before calling it.
                unsafe { std::mem::transmute::<*const (), CppFnPtr>(crate::api::$func as *const ()) },
            ),
        )*]
    };
}

static ENTRIES: Lazy<AHashMap<&'static str, CppFnPtr>> =
    Lazy::new(|| cppi_abi::cppinterop_api!(resolver_entries).into_iter().collect());

/// Address of the entry point exported as `name`.
pub fn get_proc_address(name: &str) -> Option<CppFnPtr> {
    let address = ENTRIES.get(name).copied();
    if address.is_none() {
        tracing::debug!("no interop function named '{name}'");
    }
    address
}

/// Names of every resolvable entry point.
pub fn names() -> impl Iterator<Item = &'static str> {
    ENTRIES.keys().copied()
}

/// C-callable form of [`get_proc_address`].
///
/// # Safety
/// `procname` must be null or a NUL-terminated string.
pub unsafe extern "C" fn get_proc_address_raw(procname: *const c_uchar) -> Option<CppFnPtr> {
    if procname.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller.
    let name = unsafe { CStr::from_ptr(procname.cast()) };
    get_proc_address(name.to_str().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use abi_stable::std_types::RString;
    use cppi_abi::api::OPERATION_NAMES;

    #[test]
    fn test_every_operation_resolves() {
        for name in OPERATION_NAMES {
            assert!(get_proc_address(name).is_some(), "{name} is not resolvable");
        }
        assert_eq!(names().count(), OPERATION_NAMES.len());
        assert!(get_proc_address("NotAnOperation").is_none());
    }

    #[test]
    fn test_raw_lookup_calls_through() {
        let address = unsafe { get_proc_address_raw(c"GetVersion".as_ptr().cast()) };
        let Some(address) = address else {
            panic!("GetVersion is not resolvable");
        };
        let get_version = unsafe { std::mem::transmute::<CppFnPtr, unsafe extern "C" fn() -> RString>(address) };
        assert!(unsafe { get_version() }.as_str().starts_with("CppInterOp version"));
        assert!(unsafe { get_proc_address_raw(std::ptr::null()) }.is_none());
    }
}
