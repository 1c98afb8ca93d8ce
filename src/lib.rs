//! ABI-decoupled C++ reflection and dispatch.
//!
//! Built as a `cdylib`, this crate is the implementation library: its only
//! exported symbol is [`CppGetProcAddress`], through which clients fill a
//! [`DispatchTable`]. As an `rlib` it also re-exports the layers so Rust
//! callers can use them directly.

use cppi_abi::{CppFnPtr, GetProcAddressFn, c_uchar};

pub use cppi_abi as abi;
pub use cppi_compiler as compiler;
pub use cppi_config::InteropConfig;
pub use cppi_dispatch::{DispatchTable, dl_get_proc_address, init_from_resolver, init_functions, table};
pub use cppi_reflect::{InteropContext, get_proc_address};

/// Address of the interop function named `procname`, or null.
///
/// # Safety
/// `procname` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub unsafe extern "C" fn CppGetProcAddress(procname: *const c_uchar) -> Option<CppFnPtr> {
    // SAFETY: forwarded from the caller.
    unsafe { cppi_reflect::get_proc_address_raw(procname) }
}

const _: GetProcAddressFn = CppGetProcAddress;

/// Fills the process-wide dispatch table from this library's own resolver,
/// without opening a shared library.
pub fn init_in_process() -> bool {
    init_from_resolver(get_proc_address)
}
