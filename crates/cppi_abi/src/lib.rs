//! Boundary types of the CppInterOp API.
//!
//! Everything here crosses the dynamic-load boundary: opaque handles, the
//! `JitCall` trampoline wrapper, the enums shared with callers, and the single
//! table (`cppinterop_api!`) from which the resolver, the exported functions
//! and the client dispatch table are generated.

pub mod api;
pub mod handles;
pub mod jit_call;
pub mod kinds;

pub use abi_stable::std_types::{RSlice, RString, RVec};
pub use core::ffi::{c_char, c_int, c_uchar, c_ulong, c_void};

pub use handles::{FunctionHandle, InterpHandle, ObjectHandle, ScopeHandle, TypeHandle};
pub use jit_call::{ArgList, CallShape, DestructorCall, GenericCall, JitCall, JitCallKind};
pub use kinds::{Operator, OperatorArity, QualKind, TemplateArgInfo, ValueKind};

/// Type-erased address of an API function as handed out by the resolver.
pub type CppFnPtr = unsafe extern "C" fn();

/// Signature of the exported resolver entry point.
pub type GetProcAddressFn = unsafe extern "C" fn(*const c_uchar) -> Option<CppFnPtr>;

/// Exported name of the resolver entry point.
pub const GET_PROC_ADDRESS_SYMBOL: &str = "CppGetProcAddress";

/// API version reported by `GetVersion`.
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");
