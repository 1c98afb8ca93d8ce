//! Uniform calling wrapper around synthesized trampolines.

use core::ffi::{c_int, c_ulong, c_void};
use core::fmt;

use abi_stable::StableAbi;

use crate::handles::FunctionHandle;

/// `void (*)(void* self, int nargs, void** args, void* ret)`
pub type GenericCall = unsafe extern "C" fn(*mut c_void, c_int, *mut *mut c_void, *mut c_void);

/// `void (*)(void* object, unsigned long nary, int with_free)`
pub type DestructorCall = unsafe extern "C" fn(*mut c_void, c_ulong, c_int);

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, StableAbi)]
pub enum JitCallKind {
    Unknown = 0,
    GenericCall,
    DestructorCall,
}

/// Non-owning view over caller-provided argument cells.
///
/// Each cell points at the storage of one argument.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ArgList {
    pub args: *mut *mut c_void,
    pub size: usize,
}

impl ArgList {
    pub const fn empty() -> Self {
        Self {
            args: core::ptr::null_mut(),
            size: 0,
        }
    }

    pub const fn new(args: *mut *mut c_void, size: usize) -> Self {
        Self { args, size }
    }

    pub fn from_slice(cells: &mut [*mut c_void]) -> Self {
        Self {
            args: cells.as_mut_ptr(),
            size: cells.len(),
        }
    }
}

impl Default for ArgList {
    fn default() -> Self {
        Self::empty()
    }
}

/// Signature facts recorded when the trampoline was synthesized.
///
/// Only consulted by debug-build argument validation.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallShape {
    pub required_args: usize,
    pub num_args: usize,
    pub is_constructor: bool,
    pub is_method: bool,
    pub returns_void: bool,
}

#[repr(C)]
#[derive(Clone, Copy)]
union CallTarget {
    generic: Option<GenericCall>,
    destructor: Option<DestructorCall>,
}

/// A synthesized trampoline tagged with how it must be invoked.
///
/// The active union member always matches `kind`; an `Unknown` call holds no
/// target and must not be invoked.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct JitCall {
    target: CallTarget,
    kind: JitCallKind,
    origin: FunctionHandle,
    shape: CallShape,
}

impl JitCall {
    pub const fn invalid() -> Self {
        Self {
            target: CallTarget { generic: None },
            kind: JitCallKind::Unknown,
            origin: FunctionHandle::null(),
            shape: CallShape {
                required_args: 0,
                num_args: 0,
                is_constructor: false,
                is_method: false,
                returns_void: false,
            },
        }
    }

    pub const fn generic(call: GenericCall, origin: FunctionHandle, shape: CallShape) -> Self {
        Self {
            target: CallTarget {
                generic: Some(call),
            },
            kind: JitCallKind::GenericCall,
            origin,
            shape,
        }
    }

    pub const fn destructor(call: DestructorCall, origin: FunctionHandle) -> Self {
        Self {
            target: CallTarget {
                destructor: Some(call),
            },
            kind: JitCallKind::DestructorCall,
            origin,
            shape: CallShape {
                required_args: 0,
                num_args: 0,
                is_constructor: false,
                is_method: true,
                returns_void: true,
            },
        }
    }

    pub const fn kind(&self) -> JitCallKind {
        self.kind
    }

    pub fn is_valid(&self) -> bool {
        self.kind != JitCallKind::Unknown
    }

    pub fn is_invalid(&self) -> bool {
        !self.is_valid()
    }

    /// The function this call was synthesized for.
    pub const fn origin(&self) -> FunctionHandle {
        self.origin
    }

    pub const fn shape(&self) -> CallShape {
        self.shape
    }

    /// Address of the underlying trampoline, null when invalid.
    pub fn address(&self) -> *const c_void {
        // Both union members are nullable function pointers of equal size.
        match self.kind {
            JitCallKind::Unknown => core::ptr::null(),
            JitCallKind::GenericCall => unsafe { self.target.generic }
                .map_or(core::ptr::null(), |call| call as *const c_void),
            JitCallKind::DestructorCall => unsafe { self.target.destructor }
                .map_or(core::ptr::null(), |call| call as *const c_void),
        }
    }

    /// Calls a function returning `void`.
    ///
    /// # Safety
    /// Same as [`JitCall::invoke`].
    pub unsafe fn invoke_void(&self, args: ArgList, self_: *mut c_void) {
        unsafe { self.invoke(core::ptr::null_mut(), args, self_) };
    }

    /// Calls the trampoline with `(self_, args.size, args.args, result)`.
    ///
    /// A destructor call invoked with a result pointer and no argument list is
    /// redirected to `invoke_destructor(result, 0, true)`.
    ///
    /// # Safety
    /// Every argument cell must point to a live value of the parameter type,
    /// `result` must be null or large enough for the return value, and
    /// `self_` must point to a live object for methods.
    pub unsafe fn invoke(&self, result: *mut c_void, args: ArgList, self_: *mut c_void) {
        if self.kind == JitCallKind::DestructorCall && !result.is_null() && args.args.is_null() {
            unsafe { self.invoke_destructor(result, 0, true) };
            return;
        }

        #[cfg(debug_assertions)]
        {
            debug_assert!(
                self.are_arguments_valid(result, args, self_),
                "invalid arguments for JitCall"
            );
            self.report_invoke_start(result, args, self_);
        }

        let Some(call) = (match self.kind {
            JitCallKind::GenericCall => unsafe { self.target.generic },
            _ => None,
        }) else {
            tracing::error!("JitCall of kind {:?} invoked as a generic call", self.kind);
            return;
        };

        let nargs = c_int::try_from(args.size).unwrap_or(c_int::MAX);
        unsafe { call(self_, nargs, args.args, result) };

        #[cfg(debug_assertions)]
        self.report_invoke_end();
    }

    /// Destroys `nary` contiguous objects at `object` (`0` means one, non-array),
    /// releasing the storage as well when `with_free` is set.
    ///
    /// # Safety
    /// `object` must point to live objects of the destructor's class.
    pub unsafe fn invoke_destructor(&self, object: *mut c_void, nary: c_ulong, with_free: bool) {
        debug_assert!(
            self.kind == JitCallKind::DestructorCall,
            "JitCall of kind {:?} invoked as a destructor",
            self.kind
        );

        let Some(call) = (match self.kind {
            JitCallKind::DestructorCall => unsafe { self.target.destructor },
            _ => None,
        }) else {
            tracing::error!("JitCall of kind {:?} invoked as a destructor", self.kind);
            return;
        };

        #[cfg(debug_assertions)]
        tracing::debug!(
            "Run '{:?}', compiled at: {:p} with object {object:p}, nary {nary}, with_free {with_free}",
            self.origin,
            self.address()
        );

        unsafe { call(object, nary, c_int::from(with_free)) };

        #[cfg(debug_assertions)]
        self.report_invoke_end();
    }

    /// Checks the call against the recorded shape, logging every violation.
    pub fn are_arguments_valid(&self, result: *mut c_void, args: ArgList, self_: *mut c_void) -> bool {
        let mut valid = true;
        let shape = &self.shape;

        if shape.is_constructor && result.is_null() && self_.is_null() {
            tracing::error!("Must pass the location of the created object");
            valid = false;
        }
        if shape.required_args > args.size {
            tracing::error!(
                "Must pass at least {} arguments, got {}",
                shape.required_args,
                args.size
            );
            valid = false;
        }
        if args.size > 0 && args.args.is_null() {
            tracing::error!("Must pass an argument list");
            valid = false;
        }
        if shape.is_method && !shape.is_constructor && self_.is_null() {
            tracing::error!("Must pass the address of the object");
            valid = false;
        }
        if !shape.returns_void && !shape.is_constructor && result.is_null() {
            tracing::error!("Must pass the location of the return value");
            valid = false;
        }
        if self.kind == JitCallKind::DestructorCall {
            tracing::error!("Destructor calls must go through invoke_destructor");
            valid = false;
        }
        valid
    }

    #[cfg(debug_assertions)]
    fn report_invoke_start(&self, result: *mut c_void, args: ArgList, self_: *mut c_void) {
        tracing::debug!(
            "Run '{:?}', compiled at: {:p} with result at: {result:p}, args at: {:p}, nargs: {}, self at: {self_:p}",
            self.origin,
            self.address(),
            args.args,
            args.size
        );
    }

    #[cfg(debug_assertions)]
    fn report_invoke_end(&self) {
        tracing::debug!("Finished '{:?}'", self.origin);
    }
}

impl Default for JitCall {
    fn default() -> Self {
        Self::invalid()
    }
}

impl fmt::Debug for JitCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JitCall")
            .field("kind", &self.kind)
            .field("address", &self.address())
            .field("origin", &self.origin)
            .field("shape", &self.shape)
            .finish()
    }
}
