use core::ffi::c_void;
use core::fmt;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(*mut c_void);

        impl $name {
            pub const fn null() -> Self {
                Self(core::ptr::null_mut())
            }

            pub const fn from_ptr(ptr: *mut c_void) -> Self {
                Self(ptr)
            }

            pub const fn as_ptr(self) -> *mut c_void {
                self.0
            }

            pub fn is_null(self) -> bool {
                self.0.is_null()
            }

            /// `None` for the null handle.
            pub fn non_null(self) -> Option<Self> {
                (!self.is_null()).then_some(self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::null()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:p})", stringify!($name), self.0)
            }
        }

        // Handles are plain tokens minted by a compiler service; they are never
        // dereferenced by the holder.
        unsafe impl Send for $name {}
        unsafe impl Sync for $name {}
    };
}

opaque_handle!(
    /// A declaration: namespace, class, function, variable, enumerator...
    ScopeHandle
);
opaque_handle!(
    /// A (possibly qualified) type.
    TypeHandle
);
opaque_handle!(
    /// A function declaration, also used where a const function is expected.
    FunctionHandle
);
opaque_handle!(
    /// Address of a live C++ object.
    ObjectHandle
);
opaque_handle!(
    /// An interpreter instance.
    InterpHandle
);

impl From<FunctionHandle> for ScopeHandle {
    fn from(func: FunctionHandle) -> Self {
        Self::from_ptr(func.as_ptr())
    }
}

impl From<ScopeHandle> for FunctionHandle {
    fn from(scope: ScopeHandle) -> Self {
        Self::from_ptr(scope.as_ptr())
    }
}
