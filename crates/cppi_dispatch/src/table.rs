//! The typed dispatch table, generated from the operation table.

use std::fmt;

use cppi_abi::CppFnPtr;
use cppi_abi::api::CRITICAL_OPERATIONS;

macro_rules! dispatch_table {
    ($($name:ident => $func:ident ($($arg:ident : $ty:ty),*) -> $ret:ty;)*) => {
        /// One typed function pointer per operation; `None` until populated
        /// or when the implementation does not provide it.
        #[derive(Clone, Copy, Default)]
        pub struct DispatchTable {
            $(pub $func: Option<unsafe extern "C" fn($($ty),*) -> $ret>,)*
        }

        impl DispatchTable {
            /// Reassigns every slot from `resolve`, looked up by exported name.
            pub fn populate(&mut self, mut resolve: impl FnMut(&str) -> Option<CppFnPtr>) {
                $(
                    self.$func = resolve(stringify!($name)).map(|address| {
                        // SAFETY: the resolver hands out each entry under its
                        // own name, with the signature of the table.
                        unsafe {
                            std::mem::transmute::<CppFnPtr, unsafe extern "C" fn($($ty),*) -> $ret>(address)
                        }
                    });
                )*
            }

            /// The slot of `name`, type-erased.
            pub fn slot(&self, name: &str) -> Option<CppFnPtr> {
                match name {
                    $(stringify!($name) => self.$func.map(|entry| {
                        // SAFETY: only the pointer type changes.
                        unsafe {
                            std::mem::transmute::<unsafe extern "C" fn($($ty),*) -> $ret, CppFnPtr>(entry)
                        }
                    }),)*
                    _ => None,
                }
            }

            fn resolved(&self) -> impl Iterator<Item = (&'static str, bool)> {
                [$((stringify!($name), self.$func.is_some()),)*].into_iter()
            }
        }
    };
}

cppi_abi::cppinterop_api!(dispatch_table);

impl DispatchTable {
    pub fn resolved_count(&self) -> usize {
        self.resolved().filter(|(_, resolved)| *resolved).count()
    }

    /// Names of the operations left unresolved.
    pub fn missing(&self) -> Vec<&'static str> {
        self.resolved()
            .filter(|(_, resolved)| !resolved)
            .map(|(name, _)| name)
            .collect()
    }

    /// Whether the operations needed to get an interpreter are present.
    pub fn has_critical(&self) -> bool {
        CRITICAL_OPERATIONS.iter().all(|name| self.slot(name).is_some())
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("resolved", &self.resolved_count())
            .field("missing", &self.missing().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cppi_abi::api::OPERATION_NAMES;

    #[test]
    fn test_empty_table() {
        let table = DispatchTable::default();
        assert_eq!(table.resolved_count(), 0);
        assert_eq!(table.missing(), OPERATION_NAMES);
        assert!(!table.has_critical());
        assert!(table.slot("GetVersion").is_none());
    }

    #[test]
    fn test_populate_from_resolver() {
        let mut table = DispatchTable::default();
        table.populate(cppi_reflect::get_proc_address);
        assert_eq!(table.resolved_count(), OPERATION_NAMES.len());
        assert!(table.missing().is_empty());
        assert!(table.has_critical());
        assert!(table.slot("NotAnOperation").is_none());

        let Some(get_version) = table.get_version else {
            panic!("GetVersion is unresolved");
        };
        assert!(unsafe { get_version() }.as_str().starts_with("CppInterOp version"));
        assert!(table.slot("GetVersion").is_some());
    }

    #[test]
    fn test_partial_resolution() {
        let mut table = DispatchTable::default();
        table.populate(|name| {
            if name == "CreateInterpreter" {
                None
            } else {
                cppi_reflect::get_proc_address(name)
            }
        });
        assert_eq!(table.missing(), ["CreateInterpreter"]);
        assert!(!table.has_critical());
    }
}
