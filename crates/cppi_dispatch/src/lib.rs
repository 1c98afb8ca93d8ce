//! Client side of the interop API: opens the implementation library at run
//! time and fills a typed dispatch table from its resolver, so callers never
//! link against the compiler.

pub mod loader;
pub mod table;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use cppi_abi::CppFnPtr;

pub use loader::{Loader, dl_get_proc_address};
pub use table::DispatchTable;

static TABLE: Lazy<RwLock<DispatchTable>> = Lazy::new(|| RwLock::new(DispatchTable::default()));

/// Fills the process-wide table from the implementation library at
/// `custom_path`, or from the configured library when `None`.
///
/// Calling it again reassigns every slot. Returns `false` when the library
/// cannot be used or the critical operations are missing.
pub fn init_functions(custom_path: Option<&str>) -> bool {
    let custom_path = custom_path.filter(|path| !path.is_empty());
    tracing::info!(
        "Initializing CppInterOp API from {}",
        custom_path.unwrap_or("default library path")
    );
    if let Some(path) = custom_path
        && dl_get_proc_address("GetInterpreter", Some(path)).is_none()
    {
        tracing::error!("Failed to load CppInterOp from {path}");
        return false;
    }
    init_from_resolver(|name| dl_get_proc_address(name, custom_path))
}

/// Fills the process-wide table from an in-process resolver.
pub fn init_from_resolver(resolve: impl FnMut(&str) -> Option<CppFnPtr>) -> bool {
    let mut table = TABLE.write();
    table.populate(resolve);
    tracing::debug!("resolved {} interop functions", table.resolved_count());
    if table.has_critical() {
        true
    } else {
        tracing::error!("Failed to load critical functions");
        false
    }
}

/// A copy of the process-wide table.
pub fn table() -> DispatchTable {
    *TABLE.read()
}
