//! One-time loading of the implementation library.

use std::ffi::CString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cppi_abi::{CppFnPtr, GET_PROC_ADDRESS_SYMBOL, GetProcAddressFn};
use cppi_config::InteropConfig;
use libloading::Library;
use once_cell::sync::OnceCell;

/// An opened implementation library and its resolver entry point.
struct Implementation {
    path: PathBuf,
    get_proc_address: GetProcAddressFn,
    // Keeps `get_proc_address` mapped.
    _library: Library,
}

#[cfg(unix)]
fn open(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};

    unsafe { UnixLibrary::open(Some(path), RTLD_LOCAL | RTLD_NOW) }.map(Library::from)
}

#[cfg(not(unix))]
fn open(path: &Path) -> Result<Library, libloading::Error> {
    unsafe { Library::new(path) }
}

fn resolver_of(library: &Library) -> Result<GetProcAddressFn> {
    let symbol = format!("{GET_PROC_ADDRESS_SYMBOL}\0");
    // SAFETY: the exported resolver has exactly this signature.
    let entry = unsafe { library.get::<GetProcAddressFn>(symbol.as_bytes()) }
        .with_context(|| format!("Failed to find {GET_PROC_ADDRESS_SYMBOL}"))?;
    Ok(*entry)
}

fn load(path: &Path) -> Option<Implementation> {
    let library = match open(path) {
        Ok(library) => library,
        Err(err) => {
            tracing::error!("Failed to load library from {}: {err}", path.display());
            return None;
        }
    };
    match resolver_of(&library) {
        Ok(get_proc_address) => {
            tracing::debug!("loaded {}", path.display());
            Some(Implementation {
                path: path.to_path_buf(),
                get_proc_address,
                _library: library,
            })
        }
        Err(err) => {
            tracing::error!("{err:#}");
            None
        }
    }
}

/// Opens the implementation library on first use and resolves names through
/// its `CppGetProcAddress`.
///
/// Only the first call's path counts: a failed open leaves the loader empty
/// for good, and concurrent first callers wait for the one attempt.
pub struct Loader {
    implementation: OnceCell<Option<Implementation>>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    pub const fn new() -> Self {
        Self {
            implementation: OnceCell::new(),
        }
    }

    /// The process-wide loader.
    pub fn global() -> &'static Self {
        static GLOBAL: Loader = Loader::new();
        &GLOBAL
    }

    fn implementation(&self, custom_path: Option<&str>) -> Option<&Implementation> {
        self.implementation
            .get_or_init(|| {
                let path = InteropConfig::from_env().resolve_library_path(custom_path);
                load(&path)
            })
            .as_ref()
    }

    /// Address of the operation `name`, opening the library when needed.
    pub fn get_proc_address(&self, name: &str, custom_path: Option<&str>) -> Option<CppFnPtr> {
        let implementation = self.implementation(custom_path)?;
        let name = CString::new(name).ok()?;
        // SAFETY: the resolver takes a NUL-terminated name.
        unsafe { (implementation.get_proc_address)(name.as_ptr().cast()) }
    }

    /// Path of the library, once one has been opened.
    pub fn library_path(&self) -> Option<&Path> {
        self.implementation
            .get()
            .and_then(Option::as_ref)
            .map(|implementation| implementation.path.as_path())
    }

    /// Whether an open has been attempted.
    pub fn attempted(&self) -> bool {
        self.implementation.get().is_some()
    }
}

/// Resolves `name` through the process-wide loader.
pub fn dl_get_proc_address(name: &str, custom_path: Option<&str>) -> Option<CppFnPtr> {
    Loader::global().get_proc_address(name, custom_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_open_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("libmissing.so");
        let missing = missing.to_str().unwrap();
        let loader = Loader::new();
        assert!(!loader.attempted());
        assert!(loader.get_proc_address("GetVersion", Some(missing)).is_none());
        assert!(loader.attempted());
        assert!(loader.library_path().is_none());
        assert!(loader.get_proc_address("GetVersion", None).is_none());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_library_without_resolver_is_dropped() {
        let Some(libm) = cppi_dyld::DynamicLibraryManager::new().lookup("libm.so.6") else {
            eprintln!("skipping: libm.so.6 not found in system search paths");
            return;
        };
        let library = open(Path::new(&libm)).unwrap();
        assert!(resolver_of(&library).is_err());

        let loader = Loader::new();
        assert!(loader.get_proc_address("GetInterpreter", Some(&libm)).is_none());
        assert!(loader.attempted());
        assert!(loader.library_path().is_none());
    }
}
