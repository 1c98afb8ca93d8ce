use std::ffi::c_void;
use std::io::Write;
use std::path::Path;

use ahash::{AHashMap, AHashSet};
use libloading::Library;

use cppi_utils::paths::{self, ENV_PATH_DELIMITER, SplitMode};

use crate::DyldError;
use crate::magic::{self, FileMagic};

/// One directory searched for libraries; system directories are not user paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPathInfo {
    pub path: String,
    pub is_user: bool,
}

/// Token for a library opened by a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DyLibHandle(u64);

/// Outcome of [`DynamicLibraryManager::load_library`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadLibResult {
    Success,
    AlreadyLoaded,
    NotFound,
    LoadError,
}

/// Object format conventions used for extension probing, linker variables and
/// shared-library detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkerFlavor {
    Elf,
    MachO,
    Coff,
}

impl LinkerFlavor {
    pub const fn host() -> Self {
        if cfg!(any(target_os = "macos", target_os = "ios")) {
            Self::MachO
        } else if cfg!(windows) {
            Self::Coff
        } else {
            Self::Elf
        }
    }

    fn accepts(self, magic: FileMagic, header: &[u8]) -> bool {
        match self {
            Self::Elf => magic == FileMagic::ElfSharedObject,
            Self::MachO => matches!(
                magic,
                FileMagic::MachOFixedVirtualMemorySharedLib
                    | FileMagic::MachODynamicallyLinkedSharedLib
                    | FileMagic::MachODynamicallyLinkedSharedLibStub
                    | FileMagic::MachOUniversalBinary
            ),
            Self::Coff => magic == FileMagic::PeCoffExecutable && magic::is_dll(header),
        }
    }

    fn library_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Elf => &[".so"],
            Self::MachO => &[".so", ".dylib"],
            Self::Coff => &[".dll"],
        }
    }
}

struct LoadedLibrary {
    path: String,
    library: Option<Library>,
    permanent: bool,
}

/// Tracks library search paths and the libraries opened through it.
///
/// A canonical path is present in the loaded set at most once, and every
/// loaded path has exactly one handle.
pub struct DynamicLibraryManager {
    search_paths: Vec<SearchPathInfo>,
    loaded: AHashSet<String>,
    dylibs: AHashMap<DyLibHandle, LoadedLibrary>,
    next_handle: u64,
    flavor: LinkerFlavor,
    main_executable: Option<String>,
}

impl Default for DynamicLibraryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicLibraryManager {
    /// Manager seeded from the library path environment, `.` and the system
    /// search paths, in that order.
    pub fn new() -> Self {
        let mut manager = Self::empty();

        let env_vars: &[&str] = if cfg!(any(target_os = "macos", target_os = "ios")) {
            &["LD_LIBRARY_PATH", "DYLD_LIBRARY_PATH", "DYLD_FALLBACK_LIBRARY_PATH"]
        } else if cfg!(windows) {
            &["LD_LIBRARY_PATH", "PATH"]
        } else {
            &["LD_LIBRARY_PATH"]
        };
        for var in env_vars {
            let Ok(value) = std::env::var(var) else {
                continue;
            };
            let (dirs, _) =
                paths::split_paths(&value, ENV_PATH_DELIMITER, SplitMode::PruneNonExistent);
            for dir in dirs {
                manager.add_search_path(&dir, true, false);
            }
        }

        // The working directory is the last user path searched.
        manager.add_search_path(".", true, false);

        for dir in paths::system_library_paths() {
            manager.add_search_path(&dir, false, false);
        }
        manager
    }

    /// Manager with no search paths.
    pub fn empty() -> Self {
        Self {
            search_paths: Vec::new(),
            loaded: AHashSet::new(),
            dylibs: AHashMap::new(),
            next_handle: 1,
            flavor: LinkerFlavor::host(),
            main_executable: None,
        }
    }

    #[must_use]
    pub fn with_flavor(mut self, flavor: LinkerFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Overrides the executable path used to expand `$origin` and `@executable_path`.
    #[must_use]
    pub fn with_main_executable(mut self, path: impl Into<String>) -> Self {
        self.main_executable = Some(path.into());
        self
    }

    pub fn flavor(&self) -> LinkerFlavor {
        self.flavor
    }

    pub fn search_paths(&self) -> &[SearchPathInfo] {
        &self.search_paths
    }

    /// Registers `dir`, ignoring empty and already registered paths.
    pub fn add_search_path(&mut self, dir: &str, is_user: bool, prepend: bool) {
        if dir.is_empty() || self.search_paths.iter().any(|info| info.path == dir) {
            return;
        }
        let info = SearchPathInfo {
            path: dir.to_string(),
            is_user,
        };
        if prepend {
            self.search_paths.insert(0, info);
        } else {
            self.search_paths.push(info);
        }
    }

    /// Whether `path` names a regular file of this flavor's shared-library format.
    ///
    /// Returns `(is_shared_library, exists)`.
    pub fn probe_shared_library(&self, path: &str) -> (bool, bool) {
        let target = Path::new(path);
        let Ok(meta) = std::fs::metadata(target) else {
            return (false, false);
        };
        if !meta.is_file() {
            return (false, true);
        }
        match magic::read_header(target) {
            Ok(header) => {
                let kind = magic::identify_magic(&header);
                (self.flavor.accepts(kind, &header), true)
            }
            Err(err) => {
                tracing::debug!("cannot read header of {path}: {err}");
                (false, false)
            }
        }
    }

    pub fn is_shared_library(&self, path: &str) -> bool {
        self.probe_shared_library(path).0
    }

    fn main_executable_path(&self) -> String {
        self.main_executable.clone().unwrap_or_else(|| {
            paths::main_executable()
                .map(|exe| exe.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    /// Expands the linker variables this flavor knows about at the front of `original`.
    ///
    /// `@rpath` is left alone: lookup replaces it with each RPATH entry in turn.
    pub fn subst_all(&self, original: &str, loader: &str) -> String {
        let exe_dir = parent_dir(&self.main_executable_path());
        let loader_dir = if loader.is_empty() {
            exe_dir.clone()
        } else {
            parent_dir(loader)
        };

        match self.flavor {
            LinkerFlavor::MachO => {
                let result = subst_front(original, "@executable_path", &exe_dir);
                subst_front(&result, "@loader_path", &loader_dir)
            }
            LinkerFlavor::Elf | LinkerFlavor::Coff => subst_front(original, "$origin", &loader_dir),
        }
    }

    /// Tries `stem` under RPATH, then the registered search paths, then RUNPATH.
    pub fn lookup_lib_in_paths(
        &self,
        stem: &str,
        rpath: &[&str],
        runpath: &[&str],
        loader: &str,
    ) -> Option<String> {
        tracing::trace!(
            "lookup {stem} rpath={rpath:?} search={:?} runpath={runpath:?} loader={loader}",
            self.search_paths
        );

        let candidates = rpath
            .iter()
            .map(|dir| self.subst_all(dir, loader))
            .chain(self.search_paths.iter().map(|info| info.path.clone()))
            .chain(runpath.iter().map(|dir| self.subst_all(dir, loader)));

        for dir in candidates {
            let candidate = Path::new(&dir).join(stem);
            let candidate = candidate.to_string_lossy();
            if self.is_shared_library(&candidate) {
                tracing::trace!("found {candidate}");
                return Some(candidate.into_owned());
            }
        }
        None
    }

    /// Like [`Self::lookup_lib_in_paths`], retrying with each platform extension.
    pub fn lookup_lib_maybe_add_ext(
        &self,
        stem: &str,
        rpath: &[&str],
        runpath: &[&str],
        loader: &str,
    ) -> Option<String> {
        let found = self
            .lookup_lib_in_paths(stem, rpath, runpath, loader)
            .or_else(|| {
                self.flavor.library_extensions().iter().find_map(|ext| {
                    self.lookup_lib_in_paths(&format!("{stem}{ext}"), rpath, runpath, loader)
                })
            })?;

        let canonical = paths::normalize_path(&found);
        if canonical.is_empty() {
            tracing::debug!("error getting canonical path of library {found}");
            return Some(found);
        }
        Some(canonical)
    }

    /// Canonical path of an existing file, `None` when it does not exist.
    pub fn normalize_path(path: &str) -> Option<String> {
        if std::fs::metadata(path).is_err() {
            return None;
        }
        let canonical = paths::normalize_path(path);
        (!canonical.is_empty()).then_some(canonical)
    }

    /// Resolves a library stem to the canonical path of a shared library.
    pub fn lookup_library(
        &self,
        stem: &str,
        rpath: &[&str],
        runpath: &[&str],
        loader: &str,
        variate_stem: bool,
    ) -> Option<String> {
        tracing::debug!("lookup_library: {stem}, [{}], [{}], {loader}", rpath.join(","), runpath.join(","));

        if Path::new(stem).is_absolute() {
            if self.is_shared_library(stem) {
                return Self::normalize_path(stem);
            }
            tracing::debug!("lookup_library: '{stem}' is not a shared library");
            return None;
        }

        if self.flavor == LinkerFlavor::MachO && starts_with_ignore_case(stem, "@rpath") {
            for dir in rpath {
                let candidate = subst_front(stem, "@rpath", dir);
                if self.is_shared_library(&candidate) {
                    return Self::normalize_path(&candidate);
                }
            }
        } else {
            let candidate = self.subst_all(stem, loader);
            if self.is_shared_library(&candidate) {
                return Self::normalize_path(&candidate);
            }
        }

        let found = if variate_stem {
            self.lookup_lib_maybe_add_ext(stem, rpath, runpath, loader)
                .or_else(|| {
                    let file_name = Path::new(stem)
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    if file_name.starts_with("lib") {
                        return None;
                    }
                    let split = stem.len() - file_name.len();
                    let prefixed = format!("{}lib{}", &stem[..split], &stem[split..]);
                    self.lookup_lib_maybe_add_ext(&prefixed, rpath, runpath, loader)
                })
        } else {
            self.lookup_lib_in_paths(stem, rpath, runpath, loader)
        }?;

        let canonical = paths::normalize_path(&found);
        (!canonical.is_empty()).then_some(canonical)
    }

    /// Resolves `stem` with no RPATH/RUNPATH, no loader, and stem variation.
    pub fn lookup(&self, stem: &str) -> Option<String> {
        self.lookup_library(stem, &[], &[], "", true)
    }

    /// Loads a library by stem, or by canonical path when `resolved` is set.
    ///
    /// `permanent` is for libraries the interpreter builds for itself: they
    /// stay open until the process exits and [`Self::unload_library`] leaves
    /// them alone.
    pub fn load_library(&mut self, stem: &str, permanent: bool, resolved: bool) -> LoadLibResult {
        match self.try_load(stem, permanent, resolved) {
            Ok(true) => LoadLibResult::Success,
            Ok(false) => LoadLibResult::AlreadyLoaded,
            Err(DyldError::NotFound(_)) => LoadLibResult::NotFound,
            Err(err) => {
                tracing::debug!("load_library: {err}");
                LoadLibResult::LoadError
            }
        }
    }

    /// Ok(true) when newly opened, Ok(false) when already tracked.
    fn try_load(&mut self, stem: &str, permanent: bool, resolved: bool) -> Result<bool, DyldError> {
        tracing::debug!(
            "load_library: {stem}, {}, {}",
            if permanent { "permanent" } else { "not-permanent" },
            if resolved { "resolved" } else { "not-resolved" }
        );

        let canonical = if resolved {
            stem.to_string()
        } else {
            self.lookup(stem)
                .ok_or_else(|| DyldError::NotFound(stem.to_string()))?
        };

        if self.loaded.contains(&canonical) {
            return Ok(false);
        }

        let library = open_global(&canonical).map_err(|source| DyldError::Open {
            path: canonical.clone(),
            source,
        })?;
        let handle = DyLibHandle(self.next_handle);
        self.next_handle += 1;
        self.dylibs.insert(
            handle,
            LoadedLibrary {
                path: canonical.clone(),
                library: Some(library),
                permanent,
            },
        );
        self.loaded.insert(canonical);
        Ok(true)
    }

    /// Closes a previously loaded library; no-op when it is not loaded.
    pub fn unload_library(&mut self, stem: &str) {
        let Some(canonical) = self.lookup(stem) else {
            return;
        };
        if !self.is_library_loaded(&canonical) {
            return;
        }

        let Some(handle) = self.handle_for(&canonical) else {
            return;
        };
        if self.dylibs.get(&handle).is_some_and(|lib| lib.permanent) {
            tracing::debug!("unload_library: {canonical} is permanent, keeping it open");
            return;
        }

        if let Some(mut entry) = self.dylibs.remove(&handle) {
            if let Some(library) = entry.library.take() {
                if let Err(err) = library.close() {
                    tracing::debug!("unload_library: {err}");
                }
            }
        }
        self.loaded.remove(&canonical);
    }

    pub fn is_library_loaded(&self, full_path: &str) -> bool {
        Self::normalize_path(full_path).is_some_and(|canonical| self.loaded.contains(&canonical))
    }

    fn handle_for(&self, canonical: &str) -> Option<DyLibHandle> {
        self.dylibs
            .iter()
            .find(|(_, lib)| lib.path == canonical)
            .map(|(handle, _)| *handle)
    }

    /// Canonical paths of all loaded libraries, in load order.
    pub fn loaded_libraries(&self) -> Vec<String> {
        let mut handles: Vec<_> = self.dylibs.iter().collect();
        handles.sort_by_key(|(handle, _)| **handle);
        handles.into_iter().map(|(_, lib)| lib.path.clone()).collect()
    }

    /// Address of `name` in any library loaded through this manager.
    pub fn find_symbol(&self, name: &str) -> Option<*mut c_void> {
        let mut handles: Vec<_> = self.dylibs.iter().collect();
        handles.sort_by_key(|(handle, _)| **handle);
        handles.into_iter().find_map(|(_, lib)| {
            let library = lib.library.as_ref()?;
            let symbol = unsafe { library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
            Some(*symbol)
        })
    }

    /// Loads a library by path, reporting failures as errors.
    pub fn load_path(&mut self, path: &str, permanent: bool) -> Result<(), DyldError> {
        self.try_load(path, permanent, false).map(|_| ())
    }

    /// Writes the search paths, marking system entries with `[system] `.
    pub fn dump(&self, out: &mut dyn Write) -> std::io::Result<()> {
        for info in &self.search_paths {
            if !info.is_user {
                write!(out, "[system] ")?;
            }
            writeln!(out, "{}", info.path)?;
        }
        Ok(())
    }
}

impl Drop for DynamicLibraryManager {
    fn drop(&mut self) {
        for lib in self.dylibs.values_mut() {
            if lib.permanent {
                if let Some(library) = lib.library.take() {
                    std::mem::forget(library);
                }
            }
        }
    }
}

fn parent_dir(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Replaces `pattern` at the front of `original` (case-insensitively) with `replacement`.
pub fn subst_front(original: &str, pattern: &str, replacement: &str) -> String {
    if !starts_with_ignore_case(original, pattern) {
        return original.to_string();
    }
    format!("{replacement}{}", &original[pattern.len()..])
}

#[cfg(unix)]
fn open_global(path: &str) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_LAZY};

    unsafe { UnixLibrary::open(Some(path), RTLD_LAZY | RTLD_GLOBAL) }.map(Library::from)
}

#[cfg(not(unix))]
fn open_global(path: &str) -> Result<Library, libloading::Error> {
    unsafe { Library::new(path) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::magic::fixtures;
    use std::path::PathBuf;

    fn write_lib(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, fixtures::elf(3, len)).unwrap();
        path
    }

    fn elf_manager() -> DynamicLibraryManager {
        DynamicLibraryManager::empty().with_flavor(LinkerFlavor::Elf)
    }

    fn canonical(path: &Path) -> String {
        std::fs::canonicalize(path)
            .unwrap()
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_add_search_path_dedup_and_prepend() {
        let mut dlm = elf_manager();
        dlm.add_search_path("/a", true, false);
        dlm.add_search_path("/b", false, false);
        dlm.add_search_path("/a", true, false);
        dlm.add_search_path("", true, false);
        dlm.add_search_path("/c", true, true);
        let paths: Vec<_> = dlm.search_paths().iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, ["/c", "/a", "/b"]);

        let mut out = Vec::new();
        dlm.dump(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "/c\n/a\n[system] /b\n");
    }

    #[test]
    fn test_search_order_prefers_search_paths_over_runpath() {
        let search = tempfile::tempdir().unwrap();
        let runpath = tempfile::tempdir().unwrap();
        let in_search = write_lib(search.path(), "libdup.so", 128);
        write_lib(runpath.path(), "libdup.so", 256);

        let mut dlm = elf_manager();
        dlm.add_search_path(&search.path().to_string_lossy(), true, false);
        let runpath_dir = runpath.path().to_string_lossy().into_owned();

        let found = dlm
            .lookup_library("libdup.so", &[], &[&runpath_dir], "", true)
            .unwrap();
        assert_eq!(found, canonical(&in_search));
        assert_eq!(std::fs::metadata(&found).unwrap().len(), 128);
    }

    #[test]
    fn test_search_order_prefers_rpath() {
        let rpath = tempfile::tempdir().unwrap();
        let search = tempfile::tempdir().unwrap();
        let in_rpath = write_lib(rpath.path(), "libdup.so", 300);
        write_lib(search.path(), "libdup.so", 128);

        let mut dlm = elf_manager();
        dlm.add_search_path(&search.path().to_string_lossy(), true, false);
        let rpath_dir = rpath.path().to_string_lossy().into_owned();

        let found = dlm
            .lookup_library("libdup.so", &[&rpath_dir], &[], "", true)
            .unwrap();
        assert_eq!(found, canonical(&in_rpath));
    }

    #[test]
    fn test_runpath_is_last_resort() {
        let runpath = tempfile::tempdir().unwrap();
        let only = write_lib(runpath.path(), "libonly.so", 128);
        let dlm = elf_manager();
        let runpath_dir = runpath.path().to_string_lossy().into_owned();
        assert_eq!(
            dlm.lookup_library("libonly.so", &[], &[&runpath_dir], "", true),
            Some(canonical(&only))
        );
    }

    #[test]
    fn test_absolute_path_bypass() {
        let dir = tempfile::tempdir().unwrap();
        let lib = write_lib(dir.path(), "libabs.so", 128);
        let not_lib = dir.path().join("notes.txt");
        std::fs::write(&not_lib, b"plain text, definitely not ELF").unwrap();
        let exe = dir.path().join("prog");
        std::fs::write(&exe, fixtures::elf(2, 128)).unwrap();

        let other = tempfile::tempdir().unwrap();
        write_lib(other.path(), "libabs.so", 64);
        let mut dlm = elf_manager();
        dlm.add_search_path(&other.path().to_string_lossy(), true, false);

        let abs = lib.to_string_lossy().into_owned();
        assert_eq!(dlm.lookup_library(&abs, &[], &[], "", true), Some(canonical(&lib)));
        assert_eq!(dlm.lookup_library(&not_lib.to_string_lossy(), &[], &[], "", true), None);
        assert_eq!(dlm.lookup_library(&exe.to_string_lossy(), &[], &[], "", true), None);
    }

    #[test]
    fn test_stem_variation() {
        let dir = tempfile::tempdir().unwrap();
        let lib = write_lib(dir.path(), "libfoo.so", 128);
        let mut dlm = elf_manager();
        dlm.add_search_path(&dir.path().to_string_lossy(), true, false);

        let expected = Some(canonical(&lib));
        assert_eq!(dlm.lookup("libfoo.so"), expected);
        assert_eq!(dlm.lookup("libfoo"), expected);
        assert_eq!(dlm.lookup("foo"), expected);
        assert_eq!(dlm.lookup_library("foo", &[], &[], "", false), None);
        assert_eq!(dlm.lookup("bar"), None);
    }

    #[test]
    fn test_macho_extension_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("libbar.dylib");
        std::fs::write(&path, fixtures::macho(6)).unwrap();
        let mut dlm = DynamicLibraryManager::empty().with_flavor(LinkerFlavor::MachO);
        dlm.add_search_path(&dir.path().to_string_lossy(), true, false);
        assert_eq!(dlm.lookup("bar"), Some(canonical(&path)));
    }

    #[test]
    fn test_macho_rpath_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("libr.dylib");
        std::fs::write(&path, fixtures::macho(6)).unwrap();
        let dlm = DynamicLibraryManager::empty().with_flavor(LinkerFlavor::MachO);
        let rpath_dir = dir.path().to_string_lossy().into_owned();
        assert_eq!(
            dlm.lookup_library("@rpath/libr.dylib", &["/nope", &rpath_dir], &[], "", true),
            Some(canonical(&path))
        );
    }

    #[test]
    fn test_origin_substitution() {
        let dir = tempfile::tempdir().unwrap();
        let lib = write_lib(dir.path(), "liborigin.so", 128);
        let loader = dir.path().join("libloader.so").to_string_lossy().into_owned();
        let dlm = elf_manager();
        assert_eq!(
            dlm.lookup_library("$origin/liborigin.so", &[], &[], &loader, true),
            Some(canonical(&lib))
        );
        assert_eq!(
            dlm.lookup_library("liborigin.so", &["$ORIGIN"], &[], &loader, true),
            Some(canonical(&lib))
        );

        let exe = dir.path().join("app").to_string_lossy().into_owned();
        let dlm = elf_manager().with_main_executable(exe);
        assert_eq!(
            dlm.lookup_library("$origin/liborigin.so", &[], &[], "", true),
            Some(canonical(&lib))
        );
    }

    #[test]
    fn test_subst_front_is_case_insensitive() {
        assert_eq!(subst_front("@RPATH/abc", "@rpath", "/tmp"), "/tmp/abc");
        assert_eq!(subst_front("abc", "@rpath", "/tmp"), "abc");
    }

    #[test]
    fn test_probe_shared_library() {
        let dir = tempfile::tempdir().unwrap();
        let lib = write_lib(dir.path(), "libx.so", 128);
        let dlm = elf_manager();
        assert_eq!(dlm.probe_shared_library(&lib.to_string_lossy()), (true, true));
        assert_eq!(dlm.probe_shared_library(&dir.path().to_string_lossy()), (false, true));
        assert_eq!(dlm.probe_shared_library("/definitely/not/here.so"), (false, false));
    }

    #[test]
    fn test_fake_library_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let lib = write_lib(dir.path(), "libfake.so", 128);
        let mut dlm = elf_manager();
        dlm.add_search_path(&dir.path().to_string_lossy(), true, false);
        assert_eq!(dlm.load_library("fake", false, false), LoadLibResult::LoadError);
        assert!(!dlm.is_library_loaded(&lib.to_string_lossy()));
        assert_eq!(dlm.load_library("missing", false, false), LoadLibResult::NotFound);
    }

    #[test]
    fn test_load_path_reports_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let lib = write_lib(dir.path(), "libbroken.so", 128);
        let path = canonical(&lib);
        let mut dlm = elf_manager();
        let err = dlm.load_path(&path, false).unwrap_err();
        assert!(matches!(&err, DyldError::Open { path: failed, .. } if *failed == path));
        assert!(!dlm.is_library_loaded(&path));
        assert!(dlm.loaded_libraries().is_empty());
        assert!(matches!(
            dlm.load_path("/definitely/not/here.so", false),
            Err(DyldError::NotFound(_))
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_load_unload_reload_system_library() {
        let mut dlm = DynamicLibraryManager::new();
        let Some(path) = dlm.lookup("libm.so.6") else {
            eprintln!("skipping: libm.so.6 not found in system search paths");
            return;
        };

        assert_eq!(dlm.load_library(&path, false, false), LoadLibResult::Success);
        assert!(dlm.is_library_loaded(&path));
        assert_eq!(dlm.load_library(&path, false, false), LoadLibResult::AlreadyLoaded);
        assert!(dlm.find_symbol("cos").is_some());

        dlm.unload_library(&path);
        assert!(!dlm.is_library_loaded(&path));
        assert!(dlm.loaded_libraries().is_empty());
        assert_eq!(dlm.load_library(&path, false, false), LoadLibResult::Success);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_permanent_library_survives_unload() {
        let mut dlm = DynamicLibraryManager::new();
        let Some(path) = dlm.lookup("libm.so.6") else {
            eprintln!("skipping: libm.so.6 not found in system search paths");
            return;
        };
        assert_eq!(dlm.load_library(&path, true, true), LoadLibResult::Success);
        dlm.unload_library(&path);
        assert!(dlm.is_library_loaded(&path));
    }
}
