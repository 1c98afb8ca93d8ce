//! Filesystem path helpers shared by the library manager and the toolchain.

use std::path::{Path, PathBuf};

/// How `split_paths` treats entries that are not existing directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Drop missing directories.
    PruneNonExistent,
    /// Stop at the first missing directory and report failure.
    FailNonExistent,
    /// Keep every entry.
    AllowNonExistent,
}

/// Delimiter used by `PATH`-style environment variables on this platform.
pub const ENV_PATH_DELIMITER: &str = if cfg!(windows) { ";" } else { ":" };

/// Splits `paths` on `delim`, collecting entries according to `mode`.
///
/// Empty entries are skipped. The boolean is `true` when every entry was an
/// existing directory. With `FailNonExistent` collection stops at the first
/// missing entry.
pub fn split_paths(paths: &str, delim: &str, mode: SplitMode) -> (Vec<String>, bool) {
    let mut out = Vec::new();
    let mut all_existed = true;
    if delim.is_empty() {
        return (out, all_existed);
    }

    for entry in paths.split(delim).filter(|entry| !entry.is_empty()) {
        if Path::new(entry).is_dir() {
            out.push(entry.to_string());
            continue;
        }

        all_existed = false;
        match mode {
            SplitMode::FailNonExistent => {
                tracing::debug!("ignoring nonexistent directory \"{entry}\"");
                return (out, false);
            }
            SplitMode::AllowNonExistent => out.push(entry.to_string()),
            SplitMode::PruneNonExistent => {
                tracing::debug!("ignoring nonexistent directory \"{entry}\"");
            }
        }
    }

    (out, all_existed)
}

/// Resolves symlinks and relative components; empty when the path is missing.
pub fn normalize_path(path: &str) -> String {
    match std::fs::canonicalize(path) {
        Ok(resolved) => resolved.to_string_lossy().into_owned(),
        Err(err) => {
            tracing::debug!("realpath {path}: {err}");
            String::new()
        }
    }
}

/// Expands `$VAR` occurrences. A variable name runs until the next `/`.
///
/// Unset variables expand to the empty string. When `check_exists` is set the
/// return value reports whether the expanded path exists.
pub fn expand_env_vars(input: &str, check_exists: bool) -> (String, bool) {
    let mut expanded = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(dollar) = rest.find('$') {
        expanded.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];
        let end = after.find('/').unwrap_or(after.len());
        if let Ok(value) = std::env::var(&after[..end]) {
            expanded.push_str(&value);
        }
        rest = &after[end..];
    }
    expanded.push_str(rest);

    let exists = !check_exists || Path::new(&expanded).exists();
    (expanded, exists)
}

/// Directory-independent path of the running executable.
pub fn main_executable() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| std::fs::canonicalize(exe).ok())
}

/// Directory containing the running executable, as a string.
pub fn main_executable_dir() -> String {
    main_executable()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Library directories the platform dynamic linker searches by default.
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub fn system_library_paths() -> Vec<String> {
    ["/usr/local/lib/", "/usr/X11R6/lib/", "/usr/lib/", "/lib/"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Library directories the platform dynamic linker searches by default.
#[cfg(windows)]
pub fn system_library_paths() -> Vec<String> {
    std::env::var("SystemRoot")
        .map(|root| vec![format!("{root}\\System32")])
        .unwrap_or_default()
}

/// Library directories the platform dynamic linker searches by default.
///
/// Asks the loader itself by running a command with `LD_DEBUG=libs` and a
/// preload that cannot be satisfied, then parses the reported system search
/// path. Falls back to the usual directories when the probe yields nothing.
#[cfg(not(any(target_os = "macos", target_os = "ios", windows)))]
pub fn system_library_paths() -> Vec<String> {
    let probe = duct::cmd!("ls")
        .env("LD_DEBUG", "libs")
        .env("LD_PRELOAD", "DOESNOTEXIST")
        .stdout_null()
        .stderr_capture()
        .unchecked()
        .run();

    let paths = probe
        .ok()
        .map(|output| parse_ld_debug_search_path(&String::from_utf8_lossy(&output.stderr)))
        .unwrap_or_default();
    if !paths.is_empty() {
        return paths;
    }

    ["/lib64", "/usr/lib64", "/lib", "/usr/lib"]
        .into_iter()
        .filter(|dir| Path::new(dir).is_dir())
        .map(str::to_string)
        .collect()
}

/// Extracts the `search path=...(system search path)` list from loader debug output.
pub fn parse_ld_debug_search_path(output: &str) -> Vec<String> {
    const MARKER: &str = "search path=";
    let start_from = output.find("(LD_LIBRARY_PATH)").unwrap_or(0);
    let Some(found) = output[start_from..].find(MARKER) else {
        return Vec::new();
    };
    let from = start_from + found + MARKER.len();
    let Some(len) = output[from..].find("(system search path)") else {
        return Vec::new();
    };
    let raw: String = output[from..from + len]
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect();
    split_paths(&raw, ":", SplitMode::PruneNonExistent).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_paths_modes() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().to_string_lossy().into_owned();
        let joined = format!("{existing}::/definitely/not/here:{existing}");

        let (pruned, all) = split_paths(&joined, ":", SplitMode::PruneNonExistent);
        assert_eq!(pruned, vec![existing.clone(), existing.clone()]);
        assert!(!all);

        let (allowed, _) = split_paths(&joined, ":", SplitMode::AllowNonExistent);
        assert_eq!(allowed.len(), 3);
        assert_eq!(allowed[1], "/definitely/not/here");

        let (failed, all) = split_paths(&joined, ":", SplitMode::FailNonExistent);
        assert_eq!(failed, vec![existing]);
        assert!(!all);
    }

    #[test]
    fn test_normalize_path() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a");
        std::fs::create_dir(&nested).unwrap();
        let dotted = format!("{}/a/../a", dir.path().display());
        let expected = std::fs::canonicalize(&nested).unwrap();
        assert_eq!(normalize_path(&dotted), expected.to_string_lossy());
        assert!(normalize_path("/definitely/not/here").is_empty());
    }

    #[test]
    fn test_expand_env_vars() {
        let (expanded, _) = expand_env_vars("$CPPI_TEST_UNSET_VARIABLE/lib", false);
        assert_eq!(expanded, "/lib");

        let home = std::env::var("PATH").unwrap_or_default();
        let (expanded, _) = expand_env_vars("$PATH", false);
        assert_eq!(expanded, home);
    }

    #[test]
    fn test_parse_ld_debug_output() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().to_string_lossy().into_owned();
        let output = format!(
            "     12345:\tfind library=libc.so.6 [0]; searching\n     12345:\t search path={existing}:/nope/missing\t\t(system search path)\n"
        );
        assert_eq!(parse_ld_debug_search_path(&output), vec![existing]);
        assert!(parse_ld_debug_search_path("nothing useful").is_empty());
    }
}
