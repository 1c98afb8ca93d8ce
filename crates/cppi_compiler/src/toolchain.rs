//! Invocation of the system C++ driver.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Output;

use cppi_config::ToolchainConfig;
use once_cell::sync::OnceCell;
use sha1::{Digest, Sha1};
use tempfile::TempDir;

use crate::{CompilerError, Result};

const SHARED_LIBRARY_EXTENSION: &str = if cfg!(target_os = "macos") {
    "dylib"
} else if cfg!(windows) {
    "dll"
} else {
    "so"
};

enum WorkDir {
    Temporary(TempDir),
    Kept(PathBuf),
}

impl WorkDir {
    fn path(&self) -> &Path {
        match self {
            Self::Temporary(dir) => dir.path(),
            Self::Kept(path) => path,
        }
    }
}

/// A C++ driver plus the flags every compilation shares.
pub struct Toolchain {
    driver: String,
    is_clang: bool,
    std: String,
    flags: Vec<String>,
    include_paths: Vec<String>,
    demangler: String,
    work_dir: WorkDir,
    system_includes: OnceCell<Vec<String>>,
}

impl Toolchain {
    /// Sets up a driver and its work directory. `args` are interpreter
    /// arguments; a `-std=` among them replaces the configured standard.
    pub fn new(config: &ToolchainConfig, args: &[String]) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("cppinterop-").tempdir()?;
        let work_dir = if config.keep_artifacts {
            WorkDir::Kept(dir.into_path())
        } else {
            WorkDir::Temporary(dir)
        };

        let mut std = config.std.clone();
        let mut flags = config.flags.clone();
        for arg in args {
            if arg.starts_with("-std=") {
                std.clone_from(arg);
            } else {
                flags.push(arg.clone());
            }
        }

        let is_clang = reports_clang(&config.driver);
        tracing::debug!(
            "toolchain: {} ({}), work dir {}",
            config.driver,
            if is_clang { "clang" } else { "non-clang" },
            work_dir.path().display()
        );
        Ok(Self {
            driver: config.driver.clone(),
            is_clang,
            std,
            flags,
            include_paths: Vec::new(),
            demangler: config.demangler.clone(),
            work_dir,
            system_includes: OnceCell::new(),
        })
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Whether the driver can dump its AST as JSON.
    pub const fn is_clang(&self) -> bool {
        self.is_clang
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    pub fn add_include_path(&mut self, dir: &str) {
        if !self.include_paths.iter().any(|path| path == dir) {
            self.include_paths.push(dir.to_string());
        }
    }

    pub fn include_paths(&self) -> &[String] {
        &self.include_paths
    }

    /// Include directories the driver searches by default.
    pub fn system_include_paths(&self) -> &[String] {
        self.system_includes
            .get_or_init(|| detect_system_include_paths(&self.driver))
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec![self.std.clone()];
        args.extend(self.flags.iter().cloned());
        args.extend(self.include_paths.iter().map(|dir| format!("-I{dir}")));
        args
    }

    /// Writes `source` into the work directory.
    pub fn write_source(&self, name: &str, source: &str) -> Result<PathBuf> {
        let path = self.work_dir().join(name);
        fs::write(&path, source)?;
        Ok(path)
    }

    fn run(&self, args: Vec<String>) -> Result<Output> {
        tracing::trace!("{} {}", self.driver, args.join(" "));
        let output = duct::cmd(self.driver.as_str(), args)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|source| CompilerError::Spawn {
                program: self.driver.clone(),
                source,
            })?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(CompilerError::Compile {
                diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }

    /// Parses and type-checks a file without generating code.
    pub fn syntax_check(&self, source: &Path) -> Result<()> {
        let mut args = vec!["-fsyntax-only".to_string(), "-x".to_string(), "c++".to_string()];
        args.extend(self.common_args());
        args.push(source.display().to_string());
        self.run(args).map(drop)
    }

    /// The clang AST of `source` as JSON.
    pub fn ast_dump(&self, source: &Path) -> Result<String> {
        if !self.is_clang {
            return Err(CompilerError::Unsupported(format!(
                "`{}` cannot dump its AST",
                self.driver
            )));
        }
        let mut args = vec![
            "-fsyntax-only".to_string(),
            "-x".to_string(),
            "c++".to_string(),
            "-Xclang".to_string(),
            "-ast-dump=json".to_string(),
        ];
        args.extend(self.common_args());
        args.push(source.display().to_string());
        let output = self.run(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Compiles `source` into a shared library named after `stem` and a
    /// fingerprint of its inputs. Identical inputs reuse the earlier output.
    pub fn compile_shared(&self, stem: &str, source: &str, extra: &[&str]) -> Result<PathBuf> {
        let mut args = vec!["-shared".to_string(), "-fPIC".to_string()];
        if cfg!(target_os = "macos") {
            args.extend(["-undefined".to_string(), "dynamic_lookup".to_string()]);
        }
        args.extend(self.common_args());
        args.extend(extra.iter().map(|flag| (*flag).to_string()));

        let tag = &fingerprint(source, &args)[..12];
        let output = self
            .work_dir()
            .join(format!("lib{stem}-{tag}.{SHARED_LIBRARY_EXTENSION}"));
        if output.exists() {
            return Ok(output);
        }
        let input = self.write_source(&format!("{stem}-{tag}.cpp"), source)?;
        args.extend([
            "-x".to_string(),
            "c++".to_string(),
            input.display().to_string(),
            "-o".to_string(),
            output.display().to_string(),
        ]);
        self.run(args)?;
        Ok(output)
    }

    /// Demangles through the configured demangler; the input comes back
    /// unchanged when that fails.
    pub fn demangle(&self, mangled: &str) -> String {
        duct::cmd!(self.demangler.as_str(), mangled)
            .stdout_capture()
            .stderr_null()
            .unchecked()
            .run()
            .ok()
            .filter(|output| output.status.success())
            .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| mangled.to_string())
    }

    pub fn resource_dir(&self) -> String {
        if self.is_clang {
            detect_resource_dir(&self.driver)
        } else {
            String::new()
        }
    }
}

fn fingerprint(source: &str, args: &[String]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(source.as_bytes());
    for arg in args {
        hasher.update([0u8]);
        hasher.update(arg.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// True when `driver --version` mentions clang.
pub fn reports_clang(driver: &str) -> bool {
    duct::cmd!(driver, "--version")
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .ok()
        .is_some_and(|output| {
            let mut text = String::new();
            text.push_str(&String::from_utf8_lossy(&output.stdout));
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            text.to_ascii_lowercase().contains("clang")
        })
}

/// The first driver answering `--version`, trying `preferred` before the
/// common C++ driver names.
pub fn find_driver(preferred: &str) -> Option<String> {
    [preferred, "clang++", "g++", "c++"]
        .into_iter()
        .filter(|driver| !driver.is_empty())
        .find(|driver| {
            duct::cmd!(*driver, "--version")
                .stdout_null()
                .stderr_null()
                .run()
                .is_ok()
        })
        .map(str::to_string)
}

/// Asks a clang binary for its resource directory; empty when it cannot say.
pub fn detect_resource_dir(clang: &str) -> String {
    duct::cmd!(clang, "-print-resource-dir")
        .stdout_capture()
        .stderr_null()
        .unchecked()
        .run()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .unwrap_or_default()
}

/// Include directories `compiler` searches for `<...>` includes.
pub fn detect_system_include_paths(compiler: &str) -> Vec<String> {
    let null_device = if cfg!(windows) { "NUL" } else { "/dev/null" };
    duct::cmd!(compiler, "-xc++", "-E", "-v", null_device)
        .stdout_null()
        .stderr_capture()
        .unchecked()
        .run()
        .map(|output| parse_include_search_list(&String::from_utf8_lossy(&output.stderr)))
        .unwrap_or_default()
}

/// Extracts the `#include <...>` search list from verbose driver output.
pub fn parse_include_search_list(verbose: &str) -> Vec<String> {
    verbose
        .lines()
        .skip_while(|line| !line.starts_with("#include <...> search starts here:"))
        .skip(1)
        .take_while(|line| !line.starts_with("End of search list."))
        .map(|line| line.trim().trim_end_matches(" (framework directory)").to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_include_search_list() {
        let verbose = "\
ignoring nonexistent directory \"/nope\"
#include \"...\" search starts here:
#include <...> search starts here:
 /usr/include/c++/13
 /usr/lib/llvm-18/lib/clang/18/include
 /System/Library/Frameworks (framework directory)
End of search list.
";
        assert_eq!(
            parse_include_search_list(verbose),
            vec![
                "/usr/include/c++/13",
                "/usr/lib/llvm-18/lib/clang/18/include",
                "/System/Library/Frameworks",
            ]
        );
        assert!(parse_include_search_list("no list here").is_empty());
    }

    #[test]
    fn test_find_driver_skips_missing_executables() {
        let found = find_driver("definitely-not-a-compiler");
        assert_ne!(found.as_deref(), Some("definitely-not-a-compiler"));
        if let Some(driver) = found {
            assert!(["clang++", "g++", "c++"].contains(&driver.as_str()));
        }
    }

    #[test]
    fn test_fingerprint_depends_on_flags() {
        let a = fingerprint("int x;", &["-O0".to_string()]);
        let b = fingerprint("int x;", &["-O2".to_string()]);
        assert_ne!(a, b);
        assert_eq!(a, fingerprint("int x;", &["-O0".to_string()]));
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn test_interpreter_args_override_std() {
        let config = ToolchainConfig {
            driver: "definitely-not-a-compiler".to_string(),
            ..ToolchainConfig::default()
        };
        let mut toolchain =
            Toolchain::new(&config, &["-std=c++17".to_string(), "-DX=1".to_string()]).unwrap();
        assert!(!toolchain.is_clang());
        toolchain.add_include_path("/opt/include");
        toolchain.add_include_path("/opt/include");
        let args = toolchain.common_args();
        assert_eq!(args[0], "-std=c++17");
        assert!(args.contains(&"-DX=1".to_string()));
        assert_eq!(toolchain.include_paths(), ["/opt/include"]);
        assert!(toolchain.work_dir().is_dir());
    }

    #[test]
    fn test_missing_driver_reports_spawn_error() {
        let config = ToolchainConfig {
            driver: "definitely-not-a-compiler".to_string(),
            demangler: "definitely-not-a-demangler".to_string(),
            ..ToolchainConfig::default()
        };
        let toolchain = Toolchain::new(&config, &[]).unwrap();
        let source = toolchain.write_source("x.cpp", "int x;").unwrap();
        assert!(matches!(
            toolchain.syntax_check(&source),
            Err(CompilerError::Spawn { .. })
        ));
        assert_eq!(toolchain.demangle("_Z1fi"), "_Z1fi");
    }
}
