//! Configuration for the interop layer.
//!
//! Settings come from environment variables, optionally layered over a TOML
//! file when the `toml-config` feature is enabled.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Path of the implementation library, consulted when no explicit path is given.
pub const LIBRARY_PATH_ENV: &str = "CPPINTEROP_LIBRARY_PATH";
/// Extra arguments appended to every interpreter creation, space separated.
pub const EXTRA_INTERPRETER_ARGS_ENV: &str = "CPPINTEROP_EXTRA_INTERPRETER_ARGS";
/// Enables debug output at startup.
pub const DEBUG_ENV: &str = "CPPINTEROP_DEBUG";
/// C++ driver used by the toolchain backend.
pub const CXX_ENV: &str = "CPPINTEROP_CXX";
/// Extra flags handed to the C++ driver, space separated.
pub const CXXFLAGS_ENV: &str = "CPPINTEROP_CXXFLAGS";
/// Wrapper cache size past which a warning is logged.
pub const WRAPPER_CACHE_WARN_ENV: &str = "CPPINTEROP_WRAPPER_CACHE_WARN";

/// Library path baked in at build time, if any.
const BUILD_LIBRARY_PATH: Option<&str> = option_env!("CPPINTEROP_DEFAULT_LIBRARY");

/// Complete interop configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct InteropConfig {
    /// Implementation library loaded by the dispatch layer
    pub library_path: Option<PathBuf>,

    /// Arguments appended to every `CreateInterpreter` call
    pub extra_interpreter_args: Vec<String>,

    /// Start with debug output enabled
    pub debug_output: bool,

    /// Toolchain backing the reference compiler service
    pub toolchain: ToolchainConfig,

    /// Wrapper synthesis settings
    pub wrappers: WrapperConfig,
}

impl InteropConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        config.apply_lookup(&lookup);
        config
    }

    /// Load configuration from TOML file
    #[cfg(feature = "toml-config")]
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from TOML file (stub when toml feature is disabled)
    #[cfg(not(feature = "toml-config"))]
    pub fn from_file(_path: &Path) -> anyhow::Result<Self> {
        anyhow::bail!("TOML support not enabled. Enable the 'toml-config' feature.")
    }

    /// Merge with environment variables (env vars take precedence)
    #[must_use]
    pub fn merge_with_env(mut self) -> Self {
        self.apply_lookup(&|key: &str| std::env::var(key).ok());
        self
    }

    fn apply_lookup(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(LIBRARY_PATH_ENV).filter(|path| !path.is_empty()) {
            self.library_path = Some(PathBuf::from(path));
        }
        if let Some(args) = lookup(EXTRA_INTERPRETER_ARGS_ENV) {
            self.extra_interpreter_args = split_args(&args);
        }
        if let Some(flag) = lookup(DEBUG_ENV) {
            self.debug_output = parse_flag(&flag);
        }
        if let Some(driver) = lookup(CXX_ENV).filter(|driver| !driver.is_empty()) {
            self.toolchain.driver = driver;
        }
        if let Some(flags) = lookup(CXXFLAGS_ENV) {
            self.toolchain.flags = split_args(&flags);
        }
        if let Some(threshold) = lookup(WRAPPER_CACHE_WARN_ENV).and_then(|v| v.parse().ok()) {
            self.wrappers.cache_warn_threshold = threshold;
        }
    }

    /// Library to open, by priority: explicit argument, configured path, build default.
    pub fn resolve_library_path(&self, custom: Option<&str>) -> PathBuf {
        custom
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.library_path.clone())
            .unwrap_or_else(default_library_path)
    }
}

/// Toolchain configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolchainConfig {
    /// C++ driver executable
    pub driver: String,

    /// Language standard flag
    pub std: String,

    /// Additional driver flags
    pub flags: Vec<String>,

    /// Demangler executable
    pub demangler: String,

    /// Keep generated sources and objects after the process exits
    pub keep_artifacts: bool,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            driver: "clang++".to_string(),
            std: "-std=c++14".to_string(),
            flags: vec!["-O0".to_string()],
            demangler: "c++filt".to_string(),
            keep_artifacts: false,
        }
    }
}

/// Wrapper synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WrapperConfig {
    /// Number of cached trampolines past which a warning is emitted
    pub cache_warn_threshold: usize,
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            cache_warn_threshold: 4096,
        }
    }
}

/// Library path compiled into this build, or the platform file name of `cppinterop`.
pub fn default_library_path() -> PathBuf {
    BUILD_LIBRARY_PATH
        .filter(|path| !path.is_empty())
        .map_or_else(
            || PathBuf::from(libloading::library_filename("cppinterop")),
            PathBuf::from,
        )
}

/// Splits a whitespace separated argument string.
pub fn split_args(args: &str) -> Vec<String> {
    args.split_whitespace().map(str::to_string).collect()
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
