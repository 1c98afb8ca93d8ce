//! Shared helpers for the CppInterOp crates: logging bootstrap, timing and
//! filesystem path utilities.

pub mod logger;
pub mod paths;
pub mod timer;

pub use logger::{init_logging, is_debug_output_enabled, set_debug_output};
pub use paths::{SplitMode, normalize_path, split_paths};
pub use timer::Stopwatch;
