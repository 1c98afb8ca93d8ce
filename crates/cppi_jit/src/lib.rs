//! Synthesis of uniform-convention call trampolines.
//!
//! Every reflected function is reached through a generated
//! `extern "C" void __cf_N(void* obj, int nargs, void** args, void* ret)`
//! (or `__dtor_N` for destructors) compiled by the active
//! [`CompilerService`](cppi_compiler::CompilerService). Compiled trampolines
//! are cached per interpreter and declaration.

pub mod cache;
pub mod codegen;
pub mod eligibility;
pub mod engine;
pub mod stats;

use cppi_compiler::CompilerError;
use thiserror::Error;

pub use cache::{CacheKey, WrapperCache};
pub use codegen::{CodeWriter, WrapperSource};
pub use engine::WrapperEngine;
pub use stats::SynthesisStats;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("declaration is not a function")]
    NotAFunction,
    #[error("declaration is not a class")]
    NotAClass,
    #[error("{0}")]
    Ineligible(&'static str),
    #[error("failed to compile `{symbol}`: {source}")]
    Compile {
        symbol: String,
        source: CompilerError,
    },
    #[error("compiled `{0}` but its address is null")]
    NullAddress(String),
}

pub type Result<T, E = SynthesisError> = std::result::Result<T, E>;
