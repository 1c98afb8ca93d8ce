//! Dynamic library management: resolving library stems against RPATH,
//! registered search paths and RUNPATH, sniffing file magic, and tracking
//! which libraries are loaded.

pub mod magic;
pub mod manager;

pub use magic::{FileMagic, identify_magic};
pub use manager::{
    DyLibHandle, DynamicLibraryManager, LinkerFlavor, LoadLibResult, SearchPathInfo,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DyldError {
    #[error("failed to load library {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: libloading::Error,
    },
    #[error("cannot find library `{0}`")]
    NotFound(String),
}
