//! Reflection over the active interpreter's model, the `extern "C"` entry
//! points built on it, and the resolver that hands those entries out by
//! name.

pub mod api;
pub mod context;
pub mod ops;
pub mod resolver;

#[cfg(test)]
mod test_support;

pub use context::InteropContext;
pub use resolver::{get_proc_address, get_proc_address_raw};
