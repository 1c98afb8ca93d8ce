//! Compiled trampolines keyed by interpreter and declaration.
//!
//! Entries are never evicted: the code they point at stays mapped for the
//! life of the interpreter that compiled it.

use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashMap;
use cppi_compiler::DeclId;
use parking_lot::RwLock;

/// Identity of a trampoline: the interpreter that compiled it (by address)
/// and the declaration it calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub service: usize,
    pub decl: DeclId,
}

impl CacheKey {
    pub const fn new(service: usize, decl: DeclId) -> Self {
        Self { service, decl }
    }
}

pub struct WrapperCache {
    label: &'static str,
    entries: RwLock<AHashMap<CacheKey, usize>>,
    warn_threshold: usize,
    warned: AtomicBool,
}

impl WrapperCache {
    pub fn new(label: &'static str, warn_threshold: usize) -> Self {
        Self {
            label,
            entries: RwLock::new(AHashMap::new()),
            warn_threshold,
            warned: AtomicBool::new(false),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<usize> {
        self.entries.read().get(key).copied()
    }

    /// Stores `address` unless another thread got there first, and returns
    /// the address that is kept.
    pub fn insert(&self, key: CacheKey, address: usize) -> usize {
        let (kept, len) = {
            let mut entries = self.entries.write();
            let kept = *entries.entry(key).or_insert(address);
            (kept, entries.len())
        };
        if kept != address {
            tracing::debug!("{} wrapper for {:?} was compiled concurrently", self.label, key.decl);
        }
        if len > self.warn_threshold && !self.warned.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                "{} wrapper cache holds {len} trampolines (threshold {}); they are never freed",
                self.label,
                self.warn_threshold
            );
        }
        kept
    }

    /// Drops the entries of an interpreter that no longer exists.
    pub fn forget(&self, service: usize) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| key.service != service);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
