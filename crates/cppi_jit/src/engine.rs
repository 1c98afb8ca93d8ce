//! Trampoline synthesis with caching.

use std::ffi::c_void;
use std::sync::atomic::AtomicU64;

use cppi_abi::{CallShape, DestructorCall, GenericCall, JitCall};
use cppi_compiler::{AccessControl, CompilerService, DeclId};
use cppi_config::WrapperConfig;
use cppi_utils::Stopwatch;
use parking_lot::RwLock;

use crate::cache::{CacheKey, WrapperCache};
use crate::codegen::{CodeWriter, WrapperSource};
use crate::eligibility;
use crate::stats::SynthesisStats;
use crate::{Result, SynthesisError};

/// Cache identity of an interpreter.
fn service_key(service: &dyn CompilerService) -> usize {
    std::ptr::from_ref(service).cast::<()>() as usize
}

/// Synthesizes, compiles and caches trampolines for every interpreter of
/// the process.
pub struct WrapperEngine {
    generic: WrapperCache,
    destructors: WrapperCache,
    serial: AtomicU64,
    stats: RwLock<SynthesisStats>,
}

impl Default for WrapperEngine {
    fn default() -> Self {
        Self::new(&WrapperConfig::default())
    }
}

impl WrapperEngine {
    pub fn new(config: &WrapperConfig) -> Self {
        Self {
            generic: WrapperCache::new("call", config.cache_warn_threshold),
            destructors: WrapperCache::new("destructor", config.cache_warn_threshold),
            serial: AtomicU64::new(0),
            stats: RwLock::new(SynthesisStats::new()),
        }
    }

    pub fn stats(&self) -> SynthesisStats {
        self.stats.read().clone()
    }

    /// Drops cached trampolines of an interpreter that is being deleted, so
    /// a later interpreter at the same address cannot hit them.
    pub fn forget(&self, service: &dyn CompilerService) {
        let key = service_key(service);
        let dropped = self.generic.forget(key) + self.destructors.forget(key);
        if dropped > 0 {
            tracing::debug!("dropped {dropped} cached trampolines");
        }
    }

    /// Number of cached call and destructor trampolines.
    pub fn cached(&self) -> (usize, usize) {
        (self.generic.len(), self.destructors.len())
    }

    /// The `__cf_N` trampoline for `func`.
    pub fn make_wrapper(&self, service: &dyn CompilerService, func: DeclId) -> Result<GenericCall> {
        let key = CacheKey::new(service_key(service), func);
        if let Some(address) = self.generic.get(&key) {
            self.stats.write().record_hit();
            return Ok(as_generic(address));
        }

        let result = self.synthesize_wrapper(service, func);
        let address = self.finish(&self.generic, key, result)?;
        Ok(as_generic(address))
    }

    /// The `__dtor_N` trampoline for a class.
    pub fn make_dtor_wrapper(&self, service: &dyn CompilerService, record: DeclId) -> Result<DestructorCall> {
        let key = CacheKey::new(service_key(service), record);
        if let Some(address) = self.destructors.get(&key) {
            self.stats.write().record_hit();
            return Ok(as_destructor(address));
        }

        let result = self.synthesize_destructor(service, record);
        let address = self.finish(&self.destructors, key, result)?;
        Ok(as_destructor(address))
    }

    /// A callable for `func`: destructors get the destructor trampoline of
    /// their class, everything else a call trampoline. Failures come back as
    /// an invalid call.
    pub fn make_function_callable(&self, service: &dyn CompilerService, func: DeclId) -> JitCall {
        let Some(info) = service.model().function(func).cloned() else {
            tracing::error!("make_function_callable: {func:?} is not a function");
            return JitCall::invalid();
        };

        if info.is_destructor() {
            let parent = service.model().decl(func).parent;
            let Some(record) = parent else {
                return JitCall::invalid();
            };
            return match self.make_dtor_wrapper(service, record) {
                Ok(call) => JitCall::destructor(call, func.function()),
                Err(err) => {
                    tracing::debug!("no destructor trampoline for {func:?}: {err}");
                    JitCall::invalid()
                }
            };
        }

        let is_void = service.model_mut().is_void(info.return_type);
        let shape = CallShape {
            required_args: info.min_required_args(),
            num_args: info.params.len(),
            is_constructor: info.is_constructor(),
            is_method: info.is_instance_method(),
            returns_void: is_void,
        };
        match self.make_wrapper(service, func) {
            Ok(call) => JitCall::generic(call, func.function(), shape),
            Err(err) => {
                tracing::debug!("no call trampoline for {func:?}: {err}");
                JitCall::invalid()
            }
        }
    }

    fn synthesize_wrapper(&self, service: &dyn CompilerService, func: DeclId) -> Result<(usize, u64)> {
        eligibility::prepare(service, func)?;
        let source = {
            let mut model = service.model_mut();
            CodeWriter::new(&mut model, &self.serial).wrapper_source(func)?
        };
        // Private default constructors must stay reachable.
        let default_ctor = service
            .model()
            .function(func)
            .is_some_and(|info| info.is_default_constructor());
        let access = if default_ctor {
            AccessControl::Disabled
        } else {
            AccessControl::Enforced
        };
        compile(service, &source, access)
    }

    fn synthesize_destructor(&self, service: &dyn CompilerService, record: DeclId) -> Result<(usize, u64)> {
        let source = {
            let mut model = service.model_mut();
            CodeWriter::new(&mut model, &self.serial).destructor_source(record)?
        };
        compile(service, &source, AccessControl::Disabled)
    }

    /// Records the outcome and caches a successful compilation.
    fn finish(&self, cache: &WrapperCache, key: CacheKey, result: Result<(usize, u64)>) -> Result<usize> {
        match result {
            Ok((address, elapsed_us)) => {
                self.stats.write().record_compilation(elapsed_us);
                Ok(cache.insert(key, address))
            }
            Err(err) => {
                self.stats.write().record_failure();
                Err(err)
            }
        }
    }
}

/// Compiles a trampoline and returns its address and the compile time.
fn compile(service: &dyn CompilerService, source: &WrapperSource, access: AccessControl) -> Result<(usize, u64)> {
    tracing::debug!("Compiling '{}'", source.symbol);
    let watch = Stopwatch::start_new();
    let compiled = service.compile_function(&source.symbol, &source.code, access);
    let elapsed_us = watch.elapsed_us();
    match compiled {
        Ok(address) if !address.is_null() => {
            tracing::debug!("Compiled '{}' successfully:\n{}", source.symbol, source.code);
            Ok((address as usize, elapsed_us))
        }
        Ok(_) => Err(SynthesisError::NullAddress(source.symbol.clone())),
        Err(err) => {
            tracing::error!(
                "make_wrapper: Failed to compile\n==== SOURCE BEGIN ====\n{}\n==== SOURCE END ====",
                source.code
            );
            Err(SynthesisError::Compile {
                symbol: source.symbol.clone(),
                source: err,
            })
        }
    }
}

fn as_generic(address: usize) -> GenericCall {
    // SAFETY: cached addresses are non-null `__cf_N` symbols, which are
    // defined with exactly this signature.
    unsafe { std::mem::transmute::<*mut c_void, GenericCall>(address as *mut c_void) }
}

fn as_destructor(address: usize) -> DestructorCall {
    // SAFETY: cached addresses are non-null `__dtor_N` symbols, which are
    // defined with exactly this signature.
    unsafe { std::mem::transmute::<*mut c_void, DestructorCall>(address as *mut c_void) }
}
