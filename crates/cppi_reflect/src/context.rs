//! Process state behind the C API: the live interpreters, which one is
//! active, and the wrapper engine they share.

use std::ffi::c_void;
use std::sync::Arc;

use cppi_abi::InterpHandle;
use cppi_compiler::{CompilerError, CompilerService, Model, ModelInterpreter};
use cppi_config::{EXTRA_INTERPRETER_ARGS_ENV, InteropConfig, split_args};
use cppi_jit::WrapperEngine;
use parking_lot::RwLock;

#[derive(Default)]
struct Registry {
    services: Vec<Arc<dyn CompilerService>>,
    active: Option<usize>,
}

impl Registry {
    fn position(&self, handle: InterpHandle) -> Option<usize> {
        self.services
            .iter()
            .position(|service| handle_of(service) == handle)
    }
}

fn handle_of(service: &Arc<dyn CompilerService>) -> InterpHandle {
    InterpHandle::from_ptr(Arc::as_ptr(service).cast::<c_void>().cast_mut())
}

pub struct InteropContext {
    config: InteropConfig,
    registry: RwLock<Registry>,
    engine: WrapperEngine,
}

impl InteropContext {
    pub fn new(config: InteropConfig) -> Self {
        let engine = WrapperEngine::new(&config.wrappers);
        Self {
            config,
            registry: RwLock::new(Registry::default()),
            engine,
        }
    }

    /// Context configured from the environment, with logging installed.
    pub fn from_env() -> Self {
        cppi_utils::init_logging();
        let config = InteropConfig::from_env();
        if config.debug_output {
            cppi_utils::set_debug_output(true);
        }
        Self::new(config)
    }

    pub const fn config(&self) -> &InteropConfig {
        &self.config
    }

    pub const fn engine(&self) -> &WrapperEngine {
        &self.engine
    }

    /// Starts a toolchain-backed interpreter and makes it the active one.
    ///
    /// `CPPINTEROP_EXTRA_INTERPRETER_ARGS` is read at each call and appended
    /// after `args`.
    pub fn create_interpreter(&self, args: &[String]) -> Result<InterpHandle, CompilerError> {
        let mut argv = args.to_vec();
        match std::env::var(EXTRA_INTERPRETER_ARGS_ENV) {
            Ok(extra) => argv.extend(split_args(&extra)),
            Err(_) => argv.extend(self.config.extra_interpreter_args.iter().cloned()),
        }
        tracing::debug!("creating interpreter with {argv:?}");
        let interpreter = ModelInterpreter::new(&self.config.toolchain, &argv)?;
        Ok(self.register(Arc::new(interpreter)))
    }

    /// Adds an already constructed service and activates it.
    pub fn register(&self, service: Arc<dyn CompilerService>) -> InterpHandle {
        let handle = handle_of(&service);
        let mut registry = self.registry.write();
        registry.services.push(service);
        registry.active = Some(registry.services.len() - 1);
        handle
    }

    /// Drops an interpreter; the null handle names the active one. The most
    /// recently created survivor becomes active.
    pub fn delete_interpreter(&self, handle: InterpHandle) -> bool {
        let removed = {
            let mut registry = self.registry.write();
            let index = if handle.is_null() {
                registry.active
            } else {
                registry.position(handle)
            };
            let Some(index) = index else {
                return false;
            };
            let removed = registry.services.remove(index);
            registry.active = registry.services.len().checked_sub(1);
            removed
        };
        self.engine.forget(removed.as_ref());
        true
    }

    pub fn activate(&self, handle: InterpHandle) -> bool {
        let mut registry = self.registry.write();
        match registry.position(handle) {
            Some(index) => {
                registry.active = Some(index);
                true
            }
            None => false,
        }
    }

    pub fn active_handle(&self) -> InterpHandle {
        let registry = self.registry.read();
        registry
            .active
            .and_then(|index| registry.services.get(index))
            .map_or_else(InterpHandle::null, handle_of)
    }

    pub fn interpreter_count(&self) -> usize {
        self.registry.read().services.len()
    }

    /// The active interpreter.
    pub fn service(&self) -> Option<Arc<dyn CompilerService>> {
        let registry = self.registry.read();
        let service = registry
            .active
            .and_then(|index| registry.services.get(index))
            .cloned();
        if service.is_none() {
            tracing::warn!("no interpreter is active; call CreateInterpreter first");
        }
        service
    }

    /// Runs a read-only query against the active interpreter's model.
    pub fn query<R>(&self, query: impl FnOnce(&Model) -> Option<R>) -> Option<R> {
        let service = self.service()?;
        let model = service.model();
        query(&model)
    }

    /// Runs a query that may intern new types in the active model.
    pub fn query_mut<R>(&self, query: impl FnOnce(&mut Model) -> Option<R>) -> Option<R> {
        let service = self.service()?;
        let mut model = service.model_mut();
        query(&mut model)
    }
}
