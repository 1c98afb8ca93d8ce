use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "CPPINTEROP_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";
const DEBUG_DIRECTIVE: &str = "debug";

static INIT: Once = Once::new();
static FILTER: OnceCell<reload::Handle<EnvFilter, Registry>> = OnceCell::new();
static DEBUG_OUTPUT: AtomicBool = AtomicBool::new(false);

fn base_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Initialise tracing subscriber once per process.
///
/// If the embedding application already installed a global subscriber this
/// is a no-op and debug-output toggling only flips the flag.
pub fn init_logging() {
    INIT.call_once(|| {
        let (filter, handle) = reload::Layer::new(base_filter());
        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .compact(),
            )
            .try_init()
            .is_ok();
        if installed {
            let _ = FILTER.set(handle);
        }
    });
}

/// Switches verbose diagnostics on or off for the whole process.
pub fn set_debug_output(enabled: bool) {
    DEBUG_OUTPUT.store(enabled, Ordering::Release);
    init_logging();
    let Some(handle) = FILTER.get() else {
        return;
    };
    let filter = if enabled {
        EnvFilter::new(DEBUG_DIRECTIVE)
    } else {
        base_filter()
    };
    if let Err(err) = handle.reload(filter) {
        tracing::warn!("failed to update log filter: {err}");
    }
}

pub fn is_debug_output_enabled() -> bool {
    DEBUG_OUTPUT.load(Ordering::Acquire)
}
