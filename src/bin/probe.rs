//! Inspects an interop implementation library: which operations it
//! resolves, whether a dispatch table can be filled from it, and where
//! libraries are searched.

use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cppinterop::abi::api::OPERATION_NAMES;
use cppinterop::{DispatchTable, InteropConfig};
use cppi_dyld::DynamicLibraryManager;

#[derive(Parser)]
#[command(name = "cppinterop-probe")]
#[command(about = "Inspect CppInterOp implementation libraries", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve operations by name
    Lookup {
        /// Operation names, e.g. GetScope
        #[arg(required = true)]
        names: Vec<String>,
        /// Resolve through this library instead of the built-in resolver
        #[arg(short, long)]
        library: Option<String>,
    },

    /// List every operation name
    Symbols,

    /// Fill a dispatch table and report what is missing
    CheckDispatch {
        /// Implementation library; the configured one when omitted
        #[arg(short, long)]
        library: Option<String>,
        /// Use the built-in resolver instead of loading a library
        #[arg(long, conflicts_with = "library")]
        in_process: bool,
    },

    /// Show the library search paths and the configured library
    Paths,
}

fn lookup(names: &[String], library: Option<&str>, out: &mut impl Write) -> Result<bool> {
    let mut all_found = true;
    for name in names {
        let address = match library {
            Some(path) => cppinterop::dl_get_proc_address(name, Some(path)),
            None => cppinterop::get_proc_address(name),
        };
        match address {
            Some(address) => writeln!(out, "{name}\t{:p}", address as *const ())?,
            None => {
                all_found = false;
                writeln!(out, "{name}\tmissing")?;
            }
        }
    }
    Ok(all_found)
}

fn report(table: &DispatchTable, initialized: bool, out: &mut impl Write) -> Result<()> {
    writeln!(out, "resolved {} of {}", table.resolved_count(), OPERATION_NAMES.len())?;
    for name in table.missing() {
        writeln!(out, "missing {name}")?;
    }
    if !initialized {
        writeln!(out, "critical operations unavailable")?;
    }
    Ok(())
}

fn paths(out: &mut impl Write) -> Result<()> {
    let config = InteropConfig::from_env();
    writeln!(out, "library: {}", config.resolve_library_path(None).display())?;
    DynamicLibraryManager::new()
        .dump(out)
        .context("failed to write search paths")?;
    Ok(())
}

fn run(cli: Cli) -> Result<bool> {
    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Lookup { names, library } => lookup(&names, library.as_deref(), &mut out),
        Commands::Symbols => {
            let mut names = OPERATION_NAMES.to_vec();
            names.sort_unstable();
            for name in names {
                writeln!(out, "{name}")?;
            }
            Ok(true)
        }
        Commands::CheckDispatch { library, in_process } => {
            let initialized = if in_process {
                cppinterop::init_in_process()
            } else {
                cppinterop::init_functions(library.as_deref())
            };
            report(&cppinterop::table(), initialized, &mut out)?;
            Ok(initialized)
        }
        Commands::Paths => paths(&mut out).map(|()| true),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    cppi_utils::init_logging();
    if cli.debug {
        cppi_utils::set_debug_output(true);
    }
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
