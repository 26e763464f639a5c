mod cli;
mod config;
mod error;
mod logging;
mod utils;

use crate::cli::Cli;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use clap::Parser;
use pkasplit::engine::progress::ProgressReporter;
use pkasplit::workflows::split;
use std::path::Path;
use tracing::{debug, error, info};

fn main() {
    if let Err(e) = run_app() {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn path_line(label: &str, path: &Path) -> String {
    format!("{}: {}", label, path.display())
}

fn run_app() -> Result<()> {
    let cli = Cli::parse();

    let progress_handler = CliProgressHandler::new();
    logging::setup_logging(
        cli.verbose,
        cli.quiet,
        cli.log_file.clone(),
        Some(progress_handler.bar()),
    )?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install().map_err(|e| CliError::Other(e.into()))?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    info!("🚀 pkasplit v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    if same_path(&cli.input, &cli.output) {
        return Err(CliError::Argument(format!(
            "input and output refer to the same file: {}",
            cli.input.display()
        )));
    }

    let config = config::build_config(&cli)?;

    println!("{}", path_line("inputfile", &cli.input));
    println!("{}", path_line("outputfile", &cli.output));

    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let summary = split::run(&cli.input, &cli.output, &config, &reporter).map_err(|e| {
        error!("❌ Splitting failed: {}", e);
        CliError::from(e)
    })?;

    println!("finished splitting {} molecules", summary.records_read);
    println!("skipped mols: {}", summary.skipped);
    if summary.suppressed_entries > 0 {
        info!(
            suppressed = summary.suppressed_entries,
            "pKa entries without output after a failed derivation."
        );
    }

    Ok(())
}
