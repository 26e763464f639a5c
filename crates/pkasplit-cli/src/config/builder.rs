use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use crate::cli::Cli;
use crate::error::{CliError, Result};
use pkasplit::engine::config::{SplitConfig, SplitConfigBuilder};
use tracing::debug;

/// Resolves the effective split configuration for a command line.
///
/// Each value is taken from the first source that sets it: a command-line
/// flag, then the `--config` file, then the built-in default.
pub fn build_config(cli: &Cli) -> Result<SplitConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = match &cli.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };

    let ph = cli.ph.or(file_config.ph).unwrap_or(defaults.ph);

    let remove_hydrogens = if cli.keep_hydrogens {
        false
    } else {
        file_config
            .remove_hydrogens
            .unwrap_or(defaults.remove_hydrogens)
    };

    let compute_2d_coords = if cli.no_layout {
        false
    } else {
        file_config
            .compute_2d_coords
            .unwrap_or(defaults.compute_2d_coords)
    };

    let (min, max) = file_config
        .known_pka_range
        .map(|r| (r.min, r.max))
        .unwrap_or(defaults.known_pka_range);

    let config = SplitConfigBuilder::new()
        .ph(ph)
        .remove_hydrogens(remove_hydrogens)
        .compute_2d_coords(compute_2d_coords)
        .known_pka_range(min, max)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    debug!(?config, "Resolved split configuration.");
    Ok(config)
}
