use clap::Parser;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    name = "pkasplit",
    version,
    about = "Split Epik pKa-annotated SD files into tagged protonation-state records.",
    help_template = HELP_TEMPLATE,
)]
pub struct Cli {
    /// Path to the input SD file, plain or gzip-compressed.
    #[arg(long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the gzip-compressed output SD file.
    #[arg(long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Path to an optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the pH separating acidic from basic sites.
    #[arg(long, value_name = "FLOAT")]
    pub ph: Option<f64>,

    /// Keep explicit hydrogen atoms from the input instead of folding them.
    #[arg(long)]
    pub keep_hydrogens: bool,

    /// Keep input coordinates instead of computing a 2D layout.
    #[arg(long)]
    pub no_layout: bool,
}
