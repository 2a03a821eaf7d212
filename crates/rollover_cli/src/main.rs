//! Rollover CLI: decides whether to rebuild artifacts and rotates generations.
//!
//! Provides `rollover build` to run the decide, build, rotate pipeline,
//! `rollover status` to report what the next build would do, and
//! `rollover verify` to check cached entries against their recorded digests.

#![warn(missing_docs)]

mod build;
mod project;
mod status;
mod verify;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Rollover, a versioned, generation-rotating artifact cache.
#[derive(Parser, Debug)]
#[command(name = "rollover", version, about = "Rollover artifact cache")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `rollover.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rebuild artifacts if needed and rotate generations.
    Build(BuildArgs),
    /// Show the recorded generations and what the next build would do.
    Status(StatusArgs),
    /// Check every cached entry against its recorded digest.
    Verify(VerifyArgs),
}

/// Arguments for the `rollover build` subcommand.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Desired version, overriding the configured version file.
    #[arg(long)]
    pub desired: Option<String>,

    /// Cache directory, overriding `cache.dir`.
    #[arg(long)]
    pub cache_dir: Option<String>,

    /// Exit with status 2 when the build fails instead of degrading.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `rollover status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Desired version, overriding the configured version file.
    #[arg(long)]
    pub desired: Option<String>,

    /// Cache directory, overriding `cache.dir`.
    #[arg(long)]
    pub cache_dir: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `rollover verify` subcommand.
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Cache directory, overriding `cache.dir`.
    #[arg(long)]
    pub cache_dir: Option<String>,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::env::var_os("TERM").is_some(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Build(ref args) => build::run(args, &global),
        Command::Status(ref args) => status::run(args, &global),
        Command::Verify(ref args) => verify::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the log subscriber. `RUST_LOG` wins over the verbosity flags.
fn init_logging(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(global)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(global.color)
        .without_time()
        .init();
}

/// Default filter directive for the given verbosity flags.
fn default_log_level(global: &GlobalArgs) -> &'static str {
    if global.verbose {
        "debug"
    } else if global.quiet {
        "error"
    } else {
        "warn"
    }
}
