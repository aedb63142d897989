use anyhow::Result;
use clap::{CommandFactory, Parser};
use latte_build::StageKind;
use std::process::ExitCode;

mod commands;
mod config;

/// Build a latte module and every module it includes.
///
/// Included modules are built first, most-included first. A module whose
/// release is newer than its sources is skipped unless --force is given.
///
/// EXAMPLES:
///     latte forms                     Development build of datalatte/forms
///     latte forms --release           Release build with the server bundle
///     latte forms --force --minimize  Rebuild and minify the script
///     latte forms --abort-after views Stop after view extraction
///
/// ENVIRONMENT VARIABLES:
///     LATTE_TSC       Compiler program (default: tsc)
///     LATTE_MINIFIER  Minifier program (default: terser)
///     LATTE_NODE      Interpreter for .js hooks (default: node)
///     RUST_LOG        Log filter, overrides --verbose
#[derive(Parser, Debug)]
#[command(name = "latte")]
#[command(version)]
struct Cli {
    /// Minify the emitted script
    #[arg(long, short = 'm')]
    minimize: bool,

    /// Log every stage and decision
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Release build: server bundle, manifest bundle and string tables
    #[arg(long, short = 'r')]
    release: bool,

    /// Generate record fields with widened types
    #[arg(long = "records-any", alias = "recordsany")]
    records_any: bool,

    /// Rebuild even when the release is up to date
    #[arg(long, short = 'f')]
    force: bool,

    /// Stop each module's build after this stage
    #[arg(long, value_name = "STAGE")]
    abort_after: Option<StageKind>,

    /// Module to build
    #[arg(allow_hyphen_values = true)]
    module: Option<String>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let Some(module) = cli.module.clone().filter(|m| !m.starts_with('-')) else {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    init_tracing(cli.verbose);
    let cli_config = config::Config::from_env();

    let args = commands::build::BuildArgs {
        module,
        minimize: cli.minimize,
        release: cli.release,
        records_any: cli.records_any,
        force: cli.force,
        abort_after: cli.abort_after,
        workspace_dir: None,
    };
    let context = commands::build::run(args, &cli_config)?;

    Ok(commands::build::exit_code(&context))
}

/// Console logging; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .without_time()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
