use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod export_cmd;
mod import_cmd;
mod path_guard;
mod session;

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Export(args) => export_cmd::run_export(args),
        Command::Import(args) => import_cmd::run_import(args),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "edgecfg=debug" } else { "edgecfg=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
