mod count;
mod extract;
mod input;

use std::io::IsTerminal;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pgn_extract")]
#[command(about = "Stream PGN games out of large, possibly compressed, game dumps")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Copy games to the output until the game quota is met.
    Extract(extract::ExtractArgs),
    /// Copy games whose players are both rated at least `--min-elo`.
    Filter(extract::FilterArgs),
    /// Count records and games without writing any output.
    Count(count::Args),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Extract(args) => extract::run_extract(args),
        Command::Filter(args) => extract::run_filter(args),
        Command::Count(args) => count::run(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
