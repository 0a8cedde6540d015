use std::path::PathBuf;

use pgn_stream::{AcceptAll, MinRating, PipelineConfig, RecordPredicate};

use crate::input::{open_sink, Error, InputArgs, ReportTarget, Run};

pub const DEFAULT_MIN_ELO: i64 = 1_800;

#[derive(Debug, clap::Args)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Destination file; defaults to stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Stop after writing this many games (0 writes nothing).
    #[arg(long)]
    pub max_games: Option<u64>,
}

#[derive(Debug, clap::Args)]
pub struct FilterArgs {
    #[command(flatten)]
    pub extract: ExtractArgs,

    /// Minimum rating both players must hold.
    #[arg(long, default_value_t = DEFAULT_MIN_ELO)]
    pub min_elo: i64,
}

pub fn run_extract(args: ExtractArgs) -> Result<(), Error> {
    write_games("extract", &args, Box::new(AcceptAll))
}

pub fn run_filter(args: FilterArgs) -> Result<(), Error> {
    let predicate = MinRating::new(args.min_elo);
    write_games("filter", &args.extract, Box::new(predicate))
}

fn write_games(
    command: &'static str,
    args: &ExtractArgs,
    predicate: Box<dyn RecordPredicate>,
) -> Result<(), Error> {
    let config = apply_quota(args.input.load_config()?, args.max_games);
    let sink = open_sink(args.output.as_deref())?;
    let run = Run {
        command,
        input: &args.input,
        config,
        predicate,
        report_to: ReportTarget::Stderr,
    };
    run.execute(sink)?;
    Ok(())
}

fn apply_quota(config: PipelineConfig, max_games: Option<u64>) -> PipelineConfig {
    match max_games {
        Some(quota) => config.with_max_output_records(quota),
        None => config,
    }
}
