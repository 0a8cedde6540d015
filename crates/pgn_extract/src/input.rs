//! Argument groups, config loading and the run harness shared by every subcommand.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use pgn_stream::{
    BoundaryMode, Codec, Completion, DecodeError, IngestLimits, LogProgress, Pipeline,
    PipelineConfig, PipelineError, ReaderSource, RecordPredicate, RunStats, RunStatus, TagSpec,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_MAX_GAMES: u64 = 10_000;
pub const DEFAULT_PROGRESS_EVERY: u64 = 1_000;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open input {path}: {source}")]
    OpenInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create output {path}: {source}")]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to set up decoder: {0}")]
    Decoder(#[from] DecodeError),
    #[error("extraction failed: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum CodecArg {
    /// Pick by file extension; stdin is read as plain text.
    Auto,
    None,
    Bzip2,
    Gzip,
    Zstd,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum BoundaryArg {
    /// Every blank line ends a record.
    Blank,
    /// Blank lines end a record only after its movetext; tag-only blocks
    /// merge into one record.
    Movetext,
}

impl From<BoundaryArg> for BoundaryMode {
    fn from(arg: BoundaryArg) -> Self {
        match arg {
            BoundaryArg::Blank => BoundaryMode::Blank,
            BoundaryArg::Movetext => BoundaryMode::MoveText,
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct InputArgs {
    /// PGN dump to read, or `-` for stdin.
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    #[arg(long, value_enum, default_value_t = CodecArg::Auto)]
    pub codec: CodecArg,

    /// TOML file with pipeline settings; command-line flags win over it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Record boundary rule (defaults to `movetext` unless the config file sets one).
    ///
    /// `movetext` keeps a game's tag section and moves together, so input
    /// made only of tag blocks is read as a single record; use `blank` there.
    #[arg(long, value_enum)]
    pub boundary: Option<BoundaryArg>,

    /// Log progress every N emitted records (0 disables).
    #[arg(long)]
    pub progress_every: Option<u64>,

    /// Print run statistics as JSON when the run ends.
    #[arg(long)]
    pub json_report: bool,
}

impl InputArgs {
    fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == "-"
    }

    pub fn codec(&self) -> Codec {
        match self.codec {
            CodecArg::Auto if self.reads_stdin() => Codec::Identity,
            CodecArg::Auto => Codec::from_path(&self.input),
            CodecArg::None => Codec::Identity,
            CodecArg::Bzip2 => Codec::Bzip2,
            CodecArg::Gzip => Codec::Gzip,
            CodecArg::Zstd => Codec::Zstd,
        }
    }

    /// Starts from the command-line defaults, lays the config file over
    /// them, then applies flag overrides.
    pub fn load_config(&self) -> Result<PipelineConfig, Error> {
        let mut config = PipelineConfig::default()
            .with_boundary(BoundaryMode::MoveText)
            .with_max_output_records(DEFAULT_MAX_GAMES)
            .with_progress_interval(DEFAULT_PROGRESS_EVERY);
        if let Some(path) = &self.config {
            read_config(path)?.apply(&mut config);
        }
        if let Some(boundary) = self.boundary {
            config.boundary = boundary.into();
        }
        if let Some(every) = self.progress_every {
            config.progress_interval = Some(every);
        }
        Ok(config)
    }

    fn open(&self) -> Result<Box<dyn Read>, Error> {
        if self.reads_stdin() {
            return Ok(Box::new(io::stdin().lock()));
        }
        let file = File::open(&self.input).map_err(|source| Error::OpenInput {
            path: self.input.clone(),
            source,
        })?;
        Ok(Box::new(file))
    }
}

/// Pipeline settings as written in a config file; unset keys keep the
/// command-line defaults.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    max_output_records: Option<u64>,
    progress_interval: Option<u64>,
    boundary: Option<BoundaryMode>,
    limits: Option<IngestLimits>,
    tags: Option<Vec<TagSpec>>,
}

impl FileConfig {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(max) = self.max_output_records {
            config.max_output_records = Some(max);
        }
        if let Some(every) = self.progress_interval {
            config.progress_interval = Some(every);
        }
        if let Some(boundary) = self.boundary {
            config.boundary = boundary;
        }
        if let Some(limits) = self.limits {
            config.limits = limits;
        }
        if let Some(tags) = self.tags {
            config.tags = tags;
        }
    }
}

fn read_config(path: &Path) -> Result<FileConfig, Error> {
    let text = fs::read_to_string(path).map_err(|source| Error::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| Error::ParseConfig {
        path: path.to_path_buf(),
        source,
    })
}

/// Opens the output file, or stdout when no path is given.
pub fn open_sink(output: Option<&Path>) -> Result<Box<dyn Write>, Error> {
    match output {
        Some(path) => {
            let file = File::create(path).map_err(|source| Error::CreateOutput {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

#[derive(Debug, Serialize)]
struct Summary<'a, D> {
    command: &'static str,
    codec: &'static str,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    accept_ratio: f64,
    stats: &'a RunStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    dataset: Option<D>,
}

/// Where the JSON report goes when `--json-report` is set.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ReportTarget {
    Stdout,
    Stderr,
}

pub struct Run<'a> {
    pub command: &'static str,
    pub input: &'a InputArgs,
    pub config: PipelineConfig,
    pub predicate: Box<dyn RecordPredicate>,
    pub report_to: ReportTarget,
}

impl Run<'_> {
    pub fn execute(self, sink: Box<dyn Write>) -> Result<RunStats, Error> {
        self.execute_with(sink, || None::<()>)
    }

    /// Runs the pipeline into `sink` and returns the final counters, or the
    /// run's error once the report has been written. `dataset` adds a
    /// command-specific section to the JSON report.
    pub fn execute_with<D, F>(self, sink: Box<dyn Write>, dataset: F) -> Result<RunStats, Error>
    where
        D: Serialize,
        F: FnOnce() -> Option<D>,
    {
        let codec = self.input.codec();
        let decoder = codec.decoder()?;
        let codec_name = decoder.name();
        let mut source = ReaderSource::new(self.input.open()?);

        info!(
            command = self.command,
            input = %self.input.input.display(),
            codec = codec_name,
            quota = ?self.config.max_output_records,
            "starting run"
        );
        let pipeline = Pipeline::new(&self.config, decoder, self.predicate, sink)
            .with_observer(Box::new(LogProgress));
        let (report, sink) = pipeline.run(&mut source);
        drop(sink);

        let outcome = match &report.status {
            RunStatus::Completed(Completion::SourceExhausted) => "source_exhausted",
            RunStatus::Completed(Completion::QuotaReached) => "quota_reached",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed(_) => "failed",
        };
        if self.input.json_report {
            let summary = Summary {
                command: self.command,
                codec: codec_name,
                outcome,
                error: report.error().map(ToString::to_string),
                accept_ratio: report.stats.accept_ratio(),
                stats: &report.stats,
                dataset: dataset(),
            };
            let json = serde_json::to_string_pretty(&summary)?;
            match self.report_to {
                ReportTarget::Stdout => writeln!(io::stdout().lock(), "{json}")?,
                ReportTarget::Stderr => writeln!(io::stderr().lock(), "{json}")?,
            }
        }

        match report.status {
            RunStatus::Failed(err) => Err(err.into()),
            RunStatus::Cancelled => {
                warn!("run cancelled before the input was exhausted");
                Ok(report.stats)
            }
            RunStatus::Completed(_) => Ok(report.stats),
        }
    }
}
