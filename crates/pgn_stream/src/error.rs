use std::io;

use thiserror::Error;

/// Failures reported by a [`ChunkDecoder`](crate::ChunkDecoder).
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{codec} stream is corrupt: {message}")]
    Corrupt {
        codec: &'static str,
        message: String,
    },
    #[error("{codec} stream ended before its end-of-stream marker")]
    Truncated { codec: &'static str },
    #[error("{codec} decoder already failed; no further input accepted")]
    Poisoned { codec: &'static str },
}

/// Errors that stop a pipeline run.
///
/// Output already written to the sink stays valid when any of these occur.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read from byte source: {0}")]
    Source(#[source] io::Error),
    #[error("failed to write to output sink: {0}")]
    Sink(#[source] io::Error),
    #[error("compressed input is corrupt after {bytes_read} bytes: {source}")]
    CorruptStream {
        bytes_read: u64,
        #[source]
        source: DecodeError,
    },
    #[error("line too long (line_number={line_number}, observed_bytes={observed_bytes}, max_line_bytes={max_line_bytes})")]
    LineTooLong {
        line_number: u64,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
}

/// A recognized integer tag whose value did not parse.
///
/// Recovered by substituting `0`; never aborts a run.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FieldParseWarning {
    pub tag: String,
    pub raw: String,
    pub line_number: u64,
}
