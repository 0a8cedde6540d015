#![forbid(unsafe_code)]
//! Streaming extraction of PGN game records.
//!
//! Consumes a byte stream that may still be compressed and never holds more
//! than one chunk, one line and one record in memory:
//! - [`ChunkDecoder`] variants (identity, bzip2, gzip, zstd) decode chunks in arrival order.
//! - [`LineReassembler`] rebuilds complete lines across chunk boundaries.
//! - [`RecordBoundaryDetector`] groups lines into records at blank lines.
//! - [`FieldExtractor`] reads `[Tag "value"]` fields, substituting `0` for unparseable integers.
//! - [`BoundedWriter`] writes records accepted by a [`RecordPredicate`] until a quota is met.
//! - [`Pipeline`] drives the chain from a [`ChunkSource`] and reports a [`RunReport`].
//!
//! ```
//! use pgn_stream::{ChunkIter, Codec, Completion, MinRating, Pipeline, PipelineConfig};
//!
//! let chunks = vec![
//!     b"[WhiteElo \"2000\"]\n[BlackElo \"1900\"]\n\n".to_vec(),
//!     b"[WhiteElo \"1500\"]\n[BlackElo \"2200\"]\n\n".to_vec(),
//! ];
//! let config = PipelineConfig::default().with_max_output_records(10);
//! let pipeline = Pipeline::new(
//!     &config,
//!     Codec::Identity.decoder().unwrap(),
//!     Box::new(MinRating::new(1800)),
//!     Vec::new(),
//! );
//! let (report, output) = pipeline.run(&mut ChunkIter::new(chunks));
//!
//! assert_eq!(report.completion(), Some(Completion::SourceExhausted));
//! assert_eq!(report.stats.records_emitted, 1);
//! assert_eq!(output, b"[WhiteElo \"2000\"]\n[BlackElo \"1900\"]\n\n");
//! ```

mod boundary;
mod codec;
mod config;
mod error;
mod fields;
mod observer;
mod pipeline;
mod reassembler;
mod source;
mod writer;

pub use boundary::{BoundaryMode, BoundaryState, Record, RecordBoundaryDetector};
pub use codec::{
    Bzip2Decoder, ChunkDecoder, Codec, GzipDecoder, IdentityDecoder, ZstdDecoder,
};
pub use config::{default_tags, IngestLimits, PipelineConfig, TagKind, TagSpec};
pub use error::{DecodeError, FieldParseWarning, PipelineError};
pub use fields::{FieldExtractor, FieldTable, FieldValue};
pub use observer::{LogProgress, ProgressObserver};
pub use pipeline::{CancelFlag, Completion, Pipeline, RunReport, RunStats, RunStatus};
pub use reassembler::{Line, LineReassembler};
pub use source::{ChunkIter, ChunkSource, ReaderSource, CHUNK_SIZE_BYTES};
pub use writer::{AcceptAll, BoundedWriter, MinRating, RecordPredicate, WriterAction};

#[cfg(feature = "tokio")]
pub use source::AsyncReaderSource;
