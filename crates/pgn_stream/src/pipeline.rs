//! The pipeline driver.
//!
//! Pulls one chunk at a time and pushes it through decode, line reassembly,
//! boundary detection, field extraction and the bounded writer before the
//! next chunk is requested. A run ends when the source is exhausted, the
//! output quota is met, the cancel flag is raised, or an error occurs. The
//! sink is flushed in every case and keeps whatever was written.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::boundary::{Record, RecordBoundaryDetector};
use crate::codec::ChunkDecoder;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fields::FieldExtractor;
use crate::observer::ProgressObserver;
use crate::reassembler::{Line, LineReassembler};
use crate::source::ChunkSource;
use crate::writer::{BoundedWriter, RecordPredicate, WriterAction};

/// Aggregate counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub chunks_read: u64,
    pub bytes_read: u64,
    pub bytes_decoded: u64,
    pub lines: u64,
    pub records_scanned: u64,
    pub records_emitted: u64,
    pub field_warnings: u64,
}

impl RunStats {
    pub fn accept_ratio(&self) -> f64 {
        if self.records_scanned == 0 {
            return 0.0;
        }
        self.records_emitted as f64 / self.records_scanned as f64
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Completion {
    SourceExhausted,
    QuotaReached,
}

#[derive(Debug)]
pub enum RunStatus {
    Completed(Completion),
    Cancelled,
    Failed(PipelineError),
}

#[derive(Debug)]
pub struct RunReport {
    pub status: RunStatus,
    pub stats: RunStats,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Completed(_))
    }

    pub fn completion(&self) -> Option<Completion> {
        match self.status {
            RunStatus::Completed(completion) => Some(completion),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match &self.status {
            RunStatus::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Stops a run before its next chunk pull. Clones share one flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Flow {
    Continue,
    QuotaReached,
}

pub struct Pipeline<W: Write> {
    decoder: Box<dyn ChunkDecoder>,
    reassembler: LineReassembler,
    boundary: RecordBoundaryDetector,
    extractor: FieldExtractor,
    writer: BoundedWriter<W>,
    progress_interval: Option<u64>,
    observer: Option<Box<dyn ProgressObserver>>,
    cancel: CancelFlag,
    stats: RunStats,
}

impl<W: Write> Pipeline<W> {
    pub fn new(
        config: &PipelineConfig,
        decoder: Box<dyn ChunkDecoder>,
        predicate: Box<dyn RecordPredicate>,
        sink: W,
    ) -> Self {
        Self {
            decoder,
            reassembler: LineReassembler::new(config.limits.max_line_bytes),
            boundary: RecordBoundaryDetector::with_mode(config.boundary),
            extractor: FieldExtractor::new(&config.tags),
            writer: BoundedWriter::new(sink, predicate, config.max_output_records),
            progress_interval: config.progress_interval.filter(|every| *every > 0),
            observer: None,
            cancel: CancelFlag::default(),
            stats: RunStats::default(),
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs to completion and hands back the sink.
    pub fn run<S: ChunkSource>(mut self, source: &mut S) -> (RunReport, W) {
        debug!(codec = self.decoder.name(), "pipeline started");
        let status = match self.drive(source) {
            Ok(status) => status,
            Err(err) => RunStatus::Failed(err),
        };
        self.conclude(status)
    }

    fn drive<S: ChunkSource>(&mut self, source: &mut S) -> Result<RunStatus, PipelineError> {
        loop {
            if let Some(status) = self.stop_requested() {
                return Ok(status);
            }
            let Some(chunk) = source.next_chunk().map_err(PipelineError::Source)? else {
                break;
            };
            if self.process_chunk(chunk)? == Flow::QuotaReached {
                return Ok(RunStatus::Completed(Completion::QuotaReached));
            }
        }
        self.finish_stream()
    }

    fn stop_requested(&self) -> Option<RunStatus> {
        if self.writer.quota_reached() {
            return Some(RunStatus::Completed(Completion::QuotaReached));
        }
        if self.cancel.is_cancelled() {
            return Some(RunStatus::Cancelled);
        }
        None
    }

    fn process_chunk(&mut self, chunk: &[u8]) -> Result<Flow, PipelineError> {
        self.stats.chunks_read += 1;
        self.stats.bytes_read += chunk.len() as u64;
        let decoded = self
            .decoder
            .feed(chunk)
            .map_err(|source| PipelineError::CorruptStream {
                bytes_read: self.stats.bytes_read,
                source,
            })?;
        self.process_decoded(&decoded)
    }

    fn process_decoded(&mut self, decoded: &[u8]) -> Result<Flow, PipelineError> {
        self.stats.bytes_decoded += decoded.len() as u64;
        for line in self.reassembler.push(decoded)? {
            if self.process_line(line)? == Flow::QuotaReached {
                return Ok(Flow::QuotaReached);
            }
        }
        Ok(Flow::Continue)
    }

    fn process_line(&mut self, line: Line) -> Result<Flow, PipelineError> {
        self.stats.lines += 1;
        match self.boundary.step(line) {
            Some(record) => self.process_record(&record),
            None => Ok(Flow::Continue),
        }
    }

    fn process_record(&mut self, record: &Record) -> Result<Flow, PipelineError> {
        let fields = self.extractor.extract(record);
        for warning in fields.warnings() {
            warn!(
                record = record.ordinal,
                line_number = warning.line_number,
                tag = %warning.tag,
                raw = %warning.raw,
                "unparseable tag value; using 0"
            );
        }
        self.stats.field_warnings += fields.warnings().len() as u64;

        let action = self.writer.consider(record, &fields)?;
        self.stats.records_scanned = self.writer.scanned_count();
        self.stats.records_emitted = self.writer.emitted_count();

        if action == WriterAction::Rejected {
            return Ok(Flow::Continue);
        }
        self.notify_progress();
        match action {
            WriterAction::QuotaReached => Ok(Flow::QuotaReached),
            _ => Ok(Flow::Continue),
        }
    }

    fn notify_progress(&mut self) {
        let (Some(every), Some(observer)) = (self.progress_interval, self.observer.as_mut()) else {
            return;
        };
        if self.stats.records_emitted % every == 0 {
            observer.on_progress(&self.stats);
        }
    }

    /// End of source: drain the decoder, the pending line and the open record.
    fn finish_stream(&mut self) -> Result<RunStatus, PipelineError> {
        let tail = self
            .decoder
            .finish()
            .map_err(|source| PipelineError::CorruptStream {
                bytes_read: self.stats.bytes_read,
                source,
            })?;
        if self.process_decoded(&tail)? == Flow::QuotaReached {
            return Ok(RunStatus::Completed(Completion::QuotaReached));
        }
        if !tail.is_empty() {
            // A failure found while draining is reported after its output.
            self.decoder
                .finish()
                .map_err(|source| PipelineError::CorruptStream {
                    bytes_read: self.stats.bytes_read,
                    source,
                })?;
        }
        if let Some(line) = self.reassembler.flush_end() {
            if self.process_line(line)? == Flow::QuotaReached {
                return Ok(RunStatus::Completed(Completion::QuotaReached));
            }
        }
        if let Some(record) = self.boundary.finish() {
            if self.process_record(&record)? == Flow::QuotaReached {
                return Ok(RunStatus::Completed(Completion::QuotaReached));
            }
        }
        Ok(RunStatus::Completed(Completion::SourceExhausted))
    }

    fn conclude(mut self, status: RunStatus) -> (RunReport, W) {
        let flushed = self.writer.flush();
        let status = match (status, flushed) {
            (RunStatus::Failed(err), _) => RunStatus::Failed(err),
            (_, Err(err)) => RunStatus::Failed(err),
            (status, Ok(())) => status,
        };

        match &status {
            RunStatus::Completed(completion) => info!(
                ?completion,
                scanned = self.stats.records_scanned,
                emitted = self.stats.records_emitted,
                bytes_read = self.stats.bytes_read,
                "pipeline completed"
            ),
            RunStatus::Cancelled => info!(
                scanned = self.stats.records_scanned,
                emitted = self.stats.records_emitted,
                "pipeline cancelled"
            ),
            RunStatus::Failed(err) => warn!(
                error = %err,
                scanned = self.stats.records_scanned,
                emitted = self.stats.records_emitted,
                "pipeline failed; output written so far is kept"
            ),
        }

        let report = RunReport {
            status,
            stats: self.stats,
        };
        (report, self.writer.into_inner())
    }
}

#[cfg(feature = "tokio")]
mod tokio_pipeline {
    use std::io::Write;

    use tokio::io::AsyncRead;
    use tracing::debug;

    use super::{Completion, Flow, Pipeline, RunReport, RunStatus};
    use crate::error::PipelineError;
    use crate::source::AsyncReaderSource;

    impl<W: Write> Pipeline<W> {
        /// Same as [`Pipeline::run`], pulling chunks from an async reader.
        pub async fn run_async<R: AsyncRead + Unpin>(mut self, reader: R) -> (RunReport, W) {
            debug!(codec = self.decoder.name(), "async pipeline started");
            let mut source = AsyncReaderSource::new(reader);
            let status = match self.drive_async(&mut source).await {
                Ok(status) => status,
                Err(err) => RunStatus::Failed(err),
            };
            self.conclude(status)
        }

        async fn drive_async<R: AsyncRead + Unpin>(
            &mut self,
            source: &mut AsyncReaderSource<R>,
        ) -> Result<RunStatus, PipelineError> {
            loop {
                if let Some(status) = self.stop_requested() {
                    return Ok(status);
                }
                let Some(chunk) = source.next_chunk().await.map_err(PipelineError::Source)? else {
                    break;
                };
                if self.process_chunk(chunk)? == Flow::QuotaReached {
                    return Ok(RunStatus::Completed(Completion::QuotaReached));
                }
            }
            self.finish_stream()
        }
    }
}
