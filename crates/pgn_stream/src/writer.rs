use std::io::Write;

use crate::boundary::Record;
use crate::error::PipelineError;
use crate::fields::FieldTable;

/// Decides whether a record is written, from its extracted fields.
pub trait RecordPredicate {
    fn accept(&self, fields: &FieldTable) -> bool;
}

impl<F> RecordPredicate for F
where
    F: Fn(&FieldTable) -> bool,
{
    fn accept(&self, fields: &FieldTable) -> bool {
        self(fields)
    }
}

/// Accepts every record (plain extraction).
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl RecordPredicate for AcceptAll {
    fn accept(&self, _fields: &FieldTable) -> bool {
        true
    }
}

/// Both players rated at least `threshold`. Missing ratings read as 0.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MinRating {
    pub threshold: i64,
    pub white_tag: String,
    pub black_tag: String,
}

impl MinRating {
    pub fn new(threshold: i64) -> Self {
        Self {
            threshold,
            white_tag: "WhiteElo".to_string(),
            black_tag: "BlackElo".to_string(),
        }
    }
}

impl RecordPredicate for MinRating {
    fn accept(&self, fields: &FieldTable) -> bool {
        fields.integer(&self.white_tag) >= self.threshold
            && fields.integer(&self.black_tag) >= self.threshold
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum WriterAction {
    Accepted,
    Rejected,
    /// The record was written and the output quota is now met.
    QuotaReached,
}

/// Writes accepted records to the sink until the quota is met.
pub struct BoundedWriter<W: Write> {
    sink: W,
    predicate: Box<dyn RecordPredicate>,
    max_output_records: Option<u64>,
    emitted_count: u64,
    scanned_count: u64,
    /// Holds one record so the sink receives it in a single write.
    staging: Vec<u8>,
}

impl<W: Write> BoundedWriter<W> {
    pub fn new(
        sink: W,
        predicate: Box<dyn RecordPredicate>,
        max_output_records: Option<u64>,
    ) -> Self {
        Self {
            sink,
            predicate,
            max_output_records,
            emitted_count: 0,
            scanned_count: 0,
            staging: Vec::new(),
        }
    }

    pub fn emitted_count(&self) -> u64 {
        self.emitted_count
    }

    pub fn scanned_count(&self) -> u64 {
        self.scanned_count
    }

    pub fn accept_ratio(&self) -> f64 {
        if self.scanned_count == 0 {
            return 0.0;
        }
        self.emitted_count as f64 / self.scanned_count as f64
    }

    pub fn quota_reached(&self) -> bool {
        self.max_output_records
            .is_some_and(|max| self.emitted_count >= max)
    }

    pub fn consider(
        &mut self,
        record: &Record,
        fields: &FieldTable,
    ) -> Result<WriterAction, PipelineError> {
        if self.quota_reached() {
            return Ok(WriterAction::QuotaReached);
        }
        self.scanned_count += 1;
        if !self.predicate.accept(fields) {
            return Ok(WriterAction::Rejected);
        }

        self.staging.clear();
        for line in record.lines() {
            self.staging.extend_from_slice(line.as_bytes());
            self.staging.push(b'\n');
        }
        self.sink
            .write_all(&self.staging)
            .map_err(PipelineError::Sink)?;
        self.emitted_count += 1;

        if self.quota_reached() {
            Ok(WriterAction::QuotaReached)
        } else {
            Ok(WriterAction::Accepted)
        }
    }

    pub fn flush(&mut self) -> Result<(), PipelineError> {
        self.sink.flush().map_err(PipelineError::Sink)
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
