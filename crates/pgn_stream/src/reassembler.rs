use std::borrow::Cow;

use crate::error::PipelineError;

/// One complete line of decoded text, without its terminator.
///
/// Bytes are kept as decoded; a `\r` before the `\n` is dropped.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Line {
    pub line_number: u64,
    bytes: Vec<u8>,
}

impl Line {
    pub fn new(line_number: u64, bytes: impl Into<Vec<u8>>) -> Self {
        let mut bytes = bytes.into();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        Self { line_number, bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn is_blank(&self) -> bool {
        self.bytes.iter().all(|b| b.is_ascii_whitespace())
    }
}

/// Rebuilds complete lines from decoded fragments that ignore line boundaries.
#[derive(Debug)]
pub struct LineReassembler {
    pending: Vec<u8>,
    max_line_bytes: usize,
    line_number: u64,
}

impl LineReassembler {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line_bytes,
            line_number: 0,
        }
    }

    /// Bytes carried over from the previous fragment.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Lines emitted so far, including a flushed final line.
    pub fn lines_emitted(&self) -> u64 {
        self.line_number
    }

    pub fn push(&mut self, fragment: &[u8]) -> Result<Vec<Line>, PipelineError> {
        let mut lines = Vec::new();
        let mut rest = fragment;

        while let Some(idx) = rest.iter().position(|b| *b == b'\n') {
            let (head, tail) = rest.split_at(idx);
            self.check_len(self.pending.len() + head.len())?;
            let mut bytes = std::mem::take(&mut self.pending);
            bytes.extend_from_slice(head);
            lines.push(self.next_line(bytes));
            rest = &tail[1..];
        }

        self.check_len(self.pending.len() + rest.len())?;
        self.pending.extend_from_slice(rest);
        Ok(lines)
    }

    /// Emits the unterminated remainder at end of stream, if any.
    pub fn flush_end(&mut self) -> Option<Line> {
        if self.pending.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut self.pending);
        Some(self.next_line(bytes))
    }

    fn next_line(&mut self, bytes: Vec<u8>) -> Line {
        self.line_number += 1;
        Line::new(self.line_number, bytes)
    }

    fn check_len(&self, observed_bytes: usize) -> Result<(), PipelineError> {
        if observed_bytes > self.max_line_bytes {
            return Err(PipelineError::LineTooLong {
                line_number: self.line_number + 1,
                observed_bytes,
                max_line_bytes: self.max_line_bytes,
            });
        }
        Ok(())
    }
}
