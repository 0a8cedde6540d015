use serde::Deserialize;

use crate::reassembler::Line;

/// One game's lines, closed by a blank line or by end of stream.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Record {
    /// 1-based position of the record in the stream.
    pub ordinal: u64,
    /// Whether a blank line closed the record. When set, that blank line is
    /// the last entry of `lines`.
    pub blank_terminated: bool,
    lines: Vec<Line>,
}

impl Record {
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<Line> {
        self.lines
    }

    /// First line number of the record within the decoded stream.
    pub fn first_line_number(&self) -> u64 {
        self.lines.first().map_or(0, |line| line.line_number)
    }
}

/// Which blank lines close a record.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryMode {
    /// Any blank line after at least one accumulated line.
    #[default]
    Blank,
    /// Only a blank line that follows move text. The blank line between a
    /// game's tag section and its moves stays inside the record.
    MoveText,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BoundaryState {
    Empty,
    Accumulating,
}

/// Groups lines into records at blank-line boundaries.
#[derive(Debug)]
pub struct RecordBoundaryDetector {
    mode: BoundaryMode,
    state: BoundaryState,
    lines: Vec<Line>,
    seen_move_text: bool,
    records_closed: u64,
}

impl Default for RecordBoundaryDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordBoundaryDetector {
    pub fn new() -> Self {
        Self::with_mode(BoundaryMode::default())
    }

    pub fn with_mode(mode: BoundaryMode) -> Self {
        Self {
            mode,
            state: BoundaryState::Empty,
            lines: Vec::new(),
            seen_move_text: false,
            records_closed: 0,
        }
    }

    pub fn state(&self) -> BoundaryState {
        self.state
    }

    pub fn step(&mut self, line: Line) -> Option<Record> {
        let blank = line.is_blank();
        match self.state {
            // Blank lines between games never open a record.
            BoundaryState::Empty if blank => None,
            BoundaryState::Empty => {
                self.observe(&line);
                self.lines.push(line);
                self.state = BoundaryState::Accumulating;
                None
            }
            BoundaryState::Accumulating => {
                self.observe(&line);
                self.lines.push(line);
                let closes = match self.mode {
                    BoundaryMode::Blank => blank,
                    BoundaryMode::MoveText => blank && self.seen_move_text,
                };
                closes.then(|| self.close(true))
            }
        }
    }

    /// Closes a record left open when the stream ended.
    pub fn finish(&mut self) -> Option<Record> {
        match self.state {
            BoundaryState::Empty => None,
            BoundaryState::Accumulating => Some(self.close(false)),
        }
    }

    fn observe(&mut self, line: &Line) {
        if !line.is_blank() && !is_tag_line(line) {
            self.seen_move_text = true;
        }
    }

    fn close(&mut self, blank_terminated: bool) -> Record {
        self.records_closed += 1;
        self.state = BoundaryState::Empty;
        self.seen_move_text = false;
        Record {
            ordinal: self.records_closed,
            blank_terminated,
            lines: std::mem::take(&mut self.lines),
        }
    }
}

fn is_tag_line(line: &Line) -> bool {
    line.as_bytes()
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'[')
}

#[cfg(test)]
pub(crate) fn record_from_lines(ordinal: u64, texts: &[&str]) -> Record {
    let lines: Vec<Line> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| Line::new(i as u64 + 1, text.as_bytes()))
        .collect();
    Record {
        ordinal,
        blank_terminated: lines.last().is_some_and(Line::is_blank),
        lines,
    }
}
