use serde::Deserialize;

use crate::boundary::BoundaryMode;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    #[default]
    Text,
    Integer,
}

/// A tag the field extractor recognizes, e.g. `WhiteElo` as an integer.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct TagSpec {
    pub name: String,
    #[serde(default)]
    pub kind: TagKind,
}

impl TagSpec {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TagKind::Text,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TagKind::Integer,
        }
    }
}

/// Tags extracted when no explicit set is configured.
pub fn default_tags() -> Vec<TagSpec> {
    vec![
        TagSpec::text("Event"),
        TagSpec::integer("WhiteElo"),
        TagSpec::integer("BlackElo"),
        TagSpec::text("TimeControl"),
        TagSpec::text("Result"),
    ]
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct IngestLimits {
    /// Longest line the reassembler will buffer before failing the run.
    pub max_line_bytes: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            // Lichess writes a whole game's move text on one line.
            max_line_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Stop after this many accepted records. `None` scans the whole source.
    pub max_output_records: Option<u64>,
    /// Notify the progress observer every N accepted records.
    pub progress_interval: Option<u64>,
    pub boundary: BoundaryMode,
    pub limits: IngestLimits,
    pub tags: Vec<TagSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_output_records: None,
            progress_interval: None,
            boundary: BoundaryMode::default(),
            limits: IngestLimits::default(),
            tags: default_tags(),
        }
    }
}

impl PipelineConfig {
    pub fn with_max_output_records(mut self, max: u64) -> Self {
        self.max_output_records = Some(max);
        self
    }

    pub fn with_progress_interval(mut self, every: u64) -> Self {
        self.progress_interval = Some(every);
        self
    }

    pub fn with_boundary(mut self, boundary: BoundaryMode) -> Self {
        self.boundary = boundary;
        self
    }
}
