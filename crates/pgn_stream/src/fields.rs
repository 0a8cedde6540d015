use std::collections::BTreeMap;

use crate::boundary::Record;
use crate::config::{TagKind, TagSpec};
use crate::error::FieldParseWarning;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
}

/// Values of the recognized tags found in one record.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FieldTable {
    values: BTreeMap<String, FieldValue>,
    warnings: Vec<FieldParseWarning>,
}

impl FieldTable {
    pub fn get(&self, tag: &str) -> Option<&FieldValue> {
        self.values.get(tag)
    }

    pub fn text(&self, tag: &str) -> Option<&str> {
        match self.values.get(tag)? {
            FieldValue::Text(text) => Some(text),
            FieldValue::Integer(_) => None,
        }
    }

    /// Integer value of `tag`; `0` when missing or unparseable.
    pub fn integer(&self, tag: &str) -> i64 {
        match self.values.get(tag) {
            Some(FieldValue::Integer(value)) => *value,
            _ => 0,
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.values.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn warnings(&self) -> &[FieldParseWarning] {
        &self.warnings
    }

    fn insert(&mut self, tag: &str, value: FieldValue) {
        self.values.insert(tag.to_string(), value);
    }
}

struct Matcher {
    name: String,
    prefix: Vec<u8>,
    kind: TagKind,
}

/// Pulls `[Tag "value"]` fields out of record lines.
pub struct FieldExtractor {
    matchers: Vec<Matcher>,
}

impl FieldExtractor {
    pub fn new(tags: &[TagSpec]) -> Self {
        let matchers = tags
            .iter()
            .map(|tag| Matcher {
                name: tag.name.clone(),
                prefix: format!("[{} \"", tag.name).into_bytes(),
                kind: tag.kind,
            })
            .collect();
        Self { matchers }
    }

    pub fn extract(&self, record: &Record) -> FieldTable {
        let mut table = FieldTable::default();
        for line in record.lines() {
            let bytes = line.as_bytes();
            let Some(matcher) = self.matchers.iter().find(|m| bytes.starts_with(&m.prefix)) else {
                continue;
            };
            let raw = quoted_value(&bytes[matcher.prefix.len()..]);
            let raw = String::from_utf8_lossy(raw);
            let value = match matcher.kind {
                TagKind::Text => FieldValue::Text(raw.into_owned()),
                TagKind::Integer => match raw.trim().parse::<i64>().ok() {
                    Some(value) => FieldValue::Integer(value),
                    None => {
                        table.warnings.push(FieldParseWarning {
                            tag: matcher.name.clone(),
                            raw: raw.into_owned(),
                            line_number: line.line_number,
                        });
                        FieldValue::Integer(0)
                    }
                },
            };
            // Repeated tags overwrite: the last occurrence wins.
            table.insert(&matcher.name, value);
        }
        table
    }
}

/// Text up to the closing quote, or the rest of the line when unclosed.
fn quoted_value(after_prefix: &[u8]) -> &[u8] {
    match after_prefix.iter().position(|b| *b == b'"') {
        Some(end) => &after_prefix[..end],
        None => after_prefix,
    }
}
