use crate::segment::{LyricSegment, LITERAL_FENCE};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SEGMENT_SEPARATOR: u8 = b'/';

#[derive(thiserror::Error, Debug)]
pub enum LyricsError {
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    pub index: usize,
    /// Empty for a blank line.
    pub segments: Vec<LyricSegment>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LyricDocument {
    pub lines: Vec<LyricLine>,
}

impl LyricDocument {
    pub fn from_path(path: &Path) -> Result<Self, LyricsError> {
        let text = std::fs::read_to_string(path).map_err(|e| LyricsError::Io(e.to_string()))?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let lines = text
            .lines()
            .enumerate()
            .map(|(index, raw)| {
                let trimmed = raw.trim();
                let segments = if trimmed.is_empty() {
                    Vec::new()
                } else {
                    split_line(trimmed)
                        .into_iter()
                        .enumerate()
                        .map(|(pos, token)| LyricSegment::parse(token, index, pos))
                        .collect()
                };
                LyricLine { index, segments }
            })
            .collect();
        Self { lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.lines.iter().map(|line| line.segments.len()).sum()
    }

    pub fn line(&self, index: usize) -> Option<&LyricLine> {
        self.lines.get(index)
    }
}

/// Splits a line on `/`, except inside a closed ```` ``` ```` literal.
///
/// A literal left open at the end of the line is treated as plain text.
pub fn split_line(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let fence = LITERAL_FENCE.as_bytes();
    let mut tokens = Vec::new();
    let mut in_literal = false;
    let mut token_start = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        if bytes[idx..].starts_with(fence) {
            in_literal = !in_literal;
            idx += fence.len();
            continue;
        }
        if bytes[idx] == SEGMENT_SEPARATOR && !in_literal {
            tokens.push(&line[token_start..idx]);
            token_start = idx + 1;
        }
        idx += 1;
    }

    if in_literal {
        return line.split(SEGMENT_SEPARATOR as char).collect();
    }
    tokens.push(&line[token_start..]);
    tokens
}
