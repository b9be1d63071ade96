//! Recursive character splitting and chunk tagging.
//!
//! Text is cut on the coarsest separator that occurs in it (paragraphs, then
//! lines, then words, then characters), pieces that are still too large are
//! cut again with the finer separators, and small neighbouring pieces are
//! merged back into windows of at most `chunk_size` characters that share up
//! to `chunk_overlap` characters with the previous window.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{DocQaError, Result};
use crate::loader::Segment;

pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Positional metadata stamped on every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_path: String,
    /// Index of the loaded segment (page) the chunk came from.
    pub page: usize,
    /// Index of the chunk across the whole file.
    pub chunk: usize,
    /// `file_path:page:chunk`
    pub id: String,
    /// Loader metadata carried over from the segment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

pub fn chunk_id(file_path: &str, page: usize, chunk: usize) -> String {
    format!("{}:{}:{}", file_path, page, chunk)
}

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split keeping each separator at the start of the piece that follows it.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces.into_iter().filter(|p| !p.is_empty()).collect()
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(DocQaError::config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split raw text into trimmed, overlapping windows.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, DEFAULT_SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();
        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small));
                small.clear();
            }
            if finer.is_empty() {
                let piece = piece.trim();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge(&small));
        }
        chunks
    }

    /// Greedily pack pieces into windows, keeping a tail of at most
    /// `chunk_overlap` characters when a window is emitted.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !current.is_empty() {
                if total > self.chunk_size {
                    tracing::warn!(
                        size = total,
                        limit = self.chunk_size,
                        "created a chunk larger than the configured size"
                    );
                }
                push_window(&mut windows, &current);
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            current.push_back(piece);
            total += len;
        }
        push_window(&mut windows, &current);
        windows
    }

    /// Split loaded segments of one file into tagged chunks.
    ///
    /// `page` is the segment index; `chunk` counts across the whole file, so
    /// ids are unique within one run.
    pub fn split_segments(&self, file_path: &str, segments: &[Segment]) -> Vec<Chunk> {
        tracing::info!(file_path, segments = segments.len(), "splitting documents");
        let mut chunks = Vec::new();
        for (page, segment) in segments.iter().enumerate() {
            for content in self.split_text(&segment.content) {
                let chunk = chunks.len();
                chunks.push(Chunk {
                    content,
                    metadata: ChunkMetadata {
                        file_path: file_path.to_string(),
                        page,
                        chunk,
                        id: chunk_id(file_path, page, chunk),
                        extra: segment.metadata.clone(),
                    },
                });
            }
        }
        tracing::info!(file_path, chunks = chunks.len(), "split into chunks");
        chunks
    }
}

fn push_window(windows: &mut Vec<String>, current: &VecDeque<&str>) {
    let joined: String = current.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        windows.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::Path;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_short_text_single_chunk() {
        let splitter = RecursiveSplitter::new(100, 20).unwrap();
        assert_eq!(splitter.split_text("  Hello world \n"), vec!["Hello world"]);
    }

    #[test]
    fn test_minimal_text_is_idempotent() {
        let splitter = RecursiveSplitter::new(200, 20).unwrap();
        let text = "First paragraph.\n\nSecond paragraph with a few more words.";
        let once = splitter.split_text(text);
        assert_eq!(once, vec![text.to_string()]);
        let twice: Vec<String> = once.iter().flat_map(|c| splitter.split_text(c)).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_windows_respect_size_and_overlap() {
        let splitter = RecursiveSplitter::new(60, 20).unwrap();
        let text = words(80);
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 3);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 60, "chunk too long: {chunk:?}");
        }
        // Consecutive windows share their boundary words.
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(pair[1].contains(last_word), "{:?} / {:?}", pair[0], pair[1]);
        }
        // Nothing is lost.
        for i in 0..80 {
            let w = format!("word{i}");
            assert!(chunks.iter().any(|c| c.split(' ').any(|t| t == w)), "{w} missing");
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let splitter = RecursiveSplitter::new(40, 0).unwrap();
        let text = "alpha beta gamma delta\n\nepsilon zeta eta theta\n\niota kappa";
        let chunks = splitter.split_text(text);
        assert_eq!(
            chunks,
            vec!["alpha beta gamma delta", "epsilon zeta eta theta\n\niota kappa"]
        );
    }

    #[test]
    fn test_unbroken_text_falls_back_to_characters() {
        let splitter = RecursiveSplitter::new(10, 2).unwrap();
        let chunks = splitter.split_text(&"x".repeat(25));
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| char_len(c) <= 10));
    }

    #[test]
    fn test_multibyte_text() {
        let splitter = RecursiveSplitter::new(5, 1).unwrap();
        let chunks = splitter.split_text("héllo wörld ñandú");
        assert!(chunks.iter().all(|c| char_len(c) <= 5));
        assert!(chunks.contains(&"héllo".to_string()));
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        assert!(matches!(
            RecursiveSplitter::new(10, 10),
            Err(DocQaError::Config(_))
        ));
    }

    #[test]
    fn test_split_segments_stamps_ids() {
        let splitter = RecursiveSplitter::new(30, 5).unwrap();
        let path = Path::new("uploads/c1/doc.pdf");
        let segments = vec![
            Segment::new(words(12), path),
            Segment::new("short page", path).with_meta("page_number", 2),
        ];
        let chunks = splitter.split_segments("uploads/c1/doc.pdf", &segments);

        assert!(chunks.len() >= 3);
        let last = chunks.last().unwrap();
        assert_eq!(last.metadata.page, 1);
        assert_eq!(last.metadata.chunk, chunks.len() - 1);
        assert_eq!(
            last.metadata.id,
            format!("uploads/c1/doc.pdf:1:{}", chunks.len() - 1)
        );
        assert_eq!(last.metadata.extra.get("page_number").map(String::as_str), Some("2"));

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk, i);
            assert_eq!(chunk.metadata.file_path, "uploads/c1/doc.pdf");
        }
        let ids: HashSet<_> = chunks.iter().map(|c| c.metadata.id.clone()).collect();
        assert_eq!(ids.len(), chunks.len());
    }
}
