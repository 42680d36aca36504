use crate::error::IngestError;
use crate::models::{Chunk, Document};

/// Separator cascade from coarse to fine. A chunk boundary prefers the
/// coarsest separator found inside the window; a hard character cut is the
/// last resort.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ".", " "];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {overlap} must be smaller than chunk_size {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 600,
            overlap: 50,
        }
    }
}

/// Splits text into overlapping windows of at most `chunk_size` characters.
///
/// Every chunk is an exact substring of the input and consecutive chunks
/// overlap by exactly `config.overlap` characters, so the input can be
/// reconstructed from the chunk sequence. Whitespace-only input yields no
/// chunks; input shorter than `chunk_size` yields a single chunk.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= config.chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let window_end = (start + config.chunk_size).min(chars.len());
        if window_end == chars.len() {
            chunks.push(chars[start..].iter().collect());
            break;
        }

        let cut = find_cut(&chars, start, window_end, config.overlap);
        chunks.push(chars[start..cut].iter().collect());
        start = cut - config.overlap;
    }

    chunks
}

/// Finds the boundary for the chunk starting at `start`, trying each
/// separator in cascade order within `chars[start..window_end]`. A cut must
/// land past the overlap region so the next chunk always makes progress.
fn find_cut(chars: &[char], start: usize, window_end: usize, overlap: usize) -> usize {
    let window: String = chars[start..window_end].iter().collect();

    for separator in SEPARATORS {
        if let Some(byte_pos) = window.rfind(separator) {
            let cut = start + window[..byte_pos + separator.len()].chars().count();
            if cut > start + overlap {
                return cut;
            }
        }
    }

    window_end
}

/// Chunks one document, numbering chunks in order. Chunks never cross
/// document boundaries.
pub fn split_document(document: &Document, config: ChunkingConfig) -> Vec<Chunk> {
    split_text(&document.text, config)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            text,
            source: document.source.clone(),
            sequence_no: index as u64,
            kind: document.kind,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut text = String::new();
        for (index, chunk) in chunks.iter().enumerate() {
            if index == 0 {
                text.push_str(chunk);
            } else {
                text.extend(chunk.chars().skip(overlap));
            }
        }
        text
    }

    #[test]
    fn short_document_yields_single_chunk() {
        let config = ChunkingConfig::new(600, 50).unwrap();
        let chunks = split_text("a short note", config);
        assert_eq!(chunks, vec!["a short note".to_string()]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let config = ChunkingConfig::default();
        assert!(split_text("", config).is_empty());
        assert!(split_text("   \n\n  ", config).is_empty());
    }

    #[test]
    fn chunks_respect_size_bound() {
        let config = ChunkingConfig::new(40, 10).unwrap();
        let text = "one two three four five six seven eight nine ten eleven twelve \
                    thirteen fourteen fifteen sixteen seventeen";
        for chunk in split_text(text, config) {
            assert!(chunk.chars().count() <= 40);
        }
    }

    #[test]
    fn round_trip_reconstructs_input_exactly() {
        let text = "First paragraph with some text.\n\nSecond paragraph is here. \
                    It has two sentences.\nA third line follows with more words \
                    than fit in one window, so splitting is forced somewhere.";
        for (chunk_size, overlap) in [(30, 0), (40, 10), (55, 20), (200, 50)] {
            let config = ChunkingConfig::new(chunk_size, overlap).unwrap();
            let chunks = split_text(text, config);
            assert_eq!(reconstruct(&chunks, overlap), text, "size={chunk_size}");
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let config = ChunkingConfig::new(40, 12).unwrap();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let chunks = split_text(text, config);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail: String = pair[0]
                .chars()
                .skip(pair[0].chars().count() - 12)
                .collect();
            let head: String = pair[1].chars().take(12).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn paragraph_break_preferred_over_space() {
        let config = ChunkingConfig::new(30, 0).unwrap();
        let text = "short first part\n\nthe rest of the document continues here";
        let chunks = split_text(text, config);
        assert!(chunks[0].ends_with("\n\n"), "chunk was {:?}", chunks[0]);
    }

    #[test]
    fn invalid_overlap_is_rejected() {
        assert!(ChunkingConfig::new(100, 100).is_err());
        assert!(ChunkingConfig::new(0, 0).is_err());
    }

    #[test]
    fn document_chunks_keep_source_and_order() {
        let document = Document {
            text: "one two three four five six seven eight nine ten".to_string(),
            source: "https://example.com/about".to_string(),
            kind: SourceKind::Web,
        };
        let config = ChunkingConfig::new(20, 5).unwrap();
        let chunks = split_document(&document, config);
        assert!(chunks.len() > 1);
        for (index, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_no, index as u64);
            assert_eq!(chunk.source, document.source);
            assert_eq!(chunk.kind, SourceKind::Web);
        }
    }
}
