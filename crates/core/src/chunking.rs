use crate::error::IngestError;
use crate::models::{Chunk, Document};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DEFAULT_CHUNK_MAX_CHARS: usize = 300;
pub const DEFAULT_CHUNK_OVERLAP_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_CHUNK_MAX_CHARS,
            overlap_chars: DEFAULT_CHUNK_OVERLAP_CHARS,
        }
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits page text into windows of at most `max_chars` characters where
/// consecutive windows of a page share exactly `overlap_chars` characters.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl Chunker {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, IngestError> {
        if max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be positive".to_string(),
            ));
        }
        if overlap_chars >= max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap_chars ({overlap_chars}) must be smaller than max_chars ({max_chars})"
            )));
        }

        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }

    pub fn from_config(config: ChunkingConfig) -> Result<Self, IngestError> {
        Self::new(config.max_chars, config.overlap_chars)
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let normalized = normalize_whitespace(text);
        let chars: Vec<char> = normalized.chars().collect();

        let mut pieces = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let hard_end = (start + self.max_chars).min(chars.len());
            let end = if hard_end == chars.len() {
                hard_end
            } else {
                self.window_end(&chars, start, hard_end)
            };

            pieces.push(chars[start..end].iter().collect::<String>());
            if end == chars.len() {
                break;
            }

            start = end - self.overlap_chars;
            if self.overlap_chars == 0 {
                while start < chars.len() && chars[start].is_whitespace() {
                    start += 1;
                }
            }
        }

        pieces
    }

    // Prefer cutting just before a space; the cut must stay past the overlap so the next window advances.
    fn window_end(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let floor = start + self.overlap_chars;
        (floor + 1..=hard_end)
            .rev()
            .find(|&position| chars[position].is_whitespace())
            .unwrap_or(hard_end)
    }

    /// Chunks every page of every document, numbering chunks globally in input order.
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut cursor = 0u64;

        for document in documents {
            let fingerprint = &document.fingerprint;
            for page in &document.pages {
                for text in self.split_text(&page.text) {
                    chunks.push(Chunk {
                        chunk_id: make_chunk_id(&fingerprint.document_id, page.number, cursor, &text),
                        document_id: fingerprint.document_id.clone(),
                        source_path: fingerprint.source_path.clone(),
                        page: page.number,
                        chunk_index: cursor,
                        text,
                    });
                    cursor = cursor.saturating_add(1);
                }
            }
        }

        chunks
    }
}

fn make_chunk_id(document_id: &str, page: u32, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(page.to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentFingerprint, PageText};

    const SAMPLE: &str = "Soldiers receive a monthly allowance that is paid on the tenth day. \
        Self development support covers language courses, certificates and online lectures. \
        Credits earned during service can be transferred to a university after discharge. \
        Leave requests are filed with the unit office at least three days in advance.";

    fn document(id: &str, pages: &[&str]) -> Document {
        Document {
            fingerprint: DocumentFingerprint {
                document_id: id.to_string(),
                document_title: format!("{id}.txt"),
                source_path: format!("/tmp/{id}.txt"),
                checksum: "checksum".to_string(),
                loaded_at: chrono::Utc::now(),
            },
            pages: pages
                .iter()
                .enumerate()
                .map(|(index, text)| PageText {
                    number: index as u32 + 1,
                    text: text.to_string(),
                })
                .collect(),
        }
    }

    fn tail(text: &str, count: usize) -> String {
        let chars: Vec<char> = text.chars().collect();
        chars[chars.len() - count..].iter().collect()
    }

    fn head(text: &str, count: usize) -> String {
        text.chars().take(count).collect()
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");
    }

    #[test]
    fn degenerate_config_is_rejected_at_construction() {
        assert!(matches!(
            Chunker::new(30, 30),
            Err(IngestError::InvalidChunkConfig(_))
        ));
        assert!(matches!(
            Chunker::new(30, 45),
            Err(IngestError::InvalidChunkConfig(_))
        ));
        assert!(matches!(
            Chunker::new(0, 0),
            Err(IngestError::InvalidChunkConfig(_))
        ));
        assert!(Chunker::new(31, 30).is_ok());
    }

    #[test]
    fn chunks_respect_max_length_and_share_exact_overlap() {
        for (max_chars, overlap_chars) in [(300, 30), (40, 10), (25, 24), (16, 0), (7, 3), (1, 0)] {
            let chunker = Chunker::new(max_chars, overlap_chars).expect("valid config");
            let pieces = chunker.split_text(SAMPLE);

            assert!(pieces.len() > 1 || max_chars >= SAMPLE.len());
            for piece in &pieces {
                assert!(piece.chars().count() <= max_chars, "{piece:?} > {max_chars}");
            }
            for pair in pieces.windows(2) {
                assert_eq!(
                    tail(&pair[0], overlap_chars),
                    head(&pair[1], overlap_chars),
                    "overlap mismatch for max={max_chars} overlap={overlap_chars}"
                );
            }
        }
    }

    #[test]
    fn chunks_cover_the_whole_page() {
        let chunker = Chunker::new(50, 10).expect("valid config");
        let pieces = chunker.split_text(SAMPLE);
        let normalized = normalize_whitespace(SAMPLE);

        assert_eq!(head(&normalized, 20), head(&pieces[0], 20));
        assert!(normalized.ends_with(pieces.last().map(String::as_str).unwrap_or_default()));
    }

    #[test]
    fn window_prefers_whitespace_boundaries() {
        let chunker = Chunker::new(12, 2).expect("valid config");
        let pieces = chunker.split_text("alpha beta gamma delta");

        assert_eq!(pieces[0], "alpha beta");
        assert!(pieces.iter().all(|piece| piece.chars().count() <= 12));
    }

    #[test]
    fn short_page_is_single_chunk_and_blank_page_is_none() {
        let chunker = Chunker::new(300, 30).expect("valid config");
        assert_eq!(
            chunker.split_text("The allowance is 500 units."),
            vec!["The allowance is 500 units.".to_string()]
        );
        assert!(chunker.split_text("   \n ").is_empty());
    }

    #[test]
    fn chunks_never_span_pages_or_documents() {
        let chunker = Chunker::new(20, 5).expect("valid config");
        let documents = vec![
            document("doc-a", &["first page text here", "second page"]),
            document("doc-b", &["other document"]),
        ];

        let chunks = chunker.chunk_documents(&documents);

        let indices: Vec<u64> = chunks.iter().map(|chunk| chunk.chunk_index).collect();
        assert_eq!(indices, (0..chunks.len() as u64).collect::<Vec<_>>());
        assert!(chunks
            .iter()
            .any(|chunk| chunk.document_id == "doc-a" && chunk.page == 2 && chunk.text == "second page"));
        assert!(chunks
            .iter()
            .any(|chunk| chunk.document_id == "doc-b" && chunk.text == "other document"));
        assert!(chunks.iter().all(|chunk| !chunk.text.contains("here second")));
    }

    #[test]
    fn chunk_ids_are_deterministic() {
        let chunker = Chunker::new(20, 5).expect("valid config");
        let documents = vec![document("doc-a", &[SAMPLE])];

        let first = chunker.chunk_documents(&documents);
        let second = chunker.chunk_documents(&documents);
        assert_eq!(first, second);
    }
}
