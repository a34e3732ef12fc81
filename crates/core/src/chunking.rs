use crate::error::ConfigError;
use crate::models::{Chunk, Document};
use sha2::{Digest, Sha256};

pub const DEFAULT_CHUNK_SIZE: usize = 400;
pub const DEFAULT_CHUNK_OVERLAP: usize = 80;

/// Always valid: `chunk_size > 0` and `chunk_overlap < chunk_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ConfigError> {
        let config = Self {
            chunk_size,
            chunk_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidChunkConfig(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Shortest chunk a natural boundary may produce before the last one.
    fn min_chunk_chars(&self) -> usize {
        self.chunk_overlap + ((self.chunk_size - self.chunk_overlap) / 2).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub offset: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARIES: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

impl Boundary {
    /// True when a split between `chars[end - 1]` and `chars[end]` lands on this boundary.
    fn matches(self, chars: &[char], end: usize) -> bool {
        let last = chars[end - 1];
        match self {
            Boundary::Paragraph => last == '\n' && end >= 2 && chars[end - 2] == '\n',
            Boundary::Line => last == '\n',
            Boundary::Sentence => {
                last.is_whitespace() && end >= 2 && matches!(chars[end - 2], '.' | '!' | '?')
            }
            Boundary::Word => last.is_whitespace(),
        }
    }
}

/// Splits `text` into spans of at most `chunk_size` characters.
///
/// Every span after the first starts exactly `chunk_overlap` characters before
/// the end of the previous one, so dropping that prefix from each later span and
/// concatenating gives back `text`. Cut points prefer paragraph breaks, then line
/// breaks, then sentence ends, then whitespace, and fall back to a hard cut.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<TextSpan> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans = Vec::new();

    if chars.is_empty() {
        return spans;
    }

    let mut start = 0;
    loop {
        if chars.len() - start <= config.chunk_size {
            spans.push(span(&chars, start, chars.len()));
            break;
        }

        let end = find_cut(&chars, start, config);
        spans.push(span(&chars, start, end));
        start = end - config.chunk_overlap;
    }

    spans
}

fn find_cut(chars: &[char], start: usize, config: ChunkingConfig) -> usize {
    let limit = start + config.chunk_size;
    let floor = start + config.min_chunk_chars();

    BOUNDARIES
        .iter()
        .find_map(|boundary| {
            (floor..=limit)
                .rev()
                .find(|&end| boundary.matches(chars, end))
        })
        .unwrap_or(limit)
}

fn span(chars: &[char], start: usize, end: usize) -> TextSpan {
    TextSpan {
        offset: start,
        text: chars[start..end].iter().collect(),
    }
}

/// Chunks documents in order; chunk offsets are relative to each document.
pub fn chunk_documents(documents: &[Document], config: ChunkingConfig) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|document| {
            split_text(&document.text, config)
                .into_iter()
                .map(move |span| Chunk {
                    chunk_id: make_chunk_id(
                        &document.source_id,
                        document.page,
                        span.offset,
                        &span.text,
                    ),
                    source_id: document.source_id.clone(),
                    page: document.page,
                    offset: span.offset,
                    text: span.text,
                })
        })
        .collect()
}

fn make_chunk_id(source_id: &str, page: Option<u32>, offset: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update(page.unwrap_or(0).to_le_bytes());
    hasher.update((offset as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
