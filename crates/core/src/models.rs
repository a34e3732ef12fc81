use serde::{Deserialize, Serialize};

/// Raw upload as received from the caller: a display name and its bytes.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DocType {
    Pdf,
    Text,
}

impl DocType {
    /// `.pdf` (any case) selects PDF extraction, every other suffix is read as text.
    pub fn from_file_name(name: &str) -> Self {
        let is_pdf = std::path::Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            DocType::Pdf
        } else {
            DocType::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub source_id: String,
    pub text: String,
    pub doc_type: DocType,
    /// 1-based PDF page; `None` for text files.
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub source_id: String,
    pub page: Option<u32>,
    /// Character offset of the chunk within its source document.
    pub offset: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub chunk_id: String,
    pub source_id: String,
    pub page: Option<u32>,
    pub offset: usize,
}

impl From<&Chunk> for ChunkMetadata {
    fn from(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            source_id: chunk.source_id.clone(),
            page: chunk.page,
            offset: chunk.offset,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    pub embedding: Vec<f32>,
    pub chunk_text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk_text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

/// Whether processing replaces the active index or appends to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexMode {
    #[default]
    Rebuild,
    Append,
}
