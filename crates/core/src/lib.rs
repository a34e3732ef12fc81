pub mod chunking;
pub mod composer;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod loader;
pub mod models;
pub mod retriever;
pub mod session;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_documents, split_text, ChunkingConfig, TextSpan};
pub use composer::{
    build_context, build_prompt, AnswerComposer, ANSWER_TEMPERATURE, FALLBACK_ANSWER,
};
pub use config::{ChatConfig, EmbeddingBackend, EmbeddingConfig, PipelineConfig};
pub use embeddings::{Embedder, HashedEmbedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{ConfigError, IndexError, LoadError, PipelineError, Result, ServiceError};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use llm::ChatCompletionsClient;
pub use loader::{
    discover_files, read_upload, sanitize_file_name, DocumentLoader, LoadReport, SkippedFile,
};
pub use models::{
    Chunk, ChunkMetadata, DocType, Document, IndexMode, ScoredChunk, UploadedFile, VectorRecord,
};
pub use retriever::{Retriever, DEFAULT_TOP_K};
pub use session::{ProcessReport, Reply, Session, NOT_PROCESSED_WARNING};
pub use stores::LocalVectorIndex;
pub use traits::{ChatModel, VectorIndex};
