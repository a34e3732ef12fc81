use crate::chunking::chunk_documents;
use crate::composer::{AnswerComposer, FALLBACK_ANSWER};
use crate::config::PipelineConfig;
use crate::embeddings::Embedder;
use crate::error::{ConfigError, LoadError, PipelineError, Result, ServiceError};
use crate::loader::{DocumentLoader, SkippedFile};
use crate::models::{ChunkMetadata, IndexMode, ScoredChunk, UploadedFile, VectorRecord};
use crate::retriever::Retriever;
use crate::traits::{ChatModel, VectorIndex};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

pub const NOT_PROCESSED_WARNING: &str = "Please upload and process documents first.";

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReport {
    pub documents: usize,
    pub chunks: usize,
    pub indexed: usize,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Nothing has been processed yet; the model was not consulted.
    NotProcessed,
    Answer {
        text: String,
        grounded: bool,
        sources: Vec<ScoredChunk>,
    },
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::NotProcessed => NOT_PROCESSED_WARNING,
            Reply::Answer { text, .. } => text,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// One user's documents, index and model handles.
///
/// Every operation goes through an owned session, so independent sessions never
/// share index state.
pub struct Session {
    config: PipelineConfig,
    loader: DocumentLoader,
    embedder: Arc<dyn Embedder>,
    index: Box<dyn VectorIndex>,
    composer: Option<AnswerComposer>,
}

impl Session {
    pub fn new(
        config: PipelineConfig,
        embedder: Arc<dyn Embedder>,
        index: Box<dyn VectorIndex>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            loader: DocumentLoader::new(config.upload_dir.clone()),
            config,
            embedder,
            index,
            composer: None,
        })
    }

    pub fn with_chat_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.composer = Some(AnswerComposer::new(model));
        self
    }

    pub fn with_loader(mut self, loader: DocumentLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    /// Load, chunk, embed and index `files`, then persist the index.
    ///
    /// When no file yields a document the current index is left as it was.
    pub async fn process(
        &mut self,
        files: &[UploadedFile],
        mode: IndexMode,
    ) -> Result<ProcessReport> {
        let report = self.loader.load_best_effort(files)?;
        if report.documents.is_empty() {
            return Err(LoadError::NothingLoaded {
                skipped: report.skipped.len(),
            }
            .into());
        }

        let chunks = chunk_documents(&report.documents, self.config.chunking);
        let texts = chunks
            .iter()
            .map(|chunk| chunk.text.clone())
            .collect::<Vec<_>>();
        let embeddings = self.embedder.embed_many(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(ServiceError::Malformed {
                service: "embeddings".to_string(),
                details: format!(
                    "embedding count {} doesn't match chunk count {}",
                    embeddings.len(),
                    chunks.len()
                ),
            }
            .into());
        }

        let records = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorRecord {
                embedding,
                metadata: ChunkMetadata::from(&chunk),
                chunk_text: chunk.text,
            })
            .collect::<Vec<_>>();
        let chunk_count = records.len();

        let model = self.embedder.model().to_string();
        match mode {
            IndexMode::Rebuild => self.index.rebuild(&model, records)?,
            IndexMode::Append => self.index.add(&model, records)?,
        }
        self.index.persist()?;

        info!(
            documents = report.documents.len(),
            chunks = chunk_count,
            indexed = self.index.len(),
            skipped = report.skipped.len(),
            ?mode,
            "processed documents"
        );

        Ok(ProcessReport {
            documents: report.documents.len(),
            chunks: chunk_count,
            indexed: self.index.len(),
            skipped: report.skipped,
        })
    }

    pub async fn ask(&self, question: &str) -> Result<Reply> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }

        if self.index.is_empty() {
            warn!("question asked before any documents were processed");
            return Ok(Reply::NotProcessed);
        }

        let composer = self.composer.as_ref().ok_or(ConfigError::Missing {
            setting: "chat model",
            hint: "--chat-api-key or GROQ_API_KEY",
        })?;

        let retriever = Retriever::new(
            self.embedder.as_ref(),
            self.index.as_ref(),
            self.config.top_k,
        );
        let sources = retriever.retrieve_scored(question).await?;
        let chunks = sources
            .iter()
            .map(|hit| hit.chunk_text.clone())
            .collect::<Vec<_>>();

        let text = composer.compose(question, &chunks).await?;
        let grounded = text.trim() != FALLBACK_ANSWER;

        Ok(Reply::Answer {
            text,
            grounded,
            sources,
        })
    }
}
