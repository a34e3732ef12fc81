use crate::embeddings::Embedder;
use crate::error::{IndexError, Result};
use crate::models::ScoredChunk;
use crate::traits::VectorIndex;
use tracing::debug;

pub const DEFAULT_TOP_K: usize = 3;

/// Fixed top-k similarity search over an index.
pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
    index: &'a dyn VectorIndex,
    top_k: usize,
}

impl<'a> Retriever<'a> {
    pub fn new(embedder: &'a dyn Embedder, index: &'a dyn VectorIndex, top_k: usize) -> Self {
        Self {
            embedder,
            index,
            top_k,
        }
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<String>> {
        Ok(self
            .retrieve_scored(query)
            .await?
            .into_iter()
            .map(|hit| hit.chunk_text)
            .collect())
    }

    /// An empty index short-circuits to no hits without embedding the query.
    pub async fn retrieve_scored(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        if self.index.is_empty() {
            debug!("index is empty, nothing to retrieve");
            return Ok(Vec::new());
        }

        if let Some(indexed) = self.index.embedding_model() {
            if indexed != self.embedder.model() {
                return Err(IndexError::ModelMismatch {
                    indexed: indexed.to_string(),
                    configured: self.embedder.model().to_string(),
                }
                .into());
            }
        }

        let vector = self.embedder.embed(query).await?;
        let hits = self.index.query(&vector, self.top_k)?;
        debug!(top_k = self.top_k, hits = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}
