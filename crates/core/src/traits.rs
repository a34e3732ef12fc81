use crate::error::{IndexError, ServiceError};
use crate::models::{ScoredChunk, VectorRecord};
use async_trait::async_trait;

pub trait VectorIndex: Send + Sync {
    /// Replaces every record held by the index.
    fn rebuild(&mut self, embedding_model: &str, records: Vec<VectorRecord>)
        -> Result<(), IndexError>;

    /// Appends records; on an empty index this behaves like [`VectorIndex::rebuild`].
    fn add(&mut self, embedding_model: &str, records: Vec<VectorRecord>) -> Result<(), IndexError>;

    /// At most `k` records ordered by descending similarity. Empty when the index is.
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError>;

    fn persist(&self) -> Result<(), IndexError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn embedding_model(&self) -> Option<&str>;
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, ServiceError>;
}
