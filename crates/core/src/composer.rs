use crate::error::ServiceError;
use crate::traits::ChatModel;
use std::sync::Arc;
use tracing::{debug, info};

/// Reserved answer for questions the retrieved context cannot support.
pub const FALLBACK_ANSWER: &str = "I don't know based on the given documents.";

/// Answers are decoded greedily so the same context and question reproduce the same text.
pub const ANSWER_TEMPERATURE: f32 = 0.0;

pub fn build_context(chunks: &[String]) -> String {
    chunks.join("\n")
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a document-based assistant.\n\
         Answer ONLY from the context below.\n\
         If the answer is not present, say:\n\
         \"{FALLBACK_ANSWER}\"\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question:\n\
         {question}\n"
    )
}

pub struct AnswerComposer {
    model: Arc<dyn ChatModel>,
}

impl AnswerComposer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &str {
        self.model.model()
    }

    /// Returns the model output verbatim, or [`FALLBACK_ANSWER`] without a model
    /// call when there is nothing to ground on.
    pub async fn compose(&self, question: &str, chunks: &[String]) -> Result<String, ServiceError> {
        if chunks.is_empty() {
            debug!("no retrieved context, answering with fallback");
            return Ok(FALLBACK_ANSWER.to_string());
        }

        let prompt = build_prompt(&build_context(chunks), question);
        let answer = self.model.complete(&prompt, ANSWER_TEMPERATURE).await?;

        info!(
            model = %self.model.model(),
            context_chunks = chunks.len(),
            grounded = answer.trim() != FALLBACK_ANSWER,
            "composed answer"
        );
        Ok(answer)
    }
}
