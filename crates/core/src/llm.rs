use crate::error::ServiceError;
use crate::traits::ChatModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_CHAT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_CHAT_MODEL: &str = "llama-3.1-8b-instant";
const SERVICE: &str = "chat-completions";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint (Groq by default).
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatCompletionsClient {
    pub fn new(base_url: &str, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ChatModel for ChatCompletionsClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, ServiceError> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "chat completion");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                temperature,
                messages: [ChatMessage {
                    role: "user",
                    content: prompt,
                }],
            })
            .send()
            .await
            .map_err(|source| ServiceError::Http {
                service: SERVICE.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(ServiceError::BackendResponse {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                details,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|error| ServiceError::Malformed {
            service: SERVICE.to_string(),
            details: error.to_string(),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ServiceError::Malformed {
                service: SERVICE.to_string(),
                details: "response had no message content".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn sends_prompt_at_requested_temperature_and_returns_content() -> Result<(), ServiceError>
    {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/openai/v1/chat/completions")
            .match_header("authorization", "Bearer groq-key")
            .match_body(Matcher::PartialJson(json!({
                "model": "llama-3.1-8b-instant",
                "temperature": 0.0,
                "messages": [{"role": "user", "content": "What color is the sky?"}],
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{"message": {"role": "assistant", "content": "  Blue.\n"}}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ChatCompletionsClient::new(
            &format!("{}/openai/v1", server.url()),
            DEFAULT_CHAT_MODEL,
            "groq-key",
        );
        let answer = client.complete("What color is the sky?", 0.0).await?;

        mock.assert_async().await;
        assert_eq!(answer, "  Blue.\n");
        Ok(())
    }

    #[tokio::test]
    async fn auth_failures_are_service_errors() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"invalid api key"}}"#)
            .create_async()
            .await;

        let client = ChatCompletionsClient::new(&server.url(), "model", "wrong");
        let error = client.complete("prompt", 0.0).await.unwrap_err();

        assert!(matches!(error, ServiceError::BackendResponse { status: 401, .. }));
    }

    #[tokio::test]
    async fn empty_choices_are_malformed() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"choices": []}).to_string())
            .create_async()
            .await;

        let client = ChatCompletionsClient::new(&server.url(), "model", "key");
        let error = client.complete("prompt", 0.0).await.unwrap_err();

        assert!(matches!(error, ServiceError::Malformed { .. }));
    }
}
