use crate::chunking::ChunkingConfig;
use crate::embeddings::{
    Embedder, HashedEmbedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
};
use crate::error::ConfigError;
use crate::llm::{ChatCompletionsClient, DEFAULT_CHAT_BASE_URL, DEFAULT_CHAT_MODEL};
use crate::retriever::DEFAULT_TOP_K;
use crate::traits::ChatModel;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

pub const DEFAULT_UPLOAD_DIR: &str = "data";
pub const DEFAULT_INDEX_DIR: &str = "vector_db";

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub upload_dir: PathBuf,
    pub index_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub top_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            chunking: ChunkingConfig::default(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.validate()?;
        if self.top_k == 0 {
            return Err(ConfigError::Invalid(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if self.upload_dir == self.index_dir {
            return Err(ConfigError::Invalid(format!(
                "upload and index directories must differ ({})",
                self.upload_dir.display()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingBackend {
    #[default]
    Hashed,
    Http,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub base_url: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hashed,
            base_url: None,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_key: None,
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl EmbeddingConfig {
    pub fn build(&self) -> Result<Arc<dyn Embedder>, ConfigError> {
        match self.backend {
            EmbeddingBackend::Hashed => {
                if self.dimensions == 0 {
                    return Err(ConfigError::Invalid(
                        "embedding dimensions must be greater than zero".to_string(),
                    ));
                }
                Ok(Arc::new(HashedEmbedder::new(self.dimensions)))
            }
            EmbeddingBackend::Http => {
                let base_url = non_blank(self.base_url.as_deref()).ok_or(ConfigError::Missing {
                    setting: "embedding service url",
                    hint: "--embedding-url or EMBEDDING_URL",
                })?;
                parse_url("embedding service url", base_url)?;
                let model = non_blank(Some(self.model.as_str())).ok_or(ConfigError::Missing {
                    setting: "embedding model",
                    hint: "--embedding-model or EMBEDDING_MODEL",
                })?;
                let api_key = non_blank(self.api_key.as_deref()).map(str::to_string);
                Ok(Arc::new(HttpEmbedder::new(base_url, model, api_key)))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CHAT_BASE_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            api_key: None,
        }
    }
}

impl ChatConfig {
    pub fn build(&self) -> Result<Arc<dyn ChatModel>, ConfigError> {
        parse_url("chat service url", &self.base_url)?;
        let model = non_blank(Some(self.model.as_str())).ok_or(ConfigError::Missing {
            setting: "chat model",
            hint: "--chat-model or CHAT_MODEL",
        })?;
        let api_key = non_blank(self.api_key.as_deref()).ok_or(ConfigError::Missing {
            setting: "chat api key",
            hint: "--chat-api-key or GROQ_API_KEY",
        })?;
        Ok(Arc::new(ChatCompletionsClient::new(
            &self.base_url,
            model,
            api_key,
        )))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_url(setting: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|source| ConfigError::InvalidUrl { setting, source })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!(
            "{setting} must use http or https, got {}",
            url.scheme()
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
        let embedder = EmbeddingConfig::default().build().unwrap();
        assert_eq!(embedder.model(), "hashed-trigram-384");
    }

    #[test]
    fn invalid_pipeline_settings_are_rejected() {
        let mut config = PipelineConfig::default();
        config.top_k = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        assert!(matches!(
            ChunkingConfig::new(DEFAULT_TOP_K, DEFAULT_TOP_K),
            Err(ConfigError::InvalidChunkConfig(_))
        ));

        let mut config = PipelineConfig::default();
        config.index_dir = config.upload_dir.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn chat_requires_an_api_key() {
        let error = ChatConfig::default().build().err().unwrap();
        assert!(matches!(
            error,
            ConfigError::Missing {
                setting: "chat api key",
                ..
            }
        ));
        assert!(error.to_string().contains("GROQ_API_KEY"));

        let blank = ChatConfig {
            api_key: Some("   ".to_string()),
            ..ChatConfig::default()
        };
        assert!(blank.build().is_err());
    }

    #[test]
    fn chat_rejects_bad_urls_and_models() {
        let bad_url = ChatConfig {
            base_url: "not a url".to_string(),
            api_key: Some("key".to_string()),
            ..ChatConfig::default()
        };
        assert!(matches!(
            bad_url.build().err(),
            Some(ConfigError::InvalidUrl { .. })
        ));

        let ftp = ChatConfig {
            base_url: "ftp://example.com".to_string(),
            api_key: Some("key".to_string()),
            ..ChatConfig::default()
        };
        assert!(matches!(ftp.build().err(), Some(ConfigError::Invalid(_))));

        let no_model = ChatConfig {
            model: String::new(),
            api_key: Some("key".to_string()),
            ..ChatConfig::default()
        };
        assert!(matches!(
            no_model.build().err(),
            Some(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn configured_chat_client_reports_its_model() {
        let config = ChatConfig {
            api_key: Some("key".to_string()),
            ..ChatConfig::default()
        };
        assert_eq!(config.build().unwrap().model(), DEFAULT_CHAT_MODEL);
    }

    #[test]
    fn http_embeddings_need_a_url() {
        let config = EmbeddingConfig {
            backend: EmbeddingBackend::Http,
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            config.build().err(),
            Some(ConfigError::Missing { .. })
        ));

        let config = EmbeddingConfig {
            backend: EmbeddingBackend::Http,
            base_url: Some("http://localhost:8080/v1".to_string()),
            ..EmbeddingConfig::default()
        };
        assert_eq!(config.build().unwrap().model(), DEFAULT_EMBEDDING_MODEL);
    }
}
