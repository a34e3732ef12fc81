use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{file}: io error: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}: pdf parse error: {details}")]
    PdfParse { file: String, details: String },

    #[error("{file}: content is not valid utf-8 text")]
    Decode { file: String },

    #[error("{file}: no extractable text")]
    EmptyText { file: String },

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("no documents could be loaded ({skipped} file(s) skipped)")]
    NothingLoaded { skipped: usize },
}

impl LoadError {
    pub(crate) fn io(file: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            file: file.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {setting} (set {hint})")]
    Missing {
        setting: &'static str,
        hint: &'static str,
    },

    #[error("invalid url for {setting}: {source}")]
    InvalidUrl {
        setting: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure talking to the embedding or chat-completion service.
///
/// Kept apart from the "I don't know" answer: a transport failure is never
/// reported as a grounding miss.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service} request failed: {source}")]
    Http {
        service: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid response from {service}: {status}: {details}")]
    BackendResponse {
        service: String,
        status: u16,
        details: String,
    },

    #[error("malformed response from {service}: {details}")]
    Malformed { service: String, details: String },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding dimension {found} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("index was built with embedding model {indexed}, but {configured} is configured")]
    ModelMismatch { indexed: String, configured: String },

    #[error("unsupported index format version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Upstream(#[from] ServiceError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("question is empty")]
    EmptyQuestion,
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
