use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("failed to fetch {url}: {details}")]
    Fetch { url: String, details: String },

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding dimension {embedder} does not match index dimension {index}")]
    DimensionMismatch { embedder: usize, index: usize },

    #[error("index setup failed: {0}")]
    IndexSetup(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("chat request failed: {0}")]
    Request(String),

    #[error("conversation history is empty")]
    EmptyHistory,
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
