use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("unsupported file type {found:?} for {path}, expected one of {expected:?}")]
    UnsupportedFileType {
        path: String,
        found: String,
        expected: Vec<String>,
    },

    #[error("duplicate passage id: {0}")]
    DuplicatePassage(String),

    #[error("passage not found: {0}")]
    MissingPassage(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Request(String),

    #[error("index not available yet: {0}")]
    NotReady(String),

    #[error("index is corrupt: {0}")]
    CorruptIndex(String),

    #[error("datastore error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("external service error: {0}")]
    Service(#[from] ServiceError),

    #[error("datastore error: {0}")]
    Store(#[from] StoreError),
}
