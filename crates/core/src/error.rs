use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("no text could be extracted from {0}")]
    EmptyDocument(String),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("multimodal OCR failed: {0}")]
    OcrFailed(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("index failure: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} is not configured: {details}")]
    NotConfigured { provider: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} api error: {details}")]
    Api { provider: String, details: String },

    #[error("{provider} returned no content")]
    EmptyResponse { provider: String },

    #[error("response was blocked by {provider} safety filters")]
    ContentFiltered { provider: String },
}

impl ProviderError {
    /// True when the request itself never completed (network or timeout),
    /// as opposed to the provider answering with an error body.
    pub fn is_transport(&self) -> bool {
        matches!(self, ProviderError::Http(_))
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
