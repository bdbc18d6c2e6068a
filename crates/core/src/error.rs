use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("input file not found: {0}")]
    MissingFile(String),

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("document had no readable page text: {0}")]
    EmptyDocument(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no chunks produced from {0} document(s)")]
    NoChunks(usize),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("prompt template is missing the {{{0}}} placeholder")]
    MissingPlaceholder(String),

    #[error("prompt template has unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),

    #[error("placeholder pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("index has no entries")]
    EmptyIndex,

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("search request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("model returned an empty answer")]
    EmptyResponse,
}

impl GenerationError {
    /// Transport failures, rate limits and server-side errors may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(error) => {
                error.is_timeout()
                    || error.is_connect()
                    || error.is_request()
                    || error.status().is_some_and(|status| {
                        status.is_server_error() || status.as_u16() == 429
                    })
            }
            Self::BackendResponse { details, .. } => {
                details.starts_with('5') || details.starts_with("429")
            }
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("retrieval failed: {0}")]
    Search(#[from] SearchError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("pipeline is not ready; run setup first")]
    NotReady,
}
