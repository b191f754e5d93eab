use thiserror::Error;

pub type Result<T> = core::result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed page: {0}")]
    Parse(String),

    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Raw table width does not line up with the canonical schema.
    #[error(
        "schema mismatch: {found} source column(s) (drop column {drop_column:?}) \
         cannot be renamed to {expected} canonical column(s)"
    )]
    SchemaMismatch {
        expected: usize,
        found: usize,
        drop_column: Option<usize>,
    },

    /// Terminal: every attempt in the retry budget failed.
    #[error("network error: gave up on {url} after {attempts} attempt(s): {last}")]
    Network {
        url: String,
        attempts: u32,
        last: String,
    },
}

impl FetchError {
    /// Whether another attempt at the same page could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Request { .. }
                | FetchError::Status { .. }
                | FetchError::Parse(_)
                | FetchError::Json(_)
        )
    }
}
