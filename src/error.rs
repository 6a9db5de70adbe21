use thiserror::Error;

/// Failure taxonomy for the fetch/extract pipeline.
///
/// Every variant is fatal: the batch requires a complete record for every
/// fund, so a single failure aborts the whole run before any workbook is
/// written.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response from {endpoint} endpoint: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing key `{path}` in {endpoint} response")]
    Schema { endpoint: &'static str, path: String },

    #[error("{0}")]
    Validation(String),
}

impl ProviderError {
    pub fn schema(endpoint: &'static str, path: impl Into<String>) -> Self {
        ProviderError::Schema {
            endpoint,
            path: path.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ProviderError::Validation(message.into())
    }
}
