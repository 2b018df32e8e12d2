use thiserror::Error;

/// Errors raised by the catalog, the vector index and the providers behind them.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("API error: {0}")]
    Api(String),
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("generation error: {0}")]
    Generation(String),
    #[error("initialization failed: {0}")]
    Initialization(String),
    #[error("vector index is not initialized")]
    NotReady,
}

impl RagError {
    /// Transport or decoding failure talking to a provider. The request URL
    /// is dropped so query-string credentials never reach a message.
    pub fn transport(err: reqwest::Error) -> Self {
        RagError::Api(err.without_url().to_string())
    }

    /// Non-success HTTP status from a provider.
    pub fn status(status: reqwest::StatusCode, body: &str) -> Self {
        RagError::Api(format!("request failed with status {}: {}", status, body))
    }

    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        RagError::Embedding(err.to_string())
    }

    pub fn generation<E: std::fmt::Display>(err: E) -> Self {
        RagError::Generation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_is_api_variant() {
        let err = RagError::status(reqwest::StatusCode::FORBIDDEN, "quota exceeded");
        assert!(matches!(err, RagError::Api(_)));
        assert_eq!(
            err.to_string(),
            "API error: request failed with status 403 Forbidden: quota exceeded"
        );
    }
}
