//! Error types for the HTTP adapter

use flowboard_engine::EngineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HttpAdapterError>;

#[derive(Debug, Error)]
pub enum HttpAdapterError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend answered 2xx but reported `success: false`
    #[error("Backend reported failure: {0}")]
    Unsuccessful(String),

    #[error("No option source for family '{0}'")]
    UnsupportedOptionFamily(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl HttpAdapterError {
    /// Convert for a catalog or option fetch
    pub fn into_schema_fetch(self) -> EngineError {
        EngineError::schema_fetch(self.to_string())
    }
}

impl From<HttpAdapterError> for EngineError {
    fn from(err: HttpAdapterError) -> Self {
        EngineError::backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_carries_body() {
        let err = HttpAdapterError::Status {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.to_string(), "API error 500: boom");

        let engine: EngineError = err.into();
        assert!(matches!(engine, EngineError::Backend(ref m) if m.contains("boom")));
    }

    #[test]
    fn test_schema_fetch_conversion() {
        let err = HttpAdapterError::UnsupportedOptionFamily("voices".into());
        assert!(matches!(
            err.into_schema_fetch(),
            EngineError::SchemaFetch(ref m) if m.contains("voices")
        ));
    }
}
