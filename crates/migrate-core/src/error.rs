use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("{service} API error: {status} - {body}")]
    Remote {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("Structural error: {0}")]
    Structural(String),
    #[error("Resource error ({url}): {reason}")]
    Resource { url: String, reason: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    pub fn resource(url: &str, reason: impl Into<String>) -> Self {
        MigrateError::Resource {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;
