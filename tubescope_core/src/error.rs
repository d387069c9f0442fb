// src/error.rs
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Archive contained no parseable video rows")]
    EmptyArchive,

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl PipelineError {
    pub fn code_str(&self) -> &'static str {
        match self {
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::Authentication(_) => "auth_failed",
            PipelineError::EmptyArchive => "empty_archive",
            PipelineError::Zip(_) => "parse_error",
            PipelineError::SerdeJson(_) => "parse_error",
            PipelineError::HttpRequest(_) => "upstream_error",
            PipelineError::Llm(_) => "upstream_error",
            PipelineError::Io(_) => "io_error",
            PipelineError::Other(_) => "internal_error",
        }
    }

    /// Message suitable for direct display at the application boundary.
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineError::EmptyArchive
            | PipelineError::Zip(_)
            | PipelineError::InvalidInput(_) => "Could not parse this file as a YouTube export",
            PipelineError::Llm(_) | PipelineError::HttpRequest(_) => {
                "Series detection partially completed (AI step skipped)"
            }
            PipelineError::Authentication(_) => "Authentication failed",
            _ => "Something went wrong while processing this export",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "code": self.code_str(),
            "message": self.to_string(),
        })
    }
}
