//! Language model client used by the deep engine and the explainer.

mod chat;

pub use chat::ChatEvaluator;

#[derive(Debug, thiserror::Error)]
pub enum EvaluatorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint returned status {0}: {1}")]
    Status(u16, String),

    #[error("Unreadable response: {0}")]
    Parse(String),

    #[error("API key not set, export {0}")]
    MissingApiKey(String),

    #[error("API key is not a valid header value")]
    InvalidApiKey,
}
