use thiserror::Error;

#[derive(Error, Debug)]
pub enum WhisubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure reported by an inference engine (speech recognition or translation).
///
/// `ModelUnavailable` means no model exists for the request (e.g. an unknown
/// language pair) and is the only case the translation pipeline always treats
/// as a reason to fall back to the pivot route.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("no model available for {0}")]
    ModelUnavailable(String),

    #[error("{0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, WhisubError>;
