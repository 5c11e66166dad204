// Subtitle translation
//
// - Http: translation engines served by an opus-mt model server
// - Pipeline: direct-then-pivot fallback with fixed-size batching

pub mod http;
pub mod pipeline;

use async_trait::async_trait;

pub use pipeline::TranslationPipeline;
use crate::config::TranslateConfig;
use crate::error::{EngineError, Result};

/// Sentinel for "source language unknown"
pub const AUTO_LANGUAGE: &str = "auto";

/// Languages offered to users, as (code, display name)
pub const AVAILABLE_LANGUAGES: &[(&str, &str)] = &[
    ("auto", "Auto (detect)"),
    ("en", "English"),
    ("sk", "Slovenčina"),
    ("cs", "Čeština"),
    ("de", "Deutsch"),
    ("pl", "Polski"),
    ("hu", "Magyar"),
    ("fr", "Français"),
    ("es", "Español"),
    ("it", "Italiano"),
    ("ro", "Română"),
    ("bg", "Български"),
    ("hr", "Hrvatski"),
    ("sl", "Slovenščina"),
    ("sr", "Srpski"),
    ("uk", "Українська"),
    ("ru", "Русский"),
    ("tr", "Türkçe"),
    ("ar", "العربية"),
    ("zh", "中文"),
    ("ja", "日本語"),
    ("ko", "한국어"),
];

pub fn is_known_language(code: &str) -> bool {
    AVAILABLE_LANGUAGES.iter().any(|(c, _)| *c == code)
}

/// A translator for one fixed language pair
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    /// Translate a batch, returning exactly one output per input, in order
    async fn translate_batch(&self, texts: &[String]) -> std::result::Result<Vec<String>, EngineError>;
}

/// Builds engines per language pair
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranslationEngineFactory: Send + Sync {
    /// Fails with [`EngineError::ModelUnavailable`] when no model serves the pair
    async fn create(
        &self,
        source: &str,
        target: &str,
    ) -> std::result::Result<Box<dyn TranslationEngine>, EngineError>;
}

/// Factory for creating translation engine factories
pub struct TranslatorFactory;

impl TranslatorFactory {
    /// Create the default engine factory (HTTP model server)
    pub fn create_factory(config: TranslateConfig) -> Result<Box<dyn TranslationEngineFactory>> {
        Ok(Box::new(http::HttpEngineFactory::new(config)?))
    }
}
