use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{EngineError, Result};
use super::{TranslationEngine, TranslationEngineFactory};

const MAX_LENGTH: usize = 512;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub model: String,
    pub texts: Vec<String>,
    pub max_length: usize,
    pub truncation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub translations: Vec<String>,
}

/// Resolves language pairs to models hosted by a translation model server
pub struct HttpEngineFactory {
    client: Client,
    config: TranslateConfig,
}

impl HttpEngineFactory {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Model name for a pair, e.g. `Helsinki-NLP/opus-mt-de-en`
    pub fn model_name(&self, source: &str, target: &str) -> String {
        model_name(&self.config.model_template, source, target)
    }
}

pub fn model_name(template: &str, source: &str, target: &str) -> String {
    template.replace("{src}", source).replace("{tgt}", target)
}

#[async_trait]
impl TranslationEngineFactory for HttpEngineFactory {
    async fn create(
        &self,
        source: &str,
        target: &str,
    ) -> std::result::Result<Box<dyn TranslationEngine>, EngineError> {
        let model = self.model_name(source, target);
        let url = format!("{}/models/{}", self.config.endpoint.trim_end_matches('/'), model);

        debug!("Checking translation model: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::Failed(format!("HTTP request failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => Ok(Box::new(HttpTranslationEngine {
                client: self.client.clone(),
                endpoint: self.config.endpoint.trim_end_matches('/').to_string(),
                model,
            })),
            StatusCode::NOT_FOUND => Err(EngineError::ModelUnavailable(format!("{}-{}", source, target))),
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(EngineError::Failed(format!("Model server error {}: {}", status, error_text)))
            }
        }
    }
}

/// One model on the server
pub struct HttpTranslationEngine {
    client: Client,
    endpoint: String,
    model: String,
}

#[async_trait]
impl TranslationEngine for HttpTranslationEngine {
    async fn translate_batch(&self, texts: &[String]) -> std::result::Result<Vec<String>, EngineError> {
        let request = TranslationRequest {
            model: self.model.clone(),
            texts: texts.to_vec(),
            max_length: MAX_LENGTH,
            truncation: true,
        };

        let url = format!("{}/translate", self.endpoint);
        debug!("Sending {} texts to {} ({})", texts.len(), url, self.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Failed(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EngineError::Failed(format!("Model server error {}: {}", status, error_text)));
        }

        let body: TranslationResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Failed(format!("Failed to parse response: {}", e)))?;

        check_batch(texts.len(), body.translations)
    }
}

fn check_batch(expected: usize, translations: Vec<String>) -> std::result::Result<Vec<String>, EngineError> {
    if translations.len() != expected {
        return Err(EngineError::Failed(format!(
            "expected {} translations, got {}",
            expected,
            translations.len()
        )));
    }
    Ok(translations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> TranslateConfig {
        let mut config = crate::config::Config::default().translate;
        config.endpoint = endpoint.to_string();
        config.timeout_secs = 2;
        config
    }

    #[test]
    fn test_model_name() {
        assert_eq!(
            model_name("Helsinki-NLP/opus-mt-{src}-{tgt}", "de", "en"),
            "Helsinki-NLP/opus-mt-de-en"
        );
    }

    #[test]
    fn test_check_batch_length() {
        assert_eq!(check_batch(1, vec!["a".to_string()]).unwrap(), vec!["a".to_string()]);
        assert!(matches!(check_batch(2, vec!["a".to_string()]), Err(EngineError::Failed(_))));
    }

    #[test]
    fn test_request_serialization() {
        let request = TranslationRequest {
            model: "m".to_string(),
            texts: vec!["hi".to_string()],
            max_length: MAX_LENGTH,
            truncation: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["texts"][0], "hi");
        assert_eq!(json["max_length"], 512);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_engine_failure() {
        let factory = HttpEngineFactory::new(config("http://127.0.0.1:9")).unwrap();
        let result = factory.create("de", "en").await;
        assert!(matches!(result, Err(EngineError::Failed(_))));
    }
}
