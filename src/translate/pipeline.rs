use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::TranslateConfig;
use crate::error::{EngineError, Result, WhisubError};
use crate::subtitle::{self, TranslationBlock};
use super::{TranslationEngineFactory, AUTO_LANGUAGE};

/// Translates subtitle text, preferring a direct model and falling back to a
/// route through the pivot language.
pub struct TranslationPipeline {
    factory: Arc<dyn TranslationEngineFactory>,
    batch_size: usize,
    pivot_language: String,
    fallback_on_any_error: bool,
}

impl TranslationPipeline {
    pub fn new(factory: Arc<dyn TranslationEngineFactory>, config: &TranslateConfig) -> Self {
        Self {
            factory,
            batch_size: config.batch_size.max(1),
            pivot_language: config.pivot_language.clone(),
            fallback_on_any_error: config.fallback_on_any_error,
        }
    }

    /// Translate SRT text from `source_lang` to `target_lang`.
    ///
    /// Equal languages (including both "auto") return the input untouched.
    /// Labels and timing lines are carried over byte for byte.
    pub async fn translate(&self, subtitle_text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        self.translate_with_cancel(subtitle_text, source_lang, target_lang, &CancellationToken::new())
            .await
    }

    pub async fn translate_with_cancel(
        &self,
        subtitle_text: &str,
        source_lang: &str,
        target_lang: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let source_lang = if source_lang.trim().is_empty() { AUTO_LANGUAGE } else { source_lang.trim() };
        let target_lang = target_lang.trim();

        if source_lang == target_lang {
            return Ok(subtitle_text.to_string());
        }
        if target_lang.is_empty() || target_lang == AUTO_LANGUAGE {
            return Err(WhisubError::Validation(format!("invalid target language '{}'", target_lang)));
        }

        let blocks = subtitle::decode(subtitle_text);
        let texts: Vec<String> = blocks.iter().map(|b| b.text.clone()).collect();
        info!("Translating {} subtitle blocks {} -> {}", texts.len(), source_lang, target_lang);

        let translated = self.translate_texts(texts, source_lang, target_lang, cancel).await?;

        let out_blocks: Vec<TranslationBlock> = blocks
            .into_iter()
            .zip(translated)
            .map(|(block, text)| TranslationBlock { text, ..block })
            .collect();

        Ok(subtitle::encode_blocks(&out_blocks))
    }

    async fn translate_texts(
        &self,
        texts: Vec<String>,
        source: &str,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(texts);
        }

        let pivot = self.pivot_language.as_str();
        let concrete_source = source != AUTO_LANGUAGE;

        // When either side is the pivot, the direct pair is the pivot route itself.
        if concrete_source && source != pivot && target != pivot {
            match self.run_pair(source, target, &texts, cancel).await {
                Ok(translated) => return Ok(translated),
                Err(e @ WhisubError::Cancelled(_)) => return Err(e),
                Err(WhisubError::Engine(EngineError::ModelUnavailable(pair))) => {
                    info!("No direct model for {}, translating via {}", pair, pivot);
                }
                Err(e) if self.fallback_on_any_error => {
                    warn!("Direct translation {}-{} failed ({}), translating via {}", source, target, e, pivot);
                }
                Err(e) => return Err(route_error(source, target, e)),
            }
        }

        let mut current = texts;
        if concrete_source && source != pivot {
            current = self
                .run_pair(source, pivot, &current, cancel)
                .await
                .map_err(|e| route_error(source, pivot, e))?;
        }
        if target != pivot {
            current = self
                .run_pair(pivot, target, &current, cancel)
                .await
                .map_err(|e| route_error(pivot, target, e))?;
        }
        Ok(current)
    }

    /// Translate all texts with one engine, `batch_size` at a time.
    async fn run_pair(
        &self,
        source: &str,
        target: &str,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        if cancel.is_cancelled() {
            return Err(WhisubError::Cancelled(format!("translation {}-{}", source, target)));
        }
        let engine = self.factory.create(source, target).await?;

        let mut outputs = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                return Err(WhisubError::Cancelled(format!("translation {}-{}", source, target)));
            }
            let translated = engine.translate_batch(batch).await?;
            if translated.len() != batch.len() {
                return Err(EngineError::Failed(format!(
                    "engine returned {} texts for a batch of {}",
                    translated.len(),
                    batch.len()
                ))
                .into());
            }
            outputs.extend(translated);
        }
        Ok(outputs)
    }
}

/// Cancellation passes through; anything else becomes a translation error for the pair.
fn route_error(source: &str, target: &str, error: WhisubError) -> WhisubError {
    match error {
        cancelled @ WhisubError::Cancelled(_) => cancelled,
        WhisubError::Engine(e) => WhisubError::Translation(format!("{}-{}: {}", source, target, e)),
        other => WhisubError::Translation(format!("{}-{}: {}", source, target, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::translate::{MockTranslationEngine, MockTranslationEngineFactory, TranslationEngine};
    use parking_lot::Mutex;

    const SRT: &str = "1\n00:00:00,000 --> 00:00:01,000\nHallo\n\n\
                       2\n00:00:01,000 --> 00:00:02,500\nWelt\n\n";

    /// Engine that tags every text with its target language
    fn tagging_engine(target: &str, batches: Arc<Mutex<Vec<usize>>>) -> Box<dyn TranslationEngine> {
        let tag = format!("[{}]", target);
        let mut engine = MockTranslationEngine::new();
        engine.expect_translate_batch().returning(move |texts: &[String]| {
            batches.lock().push(texts.len());
            Ok(texts.iter().map(|t| format!("{}{}", tag, t)).collect())
        });
        Box::new(engine)
    }

    /// Factory serving only the listed pairs, recording every request
    fn factory_for(
        available: &[(&str, &str)],
        calls: Arc<Mutex<Vec<String>>>,
        batches: Arc<Mutex<Vec<usize>>>,
    ) -> MockTranslationEngineFactory {
        let available: Vec<String> = available.iter().map(|(s, t)| format!("{}-{}", s, t)).collect();
        let mut factory = MockTranslationEngineFactory::new();
        factory.expect_create().returning(move |source: &str, target: &str| {
            let pair = format!("{}-{}", source, target);
            calls.lock().push(pair.clone());
            if available.contains(&pair) {
                Ok(tagging_engine(target, batches.clone()))
            } else {
                Err(EngineError::ModelUnavailable(pair))
            }
        });
        factory
    }

    fn pipeline(factory: MockTranslationEngineFactory) -> TranslationPipeline {
        TranslationPipeline::new(Arc::new(factory), &Config::default().translate)
    }

    #[tokio::test]
    async fn test_identity_short_circuit() {
        let mut factory = MockTranslationEngineFactory::new();
        factory.expect_create().times(0);
        let pipeline = pipeline(factory);

        assert_eq!(pipeline.translate(SRT, "de", "de").await.unwrap(), SRT);
        assert_eq!(pipeline.translate(SRT, "auto", "auto").await.unwrap(), SRT);
        assert_eq!(pipeline.translate("not even srt", "", "auto").await.unwrap(), "not even srt");
    }

    #[tokio::test]
    async fn test_direct_translation_preserves_labels_and_timing() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let batches = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline(factory_for(&[("de", "fr")], calls.clone(), batches));

        let out = pipeline.translate(SRT, "de", "fr").await.unwrap();

        assert_eq!(
            out,
            "1\n00:00:00,000 --> 00:00:01,000\n[fr]Hallo\n\n\
             2\n00:00:01,000 --> 00:00:02,500\n[fr]Welt\n\n"
        );
        assert_eq!(*calls.lock(), vec!["de-fr".to_string()]);
    }

    #[tokio::test]
    async fn test_pivot_when_direct_model_missing() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let batches = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline(factory_for(&[("de", "en"), ("en", "fr")], calls.clone(), batches));

        let out = pipeline.translate(SRT, "de", "fr").await.unwrap();
        let blocks = subtitle::decode(&out);

        assert_eq!(*calls.lock(), vec!["de-fr", "de-en", "en-fr"]);
        assert_eq!(blocks[0].text, "[fr][en]Hallo");
        assert_ne!(blocks[0].text, "[en]Hallo");
        assert_eq!(blocks[1].timing, "00:00:01,000 --> 00:00:02,500");
    }

    #[tokio::test]
    async fn test_pivot_to_english_stops_after_first_hop() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let batches = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline(factory_for(&[("de", "en")], calls.clone(), batches));

        let out = pipeline.translate(SRT, "de", "en").await.unwrap();

        assert_eq!(*calls.lock(), vec!["de-en"]);
        assert_eq!(subtitle::decode(&out)[1].text, "[en]Welt");
    }

    #[tokio::test]
    async fn test_auto_source_assumes_english() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let batches = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline(factory_for(&[("en", "sk")], calls.clone(), batches));

        let out = pipeline.translate(SRT, "auto", "sk").await.unwrap();

        assert_eq!(*calls.lock(), vec!["en-sk"]);
        assert_eq!(subtitle::decode(&out)[0].text, "[sk]Hallo");
    }

    #[tokio::test]
    async fn test_pivot_failure_surfaces() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let batches = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline(factory_for(&[("de", "en")], calls.clone(), batches));

        let err = pipeline.translate(SRT, "de", "ja").await.unwrap_err();

        assert!(matches!(err, WhisubError::Translation(ref msg) if msg.starts_with("en-ja")));
        assert_eq!(*calls.lock(), vec!["de-ja", "de-en", "en-ja"]);
    }

    #[tokio::test]
    async fn test_engine_error_not_masked_when_fallback_restricted() {
        let mut factory = MockTranslationEngineFactory::new();
        factory
            .expect_create()
            .times(1)
            .returning(|_: &str, _: &str| Err(EngineError::Failed("model crashed".to_string())));
        let mut config = Config::default().translate;
        config.fallback_on_any_error = false;
        let pipeline = TranslationPipeline::new(Arc::new(factory), &config);

        let err = pipeline.translate(SRT, "de", "fr").await.unwrap_err();
        assert!(matches!(err, WhisubError::Translation(ref msg) if msg.contains("model crashed")));
    }

    #[tokio::test]
    async fn test_batches_are_order_preserving_partitions() {
        let mut srt = String::new();
        for i in 1..=40 {
            srt.push_str(&format!("{}\n00:00:{:02},000 --> 00:00:{:02},500\nline {}\n\n", i, i, i, i));
        }
        let calls = Arc::new(Mutex::new(Vec::new()));
        let batches = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline(factory_for(&[("de", "fr")], calls, batches.clone()));

        let out = pipeline.translate(&srt, "de", "fr").await.unwrap();
        let blocks = subtitle::decode(&out);

        assert_eq!(*batches.lock(), vec![16, 16, 8]);
        assert_eq!(blocks.len(), 40);
        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(block.label, (i + 1).to_string());
            assert_eq!(block.text, format!("[fr]line {}", i + 1));
        }
    }

    #[tokio::test]
    async fn test_short_batch_is_an_error() {
        let mut factory = MockTranslationEngineFactory::new();
        factory.expect_create().returning(|_: &str, _: &str| {
            let mut engine = MockTranslationEngine::new();
            engine
                .expect_translate_batch()
                .returning(|_: &[String]| Ok(vec!["only one".to_string()]));
            Ok(Box::new(engine) as Box<dyn TranslationEngine>)
        });
        let pipeline = pipeline(factory);

        assert!(pipeline.translate(SRT, "en", "fr").await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_auto_target() {
        let mut factory = MockTranslationEngineFactory::new();
        factory.expect_create().times(0);
        let pipeline = pipeline(factory);

        assert!(matches!(
            pipeline.translate(SRT, "de", "auto").await,
            Err(WhisubError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_cancellation_is_not_reported_as_engine_failure() {
        let mut factory = MockTranslationEngineFactory::new();
        factory.expect_create().times(0);
        let pipeline = pipeline(factory);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = pipeline.translate_with_cancel(SRT, "de", "fr", &cancel).await.unwrap_err();
        assert!(matches!(err, WhisubError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_cancellation_during_pivot_surfaces_as_cancelled() {
        let cancel = CancellationToken::new();
        let cancel_on_create = cancel.clone();
        let mut factory = MockTranslationEngineFactory::new();
        factory.expect_create().times(1).returning(move |source: &str, target: &str| {
            cancel_on_create.cancel();
            Err(EngineError::ModelUnavailable(format!("{}-{}", source, target)))
        });
        let pipeline = pipeline(factory);

        let err = pipeline.translate_with_cancel(SRT, "de", "fr", &cancel).await.unwrap_err();
        assert!(matches!(err, WhisubError::Cancelled(_)));
    }
}
