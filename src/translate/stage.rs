//! [`TranslationStage`]: one remote translation call, fully drained.

use std::sync::Arc;

use crate::config::TranslationConfig;
use crate::stream::{
    Accumulator, CancelToken, ContextRegistry, ExecutionContext, StreamCollector, StreamError,
};
use crate::translate::provider::{
    ChatMessage, DeltaStream, TranslationDelta, TranslationError, TranslationProvider,
    TranslationRequest, TranslationResponse,
};
use crate::translate::PromptBuilder;

// ---------------------------------------------------------------------------
// TranslationOutcome
// ---------------------------------------------------------------------------

/// Result of the translation stage.
///
/// `translated_text` is empty only when the provider produced no content;
/// in that case `was_translated` is `false` and the caller must speak the
/// original text instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationOutcome {
    pub translated_text: String,
    pub was_translated: bool,
}

impl TranslationOutcome {
    fn from_raw(raw: &str) -> Self {
        let translated_text = raw.trim().to_string();
        Self {
            was_translated: !translated_text.is_empty(),
            translated_text,
        }
    }

    pub fn is_blank(&self) -> bool {
        !self.was_translated
    }
}

// ---------------------------------------------------------------------------
// TextAccumulator
// ---------------------------------------------------------------------------

/// Concatenates delta text in arrival order.
#[derive(Debug, Default)]
struct TextAccumulator {
    text: String,
}

impl Accumulator<TranslationDelta> for TextAccumulator {
    fn accept(&mut self, delta: TranslationDelta) -> Result<bool, StreamError> {
        self.text.push_str(&delta.text);
        Ok(delta.done)
    }
}

// ---------------------------------------------------------------------------
// TranslationStage
// ---------------------------------------------------------------------------

/// Translates text through a [`TranslationProvider`].
pub struct TranslationStage {
    provider: Arc<dyn TranslationProvider>,
    contexts: ContextRegistry,
    collector: StreamCollector,
    provider_name: String,
    model: String,
    streaming: bool,
}

impl TranslationStage {
    pub fn new(
        provider: Arc<dyn TranslationProvider>,
        config: &TranslationConfig,
        contexts: ContextRegistry,
        collector: StreamCollector,
    ) -> Self {
        Self {
            provider,
            contexts,
            collector,
            provider_name: config.provider.label().to_string(),
            model: config.model.clone(),
            streaming: config.streaming,
        }
    }

    /// Translate `text` into `target_language` (a display name such as
    /// `"Spanish"`).
    ///
    /// Issues exactly one remote call.  A streamed answer is drained to its
    /// done signal before the outcome is built.  The execution context is
    /// released on every exit path.
    pub async fn translate(
        &self,
        text: &str,
        target_language: &str,
        credential: &str,
        cancel: &CancelToken,
    ) -> Result<TranslationOutcome, TranslationError> {
        if cancel.is_cancelled() {
            return Err(TranslationError::Cancelled);
        }

        let (system_msg, user_msg) = PromptBuilder::new(target_language).build_chat(text);
        let request = TranslationRequest {
            provider: self.provider_name.clone(),
            model: self.model.clone(),
            credential: credential.to_string(),
            streaming: self.streaming,
            messages: vec![ChatMessage::system(system_msg), ChatMessage::user(user_msg)],
        };

        let mut ctx: ExecutionContext<DeltaStream> = self.contexts.acquire("translation");
        ctx.note("target_language", target_language);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
            response = self.provider.send(&request) => response?,
        };

        let raw = match response {
            TranslationResponse::Complete(text) => text,
            TranslationResponse::Streamed(stream) => {
                let stream = ctx.attach(stream);
                let mut acc = TextAccumulator::default();
                let chunks = self.collector.drain(&mut **stream, &mut acc, cancel).await?;
                log::debug!(
                    "context {}: drained {chunks} translation deltas",
                    ctx.id()
                );
                acc.text
            }
        };

        let outcome = TranslationOutcome::from_raw(&raw);
        log::debug!(
            "translation into {target_language}: {} chars in, {} chars out",
            text.chars().count(),
            outcome.translated_text.chars().count()
        );
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamItem;
    use crate::translate::FakeTranslator;

    fn stage(provider: Arc<FakeTranslator>, registry: &ContextRegistry) -> TranslationStage {
        TranslationStage::new(
            provider,
            &TranslationConfig::default(),
            registry.clone(),
            StreamCollector::default(),
        )
    }

    #[tokio::test]
    async fn streamed_deltas_concatenate_in_order() {
        let provider = Arc::new(FakeTranslator::deltas(["Hola", ""]));
        let registry = ContextRegistry::new();

        let outcome = stage(provider.clone(), &registry)
            .translate("Hello", "Spanish", "sk-test", &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.translated_text, "Hola");
        assert!(outcome.was_translated);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn complete_response_is_read_directly() {
        let provider = Arc::new(FakeTranslator::complete("  Bonjour\n"));
        let registry = ContextRegistry::new();

        let outcome = stage(provider, &registry)
            .translate("Hello", "French", "sk-test", &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.translated_text, "Bonjour");
    }

    #[tokio::test]
    async fn request_carries_two_message_prompt() {
        let provider = Arc::new(FakeTranslator::complete("Hallo"));
        let registry = ContextRegistry::new();

        stage(provider.clone(), &registry)
            .translate("Hello", "German", "sk-test", &CancelToken::new())
            .await
            .unwrap();

        let request = &provider.requests()[0];
        assert_eq!(request.credential, "sk-test");
        assert_eq!(request.provider, "openai-compatible");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert!(request.messages[0].content.contains("German"));
        assert_eq!(request.messages[1].role, "user");
        assert_eq!(request.messages[1].content, "Hello");
    }

    #[tokio::test]
    async fn blank_stream_is_marked_untranslated() {
        let provider = Arc::new(FakeTranslator::deltas([" ", "\n"]));
        let registry = ContextRegistry::new();

        let outcome = stage(provider, &registry)
            .translate("Hello", "Spanish", "k", &CancelToken::new())
            .await
            .unwrap();

        assert!(outcome.is_blank());
        assert_eq!(outcome.translated_text, "");
    }

    #[tokio::test]
    async fn stream_ending_without_done_flag_still_completes() {
        let provider = Arc::new(FakeTranslator::script(vec![
            Ok(StreamItem::Chunk(TranslationDelta::text("Ciao"))),
            Ok(StreamItem::Done),
        ]));
        let registry = ContextRegistry::new();

        let outcome = stage(provider, &registry)
            .translate("Hello", "Italian", "k", &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.translated_text, "Ciao");
    }

    #[tokio::test]
    async fn provider_error_propagates_and_releases_context() {
        let provider = Arc::new(FakeTranslator::failing(TranslationError::Timeout));
        let registry = ContextRegistry::new();

        let err = stage(provider, &registry)
            .translate("Hello", "Spanish", "k", &CancelToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, TranslationError::Timeout);
        assert_eq!(registry.live(), 0);
        assert_eq!(registry.stats().released, 1);
    }

    #[tokio::test]
    async fn broken_stream_is_translation_error() {
        let provider = Arc::new(FakeTranslator::script(vec![
            Ok(StreamItem::Chunk(TranslationDelta::text("Ho"))),
            Err(StreamError::Transport("connection reset".into())),
        ]));
        let registry = ContextRegistry::new();

        let err = stage(provider, &registry)
            .translate("Hello", "Spanish", "k", &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TranslationError::Stream(_)));
        assert_eq!(registry.live(), 0);
    }

    #[tokio::test]
    async fn cancellation_mid_stream_discards_partial_text() {
        let token = CancelToken::new();
        let provider = Arc::new(
            FakeTranslator::deltas(["Ho", "la", " mundo"]).cancel_after(1, token.clone()),
        );
        let registry = ContextRegistry::new();

        let err = stage(provider, &registry)
            .translate("Hello world", "Spanish", "k", &token)
            .await
            .unwrap_err();

        assert_eq!(err, TranslationError::Cancelled);
        assert_eq!(registry.live(), 0);
    }

    #[tokio::test]
    async fn cancellation_while_waiting_for_provider() {
        let token = CancelToken::new();
        let provider = Arc::new(FakeTranslator::hanging());
        let registry = ContextRegistry::new();
        let stage = stage(provider, &registry);

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                token.cancel();
            })
        };

        let err = stage
            .translate("Hello", "Spanish", "k", &token)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert_eq!(err, TranslationError::Cancelled);
        assert_eq!(registry.live(), 0);
    }

    #[tokio::test]
    async fn runaway_stream_is_bounded() {
        let provider = Arc::new(FakeTranslator::deltas(["a"; 50]));
        let registry = ContextRegistry::new();
        let stage = TranslationStage::new(
            provider,
            &TranslationConfig::default(),
            registry.clone(),
            StreamCollector::new(8),
        );

        let err = stage
            .translate("Hello", "Spanish", "k", &CancelToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TranslationError::Stream(StreamError::TooManyChunks { limit: 8 })
        );
    }
}
