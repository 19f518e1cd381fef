//! In-process [`TranslationProvider`] double shared by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::stream::{CancelToken, ScriptedSource, StreamError, StreamItem};
use crate::translate::{TranslationDelta, TranslationError, TranslationProvider, TranslationRequest, TranslationResponse};

enum Reply {
    Complete(String),
    Script(Vec<Result<StreamItem<TranslationDelta>, StreamError>>),
    Fail(TranslationError),
    Hang,
}

/// Replays a canned reply and records every request it receives.
pub struct FakeTranslator {
    reply: Reply,
    cancel_after: Option<(usize, CancelToken)>,
    requests: Mutex<Vec<TranslationRequest>>,
}

impl FakeTranslator {
    fn with(reply: Reply) -> Self {
        Self {
            reply,
            cancel_after: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer with a single complete body.
    pub fn complete(text: &str) -> Self {
        Self::with(Reply::Complete(text.to_string()))
    }

    /// Stream `texts` as deltas, then a delta carrying the done flag.
    pub fn deltas<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        let script = texts
            .into_iter()
            .map(|t| Ok(StreamItem::Chunk(TranslationDelta::text(t))))
            .chain([Ok(StreamItem::Chunk(TranslationDelta::done()))])
            .collect();
        Self::with(Reply::Script(script))
    }

    /// Stream an arbitrary script.
    pub fn script(items: Vec<Result<StreamItem<TranslationDelta>, StreamError>>) -> Self {
        Self::with(Reply::Script(items))
    }

    pub fn failing(err: TranslationError) -> Self {
        Self::with(Reply::Fail(err))
    }

    /// Never answers.
    pub fn hanging() -> Self {
        Self::with(Reply::Hang)
    }

    /// Cancel `token` once the `n`-th delta has been pulled.
    pub fn cancel_after(mut self, n: usize, token: CancelToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<TranslationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranslationProvider for FakeTranslator {
    async fn send(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResponse, TranslationError> {
        self.requests.lock().unwrap().push(request.clone());

        match &self.reply {
            Reply::Complete(text) => Ok(TranslationResponse::Complete(text.clone())),
            Reply::Script(items) => {
                let mut source = ScriptedSource::script(items.clone());
                if let Some((n, token)) = &self.cancel_after {
                    source = source.cancel_after(*n, token.clone());
                }
                Ok(TranslationResponse::Streamed(Box::new(source)))
            }
            Reply::Fail(err) => Err(err.clone()),
            Reply::Hang => std::future::pending().await,
        }
    }
}
