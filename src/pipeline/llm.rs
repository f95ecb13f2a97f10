//! Translation orchestration: windows of concurrent chat-completion calls.
//!
//! Texts are split into consecutive windows of `batch_size`. Requests inside
//! a window run concurrently through the [`ApiClient`]; windows run one after
//! another, so at most `batch_size` requests are in flight per run. Results
//! are matched to inputs by position, never by completion order.
//!
//! ## Failure handling
//!
//! A failed item (timeout, non-2xx status, malformed reply) becomes an inline
//! `"Translation error: …"` string for that item only; siblings in the same
//! window and later windows are unaffected. Only a misconfigured endpoint
//! (empty URL or credential) fails the call, and it does so before any
//! network I/O.

use crate::config::EndpointConfig;
use crate::document::{is_blank, TranslationMap};
use crate::error::{ApiError, ElementError, TranslateError};
use crate::pipeline::client::{ApiClient, CHAT_COMPLETIONS};
use crate::pipeline::postprocess::clean_translation;
use crate::progress::ProgressCallback;
use crate::prompts::{translation_error, translation_instruction};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Default number of concurrent requests per window.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Build the chat-completions body for one source text.
pub fn build_request(text: &str, source_lang: &str, target_lang: &str, model: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": translation_instruction(text, source_lang, target_lang),
            }
        ]
    })
}

/// Read `choices[0].message.content` from a chat-completions reply.
pub fn extract_content(response: &Value) -> Result<String, ApiError> {
    response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::MissingContent {
            detail: "'choices[0].message.content'".to_string(),
        })
}

/// Translates texts for one run through one pooled client.
#[derive(Clone)]
pub struct Translator {
    client: ApiClient,
    model: String,
    source_lang: String,
    target_lang: String,
    batch_size: usize,
    progress: Option<ProgressCallback>,
}

impl Translator {
    /// Fails with [`TranslateError::Configuration`] before any network call
    /// when the endpoint URL or credential is missing.
    pub fn new(
        endpoint: &EndpointConfig,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Result<Self, TranslateError> {
        Ok(Self {
            client: ApiClient::new(endpoint)?,
            model: endpoint.model.clone(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            progress: None,
        })
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n.max(1);
        self
    }

    pub fn with_progress(mut self, cb: Option<ProgressCallback>) -> Self {
        self.progress = cb;
        self
    }

    /// Translate every text; output `i` corresponds to input `i`.
    ///
    /// Blank inputs are passed through unchanged without a request.
    pub async fn translate_items(&self, texts: &[String]) -> Vec<Result<String, ElementError>> {
        let total_windows = texts.len().div_ceil(self.batch_size);
        info!(
            "Translating {} texts from {} to {} in {} windows",
            texts.len(),
            self.source_lang,
            self.target_lang,
            total_windows
        );

        let mut results = Vec::with_capacity(texts.len());
        for (w, window) in texts.chunks(self.batch_size).enumerate() {
            debug!("Processing window {}/{}", w + 1, total_windows);
            let window_results = self.translate_window(window).await;
            let failed = window_results.iter().filter(|r| r.is_err()).count();
            if let Some(ref cb) = self.progress {
                cb.on_window_complete(w + 1, total_windows, failed);
            }
            results.extend(window_results);
        }
        results
    }

    /// Like [`Self::translate_items`] with failures rendered as placeholders.
    pub async fn translate_batch(&self, texts: &[String]) -> Vec<String> {
        self.translate_items(texts)
            .await
            .into_iter()
            .map(|r| match r {
                Ok(t) => t,
                Err(ElementError::Translation { detail, .. }) => translation_error(detail),
                Err(other) => translation_error(other),
            })
            .collect()
    }

    /// Translate one text. A failure yields the error placeholder.
    pub async fn translate_text(&self, text: &str) -> String {
        let mut out = self.translate_batch(&[text.to_string()]).await;
        out.pop().unwrap_or_default()
    }

    /// Deduplicate `texts`, translate each distinct non-blank string once and
    /// zip sources with results.
    ///
    /// Failed items are kept in the map as their error placeholder so the
    /// document shows a visible trace; each failure is also returned.
    pub async fn build_translation_map(
        &self,
        texts: &[String],
    ) -> (TranslationMap, Vec<ElementError>) {
        let unique = dedup_non_blank(texts);
        if unique.len() < texts.len() {
            debug!(
                "Deduplicated {} texts down to {} distinct strings",
                texts.len(),
                unique.len()
            );
        }

        let results = self.translate_items(&unique).await;
        let mut warnings = Vec::new();
        let pairs: Vec<(String, String)> = unique
            .into_iter()
            .zip(results)
            .map(|(source, result)| {
                let value = match result {
                    Ok(t) => t,
                    Err(e) => {
                        let placeholder = match &e {
                            ElementError::Translation { detail, .. } => translation_error(detail),
                            other => translation_error(other),
                        };
                        warnings.push(e);
                        placeholder
                    }
                };
                (source, value)
            })
            .collect();

        (TranslationMap::from_pairs(pairs), warnings)
    }

    async fn translate_window(&self, window: &[String]) -> Vec<Result<String, ElementError>> {
        let pending: Vec<usize> = (0..window.len())
            .filter(|&i| !is_blank(&window[i]))
            .collect();
        let payloads: Vec<Value> = pending
            .iter()
            .map(|&i| build_request(&window[i], &self.source_lang, &self.target_lang, &self.model))
            .collect();

        let mut responses = self
            .client
            .post_batch(CHAT_COMPLETIONS, &payloads)
            .await
            .into_iter();

        let mut out = Vec::with_capacity(window.len());
        for (i, text) in window.iter().enumerate() {
            if !pending.contains(&i) {
                out.push(Ok(text.clone()));
                continue;
            }
            let result = match responses.next() {
                Some(Ok(body)) => extract_content(&body),
                Some(Err(e)) => Err(e),
                None => Err(ApiError::MissingContent {
                    detail: "no response for request".to_string(),
                }),
            };
            out.push(match result {
                Ok(content) => Ok(clean_translation(text, &content)),
                Err(e) => {
                    warn!("Translation failed for {:?}: {}", preview(text), e);
                    Err(ElementError::Translation {
                        text: text.clone(),
                        detail: e.to_string(),
                    })
                }
            });
        }
        out
    }
}

/// Translate `texts` in windows of `batch_size` against `endpoint`.
///
/// Output has the same length and order as `texts`; failed items hold an
/// error placeholder. Errors only on endpoint misconfiguration.
pub async fn translate_batch(
    texts: &[String],
    source_lang: &str,
    target_lang: &str,
    endpoint: &EndpointConfig,
    batch_size: usize,
) -> Result<Vec<String>, TranslateError> {
    let translator =
        Translator::new(endpoint, source_lang, target_lang)?.with_batch_size(batch_size);
    Ok(translator.translate_batch(texts).await)
}

/// Translate a single text against `endpoint`.
pub async fn translate_text(
    text: &str,
    source_lang: &str,
    target_lang: &str,
    endpoint: &EndpointConfig,
) -> Result<String, TranslateError> {
    let translator = Translator::new(endpoint, source_lang, target_lang)?;
    Ok(translator.translate_text(text).await)
}

/// Distinct non-blank strings in first-seen order; exact byte equality.
fn dedup_non_blank(texts: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    texts
        .iter()
        .filter(|t| !is_blank(t) && seen.insert(t.as_str()))
        .cloned()
        .collect()
}

fn preview(text: &str) -> String {
    text.chars().take(40).collect()
}
