//! Configuration types for PDF translation.
//!
//! Two structs split the knobs by lifetime:
//!
//! * [`EndpointConfig`] — where and how to reach the language model. Usually
//!   resolved once from explicit values with environment fallbacks.
//! * [`TranslationConfig`] — what a single run does (languages, tables,
//!   batching, image quality). Built via [`TranslationConfigBuilder`].
//!
//! # Design choice: builder over constructor
//! Most runs only set two languages; the builder lets callers rely on
//! documented defaults for the rest.

use crate::error::TranslateError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the language-model base URL.
pub const ENV_API_URL: &str = "TRANSLATION_API_URL";
/// Environment variable holding the bearer credential.
pub const ENV_API_TOKEN: &str = "TRANSLATION_API_TOKEN";
/// Environment variable holding the model name.
pub const ENV_MODEL: &str = "TRANSLATION_MODEL";

const DEFAULT_MODEL: &str = "sealion";

/// Connection settings for the chat-completions endpoint.
///
/// # Example
/// ```rust
/// use edgequake_pdf_translate::EndpointConfig;
///
/// let endpoint = EndpointConfig::new("http://localhost:8000", "token-abc123", "sealion")
///     .with_timeout_secs(120);
/// assert!(endpoint.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct EndpointConfig {
    /// Base URL, e.g. `http://localhost:8000`. `/v1/chat/completions` is appended.
    pub base_url: String,

    /// Bearer credential sent as `Authorization: Bearer <api_key>`.
    pub api_key: String,

    /// Model name placed in every request body.
    pub model: String,

    /// Per-request timeout in seconds. Default: 600.
    ///
    /// Translation of a long paragraph by a self-hosted model can take
    /// minutes; the timeout only guards against hung connections.
    pub timeout_secs: u64,

    /// Idle keep-alive connections retained by the pool. Default: 10.
    pub max_idle_connections: usize,

    /// Upper bound on simultaneously open requests. Default: 20.
    pub max_connections: usize,
}

impl EndpointConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: 600,
            max_idle_connections: 10,
            max_connections: 20,
        }
    }

    /// Build from `TRANSLATION_API_URL`, `TRANSLATION_API_TOKEN` and
    /// `TRANSLATION_MODEL`. Missing variables become empty strings (model
    /// falls back to `"sealion"`); call [`Self::validate`] before use.
    pub fn from_env() -> Self {
        Self::resolve(None, None, None)
    }

    /// Explicit values win; empty or absent values fall back to the environment.
    pub fn resolve(url: Option<&str>, api_key: Option<&str>, model: Option<&str>) -> Self {
        fn pick(explicit: Option<&str>, var: &str) -> Option<String> {
            explicit
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .or_else(|| std::env::var(var).ok().filter(|v| !v.is_empty()))
        }

        Self::new(
            pick(url, ENV_API_URL).unwrap_or_default(),
            pick(api_key, ENV_API_TOKEN).unwrap_or_default(),
            pick(model, ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        )
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }

    pub fn with_pool_limits(mut self, max_idle: usize, max_connections: usize) -> Self {
        self.max_connections = max_connections.max(1);
        self.max_idle_connections = max_idle.min(self.max_connections);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Fail fast, before any network call, when URL or credential is missing.
    pub fn validate(&self) -> Result<(), TranslateError> {
        if self.base_url.trim().is_empty() {
            return Err(TranslateError::Configuration(format!(
                "API URL is not configured. Pass one explicitly or set {ENV_API_URL}."
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(TranslateError::Configuration(format!(
                "API token is not configured. Pass one explicitly or set {ENV_API_TOKEN}."
            )));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(TranslateError::Configuration(format!(
                "API URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_idle_connections", &self.max_idle_connections)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Configuration for one PDF translation run.
///
/// Built via [`TranslationConfig::builder()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf_translate::TranslationConfig;
///
/// let config = TranslationConfig::builder()
///     .source_lang("English")
///     .target_lang("French")
///     .include_tables(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size, 5);
/// ```
#[derive(Clone)]
pub struct TranslationConfig {
    /// Human-readable source language name, embedded in the prompt.
    pub source_lang: String,

    /// Human-readable target language name. Also labels the overlay layer.
    pub target_lang: String,

    /// Translate and redraw table cells as well as body text. Default: false.
    pub include_tables: bool,

    /// Requests issued concurrently per translation window. Default: 5.
    ///
    /// Windows run one after another, so this is also the peak number of
    /// in-flight requests a run puts on the endpoint.
    pub batch_size: usize,

    /// Run the image re-encoding pass after finalisation. Default: true.
    pub compress_images: bool,

    /// JPEG quality used when re-encoding embedded images (1–100). Default: 80.
    pub image_quality: u8,

    /// Pages per compression batch. Default: 50.
    pub compression_batch_size: usize,

    /// TrueType font used to draw translations. Default: `None`, the bundled
    /// DejaVu Sans.
    ///
    /// Set this for target scripts the bundled font does not cover, such as
    /// Thai or Chinese (e.g. a Noto Sans Thai or Noto Sans SC `.ttf`).
    pub font_path: Option<PathBuf>,

    /// Optional observer notified at each pipeline stage.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_lang: "English".to_string(),
            target_lang: String::new(),
            include_tables: false,
            batch_size: 5,
            compress_images: true,
            image_quality: 80,
            compression_batch_size: 50,
            font_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TranslationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationConfig")
            .field("source_lang", &self.source_lang)
            .field("target_lang", &self.target_lang)
            .field("include_tables", &self.include_tables)
            .field("batch_size", &self.batch_size)
            .field("compress_images", &self.compress_images)
            .field("image_quality", &self.image_quality)
            .field("compression_batch_size", &self.compression_batch_size)
            .field("font_path", &self.font_path)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn TranslationProgressCallback>"),
            )
            .finish()
    }
}

impl TranslationConfig {
    /// Create a new builder for `TranslationConfig`.
    pub fn builder() -> TranslationConfigBuilder {
        TranslationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Label of the toggleable layer carrying the translated overlay.
    pub fn layer_name(&self) -> String {
        format!("{} Translation", self.target_lang)
    }
}

/// Builder for [`TranslationConfig`].
#[derive(Debug)]
pub struct TranslationConfigBuilder {
    config: TranslationConfig,
}

impl TranslationConfigBuilder {
    pub fn source_lang(mut self, lang: impl Into<String>) -> Self {
        self.config.source_lang = lang.into();
        self
    }

    pub fn target_lang(mut self, lang: impl Into<String>) -> Self {
        self.config.target_lang = lang.into();
        self
    }

    pub fn include_tables(mut self, v: bool) -> Self {
        self.config.include_tables = v;
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n.max(1);
        self
    }

    pub fn compress_images(mut self, v: bool) -> Self {
        self.config.compress_images = v;
        self
    }

    pub fn image_quality(mut self, q: u8) -> Self {
        self.config.image_quality = q.clamp(1, 100);
        self
    }

    pub fn compression_batch_size(mut self, n: usize) -> Self {
        self.config.compression_batch_size = n.max(1);
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TranslationConfig, TranslateError> {
        let c = &self.config;
        if c.source_lang.trim().is_empty() {
            return Err(TranslateError::Configuration(
                "Source language must not be empty".into(),
            ));
        }
        if c.target_lang.trim().is_empty() {
            return Err(TranslateError::Configuration(
                "Target language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
