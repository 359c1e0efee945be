//! Configuration types for PDF text extraction.
//!
//! Two structs, two concerns:
//!
//! * [`ApiConfig`]: where the vision model lives and how to authenticate.
//!   Consumed by [`crate::client::OpenAiCompatClient`].
//! * [`ExtractionConfig`]: everything the pipeline itself needs: render
//!   resolution, image limits, sampling options, retry schedule. Built via
//!   [`ExtractionConfigBuilder`], which validates ranges.
//!
//! Both are plain values constructed by the caller and passed in explicitly;
//! nothing here reads global state except [`ApiConfig::from_env`].

use crate::error::PdfTextError;
use crate::progress::ProgressCallback;
use crate::prompts::{CUSTOM_PROMPT_VERSION, PROMPT_VERSION};
use std::fmt;
use std::time::Duration;

/// Default vision model served by DeepInfra.
pub const DEFAULT_MODEL: &str = "meta-llama/Llama-3.2-11B-Vision-Instruct";

/// DeepInfra's OpenAI-compatible API root.
pub const DEFAULT_BASE_URL: &str = "https://api.deepinfra.com/v1/openai";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "DEEPINFRA_API_KEY";
/// Environment variable overriding [`DEFAULT_MODEL`].
pub const MODEL_ENV: &str = "MODEL_NAME";
/// Environment variable overriding [`DEFAULT_BASE_URL`].
pub const BASE_URL_ENV: &str = "API_BASE_URL";

/// 10 MiB upload cap.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Connection settings for the OpenAI-compatible extraction endpoint.
#[derive(Clone)]
pub struct ApiConfig {
    /// Bearer token. Never printed by `Debug`.
    pub api_key: String,
    /// API root, e.g. `https://api.deepinfra.com/v1/openai`.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Per-request timeout in seconds. Default: 60.
    pub timeout_secs: u64,
}

impl ApiConfig {
    /// Settings for the default DeepInfra endpoint and model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 60,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Read `DEEPINFRA_API_KEY`, `MODEL_NAME` and `API_BASE_URL`.
    ///
    /// The key is required; the other two fall back to the defaults.
    pub fn from_env() -> Result<Self, PdfTextError> {
        let key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PdfTextError::InvalidConfig(format!("{API_KEY_ENV} is not set")))?;

        let mut api = Self::new(key);
        if let Ok(model) = std::env::var(MODEL_ENV) {
            if !model.is_empty() {
                api.model = model;
            }
        }
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.is_empty() {
                api.base_url = url;
            }
        }
        Ok(api)
    }

    /// `{base_url}/chat/completions`, tolerant of a trailing slash.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Configuration for one extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2txt::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(200)
///     .max_dimension(2000)
///     .jpeg_quality(90)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI. Range: 72–600. Default: 200.
    pub dpi: u32,

    /// Cap on the rendered page width in pixels. Default: 1700.
    ///
    /// Applied before [`Self::max_dimension`]; `None` renders at full DPI.
    pub max_width: Option<u32>,

    /// Longest edge allowed after normalisation, in pixels. Default: 2000.
    pub max_dimension: u32,

    /// JPEG quality (1–100). Default: 95.
    pub jpeg_quality: u8,

    /// Largest base64 payload sent for one page. Default: 20 MiB.
    ///
    /// Pages above it are marked with an error and skipped; the run goes on.
    pub max_payload_len: Option<usize>,

    /// Largest accepted input document in bytes. Default: 10 MiB.
    pub max_upload_bytes: u64,

    /// Maximum tokens the model may generate per page. Default: 4096.
    pub max_tokens: u32,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Total attempts per page, first call included. Default: 3.
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds. Default: 4000.
    ///
    /// Doubles after each retry up to [`Self::retry_max_delay_ms`].
    pub retry_initial_delay_ms: u64,

    /// Upper bound on a single retry delay, in milliseconds. Default: 10000.
    pub retry_max_delay_ms: u64,

    /// Pages in flight at once. Default: 1 (strictly sequential).
    pub concurrency: usize,

    /// Custom system prompt. If None, uses [`crate::prompts::EXTRACTION_PROMPT`].
    pub system_prompt: Option<String>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Observer for run state and per-page progress.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_width: Some(1700),
            max_dimension: 2000,
            jpeg_quality: 95,
            max_payload_len: Some(20 * 1024 * 1024),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_tokens: 4096,
            temperature: 0.3,
            max_attempts: 3,
            retry_initial_delay_ms: 4000,
            retry_max_delay_ms: 10_000,
            concurrency: 1,
            system_prompt: None,
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_width", &self.max_width)
            .field("max_dimension", &self.max_dimension)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("max_payload_len", &self.max_payload_len)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("max_attempts", &self.max_attempts)
            .field("retry_initial_delay_ms", &self.retry_initial_delay_ms)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("concurrency", &self.concurrency)
            .field("custom_prompt", &self.system_prompt.is_some())
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgress>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Which prompt this run sends: [`PROMPT_VERSION`] or
    /// [`CUSTOM_PROMPT_VERSION`].
    pub fn prompt_version(&self) -> &'static str {
        match self.system_prompt {
            Some(_) => CUSTOM_PROMPT_VERSION,
            None => PROMPT_VERSION,
        }
    }

    /// Delay before retry number `retry` (1 = the second attempt).
    ///
    /// `min(initial × 2^(retry-1), max)`; with the defaults: 4 s, 8 s, 10 s, …
    pub fn retry_delay(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(32);
        let ms = self
            .retry_initial_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.retry_max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_width(mut self, px: Option<u32>) -> Self {
        self.config.max_width = px;
        self
    }

    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q;
        self
    }

    pub fn max_payload_len(mut self, len: Option<usize>) -> Self {
        self.config.max_payload_len = len;
        self
    }

    pub fn max_upload_bytes(mut self, n: u64) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn retry_initial_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_initial_delay_ms = ms;
        self
    }

    pub fn retry_max_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_max_delay_ms = ms;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, PdfTextError> {
        let c = &self.config;
        if !(72..=600).contains(&c.dpi) {
            return Err(PdfTextError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.max_width == Some(0) {
            return Err(PdfTextError::InvalidConfig("max width must be ≥ 1".into()));
        }
        if c.max_dimension < 64 {
            return Err(PdfTextError::InvalidConfig(format!(
                "max dimension must be ≥ 64 px, got {}",
                c.max_dimension
            )));
        }
        if !(1..=100).contains(&c.jpeg_quality) {
            return Err(PdfTextError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if c.max_attempts == 0 {
            return Err(PdfTextError::InvalidConfig("max attempts must be ≥ 1".into()));
        }
        if c.concurrency == 0 {
            return Err(PdfTextError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        if c.retry_initial_delay_ms > c.retry_max_delay_ms {
            return Err(PdfTextError::InvalidConfig(format!(
                "initial retry delay ({}ms) exceeds the maximum ({}ms)",
                c.retry_initial_delay_ms, c.retry_max_delay_ms
            )));
        }
        if !c.temperature.is_finite() || !(0.0..=2.0).contains(&c.temperature) {
            return Err(PdfTextError::InvalidConfig(format!(
                "temperature must be 0.0–2.0, got {}",
                c.temperature
            )));
        }
        if c.max_tokens == 0 {
            return Err(PdfTextError::InvalidConfig("max tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
