//! Configuration types for the rewrite pipeline.
//!
//! All behaviour is controlled through [`ForgeConfig`], built via its
//! [`ForgeConfigBuilder`]. The config also carries optional pre-built
//! collaborators (text generator, image generator, page fetcher); whatever is
//! left unset is resolved once by [`crate::Forge::new`].

use crate::error::ForgeError;
use crate::pipeline::fetch::PageFetcher;
use crate::pipeline::image::ImageGenerator;
use crate::pipeline::rewrite::TextGenerator;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Default model for OpenAI-compatible image generation.
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

/// Configuration for a [`crate::Forge`].
///
/// # Example
/// ```rust
/// use contentforge::{ForgeConfig, SourcePolicy};
///
/// let config = ForgeConfig::builder()
///     .source_policy(SourcePolicy::Strict)
///     .include_summary(true)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ForgeConfig {
    /// What to do when a source URL cannot be extracted. Default: [`SourcePolicy::Lenient`].
    pub source_policy: SourcePolicy,

    /// Reject requests that supply both or neither of content and source URL. Default: false.
    ///
    /// With the default, a URL silently wins over pasted content and a request
    /// with neither is answered with generated content.
    pub require_exactly_one_source: bool,

    /// Ask the generator for a separate executive summary. Default: false.
    pub include_summary: bool,

    /// LLM model identifier, e.g. "gpt-4.1-mini", "claude-sonnet-4-20250514".
    /// If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed text generator. Takes precedence over every provider setting.
    pub text_generator: Option<Arc<dyn TextGenerator>>,

    /// Pre-constructed image generator. If None, an OpenAI-compatible
    /// generator is created when `OPENAI_API_KEY` is set.
    pub image_generator: Option<Arc<dyn ImageGenerator>>,

    /// Pre-constructed page fetcher. If None, an HTTP fetcher is built.
    pub fetcher: Option<Arc<dyn PageFetcher>>,

    /// Sampling temperature for the rewrite. Default: 0.7.
    ///
    /// Rewriting is an editorial task, not transcription; some variety in
    /// phrasing is wanted.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate for one rewrite. Default: 4096.
    pub max_tokens: usize,

    /// Approximate length of the rewritten post, in words. Default: 800.
    pub target_words: usize,

    /// Custom system prompt. If None, uses the built-in prompt.
    pub system_prompt: Option<String>,

    /// Image model for the OpenAI-compatible image endpoint. Default: [`DEFAULT_IMAGE_MODEL`].
    pub image_model: String,

    /// Requested image size. Default: "1792x1024" (a wide header).
    pub image_size: String,

    /// Timeout for fetching a source page, in seconds. Default: 15.
    pub fetch_timeout_secs: u64,

    /// Timeout for each generation call (text or image), in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Pages larger than this are rejected before parsing. Default: 5 MiB.
    pub max_page_bytes: usize,

    /// User-Agent sent when fetching source pages.
    pub user_agent: String,

    /// Progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            source_policy: SourcePolicy::default(),
            require_exactly_one_source: false,
            include_summary: false,
            model: None,
            provider_name: None,
            provider: None,
            text_generator: None,
            image_generator: None,
            fetcher: None,
            temperature: 0.7,
            max_tokens: 4096,
            target_words: 800,
            system_prompt: None,
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            image_size: "1792x1024".to_string(),
            fetch_timeout_secs: 15,
            api_timeout_secs: 120,
            max_page_bytes: 5 * 1024 * 1024,
            user_agent: concat!("contentforge/", env!("CARGO_PKG_VERSION")).to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ForgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForgeConfig")
            .field("source_policy", &self.source_policy)
            .field("require_exactly_one_source", &self.require_exactly_one_source)
            .field("include_summary", &self.include_summary)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field(
                "text_generator",
                &self.text_generator.as_ref().map(|_| "<dyn TextGenerator>"),
            )
            .field(
                "image_generator",
                &self.image_generator.as_ref().map(|_| "<dyn ImageGenerator>"),
            )
            .field("fetcher", &self.fetcher.as_ref().map(|_| "<dyn PageFetcher>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("target_words", &self.target_words)
            .field("image_model", &self.image_model)
            .field("image_size", &self.image_size)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ForgeConfig {
    /// Create a new builder for `ForgeConfig`.
    pub fn builder() -> ForgeConfigBuilder {
        ForgeConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ForgeConfig`].
#[derive(Debug)]
pub struct ForgeConfigBuilder {
    config: ForgeConfig,
}

impl ForgeConfigBuilder {
    pub fn source_policy(mut self, policy: SourcePolicy) -> Self {
        self.config.source_policy = policy;
        self
    }

    pub fn require_exactly_one_source(mut self, v: bool) -> Self {
        self.config.require_exactly_one_source = v;
        self
    }

    pub fn include_summary(mut self, v: bool) -> Self {
        self.config.include_summary = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn text_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.config.text_generator = Some(generator);
        self
    }

    pub fn image_generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.config.image_generator = Some(generator);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.config.fetcher = Some(fetcher);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn target_words(mut self, n: usize) -> Self {
        self.config.target_words = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.config.image_model = model.into();
        self
    }

    pub fn image_size(mut self, size: impl Into<String>) -> Self {
        self.config.image_size = size.into();
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_page_bytes(mut self, n: usize) -> Self {
        self.config.max_page_bytes = n;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ForgeConfig, ForgeError> {
        let c = &self.config;
        if c.fetch_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(ForgeError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens < 256 {
            return Err(ForgeError::InvalidConfig(format!(
                "max_tokens must be ≥ 256, got {}",
                c.max_tokens
            )));
        }
        if c.target_words == 0 {
            return Err(ForgeError::InvalidConfig(
                "target_words must be ≥ 1".into(),
            ));
        }
        if c.max_page_bytes == 0 {
            return Err(ForgeError::InvalidConfig(
                "max_page_bytes must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What the source resolver does when a source URL cannot be extracted.
///
/// | Policy | Extraction failure |
/// |--------|--------------------|
/// | `Lenient` | logged; the rewrite proceeds with empty content and `generated` provenance (default) |
/// | `Strict`  | the text channel fails with the extraction error |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePolicy {
    #[default]
    Lenient,
    Strict,
}
