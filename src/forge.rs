//! The orchestrator: one request in, one [`CombinedResult`] out.
//!
//! A request fans out into two independent chains polled concurrently on the
//! caller's task:
//!
//! ```text
//!          ┌─ text:  resolve source ─▶ rewrite ─▶ postprocess/toc ─┐
//! request ─┤                                                       ├─▶ CombinedResult
//!          └─ image: supplied URL | generate | none ───────────────┘
//! ```
//!
//! Neither chain can cancel or fail the other. Whatever happens inside a
//! chain, including a collaborator panicking, is captured as that chain's
//! [`ChannelError`]. Only request validation fails the call as a whole.

use crate::config::{ForgeConfig, DEFAULT_MODEL};
use crate::error::{ChannelError, ForgeError};
use crate::output::{CombinedResult, ImageResult, ProcessStats, RewriteResult};
use crate::pipeline::fetch::{HttpFetcher, PageFetcher};
use crate::pipeline::image::{resolve_image, ImageGenerator, OpenAiImageGenerator};
use crate::pipeline::rewrite::{rewrite, LlmTextGenerator, TextGenerator};
use crate::pipeline::source::resolve_source;
use crate::request::{RewriteRequest, ValidatedRequest};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Rewrites content and resolves header images.
///
/// Collaborators (text generator, image generator, page fetcher) are resolved
/// once in [`Forge::new`] and shared by every request.
///
/// # Example
/// ```rust,no_run
/// use contentforge::{Forge, ForgeConfig, RewriteRequest};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let forge = Forge::new(ForgeConfig::default())?;
/// let request = RewriteRequest::new("Senior Platform Engineer", "https://jobs.example.org/apply")
///     .source_url("https://blog.example.org/platform-team")
///     .image_prompt("a minimalist abstract gradient");
/// let result = forge.process(&request).await?;
/// if let Some(md) = result.to_markdown() {
///     println!("{md}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct Forge {
    config: ForgeConfig,
    text: Arc<dyn TextGenerator>,
    image: Option<Arc<dyn ImageGenerator>>,
    fetcher: Arc<dyn PageFetcher>,
}

impl std::fmt::Debug for Forge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forge")
            .field("config", &self.config)
            .field("image_generation", &self.image.is_some())
            .finish()
    }
}

impl Forge {
    /// Resolve collaborators and build a forge.
    ///
    /// # Errors
    /// [`ForgeError::ProviderNotConfigured`] when no text generator is injected
    /// and no LLM provider can be found in the configuration or environment.
    pub fn new(config: ForgeConfig) -> Result<Self, ForgeError> {
        let text: Arc<dyn TextGenerator> = match &config.text_generator {
            Some(generator) => Arc::clone(generator),
            None => {
                let provider = resolve_provider(&config)?;
                Arc::new(LlmTextGenerator::new(
                    provider,
                    config.temperature,
                    config.max_tokens,
                ))
            }
        };

        let image: Option<Arc<dyn ImageGenerator>> = match &config.image_generator {
            Some(generator) => Some(Arc::clone(generator)),
            None => OpenAiImageGenerator::from_env(
                config.image_model.as_str(),
                config.image_size.as_str(),
                config.api_timeout_secs,
            )
            .map_err(|e| ForgeError::InvalidConfig(format!("image generator: {e}")))?
            .map(|g| Arc::new(g) as Arc<dyn ImageGenerator>),
        };
        if image.is_none() {
            debug!("No image generator available; image prompts will fail the image channel");
        }

        let fetcher: Arc<dyn PageFetcher> = match &config.fetcher {
            Some(fetcher) => Arc::clone(fetcher),
            None => Arc::new(
                HttpFetcher::new(
                    config.fetch_timeout_secs,
                    config.max_page_bytes,
                    &config.user_agent,
                )
                .map_err(|e| ForgeError::Internal(format!("failed to build HTTP client: {e}")))?,
            ),
        };

        Ok(Self {
            config,
            text,
            image,
            fetcher,
        })
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Process one request.
    ///
    /// # Returns
    /// `Ok(CombinedResult)` whenever the request was dispatched, even if one
    /// or both channels failed (check `text_error()` / `image_error()`).
    ///
    /// # Errors
    /// [`ForgeError::Validation`] when the request is malformed; nothing is
    /// fetched or generated in that case.
    pub async fn process(&self, request: &RewriteRequest) -> Result<CombinedResult, ForgeError> {
        let validated = request.validate(self.config.require_exactly_one_source)?;
        let request_id = Uuid::new_v4();

        self.process_validated(validated, request_id)
            .instrument(info_span!("process", %request_id))
            .await
    }

    async fn process_validated(
        &self,
        request: ValidatedRequest,
        request_id: Uuid,
    ) -> Result<CombinedResult, ForgeError> {
        let start = Instant::now();
        info!("Processing '{}'", request.title);
        if let Some(cb) = &self.config.progress_callback {
            cb.on_process_start(request_id);
        }

        let ((text, text_ms), (image, image_ms)) =
            tokio::join!(self.text_channel(&request), self.image_channel(&request));

        let stats = ProcessStats {
            text_duration_ms: text_ms,
            image_duration_ms: image_ms,
            total_duration_ms: start.elapsed().as_millis() as u64,
            input_tokens: text.as_ref().map_or(0, |t| t.input_tokens as u64),
            output_tokens: text.as_ref().map_or(0, |t| t.output_tokens as u64),
        };

        info!(
            "Done in {}ms: text {}, image {}",
            stats.total_duration_ms,
            if text.is_ok() { "ok" } else { "failed" },
            if image.is_ok() { "ok" } else { "failed" },
        );
        if let Some(cb) = &self.config.progress_callback {
            cb.on_process_complete(text.is_ok(), image.is_ok());
        }

        Ok(CombinedResult {
            request_id,
            apply_link: request.apply_link,
            text,
            image,
            stats,
        })
    }

    /// Source resolution then rewrite. Returns the outcome and its duration.
    pub(crate) async fn text_channel(
        &self,
        request: &ValidatedRequest,
    ) -> (Result<RewriteResult, ChannelError>, u64) {
        let start = Instant::now();
        let outcome = AssertUnwindSafe(self.run_text(request))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ChannelError::Unknown(panic_message(panic.as_ref()))));
        let elapsed = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(result) => {
                debug!(
                    "Text channel: {} bytes, {:?}, {}ms",
                    result.body.len(),
                    result.provenance,
                    elapsed
                );
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_text_complete(result.body.len());
                }
            }
            Err(e) => {
                warn!("Text channel failed: {}", e);
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_text_error(&e.to_string());
                }
            }
        }
        (outcome, elapsed)
    }

    async fn run_text(&self, request: &ValidatedRequest) -> Result<RewriteResult, ChannelError> {
        let content = resolve_source(request, self.fetcher.as_ref(), self.config.source_policy)
            .await
            .map_err(ChannelError::Extraction)?;

        if let Some(cb) = &self.config.progress_callback {
            if let Some(e) = content.fallback() {
                cb.on_extraction_fallback(&e.to_string());
            }
            cb.on_source_resolved(content.provenance());
        }

        rewrite(self.text.as_ref(), &request.title, &content, &self.config).await
    }

    /// Header-image resolution. Returns the outcome and its duration.
    pub(crate) async fn image_channel(
        &self,
        request: &ValidatedRequest,
    ) -> (Result<Option<ImageResult>, ChannelError>, u64) {
        let start = Instant::now();
        let outcome = AssertUnwindSafe(resolve_image(
            request,
            self.image.as_deref(),
            self.config.api_timeout_secs,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(ChannelError::Unknown(panic_message(panic.as_ref()))));
        let elapsed = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(image) => {
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_image_complete(image.as_ref().map(|i| i.url.as_str()));
                }
            }
            Err(e) => {
                warn!("Image channel failed: {}", e);
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_image_error(&e.to_string());
                }
            }
        }
        (outcome, elapsed)
    }

    /// Process a request and write the assembled markdown to `output_path`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files. When
    /// the text channel failed there is nothing to write: the file is left
    /// untouched and the result is returned for the caller to inspect.
    pub async fn process_to_file(
        &self,
        request: &RewriteRequest,
        output_path: impl AsRef<Path>,
    ) -> Result<CombinedResult, ForgeError> {
        let result = self.process(request).await?;
        let path = output_path.as_ref();

        let Some(markdown) = result.to_markdown() else {
            warn!("Text channel failed; not writing {}", path.display());
            return Ok(result);
        };

        let write_err = |e: std::io::Error| ForgeError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
            }
        }

        let tmp_path = path.with_extension("md.tmp");
        tokio::fs::write(&tmp_path, markdown.as_bytes())
            .await
            .map_err(write_err)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

        info!("Wrote {}", path.display());
        Ok(result)
    }

    /// Synchronous wrapper around [`Forge::process`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from within
    /// an async context.
    pub fn process_sync(&self, request: &RewriteRequest) -> Result<CombinedResult, ForgeError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ForgeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.process(request))
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("collaborator panicked: {detail}")
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ForgeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ForgeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is
/// 2. **Named provider + model** (`config.provider_name`), API key read from
///    the provider's usual environment variable
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    checked before auto-detection so the model choice is honoured even
///    when several API keys are present
/// 4. **OpenAI key** (`OPENAI_API_KEY`), preferred over other detected keys
/// 5. **Full auto-detection** (`ProviderFactory::from_env`)
fn resolve_provider(config: &ForgeConfig) -> Result<Arc<dyn LLMProvider>, ForgeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ForgeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
