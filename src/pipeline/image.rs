//! Header-image resolution.
//!
//! Priority is fixed: a supplied `imageUrl` is passed through untouched
//! (the generator is never called), otherwise an `imagePrompt` is sent to
//! the [`ImageGenerator`], otherwise there is no image. Failures here are
//! reported on the image channel only.
//!
//! [`OpenAiImageGenerator`] talks to any OpenAI-compatible
//! `/v1/images/generations` endpoint.

use crate::error::{ChannelError, ServiceError};
use crate::output::{ImageOrigin, ImageResult};
use crate::request::ValidatedRequest;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Default endpoint base for [`OpenAiImageGenerator::from_env`].
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// The image generation service. Returns a URL (`https://` or `data:`).
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError>;
}

/// Resolve the header image for a request.
///
/// `Ok(None)` means the request asked for no image.
pub async fn resolve_image(
    request: &ValidatedRequest,
    generator: Option<&dyn ImageGenerator>,
    timeout_secs: u64,
) -> Result<Option<ImageResult>, ChannelError> {
    if let Some(url) = &request.image_url {
        debug!("Using supplied header image {}", url);
        return Ok(Some(ImageResult {
            url: url.clone(),
            origin: ImageOrigin::Supplied,
        }));
    }

    let Some(prompt) = &request.image_prompt else {
        return Ok(None);
    };

    let generator = generator.ok_or_else(|| ChannelError::ImageGeneration {
        detail: "no image generator configured".to_string(),
    })?;

    let url = tokio::time::timeout(Duration::from_secs(timeout_secs), generator.generate(prompt))
        .await
        .map_err(|_| ServiceError::Timeout { secs: timeout_secs })
        .and_then(|r| r)
        .map_err(ChannelError::image)?;

    if url.trim().is_empty() {
        return Err(ChannelError::ImageGeneration {
            detail: "no image produced".to_string(),
        });
    }

    info!("Generated header image ({} chars)", url.len());
    Ok(Some(ImageResult {
        url,
        origin: ImageOrigin::Generated,
    }))
}

// ── OpenAI-compatible client ─────────────────────────────────────────────

/// `reqwest`-backed [`ImageGenerator`] for OpenAI-compatible APIs.
#[derive(Debug, Clone)]
pub struct OpenAiImageGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    size: String,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAiImageGenerator {
    /// Build a client for `{base_url}/v1/images/generations`.
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: impl Into<String>,
        size: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| ServiceError::Request(format!("invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ServiceError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/images/generations", base_url.trim_end_matches('/')),
            model: model.into(),
            size: size.into(),
        })
    }

    /// Build from `OPENAI_API_KEY` (and optional `OPENAI_BASE_URL`).
    ///
    /// Returns `Ok(None)` when no key is set.
    pub fn from_env(
        model: impl Into<String>,
        size: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Option<Self>, ServiceError> {
        let key = match std::env::var("OPENAI_API_KEY") {
            Ok(k) if !k.is_empty() => k,
            _ => return Ok(None),
        };
        let base = std::env::var("OPENAI_BASE_URL")
            .ok()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        let base = base.trim_end_matches('/').trim_end_matches("/v1").to_string();
        Self::new(&base, &key, model, size, timeout_secs).map(Some)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        let request = ImageRequest {
            model: &self.model,
            prompt,
            n: 1,
            size: &self.size,
        };

        debug!("Requesting image from {} ({})", self.endpoint, self.model);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(ServiceError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body: ImageResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(format!("failed to parse image response: {e}")))?;

        let first = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Malformed("response contains no images".to_string()))?;

        match (first.url, first.b64_json) {
            (Some(url), _) if !url.is_empty() => Ok(url),
            (_, Some(b64)) if !b64.is_empty() => Ok(format!("data:image/png;base64,{b64}")),
            _ => Err(ServiceError::Malformed(
                "image entry has neither url nor b64_json".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RewriteRequest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        reply: Result<String, ServiceError>,
        calls: AtomicUsize,
    }

    impl Counting {
        fn new(reply: Result<String, ServiceError>) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageGenerator for Counting {
        async fn generate(&self, _prompt: &str) -> Result<String, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn request(image_url: Option<&str>, prompt: Option<&str>) -> ValidatedRequest {
        let mut r = RewriteRequest::new("Senior Platform Engineer", "https://jobs.example.org/apply");
        if let Some(u) = image_url {
            r = r.image_url(u);
        }
        if let Some(p) = prompt {
            r = r.image_prompt(p);
        }
        r.validate(false).unwrap()
    }

    #[tokio::test]
    async fn supplied_url_wins_and_skips_generator() {
        let gen = Counting::new(Ok("https://img.example.org/gen.png".into()));
        let req = request(
            Some("https://cdn.example.org/header.jpg"),
            Some("a minimalist abstract gradient"),
        );
        let img = resolve_image(&req, Some(&gen), 10).await.unwrap().unwrap();
        assert_eq!(img.url, "https://cdn.example.org/header.jpg");
        assert_eq!(img.origin, ImageOrigin::Supplied);
        assert_eq!(gen.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn supplied_url_is_returned_unchanged() {
        let req = request(Some("https://CDN.example.org/a b.jpg"), None);
        let img = resolve_image(&req, None, 10).await.unwrap().unwrap();
        assert_eq!(img.url, "https://CDN.example.org/a b.jpg");
    }

    #[tokio::test]
    async fn prompt_calls_generator_once() {
        let gen = Counting::new(Ok("https://img.example.org/gen.png".into()));
        let req = request(None, Some("a minimalist abstract gradient"));
        let img = resolve_image(&req, Some(&gen), 10).await.unwrap().unwrap();
        assert_eq!(img.origin, ImageOrigin::Generated);
        assert_eq!(gen.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn nothing_requested_is_none() {
        let gen = Counting::new(Ok("unused".into()));
        let req = request(None, None);
        assert_eq!(resolve_image(&req, Some(&gen), 10).await.unwrap(), None);
        assert_eq!(gen.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_generator_fails_the_channel() {
        let req = request(None, Some("a skyline"));
        let err = resolve_image(&req, None, 10).await.unwrap_err();
        assert!(err.to_string().contains("no image generator configured"));
    }

    #[tokio::test]
    async fn generator_errors_map_to_image_channel() {
        let gen = Counting::new(Err(ServiceError::Status {
            status: 400,
            detail: "content policy violation".into(),
        }));
        let req = request(None, Some("a skyline"));
        let err = resolve_image(&req, Some(&gen), 10).await.unwrap_err();
        assert!(matches!(err, ChannelError::ImageGeneration { .. }));
        assert!(err.to_string().contains("content policy violation"));
    }

    #[tokio::test]
    async fn empty_url_is_no_image() {
        let gen = Counting::new(Ok("  ".into()));
        let req = request(None, Some("a skyline"));
        let err = resolve_image(&req, Some(&gen), 10).await.unwrap_err();
        assert!(err.to_string().contains("no image produced"));
    }

    #[test]
    fn endpoint_is_built_from_base() {
        let gen = OpenAiImageGenerator::new("http://localhost:8080/", "sk-test", "dall-e-3", "1024x1024", 30)
            .unwrap();
        assert_eq!(gen.endpoint(), "http://localhost:8080/v1/images/generations");
    }
}
