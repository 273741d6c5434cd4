//! Error types for the contentforge library.
//!
//! Errors are split by how far they travel:
//!
//! * [`ForgeError`] is **fatal**: the request cannot be dispatched at all
//!   (missing title, malformed URL, no LLM provider configured). Returned as
//!   `Err(ForgeError)` from [`crate::Forge::new`] and [`crate::Forge::process`].
//!
//! * [`ChannelError`] is **channel-local**: the text or the image channel
//!   failed, but the other channel is unaffected. Stored inside
//!   [`crate::output::CombinedResult`] so callers can still show whatever
//!   succeeded.
//!
//! * [`ExtractionError`] is raised by the extractor. Under the lenient source
//!   policy it never leaves the source resolver; under the strict policy it
//!   becomes [`ChannelError::Extraction`].
//!
//! * [`ServiceError`] is raised by the generation collaborators
//!   ([`crate::pipeline::rewrite::TextGenerator`],
//!   [`crate::pipeline::image::ImageGenerator`]) and mapped onto the channel
//!   that called them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, serialisable classification of every failure the pipeline reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Validation,
    Fetch,
    EmptyContent,
    Generation,
    Unknown,
}

/// All fatal errors returned by the contentforge library.
#[derive(Debug, Error)]
pub enum ForgeError {
    // ── Request errors ────────────────────────────────────────────────────
    /// A request field is missing or malformed. The request was not dispatched.
    #[error("Invalid request: {field}: {message}")]
    Validation { field: &'static str, message: String },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ForgeError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::InvalidConfig(_) => ErrorKind::Validation,
            _ => ErrorKind::Unknown,
        }
    }
}

/// Failure to turn a source URL into usable text.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionError {
    /// The URL is not an absolute HTTP/HTTPS URL.
    #[error("Cannot fetch '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Network failure or non-success HTTP status.
    #[error("Failed to fetch '{url}': {reason}")]
    Fetch {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    /// The fetch did not complete within the configured timeout.
    #[error("Fetching '{url}' timed out after {secs}s")]
    FetchTimeout { url: String, secs: u64 },

    /// The page was fetched but held no readable heading or paragraph text.
    #[error(
        "Could not extract any meaningful content from '{url}'. \
         The page might be empty or require JavaScript to render."
    )]
    EmptyContent { url: String },
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyContent { .. } => ErrorKind::EmptyContent,
            _ => ErrorKind::Fetch,
        }
    }

    /// HTTP status carried by the failure, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Fetch { status, .. } => *status,
            _ => None,
        }
    }

    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::FetchTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Self::Fetch {
                url: url.to_string(),
                status: err.status().map(|s| s.as_u16()),
                reason: err.to_string(),
            }
        }
    }
}

/// Failure reported by a generation collaborator (text or image service).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Transport-level failure or provider-side error.
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-success HTTP status.
    #[error("HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    /// The call did not complete in time.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered but the payload does not match the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A failure isolated to one channel of a [`crate::output::CombinedResult`].
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelError {
    /// Extraction failed and the strict source policy is active.
    #[error("Source extraction failed: {0}")]
    Extraction(ExtractionError),

    /// The text generation service produced no usable output.
    #[error("Text generation failed: {detail}")]
    TextGeneration { detail: String },

    /// The image generation service produced no usable output.
    #[error("Image generation failed: {detail}")]
    ImageGeneration { detail: String },

    /// Anything else, e.g. a collaborator that panicked mid-call.
    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl ChannelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Extraction(e) => e.kind(),
            Self::TextGeneration { .. } | Self::ImageGeneration { .. } => ErrorKind::Generation,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    pub(crate) fn text(err: ServiceError) -> Self {
        Self::TextGeneration {
            detail: err.to_string(),
        }
    }

    pub(crate) fn image(err: ServiceError) -> Self {
        Self::ImageGeneration {
            detail: err.to_string(),
        }
    }
}
