//! Source resolution: decide what the rewrite engine works from.
//!
//! | Request | Outcome |
//! |---------|---------|
//! | `sourceUrl` set, extraction succeeds | [`EffectiveContent::ExtractedText`] |
//! | `sourceUrl` set, extraction fails, lenient | [`EffectiveContent::Empty`] with the error kept as `fallback` |
//! | `sourceUrl` set, extraction fails, strict | `Err(ExtractionError)` |
//! | only `content` set | [`EffectiveContent::ExplicitText`] |
//! | neither | [`EffectiveContent::Empty`] |
//!
//! A URL takes precedence over pasted content. When both are supplied and
//! extraction fails under the lenient policy, the pasted content is *not*
//! used: the request falls through to generation exactly as if only the URL
//! had been given.

use crate::config::SourcePolicy;
use crate::error::ExtractionError;
use crate::output::Provenance;
use crate::pipeline::extract::extract;
use crate::pipeline::fetch::PageFetcher;
use crate::request::ValidatedRequest;
use tracing::{info, warn};
use url::Url;

/// The content a rewrite is based on.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectiveContent {
    /// Text pasted into the request, used verbatim.
    ExplicitText(String),
    /// Text extracted from the source URL.
    ExtractedText { url: Url, text: String },
    /// Nothing to rewrite; the engine generates from the title.
    Empty {
        /// The extraction failure that led here under the lenient policy.
        fallback: Option<ExtractionError>,
    },
}

impl EffectiveContent {
    pub fn provenance(&self) -> Provenance {
        match self {
            Self::ExplicitText(_) | Self::ExtractedText { .. } => Provenance::FromSource,
            Self::Empty { .. } => Provenance::Generated,
        }
    }

    /// Source text to rewrite, or `None` when the body must be generated.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::ExplicitText(text) | Self::ExtractedText { text, .. } => Some(text),
            Self::Empty { .. } => None,
        }
    }

    pub fn fallback(&self) -> Option<&ExtractionError> {
        match self {
            Self::Empty { fallback } => fallback.as_ref(),
            _ => None,
        }
    }
}

/// Resolve the effective content of a validated request.
///
/// # Errors
/// Only under [`SourcePolicy::Strict`], when the source URL cannot be
/// extracted.
pub async fn resolve_source(
    request: &ValidatedRequest,
    fetcher: &dyn PageFetcher,
    policy: SourcePolicy,
) -> Result<EffectiveContent, ExtractionError> {
    if let Some(url) = &request.source_url {
        return match extract(fetcher, url).await {
            Ok(text) => {
                info!("Extracted {} chars of source text from {}", text.len(), url);
                Ok(EffectiveContent::ExtractedText {
                    url: url.clone(),
                    text,
                })
            }
            Err(e) => match policy {
                SourcePolicy::Strict => Err(e),
                SourcePolicy::Lenient => {
                    warn!("Extraction failed, generating from title instead: {}", e);
                    Ok(EffectiveContent::Empty { fallback: Some(e) })
                }
            },
        };
    }

    Ok(match &request.content {
        Some(text) => EffectiveContent::ExplicitText(text.clone()),
        None => EffectiveContent::Empty { fallback: None },
    })
}
