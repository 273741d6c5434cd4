//! The inbound request and its validation.
//!
//! [`RewriteRequest`] is the loose, serialisable shape that presentation
//! layers fill in (form fields, CLI flags, JSON bodies). [`RewriteRequest::validate`]
//! turns it into a [`ValidatedRequest`] whose URLs are parsed and whose
//! optional fields are normalised: a blank string counts as "not supplied".
//! Everything downstream works on `ValidatedRequest` only.

use crate::error::ForgeError;
use serde::{Deserialize, Serialize};
use url::Url;

/// A rewrite request as supplied by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRequest {
    /// Title of the post. Required, never echoed into the body.
    pub title: String,
    /// Source text to rewrite verbatim.
    #[serde(default)]
    pub content: Option<String>,
    /// Page to extract the source text from. Takes precedence over `content`.
    #[serde(default)]
    pub source_url: Option<String>,
    /// "Apply now" link; passed through untouched.
    pub apply_link: String,
    /// Ready-made header image.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Prompt for a generated header image, used only without `image_url`.
    #[serde(default)]
    pub image_prompt: Option<String>,
}

impl RewriteRequest {
    pub fn new(title: impl Into<String>, apply_link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            apply_link: apply_link.into(),
            ..Default::default()
        }
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn image_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.image_prompt = Some(prompt.into());
        self
    }

    /// Validate the request.
    ///
    /// With `require_exactly_one_source` set, exactly one of `content` and
    /// `source_url` must be supplied; otherwise either, both, or neither is
    /// accepted and the URL wins when both are present.
    pub fn validate(&self, require_exactly_one_source: bool) -> Result<ValidatedRequest, ForgeError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ForgeError::validation("title", "Title is required."));
        }

        let apply_link = passthrough_url("applyLink", &self.apply_link)?;

        let content = non_blank(self.content.as_deref()).map(str::to_string);
        let source_url = non_blank(self.source_url.as_deref())
            .map(|u| parse_web_url("sourceUrl", u))
            .transpose()?;
        let image_url = non_blank(self.image_url.as_deref())
            .map(|u| passthrough_url("imageUrl", u))
            .transpose()?;
        let image_prompt = non_blank(self.image_prompt.as_deref()).map(|p| p.trim().to_string());

        if require_exactly_one_source {
            match (&content, &source_url) {
                (Some(_), Some(_)) => {
                    return Err(ForgeError::validation(
                        "content",
                        "Provide either content or a source URL, not both.",
                    ))
                }
                (None, None) => {
                    return Err(ForgeError::validation(
                        "content",
                        "Content or URL is required.",
                    ))
                }
                _ => {}
            }
        }

        Ok(ValidatedRequest {
            title: title.to_string(),
            content,
            source_url,
            apply_link,
            image_url,
            image_prompt,
        })
    }
}

/// A request whose fields passed validation.
///
/// `apply_link` and `image_url` are handed back to the caller, so they keep
/// the caller's spelling (trimmed only); `source_url` is fetched and is kept
/// parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub title: String,
    pub content: Option<String>,
    pub source_url: Option<Url>,
    pub apply_link: String,
    pub image_url: Option<String>,
    pub image_prompt: Option<String>,
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

fn parse_web_url(field: &'static str, raw: &str) -> Result<Url, ForgeError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ForgeError::validation(field, "A URL is required."));
    }
    let url = Url::parse(raw)
        .map_err(|e| ForgeError::validation(field, format!("'{raw}' is not a valid URL ({e})")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ForgeError::validation(
            field,
            format!("'{raw}' must use http or https, not {other}"),
        )),
    }
}

/// Validate like [`parse_web_url`] but return the trimmed input unchanged.
fn passthrough_url(field: &'static str, raw: &str) -> Result<String, ForgeError> {
    parse_web_url(field, raw)?;
    Ok(raw.trim().to_string())
}
