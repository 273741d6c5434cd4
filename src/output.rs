//! Result types returned by [`crate::Forge::process`].
//!
//! [`CombinedResult`] keeps each channel as its own `Result` so a failed
//! image never hides a good rewrite (and vice versa). Its `Serialize`
//! implementation flattens the two channels into the wire shape consumed by
//! presentation layers:
//!
//! ```json
//! { "requestId": "…", "applyLink": "…",
//!   "body": "…" | null, "summary": "…" | null,
//!   "provenance": "fromSource" | "generated" | null,
//!   "imageUrl": "…" | null, "textError": "…" | null, "imageError": "…" | null }
//! ```

use crate::error::ChannelError;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Where the body's substance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    /// Rewritten from pasted text or an extracted page.
    FromSource,
    /// Fabricated from the title alone; callers should disclose this.
    Generated,
}

/// Output of the rewrite engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteResult {
    /// Markdown body: collapsible TOC followed by anchored H2/H3 sections.
    pub body: String,
    /// Executive summary, only when requested.
    pub summary: Option<String>,
    pub provenance: Provenance,
    /// Why extraction was skipped, when the lenient policy fell back to generation.
    pub source_fallback: Option<String>,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// How the header image was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageOrigin {
    Supplied,
    Generated,
}

/// Output of the image resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageResult {
    /// Image reference: an `http(s)` URL or a `data:` URL.
    pub url: String,
    pub origin: ImageOrigin,
}

/// Timing and token statistics for one `process` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessStats {
    pub text_duration_ms: u64,
    pub image_duration_ms: u64,
    pub total_duration_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Per-channel outcome of a request.
#[derive(Debug, Clone)]
pub struct CombinedResult {
    pub request_id: Uuid,
    /// The caller's apply link, exactly as supplied (trimmed).
    pub apply_link: String,
    pub text: Result<RewriteResult, ChannelError>,
    /// `Ok(None)` when neither an image URL nor a prompt was supplied.
    pub image: Result<Option<ImageResult>, ChannelError>,
    pub stats: ProcessStats,
}

impl CombinedResult {
    pub fn body(&self) -> Option<&str> {
        self.text.as_ref().ok().map(|t| t.body.as_str())
    }

    pub fn summary(&self) -> Option<&str> {
        self.text.as_ref().ok().and_then(|t| t.summary.as_deref())
    }

    pub fn provenance(&self) -> Option<Provenance> {
        self.text.as_ref().ok().map(|t| t.provenance)
    }

    pub fn image_url(&self) -> Option<&str> {
        match &self.image {
            Ok(Some(img)) => Some(img.url.as_str()),
            _ => None,
        }
    }

    pub fn text_error(&self) -> Option<&ChannelError> {
        self.text.as_ref().err()
    }

    pub fn image_error(&self) -> Option<&ChannelError> {
        self.image.as_ref().err()
    }

    /// True when neither channel failed.
    pub fn is_complete(&self) -> bool {
        self.text.is_ok() && self.image.is_ok()
    }

    /// Assemble a presentation-ready Markdown document.
    ///
    /// Header image first, then the summary (if any), the body, and the apply
    /// link. Returns `None` when the text channel failed.
    pub fn to_markdown(&self) -> Option<String> {
        let text = self.text.as_ref().ok()?;
        let mut parts: Vec<String> = Vec::with_capacity(4);

        if let Some(url) = self.image_url() {
            parts.push(format!("![Header image]({url})"));
        }
        if let Some(ref summary) = text.summary {
            parts.push(format!("> {}", summary.replace('\n', "\n> ")));
        }
        parts.push(text.body.trim_end().to_string());
        parts.push(format!("[Apply Now]({})", self.apply_link));

        let mut doc = parts.join("\n\n");
        doc.push('\n');
        Some(doc)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireResult<'a> {
    request_id: String,
    apply_link: &'a str,
    body: Option<&'a str>,
    summary: Option<&'a str>,
    provenance: Option<Provenance>,
    image_url: Option<&'a str>,
    text_error: Option<String>,
    image_error: Option<String>,
}

impl Serialize for CombinedResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireResult {
            request_id: self.request_id.to_string(),
            apply_link: self.apply_link.as_str(),
            body: self.body(),
            summary: self.summary(),
            provenance: self.provenance(),
            image_url: self.image_url(),
            text_error: self.text_error().map(|e| e.to_string()),
            image_error: self.image_error().map(|e| e.to_string()),
        }
        .serialize(serializer)
    }
}
