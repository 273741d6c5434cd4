//! Progress-callback trait for per-request pipeline events.
//!
//! Inject an [`Arc<dyn ForgeProgressCallback>`] via
//! [`crate::config::ForgeConfigBuilder::progress_callback`] to observe a
//! request as its two channels advance.
//!
//! The text and image channels run concurrently, so text and image events
//! interleave in no particular order. Within the text channel the order is
//! fixed: `on_source_resolved` (preceded by `on_extraction_fallback` when the
//! lenient policy kicked in) always fires before `on_text_complete` /
//! `on_text_error`.
//!
//! # Example
//!
//! ```rust
//! use contentforge::{ForgeProgressCallback, Provenance};
//!
//! struct Log;
//!
//! impl ForgeProgressCallback for Log {
//!     fn on_source_resolved(&self, provenance: Provenance) {
//!         eprintln!("source: {provenance:?}");
//!     }
//! }
//! ```

use crate::output::Provenance;
use std::sync::Arc;
use uuid::Uuid;

/// Called by the orchestrator as a request moves through the pipeline.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ForgeProgressCallback: Send + Sync {
    /// Called once, after validation, before either channel starts.
    fn on_process_start(&self, request_id: Uuid) {
        let _ = request_id;
    }

    /// A source URL could not be used and the request fell back to generation.
    fn on_extraction_fallback(&self, error: &str) {
        let _ = error;
    }

    /// The effective content is known; the rewrite call is about to start.
    fn on_source_resolved(&self, provenance: Provenance) {
        let _ = provenance;
    }

    /// The text channel produced a body of `body_len` bytes.
    fn on_text_complete(&self, body_len: usize) {
        let _ = body_len;
    }

    fn on_text_error(&self, error: &str) {
        let _ = error;
    }

    /// The image channel settled with an image (`Some`) or with nothing to do.
    fn on_image_complete(&self, image_url: Option<&str>) {
        let _ = image_url;
    }

    fn on_image_error(&self, error: &str) {
        let _ = error;
    }

    /// Called once after both channels have settled.
    fn on_process_complete(&self, text_ok: bool, image_ok: bool) {
        let _ = (text_ok, image_ok);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ForgeProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ForgeConfig`].
pub type ProgressCallback = Arc<dyn ForgeProgressCallback>;
