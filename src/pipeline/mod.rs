//! Pipeline stages for content rewriting.
//!
//! Each submodule implements one step and is testable on its own; the
//! network-facing steps sit behind traits ([`fetch::PageFetcher`],
//! [`rewrite::TextGenerator`], [`image::ImageGenerator`]) so tests can
//! swap them out.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌─▶ source ──▶ (fetch ▶ extract) ──▶ rewrite ──▶ postprocess ▶ toc ─┐
//! request ───┤                                                                   ├─▶ CombinedResult
//!            └─▶ image ──────────────────────────────────────────────────────────┘
//! ```
//!
//! 1. [`source`]  decides between pasted text, an extracted page and nothing
//! 2. [`fetch`] / [`extract`] turn a source URL into readable text
//! 3. [`rewrite`] makes the one generation call and parses the reply
//! 4. [`postprocess`] cleans model quirks from the markdown
//! 5. [`toc`] rebuilds the TOC and heading anchors deterministically
//! 6. [`image`] runs independently: supplied URL, generated image, or none

pub mod extract;
pub mod fetch;
pub mod image;
pub mod postprocess;
pub mod rewrite;
pub mod source;
pub mod toc;
