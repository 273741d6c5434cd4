//! # contentforge
//!
//! Rewrite a blog post (pasted, or scraped from a URL) into a polished,
//! structured markdown article with an LLM, and attach a header image.
//!
//! ## Pipeline Overview
//!
//! ```text
//! RewriteRequest
//!  │
//!  ├─ text channel
//!  │   ├─ 1. Source   pasted text | extracted page | nothing (generate)
//!  │   ├─ 2. Rewrite  one LLM call (gpt-4.1-mini / claude / gemini / …)
//!  │   ├─ 3. Polish   post-processing (fences, preambles, whitespace)
//!  │   └─ 4. Shape    rebuilt TOC + anchored H2/H3 headings
//!  │
//!  └─ image channel   supplied URL | generated image | none
//!
//! both channels run concurrently ─▶ CombinedResult (each half may fail alone)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use contentforge::{Forge, ForgeConfig, RewriteRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let forge = Forge::new(ForgeConfig::default())?;
//!     let request = RewriteRequest::new("Senior Platform Engineer", "https://jobs.example.org/apply")
//!         .source_url("https://blog.example.org/platform-team");
//!     let result = forge.process(&request).await?;
//!     match result.body() {
//!         Some(body) => println!("{body}"),
//!         None => eprintln!("text failed: {:?}", result.text_error()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Source Policy
//!
//! | Policy | Source URL cannot be extracted |
//! |--------|--------------------------------|
//! | `Lenient` (default) | warn, generate from the title, provenance `generated` |
//! | `Strict` | the text channel fails with the extraction error |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `contentforge` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! contentforge = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod forge;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod request;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ForgeConfig, ForgeConfigBuilder, SourcePolicy};
pub use error::{ChannelError, ErrorKind, ExtractionError, ForgeError, ServiceError};
pub use forge::Forge;
pub use output::{CombinedResult, ImageOrigin, ImageResult, ProcessStats, Provenance, RewriteResult};
pub use pipeline::extract::{extract, extract_text};
pub use pipeline::fetch::{HttpFetcher, PageFetcher};
pub use pipeline::image::{ImageGenerator, OpenAiImageGenerator};
pub use pipeline::rewrite::{GeneratedText, GenerationInstruction, LlmTextGenerator, TextGenerator};
pub use pipeline::source::EffectiveContent;
pub use pipeline::toc::{slugify, validate_structure, StructureIssue};
pub use progress::{ForgeProgressCallback, NoopProgressCallback, ProgressCallback};
pub use request::{RewriteRequest, ValidatedRequest};
pub use stream::{ChannelOutcome, ChannelStream};
