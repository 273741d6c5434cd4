//! Rewrite engine: turn effective content into a structured markdown body.
//!
//! The engine is a thin shell around a [`TextGenerator`]: it assembles the
//! instruction from [`crate::prompts`], makes exactly one generation call
//! (bounded by `api_timeout_secs`, never retried), then normalises the reply
//! through [`postprocess::clean_markdown`] and [`toc::enforce_structure`].
//!
//! ## Reply formats
//!
//! With `include_summary` the model is asked for a JSON object
//! `{"rewrittenContent": "...", "executiveSummary": "..."}`. Models do not
//! always comply, so the parser accepts either shape:
//!
//! | Reply | Interpretation |
//! |-------|----------------|
//! | JSON object (optionally fenced) | body + summary from the object |
//! | anything else | the whole reply is the body, no summary |
//!
//! A reply that *looks* like JSON but does not parse is a malformed response,
//! not a body: publishing half an object as a blog post is worse than failing.

use crate::config::ForgeConfig;
use crate::error::{ChannelError, ServiceError};
use crate::output::RewriteResult;
use crate::pipeline::source::EffectiveContent;
use crate::pipeline::{postprocess, toc};
use crate::prompts;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Everything a text generator needs for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationInstruction {
    pub system: String,
    pub prompt: String,
    /// The system prompt asks for the JSON reply shape.
    pub wants_summary: bool,
}

/// Raw reply of a text generator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedText {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// The text generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, instruction: &GenerationInstruction) -> Result<GeneratedText, ServiceError>;
}

/// [`TextGenerator`] backed by an `edgequake-llm` chat provider.
pub struct LlmTextGenerator {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmTextGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl TextGenerator for LlmTextGenerator {
    async fn generate(&self, instruction: &GenerationInstruction) -> Result<GeneratedText, ServiceError> {
        let messages = vec![
            ChatMessage::system(instruction.system.as_str()),
            ChatMessage::user(instruction.prompt.as_str()),
        ];
        let response = self
            .provider
            .chat(&messages, Some(&self.options()))
            .await
            .map_err(|e| ServiceError::Request(e.to_string()))?;

        Ok(GeneratedText {
            content: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Build the instruction for one rewrite.
pub fn build_instruction(title: &str, content: &EffectiveContent, config: &ForgeConfig) -> GenerationInstruction {
    let prompt = match content.text() {
        Some(text) => prompts::rewrite_prompt(title, text, config.target_words),
        None => prompts::generate_prompt(title, config.target_words),
    };
    GenerationInstruction {
        system: prompts::system_prompt(config.system_prompt.as_deref(), config.include_summary),
        prompt,
        wants_summary: config.include_summary,
    }
}

/// Rewrite (or generate) the body for `title`.
///
/// # Errors
/// [`ChannelError::TextGeneration`] when the service fails, times out,
/// returns a malformed object, or produces no body.
pub async fn rewrite(
    generator: &dyn TextGenerator,
    title: &str,
    content: &EffectiveContent,
    config: &ForgeConfig,
) -> Result<RewriteResult, ChannelError> {
    let instruction = build_instruction(title, content, config);

    let reply = tokio::time::timeout(
        Duration::from_secs(config.api_timeout_secs),
        generator.generate(&instruction),
    )
    .await
    .map_err(|_| ServiceError::Timeout {
        secs: config.api_timeout_secs,
    })
    .and_then(|r| r)
    .map_err(ChannelError::text)?;

    debug!(
        "Rewrite: {} input tokens, {} output tokens",
        reply.input_tokens, reply.output_tokens
    );

    let (raw_body, summary) = parse_reply(&reply.content).map_err(ChannelError::text)?;
    let cleaned = postprocess::clean_markdown(&raw_body);
    let body = toc::enforce_structure(&cleaned, title);
    if !has_content_after_toc(&body) {
        return Err(no_content());
    }

    let summary = if config.include_summary {
        summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    } else {
        None
    };

    Ok(RewriteResult {
        body,
        summary,
        provenance: content.provenance(),
        source_fallback: content.fallback().map(|e| e.to_string()),
        input_tokens: reply.input_tokens,
        output_tokens: reply.output_tokens,
    })
}

fn no_content() -> ChannelError {
    ChannelError::TextGeneration {
        detail: "no content produced".to_string(),
    }
}

fn has_content_after_toc(body: &str) -> bool {
    body.split_once("</details>")
        .is_some_and(|(_, rest)| !rest.trim().is_empty())
}

// ── Reply parsing ────────────────────────────────────────────────────────

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?[ \t]*\n(.*?)\n```$").unwrap());

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuredReply {
    #[serde(default, alias = "body", alias = "content")]
    rewritten_content: Option<String>,
    #[serde(default, alias = "summary")]
    executive_summary: Option<String>,
}

/// Split a reply into `(body, summary)`.
fn parse_reply(raw: &str) -> Result<(String, Option<String>), ServiceError> {
    let trimmed = raw.trim();
    let unfenced = RE_JSON_FENCE
        .captures(trimmed)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| trimmed.to_string());

    if !unfenced.starts_with('{') {
        return Ok((raw.to_string(), None));
    }

    let reply: StructuredReply = serde_json::from_str(&unfenced)
        .map_err(|e| ServiceError::Malformed(format!("reply is not valid JSON: {e}")))?;
    Ok((
        reply.rewritten_content.unwrap_or_default(),
        reply.executive_summary,
    ))
}
