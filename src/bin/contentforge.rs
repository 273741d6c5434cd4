//! CLI binary for contentforge.
//!
//! A thin shim over the library crate that maps CLI flags to `ForgeConfig`
//! and a `RewriteRequest`, then prints the assembled post.

use anyhow::{Context, Result};
use clap::Parser;
use contentforge::{
    CombinedResult, Forge, ForgeConfig, ForgeProgressCallback, ProgressCallback, Provenance,
    RewriteRequest, SourcePolicy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner plus one log line per channel event. Text and image events arrive
/// in whatever order the channels settle.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Forging");
        bar.set_message("resolving source…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn line(&self, mark: String, msg: String) {
        self.bar.println(format!("  {mark} {msg}"));
    }
}

impl ForgeProgressCallback for CliProgressCallback {
    fn on_process_start(&self, request_id: Uuid) {
        self.bar.set_message(format!("request {}", dim(&request_id.to_string())));
    }

    fn on_extraction_fallback(&self, error: &str) {
        self.line(yellow("⚠"), format!("source unusable, generating from title ({})", truncate(error)));
    }

    fn on_source_resolved(&self, provenance: Provenance) {
        let what = match provenance {
            Provenance::FromSource => "rewriting source",
            Provenance::Generated => "generating from title",
        };
        self.bar.set_message(format!("{what}…"));
    }

    fn on_text_complete(&self, body_len: usize) {
        self.line(green("✓"), format!("Text   {}", dim(&format!("{body_len} chars"))));
    }

    fn on_text_error(&self, error: &str) {
        self.line(red("✗"), format!("Text   {}", red(&truncate(error))));
    }

    fn on_image_complete(&self, image_url: Option<&str>) {
        match image_url {
            Some(url) => self.line(green("✓"), format!("Image  {}", dim(&truncate(url)))),
            None => self.line(dim("·"), "Image  none requested".to_string()),
        }
    }

    fn on_image_error(&self, error: &str) {
        self.line(red("✗"), format!("Image  {}", red(&truncate(error))));
    }

    fn on_process_complete(&self, _text_ok: bool, _image_ok: bool) {
        self.bar.finish_and_clear();
    }
}

/// Keep log lines on one terminal row.
fn truncate(s: &str) -> String {
    match s.char_indices().nth(79) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Rewrite a published post (stdout)
  contentforge --title "Senior Platform Engineer" \
      --apply-link https://jobs.example.org/apply \
      --url https://blog.example.org/platform-team

  # Rewrite pasted text from stdin, with a generated header image
  cat draft.txt | contentforge --title "Why We Hire" \
      --apply-link https://jobs.example.org/apply --content - \
      --image-prompt "a minimalist abstract gradient" -o post.md

  # Fail instead of generating when the URL cannot be scraped
  contentforge --strict-source --url https://blog.example.org/gone ...

  # JSON output (requestId, body, summary, provenance, imageUrl, textError, imageError)
  contentforge --json --summary --title "..." --apply-link ... > result.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (text and image generation)
  OPENAI_BASE_URL         OpenAI-compatible endpoint for image generation
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override the log filter
"#;

/// Rewrite blog content into structured markdown with a header image.
#[derive(Parser, Debug)]
#[command(
    name = "contentforge",
    version,
    about = "Rewrite blog content into structured markdown using LLMs",
    long_about = "Rewrite a blog post (pasted text or a scraped URL) into a polished markdown \
article with a collapsible table of contents and anchored headings, and attach a supplied or \
generated header image. When no usable source exists the post is generated from the title.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Post title (required, never repeated in the body).
    #[arg(long, env = "FORGE_TITLE")]
    title: String,

    /// "Apply Now" link appended to the assembled post.
    #[arg(long, env = "FORGE_APPLY_LINK")]
    apply_link: String,

    /// Source text to rewrite; `-` reads stdin.
    #[arg(long, conflicts_with = "content_file")]
    content: Option<String>,

    /// Read source text from a file.
    #[arg(long)]
    content_file: Option<PathBuf>,

    /// URL of a page to scrape and rewrite. Takes precedence over content.
    #[arg(long)]
    url: Option<String>,

    /// Header image URL, used as-is.
    #[arg(long)]
    image_url: Option<String>,

    /// Prompt for a generated header image (ignored when --image-url is set).
    #[arg(long)]
    image_prompt: Option<String>,

    /// Fail the text channel when the URL cannot be extracted.
    #[arg(long, env = "FORGE_STRICT_SOURCE")]
    strict_source: bool,

    /// Require exactly one of --content / --url.
    #[arg(long, env = "FORGE_EXACTLY_ONE_SOURCE")]
    exactly_one_source: bool,

    /// Ask for an executive summary (shown as a quote above the body).
    #[arg(long, env = "FORGE_SUMMARY")]
    summary: bool,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "FORGE_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "FORGE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Approximate length of the post in words.
    #[arg(long, env = "FORGE_TARGET_WORDS", default_value_t = 800)]
    target_words: usize,

    /// Max LLM output tokens.
    #[arg(long, env = "FORGE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "FORGE_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Image model for the OpenAI-compatible image endpoint.
    #[arg(long, env = "FORGE_IMAGE_MODEL", default_value = "dall-e-3")]
    image_model: String,

    /// Image size, e.g. 1792x1024.
    #[arg(long, env = "FORGE_IMAGE_SIZE", default_value = "1792x1024")]
    image_size: String,

    /// Source page fetch timeout in seconds.
    #[arg(long, env = "FORGE_FETCH_TIMEOUT", default_value_t = 15)]
    fetch_timeout: u64,

    /// Per-call generation timeout in seconds.
    #[arg(long, env = "FORGE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Output the CombinedResult as JSON instead of Markdown.
    #[arg(long, env = "FORGE_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "FORGE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FORGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "FORGE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already reports channel progress; keep INFO logs out of
    // its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build request + config ───────────────────────────────────────────
    let request = build_request(&cli).await?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ForgeProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let forge = Forge::new(config).context("Failed to initialise")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let result = if let Some(ref output_path) = cli.output {
        let result = forge
            .process_to_file(&request, output_path)
            .await
            .context("Processing failed")?;
        if !cli.quiet && result.text.is_ok() {
            eprintln!(
                "{}  {}ms  →  {}",
                green("✔"),
                result.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        result
    } else {
        let result = forge.process(&request).await.context("Processing failed")?;
        if cli.json {
            let json = serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
            println!("{json}");
        } else if let Some(markdown) = result.to_markdown() {
            io::stdout()
                .lock()
                .write_all(markdown.as_bytes())
                .context("Failed to write to stdout")?;
        }
        result
    };

    report(&cli, &result);

    if let Some(err) = result.text_error() {
        anyhow::bail!("{err}");
    }
    Ok(())
}

/// Print the per-channel summary to stderr.
fn report(cli: &Cli, result: &CombinedResult) {
    if cli.quiet {
        return;
    }
    if let Some(Provenance::Generated) = result.provenance() {
        eprintln!(
            "{} no usable source: the post was generated from the title alone",
            yellow("⚠")
        );
    }
    if let Some(err) = result.image_error() {
        eprintln!("{} {}", yellow("⚠"), err);
    }
    if !cli.json && result.text.is_ok() {
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&result.stats.input_tokens.to_string()),
            dim(&result.stats.output_tokens.to_string()),
        );
    }
}

/// Map CLI args to a `RewriteRequest`.
async fn build_request(cli: &Cli) -> Result<RewriteRequest> {
    let mut request = RewriteRequest::new(cli.title.as_str(), cli.apply_link.as_str());

    let content = match (&cli.content, &cli.content_file) {
        (Some(c), _) if c == "-" => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read content from stdin")?;
            Some(buf)
        }
        (Some(c), _) => Some(c.clone()),
        (None, Some(path)) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read content from {:?}", path))?,
        ),
        (None, None) => None,
    };

    if let Some(c) = content {
        request = request.content(c);
    }
    if let Some(ref u) = cli.url {
        request = request.source_url(u.as_str());
    }
    if let Some(ref u) = cli.image_url {
        request = request.image_url(u.as_str());
    }
    if let Some(ref p) = cli.image_prompt {
        request = request.image_prompt(p.as_str());
    }
    Ok(request)
}

/// Map CLI args to `ForgeConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ForgeConfig> {
    let mut builder = ForgeConfig::builder()
        .source_policy(if cli.strict_source {
            SourcePolicy::Strict
        } else {
            SourcePolicy::Lenient
        })
        .require_exactly_one_source(cli.exactly_one_source)
        .include_summary(cli.summary)
        .target_words(cli.target_words)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .image_model(cli.image_model.as_str())
        .image_size(cli.image_size.as_str())
        .fetch_timeout_secs(cli.fetch_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
