//! Orchestrator integration tests.
//!
//! Source pages are served by `wiremock`; the text and image services are
//! in-test doubles that record their calls. Nothing here needs an API key.

use async_trait::async_trait;
use contentforge::{
    validate_structure, ChannelError, ErrorKind, ExtractionError, Forge, ForgeConfig, ForgeError,
    ForgeProgressCallback, GeneratedText, GenerationInstruction, ImageGenerator, ImageOrigin,
    Provenance, RewriteRequest, ServiceError, SourcePolicy, TextGenerator,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const TITLE: &str = "Senior Platform Engineer";
const APPLY: &str = "https://jobs.example.org/apply";
const GRADIENT: &str = "a minimalist abstract gradient";

const ARTICLE_PAGE: &str = r#"<!doctype html>
<html><head><title>Platform team</title><script>track()</script></head>
<body>
  <nav><ul><li><a href="/">Home</a></li></ul><p>Navigation blurb</p></nav>
  <article>
    <h2>Why We Exist</h2>
    <p>We build the paved road.</p>
    <p>Every team ships on it.</p>
    <h2>What You Will Do</h2>
    <p>Own the deploy pipeline.</p>
  </article>
  <footer><p>© 2026 Example Corp</p></footer>
</body></html>"#;

const GOOD_REPLY: &str = "## Why We Exist\n\nA paved road for every team.\n\n### Day One\n\nYou ship.\n\n## Join Us\n\nApply today.";

// ── Test doubles ─────────────────────────────────────────────────────────────

struct RecordingText {
    reply: Result<String, ServiceError>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl RecordingText {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for RecordingText {
    async fn generate(&self, instruction: &GenerationInstruction) -> Result<GeneratedText, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(instruction.prompt.clone());
        self.reply.clone().map(|content| GeneratedText {
            content,
            input_tokens: 321,
            output_tokens: 654,
        })
    }
}

struct CountingImage {
    url: String,
    calls: AtomicUsize,
}

impl CountingImage {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            url: "https://img.example.org/generated/1.png".to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ImageGenerator for CountingImage {
    async fn generate(&self, _prompt: &str) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.url.clone())
    }
}

struct PanickingImage;

#[async_trait]
impl ImageGenerator for PanickingImage {
    async fn generate(&self, _prompt: &str) -> Result<String, ServiceError> {
        panic!("image backend exploded");
    }
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    fn push(&self, e: impl Into<String>) {
        self.events.lock().unwrap().push(e.into());
    }

    fn snapshot(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ForgeProgressCallback for EventLog {
    fn on_process_start(&self, _request_id: uuid::Uuid) {
        self.push("start");
    }
    fn on_extraction_fallback(&self, _error: &str) {
        self.push("fallback");
    }
    fn on_source_resolved(&self, provenance: Provenance) {
        self.push(format!("source:{provenance:?}"));
    }
    fn on_text_complete(&self, _body_len: usize) {
        self.push("text:ok");
    }
    fn on_text_error(&self, _error: &str) {
        self.push("text:err");
    }
    fn on_image_complete(&self, _image_url: Option<&str>) {
        self.push("image:ok");
    }
    fn on_image_error(&self, _error: &str) {
        self.push("image:err");
    }
    fn on_process_complete(&self, _text_ok: bool, _image_ok: bool) {
        self.push("complete");
    }
}

fn forge(text: Arc<RecordingText>, image: Arc<dyn ImageGenerator>, policy: SourcePolicy) -> Forge {
    let config = ForgeConfig::builder()
        .text_generator(text)
        .image_generator(image)
        .source_policy(policy)
        .fetch_timeout_secs(5)
        .build()
        .unwrap();
    Forge::new(config).unwrap()
}

async fn serve(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_string(body)
                .insert_header("Content-Type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

// ── Source resolution ────────────────────────────────────────────────────────

#[tokio::test]
async fn extracted_page_reaches_the_generator() {
    let server = MockServer::start().await;
    serve(&server, "/platform-team", 200, ARTICLE_PAGE).await;

    let text = RecordingText::replying(GOOD_REPLY);
    let forge = forge(text.clone(), CountingImage::new(), SourcePolicy::Lenient);
    let request = RewriteRequest::new(TITLE, APPLY).source_url(format!("{}/platform-team", server.uri()));

    let result = forge.process(&request).await.unwrap();

    assert_eq!(result.provenance(), Some(Provenance::FromSource));
    let prompt = text.last_prompt();
    assert!(prompt.contains(
        "Why We Exist\n\nWe build the paved road.\n\nEvery team ships on it.\n\nWhat You Will Do\n\nOwn the deploy pipeline."
    ));
    assert!(!prompt.contains("Navigation blurb"));
    assert!(!prompt.contains("Example Corp"));
    assert!(!prompt.contains("track()"));
}

#[tokio::test]
async fn no_source_generates_a_well_formed_body() {
    let text = RecordingText::replying(GOOD_REPLY);
    let forge = forge(text.clone(), CountingImage::new(), SourcePolicy::Lenient);

    let result = forge.process(&RewriteRequest::new(TITLE, APPLY)).await.unwrap();

    assert_eq!(result.provenance(), Some(Provenance::Generated));
    let body = result.body().unwrap();
    assert!(body.starts_with("<details>"));
    assert!(validate_structure(body, TITLE).is_empty());
    assert!(text.last_prompt().contains("no source material"));
}

#[tokio::test]
async fn lenient_404_falls_back_to_generation() {
    let server = MockServer::start().await;
    serve(&server, "/gone", 404, "<h1>Not Found</h1>").await;

    let text = RecordingText::replying(GOOD_REPLY);
    let log = Arc::new(EventLog::default());
    let config = ForgeConfig::builder()
        .text_generator(text.clone())
        .image_generator(CountingImage::new())
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let forge = Forge::new(config).unwrap();
    let request = RewriteRequest::new(TITLE, APPLY).source_url(format!("{}/gone", server.uri()));

    let result = forge.process(&request).await.unwrap();

    assert_eq!(result.provenance(), Some(Provenance::Generated));
    assert!(result.text_error().is_none());
    assert!(!result.body().unwrap().trim().is_empty());
    assert!(result.text.as_ref().unwrap().source_fallback.as_deref().unwrap().contains("404"));
    assert_eq!(text.calls.load(Ordering::SeqCst), 1);

    let events = log.snapshot();
    let fallback = events.iter().position(|e| e == "fallback").unwrap();
    let resolved = events.iter().position(|e| e == "source:Generated").unwrap();
    let done = events.iter().position(|e| e == "text:ok").unwrap();
    assert!(fallback < resolved && resolved < done);
    assert_eq!(events.first().map(String::as_str), Some("start"));
    assert_eq!(events.last().map(String::as_str), Some("complete"));
}

#[tokio::test]
async fn strict_404_fails_only_the_text_channel() {
    let server = MockServer::start().await;
    serve(&server, "/gone", 404, "").await;

    let text = RecordingText::replying(GOOD_REPLY);
    let image = CountingImage::new();
    let forge = forge(text.clone(), image.clone(), SourcePolicy::Strict);
    let request = RewriteRequest::new(TITLE, APPLY)
        .source_url(format!("{}/gone", server.uri()))
        .image_prompt(GRADIENT);

    let result = forge.process(&request).await.unwrap();

    match result.text_error() {
        Some(ChannelError::Extraction(e)) => assert_eq!(e.status(), Some(404)),
        other => panic!("expected extraction error, got {other:?}"),
    }
    assert_eq!(text.calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.image_url(), Some(image.url.as_str()));
}

#[tokio::test]
async fn strict_empty_page_is_empty_content() {
    let server = MockServer::start().await;
    serve(&server, "/spa", 200, r#"<html><body><div id="root"></div></body></html>"#).await;

    let forge = forge(RecordingText::replying(GOOD_REPLY), CountingImage::new(), SourcePolicy::Strict);
    let request = RewriteRequest::new(TITLE, APPLY).source_url(format!("{}/spa", server.uri()));

    let result = forge.process(&request).await.unwrap();
    assert_eq!(result.text_error().map(|e| e.kind()), Some(ErrorKind::EmptyContent));
}

#[tokio::test]
async fn pasted_content_is_rewritten_verbatim() {
    let text = RecordingText::replying(GOOD_REPLY);
    let forge = forge(text.clone(), CountingImage::new(), SourcePolicy::Lenient);
    let request = RewriteRequest::new(TITLE, APPLY).content("We run 400 services on one platform.");

    let result = forge.process(&request).await.unwrap();
    assert_eq!(result.provenance(), Some(Provenance::FromSource));
    assert!(text.last_prompt().contains("We run 400 services on one platform."));
}

async fn slow_page_forge(text: Arc<RecordingText>, policy: SourcePolicy) -> (MockServer, Forge) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(ARTICLE_PAGE)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let config = ForgeConfig::builder()
        .text_generator(text)
        .image_generator(CountingImage::new())
        .source_policy(policy)
        .fetch_timeout_secs(1)
        .build()
        .unwrap();
    (server, Forge::new(config).unwrap())
}

#[tokio::test]
async fn strict_fetch_timeout_fails_the_text_channel() {
    let text = RecordingText::replying(GOOD_REPLY);
    let (server, forge) = slow_page_forge(text.clone(), SourcePolicy::Strict).await;
    let request = RewriteRequest::new(TITLE, APPLY).source_url(format!("{}/slow", server.uri()));

    let result = forge.process(&request).await.unwrap();

    match result.text_error() {
        Some(ChannelError::Extraction(ExtractionError::FetchTimeout { secs, .. })) => assert_eq!(*secs, 1),
        other => panic!("expected fetch timeout, got {other:?}"),
    }
    assert_eq!(result.text_error().map(|e| e.kind()), Some(ErrorKind::Fetch));
    assert_eq!(text.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn lenient_fetch_timeout_falls_back_to_generation() {
    let text = RecordingText::replying(GOOD_REPLY);
    let (server, forge) = slow_page_forge(text.clone(), SourcePolicy::Lenient).await;
    let request = RewriteRequest::new(TITLE, APPLY).source_url(format!("{}/slow", server.uri()));

    let result = forge.process(&request).await.unwrap();

    assert_eq!(result.provenance(), Some(Provenance::Generated));
    let wire = serde_json::to_value(&result).unwrap();
    assert!(wire["textError"].is_null());
    assert!(result.text.as_ref().unwrap().source_fallback.as_deref().unwrap().contains("timed out"));
    assert_eq!(text.calls.load(Ordering::SeqCst), 1);
}

// ── Validation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_requests_dispatch_nothing() {
    let text = RecordingText::replying(GOOD_REPLY);
    let image = CountingImage::new();
    let forge = forge(text.clone(), image.clone(), SourcePolicy::Lenient);

    let cases = [
        RewriteRequest::new("   ", APPLY),
        RewriteRequest::new(TITLE, "not a url"),
        RewriteRequest::new(TITLE, APPLY).source_url("ftp://example.org/post"),
        RewriteRequest::new(TITLE, APPLY).image_url("::bad::").image_prompt(GRADIENT),
    ];
    for request in &cases {
        let err = forge.process(request).await.unwrap_err();
        assert!(matches!(err, ForgeError::Validation { .. }), "{request:?}: {err}");
    }
    assert_eq!(text.calls.load(Ordering::SeqCst), 0);
    assert_eq!(image.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn exactly_one_source_toggle() {
    let config = ForgeConfig::builder()
        .text_generator(RecordingText::replying(GOOD_REPLY))
        .image_generator(CountingImage::new())
        .require_exactly_one_source(true)
        .build()
        .unwrap();
    let forge = Forge::new(config).unwrap();

    let both = RewriteRequest::new(TITLE, APPLY)
        .content("text")
        .source_url("https://blog.example.org/post");
    assert!(matches!(
        forge.process(&both).await,
        Err(ForgeError::Validation { field: "content", .. })
    ));

    let neither = RewriteRequest::new(TITLE, APPLY);
    assert!(forge.process(&neither).await.is_err());

    let one = RewriteRequest::new(TITLE, APPLY).content("text");
    assert!(forge.process(&one).await.is_ok());
}

// ── Image channel ────────────────────────────────────────────────────────────

#[tokio::test]
async fn passthrough_urls_are_returned_verbatim() {
    let forge = forge(RecordingText::replying(GOOD_REPLY), CountingImage::new(), SourcePolicy::Lenient);
    let request = RewriteRequest::new(TITLE, "https://Jobs.Example.org")
        .image_url("https://CDN.example.org/a b.jpg");

    let result = forge.process(&request).await.unwrap();

    assert_eq!(result.image_url(), Some("https://CDN.example.org/a b.jpg"));
    let wire = serde_json::to_value(&result).unwrap();
    assert_eq!(wire["applyLink"], "https://Jobs.Example.org");
    assert_eq!(wire["imageUrl"], "https://CDN.example.org/a b.jpg");
    assert!(result.to_markdown().unwrap().ends_with("[Apply Now](https://Jobs.Example.org)\n"));
}

#[tokio::test]
async fn supplied_image_url_skips_generation() {
    let image = CountingImage::new();
    let forge = forge(RecordingText::replying(GOOD_REPLY), image.clone(), SourcePolicy::Lenient);
    let request = RewriteRequest::new(TITLE, APPLY)
        .image_url("https://cdn.example.org/header.jpg")
        .image_prompt(GRADIENT);

    let result = forge.process(&request).await.unwrap();

    assert_eq!(image.calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.image_url(), Some("https://cdn.example.org/header.jpg"));
    assert_eq!(result.image.as_ref().unwrap().as_ref().unwrap().origin, ImageOrigin::Supplied);
}

#[tokio::test]
async fn empty_generation_with_good_image_is_a_partial_result() {
    let image = CountingImage::new();
    let forge = forge(RecordingText::replying(""), image.clone(), SourcePolicy::Lenient);
    let request = RewriteRequest::new(TITLE, APPLY).image_prompt(GRADIENT);

    let result = forge.process(&request).await.unwrap();

    assert!(result.text_error().is_some());
    assert_eq!(result.image_url(), Some(image.url.as_str()));
    assert_eq!(result.body(), None);
    assert!(!result.is_complete());

    let wire = serde_json::to_value(&result).unwrap();
    assert!(wire["body"].is_null());
    assert!(wire["provenance"].is_null());
    assert_eq!(wire["imageUrl"], image.url.as_str());
    assert!(wire["textError"].as_str().unwrap().contains("no content produced"));
    assert!(wire["imageError"].is_null());
    assert_eq!(wire["applyLink"], APPLY);
}

#[tokio::test]
async fn panicking_image_generator_leaves_text_intact() {
    let forge = forge(
        RecordingText::replying(GOOD_REPLY),
        Arc::new(PanickingImage),
        SourcePolicy::Lenient,
    );
    let request = RewriteRequest::new(TITLE, APPLY).image_prompt(GRADIENT);

    let result = forge.process(&request).await.unwrap();

    assert!(result.body().is_some());
    let err = result.image_error().unwrap();
    assert_eq!(err.kind(), ErrorKind::Unknown);
    assert!(err.to_string().contains("image backend exploded"));
}

// ── Output ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn messy_model_output_is_normalised() {
    let reply = "```markdown\nHere is the rewritten post:\n# Senior Platform Engineer\n\n<details><summary>Table of Contents</summary>\n\n- [Intro](#introduction)\n</details>\n\n# Intro\n\nHello.\n\n## Details & Perks\n\nMore.\n\n#### Fine Print\n\nSmall.\n```";
    let forge = forge(RecordingText::replying(reply), CountingImage::new(), SourcePolicy::Lenient);

    let result = forge.process(&RewriteRequest::new(TITLE, APPLY)).await.unwrap();
    let body = result.body().unwrap();

    assert!(validate_structure(body, TITLE).is_empty(), "{body}");
    assert!(!body.contains(TITLE));
    assert!(!body.contains("#introduction"));
    assert!(body.contains("- [Intro](#intro)\n  - [Details & Perks](#details--perks)\n  - [Fine Print](#fine-print)"));
}

#[tokio::test]
async fn summary_and_stats() {
    let reply = r###"{"rewrittenContent": "## Overview\n\nText.", "executiveSummary": "Platform role, remote friendly."}"###;
    let config = ForgeConfig::builder()
        .text_generator(RecordingText::replying(reply))
        .image_generator(CountingImage::new())
        .include_summary(true)
        .build()
        .unwrap();
    let forge = Forge::new(config).unwrap();

    let result = forge.process(&RewriteRequest::new(TITLE, APPLY)).await.unwrap();

    assert_eq!(result.summary(), Some("Platform role, remote friendly."));
    assert!(!result.body().unwrap().contains("remote friendly"));
    assert_eq!(result.stats.input_tokens, 321);
    assert_eq!(result.stats.output_tokens, 654);

    let md = result.to_markdown().unwrap();
    assert!(md.starts_with("> Platform role, remote friendly."));
    assert!(md.trim_end().ends_with(&format!("[Apply Now]({APPLY})")));
}

#[tokio::test]
async fn process_to_file_writes_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("posts/platform.md");
    let forge = forge(RecordingText::replying(GOOD_REPLY), CountingImage::new(), SourcePolicy::Lenient);
    let request = RewriteRequest::new(TITLE, APPLY).image_url("https://cdn.example.org/h.jpg");

    let result = forge.process_to_file(&request, &out).await.unwrap();

    let written = std::fs::read_to_string(&out).unwrap();
    assert_eq!(Some(written), result.to_markdown());
    assert!(!out.with_extension("md.tmp").exists());
}

#[tokio::test]
async fn process_to_file_skips_write_when_text_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("empty.md");
    let forge = forge(RecordingText::replying("   "), CountingImage::new(), SourcePolicy::Lenient);

    let result = forge.process_to_file(&RewriteRequest::new(TITLE, APPLY), &out).await.unwrap();

    assert!(result.text_error().is_some());
    assert!(!out.exists());
}

#[test]
fn process_sync_runs_without_a_runtime() {
    let forge = forge(RecordingText::replying(GOOD_REPLY), CountingImage::new(), SourcePolicy::Lenient);
    let result = forge.process_sync(&RewriteRequest::new(TITLE, APPLY)).unwrap();
    assert!(result.is_complete());
    assert_ne!(result.request_id, uuid::Uuid::nil());
}
