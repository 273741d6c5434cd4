//! Post-processing: deterministic cleanup of generated markdown.
//!
//! Even well-prompted models occasionally add artefacts the prompt asked
//! them not to: a ` ```markdown ` wrapper around the whole reply, a chatty
//! "Here is the rewritten post:" preamble, CRLF line endings, placeholder
//! images pointing at `example.com`. These rules fix such quirks without
//! touching the prose itself.
//!
//! ## Rule Order
//!
//! Fences are stripped before the preamble check so the preamble is the
//! first line; line endings are normalised before any per-line rule; image
//! placeholders are removed before blank lines are collapsed so an emptied
//! line does not leave a gap.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to raw generation output.
///
/// Rules (applied in order):
/// 1. Strip an outer code fence around the whole reply
/// 2. Normalise line endings (CRLF → LF)
/// 3. Drop a conversational preamble line ("Sure! Here is ...:")
/// 4. Trim trailing whitespace per line
/// 5. Remove placeholder image links (`![..](image.png)`, `example.com`)
/// 6. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 7. Ensure headings are surrounded by blank lines (outside code blocks)
/// 8. Collapse runs of blank lines to a single blank line
/// 9. Ensure the text ends with exactly one newline
pub fn clean_markdown(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = strip_preamble(&s);
    let s = trim_trailing_whitespace(&s);
    let s = remove_placeholder_images(&s);
    let s = remove_invisible_chars(&s);
    let s = normalise_heading_spacing(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Strip outer fence ────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Line endings ─────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Conversational preamble ──────────────────────────────────────

static RE_PREAMBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:sure|certainly|of course|absolutely)?[!,.]?\s*here(?:'s| is| are)\b[^\n]*:\s*$")
        .unwrap()
});

fn strip_preamble(input: &str) -> String {
    let trimmed = input.trim_start();
    let (first, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
    if RE_PREAMBLE.is_match(first.trim()) {
        rest.to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 4: Trailing whitespace ──────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Placeholder images ───────────────────────────────────────────
//
// The header image is attached outside the body, so any image the model
// writes into the body is invented. Real absolute links survive; relative
// paths and well-known placeholder hosts become an italic caption.

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap());

const PLACEHOLDER_HOSTS: &[&str] = &[
    "example.com",
    "example.org",
    "placeholder.com",
    "via.placeholder.com",
    "placehold.co",
    "placehold.it",
    "dummyimage.com",
    "picsum.photos",
    "unsplash.it",
];

fn is_placeholder_url(url: &str) -> bool {
    let u = url.trim();
    if !u.starts_with("http://") && !u.starts_with("https://") {
        return true;
    }
    PLACEHOLDER_HOSTS.iter().any(|h| u.contains(h))
}

fn remove_placeholder_images(input: &str) -> String {
    RE_IMAGE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let alt = caps[1].trim();
            if !is_placeholder_url(&caps[2]) {
                caps[0].to_string()
            } else if alt.is_empty() {
                String::new()
            } else {
                format!("*{alt}*")
            }
        })
        .into_owned()
}

// ── Rule 6: Invisible characters ─────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

// ── Rule 7: Heading spacing ──────────────────────────────────────────────

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

fn normalise_heading_spacing(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut in_fence = false;
    let mut after_heading = false;

    for line in input.lines() {
        let t = line.trim_start();
        if t.starts_with("```") || t.starts_with("~~~") {
            in_fence = !in_fence;
        }

        let heading = !in_fence && is_heading(line);
        let needs_gap = heading || (after_heading && !line.is_empty());
        if needs_gap && out.last().is_some_and(|l| !l.is_empty()) {
            out.push("");
        }
        out.push(line);
        after_heading = heading;
    }
    out.join("\n")
}

// ── Rule 8: Blank-line runs ──────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

// ── Rule 9: Final newline ────────────────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}
