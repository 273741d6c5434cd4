//! Table-of-contents and heading-anchor enforcement.
//!
//! The prompt asks the model for a collapsible TOC whose links match anchored
//! headings, but models drift: slugs that don't match, a missing anchor, an
//! H4 here and there, the title repeated as an H1. Rather than trusting the
//! model, [`enforce_structure`] rebuilds the structure deterministically from
//! the headings the model wrote:
//!
//! 1. Drop any TOC the model produced (`<details>` block or a "Contents" list)
//! 2. Drop a title echo (a heading equal to the title, or the title alone on
//!    the first line)
//! 3. Map the heading levels onto exactly two tiers, H2 and H3
//! 4. Give every heading an `<a id="slug"></a>` anchor, de-duplicating slugs
//! 5. Prepend a fresh `<details>` TOC with one link per heading
//!
//! [`validate_structure`] checks the same invariants on any body and reports
//! every violation; it is what downstream consumers use to verify a body.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Label of the collapsible TOC block.
pub const TOC_SUMMARY: &str = "Table of Contents";

static RE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.*?)(?:\s+#+)?\s*$").unwrap());

static RE_ANCHOR_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<a\s+(?:id|name)\s*=\s*["'][^"']*["']\s*>\s*</a>"#).unwrap());

static RE_CUSTOM_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\{#[^}]*\}\s*$").unwrap());

static RE_MD_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());

static RE_DETAILS_TOC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<details[^>]*>\s*<summary[^>]*>[^<]*contents[^<]*</summary>.*?</details>\s*")
        .unwrap()
});

static RE_TOC_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\(#([^)\s]+)\)").unwrap());

static RE_ANCHORED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(#{1,6})\s+<a id="([^"]*)"></a>(.*)$"#).unwrap());

static RE_LIST_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+]|\d+\.)\s+\[[^\]]*\]\(#[^)]*\)\s*$").unwrap());

/// Derive the anchor slug for a heading.
///
/// Lowercase, whitespace → `-`, every other non-alphanumeric character
/// removed. `"Our Core Mission"` → `"our-core-mission"`,
/// `"Pay & Benefits"` → `"pay--benefits"`.
pub fn slugify(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || c == '-' {
                Some(c)
            } else if c.is_whitespace() {
                Some('-')
            } else {
                None
            }
        })
        .collect()
}

/// Visible text of a heading with inline markdown removed.
fn plain_text(text: &str) -> String {
    let text = RE_ANCHOR_TAG.replace_all(text, "");
    let text = RE_MD_LINK.replace_all(&text, "$1");
    text.replace("**", "")
        .replace("__", "")
        .replace('`', "")
        .trim()
        .to_string()
}

fn is_title_echo(text: &str, title: &str) -> bool {
    let t = text
        .trim()
        .trim_matches(|c| c == '*' || c == '_')
        .trim();
    !t.is_empty() && t.eq_ignore_ascii_case(title.trim())
}

fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

fn is_toc_heading(plain: &str) -> bool {
    let p = plain.to_ascii_lowercase();
    p == "table of contents" || p == "contents"
}

enum Line {
    Heading { level: usize, text: String },
    Other(String),
}

/// Rebuild the TOC and heading anchors of `body`.
///
/// The output always starts with a `<details>` TOC block; every H2/H3 heading
/// carries an anchor referenced by exactly one TOC entry.
pub fn enforce_structure(body: &str, title: &str) -> String {
    let body = RE_DETAILS_TOC.replace_all(body, "");

    let mut lines: Vec<Line> = Vec::new();
    let mut in_fence = false;
    let mut in_toc_list = false;
    let mut seen_content = false;

    for line in body.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
            in_toc_list = false;
            seen_content = true;
            lines.push(Line::Other(line.to_string()));
            continue;
        }
        if in_fence {
            lines.push(Line::Other(line.to_string()));
            continue;
        }

        if let Some(caps) = RE_HEADING.captures(line) {
            let level = caps[1].len();
            let raw = RE_CUSTOM_ID.replace(&caps[2], "");
            let text = RE_ANCHOR_TAG.replace_all(&raw, "").trim().to_string();
            let plain = plain_text(&text);
            in_toc_list = false;

            if is_toc_heading(&plain) {
                in_toc_list = true;
                continue;
            }
            if plain.is_empty() || is_title_echo(&plain, title) {
                continue;
            }
            seen_content = true;
            lines.push(Line::Heading { level, text });
            continue;
        }

        if in_toc_list {
            if line.trim().is_empty() || RE_LIST_LINK.is_match(line) {
                continue;
            }
            in_toc_list = false;
        }

        if !seen_content && !line.trim().is_empty() {
            if is_title_echo(line, title) {
                continue;
            }
            seen_content = true;
        }
        lines.push(Line::Other(line.to_string()));
    }

    // The shallowest heading level becomes H2, everything deeper H3.
    let top = lines
        .iter()
        .filter_map(|l| match l {
            Line::Heading { level, .. } => Some(*level),
            Line::Other(_) => None,
        })
        .min()
        .unwrap_or(2);

    let mut seen_slugs: HashSet<String> = HashSet::new();
    let mut toc_entries: Vec<String> = Vec::new();
    let mut out_lines: Vec<String> = Vec::with_capacity(lines.len());

    for line in lines {
        match line {
            Line::Heading { level, text } => {
                let tier = if level <= top { 2 } else { 3 };
                let plain = plain_text(&text);
                let slug = unique_slug(&plain, &mut seen_slugs);
                let indent = if tier == 2 { "" } else { "  " };
                toc_entries.push(format!(
                    "{indent}- [{}](#{slug})",
                    plain.replace('[', "\\[").replace(']', "\\]")
                ));
                out_lines.push(format!("{} <a id=\"{slug}\"></a>{text}", "#".repeat(tier)));
            }
            Line::Other(s) => out_lines.push(s),
        }
    }

    let mut toc = format!("<details>\n<summary>{TOC_SUMMARY}</summary>\n\n");
    for entry in &toc_entries {
        toc.push_str(entry);
        toc.push('\n');
    }
    toc.push_str("\n</details>");

    let rest = out_lines.join("\n");
    let rest = rest.trim();
    if rest.is_empty() {
        format!("{toc}\n")
    } else {
        format!("{toc}\n\n{rest}\n")
    }
}

fn unique_slug(plain: &str, used: &mut HashSet<String>) -> String {
    let mut base = slugify(plain);
    if base.is_empty() {
        base = "section".to_string();
    }
    // Suffixes always count up from the base slug; a literal "FAQ 1" heading
    // may already hold "faq-1", so skip taken ones.
    let mut slug = base.clone();
    let mut n = 1;
    while used.contains(&slug) {
        slug = format!("{base}-{n}");
        n += 1;
    }
    used.insert(slug.clone());
    slug
}

// ── Validation ───────────────────────────────────────────────────────────

/// A violation of the body structure contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureIssue {
    /// The body does not open with a `<details>` TOC block.
    MissingToc,
    /// A TOC link points at an anchor no heading carries.
    DanglingTocLink { slug: String },
    /// Two TOC entries point at the same anchor.
    DuplicateTocEntry { slug: String },
    /// A heading has no inline anchor.
    HeadingWithoutAnchor { heading: String },
    /// Two headings carry the same anchor.
    DuplicateAnchor { slug: String },
    /// A heading anchor no TOC entry references.
    AnchorNotInToc { slug: String },
    /// The anchor is not the slug of the heading text.
    SlugMismatch { heading: String, slug: String },
    /// A heading outside the H2/H3 hierarchy.
    HeadingLevel { heading: String, level: usize },
    /// The title appears as a heading or verbatim at the top.
    TitleEchoed,
}

impl fmt::Display for StructureIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingToc => write!(f, "body does not start with a collapsible TOC"),
            Self::DanglingTocLink { slug } => write!(f, "TOC link #{slug} has no matching heading"),
            Self::DuplicateTocEntry { slug } => write!(f, "TOC lists #{slug} more than once"),
            Self::HeadingWithoutAnchor { heading } => write!(f, "heading '{heading}' has no anchor"),
            Self::DuplicateAnchor { slug } => write!(f, "anchor #{slug} appears on several headings"),
            Self::AnchorNotInToc { slug } => write!(f, "anchor #{slug} is missing from the TOC"),
            Self::SlugMismatch { heading, slug } => {
                write!(f, "anchor #{slug} does not match heading '{heading}'")
            }
            Self::HeadingLevel { heading, level } => {
                write!(f, "heading '{heading}' is H{level}, only H2/H3 are allowed")
            }
            Self::TitleEchoed => write!(f, "title is repeated in the body"),
        }
    }
}

/// Check `body` against the TOC/anchor contract. An empty vector means valid.
pub fn validate_structure(body: &str, title: &str) -> Vec<StructureIssue> {
    let mut issues = Vec::new();

    let trimmed = body.trim_start();
    let (toc, rest) = match (trimmed.starts_with("<details"), trimmed.find("</details>")) {
        (true, Some(end)) => {
            let end = end + "</details>".len();
            (&trimmed[..end], &trimmed[end..])
        }
        _ => {
            issues.push(StructureIssue::MissingToc);
            ("", trimmed)
        }
    };

    let mut toc_counts: HashMap<String, usize> = HashMap::new();
    let mut toc_order: Vec<String> = Vec::new();
    for caps in RE_TOC_LINK.captures_iter(toc) {
        let slug = caps[2].to_string();
        let n = toc_counts.entry(slug.clone()).or_insert(0);
        if *n == 0 {
            toc_order.push(slug);
        }
        *n += 1;
    }

    let mut anchor_counts: HashMap<String, usize> = HashMap::new();
    let mut anchor_order: Vec<String> = Vec::new();
    let mut in_fence = false;
    let mut first_content = true;

    for line in rest.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
            first_content = false;
            continue;
        }
        if in_fence {
            continue;
        }
        if first_content && !line.trim().is_empty() {
            first_content = false;
            if is_title_echo(line, title) {
                issues.push(StructureIssue::TitleEchoed);
            }
        }

        let Some(caps) = RE_HEADING.captures(line) else {
            continue;
        };
        let level = caps[1].len();

        let Some(anchored) = RE_ANCHORED_HEADING.captures(line) else {
            issues.push(StructureIssue::HeadingWithoutAnchor {
                heading: plain_text(&caps[2]),
            });
            continue;
        };
        let slug = anchored[2].to_string();
        let heading = plain_text(&anchored[3]);

        if level != 2 && level != 3 {
            issues.push(StructureIssue::HeadingLevel {
                heading: heading.clone(),
                level,
            });
        }
        if is_title_echo(&heading, title) {
            issues.push(StructureIssue::TitleEchoed);
        }
        if !slug_matches(&heading, &slug) {
            issues.push(StructureIssue::SlugMismatch {
                heading,
                slug: slug.clone(),
            });
        }

        let n = anchor_counts.entry(slug.clone()).or_insert(0);
        if *n == 0 {
            anchor_order.push(slug);
        }
        *n += 1;
    }

    for slug in &toc_order {
        match anchor_counts.get(slug) {
            None => issues.push(StructureIssue::DanglingTocLink { slug: slug.clone() }),
            Some(_) if toc_counts[slug] > 1 => {
                issues.push(StructureIssue::DuplicateTocEntry { slug: slug.clone() })
            }
            _ => {}
        }
    }
    for slug in &anchor_order {
        if anchor_counts[slug] > 1 {
            issues.push(StructureIssue::DuplicateAnchor { slug: slug.clone() });
        }
        if !toc_counts.contains_key(slug) {
            issues.push(StructureIssue::AnchorNotInToc { slug: slug.clone() });
        }
    }

    issues
}

/// Accept the plain slug or a de-duplicated `slug-N` variant.
fn slug_matches(heading: &str, slug: &str) -> bool {
    let expected = slugify(heading);
    let expected = if expected.is_empty() {
        "section".to_string()
    } else {
        expected
    };
    if slug == expected {
        return true;
    }
    slug.strip_prefix(&expected)
        .and_then(|s| s.strip_prefix('-'))
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}
