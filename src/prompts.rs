//! Prompts for the rewrite engine.
//!
//! Every instruction the text generator sees is assembled here, so prompt
//! changes never touch the orchestration code and tests can inspect the
//! exact wording without a live model.
//!
//! The structure rules (TOC, anchors, heading levels) are asked for in the
//! prompt but also enforced afterwards by [`crate::pipeline::toc`]; the
//! prompt just keeps the model's output close to the final shape.
//!
//! Callers can replace the system prompt via
//! [`crate::config::ForgeConfig::system_prompt`]; the user prompt is always
//! built here.

/// Default system prompt for the rewrite engine.
///
/// Used when `ForgeConfig::system_prompt` is `None`.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an elite content strategist and SEO expert, known for turning dry or complex material into compelling, insightful and highly engaging blog posts.

Follow these rules precisely:

1. CONTENT
   - Write clearly and logically, with smooth transitions between sections
   - Use a professional yet approachable tone; examples and rhetorical questions are welcome
   - Add insight and clarify complex points instead of merely rephrasing

2. STRUCTURE
   - Begin with a collapsible table of contents:
     <details>
     <summary>Table of Contents</summary>

     - [Section Title](#section-title)
       - [Subsection Title](#subsection-title)

     </details>
   - Use only ## and ### headings; never #, never ####
   - Every heading carries an HTML anchor whose id matches its TOC link, e.g.
     ## <a id="our-core-mission"></a>Our Core Mission
   - An id is the heading text lowercased, spaces replaced by hyphens, other punctuation removed

3. WHAT TO AVOID
   - Do NOT repeat the post title as a heading or as the first line
   - Do NOT add images or image placeholders
   - Do NOT add commentary before or after the post"#;

/// Appended to the system prompt when an executive summary is requested.
pub const SUMMARY_OUTPUT_FORMAT: &str = r#"

4. OUTPUT FORMAT
   Reply with a single JSON object and nothing else:
   {"rewrittenContent": "<the complete markdown post>", "executiveSummary": "<2-3 sentence summary>"}
   The summary is plain text and is never repeated inside rewrittenContent."#;

/// Appended to the system prompt when only the body is wanted.
pub const BODY_OUTPUT_FORMAT: &str = r#"

4. OUTPUT FORMAT
   Output ONLY the markdown post, starting with the <details> table of contents.
   Do NOT wrap it in ```markdown fences."#;

/// Assemble the system message for one rewrite.
pub fn system_prompt(custom: Option<&str>, include_summary: bool) -> String {
    let base = custom.unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let format = if include_summary {
        SUMMARY_OUTPUT_FORMAT
    } else {
        BODY_OUTPUT_FORMAT
    };
    format!("{base}{format}")
}

/// User message asking for a rewrite of existing source text.
pub fn rewrite_prompt(title: &str, source: &str, target_words: usize) -> String {
    format!(
        "Rewrite the following material into a polished blog post.\n\
         Target length: approximately {target_words} words; prioritise quality and depth over the exact count.\n\n\
         Title: {title}\n\n\
         Source material:\n\"\"\"\n{}\n\"\"\"",
        source.trim()
    )
}

/// User message asking for a post written from the title alone.
///
/// Used when there is no source text, either because none was supplied or
/// because extraction failed under the lenient policy.
pub fn generate_prompt(title: &str, target_words: usize) -> String {
    format!(
        "There is no source material for this post. Write a complete, plausible and \
         well-structured blog post from the title alone.\n\
         Target length: approximately {target_words} words.\n\n\
         Title: {title}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_picks_output_format() {
        let with = system_prompt(None, true);
        assert!(with.starts_with(DEFAULT_SYSTEM_PROMPT));
        assert!(with.contains("executiveSummary"));

        let without = system_prompt(None, false);
        assert!(!without.contains("executiveSummary"));
        assert!(without.contains("Output ONLY the markdown post"));
    }

    #[test]
    fn custom_system_prompt_replaces_default() {
        let p = system_prompt(Some("Be terse."), false);
        assert!(p.starts_with("Be terse."));
        assert!(!p.contains("elite content strategist"));
    }

    #[test]
    fn rewrite_prompt_carries_source_and_length() {
        let p = rewrite_prompt("Senior Platform Engineer", "  We build platforms.\n", 600);
        assert!(p.contains("Title: Senior Platform Engineer"));
        assert!(p.contains("\"\"\"\nWe build platforms.\n\"\"\""));
        assert!(p.contains("approximately 600 words"));
    }

    #[test]
    fn generate_prompt_has_no_source_block() {
        let p = generate_prompt("Senior Platform Engineer", 800);
        assert!(p.contains("no source material"));
        assert!(!p.contains("\"\"\""));
    }
}
