//! Case extraction from source documents.
//!
//! Prompt collections follow several incompatible conventions, so the
//! [`Extractor`] holds an ordered list of [`Strategy`] values and tries them
//! in turn. The first strategy that yields at least one accepted record wins
//! and the rest are never consulted: output from different strategies is
//! never merged for the same document.
//!
//! | Strategy | Unit | Prompt body |
//! |----------|------|-------------|
//! | [`Strategy::StructuredSection`] | `## Case N: Title` section | fenced block under a `Prompt` label |
//! | [`Strategy::DottedSection`] | `### 1.2 Title` section | labeled block, else first block |
//! | [`Strategy::FallbackBlock`] | any fenced block | the block itself, if it reads as prose |
//!
//! Every strategy runs its candidates through the same acceptance rules
//! (minimum prompt length, foreign-script ratio). A document on which every
//! strategy comes up empty yields an empty list; that is a normal outcome.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::config::ExtractionConfig;
use crate::markdown::{self, FencedBlock, Heading};
use crate::models::{CaseRecord, SourceDocument};

/// One document convention the extractor knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Numbered case headings with an explicitly labeled prompt block.
    StructuredSection,
    /// Dotted subsection headings (`1.1`, `2.3.1`).
    DottedSection,
    /// Last resort: any fenced block that reads as prose.
    FallbackBlock,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::StructuredSection => "structured_section",
            Strategy::DottedSection => "dotted_section",
            Strategy::FallbackBlock => "fallback_block",
        }
    }

    /// Extract accepted case records from `doc` using this convention only.
    pub fn extract(&self, doc: &SourceDocument, rules: &ExtractionRules) -> Vec<CaseRecord> {
        let text = doc.raw_content.as_str();
        let units = match self {
            Strategy::StructuredSection => structured_units(text),
            Strategy::DottedSection => dotted_units(text),
            Strategy::FallbackBlock => fallback_units(text),
        };
        units
            .into_iter()
            .filter(|unit| rules.accepts(&unit.prompt))
            .map(|unit| unit.into_record(doc))
            .collect()
    }
}

/// Acceptance rules applied uniformly to every strategy's candidates.
#[derive(Debug, Clone)]
pub struct ExtractionRules {
    pub min_prompt_chars: usize,
    pub max_foreign_ratio: f64,
}

impl ExtractionRules {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            min_prompt_chars: config.min_prompt_chars,
            max_foreign_ratio: config.max_foreign_ratio,
        }
    }

    pub fn accepts(&self, prompt: &str) -> bool {
        prompt.chars().count() >= self.min_prompt_chars
            && foreign_script_ratio(prompt) <= self.max_foreign_ratio
    }
}

/// Result of running the strategy chain over one document.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// The strategy that produced `records`, or `None` if every strategy was empty.
    pub strategy: Option<Strategy>,
    pub records: Vec<CaseRecord>,
}

pub struct Extractor {
    strategies: Vec<Strategy>,
    rules: ExtractionRules,
}

impl Extractor {
    pub fn new(strategies: Vec<Strategy>, rules: ExtractionRules) -> Self {
        Self { strategies, rules }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            config.strategies.clone(),
            ExtractionRules::from_config(config),
        )
    }

    /// Run the strategy chain, short-circuiting at the first non-empty result.
    pub fn extract(&self, doc: &SourceDocument) -> Extraction {
        for strategy in &self.strategies {
            let records = strategy.extract(doc, &self.rules);
            if !records.is_empty() {
                return Extraction {
                    strategy: Some(*strategy),
                    records,
                };
            }
        }
        Extraction {
            strategy: None,
            records: Vec::new(),
        }
    }
}

/// Fraction of non-whitespace characters in a CJK script.
///
/// The target language is English; Han, kana, Hangul, and CJK/fullwidth
/// punctuation all count as foreign.
pub fn foreign_script_ratio(text: &str) -> f64 {
    let mut total = 0usize;
    let mut foreign = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if matches!(c,
            '\u{3000}'..='\u{303F}'
            | '\u{3040}'..='\u{30FF}'
            | '\u{3400}'..='\u{4DBF}'
            | '\u{4E00}'..='\u{9FFF}'
            | '\u{AC00}'..='\u{D7AF}'
            | '\u{FF00}'..='\u{FFEF}')
        {
            foreign += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        foreign as f64 / total as f64
    }
}

/// Whether a fenced block looks like program source rather than a prompt.
pub fn looks_like_program_source(block: &FencedBlock) -> bool {
    const CODE_LANGUAGES: &[&str] = &[
        "bash", "sh", "shell", "zsh", "console", "powershell", "python", "py", "js",
        "javascript", "ts", "typescript", "jsx", "tsx", "json", "yaml", "yml", "toml", "rust",
        "rs", "go", "java", "kotlin", "swift", "c", "cpp", "c++", "csharp", "cs", "php", "ruby",
        "rb", "html", "css", "scss", "sql", "dockerfile", "makefile", "diff",
    ];
    CODE_LANGUAGES.contains(&block.info.as_str()) || program_token_re().is_match(&block.body)
}

fn program_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?m)^[ \t]*(?:",
            r"import\s+(?:[\w.{}*, ]*[\w}*];?[ \t]*$|.*\bfrom\s+['\x22]|['\x22])",
            r"|from\s+[\w.]+\s+import\b|#include\s*[<\x22]|package\s+[\w.]+;?[ \t]*$|using\s+[\w.]+;",
            r"|def\s+\w+\s*\(|class\s+\w+\s*[:({<]|class\s+\w+\s+(?:extends|implements)\b",
            r"|function\s*\w*\s*\(|(?:export\s+)?(?:const|let|var)\s+\w+\s*=",
            r"|(?:pub\s+)?fn\s+\w+\s*[(<]|public\s+(?:static\s+)?\w+(?:<[^>\n]*>)?\s+\w+\s*\(",
            r"|interface\s+\w+\s*\{|\$\s+\w+",
            r"|(?:sudo\s+)?(?:npm|npx|pnpm|yarn|pip3?|cargo|brew|apt(?:-get)?|gem|go|composer)\s+(?:install|add|i|get|run|build)\b",
            r")",
            r"|\brequire\(\s*['\x22]|\bgit\s+clone\s+(?:https?://|git@)",
        ))
        .expect("static program-token regex")
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Units
// ═══════════════════════════════════════════════════════════════════════

/// One structural unit matched by a strategy, before conversion to a record.
#[derive(Debug, Clone)]
struct Unit {
    title: String,
    prompt: String,
    /// Unit text outside fenced blocks: images, attribution, links.
    context: String,
    heading_author: Option<Attribution>,
}

#[derive(Debug, Clone, PartialEq)]
struct Attribution {
    name: String,
    url: Option<String>,
}

impl Unit {
    fn into_record(self, doc: &SourceDocument) -> CaseRecord {
        let images = markdown::image_urls(&self.context);
        let (reference_image_url, result_image_url) = assign_image_roles(&images);
        let attribution = self.heading_author.or_else(|| labeled_author(&self.context));
        let (author, author_url) = match attribution {
            Some(a) => (Some(a.name), a.url),
            None => (None, None),
        };

        CaseRecord {
            title: self.title,
            prompt_text: self.prompt,
            author,
            author_url,
            source_repo: doc.source.to_string(),
            source_url: labeled_source(&self.context).unwrap_or_else(|| doc.source.repo_url()),
            reference_image_url,
            result_image_url,
            tags: Vec::new(),
            category: String::new(),
            reference_required: false,
            reference_note: reference_note(&self.context),
            scraped_at: doc.fetched_at,
        }
    }
}

/// One image is the result; with two or more the first is the reference
/// and the last is the result.
pub fn assign_image_roles(images: &[String]) -> (Option<String>, Option<String>) {
    match images {
        [] => (None, None),
        [only] => (None, Some(only.clone())),
        [first, .., last] => (Some(first.clone()), Some(last.clone())),
    }
}

/// Split `text` into sections starting at each heading accepted by `is_unit`.
/// A section runs until the next heading at the same or a shallower level.
fn sections<'a, F>(text: &'a str, mut is_unit: F) -> Vec<(Heading, &'a str)>
where
    F: FnMut(&Heading) -> bool,
{
    let all = markdown::headings(text);
    let mut out = Vec::new();
    for (i, heading) in all.iter().enumerate() {
        if !is_unit(heading) {
            continue;
        }
        let end = all[i + 1..]
            .iter()
            .find(|next| next.level <= heading.level)
            .map(|next| next.start)
            .unwrap_or(text.len());
        out.push((heading.clone(), &text[heading.end..end]));
    }
    out
}

/// The first fenced block whose preceding non-empty line is a prompt label.
fn labeled_prompt_block(body: &str) -> Option<FencedBlock> {
    markdown::fenced_blocks(body).into_iter().find(|block| {
        body[..block.start]
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(is_prompt_label)
            .unwrap_or(false)
    })
}

fn is_prompt_label(line: &str) -> bool {
    let stripped = line
        .trim()
        .trim_start_matches(|c: char| matches!(c, '#' | '*' | '_' | '>' | '-' | ' '))
        .trim_end_matches(|c: char| matches!(c, '*' | '_' | ':' | '：' | ' '));
    if stripped.is_empty() || stripped.chars().count() > 40 {
        return false;
    }
    let lower = stripped.to_lowercase();
    lower.contains("prompt") || lower.contains("提示词")
}

fn structured_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?i:案例|case|example|no\.?)\s*(\d+)\s*[：:.\-]?\s*(.*)$")
            .expect("static case heading regex")
    })
}

fn dotted_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+(?:\.\d+)+)\.?\s+(.+)$").expect("static dotted heading regex")
    })
}

fn structured_units(text: &str) -> Vec<Unit> {
    sections(text, |h| h.level >= 2 && structured_heading_re().is_match(&h.text))
        .into_iter()
        .filter_map(|(heading, body)| {
            let caps = structured_heading_re().captures(&heading.text)?;
            let (title, heading_author) = split_heading_author(caps[2].trim());
            let title = if title.is_empty() {
                format!("Case {}", &caps[1])
            } else {
                title
            };
            let block = labeled_prompt_block(body)?;
            Some(Unit {
                title,
                prompt: block.body.trim().to_string(),
                context: markdown::strip_fenced(body),
                heading_author,
            })
        })
        .collect()
}

fn dotted_units(text: &str) -> Vec<Unit> {
    sections(text, |h| dotted_heading_re().is_match(&h.text))
        .into_iter()
        .filter_map(|(heading, body)| {
            let caps = dotted_heading_re().captures(&heading.text)?;
            let (title, heading_author) = split_heading_author(caps[2].trim());
            let block = labeled_prompt_block(body)
                .or_else(|| markdown::fenced_blocks(body).into_iter().next())?;
            Some(Unit {
                title,
                prompt: block.body.trim().to_string(),
                context: markdown::strip_fenced(body),
                heading_author,
            })
        })
        .collect()
}

fn fallback_units(text: &str) -> Vec<Unit> {
    let headings = markdown::headings(text);
    let blocks = markdown::fenced_blocks(text);

    blocks
        .iter()
        .enumerate()
        .filter(|(_, block)| !looks_like_program_source(block))
        .map(|(i, block)| {
            let preceding = headings.iter().rev().find(|h| h.end <= block.start);
            let prev_block_end = if i > 0 { blocks[i - 1].end } else { 0 };
            let span_start = preceding
                .map(|h| h.start)
                .unwrap_or(0)
                .max(prev_block_end);
            let next_heading = headings
                .iter()
                .find(|h| h.start >= block.end)
                .map(|h| h.start)
                .unwrap_or(text.len());
            let next_block = blocks.get(i + 1).map(|b| b.start).unwrap_or(text.len());
            let span_end = next_heading.min(next_block);

            let (title, heading_author) = match preceding {
                Some(h) => split_heading_author(&h.text),
                None => ("Untitled prompt".to_string(), None),
            };
            let context = format!(
                "{}{}",
                &text[span_start..block.start],
                &text[block.end..span_end]
            );
            Unit {
                title,
                prompt: block.body.trim().to_string(),
                context: markdown::strip_fenced(&context),
                heading_author,
            }
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Attribution, source link, reference note
// ═══════════════════════════════════════════════════════════════════════

fn heading_author_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\s*[(（]\s*(?i:by|作者)\s*[:：]?\s*(.+?)\s*[)）]\s*$")
            .expect("static heading author regex")
    })
}

fn author_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?im)^[\s>*_\-]*(?:(?:author|作者)[*_\s]*[:：][*_\s]*(.+)|by\s+([@\[].*))$",
        )
        .expect("static author line regex")
    })
}

fn source_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^[\s>*_\-]*(?:source|link|original|来源|原文)[^:：\n]{0,20}[:：][*_\s]*(.+)$")
            .expect("static source line regex")
    })
}

fn reference_note_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)(?:需上传参考图片|reference image required|requires? (?:a )?reference image)[*_\s]*[:：]\s*(.+)$")
            .expect("static reference note regex")
    })
}

fn bare_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s)>\]"']+"#).expect("static url regex"))
}

/// Split a trailing `(by @name)` / `(by [@name](url))` off a heading title.
fn split_heading_author(title: &str) -> (String, Option<Attribution>) {
    if let Some(m) = heading_author_re().captures(title) {
        let whole = m.get(0).map(|g| g.start()).unwrap_or(title.len());
        let attribution = parse_attribution(&m[1]);
        if attribution.is_some() {
            return (title[..whole].trim().to_string(), attribution);
        }
    }
    (title.trim().to_string(), None)
}

/// Parse `[@name](url)`, `@name`, or a plain name.
fn parse_attribution(raw: &str) -> Option<Attribution> {
    if let Some((label, url)) = markdown::links(raw).into_iter().next() {
        let name = clean_handle(&label);
        if !name.is_empty() {
            return Some(Attribution {
                name,
                url: Some(url),
            });
        }
    }
    let name = clean_handle(raw);
    if name.is_empty() {
        None
    } else {
        Some(Attribution { name, url: None })
    }
}

fn clean_handle(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '@' | '[' | ']' | '(' | ')' | '*' | '_' | '`'))
        .trim()
        .to_string()
}

fn labeled_author(context: &str) -> Option<Attribution> {
    author_line_re().captures_iter(context).find_map(|caps| {
        let raw = caps.get(1).or_else(|| caps.get(2))?;
        parse_attribution(raw.as_str())
    })
}

fn labeled_source(context: &str) -> Option<String> {
    source_line_re().captures_iter(context).find_map(|caps| {
        let rest = &caps[1];
        markdown::links(rest)
            .into_iter()
            .map(|(_, url)| url)
            .next()
            .or_else(|| bare_url_re().find(rest).map(|m| m.as_str().to_string()))
    })
}

fn reference_note(context: &str) -> Option<String> {
    reference_note_re()
        .captures(context)
        .map(|caps| {
            caps[1]
                .trim()
                .trim_matches(|c: char| c == '*' || c == '_')
                .trim()
                .to_string()
        })
        .filter(|note| !note.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourceId, Variant};
    use chrono::Utc;

    fn doc(text: &str) -> SourceDocument {
        SourceDocument {
            source: SourceId::new("acme", "prompts"),
            raw_content: text.to_string(),
            variant: Variant::Primary,
            served_from: "main/README.md".to_string(),
            fetched_at: Utc::now(),
        }
    }

    fn rules() -> ExtractionRules {
        ExtractionRules {
            min_prompt_chars: 30,
            max_foreign_ratio: 0.05,
        }
    }

    fn chain() -> Extractor {
        Extractor::new(
            vec![
                Strategy::StructuredSection,
                Strategy::DottedSection,
                Strategy::FallbackBlock,
            ],
            rules(),
        )
    }

    const STRUCTURED: &str = r#"# Awesome prompts

## Case 1: Glass figurine (by [@alice](https://x.com/alice))

![result](https://img.example/1.png)

**Prompt:**

```
Turn the subject into a delicate glass figurine on a wooden desk.
```

## Case 2: Retro poster

Author: [@bob](https://x.com/bob)
Source: [thread](https://x.com/bob/status/1)

<img src="https://img.example/2-ref.png"> <img src="https://img.example/2-out.png">

Prompt

```text
Design a retro travel poster of the uploaded city photo, bold flat colors.
```

Reference Image Required: upload a city skyline photo

```
This trailing block is ignored because it is not labeled as a prompt.
```
"#;

    #[test]
    fn structured_sections_yield_one_record_each() {
        let extraction = chain().extract(&doc(STRUCTURED));
        assert_eq!(extraction.strategy, Some(Strategy::StructuredSection));
        let records = extraction.records;
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].title, "Glass figurine");
        assert_eq!(records[0].author.as_deref(), Some("alice"));
        assert_eq!(records[0].author_url.as_deref(), Some("https://x.com/alice"));
        assert_eq!(records[0].source_url, "https://github.com/acme/prompts");
        assert_eq!(records[0].reference_image_url, None);
        assert_eq!(
            records[0].result_image_url.as_deref(),
            Some("https://img.example/1.png")
        );

        assert_eq!(records[1].title, "Retro poster");
        assert_eq!(records[1].author.as_deref(), Some("bob"));
        assert_eq!(records[1].source_url, "https://x.com/bob/status/1");
        assert_eq!(
            records[1].reference_image_url.as_deref(),
            Some("https://img.example/2-ref.png")
        );
        assert_eq!(
            records[1].result_image_url.as_deref(),
            Some("https://img.example/2-out.png")
        );
        assert!(records[1].prompt_text.starts_with("Design a retro travel poster"));
        assert_eq!(
            records[1].reference_note.as_deref(),
            Some("upload a city skyline photo")
        );
        assert_eq!(records[1].source_repo, "acme/prompts");
    }

    #[test]
    fn higher_priority_strategy_short_circuits_fallback() {
        // Both the structured and the fallback strategy match this document;
        // the stray block after the case must not appear.
        let text = format!(
            "{}\n## Other\n\n```\nA standalone block that the fallback strategy would accept as prose.\n```\n",
            STRUCTURED
        );
        let fallback_alone = Strategy::FallbackBlock.extract(&doc(&text), &rules());
        assert!(fallback_alone.len() > 2);

        let extraction = chain().extract(&doc(&text));
        assert_eq!(extraction.strategy, Some(Strategy::StructuredSection));
        assert_eq!(extraction.records.len(), 2);
    }

    #[test]
    fn dotted_sections() {
        let text = r#"## 1. Portraits

### 1.1 Film noir portrait

![out](https://img.example/noir.jpg)

```
A black and white film noir portrait with hard side lighting and smoke.
```

### 1.2 Too short

```
tiny
```
"#;
        let extraction = chain().extract(&doc(text));
        assert_eq!(extraction.strategy, Some(Strategy::DottedSection));
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].title, "Film noir portrait");
    }

    #[test]
    fn fallback_skips_program_source() {
        let text = r#"# Setup

```
import requests
from os import path
```

```
npm install awesome-prompts --save-dev please
```

```
const client = createClient({ apiKey: process.env.KEY });
```
"#;
        let extraction = chain().extract(&doc(text));
        assert!(extraction.records.is_empty());
        assert_eq!(extraction.strategy, None);
    }

    #[test]
    fn fallback_takes_prose_blocks_with_nearby_images() {
        let text = r#"# Collection

## Miniature city

![a](https://img.example/a.png)

```
A tilt-shift photo of a miniature city built from cardboard and fairy lights.
```

![b](https://img.example/b.png)

## Install

```bash
pip install something
```
"#;
        let records = chain().extract(&doc(text)).records;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Miniature city");
        assert_eq!(
            records[0].reference_image_url.as_deref(),
            Some("https://img.example/a.png")
        );
        assert_eq!(
            records[0].result_image_url.as_deref(),
            Some("https://img.example/b.png")
        );
    }

    #[test]
    fn foreign_script_prompts_are_discarded() {
        let text = r#"## 案例 1：玻璃质感

**提示词：**

```
将图片中的主体转换为精致的玻璃雕塑，放在木质桌面上，柔和的自然光。
```
"#;
        assert!(chain().extract(&doc(text)).records.is_empty());
    }

    #[test]
    fn short_prompts_never_become_records() {
        let text = "## Case 1: Tiny\n\nPrompt:\n\n```\ntoo short\n```\n";
        assert!(Strategy::StructuredSection
            .extract(&doc(text), &rules())
            .is_empty());
    }

    #[test]
    fn image_roles() {
        let urls = |n: usize| (0..n).map(|i| format!("u{}", i)).collect::<Vec<_>>();
        assert_eq!(assign_image_roles(&urls(0)), (None, None));
        assert_eq!(assign_image_roles(&urls(1)), (None, Some("u0".to_string())));
        assert_eq!(
            assign_image_roles(&urls(2)),
            (Some("u0".to_string()), Some("u1".to_string()))
        );
        assert_eq!(
            assign_image_roles(&urls(4)),
            (Some("u0".to_string()), Some("u3".to_string()))
        );
    }

    #[test]
    fn foreign_ratio_counts_cjk() {
        assert_eq!(foreign_script_ratio("plain english"), 0.0);
        assert_eq!(foreign_script_ratio("   "), 0.0);
        assert!(foreign_script_ratio("abc中文") > 0.3);
    }

    #[test]
    fn prompt_labels() {
        assert!(is_prompt_label("**Prompt:**"));
        assert!(is_prompt_label("### English Prompt"));
        assert!(is_prompt_label("提示词："));
        assert!(!is_prompt_label("This paragraph talks about prompts at great length and keeps going"));
        assert!(!is_prompt_label("Result"));
    }

    #[test]
    fn heading_author_variants() {
        let (title, author) = split_heading_author("Neon sign (by @carol)");
        assert_eq!(title, "Neon sign");
        assert_eq!(author.unwrap().name, "carol");

        let (title, author) = split_heading_author("Knitted doll (by [@dan](https://x.com/dan))");
        assert_eq!(title, "Knitted doll");
        assert_eq!(author.unwrap().url.as_deref(), Some("https://x.com/dan"));

        let (title, author) = split_heading_author("Plain title");
        assert_eq!(title, "Plain title");
        assert!(author.is_none());
    }

    fn block(body: &str) -> FencedBlock {
        FencedBlock {
            info: String::new(),
            body: body.to_string(),
            start: 0,
            end: 0,
        }
    }

    #[test]
    fn prose_that_mentions_code_words_is_kept() {
        let prompts = [
            "We were about to go get the red ball from the garden, painted in soft watercolor.",
            "package design for a luxury tea brand with gold foil and deep green paper",
            "class photo of thirty cartoon animals sitting on bleachers, yearbook style",
            "public library interior at golden hour with dust in the light beams",
            "import the old family photo into a sunlit scrapbook page.",
        ];
        for prompt in prompts {
            assert!(!looks_like_program_source(&block(prompt)), "{}", prompt);
            let text = format!(
                "## Idea\n\n![r](https://img.example/i.png)\n\n```\n{}\n```\n",
                prompt
            );
            let records = Strategy::FallbackBlock.extract(&doc(&text), &rules());
            assert_eq!(records.len(), 1, "{}", prompt);
            assert_eq!(records[0].prompt_text, prompt);
        }
    }

    #[test]
    fn code_shaped_lines_are_program_source() {
        let snippets = [
            "package main\n\nfunc main() {}",
            "class Scene:\n    pass",
            "class Renderer extends Base {}",
            "public static void main(String[] args) {",
            "go get github.com/acme/banana",
            "$ pip install pillow",
            "import os.path",
            "import { render } from './render';",
            "#include <stdio.h>",
            "pub fn render() -> Image {",
            "git clone https://github.com/acme/prompts",
        ];
        for snippet in snippets {
            assert!(looks_like_program_source(&block(snippet)), "{}", snippet);
        }
    }

    #[test]
    fn foreign_ratio_limit_is_inclusive() {
        // 2 of 40 non-whitespace characters is exactly 0.05.
        let at_limit = format!("{}\u{4e2d}\u{6587}", "a".repeat(38));
        assert_eq!(foreign_script_ratio(&at_limit), 0.05);
        assert!(rules().accepts(&at_limit));

        // 2 of 39 is just over.
        let over = format!("{}\u{4e2d}\u{6587}", "a".repeat(37));
        assert!(foreign_script_ratio(&over) > 0.05);
        assert!(!rules().accepts(&over));
    }

    #[test]
    fn min_prompt_length_is_inclusive_and_counts_chars() {
        let exact = "A red kite over a green field.";
        assert_eq!(exact.chars().count(), 30);
        assert!(rules().accepts(exact));
        assert!(!rules().accepts(&exact[..29]));

        // Multi-byte characters count once each.
        assert!(rules().accepts(&"\u{e9}".repeat(30)));
        assert!(!rules().accepts(&"\u{e9}".repeat(29)));

        let text = format!("## Case 1: Kite\n\nPrompt:\n\n```\n{}\n```\n", exact);
        let records = Strategy::StructuredSection.extract(&doc(&text), &rules());
        assert_eq!(records.len(), 1);
        let short = format!("## Case 1: Kite\n\nPrompt:\n\n```\n{}\n```\n", &exact[..29]);
        assert!(Strategy::StructuredSection
            .extract(&doc(&short), &rules())
            .is_empty());
    }
}
