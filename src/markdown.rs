//! Minimal markdown scanning used by the extraction strategies.
//!
//! This is not a markdown parser. It recognizes the handful of constructs
//! prompt collections are built from: ATX headings, fenced blocks, inline
//! images (markdown and `<img>` tags), and inline links. All positions are
//! byte offsets into the scanned text.

use std::sync::OnceLock;

use regex::Regex;

/// An ATX heading (`## Title`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: usize,
    pub text: String,
    /// Offset of the first byte of the heading line.
    pub start: usize,
    /// Offset just past the heading line (including its newline).
    pub end: usize,
}

/// A closed fenced block (```` ``` ```` or `~~~`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    /// Info string after the opening fence (`python`, `text`, ...), lowercased.
    pub info: String,
    pub body: String,
    /// Offset of the opening fence line.
    pub start: usize,
    /// Offset just past the closing fence line.
    pub end: usize,
}

/// Iterate lines with their starting byte offsets. Line text excludes the newline.
fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        (start, raw.trim_end_matches(['\n', '\r']))
    })
}

fn line_end(start: usize, line: &str, text: &str) -> usize {
    let end = start + line.len();
    match text[end..].chars().next() {
        Some('\r') if text[end..].starts_with("\r\n") => end + 2,
        Some('\n') => end + 1,
        _ => end,
    }
}

/// Parse a single line as an ATX heading, returning `(level, text)`.
pub fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    Some((level, rest.trim().trim_end_matches('#').trim_end()))
}

/// All headings outside fenced blocks, in document order.
pub fn headings(text: &str) -> Vec<Heading> {
    let mut out = Vec::new();
    let mut fence: Option<(char, usize)> = None;

    for (start, line) in lines_with_offsets(text) {
        if let Some(open) = fence {
            if closes_fence(line, open) {
                fence = None;
            }
            continue;
        }
        if let Some(open) = opens_fence(line) {
            fence = Some((open.0, open.1));
            continue;
        }
        if let Some((level, heading_text)) = parse_heading(line) {
            out.push(Heading {
                level,
                text: heading_text.to_string(),
                start,
                end: line_end(start, line, text),
            });
        }
    }
    out
}

/// Returns `(fence char, fence length, info string)` for an opening fence line.
fn opens_fence(line: &str) -> Option<(char, usize, &str)> {
    let trimmed = line.trim_start();
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    let ch = trimmed.chars().next()?;
    if ch != '`' && ch != '~' {
        return None;
    }
    let len = trimmed.chars().take_while(|c| *c == ch).count();
    if len < 3 {
        return None;
    }
    let info = trimmed[len..].trim();
    if ch == '`' && info.contains('`') {
        return None;
    }
    Some((ch, len, info))
}

fn closes_fence(line: &str, (ch, len): (char, usize)) -> bool {
    let trimmed = line.trim();
    let run = trimmed.chars().take_while(|c| *c == ch).count();
    run >= len && trimmed.chars().all(|c| c == ch)
}

/// All closed fenced blocks, in document order. An unclosed fence yields nothing.
pub fn fenced_blocks(text: &str) -> Vec<FencedBlock> {
    let mut out = Vec::new();
    let mut open: Option<(char, usize, String, usize, Vec<&str>)> = None;

    for (start, line) in lines_with_offsets(text) {
        match open.take() {
            Some((ch, len, info, block_start, mut body)) => {
                if closes_fence(line, (ch, len)) {
                    out.push(FencedBlock {
                        info,
                        body: body.join("\n"),
                        start: block_start,
                        end: line_end(start, line, text),
                    });
                } else {
                    body.push(line);
                    open = Some((ch, len, info, block_start, body));
                }
            }
            None => {
                if let Some((ch, len, info)) = opens_fence(line) {
                    let info = info
                        .split_whitespace()
                        .next()
                        .unwrap_or("")
                        .to_lowercase();
                    open = Some((ch, len, info, start, Vec::new()));
                }
            }
        }
    }
    out
}

/// Remove fenced block bodies from `text`, keeping everything else.
pub fn strip_fenced(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for block in fenced_blocks(text) {
        out.push_str(&text[cursor..block.start]);
        cursor = block.end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn markdown_image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"!\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+["'][^"']*["'])?\s*\)"#)
            .expect("static image regex")
    })
}

fn html_image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("static img regex")
    })
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]\n]+)\]\(\s*([^)\s]+)[^)]*\)").expect("static link regex"))
}

/// Every embedded image URL in `text`, in order of appearance.
pub fn image_urls(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = markdown_image_re()
        .captures_iter(text)
        .chain(html_image_re().captures_iter(text))
        .filter_map(|caps| {
            let url = caps.get(1)?;
            Some((url.start(), url.as_str().to_string()))
        })
        .collect();
    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, url)| url).collect()
}

/// Inline links (`[label](url)`) in order, excluding images.
pub fn links(text: &str) -> Vec<(String, String)> {
    link_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if text[..whole.start()].ends_with('!') {
                return None;
            }
            Some((caps[1].trim().to_string(), caps[2].to_string()))
        })
        .collect()
}
