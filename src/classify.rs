//! Keyword classification of draft case records.
//!
//! The [`Classifier`] is a pure function of its tables and the prompt text:
//! no I/O, no randomness. Tables are injected at construction (built-in
//! defaults, or overrides from `[classifier]` in the config), so tests can
//! run against their own table versions.
//!
//! - **category**: the first rule in priority order with any keyword found
//!   as a substring of the lower-cased prompt; otherwise the fallback.
//! - **tags**: every tag keyword found, in table order, de-duplicated and capped.
//! - **reference_required**: the prompt depends on a user-supplied image
//!   (a reference phrase, an `image N` placeholder, or a bracketed
//!   placeholder token), or the source attached a reference note.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::config::ClassifierConfig;
use crate::models::CaseRecord;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub keywords: Vec<String>,
}

/// The outcome of classifying one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: String,
    pub tags: Vec<String>,
    pub reference_required: bool,
}

pub struct Classifier {
    categories: Vec<CategoryRule>,
    tags: Vec<String>,
    reference_phrases: Vec<String>,
    fallback_category: String,
    max_tags: usize,
}

impl Classifier {
    /// Build a classifier, lower-casing every keyword once up front.
    pub fn new(
        categories: Vec<CategoryRule>,
        tags: Vec<String>,
        reference_phrases: Vec<String>,
        fallback_category: String,
        max_tags: usize,
    ) -> Self {
        let categories = categories
            .into_iter()
            .map(|rule| CategoryRule {
                name: rule.name,
                keywords: rule.keywords.iter().map(|k| k.to_lowercase()).collect(),
            })
            .collect();
        Self {
            categories,
            tags,
            reference_phrases: reference_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            fallback_category,
            max_tags,
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(
            config
                .categories
                .clone()
                .unwrap_or_else(default_categories),
            config.tags.clone().unwrap_or_else(default_tags),
            config
                .reference_phrases
                .clone()
                .unwrap_or_else(default_reference_phrases),
            config.fallback_category.clone(),
            config.max_tags,
        )
    }

    /// Category names in priority order, followed by the fallback.
    pub fn category_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|rule| rule.name.clone())
            .chain(std::iter::once(self.fallback_category.clone()))
            .collect()
    }

    pub fn classify(&self, prompt_text: &str) -> Classification {
        let lower = prompt_text.to_lowercase();
        Classification {
            category: self.category_for(&lower),
            tags: self.tags_for(&lower),
            reference_required: self.needs_reference(prompt_text, &lower),
        }
    }

    /// Fill in `category`, `tags`, and `reference_required` on a draft.
    pub fn apply(&self, record: &mut CaseRecord) {
        let Classification {
            category,
            tags,
            reference_required,
        } = self.classify(&record.prompt_text);
        record.category = category;
        record.tags = tags;
        record.reference_required = reference_required || record.reference_note.is_some();
    }

    fn category_for(&self, lower: &str) -> String {
        self.categories
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| lower.contains(k.as_str())))
            .map(|rule| rule.name.clone())
            .unwrap_or_else(|| self.fallback_category.clone())
    }

    fn tags_for(&self, lower: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.tags
            .iter()
            .filter(|tag| lower.contains(tag.to_lowercase().as_str()))
            .filter(|tag| seen.insert(tag.to_lowercase()))
            .take(self.max_tags)
            .cloned()
            .collect()
    }

    fn needs_reference(&self, original: &str, lower: &str) -> bool {
        self.reference_phrases
            .iter()
            .any(|p| lower.contains(p.as_str()))
            || numbered_image_re().is_match(lower)
            || has_bracket_placeholder(original)
    }
}

fn numbered_image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:image|img|photo|picture)\s*#?\d+\b|图\s*\d+|图片\s*\d+")
            .expect("static numbered image regex")
    })
}

fn bracket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[[^\[\]\n]{1,40}\]|\{[A-Za-z][A-Za-z0-9 _\-]{0,39}\}|<[A-Z][A-Za-z0-9 _\-]{0,39}>")
            .expect("static placeholder regex")
    })
}

/// A bracketed placeholder such as `[your name]`, `{subject}` or `<PRODUCT>`.
/// Markdown links (`[label](url)`) are not placeholders.
fn has_bracket_placeholder(text: &str) -> bool {
    bracket_re()
        .find_iter(text)
        .any(|m| !(m.as_str().starts_with('[') && text[m.end()..].starts_with('(')))
}

pub fn default_categories() -> Vec<CategoryRule> {
    let rule = |name: &str, keywords: &[&str]| CategoryRule {
        name: name.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    };
    vec![
        rule(
            "Infographic & Diagram",
            &["infographic", "diagram", "blueprint", "schematic", "flowchart", "信息图"],
        ),
        rule(
            "Product & Mockup",
            &["product", "产品", "mockup", "packaging", "键帽", "keycap", "jewelry"],
        ),
        rule(
            "Icon & Logo",
            &["icon", "logo", "图标", "标志", "badge", "徽章"],
        ),
        rule(
            "Text & Typography",
            &["typography", "lettering", "font", "字体", "文字"],
        ),
        rule(
            "Portrait & Character",
            &["portrait", "肖像", "人物", "character", "角色", "selfie"],
        ),
        rule(
            "Miniature & Toy",
            &["miniature", "迷你", "toy", "玩具", "figurine", "figure", "手办"],
        ),
        rule(
            "Style Transfer",
            &["style", "风格", "transform", "转换", "变换"],
        ),
        rule(
            "Scene & Environment",
            &["scene", "场景", "landscape", "景观", "environment", "interior"],
        ),
        rule("Food & Object", &["food", "食物", "object", "物体", "dish"]),
        rule("Creative Art", &["art", "艺术", "creative", "创意"]),
    ]
}

pub fn default_tags() -> Vec<String> {
    [
        "3D", "chibi", "cute", "glass", "transparent", "pixel", "8-bit", "lego", "anime", "manga",
        "figure", "poster", "logo", "emoji", "retro", "vintage", "minimal", "surreal", "steampunk",
        "cyberpunk", "photorealistic", "realistic", "crystal ball", "knit", "enamel", "ghibli",
        "pixar", "watercolor", "isometric", "neon",
    ]
    .iter()
    .map(|t| t.to_string())
    .collect()
}

pub fn default_reference_phrases() -> Vec<String> {
    [
        "uploaded",
        "upload",
        "your photo",
        "your image",
        "my photo",
        "this photo",
        "the photo",
        "attached image",
        "reference image",
        "provided image",
        "input image",
        "original image",
        "上传",
        "参考图",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}
