use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::docx::document::{paragraph_outline_level, paragraph_style_id, ParaContent, StyleTable};
use crate::docx::xml::Element;

/// Semantic role of a paragraph. Classification is total: every paragraph
/// gets exactly one role, `Normal` being the universal fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Heading1,
    Heading2,
    Heading3,
    Heading4,
    Normal,
    TableCaption,
    ImageCaption,
    Image,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Heading1,
        Role::Heading2,
        Role::Heading3,
        Role::Heading4,
        Role::Normal,
        Role::TableCaption,
        Role::ImageCaption,
        Role::Image,
    ];

    /// Outline level written for heading roles (`w:outlineLvl` is 0-based).
    pub fn heading_outline(self) -> Option<u8> {
        match self {
            Role::Heading1 => Some(0),
            Role::Heading2 => Some(1),
            Role::Heading3 => Some(2),
            Role::Heading4 => Some(3),
            _ => None,
        }
    }

    pub fn is_caption(self) -> bool {
        matches!(self, Role::TableCaption | Role::ImageCaption)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Heading1 => "Heading1",
            Role::Heading2 => "Heading2",
            Role::Heading3 => "Heading3",
            Role::Heading4 => "Heading4",
            Role::Normal => "Normal",
            Role::TableCaption => "TableCaption",
            Role::ImageCaption => "ImageCaption",
            Role::Image => "Image",
        };
        f.write_str(s)
    }
}

// Caption: marker character followed by whitespace or a digit, an optional
// dotted/hyphenated numeral group, then mandatory whitespace and trailing
// content. The guard patterns keep `表-1`/`表.5` shapes (separator right
// after the marker) from matching; numerals embedded mid-sentence never
// match because of the anchors.
static TABLE_CAPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*表\s*\d*(\.\d+)*(-\s*\d+)*\s+.+$").expect("table caption re"));
static TABLE_CAPTION_GUARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*表[\s\d]").expect("table caption guard re"));
static IMAGE_CAPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*图\s*\d*(\.\d+)*(-\s*\d+)*\s+.+$").expect("image caption re"));
static IMAGE_CAPTION_GUARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*图[\s\d]").expect("image caption guard re"));

// Numeral-prefixed heading text, one pattern per depth. These recover
// headings in documents carrying no outline level or heading style at all.
static HEADING1_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}\s+[一-龥\w]+$").expect("h1 re"));
static HEADING2_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}\.\d{1,2}\s*[一-龥\w]+$").expect("h2 re"));
static HEADING3_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}\.\d{1,2}\.\d{1,2}\s*[一-龥\w]+$").expect("h3 re"));
static HEADING4_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,2}\.\d{1,2}\.\d{1,2}\.\d{1,2}\s*[一-龥\w]+$").expect("h4 re")
});

/// Direct or style-inherited `w:outlineLvl` mapping. Levels past 3 fall back
/// to `Normal`; deeper headings are deliberately left unclassified.
pub fn role_for_outline(level: i32) -> Role {
    match level {
        0 => Role::Heading1,
        1 => Role::Heading2,
        2 => Role::Heading3,
        3 => Role::Heading4,
        _ => Role::Normal,
    }
}

fn role_from_style_name(name: &str) -> Option<Role> {
    if !name.to_lowercase().contains("heading") {
        return None;
    }
    let role = match name.chars().find(|c| ('1'..='4').contains(c)) {
        Some('1') | None => Role::Heading1,
        Some('2') => Role::Heading2,
        Some('3') => Role::Heading3,
        Some('4') => Role::Heading4,
        Some(_) => Role::Heading1,
    };
    Some(role)
}

/// Table-caption shape test; the table pass applies it to cell paragraphs.
pub fn is_table_caption_text(text: &str) -> bool {
    TABLE_CAPTION_GUARD_RE.is_match(text) && TABLE_CAPTION_RE.is_match(text)
}

fn is_image_caption_text(text: &str) -> bool {
    IMAGE_CAPTION_GUARD_RE.is_match(text) && IMAGE_CAPTION_RE.is_match(text)
}

fn role_from_text_pattern(text: &str) -> Option<Role> {
    if is_table_caption_text(text) {
        return Some(Role::TableCaption);
    }
    if is_image_caption_text(text) {
        return Some(Role::ImageCaption);
    }
    if HEADING1_RE.is_match(text) {
        return Some(Role::Heading1);
    }
    if HEADING2_RE.is_match(text) {
        return Some(Role::Heading2);
    }
    if HEADING3_RE.is_match(text) {
        return Some(Role::Heading3);
    }
    if HEADING4_RE.is_match(text) {
        return Some(Role::Heading4);
    }
    None
}

/// Ordered cascade, first matching rule wins. Structural signal (outline
/// level, style) is authoritative; text patterns are fallbacks evaluated on
/// the numbering-resolved text so auto-numbered captions still match.
pub fn classify(
    p: &Element,
    content: &ParaContent,
    resolved_text: &str,
    styles: &StyleTable,
) -> Role {
    if content.has_drawing || (content.text.trim().is_empty() && content.run_count > 0) {
        return Role::Image;
    }

    if let Some(level) = paragraph_outline_level(p) {
        return role_for_outline(level);
    }

    if let Some(style) = paragraph_style_id(p).and_then(|id| styles.get(id)) {
        if let Some(level) = style.outline_lvl {
            return role_for_outline(level);
        }
        if let Some(role) = role_from_style_name(&style.name) {
            return role;
        }
    }

    role_from_text_pattern(resolved_text.trim_end()).unwrap_or(Role::Normal)
}
