//! Content classification for clipboard items
//!
//! Maps raw text to a category, a content type, a display title and a
//! password-likelihood verdict. Pure functions, no external state.
//!
//! Category precedence (first match wins):
//! url > email > phone > file > path > json > number > text.
//! Content longer than `CASCADE_MAX_CHARS` skips the cascade and is text.

use crate::models::{Category, ContentType};
use once_cell::sync::Lazy;
use regex::Regex;

/// Character budget for generated titles
pub const TITLE_MAX_CHARS: usize = 50;
/// Marker appended to truncated titles
pub const TITLE_ELLIPSIS: &str = "...";
/// Longer content is classified as text without running the cascade
pub const CASCADE_MAX_CHARS: usize = 50;

/// Extensions recognised by the file heuristic
pub const FILE_EXTENSIONS: &[&str] = &[
    "txt", "doc", "docx", "pdf", "xls", "xlsx", "ppt", "pptx",
    "jpg", "jpeg", "png", "gif", "bmp", "svg", "webp",
    "mp4", "mp3", "avi", "mov", "wav", "flac",
    "zip", "rar", "7z", "tar", "gz",
    "html", "css", "js", "json", "xml", "yaml", "yml",
    "go", "py", "java", "cpp", "c", "h", "rs", "swift",
    "exe", "app", "dmg", "deb", "rpm",
];

/// Characters counted as "special" by the password heuristic
const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;':\",./<>?";

/// Phone numbers may only contain digits, separators and a leading plus
static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?[\d\s\-().]+$").expect("phone pattern is valid")
});

const PHONE_MIN_DIGITS: usize = 10;

/// Result of running the classifier over a piece of content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub content_type: ContentType,
    pub title: String,
    pub is_password: bool,
}

/// Classify content in one pass
pub fn classify(content: &str) -> Classification {
    let category = detect_category(content);
    Classification {
        category,
        content_type: category.content_type(),
        title: generate_title(content),
        is_password: is_likely_password(content),
    }
}

/// Single-line display title.
///
/// Newline and carriage-return runs collapse to one space and the result is
/// trimmed before truncation, so a truncated title is always exactly
/// `TITLE_MAX_CHARS` characters plus the ellipsis.
pub fn generate_title(content: &str) -> String {
    let mut normalized = String::with_capacity(content.len().min(256));
    let mut in_break = false;
    for c in content.chars() {
        if c == '\n' || c == '\r' {
            if !in_break {
                normalized.push(' ');
                in_break = true;
            }
        } else {
            normalized.push(c);
            in_break = false;
        }
    }

    let trimmed = normalized.trim();
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        return trimmed.to_string();
    }

    let mut title: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
    title.push_str(TITLE_ELLIPSIS);
    title
}

/// Run the category cascade
pub fn detect_category(content: &str) -> Category {
    if content.chars().count() > CASCADE_MAX_CHARS {
        return Category::Text;
    }

    if is_url(content) {
        Category::Url
    } else if is_email(content) {
        Category::Email
    } else if is_phone(content) {
        Category::Phone
    } else if is_file(content) {
        Category::File
    } else if is_path(content) {
        Category::Path
    } else if is_json(content) {
        Category::Json
    } else if is_number(content) {
        Category::Number
    } else {
        Category::Text
    }
}

/// Length in [8, 50] and at least three of: uppercase, lowercase, digit, special
pub fn is_likely_password(content: &str) -> bool {
    let len = content.chars().count();
    if !(8..=50).contains(&len) {
        return false;
    }

    let has_upper = content.chars().any(|c| c.is_uppercase());
    let has_lower = content.chars().any(|c| c.is_lowercase());
    let has_digit = content.chars().any(|c| c.is_ascii_digit());
    let has_special = content.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c));

    [has_upper, has_lower, has_digit, has_special]
        .iter()
        .filter(|present| **present)
        .count()
        >= 3
}

fn is_url(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.contains("www.")
}

fn is_email(text: &str) -> bool {
    text.contains('@') && text.contains('.') && !text.chars().any(char::is_whitespace)
}

fn is_phone(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < PHONE_MIN_DIGITS || !PHONE_REGEX.is_match(trimmed) {
        return false;
    }
    trimmed.chars().filter(|c| c.is_ascii_digit()).count() >= PHONE_MIN_DIGITS
}

fn is_file(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    match text.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_lowercase();
            FILE_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

fn is_path(text: &str) -> bool {
    text.contains('/') && (text.starts_with('/') || text.starts_with('~') || text.starts_with('.'))
}

fn is_json(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('{') && trimmed.ends_with('}')
}

fn is_number(text: &str) -> bool {
    let trimmed = text.trim();
    // Empty input must not pass the vacuous "all characters match" check
    !trimmed.is_empty()
        && trimmed
            .chars()
            .filter(|c| !c.is_whitespace())
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | ','))
}
