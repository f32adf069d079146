//! Core data models for the clipboard history and tag taxonomy

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::content_detection;
use crate::settings::Settings;

/// Group that receives tags created from generator output
pub const AI_GENERATED_GROUP_ID: &str = "ai-generated";
/// Group that receives user-entered tags when no source is given
pub const USER_CUSTOM_GROUP_ID: &str = "user-custom";
pub const DEFAULT_TAG_COLOR: &str = "#1890ff";

// ─────────────────────────────────────────────────────────────────────────────
// CLASSIFICATION ENUMS
// ─────────────────────────────────────────────────────────────────────────────

/// Classification label assigned by the heuristic cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Text,
    Url,
    Email,
    Phone,
    File,
    Path,
    Json,
    Number,
}

impl Category {
    /// Display order for category pickers
    pub const ALL: [Category; 8] = [
        Category::Text,
        Category::Url,
        Category::Email,
        Category::Phone,
        Category::File,
        Category::Path,
        Category::Json,
        Category::Number,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Text => "text",
            Category::Url => "url",
            Category::Email => "email",
            Category::Phone => "phone",
            Category::File => "file",
            Category::Path => "path",
            Category::Json => "json",
            Category::Number => "number",
        }
    }

    /// Content type implied by a detected category
    pub fn content_type(&self) -> ContentType {
        match self {
            Category::Text => ContentType::Text,
            Category::Url => ContentType::Url,
            Category::Email => ContentType::Email,
            Category::Phone => ContentType::Phone,
            Category::File => ContentType::File,
            Category::Path => ContentType::Path,
            Category::Json => ContentType::Json,
            Category::Number => ContentType::Number,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// Structural type of the stored content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Text,
    Url,
    Email,
    Phone,
    File,
    Path,
    Code,
    Json,
    Number,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Url => "url",
            ContentType::Email => "email",
            ContentType::Phone => "phone",
            ContentType::File => "file",
            ContentType::Path => "path",
            ContentType::Code => "code",
            ContentType::Json => "json",
            ContentType::Number => "number",
        }
    }

    /// Parse from database string. Unknown values fall back to Text.
    pub fn from_database_str(s: &str) -> Self {
        match s {
            "url" => ContentType::Url,
            "email" => ContentType::Email,
            "phone" => ContentType::Phone,
            "file" => ContentType::File,
            "path" => ContentType::Path,
            "code" => ContentType::Code,
            "json" => ContentType::Json,
            "number" => ContentType::Number,
            _ => ContentType::Text,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RECORDS
// ─────────────────────────────────────────────────────────────────────────────

/// A captured piece of clipboard content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardItem {
    pub id: String,
    pub content: String,
    pub content_type: ContentType,
    pub title: String,
    /// Free-form so users can override the detected label
    pub category: String,
    pub is_favorite: bool,
    pub use_count: i64,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    /// Resolved through `item_tags`, ordered by name
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl ClipboardItem {
    /// Build a new active item from raw clipboard text.
    ///
    /// With `auto_categorize` off, the configured default category is used verbatim
    /// and the content type stays `Text`.
    pub fn from_capture(content: String, settings: &Settings) -> Self {
        let (category, content_type) = if settings.auto_categorize {
            let category = content_detection::detect_category(&content);
            (category.as_str().to_string(), category.content_type())
        } else {
            (settings.default_category.clone(), ContentType::Text)
        };
        let title = content_detection::generate_title(&content);
        let now = now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            content_type,
            title,
            category,
            is_favorite: false,
            use_count: 0,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
            last_used_at: now,
            tags: Vec::new(),
        }
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.name.clone()).collect()
    }
}

/// Current time at the precision timestamps are stored with
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Stable digest used to narrow duplicate lookups before the exact comparison
pub(crate) fn hash_content(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// A named label, unique by exact name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub description: String,
    pub color: String,
    pub group_id: Option<String>,
    pub use_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// None until the tag is first attached through an update-tags operation
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Tag {
    pub fn new(name: impl Into<String>, group_id: Option<String>) -> Self {
        let now = now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            color: DEFAULT_TAG_COLOR.to_string(),
            group_id,
            use_count: 0,
            created_at: now,
            updated_at: now,
            last_used_at: None,
        }
    }
}

/// Organizational bucket for tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    pub color: String,
    pub sort_order: i64,
    /// Seeded groups (`ai-generated`, `user-custom`)
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TagGroup {
    pub fn new(name: impl Into<String>, sort_order: i64) -> Self {
        let now = now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            color: DEFAULT_TAG_COLOR.to_string(),
            sort_order,
            is_system: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Tag with the number of active items it is attached to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagWithStats {
    #[serde(flatten)]
    pub tag: Tag,
    pub item_count: i64,
}
