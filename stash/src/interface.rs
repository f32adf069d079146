//! Stash public interface definition
//!
//! Shared query/result records, the error taxonomy, and the store and
//! collaborator traits. Stores are traits so tests can substitute fakes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

use crate::database::DatabaseError;
use crate::models::{ClipboardItem, Tag, TagGroup, TagWithStats};

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// How a multi-tag search filter combines its tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMode {
    /// Item carries every named tag
    All,
    /// Item carries at least one named tag
    #[default]
    Any,
    /// Item carries none of the named tags
    None,
}

impl FromStr for TagMode {
    type Err = StashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(TagMode::All),
            "any" => Ok(TagMode::Any),
            "none" => Ok(TagMode::None),
            other => Err(StashError::Validation(format!("unknown tag mode: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagSortField {
    Name,
    UseCount,
    CreatedAt,
    LastUsedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// Item search request. Filters compose conjunctively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    /// Substring matched against content or title
    pub query: String,
    /// Exact category match
    pub category: Option<String>,
    /// Tag names for the tag filter
    pub tags: Vec<String>,
    /// Defaults to `Any` when tags are given
    pub tag_mode: Option<TagMode>,
    /// Zero selects the default page size
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub items: Vec<ClipboardItem>,
    /// Filtered count, independent of the page slice
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

/// Tag search request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagSearchQuery {
    /// Substring matched against name or description
    pub query: String,
    pub group_id: Option<String>,
    pub sort_by: Option<TagSortField>,
    pub sort_order: Option<SortOrder>,
    /// Only tags that have been attached at least once
    pub used_only: bool,
    /// Zero means no limit
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_items: u64,
    pub today_items: u64,
    pub week_items: u64,
    pub month_items: u64,
    pub category_stats: BTreeMap<String, u64>,
    pub top_tags: Vec<TagWithStats>,
    pub recent_tags: Vec<TagWithStats>,
    pub recent_items: Vec<ClipboardItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagStatistics {
    pub total_tags: u64,
    pub most_used_tags: Vec<TagWithStats>,
    pub recent_tags: Vec<TagWithStats>,
    pub tag_groups: Vec<TagGroup>,
    pub unused_tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTagsResponse {
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

/// Error type for Stash operations
#[derive(Debug, Error)]
pub enum StashError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("Database error: {0}")]
    Persistence(#[from] DatabaseError),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("External collaborator failed: {0}")]
    External(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl StashError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        StashError::NotFound { entity, key: key.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StashError::NotFound { .. })
    }
}

impl From<rusqlite::Error> for StashError {
    fn from(e: rusqlite::Error) -> Self {
        StashError::Persistence(DatabaseError::from(e))
    }
}

impl From<r2d2::Error> for StashError {
    fn from(e: r2d2::Error) -> Self {
        StashError::Persistence(DatabaseError::from(e))
    }
}

pub type StashResult<T> = Result<T, StashError>;

// ═══════════════════════════════════════════════════════════════════════════════
// STORE INTERFACES
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle of captured items: active set, trash, and duplicate detection
pub trait ItemStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Insert a new item
    fn create(&self, item: &ClipboardItem) -> StashResult<()>;

    /// Rewrite content, title, category, favorite and deletion state; stamps `updated_at`
    fn update(&self, item: &ClipboardItem) -> StashResult<()>;

    /// Move an item to the trash. Trashing a trashed item keeps its original `deleted_at`.
    fn soft_delete(&self, id: &str) -> StashResult<()>;

    /// Bring an item back from the trash. No-op for active items.
    fn restore(&self, id: &str) -> StashResult<()>;

    /// Hard-remove one item and its tag associations
    fn permanent_delete(&self, id: &str) -> StashResult<()>;

    /// Hard-remove several items atomically. Returns the number removed.
    fn batch_permanent_delete(&self, ids: &[String]) -> StashResult<usize>;

    /// Hard-remove every trashed item. Returns the number removed.
    fn empty_trash(&self) -> StashResult<usize>;

    /// Increment `use_count` and stamp `last_used_at`
    fn use_item(&self, id: &str) -> StashResult<()>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Fetch one item with its tags
    fn get_by_id(&self, id: &str) -> StashResult<ClipboardItem>;

    /// Active items, newest first
    fn list(&self, limit: usize, offset: usize) -> StashResult<Vec<ClipboardItem>>;

    /// Trashed items, most recently deleted first
    fn get_trash(&self, limit: usize, offset: usize) -> StashResult<Vec<ClipboardItem>>;

    /// Exact content match among active items
    fn is_duplicate_content(&self, content: &str) -> StashResult<bool>;

    /// Filtered, paginated item search
    fn search(&self, query: &SearchQuery) -> StashResult<SearchResult>;

    /// Active items, optionally only those created at or after `since`
    fn count_active(&self, since: Option<DateTime<Utc>>) -> StashResult<u64>;

    /// Category to active item count
    fn category_histogram(&self) -> StashResult<BTreeMap<String, u64>>;

    /// Predefined categories plus any category used by an active item, sorted by name
    fn all_categories(&self) -> StashResult<Vec<String>>;

    /// Names of tags attached to at least one active item
    fn all_tag_names(&self) -> StashResult<Vec<String>>;
}

/// Tags, tag groups and item↔tag associations
pub trait TagStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────────
    // Tag Groups
    // ─────────────────────────────────────────────────────────────────────────────

    fn create_tag_group(&self, group: &TagGroup) -> StashResult<()>;
    fn get_tag_group(&self, id: &str) -> StashResult<TagGroup>;
    /// Ordered by sort order, then name
    fn list_tag_groups(&self) -> StashResult<Vec<TagGroup>>;
    fn update_tag_group(&self, group: &TagGroup) -> StashResult<()>;
    /// Ungroups member tags, then removes the group
    fn delete_tag_group(&self, id: &str) -> StashResult<()>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Tags
    // ─────────────────────────────────────────────────────────────────────────────

    /// Insert a new tag. An existing name is a `Conflict`.
    fn create_tag(&self, tag: &Tag) -> StashResult<()>;
    fn get_tag_by_id(&self, id: &str) -> StashResult<Tag>;
    fn get_tag_by_name(&self, name: &str) -> StashResult<Tag>;
    fn list_tags(&self) -> StashResult<Vec<Tag>>;
    /// `None` lists ungrouped tags
    fn list_tags_by_group(&self, group_id: Option<&str>) -> StashResult<Vec<Tag>>;
    fn update_tag(&self, tag: &Tag) -> StashResult<()>;
    fn delete_tag(&self, id: &str) -> StashResult<()>;

    /// Existing tag by exact name, or a new one in the `source` group.
    /// Safe against concurrent creation of the same name.
    fn get_or_create_tag(&self, name: &str, source: Option<&str>) -> StashResult<Tag>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Associations
    // ─────────────────────────────────────────────────────────────────────────────

    fn add_tag_to_item(&self, item_id: &str, tag_id: &str) -> StashResult<()>;
    fn remove_tag_from_item(&self, item_id: &str, tag_id: &str) -> StashResult<()>;
    /// Ordered by name
    fn tags_for_item(&self, item_id: &str) -> StashResult<Vec<Tag>>;
    /// Active items carrying the tag, newest first
    fn items_for_tag(&self, tag_id: &str) -> StashResult<Vec<ClipboardItem>>;
    /// Replace the item's whole tag set in one transaction
    fn batch_update_item_tags(&self, item_id: &str, tag_ids: &[String]) -> StashResult<()>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Usage and Search
    // ─────────────────────────────────────────────────────────────────────────────

    fn increment_tag_usage(&self, tag_id: &str) -> StashResult<()>;
    fn search_tags(&self, query: &TagSearchQuery) -> StashResult<Vec<TagWithStats>>;
    fn most_used_tags(&self, limit: usize) -> StashResult<Vec<TagWithStats>>;
    fn recent_tags(&self, limit: usize) -> StashResult<Vec<TagWithStats>>;
    /// Tags with no item associations
    fn unused_tags(&self) -> StashResult<Vec<Tag>>;
    fn count_tags(&self) -> StashResult<u64>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────────

    /// Delete every tag with no item associations. Returns the number removed.
    fn cleanup_unused_tags(&self) -> StashResult<usize>;

    /// Move every association from `source_id` to `target_id`, then delete the source
    fn merge_tags(&self, source_id: &str, target_id: &str) -> StashResult<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLABORATOR INTERFACES
// ═══════════════════════════════════════════════════════════════════════════════

/// Text-in, strings-out tag and title generation (e.g. a language model client).
///
/// Output is plain strings; validation and persistence happen in the tag store.
#[async_trait::async_trait]
pub trait TagGenerator: Send + Sync {
    async fn generate_tags(&self, content: &str) -> StashResult<Vec<String>>;

    async fn generate_title(&self, message: &str) -> StashResult<String>;
}
