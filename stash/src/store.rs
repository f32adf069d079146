//! ClipboardStore - service facade over the item and tag stores
//!
//! Owns the database-backed stores, shared settings, the capture loop and the
//! optional collaborators (clipboard writer, tag generator). Composite
//! operations that touch several stores live here; single-store calls go
//! through `items()` / `tags()`.
//!
//! Async Architecture:
//! Store calls are blocking. `search` hops to a blocking thread on the current
//! runtime, or on a process-wide fallback runtime when called from outside one.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use crate::capture::{CaptureLoop, CaptureOutcome, CapturePipeline};
use crate::clipboard::{ClipboardReader, ClipboardWriter, MemoryClipboard};
use crate::content_detection;
use crate::database::Database;
use crate::interface::{
    CategoryTagsResponse, ItemStore, SearchQuery, SearchResult, StashError, StashResult,
    Statistics, TagGenerator, TagStatistics, TagStore,
};
use crate::items::SqliteItemStore;
use crate::models::{ClipboardItem, Tag, TagGroup, AI_GENERATED_GROUP_ID, USER_CUSTOM_GROUP_ID};
use crate::settings::Settings;
use crate::stats::{StatisticsAggregator, DEFAULT_RECENT_ITEMS, DEFAULT_TOP_TAGS};
use crate::tags::{validate_tag_name, SqliteTagStore};

/// Fallback Tokio runtime for callers without one. Shared by all stores, never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("stash-runtime")
        .build()
        .expect("Failed to create fallback tokio runtime")
});

/// Minimum shared run of characters for two tag names to count as similar
const SIMILAR_TAG_MIN_OVERLAP: usize = 2;

pub struct ClipboardStore {
    items: Arc<dyn ItemStore>,
    tags: Arc<dyn TagStore>,
    settings: Arc<RwLock<Settings>>,
    pipeline: Arc<CapturePipeline>,
    capture: CaptureLoop,
    writer: Arc<dyn ClipboardWriter>,
    generator: Option<Arc<dyn TagGenerator>>,
}

impl ClipboardStore {
    /// Open (or create) the database at `db_path`.
    ///
    /// Starts with a process-local clipboard; attach a real one with `with_clipboard`.
    pub fn new<P: AsRef<Path>>(db_path: P, settings: Settings) -> StashResult<Self> {
        let db = Database::open(db_path)?;
        Ok(Self::from_database(db, settings))
    }

    /// Create a store with an in-memory database (for testing)
    #[cfg(test)]
    pub(crate) fn new_in_memory() -> StashResult<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::from_database(db, Settings::default()))
    }

    fn from_database(db: Database, settings: Settings) -> Self {
        let db = Arc::new(db);
        let items: Arc<dyn ItemStore> = Arc::new(SqliteItemStore::new(Arc::clone(&db)));
        let tags: Arc<dyn TagStore> = Arc::new(SqliteTagStore::new(db));
        let interval = settings.capture_interval();
        let settings = Arc::new(RwLock::new(settings));
        let pipeline = Arc::new(CapturePipeline::new(Arc::clone(&items), Arc::clone(&settings)));

        let clipboard = Arc::new(MemoryClipboard::new());
        let capture = CaptureLoop::new(clipboard.clone(), interval);
        capture.set_pipeline(Arc::clone(&pipeline));

        Self {
            items,
            tags,
            settings,
            pipeline,
            capture,
            writer: clipboard,
            generator: None,
        }
    }

    /// Read captures from and write used items to `clipboard`.
    ///
    /// Replaces the capture loop, so call before `start_monitoring`.
    pub fn with_clipboard<C>(mut self, clipboard: Arc<C>) -> Self
    where
        C: ClipboardReader + ClipboardWriter + 'static,
    {
        let capture = CaptureLoop::new(clipboard.clone(), self.settings.read().capture_interval());
        capture.set_pipeline(Arc::clone(&self.pipeline));
        self.capture = capture;
        self.writer = clipboard;
        self
    }

    pub fn with_tag_generator(mut self, generator: Arc<dyn TagGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn items(&self) -> &dyn ItemStore {
        self.items.as_ref()
    }

    pub fn tags(&self) -> &dyn TagStore {
        self.tags.as_ref()
    }

    /// Get a tokio runtime handle - uses current runtime if available, otherwise global fallback
    fn runtime_handle(&self) -> tokio::runtime::Handle {
        tokio::runtime::Handle::try_current()
            .unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Items
    // ─────────────────────────────────────────────────────────────────────────────

    /// Manually add an item. Unlike capture, duplicates and password-like text are kept.
    pub fn create_item(&self, content: &str) -> StashResult<ClipboardItem> {
        if content.trim().is_empty() {
            return Err(StashError::Validation("content cannot be empty".into()));
        }
        let item = ClipboardItem::from_capture(content.to_string(), &self.settings.read());
        self.items.create(&item)?;
        Ok(item)
    }

    pub fn update_item(&self, item: &ClipboardItem) -> StashResult<()> {
        if item.content.trim().is_empty() {
            return Err(StashError::Validation("content cannot be empty".into()));
        }
        self.items.update(item)
    }

    /// Submit content through the capture pipeline, as the polling loop would
    pub fn capture(&self, content: &str) -> StashResult<CaptureOutcome> {
        self.pipeline.accept(content)
    }

    /// Record a use, then copy the content back to the clipboard.
    ///
    /// The use is committed even if the clipboard write fails.
    pub fn use_item(&self, id: &str) -> StashResult<ClipboardItem> {
        self.items.use_item(id)?;
        let item = self.items.get_by_id(id)?;
        self.writer
            .write_text(&item.content)
            .map_err(|e| StashError::External(e.to_string()))?;
        debug!(item_id = %id, "Copied item to clipboard");
        Ok(item)
    }

    pub async fn search(&self, query: SearchQuery) -> StashResult<SearchResult> {
        let items = Arc::clone(&self.items);
        self.runtime_handle()
            .spawn_blocking(move || items.search(&query))
            .await
            .map_err(|_| StashError::Cancelled)?
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Tags
    // ─────────────────────────────────────────────────────────────────────────────

    /// Replace an item's tag set by name. New tags go to `source` (default: the custom group).
    pub fn update_item_tags(
        &self,
        item_id: &str,
        names: &[String],
        source: Option<&str>,
    ) -> StashResult<Vec<Tag>> {
        let source = source.unwrap_or(USER_CUSTOM_GROUP_ID);
        // Fail before creating any tags
        self.items.get_by_id(item_id)?;
        let names = clean_tag_names(names)?;

        let mut tag_ids: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let tag = self.tags.get_or_create_tag(name, Some(source))?;
            self.tags.increment_tag_usage(&tag.id)?;
            tag_ids.push(tag.id);
        }

        self.tags.batch_update_item_tags(item_id, &tag_ids)?;
        self.tags.tags_for_item(item_id)
    }

    pub fn add_tags_to_item(&self, item_id: &str, names: &[String]) -> StashResult<Vec<Tag>> {
        self.items.get_by_id(item_id)?;
        for name in clean_tag_names(names)? {
            let tag = self.tags.get_or_create_tag(name, Some(USER_CUSTOM_GROUP_ID))?;
            self.tags.add_tag_to_item(item_id, &tag.id)?;
            self.tags.increment_tag_usage(&tag.id)?;
        }
        self.tags.tags_for_item(item_id)
    }

    /// Detach tags by name. Names that match no tag are ignored.
    pub fn remove_tags_from_item(&self, item_id: &str, names: &[String]) -> StashResult<Vec<Tag>> {
        self.items.get_by_id(item_id)?;
        for name in names {
            match self.tags.get_tag_by_name(name.trim()) {
                Ok(tag) => self.tags.remove_tag_from_item(item_id, &tag.id)?,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        self.tags.tags_for_item(item_id)
    }

    pub fn create_tag(
        &self,
        name: &str,
        description: &str,
        color: &str,
        group_id: Option<&str>,
    ) -> StashResult<Tag> {
        let mut tag = Tag::new(name.trim(), group_id.map(str::to_string));
        tag.description = description.to_string();
        if !color.is_empty() {
            tag.color = color.to_string();
        }
        self.tags.create_tag(&tag)?;
        info!(tag = %tag.name, "Created tag");
        Ok(tag)
    }

    pub fn create_tag_group(
        &self,
        name: &str,
        description: &str,
        color: &str,
        sort_order: i64,
    ) -> StashResult<TagGroup> {
        if name.trim().is_empty() {
            return Err(StashError::Validation("group name cannot be empty".into()));
        }
        let mut group = TagGroup::new(name.trim(), sort_order);
        group.description = description.to_string();
        if !color.is_empty() {
            group.color = color.to_string();
        }
        self.tags.create_tag_group(&group)?;
        Ok(group)
    }

    /// Fold `source` into `target`; returns the surviving tag
    pub fn merge_tags_by_name(&self, source: &str, target: &str) -> StashResult<Tag> {
        let source = self.tags.get_tag_by_name(source)?;
        let target = self.tags.get_tag_by_name(target)?;
        self.tags.merge_tags(&source.id, &target.id)?;
        info!(source = %source.name, target = %target.name, "Merged tags");
        self.tags.get_tag_by_id(&target.id)
    }

    /// Popular tags, with those mentioned in `content` first
    pub fn suggest_tags(&self, content: &str, limit: usize) -> StashResult<Vec<Tag>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let content = content.trim().to_lowercase();
        let candidates = self.tags.most_used_tags(limit * 2)?;

        let (matching, rest): (Vec<_>, Vec<_>) = candidates.into_iter().partition(|t| {
            let name = t.tag.name.to_lowercase();
            !content.is_empty() && (content.contains(&name) || name.contains(&content))
        });

        Ok(matching
            .into_iter()
            .chain(rest)
            .take(limit)
            .map(|t| t.tag)
            .collect())
    }

    /// Tags sharing at least two consecutive characters with `name`
    pub fn similar_tags(&self, name: &str, limit: usize) -> StashResult<Vec<Tag>> {
        let needle = name.trim().to_lowercase();
        Ok(self
            .tags
            .list_tags()?
            .into_iter()
            .filter(|t| t.name != name && shares_run(&needle, &t.name.to_lowercase()))
            .take(limit)
            .collect())
    }

    /// Ask the generator for tags and attach the ones the item lacks.
    ///
    /// Returns the newly attached tags. Generator absence or failure yields an
    /// empty list; names that fail validation are dropped.
    pub async fn generate_tags_for_item(&self, item_id: &str) -> StashResult<Vec<Tag>> {
        let item = self.items.get_by_id(item_id)?;
        let Some(generator) = self.generator.as_ref() else {
            debug!("No tag generator configured");
            return Ok(Vec::new());
        };

        let suggested = match generator.generate_tags(&item.content).await {
            Ok(names) => names,
            Err(e) => {
                warn!(item_id = %item_id, error = %e, "Tag generation failed");
                return Ok(Vec::new());
            }
        };

        let existing: HashSet<String> = item.tag_names().into_iter().collect();
        let mut fresh: Vec<String> = Vec::new();
        for name in suggested {
            let name = name.trim();
            if name.is_empty() || existing.contains(name) || fresh.iter().any(|n| n == name) {
                continue;
            }
            if let Err(e) = validate_tag_name(name) {
                warn!(tag = %name, error = %e, "Skipping generated tag");
                continue;
            }
            fresh.push(name.to_string());
        }
        if fresh.is_empty() {
            return Ok(Vec::new());
        }

        let mut all = item.tag_names();
        all.extend(fresh.iter().cloned());
        let attached = self.update_item_tags(item_id, &all, Some(AI_GENERATED_GROUP_ID))?;
        info!(item_id = %item_id, count = fresh.len(), "Attached generated tags");

        Ok(attached
            .into_iter()
            .filter(|t| fresh.contains(&t.name))
            .collect())
    }

    /// Generated title, or the heuristic one if the generator is absent or fails
    pub async fn suggest_title(&self, item_id: &str) -> StashResult<String> {
        let item = self.items.get_by_id(item_id)?;
        if let Some(generator) = self.generator.as_ref() {
            match generator.generate_title(&item.content).await {
                Ok(title) if !title.trim().is_empty() => return Ok(title.trim().to_string()),
                Ok(_) => debug!(item_id = %item_id, "Generator returned an empty title"),
                Err(e) => warn!(item_id = %item_id, error = %e, "Title generation failed"),
            }
        }
        Ok(content_detection::generate_title(&item.content))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Statistics
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn statistics(&self) -> StashResult<Statistics> {
        StatisticsAggregator::new(self.items.as_ref(), self.tags.as_ref())
            .collect(DEFAULT_RECENT_ITEMS, DEFAULT_TOP_TAGS)
    }

    pub fn tag_statistics(&self) -> StashResult<TagStatistics> {
        StatisticsAggregator::new(self.items.as_ref(), self.tags.as_ref()).tag_statistics()
    }

    pub fn categories_and_tags(&self) -> StashResult<CategoryTagsResponse> {
        Ok(CategoryTagsResponse {
            categories: self.items.all_categories()?,
            tags: self.items.all_tag_names()?,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Monitoring & settings
    // ─────────────────────────────────────────────────────────────────────────────

    /// Start the capture loop if auto-capture is enabled
    pub fn start_monitoring(&self) -> bool {
        if !self.settings.read().auto_capture {
            info!("Auto-capture disabled; not monitoring clipboard");
            return false;
        }
        self.capture.start(&self.runtime_handle())
    }

    pub async fn stop_monitoring(&self) -> bool {
        self.capture.stop().await
    }

    pub fn is_monitoring(&self) -> bool {
        self.capture.is_running()
    }

    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    /// Filtering changes apply from the next tick; a new interval from the next start
    pub fn update_settings(&self, settings: Settings) {
        self.capture.set_interval(settings.capture_interval());
        *self.settings.write() = settings;
    }
}

/// Trimmed, non-blank, first-occurrence names. Any invalid name rejects the whole list.
fn clean_tag_names(names: &[String]) -> StashResult<Vec<&str>> {
    let mut seen = HashSet::new();
    let mut cleaned = Vec::with_capacity(names.len());
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        validate_tag_name(name)?;
        if seen.insert(name) {
            cleaned.push(name);
        }
    }
    Ok(cleaned)
}

fn shares_run(a: &str, b: &str) -> bool {
    let a: Vec<char> = a.chars().collect();
    if a.len() < SIMILAR_TAG_MIN_OVERLAP {
        return false;
    }
    a.windows(SIMILAR_TAG_MIN_OVERLAP)
        .any(|w| b.contains(&w.iter().collect::<String>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn names(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(|t| t.name.as_str()).collect()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    struct ScriptedGenerator {
        tags: StashResult<Vec<String>>,
        title: StashResult<String>,
    }

    fn clone_result<T: Clone>(r: &StashResult<T>) -> StashResult<T> {
        match r {
            Ok(v) => Ok(v.clone()),
            Err(e) => Err(StashError::External(e.to_string())),
        }
    }

    #[async_trait]
    impl TagGenerator for ScriptedGenerator {
        async fn generate_tags(&self, _content: &str) -> StashResult<Vec<String>> {
            clone_result(&self.tags)
        }

        async fn generate_title(&self, _message: &str) -> StashResult<String> {
            clone_result(&self.title)
        }
    }

    #[test]
    fn test_update_item_tags_replaces_set_and_counts_usage() {
        let store = ClipboardStore::new_in_memory().unwrap();
        let item = store.create_item("some snippet").unwrap();

        let tags = store
            .update_item_tags(&item.id, &strings(&["work", "", "alpha", "work"]), None)
            .unwrap();
        assert_eq!(names(&tags), vec!["alpha", "work"]);

        let tags = store.update_item_tags(&item.id, &strings(&["work"]), None).unwrap();
        assert_eq!(names(&tags), vec!["work"]);

        let work = store.tags().get_tag_by_name("work").unwrap();
        assert_eq!(work.group_id.as_deref(), Some(USER_CUSTOM_GROUP_ID));
        assert_eq!(work.use_count, 2);
        assert!(work.last_used_at.is_some());
    }

    #[test]
    fn test_update_item_tags_rejects_invalid_names() {
        let store = ClipboardStore::new_in_memory().unwrap();
        let item = store.create_item("content").unwrap();
        let err = store
            .update_item_tags(&item.id, &strings(&["bad/name"]), None)
            .unwrap_err();
        assert!(matches!(err, StashError::Validation(_)));
        assert!(store.tags().tags_for_item(&item.id).unwrap().is_empty());
    }

    #[test]
    fn test_update_item_tags_invalid_name_leaves_tags_untouched() {
        let store = ClipboardStore::new_in_memory().unwrap();
        let item = store.create_item("content").unwrap();
        store.update_item_tags(&item.id, &strings(&["keep"]), None).unwrap();

        let err = store
            .update_item_tags(&item.id, &strings(&["fresh", "keep", "bad/name"]), None)
            .unwrap_err();
        assert!(matches!(err, StashError::Validation(_)));
        assert!(store.tags().get_tag_by_name("fresh").unwrap_err().is_not_found());
        assert_eq!(store.tags().get_tag_by_name("keep").unwrap().use_count, 1);
        assert_eq!(names(&store.tags().tags_for_item(&item.id).unwrap()), vec!["keep"]);

        let err = store
            .add_tags_to_item(&item.id, &strings(&["other", "bad/name"]))
            .unwrap_err();
        assert!(matches!(err, StashError::Validation(_)));
        assert!(store.tags().get_tag_by_name("other").unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_item_tags_unknown_item() {
        let store = ClipboardStore::new_in_memory().unwrap();
        let err = store.update_item_tags("missing", &strings(&["x"]), None).unwrap_err();
        assert!(err.is_not_found());
        assert!(store.tags().get_tag_by_name("x").unwrap_err().is_not_found());
    }

    #[test]
    fn test_add_and_remove_tags_by_name() {
        let store = ClipboardStore::new_in_memory().unwrap();
        let item = store.create_item("content").unwrap();
        store.add_tags_to_item(&item.id, &strings(&["a", "b"])).unwrap();
        let tags = store.add_tags_to_item(&item.id, &strings(&["b", "c"])).unwrap();
        assert_eq!(names(&tags), vec!["a", "b", "c"]);

        let tags = store
            .remove_tags_from_item(&item.id, &strings(&["a", "never-created"]))
            .unwrap();
        assert_eq!(names(&tags), vec!["b", "c"]);
    }

    #[test]
    fn test_use_item_commits_even_when_clipboard_fails() {
        let clipboard = Arc::new(MemoryClipboard::new());
        let store = ClipboardStore::new_in_memory().unwrap().with_clipboard(clipboard.clone());
        let item = store.create_item("paste me").unwrap();

        let used = store.use_item(&item.id).unwrap();
        assert_eq!(used.use_count, 1);
        assert_eq!(clipboard.get().as_deref(), Some("paste me"));

        clipboard.set_failing(true);
        let err = store.use_item(&item.id).unwrap_err();
        assert!(matches!(err, StashError::External(_)));
        assert_eq!(store.items().get_by_id(&item.id).unwrap().use_count, 2);
    }

    #[test]
    fn test_create_item_allows_duplicates_but_capture_does_not() {
        let store = ClipboardStore::new_in_memory().unwrap();
        store.create_item("same").unwrap();
        store.create_item("same").unwrap();
        assert_eq!(store.capture("same").unwrap(), CaptureOutcome::SkippedDuplicate);
        assert_eq!(store.items().count_active(None).unwrap(), 2);
        assert!(matches!(store.create_item("  "), Err(StashError::Validation(_))));
    }

    #[test]
    fn test_merge_tags_by_name() {
        let store = ClipboardStore::new_in_memory().unwrap();
        let item = store.create_item("content").unwrap();
        store.update_item_tags(&item.id, &strings(&["js", "javascript"]), None).unwrap();

        let target = store.merge_tags_by_name("js", "javascript").unwrap();
        assert_eq!(target.name, "javascript");
        let tags = store.tags().tags_for_item(&item.id).unwrap();
        assert_eq!(names(&tags), vec!["javascript"]);
        assert!(store.tags().get_tag_by_name("js").unwrap_err().is_not_found());
    }

    #[test]
    fn test_suggest_tags_prefers_mentions() {
        let store = ClipboardStore::new_in_memory().unwrap();
        let item = store.create_item("content").unwrap();
        for _ in 0..3 {
            store.update_item_tags(&item.id, &strings(&["popular"]), None).unwrap();
        }
        store.update_item_tags(&item.id, &strings(&["popular", "rust"]), None).unwrap();

        let suggested = store.suggest_tags("learning Rust today", 2).unwrap();
        assert_eq!(names(&suggested), vec!["rust", "popular"]);
        assert!(store.suggest_tags("anything", 0).unwrap().is_empty());
    }

    #[test]
    fn test_similar_tags() {
        let store = ClipboardStore::new_in_memory().unwrap();
        for name in ["rust", "rustacean", "trust", "python"] {
            store.create_tag(name, "", "", None).unwrap();
        }
        let similar = store.similar_tags("rust", 10).unwrap();
        let mut found = names(&similar);
        found.sort();
        assert_eq!(found, vec!["rustacean", "trust"]);
    }

    #[test]
    fn test_create_tag_rejects_duplicates() {
        let store = ClipboardStore::new_in_memory().unwrap();
        let tag = store.create_tag("dup", "first", "#ff0000", None).unwrap();
        assert_eq!(tag.color, "#ff0000");
        assert!(matches!(
            store.create_tag("dup", "", "", None),
            Err(StashError::Conflict(_))
        ));
    }

    #[test]
    fn test_generate_tags_attaches_only_new_valid_names() {
        let rt = runtime();
        let generator = ScriptedGenerator {
            tags: Ok(strings(&["existing", "fresh", "bad:name", "", "fresh"])),
            title: Ok(String::new()),
        };
        let store = ClipboardStore::new_in_memory()
            .unwrap()
            .with_tag_generator(Arc::new(generator));
        let item = store.create_item("content").unwrap();
        store.update_item_tags(&item.id, &strings(&["existing"]), None).unwrap();

        let added = rt.block_on(store.generate_tags_for_item(&item.id)).unwrap();
        assert_eq!(names(&added), vec!["fresh"]);
        assert_eq!(added[0].group_id.as_deref(), Some(AI_GENERATED_GROUP_ID));

        let tags = store.tags().tags_for_item(&item.id).unwrap();
        assert_eq!(names(&tags), vec!["existing", "fresh"]);
        assert!(store.tags().get_tag_by_name("bad:name").unwrap_err().is_not_found());
    }

    #[test]
    fn test_generator_failure_degrades() {
        let rt = runtime();
        let generator = ScriptedGenerator {
            tags: Err(StashError::External("model offline".into())),
            title: Err(StashError::External("model offline".into())),
        };
        let store = ClipboardStore::new_in_memory()
            .unwrap()
            .with_tag_generator(Arc::new(generator));
        let item = store.create_item("https://example.com/page").unwrap();

        assert!(rt.block_on(store.generate_tags_for_item(&item.id)).unwrap().is_empty());
        assert_eq!(
            rt.block_on(store.suggest_title(&item.id)).unwrap(),
            "https://example.com/page"
        );
    }

    #[test]
    fn test_suggest_title_prefers_generator() {
        let rt = runtime();
        let generator = ScriptedGenerator {
            tags: Ok(Vec::new()),
            title: Ok("  Example page  ".into()),
        };
        let store = ClipboardStore::new_in_memory()
            .unwrap()
            .with_tag_generator(Arc::new(generator));
        let item = store.create_item("https://example.com/page").unwrap();
        assert_eq!(rt.block_on(store.suggest_title(&item.id)).unwrap(), "Example page");
    }

    #[test]
    fn test_search_through_facade() {
        let rt = runtime();
        let store = ClipboardStore::new_in_memory().unwrap();
        store.create_item("alpha one").unwrap();
        store.create_item("beta two").unwrap();

        let result = rt
            .block_on(store.search(SearchQuery {
                query: "alpha".into(),
                ..Default::default()
            }))
            .unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.items[0].content, "alpha one");
    }

    #[test]
    fn test_categories_and_tags() {
        let store = ClipboardStore::new_in_memory().unwrap();
        let item = store.create_item("someone@example.com").unwrap();
        store.update_item_tags(&item.id, &strings(&["contact"]), None).unwrap();

        let response = store.categories_and_tags().unwrap();
        assert!(response.categories.contains(&"email".to_string()));
        assert_eq!(response.tags, vec!["contact".to_string()]);
    }

    #[test]
    fn test_monitoring_respects_auto_capture() {
        let rt = runtime();
        let clipboard = Arc::new(MemoryClipboard::new());
        let store = ClipboardStore::new_in_memory().unwrap().with_clipboard(clipboard.clone());

        let mut settings = store.settings();
        settings.auto_capture = false;
        store.update_settings(settings.clone());
        rt.block_on(async {
            assert!(!store.start_monitoring());
            assert!(!store.is_monitoring());
        });

        settings.auto_capture = true;
        settings.capture_interval_ms = 10;
        store.update_settings(settings);
        rt.block_on(async {
            assert!(store.start_monitoring());
            clipboard.set("watched value");
            for _ in 0..200 {
                if store.items().count_active(None).unwrap() == 1 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            assert!(store.stop_monitoring().await);
        });
        assert_eq!(store.items().count_active(None).unwrap(), 1);
        assert!(!store.is_monitoring());
    }
}
