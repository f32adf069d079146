//! Clipboard capture: the acceptance pipeline and the polling loop
//!
//! Lifecycle: Idle ⇄ Running. `start` spawns one polling task on the given
//! runtime; `stop` cancels it and waits for any in-flight tick, so no capture
//! happens after `stop` returns.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clipboard::ClipboardReader;
use crate::content_detection::is_likely_password;
use crate::interface::{ItemStore, StashResult};
use crate::models::ClipboardItem;
use crate::settings::Settings;

/// What the pipeline did with a clipboard value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Stored(String),
    SkippedEmpty,
    SkippedSensitive,
    SkippedDuplicate,
}

/// Filters, de-duplicates, classifies and persists new clipboard values
pub struct CapturePipeline {
    items: Arc<dyn ItemStore>,
    settings: Arc<RwLock<Settings>>,
}

impl CapturePipeline {
    pub fn new(items: Arc<dyn ItemStore>, settings: Arc<RwLock<Settings>>) -> Self {
        Self { items, settings }
    }

    pub fn accept(&self, content: &str) -> StashResult<CaptureOutcome> {
        if content.trim().is_empty() {
            return Ok(CaptureOutcome::SkippedEmpty);
        }

        let settings = self.settings.read().clone();
        if settings.ignore_passwords && is_likely_password(content) {
            debug!("Skipping clipboard value that looks like a password");
            return Ok(CaptureOutcome::SkippedSensitive);
        }

        // Trashed copies do not count, so forgotten content can be captured again
        if self.items.is_duplicate_content(content)? {
            debug!("Skipping duplicate clipboard value");
            return Ok(CaptureOutcome::SkippedDuplicate);
        }

        let item = ClipboardItem::from_capture(content.to_string(), &settings);
        self.items.create(&item)?;
        info!(item_id = %item.id, title = %item.title, category = %item.category, "Captured clipboard item");
        Ok(CaptureOutcome::Stored(item.id))
    }
}

struct RunningLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Handle owning the single polling task
pub struct CaptureLoop {
    reader: Arc<dyn ClipboardReader>,
    pipeline: Mutex<Option<Arc<CapturePipeline>>>,
    interval: Mutex<Duration>,
    running: Mutex<Option<RunningLoop>>,
}

impl CaptureLoop {
    pub fn new(reader: Arc<dyn ClipboardReader>, interval: Duration) -> Self {
        Self {
            reader,
            pipeline: Mutex::new(None),
            interval: Mutex::new(interval),
            running: Mutex::new(None),
        }
    }

    /// Register the downstream consumer. Takes effect on the next `start`.
    pub fn set_pipeline(&self, pipeline: Arc<CapturePipeline>) {
        *self.pipeline.lock() = Some(pipeline);
    }

    /// Polling period. Takes effect on the next `start`.
    pub fn set_interval(&self, interval: Duration) {
        *self.interval.lock() = interval;
    }

    /// Idle → Running. Returns false when already running or no pipeline is registered.
    pub fn start(&self, runtime: &Handle) -> bool {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let Some(pipeline) = self.pipeline.lock().clone() else {
            warn!("Capture loop has no pipeline registered; not starting");
            return false;
        };

        let interval = *self.interval.lock();
        let token = CancellationToken::new();
        let handle = runtime.spawn(run_loop(
            Arc::clone(&self.reader),
            pipeline,
            interval,
            token.clone(),
        ));
        *running = Some(RunningLoop { token, handle });
        info!(interval_ms = interval.as_millis() as u64, "Started clipboard capture");
        true
    }

    /// Running → Idle. Waits for an in-flight tick. Returns false when already idle.
    pub async fn stop(&self) -> bool {
        let Some(running) = self.running.lock().take() else {
            return false;
        };

        running.token.cancel();
        if let Err(e) = running.handle.await {
            warn!(error = %e, "Capture loop ended abnormally");
        }
        info!("Stopped clipboard capture");
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.token.cancel();
        }
    }
}

async fn run_loop(
    reader: Arc<dyn ClipboardReader>,
    pipeline: Arc<CapturePipeline>,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Owned by this task only
    let mut last_seen: Option<String> = None;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let reader = Arc::clone(&reader);
        let pipeline = Arc::clone(&pipeline);
        let previous = last_seen.take();
        // At most one capture in flight; slow stores delay, never stack, ticks
        match tokio::task::spawn_blocking(move || capture_tick(reader.as_ref(), &pipeline, previous)).await {
            Ok(seen) => last_seen = seen,
            Err(e) => warn!(error = %e, "Capture tick panicked"),
        }
    }
}

/// One poll. Returns the new last-observed value.
fn capture_tick(
    reader: &dyn ClipboardReader,
    pipeline: &CapturePipeline,
    previous: Option<String>,
) -> Option<String> {
    let content = match reader.read_text() {
        Ok(content) => content,
        Err(e) => {
            debug!(error = %e, "Clipboard read failed");
            return previous;
        }
    };

    if content.is_empty() || previous.as_deref() == Some(content.as_str()) {
        return previous;
    }

    match pipeline.accept(&content) {
        Ok(outcome) => debug!(?outcome, "Processed clipboard change"),
        Err(e) => warn!(error = %e, "Failed to capture clipboard content"),
    }
    Some(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::database::Database;
    use crate::interface::{SearchQuery, SearchResult, StashError};
    use crate::items::SqliteItemStore;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeMap;

    fn settings() -> Arc<RwLock<Settings>> {
        Arc::new(RwLock::new(Settings::default()))
    }

    fn sqlite_items() -> Arc<SqliteItemStore> {
        Arc::new(SqliteItemStore::new(Arc::new(Database::open_in_memory().unwrap())))
    }

    async fn wait_for(cond: impl Fn() -> bool) -> bool {
        for _ in 0..200 {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    /// In-memory fake that fails to persist the content "boom"
    #[derive(Default)]
    struct FakeItemStore {
        items: Mutex<Vec<ClipboardItem>>,
        failed_creates: Mutex<usize>,
    }

    impl FakeItemStore {
        fn contents(&self) -> Vec<String> {
            self.items.lock().iter().map(|i| i.content.clone()).collect()
        }
    }

    fn unsupported<T>() -> StashResult<T> {
        Err(StashError::Validation("unsupported in fake".into()))
    }

    impl ItemStore for FakeItemStore {
        fn create(&self, item: &ClipboardItem) -> StashResult<()> {
            if item.content == "boom" {
                *self.failed_creates.lock() += 1;
                return Err(StashError::Conflict("simulated storage failure".into()));
            }
            self.items.lock().push(item.clone());
            Ok(())
        }
        fn update(&self, _: &ClipboardItem) -> StashResult<()> { unsupported() }
        fn soft_delete(&self, _: &str) -> StashResult<()> { unsupported() }
        fn restore(&self, _: &str) -> StashResult<()> { unsupported() }
        fn permanent_delete(&self, _: &str) -> StashResult<()> { unsupported() }
        fn batch_permanent_delete(&self, _: &[String]) -> StashResult<usize> { unsupported() }
        fn empty_trash(&self) -> StashResult<usize> { unsupported() }
        fn use_item(&self, _: &str) -> StashResult<()> { unsupported() }
        fn get_by_id(&self, _: &str) -> StashResult<ClipboardItem> { unsupported() }
        fn list(&self, _: usize, _: usize) -> StashResult<Vec<ClipboardItem>> { unsupported() }
        fn get_trash(&self, _: usize, _: usize) -> StashResult<Vec<ClipboardItem>> { unsupported() }
        fn is_duplicate_content(&self, content: &str) -> StashResult<bool> {
            Ok(self.items.lock().iter().any(|i| i.content == content && !i.is_deleted))
        }
        fn search(&self, _: &SearchQuery) -> StashResult<SearchResult> { unsupported() }
        fn count_active(&self, _: Option<DateTime<Utc>>) -> StashResult<u64> { unsupported() }
        fn category_histogram(&self) -> StashResult<BTreeMap<String, u64>> { unsupported() }
        fn all_categories(&self) -> StashResult<Vec<String>> { unsupported() }
        fn all_tag_names(&self) -> StashResult<Vec<String>> { unsupported() }
    }

    #[test]
    fn test_pipeline_suppresses_active_duplicates() {
        let items = sqlite_items();
        let pipeline = CapturePipeline::new(items.clone(), settings());

        let first = pipeline.accept("copied once").unwrap();
        let CaptureOutcome::Stored(id) = first.clone() else { panic!("expected stored, got {:?}", first) };
        assert_eq!(pipeline.accept("copied once").unwrap(), CaptureOutcome::SkippedDuplicate);
        assert_eq!(items.count_active(None).unwrap(), 1);

        items.soft_delete(&id).unwrap();
        let again = pipeline.accept("copied once").unwrap();
        assert!(matches!(again, CaptureOutcome::Stored(ref new_id) if *new_id != id));
        assert_eq!(items.count_active(None).unwrap(), 1);
        assert_eq!(items.get_trash(10, 0).unwrap().len(), 1);
    }

    #[test]
    fn test_pipeline_password_filter_follows_setting() {
        let items = sqlite_items();
        let settings = settings();
        let pipeline = CapturePipeline::new(items.clone(), settings.clone());

        assert_eq!(pipeline.accept("Tr0ub4dor&3").unwrap(), CaptureOutcome::SkippedSensitive);

        settings.write().ignore_passwords = false;
        assert!(matches!(pipeline.accept("Tr0ub4dor&3").unwrap(), CaptureOutcome::Stored(_)));
    }

    #[test]
    fn test_pipeline_skips_blank_content() {
        let pipeline = CapturePipeline::new(sqlite_items(), settings());
        assert_eq!(pipeline.accept("").unwrap(), CaptureOutcome::SkippedEmpty);
        assert_eq!(pipeline.accept(" \n\t").unwrap(), CaptureOutcome::SkippedEmpty);
    }

    #[test]
    fn test_pipeline_uses_default_category_when_not_categorizing() {
        let items = sqlite_items();
        let settings = settings();
        {
            let mut s = settings.write();
            s.auto_categorize = false;
            s.default_category = "inbox".into();
        }
        let pipeline = CapturePipeline::new(items.clone(), settings);
        let CaptureOutcome::Stored(id) = pipeline.accept("https://example.com").unwrap() else {
            panic!("expected stored");
        };
        assert_eq!(items.get_by_id(&id).unwrap().category, "inbox");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_loop_captures_changes_and_stops() {
        let items = sqlite_items();
        let clipboard = Arc::new(MemoryClipboard::new());
        let capture = CaptureLoop::new(clipboard.clone(), Duration::from_millis(10));
        capture.set_pipeline(Arc::new(CapturePipeline::new(items.clone(), settings())));

        assert!(capture.start(&Handle::current()));
        assert!(!capture.start(&Handle::current()));
        assert!(capture.is_running());

        clipboard.set("first value");
        assert!(wait_for(|| items.count_active(None).unwrap() == 1).await);
        clipboard.set("second value");
        assert!(wait_for(|| items.count_active(None).unwrap() == 2).await);

        assert!(capture.stop().await);
        assert!(!capture.is_running());
        assert!(!capture.stop().await);

        clipboard.set("after stop");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(items.count_active(None).unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_loop_survives_store_and_reader_failures() {
        let items = Arc::new(FakeItemStore::default());
        let clipboard = Arc::new(MemoryClipboard::new());
        let capture = CaptureLoop::new(clipboard.clone(), Duration::from_millis(10));
        capture.set_pipeline(Arc::new(CapturePipeline::new(items.clone(), settings())));
        assert!(capture.start(&Handle::current()));

        clipboard.set("boom");
        assert!(wait_for(|| *items.failed_creates.lock() == 1).await);

        clipboard.set_failing(true);
        tokio::time::sleep(Duration::from_millis(50)).await;
        clipboard.set_failing(false);

        clipboard.set("fine");
        assert!(wait_for(|| items.contents() == vec!["fine".to_string()]).await);
        // Unchanged value is not resubmitted
        assert_eq!(*items.failed_creates.lock(), 1);

        capture.stop().await;
    }

    #[tokio::test]
    async fn test_start_without_pipeline_is_noop() {
        let capture = CaptureLoop::new(Arc::new(MemoryClipboard::new()), Duration::from_millis(10));
        assert!(!capture.start(&Handle::current()));
        assert!(!capture.is_running());
    }
}
