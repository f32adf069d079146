//! Generated tags and titles through the `TagGenerator` collaborator

use std::sync::Arc;

use async_trait::async_trait;
use stash::models::AI_GENERATED_GROUP_ID;
use stash::{ClipboardStore, Settings, StashError, StashResult, TagGenerator, TagStore};
use tempfile::TempDir;

struct FixedGenerator(Vec<String>);

fn fixed(names: &[&str]) -> Arc<FixedGenerator> {
    Arc::new(FixedGenerator(names.iter().map(|s| s.to_string()).collect()))
}

#[async_trait]
impl TagGenerator for FixedGenerator {
    async fn generate_tags(&self, _content: &str) -> StashResult<Vec<String>> {
        Ok(self.0.clone())
    }

    async fn generate_title(&self, _message: &str) -> StashResult<String> {
        Ok("Generated title".into())
    }
}

struct OfflineGenerator;

#[async_trait]
impl TagGenerator for OfflineGenerator {
    async fn generate_tags(&self, _content: &str) -> StashResult<Vec<String>> {
        Err(StashError::External("connection refused".into()))
    }

    async fn generate_title(&self, _message: &str) -> StashResult<String> {
        Err(StashError::External("connection refused".into()))
    }
}

fn open_store(generator: Arc<dyn TagGenerator>) -> (TempDir, ClipboardStore) {
    let dir = TempDir::new().unwrap();
    let store = ClipboardStore::new(dir.path().join("stash.sqlite"), Settings::default())
        .unwrap()
        .with_tag_generator(generator);
    (dir, store)
}

#[tokio::test]
async fn test_generated_tags_go_through_validation() {
    let too_long = "x".repeat(60);
    let (_dir, store) = open_store(fixed(&["rust", "a|b", too_long.as_str(), "async"]));
    let item = store.create_item("async rust snippet").unwrap();

    let added = store.generate_tags_for_item(&item.id).await.unwrap();
    let mut names: Vec<String> = added.iter().map(|t| t.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["async", "rust"]);
    assert!(added.iter().all(|t| t.group_id.as_deref() == Some(AI_GENERATED_GROUP_ID)));

    // Second run has nothing new to add
    assert!(store.generate_tags_for_item(&item.id).await.unwrap().is_empty());
    assert_eq!(store.tags().tags_for_item(&item.id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_existing_user_tag_keeps_its_group() {
    let (_dir, store) = open_store(fixed(&["work"]));
    let other = store.create_item("other").unwrap();
    store.update_item_tags(&other.id, &["work".to_string()], None).unwrap();
    let item = store.create_item("meeting notes").unwrap();

    let added = store.generate_tags_for_item(&item.id).await.unwrap();
    assert_eq!(added.len(), 1);
    assert_ne!(added[0].group_id.as_deref(), Some(AI_GENERATED_GROUP_ID));
}

#[tokio::test]
async fn test_offline_generator_degrades() {
    let (_dir, store) = open_store(Arc::new(OfflineGenerator));
    let item = store.create_item("plain text to summarize").unwrap();

    assert!(store.generate_tags_for_item(&item.id).await.unwrap().is_empty());
    assert!(store.tags().tags_for_item(&item.id).unwrap().is_empty());
    assert_eq!(store.suggest_title(&item.id).await.unwrap(), "plain text to summarize");
    assert!(store.generate_tags_for_item("missing").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_generated_title() {
    let (_dir, store) = open_store(fixed(&[]));
    let item = store.create_item("some content").unwrap();
    assert_eq!(store.suggest_title(&item.id).await.unwrap(), "Generated title");
}
