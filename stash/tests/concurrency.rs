//! Concurrent access to one on-disk database

use std::sync::Arc;
use std::thread;

use stash::{ClipboardStore, ItemStore, Settings, TagStore};
use tempfile::TempDir;

#[test]
fn test_concurrent_get_or_create_yields_one_tag() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ClipboardStore::new(dir.path().join("stash.sqlite"), Settings::default()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.tags().get_or_create_tag("contended", None).unwrap().id)
        })
        .collect();
    let ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(store.tags().count_tags().unwrap(), 1);
}

#[test]
fn test_parallel_tagging_of_distinct_items() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ClipboardStore::new(dir.path().join("stash.sqlite"), Settings::default()).unwrap());
    let ids: Vec<String> = (0..16)
        .map(|i| store.create_item(&format!("item {}", i)).unwrap().id)
        .collect();

    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store
                    .update_item_tags(&id, &["shared".to_string(), id.clone()], None)
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().len(), 2);
    }

    let shared = store.tags().get_tag_by_name("shared").unwrap();
    assert_eq!(shared.use_count, 16);
    assert_eq!(store.tags().items_for_tag(&shared.id).unwrap().len(), 16);
    assert_eq!(store.items().count_active(None).unwrap(), 16);
}
