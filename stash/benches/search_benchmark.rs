use criterion::{criterion_group, criterion_main, Criterion};
use stash::{ClipboardStore, SearchQuery, Settings, TagMode};
use tempfile::TempDir;

const ITEM_COUNT: usize = 2_000;
const TAGS: &[&str] = &["work", "personal", "rust", "sql", "todo", "link"];

fn setup_store(dir: &TempDir) -> ClipboardStore {
    let store = ClipboardStore::new(dir.path().join("bench.sqlite"), Settings::default())
        .expect("Failed to open benchmark database");
    for i in 0..ITEM_COUNT {
        let item = store
            .create_item(&format!("benchmark entry {} about deploy and review", i))
            .unwrap();
        let tags: Vec<String> = TAGS
            .iter()
            .enumerate()
            .filter(|(t, _)| i % (t + 2) == 0)
            .map(|(_, name)| name.to_string())
            .collect();
        store.update_item_tags(&item.id, &tags, None).unwrap();
    }
    store
}

fn bench_search(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = setup_store(&dir);
    let rt = tokio::runtime::Runtime::new().unwrap();

    let tag_query = |mode: TagMode| SearchQuery {
        tags: vec!["work".into(), "rust".into()],
        tag_mode: Some(mode),
        ..Default::default()
    };
    let queries = vec![
        ("unfiltered", SearchQuery::default()),
        ("text", SearchQuery { query: "deploy".into(), ..Default::default() }),
        ("tags_all", tag_query(TagMode::All)),
        ("tags_any", tag_query(TagMode::Any)),
        ("tags_none", tag_query(TagMode::None)),
        (
            "text_and_tags_deep_page",
            SearchQuery {
                query: "review".into(),
                offset: 500,
                ..tag_query(TagMode::Any)
            },
        ),
    ];

    let mut group = c.benchmark_group("search");
    group.sample_size(20);

    for (name, query) in queries {
        group.bench_function(name, |b| {
            b.iter(|| rt.block_on(store.search(query.clone())).unwrap());
        });
    }
    group.finish();
}

fn bench_statistics(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = setup_store(&dir);
    c.bench_function("statistics", |b| b.iter(|| store.statistics().unwrap()));
}

criterion_group!(benches, bench_search, bench_statistics);
criterion_main!(benches);
