//! Generate a demo database with tagged clipboard items.
//!
//! Creates the database through the library's own stores, so the schema
//! always matches. Useful for benchmarks and manual testing.
//!
//! Usage:
//!     cargo run --release --bin generate-demo-db -- --count 5000 --output demo.sqlite

use anyhow::{Context, Result};
use chrono::Duration;
use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use stash::logging::init_logging;
use stash::{ClipboardItem, ClipboardStore, Settings};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the SQLite database to create
    #[arg(short, long, default_value = "stash_demo.sqlite")]
    output: PathBuf,

    /// Number of items to generate
    #[arg(short, long, default_value_t = 1000)]
    count: usize,

    /// Maximum tags attached to a single item
    #[arg(long, default_value_t = 3)]
    max_tags: usize,

    /// Fraction of items moved to the trash
    #[arg(long, default_value_t = 0.05)]
    trash_ratio: f64,

    /// Spread creation times over this many past days
    #[arg(long, default_value_t = 60)]
    days: i64,

    /// RNG seed for reproducible output
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Overwrite an existing database
    #[arg(long)]
    force: bool,
}

const TAG_POOL: &[&str] = &[
    "work", "personal", "rust", "sql", "snippet", "todo", "link", "contact",
    "config", "meeting", "draft", "receipt", "travel", "shell", "review",
];

const WORDS: &[&str] = &[
    "deploy", "release", "branch", "invoice", "lunch", "schedule", "query",
    "cache", "review", "ticket", "budget", "pipeline", "notes", "follow", "up",
    "address", "password", "reset", "token", "migration", "draft", "flight",
];

fn generate_content(rng: &mut StdRng, index: usize) -> String {
    match rng.gen_range(0..8) {
        0 => format!("https://example.com/{}/{}", WORDS.choose(rng).unwrap_or(&"page"), index),
        1 => format!("user{}@example.com", index),
        2 => format!("+1 (555) {:03}-{:04}", rng.gen_range(100..999), rng.gen_range(0..9999)),
        3 => format!("/home/demo/projects/{}/src/main.rs", WORDS.choose(rng).unwrap_or(&"app")),
        4 => format!("{{\"id\": {}, \"status\": \"{}\"}}", index, WORDS.choose(rng).unwrap_or(&"ok")),
        5 => format!("{}.{:02}", rng.gen_range(0..100_000), rng.gen_range(0..100)),
        _ => {
            let len = rng.gen_range(4..40);
            let words: Vec<&str> = (0..len).filter_map(|_| WORDS.choose(rng).copied()).collect();
            format!("{} #{}", words.join(" "), index)
        }
    }
}

fn main() -> Result<()> {
    init_logging("stash=warn");
    let args = Args::parse();

    if args.output.exists() {
        if !args.force {
            anyhow::bail!("{} exists; pass --force to overwrite", args.output.display());
        }
        std::fs::remove_file(&args.output)
            .with_context(|| format!("Failed to remove {}", args.output.display()))?;
    }

    println!("Generating demo database...");
    println!("Output: {}", args.output.display());

    let settings = Settings::default();
    let store = ClipboardStore::new(&args.output, settings.clone())
        .context("Failed to create database")?;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut trashed = 0usize;

    for i in 0..args.count {
        let mut item = ClipboardItem::from_capture(generate_content(&mut rng, i), &settings);
        item.created_at -= Duration::minutes(rng.gen_range(0..args.days.max(1) * 24 * 60));
        item.updated_at = item.created_at;
        item.last_used_at = item.created_at;
        store.items().create(&item)?;

        let tag_count = rng.gen_range(0..=args.max_tags);
        let tags: Vec<String> = TAG_POOL
            .choose_multiple(&mut rng, tag_count)
            .map(|t| t.to_string())
            .collect();
        if !tags.is_empty() {
            store.update_item_tags(&item.id, &tags, None)?;
        }

        if rng.gen_bool(args.trash_ratio.clamp(0.0, 1.0)) {
            store.items().soft_delete(&item.id)?;
            trashed += 1;
        }

        if (i + 1) % 250 == 0 {
            println!("  Generated {}/{} items...", i + 1, args.count);
        }
    }

    let stats = store.statistics()?;
    println!();
    println!("Database created: {}", args.output.display());
    println!("  Active items: {}", stats.total_items);
    println!("  Trashed items: {}", trashed);
    println!("  Tags: {}", store.tags().count_tags()?);
    for (category, count) in &stats.category_stats {
        println!("  {:>8}: {}", category, count);
    }
    Ok(())
}
