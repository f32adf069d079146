//! SQLite database layer for clipboard history and the tag taxonomy
//!
//! Relational schema: `items`, `tags`, `tag_groups` and the `item_tags` join table.
//! Uses r2d2 connection pooling so the capture loop and request-driven calls
//! never contend on a single connection mutex.

use crate::models::{
    ClipboardItem, ContentType, Tag, TagGroup, AI_GENERATED_GROUP_ID, DEFAULT_TAG_COLOR,
    USER_CUSTOM_GROUP_ID,
};
use chrono::{DateTime, TimeZone, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row, Transaction, TransactionBehavior};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

pub(crate) type Connection = PooledConnection<SqliteConnectionManager>;

/// Begin a transaction that takes the write lock up front.
///
/// A deferred transaction that reads before writing fails with SQLITE_BUSY
/// without waiting when another writer commits in between.
pub(crate) fn write_transaction(conn: &rusqlite::Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

/// Fixed-width UTC format: lexical order of stored values equals chronological order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Format a timestamp for storage
pub(crate) fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse timestamp string from database to DateTime<Utc>
pub(crate) fn parse_db_timestamp(timestamp_str: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S"))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_optional_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value.as_deref().map(parse_db_timestamp)
}

/// True when the error is a UNIQUE or PRIMARY KEY constraint violation
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// True when the error is a FOREIGN KEY constraint violation
pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROW MAPPING
// ═══════════════════════════════════════════════════════════════════════════════

/// Column list matching `item_from_row`. Callers alias `items` as `i`.
pub(crate) const ITEM_COLUMNS: &str = "i.id, i.content, i.contentType, i.title, i.category, \
     i.isFavorite, i.useCount, i.isDeleted, i.deletedAt, i.createdAt, i.updatedAt, i.lastUsedAt";

/// Column list matching `tag_from_row`. Callers alias `tags` as `t`.
pub(crate) const TAG_COLUMNS: &str = "t.id, t.name, t.description, t.color, t.groupId, \
     t.useCount, t.createdAt, t.updatedAt, t.lastUsedAt";

pub(crate) const GROUP_COLUMNS: &str =
    "id, name, description, color, sortOrder, isSystem, createdAt, updatedAt";

/// Map a row selected with `ITEM_COLUMNS`. Tags are resolved separately.
pub(crate) fn item_from_row(row: &Row) -> rusqlite::Result<ClipboardItem> {
    let content_type: String = row.get(2)?;
    let deleted_at: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    let last_used_at: String = row.get(11)?;
    Ok(ClipboardItem {
        id: row.get(0)?,
        content: row.get(1)?,
        content_type: ContentType::from_database_str(&content_type),
        title: row.get(3)?,
        category: row.get(4)?,
        is_favorite: row.get(5)?,
        use_count: row.get(6)?,
        is_deleted: row.get(7)?,
        deleted_at: parse_optional_timestamp(deleted_at),
        created_at: parse_db_timestamp(&created_at),
        updated_at: parse_db_timestamp(&updated_at),
        last_used_at: parse_db_timestamp(&last_used_at),
        tags: Vec::new(),
    })
}

/// Map a row selected with `TAG_COLUMNS`, starting at column `offset`
pub(crate) fn tag_from_row_at(row: &Row, offset: usize) -> rusqlite::Result<Tag> {
    let created_at: String = row.get(offset + 6)?;
    let updated_at: String = row.get(offset + 7)?;
    let last_used_at: Option<String> = row.get(offset + 8)?;
    Ok(Tag {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        description: row.get(offset + 2)?,
        color: row.get(offset + 3)?,
        group_id: row.get(offset + 4)?,
        use_count: row.get(offset + 5)?,
        created_at: parse_db_timestamp(&created_at),
        updated_at: parse_db_timestamp(&updated_at),
        last_used_at: parse_optional_timestamp(last_used_at),
    })
}

pub(crate) fn tag_from_row(row: &Row) -> rusqlite::Result<Tag> {
    tag_from_row_at(row, 0)
}

pub(crate) fn group_from_row(row: &Row) -> rusqlite::Result<TagGroup> {
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    Ok(TagGroup {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        color: row.get(3)?,
        sort_order: row.get(4)?,
        is_system: row.get(5)?,
        created_at: parse_db_timestamp(&created_at),
        updated_at: parse_db_timestamp(&updated_at),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// DATABASE
// ═══════════════════════════════════════════════════════════════════════════════

/// Thread-safe database wrapper using connection pooling
///
/// WAL mode lets the capture loop write while readers proceed.
/// Every store call checks out exactly one connection; helpers take `&Connection`
/// so a single-connection pool (in-memory databases) never deadlocks.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create a database at the given path with connection pooling
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| {
                conn.execute_batch("
                    PRAGMA journal_mode=WAL;
                    PRAGMA synchronous=NORMAL;
                    PRAGMA foreign_keys=ON;
                    PRAGMA busy_timeout=5000;
                ")?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(8)
            .build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| {
                conn.execute_batch("PRAGMA foreign_keys=ON;")?;
                Ok(())
            });

        // In-memory needs single connection to maintain state
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Get a connection from the pool
    pub(crate) fn get_conn(&self) -> DatabaseResult<Connection> {
        Ok(self.pool.get()?)
    }

    /// Set up the database schema and seed the system tag groups
    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;

        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                contentHash TEXT NOT NULL,
                contentType TEXT NOT NULL DEFAULT 'text',
                title TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT 'text',
                isFavorite INTEGER NOT NULL DEFAULT 0,
                useCount INTEGER NOT NULL DEFAULT 0 CHECK (useCount >= 0),
                isDeleted INTEGER NOT NULL DEFAULT 0,
                deletedAt TEXT,
                createdAt TEXT NOT NULL,
                updatedAt TEXT NOT NULL,
                lastUsedAt TEXT NOT NULL,
                CHECK ((isDeleted = 0 AND deletedAt IS NULL) OR (isDeleted = 1 AND deletedAt IS NOT NULL))
            );

            CREATE TABLE IF NOT EXISTS tag_groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                color TEXT NOT NULL DEFAULT '#1890ff',
                sortOrder INTEGER NOT NULL DEFAULT 0,
                isSystem INTEGER NOT NULL DEFAULT 0,
                createdAt TEXT NOT NULL,
                updatedAt TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tags (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                color TEXT NOT NULL DEFAULT '#1890ff',
                groupId TEXT REFERENCES tag_groups(id) ON DELETE SET NULL,
                useCount INTEGER NOT NULL DEFAULT 0,
                createdAt TEXT NOT NULL,
                updatedAt TEXT NOT NULL,
                lastUsedAt TEXT
            );

            CREATE TABLE IF NOT EXISTS item_tags (
                itemId TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
                tagId TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                createdAt TEXT NOT NULL,
                PRIMARY KEY (itemId, tagId)
            );

            CREATE INDEX IF NOT EXISTS idx_items_active_created ON items(isDeleted, createdAt);
            CREATE INDEX IF NOT EXISTS idx_items_hash ON items(contentHash);
            CREATE INDEX IF NOT EXISTS idx_items_category ON items(category);
            CREATE INDEX IF NOT EXISTS idx_items_deleted_at ON items(deletedAt);
            CREATE INDEX IF NOT EXISTS idx_tags_group ON tags(groupId);
            CREATE INDEX IF NOT EXISTS idx_tags_use_count ON tags(useCount);
            CREATE INDEX IF NOT EXISTS idx_item_tags_tag ON item_tags(tagId);
        "#)?;

        let now = format_timestamp(&Utc::now());
        let seeds = [
            (AI_GENERATED_GROUP_ID, "AI Generated", "Tags suggested by the tag generator", "#52c41a", 0),
            (USER_CUSTOM_GROUP_ID, "Custom", "Tags created by the user", DEFAULT_TAG_COLOR, 1),
        ];
        for (id, name, description, color, sort_order) in seeds {
            conn.execute(
                "INSERT OR IGNORE INTO tag_groups (id, name, description, color, sortOrder, isSystem, createdAt, updatedAt)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
                params![id, name, description, color, sort_order, now],
            )?;
        }

        Ok(())
    }
}
