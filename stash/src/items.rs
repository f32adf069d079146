//! SQLite-backed item store: active set, trash and duplicate detection

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::{format_timestamp, item_from_row, write_transaction, Database, ITEM_COLUMNS};
use crate::filter::{placeholders, Filter, ItemPredicate, QueryParam};
use crate::interface::{ItemStore, SearchQuery, SearchResult, StashError, StashResult};
use crate::models::{hash_content, Category, ClipboardItem};
use crate::search;
use crate::tags::load_tags_for_items;

/// SQLite has no unsigned LIMIT; clamp huge page sizes instead of wrapping
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn fetch_item(conn: &Connection, id: &str) -> StashResult<Option<ClipboardItem>> {
    let item = conn
        .query_row(
            &format!("SELECT {} FROM items i WHERE i.id = ?1", ITEM_COLUMNS),
            params![id],
            item_from_row,
        )
        .optional()?;
    Ok(item)
}

fn fetch_page(
    conn: &Connection,
    filter: &Filter,
    order_sql: &str,
    limit: usize,
    offset: usize,
) -> StashResult<Vec<ClipboardItem>> {
    let mut items = {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM items i {} ORDER BY {} LIMIT ? OFFSET ?",
            ITEM_COLUMNS,
            filter.where_sql(),
            order_sql
        ))?;
        let params = filter.params_with([
            QueryParam::Int(sql_limit(limit)),
            QueryParam::Int(sql_limit(offset)),
        ]);
        let rows = stmt
            .query_map(params_from_iter(params.iter()), item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };
    load_tags_for_items(conn, &mut items)?;
    Ok(items)
}

/// Item store backed by the shared SQLite database
pub struct SqliteItemStore {
    db: Arc<Database>,
}

impl SqliteItemStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl ItemStore for SqliteItemStore {
    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    fn create(&self, item: &ClipboardItem) -> StashResult<()> {
        let conn = self.db.get_conn()?;
        conn.execute(
            "INSERT INTO items (id, content, contentHash, contentType, title, category, isFavorite,
                                useCount, isDeleted, deletedAt, createdAt, updatedAt, lastUsedAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                item.id,
                item.content,
                hash_content(&item.content),
                item.content_type.as_str(),
                item.title,
                item.category,
                item.is_favorite,
                item.use_count,
                item.is_deleted,
                item.deleted_at.as_ref().map(format_timestamp),
                format_timestamp(&item.created_at),
                format_timestamp(&item.updated_at),
                format_timestamp(&item.last_used_at),
            ],
        )?;
        debug!(item_id = %item.id, category = %item.category, "Created item");
        Ok(())
    }

    fn update(&self, item: &ClipboardItem) -> StashResult<()> {
        // Keep the soft-delete pair consistent whatever the caller sent
        let deleted_at = match (item.is_deleted, item.deleted_at) {
            (false, _) => None,
            (true, Some(at)) => Some(at),
            (true, None) => Some(Utc::now()),
        };

        let conn = self.db.get_conn()?;
        let updated = conn.execute(
            "UPDATE items SET content = ?2, contentHash = ?3, contentType = ?4, title = ?5,
                              category = ?6, isFavorite = ?7, isDeleted = ?8, deletedAt = ?9,
                              updatedAt = ?10
             WHERE id = ?1",
            params![
                item.id,
                item.content,
                hash_content(&item.content),
                item.content_type.as_str(),
                item.title,
                item.category,
                item.is_favorite,
                item.is_deleted,
                deleted_at.as_ref().map(format_timestamp),
                format_timestamp(&Utc::now()),
            ],
        )?;
        if updated == 0 {
            return Err(StashError::not_found("item", &item.id));
        }
        Ok(())
    }

    fn soft_delete(&self, id: &str) -> StashResult<()> {
        let conn = self.db.get_conn()?;
        let now = format_timestamp(&Utc::now());
        let updated = conn.execute(
            "UPDATE items SET isDeleted = 1, deletedAt = ?2, updatedAt = ?2
             WHERE id = ?1 AND isDeleted = 0",
            params![id, now],
        )?;
        if updated == 0 && fetch_item(&conn, id)?.is_none() {
            return Err(StashError::not_found("item", id));
        }
        Ok(())
    }

    fn restore(&self, id: &str) -> StashResult<()> {
        let conn = self.db.get_conn()?;
        let updated = conn.execute(
            "UPDATE items SET isDeleted = 0, deletedAt = NULL, updatedAt = ?2
             WHERE id = ?1 AND isDeleted = 1",
            params![id, format_timestamp(&Utc::now())],
        )?;
        if updated == 0 && fetch_item(&conn, id)?.is_none() {
            return Err(StashError::not_found("item", id));
        }
        Ok(())
    }

    fn permanent_delete(&self, id: &str) -> StashResult<()> {
        let conn = self.db.get_conn()?;
        // Tag associations go with it through ON DELETE CASCADE
        let deleted = conn.execute("DELETE FROM items WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StashError::not_found("item", id));
        }
        info!(item_id = %id, "Permanently deleted item");
        Ok(())
    }

    fn batch_permanent_delete(&self, ids: &[String]) -> StashResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.db.get_conn()?;
        let tx = write_transaction(&conn)?;
        let mut deleted = 0;
        for chunk in ids.chunks(500) {
            deleted += tx.execute(
                &format!("DELETE FROM items WHERE id IN ({})", placeholders(chunk.len())),
                params_from_iter(chunk.iter()),
            )?;
        }
        tx.commit()?;
        info!(requested = ids.len(), deleted, "Batch deleted items");
        Ok(deleted)
    }

    fn empty_trash(&self) -> StashResult<usize> {
        let conn = self.db.get_conn()?;
        let deleted = conn.execute("DELETE FROM items WHERE isDeleted = 1", [])?;
        info!(deleted, "Emptied trash");
        Ok(deleted)
    }

    fn use_item(&self, id: &str) -> StashResult<()> {
        let conn = self.db.get_conn()?;
        let now = format_timestamp(&Utc::now());
        let updated = conn.execute(
            "UPDATE items SET useCount = useCount + 1, lastUsedAt = ?2, updatedAt = ?2 WHERE id = ?1",
            params![id, now],
        )?;
        if updated == 0 {
            return Err(StashError::not_found("item", id));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────────

    fn get_by_id(&self, id: &str) -> StashResult<ClipboardItem> {
        let conn = self.db.get_conn()?;
        let mut item = fetch_item(&conn, id)?.ok_or_else(|| StashError::not_found("item", id))?;
        load_tags_for_items(&conn, std::slice::from_mut(&mut item))?;
        Ok(item)
    }

    fn list(&self, limit: usize, offset: usize) -> StashResult<Vec<ClipboardItem>> {
        let conn = self.db.get_conn()?;
        let filter = Filter::new().and(ItemPredicate::Active);
        fetch_page(&conn, &filter, "i.createdAt DESC, i.rowid DESC", limit, offset)
    }

    fn get_trash(&self, limit: usize, offset: usize) -> StashResult<Vec<ClipboardItem>> {
        let conn = self.db.get_conn()?;
        let filter = Filter::new().and(ItemPredicate::Trashed);
        fetch_page(&conn, &filter, "i.deletedAt DESC, i.rowid DESC", limit, offset)
    }

    fn is_duplicate_content(&self, content: &str) -> StashResult<bool> {
        let conn = self.db.get_conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM items WHERE contentHash = ?1 AND content = ?2 AND isDeleted = 0)",
            params![hash_content(content), content],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn search(&self, query: &SearchQuery) -> StashResult<SearchResult> {
        let conn = self.db.get_conn()?;
        search::search_items(&conn, query)
    }

    fn count_active(&self, since: Option<DateTime<Utc>>) -> StashResult<u64> {
        let conn = self.db.get_conn()?;
        let mut filter = Filter::new().and(ItemPredicate::Active);
        if let Some(since) = since {
            filter = filter.and(ItemPredicate::CreatedSince(since));
        }
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM items i {}", filter.where_sql()),
            params_from_iter(filter.params().iter()),
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn category_histogram(&self) -> StashResult<BTreeMap<String, u64>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT category, COUNT(*) FROM items WHERE isDeleted = 0 GROUP BY category",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(|(c, n)| (c, n.max(0) as u64)).collect())
    }

    fn all_categories(&self) -> StashResult<Vec<String>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT category FROM items WHERE isDeleted = 0")?;
        let used = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let all: BTreeSet<String> = Category::ALL
            .iter()
            .map(|c| c.as_str().to_string())
            .chain(used.into_iter().filter(|c| !c.is_empty()))
            .collect();
        Ok(all.into_iter().collect())
    }

    fn all_tag_names(&self) -> StashResult<Vec<String>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT t.name FROM tags t
             JOIN item_tags it ON it.tagId = t.id
             JOIN items i ON i.id = it.itemId
             WHERE i.isDeleted = 0
             ORDER BY t.name ASC",
        )?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
