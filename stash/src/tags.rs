//! SQLite-backed tag store: tags, tag groups and item associations

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::{
    format_timestamp, group_from_row, is_foreign_key_violation, is_unique_violation,
    item_from_row, tag_from_row, tag_from_row_at, write_transaction, Database, GROUP_COLUMNS,
    ITEM_COLUMNS, TAG_COLUMNS,
};
use crate::filter::{placeholders, Filter, TagPredicate};
use crate::interface::{StashError, StashResult, TagSearchQuery, TagSortField, TagStore};
use crate::models::{ClipboardItem, Tag, TagGroup, TagWithStats, DEFAULT_TAG_COLOR, USER_CUSTOM_GROUP_ID};
use crate::search;

pub const MAX_TAG_NAME_CHARS: usize = 50;
const FORBIDDEN_TAG_CHARS: &[char] = &['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Reject empty names, names over 50 characters, and path/glob-special characters
pub fn validate_tag_name(name: &str) -> StashResult<()> {
    if name.is_empty() {
        return Err(StashError::Validation("tag name cannot be empty".into()));
    }
    if name.chars().count() > MAX_TAG_NAME_CHARS {
        return Err(StashError::Validation(format!(
            "tag name cannot exceed {} characters",
            MAX_TAG_NAME_CHARS
        )));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_TAG_CHARS.contains(c)) {
        return Err(StashError::Validation(format!(
            "tag name cannot contain '{}'",
            c
        )));
    }
    Ok(())
}

/// Resolve tags for a batch of items in one query per chunk
pub(crate) fn load_tags_for_items(conn: &Connection, items: &mut [ClipboardItem]) -> StashResult<()> {
    if items.is_empty() {
        return Ok(());
    }

    let mut by_item: HashMap<String, Vec<Tag>> = HashMap::new();
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    for chunk in ids.chunks(500) {
        let sql = format!(
            "SELECT it.itemId, {} FROM item_tags it JOIN tags t ON t.id = it.tagId
             WHERE it.itemId IN ({}) ORDER BY t.name ASC",
            TAG_COLUMNS,
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
            Ok((row.get::<_, String>(0)?, tag_from_row_at(row, 1)?))
        })?;
        for row in rows {
            let (item_id, tag) = row?;
            by_item.entry(item_id).or_default().push(tag);
        }
    }

    for item in items.iter_mut() {
        item.tags = by_item.remove(&item.id).unwrap_or_default();
    }
    Ok(())
}

fn tags_for_item_on(conn: &Connection, item_id: &str) -> StashResult<Vec<Tag>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tags t JOIN item_tags it ON it.tagId = t.id
         WHERE it.itemId = ?1 ORDER BY t.name ASC",
        TAG_COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![item_id], tag_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn find_tag(conn: &Connection, column: &str, key: &str) -> StashResult<Option<Tag>> {
    let tag = conn
        .query_row(
            &format!("SELECT {} FROM tags t WHERE t.{} = ?1", TAG_COLUMNS, column),
            params![key],
            tag_from_row,
        )
        .optional()?;
    Ok(tag)
}

fn item_exists(conn: &Connection, item_id: &str) -> StashResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM items WHERE id = ?1)",
        params![item_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn tag_exists(conn: &Connection, tag_id: &str) -> StashResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tags WHERE id = ?1)",
        params![tag_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Tag store backed by the shared SQLite database
pub struct SqliteTagStore {
    db: Arc<Database>,
}

impl SqliteTagStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl TagStore for SqliteTagStore {
    // ─────────────────────────────────────────────────────────────────────────────
    // Tag Groups
    // ─────────────────────────────────────────────────────────────────────────────

    fn create_tag_group(&self, group: &TagGroup) -> StashResult<()> {
        if group.name.trim().is_empty() {
            return Err(StashError::Validation("tag group name cannot be empty".into()));
        }
        let conn = self.db.get_conn()?;
        let result = conn.execute(
            "INSERT INTO tag_groups (id, name, description, color, sortOrder, isSystem, createdAt, updatedAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                group.id,
                group.name,
                group.description,
                group.color,
                group.sort_order,
                group.is_system,
                format_timestamp(&group.created_at),
                format_timestamp(&group.updated_at),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StashError::Conflict(format!(
                "tag group '{}' already exists",
                group.name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn get_tag_group(&self, id: &str) -> StashResult<TagGroup> {
        let conn = self.db.get_conn()?;
        conn.query_row(
            &format!("SELECT {} FROM tag_groups WHERE id = ?1", GROUP_COLUMNS),
            params![id],
            group_from_row,
        )
        .optional()?
        .ok_or_else(|| StashError::not_found("tag group", id))
    }

    fn list_tag_groups(&self) -> StashResult<Vec<TagGroup>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tag_groups ORDER BY sortOrder ASC, name ASC",
            GROUP_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], group_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn update_tag_group(&self, group: &TagGroup) -> StashResult<()> {
        if group.name.trim().is_empty() {
            return Err(StashError::Validation("tag group name cannot be empty".into()));
        }
        let conn = self.db.get_conn()?;
        let result = conn.execute(
            "UPDATE tag_groups SET name = ?2, description = ?3, color = ?4, sortOrder = ?5, updatedAt = ?6
             WHERE id = ?1",
            params![
                group.id,
                group.name,
                group.description,
                group.color,
                group.sort_order,
                format_timestamp(&Utc::now()),
            ],
        );
        match result {
            Ok(0) => Err(StashError::not_found("tag group", &group.id)),
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StashError::Conflict(format!(
                "tag group '{}' already exists",
                group.name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_tag_group(&self, id: &str) -> StashResult<()> {
        let conn = self.db.get_conn()?;
        let tx = write_transaction(&conn)?;
        let ungrouped = tx.execute(
            "UPDATE tags SET groupId = NULL, updatedAt = ?2 WHERE groupId = ?1",
            params![id, format_timestamp(&Utc::now())],
        )?;
        let deleted = tx.execute("DELETE FROM tag_groups WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StashError::not_found("tag group", id));
        }
        tx.commit()?;
        debug!(group_id = %id, ungrouped, "Deleted tag group");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Tags
    // ─────────────────────────────────────────────────────────────────────────────

    fn create_tag(&self, tag: &Tag) -> StashResult<()> {
        validate_tag_name(&tag.name)?;
        let conn = self.db.get_conn()?;
        let result = conn.execute(
            "INSERT INTO tags (id, name, description, color, groupId, useCount, createdAt, updatedAt, lastUsedAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                tag.id,
                tag.name,
                tag.description,
                tag.color,
                tag.group_id,
                tag.use_count,
                format_timestamp(&tag.created_at),
                format_timestamp(&tag.updated_at),
                tag.last_used_at.as_ref().map(format_timestamp),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StashError::Conflict(format!(
                "tag '{}' already exists",
                tag.name
            ))),
            Err(e) if is_foreign_key_violation(&e) => Err(StashError::not_found(
                "tag group",
                tag.group_id.clone().unwrap_or_default(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn get_tag_by_id(&self, id: &str) -> StashResult<Tag> {
        let conn = self.db.get_conn()?;
        find_tag(&conn, "id", id)?.ok_or_else(|| StashError::not_found("tag", id))
    }

    fn get_tag_by_name(&self, name: &str) -> StashResult<Tag> {
        let conn = self.db.get_conn()?;
        find_tag(&conn, "name", name)?.ok_or_else(|| StashError::not_found("tag", name))
    }

    fn list_tags(&self) -> StashResult<Vec<Tag>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM tags t ORDER BY t.name ASC", TAG_COLUMNS))?;
        let rows = stmt
            .query_map([], tag_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn list_tags_by_group(&self, group_id: Option<&str>) -> StashResult<Vec<Tag>> {
        let filter = match group_id {
            Some(group_id) => Filter::new().and(TagPredicate::Group(group_id.to_string())),
            None => Filter::new().and(TagPredicate::Ungrouped),
        };
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tags t {} ORDER BY t.name ASC",
            TAG_COLUMNS,
            filter.where_sql()
        ))?;
        let rows = stmt
            .query_map(params_from_iter(filter.params().iter()), tag_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn update_tag(&self, tag: &Tag) -> StashResult<()> {
        validate_tag_name(&tag.name)?;
        let conn = self.db.get_conn()?;
        let result = conn.execute(
            "UPDATE tags SET name = ?2, description = ?3, color = ?4, groupId = ?5, updatedAt = ?6
             WHERE id = ?1",
            params![
                tag.id,
                tag.name,
                tag.description,
                tag.color,
                tag.group_id,
                format_timestamp(&Utc::now()),
            ],
        );
        match result {
            Ok(0) => Err(StashError::not_found("tag", &tag.id)),
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StashError::Conflict(format!(
                "tag '{}' already exists",
                tag.name
            ))),
            Err(e) if is_foreign_key_violation(&e) => Err(StashError::not_found(
                "tag group",
                tag.group_id.clone().unwrap_or_default(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_tag(&self, id: &str) -> StashResult<()> {
        let conn = self.db.get_conn()?;
        // Associations go with it through ON DELETE CASCADE
        let deleted = conn.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StashError::not_found("tag", id));
        }
        Ok(())
    }

    fn get_or_create_tag(&self, name: &str, source: Option<&str>) -> StashResult<Tag> {
        validate_tag_name(name)?;
        let conn = self.db.get_conn()?;

        if let Some(tag) = find_tag(&conn, "name", name)? {
            return Ok(tag);
        }

        // A concurrent creator may win between the lookup and the insert; the
        // conflict-tolerant insert then leaves their row in place and we read it back.
        let now = format_timestamp(&Utc::now());
        let group_id = source.unwrap_or(USER_CUSTOM_GROUP_ID);
        let inserted = conn.execute(
            "INSERT INTO tags (id, name, description, color, groupId, useCount, createdAt, updatedAt, lastUsedAt)
             VALUES (?1, ?2, '', ?3, (SELECT id FROM tag_groups WHERE id = ?4), 0, ?5, ?5, NULL)
             ON CONFLICT(name) DO NOTHING",
            params![uuid::Uuid::new_v4().to_string(), name, DEFAULT_TAG_COLOR, group_id, now],
        )?;
        if inserted > 0 {
            info!(tag = %name, group = %group_id, "Created tag");
        }

        find_tag(&conn, "name", name)?.ok_or_else(|| StashError::not_found("tag", name))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Associations
    // ─────────────────────────────────────────────────────────────────────────────

    fn add_tag_to_item(&self, item_id: &str, tag_id: &str) -> StashResult<()> {
        let conn = self.db.get_conn()?;
        let result = conn.execute(
            "INSERT OR IGNORE INTO item_tags (itemId, tagId, createdAt) VALUES (?1, ?2, ?3)",
            params![item_id, tag_id, format_timestamp(&Utc::now())],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_foreign_key_violation(&e) => {
                if item_exists(&conn, item_id)? {
                    Err(StashError::not_found("tag", tag_id))
                } else {
                    Err(StashError::not_found("item", item_id))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn remove_tag_from_item(&self, item_id: &str, tag_id: &str) -> StashResult<()> {
        let conn = self.db.get_conn()?;
        conn.execute(
            "DELETE FROM item_tags WHERE itemId = ?1 AND tagId = ?2",
            params![item_id, tag_id],
        )?;
        Ok(())
    }

    fn tags_for_item(&self, item_id: &str) -> StashResult<Vec<Tag>> {
        let conn = self.db.get_conn()?;
        tags_for_item_on(&conn, item_id)
    }

    fn items_for_tag(&self, tag_id: &str) -> StashResult<Vec<ClipboardItem>> {
        let conn = self.db.get_conn()?;
        let mut items = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM items i JOIN item_tags it ON it.itemId = i.id
                 WHERE it.tagId = ?1 AND i.isDeleted = 0
                 ORDER BY i.createdAt DESC, i.rowid DESC",
                ITEM_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![tag_id], item_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        load_tags_for_items(&conn, &mut items)?;
        Ok(items)
    }

    fn batch_update_item_tags(&self, item_id: &str, tag_ids: &[String]) -> StashResult<()> {
        let conn = self.db.get_conn()?;
        let tx = write_transaction(&conn)?;

        if !item_exists(&tx, item_id)? {
            return Err(StashError::not_found("item", item_id));
        }

        tx.execute("DELETE FROM item_tags WHERE itemId = ?1", params![item_id])?;

        let now = format_timestamp(&Utc::now());
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO item_tags (itemId, tagId, createdAt) VALUES (?1, ?2, ?3)",
            )?;
            for tag_id in tag_ids {
                match stmt.execute(params![item_id, tag_id, now]) {
                    Ok(_) => {}
                    Err(e) if is_foreign_key_violation(&e) => {
                        return Err(StashError::not_found("tag", tag_id));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        tx.commit()?;
        debug!(item_id = %item_id, count = tag_ids.len(), "Replaced item tags");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Usage and Search
    // ─────────────────────────────────────────────────────────────────────────────

    fn increment_tag_usage(&self, tag_id: &str) -> StashResult<()> {
        let conn = self.db.get_conn()?;
        let now = format_timestamp(&Utc::now());
        let updated = conn.execute(
            "UPDATE tags SET useCount = useCount + 1, lastUsedAt = ?2, updatedAt = ?2 WHERE id = ?1",
            params![tag_id, now],
        )?;
        if updated == 0 {
            return Err(StashError::not_found("tag", tag_id));
        }
        Ok(())
    }

    fn search_tags(&self, query: &TagSearchQuery) -> StashResult<Vec<TagWithStats>> {
        let conn = self.db.get_conn()?;
        search::search_tags(&conn, query)
    }

    fn most_used_tags(&self, limit: usize) -> StashResult<Vec<TagWithStats>> {
        self.search_tags(&TagSearchQuery {
            sort_by: Some(TagSortField::UseCount),
            limit,
            ..Default::default()
        })
    }

    fn recent_tags(&self, limit: usize) -> StashResult<Vec<TagWithStats>> {
        self.search_tags(&TagSearchQuery {
            sort_by: Some(TagSortField::LastUsedAt),
            used_only: true,
            limit,
            ..Default::default()
        })
    }

    fn unused_tags(&self) -> StashResult<Vec<Tag>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tags t
             WHERE NOT EXISTS (SELECT 1 FROM item_tags it WHERE it.tagId = t.id)
             ORDER BY t.name ASC",
            TAG_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], tag_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn count_tags(&self) -> StashResult<u64> {
        let conn = self.db.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────────

    fn cleanup_unused_tags(&self) -> StashResult<usize> {
        let conn = self.db.get_conn()?;
        let removed = conn.execute(
            "DELETE FROM tags WHERE NOT EXISTS (SELECT 1 FROM item_tags it WHERE it.tagId = tags.id)",
            [],
        )?;
        info!(removed, "Cleaned up unused tags");
        Ok(removed)
    }

    fn merge_tags(&self, source_id: &str, target_id: &str) -> StashResult<()> {
        if source_id == target_id {
            return Err(StashError::Validation("cannot merge a tag into itself".into()));
        }

        let conn = self.db.get_conn()?;
        let tx = write_transaction(&conn)?;

        if !tag_exists(&tx, source_id)? {
            return Err(StashError::not_found("tag", source_id));
        }
        if !tag_exists(&tx, target_id)? {
            return Err(StashError::not_found("tag", target_id));
        }

        // Items that already carry the target keep their single association;
        // their source rows are left behind and removed below.
        let moved = tx.execute(
            "UPDATE OR IGNORE item_tags SET tagId = ?2 WHERE tagId = ?1",
            params![source_id, target_id],
        )?;
        tx.execute("DELETE FROM item_tags WHERE tagId = ?1", params![source_id])?;
        tx.execute("DELETE FROM tags WHERE id = ?1", params![source_id])?;
        tx.execute(
            "UPDATE tags SET updatedAt = ?2 WHERE id = ?1",
            params![target_id, format_timestamp(&Utc::now())],
        )?;

        tx.commit()?;
        info!(source = %source_id, target = %target_id, moved, "Merged tags");
        Ok(())
    }
}
