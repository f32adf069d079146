//! Filtered, paginated search over items and tags

use rusqlite::{params_from_iter, Connection};

use crate::database::{item_from_row, tag_from_row, ITEM_COLUMNS, TAG_COLUMNS};
use crate::filter::{Filter, ItemPredicate, QueryParam, TagPredicate};
use crate::interface::{
    SearchQuery, SearchResult, SortOrder, StashResult, TagMode, TagSearchQuery, TagSortField,
};
use crate::items::sql_limit;
use crate::models::{ClipboardItem, TagWithStats};
use crate::tags::load_tags_for_items;

/// Page size used when a query does not set one
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Build the item filter for a search request. Only active items are searched.
pub fn item_filter(query: &SearchQuery) -> Filter {
    let mut filter = Filter::new()
        .and(ItemPredicate::Active)
        .and(ItemPredicate::Text(query.query.trim().to_string()));

    if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
        filter = filter.and(ItemPredicate::Category(category.to_string()));
    }

    let names: Vec<String> = query
        .tags
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();
    filter.and(ItemPredicate::Tags {
        names,
        mode: query.tag_mode.unwrap_or(TagMode::Any),
    })
}

/// `(page, total_pages)` for an offset/limit window. `limit` must be non-zero.
pub fn page_info(total: u64, limit: u64, offset: u64) -> (u64, u64) {
    let page = offset / limit + 1;
    let total_pages = total.div_ceil(limit);
    (page, total_pages)
}

/// Run an item search. Total and page are read in one transaction.
pub(crate) fn search_items(conn: &Connection, query: &SearchQuery) -> StashResult<SearchResult> {
    let limit = sql_limit(if query.limit == 0 { DEFAULT_PAGE_SIZE } else { query.limit });
    let offset = sql_limit(query.offset);
    let filter = item_filter(query);
    let where_sql = filter.where_sql();

    let tx = conn.unchecked_transaction()?;

    let total: i64 = tx.query_row(
        &format!("SELECT COUNT(*) FROM items i {}", where_sql),
        params_from_iter(filter.params()),
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {} FROM items i {} ORDER BY i.createdAt DESC, i.rowid DESC LIMIT ? OFFSET ?",
        ITEM_COLUMNS, where_sql
    );
    let mut items: Vec<ClipboardItem> = {
        let mut stmt = tx.prepare(&sql)?;
        let params = filter.params_with([
            QueryParam::Int(limit),
            QueryParam::Int(offset),
        ]);
        let rows = stmt
            .query_map(params_from_iter(params.iter()), item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };
    load_tags_for_items(&tx, &mut items)?;
    tx.commit()?;

    let total = total.max(0) as u64;
    let (page, total_pages) = page_info(total, limit as u64, offset as u64);
    Ok(SearchResult {
        items,
        total,
        page,
        page_size: limit as u64,
        total_pages,
    })
}

fn tag_order_clause(query: &TagSearchQuery) -> String {
    let Some(field) = query.sort_by else {
        return "t.useCount DESC, t.name ASC".to_string();
    };

    let column = match field {
        TagSortField::Name => "t.name",
        TagSortField::UseCount => "t.useCount",
        TagSortField::CreatedAt => "t.createdAt",
        TagSortField::LastUsedAt => "t.lastUsedAt",
    };
    let default_order = if field == TagSortField::Name { SortOrder::Asc } else { SortOrder::Desc };
    let direction = match query.sort_order.unwrap_or(default_order) {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };

    if field == TagSortField::Name {
        format!("{} {}", column, direction)
    } else {
        format!("{} {}, t.name ASC", column, direction)
    }
}

/// Run a tag search. `item_count` counts active items only.
pub(crate) fn search_tags(conn: &Connection, query: &TagSearchQuery) -> StashResult<Vec<TagWithStats>> {
    let mut filter = Filter::new().and(TagPredicate::Text(query.query.trim().to_string()));
    if let Some(group_id) = query.group_id.as_deref().filter(|g| !g.is_empty()) {
        filter = filter.and(TagPredicate::Group(group_id.to_string()));
    }
    if query.used_only {
        filter = filter.and(TagPredicate::Used);
    }

    let sql = format!(
        "SELECT {}, COUNT(DISTINCT i.id) AS itemCount
         FROM tags t
         LEFT JOIN item_tags it ON it.tagId = t.id
         LEFT JOIN items i ON i.id = it.itemId AND i.isDeleted = 0
         {}
         GROUP BY t.id
         ORDER BY {}
         LIMIT ? OFFSET ?",
        TAG_COLUMNS,
        filter.where_sql(),
        tag_order_clause(query)
    );

    // SQLite treats a negative LIMIT as unbounded
    let limit = if query.limit == 0 { -1 } else { sql_limit(query.limit) };
    let params = filter.params_with([QueryParam::Int(limit), QueryParam::Int(sql_limit(query.offset))]);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            Ok(TagWithStats {
                tag: tag_from_row(row)?,
                item_count: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_info() {
        assert_eq!(page_info(25, 10, 20), (3, 3));
        assert_eq!(page_info(25, 10, 0), (1, 3));
        assert_eq!(page_info(20, 10, 10), (2, 2));
        assert_eq!(page_info(0, 10, 0), (1, 0));
        assert_eq!(page_info(1, 20, 0), (1, 1));
    }

    #[test]
    fn test_item_filter_defaults_to_any_mode() {
        let query = SearchQuery {
            tags: vec!["x".into(), "y".into()],
            ..Default::default()
        };
        let sql = item_filter(&query).where_sql();
        assert!(sql.contains("IN (?, ?)"));
        assert!(!sql.contains("NOT EXISTS"));
    }

    #[test]
    fn test_item_filter_ignores_blank_inputs() {
        let query = SearchQuery {
            query: "   ".into(),
            category: Some(String::new()),
            tags: vec![" ".into()],
            ..Default::default()
        };
        assert_eq!(item_filter(&query).where_sql(), "WHERE i.isDeleted = 0");
    }

    #[test]
    fn test_tag_order_defaults() {
        assert_eq!(tag_order_clause(&TagSearchQuery::default()), "t.useCount DESC, t.name ASC");

        let by_name = TagSearchQuery { sort_by: Some(TagSortField::Name), ..Default::default() };
        assert_eq!(tag_order_clause(&by_name), "t.name ASC");

        let by_created_asc = TagSearchQuery {
            sort_by: Some(TagSortField::CreatedAt),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        };
        assert_eq!(tag_order_clause(&by_created_asc), "t.createdAt ASC, t.name ASC");
    }
}
