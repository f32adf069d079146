//! Typed WHERE-clause builder for item and tag queries.
//!
//! Each predicate renders to an SQL fragment with positional `?` placeholders
//! plus the parameters in placeholder order. Fragments are combined with AND.
//! Items are aliased `i`, tags `t`.

use chrono::{DateTime, Utc};
use rusqlite::types::ToSqlOutput;
use rusqlite::ToSql;

use crate::database::format_timestamp;
use crate::interface::TagMode;

/// Type-safe parameter binding for SQL queries
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Text(String),
    Int(i64),
}

impl ToSql for QueryParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            QueryParam::Text(s) => s.to_sql(),
            QueryParam::Int(i) => i.to_sql(),
        }
    }
}

/// A filter clause that renders to SQL. `None` means "no constraint".
pub trait Predicate {
    fn render(&self) -> Option<(String, Vec<QueryParam>)>;
}

/// Item filters
#[derive(Debug, Clone, PartialEq)]
pub enum ItemPredicate {
    Active,
    Trashed,
    /// Substring of content or title
    Text(String),
    Category(String),
    Tags { names: Vec<String>, mode: TagMode },
    CreatedSince(DateTime<Utc>),
}

impl Predicate for ItemPredicate {
    fn render(&self) -> Option<(String, Vec<QueryParam>)> {
        match self {
            ItemPredicate::Active => Some(("i.isDeleted = 0".to_string(), vec![])),
            ItemPredicate::Trashed => Some(("i.isDeleted = 1".to_string(), vec![])),
            ItemPredicate::Text(text) => {
                if text.is_empty() {
                    return None;
                }
                let pattern = like_pattern(text);
                Some((
                    "(i.content LIKE ? ESCAPE '\\' OR i.title LIKE ? ESCAPE '\\')".to_string(),
                    vec![QueryParam::Text(pattern.clone()), QueryParam::Text(pattern)],
                ))
            }
            ItemPredicate::Category(category) => {
                Some(("i.category = ?".to_string(), vec![QueryParam::Text(category.clone())]))
            }
            ItemPredicate::Tags { names, mode } => render_tag_filter(names, *mode),
            ItemPredicate::CreatedSince(since) => Some((
                "i.createdAt >= ?".to_string(),
                vec![QueryParam::Text(format_timestamp(since))],
            )),
        }
    }
}

const ITEM_HAS_TAG: &str =
    "SELECT 1 FROM item_tags it JOIN tags tt ON tt.id = it.tagId WHERE it.itemId = i.id";

fn render_tag_filter(names: &[String], mode: TagMode) -> Option<(String, Vec<QueryParam>)> {
    if names.is_empty() {
        return None;
    }

    match mode {
        // One EXISTS per tag so every tag must be present
        TagMode::All => {
            let clauses: Vec<String> = names
                .iter()
                .map(|_| format!("EXISTS ({} AND tt.name = ?)", ITEM_HAS_TAG))
                .collect();
            let params = names.iter().map(|n| QueryParam::Text(n.clone())).collect();
            Some((clauses.join(" AND "), params))
        }
        TagMode::Any | TagMode::None => {
            let negate = if mode == TagMode::None { "NOT " } else { "" };
            let sql = format!(
                "{}EXISTS ({} AND tt.name IN ({}))",
                negate,
                ITEM_HAS_TAG,
                placeholders(names.len())
            );
            let params = names.iter().map(|n| QueryParam::Text(n.clone())).collect();
            Some((sql, params))
        }
    }
}

/// Tag filters
#[derive(Debug, Clone, PartialEq)]
pub enum TagPredicate {
    /// Substring of name or description
    Text(String),
    Group(String),
    Ungrouped,
    /// Attached at least once
    Used,
}

impl Predicate for TagPredicate {
    fn render(&self) -> Option<(String, Vec<QueryParam>)> {
        match self {
            TagPredicate::Text(text) => {
                if text.is_empty() {
                    return None;
                }
                let pattern = like_pattern(text);
                Some((
                    "(t.name LIKE ? ESCAPE '\\' OR t.description LIKE ? ESCAPE '\\')".to_string(),
                    vec![QueryParam::Text(pattern.clone()), QueryParam::Text(pattern)],
                ))
            }
            TagPredicate::Group(id) => {
                Some(("t.groupId = ?".to_string(), vec![QueryParam::Text(id.clone())]))
            }
            TagPredicate::Ungrouped => Some(("t.groupId IS NULL".to_string(), vec![])),
            TagPredicate::Used => Some(("t.lastUsedAt IS NOT NULL".to_string(), vec![])),
        }
    }
}

/// Conjunction of rendered predicates
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<String>,
    params: Vec<QueryParam>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate. Predicates that render to nothing are skipped.
    pub fn and(mut self, predicate: impl Predicate) -> Self {
        if let Some((sql, params)) = predicate.render() {
            self.clauses.push(sql);
            self.params.extend(params);
        }
        self
    }

    /// `WHERE ...` or an empty string
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }

    /// Parameters followed by trailing values such as LIMIT/OFFSET
    pub fn params_with(&self, extra: impl IntoIterator<Item = QueryParam>) -> Vec<QueryParam> {
        let mut params = self.params.clone();
        params.extend(extra);
        params
    }
}

/// `?, ?, ?` for an IN list
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Wrap text in `%` for LIKE, escaping the wildcard characters
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
