//! Read-only rollups over the item and tag stores

use chrono::{DateTime, Duration, Local, TimeZone, Utc};

use crate::interface::{ItemStore, StashResult, Statistics, TagStatistics, TagStore};

pub const DEFAULT_RECENT_ITEMS: usize = 5;
pub const DEFAULT_TOP_TAGS: usize = 10;

pub struct StatisticsAggregator<'a> {
    items: &'a dyn ItemStore,
    tags: &'a dyn TagStore,
}

impl<'a> StatisticsAggregator<'a> {
    pub fn new(items: &'a dyn ItemStore, tags: &'a dyn TagStore) -> Self {
        Self { items, tags }
    }

    /// Item totals and tag rollups. `recent_items` newest first.
    pub fn collect(&self, recent_items: usize, top_tags: usize) -> StashResult<Statistics> {
        let now = Utc::now();
        Ok(Statistics {
            total_items: self.items.count_active(None)?,
            today_items: self.items.count_active(Some(start_of_today()))?,
            week_items: self.items.count_active(Some(now - Duration::days(7)))?,
            month_items: self.items.count_active(Some(now - Duration::days(30)))?,
            category_stats: self.items.category_histogram()?,
            top_tags: self.tags.most_used_tags(top_tags)?,
            recent_tags: self.tags.recent_tags(top_tags)?,
            recent_items: self.items.list(recent_items, 0)?,
        })
    }

    pub fn tag_statistics(&self) -> StashResult<TagStatistics> {
        Ok(TagStatistics {
            total_tags: self.tags.count_tags()?,
            most_used_tags: self.tags.most_used_tags(DEFAULT_TOP_TAGS)?,
            recent_tags: self.tags.recent_tags(DEFAULT_TOP_TAGS)?,
            tag_groups: self.tags.list_tag_groups()?,
            unused_tags: self.tags.unused_tags()?,
        })
    }
}

/// Local midnight, as UTC
fn start_of_today() -> DateTime<Utc> {
    let midnight = Local::now().date_naive().and_time(chrono::NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Midnight skipped by a DST jump
        None => Utc.from_utc_datetime(&midnight),
    }
}
