//! Time-bucketed counts by category and level, on their own fetch cycle.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::model::{CategoryCount, ChartAggregate, ChartPeriod, LogEntry, LogLevel, TimeBucket};
use crate::sources::StoreResult;

/// Category used for entries that carry none
pub const UNCATEGORIZED: &str = "uncategorized";

/// Level selection for the charts, expressed as exclusions.
///
/// With nothing excluded every level is shown. Clicking a level then isolates
/// it by excluding all the others; from there each click toggles that level's
/// exclusion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelExclusion {
    excluded: BTreeSet<LogLevel>,
}

impl LevelExclusion {
    pub fn toggle(&mut self, level: LogLevel) {
        if self.excluded.is_empty() {
            self.excluded = LogLevel::ALL.into_iter().filter(|l| *l != level).collect();
        } else if !self.excluded.remove(&level) {
            self.excluded.insert(level);
        }
        // Excluding everything would chart nothing; fall back to all levels
        if self.excluded.len() == LogLevel::ALL.len() {
            self.excluded.clear();
        }
    }

    pub fn is_included(&self, level: LogLevel) -> bool {
        !self.excluded.contains(&level)
    }

    /// Levels to request, or `None` for "all"
    pub fn included(&self) -> Option<Vec<LogLevel>> {
        if self.excluded.is_empty() {
            None
        } else {
            Some(
                LogLevel::ALL
                    .into_iter()
                    .filter(|l| self.is_included(*l))
                    .collect(),
            )
        }
    }
}

/// Derive a [`ChartAggregate`] from raw entries. Entries outside
/// `(now - period, now]` or with unparseable timestamps are skipped.
pub fn aggregate_entries(
    entries: &[LogEntry],
    period: ChartPeriod,
    levels: Option<&[LogLevel]>,
    now: DateTime<Utc>,
) -> ChartAggregate {
    let span = TimeDelta::from_std(period.span()).unwrap_or(TimeDelta::hours(1));
    let width = period.bucket_width();
    let start = now - span;
    let bucket_count = (span.num_seconds() / width.num_seconds().max(1)).max(1) as usize;

    let mut buckets: Vec<BTreeMap<String, u64>> = vec![BTreeMap::new(); bucket_count];
    let mut by_level: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_category: BTreeMap<String, u64> = BTreeMap::new();

    for entry in entries {
        if levels.is_some_and(|allowed| !allowed.contains(&entry.level)) {
            continue;
        }
        let Some(ts) = entry.parsed_timestamp() else {
            continue;
        };
        if ts <= start || ts > now {
            continue;
        }
        let offset = (ts - start).num_seconds() / width.num_seconds().max(1);
        let idx = (offset.max(0) as usize).min(bucket_count - 1);
        let category = entry
            .category
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());

        *buckets[idx].entry(category.clone()).or_default() += 1;
        *by_level.entry(entry.level.as_str().to_string()).or_default() += 1;
        *by_category.entry(category).or_default() += 1;
    }

    let time_series = buckets
        .into_iter()
        .enumerate()
        .map(|(i, counts)| TimeBucket {
            bucket: (start + width * i as i32).to_rfc3339(),
            counts,
        })
        .collect();

    let mut by_category: Vec<CategoryCount> = by_category
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect();
    by_category.sort_by(|a, b| b.count.cmp(&a.count).then(a.category.cmp(&b.category)));

    ChartAggregate {
        time_series,
        by_level,
        by_category,
    }
}

/// A chart request issued by the session
#[derive(Clone, Debug, PartialEq)]
pub struct ChartRequest {
    pub generation: u64,
    pub period: ChartPeriod,
    pub levels: Option<Vec<LogLevel>>,
}

/// Result of a chart request, tagged with the generation that asked for it
#[derive(Debug)]
pub struct ChartOutcome {
    pub generation: u64,
    pub result: StoreResult<ChartAggregate>,
}

/// Chart view state: period, level exclusion, hidden categories, latest data
#[derive(Debug, Default)]
pub struct ChartSession {
    period: ChartPeriod,
    levels: LevelExclusion,
    hidden: BTreeSet<String>,
    selected_category: usize,
    generation: u64,
    data: Option<ChartAggregate>,
    loading: bool,
    error: Option<String>,
}

impl ChartSession {
    pub fn new(period: ChartPeriod) -> Self {
        Self {
            period,
            ..Self::default()
        }
    }

    pub fn period(&self) -> ChartPeriod {
        self.period
    }

    pub fn levels(&self) -> &LevelExclusion {
        &self.levels
    }

    pub fn data(&self) -> Option<&ChartAggregate> {
        self.data.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Issue a fetch for the current period and levels; older ones become stale
    pub fn request(&mut self) -> ChartRequest {
        self.generation += 1;
        self.loading = true;
        ChartRequest {
            generation: self.generation,
            period: self.period,
            levels: self.levels.included(),
        }
    }

    pub fn set_period(&mut self, period: ChartPeriod) -> Option<ChartRequest> {
        if period == self.period {
            return None;
        }
        self.period = period;
        Some(self.request())
    }

    pub fn cycle_period(&mut self) -> Option<ChartRequest> {
        self.set_period(self.period.next())
    }

    pub fn toggle_level(&mut self, level: LogLevel) -> ChartRequest {
        self.levels.toggle(level);
        self.request()
    }

    /// Legend toggle; purely local, no re-fetch
    pub fn toggle_category(&mut self, category: &str) {
        if !self.hidden.remove(category) {
            self.hidden.insert(category.to_string());
        }
    }

    pub fn is_category_visible(&self, category: &str) -> bool {
        !self.hidden.contains(category)
    }

    pub fn select_next_category(&mut self) {
        let n = self.categories().len();
        if n > 0 {
            self.selected_category = (self.selected_category + 1) % n;
        }
    }

    pub fn select_previous_category(&mut self) {
        let n = self.categories().len();
        if n > 0 {
            self.selected_category = (self.selected_category + n - 1) % n;
        }
    }

    pub fn selected_category(&self) -> Option<&str> {
        self.categories().get(self.selected_category).copied()
    }

    pub fn toggle_selected_category(&mut self) {
        if let Some(category) = self.selected_category().map(str::to_string) {
            self.toggle_category(&category);
        }
    }

    /// Apply a finished fetch. Stale generations are dropped; a missing
    /// endpoint reads as "no data".
    pub fn complete(&mut self, outcome: ChartOutcome) {
        if outcome.generation != self.generation {
            debug!(
                generation = outcome.generation,
                current = self.generation,
                "discarding stale chart data"
            );
            return;
        }
        self.loading = false;
        match outcome.result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
            }
            Err(e) if e.is_not_found() => {
                debug!("chart endpoint not available, showing no data");
                self.data = Some(ChartAggregate::default());
                self.error = None;
            }
            Err(e) => {
                warn!(error = %e, "chart fetch failed");
                self.error = Some(format!("Failed to load chart data: {}", e));
            }
        }
        let n = self.categories().len();
        if self.selected_category >= n {
            self.selected_category = n.saturating_sub(1);
        }
    }

    /// Categories in legend order (largest first)
    pub fn categories(&self) -> Vec<&str> {
        self.data
            .as_ref()
            .map(|d| d.by_category.iter().map(|c| c.category.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn visible_categories(&self) -> Vec<&str> {
        self.categories()
            .into_iter()
            .filter(|c| self.is_category_visible(c))
            .collect()
    }

    /// True when there is nothing to draw for the period
    pub fn is_empty(&self) -> bool {
        self.data.as_ref().is_none_or(ChartAggregate::is_empty)
    }

    /// Y-axis maximum over every visible series, never below 1
    pub fn y_max(&self) -> u64 {
        let Some(data) = &self.data else {
            return 1;
        };
        let visible = self.visible_categories();
        data.time_series
            .iter()
            .flat_map(|bucket| visible.iter().map(move |c| bucket.count(c)))
            .max()
            .unwrap_or(0)
            .max(1)
    }

    /// Points of one category's time series, x = bucket index
    pub fn series_points(&self, category: &str) -> Vec<(f64, f64)> {
        self.data
            .as_ref()
            .map(|d| {
                d.time_series
                    .iter()
                    .enumerate()
                    .map(|(i, b)| (i as f64, b.count(category) as f64))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Per-level bars for the included levels, in severity order
    pub fn level_bars(&self) -> Vec<(LogLevel, u64)> {
        let Some(data) = &self.data else {
            return Vec::new();
        };
        LogLevel::ALL
            .into_iter()
            .filter(|l| self.levels.is_included(*l))
            .map(|l| (l, data.level_count(l)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::StoreError;
    use chrono::TimeZone;

    fn entry(minutes_ago: i64, level: LogLevel, category: Option<&str>, now: DateTime<Utc>) -> LogEntry {
        LogEntry {
            id: None,
            timestamp: (now - TimeDelta::minutes(minutes_ago)).to_rfc3339(),
            level,
            category: category.map(str::to_string),
            function: None,
            message: "m".to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_exclusion_first_click_isolates() {
        let mut levels = LevelExclusion::default();
        assert_eq!(levels.included(), None);

        levels.toggle(LogLevel::Error);
        assert_eq!(levels.included(), Some(vec![LogLevel::Error]));
        assert!(levels.is_included(LogLevel::Error));
        assert!(!levels.is_included(LogLevel::Info));
    }

    #[test]
    fn test_exclusion_subsequent_clicks_toggle() {
        let mut levels = LevelExclusion::default();
        levels.toggle(LogLevel::Error);
        levels.toggle(LogLevel::Warning);
        assert_eq!(levels.included(), Some(vec![LogLevel::Warning, LogLevel::Error]));

        levels.toggle(LogLevel::Error);
        assert_eq!(levels.included(), Some(vec![LogLevel::Warning]));
    }

    #[test]
    fn test_exclusion_never_excludes_everything() {
        let mut levels = LevelExclusion::default();
        levels.toggle(LogLevel::Info);
        levels.toggle(LogLevel::Info);
        assert_eq!(levels.included(), None);
    }

    #[test]
    fn test_exclusion_including_all_back_returns_to_all() {
        let mut levels = LevelExclusion::default();
        levels.toggle(LogLevel::Debug);
        for level in [LogLevel::Info, LogLevel::Warning, LogLevel::Error, LogLevel::Critical] {
            levels.toggle(level);
        }
        assert_eq!(levels.included(), None);
    }

    #[test]
    fn test_aggregate_sums_are_consistent() {
        let now = now();
        let entries = vec![
            entry(1, LogLevel::Error, Some("db"), now),
            entry(2, LogLevel::Error, Some("db"), now),
            entry(20, LogLevel::Info, Some("http"), now),
            entry(40, LogLevel::Warning, None, now),
            entry(59, LogLevel::Debug, Some("db"), now),
            entry(90, LogLevel::Error, Some("db"), now), // outside 1h
        ];
        let agg = aggregate_entries(&entries, ChartPeriod::Hour, None, now);

        assert_eq!(agg.time_series.len(), 12);
        assert_eq!(agg.total(), 5);
        for cat in &agg.by_category {
            let series_sum: u64 = agg.time_series.iter().map(|b| b.count(&cat.category)).sum();
            assert_eq!(series_sum, cat.count);
        }
        assert_eq!(agg.by_category[0].category, "db");
        assert_eq!(agg.by_category[0].count, 3);
        assert!(agg.by_category.iter().any(|c| c.category == UNCATEGORIZED));
    }

    #[test]
    fn test_aggregate_respects_level_filter() {
        let now = now();
        let entries = vec![
            entry(1, LogLevel::Error, Some("db"), now),
            entry(2, LogLevel::Info, Some("db"), now),
        ];
        let agg = aggregate_entries(&entries, ChartPeriod::Day, Some(&[LogLevel::Error]), now);
        assert_eq!(agg.total(), 1);
        assert_eq!(agg.level_count(LogLevel::Info), 0);
        assert_eq!(agg.time_series.len(), 24);
    }

    #[test]
    fn test_aggregate_empty_period() {
        let agg = aggregate_entries(&[], ChartPeriod::Week, None, now());
        assert!(agg.is_empty());
        assert_eq!(agg.time_series.len(), 28);
    }

    #[test]
    fn test_session_refetches_on_period_and_level_change() {
        let mut chart = ChartSession::new(ChartPeriod::Hour);
        let first = chart.request();
        assert_eq!(first.generation, 1);
        assert_eq!(chart.set_period(ChartPeriod::Hour), None);

        let second = chart.set_period(ChartPeriod::Day).unwrap();
        assert_eq!(second.period, ChartPeriod::Day);
        assert_eq!(second.generation, 2);

        let third = chart.toggle_level(LogLevel::Critical);
        assert_eq!(third.levels, Some(vec![LogLevel::Critical]));
    }

    #[test]
    fn test_session_discards_stale_result() {
        let now = now();
        let mut chart = ChartSession::new(ChartPeriod::Hour);
        let old = chart.request();
        let new = chart.request();

        let data = aggregate_entries(&[entry(1, LogLevel::Error, Some("db"), now)], ChartPeriod::Hour, None, now);
        chart.complete(ChartOutcome { generation: old.generation, result: Ok(data.clone()) });
        assert!(chart.data().is_none());
        assert!(chart.is_loading());

        chart.complete(ChartOutcome { generation: new.generation, result: Ok(data) });
        assert!(!chart.is_loading());
        assert!(!chart.is_empty());
    }

    #[test]
    fn test_not_found_is_empty_not_error() {
        let mut chart = ChartSession::new(ChartPeriod::Hour);
        let req = chart.request();
        chart.complete(ChartOutcome {
            generation: req.generation,
            result: Err(StoreError::NotFound("/logs/chart-data".to_string())),
        });
        assert!(chart.error().is_none());
        assert!(chart.is_empty());
        assert_eq!(chart.y_max(), 1);
    }

    #[test]
    fn test_y_max_over_visible_series() {
        let now = now();
        let mut entries = Vec::new();
        for i in 0..4 {
            entries.push(entry(i, LogLevel::Error, Some("db"), now));
        }
        entries.push(entry(1, LogLevel::Info, Some("http"), now));

        let mut chart = ChartSession::new(ChartPeriod::Hour);
        let req = chart.request();
        chart.complete(ChartOutcome {
            generation: req.generation,
            result: Ok(aggregate_entries(&entries, ChartPeriod::Hour, None, now)),
        });
        assert_eq!(chart.y_max(), 4);

        chart.toggle_category("db");
        assert!(!chart.is_category_visible("db"));
        assert_eq!(chart.visible_categories(), vec!["http"]);
        assert_eq!(chart.y_max(), 1);

        chart.toggle_category("http");
        assert_eq!(chart.y_max(), 1);
    }

    #[test]
    fn test_level_bars_follow_exclusion() {
        let now = now();
        let mut chart = ChartSession::new(ChartPeriod::Hour);
        let req = chart.request();
        chart.complete(ChartOutcome {
            generation: req.generation,
            result: Ok(aggregate_entries(&[entry(1, LogLevel::Error, None, now)], ChartPeriod::Hour, None, now)),
        });
        assert_eq!(chart.level_bars().len(), 5);

        chart.toggle_level(LogLevel::Error);
        assert_eq!(chart.level_bars(), vec![(LogLevel::Error, 1)]);
    }

    #[test]
    fn test_category_selection_wraps() {
        let now = now();
        let entries = vec![
            entry(1, LogLevel::Error, Some("a"), now),
            entry(1, LogLevel::Error, Some("a"), now),
            entry(1, LogLevel::Error, Some("b"), now),
        ];
        let mut chart = ChartSession::new(ChartPeriod::Hour);
        let req = chart.request();
        chart.complete(ChartOutcome {
            generation: req.generation,
            result: Ok(aggregate_entries(&entries, ChartPeriod::Hour, None, now)),
        });
        assert_eq!(chart.selected_category(), Some("a"));
        chart.select_next_category();
        assert_eq!(chart.selected_category(), Some("b"));
        chart.select_next_category();
        assert_eq!(chart.selected_category(), Some("a"));
        chart.select_previous_category();
        chart.toggle_selected_category();
        assert!(!chart.is_category_visible("b"));
    }
}
