//! Turns the user's filter selection into the parameters sent to `GET logs`.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::model::LogLevel;

/// Longest search term ever transmitted, in characters
pub const MAX_SEARCH_LEN: usize = 200;
pub const DEFAULT_LINE_CAP: u32 = 10_000;
pub const MIN_LINE_CAP: u32 = 10;

/// Server-side maintenance flags sent along with a logs query
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CleanupFlags {
    pub distinct: bool,
    pub auto_cleanup: bool,
    pub delete_debug: bool,
    pub delete_duplicates: bool,
    pub delete_older_than_days: Option<u32>,
}

/// What the user has selected in the tail view
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterState {
    /// Empty means "let the server decide"
    pub levels: BTreeSet<LogLevel>,
    pub category: Option<String>,
    pub function: Option<String>,
    /// Raw input; sanitized only when the query is built
    pub search: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub lines: u32,
    pub cleanup: CleanupFlags,
}

impl Default for FilterState {
    /// The tail view starts out showing warnings and errors only
    fn default() -> Self {
        Self {
            levels: BTreeSet::from([LogLevel::Warning, LogLevel::Error]),
            category: None,
            function: None,
            search: String::new(),
            start_date: None,
            end_date: None,
            lines: DEFAULT_LINE_CAP,
            cleanup: CleanupFlags::default(),
        }
    }
}

impl FilterState {
    pub fn with_line_cap(lines: u32) -> Self {
        Self {
            lines: clamp_line_cap(lines),
            ..Self::default()
        }
    }

    pub fn toggle_level(&mut self, level: LogLevel) {
        if !self.levels.remove(&level) {
            self.levels.insert(level);
        }
    }

    /// Parse a `YYYY-MM-DD..YYYY-MM-DD` range; either side may be blank.
    /// Unparseable sides are treated as unset.
    pub fn set_date_range(&mut self, input: &str) {
        let (start, end) = input.split_once("..").unwrap_or((input, ""));
        self.start_date = parse_date(start);
        self.end_date = parse_date(end);
    }

    pub fn date_range_label(&self) -> Option<String> {
        if self.start_date.is_none() && self.end_date.is_none() {
            return None;
        }
        let side = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
        Some(format!("{}..{}", side(self.start_date), side(self.end_date)))
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

pub fn clamp_line_cap(lines: u32) -> u32 {
    lines.max(MIN_LINE_CAP)
}

/// Canonical request for `GET logs`. `None` fields are omitted from the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub lines: u32,
    pub levels: Option<Vec<LogLevel>>,
    pub category: Option<String>,
    pub function: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub distinct: bool,
    pub auto_cleanup: bool,
    pub delete_debug: bool,
    pub delete_duplicates: bool,
    pub delete_older_than_days: Option<u32>,
}

impl QueryDescriptor {
    /// Flatten into query-string pairs; levels are comma separated
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("lines", self.lines.to_string())];
        if let Some(levels) = &self.levels {
            let joined: Vec<&str> = levels.iter().map(|l| l.as_str()).collect();
            pairs.push(("levels", joined.join(",")));
        }
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        if let Some(function) = &self.function {
            pairs.push(("function", function.clone()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(start) = self.start_date {
            pairs.push(("startDate", start.to_string()));
        }
        if let Some(end) = self.end_date {
            pairs.push(("endDate", end.to_string()));
        }
        for (key, flag) in [
            ("distinct", self.distinct),
            ("autoCleanup", self.auto_cleanup),
            ("deleteDebug", self.delete_debug),
            ("deleteDuplicates", self.delete_duplicates),
        ] {
            if flag {
                pairs.push((key, "true".to_string()));
            }
        }
        if let Some(days) = self.delete_older_than_days {
            pairs.push(("deleteOlderThanDays", days.to_string()));
        }
        pairs
    }
}

/// Build the request for the given filters. Never fails; bad input is dropped.
pub fn build_query(filters: &FilterState) -> QueryDescriptor {
    let levels = if filters.levels.is_empty() {
        None
    } else {
        Some(filters.levels.iter().copied().collect())
    };

    // An inverted range is meaningless; send neither bound
    let (start_date, end_date) = match (filters.start_date, filters.end_date) {
        (Some(start), Some(end)) if start > end => (None, None),
        range => range,
    };

    QueryDescriptor {
        lines: clamp_line_cap(filters.lines),
        levels,
        category: non_blank(filters.category.as_deref()),
        function: non_blank(filters.function.as_deref()),
        search: sanitize_search(&filters.search),
        start_date,
        end_date,
        distinct: filters.cleanup.distinct,
        auto_cleanup: filters.cleanup.auto_cleanup,
        delete_debug: filters.cleanup.delete_debug,
        delete_duplicates: filters.cleanup.delete_duplicates,
        delete_older_than_days: filters.cleanup.delete_older_than_days.filter(|d| *d > 0),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Strip control characters, trim, and cap at [`MAX_SEARCH_LEN`] characters.
/// Returns `None` when nothing searchable is left.
pub fn sanitize_search(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
    let capped: String = cleaned.trim().chars().take(MAX_SEARCH_LEN).collect();
    let capped = capped.trim_end();
    if capped.is_empty() {
        None
    } else {
        Some(capped.to_string())
    }
}
