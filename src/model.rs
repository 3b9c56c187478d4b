//! Wire and in-memory data types shared by the tail view and the charts.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a log entry, ordered from least to most severe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Parse a level name, accepting the usual short forms
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" | "DBG" => Some(LogLevel::Debug),
            "INFO" | "INF" => Some(LogLevel::Info),
            "WARNING" | "WARN" | "WRN" => Some(LogLevel::Warning),
            "ERROR" | "ERR" => Some(LogLevel::Error),
            "CRITICAL" | "CRIT" | "FATAL" => Some(LogLevel::Critical),
            _ => None,
        }
    }

    /// Level bound to the number keys 1..=5
    pub fn from_digit(digit: char) -> Option<Self> {
        let idx = digit.to_digit(10)? as usize;
        idx.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry of the log store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Store-assigned identity. Entries without one are never diffed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub timestamp: String,
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    pub message: String,
}

impl LogEntry {
    /// Parse the timestamp, accepting RFC 3339 and `YYYY-MM-DD HH:MM:SS[,.fff]` (read as UTC)
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    /// Single-line rendering used by exports and the clipboard
    pub fn to_line(&self) -> String {
        let mut out = format!("{} [{}]", self.timestamp, self.level);
        if let Some(category) = &self.category {
            out.push_str(&format!(" {}", category));
        }
        if let Some(function) = &self.function {
            out.push_str(&format!(" {}()", function));
        }
        out.push_str(": ");
        out.push_str(&self.message);
        out
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let normalized = raw.replacen(',', ".", 1);
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Response of `GET logs(query)`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogsResponse {
    pub logs: Vec<LogEntry>,
    pub total_lines: u64,
    pub file_path: String,
    pub last_modified: String,
}

/// Response of `GET logInfo()`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogInfo {
    pub file_path: String,
    pub size: u64,
    pub total_lines: u64,
    pub last_modified: String,
}

/// Where a snapshot came from
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotSource {
    pub file_path: String,
    pub last_modified: String,
    pub total_lines: u64,
}

/// One complete fetched batch. Replaced wholesale, never merged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchSnapshot {
    /// Ordered most-recent-first
    pub entries: Vec<LogEntry>,
    pub source: SnapshotSource,
}

impl FetchSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Defined ids, in order
    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.iter().filter_map(|e| e.id)
    }
}

impl From<LogsResponse> for FetchSnapshot {
    fn from(resp: LogsResponse) -> Self {
        Self {
            entries: resp.logs,
            source: SnapshotSource {
                file_path: resp.file_path,
                last_modified: resp.last_modified,
                total_lines: resp.total_lines,
            },
        }
    }
}

/// Time window selectable in the chart view
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChartPeriod {
    #[default]
    Hour,
    SevenHours,
    Day,
    Week,
}

impl ChartPeriod {
    pub const ALL: [ChartPeriod; 4] = [
        ChartPeriod::Hour,
        ChartPeriod::SevenHours,
        ChartPeriod::Day,
        ChartPeriod::Week,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartPeriod::Hour => "1h",
            ChartPeriod::SevenHours => "7h",
            ChartPeriod::Day => "24h",
            ChartPeriod::Week => "7d",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s.trim())
    }

    pub fn span(&self) -> Duration {
        const HOUR: u64 = 3600;
        Duration::from_secs(match self {
            ChartPeriod::Hour => HOUR,
            ChartPeriod::SevenHours => 7 * HOUR,
            ChartPeriod::Day => 24 * HOUR,
            ChartPeriod::Week => 7 * 24 * HOUR,
        })
    }

    pub fn bucket_width(&self) -> TimeDelta {
        match self {
            ChartPeriod::Hour => TimeDelta::minutes(5),
            ChartPeriod::SevenHours => TimeDelta::minutes(30),
            ChartPeriod::Day => TimeDelta::hours(1),
            ChartPeriod::Week => TimeDelta::hours(6),
        }
    }

    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|p| p == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for ChartPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One time bucket of the category time series
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeBucket {
    pub bucket: String,
    #[serde(flatten)]
    pub counts: BTreeMap<String, u64>,
}

impl TimeBucket {
    pub fn count(&self, category: &str) -> u64 {
        self.counts.get(category).copied().unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

/// Time-bucketed counts for one period and level selection
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartAggregate {
    pub time_series: Vec<TimeBucket>,
    /// Keyed by level name so unknown levels from the server don't break decoding
    pub by_level: BTreeMap<String, u64>,
    pub by_category: Vec<CategoryCount>,
}

impl ChartAggregate {
    pub fn level_count(&self, level: LogLevel) -> u64 {
        self.by_level.get(level.as_str()).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.by_level.values().sum()
    }

    /// True when the period holds no data points at all
    pub fn is_empty(&self) -> bool {
        let series_total: u64 = self
            .time_series
            .iter()
            .flat_map(|b| b.counts.values())
            .sum();
        series_total == 0 && self.total() == 0
    }
}
