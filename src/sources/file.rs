use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, Utc};
use tracing::debug;

use super::{LogStore, StoreError, StoreResult};
use crate::chart::aggregate_entries;
use crate::model::{ChartAggregate, ChartPeriod, LogEntry, LogInfo, LogLevel, LogsResponse};
use crate::query::QueryDescriptor;

/// A log store backed by a local JSON-lines file, one entry per line.
/// Entries without an id get their 1-based line number.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read_entries(&self) -> StoreResult<Vec<LogEntry>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(parse_lines(&contents))
    }

    async fn modified(&self) -> StoreResult<(u64, String)> {
        let meta = tokio::fs::metadata(&self.path).await?;
        let modified = meta
            .modified()
            .map(|t| DateTime::<Local>::from(t).to_rfc3339())
            .unwrap_or_default();
        Ok((meta.len(), modified))
    }
}

fn parse_lines(contents: &str) -> Vec<LogEntry> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match serde_json::from_str::<LogEntry>(line) {
            Ok(mut entry) => {
                entry.id = entry.id.or(Some(idx as i64 + 1));
                Some(entry)
            }
            Err(e) => {
                debug!(line = idx + 1, error = %e, "skipping malformed log line");
                None
            }
        })
        .collect()
}

fn matches_query(entry: &LogEntry, query: &QueryDescriptor) -> bool {
    if let Some(levels) = &query.levels {
        if !levels.contains(&entry.level) {
            return false;
        }
    }
    if let Some(category) = &query.category {
        if entry.category.as_deref() != Some(category.as_str()) {
            return false;
        }
    }
    if let Some(function) = &query.function {
        if entry.function.as_deref() != Some(function.as_str()) {
            return false;
        }
    }
    if let Some(search) = &query.search {
        if !entry.message.to_lowercase().contains(&search.to_lowercase()) {
            return false;
        }
    }
    if query.start_date.is_some() || query.end_date.is_some() {
        let Some(date) = entry.parsed_timestamp().map(|ts| ts.date_naive()) else {
            return false;
        };
        if !within(date, query.start_date, query.end_date) {
            return false;
        }
    }
    true
}

fn within(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    start.is_none_or(|s| date >= s) && end.is_none_or(|e| date <= e)
}

/// Apply a query: filter, keep the newest `lines`, order newest first
fn select(entries: Vec<LogEntry>, query: &QueryDescriptor) -> Vec<LogEntry> {
    let mut matched: Vec<LogEntry> = entries
        .into_iter()
        .filter(|e| matches_query(e, query))
        .collect();
    let keep = query.lines as usize;
    if matched.len() > keep {
        matched.drain(..matched.len() - keep);
    }
    matched.reverse();
    matched
}

fn distinct_values(entries: &[LogEntry], field: impl Fn(&LogEntry) -> Option<&String>) -> Vec<String> {
    entries
        .iter()
        .filter_map(field)
        .filter(|v| !v.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[async_trait::async_trait]
impl LogStore for FileStore {
    async fn logs(&self, query: &QueryDescriptor) -> StoreResult<LogsResponse> {
        let entries = self.read_entries().await?;
        let total_lines = entries.len() as u64;
        let (_, last_modified) = self.modified().await?;
        Ok(LogsResponse {
            logs: select(entries, query),
            total_lines,
            file_path: self.path.display().to_string(),
            last_modified,
        })
    }

    async fn log_info(&self) -> StoreResult<LogInfo> {
        let total_lines = self.read_entries().await?.len() as u64;
        let (size, last_modified) = self.modified().await?;
        Ok(LogInfo {
            file_path: self.path.display().to_string(),
            size,
            total_lines,
            last_modified,
        })
    }

    async fn chart_data(
        &self,
        period: ChartPeriod,
        levels: Option<&[LogLevel]>,
    ) -> StoreResult<ChartAggregate> {
        let entries = self.read_entries().await?;
        Ok(aggregate_entries(&entries, period, levels, Utc::now()))
    }

    async fn categories(&self) -> StoreResult<Vec<String>> {
        let entries = self.read_entries().await?;
        Ok(distinct_values(&entries, |e| e.category.as_ref()))
    }

    async fn functions(&self) -> StoreResult<Vec<String>> {
        let entries = self.read_entries().await?;
        Ok(distinct_values(&entries, |e| e.function.as_ref()))
    }

    async fn clear(&self) -> StoreResult<()> {
        tokio::fs::write(&self.path, b"").await?;
        Ok(())
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FilterState, build_query};

    const LINES: &str = r#"{"timestamp":"2024-05-01 10:00:00","level":"INFO","category":"http","function":"serve","message":"GET /"}
{"timestamp":"2024-05-01 10:00:01","level":"ERROR","category":"db","function":"connect","message":"Connection refused"}
not json at all
{"id":99,"timestamp":"2024-05-02 09:00:00","level":"WARNING","category":"db","message":"slow query"}

{"timestamp":"2024-05-03 08:00:00","level":"ERROR","category":"auth","function":"login","message":"bad token"}
"#;

    fn store_with(contents: &str) -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.jsonl");
        std::fs::write(&path, contents).unwrap();
        (dir, FileStore::new(path))
    }

    #[test]
    fn test_parse_assigns_line_ids_and_skips_garbage() {
        let entries = parse_lines(LINES);
        assert_eq!(entries.len(), 4);
        let ids: Vec<_> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(99), Some(6)]);
    }

    #[tokio::test]
    async fn test_default_query_returns_warnings_and_errors_newest_first() {
        let (_dir, store) = store_with(LINES);
        let resp = store.logs(&build_query(&FilterState::default())).await.unwrap();
        let messages: Vec<_> = resp.logs.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["bad token", "slow query", "Connection refused"]);
        assert_eq!(resp.total_lines, 4);
        assert!(resp.file_path.ends_with("app.jsonl"));
    }

    #[tokio::test]
    async fn test_query_filters_and_line_cap() {
        let (_dir, store) = store_with(LINES);
        let mut filters = FilterState::default();
        filters.levels.clear();
        filters.category = Some("db".to_string());
        filters.search = "REFUSED".to_string();
        let resp = store.logs(&build_query(&filters)).await.unwrap();
        assert_eq!(resp.logs.len(), 1);
        assert_eq!(resp.logs[0].function.as_deref(), Some("connect"));

        let mut query = build_query(&FilterState::default());
        query.levels = None;
        query.lines = 2;
        let resp = store.logs(&query).await.unwrap();
        assert_eq!(resp.logs.len(), 2);
        assert_eq!(resp.logs[0].message, "bad token");
    }

    #[tokio::test]
    async fn test_date_range_filter() {
        let (_dir, store) = store_with(LINES);
        let mut filters = FilterState::default();
        filters.levels.clear();
        filters.set_date_range("2024-05-02..2024-05-02");
        let resp = store.logs(&build_query(&filters)).await.unwrap();
        assert_eq!(resp.logs.len(), 1);
        assert_eq!(resp.logs[0].id, Some(99));
    }

    #[tokio::test]
    async fn test_lookups_and_info() {
        let (_dir, store) = store_with(LINES);
        assert_eq!(store.categories().await.unwrap(), vec!["auth", "db", "http"]);
        assert_eq!(store.functions().await.unwrap(), vec!["connect", "login", "serve"]);

        let info = store.log_info().await.unwrap();
        assert_eq!(info.total_lines, 4);
        assert_eq!(info.size, LINES.len() as u64);
    }

    #[tokio::test]
    async fn test_clear_truncates() {
        let (_dir, store) = store_with(LINES);
        store.clear().await.unwrap();
        let resp = store.logs(&build_query(&FilterState::default())).await.unwrap();
        assert!(resp.logs.is_empty());
        assert_eq!(store.log_info().await.unwrap().size, 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("missing.jsonl"));
        let err = store.categories().await.unwrap_err();
        assert!(err.is_not_found());
    }
}
