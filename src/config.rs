use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::diff::HIGHLIGHT_TTL;
use crate::model::{ChartPeriod, LogLevel};
use crate::pagination::PAGE_SIZE;
use crate::query::{CleanupFlags, DEFAULT_LINE_CAP, FilterState, clamp_line_cap};
use crate::scroll::NEAR_BOTTOM_THRESHOLD;
use crate::session::{MIN_LOADING, REFRESH_INTERVAL, SessionConfig};
use crate::sources::StoreKind;

/// Capacity of the channel carrying store results to the event loop
pub const DEFAULT_CHANNEL_BUFFER: usize = 64;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Configuration for tailview
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the log service
    pub base_url: String,
    /// Serve from a local JSON-lines file instead of the log service
    pub store_file: Option<PathBuf>,
    pub refresh_interval: Duration,
    pub highlight_ttl: Duration,
    pub min_loading: Duration,
    pub request_timeout: Duration,
    pub page_size: usize,
    /// Line cap sent with every logs query
    pub line_cap: u32,
    pub near_bottom_threshold: f64,
    pub auto_refresh: bool,
    /// Levels the tail view starts with and resets to
    pub levels: BTreeSet<LogLevel>,
    pub chart_period: ChartPeriod,
    pub theme: String,
    /// Directory receiving tailview.log
    pub log_dir: PathBuf,
    pub cleanup: CleanupFlags,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            store_file: None,
            refresh_interval: REFRESH_INTERVAL,
            highlight_ttl: HIGHLIGHT_TTL,
            min_loading: MIN_LOADING,
            request_timeout: Duration::from_secs(10),
            page_size: PAGE_SIZE,
            line_cap: DEFAULT_LINE_CAP,
            near_bottom_threshold: NEAR_BOTTOM_THRESHOLD,
            auto_refresh: true,
            levels: FilterState::default().levels,
            chart_period: ChartPeriod::default(),
            theme: "default".to_string(),
            log_dir: default_log_dir(),
            cleanup: CleanupFlags::default(),
        }
    }
}

/// On-disk form of the config file; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    base_url: Option<String>,
    store_file: Option<PathBuf>,
    refresh_secs: Option<u64>,
    highlight_ms: Option<u64>,
    min_loading_ms: Option<u64>,
    timeout_secs: Option<u64>,
    lines: Option<u32>,
    near_bottom_threshold: Option<f64>,
    auto_refresh: Option<bool>,
    levels: Option<Vec<String>>,
    chart_period: Option<String>,
    theme: Option<String>,
    log_dir: Option<PathBuf>,
    cleanup: Option<CleanupFlags>,
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tailview"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `$XDG_CONFIG_HOME/tailview/config.toml` or the platform equivalent
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tailview").join("config.toml"))
}

impl Config {
    /// Defaults, overlaid by the config file, overlaid by the environment
    pub fn load() -> Self {
        let mut config = Self::default();
        if let Some(path) = config_path() {
            config.merge_file(&path);
        }
        config.merge_env(|key| std::env::var(key).ok());
        config
    }

    fn merge_file(&mut self, path: &Path) {
        let Ok(contents) = std::fs::read_to_string(path) else {
            return;
        };
        match toml::from_str::<FileConfig>(&contents) {
            Ok(file) => self.apply_file(file),
            Err(e) => warn!(path = %path.display(), error = %e, "ignoring malformed config file"),
        }
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(url) = file.base_url {
            self.base_url = url;
        }
        if file.store_file.is_some() {
            self.store_file = file.store_file;
        }
        if let Some(secs) = file.refresh_secs {
            self.refresh_interval = refresh_from_secs(secs);
        }
        if let Some(ms) = file.highlight_ms {
            self.highlight_ttl = Duration::from_millis(ms);
        }
        if let Some(ms) = file.min_loading_ms {
            self.min_loading = Duration::from_millis(ms);
        }
        if let Some(secs) = file.timeout_secs {
            self.request_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(lines) = file.lines {
            self.line_cap = clamp_line_cap(lines);
        }
        if let Some(threshold) = file.near_bottom_threshold {
            self.near_bottom_threshold = threshold.max(0.0);
        }
        if let Some(auto) = file.auto_refresh {
            self.auto_refresh = auto;
        }
        if let Some(levels) = file.levels {
            self.levels = parse_levels(levels.iter().map(String::as_str));
        }
        if let Some(period) = file.chart_period {
            match ChartPeriod::parse(&period) {
                Some(period) => self.chart_period = period,
                None => warn!(period = %period, "ignoring unknown chart period"),
            }
        }
        if let Some(theme) = file.theme {
            self.theme = theme;
        }
        if let Some(dir) = file.log_dir {
            self.log_dir = dir;
        }
        if let Some(cleanup) = file.cleanup {
            self.cleanup = cleanup;
        }
    }

    fn merge_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(url) = get("TAILVIEW_URL") {
            self.base_url = url;
        }
        if let Some(lines) = get("TAILVIEW_LINES").and_then(|s| s.parse().ok()) {
            self.line_cap = clamp_line_cap(lines);
        }
        if let Some(secs) = get("TAILVIEW_REFRESH_SECS").and_then(|s| s.parse().ok()) {
            self.refresh_interval = refresh_from_secs(secs);
        }
        if let Some(levels) = get("TAILVIEW_LEVELS") {
            self.levels = parse_levels(levels.split(','));
        }
        if let Some(theme) = get("TAILVIEW_THEME") {
            self.theme = theme;
        }
        if let Some(dir) = get("TAILVIEW_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
    }

    /// Filters the tail view starts with, and returns to on reset
    pub fn initial_filters(&self) -> FilterState {
        FilterState {
            levels: self.levels.clone(),
            cleanup: self.cleanup.clone(),
            ..FilterState::with_line_cap(self.line_cap)
        }
    }

    /// A store file takes precedence over the service URL
    pub fn store_kind(&self) -> StoreKind {
        match &self.store_file {
            Some(path) => StoreKind::File { path: path.clone() },
            None => StoreKind::Http {
                base_url: self.base_url.clone(),
            },
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            refresh_interval: self.refresh_interval,
            highlight_ttl: self.highlight_ttl,
            page_size: self.page_size,
            near_bottom_threshold: self.near_bottom_threshold,
        }
    }
}

/// Unknown names are skipped; an empty set leaves the level choice to the server
fn parse_levels<'a>(names: impl Iterator<Item = &'a str>) -> BTreeSet<LogLevel> {
    names
        .filter(|name| !name.trim().is_empty())
        .filter_map(|name| {
            let level = LogLevel::parse(name);
            if level.is_none() {
                warn!(level = name, "ignoring unknown log level");
            }
            level
        })
        .collect()
}

fn refresh_from_secs(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.refresh_interval, Duration::from_secs(5));
        assert_eq!(config.highlight_ttl, Duration::from_millis(1500));
        assert_eq!(config.min_loading, Duration::from_millis(300));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.line_cap, 10_000);
        assert!(config.auto_refresh);
    }

    #[test]
    fn test_file_overrides() {
        let file: FileConfig = toml::from_str(
            r#"
            base_url = "https://logs.example.com/api"
            refresh_secs = 0
            lines = 3
            theme = "dracula"
            levels = ["info", "warn", "bogus"]
            chart_period = "24h"

            [cleanup]
            delete_debug = true
            delete_older_than_days = 30
            "#,
        )
        .unwrap();
        let mut config = Config::default();
        config.apply_file(file);

        assert_eq!(config.base_url, "https://logs.example.com/api");
        assert_eq!(config.refresh_interval, Duration::from_secs(1));
        assert_eq!(config.line_cap, 10);
        assert_eq!(config.theme, "dracula");
        assert_eq!(
            config.levels,
            BTreeSet::from([LogLevel::Info, LogLevel::Warning])
        );
        assert_eq!(config.chart_period, ChartPeriod::Day);
        assert!(config.cleanup.delete_debug);
        assert_eq!(config.cleanup.delete_older_than_days, Some(30));
    }

    #[test]
    fn test_env_overrides_and_bad_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TAILVIEW_URL", "http://10.0.0.1:9000"),
            ("TAILVIEW_LINES", "not-a-number"),
            ("TAILVIEW_REFRESH_SECS", "15"),
            ("TAILVIEW_LEVELS", "error,critical"),
        ]);
        let mut config = Config::default();
        config.merge_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.base_url, "http://10.0.0.1:9000");
        assert_eq!(config.line_cap, 10_000);
        assert_eq!(config.refresh_interval, Duration::from_secs(15));
        assert_eq!(
            config.levels,
            BTreeSet::from([LogLevel::Error, LogLevel::Critical])
        );
    }

    #[test]
    fn test_initial_filters() {
        let config = Config {
            line_cap: 500,
            levels: BTreeSet::new(),
            ..Config::default()
        };
        let filters = config.initial_filters();
        assert_eq!(filters.lines, 500);
        assert!(filters.levels.is_empty());
        assert_eq!(filters.search, "");
    }

    #[test]
    fn test_malformed_file_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "lines = \"many\"").unwrap();

        let mut config = Config::default();
        config.merge_file(&path);
        assert_eq!(config.line_cap, 10_000);
    }

    #[test]
    fn test_store_file_wins_over_url() {
        let mut config = Config::default();
        assert!(matches!(config.store_kind(), StoreKind::Http { .. }));
        config.store_file = Some(PathBuf::from("/tmp/app.jsonl"));
        assert!(matches!(config.store_kind(), StoreKind::File { .. }));
    }

    #[test]
    fn test_session_config_mirrors_timings() {
        let config = Config {
            refresh_interval: Duration::from_secs(9),
            ..Config::default()
        };
        assert_eq!(config.session_config().refresh_interval, Duration::from_secs(9));
    }
}
