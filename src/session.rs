//! The tail-view session: owns the snapshot, pagination, highlights and
//! timers, and decides when a fetch goes out and whether its result is kept.
//!
//! The session never performs I/O itself. Mutation entry points return a
//! [`FetchRequest`] when a fetch should start; the caller runs it and hands
//! the [`FetchOutcome`] back to [`TailSession::complete_fetch`].

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::diff::{HIGHLIGHT_TTL, HighlightSet, diff};
use crate::model::{FetchSnapshot, LogEntry, LogsResponse};
use crate::pagination::{PAGE_SIZE, Pagination};
use crate::query::{FilterState, QueryDescriptor, build_query};
use crate::scroll::{NEAR_BOTTOM_THRESHOLD, ScrollMetrics, ScrollTracker};
use crate::sources::StoreResult;

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(5);
pub const MIN_LOADING: Duration = Duration::from_millis(300);

const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

/// What caused a fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchTrigger {
    /// First load after construction or a clear
    Initial,
    /// "Refresh now"
    Manual,
    /// The filters changed
    FilterChange,
    /// The auto-refresh timer
    Auto,
}

impl FetchTrigger {
    /// Only background ticks mark new arrivals
    pub fn highlights_new(&self) -> bool {
        matches!(self, FetchTrigger::Auto)
    }

    /// Background ticks keep the user's page
    pub fn resets_page(&self) -> bool {
        !matches!(self, FetchTrigger::Auto)
    }

    /// Whether the loading indicator is held for the minimum duration
    pub fn holds_min_loading(&self) -> bool {
        !matches!(self, FetchTrigger::Initial)
    }
}

/// A fetch the caller should run
#[derive(Clone, Debug, PartialEq)]
pub struct FetchRequest {
    pub generation: u64,
    pub trigger: FetchTrigger,
    pub query: QueryDescriptor,
}

/// Result of a fetch, tagged with the generation that issued it
#[derive(Debug)]
pub struct FetchOutcome {
    pub generation: u64,
    pub result: StoreResult<LogsResponse>,
}

#[derive(Clone, Copy, Debug)]
struct InFlight {
    generation: u64,
    trigger: FetchTrigger,
    near_bottom_at_issue: bool,
}

#[derive(Clone, Copy, Debug)]
struct AutoRefresh {
    countdown: u64,
    next_step: Instant,
}

/// Timing knobs of a session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub refresh_interval: Duration,
    pub highlight_ttl: Duration,
    pub page_size: usize,
    pub near_bottom_threshold: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval: REFRESH_INTERVAL,
            highlight_ttl: HIGHLIGHT_TTL,
            page_size: PAGE_SIZE,
            near_bottom_threshold: NEAR_BOTTOM_THRESHOLD,
        }
    }
}

impl SessionConfig {
    fn countdown_start(&self) -> u64 {
        self.refresh_interval.as_secs().max(1)
    }
}

pub struct TailSession {
    config: SessionConfig,
    filters: FilterState,
    snapshot: FetchSnapshot,
    pagination: Pagination,
    highlights: HighlightSet,
    scroll: ScrollTracker,
    alive: bool,
    /// Generation of the newest fetch whose result is still wanted
    generation: u64,
    in_flight: Option<InFlight>,
    /// Trigger of a filter change or clear that arrived while a fetch was
    /// outstanding; replayed once that fetch lands
    refetch_owed: Option<FetchTrigger>,
    auto_refresh: Option<AutoRefresh>,
    loading: bool,
    error: Option<String>,
    last_updated: Option<DateTime<Local>>,
}

impl TailSession {
    pub fn new(config: SessionConfig, filters: FilterState) -> Self {
        Self {
            pagination: Pagination::new(config.page_size),
            highlights: HighlightSet::new(config.highlight_ttl),
            scroll: ScrollTracker::new(config.near_bottom_threshold),
            config,
            filters,
            snapshot: FetchSnapshot::empty(),
            alive: true,
            generation: 0,
            in_flight: None,
            refetch_owed: None,
            auto_refresh: None,
            loading: false,
            error: None,
            last_updated: None,
        }
    }

    /// Kick off the first load
    pub fn start(&mut self, auto_refresh: bool, now: Instant) -> Option<FetchRequest> {
        if auto_refresh {
            self.set_auto_refresh(true, now);
        }
        self.trigger(FetchTrigger::Initial)
    }

    // --- Read access ---

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn snapshot(&self) -> &FetchSnapshot {
        &self.snapshot
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    /// Entries on the current page
    pub fn visible_entries(&self) -> &[LogEntry] {
        self.pagination.slice(&self.snapshot.entries)
    }

    pub fn is_new(&self, entry: &LogEntry) -> bool {
        entry.id.is_some_and(|id| self.highlights.contains(id))
    }

    pub fn highlight_count(&self) -> usize {
        self.highlights.len()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn last_updated(&self) -> Option<DateTime<Local>> {
        self.last_updated
    }

    pub fn auto_refresh_enabled(&self) -> bool {
        self.auto_refresh.is_some()
    }

    /// Seconds left before the next automatic refresh
    pub fn countdown(&self) -> Option<u64> {
        self.auto_refresh.map(|a| a.countdown)
    }

    pub fn is_near_bottom(&self) -> bool {
        self.scroll.is_near_bottom()
    }

    /// Consume a pending auto-scroll; the front-end scrolls on its next draw
    pub fn take_pending_scroll(&mut self) -> bool {
        self.scroll.take_pending_scroll()
    }

    // --- Mutation entry points ---

    /// Advance timers: highlight expiry and the auto-refresh countdown.
    /// Returns a request when the countdown fires and no fetch is outstanding.
    pub fn on_tick(&mut self, now: Instant) -> Option<FetchRequest> {
        if !self.alive {
            return None;
        }
        self.highlights.expire(now);

        let start = self.config.countdown_start();
        let auto = self.auto_refresh.as_mut()?;
        if now < auto.next_step {
            return None;
        }
        // Catch up on missed seconds without firing more than once
        let mut fire = false;
        while now >= auto.next_step {
            auto.next_step += COUNTDOWN_STEP;
            auto.countdown = auto.countdown.saturating_sub(1);
            if auto.countdown == 0 {
                auto.countdown = start;
                fire = true;
            }
        }
        if fire {
            debug!("auto-refresh tick");
            self.trigger(FetchTrigger::Auto)
        } else {
            None
        }
    }

    pub fn on_manual_refresh(&mut self) -> Option<FetchRequest> {
        self.trigger(FetchTrigger::Manual)
    }

    /// Replace the filters. The snapshot, page and highlights belong to the
    /// old filters and are dropped; any outstanding fetch becomes stale.
    pub fn on_filter_change(&mut self, filters: FilterState) -> Option<FetchRequest> {
        if !self.alive {
            return None;
        }
        self.filters = filters;
        self.restart(FetchTrigger::FilterChange)
    }

    /// The store was truncated; start over as on a filter change
    pub fn on_cleared(&mut self) -> Option<FetchRequest> {
        if !self.alive {
            return None;
        }
        self.restart(FetchTrigger::Initial)
    }

    pub fn on_scroll(&mut self, metrics: ScrollMetrics) {
        if self.alive {
            self.scroll.on_scroll(metrics);
        }
    }

    pub fn set_auto_refresh(&mut self, enabled: bool, now: Instant) {
        if !self.alive {
            return;
        }
        self.auto_refresh = enabled.then(|| AutoRefresh {
            countdown: self.config.countdown_start(),
            next_step: now + COUNTDOWN_STEP,
        });
    }

    pub fn toggle_auto_refresh(&mut self, now: Instant) {
        let enabled = !self.auto_refresh_enabled();
        self.set_auto_refresh(enabled, now);
    }

    pub fn first_page(&mut self, now: Instant) {
        self.pagination.first(now);
    }

    pub fn previous_page(&mut self, now: Instant) {
        self.pagination.previous(now);
    }

    pub fn next_page(&mut self, now: Instant) {
        self.pagination.next(now);
    }

    pub fn last_page(&mut self, now: Instant) {
        self.pagination.last(now);
    }

    pub fn go_to_page(&mut self, page: usize, now: Instant) {
        self.pagination.go_to(page, now);
    }

    /// Tear down: no timer fires and no late result is applied afterwards
    pub fn dispose(&mut self) {
        if !self.alive {
            return;
        }
        info!("disposing tail session");
        self.alive = false;
        self.auto_refresh = None;
        self.highlights.clear();
        self.in_flight = None;
        self.refetch_owed = None;
        self.snapshot = FetchSnapshot::empty();
        self.pagination.set_len(0);
        self.pagination.reset();
        self.scroll.reset();
        self.loading = false;
    }

    /// Apply a finished fetch. Returns a follow-up request when a filter
    /// change was waiting on this fetch.
    pub fn complete_fetch(&mut self, outcome: FetchOutcome, now: Instant) -> Option<FetchRequest> {
        if !self.alive {
            debug!(generation = outcome.generation, "session disposed, dropping fetch result");
            return None;
        }
        let flight = match self.in_flight {
            Some(flight) if flight.generation == outcome.generation => {
                self.in_flight = None;
                flight
            }
            _ => {
                debug!(generation = outcome.generation, "dropping unknown fetch result");
                return None;
            }
        };

        if flight.generation != self.generation {
            debug!(
                generation = flight.generation,
                current = self.generation,
                "discarding stale fetch result"
            );
            return match self.refetch_owed.take() {
                Some(trigger) => self.trigger(trigger),
                None => {
                    self.loading = false;
                    None
                }
            };
        }

        self.loading = false;
        match outcome.result {
            Ok(response) => self.apply(flight, FetchSnapshot::from(response), now),
            Err(e) => {
                warn!(error = %e, trigger = ?flight.trigger, "log fetch failed");
                self.error = Some(format!("Failed to load logs: {}", e));
            }
        }
        None
    }

    fn apply(&mut self, flight: InFlight, next: FetchSnapshot, now: Instant) {
        if flight.trigger.highlights_new() {
            let fresh = diff(&self.snapshot, &next);
            if !fresh.is_empty() {
                debug!(count = fresh.len(), "new log entries");
                self.highlights.insert(fresh, now);
                self.scroll.on_new_entries(flight.near_bottom_at_issue);
            }
        }
        self.snapshot = next;
        self.pagination.set_len(self.snapshot.len());
        if flight.trigger.resets_page() {
            self.pagination.reset();
        }
        self.error = None;
        self.last_updated = Some(Local::now());
    }

    /// Single-flight gate shared by every trigger source
    fn trigger(&mut self, trigger: FetchTrigger) -> Option<FetchRequest> {
        if !self.alive {
            return None;
        }
        if self.in_flight.is_some() {
            debug!(?trigger, "fetch already in flight, dropping trigger");
            return None;
        }
        self.generation += 1;
        self.in_flight = Some(InFlight {
            generation: self.generation,
            trigger,
            near_bottom_at_issue: self.scroll.is_near_bottom(),
        });
        self.loading = true;
        Some(FetchRequest {
            generation: self.generation,
            trigger,
            query: build_query(&self.filters),
        })
    }

    fn restart(&mut self, trigger: FetchTrigger) -> Option<FetchRequest> {
        self.snapshot = FetchSnapshot::empty();
        self.pagination.set_len(0);
        self.pagination.reset();
        self.highlights.clear();
        self.error = None;
        if self.in_flight.is_some() {
            // Invalidate the outstanding result and fetch again once it lands
            self.generation += 1;
            self.refetch_owed = Some(trigger);
            self.loading = true;
            return None;
        }
        self.trigger(trigger)
    }
}

impl Drop for TailSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogLevel;
    use crate::sources::StoreError;

    fn entries(ids: impl IntoIterator<Item = i64>) -> Vec<LogEntry> {
        ids.into_iter()
            .map(|id| LogEntry {
                id: Some(id),
                timestamp: "2024-05-01 10:00:00".to_string(),
                level: LogLevel::Error,
                category: None,
                function: None,
                message: format!("entry {}", id),
            })
            .collect()
    }

    fn ok(req: &FetchRequest, ids: impl IntoIterator<Item = i64>) -> FetchOutcome {
        let logs = entries(ids);
        FetchOutcome {
            generation: req.generation,
            result: Ok(LogsResponse {
                total_lines: logs.len() as u64,
                logs,
                file_path: "/var/log/app.log".to_string(),
                last_modified: String::new(),
            }),
        }
    }

    fn failed(req: &FetchRequest) -> FetchOutcome {
        FetchOutcome {
            generation: req.generation,
            result: Err(StoreError::Transport("connection refused".to_string())),
        }
    }

    fn session() -> TailSession {
        TailSession::new(SessionConfig::default(), FilterState::default())
    }

    /// Session with an initial snapshot of the given ids already applied
    fn loaded(ids: impl IntoIterator<Item = i64>, now: Instant) -> TailSession {
        let mut s = session();
        let req = s.start(false, now).unwrap();
        s.complete_fetch(ok(&req, ids), now);
        s
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_initial_load_highlights_nothing() {
        let now = Instant::now();
        let s = loaded(1..=3, now);
        assert_eq!(s.snapshot().len(), 3);
        assert_eq!(s.highlight_count(), 0);
        assert!(!s.is_loading());
        assert!(s.last_updated().is_some());
    }

    #[test]
    fn test_single_flight_drops_concurrent_triggers() {
        let now = Instant::now();
        let mut s = session();
        let first = s.start(false, now).unwrap();
        assert!(s.on_manual_refresh().is_none());
        assert!(s.is_fetching());

        s.complete_fetch(ok(&first, [1]), now);
        assert!(!s.is_fetching());
        assert!(s.on_manual_refresh().is_some());
    }

    #[test]
    fn test_countdown_fires_and_resets() {
        let now = Instant::now();
        let mut s = loaded([1], now);
        s.set_auto_refresh(true, now);
        assert_eq!(s.countdown(), Some(5));

        for i in 1..5 {
            assert!(s.on_tick(now + secs(i)).is_none());
            assert_eq!(s.countdown(), Some(5 - i));
        }
        let req = s.on_tick(now + secs(5)).unwrap();
        assert_eq!(req.trigger, FetchTrigger::Auto);
        assert_eq!(s.countdown(), Some(5));
    }

    #[test]
    fn test_tick_while_in_flight_issues_nothing() {
        let now = Instant::now();
        let mut s = loaded([1], now);
        s.set_auto_refresh(true, now);
        let manual = s.on_manual_refresh().unwrap();

        assert!(s.on_tick(now + secs(5)).is_none());
        assert_eq!(s.countdown(), Some(5));
        s.complete_fetch(ok(&manual, [1]), now + secs(5));
        assert!(s.on_tick(now + secs(10)).is_some());
    }

    #[test]
    fn test_toggling_auto_refresh_resets_countdown() {
        let now = Instant::now();
        let mut s = loaded([1], now);
        s.set_auto_refresh(true, now);
        s.on_tick(now + secs(3));
        assert_eq!(s.countdown(), Some(2));

        s.toggle_auto_refresh(now + secs(3));
        assert_eq!(s.countdown(), None);
        assert!(s.on_tick(now + secs(10)).is_none());

        s.toggle_auto_refresh(now + secs(10));
        assert_eq!(s.countdown(), Some(5));
    }

    #[test]
    fn test_long_stall_fires_once() {
        let now = Instant::now();
        let mut s = loaded([1], now);
        s.set_auto_refresh(true, now);
        assert!(s.on_tick(now + secs(23)).is_some());
        assert!(s.on_tick(now + secs(23)).is_none());
    }

    #[test]
    fn test_auto_refresh_highlights_new_and_keeps_page() {
        let now = Instant::now();
        let mut s = loaded(1..=130, now);
        s.go_to_page(3, now);
        s.set_auto_refresh(true, now);

        let req = s.on_tick(now + secs(5)).unwrap();
        s.complete_fetch(ok(&req, 1..=140), now + secs(5));
        assert_eq!(s.highlight_count(), 10);
        assert_eq!(s.pagination().current_page(), 3);
        assert_eq!(s.pagination().total_pages(), 3);
        assert!(s.is_new(&entries([135])[0]));
        assert!(!s.is_new(&entries([1])[0]));
    }

    #[test]
    fn test_manual_refresh_does_not_highlight_and_resets_page() {
        let now = Instant::now();
        let mut s = loaded(1..=130, now);
        s.go_to_page(2, now);

        let req = s.on_manual_refresh().unwrap();
        s.complete_fetch(ok(&req, 1..=140), now);
        assert_eq!(s.highlight_count(), 0);
        assert_eq!(s.pagination().current_page(), 1);
    }

    #[test]
    fn test_refetch_of_unchanged_set_is_idempotent() {
        let now = Instant::now();
        let mut s = loaded(1..=130, now);
        s.go_to_page(2, now);
        s.set_auto_refresh(true, now);

        let req = s.on_tick(now + secs(5)).unwrap();
        s.complete_fetch(ok(&req, 1..=130), now + secs(5));
        assert_eq!(s.highlight_count(), 0);
        assert_eq!(s.pagination().current_page(), 2);
    }

    #[test]
    fn test_highlights_expire_after_ttl() {
        let now = Instant::now();
        let mut s = loaded([1, 2, 3], now);
        s.set_auto_refresh(true, now);

        let t1 = now + secs(5);
        let req = s.on_tick(t1).unwrap();
        s.complete_fetch(ok(&req, [1, 2, 3, 4]), t1);
        assert_eq!(s.highlight_count(), 1);

        s.on_tick(t1 + Duration::from_millis(1499));
        assert_eq!(s.highlight_count(), 1);
        s.on_tick(t1 + HIGHLIGHT_TTL);
        assert_eq!(s.highlight_count(), 0);
    }

    #[test]
    fn test_shrinking_snapshot_clamps_page() {
        let now = Instant::now();
        let mut s = loaded(1..=130, now);
        s.set_auto_refresh(true, now);
        s.last_page(now);
        assert_eq!(s.pagination().current_page(), 3);

        let req = s.on_tick(now + secs(5)).unwrap();
        s.complete_fetch(ok(&req, 1..=60), now + secs(5));
        assert_eq!(s.pagination().current_page(), 2);
        assert_eq!(s.visible_entries().len(), 10);
    }

    #[test]
    fn test_failure_keeps_snapshot_and_sets_error() {
        let now = Instant::now();
        let mut s = loaded(1..=3, now);
        let req = s.on_manual_refresh().unwrap();
        s.complete_fetch(failed(&req), now);

        assert_eq!(s.snapshot().len(), 3);
        assert!(s.error().unwrap().contains("connection refused"));
        assert!(!s.is_loading());

        let req = s.on_manual_refresh().unwrap();
        s.complete_fetch(ok(&req, 1..=3), now);
        assert!(s.error().is_none());
    }

    #[test]
    fn test_filter_change_resets_and_refetches() {
        let now = Instant::now();
        let mut s = loaded(1..=130, now);
        s.go_to_page(3, now);

        let mut filters = FilterState::default();
        filters.toggle_level(LogLevel::Info);
        let req = s.on_filter_change(filters).unwrap();

        assert_eq!(req.trigger, FetchTrigger::FilterChange);
        assert!(req.query.levels.as_ref().unwrap().contains(&LogLevel::Info));
        assert!(s.snapshot().is_empty());
        assert_eq!(s.pagination().current_page(), 1);

        s.complete_fetch(ok(&req, 200..=210), now);
        assert_eq!(s.highlight_count(), 0);
        assert_eq!(s.snapshot().len(), 11);
    }

    #[test]
    fn test_filter_change_during_fetch_discards_stale_result() {
        let now = Instant::now();
        let mut s = loaded([1, 2], now);
        let stale = s.on_manual_refresh().unwrap();

        assert!(s.on_filter_change(FilterState::with_line_cap(50)).is_none());
        assert!(s.is_loading());

        let follow_up = s.complete_fetch(ok(&stale, [1, 2, 3]), now).unwrap();
        assert!(s.snapshot().is_empty());
        assert_eq!(follow_up.trigger, FetchTrigger::FilterChange);
        assert_eq!(follow_up.query.lines, 50);

        s.complete_fetch(ok(&follow_up, [7]), now);
        assert_eq!(s.snapshot().ids().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_unknown_generation_ignored() {
        let now = Instant::now();
        let mut s = loaded([1], now);
        let req = s.on_manual_refresh().unwrap();
        let bogus = FetchRequest {
            generation: req.generation + 10,
            ..req.clone()
        };
        s.complete_fetch(ok(&bogus, [9]), now);
        assert_eq!(s.snapshot().ids().collect::<Vec<_>>(), vec![1]);
        assert!(s.is_fetching());
    }

    #[test]
    fn test_dispose_discards_late_results_and_stops_timers() {
        let now = Instant::now();
        let mut s = loaded([1], now);
        s.set_auto_refresh(true, now);
        let req = s.on_manual_refresh().unwrap();

        s.dispose();
        assert!(!s.is_alive());
        s.complete_fetch(ok(&req, [1, 2]), now);
        assert!(s.snapshot().is_empty());
        assert!(s.on_tick(now + secs(60)).is_none());
        assert!(s.on_manual_refresh().is_none());
        assert_eq!(s.countdown(), None);
    }

    #[test]
    fn test_auto_scroll_when_near_bottom() {
        let now = Instant::now();
        let mut s = loaded([1], now);
        s.set_auto_refresh(true, now);
        s.on_scroll(ScrollMetrics { scroll_top: 0.0, scroll_height: 5.0, client_height: 20.0 });

        let req = s.on_tick(now + secs(5)).unwrap();
        s.complete_fetch(ok(&req, [1, 2]), now + secs(5));
        assert!(s.take_pending_scroll());
    }

    #[test]
    fn test_no_auto_scroll_when_scrolled_away() {
        let now = Instant::now();
        let mut s = loaded([1], now);
        s.set_auto_refresh(true, now);
        s.on_scroll(ScrollMetrics { scroll_top: 0.0, scroll_height: 1000.0, client_height: 500.0 });

        let req = s.on_tick(now + secs(5)).unwrap();
        s.complete_fetch(ok(&req, [1, 2]), now + secs(5));
        assert_eq!(s.highlight_count(), 1);
        assert!(!s.take_pending_scroll());
    }

    #[test]
    fn test_cleared_restarts_session() {
        let now = Instant::now();
        let mut s = loaded(1..=80, now);
        s.last_page(now);
        let req = s.on_cleared().unwrap();
        assert_eq!(req.trigger, FetchTrigger::Initial);
        assert!(s.snapshot().is_empty());
        assert_eq!(s.pagination().current_page(), 1);

        s.complete_fetch(ok(&req, []), now);
        assert_eq!(s.pagination().total_pages(), 1);
        assert!(s.visible_entries().is_empty());
    }

    #[test]
    fn test_clear_during_fetch_reloads_as_initial() {
        let now = Instant::now();
        let mut s = loaded([1, 2], now);
        let stale = s.on_manual_refresh().unwrap();

        assert!(s.on_cleared().is_none());
        let follow_up = s.complete_fetch(ok(&stale, [1, 2, 3]), now).unwrap();
        assert_eq!(follow_up.trigger, FetchTrigger::Initial);
        assert!(!follow_up.trigger.holds_min_loading());
        assert!(s.snapshot().is_empty());

        s.complete_fetch(ok(&follow_up, []), now);
        assert!(!s.is_loading());
    }
}
