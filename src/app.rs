use std::path::PathBuf;
use std::time::Instant;

use chrono::Local;
use ratatui::style::{Color, Style};
use tracing::{error, info};
use tui_textarea::TextArea;

use crate::chart::{ChartRequest, ChartSession};
use crate::config::Config;
use crate::export;
use crate::filter::SearchHighlight;
use crate::model::LogLevel;
use crate::query::{FilterState, clamp_line_cap};
use crate::scroll::ScrollMetrics;
use crate::session::{FetchRequest, TailSession};
use crate::sources::runner::StoreEvent;
use crate::theme::Theme;

/// Which screen is shown
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Tail,
    Chart,
}

/// What the prompt line is collecting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptKind {
    Search,
    DateRange,
    LineCap,
    GoToPage,
}

impl PromptKind {
    pub fn label(&self) -> &'static str {
        match self {
            PromptKind::Search => "search",
            PromptKind::DateRange => "dates (YYYY-MM-DD..YYYY-MM-DD)",
            PromptKind::LineCap => "lines",
            PromptKind::GoToPage => "page",
        }
    }
}

/// Input mode for the application
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    /// Normal navigation mode
    Normal,
    /// Typing into the prompt line
    Prompt(PromptKind),
    /// Waiting for y/n before truncating the store
    ConfirmClear,
}

/// Store work the event loop should start
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    FetchLogs(FetchRequest),
    FetchChart(ChartRequest),
    LoadLookups,
    ClearLogs,
    FetchInfo,
}

/// Main application state
pub struct AppState<'a> {
    pub session: TailSession,
    pub chart: ChartSession,
    pub view: View,
    pub mode: InputMode,
    /// Prompt input widget
    pub prompt: TextArea<'a>,
    pub theme: Theme,
    /// Display name of the log store
    pub source_name: String,
    pub categories: Vec<String>,
    pub functions: Vec<String>,
    /// Highlighter for the active search term
    pub search_highlight: Option<SearchHighlight>,
    /// Row offset within the current page
    pub scroll: usize,
    /// Height of the log pane at the last draw
    pub viewport_height: usize,
    /// Transient message for the status line
    pub status_message: Option<String>,
    /// Failure of a destructive or export operation; stays until dismissed
    pub alert: Option<String>,
    pub show_help: bool,
    pub should_quit: bool,
    initial_filters: FilterState,
    auto_refresh: bool,
    export_dir: PathBuf,
    export_pending: bool,
    chart_requested: bool,
    commands: Vec<Command>,
}

fn new_prompt<'a>(initial: String) -> TextArea<'a> {
    let mut textarea = TextArea::new(vec![initial]);
    textarea.set_cursor_line_style(Style::default());
    textarea.set_placeholder_style(Style::default().fg(Color::DarkGray));
    textarea.move_cursor(tui_textarea::CursorMove::End);
    textarea
}

impl<'a> AppState<'a> {
    pub fn new(config: &Config, source_name: String) -> Self {
        Self {
            session: TailSession::new(config.session_config(), config.initial_filters()),
            chart: ChartSession::new(config.chart_period),
            view: View::Tail,
            mode: InputMode::Normal,
            prompt: new_prompt(String::new()),
            theme: Theme::by_name(&config.theme),
            source_name,
            categories: Vec::new(),
            functions: Vec::new(),
            search_highlight: None,
            scroll: 0,
            viewport_height: 0,
            status_message: None,
            alert: None,
            show_help: false,
            should_quit: false,
            initial_filters: config.initial_filters(),
            auto_refresh: config.auto_refresh,
            export_dir: PathBuf::from("."),
            export_pending: false,
            chart_requested: false,
            commands: Vec::new(),
        }
    }

    pub fn with_export_dir(mut self, dir: PathBuf) -> Self {
        self.export_dir = dir;
        self
    }

    /// Issue the first load and the lookup lists
    pub fn start(&mut self, now: Instant) {
        let request = self.session.start(self.auto_refresh, now);
        self.push_fetch(request);
        self.commands.push(Command::LoadLookups);
    }

    /// Drain the store work queued since the last call
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    fn push_fetch(&mut self, request: Option<FetchRequest>) {
        if let Some(request) = request {
            self.commands.push(Command::FetchLogs(request));
        }
    }

    fn push_chart(&mut self, request: Option<ChartRequest>) {
        if let Some(request) = request {
            self.chart_requested = true;
            self.commands.push(Command::FetchChart(request));
        }
    }

    pub fn on_tick(&mut self, now: Instant) {
        let request = self.session.on_tick(now);
        self.push_fetch(request);
    }

    pub fn refresh_now(&mut self) {
        match self.view {
            View::Tail => {
                if self.session.is_fetching() {
                    self.status_message = Some("Refresh already in progress".to_string());
                    return;
                }
                let request = self.session.on_manual_refresh();
                self.push_fetch(request);
            }
            View::Chart => {
                let request = self.chart.request();
                self.push_chart(Some(request));
            }
        }
    }

    pub fn toggle_auto_refresh(&mut self, now: Instant) {
        self.session.toggle_auto_refresh(now);
        self.status_message = Some(format!(
            "Auto-refresh: {}",
            if self.session.auto_refresh_enabled() { "on" } else { "off" }
        ));
    }

    // --- Filters ---

    /// Edit a copy of the filters; a real change restarts the session
    fn update_filters(&mut self, edit: impl FnOnce(&mut FilterState)) {
        let mut filters = self.session.filters().clone();
        edit(&mut filters);
        if &filters == self.session.filters() {
            return;
        }
        self.search_highlight = SearchHighlight::new(&filters.search);
        self.scroll = 0;
        let request = self.session.on_filter_change(filters);
        self.push_fetch(request);
    }

    /// Number key: tail-view level filter or chart level exclusion
    pub fn toggle_level(&mut self, level: LogLevel) {
        match self.view {
            View::Tail => self.update_filters(|f| f.toggle_level(level)),
            View::Chart => {
                let request = self.chart.toggle_level(level);
                self.push_chart(Some(request));
            }
        }
    }

    pub fn cycle_category(&mut self, forward: bool) {
        let next = cycle_option(
            self.session.filters().category.as_deref(),
            &self.categories,
            forward,
        );
        self.update_filters(|f| f.category = next);
    }

    pub fn cycle_function(&mut self, forward: bool) {
        let next = cycle_option(
            self.session.filters().function.as_deref(),
            &self.functions,
            forward,
        );
        self.update_filters(|f| f.function = next);
    }

    pub fn toggle_distinct(&mut self) {
        self.update_filters(|f| f.cleanup.distinct = !f.cleanup.distinct);
    }

    /// Back to the filters the session started with
    pub fn reset_filters(&mut self) {
        let initial = self.initial_filters.clone();
        self.update_filters(|f| *f = initial);
        self.status_message = Some("Filters reset".to_string());
    }

    // --- Prompt ---

    pub fn open_prompt(&mut self, kind: PromptKind) {
        let filters = self.session.filters();
        let initial = match kind {
            PromptKind::Search => filters.search.clone(),
            PromptKind::DateRange => filters.date_range_label().unwrap_or_default(),
            PromptKind::LineCap => filters.lines.to_string(),
            PromptKind::GoToPage => String::new(),
        };
        self.prompt = new_prompt(initial);
        self.prompt.set_placeholder_text(kind.label());
        self.mode = InputMode::Prompt(kind);
    }

    pub fn prompt_input(&self) -> String {
        self.prompt.lines().join("")
    }

    pub fn submit_prompt(&mut self, now: Instant) {
        let InputMode::Prompt(kind) = self.mode else {
            return;
        };
        let input = self.prompt_input();
        self.mode = InputMode::Normal;

        match kind {
            PromptKind::Search => self.update_filters(|f| f.search = input),
            PromptKind::DateRange => {
                let mut parsed = self.session.filters().clone();
                parsed.set_date_range(&input);
                if !input.trim().is_empty() && parsed.date_range_label().is_none() {
                    self.status_message = Some(format!("Invalid date range: {}", input.trim()));
                    return;
                }
                self.update_filters(|f| f.set_date_range(&input));
            }
            PromptKind::LineCap => match input.trim().parse::<u32>() {
                Ok(lines) => self.update_filters(|f| f.lines = clamp_line_cap(lines)),
                Err(_) => {
                    self.status_message = Some(format!("Invalid line count: {}", input.trim()));
                }
            },
            PromptKind::GoToPage => match input.trim().parse::<usize>() {
                Ok(page) => self.go_to_page(page, now),
                Err(_) => {
                    self.status_message = Some(format!("Invalid page: {}", input.trim()));
                }
            },
        }
    }

    pub fn cancel_prompt(&mut self) {
        self.mode = InputMode::Normal;
    }

    // --- Pages and scrolling ---

    pub fn first_page(&mut self, now: Instant) {
        self.session.first_page(now);
        self.scroll = 0;
    }

    pub fn previous_page(&mut self, now: Instant) {
        self.session.previous_page(now);
        self.scroll = 0;
    }

    pub fn next_page(&mut self, now: Instant) {
        self.session.next_page(now);
        self.scroll = 0;
    }

    pub fn last_page(&mut self, now: Instant) {
        self.session.last_page(now);
        self.scroll = 0;
    }

    pub fn go_to_page(&mut self, page: usize, now: Instant) {
        self.session.go_to_page(page, now);
        self.scroll = 0;
    }

    fn max_scroll(&self) -> usize {
        self.session
            .visible_entries()
            .len()
            .saturating_sub(self.viewport_height)
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll = self.scroll.saturating_sub(rows);
        self.report_scroll();
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll = (self.scroll + rows).min(self.max_scroll());
        self.report_scroll();
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = 0;
        self.report_scroll();
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
        self.report_scroll();
    }

    /// Called by the renderer with the current log pane height. Honours a
    /// pending auto-scroll and reports the viewport to the session.
    pub fn sync_viewport(&mut self, height: usize) {
        self.viewport_height = height;
        if self.session.take_pending_scroll() {
            self.scroll = self.max_scroll();
        }
        self.scroll = self.scroll.min(self.max_scroll());
        self.report_scroll();
    }

    fn report_scroll(&mut self) {
        let metrics = ScrollMetrics {
            scroll_top: self.scroll as f64,
            scroll_height: self.session.visible_entries().len() as f64,
            client_height: self.viewport_height as f64,
        };
        self.session.on_scroll(metrics);
    }

    // --- Views ---

    pub fn switch_view(&mut self) {
        self.view = match self.view {
            View::Tail => View::Chart,
            View::Chart => View::Tail,
        };
        if self.view == View::Chart && !self.chart_requested {
            let request = self.chart.request();
            self.push_chart(Some(request));
        }
    }

    pub fn cycle_chart_period(&mut self) {
        let request = self.chart.cycle_period();
        self.push_chart(request);
    }

    // --- Destructive and export operations ---

    pub fn request_clear(&mut self) {
        self.mode = InputMode::ConfirmClear;
    }

    pub fn confirm_clear(&mut self) {
        self.mode = InputMode::Normal;
        self.commands.push(Command::ClearLogs);
        self.status_message = Some("Clearing logs...".to_string());
    }

    pub fn cancel_clear(&mut self) {
        self.mode = InputMode::Normal;
        self.status_message = Some("Clear cancelled".to_string());
    }

    /// Export the whole snapshot once the store info arrives
    pub fn export(&mut self) {
        if self.export_pending {
            return;
        }
        self.export_pending = true;
        self.commands.push(Command::FetchInfo);
        self.status_message = Some("Exporting...".to_string());
    }

    pub fn copy_page(&mut self) {
        let entries = self.session.visible_entries();
        let count = entries.len();
        match export::copy_to_clipboard(entries) {
            Ok(()) => self.status_message = Some(format!("Copied {} entries", count)),
            Err(e) => self.alert = Some(format!("{:#}", e)),
        }
    }

    /// Dismiss the error banner
    pub fn dismiss(&mut self) {
        if self.alert.take().is_none() {
            self.session.dismiss_error();
        }
    }

    pub fn quit(&mut self) {
        self.session.dispose();
        self.should_quit = true;
    }

    /// Route a finished store call into the owning state
    pub fn handle_store_event(&mut self, event: StoreEvent, now: Instant) {
        if !self.session.is_alive() {
            return;
        }
        match event {
            StoreEvent::Logs(outcome) => {
                let follow_up = self.session.complete_fetch(outcome, now);
                self.push_fetch(follow_up);
            }
            StoreEvent::Chart(outcome) => self.chart.complete(outcome),
            StoreEvent::Lookups {
                categories,
                functions,
            } => {
                self.categories = categories;
                self.functions = functions;
            }
            StoreEvent::Cleared(Ok(())) => {
                info!("log store cleared");
                self.status_message = Some("Logs cleared".to_string());
                self.scroll = 0;
                let request = self.session.on_cleared();
                self.push_fetch(request);
                self.commands.push(Command::LoadLookups);
                if self.chart_requested {
                    let request = self.chart.request();
                    self.push_chart(Some(request));
                }
            }
            StoreEvent::Cleared(Err(e)) => {
                error!(error = %e, "failed to clear logs");
                self.status_message = None;
                self.alert = Some(format!("Failed to clear logs: {}", e));
            }
            StoreEvent::Info(info) => {
                if !std::mem::take(&mut self.export_pending) {
                    return;
                }
                let at = Local::now();
                let entries = &self.session.snapshot().entries;
                let contents = export::render_export(info.as_ref(), entries, at);
                match export::write_export(&self.export_dir, &contents, at) {
                    Ok(path) => {
                        self.status_message =
                            Some(format!("Exported {} entries to {}", entries.len(), path.display()));
                    }
                    Err(e) => {
                        error!(error = %e, "export failed");
                        self.status_message = None;
                        self.alert = Some(format!("{:#}", e));
                    }
                }
            }
        }
    }
}

/// Step through `None` followed by `options`, wrapping at either end
fn cycle_option(current: Option<&str>, options: &[String], forward: bool) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    // Position 0 is "none", 1..=n are the options
    let n = options.len() + 1;
    let pos = current
        .and_then(|c| options.iter().position(|o| o == c))
        .map(|i| i + 1)
        .unwrap_or(0);
    let next = if forward { (pos + 1) % n } else { (pos + n - 1) % n };
    next.checked_sub(1).map(|i| options[i].clone())
}
