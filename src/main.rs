mod app;
mod chart;
mod config;
mod diff;
mod export;
mod filter;
mod input;
mod logging;
mod model;
mod pagination;
mod query;
mod scroll;
mod session;
mod sources;
mod theme;
mod ui;

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use app::{AppState, Command};
use config::{Config, DEFAULT_CHANNEL_BUFFER};
use query::clamp_line_cap;
use sources::runner::{FetchRunner, StoreEvent};

const USAGE: &str = "\
Usage: tailview [OPTIONS]

Options:
  --url <URL>       Base URL of the log service
  --file <PATH>     Read a local JSON-lines log file instead
  --lines <N>       Maximum lines requested per fetch
  --theme <NAME>    default, kawaii, cyber, dracula, monochrome
  --no-auto         Start with auto-refresh paused
  -h, --help        Show this help";

/// Command line overrides, applied on top of the config file and environment
#[derive(Debug, Default, PartialEq)]
struct Cli {
    url: Option<String>,
    file: Option<PathBuf>,
    lines: Option<u32>,
    theme: Option<String>,
    no_auto: bool,
    help: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut value = |name: &str| args.next().with_context(|| format!("{} needs a value", name));
        match arg.as_str() {
            "--url" => cli.url = Some(value("--url")?),
            "--file" => cli.file = Some(PathBuf::from(value("--file")?)),
            "--lines" => {
                let raw = value("--lines")?;
                cli.lines = Some(raw.parse().with_context(|| format!("invalid --lines: {}", raw))?);
            }
            "--theme" => cli.theme = Some(value("--theme")?),
            "--no-auto" => cli.no_auto = true,
            "-h" | "--help" => cli.help = true,
            other => bail!("unknown argument: {}", other),
        }
    }
    Ok(cli)
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(url) = self.url {
            config.base_url = url;
        }
        if self.file.is_some() {
            config.store_file = self.file;
        }
        if let Some(lines) = self.lines {
            config.line_cap = clamp_line_cap(lines);
        }
        if let Some(theme) = self.theme {
            config.theme = theme;
        }
        if self.no_auto {
            config.auto_refresh = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = match parse_args(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {:#}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if cli.help {
        println!("{}", USAGE);
        return Ok(());
    }

    // Load config: defaults < file < environment < command line
    let mut config = Config::load();
    cli.apply(&mut config);

    let _log_guard = logging::init(&config.log_dir)?;
    info!(store = ?config.store_kind(), "starting tailview");

    let store = config
        .store_kind()
        .open(config.request_timeout)
        .context("failed to open log store")?;
    let (mut runner, mut store_rx) = FetchRunner::new(store, DEFAULT_CHANNEL_BUFFER, config.min_loading);

    // Initialize state
    let export_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut state = AppState::new(&config, runner.store_name()).with_export_dir(export_dir);
    state.start(Instant::now());

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        original_hook(panic);
    }));

    // Main event loop
    let result = run_event_loop(&mut terminal, &mut state, &mut runner, &mut store_rx).await;
    if let Err(e) = &result {
        error!(error = %e, "event loop failed");
    }

    // No timer or late result may touch the session past this point
    state.session.dispose();
    runner.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;

    info!("tailview exited");
    result
}

/// Hand queued store work to the runner
fn dispatch(state: &mut AppState, runner: &mut FetchRunner) {
    let commands = state.take_commands();
    if commands.is_empty() {
        return;
    }
    for command in commands {
        match command {
            Command::FetchLogs(request) => runner.fetch_logs(request),
            Command::FetchChart(request) => runner.fetch_chart(request),
            Command::LoadLookups => runner.load_lookups(),
            Command::ClearLogs => runner.clear_logs(),
            Command::FetchInfo => runner.fetch_info(),
        }
    }
    debug!(tasks = runner.active_tasks(), "dispatched store work");
}

async fn run_event_loop<'a>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState<'a>,
    runner: &mut FetchRunner,
    store_rx: &mut mpsc::Receiver<StoreEvent>,
) -> Result<()> {
    loop {
        // Advance the refresh countdown and highlight expiry before drawing
        state.on_tick(Instant::now());
        dispatch(state, runner);

        // Draw UI
        terminal.draw(|frame| {
            ui::draw(frame, state, Instant::now());
        })?;

        // Use tokio::select! to handle both terminal events and store results
        tokio::select! {
            // Check for terminal input events
            _ = tokio::time::sleep(Duration::from_millis(16)) => {
                // Poll for events with no blocking
                if event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) => {
                            // Only handle key press events (not release)
                            if key.kind == KeyEventKind::Press {
                                input::handle_key(state, key, Instant::now());
                            }
                        }
                        Event::Mouse(mouse) => {
                            input::handle_mouse(state, mouse);
                        }
                        _ => {}
                    }
                }
            }

            // Finished store calls
            Some(event) = store_rx.recv() => {
                state.handle_store_event(event, Instant::now());
            }
        }

        dispatch(state, runner);

        // Check if we should quit
        if state.should_quit {
            break;
        }
    }

    Ok(())
}
