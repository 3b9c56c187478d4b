use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use tui_textarea::Input;

use crate::app::{AppState, InputMode, PromptKind, View};
use crate::model::LogLevel;

const MOUSE_SCROLL_ROWS: usize = 3;

/// Handle a mouse event
pub fn handle_mouse(state: &mut AppState, mouse: MouseEvent) {
    if state.view != View::Tail {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollUp => state.scroll_up(MOUSE_SCROLL_ROWS),
        MouseEventKind::ScrollDown => state.scroll_down(MOUSE_SCROLL_ROWS),
        _ => {}
    }
}

/// Handle a key event and update app state accordingly
pub fn handle_key(state: &mut AppState, key: KeyEvent, now: Instant) {
    // Ctrl+C quits from anywhere
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        state.quit();
        return;
    }

    // Help overlay takes priority
    if state.show_help {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?')) {
            state.show_help = false;
        }
        return;
    }

    match state.mode {
        InputMode::Normal => match state.view {
            View::Tail => handle_tail_mode(state, key, now),
            View::Chart => handle_chart_mode(state, key, now),
        },
        InputMode::Prompt(_) => handle_prompt_mode(state, key, now),
        InputMode::ConfirmClear => handle_confirm_mode(state, key),
    }
}

/// Keys shared by both views; returns true when consumed
fn handle_common(state: &mut AppState, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => state.quit(),
        KeyCode::Char('?') => state.show_help = true,
        KeyCode::Tab => state.switch_view(),
        KeyCode::Char('r') => state.refresh_now(),
        KeyCode::Esc => state.dismiss(),
        KeyCode::Char(c @ '1'..='5') => {
            if let Some(level) = LogLevel::from_digit(c) {
                state.toggle_level(level);
            }
        }
        _ => return false,
    }
    true
}

fn handle_tail_mode(state: &mut AppState, key: KeyEvent, now: Instant) {
    if handle_common(state, key) {
        return;
    }
    let page_rows = state.viewport_height.max(1);

    match key.code {
        KeyCode::Char('a') => state.toggle_auto_refresh(now),

        // Pages
        KeyCode::Left | KeyCode::Char('h') => state.previous_page(now),
        KeyCode::Right | KeyCode::Char('l') => state.next_page(now),
        KeyCode::Home => state.first_page(now),
        KeyCode::End => state.last_page(now),
        KeyCode::Char(':') => state.open_prompt(PromptKind::GoToPage),

        // Scrolling within the page
        KeyCode::Char('j') | KeyCode::Down => state.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => state.scroll_up(1),
        KeyCode::PageDown => state.scroll_down(page_rows),
        KeyCode::PageUp => state.scroll_up(page_rows),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            state.scroll_down(page_rows / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            state.scroll_up(page_rows / 2);
        }
        KeyCode::Char('g') => state.scroll_to_top(),
        KeyCode::Char('G') => state.scroll_to_bottom(),

        // Filters
        KeyCode::Char('c') => state.cycle_category(true),
        KeyCode::Char('C') => state.cycle_category(false),
        KeyCode::Char('f') => state.cycle_function(true),
        KeyCode::Char('F') => state.cycle_function(false),
        KeyCode::Char('/') => state.open_prompt(PromptKind::Search),
        KeyCode::Char('D') => state.open_prompt(PromptKind::DateRange),
        KeyCode::Char('L') => state.open_prompt(PromptKind::LineCap),
        KeyCode::Char('u') => state.toggle_distinct(),
        KeyCode::Char('0') => state.reset_filters(),

        // Store operations
        KeyCode::Char('X') => state.request_clear(),
        KeyCode::Char('e') => state.export(),
        KeyCode::Char('y') => state.copy_page(),

        _ => {}
    }
}

fn handle_chart_mode(state: &mut AppState, key: KeyEvent, _now: Instant) {
    if handle_common(state, key) {
        return;
    }
    match key.code {
        KeyCode::Char('p') => state.cycle_chart_period(),
        KeyCode::Left | KeyCode::Char('h') => state.chart.select_previous_category(),
        KeyCode::Right | KeyCode::Char('l') => state.chart.select_next_category(),
        KeyCode::Char(' ') | KeyCode::Enter => state.chart.toggle_selected_category(),
        _ => {}
    }
}

fn handle_prompt_mode(state: &mut AppState, key: KeyEvent, now: Instant) {
    match key.code {
        KeyCode::Enter => state.submit_prompt(now),
        KeyCode::Esc => state.cancel_prompt(),
        _ => {
            // Forward all other keys to the textarea
            state.prompt.input(Input::from(key));
        }
    }
}

fn handle_confirm_mode(state: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => state.confirm_clear(),
        _ => state.cancel_clear(),
    }
}
