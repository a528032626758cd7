use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use llama_buddy::TaskKey;

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Paste(text) => {
            if app.input_mode == InputMode::Editing {
                insert_text(app, &text);
            }
        }
        AppEvent::Resize => app.scroll_chat_to_bottom(),
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Tab => app.cycle_task(),
        KeyCode::Char(c @ '1'..='4') => {
            let idx = c as usize - '1' as usize;
            if let Some(task) = TaskKey::all().get(idx) {
                app.select_task(*task);
            }
        }
        KeyCode::Char('d') => app.toggle_debug(),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(),
        KeyCode::Char('G') | KeyCode::End => app.scroll_chat_to_bottom(),
        KeyCode::Char('g') | KeyCode::Home => app.chat_scroll = 0,
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.submit_query();
        }
        KeyCode::Tab => app.cycle_task(),
        KeyCode::Up => app.scroll_up(),
        KeyCode::Down => app.scroll_down(),
        KeyCode::Backspace => {
            if app.query_cursor > 0 {
                app.query_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
                app.query_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.query_input.chars().count();
            if app.query_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
                app.query_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.query_cursor = app.query_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.query_input.chars().count();
            app.query_cursor = (app.query_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.query_cursor = 0;
        }
        KeyCode::End => {
            app.query_cursor = app.query_input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
            app.query_input.insert(byte_pos, c);
            app.query_cursor += 1;
        }
        _ => {}
    }
}

/// Insert pasted text at the cursor. The input is a single line, so line
/// breaks become spaces.
fn insert_text(app: &mut App, text: &str) {
    let cleaned: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let byte_pos = char_to_byte_index(&app.query_input, app.query_cursor);
    app.query_input.insert_str(byte_pos, &cleaned);
    app.query_cursor += cleaned.chars().count();
}
