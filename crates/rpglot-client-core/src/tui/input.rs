//! Input handling and keybindings.
//!
//! Keys either become controller commands right away or are handed back to
//! the event loop as a [`KeyAction`] when they concern the snapshot source.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::controller::SelectionController;
use crate::model::CollectionKey;
use crate::provider::HistoryStep;
use crate::util::parse_time_with_base;

/// Rows moved by PgUp/PgDn.
const PAGE: isize = 20;

/// Result of handling a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// No action, continue.
    None,
    /// Quit the application.
    Quit,
    /// Pause or resume the live stream.
    TogglePause,
    /// Move along the history timeline.
    HistoryStep(HistoryStep),
    /// Load the snapshot at (or before) this timestamp.
    JumpToTime(i64),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Normal,
    /// Typing a free-text filter.
    Filter,
    /// Typing a time-jump expression.
    TimeJump,
}

/// Keyboard-side UI state the controller does not own.
#[derive(Debug, Default)]
pub struct InputState {
    pub mode: InputMode,
    pub filter_input: String,
    pub time_jump_input: String,
    pub time_jump_error: Option<String>,
    pub show_help: bool,
    /// One-shot hint for the status line.
    pub status_message: Option<String>,
    /// Live source; otherwise history.
    pub is_live: bool,
}

impl InputState {
    pub fn new(is_live: bool) -> Self {
        Self {
            is_live,
            ..Default::default()
        }
    }
}

/// Handles key input and updates state.
pub fn handle_key(
    input: &mut InputState,
    controller: &mut SelectionController,
    key: KeyEvent,
) -> KeyAction {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return KeyAction::Quit;
    }
    input.status_message = None;

    match input.mode {
        InputMode::Normal if input.show_help => handle_help(input, key),
        InputMode::Normal => handle_normal_mode(input, controller, key),
        InputMode::Filter => handle_filter_mode(input, controller, key),
        InputMode::TimeJump => handle_time_jump_mode(input, controller, key),
    }
}

fn handle_help(input: &mut InputState, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => KeyAction::Quit,
        KeyCode::Char('?') | KeyCode::Esc => {
            input.show_help = false;
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

/// Handles keys in normal mode.
fn handle_normal_mode(
    input: &mut InputState,
    c: &mut SelectionController,
    key: KeyEvent,
) -> KeyAction {
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => return KeyAction::Quit,
        KeyCode::Char('?') => input.show_help = true,

        // Tabs
        KeyCode::Char(d @ '1'..='9') => {
            let index = d as usize - '1' as usize;
            if let Some(tab) = CollectionKey::from_index(index) {
                c.change_tab(tab);
            }
        }
        KeyCode::Tab => c.change_tab(c.active_tab().next()),
        KeyCode::BackTab => c.change_tab(c.active_tab().prev()),

        // Rows
        KeyCode::Down | KeyCode::Char('j') => c.step_selection(1),
        KeyCode::Up | KeyCode::Char('k') => c.step_selection(-1),
        KeyCode::PageDown => c.step_selection(PAGE),
        KeyCode::PageUp => c.step_selection(-PAGE),
        KeyCode::Home => c.select_first(),
        KeyCode::End => c.select_last(),
        KeyCode::Enter => c.toggle_detail(),
        KeyCode::Char('>') => {
            if !c.drill_down_selected() {
                input.status_message = Some("Nothing to drill into".to_string());
            }
        }
        KeyCode::Esc => {
            if c.is_detail_open() {
                c.close_detail();
            } else if c.selected().is_some() {
                c.select_row(None);
            } else {
                c.clear_column_filter();
            }
        }

        // Filter and views
        KeyCode::Char('/') => {
            input.filter_input = c.state().filter_text.clone();
            input.mode = InputMode::Filter;
        }
        KeyCode::Char('v') => c.cycle_view(),

        // Snapshot source
        KeyCode::Char(' ') if input.is_live => return KeyAction::TogglePause,
        KeyCode::Left if !input.is_live => {
            let step = if shift {
                HistoryStep::HourBack
            } else {
                HistoryStep::Back
            };
            return KeyAction::HistoryStep(step);
        }
        KeyCode::Right if !input.is_live => {
            let step = if shift {
                HistoryStep::HourForward
            } else {
                HistoryStep::Forward
            };
            return KeyAction::HistoryStep(step);
        }
        KeyCode::Char('b') if !input.is_live => {
            input.time_jump_input.clear();
            input.time_jump_error = None;
            input.mode = InputMode::TimeJump;
        }
        _ => {}
    }
    KeyAction::None
}

/// Handles keys in filter mode. Enter applies, Esc discards the edit.
fn handle_filter_mode(
    input: &mut InputState,
    c: &mut SelectionController,
    key: KeyEvent,
) -> KeyAction {
    match key.code {
        KeyCode::Esc => {
            input.filter_input.clear();
            input.mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            c.change_filter_text(std::mem::take(&mut input.filter_input));
            input.mode = InputMode::Normal;
        }
        KeyCode::Backspace => {
            input.filter_input.pop();
        }
        KeyCode::Char(ch)
            if !key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            input.filter_input.push(ch);
        }
        _ => {}
    }
    KeyAction::None
}

/// Handles keys in time-jump mode. A parse error keeps the prompt open.
fn handle_time_jump_mode(
    input: &mut InputState,
    c: &mut SelectionController,
    key: KeyEvent,
) -> KeyAction {
    match key.code {
        KeyCode::Esc => {
            input.time_jump_input.clear();
            input.time_jump_error = None;
            input.mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            let base = c
                .current()
                .map(|s| s.timestamp)
                .unwrap_or_else(|| chrono::Utc::now().timestamp());
            match parse_time_with_base(&input.time_jump_input, base) {
                Ok(ts) => {
                    input.time_jump_input.clear();
                    input.time_jump_error = None;
                    input.mode = InputMode::Normal;
                    return KeyAction::JumpToTime(ts);
                }
                Err(e) => input.time_jump_error = Some(e.to_string()),
            }
        }
        KeyCode::Backspace => {
            input.time_jump_input.pop();
            input.time_jump_error = None;
        }
        KeyCode::Char(ch)
            if !key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            input.time_jump_input.push(ch);
            input.time_jump_error = None;
        }
        _ => {}
    }
    KeyAction::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crossterm::event::{KeyEventKind, KeyEventState};
    use serde_json::json;

    use crate::address::NavAddress;
    use crate::controller::ColumnFilter;
    use crate::model::{EntityId, Snapshot};
    use crate::schema::{Catalog, DrillDown, Mode, TabSchema, ViewSchema};

    fn key(code: KeyCode) -> KeyEvent {
        key_with(code, KeyModifiers::NONE)
    }

    fn key_with(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn controller(mode: Mode, tab: CollectionKey) -> SelectionController {
        let pga = TabSchema {
            name: "pg_stat_activity".into(),
            entity_id: "pid".into(),
            views: vec![
                ViewSchema {
                    key: "generic".into(),
                    label: "Generic".into(),
                    columns: Vec::new(),
                    default: true,
                },
                ViewSchema {
                    key: "waits".into(),
                    label: "Waits".into(),
                    columns: Vec::new(),
                    default: false,
                },
            ],
            drill_down: Some(DrillDown {
                target: "pgl".into(),
                via: "pid".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let catalog = Catalog::empty(mode).with_tab(CollectionKey::Pga, pga);
        let mut c = SelectionController::new(Arc::new(catalog), NavAddress::new(tab));
        let snap = Snapshot::from_value(json!({
            "timestamp": 1_738_944_000,
            "pga": [{"pid": 41, "state": "idle"}, {"pid": 42, "state": "active"}],
            "pgl": [{"pid": 42, "lock_type": "relation"}]
        }))
        .unwrap();
        c.on_snapshot(Arc::new(snap));
        c
    }

    fn press(input: &mut InputState, c: &mut SelectionController, codes: &[KeyCode]) {
        for code in codes {
            handle_key(input, c, key(*code));
        }
    }

    #[test]
    fn test_quit_keys() {
        let mut c = controller(Mode::Live, CollectionKey::Pga);
        let mut input = InputState::new(true);
        assert_eq!(
            handle_key(&mut input, &mut c, key(KeyCode::Char('q'))),
            KeyAction::Quit
        );
        input.mode = InputMode::Filter;
        assert_eq!(
            handle_key(
                &mut input,
                &mut c,
                key_with(KeyCode::Char('c'), KeyModifiers::CONTROL)
            ),
            KeyAction::Quit
        );
    }

    #[test]
    fn test_digits_select_tab() {
        let mut c = controller(Mode::Live, CollectionKey::Prc);
        let mut input = InputState::new(true);
        press(&mut input, &mut c, &[KeyCode::Char('2')]);
        assert_eq!(c.active_tab(), CollectionKey::Pga);
        press(&mut input, &mut c, &[KeyCode::Char('9')]);
        assert_eq!(c.active_tab(), CollectionKey::Pga, "out of range ignored");
        press(&mut input, &mut c, &[KeyCode::Tab]);
        assert_eq!(c.active_tab(), CollectionKey::Pga.next());
        press(&mut input, &mut c, &[KeyCode::BackTab]);
        assert_eq!(c.active_tab(), CollectionKey::Pga);
    }

    #[test]
    fn test_navigation_and_esc_cascade() {
        let mut c = controller(Mode::Live, CollectionKey::Pga);
        let mut input = InputState::new(true);
        c.set_column_filter(ColumnFilter::new("state", "active"));

        press(&mut input, &mut c, &[KeyCode::Char('j'), KeyCode::Enter]);
        assert_eq!(c.selected(), Some(&EntityId::Int(42)));
        assert!(c.is_detail_open());

        press(&mut input, &mut c, &[KeyCode::Esc]);
        assert!(!c.is_detail_open());
        assert!(c.selected().is_some());
        press(&mut input, &mut c, &[KeyCode::Esc]);
        assert_eq!(c.selected(), None);
        assert!(c.state().column_filter.is_some());
        press(&mut input, &mut c, &[KeyCode::Esc]);
        assert_eq!(c.state().column_filter, None);

        press(&mut input, &mut c, &[KeyCode::End]);
        assert_eq!(c.selected(), Some(&EntityId::Int(42)));
        press(&mut input, &mut c, &[KeyCode::PageUp]);
        assert_eq!(c.selected(), Some(&EntityId::Int(41)));
    }

    #[test]
    fn test_filter_mode() {
        let mut c = controller(Mode::Live, CollectionKey::Pga);
        let mut input = InputState::new(true);

        press(&mut input, &mut c, &[KeyCode::Char('/')]);
        assert_eq!(input.mode, InputMode::Filter);
        press(
            &mut input,
            &mut c,
            &[
                KeyCode::Char('i'),
                KeyCode::Char('d'),
                KeyCode::Char('x'),
                KeyCode::Backspace,
            ],
        );
        assert_eq!(input.filter_input, "id");
        assert_eq!(c.state().filter_text, "", "not applied before Enter");

        // 'q' is text here.
        assert_eq!(
            handle_key(&mut input, &mut c, key(KeyCode::Char('q'))),
            KeyAction::None
        );
        press(&mut input, &mut c, &[KeyCode::Backspace, KeyCode::Enter]);
        assert_eq!(input.mode, InputMode::Normal);
        assert_eq!(c.state().filter_text, "id");
        assert_eq!(c.visible_rows().len(), 1);

        press(&mut input, &mut c, &[KeyCode::Char('/')]);
        assert_eq!(input.filter_input, "id", "prefilled");
        press(&mut input, &mut c, &[KeyCode::Char('z'), KeyCode::Esc]);
        assert_eq!(c.state().filter_text, "id", "Esc discards the edit");
    }

    #[test]
    fn test_drill_down_key() {
        let mut c = controller(Mode::Live, CollectionKey::Pga);
        let mut input = InputState::new(true);
        press(&mut input, &mut c, &[KeyCode::Char('>')]);
        assert!(input.status_message.is_some());
        assert_eq!(c.active_tab(), CollectionKey::Pga);

        press(&mut input, &mut c, &[KeyCode::End, KeyCode::Char('>')]);
        assert_eq!(c.active_tab(), CollectionKey::Pgl);
        assert_eq!(c.selected(), Some(&EntityId::Int(42)));
        assert!(input.status_message.is_none());
    }

    #[test]
    fn test_view_cycle() {
        let mut c = controller(Mode::Live, CollectionKey::Pga);
        let mut input = InputState::new(true);
        press(&mut input, &mut c, &[KeyCode::Char('v')]);
        assert_eq!(c.effective_view(), Some("waits"));
    }

    #[test]
    fn test_live_keys() {
        let mut c = controller(Mode::Live, CollectionKey::Pga);
        let mut input = InputState::new(true);
        assert_eq!(
            handle_key(&mut input, &mut c, key(KeyCode::Char(' '))),
            KeyAction::TogglePause
        );
        assert_eq!(
            handle_key(&mut input, &mut c, key(KeyCode::Left)),
            KeyAction::None
        );
        press(&mut input, &mut c, &[KeyCode::Char('b')]);
        assert_eq!(input.mode, InputMode::Normal);
    }

    #[test]
    fn test_history_keys() {
        let mut c = controller(Mode::History, CollectionKey::Pga);
        let mut input = InputState::new(false);
        assert_eq!(
            handle_key(&mut input, &mut c, key(KeyCode::Char(' '))),
            KeyAction::None
        );
        assert_eq!(
            handle_key(&mut input, &mut c, key(KeyCode::Left)),
            KeyAction::HistoryStep(HistoryStep::Back)
        );
        assert_eq!(
            handle_key(&mut input, &mut c, key(KeyCode::Right)),
            KeyAction::HistoryStep(HistoryStep::Forward)
        );
        assert_eq!(
            handle_key(&mut input, &mut c, key_with(KeyCode::Left, KeyModifiers::SHIFT)),
            KeyAction::HistoryStep(HistoryStep::HourBack)
        );
        assert_eq!(
            handle_key(&mut input, &mut c, key_with(KeyCode::Right, KeyModifiers::SHIFT)),
            KeyAction::HistoryStep(HistoryStep::HourForward)
        );
    }

    #[test]
    fn test_time_jump_mode() {
        let mut c = controller(Mode::History, CollectionKey::Pga);
        let mut input = InputState::new(false);
        press(&mut input, &mut c, &[KeyCode::Char('b')]);
        assert_eq!(input.mode, InputMode::TimeJump);

        press(&mut input, &mut c, &[KeyCode::Char('x'), KeyCode::Enter]);
        assert_eq!(input.mode, InputMode::TimeJump);
        assert!(input.time_jump_error.is_some());

        // Ctrl/Alt chars are ignored.
        handle_key(
            &mut input,
            &mut c,
            key_with(KeyCode::Char('a'), KeyModifiers::ALT),
        );
        press(&mut input, &mut c, &[KeyCode::Backspace]);
        assert_eq!(input.time_jump_input, "");
        assert!(input.time_jump_error.is_none());

        for ch in "-1h".chars() {
            press(&mut input, &mut c, &[KeyCode::Char(ch)]);
        }
        assert_eq!(
            handle_key(&mut input, &mut c, key(KeyCode::Enter)),
            KeyAction::JumpToTime(1_738_944_000 - 3600)
        );
        assert_eq!(input.mode, InputMode::Normal);
    }

    #[test]
    fn test_help_toggle() {
        let mut c = controller(Mode::Live, CollectionKey::Pga);
        let mut input = InputState::new(true);
        press(&mut input, &mut c, &[KeyCode::Char('?')]);
        assert!(input.show_help);
        press(&mut input, &mut c, &[KeyCode::Char('3')]);
        assert_eq!(c.active_tab(), CollectionKey::Pga, "help swallows keys");
        press(&mut input, &mut c, &[KeyCode::Char('?')]);
        assert!(!input.show_help);
    }
}
