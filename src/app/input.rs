//! Input handling for the application.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::{App, SpaceAction};

impl App {
    /// Handles a key event.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        // Keys are ignored while an action is queued.
        if self.has_pending() {
            return;
        }

        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c')) | (_, KeyCode::Char('q') | KeyCode::Esc) => {
                self.quit();
            }
            (_, KeyCode::Up | KeyCode::Char('k')) => self.select_prev(),
            (_, KeyCode::Down | KeyCode::Char('j')) => self.select_next(),
            (_, KeyCode::Char(c)) => {
                if let Some(action) = SpaceAction::from_key(c) {
                    self.request(action);
                }
            }
            _ => {}
        }
    }
}
