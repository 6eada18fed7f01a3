//! Rendering methods for the App.

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::widgets::Clear;

use super::App;
use crate::ui::{Footer, SpacePanel};

/// Footer height: status line plus key hints.
const FOOTER_HEIGHT: u16 = 2;

impl App {
    /// Renders the application.
    pub fn render(&self, frame: &mut ratatui::Frame) {
        let area = frame.area();
        frame.render_widget(Clear, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(FOOTER_HEIGHT)])
            .split(area);

        let panel = SpacePanel::new(&self.registry, &self.views)
            .selected(self.selected)
            .focused(!self.has_pending());
        frame.render_widget(panel, chunks[0]);

        frame.render_widget(Footer::new(&self.status, self.status_kind), chunks[1]);
    }
}
