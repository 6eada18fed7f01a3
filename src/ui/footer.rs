//! Footer widget: status message above a row of key hints.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

/// Key hints shown in the footer.
const HINTS: [(&str, &str); 6] = [
    ("\u{2191}\u{2193}", "Select"),
    ("i", "Install"),
    ("u", "Uninstall"),
    ("l", "Launch"),
    ("t", "Terminate"),
    ("q", "Quit"),
];

/// Severity of the status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusKind {
    /// Plain information.
    #[default]
    Info,
    /// A long operation is in progress.
    Busy,
    /// The last operation failed.
    Error,
}

impl StatusKind {
    const fn color(self) -> Color {
        match self {
            Self::Info => Color::Gray,
            Self::Busy => Color::Yellow,
            Self::Error => Color::Red,
        }
    }
}

/// Two-line footer.
pub struct Footer<'a> {
    status: &'a str,
    kind: StatusKind,
}

impl<'a> Footer<'a> {
    /// Creates a footer showing `status`, styled by `kind`.
    #[must_use]
    pub fn new(status: &'a str, kind: StatusKind) -> Self {
        Self { status, kind }
    }
}

fn hint_line() -> Line<'static> {
    let mut spans = Vec::with_capacity(HINTS.len() * 3);
    for (i, (key, desc)) in HINTS.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" \u{2502} ", Style::default().fg(Color::DarkGray)));
        }
        spans.push(Span::styled(
            format!(" {} ", key),
            Style::default()
                .bg(Color::DarkGray)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!(" {}", desc),
            Style::default().fg(Color::Gray),
        ));
    }
    Line::from(spans)
}

impl Widget for Footer<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let status = Line::from(Span::styled(
            self.status.to_string(),
            Style::default().fg(self.kind.color()),
        ));
        Paragraph::new(vec![status, hint_line()]).render(area, buf);
    }
}
