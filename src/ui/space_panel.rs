//! Space panel widget.
//!
//! Lists every wired space under its tag header. Each space takes two rows:
//! the label (title and status) and its four lifecycle buttons, dimmed when
//! the button is disabled.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::registry::SpaceRegistry;
use crate::space::{SpaceLabel, SpaceView};

/// Marker shown in front of the selected space.
const SELECTED_MARKER: &str = "\u{25b6} ";
/// Indent for unselected spaces.
const UNSELECTED_MARKER: &str = "  ";

/// A lifecycle button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Button {
    /// Key that triggers the button.
    pub key: char,
    /// Caption.
    pub caption: &'static str,
}

/// The four buttons of a space row, in display order.
pub const BUTTONS: [Button; 4] = [
    Button {
        key: 'i',
        caption: "Install",
    },
    Button {
        key: 'u',
        caption: "Uninstall",
    },
    Button {
        key: 'l',
        caption: "Launch",
    },
    Button {
        key: 't',
        caption: "Terminate",
    },
];

/// Returns which of [`BUTTONS`] are enabled for `view`.
#[must_use]
pub fn enabled_buttons(view: &SpaceView) -> [bool; 4] {
    [view.install, view.uninstall, view.launch, view.terminate]
}

/// Space panel widget.
pub struct SpacePanel<'a> {
    registry: &'a SpaceRegistry,
    views: &'a [SpaceView],
    selected: usize,
    focused: bool,
}

impl<'a> SpacePanel<'a> {
    /// Creates a panel over `registry`, with one view per space in flat order.
    #[must_use]
    pub fn new(registry: &'a SpaceRegistry, views: &'a [SpaceView]) -> Self {
        Self {
            registry,
            views,
            selected: 0,
            focused: true,
        }
    }

    /// Sets the selected flat index.
    #[must_use]
    pub fn selected(mut self, selected: usize) -> Self {
        self.selected = selected;
        self
    }

    /// Sets whether the panel has focus.
    #[must_use]
    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    /// Builds the panel lines and the line index of the selected space.
    fn lines(&self) -> (Vec<Line<'a>>, usize) {
        let mut lines = Vec::new();
        let mut selected_line = 0;
        let mut index = 0;

        for group in self.registry.groups() {
            if !lines.is_empty() {
                lines.push(Line::default());
            }
            lines.push(Line::from(Span::styled(
                group.tag.clone(),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            )));

            for _ in &group.spaces {
                let Some(view) = self.views.get(index) else {
                    break;
                };
                let is_selected = index == self.selected;
                if is_selected {
                    selected_line = lines.len();
                }
                lines.push(label_line(&view.label, is_selected));
                lines.push(button_line(view));
                index += 1;
            }
        }

        (lines, selected_line)
    }
}

/// Renders the label row of a space.
fn label_line(label: &SpaceLabel, selected: bool) -> Line<'static> {
    let marker = if selected {
        SELECTED_MARKER
    } else {
        UNSELECTED_MARKER
    };
    let title_style = if selected {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };

    let mut spans = vec![
        Span::styled(marker, Style::default().fg(Color::Yellow)),
        Span::styled(label.title().to_string(), title_style),
        Span::raw("  "),
    ];

    match label {
        SpaceLabel::Running { url, .. } => {
            spans.push(Span::styled(
                "Currently Running: ",
                Style::default().fg(Color::Green),
            ));
            spans.push(Span::styled(
                url.clone(),
                Style::default()
                    .fg(Color::Blue)
                    .add_modifier(Modifier::UNDERLINED),
            ));
        }
        _ => spans.push(Span::styled(
            label.status(),
            Style::default().fg(Color::Gray),
        )),
    }

    Line::from(spans)
}

/// Renders the button row of a space.
fn button_line(view: &SpaceView) -> Line<'static> {
    let mut spans = vec![Span::raw("    ")];

    for (button, enabled) in BUTTONS.iter().zip(enabled_buttons(view)) {
        let style = if enabled {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::DIM)
        };
        spans.push(Span::styled(
            format!(" {} {} ", button.key, button.caption),
            style,
        ));
        spans.push(Span::raw(" "));
    }

    Line::from(spans)
}

impl Widget for SpacePanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_color = if self.focused {
            Color::Cyan
        } else {
            Color::DarkGray
        };

        let block = Block::default()
            .title(" Spaces ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color));

        let inner = block.inner(area);
        block.render(area, buf);

        if self.registry.is_empty() {
            Paragraph::new(Line::from(Span::styled(
                "No space extensions found",
                Style::default().fg(Color::DarkGray),
            )))
            .render(inner, buf);
            return;
        }

        let (lines, selected_line) = self.lines();

        // Keep the selected label and its buttons on screen.
        let height = usize::from(inner.height);
        let scroll = (selected_line + 2).saturating_sub(height);
        let scroll = u16::try_from(scroll).unwrap_or(u16::MAX);

        Paragraph::new(lines).scroll((scroll, 0)).render(inner, buf);
    }
}
