//! UI widgets for the space host.

pub mod footer;
pub mod space_panel;

pub use footer::{Footer, StatusKind};
pub use space_panel::{BUTTONS, Button, SpacePanel, enabled_buttons};
