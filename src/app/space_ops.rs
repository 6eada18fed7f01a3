//! Space lifecycle actions triggered from the panel.

use tracing::{info, warn};

use super::App;
use crate::space::{SpaceController, SpaceError, SpaceView};
use crate::ui::StatusKind;

/// A lifecycle button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceAction {
    /// Download the artifact and install requirements.
    Install,
    /// Delete the mirror directory.
    Uninstall,
    /// Start the space's server.
    Launch,
    /// Stop the space's server.
    Terminate,
}

impl SpaceAction {
    /// Maps a button key to its action.
    #[must_use]
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'i' => Some(Self::Install),
            'u' => Some(Self::Uninstall),
            'l' => Some(Self::Launch),
            't' => Some(Self::Terminate),
            _ => None,
        }
    }

    /// Returns true if the action's button is enabled in `view`.
    #[must_use]
    pub fn is_enabled(self, view: &SpaceView) -> bool {
        match self {
            Self::Install => view.install,
            Self::Uninstall => view.uninstall,
            Self::Launch => view.launch,
            Self::Terminate => view.terminate,
        }
    }

    /// Button caption.
    #[must_use]
    pub fn caption(self) -> &'static str {
        match self {
            Self::Install => "Install",
            Self::Uninstall => "Uninstall",
            Self::Launch => "Launch",
            Self::Terminate => "Terminate",
        }
    }

    /// Progress text shown while the action runs.
    #[must_use]
    pub fn progress(self) -> &'static str {
        match self {
            Self::Install => "Installing",
            Self::Uninstall => "Uninstalling",
            Self::Launch => "Launching",
            Self::Terminate => "Terminating",
        }
    }

    fn apply(self, space: &mut SpaceController) -> Result<SpaceView, SpaceError> {
        match self {
            Self::Install => space.install(),
            Self::Uninstall => space.uninstall(),
            Self::Launch => space.run(),
            Self::Terminate => space.terminate(),
        }
    }
}

impl App {
    /// Queues `action` for the selected space if its button is enabled.
    ///
    /// Returns true if the action was queued.
    pub fn request(&mut self, action: SpaceAction) -> bool {
        let index = self.selected;
        let Some(view) = self.views.get(index) else {
            return false;
        };

        let title = view.label.title().to_string();
        if !action.is_enabled(view) {
            self.set_status(format!(
                "{} is not available for {}",
                action.caption(),
                title
            ));
            return false;
        }

        self.pending = Some((index, action));
        self.status = format!("{} {}...", action.progress(), title);
        self.status_kind = StatusKind::Busy;
        true
    }

    /// Runs the queued action, if any, and updates the affected view.
    pub fn run_pending(&mut self) {
        let Some((index, action)) = self.pending.take() else {
            return;
        };
        let Some(space) = self.registry.get_mut(index) else {
            return;
        };

        let title = space.title().to_string();
        match action.apply(space) {
            Ok(view) => {
                info!("[APP] {:?} {} succeeded", action, title);
                let status = view.label.to_string();
                if let Some(slot) = self.views.get_mut(index) {
                    *slot = view;
                }
                self.set_status(status);
            }
            Err(e) => {
                warn!("[APP] {:?} {} failed: {}", action, title, e);
                let view = space.refresh();
                if let Some(slot) = self.views.get_mut(index) {
                    *slot = view;
                }
                self.set_error(format!("{}: {}", title, e));
            }
        }
    }
}
