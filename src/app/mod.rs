//! Main application state and event loop.
//!
//! The app owns the space registry and the last view of every space. Long
//! operations (download, launch) block, so a key press only queues the
//! action; the main loop draws the busy status first and then runs it.

mod input;
mod render;
mod space_ops;

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event};

use crate::registry::SpaceRegistry;
use crate::space::SpaceView;
use crate::ui::StatusKind;

pub use space_ops::SpaceAction;

/// Poll timeout for input events.
const POLL_TIMEOUT_MS: u64 = 250;

/// Main application.
pub struct App {
    /// Wired spaces.
    registry: SpaceRegistry,
    /// Last view of each space, in flat order.
    views: Vec<SpaceView>,
    /// Selected flat index.
    selected: usize,
    /// Status message.
    status: String,
    /// Status severity.
    status_kind: StatusKind,
    /// Action queued by the last key press.
    pending: Option<(usize, SpaceAction)>,
    /// Is running.
    running: bool,
}

impl App {
    /// Creates the app over a wired registry.
    #[must_use]
    pub fn new(registry: SpaceRegistry) -> Self {
        let views = registry.refresh_all();
        let status = format!("{} space(s) available", views.len());
        Self {
            registry,
            views,
            selected: 0,
            status,
            status_kind: StatusKind::Info,
            pending: None,
            running: true,
        }
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &SpaceRegistry {
        &self.registry
    }

    /// Returns the current views.
    #[must_use]
    pub fn views(&self) -> &[SpaceView] {
        &self.views
    }

    /// Returns the selected flat index.
    #[must_use]
    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Returns the status message.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Returns the status severity.
    #[must_use]
    pub fn status_kind(&self) -> StatusKind {
        self.status_kind
    }

    /// Returns true until the user quits.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Returns true if an action is queued.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Sets an informational status message.
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
        self.status_kind = StatusKind::Info;
    }

    /// Sets an error status message.
    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
        self.status_kind = StatusKind::Error;
    }

    /// Moves the selection down.
    pub fn select_next(&mut self) {
        if self.selected + 1 < self.views.len() {
            self.selected += 1;
        }
    }

    /// Moves the selection up.
    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Requests quitting.
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Picks up spaces that finished stopping, then waits briefly for an
    /// input event and handles it.
    ///
    /// # Errors
    /// Returns error if reading terminal events fails.
    pub fn update(&mut self) -> io::Result<()> {
        if self.registry.reap_stopped() > 0 {
            self.views = self.registry.refresh_all();
        }

        if event::poll(Duration::from_millis(POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                self.handle_key(key);
            }
        }
        Ok(())
    }

    /// Terminates every running space.
    pub fn shutdown(&mut self) {
        let stopped = self.registry.terminate_all();
        if stopped > 0 {
            tracing::info!("[APP] Terminated {} running space(s) on exit", stopped);
        }
        self.views = self.registry.refresh_all();
    }
}
