//! Spacehost
//!
//! A terminal host for spaces: optional web sub-applications contributed
//! by extensions. Each space can be downloaded into its extension
//! directory, launched on a free local port, terminated and removed.
//!
//! # Architecture
//!
//! - **Port Module**: free TCP port probe
//! - **Space Module**: labels, lifecycle controller, worker thread, loaders
//! - **Extension Module**: extension discovery and manifests
//! - **Registry Module**: one controller per space, grouped by tag
//! - **UI Module**: Ratatui widgets for the space panel
//!
//! # Usage
//!
//! ```no_run
//! use spacehost::extension::discover_extensions;
//! use spacehost::registry::SpaceRegistry;
//! use spacehost::space::SpaceServices;
//! use spacehost::{App, Config};
//!
//! let config = Config::load().expect("Failed to load config");
//! let extensions = discover_extensions(&config.extensions_dir).expect("Failed to scan");
//! let registry = SpaceRegistry::wire(&extensions, &SpaceServices::from_config(&config));
//! let mut app = App::new(registry);
//! // Run event loop...
//! ```

// Clippy configuration - allow common patterns
#![allow(clippy::unnested_or_patterns)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::similar_names)]
#![allow(clippy::struct_excessive_bools)]

pub mod app;
pub mod config;
pub mod extension;
pub mod logging;
pub mod port;
pub mod registry;
pub mod space;
pub mod ui;

// Re-export main types
pub use app::App;
pub use config::Config;
pub use port::{find_free_addr, find_free_port};
pub use registry::SpaceRegistry;
pub use space::{SpaceController, SpaceError, SpaceView};
