//! Spacehost - Main entry point.
//!
//! A terminal panel for installing, launching and terminating spaces.
//!
//! Usage: spacehost [OPTIONS]
//!
//! Options:
//!   --version, -v        Show version
//!   --list               Print discovered spaces and exit
//!   --config <PATH>      Use a config file other than ~/.spacehostrc

use std::env;
use std::io;
use std::panic;
use std::path::PathBuf;

use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use spacehost::extension::discover_extensions;
use spacehost::space::SpaceServices;
use spacehost::{App, Config, SpaceRegistry, logging};

/// Version from Cargo.toml.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum iterations for main loop (safety bound).
const MAX_MAIN_ITERATIONS: usize = 10_000_000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();

    // Handle --version flag
    if args.iter().any(|a| a == "--version" || a == "-v") {
        println!("spacehost v{}", VERSION);
        return Ok(());
    }

    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let config = match config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    if let Err(e) = logging::init(&config.log_config) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let extensions = discover_extensions(&config.extensions_dir)?;
    let registry = SpaceRegistry::wire(&extensions, &SpaceServices::from_config(&config));

    // Handle --list flag
    if args.iter().any(|a| a == "--list") {
        print_spaces(&registry);
        return Ok(());
    }

    // Set up panic hook to restore terminal on panic
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(registry);

    // Main event loop
    let mut iterations = 0;
    let result = loop {
        if !app.is_running() || iterations >= MAX_MAIN_ITERATIONS {
            break Ok(());
        }
        iterations += 1;

        if let Err(e) = terminal.draw(|frame| app.render(frame)) {
            break Err(e);
        }

        // Queued actions run after the busy status has been drawn.
        if app.has_pending() {
            app.run_pending();
            continue;
        }

        if let Err(e) = app.update() {
            break Err(e);
        }
    };

    // Shutdown
    app.shutdown();

    // Restore terminal
    restore_terminal()?;

    result.map_err(Into::into)
}

/// Prints every wired space with its state.
fn print_spaces(registry: &SpaceRegistry) {
    if registry.is_empty() {
        println!("No space extensions found.");
        return;
    }

    for group in registry.groups() {
        println!("{}", group.tag);
        for space in &group.spaces {
            println!("  {}", space.refresh().label);
        }
    }
}

/// Restores the terminal to its original state.
fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}
