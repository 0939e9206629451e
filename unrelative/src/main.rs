//! unrelative - absolute timestamps for GitHub page snapshots
//!
//! Terminal UI hosting one page session per opened snapshot file. Sessions
//! watch their files for regeneration, keep converted timestamps stable
//! through the per-element guards, and share a settings panel that
//! broadcasts changes to every matching session.

mod app;
mod ui;

use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use notify::{RecursiveMode, Watcher};
use ratatui::{backend::CrosstermBackend, Terminal};
use unrelative_core::{Config, Formatter, Locale};

use crate::app::App;

#[derive(Parser)]
#[command(name = "unrelative")]
#[command(about = "View GitHub page snapshots with absolute timestamps")]
#[command(version)]
struct Args {
    /// Snapshot files or directories (directories are searched for *.html)
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging (to file, not stdout since we have a TUI)
    let _log_guard =
        unrelative_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("unrelative TUI starting up");

    let files = discover_snapshots(&args.paths)?;
    if files.is_empty() {
        anyhow::bail!("no snapshot files found under the given paths");
    }

    let formatter = Formatter::new(Locale::from_env());
    let mut app = App::new(config.display, formatter);
    app.open_sessions(&files)
        .context("failed to open snapshot sessions")?;

    // Filesystem events feed the per-session change watchers.
    let (tx, rx) = mpsc::channel();
    let mut fs_watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })
    .context("failed to create file watcher")?;
    for file in &files {
        fs_watcher
            .watch(file, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", file.display()))?;
    }

    // Setup terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    // Run the main loop
    let result = run_app(&mut terminal, &mut app, &rx);

    // Disconnect watchers before the terminal is restored
    app.shutdown();

    // Restore terminal
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    tracing::info!("unrelative TUI shutting down");

    result
}

/// Expand files and directories into the list of snapshot files.
fn discover_snapshots(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for pattern in ["**/*.html", "**/*.htm"] {
                let full = path.join(pattern);
                let full = full.to_string_lossy();
                for entry in glob::glob(&full)
                    .with_context(|| format!("bad glob pattern for {}", path.display()))?
                {
                    match entry {
                        Ok(p) => files.push(p),
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping unreadable directory entry")
                        }
                    }
                }
            }
        } else {
            files.push(path.clone());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Run the main application loop.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    fs_events: &mpsc::Receiver<notify::Result<notify::Event>>,
) -> Result<()> {
    loop {
        let now = Instant::now();

        // Drain filesystem events; resync changed pages from disk.
        while let Ok(event) = fs_events.try_recv() {
            match event {
                Ok(event) => {
                    for path in event.paths {
                        if let Some(session) = app.session_for_path(&path) {
                            if let Err(e) = session.resync_from_disk(now) {
                                tracing::warn!(
                                    path = %path.display(),
                                    error = %e,
                                    "Resync from disk failed"
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "File watcher error"),
            }
        }

        // Due rescans become conversion passes.
        app.poll_watchers(now);

        // Expire transient status messages.
        app.tick(now);

        // Render
        terminal.draw(|frame| ui::render(frame, app))?;

        // Handle events
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    Ok(())
}
