//! unrelative-convert - CLI tool to convert snapshot files in place
//!
//! Rewrites the `<relative-time>` elements of GitHub page snapshots into
//! absolute timestamps, one-shot or continuously with `--watch`.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/unrelative/unrelative.log (~/.local/state/unrelative/unrelative.log)
//! - Config: $XDG_CONFIG_HOME/unrelative/config.toml (~/.config/unrelative/config.toml)

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use serde::Serialize;
use unrelative_core::{rewrite_html, Config, Formatter, Locale, Settings};

#[derive(Parser)]
#[command(name = "unrelative-convert")]
#[command(about = "Convert relative timestamps in GitHub page snapshots")]
#[command(version)]
struct Args {
    /// Snapshot files or directories (directories are searched for *.html)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Verbose output (-v per-file, -vv per-file including unchanged)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Dry run - convert but don't write files back
    #[arg(long)]
    dry_run: bool,

    /// Watch mode - re-convert files as they change instead of one-shot
    #[arg(short, long)]
    watch: bool,

    /// Emit a machine-readable JSON report to stdout
    #[arg(long)]
    json: bool,
}

/// Per-file outcome, printed with -v and serialized with --json.
#[derive(Debug, Serialize)]
struct FileReport {
    path: PathBuf,
    elements: usize,
    converted: usize,
    skipped: usize,
    excluded: bool,
    changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        unrelative_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("unrelative-convert starting");

    let files = discover_snapshots(&args.paths)?;
    if files.is_empty() {
        anyhow::bail!("no snapshot files found under the given paths");
    }

    let formatter = Formatter::new(Locale::from_env());
    let settings = config.display;

    if args.watch {
        run_watch_mode(&args, &settings, &formatter)
    } else {
        run_single_pass(&args, &files, &settings, &formatter)
    }
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

/// Convert one file, writing it back only when the output differs.
fn convert_file(
    path: &Path,
    settings: &Settings,
    formatter: &Formatter,
    dry_run: bool,
) -> FileReport {
    let url_hint = format!("file://{}", path.display());

    let html = match std::fs::read_to_string(path) {
        Ok(html) => html,
        Err(e) => {
            return FileReport {
                path: path.to_path_buf(),
                elements: 0,
                converted: 0,
                skipped: 0,
                excluded: false,
                changed: false,
                error: Some(format!("read failed: {e}")),
            };
        }
    };

    let (out, report) = rewrite_html(&html, &url_hint, settings, formatter);
    for warning in &report.warnings {
        tracing::warn!(path = %path.display(), "{}", warning);
    }

    let mut error = None;
    if report.changed && !dry_run {
        if let Err(e) = std::fs::write(path, &out) {
            error = Some(format!("write failed: {e}"));
        }
    }

    FileReport {
        path: path.to_path_buf(),
        elements: report.elements,
        converted: report.converted,
        skipped: report.skipped,
        excluded: report.excluded,
        changed: report.changed,
        error,
    }
}

/// Run a single conversion pass with progress bar
fn run_single_pass(
    args: &Args,
    files: &[PathBuf],
    settings: &Settings,
    formatter: &Formatter,
) -> Result<()> {
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    if args.json {
        // keep stdout clean for the JSON report
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let mut reports = Vec::with_capacity(files.len());
    for file in files {
        pb.set_message(
            file.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("...")
                .to_string(),
        );
        reports.push(convert_file(file, settings, formatter, args.dry_run));
        pb.inc(1);
    }
    pb.finish_and_clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_summary(&reports, args);
    }

    let converted: usize = reports.iter().map(|r| r.converted).sum();
    tracing::info!(
        files = reports.len(),
        converted,
        "unrelative-convert complete"
    );

    if reports.iter().any(|r| r.error.is_some()) {
        anyhow::bail!("some files could not be converted");
    }
    Ok(())
}

/// Print conversion summary
fn print_summary(reports: &[FileReport], args: &Args) {
    let changed = reports.iter().filter(|r| r.changed).count();
    let excluded = reports.iter().filter(|r| r.excluded).count();
    let converted: usize = reports.iter().map(|r| r.converted).sum();
    let skipped: usize = reports.iter().map(|r| r.skipped).sum();

    if args.dry_run {
        println!("Dry run - no files written");
    }
    println!("Convert complete:");
    println!("  Files scanned:      {}", reports.len());
    println!("  Files changed:      {}", changed);
    println!("  Files excluded:     {}", excluded);
    println!("  Elements converted: {}", converted);
    println!("  Elements skipped:   {}", skipped);

    // -v: per-file lines for files with changes, -vv: every file
    if args.verbose >= 1 {
        let shown: Vec<_> = reports
            .iter()
            .filter(|r| args.verbose >= 2 || r.changed || r.excluded)
            .collect();
        if !shown.is_empty() {
            println!("\nFiles:");
            for report in shown {
                let path_str = shorten_path(&report.path);
                if report.excluded {
                    println!("  {}: excluded", path_str);
                } else {
                    println!(
                        "  {}: {} of {} element(s) converted",
                        path_str, report.converted, report.elements
                    );
                }
            }
        }
    }

    let errors: Vec<_> = reports.iter().filter(|r| r.error.is_some()).collect();
    if !errors.is_empty() {
        println!("\nErrors ({}):", errors.len());
        for report in errors {
            println!(
                "  {}: {}",
                report.path.display(),
                report.error.as_deref().unwrap_or("unknown")
            );
        }
    }
}

/// Run continuous watch mode
fn run_watch_mode(args: &Args, settings: &Settings, formatter: &Formatter) -> Result<()> {
    // Set up signal handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    let (tx, rx) = mpsc::channel();
    let mut debouncer = new_debouncer(Duration::from_millis(100), move |res: DebounceEventResult| {
        let _ = tx.send(res);
    })
    .context("failed to create file watcher")?;

    for path in &args.paths {
        debouncer
            .watcher()
            .watch(path, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", path.display()))?;
    }

    println!("Watch mode active. Press Ctrl+C to stop.");
    println!();

    while running.load(Ordering::SeqCst) {
        let events = match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(Ok(events)) => events,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "File watcher error");
                continue;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        for event in events {
            let path = event.path;
            let is_snapshot = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"));
            if !is_snapshot || !path.is_file() {
                continue;
            }

            let report = convert_file(&path, settings, formatter, args.dry_run);

            // a write of our own output converts nothing and settles here
            if report.changed {
                let timestamp = chrono::Local::now().format("%H:%M:%S");
                println!(
                    "[{}] {}: {} element(s) converted",
                    timestamp,
                    shorten_path(&path),
                    report.converted
                );
            } else if args.verbose >= 1 && report.error.is_none() {
                println!("  {}: unchanged", shorten_path(&path));
            }

            if let Some(error) = report.error {
                println!("  {}: {}", shorten_path(&path), error);
            }
        }
    }

    println!("Watch mode stopped.");
    tracing::info!("unrelative-convert watch mode stopped");

    Ok(())
}

/// Shorten a path for display by abbreviating the home directory
fn shorten_path(path: &Path) -> String {
    if let Ok(home) = std::env::var("HOME") {
        if let Ok(suffix) = path.strip_prefix(&home) {
            return format!("~/{}", suffix.display());
        }
    }
    path.display().to_string()
}
