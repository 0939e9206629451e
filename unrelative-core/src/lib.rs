//! # unrelative-core
//!
//! Core library for unrelative - rewrites GitHub's relative timestamps
//! ("3 days ago") in page snapshots into absolute, user-configured strings.
//!
//! This library provides:
//! - Timestamp formatting (date tokens, 12h/24h, day colors)
//! - `<relative-time>` scanning and splicing over snapshot HTML
//! - A live page model with stable element identity across re-reads
//! - The rewriter with per-element guards that keep converted text in place
//! - Debounced change watching for mutation, navigation, and history events
//! - Configuration management and the settings update protocol
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use unrelative_core::{Config, Formatter, Locale, Page, Rewriter};
//!
//! let config = Config::load().expect("failed to load config");
//! let formatter = Formatter::new(Locale::from_env());
//!
//! let html = std::fs::read_to_string("snapshot.html").expect("failed to read snapshot");
//! let mut page = Page::from_html(&html, "file:///snapshot.html");
//! let mut rewriter = Rewriter::new();
//! let summary = rewriter.convert_all(&mut page, &config.display, &formatter);
//! println!("converted {} of {} elements", summary.converted, page.len());
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, Settings, SettingsUpdate, TimeFormat};
pub use error::{Error, Result};
pub use format::{day_color, DayColor, FormattedStamp, Formatter, DAY_PALETTE};
pub use locale::{DateOrder, Locale};
pub use page::{ElementKey, Page, PageElement, PageEvent};
pub use rewrite::{
    is_excluded_url, matches_github_origin, rewrite_html, ConvertSummary, RewriteReport, Rewriter,
};
pub use watch::{ChangeWatcher, Debouncer, RescanReason, DEBOUNCE_WINDOW, NAVIGATION_SETTLE};

// Public modules
pub mod config;
pub mod error;
pub mod format;
pub mod html;
pub mod locale;
pub mod logging;
pub mod page;
pub mod rewrite;
pub mod watch;
