//! Application state for the TUI.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::TableState;
use unrelative_core::{
    matches_github_origin, ChangeWatcher, Config, Formatter, Page, PageEvent, Rewriter, Settings,
    SettingsUpdate, TimeFormat,
};

/// How long a save status message stays visible.
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Current view mode
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum ViewMode {
    /// Page list view (default)
    #[default]
    PageList,
    /// Page detail view showing per-element conversions
    PageDetail,
    /// Settings panel
    Settings,
}

/// Focused field in the settings panel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum SettingsField {
    #[default]
    TimeFormat,
    ColorByDay,
    DateFormat,
}

impl SettingsField {
    pub fn next(self) -> Self {
        match self {
            SettingsField::TimeFormat => SettingsField::ColorByDay,
            SettingsField::ColorByDay => SettingsField::DateFormat,
            SettingsField::DateFormat => SettingsField::TimeFormat,
        }
    }
}

/// Editable copy of the settings, bound to the panel controls.
#[derive(Debug, Clone)]
pub struct SettingsForm {
    pub time_format: TimeFormat,
    pub color_by_day: bool,
    pub date_format: String,
    pub focus: SettingsField,
}

impl SettingsForm {
    fn from_settings(settings: &Settings) -> Self {
        Self {
            time_format: settings.time_format,
            color_by_day: settings.color_by_day,
            date_format: if settings.date_format == "auto" {
                String::new()
            } else {
                settings.date_format.clone()
            },
            focus: SettingsField::default(),
        }
    }

    fn to_settings(&self) -> Settings {
        let trimmed = self.date_format.trim();
        Settings {
            time_format: self.time_format,
            color_by_day: self.color_by_day,
            date_format: if trimmed.is_empty() {
                "auto".to_string()
            } else {
                trimmed.to_string()
            },
        }
    }
}

/// One open snapshot: page, rewriter, change watcher, and cached settings.
///
/// Each session keeps its own settings cache; the panel's broadcast merges
/// into every matching session, mirroring one content-script instance per tab.
pub struct PageSession {
    pub path: PathBuf,
    pub page: Page,
    pub rewriter: Rewriter,
    pub watcher: ChangeWatcher,
    pub settings: Settings,
    pub converted: usize,
    pub excluded: bool,
}

impl PageSession {
    /// Open a snapshot file and run the initial conversion pass.
    pub fn open(path: &Path, settings: &Settings, formatter: &Formatter) -> Result<Self> {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let url = format!("file://{}", path.display());

        let mut session = Self {
            path: path.to_path_buf(),
            page: Page::from_html(&html, &url),
            rewriter: Rewriter::new(),
            watcher: ChangeWatcher::new(),
            settings: settings.clone(),
            converted: 0,
            excluded: false,
        };
        session.convert(formatter);

        tracing::info!(
            path = %path.display(),
            url = %session.page.url(),
            elements = session.page.len(),
            converted = session.converted,
            "Page session opened"
        );

        Ok(session)
    }

    /// Run a full conversion pass with the session's cached settings.
    ///
    /// `converted` is the number of elements currently holding converted
    /// text (the live guard count), not a running total across passes.
    pub fn convert(&mut self, formatter: &Formatter) {
        let summary = self
            .rewriter
            .convert_all(&mut self.page, &self.settings, formatter);
        self.excluded = summary.excluded;
        self.converted = self.rewriter.guarded();
    }

    /// Re-read the snapshot from disk and feed the diff into the watcher.
    pub fn resync_from_disk(&mut self, now: Instant) -> Result<()> {
        let html = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to re-read snapshot {}", self.path.display()))?;

        let events = self.page.resync(&html);
        for event in &events {
            if let PageEvent::ElementRemoved(key) = event {
                self.rewriter.forget(*key);
            }
        }
        // any disk change is a mutation burst; the watcher also picks up a
        // URL change from the polled URL
        if !events.is_empty() {
            let url = self.page.url().to_string();
            self.watcher.observe_mutation(&url, now);
        }

        // reverted regions are corrected within this turn
        self.rewriter.enforce_guards(&mut self.page);
        self.converted = self.rewriter.guarded();
        Ok(())
    }

    /// Receive a settings broadcast: merge present fields, convert at once.
    pub fn receive_update(&mut self, update: &SettingsUpdate, formatter: &Formatter) {
        self.settings.apply_update(update);
        self.convert(formatter);
    }
}

/// Main application state.
pub struct App {
    /// Open page sessions, one per snapshot file
    pub sessions: Vec<PageSession>,
    /// Current view mode
    pub view_mode: ViewMode,
    /// Page table selection state
    pub table_state: TableState,
    /// Scroll offset for the detail view
    pub detail_scroll: usize,
    /// Settings panel form state
    pub form: SettingsForm,
    /// Persisted settings as last loaded/saved
    pub saved_settings: Settings,
    /// Transient status line: (message, is_error, shown_at)
    pub status: Option<(String, bool, Instant)>,
    /// Shared formatter (locale and offset fixed at startup)
    pub formatter: Formatter,
    /// Whether the app should exit
    pub should_quit: bool,
}

impl App {
    pub fn new(settings: Settings, formatter: Formatter) -> Self {
        let mut table_state = TableState::default();
        table_state.select(Some(0));
        Self {
            sessions: Vec::new(),
            view_mode: ViewMode::default(),
            table_state,
            detail_scroll: 0,
            form: SettingsForm::from_settings(&settings),
            saved_settings: settings,
            status: None,
            formatter,
            should_quit: false,
        }
    }

    /// Open a session for each snapshot path.
    pub fn open_sessions(&mut self, paths: &[PathBuf]) -> Result<()> {
        for path in paths {
            match PageSession::open(path, &self.saved_settings, &self.formatter) {
                Ok(session) => self.sessions.push(session),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to open snapshot");
                }
            }
        }
        if self.sessions.is_empty() {
            anyhow::bail!("no readable snapshot files");
        }
        Ok(())
    }

    pub fn selected_session(&self) -> Option<&PageSession> {
        self.table_state
            .selected()
            .and_then(|i| self.sessions.get(i))
    }

    /// Find the session backing a filesystem path.
    pub fn session_for_path(&mut self, path: &Path) -> Option<&mut PageSession> {
        self.sessions.iter_mut().find(|s| s.path == path)
    }

    /// Poll every session's change watcher; run conversions for due rescans.
    pub fn poll_watchers(&mut self, now: Instant) {
        for i in 0..self.sessions.len() {
            if let Some(reason) = self.sessions[i].watcher.poll(now) {
                tracing::debug!(
                    path = %self.sessions[i].path.display(),
                    reason = ?reason,
                    "Rescan due"
                );
                let formatter = self.formatter.clone();
                self.sessions[i].convert(&formatter);
            }
        }
    }

    /// Expire the transient status line.
    pub fn tick(&mut self, now: Instant) {
        if let Some((_, _, shown_at)) = self.status {
            if now.duration_since(shown_at) >= STATUS_TIMEOUT {
                self.status = None;
            }
        }
    }

    /// Disconnect all watchers before teardown.
    pub fn shutdown(&mut self) {
        for session in &mut self.sessions {
            session.watcher.disconnect();
        }
    }

    /// Handle a key event for the current view.
    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.view_mode {
            ViewMode::PageList => self.handle_list_key(key),
            ViewMode::PageDetail => self.handle_detail_key(key),
            ViewMode::Settings => self.handle_settings_key(key),
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Char('j') | KeyCode::Down => self.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.select_previous(),
            KeyCode::Enter => {
                if self.selected_session().is_some() {
                    self.detail_scroll = 0;
                    self.view_mode = ViewMode::PageDetail;
                }
            }
            KeyCode::Char('s') => {
                self.form = SettingsForm::from_settings(&self.saved_settings);
                self.view_mode = ViewMode::Settings;
            }
            KeyCode::Char('r') => self.reload_selected(),
            _ => {}
        }
    }

    fn handle_detail_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.view_mode = ViewMode::PageList;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.detail_scroll = self.detail_scroll.saturating_add(1);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.detail_scroll = self.detail_scroll.saturating_sub(1);
            }
            _ => {}
        }
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.view_mode = ViewMode::PageList;
            }
            KeyCode::Tab => {
                self.form.focus = self.form.focus.next();
            }
            KeyCode::Enter => self.save_settings(),
            KeyCode::Left | KeyCode::Right | KeyCode::Char(' ')
                if self.form.focus == SettingsField::TimeFormat =>
            {
                self.form.time_format = match self.form.time_format {
                    TimeFormat::Auto => TimeFormat::Hour12,
                    TimeFormat::Hour12 => TimeFormat::Hour24,
                    TimeFormat::Hour24 => TimeFormat::Auto,
                };
            }
            KeyCode::Char(' ') if self.form.focus == SettingsField::ColorByDay => {
                self.form.color_by_day = !self.form.color_by_day;
            }
            KeyCode::Backspace if self.form.focus == SettingsField::DateFormat => {
                self.form.date_format.pop();
            }
            KeyCode::Char(c) if self.form.focus == SettingsField::DateFormat => {
                self.form.date_format.push(c);
            }
            _ => {}
        }
    }

    fn select_next(&mut self) {
        let i = match self.table_state.selected() {
            Some(i) if i + 1 < self.sessions.len() => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.table_state.select(Some(i));
    }

    fn select_previous(&mut self) {
        let i = self.table_state.selected().unwrap_or(0).saturating_sub(1);
        self.table_state.select(Some(i));
    }

    /// Reload the selected page from disk; treated as history navigation,
    /// so the rescan is immediate rather than debounced.
    fn reload_selected(&mut self) {
        let Some(i) = self.table_state.selected() else {
            return;
        };
        let Some(session) = self.sessions.get_mut(i) else {
            return;
        };

        let now = Instant::now();
        if let Err(e) = session.resync_from_disk(now) {
            tracing::warn!(path = %session.path.display(), error = %e, "Reload failed");
            self.status = Some((format!("Reload failed: {e}"), true, now));
            return;
        }
        session.watcher.observe_history_nav(now);
    }

    /// Save the settings form: validate, persist, broadcast, re-convert.
    ///
    /// Validation or persistence failure shows an error and leaves every
    /// session's cached settings untouched.
    fn save_settings(&mut self) {
        let now = Instant::now();
        let settings = self.form.to_settings();

        if let Err(e) = settings.validate() {
            self.status = Some((e.to_string(), true, now));
            return;
        }

        // the panel writes [display] only; re-read the file so the
        // [logging] section survives the save
        let mut config = Config::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not re-read config before save");
            Config::default()
        });
        config.display = settings.clone();
        if let Err(e) = config.save() {
            tracing::warn!(error = %e, "Failed to persist settings");
            self.status = Some((format!("Error saving settings: {e}"), true, now));
            return;
        }

        self.saved_settings = settings.clone();
        self.status = Some(("Settings saved successfully!".to_string(), false, now));

        // notify ALL matching sessions, not just the selected one
        let update = SettingsUpdate::from_settings(&settings);
        let formatter = self.formatter.clone();
        let mut notified = 0;
        for session in &mut self.sessions {
            if matches_github_origin(session.page.url()) {
                session.receive_update(&update, &formatter);
                notified += 1;
            }
        }
        tracing::info!(notified, "Settings update broadcast");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use crossterm::event::KeyEvent;
    use unrelative_core::Locale;

    fn app() -> App {
        let formatter =
            Formatter::with_offset(Locale::new("en-US"), FixedOffset::east_opt(0).unwrap());
        App::new(Settings::default(), formatter)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::from(code)
    }

    #[test]
    fn test_settings_form_round_trip() {
        let settings = Settings {
            time_format: TimeFormat::Hour12,
            date_format: "YY-MM-DD".to_string(),
            color_by_day: true,
        };
        let form = SettingsForm::from_settings(&settings);
        assert_eq!(form.to_settings(), settings);

        // empty pattern input means auto
        let form = SettingsForm::from_settings(&Settings::default());
        assert_eq!(form.date_format, "");
        assert_eq!(form.to_settings().date_format, "auto");
    }

    #[test]
    fn test_invalid_pattern_shows_error_without_saving() {
        let mut app = app();
        app.view_mode = ViewMode::Settings;
        app.form.focus = SettingsField::DateFormat;
        app.form.date_format = "YYYY-MM-DD".to_string();

        app.handle_key(key(KeyCode::Enter));

        let (message, is_error, _) = app.status.clone().expect("status message");
        assert!(is_error);
        assert!(message.contains("YY (2-digit year)"));
        assert_eq!(app.saved_settings, Settings::default());
    }

    #[test]
    fn test_time_format_cycles() {
        let mut app = app();
        app.view_mode = ViewMode::Settings;
        app.form.focus = SettingsField::TimeFormat;

        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.form.time_format, TimeFormat::Hour12);
        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.form.time_format, TimeFormat::Hour24);
        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.form.time_format, TimeFormat::Auto);
    }

    #[test]
    fn test_status_expires_after_timeout() {
        let mut app = app();
        let shown = Instant::now();
        app.status = Some(("saved".to_string(), false, shown));

        app.tick(shown + Duration::from_secs(1));
        assert!(app.status.is_some());

        app.tick(shown + Duration::from_secs(4));
        assert!(app.status.is_none());
    }

    #[test]
    fn test_quit_key() {
        let mut app = app();
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn test_save_preserves_logging_section() {
        let temp = tempfile::TempDir::new().unwrap();
        std::env::set_var("XDG_CONFIG_HOME", temp.path());
        let config_dir = temp.path().join("unrelative");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            "[logging]\nlevel = \"debug\"\nmax_files = 9\n",
        )
        .unwrap();

        let mut app = app();
        app.view_mode = ViewMode::Settings;
        app.form.time_format = TimeFormat::Hour24;
        app.handle_key(key(KeyCode::Enter));

        let (_, is_error, _) = app.status.clone().expect("status message");
        assert!(!is_error, "save should succeed");

        let reloaded = Config::load().unwrap();
        assert_eq!(reloaded.display.time_format, TimeFormat::Hour24);
        assert_eq!(reloaded.logging.level, "debug", "logging section kept");
        assert_eq!(reloaded.logging.max_files, 9);
    }

    #[test]
    fn test_converted_count_does_not_accumulate() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("commits.html");
        std::fs::write(
            &path,
            concat!(
                "<html><head><meta property=\"og:url\" ",
                "content=\"https://github.com/rust-lang/rust\"></head><body>",
                "<relative-time datetime=\"2024-03-07T15:05:00Z\" ",
                "title=\"Mar 7, 2024, 3:05 PM GMT\">3 days ago</relative-time>",
                "<relative-time datetime=\"2024-03-06T09:30:00Z\" ",
                "title=\"Mar 6, 2024, 9:30 AM GMT\">4 days ago</relative-time>",
                "</body></html>"
            ),
        )
        .unwrap();

        let formatter =
            Formatter::with_offset(Locale::new("en-US"), FixedOffset::east_opt(0).unwrap());
        let mut session = PageSession::open(&path, &Settings::default(), &formatter).unwrap();
        assert_eq!(session.converted, 2);

        // a settings change reconverts every element; the count must not sum
        let update = SettingsUpdate {
            time_format: Some(TimeFormat::Hour24),
            ..Default::default()
        };
        session.receive_update(&update, &formatter);
        assert_eq!(session.converted, 2);
    }
}
