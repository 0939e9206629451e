//! Change watching: debounce and rescan scheduling.
//!
//! Three independent trigger sources converge on a single rescan request:
//! subtree mutations (debounced), SPA-style URL changes detected at mutation
//! time (scheduled after a settle delay), and history navigation (immediate).
//! Everything here is host-independent; the clock is passed in, so the whole
//! state machine is testable without a real page or real sleeps.

use std::time::{Duration, Instant};

/// Canonical debounce window for mutation bursts.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// Delay after a detected URL change, letting the new view's content settle.
pub const NAVIGATION_SETTLE: Duration = Duration::from_millis(500);

/// Trailing-edge debouncer.
///
/// Each `schedule` replaces the pending deadline; only the last trigger in a
/// burst fires, once its window elapses.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Arm (or re-arm) the deadline at `now + window`.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// Fire the pending call if its deadline has passed.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// Why a rescan was requested.
///
/// When several sources are due at the same poll, the most urgent wins;
/// one rescan covers all of them anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescanReason {
    /// Browser-history navigation (back/forward)
    History,
    /// SPA-style URL change
    Navigation,
    /// Subtree mutation burst
    Mutation,
}

/// Converges mutation, navigation, and history events into debounced rescans.
#[derive(Debug)]
pub struct ChangeWatcher {
    mutations: Debouncer,
    settle: Duration,
    last_url: Option<String>,
    nav_deadline: Option<Instant>,
    history_pending: bool,
    connected: bool,
}

impl Default for ChangeWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeWatcher {
    pub fn new() -> Self {
        Self::with_windows(DEBOUNCE_WINDOW, NAVIGATION_SETTLE)
    }

    /// Watcher with explicit windows (used by tests).
    pub fn with_windows(window: Duration, settle: Duration) -> Self {
        Self {
            mutations: Debouncer::new(window),
            settle,
            last_url: None,
            nav_deadline: None,
            history_pending: false,
            connected: true,
        }
    }

    /// Observe a subtree mutation. The current URL is polled on every
    /// mutation; a change means SPA navigation happened.
    pub fn observe_mutation(&mut self, current_url: &str, now: Instant) {
        if !self.connected {
            return;
        }

        let navigated = self
            .last_url
            .as_deref()
            .is_some_and(|last| last != current_url);
        if self.last_url.is_none() || navigated {
            self.last_url = Some(current_url.to_string());
        }
        if navigated {
            tracing::debug!(url = current_url, "Navigation detected, settling");
            self.nav_deadline = Some(now + self.settle);
        }

        self.mutations.schedule(now);
    }

    /// Observe browser-history navigation: rescan without delay.
    pub fn observe_history_nav(&mut self, _now: Instant) {
        if !self.connected {
            return;
        }
        self.history_pending = true;
    }

    /// At most one due rescan per poll. History and navigation rescans clear
    /// every pending source, since one full conversion pass covers them all;
    /// a pending navigation settle survives a mutation fire.
    pub fn poll(&mut self, now: Instant) -> Option<RescanReason> {
        if !self.connected {
            return None;
        }

        if self.history_pending {
            self.clear_pending();
            return Some(RescanReason::History);
        }

        if self.nav_deadline.is_some_and(|deadline| now >= deadline) {
            self.clear_pending();
            return Some(RescanReason::Navigation);
        }

        if self.mutations.fire_due(now) {
            return Some(RescanReason::Mutation);
        }

        None
    }

    /// Tear down at page unload: further events are ignored and pending work
    /// is dropped.
    pub fn disconnect(&mut self) {
        self.connected = false;
        self.clear_pending();
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn clear_pending(&mut self) {
        self.history_pending = false;
        self.nav_deadline = None;
        self.mutations.cancel();
    }
}
