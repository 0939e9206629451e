//! The rewriter: element conversion, guards, and URL policy.
//!
//! [`Rewriter`] converts every timestamp element on a [`Page`] and then keeps
//! the converted text in place. Guard state lives in side tables keyed by
//! element identity, never on the elements themselves:
//!
//! - `guards` remembers the last text written per element; enforcement
//!   rewrites a region only when it diverges, so a guard can never trigger
//!   itself.
//! - `applied` remembers a fingerprint of (settings, raw timestamp) per
//!   element, so an unchanged element is skipped instead of rewritten.

use sha2::{Digest, Sha256};
use slotmap::SecondaryMap;

use crate::config::Settings;
use crate::format::Formatter;
use crate::html;
use crate::page::{ElementKey, Page};

/// Path fragment of GitHub Actions run pages.
///
/// Those pages re-render their relative-time elements continuously; skipping
/// them avoids visible flicker.
pub const EXCLUDED_PATH_FRAGMENT: &str = "/actions/runs/";

/// True when conversion must not touch this page at all.
pub fn is_excluded_url(url: &str) -> bool {
    url.contains(EXCLUDED_PATH_FRAGMENT)
}

/// True when a page belongs to the GitHub target and should receive
/// settings broadcasts.
///
/// Live pages match on the `github.com` host; mirrored snapshots keep the
/// host as a path segment (`wget --mirror` layout), so a `github.com`
/// component anywhere in the path also counts.
pub fn matches_github_origin(url: &str) -> bool {
    if let Some((_, rest)) = url.split_once("://") {
        let host = rest.split(['/', '?', '#']).next().unwrap_or("");
        if host.eq_ignore_ascii_case("github.com") {
            return true;
        }
        return rest.split('/').any(|seg| seg.eq_ignore_ascii_case("github.com"));
    }
    url.split(['/', '\\'])
        .any(|seg| seg.eq_ignore_ascii_case("github.com"))
}

/// Outcome of one `convert_all` pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConvertSummary {
    /// Elements whose region was (re)written
    pub converted: usize,
    /// Elements skipped: missing/unparsable title, or already applied
    pub skipped: usize,
    /// The whole page was excluded by URL
    pub excluded: bool,
}

/// Converts timestamp elements and guards the converted text.
#[derive(Debug, Default)]
pub struct Rewriter {
    /// Last text written per element; enforced on divergence
    guards: SecondaryMap<ElementKey, String>,
    /// Fingerprint of (settings, raw) last applied per element
    applied: SecondaryMap<ElementKey, String>,
}

impl Rewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert every element on the page, in document order.
    ///
    /// No-op when the page URL is excluded.
    pub fn convert_all(
        &mut self,
        page: &mut Page,
        settings: &Settings,
        formatter: &Formatter,
    ) -> ConvertSummary {
        let mut summary = ConvertSummary::default();

        if is_excluded_url(page.url()) {
            tracing::debug!(url = %page.url(), "Page excluded from conversion");
            summary.excluded = true;
            return summary;
        }

        for key in page.keys() {
            if self.convert_one(page, key, settings, formatter) {
                summary.converted += 1;
            } else {
                summary.skipped += 1;
            }
        }

        tracing::debug!(
            url = %page.url(),
            converted = summary.converted,
            skipped = summary.skipped,
            "Conversion pass complete"
        );

        summary
    }

    /// Convert one element. Returns true when its region was written.
    pub fn convert_one(
        &mut self,
        page: &mut Page,
        key: ElementKey,
        settings: &Settings,
        formatter: &Formatter,
    ) -> bool {
        let Some(element) = page.element(key) else {
            return false;
        };

        let Some(raw) = element.title().map(str::to_string) else {
            tracing::debug!(url = %page.url(), "No title attribute found");
            return false;
        };

        let fp = fingerprint(settings, &raw);
        if self.applied.get(key) == Some(&fp) {
            // already converted under these settings; the guard keeps it
            return false;
        }

        let Some(stamp) = formatter.format(&raw, settings) else {
            tracing::debug!(raw = %raw, "Unparsable timestamp, element left untouched");
            return false;
        };

        page.set_region(key, stamp.text.clone());
        page.set_color(key, stamp.color);
        self.guards.insert(key, stamp.text);
        self.applied.insert(key, fp);
        true
    }

    /// Restore every guarded region that diverged from its expected text.
    ///
    /// Writes only on divergence, so enforcement never feeds itself. Returns
    /// the number of regions restored.
    pub fn enforce_guards(&mut self, page: &mut Page) -> usize {
        let mut diverged: Vec<(ElementKey, String)> = Vec::new();
        let mut dead: Vec<ElementKey> = Vec::new();

        for (key, expected) in self.guards.iter() {
            match page.region(key) {
                Some(current) if current != expected => diverged.push((key, expected.clone())),
                Some(_) => {}
                None => dead.push(key),
            }
        }

        let restored = diverged.len();
        for (key, expected) in diverged {
            page.set_region(key, expected);
        }
        if restored > 0 {
            tracing::debug!(restored, url = %page.url(), "Guards restored reverted regions");
        }

        for key in dead {
            self.forget(key);
        }

        restored
    }

    /// Drop all side-table state for a removed element.
    pub fn forget(&mut self, key: ElementKey) {
        self.guards.remove(key);
        self.applied.remove(key);
    }

    /// Number of elements currently guarded.
    pub fn guarded(&self) -> usize {
        self.guards.len()
    }
}

/// SHA-256 fingerprint of canonical settings plus the raw timestamp.
fn fingerprint(settings: &Settings, raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(settings.canonical().as_bytes());
    hasher.update(b"\n");
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Per-document rewrite report for the one-shot path.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct RewriteReport {
    /// Timestamp elements found
    pub elements: usize,
    /// Elements converted
    pub converted: usize,
    /// Elements skipped (missing or unparsable title)
    pub skipped: usize,
    /// Document excluded by URL
    pub excluded: bool,
    /// Output differs from input
    pub changed: bool,
    /// Scanner warnings (unterminated elements)
    pub warnings: Vec<String>,
}

/// One-shot conversion of a snapshot document.
///
/// Stateless counterpart of [`Rewriter::convert_all`] for the CLI: scans,
/// formats, and splices in a single pass. The URL hint is used when the
/// document does not carry its own URL.
pub fn rewrite_html(
    html_text: &str,
    url_hint: &str,
    settings: &Settings,
    formatter: &Formatter,
) -> (String, RewriteReport) {
    let url = html::page_url(html_text).unwrap_or_else(|| url_hint.to_string());
    let scan = html::scan(html_text);

    let mut report = RewriteReport {
        elements: scan.elements.len(),
        warnings: scan.warnings,
        ..Default::default()
    };

    if is_excluded_url(&url) {
        tracing::debug!(url = %url, "Document excluded from conversion");
        report.excluded = true;
        return (html_text.to_string(), report);
    }

    let mut edits = Vec::new();
    for el in &scan.elements {
        let Some(raw) = el.attr("title") else {
            tracing::debug!(url = %url, "No title attribute found");
            report.skipped += 1;
            continue;
        };
        let Some(stamp) = formatter.format(raw, settings) else {
            tracing::debug!(raw = %raw, "Unparsable timestamp, element left untouched");
            report.skipped += 1;
            continue;
        };

        edits.push(html::RegionEdit {
            tag_span: el.tag_span.clone(),
            region_span: el.region_span.clone(),
            text: stamp.text,
            color: stamp.color,
            attrs: el.attrs.clone(),
        });
        report.converted += 1;
    }

    let out = html::splice(html_text, &edits);
    report.changed = out != html_text;
    (out, report)
}
