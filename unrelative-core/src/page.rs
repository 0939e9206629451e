//! Live page model for one open snapshot.
//!
//! A [`Page`] owns the arena of timestamp elements found in a snapshot and
//! keeps stable keys for them across re-reads. [`Page::resync`] diffs a fresh
//! copy of the snapshot against the live arena and reports what the host did:
//! new elements, reverted content regions, removed elements, or a URL change.
//! The rewriter and change watcher react to those events; the page itself
//! never formats anything.

use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::ops::Range;

use crate::format::DayColor;
use crate::html::{self, Attr, ScannedElement};

new_key_type! {
    /// Stable identity for one timestamp element within its page.
    pub struct ElementKey;
}

/// One timestamp element as currently known to the page.
#[derive(Debug, Clone)]
pub struct PageElement {
    /// Opening-tag attributes, values entity-decoded
    pub attrs: Vec<Attr>,
    /// Current content region text
    pub region: String,
    /// Applied day color, if any
    pub color: Option<DayColor>,
    /// Opening tag span in the backing snapshot text
    pub tag_span: Range<usize>,
    /// Content region span in the backing snapshot text
    pub region_span: Range<usize>,
}

impl PageElement {
    /// The raw timestamp attribute the rewriter formats.
    pub fn title(&self) -> Option<&str> {
        html::attr_value(&self.attrs, "title")
    }

    /// The machine ISO instant, used only for diff identity.
    pub fn datetime(&self) -> Option<&str> {
        html::attr_value(&self.attrs, "datetime")
    }

    fn from_scanned(el: ScannedElement) -> Self {
        Self {
            attrs: el.attrs,
            region: el.region,
            color: None,
            tag_span: el.tag_span,
            region_span: el.region_span,
        }
    }
}

/// What a resync observed the host page doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// At least one new element appeared
    ChildrenAdded,
    /// The host re-rendered an element's content region
    RegionChanged(ElementKey),
    /// An element disappeared from the page
    ElementRemoved(ElementKey),
    /// The page's own URL changed (SPA-style navigation in the snapshot)
    UrlChanged,
}

/// Live document model for one snapshot file.
#[derive(Debug)]
pub struct Page {
    url: String,
    fallback_url: String,
    html: String,
    arena: SlotMap<ElementKey, PageElement>,
    order: Vec<ElementKey>,
}

impl Page {
    /// Build a page from snapshot text.
    ///
    /// The URL comes from the document (`og:url` meta, then canonical link),
    /// falling back to the given hint (typically the `file://` path).
    pub fn from_html(html_text: &str, fallback_url: &str) -> Self {
        let scan = html::scan(html_text);
        for warning in &scan.warnings {
            tracing::warn!(url = fallback_url, "{}", warning);
        }

        let mut arena = SlotMap::with_key();
        let mut order = Vec::with_capacity(scan.elements.len());
        for el in scan.elements {
            order.push(arena.insert(PageElement::from_scanned(el)));
        }

        Self {
            url: html::page_url(html_text).unwrap_or_else(|| fallback_url.to_string()),
            fallback_url: fallback_url.to_string(),
            html: html_text.to_string(),
            arena,
            order,
        }
    }

    /// The page's current URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Element keys in document order.
    pub fn keys(&self) -> Vec<ElementKey> {
        self.order.clone()
    }

    pub fn element(&self, key: ElementKey) -> Option<&PageElement> {
        self.arena.get(key)
    }

    /// Current content region text for an element.
    pub fn region(&self, key: ElementKey) -> Option<&str> {
        self.arena.get(key).map(|el| el.region.as_str())
    }

    /// Overwrite an element's content region.
    pub fn set_region(&mut self, key: ElementKey, text: String) {
        if let Some(el) = self.arena.get_mut(key) {
            el.region = text;
        }
    }

    /// Set or clear an element's applied day color.
    pub fn set_color(&mut self, key: ElementKey, color: Option<DayColor>) {
        if let Some(el) = self.arena.get_mut(key) {
            el.color = color;
        }
    }

    /// Diff a fresh snapshot read against the live arena.
    ///
    /// Elements are matched to their existing keys by `datetime` attribute,
    /// then `title`, then document position, so keys (and the guards hanging
    /// off them) survive a host re-render.
    pub fn resync(&mut self, html_text: &str) -> Vec<PageEvent> {
        let mut events = Vec::new();

        let new_url = html::page_url(html_text).unwrap_or_else(|| self.fallback_url.clone());
        if new_url != self.url {
            tracing::debug!(from = %self.url, to = %new_url, "Page URL changed");
            self.url = new_url;
            events.push(PageEvent::UrlChanged);
        }

        let scan = html::scan(html_text);
        for warning in &scan.warnings {
            tracing::warn!(url = %self.url, "{}", warning);
        }

        // Index new elements by identity attribute; each can be claimed once.
        let mut by_datetime: HashMap<String, VecDeque<usize>> = HashMap::new();
        let mut by_title: HashMap<String, VecDeque<usize>> = HashMap::new();
        for (idx, el) in scan.elements.iter().enumerate() {
            if let Some(dt) = el.attr("datetime") {
                by_datetime.entry(dt.to_string()).or_default().push_back(idx);
            }
            if let Some(title) = el.attr("title") {
                by_title.entry(title.to_string()).or_default().push_back(idx);
            }
        }

        let mut claimed = vec![false; scan.elements.len()];
        let mut matches: Vec<(ElementKey, usize)> = Vec::new();
        let mut positional: Vec<ElementKey> = Vec::new();

        for &key in &self.order {
            let el = &self.arena[key];
            let found = el
                .datetime()
                .and_then(|dt| claim(&mut by_datetime, dt, &claimed))
                .or_else(|| el.title().and_then(|t| claim(&mut by_title, t, &claimed)));

            match found {
                Some(idx) => {
                    claimed[idx] = true;
                    matches.push((key, idx));
                }
                None => positional.push(key),
            }
        }

        // Leftover old elements pair with leftover new ones in order.
        let mut unclaimed: VecDeque<usize> =
            (0..scan.elements.len()).filter(|&i| !claimed[i]).collect();
        let mut removed: Vec<ElementKey> = Vec::new();
        for key in positional {
            match unclaimed.pop_front() {
                Some(idx) => {
                    claimed[idx] = true;
                    matches.push((key, idx));
                }
                None => removed.push(key),
            }
        }

        let mut scanned: Vec<Option<ScannedElement>> =
            scan.elements.into_iter().map(Some).collect();

        let mut new_order: Vec<Option<ElementKey>> = vec![None; scanned.len()];
        for (key, idx) in matches {
            let fresh = scanned[idx].take().expect("claimed element");
            let el = &mut self.arena[key];
            if fresh.region != el.region {
                events.push(PageEvent::RegionChanged(key));
            }
            el.attrs = fresh.attrs;
            el.region = fresh.region;
            el.tag_span = fresh.tag_span;
            el.region_span = fresh.region_span;
            new_order[idx] = Some(key);
        }

        let mut added = false;
        for (idx, slot) in scanned.into_iter().enumerate() {
            if let Some(fresh) = slot {
                added = true;
                new_order[idx] = Some(self.arena.insert(PageElement::from_scanned(fresh)));
            }
        }
        if added {
            events.push(PageEvent::ChildrenAdded);
        }

        for key in removed {
            self.arena.remove(key);
            events.push(PageEvent::ElementRemoved(key));
        }

        self.order = new_order.into_iter().flatten().collect();
        self.html = html_text.to_string();

        events
    }

    /// Render the snapshot with every element's current region and color.
    pub fn render(&self) -> String {
        let edits: Vec<html::RegionEdit> = self
            .order
            .iter()
            .map(|&key| {
                let el = &self.arena[key];
                html::RegionEdit {
                    tag_span: el.tag_span.clone(),
                    region_span: el.region_span.clone(),
                    text: el.region.clone(),
                    color: el.color,
                    attrs: el.attrs.clone(),
                }
            })
            .collect();
        html::splice(&self.html, &edits)
    }
}

fn claim(
    index: &mut HashMap<String, VecDeque<usize>>,
    value: &str,
    claimed: &[bool],
) -> Option<usize> {
    let queue = index.get_mut(value)?;
    while let Some(idx) = queue.pop_front() {
        if !claimed[idx] {
            return Some(idx);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(body: &str) -> String {
        format!(
            "<html><head><meta property=\"og:url\" content=\"https://github.com/rust-lang/rust\"></head><body>{}</body></html>",
            body
        )
    }

    fn element(datetime: &str, title: &str, text: &str) -> String {
        format!(
            "<relative-time datetime=\"{}\" title=\"{}\">{}</relative-time>",
            datetime, title, text
        )
    }

    #[test]
    fn test_from_html_populates_arena() {
        let html = snapshot(&format!(
            "{}{}",
            element("2024-03-07T15:05:00Z", "t1", "3 days ago"),
            element("2024-03-08T10:00:00Z", "t2", "2 days ago"),
        ));
        let page = Page::from_html(&html, "file:///tmp/page.html");

        assert_eq!(page.len(), 2);
        assert_eq!(page.url(), "https://github.com/rust-lang/rust");

        let keys = page.keys();
        assert_eq!(page.element(keys[0]).unwrap().title(), Some("t1"));
        assert_eq!(page.region(keys[1]), Some("2 days ago"));
    }

    #[test]
    fn test_fallback_url_when_document_has_none() {
        let html = element("2024-03-07T15:05:00Z", "t1", "x");
        let page = Page::from_html(&html, "file:///tmp/page.html");
        assert_eq!(page.url(), "file:///tmp/page.html");
    }

    #[test]
    fn test_resync_reports_region_revert() {
        let before = snapshot(&element("2024-03-07T15:05:00Z", "t1", "3 days ago"));
        let mut page = Page::from_html(&before, "file:///x");
        let key = page.keys()[0];
        page.set_region(key, "3/7/24 3:05PM".to_string());

        // host regenerates the snapshot with relative text again
        let events = page.resync(&before);
        assert_eq!(events, vec![PageEvent::RegionChanged(key)]);
        assert_eq!(page.region(key), Some("3 days ago"));
    }

    #[test]
    fn test_resync_keeps_keys_for_unchanged_elements() {
        let before = snapshot(&element("2024-03-07T15:05:00Z", "t1", "x"));
        let mut page = Page::from_html(&before, "file:///x");
        let key = page.keys()[0];

        let events = page.resync(&before);
        assert!(events.is_empty());
        assert_eq!(page.keys(), vec![key]);
    }

    #[test]
    fn test_resync_detects_added_and_removed() {
        let before = snapshot(&format!(
            "{}{}",
            element("2024-03-07T15:05:00Z", "t1", "a"),
            element("2024-03-08T10:00:00Z", "t2", "b"),
        ));
        let mut page = Page::from_html(&before, "file:///x");
        let keys = page.keys();

        let after = snapshot(&format!(
            "{}{}",
            element("2024-03-07T15:05:00Z", "t1", "a"),
            element("2024-03-09T12:00:00Z", "t3", "c"),
        ));
        let events = page.resync(&after);

        assert!(events.contains(&PageEvent::ChildrenAdded));
        assert!(events.contains(&PageEvent::ElementRemoved(keys[1])));
        assert_eq!(page.len(), 2);
        // surviving element kept its key
        assert!(page.keys().contains(&keys[0]));
    }

    #[test]
    fn test_resync_matches_by_position_without_identity_attrs() {
        let before = snapshot("<relative-time>a</relative-time>");
        let mut page = Page::from_html(&before, "file:///x");
        let key = page.keys()[0];

        let after = snapshot("<relative-time>b</relative-time>");
        let events = page.resync(&after);
        assert_eq!(events, vec![PageEvent::RegionChanged(key)]);
    }

    #[test]
    fn test_resync_reports_url_change() {
        let before = snapshot(&element("2024-03-07T15:05:00Z", "t1", "a"));
        let mut page = Page::from_html(&before, "file:///x");

        let after = before.replace(
            "https://github.com/rust-lang/rust",
            "https://github.com/rust-lang/cargo",
        );
        let events = page.resync(&after);
        assert!(events.contains(&PageEvent::UrlChanged));
        assert_eq!(page.url(), "https://github.com/rust-lang/cargo");
    }

    #[test]
    fn test_render_applies_region_and_color() {
        let html = snapshot(&element("2024-03-07T15:05:00Z", "t1", "3 days ago"));
        let mut page = Page::from_html(&html, "file:///x");
        let key = page.keys()[0];

        page.set_region(key, "3/7/24 3:05PM".to_string());
        page.set_color(key, Some(crate::format::DAY_PALETTE[0]));

        let out = page.render();
        assert!(out.contains(">3/7/24 3:05PM</relative-time>"));
        assert!(out.contains("style=\"color:#E69F00\""));
    }
}
