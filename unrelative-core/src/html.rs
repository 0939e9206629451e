//! `<relative-time>` scanning and splicing over page snapshots.
//!
//! The scanner is deliberately tolerant: tag matching is ASCII
//! case-insensitive, attributes may be quoted, unquoted, or boolean, values
//! are entity-decoded, self-closing tags are accepted, and an element whose
//! closing tag never appears is skipped with a warning while scanning
//! continues.
//!
//! Splicing rebuilds the document with each converted element's content
//! region replaced; bytes outside the replaced spans are preserved exactly.

use std::ops::Range;

use crate::format::DayColor;

/// The custom element this whole system operates on.
pub const TARGET_TAG: &str = "relative-time";

/// One attribute from an opening tag. Boolean attributes have no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub value: Option<String>,
}

/// Case-insensitive attribute lookup.
pub fn attr_value<'a>(attrs: &'a [Attr], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(name))
        .and_then(|a| a.value.as_deref())
}

/// One `<relative-time>` occurrence found in a snapshot.
#[derive(Debug, Clone)]
pub struct ScannedElement {
    /// Opening-tag attributes, in source order, values entity-decoded
    pub attrs: Vec<Attr>,
    /// Entity-decoded text of the content region
    pub region: String,
    /// Byte span of the opening tag, `<` through `>`
    pub tag_span: Range<usize>,
    /// Byte span of the content region (empty for self-closing tags)
    pub region_span: Range<usize>,
}

impl ScannedElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        attr_value(&self.attrs, name)
    }
}

/// Result of scanning one snapshot.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub elements: Vec<ScannedElement>,
    pub warnings: Vec<String>,
}

/// Find every `<relative-time>` element in document order.
pub fn scan(html: &str) -> ScanResult {
    let mut result = ScanResult::default();
    let lower = html.to_ascii_lowercase();
    let open = format!("<{}", TARGET_TAG);
    let close = format!("</{}", TARGET_TAG);

    let mut pos = 0;
    while let Some(found) = lower[pos..].find(&open) {
        let start = pos + found;
        let after_name = start + open.len();

        // Reject prefixes of longer tag names.
        match html.as_bytes().get(after_name) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => {}
            _ => {
                pos = start + 1;
                continue;
            }
        }

        let Some(tag) = parse_tag_body(html, after_name) else {
            result
                .warnings
                .push(format!("unterminated <{}> tag at byte {}", TARGET_TAG, start));
            pos = after_name;
            continue;
        };

        if tag.self_closing {
            result.elements.push(ScannedElement {
                attrs: tag.attrs,
                region: String::new(),
                tag_span: start..tag.end,
                region_span: tag.end..tag.end,
            });
            pos = tag.end;
            continue;
        }

        let Some(close_at) = lower[tag.end..].find(&close) else {
            result.warnings.push(format!(
                "missing </{}> for element at byte {}",
                TARGET_TAG, start
            ));
            pos = tag.end;
            continue;
        };
        let region_end = tag.end + close_at;

        result.elements.push(ScannedElement {
            attrs: tag.attrs,
            region: html_escape::decode_html_entities(&html[tag.end..region_end]).into_owned(),
            tag_span: start..tag.end,
            region_span: tag.end..region_end,
        });

        pos = lower[region_end..]
            .find('>')
            .map(|i| region_end + i + 1)
            .unwrap_or(html.len());
    }

    result
}

/// The page's own URL: `og:url` meta first, then the canonical link.
pub fn page_url(html: &str) -> Option<String> {
    find_tag_attr(html, "meta", "property", "og:url", "content")
        .or_else(|| find_tag_attr(html, "link", "rel", "canonical", "href"))
}

struct ParsedTag {
    attrs: Vec<Attr>,
    /// Byte position just past the closing `>`
    end: usize,
    self_closing: bool,
}

/// Parse attributes from just after a tag name through the closing `>`.
///
/// Returns `None` when the document ends before the tag closes.
fn parse_tag_body(html: &str, mut i: usize) -> Option<ParsedTag> {
    let bytes = html.as_bytes();
    let mut attrs = Vec::new();

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i)? {
            b'>' => {
                return Some(ParsedTag {
                    attrs,
                    end: i + 1,
                    self_closing: false,
                });
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                return Some(ParsedTag {
                    attrs,
                    end: i + 2,
                    self_closing: true,
                });
            }
            _ => {}
        }

        // Attribute name
        let name_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'>' | b'/') {
            i += 1;
        }
        if i == name_start {
            // Stray '/' not followed by '>'; skip it.
            i += 1;
            continue;
        }
        let name = html[name_start..i].to_string();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        if bytes.get(i) != Some(&b'=') {
            attrs.push(Attr { name, value: None });
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let value = match bytes.get(i)? {
            quote @ (b'"' | b'\'') => {
                let quote = *quote;
                i += 1;
                let value_start = i;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                if i >= bytes.len() {
                    return None;
                }
                let raw = &html[value_start..i];
                i += 1;
                html_escape::decode_html_entities(raw).into_owned()
            }
            _ => {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                html_escape::decode_html_entities(&html[value_start..i]).into_owned()
            }
        };

        attrs.push(Attr {
            name,
            value: Some(value),
        });
    }
}

/// Find `<tag ... match_name="match_value" ... want="...">` and return `want`.
fn find_tag_attr(
    html: &str,
    tag: &str,
    match_name: &str,
    match_value: &str,
    want: &str,
) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let needle = format!("<{}", tag);

    let mut pos = 0;
    while let Some(found) = lower[pos..].find(&needle) {
        let start = pos + found;
        let after_name = start + needle.len();

        match html.as_bytes().get(after_name) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => {}
            _ => {
                pos = start + 1;
                continue;
            }
        }

        let Some(parsed) = parse_tag_body(html, after_name) else {
            pos = after_name;
            continue;
        };

        let matches = attr_value(&parsed.attrs, match_name)
            .is_some_and(|v| v.eq_ignore_ascii_case(match_value));
        if matches {
            if let Some(value) = attr_value(&parsed.attrs, want) {
                return Some(value.to_string());
            }
        }

        pos = parsed.end;
    }

    None
}

/// One element's pending write: new region text and color state.
#[derive(Debug, Clone)]
pub struct RegionEdit {
    pub tag_span: Range<usize>,
    pub region_span: Range<usize>,
    /// New content region text (unencoded)
    pub text: String,
    /// `Some` upserts a `color` declaration, `None` removes any present
    pub color: Option<DayColor>,
    /// Attributes of the opening tag, used when it must be rebuilt
    pub attrs: Vec<Attr>,
}

/// Rebuild the document with each edit applied.
///
/// Edits must be in document order and non-overlapping. An opening tag is
/// only rewritten when its `style` attribute actually changes.
pub fn splice(html: &str, edits: &[RegionEdit]) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    for edit in edits {
        out.push_str(&html[cursor..edit.tag_span.start]);

        let current_style = attr_value(&edit.attrs, "style").map(|s| s.to_string());
        let desired_style = match edit.color {
            Some(color) => Some(upsert_color(current_style.as_deref(), &color.hex())),
            None => current_style.as_deref().and_then(strip_color),
        };

        if desired_style == current_style {
            out.push_str(&html[edit.tag_span.clone()]);
        } else {
            out.push_str(&render_tag(&edit.attrs, desired_style.as_deref()));
        }

        out.push_str(&html[edit.tag_span.end..edit.region_span.start]);
        out.push_str(&html_escape::encode_text(&edit.text));
        cursor = edit.region_span.end;
    }

    out.push_str(&html[cursor..]);
    out
}

/// Replace or append the `color` declaration in a style value.
fn upsert_color(style: Option<&str>, hex: &str) -> String {
    let color_decl = format!("color:{}", hex);
    let Some(style) = style else {
        return color_decl;
    };

    let mut decls: Vec<String> = style
        .split(';')
        .map(str::trim)
        .filter(|d| !d.is_empty() && !is_color_decl(d))
        .map(str::to_string)
        .collect();
    decls.push(color_decl);
    decls.join(";")
}

/// Drop any `color` declaration; `None` when nothing else remains.
fn strip_color(style: &str) -> Option<String> {
    let decls: Vec<&str> = style
        .split(';')
        .map(str::trim)
        .filter(|d| !d.is_empty() && !is_color_decl(d))
        .collect();
    if decls.is_empty() {
        None
    } else {
        Some(decls.join(";"))
    }
}

fn is_color_decl(decl: &str) -> bool {
    decl.split(':')
        .next()
        .is_some_and(|p| p.trim().eq_ignore_ascii_case("color"))
}

/// Render an opening tag from attributes, with `style` replaced or removed.
fn render_tag(attrs: &[Attr], style: Option<&str>) -> String {
    let mut out = format!("<{}", TARGET_TAG);
    let mut style_written = false;

    for attr in attrs {
        if attr.name.eq_ignore_ascii_case("style") {
            if let Some(style) = style {
                if !style_written {
                    push_attr(&mut out, "style", Some(style));
                    style_written = true;
                }
            }
            continue;
        }
        push_attr(&mut out, &attr.name, attr.value.as_deref());
    }

    if let Some(style) = style {
        if !style_written {
            push_attr(&mut out, "style", Some(style));
        }
    }

    out.push('>');
    out
}

fn push_attr(out: &mut String, name: &str, value: Option<&str>) {
    out.push(' ');
    out.push_str(name);
    if let Some(value) = value {
        out.push_str("=\"");
        out.push_str(&html_escape::encode_double_quoted_attribute(value));
        out.push('"');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = concat!(
        "<html><head><meta property=\"og:url\" content=\"https://github.com/rust-lang/rust\">",
        "</head><body>",
        "<relative-time datetime=\"2024-03-07T15:05:00Z\" title=\"Mar 7, 2024, 3:05 PM GMT\">",
        "3 days ago</relative-time>",
        "<RELATIVE-TIME datetime=\"2024-03-08T10:00:00Z\" title=\"Mar 8, 2024, 10:00 AM GMT\" tense=past>",
        "2 days ago</RELATIVE-TIME>",
        "</body></html>"
    );

    #[test]
    fn test_scan_finds_elements_in_order() {
        let result = scan(SAMPLE);
        assert!(result.warnings.is_empty());
        assert_eq!(result.elements.len(), 2);

        assert_eq!(
            result.elements[0].attr("datetime"),
            Some("2024-03-07T15:05:00Z")
        );
        assert_eq!(result.elements[0].region, "3 days ago");
        assert_eq!(result.elements[1].attr("tense"), Some("past"));
        assert_eq!(result.elements[1].region, "2 days ago");
    }

    #[test]
    fn test_scan_decodes_entities() {
        let html = "<relative-time title=\"Mar 7, 2024, 3:05&nbsp;PM GMT\">3&nbsp;days ago</relative-time>";
        let result = scan(html);
        assert_eq!(result.elements.len(), 1);
        assert!(result.elements[0].attr("title").unwrap().contains('\u{a0}'));
        assert!(result.elements[0].region.contains('\u{a0}'));
    }

    #[test]
    fn test_scan_tolerates_self_closing_and_boolean_attrs() {
        let html = "<relative-time datetime=2024-03-07T15:05:00Z format-style=narrow hidden/>";
        let result = scan(html);
        assert_eq!(result.elements.len(), 1);
        let el = &result.elements[0];
        assert_eq!(el.attr("datetime"), Some("2024-03-07T15:05:00Z"));
        assert_eq!(el.attr("hidden"), None, "boolean attribute has no value");
        assert!(el.region.is_empty());
    }

    #[test]
    fn test_scan_skips_unterminated_element() {
        let html = "<relative-time title=\"t1\">dangling <p>text</p>";
        let result = scan(html);
        assert!(result.elements.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("missing </relative-time>"));
    }

    #[test]
    fn test_scan_ignores_longer_tag_names() {
        let html = "<relative-timer>nope</relative-timer>";
        let result = scan(html);
        assert!(result.elements.is_empty());
    }

    #[test]
    fn test_page_url_prefers_og_url() {
        assert_eq!(
            page_url(SAMPLE).as_deref(),
            Some("https://github.com/rust-lang/rust")
        );

        let canonical_only =
            "<link rel=\"canonical\" href=\"https://github.com/rust-lang/cargo\">";
        assert_eq!(
            page_url(canonical_only).as_deref(),
            Some("https://github.com/rust-lang/cargo")
        );

        assert_eq!(page_url("<p>no urls here</p>"), None);
    }

    #[test]
    fn test_splice_replaces_region_only() {
        let result = scan(SAMPLE);
        let el = &result.elements[0];
        let edits = vec![RegionEdit {
            tag_span: el.tag_span.clone(),
            region_span: el.region_span.clone(),
            text: "3/7/24 3:05PM".to_string(),
            color: None,
            attrs: el.attrs.clone(),
        }];

        let out = splice(SAMPLE, &edits);
        assert!(out.contains(">3/7/24 3:05PM</relative-time>"));
        // untouched element survives byte-for-byte
        assert!(out.contains("2 days ago</RELATIVE-TIME>"));
        assert!(out.starts_with("<html><head>"));
    }

    #[test]
    fn test_splice_encodes_region_text() {
        let result = scan(SAMPLE);
        let el = &result.elements[0];
        let edits = vec![RegionEdit {
            tag_span: el.tag_span.clone(),
            region_span: el.region_span.clone(),
            text: "a < b & c".to_string(),
            color: None,
            attrs: el.attrs.clone(),
        }];

        let out = splice(SAMPLE, &edits);
        assert!(out.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn test_splice_upserts_and_removes_color() {
        let result = scan(SAMPLE);
        let el = &result.elements[0];
        let color = crate::format::DAY_PALETTE[0];
        let edits = vec![RegionEdit {
            tag_span: el.tag_span.clone(),
            region_span: el.region_span.clone(),
            text: "3/7/24 3:05PM".to_string(),
            color: Some(color),
            attrs: el.attrs.clone(),
        }];

        let colored = splice(SAMPLE, &edits);
        assert!(colored.contains("style=\"color:#E69F00\""));

        // now remove the color from the colored document
        let rescan = scan(&colored);
        let el = &rescan.elements[0];
        let edits = vec![RegionEdit {
            tag_span: el.tag_span.clone(),
            region_span: el.region_span.clone(),
            text: "3/7/24 3:05PM".to_string(),
            color: None,
            attrs: el.attrs.clone(),
        }];
        let plain = splice(&colored, &edits);
        assert!(!plain.contains("style="));
    }

    #[test]
    fn test_splice_preserves_foreign_style_declarations() {
        let html = "<relative-time style=\"font-weight:bold\" title=\"t\">x</relative-time>";
        let result = scan(html);
        let el = &result.elements[0];
        let color = crate::format::DAY_PALETTE[1];

        let edits = vec![RegionEdit {
            tag_span: el.tag_span.clone(),
            region_span: el.region_span.clone(),
            text: "y".to_string(),
            color: Some(color),
            attrs: el.attrs.clone(),
        }];
        let colored = splice(html, &edits);
        assert!(colored.contains("font-weight:bold;color:#56B4E9"));

        let rescan = scan(&colored);
        let el = &rescan.elements[0];
        let edits = vec![RegionEdit {
            tag_span: el.tag_span.clone(),
            region_span: el.region_span.clone(),
            text: "y".to_string(),
            color: None,
            attrs: el.attrs.clone(),
        }];
        let plain = splice(&colored, &edits);
        assert!(plain.contains("style=\"font-weight:bold\""));
        assert!(!plain.contains("color:#"));
    }

    #[test]
    fn test_splice_without_style_change_is_byte_stable() {
        let result = scan(SAMPLE);
        let edits: Vec<RegionEdit> = result
            .elements
            .iter()
            .map(|el| RegionEdit {
                tag_span: el.tag_span.clone(),
                region_span: el.region_span.clone(),
                text: el.region.clone(),
                color: None,
                attrs: el.attrs.clone(),
            })
            .collect();

        assert_eq!(splice(SAMPLE, &edits), SAMPLE);
    }
}
