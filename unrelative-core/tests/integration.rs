//! Integration tests for the snapshot conversion pipeline
//!
//! These tests use fixture files in `tests/fixtures/` to verify the
//! end-to-end scan, convert, guard, and resync flow over realistic
//! GitHub page snapshots.

use chrono::FixedOffset;
use std::path::PathBuf;
use unrelative_core::{
    rewrite_html, Formatter, Locale, Page, PageEvent, Rewriter, Settings, SettingsUpdate,
    TimeFormat,
};

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("fixture should read")
}

fn utc_formatter() -> Formatter {
    Formatter::with_offset(Locale::new("en-US"), FixedOffset::east_opt(0).unwrap())
}

fn settings(time_format: TimeFormat, date_format: &str, color_by_day: bool) -> Settings {
    Settings {
        time_format,
        date_format: date_format.to_string(),
        color_by_day,
    }
}

#[test]
fn test_commits_page_converts_all_timestamped_elements() {
    let html = fixture("github-commits.html");
    let mut page = Page::from_html(&html, "file:///github-commits.html");
    assert_eq!(page.len(), 4);
    assert_eq!(page.url(), "https://github.com/rust-lang/rust/commits/master");

    let mut rewriter = Rewriter::new();
    let summary = rewriter.convert_all(
        &mut page,
        &settings(TimeFormat::Hour24, "YY-MM-DD", false),
        &utc_formatter(),
    );

    // three elements carry a title; the badge without one is skipped
    assert_eq!(summary.converted, 3);
    assert_eq!(summary.skipped, 1);

    let keys = page.keys();
    assert_eq!(page.region(keys[0]), Some("24-03-07 15:05"));
    assert_eq!(page.region(keys[1]), Some("24-03-06 09:30"));
    assert_eq!(page.region(keys[2]), Some("24-02-29 23:59"));
    assert_eq!(page.region(keys[3]), Some("just now"), "untouched");
}

#[test]
fn test_actions_run_page_is_left_alone() {
    let html = fixture("actions-run.html");
    let mut page = Page::from_html(&html, "file:///actions-run.html");

    let mut rewriter = Rewriter::new();
    let summary = rewriter.convert_all(&mut page, &Settings::default(), &utc_formatter());

    assert!(summary.excluded);
    for key in page.keys() {
        let region = page.region(key).unwrap();
        assert!(region.ends_with("ago"), "region untouched: {region}");
    }
}

#[test]
fn test_host_regeneration_is_corrected_by_guards() {
    let html = fixture("github-commits.html");
    let mut page = Page::from_html(&html, "file:///github-commits.html");
    let mut rewriter = Rewriter::new();
    let settings = settings(TimeFormat::Hour24, "YY-MM-DD", false);
    rewriter.convert_all(&mut page, &settings, &utc_formatter());

    // the host regenerates the snapshot with relative text again
    let events = page.resync(&html);
    let reverted = events
        .iter()
        .filter(|e| matches!(e, PageEvent::RegionChanged(_)))
        .count();
    assert_eq!(reverted, 3);

    let restored = rewriter.enforce_guards(&mut page);
    assert_eq!(restored, 3);

    let keys = page.keys();
    assert_eq!(page.region(keys[0]), Some("24-03-07 15:05"));
}

#[test]
fn test_settings_update_triggers_full_reconversion() {
    let html = fixture("github-commits.html");
    let mut page = Page::from_html(&html, "file:///github-commits.html");
    let mut rewriter = Rewriter::new();
    let formatter = utc_formatter();

    let mut cached = settings(TimeFormat::Hour24, "YY-MM-DD", false);
    rewriter.convert_all(&mut page, &cached, &formatter);

    // broadcast arrives with only some fields present
    let update = SettingsUpdate {
        time_format: Some(TimeFormat::Hour12),
        date_format: None,
        color_by_day: Some(true),
    };
    cached.apply_update(&update);
    assert_eq!(cached.date_format, "YY-MM-DD", "absent field kept");

    let summary = rewriter.convert_all(&mut page, &cached, &formatter);
    assert_eq!(summary.converted, 3, "new settings invalidate fingerprints");

    let keys = page.keys();
    assert_eq!(page.region(keys[0]), Some("24-03-07 3:05PM"));
    assert!(page.element(keys[0]).unwrap().color.is_some());
}

#[test]
fn test_rendered_snapshot_round_trips_through_rescan() {
    let html = fixture("github-commits.html");
    let mut page = Page::from_html(&html, "file:///github-commits.html");
    let mut rewriter = Rewriter::new();
    let settings = settings(TimeFormat::Hour12, "M/D/YY", true);
    rewriter.convert_all(&mut page, &settings, &utc_formatter());

    let rendered = page.render();
    assert!(rendered.contains("3/7/24 3:05PM"));
    assert!(rendered.contains("style=\"color:#"));

    // a fresh session over the rendered output sees converted regions
    let reread = Page::from_html(&rendered, "file:///github-commits.html");
    let keys = reread.keys();
    assert_eq!(reread.region(keys[0]), Some("3/7/24 3:05PM"));
}

#[test]
fn test_one_shot_rewrite_matches_session_path() {
    let html = fixture("github-commits.html");
    let settings = settings(TimeFormat::Hour24, "YY-MM-DD", false);
    let formatter = utc_formatter();

    let (out, report) = rewrite_html(&html, "file:///github-commits.html", &settings, &formatter);
    assert_eq!(report.elements, 4);
    assert_eq!(report.converted, 3);
    assert_eq!(report.skipped, 1);
    assert!(report.changed);

    let mut page = Page::from_html(&html, "file:///github-commits.html");
    let mut rewriter = Rewriter::new();
    rewriter.convert_all(&mut page, &settings, &formatter);
    assert_eq!(out, page.render());
}

#[test]
fn test_one_shot_rewrite_of_actions_run_is_identity() {
    let html = fixture("actions-run.html");
    let (out, report) = rewrite_html(
        &html,
        "file:///actions-run.html",
        &Settings::default(),
        &utc_formatter(),
    );
    assert!(report.excluded);
    assert_eq!(out, html);
}
