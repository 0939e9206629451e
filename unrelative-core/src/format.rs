//! Absolute timestamp formatting.
//!
//! [`Formatter::format`] is a pure function of (raw timestamp, settings,
//! locale, display offset): identical inputs always yield byte-identical
//! output. Unparsable input yields `None` and the caller leaves the element
//! untouched.

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike};

use crate::config::{Settings, TimeFormat};
use crate::locale::Locale;

/// One entry in the fixed day-color palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayColor {
    pub rgb: (u8, u8, u8),
}

impl DayColor {
    /// CSS hex form, as written into `style="color:..."`.
    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.rgb.0, self.rgb.1, self.rgb.2)
    }
}

/// Colorblind-accessible 7-color palette (Wong).
pub const DAY_PALETTE: [DayColor; 7] = [
    DayColor { rgb: (0xE6, 0x9F, 0x00) }, // orange
    DayColor { rgb: (0x56, 0xB4, 0xE9) }, // sky blue
    DayColor { rgb: (0x00, 0x9E, 0x73) }, // bluish green
    DayColor { rgb: (0xF0, 0xE4, 0x42) }, // yellow
    DayColor { rgb: (0x00, 0x72, 0xB2) }, // blue
    DayColor { rgb: (0xD5, 0x5E, 0x00) }, // vermillion
    DayColor { rgb: (0xCC, 0x79, 0xA7) }, // reddish purple
];

/// A formatted timestamp plus its optional day color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedStamp {
    pub text: String,
    pub color: Option<DayColor>,
}

/// Formats raw timestamps into absolute display strings.
#[derive(Debug, Clone)]
pub struct Formatter {
    locale: Locale,
    offset: FixedOffset,
}

impl Formatter {
    /// Formatter rendering in the local wall-clock offset.
    pub fn new(locale: Locale) -> Self {
        let offset = Local::now().offset().fix();
        Self { locale, offset }
    }

    /// Formatter with an explicit display offset (used by tests).
    pub fn with_offset(locale: Locale, offset: FixedOffset) -> Self {
        Self { locale, offset }
    }

    /// Format a raw timestamp under the given settings.
    ///
    /// Returns `None` when the raw value cannot be parsed as a date-time.
    pub fn format(&self, raw: &str, settings: &Settings) -> Option<FormattedStamp> {
        let parsed = parse_timestamp(raw)?;
        let local = parsed.with_timezone(&self.offset);
        let date = local.date_naive();

        let date_part = if settings.date_format == "auto" {
            render_date_pattern(self.locale.date_order().template(), date)
        } else {
            render_date_pattern(&settings.date_format, date)
        };

        let hour12 = match settings.time_format {
            TimeFormat::Hour12 => true,
            TimeFormat::Hour24 => false,
            TimeFormat::Auto => self.locale.is_english(),
        };

        let time_part = if hour12 {
            let (pm, hour) = local.time().hour12();
            let meridiem = if pm { "PM" } else { "AM" };
            // no space before the meridiem marker
            format!("{}:{:02}{}", hour, local.minute(), meridiem)
        } else {
            format!("{:02}:{:02}", local.hour(), local.minute())
        };

        let color = settings.color_by_day.then(|| day_color(&day_key(date)));

        Some(FormattedStamp {
            text: format!("{} {}", date_part, time_part),
            color,
        })
    }
}

/// Calendar-day key, unpadded: `2024-3-7`.
pub fn day_key(date: NaiveDate) -> String {
    format!("{}-{}-{}", date.year(), date.month(), date.day())
}

/// Deterministic day-string to palette-entry mapping.
///
/// Polynomial rolling hash (`hash = hash*31 + code_unit`) over UTF-16 code
/// units with 32-bit wraparound, modulo the palette size. Stable within a
/// run; not injective.
pub fn day_color(key: &str) -> DayColor {
    let mut hash: u32 = 0;
    for unit in key.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(unit as u32);
    }
    DAY_PALETTE[hash as usize % DAY_PALETTE.len()]
}

/// Substitute date tokens into a pattern, longest match first.
///
/// Literal, case-sensitive, global replacement: `YYYY` (4-digit year), `YY`
/// (2-digit), `MM`/`M` (padded/plain month), `DD`/`D` (padded/plain day).
/// Everything else passes through untouched.
fn render_date_pattern(pattern: &str, date: NaiveDate) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut rest = pattern;

    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("YYYY") {
            out.push_str(&format!("{:04}", date.year()));
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("YY") {
            out.push_str(&format!("{:02}", date.year().rem_euclid(100)));
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("MM") {
            out.push_str(&format!("{:02}", date.month()));
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("DD") {
            out.push_str(&format!("{:02}", date.day()));
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('M') {
            out.push_str(&date.month().to_string());
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('D') {
            out.push_str(&date.day().to_string());
            rest = tail;
        } else {
            let ch = rest.chars().next().expect("non-empty rest");
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }

    out
}

/// Parse a raw timestamp attribute value.
///
/// Tries, in order: RFC 3339, RFC 2822, `%Y-%m-%d %H:%M:%S %z`, GitHub's
/// title style (`Mar 7, 2024, 3:05 PM GMT+1`), then naive ISO assumed UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt);
    }
    if let Some(dt) = parse_github_title(raw) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            let utc = FixedOffset::east_opt(0).expect("zero offset");
            return Some(DateTime::from_naive_utc_and_offset(naive, utc));
        }
    }

    None
}

/// GitHub renders `title` attributes like `Mar 7, 2024, 3:05 PM GMT+1`.
fn parse_github_title(raw: &str) -> Option<DateTime<FixedOffset>> {
    let (stamp, zone) = raw.rsplit_once(" GMT")?;
    let offset = parse_gmt_offset(zone)?;
    let naive = NaiveDateTime::parse_from_str(stamp.trim(), "%b %d, %Y, %I:%M %p").ok()?;
    offset.from_local_datetime(&naive).single()
}

/// Parse a `GMT` offset suffix: empty, `+1`, `-0530`, or `+05:30`.
fn parse_gmt_offset(zone: &str) -> Option<FixedOffset> {
    if zone.is_empty() {
        return FixedOffset::east_opt(0);
    }

    let sign: i32 = match zone.as_bytes()[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let rest = &zone[1..];

    let (hours, minutes): (i32, i32) = match rest.split_once(':') {
        Some((h, m)) => (h.parse().ok()?, m.parse().ok()?),
        None if rest.len() > 2 => {
            let split = rest.len() - 2;
            (rest[..split].parse().ok()?, rest[split..].parse().ok()?)
        }
        None => (rest.parse().ok()?, 0),
    };

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
