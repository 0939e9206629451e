//! Locale detection for `auto` formatting modes.
//!
//! The formatter needs two things from the locale: whether the language is
//! English (drives the 12h/24h choice when `time_format = "auto"`), and the
//! numeric date field order (drives the template used when
//! `date_format = "auto"`).

/// A BCP-47-ish language tag, usually derived from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    tag: String,
}

/// Field order for locale-aware short numeric dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    /// `M/D/YY` (English-family)
    MonthFirst,
    /// `YY/M/D` (year-leading locales: ja, zh, ko, hu, lt)
    YearFirst,
    /// `D/M/YY` (everyone else)
    DayFirst,
}

impl DateOrder {
    /// Token template rendered through the same substitution as custom patterns.
    pub fn template(self) -> &'static str {
        match self {
            DateOrder::MonthFirst => "M/D/YY",
            DateOrder::YearFirst => "YY/M/D",
            DateOrder::DayFirst => "D/M/YY",
        }
    }
}

impl Locale {
    /// Create a locale from an explicit tag (`en-US`, `sv_SE`, `ja`).
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    /// Detect the active locale from `LC_ALL`, `LC_TIME`, then `LANG`.
    ///
    /// Values like `en_US.UTF-8` are normalized by stripping the encoding
    /// suffix. `C` and `POSIX` fall back to `en-US`.
    pub fn from_env() -> Self {
        for var in ["LC_ALL", "LC_TIME", "LANG"] {
            if let Ok(value) = std::env::var(var) {
                let tag = value.split('.').next().unwrap_or("").trim();
                if tag.is_empty() || tag == "C" || tag == "POSIX" {
                    continue;
                }
                return Self::new(tag);
            }
        }
        Self::new("en-US")
    }

    /// The full tag as detected.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The primary language subtag, lowercased (`en_US` -> `en`).
    pub fn language(&self) -> String {
        self.tag
            .split(['-', '_'])
            .next()
            .unwrap_or("")
            .to_ascii_lowercase()
    }

    /// True when the language tag begins with `en`.
    pub fn is_english(&self) -> bool {
        self.language().starts_with("en")
    }

    /// Numeric date field order for this locale.
    pub fn date_order(&self) -> DateOrder {
        match self.language().as_str() {
            "en" => DateOrder::MonthFirst,
            "ja" | "zh" | "ko" | "hu" | "lt" => DateOrder::YearFirst,
            _ => DateOrder::DayFirst,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_extraction() {
        assert_eq!(Locale::new("en-US").language(), "en");
        assert_eq!(Locale::new("en_GB").language(), "en");
        assert_eq!(Locale::new("sv_SE").language(), "sv");
        assert_eq!(Locale::new("ja").language(), "ja");
    }

    #[test]
    fn test_is_english() {
        assert!(Locale::new("en-US").is_english());
        assert!(Locale::new("en").is_english());
        assert!(!Locale::new("de-DE").is_english());
        assert!(!Locale::new("zh-CN").is_english());
    }

    #[test]
    fn test_date_order() {
        assert_eq!(Locale::new("en-US").date_order(), DateOrder::MonthFirst);
        assert_eq!(Locale::new("ja-JP").date_order(), DateOrder::YearFirst);
        assert_eq!(Locale::new("hu").date_order(), DateOrder::YearFirst);
        assert_eq!(Locale::new("fr-FR").date_order(), DateOrder::DayFirst);
    }

    #[test]
    fn test_templates() {
        assert_eq!(DateOrder::MonthFirst.template(), "M/D/YY");
        assert_eq!(DateOrder::YearFirst.template(), "YY/M/D");
        assert_eq!(DateOrder::DayFirst.template(), "D/M/YY");
    }
}
