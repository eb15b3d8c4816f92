//! Ordered pattern tables for the date cascade and the time cascade.
//!
//! Both tables are evaluated top to bottom and the first pattern that both
//! matches and resolves wins.

use chrono::{Datelike, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

const FULL_MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";
const ABBREV_MONTHS: &str = "Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec";
const WEEKDAYS: &str = "Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday";

/// How far ahead an implied year may be pushed looking for a valid date
/// (a leap day can be up to four years out).
const MAX_YEAR_LOOKAHEAD: i32 = 4;

const ISO_TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

/// Result of running the date cascade over one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DateMatch {
    pub pattern: &'static str,
    pub date: NaiveDate,
    /// Only set when the pattern itself carried a clock time (ISO).
    pub time: Option<NaiveTime>,
    pub year_implied: bool,
}

enum PatternKind {
    /// `YYYY-MM-DD` with an optional `HH:MM[:SS]` tail.
    Iso,
    /// `March 5-12, 2025`: start month/day in group 1, shared year in group 2.
    SharedYearRange,
    /// Group 1 carries a complete date; try each format in turn.
    Explicit(&'static [&'static str]),
    /// Group 1 carries month and day only; the year is appended before parsing.
    ImpliedYear(&'static [&'static str]),
}

struct DatePattern {
    name: &'static str,
    regex: Regex,
    kind: PatternKind,
}

impl DatePattern {
    fn new(name: &'static str, pattern: String, kind: PatternKind) -> Self {
        Self {
            name,
            regex: Regex::new(&pattern).expect("date pattern must compile"),
            kind,
        }
    }

    fn resolve(&self, caps: &Captures, today: NaiveDate) -> Option<DateMatch> {
        let (date, time, year_implied) = match &self.kind {
            PatternKind::Iso => {
                let date = NaiveDate::parse_from_str(caps.get(1)?.as_str(), "%Y-%m-%d").ok()?;
                // A trailing am/pm means the clock belongs to the time cascade.
                let time = match (caps.get(2), caps.get(3)) {
                    (Some(clock), None) => ISO_TIME_FORMATS
                        .iter()
                        .find_map(|f| NaiveTime::parse_from_str(clock.as_str(), f).ok()),
                    _ => None,
                };
                (date, time, false)
            }
            PatternKind::SharedYearRange => {
                let text = format!("{} {}", caps.get(1)?.as_str(), caps.get(2)?.as_str());
                (parse_date(&text, &["%B %d %Y"])?, None, false)
            }
            PatternKind::Explicit(formats) => {
                let text = sanitize(caps.get(1)?.as_str());
                (parse_date(&text, formats)?, None, false)
            }
            PatternKind::ImpliedYear(formats) => {
                let text = sanitize(caps.get(1)?.as_str());
                let date = (today.year()..=today.year() + MAX_YEAR_LOOKAHEAD).find_map(|year| {
                    parse_date(&format!("{} {}", text, year), formats).filter(|d| *d >= today)
                })?;
                (date, None, true)
            }
        };

        Some(DateMatch {
            pattern: self.name,
            date,
            time,
            year_implied,
        })
    }
}

static DATE_PATTERNS: Lazy<Vec<DatePattern>> = Lazy::new(|| {
    vec![
        DatePattern::new(
            "iso",
            r"(?i)\b(\d{4}-\d{1,2}-\d{1,2})(?:[ T](\d{1,2}:\d{2}(?::\d{2})?)(\s*[ap]m\b)?)?".to_string(),
            PatternKind::Iso,
        ),
        DatePattern::new(
            "weekday_full",
            format!(r"(?i)\b(?:{WEEKDAYS}),?\s+((?:{FULL_MONTHS})\s+\d{{1,2}},?\s*\d{{4}})\b"),
            PatternKind::Explicit(&["%B %d, %Y", "%B %d %Y"]),
        ),
        DatePattern::new(
            "month_range",
            format!(r"(?i)\b((?:{FULL_MONTHS})\s+\d{{1,2}})\s*[-–]\s*(?:[a-z]+\s+)?\d{{1,2}},?\s*(\d{{4}})\b"),
            PatternKind::SharedYearRange,
        ),
        DatePattern::new(
            "full_text",
            format!(r"(?i)\b((?:{FULL_MONTHS})\s+\d{{1,2}},?\s*\d{{4}})\b"),
            PatternKind::Explicit(&["%B %d, %Y", "%B %d %Y"]),
        ),
        DatePattern::new(
            "abbrev_month",
            format!(r"(?i)\b((?:{ABBREV_MONTHS})[a-z]*\.?\s+\d{{1,2}},?\s*\d{{4}})\b"),
            PatternKind::Explicit(&["%b %d, %Y", "%b %d %Y"]),
        ),
        DatePattern::new(
            "numeric_date",
            r"\b(\d{1,2}[-/]\d{1,2}[-/]\d{4})\b".to_string(),
            PatternKind::Explicit(&["%m-%d-%Y", "%m/%d/%Y"]),
        ),
        DatePattern::new(
            "month_day",
            format!(r"(?i)\b((?:{FULL_MONTHS})\s+\d{{1,2}})\b"),
            PatternKind::ImpliedYear(&["%B %d %Y"]),
        ),
        DatePattern::new(
            "abbrev_month_day",
            format!(r"(?i)\b((?:{ABBREV_MONTHS})[a-z]*\.?\s+\d{{1,2}})\b"),
            PatternKind::ImpliedYear(&["%b %d %Y"]),
        ),
    ]
});

struct TimePattern {
    name: &'static str,
    regex: Regex,
    formats: &'static [&'static str],
}

static TIME_PATTERNS: Lazy<Vec<TimePattern>> = Lazy::new(|| {
    let pattern = |name, re: &str, formats| TimePattern {
        name,
        regex: Regex::new(re).expect("time pattern must compile"),
        formats,
    };
    vec![
        pattern("12hour", r"(?i)\b(\d{1,2}:\d{2}\s*[ap]m)\b", &["%I:%M%p"]),
        pattern("12hour_period", r"(?i)\b(\d{1,2}:\d{2}\s*[ap]\.m\.)", &["%I:%M%p"]),
        pattern("24hour", r"\b(\d{1,2}:\d{2})\b", &["%H:%M"]),
    ]
});

static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b((?:{ABBREV_MONTHS})[a-z]*\.?)\s+\d{{1,2}}\b"))
        .expect("month/day pattern must compile")
});

static NUMERIC_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d{4}-\d{1,2}-\d{1,2}|\d{1,2}-\d{1,2}-\d{4})\b")
        .expect("numeric anchor pattern must compile")
});

static YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("year pattern must compile"));

static LEADING_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}(?:[\s,]|$)").expect("leading day pattern must compile"));

/// Run the date cascade over `text`. Implied years resolve against `today`.
pub(crate) fn match_date(text: &str, today: NaiveDate) -> Option<DateMatch> {
    for pattern in DATE_PATTERNS.iter() {
        let Some(caps) = pattern.regex.captures(text) else {
            continue;
        };
        debug!("Pattern {} matched: {}", pattern.name, &caps[0]);
        if let Some(found) = pattern.resolve(&caps, today) {
            return Some(found);
        }
        debug!("Pattern {} matched but no format resolved '{}'", pattern.name, &caps[0]);
    }
    None
}

/// Every date pattern that matches `text`, with the matched slice.
pub(crate) fn matching_patterns(text: &str) -> Vec<(&'static str, String)> {
    DATE_PATTERNS
        .iter()
        .filter_map(|p| p.regex.find(text).map(|m| (p.name, m.as_str().to_string())))
        .collect()
}

/// Run the time cascade over `text`.
pub(crate) fn extract_time(text: &str) -> Option<NaiveTime> {
    TIME_PATTERNS.iter().find_map(|pattern| {
        let caps = pattern.regex.captures(text)?;
        let raw: String = caps[1]
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '.')
            .collect::<String>()
            .to_uppercase();
        let time = pattern
            .formats
            .iter()
            .find_map(|f| NaiveTime::parse_from_str(&raw, f).ok());
        if time.is_some() {
            debug!("Time pattern {} matched: {}", pattern.name, &caps[1]);
        }
        time
    })
}

/// True when the fragment can stand on its own as a date.
pub(crate) fn has_date_anchor(text: &str) -> bool {
    MONTH_DAY.is_match(text) || NUMERIC_ANCHOR.is_match(text)
}

pub(crate) fn find_year(text: &str) -> Option<&str> {
    YEAR.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// The month token of the first month/day pair, e.g. `March` in `March 5 7pm`.
pub(crate) fn leading_month(text: &str) -> Option<&str> {
    MONTH_DAY.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

pub(crate) fn starts_with_day(text: &str) -> bool {
    LEADING_DAY.is_match(text)
}

/// Insert `year` right after the first month/day pair so the fragment hits
/// the explicit-year patterns, or append it when there is no such pair.
pub(crate) fn graft_year(text: &str, year: &str) -> String {
    match MONTH_DAY.find(text) {
        Some(m) => format!("{}, {}{}", &text[..m.end()], year, &text[m.end()..]),
        None => format!("{} {}", text, year),
    }
}

fn parse_date(text: &str, formats: &[&str]) -> Option<NaiveDate> {
    formats
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
}

/// chrono's `%b` does not accept a trailing period (`Jan.`).
fn sanitize(text: &str) -> String {
    text.replace('.', "")
}
