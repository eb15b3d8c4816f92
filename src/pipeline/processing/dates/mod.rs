//! Free-text date/time parsing for scraped event listings.
//!
//! A listing's date block can be a single date, a range, a list of dates,
//! or noise. [`DateExpressionParser::parse`] turns it into a
//! [`DateExpression`] and never fails outright: anything it cannot make
//! sense of comes back as [`DateExpression::Unparseable`].

mod patterns;

use chrono::{Datelike, Duration, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::domain::{Instant, INSTANT_FORMAT};

/// Separators that split a date block into a start and an end, in the
/// order they are tried.
const RANGE_SEPARATORS: &[&str] = &[" - ", "–", " to ", " through ", " until ", "−"];

static WORD_AND: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+and\s+").expect("valid regex"));
static NUMERIC_SLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{2,4})\b").expect("valid regex"));
static ORDINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").expect("valid regex"));
static MERIDIEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)([ap])\.m\.").expect("valid regex"));
static SEPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bsept\b").expect("valid regex"));

/// Why a date fragment was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("could not parse date from '{text}'")]
    ParseFailure { text: String },

    #[error("date {instant} parsed from '{text}' is outside the accepted window")]
    OutOfRangeDate { text: String, instant: Instant },
}

impl ParseError {
    fn failure(text: &str) -> Self {
        ParseError::ParseFailure {
            text: text.to_string(),
        }
    }
}

/// The structured result of parsing one free-text date block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateExpression {
    Single(Instant),
    Range { start: Instant, end: Instant },
    /// Sorted ascending, never empty.
    MultiDate(Vec<Instant>),
    Unparseable { text: String, error: ParseError },
}

impl DateExpression {
    /// The earliest instant the expression contains.
    pub fn canonical_instant(&self) -> Option<Instant> {
        match self {
            DateExpression::Single(instant) => Some(*instant),
            DateExpression::Range { start, .. } => Some(*start),
            DateExpression::MultiDate(instants) => instants.iter().min().copied(),
            DateExpression::Unparseable { .. } => None,
        }
    }

    /// Every instant the expression contains, ascending.
    pub fn instants(&self) -> Vec<Instant> {
        match self {
            DateExpression::Single(instant) => vec![*instant],
            DateExpression::Range { start, end } => vec![*start, *end],
            DateExpression::MultiDate(instants) => instants.clone(),
            DateExpression::Unparseable { .. } => Vec::new(),
        }
    }

    pub fn is_parseable(&self) -> bool {
        !matches!(self, DateExpression::Unparseable { .. })
    }

    pub fn error(&self) -> Option<&ParseError> {
        match self {
            DateExpression::Unparseable { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for DateExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateExpression::Single(instant) => write!(f, "Single({})", instant.format(INSTANT_FORMAT)),
            DateExpression::Range { start, end } => write!(
                f,
                "Range({} to {})",
                start.format(INSTANT_FORMAT),
                end.format(INSTANT_FORMAT)
            ),
            DateExpression::MultiDate(instants) => {
                let rendered: Vec<String> = instants
                    .iter()
                    .map(|i| i.format(INSTANT_FORMAT).to_string())
                    .collect();
                write!(f, "MultiDate({})", rendered.join(", "))
            }
            DateExpression::Unparseable { error, .. } => write!(f, "Unparseable({})", error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Text before the first occurrence of this character is a location
    /// label, not part of the date (`Napa * January 31`).
    pub location_separator: char,
    /// Parsed instants further than this from `now` are rejected.
    pub sanity_years: u32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            location_separator: '*',
            sanity_years: 5,
        }
    }
}

/// One successfully parsed fragment.
#[derive(Debug, Clone, Copy)]
struct ParsedDate {
    instant: Instant,
    year_implied: bool,
}

/// Cascading parser for scraped date blocks, evaluated relative to a fixed
/// `now` so results are reproducible.
#[derive(Debug, Clone)]
pub struct DateExpressionParser {
    now: Instant,
    config: ParserConfig,
}

impl DateExpressionParser {
    pub fn new(now: Instant) -> Self {
        Self::with_config(now, ParserConfig::default())
    }

    pub fn with_config(now: Instant, config: ParserConfig) -> Self {
        Self { now, config }
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn parse(&self, text: &str) -> DateExpression {
        debug!("Attempting to parse date: {}", text);

        let cleaned = clean_input(text);
        let stripped = self.strip_location_prefix(&cleaned);
        if stripped.is_empty() {
            return DateExpression::Unparseable {
                text: text.to_string(),
                error: ParseError::failure(text),
            };
        }

        if let Some((start, end)) = self.parse_range(stripped) {
            debug!("Parsed date range: {} to {}", start, end);
            return DateExpression::Range { start, end };
        }

        match self.parse_multiple(stripped) {
            Some(Ok(instants)) => {
                debug!("Parsed {} dates from list", instants.len());
                return DateExpression::MultiDate(instants);
            }
            Some(Err(error)) => {
                return DateExpression::Unparseable {
                    text: text.to_string(),
                    error,
                }
            }
            None => {}
        }

        match self.parse_single(stripped, None) {
            Ok(parsed) => DateExpression::Single(parsed.instant),
            Err(error) => {
                debug!("Failed to parse date string '{}': {}", text, error);
                DateExpression::Unparseable {
                    text: text.to_string(),
                    error,
                }
            }
        }
    }

    /// Step-by-step account of how `text` is interpreted, for debugging
    /// scraper output.
    pub fn explain(&self, text: &str) -> Vec<String> {
        let mut lines = vec![format!("Input: {}", text)];

        let cleaned = clean_input(text);
        lines.push(format!("Cleaned input: {}", cleaned));

        let stripped = self.strip_location_prefix(&cleaned);
        if stripped != cleaned {
            lines.push(format!("Location prefix removed: {}", stripped));
        }

        for (name, matched) in patterns::matching_patterns(stripped) {
            lines.push(format!("Pattern '{}' matched: {}", name, matched));
        }
        if let Some(time) = patterns::extract_time(stripped) {
            lines.push(format!("Found time: {}", time.format("%I:%M %p")));
        }

        lines.push(format!("Result: {}", self.parse(text)));
        lines
    }

    fn strip_location_prefix<'a>(&self, text: &'a str) -> &'a str {
        match text.split_once(self.config.location_separator) {
            Some((_, rest)) => rest.trim(),
            None => text,
        }
    }

    fn parse_range(&self, text: &str) -> Option<(Instant, Instant)> {
        for separator in RANGE_SEPARATORS {
            let Some((start, end)) = text.split_once(separator) else {
                continue;
            };
            let (start, end) = (start.trim(), end.trim());
            if start.is_empty() || end.is_empty() {
                continue;
            }
            match self.parse_range_parts(start, end) {
                Ok(range) => return Some(range),
                Err(e) => debug!("Range split on '{}' rejected: {}", separator, e),
            }
        }
        None
    }

    fn parse_range_parts(&self, start: &str, end: &str) -> Result<(Instant, Instant), ParseError> {
        let whole = format!("{} - {}", start, end);
        let mut start_text = start.to_string();
        let mut end_text = end.to_string();

        // `March 5 – 12, 2025`: the end borrows the start's month.
        if !patterns::has_date_anchor(end) && patterns::starts_with_day(end) {
            if let Some(month) = patterns::leading_month(start) {
                end_text = format!("{} {}", month, end_text);
            }
        }

        let mut start_grafted = false;
        let mut end_grafted = false;
        match (patterns::find_year(start), patterns::find_year(&end_text)) {
            (None, Some(year)) => {
                start_text = patterns::graft_year(&start_text, year);
                start_grafted = true;
            }
            (Some(year), None) => {
                end_text = patterns::graft_year(&end_text, year);
                end_grafted = true;
            }
            _ => {}
        }

        let mut first = self.parse_single(&start_text, None)?;
        let mut last = self.parse_single(&end_text, None)?;

        // Runs that cross New Year borrow a year that is off by one.
        if end_grafted && last.instant < first.instant {
            last.instant = shift_years(last.instant, 1).ok_or_else(|| ParseError::failure(&whole))?;
        }
        if start_grafted && first.instant > last.instant {
            first.instant = shift_years(first.instant, -1).ok_or_else(|| ParseError::failure(&whole))?;
        }
        // With no year on either side the end decides: the start joins the
        // end's year, or the one before for a run across New Year.
        if first.year_implied && last.year_implied {
            let aligned = first
                .instant
                .with_year(last.instant.year())
                .ok_or_else(|| ParseError::failure(&whole))?;
            first.instant = if aligned > last.instant {
                shift_years(aligned, -1).ok_or_else(|| ParseError::failure(&whole))?
            } else {
                aligned
            };
        }

        self.check_bounds(first.instant, start)?;
        self.check_bounds(last.instant, end)?;
        if first.instant > last.instant {
            return Err(ParseError::failure(&whole));
        }
        Ok((first.instant, last.instant))
    }

    /// `None` when the text is not a list of dates at all.
    fn parse_multiple(&self, text: &str) -> Option<Result<Vec<Instant>, ParseError>> {
        let fragments = attach_dangling(split_multiple(text));
        if fragments.len() < 2 {
            return None;
        }

        let shared_time = patterns::extract_time(text);
        let trailing_year = trailing_year(&fragments);
        // Dates borrowing the trailing year must not land after the date
        // that carries it (`December 28 and January 3, 2025`).
        let anchor = match (&trailing_year, fragments.last()) {
            (Some(_), Some(last)) => self.parse_single(last, shared_time).ok().map(|p| p.instant),
            _ => None,
        };

        let mut instants = Vec::with_capacity(fragments.len());
        let mut first_error = None;
        for fragment in &fragments {
            let parsed = match &trailing_year {
                Some(year) if patterns::find_year(fragment).is_none() => self
                    .parse_single(&patterns::graft_year(fragment, year), shared_time)
                    .and_then(|mut parsed| {
                        if anchor.is_some_and(|a| parsed.instant > a) {
                            parsed.instant = shift_years(parsed.instant, -1)
                                .ok_or_else(|| ParseError::failure(fragment))?;
                        }
                        Ok(parsed)
                    }),
                _ => self.parse_single(fragment, shared_time),
            };
            match parsed {
                Ok(parsed) => instants.push(parsed.instant),
                Err(e) => {
                    debug!("Dropping date fragment '{}': {}", fragment, e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if instants.is_empty() {
            return Some(Err(first_error.unwrap_or_else(|| ParseError::failure(text))));
        }
        instants.sort();
        instants.dedup();
        Some(Ok(instants))
    }

    fn parse_single(&self, text: &str, fallback_time: Option<NaiveTime>) -> Result<ParsedDate, ParseError> {
        debug!("Attempting to parse single date: {}", text);

        let found = patterns::match_date(text, self.now.date()).ok_or_else(|| ParseError::failure(text))?;
        let time = found
            .time
            .or_else(|| patterns::extract_time(text))
            .or(fallback_time)
            .unwrap_or(NaiveTime::MIN);
        let instant = found.date.and_time(time);

        self.check_bounds(instant, text)?;
        debug!("Parsed '{}' using {} pattern: {}", text, found.pattern, instant);
        Ok(ParsedDate {
            instant,
            year_implied: found.year_implied,
        })
    }

    /// A window edge that falls outside chrono's range leaves that side open.
    fn check_bounds(&self, instant: Instant, text: &str) -> Result<(), ParseError> {
        let window = Duration::try_days(365 * i64::from(self.config.sanity_years));
        let earliest = window.and_then(|w| self.now.checked_sub_signed(w));
        let latest = window.and_then(|w| self.now.checked_add_signed(w));
        let too_early = earliest.is_some_and(|bound| instant < bound);
        let too_late = latest.is_some_and(|bound| instant > bound);
        if too_early || too_late {
            return Err(ParseError::OutOfRangeDate {
                text: text.to_string(),
                instant,
            });
        }
        Ok(())
    }
}

/// Trim, collapse whitespace, and normalize the notations scrapers vary on.
fn clean_input(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let text = NUMERIC_SLASH.replace_all(&collapsed, "$1-$2-$3");
    let text = ORDINAL.replace_all(&text, "$1");
    let text = MERIDIEM.replace_all(&text, "${1}m");
    SEPT.replace_all(&text, "Sep").into_owned()
}

/// The year of the last fragment, when it is the only fragment carrying one
/// (`March 8 and March 9, 2024`).
fn trailing_year(fragments: &[String]) -> Option<String> {
    let (last, rest) = fragments.split_last()?;
    if rest.iter().any(|f| patterns::find_year(f).is_some()) {
        return None;
    }
    patterns::find_year(last).map(str::to_string)
}

/// Split on `and`, then `&`, then `,`.
fn split_multiple(text: &str) -> Vec<String> {
    WORD_AND
        .split(text)
        .flat_map(|part| part.split('&'))
        .flat_map(|part| part.split(','))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Glue fragments that cannot stand alone as a date (a bare year, a time,
/// a weekday) onto their neighbour, so `March 10, 2024` stays whole.
fn attach_dangling(fragments: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(fragments.len());
    let mut leading: Option<String> = None;

    for fragment in fragments {
        if patterns::has_date_anchor(&fragment) {
            out.push(match leading.take() {
                Some(prefix) => format!("{}, {}", prefix, fragment),
                None => fragment,
            });
        } else if let Some(last) = out.last_mut() {
            last.push_str(", ");
            last.push_str(&fragment);
        } else {
            leading = Some(match leading.take() {
                Some(prefix) => format!("{}, {}", prefix, fragment),
                None => fragment,
            });
        }
    }

    if let Some(rest) = leading {
        out.push(rest);
    }
    out
}

fn shift_years(instant: Instant, delta: i32) -> Option<Instant> {
    instant.with_year(instant.year() + delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Instant {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> Instant {
        at(y, m, d, 0, 0, 0)
    }

    /// Wednesday 2024-03-06, noon.
    fn parser() -> DateExpressionParser {
        DateExpressionParser::new(at(2024, 3, 6, 12, 0, 0))
    }

    #[test]
    fn test_iso_datetime() {
        assert_eq!(
            parser().parse("2024-03-10 19:00:00"),
            DateExpression::Single(at(2024, 3, 10, 19, 0, 0))
        );
    }

    #[test]
    fn test_full_date_without_time_is_midnight() {
        assert_eq!(parser().parse("March 10, 2024"), DateExpression::Single(day(2024, 3, 10)));
    }

    #[test]
    fn test_location_prefix_and_range_share_inferred_year() {
        let expr = parser().parse("Napa * January 31 – February 22");
        assert_eq!(
            expr,
            DateExpression::Range {
                start: day(2025, 1, 31),
                end: day(2025, 2, 22),
            }
        );
        assert_eq!(expr.canonical_instant(), Some(day(2025, 1, 31)));
    }

    #[test]
    fn test_running_range_stays_in_current_year() {
        let parser = DateExpressionParser::new(at(2024, 2, 10, 9, 0, 0));
        assert_eq!(
            parser.parse("Napa * January 31 – February 22"),
            DateExpression::Range {
                start: day(2024, 1, 31),
                end: day(2024, 2, 22),
            }
        );
    }

    #[test]
    fn test_range_grafts_year_and_month() {
        assert_eq!(
            parser().parse("March 5 – 12, 2025"),
            DateExpression::Range {
                start: day(2025, 3, 5),
                end: day(2025, 3, 12),
            }
        );
        assert_eq!(
            parser().parse("December 28, 2024 to January 3"),
            DateExpression::Range {
                start: day(2024, 12, 28),
                end: day(2025, 1, 3),
            }
        );
        assert_eq!(
            parser().parse("March 5 until March 9, 2024"),
            DateExpression::Range {
                start: day(2024, 3, 5),
                end: day(2024, 3, 9),
            }
        );
        assert_eq!(
            parser().parse("March 5, 2024 − March 9"),
            DateExpression::Range {
                start: day(2024, 3, 5),
                end: day(2024, 3, 9),
            }
        );
        assert_eq!(
            parser().parse("December 28 through January 3, 2025"),
            DateExpression::Range {
                start: day(2024, 12, 28),
                end: day(2025, 1, 3),
            }
        );
    }

    #[test]
    fn test_inverted_explicit_range_is_not_a_range() {
        // Both sides carry years, so neither is adjusted; falls back to the
        // first date found.
        assert_eq!(
            parser().parse("March 12 2025 - March 5 2025"),
            DateExpression::Single(day(2025, 3, 12))
        );
    }

    #[test]
    fn test_month_range_shorthand_uses_start() {
        assert_eq!(parser().parse("March 5-12, 2025"), DateExpression::Single(day(2025, 3, 5)));
    }

    #[test]
    fn test_multiple_dates() {
        let expr = parser().parse("January 5 and January 12");
        assert_eq!(
            expr,
            DateExpression::MultiDate(vec![day(2025, 1, 5), day(2025, 1, 12)])
        );
        assert_eq!(expr.canonical_instant(), Some(day(2025, 1, 5)));
    }

    #[test]
    fn test_multiple_dates_tolerate_partial_failure() {
        let expr = parser().parse("March 10, 2024 & Marchish 99");
        assert_eq!(expr, DateExpression::MultiDate(vec![day(2024, 3, 10)]));

        let expr = parser().parse("April 1, 2024 and April 1, 2099 and April 8, 2024");
        assert_eq!(expr, DateExpression::MultiDate(vec![day(2024, 4, 1), day(2024, 4, 8)]));
    }

    #[test]
    fn test_list_fragments_inherit_shared_time() {
        assert_eq!(
            parser().parse("March 15 & March 16, 2024 at 8:00 pm"),
            DateExpression::MultiDate(vec![at(2024, 3, 15, 20, 0, 0), at(2024, 3, 16, 20, 0, 0)])
        );
    }

    #[test]
    fn test_list_fragments_borrow_trailing_year() {
        let parser = DateExpressionParser::new(at(2024, 3, 9, 12, 0, 0));
        assert_eq!(
            parser.parse("March 8 and March 9, 2024"),
            DateExpression::MultiDate(vec![day(2024, 3, 8), day(2024, 3, 9)])
        );
        assert_eq!(
            parser.parse("December 28 and January 3, 2025"),
            DateExpression::MultiDate(vec![day(2024, 12, 28), day(2025, 1, 3)])
        );
        // A year on more than one fragment leaves each as written.
        assert_eq!(
            parser.parse("March 8, 2025 and March 20 and March 9, 2024"),
            DateExpression::MultiDate(vec![day(2024, 3, 9), day(2024, 3, 20), day(2025, 3, 8)])
        );
    }

    #[test]
    fn test_huge_sanity_window_never_panics() {
        for sanity_years in [1_000_000, u32::MAX] {
            let config = ParserConfig {
                sanity_years,
                ..ParserConfig::default()
            };
            let parser = DateExpressionParser::with_config(at(2024, 3, 6, 12, 0, 0), config);
            assert_eq!(parser.parse("March 10, 2024"), DateExpression::Single(day(2024, 3, 10)));
            assert_eq!(parser.parse("1901-01-01"), DateExpression::Single(day(1901, 1, 1)));
        }
    }

    #[test]
    fn test_commas_inside_one_date_do_not_split_it() {
        assert_eq!(
            parser().parse("Saturday, March 9, 2024, 7:30 p.m."),
            DateExpression::Single(at(2024, 3, 9, 19, 30, 0))
        );
        assert_eq!(
            parser().parse("Dec 06, 2024, 4:00 PM – 6:00 PM"),
            DateExpression::Single(at(2024, 12, 6, 16, 0, 0))
        );
    }

    #[test]
    fn test_cleaning_handles_slashes_and_ordinals() {
        assert_eq!(parser().parse("03/15/2024 8:00pm"), DateExpression::Single(at(2024, 3, 15, 20, 0, 0)));
        assert_eq!(parser().parse("March 21st, 2024"), DateExpression::Single(day(2024, 3, 21)));
        assert_eq!(parser().parse("Sept 3, 2024"), DateExpression::Single(day(2024, 9, 3)));
    }

    #[test]
    fn test_unparseable() {
        let expr = parser().parse("not a date");
        assert!(!expr.is_parseable());
        assert_eq!(expr.canonical_instant(), None);
        assert!(matches!(expr.error(), Some(ParseError::ParseFailure { .. })));

        assert!(!parser().parse("   ").is_parseable());
        assert!(!parser().parse("Napa *").is_parseable());
    }

    #[test]
    fn test_sanity_bound() {
        let expr = parser().parse("March 10, 2031");
        assert!(matches!(expr.error(), Some(ParseError::OutOfRangeDate { .. })));

        let expr = parser().parse("1999-01-01");
        assert!(matches!(expr.error(), Some(ParseError::OutOfRangeDate { .. })));

        let now = parser().now();
        for text in ["March 10, 2028", "January 5 and January 12", "2020-01-01", "Feb 29"] {
            if let Some(instant) = parser().parse(text).canonical_instant() {
                assert!((instant - now).num_days().abs() <= 365 * 5, "{} escaped the window", text);
            }
        }
    }

    #[test]
    fn test_implied_year_rolls_forward_when_in_the_past() {
        let parser = DateExpressionParser::new(at(2024, 6, 15, 18, 0, 0));
        assert_eq!(parser.parse("March 10"), DateExpression::Single(day(2025, 3, 10)));
        // Today is not in the past, even after the clock has moved on.
        assert_eq!(parser.parse("June 15"), DateExpression::Single(day(2024, 6, 15)));
        // No special casing for December.
        assert_eq!(parser.parse("December 1"), DateExpression::Single(day(2024, 12, 1)));
        assert_eq!(parser.parse("Jan 3 7:00 pm"), DateExpression::Single(at(2025, 1, 3, 19, 0, 0)));
    }

    #[test]
    fn test_custom_location_separator() {
        let config = ParserConfig {
            location_separator: '|',
            ..ParserConfig::default()
        };
        let parser = DateExpressionParser::with_config(at(2024, 3, 6, 12, 0, 0), config);
        assert_eq!(parser.parse("Petaluma | March 10, 2024"), DateExpression::Single(day(2024, 3, 10)));
    }

    #[test]
    fn test_explain_reports_steps() {
        let lines = parser().explain("Napa * March 10, 2024 7:00 p.m.");
        assert!(lines.iter().any(|l| l == "Cleaned input: Napa * March 10, 2024 7:00 pm"));
        assert!(lines.iter().any(|l| l == "Location prefix removed: March 10, 2024 7:00 pm"));
        assert!(lines.iter().any(|l| l.starts_with("Pattern 'full_text' matched")));
        assert!(lines.iter().any(|l| l == "Found time: 07:00 PM"));
        assert_eq!(lines.last().unwrap(), "Result: Single(2024-03-10 19:00:00)");
    }
}
