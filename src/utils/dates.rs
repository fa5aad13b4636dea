use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate};
use log::trace;
use regex::Regex;

/// Ukrainian month names in the genitive case, as the portal writes them ("19 грудня").
const MONTHS: [(&str, u32); 12] = [
    ("січня", 1),
    ("лютого", 2),
    ("березня", 3),
    ("квітня", 4),
    ("травня", 5),
    ("червня", 6),
    ("липня", 7),
    ("серпня", 8),
    ("вересня", 9),
    ("жовтня", 10),
    ("листопада", 11),
    ("грудня", 12),
];

static RE_ISO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{4})-([0-9]{2})-([0-9]{2})").expect("invalid regex: iso date")
});

static RE_DOTTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{1,2})\.([0-9]{1,2})\.([0-9]{4})").expect("invalid regex: dotted date")
});

static RE_MONTH_NAME: LazyLock<Regex> = LazyLock::new(|| {
    let names = MONTHS.iter().map(|(name, _)| *name).collect::<Vec<_>>().join("|");
    Regex::new(&format!(r"(?i)([0-9]{{1,2}})\s+({})\s*([0-9]{{4}})?", names))
        .expect("invalid regex: month name date")
});

/// Recovers a calendar date from a short text fragment, or `None`.
///
/// Tried in order: an embedded ISO `YYYY-MM-DD`, a dotted `D.M.YYYY`, and a
/// day followed by a Ukrainian month name with an optional year. A missing
/// year means the current one.
pub fn parse_date_token(text: &str) -> Option<NaiveDate> {
    parse_date_token_in_year(text, Local::now().year())
}

/// Same as [`parse_date_token`] with an explicit fallback year for month-name dates.
pub fn parse_date_token_in_year(text: &str, default_year: i32) -> Option<NaiveDate> {
    if let Some(caps) = RE_ISO.captures(text) {
        if let Some(date) = ymd(&caps[1], &caps[2], &caps[3]) {
            return Some(date);
        }
        trace!("ISO-looking fragment is not a calendar date: {}", &caps[0]);
    }

    if let Some(caps) = RE_DOTTED.captures(text) {
        if let Some(date) = ymd(&caps[3], &caps[2], &caps[1]) {
            return Some(date);
        }
        trace!("Dotted fragment is not a calendar date: {}", &caps[0]);
    }

    let caps = RE_MONTH_NAME.captures(text)?;
    let month = month_number(&caps[2])?;
    let day: u32 = caps[1].parse().ok()?;
    let year = match caps.get(3) {
        Some(y) => y.as_str().parse().ok()?,
        None => default_year,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Month number for a genitive Ukrainian month name, case-insensitive.
pub fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    MONTHS.iter().find(|(n, _)| *n == name).map(|(_, m)| *m)
}

/// Formats a date the way the portal's date pickers expect it.
pub fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// First day of the school year containing `today`: 1 August, or the previous
/// year's 1 August before that.
pub fn academic_year_start(today: NaiveDate) -> NaiveDate {
    let year = if today.month() >= 8 { today.year() } else { today.year() - 1 };
    NaiveDate::from_ymd_opt(year, 8, 1).unwrap_or(today)
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn iso_date_inside_text() {
        assert_eq!(parse_date_token("7 (2025-10-03)"), Some(date(2025, 10, 3)));
        assert_eq!(parse_date_token("оцінка від 2024-02-29, усно"), Some(date(2024, 2, 29)));
    }

    #[test]
    fn dotted_date_is_zero_padded() {
        assert_eq!(parse_date_token("3.9.2025"), Some(date(2025, 9, 3)));
        assert_eq!(parse_date_token("10 (15.11.2025)"), Some(date(2025, 11, 15)));
    }

    #[test]
    fn iso_wins_over_dotted() {
        assert_eq!(parse_date_token("1.1.2020 / 2021-05-06"), Some(date(2021, 5, 6)));
    }

    #[test]
    fn month_name_with_and_without_year() {
        assert_eq!(parse_date_token_in_year("19 грудня 2024", 2030), Some(date(2024, 12, 19)));
        assert_eq!(parse_date_token_in_year("5 Березня", 2026), Some(date(2026, 3, 5)));
        assert_eq!(parse_date_token_in_year("Оцінка 19 грудня о 10:06", 2025), Some(date(2025, 12, 19)));
    }

    #[test]
    fn no_date_found() {
        assert_eq!(parse_date_token("7"), None);
        assert_eq!(parse_date_token("Н"), None);
        assert_eq!(parse_date_token(""), None);
        assert_eq!(parse_date_token("45.13.2025"), None);
        assert_eq!(parse_date_token_in_year("31 лютого", 2025), None);
    }

    #[test]
    fn school_year_start() {
        assert_eq!(academic_year_start(date(2025, 10, 18)), date(2025, 8, 1));
        assert_eq!(academic_year_start(date(2026, 3, 2)), date(2025, 8, 1));
        assert_eq!(academic_year_start(date(2026, 8, 1)), date(2026, 8, 1));
    }
}
