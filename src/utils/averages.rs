use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{GradeEvent, GradeStatementResult, ReportCardEntry};
use crate::utils::dates::academic_year_start;

static RE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+(?:[.,][0-9]+)?)").expect("invalid regex: number"));

/// How many distinct non-numeric marks are listed for a subject without an average.
const NON_NUMERIC_SHOWN: usize = 3;

/// Best-effort numeric value of a mark: the first decimal number in it.
/// "7(усно)" is 7, "8,5" is 8.5, "Н" has none.
pub fn extract_numeric(mark: &str) -> Option<f64> {
    let caps = RE_NUMBER.captures(mark)?;
    caps[1].replace(',', ".").parse().ok()
}

/// Inclusive date window, open on either side when a bound is missing.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        DateRange { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    /// Fills the missing bounds with the current school year: from 1 August
    /// up to `today`.
    pub fn or_school_year(start: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate) -> Self {
        DateRange {
            start: Some(start.unwrap_or_else(|| academic_year_start(today))),
            end: Some(end.unwrap_or(today)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SubjectAverage {
    pub subject: String,
    pub average: Option<f64>,
    /// Numeric marks when there is an average, all marks otherwise.
    pub count: usize,
    pub non_numeric: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Summary {
    pub range: DateRange,
    pub subjects: Vec<SubjectAverage>,
    pub overall: Option<f64>,
    pub token_dates_present: bool,
}

impl Summary {
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

/// Averages of a grade statement.
///
/// The range the caller asked for filters dated marks; without one the range
/// declared on the page is used. Marks without a date cannot be placed and are
/// always counted.
pub fn summarize_statement(result: &GradeStatementResult, requested: Option<DateRange>) -> Summary {
    let page_range = DateRange::new(result.range_start, result.range_end);
    let range = requested.unwrap_or(page_range);

    let subjects = result.subjects.values().filter_map(|marks| {
        let kept: Vec<String> = marks
            .tokens
            .iter()
            .filter(|t| t.date.map_or(true, |d| range.contains(d)))
            .map(|t| t.text.clone())
            .collect();
        if kept.len() < marks.tokens.len() {
            debug!("{}: {} of {} marks outside {:?}", marks.subject, marks.tokens.len() - kept.len(), marks.tokens.len(), range);
        }
        (!kept.is_empty()).then(|| (marks.subject.clone(), kept))
    });

    let mut summary = summarize(subjects);
    summary.range = range;
    summary.token_dates_present = result.has_token_dates();
    summary
}

/// Averages built from news feed grade events, grouped by subject in feed order.
pub fn summarize_events(events: &[GradeEvent]) -> Summary {
    let mut order: Vec<(String, Vec<String>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for event in events {
        match index.get(event.subject.as_str()) {
            Some(&i) => order[i].1.push(event.grade.clone()),
            None => {
                index.insert(&event.subject, order.len());
                order.push((event.subject.clone(), vec![event.grade.clone()]));
            }
        }
    }
    summarize(order)
}

/// Per-subject and overall averages over the numeric marks. Subjects with an
/// average come first, best first; the rest follow in input order.
pub fn summarize<I>(subjects: I) -> Summary
where
    I: IntoIterator<Item = (String, Vec<String>)>,
{
    let mut total = 0.0;
    let mut total_count = 0usize;
    let mut numeric = Vec::new();
    let mut other = Vec::new();

    for (subject, marks) in subjects {
        let values: Vec<f64> = marks.iter().filter_map(|m| extract_numeric(m)).collect();
        if values.is_empty() {
            other.push(SubjectAverage {
                subject,
                average: None,
                count: marks.len(),
                non_numeric: most_frequent(&marks, NON_NUMERIC_SHOWN),
            });
            continue;
        }

        let sum: f64 = values.iter().sum();
        total += sum;
        total_count += values.len();
        numeric.push(SubjectAverage {
            subject,
            average: Some(sum / values.len() as f64),
            count: values.len(),
            non_numeric: Vec::new(),
        });
    }

    numeric.sort_by(|a, b| {
        let (a, b) = (a.average.unwrap_or_default(), b.average.unwrap_or_default());
        b.total_cmp(&a)
    });
    numeric.extend(other);

    Summary {
        range: DateRange::default(),
        subjects: numeric,
        overall: (total_count > 0).then(|| total / total_count as f64),
        token_dates_present: false,
    }
}

/// Average of the report card entries that carry a numeric grade.
pub fn report_card_average(entries: &[ReportCardEntry]) -> Option<f64> {
    let grades: Vec<f64> = entries
        .iter()
        .filter(|e| e.has_grade())
        .filter_map(|e| e.term_grade.parse::<f64>().ok())
        .collect();
    (!grades.is_empty()).then(|| grades.iter().sum::<f64>() / grades.len() as f64)
}

fn most_frequent(marks: &[String], limit: usize) -> Vec<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for mark in marks {
        match counts.iter().position(|(m, _)| *m == mark.as_str()) {
            Some(i) => counts[i].1 += 1,
            None => counts.push((mark.as_str(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(limit).map(|(m, _)| m.to_string()).collect()
}
