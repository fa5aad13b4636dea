use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use log::{debug, info, warn};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::models::{GradeStatementResult, MarkToken, SubjectMarks};
use crate::utils::dates::parse_date_token;
use crate::utils::html::{element_text, selector, visible_text};

type SubjectMap = BTreeMap<String, SubjectMarks>;

/// One way of reading the subjects off a page. Returns `None` when the page
/// does not look like what the strategy expects.
type Strategy = fn(&Page) -> Option<SubjectMap>;

/// Tried in order; the first strategy that finds a subject wins, so text
/// lines on a statement page take precedence over its table.
const STRATEGIES: [(&str, Strategy); 3] = [
    ("lines", subjects_from_lines),
    ("table", subjects_from_table),
    ("flexible", subjects_from_loose_lines),
];

/// Text that marks a page as a grade statement; the line grammars are only
/// trusted on such pages.
const STATEMENT_MARKERS: [&str; 2] = ["Виписка оцінок", "Отримані результати"];

// "1 Англійська мова  6, 7, Н"
static RE_NUMBERED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([0-9]+)\s+([^\t\n\r0-9].*?)\s{2,}(.+)$").expect("invalid regex: numbered line")
});

// "1. Англійська мова 6, 7, Н" with the marks restricted to the grade alphabet
static RE_LOOSE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([0-9]+)[.)\s]+(.+?)\s+([0-9\s,;НПВ\-]+)$").expect("invalid regex: loose line")
});

static RE_LOOSE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;\s]+").expect("invalid regex: loose separators"));

static RE_RANGE_SENTENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Оберіть діапазон дат:\s*(\S+)\s*по\s*(\S+)").expect("invalid regex: range sentence")
});

static RE_NEAR_DATES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{4}-[0-9]{2}-[0-9]{2}).{0,40}?([0-9]{4}-[0-9]{2}-[0-9]{2})")
        .expect("invalid regex: near dates")
});

static SEL_DATE_FROM: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"input[name="date_from"], input[id$="date_from"]"#));
static SEL_DATE_TO: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"input[name="date_to"], input[id$="date_to"]"#));
static SEL_MARKS_TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table.marks-report"));
static SEL_TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table"));
static SEL_TR: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static SEL_TD: LazyLock<Selector> = LazyLock::new(|| selector("td"));

/// A fetched page, parsed once and shared by every strategy.
struct Page {
    document: Html,
    text: String,
}

/// Reads the "Виписка оцінок" (grade statement) page.
///
/// Best effort: a page that matches no known layout yields a result with no
/// subjects rather than an error. Callers treat an empty result as "nothing
/// found" and decide on their own whether to retry or fall back.
pub struct GradesStatementParser;

impl GradesStatementParser {
    pub fn parse(html: &str) -> GradeStatementResult {
        let document = Html::parse_document(html);
        let text = visible_text(&document);
        let page = Page { document, text };

        let (range_start, range_end) = declared_range(&page);

        let subjects = STRATEGIES
            .iter()
            .find_map(|(name, strategy)| {
                let found = strategy(&page).filter(|subjects| !subjects.is_empty())?;
                info!("Grade statement parsed with the {} strategy: {} subjects", name, found.len());
                Some(found)
            })
            .unwrap_or_else(|| {
                warn!("No subjects found in grade statement ({} chars of text)", page.text.len());
                SubjectMap::new()
            });

        GradeStatementResult { range_start, range_end, subjects }
    }
}

/// The reporting window shown on the page: the date picker inputs, then the
/// "Оберіть діапазон дат" sentence, then any two ISO dates close together.
fn declared_range(page: &Page) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let start = input_date(&page.document, &SEL_DATE_FROM);
    let end = input_date(&page.document, &SEL_DATE_TO);
    if start.is_some() || end.is_some() {
        debug!("Date range from inputs: {:?} - {:?}", start, end);
        return (start, end);
    }

    if let Some(caps) = RE_RANGE_SENTENCE.captures(&page.text) {
        let start = parse_date_token(&caps[1]);
        let end = parse_date_token(&caps[2]);
        if start.is_some() || end.is_some() {
            debug!("Date range from range sentence: {:?} - {:?}", start, end);
            return (start, end);
        }
    }

    if let Some(caps) = RE_NEAR_DATES.captures(&page.text) {
        return (parse_date_token(&caps[1]), parse_date_token(&caps[2]));
    }

    (None, None)
}

fn input_date(document: &Html, sel: &Selector) -> Option<NaiveDate> {
    document
        .select(sel)
        .filter_map(|input| input.value().attr("value"))
        .find_map(parse_date_token)
}

fn subjects_from_lines(page: &Page) -> Option<SubjectMap> {
    if !STATEMENT_MARKERS.iter().any(|m| page.text.contains(m)) {
        return None;
    }
    let mut subjects = SubjectMap::new();
    for line in page.text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (subject, marks) = if let Some(caps) = RE_NUMBERED_LINE.captures(line) {
            (caps[2].trim().to_string(), caps[3].trim().to_string())
        } else {
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 3 || !is_row_number(parts[0]) {
                continue;
            }
            (parts[1].trim().to_string(), parts[2].trim().to_string())
        };

        insert_subject(&mut subjects, subject, split_marks(&marks));
    }
    Some(subjects)
}

fn subjects_from_table(page: &Page) -> Option<SubjectMap> {
    let table = match page.document.select(&SEL_MARKS_TABLE).next() {
        Some(table) => table,
        None => {
            let fallback = page.document.select(&SEL_TABLE).find(|t| has_wide_row(*t))?;
            debug!("No marks-report table, using the first table with 3+ cells per row");
            fallback
        }
    };

    let mut subjects = SubjectMap::new();
    for tr in table.select(&SEL_TR) {
        let tds: Vec<ElementRef> = tr.select(&SEL_TD).collect();
        if tds.len() < 3 {
            continue;
        }
        let number = element_text(tds[0], " ");
        let subject = element_text(tds[1], " ");
        let marks = element_text(tds[2], " ");

        if !is_row_number(&number) || subject.is_empty() {
            continue;
        }
        if marks.is_empty() {
            debug!("Skipping subject '{}': empty marks cell", subject);
            continue;
        }

        insert_subject(&mut subjects, subject, split_marks(&marks));
    }
    Some(subjects)
}

fn subjects_from_loose_lines(page: &Page) -> Option<SubjectMap> {
    let mut subjects = SubjectMap::new();
    for line in page.text.lines() {
        let Some(caps) = RE_LOOSE_LINE.captures(line.trim()) else {
            continue;
        };
        let tokens: Vec<String> = RE_LOOSE_SEPARATORS
            .split(&caps[3])
            .map(str::trim)
            .filter(|t| !t.is_empty() && *t != "-")
            .map(str::to_string)
            .collect();
        insert_subject(&mut subjects, caps[2].trim().to_string(), tokens);
    }
    Some(subjects)
}

fn has_wide_row(table: ElementRef) -> bool {
    table.select(&SEL_TR).any(|tr| tr.select(&SEL_TD).count() >= 3)
}

fn is_row_number(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

fn insert_subject(subjects: &mut SubjectMap, subject: String, raw_tokens: Vec<String>) {
    if subject.is_empty() || raw_tokens.is_empty() {
        return;
    }
    let tokens: Vec<MarkToken> = raw_tokens
        .into_iter()
        .map(|text| {
            let date = parse_date_token(&text);
            MarkToken { text, date }
        })
        .collect();
    debug!("Found subject: {} with {} marks", subject, tokens.len());
    subjects.insert(subject.clone(), SubjectMarks { subject, tokens });
}

/// Splits a marks cell on commas that are not inside parentheses, so that
/// "7(дистанційно, усно), 9" stays two tokens.
pub fn split_marks(marks: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in marks.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                push_token(&mut tokens, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_token(&mut tokens, &current);
    tokens
}

fn push_token(tokens: &mut Vec<String>, raw: &str) {
    let token = raw.trim();
    if !token.is_empty() {
        tokens.push(token.to_string());
    }
}
