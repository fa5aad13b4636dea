use std::sync::LazyLock;

use log::{debug, info, warn};
use scraper::{ElementRef, Html, Selector};

use crate::models::{ReportCardEntry, NO_GRADE};
use crate::utils::html::{element_text, selector};

/// Row labels that are section headers or footer lines, matched as lowercase substrings.
const SKIPPED_ROWS: [&str; 10] = [
    "iнваріантна складова",
    "інваріантна складова",
    "варіативна складова",
    "кількість пропущених навчальних днів",
    "з них через хворобу",
    "підпис класного керівника",
    "підпис батьків",
    "рішення педагогічної ради",
    "предмети",
    "бали",
];

/// Column headers that show up as the first cell of a row.
const COLUMN_HEADERS: [&str; 4] = ["1 семестр", "2 семестр", "річні", "підсумкові"];

const HEADINGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

static SEL_TR: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static SEL_CELL: LazyLock<Selector> = LazyLock::new(|| selector("th, td"));

/// Reads the "Табель" (term report card) page into one entry per subject.
///
/// Only the first two cells of a row are looked at: the subject and the
/// first term grade.
pub struct ReportCardParser;

impl ReportCardParser {
    pub fn parse(html: &str) -> Vec<ReportCardEntry> {
        let document = Html::parse_document(html);
        let Some(table) = report_table(&document) else {
            warn!("No report card table found");
            return Vec::new();
        };

        let entries: Vec<ReportCardEntry> = table.select(&SEL_TR).filter_map(parse_row).collect();
        info!("Report card parsed: {} subjects", entries.len());
        entries
    }
}

/// The first table after the heading that mentions "Табель", in document order.
fn report_table(document: &Html) -> Option<ElementRef<'_>> {
    let mut heading_seen = false;
    for node in document.root_element().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let name = element.value().name();
        if !heading_seen {
            heading_seen = HEADINGS.contains(&name) && element.text().collect::<String>().contains("Табель");
        } else if name == "table" {
            return Some(element);
        }
    }
    if heading_seen {
        debug!("Report card heading found but no table follows it");
    }
    None
}

fn parse_row(row: ElementRef) -> Option<ReportCardEntry> {
    let mut cells = row.select(&SEL_CELL);
    let (first, second) = (cells.next()?, cells.next()?);

    let subject = element_text(first, "");
    if subject.is_empty() || is_skipped(&subject) {
        return None;
    }

    let grade = element_text(second, "");
    let term_grade = if !grade.is_empty() && grade.chars().all(|c| c.is_ascii_digit()) {
        grade
    } else {
        NO_GRADE.to_string()
    };

    Some(ReportCardEntry { subject, term_grade })
}

fn is_skipped(subject: &str) -> bool {
    let lower = subject.to_lowercase();
    SKIPPED_ROWS.iter().any(|s| lower.contains(s)) || COLUMN_HEADERS.contains(&lower.as_str())
}
