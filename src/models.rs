use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sentinel stored in a report card entry when the term grade cell is blank or not numeric.
pub const NO_GRADE: &str = "немає";

/// One raw grade entry exactly as the portal rendered it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MarkToken {
    pub text: String,
    pub date: Option<NaiveDate>,
}

/// Marks of one subject, in page order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SubjectMarks {
    pub subject: String,
    pub tokens: Vec<MarkToken>,
}

impl SubjectMarks {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// A full parse of the "Виписка оцінок" page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct GradeStatementResult {
    pub range_start: Option<NaiveDate>,
    pub range_end: Option<NaiveDate>,
    pub subjects: BTreeMap<String, SubjectMarks>,
}

impl GradeStatementResult {
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// True when at least one token carried a recoverable date.
    pub fn has_token_dates(&self) -> bool {
        self.subjects
            .values()
            .flat_map(|s| s.tokens.iter())
            .any(|t| t.date.is_some())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ReportCardEntry {
    pub subject: String,
    pub term_grade: String,
}

impl ReportCardEntry {
    pub fn has_grade(&self) -> bool {
        self.term_grade != NO_GRADE
    }
}

/// One entry of the news feed, already isolated from the page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct FeedItem {
    pub teacher: String,
    pub date: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GradeEvent {
    pub teacher: String,
    pub subject: String,
    pub grade: String,
    pub grade_type: String,
    pub timestamp: String,
    pub is_changed: bool,
    pub identity_key: String,
}

impl GradeEvent {
    pub fn new(
        teacher: String,
        subject: String,
        grade: String,
        grade_type: String,
        timestamp: String,
        is_changed: bool,
    ) -> Self {
        let identity_key = identity_key(&teacher, &grade, &subject, &grade_type);
        GradeEvent {
            teacher,
            subject,
            grade,
            grade_type,
            timestamp,
            is_changed,
            identity_key,
        }
    }
}

/// Separates the fields of an identity key; never occurs in feed text.
const KEY_SEPARATOR: &str = "\u{1f}";

/// Dedup key of a grade event. The timestamp is left out so that the feed
/// re-rendering the same grade later maps to the same key.
pub fn identity_key(teacher: &str, grade: &str, subject: &str, grade_type: &str) -> String {
    [teacher, grade, subject, grade_type].join(KEY_SEPARATOR)
}
