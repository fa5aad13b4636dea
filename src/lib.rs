//! Grade extraction for the NZ.UA school portal.
//!
//! The parsers in [`utils`] turn fetched pages into plain records; fetching,
//! persistence and delivery live next to them and are only used by the binary.

pub mod models;
pub mod utils;

pub use models::{
    FeedItem, GradeEvent, GradeStatementResult, MarkToken, ReportCardEntry, SubjectMarks, NO_GRADE,
};
pub use utils::grades_statement::GradesStatementParser;
pub use utils::news::{GradeKind, NewsGradeExtractor};
pub use utils::report_card::ReportCardParser;
