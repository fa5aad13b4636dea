pub mod averages;
pub mod config;
pub mod dates;
pub mod grades_statement;
pub mod html;
pub mod news;
pub mod nz;
pub mod report_card;
pub mod store;
pub mod telegram;
