use anyhow::{Context, Result};
use log::{info, warn};
use teloxide::Bot;
use teloxide::prelude::{ChatId, Requester};

use crate::models::{GradeEvent, ReportCardEntry};
use crate::utils::averages::{report_card_average, Summary};
use crate::utils::config::TelegramConfig;
use crate::utils::dates::iso;
use crate::utils::news::GradeKind;

/// Grade events listed in one message at most.
const EVENTS_PER_MESSAGE: usize = 10;
const SUBJECT_WIDTH: usize = 30;

/// "Іванов Іван Іванович" -> "Іванов І.І."
pub fn short_name(full_name: &str) -> String {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    let initial = |s: &str| s.chars().next().map(String::from).unwrap_or_default();
    match parts.as_slice() {
        [] => "—".to_string(),
        [surname, name] => format!("{} {}.", surname, initial(name)),
        [surname, name, patronymic, ..] => format!("{} {}.{}.", surname, initial(name), initial(patronymic)),
        _ => full_name.trim().to_string(),
    }
}

fn event_line(event: &GradeEvent) -> String {
    let kind = GradeKind::classify(&event.grade_type);
    let action = if event.is_changed { "змінила оцінку на" } else { "поставила" };
    format!(
        "• {} - {}, {} \"{}\" з \"{}\", {}",
        short_name(&event.teacher),
        event.timestamp,
        action,
        event.grade,
        event.subject,
        kind
    )
}

/// Notification for grades that were not reported before.
pub fn new_grades_message(events: &[GradeEvent]) -> String {
    let mut message = String::from("📬 Нові оцінки:\n\n");
    let lines: Vec<String> = events.iter().take(EVENTS_PER_MESSAGE).map(event_line).collect();
    message += &lines.join("\n");
    if events.len() > EVENTS_PER_MESSAGE {
        message += &format!("\n\n...та ще {} оцінок", events.len() - EVENTS_PER_MESSAGE);
    }
    message
}

pub fn averages_message(summary: &Summary, requested_range: bool) -> String {
    let bound = |d: Option<chrono::NaiveDate>| d.map(iso).unwrap_or_else(|| "…".to_string());
    let mut message = format!(
        "📅 Діапазон дат: {} — {}\n\n📊 Середній бал по предметам:\n\n",
        bound(summary.range.start),
        bound(summary.range.end)
    );

    let lines: Vec<String> = summary
        .subjects
        .iter()
        .map(|s| match s.average {
            Some(avg) => format!("{}: {:.2} ({} оцінок)", s.subject, avg, s.count),
            None if s.non_numeric.is_empty() => format!("{}: — (нема оцінок)", s.subject),
            None => format!("{}: — (ненумерічні оцінки: {})", s.subject, s.non_numeric.join(", ")),
        })
        .collect();
    message += &lines.join("\n");

    match summary.overall {
        Some(overall) => message += &format!("\n\n📈 Загальний середній: {:.2}", overall),
        None => message += "\n\n📈 Загальний середній: —",
    }

    if requested_range && !summary.token_dates_present {
        message += "\n\nПримітка: у виписці немає дат окремих оцінок, тому показані всі оцінки за видимий період.";
    }
    message
}

pub fn report_card_message(entries: &[ReportCardEntry]) -> String {
    if entries.is_empty() {
        return "📋 Табель порожній або не знайдено предметів.".to_string();
    }

    let mut lines = vec!["📋 Табель успішності\n".to_string()];
    for entry in entries {
        let subject = if entry.subject.chars().count() > SUBJECT_WIDTH {
            format!("{}...", entry.subject.chars().take(SUBJECT_WIDTH - 3).collect::<String>())
        } else {
            entry.subject.clone()
        };
        lines.push(format!("{}: {}", subject, entry.term_grade));
    }
    if let Some(avg) = report_card_average(entries) {
        lines.push(format!("\n📊 Середній бал: {:.2}", avg));
    }
    lines.join("\n")
}

// Sends the message to the configured chat.
pub async fn send(config: &TelegramConfig, message: &str) -> Result<()> {
    let bot = Bot::new(&config.bot_token);

    match bot.send_message(ChatId(config.chat_id), message).await {
        Ok(message) => {
            info!("Text message sent successfully {:?}", message.id);
            Ok(())
        }
        Err(e) => {
            warn!("Text message wasn't sent because of: {}", e);
            Err(e).context("Failed to send the Telegram message")
        }
    }
}
