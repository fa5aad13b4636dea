use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info, warn};
use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};

use nzgrades::utils::averages::{summarize_events, summarize_statement, DateRange};
use nzgrades::utils::config::Config;
use nzgrades::utils::news::parse_news_page;
use nzgrades::utils::nz::NzClient;
use nzgrades::utils::store::SeenStore;
use nzgrades::utils::telegram::{averages_message, new_grades_message, report_card_message, send};
use nzgrades::{GradesStatementParser, ReportCardParser};

#[derive(Parser)]
#[command(name = "nzgrades", version, about = "Grades, averages and report card from the NZ.UA portal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Report grades from the news feed that were not reported before (default)
    News,
    /// Average marks per subject, optionally for a YYYY-MM-DD date range
    Avg { start: Option<NaiveDate>, end: Option<NaiveDate> },
    /// Term report card
    Report,
}

// Entry point for the async main function, powered by tokio runtime.
#[tokio::main]
async fn main() {
    // Loads environment variables from a `.env` file, if present.
    dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env();

    let level = config.as_ref().map(|c| c.log_level).unwrap_or(LevelFilter::Info);
    if let Err(e) = TermLogger::init(level, LogConfig::default(), TerminalMode::Mixed, ColorChoice::Auto) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return;
        }
    };

    let outcome = match cli.command.unwrap_or(Command::News) {
        Command::News => news(&config).await,
        Command::Avg { start, end } => averages(&config, start, end).await,
        Command::Report => report(&config).await,
    };
    if let Err(e) = outcome {
        error!("{:#}", e);
    }
}

// Reports the feed grades that the seen store does not know yet.
async fn news(config: &Config) -> Result<()> {
    let client = NzClient::new(config.portal.clone())?;
    let html = client.news().await?;
    info!("News retrieved successfully");

    let events = parse_news_page(&html);
    let new_events = SeenStore::new(&config.seen_store).diff_events(&events)?;

    // If there are no new grades, exits the function early.
    if new_events.is_empty() {
        info!("No new grades found");
        return Ok(());
    }
    deliver(config, &new_grades_message(&new_events)).await
}

// Averages over the grade statement, or the news feed when the statement is empty.
async fn averages(config: &Config, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    // Without bounds the current school year up to today is requested.
    let range = DateRange::or_school_year(start, end, Local::now().date_naive());
    if let (Some(start), Some(end)) = (range.start, range.end) {
        if end < start {
            return Err(anyhow!("End date {} is before start date {}", end, start));
        }
    }
    let user_range = start.is_some() || end.is_some();

    let client = NzClient::new(config.portal.clone())?;
    let statement = match client.grades_statement(range).await {
        Ok(html) => GradesStatementParser::parse(&html),
        Err(e) => {
            warn!("Grade statement unavailable: {:#}", e);
            Default::default()
        }
    };

    let summary = if !statement.is_empty() {
        summarize_statement(&statement, Some(range))
    } else {
        warn!("Grade statement has no subjects, falling back to the news feed");
        let events = parse_news_page(&client.news().await?);
        let mut summary = summarize_events(&events);
        summary.range = range;
        summary
    };

    if summary.is_empty() {
        return deliver(config, "❌ Не знайдено оцінок за вказаний період").await;
    }
    deliver(config, &averages_message(&summary, user_range)).await
}

async fn report(config: &Config) -> Result<()> {
    let client = NzClient::new(config.portal.clone())?;
    let entries = ReportCardParser::parse(&client.report_card().await?);
    deliver(config, &report_card_message(&entries)).await
}

// Sends the message via Telegram when a bot is configured, prints it otherwise.
async fn deliver(config: &Config, message: &str) -> Result<()> {
    match &config.telegram {
        Some(telegram) => send(telegram, message).await,
        None => {
            println!("{}", message);
            Ok(())
        }
    }
}
