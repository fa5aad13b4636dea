use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use log::{debug, info};
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::models::{FeedItem, GradeEvent};
use crate::utils::dates::month_number;
use crate::utils::html::{element_text, selector, visible_text};

const FEED_START: &str = "Мої новини";
const FEED_END: &str = "Показано новин";

static RE_NEW_GRADE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Ви отримали оцінку\s+([\w/]+)\s+з предмету:\s+([^,]+),\s+(.+)")
        .expect("invalid regex: new grade")
});

static RE_CHANGED_GRADE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Оцінка змінена на\s+([\w/]+)\s+з предмету:\s+([^,]+),\s+(.+)")
        .expect("invalid regex: changed grade")
});

// "Іванов Іван Іванович [Петренко Марія Іванівна] 19 грудня о 10:06 Ви отримали оцінку ..."
// The teacher's name opens a line.
static RE_TEXT_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    let name = r"[А-ЯІЇЄҐ][а-яіїєґʼ'\-]+";
    Regex::new(&format!(
        r"(?m)^[ \t]*({name}[ \t]+{name}[ \t]+{name})(?:\s+{name}){{0,3}}\s+([0-9]{{1,2}}\s+[а-яіїєґ]+\s+о\s+[0-9]{{1,2}}:[0-9]{{2}})\s+((?:Ви отримали оцінку|Оцінка змінена на)\s+[\w/]+\s+з предмету:\s+[^,\n]+,\s*[^\n]+)"
    ))
    .expect("invalid regex: text news item")
});

// "19 грудня о 10:06"
static RE_FEED_DAY_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{1,2})\s+(\S+)\s+о\s+([0-9]{1,2}):([0-9]{2})$").expect("invalid regex: feed day time")
});

static SEL_FEED: LazyLock<Selector> = LazyLock::new(|| selector("div#school-news-list"));
static SEL_FEED_ITEM: LazyLock<Selector> = LazyLock::new(|| selector("div.news-page__item"));
static SEL_ITEM_NAME: LazyLock<Selector> =
    LazyLock::new(|| selector(".news-page__header .news-page__name"));
static SEL_ITEM_DATE: LazyLock<Selector> =
    LazyLock::new(|| selector(".news-page__header .news-page__date"));
static SEL_ITEM_DESC: LazyLock<Selector> = LazyLock::new(|| selector(".news-page__desc"));

/// What a grade was given for, as far as the free-text type on the feed tells.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum GradeKind {
    Current,
    Thematic,
    Term,
    Notebook,
    Test,
    Practical,
    Other(String),
}

impl GradeKind {
    /// Substring match on the lowercased type, first hit wins.
    pub fn classify(grade_type: &str) -> Self {
        let lower = grade_type.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
        if has(&["поточна"]) {
            GradeKind::Current
        } else if has(&["тематична"]) {
            GradeKind::Thematic
        } else if has(&["семестрова"]) {
            GradeKind::Term
        } else if has(&["зошит", "зош"]) {
            GradeKind::Notebook
        } else if has(&["контрольна", "к/р"]) {
            GradeKind::Test
        } else if has(&["практичне", "пр/р"]) {
            GradeKind::Practical
        } else {
            GradeKind::Other(lower)
        }
    }

    pub fn label(&self) -> String {
        match self {
            GradeKind::Current => "Поточна оцінка".to_string(),
            GradeKind::Thematic => "за тематичну".to_string(),
            GradeKind::Term => "семестрова".to_string(),
            GradeKind::Notebook => "за зошит".to_string(),
            GradeKind::Test => "за контрольну роботу".to_string(),
            GradeKind::Practical => "за практичне заняття".to_string(),
            GradeKind::Other(text) => format!("за {}", text),
        }
    }
}

impl fmt::Display for GradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Turns news feed items into grade events.
///
/// Items that announce anything other than a new or changed grade are
/// ignored. Repeated renders of the same grade (same identity key) collapse
/// into the one with the latest timestamp; the output keeps the order in
/// which each key first appeared.
pub struct NewsGradeExtractor;

impl NewsGradeExtractor {
    pub fn parse(items: &[FeedItem]) -> Vec<GradeEvent> {
        let mut events: Vec<GradeEvent> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for item in items {
            let Some(event) = grade_event(item) else {
                debug!("Feed item is not a grade event: {}", item.description);
                continue;
            };
            match positions.get(&event.identity_key) {
                Some(&idx) => {
                    if is_later(&event.timestamp, &events[idx].timestamp) {
                        events[idx] = event;
                    }
                }
                None => {
                    positions.insert(event.identity_key.clone(), events.len());
                    events.push(event);
                }
            }
        }
        events
    }
}

fn grade_event(item: &FeedItem) -> Option<GradeEvent> {
    let (caps, is_changed) = match RE_NEW_GRADE.captures(&item.description) {
        Some(caps) => (caps, false),
        None => (RE_CHANGED_GRADE.captures(&item.description)?, true),
    };
    let group = |i: usize| caps[i].trim().to_string();

    Some(GradeEvent::new(
        item.teacher.trim().to_string(),
        group(2),
        group(1),
        group(3),
        item.date.trim().to_string(),
        is_changed,
    ))
}

fn is_later(candidate: &str, current: &str) -> bool {
    match (feed_timestamp(candidate), feed_timestamp(current)) {
        (Some(a), Some(b)) => a > b,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => candidate > current,
    }
}

/// Parses the timestamps the feed shows: `DD.MM.YYYY HH:MM`, `DD.MM.YYYY`,
/// `DD.MM.YYYY HH:MM:SS`, and the short "19 грудня о 10:06" form (current year).
pub fn feed_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%d.%m.%Y %H:%M") {
        return Some(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%d.%m.%Y") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%d.%m.%Y %H:%M:%S") {
        return Some(dt);
    }

    let caps = RE_FEED_DAY_TIME.captures(text)?;
    let date = NaiveDate::from_ymd_opt(Local::now().year(), month_number(&caps[2])?, caps[1].parse().ok()?)?;
    date.and_hms_opt(caps[3].parse().ok()?, caps[4].parse().ok()?, 0)
}

/// Isolates the feed entries of the news page. `None` when the page has no
/// news container at all, which usually means the layout changed.
pub fn extract_feed_items(html: &str) -> Option<Vec<FeedItem>> {
    let document = Html::parse_document(html);
    let root = document.select(&SEL_FEED).next()?;

    let items = root
        .select(&SEL_FEED_ITEM)
        .filter_map(|item| {
            let description = element_text(item.select(&SEL_ITEM_DESC).next()?, " ");
            let teacher = item.select(&SEL_ITEM_NAME).next().map(|e| element_text(e, " ")).unwrap_or_default();
            let date = item.select(&SEL_ITEM_DATE).next().map(|e| element_text(e, " ")).unwrap_or_default();
            Some(FeedItem { teacher, date, description })
        })
        .collect();
    Some(items)
}

/// Fallback for pages without the news container: pattern matching over the
/// visible text between "Мої новини" and "Показано новин".
pub fn parse_feed_text(html: &str) -> Vec<FeedItem> {
    let text = visible_text(&Html::parse_document(html));
    let Some(start) = text.find(FEED_START) else {
        return Vec::new();
    };
    let section = &text[start..];
    let section = match section.find(FEED_END) {
        Some(end) => &section[..end],
        None => section,
    };

    RE_TEXT_ITEM
        .captures_iter(section)
        .map(|caps| FeedItem {
            teacher: caps[1].trim().to_string(),
            date: caps[2].trim().to_string(),
            description: caps[3].trim().to_string(),
        })
        .collect()
}

/// Grade events of a news page, using the feed container when present and
/// the text fallback otherwise.
pub fn parse_news_page(html: &str) -> Vec<GradeEvent> {
    let items = match extract_feed_items(html) {
        Some(items) => items,
        None => {
            debug!("News container not found, falling back to text matching");
            parse_feed_text(html)
        }
    };
    let events = NewsGradeExtractor::parse(&items);
    info!("News feed: {} items, {} grade events", items.len(), events.len());
    events
}
