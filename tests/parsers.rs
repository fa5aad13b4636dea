// tests/parsers.rs
//
// End-to-end checks of the three page parsers through the public API.
//
use chrono::NaiveDate;
use nzgrades::utils::averages::summarize_statement;
use nzgrades::utils::dates::parse_date_token;
use nzgrades::utils::news::parse_news_page;
use nzgrades::{FeedItem, GradesStatementParser, NewsGradeExtractor, ReportCardParser, NO_GRADE};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn statement_from_plain_text_snapshot() {
    let html = "
    Виписка оцінок
    Оберіть діапазон дат: 2025-08-21 по 2025-12-31

    1\tАнглійська мова\t6, 7, 6, Н, 8
    2\tІнформатика\t9, 10, Н
    ";
    let result = GradesStatementParser::parse(html);

    assert_eq!(result.range_start, Some(day(2025, 8, 21)));
    assert_eq!(result.range_end, Some(day(2025, 12, 31)));
    let english = &result.subjects["Англійська мова"];
    assert_eq!(english.tokens.len(), 5);
    assert!(english.tokens[0].text.starts_with('6'));
    assert_eq!(result.subjects["Інформатика"].tokens.len(), 3);

    let summary = summarize_statement(&result, None);
    assert_eq!(summary.subjects[0].subject, "Інформатика");
    assert_eq!(summary.subjects[0].average, Some(9.5));
}

#[test]
fn statement_from_portal_table() {
    let html = r#"<!DOCTYPE html>
        <html><head><title>NZ.UA</title><script>window.x = "1\tФейк\t1, 2";</script></head>
        <body>
          <h1>Виписка оцінок</h1>
          <form id="classselectform">
            Оберіть діапазон дат:
            <input type="text" id="classselectform-date_from" name="ClassSelectForm[date_from]" value="2025-09-01">
            по
            <input type="text" id="classselectform-date_to" name="ClassSelectForm[date_to]" value="2025-12-31">
          </form>
          <table class="marks-report">
            <thead><tr><th>№</th><th>Предмет</th><th>Отримані результати</th></tr></thead>
            <tbody>
              <tr><td>1</td><td>Українська література</td><td>7(дистанційно, усно), 9</td></tr>
              <tr><td>2</td><td>Польська мова</td><td> </td></tr>
              <tr><td>3</td><td>Всесвітня історія</td><td>10, <span>Н</span>, 11 (05.11.2025)</td></tr>
            </tbody>
          </table>
        </body></html>"#;
    let result = GradesStatementParser::parse(html);

    assert_eq!(result.range_start, Some(day(2025, 9, 1)));
    assert_eq!(result.range_end, Some(day(2025, 12, 31)));
    assert_eq!(result.subjects.len(), 2);
    let literature: Vec<&str> =
        result.subjects["Українська література"].tokens.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(literature, vec!["7(дистанційно, усно)", "9"]);
    let history = &result.subjects["Всесвітня історія"].tokens;
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].date, Some(day(2025, 11, 5)));
    assert!(!result.subjects.contains_key("Фейк"));
}

#[test]
fn statement_parse_is_idempotent() {
    let html = "<table class=\"marks-report\"><tr><td>1</td><td>Алгебра</td><td>8, 9 (2025-10-01)</td></tr></table>";
    assert_eq!(GradesStatementParser::parse(html), GradesStatementParser::parse(html));
}

#[test]
fn report_card_page() {
    let html = r#"
        <div class="page"><h2>Табель успішності учня</h2>
        <table>
          <tr><th>Предмети</th><th>1 семестр</th><th>2 семестр</th><th>Річні</th></tr>
          <tr><td colspan="4">Інваріантна складова</td></tr>
          <tr><td>Алгебра</td><td>10</td><td></td><td></td></tr>
          <tr><td>Геометрія</td><td>-</td><td>11</td><td></td></tr>
          <tr><td>Варіативна складова</td><td></td></tr>
          <tr><td>Кількість пропущених навчальних днів</td><td>3</td></tr>
          <tr><td>Рішення педагогічної ради</td><td>переведено</td></tr>
        </table></div>"#;
    let entries = ReportCardParser::parse(html);
    let pairs: Vec<(&str, &str)> = entries.iter().map(|e| (e.subject.as_str(), e.term_grade.as_str())).collect();
    assert_eq!(pairs, vec![("Алгебра", "10"), ("Геометрія", NO_GRADE)]);
}

#[test]
fn news_items_collapse_by_identity() {
    let description = "Ви отримали оцінку 7 з предмету: Німецька мова, Семестрова";
    let items = vec![
        FeedItem { teacher: "Іванов Іван Іванович".into(), date: "19.12.2025 10:06".into(), description: description.into() },
        FeedItem { teacher: "Іванов Іван Іванович".into(), date: "20.12.2025 09:00".into(), description: description.into() },
        FeedItem { teacher: "Школа".into(), date: "20.12.2025".into(), description: "Зимові канікули з 29 грудня".into() },
    ];
    let events = NewsGradeExtractor::parse(&items);

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].grade, "7");
    assert_eq!(events[0].subject, "Німецька мова");
    assert!(events[0].grade_type.contains("Семестрова"));
    assert!(!events[0].is_changed);
    assert_eq!(events[0].timestamp, "20.12.2025 09:00");
}

#[test]
fn news_page_text_snapshot() {
    let html = "
    Мої новини
    Іванов Іван Іванович 19 грудня о 10:06 Ви отримали оцінку 7 з предмету: Німецька мова, Семестрова
    ";
    let events = parse_news_page(html);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].grade, "7");
    assert!(events[0].subject.contains("Німецька"));
}

#[test]
fn garbage_everywhere_is_empty() {
    for html in ["", "not html at all", "<div><span>12345</span></div>", "<table><tr><td>x</td></tr></table>"] {
        assert!(GradesStatementParser::parse(html).subjects.is_empty());
        assert!(ReportCardParser::parse(html).is_empty());
        assert!(parse_news_page(html).is_empty());
    }
    assert!(NewsGradeExtractor::parse(&[]).is_empty());
}

#[test]
fn dates_in_free_text() {
    assert_eq!(parse_date_token("контрольна 2025-03-07 усно"), Some(day(2025, 3, 7)));
    assert_eq!(parse_date_token("7.3.2025"), Some(day(2025, 3, 7)));
    assert_eq!(parse_date_token("07.03.2025"), Some(day(2025, 3, 7)));
    assert_eq!(parse_date_token("7 березня 2025"), Some(day(2025, 3, 7)));
}
