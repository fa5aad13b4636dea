use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use reqwest::header::REFERER;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::utils::averages::DateRange;
use crate::utils::config::PortalConfig;
use crate::utils::dates::iso;
use crate::utils::html::selector;

const USER_AGENT: &str = "nz-bot/1.0 (+https://nz.ua)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const FETCH_ATTEMPTS: usize = 4;
const RETRY_DELAY: Duration = Duration::from_secs(1);

const LOGIN_PATH: &str = "/login";
const GRADES_STATEMENT_PATH: &str = "/schedule/grades-statement";
const REPORT_CARD_PATH: &str = "/schedule/report-card";
const NEWS_PATHS: [&str; 4] = ["/dashboard/news", "/dashboard", "/news", "/site/news"];

static SEL_CSRF_META: LazyLock<Selector> = LazyLock::new(|| selector(r#"meta[name="csrf-token"]"#));
static SEL_CSRF_INPUT: LazyLock<Selector> = LazyLock::new(|| selector(r#"input[name="_csrf"]"#));

/// The portal pages the parsers know how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalPage {
    GradesStatement,
    ReportCard,
    News,
}

impl PortalPage {
    /// Text that only shows up on the page when we are logged in and got the right one.
    fn markers(self) -> &'static [&'static str] {
        match self {
            PortalPage::GradesStatement => &["Виписка оцінок", "Отримані результати"],
            PortalPage::ReportCard => &["Табель"],
            PortalPage::News => &["Мої новини", "school-news-list"],
        }
    }

    pub fn is_valid(self, html: &str) -> bool {
        self.markers().iter().any(|m| html.contains(m))
    }
}

/// Logged-in session against the NZ.UA web portal.
pub struct NzClient {
    client: Client,
    config: PortalConfig,
}

impl NzClient {
    pub fn new(config: PortalConfig) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build the client")?;
        Ok(NzClient { client, config })
    }

    /// Form login. The CSRF token of the login page is sent back when present.
    pub async fn login(&self) -> Result<()> {
        let login_url = self.url(LOGIN_PATH)?;
        let login_page = self
            .client
            .get(login_url.clone())
            .send()
            .await
            .context("Failed to load the login page")?
            .text()
            .await
            .context("Failed to read the login page")?;

        let mut form = vec![
            ("LoginForm[login]", self.config.username.clone()),
            ("LoginForm[password]", self.config.password.clone()),
            ("LoginForm[rememberMe]", "1".to_string()),
        ];
        let mut request = self.client.post(login_url.clone()).header(REFERER, login_url.as_str());
        if let Some(token) = csrf_token(&login_page) {
            request = request.header("X-CSRF-Token", token.as_str());
            form.push(("_csrf", token));
        }

        let response = request.form(&form).send().await.context("Failed to send login request")?;
        if !response.status().is_success() {
            return Err(anyhow!("Authentication failed ({}), check your credentials and try again.", response.status()));
        }
        info!("Logged in to {}", self.config.base_url);
        Ok(())
    }

    /// The grade statement page, restricted to `range` when bounds are given.
    pub async fn grades_statement(&self, range: DateRange) -> Result<String> {
        let mut url = self.url(GRADES_STATEMENT_PATH)?;
        let mut query = Vec::new();
        if let Some(student_id) = &self.config.student_id {
            query.push(("student_id", student_id.clone()));
        }
        if let Some(start) = range.start {
            query.push(("date_from", iso(start)));
        }
        if let Some(end) = range.end {
            query.push(("date_to", iso(end)));
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        self.fetch(PortalPage::GradesStatement, &[url]).await
    }

    pub async fn report_card(&self) -> Result<String> {
        let url = self.url(REPORT_CARD_PATH)?;
        self.fetch(PortalPage::ReportCard, &[url]).await
    }

    pub async fn news(&self) -> Result<String> {
        let urls = NEWS_PATHS.iter().map(|p| self.url(p)).collect::<Result<Vec<_>>>()?;
        self.fetch(PortalPage::News, &urls).await
    }

    /// Tries every url in turn, logging in again between rounds, until one
    /// returns the expected page.
    async fn fetch(&self, page: PortalPage, urls: &[Url]) -> Result<String> {
        let mut last_error = None;
        for attempt in 1..=FETCH_ATTEMPTS {
            for url in urls {
                match self.get(url).await {
                    Ok(html) if page.is_valid(&html) => {
                        debug!("Fetched {:?} from {} (attempt {})", page, url, attempt);
                        return Ok(html);
                    }
                    Ok(_) => debug!("{} did not return the {:?} page", url, page),
                    Err(e) => {
                        warn!("Error fetching {}: {:#}", url, e);
                        last_error = Some(e);
                    }
                }
            }

            if attempt < FETCH_ATTEMPTS {
                if let Err(e) = self.login().await {
                    warn!("Login attempt {} failed: {:#}", attempt, e);
                    last_error = Some(e);
                }
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }

        let message = format!("Could not load the {:?} page after {} attempts", page, FETCH_ATTEMPTS);
        Err(match last_error {
            Some(cause) => cause.context(message),
            None => anyhow!(message),
        })
    }

    async fn get(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .header(REFERER, url.as_str())
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        if !response.status().is_success() {
            return Err(anyhow!("{} returned {}", url, response.status()));
        }
        response.text().await.context("Failed to read response text")
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.config
            .base_url
            .join(path)
            .with_context(|| format!("Invalid portal path: {}", path))
    }
}

/// CSRF token of a login form: the hidden `_csrf` input wins over the meta tag.
pub fn csrf_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let from_input = document
        .select(&SEL_CSRF_INPUT)
        .find_map(|e| e.value().attr("value"))
        .filter(|v| !v.is_empty());
    let from_meta = || document.select(&SEL_CSRF_META).find_map(|e| e.value().attr("content"));
    from_input.or_else(from_meta).map(str::to_string)
}
