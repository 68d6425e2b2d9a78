//! LinkedIn public job search, read through the guest listing endpoints.

use super::JobBoard;
use crate::core::JobPosting;
use crate::errors::ProviderError;
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::ops::Range;
use std::time::Duration;
use tracing::{debug, info, warn};

const SEARCH_URL: &str = "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const PAGE_SIZE: usize = 25;

const TITLE_SELECTORS: [&str; 2] = ["h3.base-search-card__title", "h3"];
const COMPANY_SELECTORS: [&str; 2] = ["h4.base-search-card__subtitle a", "h4.base-search-card__subtitle"];
const LINK_SELECTORS: [&str; 2] = ["a.base-card__full-link", "a[href*='/jobs/view']"];
const DESCRIPTION_SELECTORS: [&str; 3] = [
    "div.show-more-less-html__markup",
    "div.description__text",
    "div.jobs-description-content__text",
];

/// Job board backed by LinkedIn's unauthenticated job listing pages.
///
/// Cards come from the paginated search fragment; each posting's description
/// is fetched from its detail page with a randomized pause between fetches.
#[derive(Debug, Clone)]
pub struct LinkedInGuestBoard {
    client: Client,
    delay_ms: Range<u64>,
}

impl LinkedInGuestBoard {
    /// Creates a board client with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            delay_ms: 2000..3000,
        })
    }

    /// Sets the pause between detail page fetches, in milliseconds.
    #[must_use]
    pub fn with_delay_ms(mut self, delay_ms: Range<u64>) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    async fn fetch(&self, url: &str, query: &[(&str, String)]) -> Result<String, ProviderError> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: format!("GET {url} failed"),
            });
        }
        Ok(response.text().await?)
    }

    async fn pause(&self) {
        if self.delay_ms.is_empty() {
            return;
        }
        let millis = rand::thread_rng().gen_range(self.delay_ms.clone());
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

#[async_trait]
impl JobBoard for LinkedInGuestBoard {
    async fn search(
        &self,
        keyword: &str,
        location: &str,
        limit: usize,
    ) -> Result<Vec<JobPosting>, ProviderError> {
        info!(keyword, location, limit, "Searching LinkedIn");

        let mut cards = Vec::new();
        let mut start = 0;
        while cards.len() < limit {
            let html = self
                .fetch(
                    SEARCH_URL,
                    &[
                        ("keywords", keyword.to_string()),
                        ("location", location.to_string()),
                        ("start", start.to_string()),
                    ],
                )
                .await?;
            let page = parse_job_cards(&html);
            if page.is_empty() {
                break;
            }
            start += PAGE_SIZE;
            for card in page {
                if !cards.iter().any(|c: &JobPosting| c.link == card.link) {
                    cards.push(card);
                }
            }
        }
        cards.truncate(limit);
        debug!(count = cards.len(), "Collected job cards");

        for card in &mut cards {
            self.pause().await;
            match self.fetch(&card.link, &[]).await {
                Ok(html) => card.description = parse_description(&html).unwrap_or_default(),
                Err(e) => warn!(link = %card.link, error = %e, "Failed to fetch job description"),
            }
        }

        info!(count = cards.len(), "Extracted jobs");
        Ok(cards)
    }
}

/// Parses the cards of a guest search fragment. Descriptions are left empty.
#[must_use]
pub(crate) fn parse_job_cards(html: &str) -> Vec<JobPosting> {
    let document = Html::parse_fragment(html);
    let Ok(card_selector) = Selector::parse("li") else {
        return Vec::new();
    };

    document
        .select(&card_selector)
        .filter_map(|card| {
            let link = first_attr(card, &LINK_SELECTORS, "href").map(|href| canonical_link(&href))?;
            let title = first_text(card, &TITLE_SELECTORS)?;
            let company = first_text(card, &COMPANY_SELECTORS).unwrap_or_default();
            Some(JobPosting::new(title, company, link, String::new()))
        })
        .collect()
}

/// Extracts the description text of a posting page.
#[must_use]
pub(crate) fn parse_description(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    DESCRIPTION_SELECTORS.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        let element = document.select(&selector).next()?;
        let text = clean_text(&element.text().collect::<Vec<_>>().join(" "));
        (!text.is_empty()).then_some(text)
    })
}

fn first_text(card: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        let element = card.select(&selector).next()?;
        let text = clean_text(&element.text().collect::<String>());
        (!text.is_empty()).then_some(text)
    })
}

fn first_attr(card: ElementRef<'_>, selectors: &[&str], attr: &str) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        card.select(&selector)
            .next()?
            .value()
            .attr(attr)
            .map(str::to_string)
    })
}

/// Drops tracking query parameters so one posting has one link.
fn canonical_link(href: &str) -> String {
    href.split('?').next().unwrap_or(href).trim().to_string()
}

fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FRAGMENT: &str = r##"
<li>
  <div class="base-card">
    <a class="base-card__full-link" href="https://ae.linkedin.com/jobs/view/data-analyst-1?refId=abc&trk=x"></a>
    <h3 class="base-search-card__title">
        Data Analyst
    </h3>
    <h4 class="base-search-card__subtitle"><a href="#">Acme   Corp</a></h4>
  </div>
</li>
<li>
  <div class="base-card">
    <a class="base-card__full-link" href="https://ae.linkedin.com/jobs/view/bi-developer-2"></a>
    <h3 class="base-search-card__title">BI Developer</h3>
  </div>
</li>
<li><div class="base-card"><h3>No link here</h3></div></li>
"##;

    #[test]
    fn test_parse_job_cards() {
        let jobs = parse_job_cards(FRAGMENT);
        assert_eq!(
            jobs,
            vec![
                JobPosting::new(
                    "Data Analyst",
                    "Acme Corp",
                    "https://ae.linkedin.com/jobs/view/data-analyst-1",
                    ""
                ),
                JobPosting::new(
                    "BI Developer",
                    "",
                    "https://ae.linkedin.com/jobs/view/bi-developer-2",
                    ""
                ),
            ]
        );
    }

    #[test]
    fn test_parse_description() {
        let html = r#"<html><body>
            <div class="show-more-less-html__markup">
              <p>We need SQL.</p>
              <ul><li>Dashboards</li></ul>
            </div></body></html>"#;
        assert_eq!(
            parse_description(html).as_deref(),
            Some("We need SQL. Dashboards")
        );
        assert_eq!(parse_description("<html><body></body></html>"), None);
    }

    #[test]
    fn test_canonical_link() {
        assert_eq!(canonical_link("https://x/jobs/view/1?trk=a"), "https://x/jobs/view/1");
        assert_eq!(canonical_link("https://x/jobs/view/1"), "https://x/jobs/view/1");
    }
}
