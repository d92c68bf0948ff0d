//! Live marketplace scraping
//!
//! Each marketplace is driven through a stateful `ScrapeSession` (cookies,
//! rate budget, navigation state) that must be driven single-threaded. The
//! session is acquired once per sync run and closed on every exit path.
//!
//! The scrape protocol has two phases: locate the listing through the
//! marketplace's search entry point (polling until the results list yields a
//! product link or the bounded timeout expires -- absence of a match is an
//! expected outcome, not a fault), then extract fields from the product
//! page. Every field extraction is isolated: one changed selector must not
//! abort the remaining fields.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use anyhow::Result;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::product::{AvailabilityStatus, Brand, ScrapeResult, SpecValue, TechnicalSpecMap};
use crate::domain::services::{LiveMarketSource, MarketSession};
use crate::infrastructure::config::{HttpClientConfig, ScrapingConfig};
use crate::infrastructure::selectors::{MarketplaceProfile, SiteSelectors};
use crate::infrastructure::sync_error::{SyncError, SyncResult};

/// Timing knobs for the locate/extract protocol.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeTimings {
    /// How long to keep polling the results list before reporting not-found.
    pub locate_timeout: Duration,
    /// Delay between locate polls.
    pub locate_poll: Duration,
    /// Fixed delay before reading the product page; page readiness cannot be
    /// reliably signaled.
    pub settle_delay: Duration,
}

impl ScrapeTimings {
    pub fn from_config(config: &ScrapingConfig) -> Self {
        Self {
            locate_timeout: Duration::from_secs(config.locate_timeout_seconds),
            locate_poll: Duration::from_millis(config.locate_poll_ms),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        }
    }
}

/// Marketplace scraping strategy for one brand. Stateless itself; all
/// navigation state lives in the session it opens.
pub struct LiveScraper {
    brand: Brand,
    profile: Arc<MarketplaceProfile>,
    http: HttpClientConfig,
    timings: ScrapeTimings,
}

impl LiveScraper {
    pub fn new(
        brand: Brand,
        profile: MarketplaceProfile,
        http: &HttpClientConfig,
        scraping: &ScrapingConfig,
    ) -> Self {
        Self {
            brand,
            profile: Arc::new(profile),
            http: http.clone(),
            timings: ScrapeTimings::from_config(scraping),
        }
    }
}

#[async_trait]
impl LiveMarketSource for LiveScraper {
    fn brand(&self) -> Brand {
        self.brand
    }

    async fn open_session(&self) -> Result<Box<dyn MarketSession>> {
        let session = ScrapeSession::open(self.profile.clone(), &self.http, self.timings)?;
        Ok(Box::new(session))
    }
}

/// One open marketplace session: a cookie-carrying HTTP client plus a rate
/// budget, owned by exactly one sync run.
pub struct ScrapeSession {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    profile: Arc<MarketplaceProfile>,
    timings: ScrapeTimings,
    open: bool,
}

impl ScrapeSession {
    pub fn open(
        profile: Arc<MarketplaceProfile>,
        http: &HttpClientConfig,
        timings: ScrapeTimings,
    ) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_seconds))
            .user_agent(http.user_agent.clone())
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| SyncError::session_failure(format!("failed to build client: {e}")))?;

        let quota = Quota::per_second(
            NonZeroU32::new(http.max_requests_per_second.max(1))
                .ok_or_else(|| SyncError::session_failure("rate limit must be greater than 0"))?,
        );

        info!(marketplace = %profile.name, "scrape session opened");
        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            profile,
            timings,
            open: true,
        })
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    async fn get_text(&self, url: &str) -> SyncResult<String> {
        self.rate_limiter.until_ready().await;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::fetch_failure(
                url,
                Some(status.as_u16()),
                "non-success response from marketplace",
            ));
        }

        Ok(response.text().await?)
    }

    /// Phase one: poll the search results until a product link appears or
    /// the locate timeout expires.
    async fn locate_listing(&self, query: &str) -> SyncResult<Option<String>> {
        let search_url = self.profile.search_url(query);
        let deadline = Instant::now() + self.timings.locate_timeout;
        debug!(%search_url, "searching marketplace");

        loop {
            let body = self.get_text(&search_url).await?;
            if let Some(href) = first_result_href(&body, &self.profile.selectors.results_link) {
                return Ok(Some(self.profile.resolve_url(&href)));
            }

            if Instant::now() + self.timings.locate_poll >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.timings.locate_poll).await;
        }
    }
}

#[async_trait]
impl MarketSession for ScrapeSession {
    async fn search_and_scrape(
        &mut self,
        model_query: &str,
        lightweight: bool,
    ) -> Result<Option<ScrapeResult>> {
        if !self.open {
            anyhow::bail!("scrape session already closed");
        }

        let Some(product_url) = self.locate_listing(model_query).await? else {
            info!(query = model_query, marketplace = %self.profile.name, "no live listing found");
            return Ok(None);
        };

        info!(url = %product_url, "navigating to first result");
        tokio::time::sleep(self.timings.settle_delay).await;
        let body = self.get_text(&product_url).await?;

        Ok(Some(extract_listing(
            &self.profile,
            &body,
            &product_url,
            lightweight,
        )))
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            info!(marketplace = %self.profile.name, "scrape session closed");
        }
    }
}

impl Drop for ScrapeSession {
    fn drop(&mut self) {
        if self.open {
            debug!(marketplace = %self.profile.name, "scrape session dropped while open");
        }
    }
}

/// First product link in the search results markup.
fn first_result_href(body: &str, results_link_selector: &str) -> Option<String> {
    let html = Html::parse_document(body);
    let selector = Selector::parse(results_link_selector).ok()?;
    html.select(&selector)
        .find_map(|el| el.value().attr("href").map(str::to_string))
}

/// Extract all listing fields from a product page. Field extractions are
/// independent; a selector that matches nothing yields an absent value.
pub fn extract_listing(
    profile: &MarketplaceProfile,
    body: &str,
    url: &str,
    lightweight: bool,
) -> ScrapeResult {
    let html = Html::parse_document(body);
    let sel = &profile.selectors;

    let mut result = ScrapeResult {
        url: Some(url.to_string()),
        ..ScrapeResult::default()
    };

    result.price = select_text(&html, &sel.price).and_then(|t| parse_price(&t));
    result.discount = select_text(&html, &sel.discount);
    result.rating = select_text(&html, &sel.rating)
        .and_then(|t| parse_price(&t))
        .map(|r| r.clamp(0.0, 5.0));
    result.review_count_raw = select_text(&html, &sel.review_count);
    result.availability = extract_availability(&html, sel);

    if !lightweight {
        result.title = select_text(&html, &sel.title);
        result.specs = extract_specs(&html, sel);
        result.images = extract_images(&html, profile);
    }

    result
}

/// Strip everything but digits and decimal points and parse as a float.
/// "Contact us" and friends come back as `None`, never an error.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

fn select_text(html: &Html, selector: &str) -> Option<String> {
    let parsed = Selector::parse(selector).ok()?;
    html.select(&parsed)
        .next()
        .map(|el| normalize_ws(&el.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}

fn element_text(element: Option<ElementRef<'_>>) -> Option<String> {
    element
        .map(|el| normalize_ws(&el.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Availability is derived from the buy/out-of-stock control. An absent or
/// ambiguous control must not be reported as purchasable.
fn extract_availability(html: &Html, sel: &SiteSelectors) -> AvailabilityStatus {
    let Ok(control_selector) = Selector::parse(&sel.stock_control) else {
        warn!(selector = %sel.stock_control, "invalid stock control selector");
        return AvailabilityStatus::OutOfStock;
    };

    match html.select(&control_selector).next() {
        Some(control) => {
            let text = normalize_ws(&control.text().collect::<String>()).to_lowercase();
            if text.contains(&sel.out_of_stock_marker) {
                AvailabilityStatus::OutOfStock
            } else {
                AvailabilityStatus::InStock
            }
        }
        None => AvailabilityStatus::OutOfStock,
    }
}

/// Parse the spec list into label:value pairs. A bullet with no recognizable
/// label falls back to a positional `feature_N` key.
fn extract_specs(html: &Html, sel: &SiteSelectors) -> TechnicalSpecMap {
    let mut specs = TechnicalSpecMap::new();
    let Ok(item_selector) = Selector::parse(&sel.spec_item) else {
        return specs;
    };
    let name_selector = Selector::parse(&sel.spec_name).ok();
    let value_selector = Selector::parse(&sel.spec_value).ok();

    let mut unlabeled = 0usize;
    for item in html.select(&item_selector) {
        let name = name_selector
            .as_ref()
            .and_then(|s| element_text(item.select(s).next()));
        let value = value_selector
            .as_ref()
            .and_then(|s| element_text(item.select(s).next()));

        match (name, value) {
            (Some(name), Some(value)) => {
                specs.insert(name, SpecValue::Text(value));
            }
            _ => {
                let text = normalize_ws(&item.text().collect::<String>());
                if text.is_empty() {
                    continue;
                }
                match text.split_once(':') {
                    Some((label, value)) if !label.trim().is_empty() && !value.trim().is_empty() => {
                        specs.insert(
                            label.trim().to_string(),
                            SpecValue::Text(value.trim().to_string()),
                        );
                    }
                    _ => {
                        unlabeled += 1;
                        specs.insert(format!("feature_{unlabeled}"), SpecValue::Text(text));
                    }
                }
            }
        }
    }
    specs
}

fn extract_images(html: &Html, profile: &MarketplaceProfile) -> Option<Vec<String>> {
    let selector = Selector::parse(&profile.selectors.image).ok()?;
    let mut seen = std::collections::HashSet::new();
    let images: Vec<String> = html
        .select(&selector)
        .filter_map(|el| el.value().attr("src"))
        .map(|src| profile.resolve_url(src))
        .filter(|src| seen.insert(src.clone()))
        .collect();

    if images.is_empty() { None } else { Some(images) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const PRODUCT_PAGE: &str = r#"
        <html><body>
            <h1 class="product_summary">ThinkPad E14 Gen 5 (Intel)</h1>
            <span class="price">$1,299.99</span>
            <span class="price-save-mt">Save $200.00</span>
            <div class="card-review-inline">
                <span class="bv_text">4.5</span>
                <div class="bv_numReviews_component_container"><span class="bv_text">(123)</span></div>
            </div>
            <div class="specs_list">
                <div class="specs_item">
                    <div class="item_name">Processor</div>
                    <div class="item_content">Intel Core i5-1335U</div>
                </div>
                <div class="specs_item">
                    <div class="item_name">Memory</div>
                    <div class="item_content">16 GB DDR4</div>
                </div>
                <div class="specs_item">Spill-resistant keyboard</div>
            </div>
            <button class="buyNowBtn">Add to cart</button>
            <div class="product_gallery">
                <img src="/images/e14-front.png" />
                <img src="/images/e14-side.png" />
                <img src="/images/e14-front.png" />
            </div>
        </body></html>
    "#;

    fn lenovo_profile() -> MarketplaceProfile {
        MarketplaceProfile::lenovo_default()
    }

    #[test]
    fn full_extraction_reads_every_field() {
        let result = extract_listing(&lenovo_profile(), PRODUCT_PAGE, "https://x/p", false);

        assert_eq!(result.title.as_deref(), Some("ThinkPad E14 Gen 5 (Intel)"));
        assert_eq!(result.price, Some(1299.99));
        assert_eq!(result.discount.as_deref(), Some("Save $200.00"));
        assert_eq!(result.rating, Some(4.5));
        assert_eq!(result.review_count_raw.as_deref(), Some("(123)"));
        assert_eq!(result.availability, AvailabilityStatus::InStock);
        assert_eq!(
            result.specs.get("Processor"),
            Some(&SpecValue::Text("Intel Core i5-1335U".to_string()))
        );
        assert_eq!(
            result.specs.get("Memory"),
            Some(&SpecValue::Text("16 GB DDR4".to_string()))
        );
        let images = result.images.expect("gallery images");
        assert_eq!(images.len(), 2);
        assert!(images[0].ends_with("/images/e14-front.png"));
    }

    #[test]
    fn bullet_without_delimiter_falls_back_to_feature_key() {
        let result = extract_listing(&lenovo_profile(), PRODUCT_PAGE, "https://x/p", false);
        assert_eq!(
            result.specs.get("feature_1"),
            Some(&SpecValue::Text("Spill-resistant keyboard".to_string()))
        );
    }

    #[test]
    fn lightweight_mode_skips_title_specs_and_images() {
        let result = extract_listing(&lenovo_profile(), PRODUCT_PAGE, "https://x/p", true);
        assert!(result.title.is_none());
        assert!(result.specs.is_empty());
        assert!(result.images.is_none());
        assert_eq!(result.price, Some(1299.99));
        assert_eq!(result.availability, AvailabilityStatus::InStock);
    }

    #[test]
    fn out_of_stock_button_text_marks_listing_unavailable() {
        let body = r#"<button class="outOfStock">Out of Stock</button>"#;
        let result = extract_listing(&lenovo_profile(), body, "https://x/p", false);
        assert_eq!(result.availability, AvailabilityStatus::OutOfStock);
    }

    #[test]
    fn missing_stock_control_defaults_to_out_of_stock() {
        let body = "<html><body><span class=\"price\">$999</span></body></html>";
        let result = extract_listing(&lenovo_profile(), body, "https://x/p", false);
        assert_eq!(result.availability, AvailabilityStatus::OutOfStock);
    }

    #[test]
    fn unparsable_price_is_absent_not_an_error() {
        let body = r#"<span class="price">Contact us</span>"#;
        let result = extract_listing(&lenovo_profile(), body, "https://x/p", true);
        assert_eq!(result.price, None);
    }

    #[rstest]
    #[case("$1,299.99", Some(1299.99))]
    #[case("USD 999", Some(999.0))]
    #[case("1299", Some(1299.0))]
    #[case("Contact us", None)]
    #[case("", None)]
    fn price_parsing_cases(#[case] raw: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_price(raw), expected);
    }

    #[test]
    fn first_result_href_finds_search_hit() {
        let body = r#"
            <ul>
                <li class="product_item">
                    <div class="product_title"><a href="/p/thinkpad-e14">ThinkPad E14</a></div>
                </li>
                <li class="product_item">
                    <div class="product_title"><a href="/p/thinkpad-e16">ThinkPad E16</a></div>
                </li>
            </ul>
        "#;
        let href = first_result_href(body, "li.product_item .product_title a");
        assert_eq!(href.as_deref(), Some("/p/thinkpad-e14"));
    }

    #[test]
    fn session_open_and_close_lifecycle() {
        let session = ScrapeSession::open(
            Arc::new(lenovo_profile()),
            &HttpClientConfig::default(),
            ScrapeTimings::from_config(&ScrapingConfig::default()),
        );
        let mut session = session.expect("session should open without network access");
        assert!(session.is_open());

        tokio_test::block_on(async {
            session.close().await;
        });
        assert!(!session.is_open());
    }
}
