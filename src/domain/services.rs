//! Service-layer trait definitions for the sync pipeline
//!
//! These interfaces separate the orchestration flow from the concrete
//! datasheet, marketplace and language-model integrations.

use async_trait::async_trait;
use anyhow::Result;

use crate::domain::product::{Brand, ScrapeResult};

/// Retrieves a manufacturer datasheet document by URL.
#[async_trait]
pub trait DatasheetSource: Send + Sync {
    /// Fetch the raw document bytes. Network or HTTP failure is fatal for
    /// the product being processed, not for the run.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// A marketplace integration that can locate a product's live listing and
/// extract volatile fields from it.
///
/// The scrape session is a stateful resource (navigation state, cookies,
/// rate budget) and must be driven single-threaded; callers acquire one
/// session per sync run and close it on every exit path.
#[async_trait]
pub trait LiveMarketSource: Send + Sync {
    /// Which manufacturer's marketplace this source covers.
    fn brand(&self) -> Brand;

    /// Acquire the stateful session resource for one sync run. Failure here
    /// is run-fatal: without a session no product on this marketplace can be
    /// enriched.
    async fn open_session(&self) -> Result<Box<dyn MarketSession>>;
}

/// One open marketplace session.
#[async_trait]
pub trait MarketSession: Send {
    /// Locate the listing for `model_query` and extract its fields.
    ///
    /// `Ok(None)` means no live listing matched within the locate timeout --
    /// an expected outcome, not a fault. `lightweight` restricts extraction
    /// to price/discount/rating/review-count/availability.
    async fn search_and_scrape(
        &mut self,
        model_query: &str,
        lightweight: bool,
    ) -> Result<Option<ScrapeResult>>;

    /// Release the session resource. Idempotent.
    async fn close(&mut self);
}

/// Opaque embedding capability: `embed(text) -> vector`.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Opaque summarization capability: `summarize(text) -> string`. Used by the
/// periodic drift-check path for price/availability reporting.
#[async_trait]
pub trait SummarizationService: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String>;
}
