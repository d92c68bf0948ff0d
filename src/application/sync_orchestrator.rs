//! # Catalog Sync Orchestrator
//!
//! Drives the end-to-end merge for every canonical product key: datasheet
//! fetch + extraction, live marketplace enrichment, optional embedding, and
//! idempotent persistence.
//!
//! Failure isolation: one bad datasheet or scrape never aborts the run --
//! per-product errors are logged with the offending key and the loop
//! continues. Only failure to acquire a marketplace session at all is
//! run-fatal, and even then every session already opened is released.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::product::{Brand, ProductRecord, ScrapeResult};
use crate::domain::repositories::{CatalogStore, InsertOutcome};
use crate::domain::services::{
    DatasheetSource, EmbeddingService, LiveMarketSource, MarketSession, SummarizationService,
};
use crate::infrastructure::config::CanonicalEntry;
use crate::infrastructure::spec_extractor::SpecExtractor;

/// Outcome counters for one sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub run_id: Uuid,
    pub lightweight: bool,
    pub processed: u32,
    pub inserted: u32,
    pub skipped_existing: u32,
    pub duplicate_skus: u32,
    pub live_misses: u32,
    pub failed: Vec<FailedProduct>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedProduct {
    pub key: String,
    pub error: String,
}

impl SyncSummary {
    fn new(run_id: Uuid, lightweight: bool) -> Self {
        Self {
            run_id,
            lightweight,
            processed: 0,
            inserted: 0,
            skipped_existing: 0,
            duplicate_skus: 0,
            live_misses: 0,
            failed: Vec::new(),
        }
    }
}

enum ProductOutcome {
    Inserted { live_found: bool },
    SkippedExisting,
    DuplicateSku,
}

/// One observed price/availability difference between the stored record and
/// the live listing. Reported, never written back: existing records are not
/// updated in place.
#[derive(Debug, Clone, Serialize)]
pub struct PriceDrift {
    pub sku: String,
    pub stored_price: f64,
    pub live_price: f64,
    pub stored_availability: String,
    pub live_availability: String,
}

impl std::fmt::Display for PriceDrift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: price {} -> {}, availability {} -> {}",
            self.sku,
            self.stored_price,
            self.live_price,
            self.stored_availability,
            self.live_availability
        )
    }
}

pub struct CatalogSyncOrchestrator {
    catalog: Vec<CanonicalEntry>,
    store: Arc<dyn CatalogStore>,
    datasheets: Arc<dyn DatasheetSource>,
    extractor: SpecExtractor,
    markets: Vec<Arc<dyn LiveMarketSource>>,
    embedder: Option<Arc<dyn EmbeddingService>>,
    summarizer: Option<Arc<dyn SummarizationService>>,
    embed_on_insert: bool,
}

impl CatalogSyncOrchestrator {
    pub fn new(
        catalog: Vec<CanonicalEntry>,
        store: Arc<dyn CatalogStore>,
        datasheets: Arc<dyn DatasheetSource>,
        extractor: SpecExtractor,
        markets: Vec<Arc<dyn LiveMarketSource>>,
        embedder: Option<Arc<dyn EmbeddingService>>,
        summarizer: Option<Arc<dyn SummarizationService>>,
        embed_on_insert: bool,
    ) -> Self {
        Self {
            catalog,
            store,
            datasheets,
            extractor,
            markets,
            embedder,
            summarizer,
            embed_on_insert,
        }
    }

    /// Run one full sync pass over the canonical catalog, in configuration
    /// order. Returns `Err` only when a marketplace session could not be
    /// acquired at all.
    pub async fn sync(&self, lightweight: bool) -> Result<SyncSummary> {
        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            lightweight,
            products = self.catalog.len(),
            "starting catalog sync run"
        );

        let mut sessions = self.open_sessions().await?;
        let summary = self
            .run_catalog_pass(run_id, &mut sessions, lightweight)
            .await;
        close_sessions(&mut sessions).await;

        info!(
            %run_id,
            inserted = summary.inserted,
            skipped = summary.skipped_existing,
            duplicates = summary.duplicate_skus,
            live_misses = summary.live_misses,
            failed = summary.failed.len(),
            "catalog sync run finished"
        );
        Ok(summary)
    }

    /// Acquire one session per marketplace for the duration of a run. On any
    /// open failure, sessions already opened are released before returning.
    async fn open_sessions(&self) -> Result<HashMap<Brand, Box<dyn MarketSession>>> {
        let mut sessions: HashMap<Brand, Box<dyn MarketSession>> = HashMap::new();

        for market in &self.markets {
            match market.open_session().await {
                Ok(session) => {
                    sessions.insert(market.brand(), session);
                }
                Err(e) => {
                    close_sessions(&mut sessions).await;
                    return Err(e).with_context(|| {
                        format!("failed to open scrape session for {}", market.brand())
                    });
                }
            }
        }
        Ok(sessions)
    }

    async fn run_catalog_pass(
        &self,
        run_id: Uuid,
        sessions: &mut HashMap<Brand, Box<dyn MarketSession>>,
        lightweight: bool,
    ) -> SyncSummary {
        let mut summary = SyncSummary::new(run_id, lightweight);

        for entry in &self.catalog {
            summary.processed += 1;
            match self.process_product(entry, sessions, lightweight).await {
                Ok(ProductOutcome::Inserted { live_found }) => {
                    summary.inserted += 1;
                    if !live_found {
                        summary.live_misses += 1;
                    }
                }
                Ok(ProductOutcome::SkippedExisting) => summary.skipped_existing += 1,
                Ok(ProductOutcome::DuplicateSku) => summary.duplicate_skus += 1,
                Err(e) => {
                    error!(key = %entry.key, error = %format!("{e:#}"), "product sync failed, continuing with next product");
                    summary.failed.push(FailedProduct {
                        key: entry.key.clone(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }
        summary
    }

    async fn process_product(
        &self,
        entry: &CanonicalEntry,
        sessions: &mut HashMap<Brand, Box<dyn MarketSession>>,
        lightweight: bool,
    ) -> Result<ProductOutcome> {
        // Advisory short-circuit only; the unique index is the dedup
        // authority.
        if self.store.find_by_sku(&entry.key).await?.is_some() {
            debug!(key = %entry.key, "already persisted, skipping");
            return Ok(ProductOutcome::SkippedExisting);
        }

        let brand = Brand::infer_from_key(&entry.key);

        let document = self
            .datasheets
            .fetch(&entry.datasheet_url)
            .await
            .with_context(|| format!("datasheet fetch failed for {}", entry.key))?;
        let specs = self.extractor.extract(brand, &document)?;

        let mut record = ProductRecord::with_datasheet_specs(&entry.key, &entry.datasheet_url, specs);

        let mut live_found = false;
        match sessions.get_mut(&brand) {
            Some(session) => {
                match session
                    .search_and_scrape(&entry.model_query(), lightweight)
                    .await?
                {
                    Some(scraped) => {
                        live_found = true;
                        overlay_live_data(&mut record, &scraped);
                    }
                    None => {
                        info!(key = %entry.key, "no live listing, persisting datasheet-only record");
                    }
                }
            }
            None => {
                warn!(key = %entry.key, %brand, "no marketplace session for brand, persisting datasheet-only record");
            }
        }

        if self.embed_on_insert {
            if let Some(embedder) = &self.embedder {
                match embedder.embed(&record.embedding_text()).await {
                    Ok(vector) => record.embedding = Some(vector),
                    Err(e) => {
                        warn!(key = %entry.key, error = %format!("{e:#}"), "embedding failed, persisting without embedding");
                    }
                }
            }
        }

        match self.store.insert(&record).await? {
            InsertOutcome::Inserted => Ok(ProductOutcome::Inserted { live_found }),
            InsertOutcome::DuplicateSku => {
                info!(key = %entry.key, "concurrent insert won the race, treating as no-op");
                Ok(ProductOutcome::DuplicateSku)
            }
        }
    }

    /// Compare stored price/availability against the live listings and
    /// report the differences. Existing records are never mutated; drift is
    /// observed and reported only.
    pub async fn report_price_drift(&self) -> Result<()> {
        let records = self.store.all_records().await?;
        if records.is_empty() {
            debug!("no persisted records, skipping drift check");
            return Ok(());
        }

        let mut sessions = self.open_sessions().await?;
        let mut drifts: Vec<PriceDrift> = Vec::new();

        for record in &records {
            match self.check_drift(record, &mut sessions).await {
                Ok(Some(drift)) => drifts.push(drift),
                Ok(None) => {}
                Err(e) => {
                    warn!(sku = %record.sku, error = %format!("{e:#}"), "drift check failed for product, continuing");
                }
            }
        }
        close_sessions(&mut sessions).await;

        if drifts.is_empty() {
            info!(checked = records.len(), "no price or availability drift detected");
            return Ok(());
        }

        let report = drifts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");

        match &self.summarizer {
            Some(summarizer) => match summarizer.summarize(&report).await {
                Ok(summary) => info!(drifts = drifts.len(), %summary, "price drift report"),
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "drift summarization failed, logging raw report");
                    info!(drifts = drifts.len(), %report, "price drift report");
                }
            },
            None => info!(drifts = drifts.len(), %report, "price drift report"),
        }
        Ok(())
    }

    async fn check_drift(
        &self,
        record: &ProductRecord,
        sessions: &mut HashMap<Brand, Box<dyn MarketSession>>,
    ) -> Result<Option<PriceDrift>> {
        let Some(session) = sessions.get_mut(&record.brand) else {
            return Ok(None);
        };

        let query = self
            .catalog
            .iter()
            .find(|entry| entry.key == record.sku)
            .map(CanonicalEntry::model_query)
            .unwrap_or_else(|| crate::domain::product::humanize_key(&record.sku));

        let Some(scraped) = session.search_and_scrape(&query, true).await? else {
            return Ok(None);
        };

        let live_price = scraped.price.unwrap_or(0.0);
        let price_changed = (live_price - record.current_price).abs() > 0.005;
        let availability_changed = scraped.availability != record.availability;

        if !price_changed && !availability_changed {
            return Ok(None);
        }

        Ok(Some(PriceDrift {
            sku: record.sku.clone(),
            stored_price: record.current_price,
            live_price,
            stored_availability: record.availability.as_str().to_string(),
            live_availability: scraped.availability.as_str().to_string(),
        }))
    }
}

async fn close_sessions(sessions: &mut HashMap<Brand, Box<dyn MarketSession>>) {
    for session in sessions.values_mut() {
        session.close().await;
    }
    sessions.clear();
}

/// Overlay volatile marketplace fields onto the default record. The
/// datasheet-derived spec map is never touched; live specs go to the
/// separate `specs_live` field.
fn overlay_live_data(record: &mut ProductRecord, scraped: &ScrapeResult) {
    record.current_price = scraped.price.unwrap_or(0.0);
    record.availability = scraped.availability;
    record.review_count = normalize_review_count(scraped.review_count_raw.as_deref());
    record.average_rating = scraped.rating.unwrap_or(0.0);

    if !scraped.specs.is_empty() {
        record.specs_live = Some(scraped.specs.clone());
    }
    if let Some(url) = &scraped.url {
        if !record.source_urls.contains(url) {
            record.source_urls.push(url.clone());
        }
    }
}

/// Strip everything but digits and parse, e.g. "(1,234)" -> 1234. Empty or
/// unparsable input normalizes to 0.
pub fn normalize_review_count(raw: Option<&str>) -> u32 {
    let digits: String = raw
        .unwrap_or("")
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}
